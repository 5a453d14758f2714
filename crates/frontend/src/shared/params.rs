//! Query parameter sanitization
//!
//! Every outgoing request passes its parameters through [`sanitize`] before
//! they are attached to the URL. Absent, empty and `NaN` values are dropped so
//! the backend never receives `?plant=undefined` or `?line=null`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde_json::Value;

/// Sanitized parameters, in the order they were supplied
pub type QueryParams = IndexMap<String, String>;

/// A raw query parameter value as handed over by a view.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Absent,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
    LocalDateTime(NaiveDateTime),
    List(Vec<ParamValue>),
    Json(Value),
}

impl ParamValue {
    /// String form of the value, or `None` when it must not be sent.
    ///
    /// Lists are comma-joined with one slot per item, so `["L1", "", "L3"]`
    /// becomes `L1,,L3`. A list whose items all drop is dropped itself.
    pub fn to_param_string(&self) -> Option<String> {
        let rendered = match self {
            ParamValue::Absent => return None,
            ParamValue::Bool(b) => b.to_string(),
            ParamValue::Int(n) => n.to_string(),
            ParamValue::UInt(n) => n.to_string(),
            ParamValue::Float(f) if !f.is_finite() => return None,
            ParamValue::Float(f) => f.to_string(),
            ParamValue::Text(s) => s.clone(),
            ParamValue::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            ParamValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            ParamValue::LocalDateTime(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            ParamValue::List(items) => {
                let slots: Vec<Option<String>> =
                    items.iter().map(ParamValue::to_param_string).collect();
                if slots.iter().all(Option::is_none) {
                    return None;
                }
                slots
                    .into_iter()
                    .map(Option::unwrap_or_default)
                    .collect::<Vec<_>>()
                    .join(",")
            }
            ParamValue::Json(value) => return json_to_param(value),
        };

        if rendered.is_empty() {
            None
        } else {
            Some(rendered)
        }
    }
}

fn json_to_param(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(b) => ParamValue::Bool(*b).to_param_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => ParamValue::Int(i).to_param_string(),
            (_, Some(u), _) => ParamValue::UInt(u).to_param_string(),
            (_, _, Some(f)) => ParamValue::Float(f).to_param_string(),
            _ => Some(n.to_string()),
        },
        Value::String(s) => ParamValue::Text(s.clone()).to_param_string(),
        Value::Array(items) => {
            ParamValue::List(items.iter().cloned().map(ParamValue::Json).collect()).to_param_string()
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

/// Drops absent/empty values and renders the rest as strings.
///
/// Total: every [`ParamValue`] either renders or is dropped.
pub fn sanitize<K, I>(params: I) -> QueryParams
where
    K: Into<String>,
    I: IntoIterator<Item = (K, ParamValue)>,
{
    params
        .into_iter()
        .filter_map(|(key, value)| value.to_param_string().map(|v| (key.into(), v)))
        .collect()
}

/// Percent-encoded `a=1&b=2` form of sanitized parameters (без ведущего `?`).
pub fn to_query_string(params: &QueryParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builder for request parameters.
///
/// ```ignore
/// let params = Params::new()
///     .with("plant", plant_id)
///     .with("from", date_from)
///     .with("include_closed", false);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn sanitize(self) -> QueryParams {
        sanitize(self.0)
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Params(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<QueryParams> for Params {
    fn from(params: QueryParams) -> Self {
        params.into_iter().collect()
    }
}

macro_rules! param_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::$variant(value.into())
                }
            }
        )*
    };
}

param_from!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => UInt,
    u16 => UInt,
    u32 => UInt,
    u64 => UInt,
    f32 => Float,
    f64 => Float,
    String => Text,
    DateTime<Utc> => DateTime,
    NaiveDate => Date,
    NaiveDateTime => LocalDateTime,
    Value => Json,
);

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::UInt(value as u64)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Text(value.clone())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ParamValue::Absent)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(values: Vec<T>) -> Self {
        ParamValue::List(values.into_iter().map(Into::into).collect())
    }
}
