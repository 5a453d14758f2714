//! Ответы backend'а, форма которых зависит от данных.
//!
//! The same route may answer either with its regular body or with a
//! `{"status": "NOT_SUPPORTED_BY_DATA", ...}` envelope when the current
//! dataset cannot produce a meaningful result.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Значение поля `status` в конверте "нет данных"
pub const NOT_SUPPORTED_BY_DATA: &str = "NOT_SUPPORTED_BY_DATA";

/// Body of a `NOT_SUPPORTED_BY_DATA` answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotSupportedByData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_rate: Option<f64>,
}

impl NotSupportedByData {
    /// Reads the envelope out of an arbitrary JSON body.
    ///
    /// Only an object with `status == "NOT_SUPPORTED_BY_DATA"` matches.
    /// Mistyped optional fields are read as absent.
    pub fn from_body(body: &Value) -> Option<Self> {
        let object = body.as_object()?;
        if object.get("status").and_then(Value::as_str) != Some(NOT_SUPPORTED_BY_DATA) {
            return None;
        }

        let text = |field: &str| {
            object
                .get(field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Some(Self {
            reason: text("reason"),
            correlation_id: text("correlation_id"),
            suggestion: text("suggestion"),
            match_rate: object.get("match_rate").and_then(Value::as_f64),
        })
    }

    pub fn to_body(&self) -> Value {
        let mut body = serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Default::default()));
        if let Value::Object(map) = &mut body {
            map.insert("status".into(), Value::String(NOT_SUPPORTED_BY_DATA.into()));
        }
        body
    }
}

/// Tagged union over the two shapes a data route may answer with,
/// discriminated by the `status` field.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendPayload<T> {
    NotSupportedByData(NotSupportedByData),
    Data(T),
}

impl<T: DeserializeOwned> BackendPayload<T> {
    /// Splits a JSON body into the envelope or the expected data type.
    pub fn from_value(body: Value) -> Result<Self, serde_json::Error> {
        if let Some(envelope) = NotSupportedByData::from_body(&body) {
            return Ok(BackendPayload::NotSupportedByData(envelope));
        }
        serde_json::from_value(body).map(BackendPayload::Data)
    }
}

impl<T> BackendPayload<T> {
    pub fn data(self) -> Option<T> {
        match self {
            BackendPayload::Data(data) => Some(data),
            BackendPayload::NotSupportedByData(_) => None,
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for BackendPayload<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        BackendPayload::from_value(value).map_err(serde::de::Error::custom)
    }
}
