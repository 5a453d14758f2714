use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Суффикс wildcard-шаблона: `ml.*` покрывает все ключи с префиксом `ml`
pub const WILDCARD_SUFFIX: &str = ".*";

/// Состояние фичи
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateStatus {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl GateStatus {
    pub fn is_on(self) -> bool {
        matches!(self, GateStatus::On)
    }
}

/// Feature gate as served by `/api/ops/feature-gates`.
///
/// `feature` may be omitted inside a `gates` mapping; the key carries it and
/// [`FeatureGatesConfig::normalized`] fills it back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureGate {
    #[serde(default)]
    pub feature: String,
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Доля совпавших данных, 0..1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl FeatureGate {
    pub fn on(feature: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            status: GateStatus::On,
            reason: None,
            match_rate: None,
            suggestion: None,
        }
    }

    pub fn off(feature: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            feature: feature.into(),
            status: GateStatus::Off,
            reason: Some(reason.into()),
            match_rate: None,
            suggestion: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.status.is_on()
    }
}

/// Returns the prefix of a wildcard pattern (`"ml.*"` -> `"ml"`), or `None`
/// for an exact key.
pub fn wildcard_prefix(pattern: &str) -> Option<&str> {
    pattern.strip_suffix(WILDCARD_SUFFIX)
}

/// Полный набор gate'ов. Порядок ключей сохраняется как в исходном документе:
/// от него зависит, какой wildcard сработает первым.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureGatesConfig {
    #[serde(default)]
    pub gates: IndexMap<String, FeatureGate>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub generated_at: Option<DateTime<Utc>>,
}

/// Метка времени документа не должна ломать разбор гейтов: RFC 3339,
/// naive-время (считаем UTC), всё остальное -> `None`
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_str).and_then(parse_timestamp))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

impl FeatureGatesConfig {
    /// Builds a config from gates in registration order. A later gate with the
    /// same key replaces the earlier one but keeps its position.
    pub fn from_gates(gates: impl IntoIterator<Item = FeatureGate>) -> Self {
        let gates = gates
            .into_iter()
            .map(|gate| (gate.feature.clone(), gate))
            .collect();
        Self {
            gates,
            generated_at: None,
        }
    }

    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    /// Fills empty `feature` fields from their mapping key.
    pub fn normalized(mut self) -> Self {
        for (key, gate) in self.gates.iter_mut() {
            if gate.feature.is_empty() {
                gate.feature = key.clone();
            }
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.gates.is_empty()
    }

    /// Wildcard patterns in registration order, paired with their prefixes.
    pub fn wildcards(&self) -> impl Iterator<Item = (&str, &FeatureGate)> {
        self.gates
            .iter()
            .filter_map(|(pattern, gate)| wildcard_prefix(pattern).map(|prefix| (prefix, gate)))
    }
}
