//! Error taxonomy for backend calls
//!
//! Every failure coming out of [`crate::shared::request::RequestPipeline`] is
//! classified exactly once into a [`NormalizedError`]. Views branch on
//! [`ErrorKind`], never on message text.

use contracts::shared::backend_payload::NotSupportedByData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Подстроки сообщений, по которым ошибка считается сетевой
const NETWORK_MARKERS: [&str; 6] = [
    "network error",
    "failed to fetch",
    "econnrefused",
    "etimedout",
    "timeout",
    "networkerror",
];

const DEFAULT_NOT_SUPPORTED_BY_DATA: &str = "This view cannot be computed from the current data";
const DEFAULT_UNKNOWN: &str = "Unexpected error";
pub(crate) const UNEXPECTED_SHAPE: &str = "The server returned data in an unexpected format";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Offline,
    /// Route does not exist on this backend
    NotSupportedBackend,
    /// Route exists, the dataset cannot answer it
    NotSupportedByData,
    Validation,
    ServerError,
    Unauthorized,
    Unknown,
}

/// How a view presents an error of a given kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorPresentation {
    pub title: &'static str,
    pub description: &'static str,
    /// Show a manual "retry" action
    pub allow_retry: bool,
    /// Append the server detail text under the description
    pub show_detail: bool,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        ErrorKind::Offline,
        ErrorKind::NotSupportedBackend,
        ErrorKind::NotSupportedByData,
        ErrorKind::Validation,
        ErrorKind::ServerError,
        ErrorKind::Unauthorized,
        ErrorKind::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Offline => "OFFLINE",
            ErrorKind::NotSupportedBackend => "NOT_SUPPORTED_BACKEND",
            ErrorKind::NotSupportedByData => "NOT_SUPPORTED_BY_DATA",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::ServerError => "SERVER_ERROR",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Generic phrase used when the server supplied no detail.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::Offline => "Cannot reach the planning backend",
            ErrorKind::NotSupportedBackend => "This capability is not available in this deployment",
            ErrorKind::NotSupportedByData => DEFAULT_NOT_SUPPORTED_BY_DATA,
            ErrorKind::Validation => "Invalid request",
            ErrorKind::ServerError => "Server error",
            ErrorKind::Unauthorized => "Access denied",
            ErrorKind::Unknown => DEFAULT_UNKNOWN,
        }
    }

    pub fn presentation(self) -> ErrorPresentation {
        let (title, description, allow_retry, show_detail) = match self {
            ErrorKind::Offline => (
                "Can't reach the system",
                "The planning backend is not responding. Check the connection and try again.",
                true,
                false,
            ),
            ErrorKind::NotSupportedBackend => (
                "Not available",
                "This capability isn't available in this deployment.",
                false,
                false,
            ),
            ErrorKind::NotSupportedByData => (
                "Not enough data",
                "Available, but not computable with the current data.",
                false,
                true,
            ),
            ErrorKind::Validation => ("Invalid request", "The request was rejected.", false, true),
            ErrorKind::ServerError => ("Something went wrong", "The server failed to process the request.", true, true),
            ErrorKind::Unauthorized => ("Access denied", "You don't have access to this data.", false, false),
            ErrorKind::Unknown => ("Something went wrong", "An unexpected error occurred.", true, false),
        };
        ErrorPresentation {
            title,
            description,
            allow_retry,
            show_detail,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What actually went wrong, before classification.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiFailure {
    /// No response arrived: connection refused, DNS, abort, timeout
    Transport { message: String, timed_out: bool },
    /// The server answered. `body` is the parsed JSON, or the raw text as a
    /// JSON string when it was not JSON.
    Response { status: u16, body: Option<Value> },
    /// 2xx answer that does not match the expected shape
    InvalidPayload { status: u16, message: String },
    /// Path rejected before sending (development builds)
    InvalidPath { path: String, message: String },
    /// Any other locally raised error
    Other { message: String },
}

impl ApiFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        ApiFailure::Transport {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        ApiFailure::Transport {
            message: message.into(),
            timed_out: true,
        }
    }

    pub fn response(status: u16, body: Option<Value>) -> Self {
        ApiFailure::Response { status, body }
    }

    pub fn other(message: impl Into<String>) -> Self {
        ApiFailure::Other {
            message: message.into(),
        }
    }

    /// The failure's own message text, if it has one.
    pub fn message(&self) -> Option<&str> {
        match self {
            ApiFailure::Transport { message, .. }
            | ApiFailure::InvalidPayload { message, .. }
            | ApiFailure::InvalidPath { message, .. }
            | ApiFailure::Other { message } => Some(message.as_str()),
            ApiFailure::Response { body, .. } => body.as_ref().and_then(Value::as_str),
        }
    }
}

/// Classified failure of one backend call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct NormalizedError {
    pub endpoint: String,
    pub status: Option<u16>,
    pub message: String,
    pub correlation_id: Option<String>,
    pub kind: ErrorKind,
    /// From a `NOT_SUPPORTED_BY_DATA` body
    pub suggestion: Option<String>,
    pub match_rate: Option<f64>,
    pub cause: ApiFailure,
}

impl NormalizedError {
    pub fn is_offline(&self) -> bool {
        self.kind == ErrorKind::Offline
    }

    pub fn presentation(&self) -> ErrorPresentation {
        self.kind.presentation()
    }

    /// Builds the error a view shows for a `NOT_SUPPORTED_BY_DATA` payload it
    /// received directly rather than through the pipeline.
    pub fn not_supported_by_data(endpoint: &str, status: u16, envelope: &NotSupportedByData) -> Self {
        classify(&ApiFailure::response(status, Some(envelope.to_body())), endpoint)
    }
}

/// Legacy call sites return `Result<_, String>` and match on the text.
/// Prefer branching on [`NormalizedError::kind`].
impl From<NormalizedError> for String {
    fn from(error: NormalizedError) -> Self {
        error.message
    }
}

/// Maps any failure to a [`NormalizedError`]. Never panics.
///
/// Order, first match wins:
/// 1. network-looking message or no response at all -> `Offline`
/// 2. `NOT_SUPPORTED_BY_DATA` body -> `NotSupportedByData`
/// 3. HTTP status (404, 401/403, 400/422, 500, 503)
/// 4. `Unknown`
pub fn classify(failure: &ApiFailure, endpoint: &str) -> NormalizedError {
    let base = |kind: ErrorKind, status: Option<u16>, message: String| NormalizedError {
        endpoint: endpoint.to_string(),
        status,
        message,
        correlation_id: None,
        kind,
        suggestion: None,
        match_rate: None,
        cause: failure.clone(),
    };

    match failure {
        ApiFailure::Transport { message, .. } => {
            base(ErrorKind::Offline, None, own_or(message, ErrorKind::Offline))
        }
        ApiFailure::Other { message } if looks_like_network_error(message) => {
            base(ErrorKind::Offline, None, own_or(message, ErrorKind::Offline))
        }
        ApiFailure::Other { message } => {
            base(ErrorKind::Unknown, None, own_or(message, ErrorKind::Unknown))
        }
        ApiFailure::InvalidPayload { status, message } => base(
            ErrorKind::Validation,
            Some(*status),
            non_empty(message).unwrap_or_else(|| UNEXPECTED_SHAPE.into()),
        ),
        ApiFailure::InvalidPath { message, .. } => {
            base(ErrorKind::Validation, None, own_or(message, ErrorKind::Validation))
        }
        ApiFailure::Response { status, body } => {
            if let Some(envelope) = body.as_ref().and_then(NotSupportedByData::from_body) {
                return NormalizedError {
                    correlation_id: envelope.correlation_id,
                    suggestion: envelope.suggestion,
                    match_rate: envelope.match_rate,
                    ..base(
                        ErrorKind::NotSupportedByData,
                        Some(*status),
                        envelope.reason.unwrap_or_else(|| DEFAULT_NOT_SUPPORTED_BY_DATA.into()),
                    )
                };
            }

            let kind = kind_for_status(*status);
            let detail = body.as_ref().and_then(server_detail);
            let message = match (detail, kind) {
                (Some(detail), _) => detail,
                (None, ErrorKind::Unknown) => format!("Request failed with status {}", status),
                (None, kind) => kind.default_message().to_string(),
            };

            NormalizedError {
                correlation_id: body.as_ref().and_then(correlation_id),
                ..base(kind, Some(*status), message)
            }
        }
    }
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        404 => ErrorKind::NotSupportedBackend,
        401 | 403 => ErrorKind::Unauthorized,
        400 | 422 => ErrorKind::Validation,
        500 => ErrorKind::ServerError,
        503 => ErrorKind::Offline,
        _ => ErrorKind::Unknown,
    }
}

fn looks_like_network_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    NETWORK_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn own_or(message: &str, kind: ErrorKind) -> String {
    non_empty(message).unwrap_or_else(|| kind.default_message().to_string())
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Human-readable detail supplied by the server: `detail`, `message`, `error`,
/// or a plain-text body.
fn server_detail(body: &Value) -> Option<String> {
    match body {
        Value::String(text) => non_empty(text),
        Value::Object(object) => ["detail", "message", "error"]
            .iter()
            .filter_map(|field| object.get(*field))
            .find_map(detail_text),
        _ => None,
    }
}

fn detail_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text),
        // FastAPI-style validation list: [{"loc": [...], "msg": "..."}]
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => non_empty(text),
                    other => other.get("msg").and_then(Value::as_str).and_then(non_empty),
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(object) => object.get("message").and_then(Value::as_str).and_then(non_empty),
        _ => None,
    }
}

fn correlation_id(body: &Value) -> Option<String> {
    body.get("correlation_id").and_then(Value::as_str).and_then(non_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ENDPOINT: &str = "/api/prodplan/bottlenecks";

    #[test]
    fn test_404_is_not_supported_backend() {
        let error = classify(&ApiFailure::response(404, None), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::NotSupportedBackend);
        assert_eq!(error.status, Some(404));
        assert_eq!(error.endpoint, ENDPOINT);
    }

    #[test]
    fn test_transport_failure_is_offline_without_status() {
        let error = classify(&ApiFailure::timeout("timeout of 8000ms exceeded"), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::Offline);
        assert_eq!(error.status, None);

        let error = classify(&ApiFailure::transport(""), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::Offline);
        assert_eq!(error.message, ErrorKind::Offline.default_message());
    }

    #[test]
    fn test_network_markers_are_case_insensitive() {
        for message in [
            "Network Error",
            "TypeError: Failed to fetch",
            "connect ECONNREFUSED 127.0.0.1:8000",
            "ETIMEDOUT",
            "Request Timeout",
            "NetworkError when attempting to fetch resource.",
        ] {
            let error = classify(&ApiFailure::other(message), ENDPOINT);
            assert_eq!(error.kind, ErrorKind::Offline, "{message}");
            assert_eq!(error.status, None);
        }
    }

    #[test]
    fn test_other_failure_without_markers_is_unknown() {
        let error = classify(&ApiFailure::other("boom"), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::Unknown);
        assert_eq!(error.message, "boom");

        let error = classify(&ApiFailure::other("   "), ENDPOINT);
        assert_eq!(error.message, DEFAULT_UNKNOWN);
    }

    #[test]
    fn test_not_supported_by_data_on_success_status() {
        let body = json!({"status": "NOT_SUPPORTED_BY_DATA", "reason": "match rate 32%"});
        let error = classify(&ApiFailure::response(200, Some(body)), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::NotSupportedByData);
        assert_eq!(error.message, "match rate 32%");
        assert_eq!(error.status, Some(200));
    }

    #[test]
    fn test_not_supported_by_data_copies_metadata() {
        let body = json!({
            "status": "NOT_SUPPORTED_BY_DATA",
            "correlation_id": "req-9",
            "suggestion": "import routings",
            "match_rate": 0.4
        });
        let error = classify(&ApiFailure::response(409, Some(body)), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::NotSupportedByData);
        assert_eq!(error.message, DEFAULT_NOT_SUPPORTED_BY_DATA);
        assert_eq!(error.correlation_id.as_deref(), Some("req-9"));
        assert_eq!(error.suggestion.as_deref(), Some("import routings"));
        assert_eq!(error.match_rate, Some(0.4));
    }

    #[test]
    fn test_envelope_wins_over_status_mapping() {
        let body = json!({"status": "NOT_SUPPORTED_BY_DATA", "reason": "no routings"});
        let error = classify(&ApiFailure::response(404, Some(body)), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::NotSupportedByData);
    }

    #[test]
    fn test_status_table() {
        let cases = [
            (401, ErrorKind::Unauthorized),
            (403, ErrorKind::Unauthorized),
            (400, ErrorKind::Validation),
            (422, ErrorKind::Validation),
            (500, ErrorKind::ServerError),
            (503, ErrorKind::Offline),
            (502, ErrorKind::Unknown),
            (418, ErrorKind::Unknown),
        ];
        for (status, kind) in cases {
            let error = classify(&ApiFailure::response(status, None), ENDPOINT);
            assert_eq!(error.kind, kind, "status {status}");
            assert_eq!(error.status, Some(status));
        }
    }

    #[test]
    fn test_server_detail_preferred_over_generic_phrase() {
        let error = classify(
            &ApiFailure::response(400, Some(json!({"detail": "horizon must be positive"}))),
            ENDPOINT,
        );
        assert_eq!(error.message, "horizon must be positive");

        let error = classify(
            &ApiFailure::response(500, Some(json!({"message": "solver crashed", "correlation_id": "abc"}))),
            ENDPOINT,
        );
        assert_eq!(error.message, "solver crashed");
        assert_eq!(error.correlation_id.as_deref(), Some("abc"));

        let error = classify(&ApiFailure::response(500, Some(json!("Internal Server Error"))), ENDPOINT);
        assert_eq!(error.message, "Internal Server Error");

        let error = classify(&ApiFailure::response(500, Some(json!({}))), ENDPOINT);
        assert_eq!(error.message, ErrorKind::ServerError.default_message());
    }

    #[test]
    fn test_validation_list_detail_is_joined() {
        let body = json!({"detail": [
            {"loc": ["query", "from"], "msg": "invalid date"},
            {"loc": ["query", "to"], "msg": "field required"}
        ]});
        let error = classify(&ApiFailure::response(422, Some(body)), ENDPOINT);
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(error.message, "invalid date; field required");
    }

    #[test]
    fn test_unknown_status_without_detail() {
        let error = classify(&ApiFailure::response(418, None), ENDPOINT);
        assert_eq!(error.message, "Request failed with status 418");
    }

    #[test]
    fn test_client_local_failures_are_validation() {
        let error = classify(
            &ApiFailure::InvalidPayload {
                status: 200,
                message: String::new(),
            },
            ENDPOINT,
        );
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(error.status, Some(200));
        assert_eq!(error.message, UNEXPECTED_SHAPE);

        let error = classify(
            &ApiFailure::InvalidPath {
                path: "/prodplan".into(),
                message: "missing /api prefix".into(),
            },
            "/prodplan",
        );
        assert_eq!(error.kind, ErrorKind::Validation);
        assert_eq!(error.status, None);
    }

    #[test]
    fn test_classify_is_total_on_malformed_bodies() {
        let bodies = [
            None,
            Some(Value::Null),
            Some(json!(42)),
            Some(json!([1, {"msg": 3}, null])),
            Some(json!({"status": 12, "detail": {"nested": true}})),
            Some(json!({"status": "NOT_SUPPORTED_BY_DATA", "reason": ["x"]})),
            Some(json!({"detail": []})),
            Some(json!("")),
        ];
        for status in [0, 200, 204, 302, 404, 429, 500, 599, u16::MAX] {
            for body in bodies.iter().cloned() {
                let error = classify(&ApiFailure::response(status, body), ENDPOINT);
                assert!(ErrorKind::ALL.contains(&error.kind));
                assert!(!error.message.is_empty());
            }
        }
    }

    #[test]
    fn test_cause_is_preserved() {
        let failure = ApiFailure::response(500, Some(json!({"detail": "x"})));
        let error = classify(&failure, ENDPOINT);
        assert_eq!(error.cause, failure);
    }

    #[test]
    fn test_legacy_string_adapter_uses_message() {
        fn legacy() -> Result<(), String> {
            Err::<(), _>(classify(&ApiFailure::response(403, None), ENDPOINT))?;
            Ok(())
        }
        assert_eq!(legacy(), Err(ErrorKind::Unauthorized.default_message().to_string()));
    }

    #[test]
    fn test_every_kind_has_presentation() {
        for kind in ErrorKind::ALL {
            let presentation = kind.presentation();
            assert!(!presentation.title.is_empty());
            assert!(!presentation.description.is_empty());
        }
        assert!(ErrorKind::Offline.presentation().allow_retry);
        assert!(ErrorKind::NotSupportedByData.presentation().show_detail);
    }

    #[test]
    fn test_kind_serializes_screaming_snake_case() {
        assert_eq!(serde_json::to_value(ErrorKind::NotSupportedByData).unwrap(), json!("NOT_SUPPORTED_BY_DATA"));
        for kind in ErrorKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.as_str()));
        }
    }
}
