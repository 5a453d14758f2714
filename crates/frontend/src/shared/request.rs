//! Request pipeline: the single way views talk to the backend.
//!
//! Outbound: path check (development builds), parameter sanitization, URL
//! assembly, per-call timeout. Inbound: failures and `NOT_SUPPORTED_BY_DATA`
//! envelopes are classified into [`NormalizedError`], successful bodies are
//! decoded into the expected type and optionally validated.

use std::rc::Rc;
use std::time::Duration;

use contracts::shared::backend_payload::NotSupportedByData;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::api_error::{classify, ApiFailure, NormalizedError, UNEXPECTED_SHAPE};
use super::api_utils::{api_base, api_url, validate_api_path};
use super::config::{ApiConfig, ClientConfig};
use super::http::{default_transport, HttpRequest, HttpResponse, HttpTransport, Method, TransportError};
use super::params::{to_query_string, ParamValue, Params};
use super::timer;

/// One outbound call, before sanitization.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub params: Params,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
    /// `None`: the pipeline's default timeout
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Params::new(),
            body: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path).body(body)
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params = self.params.with(key, value);
        self
    }

    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Endpoint identifier used in errors and logs: the path without query.
    pub fn endpoint(&self) -> &str {
        self.path.split('?').next().unwrap_or(&self.path)
    }
}

#[derive(Clone)]
pub struct RequestPipeline {
    transport: Rc<dyn HttpTransport>,
    base_url: String,
    prefix: String,
    default_timeout: Duration,
    fast_timeout: Duration,
    strict_paths: bool,
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("base_url", &self.base_url)
            .field("prefix", &self.prefix)
            .field("default_timeout", &self.default_timeout)
            .field("fast_timeout", &self.fast_timeout)
            .field("strict_paths", &self.strict_paths)
            .finish()
    }
}

impl RequestPipeline {
    pub fn new(transport: Rc<dyn HttpTransport>, api: &ApiConfig) -> Self {
        Self {
            transport,
            base_url: api_base(&api.base_url),
            prefix: api.prefix.clone(),
            default_timeout: api.default_timeout(),
            fast_timeout: api.fast_timeout(),
            strict_paths: api.strict_paths,
        }
    }

    /// Pipeline over the target's default transport.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(default_transport(), &config.api)
    }

    pub fn fast_timeout(&self) -> Duration {
        self.fast_timeout
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T, NormalizedError> {
        self.send(ApiRequest::get(path).params(params)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, NormalizedError> {
        let body = serde_json::to_value(body).map_err(|e| {
            self.fail(
                &ApiFailure::other(format!("Failed to serialize request: {}", e)),
                Method::Post,
                path,
            )
        })?;
        self.send(ApiRequest::post(path, body)).await
    }

    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, NormalizedError> {
        self.send_validated(request, |_: &T| Ok(())).await
    }

    /// Like [`send`](Self::send), then runs `validate` on the decoded body.
    /// A rejected body surfaces as a `Validation` error carrying the
    /// validator's message.
    pub async fn send_validated<T, V>(&self, request: ApiRequest, validate: V) -> Result<T, NormalizedError>
    where
        T: DeserializeOwned,
        V: FnOnce(&T) -> Result<(), String>,
    {
        let method = request.method;
        let endpoint = request.endpoint().to_string();
        let (status, body) = self.execute(request, true).await?;
        self.decode(status, body, validate, method, &endpoint)
    }

    /// Health-style GET with the fast timeout.
    pub async fn probe(&self, path: &str) -> Result<Value, NormalizedError> {
        self.send(ApiRequest::get(path).timeout(self.fast_timeout)).await
    }

    /// GET of a static asset served next to the app (no API prefix check).
    pub async fn get_static<T: DeserializeOwned>(&self, path: &str) -> Result<T, NormalizedError> {
        let request = ApiRequest::get(path);
        let endpoint = request.endpoint().to_string();
        let (status, body) = self.execute(request, false).await?;
        self.decode(status, body, |_: &T| Ok(()), Method::Get, &endpoint)
    }

    async fn execute(&self, request: ApiRequest, check_path: bool) -> Result<(u16, Value), NormalizedError> {
        let method = request.method;
        let endpoint = request.endpoint().to_string();

        if check_path && self.strict_paths {
            if let Err(message) = validate_api_path(&request.path, &self.prefix) {
                log::error!("Rejected request to malformed path: {}", message);
                let failure = ApiFailure::InvalidPath {
                    path: request.path.clone(),
                    message,
                };
                return Err(self.fail(&failure, method, &endpoint));
            }
        }

        let query = to_query_string(&request.params.sanitize());
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let http_request = HttpRequest {
            method,
            url: api_url(&self.base_url, &request.path, &query),
            headers: with_accept(request.headers),
            body: request.body.map(|b| b.to_string()),
            timeout,
        };

        log::debug!("{} {}", method.as_str(), http_request.url);

        let outcome = match timer::timeout(timeout, self.transport.send(http_request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Timeout(timeout)),
        };

        let response = outcome.map_err(|e| self.fail(&transport_failure(e), method, &endpoint))?;
        let status = response.status;
        let success = response.is_success();
        let body = parse_body(response);

        if !success {
            return Err(self.fail(&ApiFailure::response(status, body), method, &endpoint));
        }

        let body = body.unwrap_or(Value::Null);
        if NotSupportedByData::from_body(&body).is_some() {
            return Err(self.fail(&ApiFailure::response(status, Some(body)), method, &endpoint));
        }

        Ok((status, body))
    }

    fn decode<T, V>(
        &self,
        status: u16,
        body: Value,
        validate: V,
        method: Method,
        endpoint: &str,
    ) -> Result<T, NormalizedError>
    where
        T: DeserializeOwned,
        V: FnOnce(&T) -> Result<(), String>,
    {
        let data: T = serde_json::from_value(body).map_err(|e| {
            log::warn!("{} {}: response does not match the expected shape: {}", method.as_str(), endpoint, e);
            self.fail(
                &ApiFailure::InvalidPayload {
                    status,
                    message: UNEXPECTED_SHAPE.to_string(),
                },
                method,
                endpoint,
            )
        })?;

        validate(&data).map_err(|message| {
            self.fail(&ApiFailure::InvalidPayload { status, message }, method, endpoint)
        })?;

        Ok(data)
    }

    /// Classifies once and logs.
    fn fail(&self, failure: &ApiFailure, method: Method, endpoint: &str) -> NormalizedError {
        let error = classify(failure, endpoint);
        log::warn!(
            "{} {} failed: {} (status: {:?}, correlation_id: {:?}): {}",
            method.as_str(),
            endpoint,
            error.kind,
            error.status,
            error.correlation_id,
            error.message
        );
        error
    }
}

fn with_accept(mut headers: Vec<(String, String)>) -> Vec<(String, String)> {
    if !headers.iter().any(|(name, _)| name.eq_ignore_ascii_case("accept")) {
        headers.push(("Accept".to_string(), "application/json".to_string()));
    }
    headers
}

fn transport_failure(error: TransportError) -> ApiFailure {
    match error {
        TransportError::Timeout(_) => ApiFailure::timeout(error.to_string()),
        TransportError::Network(message) => ApiFailure::transport(message),
        TransportError::InvalidRequest(message) => ApiFailure::other(message),
    }
}

/// JSON body, the raw text as a JSON string when it is not JSON, or `None`
/// when empty.
fn parse_body(response: HttpResponse) -> Option<Value> {
    if response.body.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&response.body).unwrap_or(Value::String(response.body)))
}
