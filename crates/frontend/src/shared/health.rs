//! Background health polling.
//!
//! The only place in the client that retries: a bounded, fixed-count retry
//! of `OFFLINE` outcomes for the low-stakes ops health probe. Data calls are
//! never retried automatically.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use super::api_error::{ErrorKind, NormalizedError};
use super::config::HealthSettings;
use super::request::RequestPipeline;
use super::timer;

/// Retry settings for background polling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first try.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl From<&HealthSettings> for RetryPolicy {
    fn from(settings: &HealthSettings) -> Self {
        Self {
            max_attempts: settings.attempts.max(1),
            delay: settings.retry_delay(),
        }
    }
}

/// Outcome of one health check, with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub attempts: u32,
    pub result: Result<Value, NormalizedError>,
}

impl HealthReport {
    pub fn is_up(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs `action` until it succeeds, fails with a non-`OFFLINE` error, or the
/// attempts are used up. Returns the last result and the attempt count.
pub async fn retry_offline<T, F, Fut>(policy: RetryPolicy, mut action: F) -> (u32, Result<T, NormalizedError>)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NormalizedError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match action().await {
            Ok(value) => return (attempt, Ok(value)),
            Err(err) => {
                if attempt >= policy.max_attempts || err.kind != ErrorKind::Offline {
                    return (attempt, Err(err));
                }
                log::debug!(
                    "{} offline (attempt {}/{}), retrying in {:?}",
                    err.endpoint,
                    attempt,
                    policy.max_attempts,
                    policy.delay
                );
                timer::sleep(policy.delay).await;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthProbe {
    pipeline: RequestPipeline,
    path: String,
    policy: RetryPolicy,
}

impl HealthProbe {
    pub fn new(pipeline: RequestPipeline, settings: &HealthSettings) -> Self {
        Self {
            pipeline,
            path: settings.path.clone(),
            policy: RetryPolicy::from(settings),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Probes the health endpoint with the fast timeout.
    pub async fn check(&self) -> HealthReport {
        let (attempts, result) = retry_offline(self.policy, || self.pipeline.probe(&self.path)).await;
        if let Err(err) = &result {
            log::warn!("Health check failed after {} attempt(s): {} {}", attempts, err.kind, err.message);
        }
        HealthReport { attempts, result }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::config::ClientConfig;
    use crate::shared::http::testing::{Reply, ScriptedTransport};
    use crate::shared::http::TransportError;
    use std::rc::Rc;

    const HEALTH: &str = "/api/ops/health";

    fn probe(transport: ScriptedTransport, attempts: u32) -> (HealthProbe, Rc<ScriptedTransport>) {
        let transport = Rc::new(transport);
        let config = ClientConfig::default();
        let pipeline = RequestPipeline::new(transport.clone(), &config.api);
        let probe = HealthProbe::new(pipeline, &config.health).with_policy(RetryPolicy {
            max_attempts: attempts,
            delay: Duration::from_millis(0),
        });
        (probe, transport)
    }

    fn refused() -> Reply {
        Reply::Fail(TransportError::Network("connection refused".into()))
    }

    #[tokio::test]
    async fn test_retries_offline_until_up() {
        let (probe, transport) = probe(
            ScriptedTransport::new()
                .route(HEALTH, refused())
                .route(HEALTH, refused())
                .route(HEALTH, Reply::json(200, r#"{"status": "ok"}"#)),
            4,
        );

        let report = probe.check().await;
        assert!(report.is_up());
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.calls_to(HEALTH), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (probe, transport) = probe(ScriptedTransport::new().route(HEALTH, refused()), 3);

        let report = probe.check().await;
        assert!(!report.is_up());
        assert_eq!(report.attempts, 3);
        assert_eq!(transport.calls_to(HEALTH), 3);
        assert_eq!(report.result.unwrap_err().kind, ErrorKind::Offline);
    }

    #[tokio::test]
    async fn test_does_not_retry_other_kinds() {
        let (probe, transport) = probe(ScriptedTransport::new().route(HEALTH, Reply::json(500, "{}")), 5);

        let report = probe.check().await;
        assert_eq!(report.attempts, 1);
        assert_eq!(transport.calls_to(HEALTH), 1);
        assert_eq!(report.result.unwrap_err().kind, ErrorKind::ServerError);
    }

    #[tokio::test]
    async fn test_503_counts_as_offline() {
        let (probe, _) = probe(
            ScriptedTransport::new()
                .route(HEALTH, Reply::json(503, ""))
                .route(HEALTH, Reply::json(200, "{}")),
            2,
        );

        let report = probe.check().await;
        assert!(report.is_up());
        assert_eq!(report.attempts, 2);
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = ClientConfig::default().health;
        let policy = RetryPolicy::from(&settings);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(2));
    }
}
