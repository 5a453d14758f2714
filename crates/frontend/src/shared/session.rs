//! Per-session client context: one pipeline, one gate cache, one health
//! probe, built from one [`ClientConfig`]. The app provides it to views;
//! tests build as many independent sessions as they need.

use std::rc::Rc;

use super::config::ClientConfig;
use super::feature_gates::FeatureGateResolver;
use super::health::HealthProbe;
use super::http::{default_transport, HttpTransport};
use super::request::RequestPipeline;

#[derive(Clone)]
pub struct Session {
    pub config: Rc<ClientConfig>,
    pub pipeline: RequestPipeline,
    pub gates: FeatureGateResolver,
    pub health: HealthProbe,
}

impl Session {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, default_transport())
    }

    pub fn with_transport(config: ClientConfig, transport: Rc<dyn HttpTransport>) -> Self {
        let pipeline = RequestPipeline::new(transport, &config.api);
        let gates = FeatureGateResolver::new(pipeline.clone(), config.feature_gates.clone());
        let health = HealthProbe::new(pipeline.clone(), &config.health);
        Self {
            config: Rc::new(config),
            pipeline,
            gates,
            health,
        }
    }

    /// Loads feature gates ahead of the first view that needs them.
    pub async fn warm_up(&self) {
        self.gates.initialize().await;
    }
}
