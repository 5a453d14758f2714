//! Feature gate resolver
//!
//! Decides per logical feature (`ml.risk`, `whatif.run`, ...) whether a view
//! or action is exposed. The configuration is loaded once per session from
//! the first source that answers:
//!
//! 1. the ops endpoint (`/api/ops/feature-gates`), trusted even when empty;
//! 2. the static `feature-gates.json` shipped with the app;
//! 3. the compiled-in safe defaults.
//!
//! Sources are never merged. Concurrent [`FeatureGateResolver::initialize`]
//! calls share one pending load.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::Utc;
use contracts::shared::feature_gates::{FeatureGate, FeatureGatesConfig};
use futures::future::{FutureExt, LocalBoxFuture, Shared};

use super::config::{ClientConfig, FeatureGatesSettings};
use super::params::Params;
use super::request::RequestPipeline;

/// Reason attached to a key no gate covers
pub const NOT_CONFIGURED: &str = "not configured";

const SAFE_DEFAULT_OFF: &str = "Feature gate service unreachable; disabled by safe default";

/// Where the cached configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSource {
    Remote,
    StaticFallback,
    SafeDefaults,
}

/// Conservative table used when no source answers, and before the first load
/// completes. Everything not listed here resolves to OFF.
pub fn safe_defaults() -> FeatureGatesConfig {
    FeatureGatesConfig::from_gates(vec![
        FeatureGate::on("ops.health").with_reason("Read-only health view"),
        FeatureGate::on("ml.explain").with_reason("Explanations are read from stored results"),
        FeatureGate::off("ml.*", SAFE_DEFAULT_OFF),
        FeatureGate::off("whatif.*", SAFE_DEFAULT_OFF),
        FeatureGate::off("quality.*", SAFE_DEFAULT_OFF),
    ])
    .generated_at(Utc::now())
}

/// Resolves `key` against one configuration.
///
/// An exact key wins. Otherwise the first wildcard in registration order
/// whose prefix (pattern without `.*`) starts `key` is used: with `a.*`
/// registered before `a.b.*`, `a.b.c` resolves through `a.*`. The prefix is
/// matched as plain text, so `ml.*` also covers `mlops.board`.
pub fn lookup(config: &FeatureGatesConfig, key: &str) -> FeatureGate {
    if let Some(gate) = config.gates.get(key) {
        return FeatureGate {
            feature: key.to_string(),
            ..gate.clone()
        };
    }

    if let Some((prefix, gate)) = config.wildcards().find(|(prefix, _)| key.starts_with(*prefix)) {
        log::trace!("feature {} resolved through wildcard {}.*", key, prefix);
        return FeatureGate {
            feature: key.to_string(),
            ..gate.clone()
        };
    }

    FeatureGate::off(key, NOT_CONFIGURED)
}

#[derive(Debug)]
struct LoadedGates {
    config: FeatureGatesConfig,
    source: GateSource,
}

type PendingLoad = Shared<LocalBoxFuture<'static, Rc<LoadedGates>>>;

struct ResolverState {
    pipeline: RequestPipeline,
    settings: FeatureGatesSettings,
    defaults: FeatureGatesConfig,
    loaded: RefCell<Option<Rc<LoadedGates>>>,
    pending: RefCell<Option<PendingLoad>>,
    /// Bumped by `reinitialize`; a load started under an older generation is
    /// not stored.
    generation: Cell<u64>,
}

/// Session-scoped gate cache. Cheap to clone; clones share the cache.
#[derive(Clone)]
pub struct FeatureGateResolver {
    state: Rc<ResolverState>,
}

impl FeatureGateResolver {
    pub fn new(pipeline: RequestPipeline, settings: FeatureGatesSettings) -> Self {
        Self {
            state: Rc::new(ResolverState {
                pipeline,
                settings,
                defaults: safe_defaults(),
                loaded: RefCell::new(None),
                pending: RefCell::new(None),
                generation: Cell::new(0),
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(RequestPipeline::from_config(config), config.feature_gates.clone())
    }

    /// Loads the configuration once. Later calls return immediately;
    /// concurrent calls await the same load. A load superseded by
    /// [`reinitialize`](Self::reinitialize) is discarded and the caller waits
    /// for the newer one.
    pub async fn initialize(&self) {
        while !self.is_initialized() {
            let (load, generation) = self.pending_load();
            let loaded = load.await;

            let state = &self.state;
            if state.generation.get() == generation && state.loaded.borrow().is_none() {
                log::info!(
                    "Feature gates loaded from {:?} ({} entries)",
                    loaded.source,
                    loaded.config.gates.len()
                );
                *state.loaded.borrow_mut() = Some(loaded);
                state.pending.borrow_mut().take();
            }
        }
    }

    /// Drops the cache and loads again.
    pub async fn reinitialize(&self) {
        let state = &self.state;
        state.generation.set(state.generation.get() + 1);
        state.loaded.borrow_mut().take();
        state.pending.borrow_mut().take();
        self.initialize().await;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.loaded.borrow().is_some()
    }

    /// Resolves after making sure the configuration is loaded.
    pub async fn resolve(&self, key: &str) -> FeatureGate {
        self.initialize().await;
        self.resolve_now(key)
    }

    pub async fn is_enabled(&self, key: &str) -> bool {
        self.resolve(key).await.is_enabled()
    }

    /// Resolves against whatever is cached right now; before the first load
    /// completes this answers from the safe defaults.
    pub fn resolve_now(&self, key: &str) -> FeatureGate {
        match self.state.loaded.borrow().as_ref() {
            Some(loaded) => lookup(&loaded.config, key),
            None => lookup(&self.state.defaults, key),
        }
    }

    pub fn is_enabled_now(&self, key: &str) -> bool {
        self.resolve_now(key).is_enabled()
    }

    /// Source of the cached configuration, `None` before the first load.
    pub fn source(&self) -> Option<GateSource> {
        self.state.loaded.borrow().as_ref().map(|l| l.source)
    }

    pub fn snapshot(&self) -> Option<FeatureGatesConfig> {
        self.state.loaded.borrow().as_ref().map(|l| l.config.clone())
    }

    fn pending_load(&self) -> (PendingLoad, u64) {
        let state = &self.state;
        let mut pending = state.pending.borrow_mut();
        let load = pending
            .get_or_insert_with(|| {
                load_gates(state.pipeline.clone(), state.settings.clone())
                    .boxed_local()
                    .shared()
            })
            .clone();
        (load, state.generation.get())
    }
}

async fn load_gates(pipeline: RequestPipeline, settings: FeatureGatesSettings) -> Rc<LoadedGates> {
    match pipeline
        .get::<FeatureGatesConfig>(&settings.remote_path, Params::new())
        .await
    {
        Ok(config) => {
            return Rc::new(LoadedGates {
                config: config.normalized(),
                source: GateSource::Remote,
            })
        }
        Err(e) => log::warn!("Feature gate endpoint unavailable ({}): {}", e.kind, e.message),
    }

    match pipeline
        .get_static::<FeatureGatesConfig>(&settings.fallback_path)
        .await
    {
        Ok(config) => {
            return Rc::new(LoadedGates {
                config: config.normalized(),
                source: GateSource::StaticFallback,
            })
        }
        Err(e) => log::warn!("Static feature gates unavailable ({}): {}", e.kind, e.message),
    }

    log::warn!("Using safe default feature gates");
    Rc::new(LoadedGates {
        config: safe_defaults(),
        source: GateSource::SafeDefaults,
    })
}
