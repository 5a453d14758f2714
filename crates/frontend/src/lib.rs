pub mod shared;

pub use shared::api_error::{classify, ApiFailure, ErrorKind, NormalizedError};
pub use shared::feature_gates::FeatureGateResolver;
pub use shared::params::{sanitize, ParamValue, Params};
pub use shared::request::{ApiRequest, RequestPipeline};
pub use shared::session::Session;
pub use shared::ui_state::{derive, UiState, ViewPhase};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::wasm_bindgen;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    // initializes logging using the `log` crate
    _ = console_log::init_with_level(log::Level::Debug);
    console_error_panic_hook::set_once();
}
