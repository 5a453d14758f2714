pub mod api_error;
pub mod api_utils;
pub mod config;
pub mod feature_gates;
pub mod health;
pub mod http;
pub mod params;
pub mod request;
pub mod session;
pub mod timer;
pub mod ui_state;
