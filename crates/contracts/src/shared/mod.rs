pub mod backend_payload;
pub mod feature_gates;
