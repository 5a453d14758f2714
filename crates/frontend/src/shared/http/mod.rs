//! Transport seam between the request pipeline and the HTTP stack.
//!
//! The browser build sends through `gloo-net`, native builds through
//! `reqwest`. Both only move bytes: status handling and classification live
//! in [`crate::shared::request`].

#[cfg(target_arch = "wasm32")]
mod gloo;
#[cfg(not(target_arch = "wasm32"))]
mod native;
#[cfg(test)]
pub(crate) mod testing;

use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[cfg(target_arch = "wasm32")]
pub use gloo::GlooTransport;
#[cfg(not(target_arch = "wasm32"))]
pub use native::ReqwestTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

/// Fully resolved outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute or origin-relative URL including the query string
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("timeout of {}ms exceeded", .0.as_millis())]
    Timeout(Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Single-threaded transport: futures are not `Send` in the browser.
#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport of the current target.
pub fn default_transport() -> Rc<dyn HttpTransport> {
    #[cfg(target_arch = "wasm32")]
    {
        Rc::new(GlooTransport)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Rc::new(ReqwestTransport::new())
    }
}
