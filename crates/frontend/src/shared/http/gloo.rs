use async_trait::async_trait;
use gloo_net::http::{Request, RequestBuilder};

use super::{HttpRequest, HttpResponse, HttpTransport, Method, TransportError};

/// Browser `fetch` через gloo-net. Timeouts are applied by the pipeline.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTransport;

#[async_trait(?Send)]
impl HttpTransport for GlooTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder: RequestBuilder = match request.method {
            Method::Get => Request::get(&request.url),
            Method::Post => Request::post(&request.url),
            Method::Put => Request::put(&request.url),
            Method::Delete => Request::delete(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let prepared = match request.body {
            Some(body) => builder
                .header("Content-Type", "application/json")
                .body(body)
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?,
            None => builder
                .build()
                .map_err(|e| TransportError::InvalidRequest(e.to_string()))?,
        };

        let response = prepared
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}
