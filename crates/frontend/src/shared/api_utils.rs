//! API utilities for frontend-backend communication
//!
//! Provides helper functions for constructing API URLs and checking that a
//! path has the shape every backend route has (`/api/...`).

/// Get the base URL for API requests
///
/// A configured `base_url` wins. Otherwise, in the browser, the origin of the
/// current page is used; natively the result is empty (origin-relative URLs).
///
/// # Returns
/// - API base URL like "http://localhost:3000" or "https://plant.example.com"
/// - Empty string if neither is available
pub fn api_base(configured: &str) -> String {
    let configured = configured.trim_end_matches('/');
    if !configured.is_empty() {
        return configured.to_string();
    }
    page_origin().unwrap_or_default()
}

#[cfg(target_arch = "wasm32")]
fn page_origin() -> Option<String> {
    let location = web_sys::window()?.location();
    let protocol = location.protocol().unwrap_or_else(|_| "http:".to_string());
    let host = location.host().ok()?;
    Some(format!("{}//{}", protocol, host))
}

#[cfg(not(target_arch = "wasm32"))]
fn page_origin() -> Option<String> {
    None
}

/// Build a full URL from a base, a path and an already encoded query string
///
/// # Example
/// ```
/// use frontend::shared::api_utils::api_url;
/// let url = api_url("http://localhost:3000", "/api/prodplan/orders", "plant=P1");
/// assert_eq!(url, "http://localhost:3000/api/prodplan/orders?plant=P1");
/// ```
pub fn api_url(base: &str, path: &str, query: &str) -> String {
    if query.is_empty() {
        format!("{}{}", base, path)
    } else {
        format!("{}{}?{}", base, path, query)
    }
}

/// Checks that `path` is a well-formed API path under `prefix`.
///
/// Rejects paths without the prefix, with the prefix repeated
/// (`/api/api/...`), and with empty, `undefined` or `null` segments.
pub fn validate_api_path(path: &str, prefix: &str) -> Result<(), String> {
    let route = path.split('?').next().unwrap_or(path);
    let Some(rest) = route.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) else {
        return Err(format!("API path must start with {}/: {}", prefix, path));
    };

    let prefix_segments = format!("/{}/", prefix.trim_matches('/'));
    if format!("/{}/", rest).contains(&prefix_segments) {
        return Err(format!("API path repeats the {} prefix: {}", prefix, path));
    }

    let route_part = rest.strip_suffix('/').unwrap_or(rest);
    if route_part.is_empty() {
        return Err(format!("API path has no route after {}: {}", prefix, path));
    }
    for segment in route_part.split('/') {
        match segment {
            "" => return Err(format!("API path has an empty segment: {}", path)),
            "undefined" | "null" => {
                return Err(format!("API path has an {:?} segment: {}", segment, path))
            }
            _ => {}
        }
    }
    Ok(())
}
