//! Synthetic responses served when both network and cache miss

use crate::client::HttpResponse;

const PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200"><rect width="200" height="200" fill="#f0f0f0"/><text x="100" y="105" font-family="sans-serif" font-size="14" fill="#999" text-anchor="middle">Offline</text></svg>"##;

const OFFLINE_HTML: &str = "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Offline</title></head><body><h1>You are offline</h1><p>This page is not available without a connection.</p></body></html>";

/// Placeholder image for image requests
pub fn placeholder_image() -> HttpResponse {
    HttpResponse::new(200, PLACEHOLDER_SVG)
        .with_header("content-type", "image/svg+xml")
        .with_header("cache-control", "no-store")
}

/// Used when the precached offline page is missing too
pub fn offline_html() -> HttpResponse {
    HttpResponse::new(503, OFFLINE_HTML).with_header("content-type", "text/html; charset=utf-8")
}

/// Machine-readable 503 for everything else
pub fn service_unavailable() -> HttpResponse {
    let body = serde_json::json!({
        "error": "Offline - content not available",
        "offline": true,
    });
    HttpResponse::new(503, body.to_string()).with_header("content-type", "application/json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_unavailable_flags_offline() {
        let response = service_unavailable();
        assert_eq!(response.status, 503);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["offline"], true);
    }

    #[test]
    fn test_placeholder_is_svg() {
        let response = placeholder_image();
        assert_eq!(response.status, 200);
        assert_eq!(response.header("content-type"), Some("image/svg+xml"));
        assert!(response.text().starts_with("<svg"));
    }
}
