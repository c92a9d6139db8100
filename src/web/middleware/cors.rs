//! CORS configuration.

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer.
///
/// With explicit origins, credentials (the CSRF cookie) are allowed and the
/// CSRF header is exposed to preflight. Without origins the layer is
/// permissive and credential-less, for local development.
pub fn create_cors_layer(origins: &[String], csrf_header: &str) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::OPTIONS,
    ];

    let parsed_origins: Vec<HeaderValue> =
        origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed_origins.is_empty() {
        return CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(Any)
            .allow_origin(Any);
    }

    let mut headers = vec![AUTHORIZATION, CONTENT_TYPE, ACCEPT];
    if let Ok(name) = HeaderName::from_bytes(csrf_header.as_bytes()) {
        headers.push(name);
    }

    CorsLayer::new()
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(true)
        .allow_origin(parsed_origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::util::ServiceExt;

    #[test]
    fn test_create_cors_layer_empty_origins() {
        let _layer = create_cors_layer(&[], "x-csrf-token");
    }

    #[tokio::test]
    async fn test_preflight_allows_csrf_header() {
        let app = Router::new()
            .route("/api/auth/logout", get(|| async { "OK" }))
            .layer(create_cors_layer(
                &["https://app.example.com".to_string()],
                "x-csrf-token",
            ));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/auth/logout")
                    .header("Origin", "https://app.example.com")
                    .header("Access-Control-Request-Method", "POST")
                    .header("Access-Control-Request-Headers", "x-csrf-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let allowed = response
            .headers()
            .get("access-control-allow-headers")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(allowed.contains("x-csrf-token"));
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-credentials")
                .unwrap(),
            "true"
        );
    }
}
