//! HTTP middleware applied to every endpoint router.
//!
//! Per-request tracing (only with `options.debug`) wraps CORS handling.
//! Body size limits are enforced while buffering the request, so oversized
//! bodies get the same JSON error body as every other failure.

use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::config::EndpointOptions;

/// Wraps `router` with the transport-level middleware for `options`.
#[must_use]
pub fn apply_http_layers(router: Router, options: &EndpointOptions) -> Router {
    let router = router.layer(build_cors_layer(&options.cors_origins));

    if options.debug {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Builds the CORS layer from the configured list of allowed origins.
///
/// A wildcard `"*"` allows any origin. Otherwise each origin string is
/// parsed into an explicit allowlist and unparseable entries are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::post;
    use tower::ServiceExt;

    use super::*;

    fn echo_router(options: &EndpointOptions) -> Router {
        let router = Router::new().route(
            "/echo",
            post(|body: axum::body::Bytes| async move { body }),
        );
        apply_http_layers(router, options)
    }

    #[tokio::test]
    async fn cors_echoes_only_listed_origins() {
        let options = EndpointOptions {
            cors_origins: vec!["https://example.com".to_string(), "not a url\n".to_string()],
            ..EndpointOptions::default()
        };
        let request = |origin: &str| {
            Request::post("/echo")
                .header("origin", origin)
                .body(Body::from("x"))
                .unwrap()
        };

        let allowed = echo_router(&options).oneshot(request("https://example.com")).await.unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "https://example.com"
        );

        let denied = echo_router(&options).oneshot(request("https://other.com")).await.unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}
