//! Response hardening headers.
//!
//! # Responsibilities
//! - Add browser hardening headers to every response
//! - Allow cross-origin requests when configured
//!
//! # Design Decisions
//! - Headers are only added when the backend did not set them itself
//! - CORS is permissive; the gateway carries no credentials

use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

/// Hardening headers and their values.
fn hardening_headers() -> [(HeaderName, HeaderValue); 6] {
    [
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ),
        (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
    ]
}

/// Wrap `router` with the configured security layers.
pub fn apply<S>(router: Router<S>, config: &SecurityConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let mut router = router;

    if config.enable_headers {
        for (name, value) in hardening_headers() {
            router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
        }
    }

    if config.permissive_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}
