//! Client-visible failure responses.
//!
//! # Responsibilities
//! - Map gateway failures to distinct HTTP status codes
//! - Keep backend error details out of client responses
//!
//! # Design Decisions
//! - Rate limited → 429, circuit open → 503, backend timeout → 504,
//!   backend failure → 502, unknown route → 404, anything else → 500
//! - Every error body carries a stable machine-readable `code`

use std::borrow::Cow;
use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::resilience::BreakerError;

/// Errors surfaced to clients at the dispatcher boundary.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("rate limit exceeded")]
    RateLimited { retry_after: Duration },

    #[error("circuit open for backend `{backend}`")]
    CircuitOpen { backend: String },

    #[error("backend `{backend}` timed out")]
    UpstreamTimeout { backend: String },

    #[error("backend `{backend}` unavailable")]
    UpstreamUnavailable { backend: String },

    #[error("route not found")]
    RouteNotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Translate a breaker outcome for `backend`, logging at the matching level.
    pub fn from_breaker<E: std::fmt::Display>(backend: &str, err: BreakerError<E>) -> Self {
        match err {
            // The breaker already logged these.
            BreakerError::Open(_) => GatewayError::CircuitOpen {
                backend: backend.to_string(),
            },
            BreakerError::Timeout { .. } => GatewayError::UpstreamTimeout {
                backend: backend.to_string(),
            },
            BreakerError::Backend(e) => {
                tracing::warn!(backend = %backend, error = %e, "Upstream call failed");
                GatewayError::UpstreamUnavailable {
                    backend: backend.to_string(),
                }
            }
            BreakerError::UnknownBackend(name) => {
                tracing::error!(backend = %name, "Route points at a backend without a breaker");
                GatewayError::Internal(format!("no breaker for backend `{}`", name))
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RateLimited { .. } => "rate_limited",
            GatewayError::CircuitOpen { .. } => "circuit_open",
            GatewayError::UpstreamTimeout { .. } => "upstream_timeout",
            GatewayError::UpstreamUnavailable { .. } => "upstream_unavailable",
            GatewayError::RouteNotFound => "route_not_found",
            GatewayError::Internal(_) => "internal_error",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            GatewayError::RateLimited { .. } => "Too many requests from this IP",
            GatewayError::CircuitOpen { .. } => "Service temporarily unavailable",
            GatewayError::UpstreamTimeout { .. } => "Service did not respond in time",
            GatewayError::UpstreamUnavailable { .. } => "Service unavailable",
            GatewayError::RouteNotFound => "Route not found",
            GatewayError::Internal(_) => "Internal server error",
        }
    }

    fn backend(&self) -> Option<&str> {
        match self {
            GatewayError::CircuitOpen { backend }
            | GatewayError::UpstreamTimeout { backend }
            | GatewayError::UpstreamUnavailable { backend } => Some(backend),
            _ => None,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "error": self.message(),
            "code": self.code(),
        });
        if let Some(backend) = self.backend() {
            body["service"] = json!(backend);
        }

        let mut response = (self.status(), Json(body)).into_response();

        if let GatewayError::RateLimited { retry_after } = self {
            // Round up so clients never retry before the window ends.
            let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }

        response
    }
}

/// Route name attached to a response for access logs and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLabel(Cow<'static, str>);

impl RouteLabel {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn open_and_timeout_are_distinct() {
        let open = GatewayError::from_breaker::<&str>("order", BreakerError::Open("order".into()));
        let timeout = GatewayError::from_breaker::<&str>(
            "order",
            BreakerError::Timeout {
                backend: "order".into(),
                timeout: Duration::from_secs(3),
            },
        );

        let open = open.into_response();
        let timeout = timeout.into_response();
        assert_eq!(open.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);

        let open = body_json(open).await;
        assert_eq!(open["code"], "circuit_open");
        assert_eq!(open["service"], "order");
        assert_eq!(body_json(timeout).await["code"], "upstream_timeout");
    }

    #[tokio::test]
    async fn backend_error_details_are_not_leaked() {
        let err = GatewayError::from_breaker("order", BreakerError::Backend("db password wrong"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_json(response).await.to_string();
        assert!(!body.contains("password"));
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = GatewayError::RateLimited {
            retry_after: Duration::from_millis(1500),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }
}
