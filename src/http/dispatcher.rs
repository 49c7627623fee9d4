//! Per-request orchestration of admission, breaker and upstream.
//!
//! # Data Flow
//! ```text
//! handle(identity, backend, request)
//!     → admit: RateLimiter.check(identity)   denied → 429 (breakers untouched)
//!     → forward: BreakerRegistry.call(backend)   open → 503
//!         → Upstream.send(request)        timeout → 504, failure/5xx → 502
//!     → backend response (2xx-4xx) passed through
//! ```
//!
//! # Design Decisions
//! - The server runs `admit` as a router-wide middleware, so operator
//!   endpoints count against the same window, then calls `forward`
//! - The breaker settles when response headers arrive; the streamed body is
//!   then bounded by an idle timeout of the backend's own timeout between
//!   frames, and a stall surfaces as a body error to the client

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower_http::timeout::TimeoutBody;

use crate::http::response::GatewayError;
use crate::http::upstream::{Upstream, UpstreamError};
use crate::observability::metrics;
use crate::resilience::{BreakerError, BreakerRegistry};
use crate::security::RateLimiter;

/// Owns the shared limiter, breakers and upstream transport.
#[derive(Clone)]
pub struct GatewayDispatcher {
    limiter: Arc<RateLimiter>,
    registry: Arc<BreakerRegistry>,
    upstream: Arc<dyn Upstream>,
}

impl GatewayDispatcher {
    pub fn new(
        limiter: Arc<RateLimiter>,
        registry: Arc<BreakerRegistry>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            limiter,
            registry,
            upstream,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Admit, then forward `request` to `backend` on behalf of `identity`.
    pub async fn handle(&self, identity: &str, backend: &str, request: Request<Body>) -> Response {
        let result = match self.admit(identity) {
            Ok(()) => self.forward(backend, request).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(response) => response,
            Err(err) => err.into_response(),
        }
    }

    /// Count one request from `identity` against its window.
    pub fn admit(&self, identity: &str) -> Result<(), GatewayError> {
        let admission = self.limiter.check(identity);
        if admission.allowed {
            return Ok(());
        }

        tracing::warn!(client = %identity, "Rate limit exceeded");
        metrics::record_rate_limited();
        Err(GatewayError::RateLimited {
            retry_after: admission.reset_after,
        })
    }

    /// Send an already admitted request through `backend`'s breaker.
    pub async fn forward(&self, backend: &str, request: Request<Body>) -> Result<Response, GatewayError> {
        let Some(descriptor) = self.registry.descriptor(backend) else {
            return Err(GatewayError::from_breaker::<UpstreamError>(
                backend,
                BreakerError::UnknownBackend(backend.to_string()),
            ));
        };

        let upstream = &self.upstream;
        let idle_timeout = descriptor.timeout;
        self.registry
            .call(backend, move || {
                let sent = upstream.send(descriptor, request);
                async move {
                    let response = sent.await?;
                    let status = response.status();
                    if status.is_server_error() {
                        return Err(UpstreamError::Status(status));
                    }
                    Ok(response.map(|body| Body::new(TimeoutBody::new(idle_timeout, body))))
                }
            })
            .await
            .map_err(|err| GatewayError::from_breaker(backend, err))
    }
}
