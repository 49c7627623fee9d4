//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Emit one access log line and request metrics per request
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, pretty format for development
//! - Log level configurable via config and environment (`RUST_LOG` wins)

use std::time::Instant;

use axum::{
    body::Body,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::http::response::RouteLabel;
use crate::observability::metrics;

/// Install the global tracing subscriber.
pub fn init(config: &ObservabilityConfig) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "edge_gateway={level},tower_http={level}",
            level = config.log_level
        ))
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer()).try_init(),
    }
}

/// Access log middleware.
///
/// The route label comes from the [`RouteLabel`] extension the handler puts
/// on its response, so unmatched paths never become metric labels.
pub async fn access_log(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let route = response
        .extensions()
        .get::<RouteLabel>()
        .map(RouteLabel::as_str)
        .unwrap_or("unmatched");

    metrics::record_request(method.as_str(), route, status, start);

    tracing::info!(
        method = %method,
        url = %uri,
        status_code = status,
        route = route,
        duration_ms = start.elapsed().as_millis() as u64,
        user_agent = %user_agent,
        "HTTP Request"
    );

    response
}
