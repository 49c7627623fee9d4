//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (request volume, latency, admission, breaker state)
//! - Install the Prometheus recorder rendered on `/metrics`
//! - Track per-backend and per-route metrics
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): rejected admissions
//! - `gateway_breaker_transitions_total` (counter): breaker state changes
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_backend_health` (gauge): 1=healthy, 0=unhealthy
//!
//! Without an installed recorder every call here is a no-op, which keeps
//! unit tests free of global state.

use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

use crate::resilience::circuit_breaker::CircuitState;

const REQUESTS_TOTAL: &str = "gateway_requests_total";
const REQUEST_DURATION: &str = "gateway_request_duration_seconds";
const RATE_LIMITED_TOTAL: &str = "gateway_rate_limited_total";
const BREAKER_TRANSITIONS: &str = "gateway_breaker_transitions_total";
const BREAKER_STATE: &str = "gateway_breaker_state";
const BACKEND_HEALTH: &str = "gateway_backend_health";

/// Latency buckets in seconds, tuned around the default 3s backend timeout.
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 3.0, 5.0, 10.0];

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), LATENCY_BUCKETS)?
        .install_recorder()?;

    describe_counter!(REQUESTS_TOTAL, "Total number of HTTP requests");
    describe_histogram!(REQUEST_DURATION, Unit::Seconds, "Duration of HTTP requests in seconds");
    describe_counter!(RATE_LIMITED_TOTAL, "Requests rejected by admission control");
    describe_counter!(BREAKER_TRANSITIONS, "Circuit breaker state transitions");
    describe_gauge!(BREAKER_STATE, "Circuit breaker state (0=closed, 1=half-open, 2=open)");
    describe_gauge!(BACKEND_HEALTH, "Backend health from the last aggregation (1=healthy)");

    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// Record a completed request.
pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("route", route.to_string()),
        ("status", status.to_string()),
    ];
    counter!(REQUESTS_TOTAL, &labels).increment(1);
    histogram!(REQUEST_DURATION, &labels).record(start.elapsed().as_secs_f64());
}

/// Record a request rejected by the rate limiter.
pub fn record_rate_limited() {
    counter!(RATE_LIMITED_TOTAL).increment(1);
}

/// Record a breaker moving from `from` to `to`.
pub fn record_breaker_transition(backend: &str, from: CircuitState, to: CircuitState) {
    counter!(
        BREAKER_TRANSITIONS,
        "backend" => backend.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(backend, to);
}

/// Publish the current state of `backend`'s breaker.
pub fn record_breaker_state(backend: &str, state: CircuitState) {
    gauge!(BREAKER_STATE, "backend" => backend.to_string()).set(state_value(state));
}

/// Record the outcome of the latest probe for `backend`.
pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!(BACKEND_HEALTH, "backend" => backend.to_string()).set(if healthy { 1.0 } else { 0.0 });
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}
