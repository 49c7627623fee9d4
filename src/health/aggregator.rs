//! Aggregated backend health.
//!
//! # Responsibilities
//! - Probe every backend concurrently through its breaker
//! - Collect every outcome into one snapshot
//! - Optionally repeat on an interval until shutdown
//!
//! # Design Decisions
//! - Probes are real breaker calls: an open breaker short-circuits its probe
//!   and an unhealthy probe counts toward tripping
//! - Each probe is bounded by its backend's timeout, so a round takes as
//!   long as the slowest probe, not the sum
//! - No retries; one probe per backend per round

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::BackendDescriptor;
use crate::http::upstream::{Upstream, UpstreamError};
use crate::observability::metrics;
use crate::resilience::BreakerRegistry;

const PROBE_USER_AGENT: &str = "edge-gateway-health-check";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of one probe round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: HealthStatus,
    pub services: BTreeMap<String, HealthStatus>,
}

impl HealthSnapshot {
    fn from_results(results: impl IntoIterator<Item = (String, HealthStatus)>) -> Self {
        let services: BTreeMap<_, _> = results.into_iter().collect();
        let status = if services.values().all(|s| *s == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        Self { status, services }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

pub struct HealthAggregator {
    registry: Arc<BreakerRegistry>,
    upstream: Arc<dyn Upstream>,
}

impl HealthAggregator {
    pub fn new(registry: Arc<BreakerRegistry>, upstream: Arc<dyn Upstream>) -> Self {
        Self { registry, upstream }
    }

    /// Probe all backends concurrently and wait for every result.
    pub async fn check_all(&self) -> HealthSnapshot {
        let probes = self.registry.descriptors().map(|descriptor| async move {
            let status = self.probe(descriptor).await;
            metrics::record_backend_health(&descriptor.name, status == HealthStatus::Healthy);
            (descriptor.name.clone(), status)
        });

        HealthSnapshot::from_results(join_all(probes).await)
    }

    async fn probe(&self, descriptor: &BackendDescriptor) -> HealthStatus {
        let request = match Request::get(descriptor.probe_path.as_str())
            .header(header::USER_AGENT, PROBE_USER_AGENT)
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(backend = %descriptor.name, error = %e, "Failed to build health probe");
                return HealthStatus::Unhealthy;
            }
        };

        let upstream = &self.upstream;
        let result = self
            .registry
            .call(&descriptor.name, move || {
                let sent = upstream.send(descriptor, request);
                async move {
                    let response = sent.await?;
                    if !response.status().is_success() {
                        return Err(UpstreamError::Status(response.status()));
                    }
                    Ok(())
                }
            })
            .await;

        match result {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => {
                tracing::warn!(backend = %descriptor.name, error = %e, "Health probe failed");
                HealthStatus::Unhealthy
            }
        }
    }

    /// Probe on `interval` until shutdown.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?interval, backends = self.registry.len(), "Health monitor starting");

        let mut ticker = time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let snapshot = self.check_all().await;
                    tracing::debug!(status = ?snapshot.status, "Health round complete");
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BackendConfig;
    use crate::http::upstream::fake::{Behavior, FakeUpstream};
    use crate::resilience::CircuitState;

    fn setup(names: &[&str]) -> (HealthAggregator, Arc<BreakerRegistry>, Arc<FakeUpstream>) {
        let descriptors = names
            .iter()
            .map(|name| {
                let mut config = BackendConfig::new(*name, format!("http://{}:80", name));
                config.volume_threshold = 1;
                BackendDescriptor::try_from(&config).unwrap()
            })
            .collect();
        let registry = Arc::new(BreakerRegistry::new(descriptors, Arc::new(ManualClock::new())).unwrap());
        let upstream = Arc::new(FakeUpstream::new());
        let aggregator = HealthAggregator::new(registry.clone(), upstream.clone());
        (aggregator, registry, upstream)
    }

    #[tokio::test]
    async fn all_healthy() {
        let (aggregator, _, upstream) = setup(&["user", "order"]);
        let snapshot = aggregator.check_all().await;

        assert!(snapshot.is_healthy());
        assert_eq!(snapshot.services.len(), 2);
        assert_eq!(upstream.calls("user"), 1);
    }

    #[tokio::test]
    async fn non_success_probe_is_unhealthy() {
        let (aggregator, registry, upstream) = setup(&["user", "order"]);
        upstream.set("order", Behavior::Respond(404));

        let snapshot = aggregator.check_all().await;
        assert_eq!(snapshot.status, HealthStatus::Unhealthy);
        assert_eq!(snapshot.services["user"], HealthStatus::Healthy);
        assert_eq!(snapshot.services["order"], HealthStatus::Unhealthy);
        assert_eq!(registry.breaker("order").unwrap().state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn round_takes_as_long_as_slowest_probe() {
        let (aggregator, registry, upstream) = setup(&["a", "b", "c"]);

        let tripped: Result<(), _> = registry.call("b", || async { Err::<(), _>("down") }).await;
        assert!(tripped.is_err());
        assert_eq!(registry.breaker("b").unwrap().state(), CircuitState::Open);
        upstream.set("c", Behavior::Hang(Duration::from_secs(60)));

        let start = time::Instant::now();
        let snapshot = aggregator.check_all().await;
        let elapsed = start.elapsed();

        assert_eq!(snapshot.services["a"], HealthStatus::Healthy);
        assert_eq!(snapshot.services["b"], HealthStatus::Unhealthy);
        assert_eq!(snapshot.services["c"], HealthStatus::Unhealthy);
        assert!(!snapshot.is_healthy());
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
        assert_eq!(upstream.calls("b"), 0);
    }

    #[tokio::test]
    async fn serializes_lowercase() {
        let (aggregator, _, _) = setup(&["user"]);
        let json = serde_json::to_value(aggregator.check_all().await).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["services"]["user"], "healthy");
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_loop_stops_on_shutdown() {
        let (aggregator, _, upstream) = setup(&["user"]);
        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(Arc::new(aggregator).run(Duration::from_secs(30), rx));

        time::sleep(Duration::from_secs(61)).await;
        tx.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(upstream.calls("user"), 3);
    }
}
