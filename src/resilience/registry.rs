//! Per-backend breaker registry.
//!
//! # Responsibilities
//! - Own exactly one circuit breaker per configured backend
//! - Route every backend call through that backend's breaker
//! - Expose breaker state for operators
//!
//! # Design Decisions
//! - Map is built once at startup and never mutated (lock-free lookups)
//! - Each breaker synchronizes itself; no lock spans backends

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::clock::Clock;
use crate::config::{BackendDescriptor, ValidationError};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{
    BreakerError, BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState,
};

/// A backend descriptor paired with its breaker.
#[derive(Debug)]
struct Entry {
    descriptor: BackendDescriptor,
    breaker: Arc<CircuitBreaker>,
}

/// Owns the fixed set of breakers, keyed by backend name.
#[derive(Debug)]
pub struct BreakerRegistry {
    entries: HashMap<String, Entry>,
    /// Configuration order, used for stable reporting.
    order: Vec<String>,
}

impl BreakerRegistry {
    /// Build one closed breaker per descriptor.
    pub fn new(descriptors: Vec<BackendDescriptor>, clock: Arc<dyn Clock>) -> Result<Self, ValidationError> {
        let mut entries = HashMap::with_capacity(descriptors.len());
        let mut order = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if entries.contains_key(&descriptor.name) {
                return Err(ValidationError::DuplicateBackend(descriptor.name));
            }

            let breaker = Arc::new(CircuitBreaker::new(
                descriptor.name.clone(),
                BreakerSettings::from(&descriptor),
                clock.clone(),
            ));

            tracing::debug!(
                backend = %descriptor.name,
                address = %descriptor.base_url,
                timeout = ?descriptor.timeout,
                error_threshold = descriptor.error_threshold_percentage,
                "Circuit breaker registered"
            );

            metrics::record_breaker_state(&descriptor.name, CircuitState::Closed);

            order.push(descriptor.name.clone());
            entries.insert(descriptor.name.clone(), Entry { descriptor, breaker });
        }

        Ok(Self { entries, order })
    }

    /// Run `operation` through the breaker for `backend`.
    pub async fn call<F, Fut, T, E>(&self, backend: &str, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.entries.get(backend) {
            Some(entry) => entry.breaker.execute(operation).await,
            None => Err(BreakerError::UnknownBackend(backend.to_string())),
        }
    }

    pub fn breaker(&self, backend: &str) -> Option<&Arc<CircuitBreaker>> {
        self.entries.get(backend).map(|entry| &entry.breaker)
    }

    pub fn descriptor(&self, backend: &str) -> Option<&BackendDescriptor> {
        self.entries.get(backend).map(|entry| &entry.descriptor)
    }

    /// Descriptors in configuration order.
    pub fn descriptors(&self) -> impl Iterator<Item = &BackendDescriptor> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|entry| &entry.descriptor)
    }

    /// Breaker snapshots in configuration order.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        self.order
            .iter()
            .filter_map(|name| self.entries.get(name))
            .map(|entry| entry.breaker.snapshot())
            .collect()
    }

    /// Force `backend`'s breaker closed and return its fresh snapshot.
    pub fn reset(&self, backend: &str) -> Option<BreakerSnapshot> {
        let breaker = self.breaker(backend)?;
        breaker.reset();
        tracing::info!(backend = %backend, "Circuit breaker reset by operator");
        Some(breaker.snapshot())
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
