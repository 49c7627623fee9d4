//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to backend:
//!     → registry.rs (look up the backend's breaker)
//!     → circuit_breaker.rs (short-circuit, or admit and track the outcome)
//!     → timeouts.rs (enforce the per-backend deadline)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every backend call has a deadline
//! - No retries inside the breaker; a caller that retries goes back through
//!   the registry so the retry is still subject to circuit state
//! - Circuit breakers prevent cascading failures

pub mod circuit_breaker;
pub mod registry;
pub mod timeouts;

pub use circuit_breaker::{BreakerError, BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use registry::BreakerRegistry;
