//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health, or periodic timer (health_check.enabled)
//!     → aggregator.rs: one probe per backend, concurrently
//!     → each probe runs through that backend's circuit breaker
//!     → HealthSnapshot { status, services }
//! ```
//!
//! # Design Decisions
//! - Overall status is healthy only when every backend is healthy
//! - Health is derived on demand; there is no separate health state machine,
//!   the breakers already carry each backend's recent history

pub mod aggregator;

pub use aggregator::{HealthAggregator, HealthSnapshot, HealthStatus};
