//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (per-client admission, checked by the dispatcher)
//!     → body limit (tower-http, wired in the server)
//!     → Pass to routing
//!
//! Outgoing response:
//!     → headers.rs (hardening headers, CORS)
//! ```
//!
//! # Design Decisions
//! - Admission control runs before any backend is contacted
//! - A rejected admission never touches breaker or health state
//! - No trust in client input

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{Admission, RateLimiter};
