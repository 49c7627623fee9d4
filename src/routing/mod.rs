//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate prefix)
//!     → Return: matched Route (backend name) or NoMatch
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Sort by priority, then prefix length
//!     → Freeze as immutable Router
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same route
//! - First match wins

pub mod matcher;
pub mod router;

pub use router::{Route, Router};
