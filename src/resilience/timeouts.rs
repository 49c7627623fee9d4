//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with a deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - The wrapped future is dropped at the deadline, so a late completion is
//!   never observed

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// The deadline passed before the operation completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Run `operation` with a deadline of `limit`.
pub async fn with_timeout<F>(limit: Duration, operation: F) -> Result<F::Output, TimedOut>
where
    F: Future,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| TimedOut(limit))
}
