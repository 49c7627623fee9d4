//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, operator endpoints)
//!     → request.rs (request ID)
//!     → [routing layer picks the backend]
//!     → dispatcher.rs (rate limit → breaker → upstream.rs)
//!     → response.rs (failure → status code + JSON body)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;
pub mod upstream;

pub use dispatcher::GatewayDispatcher;
pub use request::X_REQUEST_ID;
pub use response::{GatewayError, RouteLabel};
pub use server::{AppState, GatewayServer};
pub use upstream::{HttpUpstream, Upstream, UpstreamError};
