//! Edge gateway library.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                   EDGE GATEWAY                    │
//!                         │                                                   │
//!   Client Request        │  ┌─────────┐   ┌─────────┐   ┌─────────────────┐  │
//!   ──────────────────────┼─▶│  http   │──▶│ routing │──▶│   dispatcher    │  │
//!                         │  │ server  │   │  table  │   │                 │  │
//!                         │  └─────────┘   └─────────┘   │ rate limiter    │  │
//!                         │                              │   → breaker     │  │
//!                         │                              │   → upstream ───┼──┼──▶ Backend
//!   Client Response       │                              └─────────────────┘  │
//!   ◀─────────────────────┼──────────────────────────────────────────────────  │
//!                         │                                                   │
//!                         │  /health → health aggregator → breaker → probe    │
//!                         │  /breakers, /metrics → operator views             │
//!                         │                                                   │
//!                         │  Cross-cutting: config, observability, security,  │
//!                         │  lifecycle (startup/shutdown)                     │
//!                         └──────────────────────────────────────────────────┘
//! ```

pub mod clock;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
