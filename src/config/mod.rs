//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → descriptor.rs (BackendDescriptor per backend, immutable)
//!     → owned by the breaker registry for the process lifetime
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Any invalid backend configuration is fatal at startup

pub mod descriptor;
pub mod loader;
pub mod schema;
pub mod validation;

pub use descriptor::BackendDescriptor;
pub use loader::{load_config, ConfigError};
pub use schema::{
    BackendConfig, GatewayConfig, HealthCheckConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, RouteConfig, SecurityConfig,
};
pub use validation::{validate_config, ValidationError};
