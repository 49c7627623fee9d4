//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, request timeout).
    pub listener: ListenerConfig,

    /// Backend service definitions, one circuit breaker each.
    pub backends: Vec<BackendConfig>,

    /// Route definitions mapping path prefixes to backends.
    pub routes: Vec<RouteConfig>,

    /// Per-client admission control.
    pub rate_limit: RateLimitConfig,

    /// Periodic health aggregation.
    pub health_check: HealthCheckConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Response hardening.
    pub security: SecurityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let backends = vec![
            BackendConfig::new("user", "http://user-service:3002"),
            BackendConfig::new("order", "http://order-service:3003"),
            BackendConfig::new("notification", "http://notification-service:3004"),
        ];
        let routes = vec![
            RouteConfig::new("users", "/api/v1/users", "user"),
            RouteConfig::new("orders", "/api/v1/orders", "order"),
            RouteConfig::new("notifications", "/api/v1/notifications", "notification"),
        ];

        Self {
            listener: ListenerConfig::default(),
            backends,
            routes,
            rate_limit: RateLimitConfig::default(),
            health_check: HealthCheckConfig::default(),
            observability: ObservabilityConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Upper bound on total request handling time in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Backend service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier, also the circuit breaker name.
    pub name: String,

    /// Base URL (e.g., "http://order-service:3003").
    pub address: String,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Failure percentage (1-100) at which the breaker opens.
    #[serde(default = "default_error_threshold")]
    pub error_threshold_percentage: u8,

    /// How long an open breaker waits before allowing a trial call, in milliseconds.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,

    /// Path probed by the health aggregator.
    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// Minimum calls in the evaluation window before the failure ratio is considered.
    #[serde(default = "default_volume_threshold")]
    pub volume_threshold: u32,

    /// Length of the fixed failure evaluation window in milliseconds.
    #[serde(default = "default_rolling_window_ms")]
    pub rolling_window_ms: u64,
}

impl BackendConfig {
    /// A backend with every tunable at its default.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            timeout_ms: default_timeout_ms(),
            error_threshold_percentage: default_error_threshold(),
            reset_timeout_ms: default_reset_timeout_ms(),
            probe_path: default_probe_path(),
            volume_threshold: default_volume_threshold(),
            rolling_window_ms: default_rolling_window_ms(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    3_000
}

fn default_error_threshold() -> u8 {
    50
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

fn default_probe_path() -> String {
    "/health".to_string()
}

fn default_volume_threshold() -> u32 {
    5
}

fn default_rolling_window_ms() -> u64 {
    10_000
}

/// Route configuration mapping a path prefix to a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Path prefix to match.
    pub path_prefix: String,

    /// Backend name to forward to.
    pub backend: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

impl RouteConfig {
    pub fn new(
        name: impl Into<String>,
        path_prefix: impl Into<String>,
        backend: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path_prefix: path_prefix.into(),
            backend: backend.into(),
            priority: 0,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Maximum admitted requests per client within one window.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 15 * 60,
            max_requests: 100,
        }
    }
}

/// Periodic health aggregation.
///
/// `GET /health` always aggregates on demand; this only controls the
/// background loop.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Run the aggregator on a timer.
    pub enabled: bool,

    /// Interval between rounds in seconds.
    pub interval_secs: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Expose `/metrics`.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
            metrics_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Add hardening response headers.
    pub enable_headers: bool,
    /// Allow cross-origin requests from any origin.
    pub permissive_cors: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            permissive_cors: true,
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
