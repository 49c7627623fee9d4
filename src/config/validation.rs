//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backends)
//! - Validate value ranges (timeouts > 0, thresholds within 1..=100)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<Vec<BackendDescriptor>, Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::descriptor::BackendDescriptor;
use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),

    #[error("listener request timeout must be greater than zero")]
    ZeroRequestTimeout,

    #[error("no backends configured")]
    NoBackends,

    #[error("backend name must not be empty")]
    EmptyBackendName,

    #[error("duplicate backend `{0}`")]
    DuplicateBackend(String),

    #[error("backend `{backend}` has an invalid address: {reason}")]
    InvalidAddress { backend: String, reason: String },

    #[error("backend `{backend}`: {field} must be greater than zero")]
    ZeroDuration { backend: String, field: &'static str },

    #[error("backend `{backend}`: error threshold {value}% is outside 1..=100")]
    ThresholdOutOfRange { backend: String, value: u8 },

    #[error("backend `{0}`: probe path must start with `/`")]
    InvalidProbePath(String),

    #[error("route `{route}` references unknown backend `{backend}`")]
    UnknownRouteBackend { route: String, backend: String },

    #[error("route `{0}`: path prefix must start with `/`")]
    InvalidRoutePrefix(String),

    #[error("rate limit window and max requests must be greater than zero")]
    InvalidRateLimit,

    #[error("health check interval must be greater than zero")]
    InvalidHealthInterval,
}

/// Validate the configuration and derive backend descriptors from it.
pub fn validate_config(config: &GatewayConfig) -> Result<Vec<BackendDescriptor>, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut descriptors = Vec::with_capacity(config.backends.len());

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for backend in &config.backends {
        if backend.name.is_empty() {
            errors.push(ValidationError::EmptyBackendName);
            continue;
        }
        if !seen.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        if backend.timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration {
                backend: backend.name.clone(),
                field: "timeout_ms",
            });
        }
        if backend.reset_timeout_ms == 0 {
            errors.push(ValidationError::ZeroDuration {
                backend: backend.name.clone(),
                field: "reset_timeout_ms",
            });
        }
        if backend.rolling_window_ms == 0 {
            errors.push(ValidationError::ZeroDuration {
                backend: backend.name.clone(),
                field: "rolling_window_ms",
            });
        }
        if !(1..=100).contains(&backend.error_threshold_percentage) {
            errors.push(ValidationError::ThresholdOutOfRange {
                backend: backend.name.clone(),
                value: backend.error_threshold_percentage,
            });
        }
        if !backend.probe_path.starts_with('/') {
            errors.push(ValidationError::InvalidProbePath(backend.name.clone()));
        }

        match BackendDescriptor::try_from(backend) {
            Ok(descriptor) => descriptors.push(descriptor),
            Err(e) => errors.push(e),
        }
    }

    for route in &config.routes {
        if !route.path_prefix.starts_with('/') {
            errors.push(ValidationError::InvalidRoutePrefix(route.name.clone()));
        }
        if !seen.contains(route.backend.as_str()) {
            errors.push(ValidationError::UnknownRouteBackend {
                route: route.name.clone(),
                backend: route.backend.clone(),
            });
        }
    }

    if config.rate_limit.window_secs == 0 || config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::InvalidRateLimit);
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::InvalidHealthInterval);
    }

    if errors.is_empty() {
        Ok(descriptors)
    } else {
        Err(errors)
    }
}
