//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),

    #[error("invalid value `{value}` for environment variable {key}")]
    Env { key: String, value: String },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, then apply process
/// environment overrides.
///
/// Without a file the built-in defaults are used.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Apply environment overrides read through `lookup`.
///
/// - `PORT`: listen on `0.0.0.0:<PORT>`
/// - `<NAME>_SERVICE_URL`: base URL of backend `<name>`
/// - `RATE_LIMIT_WINDOW_SECS`, `RATE_LIMIT_MAX_REQUESTS`
/// - `LOG_LEVEL`
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        let port: u16 = parse_env("PORT", &port)?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }

    for backend in &mut config.backends {
        let key = format!("{}_SERVICE_URL", backend.name.to_uppercase().replace('-', "_"));
        if let Some(url) = lookup(&key) {
            tracing::debug!(backend = %backend.name, url = %url, "Backend address overridden from environment");
            backend.address = url;
        }
    }

    if let Some(window) = lookup("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SECS", &window)?;
    }
    if let Some(max) = lookup("RATE_LIMIT_MAX_REQUESTS") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX_REQUESTS", &max)?;
    }
    if let Some(level) = lookup("LOG_LEVEL") {
        config.observability.log_level = level;
    }

    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_port_and_service_urls() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORT", "8088"),
                ("ORDER_SERVICE_URL", "http://10.0.0.7:3003"),
                ("RATE_LIMIT_MAX_REQUESTS", "5"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:8088");
        assert_eq!(config.backends[1].address, "http://10.0.0.7:3003");
        assert_eq!(config.backends[0].address, "http://user-service:3002");
        assert_eq!(config.rate_limit.max_requests, 5);
    }

    #[test]
    fn rejects_unparsable_env_value() {
        let mut config = GatewayConfig::default();
        let err = apply_env_overrides(&mut config, env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ConfigError::Env { ref key, .. } if key == "PORT"));
    }

    #[test]
    fn validation_error_lists_every_problem() {
        let err = ConfigError::Validation(vec![
            ValidationError::NoBackends,
            ValidationError::InvalidRateLimit,
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: no backends configured, rate limit window and max requests must be greater than zero"
        );
    }
}
