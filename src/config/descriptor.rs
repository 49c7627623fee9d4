//! Validated, immutable backend descriptors.

use std::time::Duration;
use url::Url;

use crate::config::schema::BackendConfig;
use crate::config::validation::ValidationError;

/// Static description of one backend, fixed after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub name: String,
    pub base_url: Url,
    pub timeout: Duration,
    pub error_threshold_percentage: u8,
    pub reset_timeout: Duration,
    pub probe_path: String,
    pub volume_threshold: u32,
    pub rolling_window: Duration,
}

impl BackendDescriptor {
    /// Absolute URL for `path_and_query` on this backend.
    pub fn url_for(&self, path_and_query: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{}{}", base, path_and_query)
    }
}

impl TryFrom<&BackendConfig> for BackendDescriptor {
    type Error = ValidationError;

    fn try_from(config: &BackendConfig) -> Result<Self, Self::Error> {
        let base_url = Url::parse(&config.address).map_err(|e| ValidationError::InvalidAddress {
            backend: config.name.clone(),
            reason: e.to_string(),
        })?;

        if base_url.scheme() != "http" {
            return Err(ValidationError::InvalidAddress {
                backend: config.name.clone(),
                reason: format!("unsupported scheme `{}`", base_url.scheme()),
            });
        }

        Ok(Self {
            name: config.name.clone(),
            base_url,
            timeout: Duration::from_millis(config.timeout_ms),
            error_threshold_percentage: config.error_threshold_percentage,
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            probe_path: config.probe_path.clone(),
            volume_threshold: config.volume_threshold,
            rolling_window: Duration::from_millis(config.rolling_window_ms),
        })
    }
}
