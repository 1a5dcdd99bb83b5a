//! Gateway configuration.

use serde::Deserialize;

use crate::{GatewayError, Result};

/// Fallback baud rate for the ACM bulk channel.
pub const DEFAULT_ACM_BAUDRATE: u32 = 230_400;

fn default_device() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_acm_device() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud_rate() -> u32 {
    921_600
}

/// Startup configuration for a vehicle connection.
///
/// Loadable from YAML; only the registered app credentials are mandatory.
///
/// ```yaml
/// app_id: 1024991
/// app_key: 0bd6011d6em9c23c0a252f1b93bd1c84a5bd0228d3c85a5cc4f2b35f1c37a3f0
/// device: /dev/ttyUSB0
/// baud_rate: 921600
/// enable_advanced_sensing: true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayConfig {
    /// Registered application id.
    pub app_id: u32,
    /// Registered application key.
    pub app_key: String,
    /// Serial device of the flight-controller link.
    #[serde(default = "default_device")]
    pub device: String,
    /// ACM device carrying the bulk/advanced-sensing channel.
    #[serde(default = "default_acm_device")]
    pub acm_device: String,
    /// Baud rate of the flight-controller link.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Enable the camera stream channels.
    #[serde(default)]
    pub enable_advanced_sensing: bool,
}

impl GatewayConfig {
    /// Configuration with defaults for everything but the credentials.
    pub fn new(app_id: u32, app_key: impl Into<String>) -> Self {
        GatewayConfig {
            app_id,
            app_key: app_key.into(),
            device: default_device(),
            acm_device: default_acm_device(),
            baud_rate: default_baud_rate(),
            enable_advanced_sensing: false,
        }
    }

    /// Parse a YAML document into a configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GatewayConfig = serde_yaml_ng::from_str(yaml)
            .map_err(|e| GatewayError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot possibly activate.
    pub fn validate(&self) -> Result<()> {
        if self.app_id == 0 {
            return Err(GatewayError::config("app_id must be non-zero"));
        }
        if self.app_key.is_empty() {
            return Err(GatewayError::config("app_key must not be empty"));
        }
        if self.baud_rate == 0 {
            return Err(GatewayError::config("baud_rate must be non-zero"));
        }
        Ok(())
    }
}
