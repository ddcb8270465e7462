// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub calendar: CalendarConfig,
    pub gateway: GatewayConfig,
    pub reconciler: ReconcilerConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Base URL of the calendar API.
    pub api_base: String,
    pub calendar_id: String,
    pub access_token: String,
    /// Cap on the number of upcoming events fetched per poll.
    pub max_results: u32,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the device-gateway HTTP bridge.
    pub endpoint: String,
    pub api_key: String,
    pub request_timeout_seconds: u64,
    /// Retries for transient send failures within one action.
    pub send_retries: u32,
    /// Outer bound on one action's device call, retries included.
    pub command_timeout_seconds: u64,
    pub devices: DeviceTargets,
}

/// Gateway device identifiers the built-in commands act on.
///
/// Device discovery is out of scope, so the targets are fixed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTargets {
    pub light: String,
    pub blind_left: String,
    pub blind_right: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub metrics_port: u16,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Add environment-specific configuration
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.calendar.api_base.is_empty() {
            return Err("Calendar api_base cannot be empty".to_string());
        }
        if self.calendar.calendar_id.is_empty() {
            return Err("Calendar calendar_id cannot be empty".to_string());
        }
        if self.calendar.max_results == 0 {
            return Err("Calendar max_results must be greater than 0".to_string());
        }
        if self.calendar.request_timeout_seconds == 0 {
            return Err("Calendar request_timeout_seconds must be greater than 0".to_string());
        }

        if self.gateway.endpoint.is_empty() {
            return Err("Gateway endpoint cannot be empty".to_string());
        }
        if self.gateway.request_timeout_seconds == 0 {
            return Err("Gateway request_timeout_seconds must be greater than 0".to_string());
        }
        if self.gateway.command_timeout_seconds == 0 {
            return Err("Gateway command_timeout_seconds must be greater than 0".to_string());
        }
        if self.gateway.devices.light.is_empty() {
            return Err("Gateway devices.light cannot be empty".to_string());
        }
        if self.gateway.devices.blind_left.is_empty() || self.gateway.devices.blind_right.is_empty()
        {
            return Err("Gateway blind device ids cannot be empty".to_string());
        }
        if self.gateway.devices.blind_left == self.gateway.devices.blind_right {
            return Err("Gateway blind device ids must be distinct".to_string());
        }

        if self.reconciler.poll_interval_seconds == 0 {
            return Err("Reconciler poll_interval_seconds must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            calendar: CalendarConfig {
                api_base: "https://www.googleapis.com/calendar/v3".to_string(),
                calendar_id: "primary".to_string(),
                access_token: "change-me-in-production".to_string(),
                max_results: 10,
                request_timeout_seconds: 30,
            },
            gateway: GatewayConfig {
                endpoint: "http://localhost:8123".to_string(),
                api_key: "change-me-in-production".to_string(),
                request_timeout_seconds: 10,
                send_retries: 2,
                command_timeout_seconds: 30,
                devices: DeviceTargets {
                    light: "65537".to_string(),
                    blind_left: "65538".to_string(),
                    blind_right: "65539".to_string(),
                },
            },
            reconciler: ReconcilerConfig {
                poll_interval_seconds: 60,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: 9090,
            },
        }
    }
}
