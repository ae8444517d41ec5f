use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::firewall::FirewallConfig;

/// Root configuration for tcpgated
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Listener accepting inbound connections
    pub listener: ListenerConfig,

    /// Admission rules
    #[serde(default)]
    pub firewall: FirewallConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,
}

/// Listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerConfig {
    /// Listener name (for logging)
    #[serde(default = "default_listener_name")]
    pub name: String,

    /// Bind address
    pub address: SocketAddr,

    /// Connection limits
    #[serde(default)]
    pub limits: ConnectionLimits,
}

fn default_listener_name() -> String {
    "gate".to_string()
}

/// Connection limits
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionLimits {
    /// Maximum concurrent admitted connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> usize {
    10000
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable output
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Global settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Shutdown behavior
    #[serde(default)]
    pub shutdown: ShutdownSettings,
}

/// Shutdown settings
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownSettings {
    /// How long to wait for in-flight connections before forcing termination
    #[serde(default = "default_drain_timeout", with = "humantime_serde")]
    pub drain_timeout: Duration,
}

impl Default for ShutdownSettings {
    fn default() -> Self {
        Self {
            drain_timeout: default_drain_timeout(),
        }
    }
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(30)
}
