use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::client::Stats;
use crate::supervisor::ClientMonitorConfig;
use crate::threshold::{RangeThreshold, Threshold};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Email relay; emails are only logged when absent
    #[serde(default)]
    pub email: Option<EmailConfig>,
    /// Fleet-wide policy defaults
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            log_dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    /// Mail relay webhook receiving `{client, subject, body}` JSON
    pub webhook_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_check_fails")]
    pub check_fails_before_reboot: u32,
    #[serde(default = "default_reboot_fails")]
    pub reboot_fails_before_power_cycle: u32,
    #[serde(default = "default_reboot_interval")]
    pub reboot_interval_secs: u64,
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    #[serde(default = "default_state_interval")]
    pub state_interval_secs: u64,
}

fn default_check_fails() -> u32 {
    3
}

fn default_reboot_fails() -> u32 {
    2
}

fn default_reboot_interval() -> u64 {
    600
}

fn default_stats_interval() -> u64 {
    60
}

fn default_state_interval() -> u64 {
    30
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            check_fails_before_reboot: default_check_fails(),
            reboot_fails_before_power_cycle: default_reboot_fails(),
            reboot_interval_secs: default_reboot_interval(),
            stats_interval_secs: default_stats_interval(),
            state_interval_secs: default_state_interval(),
        }
    }
}

/// One managed client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub name: String,
    #[serde(default)]
    pub power_cycle_enabled: bool,
    #[serde(default)]
    pub read_only: bool,

    // Per-client overrides of the fleet policy
    #[serde(default)]
    pub check_fails_before_reboot: Option<u32>,
    #[serde(default)]
    pub reboot_fails_before_power_cycle: Option<u32>,
    #[serde(default)]
    pub reboot_interval_secs: Option<u64>,
    #[serde(default)]
    pub stats_interval_secs: Option<u64>,
    #[serde(default)]
    pub state_interval_secs: Option<u64>,

    #[serde(default)]
    pub thresholds: Vec<RangeThreshold>,
    /// Healthy stats reported by simulated clients
    #[serde(default)]
    pub baseline: BTreeMap<String, f64>,
}

impl ClientConfig {
    pub fn baseline_stats(&self) -> Stats {
        Stats::new(self.baseline.clone())
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Self::defaults()?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("RIGWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (RIGWATCH_POLICY__STATS_INTERVAL_SECS, etc.)
            .add_source(
                Environment::with_prefix("RIGWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load a single configuration file without environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)
    }

    /// Resolve the effective escalation policy for a client
    pub fn client_policy(&self, client: &ClientConfig) -> ClientMonitorConfig {
        let thresholds: Vec<Arc<dyn Threshold>> = client
            .thresholds
            .iter()
            .cloned()
            .map(|t| Arc::new(t) as Arc<dyn Threshold>)
            .collect();

        ClientMonitorConfig::new(
            thresholds,
            client
                .check_fails_before_reboot
                .unwrap_or(self.policy.check_fails_before_reboot),
            client
                .reboot_fails_before_power_cycle
                .unwrap_or(self.policy.reboot_fails_before_power_cycle),
            Duration::from_secs(
                client
                    .reboot_interval_secs
                    .unwrap_or(self.policy.reboot_interval_secs),
            ),
            Duration::from_secs(
                client
                    .stats_interval_secs
                    .unwrap_or(self.policy.stats_interval_secs),
            ),
            Duration::from_secs(
                client
                    .state_interval_secs
                    .unwrap_or(self.policy.state_interval_secs),
            ),
        )
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.clients.is_empty() {
            errors.push("at least one client must be configured".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for client in &self.clients {
            if client.name.trim().is_empty() {
                errors.push("client name must not be empty".to_string());
            } else if !seen.insert(client.name.as_str()) {
                // Allowed at runtime, but almost always a copy-paste mistake
                errors.push(format!("client '{}' is listed more than once", client.name));
            }

            if let Err(e) = self.client_policy(client).validate() {
                errors.push(format!("client '{}': {}", client.name, e));
            }

            for t in &client.thresholds {
                if t.min.is_none() && t.max.is_none() {
                    errors.push(format!(
                        "client '{}': threshold on '{}' has neither min nor max",
                        client.name, t.metric
                    ));
                }
                if let (Some(min), Some(max)) = (t.min, t.max) {
                    if min > max {
                        errors.push(format!(
                            "client '{}': threshold on '{}' has min {} above max {}",
                            client.name, t.metric, min, max
                        ));
                    }
                }
            }
        }

        if let Some(email) = &self.email {
            if !email.webhook_url.starts_with("http://") && !email.webhook_url.starts_with("https://")
            {
                errors.push("email.webhook_url must be an http(s) URL".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
