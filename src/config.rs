use crate::error::Result;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct KeelConfig {
    #[serde(default)]
    pub container: ContainerConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ContainerConfig {
    /// Upper bound for a single component's `stop()` during a shutdown sweep
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Turn SIGINT/SIGTERM into termination requests while `run()` is active
    #[serde(default = "default_handle_signals")]
    pub handle_signals: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct HealthConfig {
    /// Probe interval used when a monitorable is added without one
    #[serde(default = "default_health_interval_ms")]
    pub default_interval_ms: u64,

    /// Period of the health summary log; 0 disables it
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Level applied to the `keel` target when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Write logs to a daily rolling file in this directory instead of stdout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,

    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl ContainerConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

impl HealthConfig {
    pub fn default_interval(&self) -> Duration {
        Duration::from_millis(self.default_interval_ms)
    }

    pub fn report_interval(&self) -> Option<Duration> {
        (self.report_interval_ms > 0).then(|| Duration::from_millis(self.report_interval_ms))
    }
}

impl KeelConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from_file("keel.toml")
    }

    /// Load configuration from a specific file path.
    ///
    /// Layers, lowest first: built-in defaults, the TOML file (optional),
    /// `KEEL_<SECTION>__<KEY>` environment variables.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("container.stop_timeout_ms", default_stop_timeout_ms() as i64)?
            .set_default("container.handle_signals", default_handle_signals())?
            .set_default("health.default_interval_ms", default_health_interval_ms() as i64)?
            .set_default("health.report_interval_ms", default_report_interval_ms() as i64)?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", "pretty")?
            .set_default("logging.file_prefix", default_log_file_prefix())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with KEEL_ prefix
            .add_source(
                Environment::with_prefix("KEEL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: KeelConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.container.stop_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Container stop_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.health.default_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Health default_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::Message(
                "Logging level must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
            handle_signals: default_handle_signals(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: default_health_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

// Default value functions
fn default_stop_timeout_ms() -> u64 {
    10_000
}
fn default_handle_signals() -> bool {
    true
}

fn default_health_interval_ms() -> u64 {
    30_000
}
fn default_report_interval_ms() -> u64 {
    300_000
} // 5 minutes

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file_prefix() -> String {
    "keel.log".to_string()
}
