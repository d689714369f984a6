//! Runtime configuration for meeting-watcher.
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `MW__SECTION__KEY` environment variables. Command-line flags are applied
//! on top by the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::analyzers::{SignatureConfig, SignatureError, SignatureTable, default_signatures};
use crate::collectors::DEFAULT_SUBNET_PREFIX_LEN;

/// Silence after which an active meeting is considered over (seconds).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 30;

/// Cadence of the periodic meeting check and status refresh (seconds).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 1;

/// File that receives one line per started/ended meeting.
pub const DEFAULT_SESSION_LOG: &str = "meetings.txt";

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "meeting-watcher.toml";

/// Prefix for environment overrides, e.g. `MW__MONITOR__IDLE_TIMEOUT_SECS=60`.
pub const ENV_PREFIX: &str = "MW";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("config file {0} does not exist")]
    MissingFile(PathBuf),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("subnet prefix length must be between 1 and 32, got {0}")]
    PrefixLength(u8),

    #[error(transparent)]
    Signature(#[from] SignatureError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub network: NetworkConfig,
    pub session_log: SessionLogConfig,
    pub signatures: Vec<SignatureConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub idle_timeout_secs: u64,
    pub check_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Addresses sharing this many leading bits with the local address are LAN traffic
    pub subnet_prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLogConfig {
    pub path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            monitor: MonitorConfig {
                idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
                check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            },
            network: NetworkConfig {
                subnet_prefix_len: DEFAULT_SUBNET_PREFIX_LEN,
            },
            session_log: SessionLogConfig {
                path: PathBuf::from(DEFAULT_SESSION_LOG),
            },
            signatures: default_signatures(),
        }
    }
}

impl AppConfig {
    /// Loads defaults, then `path` (or `meeting-watcher.toml` if present), then the environment
    ///
    /// An explicitly given path must exist; the implicit default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingFile(path.to_path_buf()));
                }
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                builder = builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
        }

        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitor.idle_timeout_secs == 0 {
            return Err(ConfigError::Zero {
                field: "monitor.idle_timeout_secs",
            });
        }
        if self.monitor.check_interval_secs == 0 {
            return Err(ConfigError::Zero {
                field: "monitor.check_interval_secs",
            });
        }
        if !(1..=32).contains(&self.network.subnet_prefix_len) {
            return Err(ConfigError::PrefixLength(self.network.subnet_prefix_len));
        }
        SignatureTable::from_config(&self.signatures)?;
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.monitor.idle_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.check_interval_secs)
    }

    pub fn signature_table(&self) -> Result<SignatureTable, ConfigError> {
        Ok(SignatureTable::from_config(&self.signatures)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.check_interval(), Duration::from_secs(1));
        assert_eq!(config.network.subnet_prefix_len, 24);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[monitor]
idle_timeout_secs = 45
check_interval_secs = 2

[network]
subnet_prefix_len = 16

[session_log]
path = "/tmp/meetings.txt"

[[signatures]]
platform = "Zoom"
networks = ["170.114.0.0/16"]
ports = ["8801-8810"]
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.monitor.idle_timeout_secs, 45);
        assert_eq!(config.monitor.check_interval_secs, 2);
        assert_eq!(config.network.subnet_prefix_len, 16);
        assert_eq!(config.session_log.path, PathBuf::from("/tmp/meetings.txt"));
        assert_eq!(config.signatures.len(), 1);
        assert_eq!(config.signatures[0].platform, Platform::Zoom);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/meeting-watcher.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.monitor.idle_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Zero { .. })));

        let mut config = AppConfig::default();
        config.network.subnet_prefix_len = 0;
        assert!(matches!(config.validate(), Err(ConfigError::PrefixLength(0))));

        let mut config = AppConfig::default();
        config.signatures[0].ports = vec!["not-a-port".to_string()];
        assert!(matches!(config.validate(), Err(ConfigError::Signature(_))));
    }
}
