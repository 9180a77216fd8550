use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use sensim_core::Sensor;

/// Returns the ~/.sensim directory.
/// Falls back to a local `.sensim` directory if the home directory cannot be determined.
pub fn sensim_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(mut path) => {
            path.push(".sensim");
            path
        }
        None => {
            warn!("Could not determine home directory, falling back to local .sensim");
            PathBuf::from(".sensim")
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("network.write_timeout_ms must be greater than zero")]
    ZeroWriteTimeout,
    #[error("sensor {sensor_id}: port {base_port} + {sensor_id} is out of range")]
    PortOutOfRange { sensor_id: u16, base_port: u16 },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DaemonConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listener and broadcast settings shared by every sensor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// Sensor N listens on `base_port + N`
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// Interface the listeners bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Pending-connection queue length per listener
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Upper bound on a single write to one receiver; a receiver that does
    /// not drain within this time is dropped
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Pause after a failed `accept` before listening again
    #[serde(default = "default_accept_retry_ms")]
    pub accept_retry_ms: u64,
}

fn default_base_port() -> u16 {
    5200
}
fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_backlog() -> u32 {
    8
}
fn default_write_timeout_ms() -> u64 {
    1000
}
fn default_accept_retry_ms() -> u64 {
    100
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            base_port: default_base_port(),
            bind_address: default_bind_address(),
            backlog: default_backlog(),
            write_timeout_ms: default_write_timeout_ms(),
            accept_retry_ms: default_accept_retry_ms(),
        }
    }
}

impl NetworkConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn accept_retry(&self) -> Duration {
        Duration::from_millis(self.accept_retry_ms)
    }

    /// Address the given sensor's listener binds to.
    pub fn listen_addr(&self, sensor: &Sensor) -> Result<SocketAddr, ConfigError> {
        let port = sensor
            .port(self.base_port)
            .ok_or(ConfigError::PortOutOfRange {
                sensor_id: sensor.id(),
                base_port: self.base_port,
            })?;
        Ok(SocketAddr::new(self.bind_address, port))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.write_timeout_ms == 0 {
            return Err(ConfigError::ZeroWriteTimeout);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. "info" or "sensim_daemon=debug".
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl DaemonConfig {
    pub fn get_config_path() -> PathBuf {
        let mut path = sensim_data_dir();
        path.push("config.toml");
        path
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DaemonConfig = toml::from_str(content)?;
        config.network.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from [`Self::get_config_path`] when `None`.
    ///
    /// An explicitly named file must exist; a missing default file just means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::get_config_path(), false),
        };

        if !explicit && !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, toml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}
