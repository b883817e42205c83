//! Device runtime settings.
//!
//! Non-secret tunables read once at boot from a JSON file. Every field has a
//! default, so a missing file or a partial document is fine:
//!
//! ```json
//! {
//!   "httpAddr": "0.0.0.0:8080",
//!   "sampleIntervalMs": 250,
//!   "reconnectDelaySecs": 10,
//!   "defaultAp": { "ssid": "SensorLink", "passphrase": "sensorlink" },
//!   "simulatedNetworks": [{ "ssid": "home", "passphrase": "secret" }]
//! }
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{CredentialsError, NetworkCredentials};

/// Environment variable naming the settings file.
pub const SETTINGS_ENV: &str = "SENSORLINK_CONFIG";

/// Settings file used when [`SETTINGS_ENV`] is unset.
pub const DEFAULT_SETTINGS_PATH: &str = "sensorlink.json";

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// An SSID/passphrase pair as written in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    pub ssid: String,
    pub passphrase: String,
}

impl NetworkEntry {
    pub fn credentials(&self) -> Result<NetworkCredentials, CredentialsError> {
        NetworkCredentials::new(self.ssid.clone(), self.passphrase.clone())
    }
}

/// Runtime tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSettings {
    /// Address the HTTP and WebSocket server binds to.
    pub http_addr: SocketAddr,
    /// Telemetry sampling period.
    pub sample_interval_ms: u64,
    /// Delay before each reconnection attempt.
    pub reconnect_delay_secs: u64,
    /// Grace period between acknowledging a restart and performing it.
    pub restart_delay_ms: u64,
    /// Digital pin reported in each telemetry sample.
    pub monitored_pin: u32,
    /// Outgoing frames buffered per WebSocket client before it counts as slow.
    pub client_queue_depth: usize,
    pub assets_dir: PathBuf,
    pub store_dir: PathBuf,
    /// Access point identity used until one is saved.
    pub default_ap: NetworkEntry,
    pub request_timeout_secs: u64,
    /// Networks the simulated radio can see and join.
    pub simulated_networks: Vec<NetworkEntry>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            sample_interval_ms: 250,
            reconnect_delay_secs: 10,
            restart_delay_ms: 1000,
            monitored_pin: 22,
            client_queue_depth: 32,
            assets_dir: PathBuf::from("assets"),
            store_dir: PathBuf::from("nvs"),
            default_ap: NetworkEntry {
                ssid: "SensorLink".to_string(),
                passphrase: "sensorlink".to_string(),
            },
            request_timeout_secs: 10,
            simulated_networks: Vec::new(),
        }
    }
}

impl DeviceSettings {
    /// Load from the file named by `SENSORLINK_CONFIG`, or the default path.
    pub fn from_env() -> Result<Self, SettingsError> {
        let path = std::env::var_os(SETTINGS_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH));
        Self::load(&path)
    }

    /// Load and validate a settings file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Self = serde_json::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        fn non_zero(field: &'static str, value: u64) -> Result<(), SettingsError> {
            if value == 0 {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
            Ok(())
        }

        non_zero("sampleIntervalMs", self.sample_interval_ms)?;
        non_zero("reconnectDelaySecs", self.reconnect_delay_secs)?;
        non_zero("requestTimeoutSecs", self.request_timeout_secs)?;
        non_zero("clientQueueDepth", self.client_queue_depth as u64)?;

        self.default_access_point()?;
        for network in &self.simulated_networks {
            network.credentials().map_err(|e| SettingsError::Invalid {
                field: "simulatedNetworks",
                reason: format!("{}: {}", network.ssid, e),
            })?;
        }
        Ok(())
    }

    pub fn default_access_point(&self) -> Result<NetworkCredentials, SettingsError> {
        self.default_ap
            .credentials()
            .map_err(|e| SettingsError::Invalid {
                field: "defaultAp",
                reason: e.to_string(),
            })
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
