//! Collaborator interfaces.
//!
//! The device core talks to hardware only through these traits. The host
//! build wires in simulated implementations; a board build wires in the
//! vendor drivers. All methods are synchronous to suit embedded drivers;
//! the async runtime wraps them where needed.

use std::io::{BufRead, Read};
use std::net::Ipv4Addr;
use std::time::Duration;

use thiserror::Error;

use crate::model::{IpConfig, MacAddress, NetworkCredentials, RadioMode};

/// Errors reported by the radio driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RadioError {
    #[error("radio driver not started")]
    NotStarted,

    #[error("radio operation failed: {0}")]
    Driver(String),

    #[error("scan failed: {0}")]
    Scan(String),
}

/// WiFi radio primitives.
///
/// `join` only starts association; its outcome arrives later as a link event
/// delivered by whoever owns the driver's event callback.
pub trait Radio: Send + Sync {
    /// Bring up (or restart) the access point with the given identity.
    fn start_access_point(&self, credentials: &NetworkCredentials) -> Result<(), RadioError>;

    /// Tear down the access point, leaving station mode untouched.
    fn stop_access_point(&self) -> Result<(), RadioError>;

    /// Start associating with a network.
    fn join(&self, credentials: &NetworkCredentials) -> Result<(), RadioError>;

    /// Configure station addressing: stop DHCP and install a fixed address,
    /// or re-enable DHCP.
    fn apply_ip_config(&self, config: &IpConfig) -> Result<(), RadioError>;

    fn mode(&self) -> RadioMode;

    fn station_ip(&self) -> Option<Ipv4Addr>;

    fn access_point_ip(&self) -> Option<Ipv4Addr>;

    fn mac_address(&self) -> MacAddress;

    /// SSIDs of nearby networks. Blocking.
    fn scan(&self) -> Result<Vec<String>, RadioError>;
}

/// Errors reported by the sensor sampler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    Read(String),
}

/// Source of calibrated sensor readings.
pub trait SensorSource: Send + Sync {
    /// One calibrated reading (millivolts for the ADC front end).
    fn read(&self) -> Result<i32, SensorError>;
}

/// Errors reported by the GPIO driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpioError {
    #[error("GPIO {0} is not usable")]
    InvalidPin(u32),

    #[error("GPIO operation failed: {0}")]
    Driver(String),
}

/// Digital pin control.
pub trait DigitalPins: Send + Sync {
    fn set_level(&self, pin: u32, high: bool) -> Result<(), GpioError>;

    fn level(&self, pin: u32) -> Result<bool, GpioError>;
}

/// Errors reported by the asset store.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("asset {name} unreadable: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only static file storage.
pub trait AssetStore: Send + Sync {
    /// Open an asset for buffered, incremental reading.
    fn open(&self, name: &str) -> Result<Box<dyn BufRead + Send>, AssetError>;

    /// Read a whole asset into memory.
    fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
        let mut bytes = Vec::new();
        self.open(name)?
            .read_to_end(&mut bytes)
            .map_err(|source| AssetError::Io {
                name: name.to_string(),
                source,
            })?;
        Ok(bytes)
    }
}

/// Device reboot.
pub trait Restarter: Send + Sync {
    /// Restart the device once `delay` has passed. Returns immediately.
    fn restart_after(&self, delay: Duration);
}

/// An RGB color for the status LED.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
    pub const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
    pub const BLUE: Rgb = Rgb { r: 0, g: 0, b: 255 };
}

/// Single-pixel status LED.
pub trait StatusLed: Send + Sync {
    fn show(&self, color: Rgb);
}
