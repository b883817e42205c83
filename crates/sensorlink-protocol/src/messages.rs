//! Message types exchanged with viewers and the device pages.
//!
//! - Server → WebSocket client: the `ACK` greeting, then telemetry samples
//! - Server → HTTP client: status report, network scan results
//!
//! Telemetry samples are JSON over WebSocket text frames.

use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sensorlink_core::{ConnectivityState, RadioMode};

/// Text frame sent once when a WebSocket client connects.
pub const ACK_FRAME: &str = "ACK";

/// One telemetry reading pushed to every viewer.
///
/// Encoded as `{"adc":<int>,"pin":<0|1>}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Calibrated sensor reading in millivolts.
    pub adc: i32,
    /// Level of the monitored digital pin.
    pub pin: u8,
}

impl TelemetrySample {
    pub fn new(adc: i32, pin_high: bool) -> Self {
        Self {
            adc,
            pin: u8::from(pin_high),
        }
    }

    pub fn pin_high(&self) -> bool {
        self.pin != 0
    }
}

/// Diagnostic snapshot served by `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub state: ConnectivityState,
    /// When the current state was entered.
    pub since: DateTime<Utc>,
    pub mode: RadioMode,
    pub sta_ip: Option<Ipv4Addr>,
    pub ap_ip: Option<Ipv4Addr>,
    pub mac: String,
    /// Registered telemetry viewers.
    pub clients: usize,
}
