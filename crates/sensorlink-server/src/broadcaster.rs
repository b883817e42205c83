//! Periodic telemetry fan-out.
//!
//! Every tick: read the sensor, read the monitored pin, encode one frame and
//! hand it to [`ClientRegistry::broadcast`]. The loop runs regardless of how
//! many viewers are connected; with none it skips encoding.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use sensorlink_core::hal::{DigitalPins, GpioError, SensorError, SensorSource};
use sensorlink_protocol::{encode_sample, CodecError, TelemetrySample};

use crate::registry::{BroadcastReport, ClientRegistry};

/// Errors that skip a tick.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Configuration for the broadcast loop.
#[derive(Debug, Clone, Copy)]
pub struct BroadcasterConfig {
    pub interval: Duration,
    /// Digital pin reported alongside each reading.
    pub monitored_pin: u32,
}

impl Default for BroadcasterConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(250),
            monitored_pin: 22,
        }
    }
}

pub struct TelemetryBroadcaster {
    config: BroadcasterConfig,
    registry: Arc<ClientRegistry>,
    sensor: Arc<dyn SensorSource>,
    pins: Arc<dyn DigitalPins>,
}

impl TelemetryBroadcaster {
    pub fn new(
        config: BroadcasterConfig,
        registry: Arc<ClientRegistry>,
        sensor: Arc<dyn SensorSource>,
        pins: Arc<dyn DigitalPins>,
    ) -> Self {
        Self {
            config,
            registry,
            sensor,
            pins,
        }
    }

    /// Read one sample from the collaborators.
    pub fn sample(&self) -> Result<TelemetrySample, TickError> {
        let adc = self.sensor.read()?;
        let pin = self.pins.level(self.config.monitored_pin)?;
        Ok(TelemetrySample::new(adc, pin))
    }

    /// One iteration of the loop. `None` when there was nobody to send to.
    pub fn tick(&self) -> Result<Option<BroadcastReport>, TickError> {
        let sample = self.sample()?;
        if self.registry.is_empty() {
            return Ok(None);
        }
        let frame = encode_sample(&sample)?;
        let report = self.registry.broadcast(&frame);
        if report.failed > 0 {
            debug!(
                "Telemetry delivered to {}, dropped {} client(s)",
                report.delivered, report.failed
            );
        }
        Ok(Some(report))
    }

    /// Run until the task is aborted.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(
            "Telemetry broadcaster started ({:?}, pin {})",
            self.config.interval, self.config.monitored_pin
        );

        loop {
            interval.tick().await;
            if let Err(e) = self.tick() {
                warn!("Skipping telemetry tick: {}", e);
            }
        }
    }
}
