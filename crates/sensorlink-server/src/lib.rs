//! # sensorlink-server
//!
//! Tokio runtime pieces of the SensorLink device:
//! - [`ConnectivityController`] drives the radio from link events
//! - [`ClientRegistry`] tracks telemetry viewers
//! - [`TelemetryBroadcaster`] samples the sensor and fans frames out
//! - the status LED task and the in-process restart signal
//! - simulated collaborators for running on a host

pub mod broadcaster;
pub mod controller;
pub mod registry;
pub mod restart;
pub mod sim;
pub mod status;

pub use broadcaster::{BroadcasterConfig, TelemetryBroadcaster, TickError};
pub use controller::{
    ConnectivityController, ControllerHandle, LinkEventReceiver, LinkEventSender, StateSnapshot,
};
pub use registry::{BroadcastReport, ClientHandle, ClientId, ClientRegistry, ClientSink, SendError};
pub use restart::{RestartListener, RestartSignal};
pub use status::run_status_led;
