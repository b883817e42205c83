//! # sensorlink-web
//!
//! HTTP and WebSocket front end of a SensorLink device.
//!
//! This crate provides:
//! - The device pages (`/`, `/network.html`) rendered from templates
//! - Configuration endpoints that persist settings and restart the device
//! - Pin control, network scan and status endpoints
//! - The `/ws` telemetry endpoint feeding the client registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sensorlink_web::{create_router, HttpServer, ServerState};
//!
//! let state = Arc::new(ServerState { .. });
//! let app = create_router(state, Duration::from_secs(10));
//!
//! let listener = TcpListener::bind("0.0.0.0:8080").await?;
//! let server = HttpServer::spawn(listener, app)?;
//! // ...
//! server.shutdown(Duration::from_secs(10)).await;
//! ```

pub mod error;
pub mod routes;
pub mod server;
pub mod ws;

pub use error::ApiError;
pub use routes::create_router;
pub use server::HttpServer;

use std::sync::Arc;
use std::time::Duration;

use sensorlink_core::hal::{AssetStore, DigitalPins, Radio, Restarter};
use sensorlink_core::NetworkConfig;
use sensorlink_server::{ClientRegistry, ControllerHandle};

/// Everything a request handler can reach.
///
/// Built once per boot and shared across all handlers.
pub struct ServerState {
    /// Served by `/version` and the page templates.
    pub build_id: String,
    pub config: NetworkConfig,
    pub controller: ControllerHandle,
    pub radio: Arc<dyn Radio>,
    pub pins: Arc<dyn DigitalPins>,
    pub assets: Arc<dyn AssetStore>,
    pub registry: Arc<ClientRegistry>,
    pub restarter: Arc<dyn Restarter>,
    /// Pause between acknowledging a configuration change and restarting.
    pub restart_delay: Duration,
    /// Frames buffered per WebSocket client before it counts as too slow.
    pub client_queue_depth: usize,
    /// Longest a single WebSocket write may stall before the client is dropped.
    pub client_send_timeout: Duration,
}

/// Type alias for shared state in Axum handlers.
pub type AppState = Arc<ServerState>;
