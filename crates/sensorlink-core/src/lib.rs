//! # sensorlink-core
//!
//! Core SensorLink device logic.
//!
//! This crate provides:
//! - Data model types (credentials, IP configuration, connectivity state)
//! - Durable key-value config store with commit semantics
//! - The connectivity state machine (pure, without I/O)
//! - Collaborator traits for the radio, sensor, GPIO and asset storage
//! - Streaming template renderer for served documents
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! so the same state machine and store logic runs on the host simulator and
//! on an embedded target.

pub mod assets;
pub mod config;
pub mod connectivity;
pub mod hal;
pub mod model;
pub mod network_info;
pub mod settings;
pub mod store;
pub mod template;

pub use assets::DirectoryAssets;
pub use config::NetworkConfig;
pub use connectivity::{ConnectivityMachine, DisconnectReason, Effect, LinkEvent, Transition};
pub use model::*;
pub use network_info::NetworkInfo;
pub use settings::{DeviceSettings, NetworkEntry, SettingsError};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
pub use template::{escape_html, read_lines, render, render_line, render_to_string, Variables};
