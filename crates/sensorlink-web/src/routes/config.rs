//! Configuration routes.
//!
//! Bodies are `key=value&...` forms decoded from the raw bytes regardless
//! of the declared content type. A form is committed to the config store in
//! full or not at all; the response is sent only after the commit returns,
//! and the device then restarts so the new settings take effect on boot.
//!
//! # Endpoints
//!
//! ### `POST /wifi-save-creds`
//! `ssid=...&password=...` for the network to join.
//!
//! ### `POST /wifi-save-ap-creds`
//! `ssid=...&password=...` for the device's own access point.
//!
//! ### `POST /ipv4-config`
//! `static_ip=...&gateway=...&subnet=...&mode=0|1`.
//!
//! ### `GET /restart`
//! Acknowledge, then restart.

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use sensorlink_core::{NetworkConfig, StoreError};
use sensorlink_protocol::{CredentialsForm, Ipv4Form};

use crate::{ApiError, AppState};

const OK: &str = "OK";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wifi-save-creds", post(save_station_credentials))
        .route("/wifi-save-ap-creds", post(save_access_point_credentials))
        .route("/ipv4-config", post(save_ipv4_config))
        .route("/restart", get(restart))
}

/// Run a blocking store commit off the async workers.
async fn commit<F>(state: &AppState, write: F) -> Result<(), ApiError>
where
    F: FnOnce(&NetworkConfig) -> Result<(), StoreError> + Send + 'static,
{
    let config = state.config.clone();
    tokio::task::spawn_blocking(move || write(&config)).await??;
    Ok(())
}

fn schedule_restart(state: &AppState) {
    state.restarter.restart_after(state.restart_delay);
}

/// POST /wifi-save-creds
async fn save_station_credentials(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let credentials = CredentialsForm::decode(&body)?;
    info!("Saving station credentials for {:?}", credentials.ssid());
    commit(&state, move |config| {
        config.save_station_credentials(&credentials)
    })
    .await?;
    schedule_restart(&state);
    Ok(OK)
}

/// POST /wifi-save-ap-creds
async fn save_access_point_credentials(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let credentials = CredentialsForm::decode(&body)?;
    info!("Saving access point credentials for {:?}", credentials.ssid());
    commit(&state, move |config| {
        config.save_access_point_credentials(&credentials)
    })
    .await?;
    schedule_restart(&state);
    Ok(OK)
}

/// POST /ipv4-config
async fn save_ipv4_config(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let ip_config = Ipv4Form::decode(&body)?;
    info!("Saving IPv4 configuration: {:?}", ip_config);
    commit(&state, move |config| config.save_ip_config(&ip_config)).await?;
    schedule_restart(&state);
    Ok(OK)
}

/// GET /restart
async fn restart(State(state): State<AppState>) -> &'static str {
    info!("Restart requested over HTTP");
    schedule_restart(&state);
    OK
}
