//! Pin control, scanning and diagnostics.

use axum::extract::{RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use tracing::{debug, info};

use sensorlink_protocol::{encode_status, LedCommand, StatusReport};

use crate::{ApiError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/led", get(set_pin))
        .route("/toggle", get(set_pin))
        .route("/networks", get(networks))
        .route("/status", get(status))
}

/// GET /led?pin=P&state=S
async fn set_pin(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<&'static str, ApiError> {
    let query = query.ok_or_else(|| ApiError::PinCommand("missing query".to_string()))?;
    let command =
        LedCommand::decode(&query).map_err(|e| ApiError::PinCommand(e.to_string()))?;

    state.pins.set_level(command.pin, command.high)?;
    info!("GPIO {} set {}", command.pin, if command.high { "high" } else { "low" });
    Ok("OK")
}

/// GET /networks
///
/// Scanning blocks for a few seconds on real radios.
async fn networks(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    let radio = state.radio.clone();
    let ssids = tokio::task::spawn_blocking(move || radio.scan()).await??;
    debug!("Scan found {} network(s)", ssids.len());
    Ok(Json(ssids))
}

/// GET /status
///
/// The radio queries go through the driver, so the report is built on the
/// blocking pool like a scan.
async fn status(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = tokio::task::spawn_blocking(move || {
        let snapshot = state.controller.snapshot();
        StatusReport {
            state: snapshot.state,
            since: snapshot.since,
            mode: state.radio.mode(),
            sta_ip: state.radio.station_ip(),
            ap_ip: state.radio.access_point_ip(),
            mac: state.radio.mac_address().to_string(),
            clients: state.registry.len(),
        }
    })
    .await?;
    let body = encode_status(&report)?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
