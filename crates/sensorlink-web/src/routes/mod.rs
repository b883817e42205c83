//! HTTP route handlers for the device.

pub mod config;
pub mod device;
pub mod pages;

use std::time::Duration;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::{ws, AppState};

/// Create the main Axum router with all routes.
///
/// A request that is not answered within `request_timeout` (including
/// receiving its body) gets `408 Request Timeout`.
pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(pages::routes())
        .merge(config::routes())
        .merge(device::routes())
        .merge(ws::routes())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
