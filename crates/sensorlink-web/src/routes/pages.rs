//! Device pages and static assets.
//!
//! # Endpoints
//!
//! ### `GET /` and `GET /network.html`
//! Templates from the asset store with `{{NAME}}` placeholders filled from
//! the live network identity. The body is streamed line by line.
//!
//! ### `GET /chartjs`
//! The charting script, verbatim, cacheable for an hour.
//!
//! ### `GET /version`
//! The build identifier as plain text.

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::StreamExt;
use tokio::sync::mpsc;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::debug;

use sensorlink_core::hal::AssetError;
use sensorlink_core::{read_lines, render_line, NetworkInfo};

use crate::{ApiError, AppState, ServerState};

const INDEX_PAGE: &str = "index.html";
const NETWORK_PAGE: &str = "network.html";
const CHART_SCRIPT: &str = "chart.js";

/// Rendered lines buffered between the reader and the response body.
const PAGE_LINE_QUEUE: usize = 4;

type PageLine = Result<String, ApiError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/network.html", get(network_page))
        .route(
            "/chartjs",
            get(chart_js).layer(SetResponseHeaderLayer::overriding(
                header::CACHE_CONTROL,
                HeaderValue::from_static("max-age=3600"),
            )),
        )
        .route("/version", get(version))
}

/// GET /
async fn index(State(state): State<AppState>) -> Result<Response, ApiError> {
    render_page(state, INDEX_PAGE).await
}

/// GET /network.html
async fn network_page(State(state): State<AppState>) -> Result<Response, ApiError> {
    render_page(state, NETWORK_PAGE).await
}

/// Stream a rendered template.
///
/// A template that cannot be opened, or whose first line is unreadable,
/// fails the request. A read error further in ends the body early.
async fn render_page(state: AppState, name: &'static str) -> Result<Response, ApiError> {
    let (line_tx, mut line_rx) = mpsc::channel::<PageLine>(PAGE_LINE_QUEUE);
    tokio::task::spawn_blocking(move || stream_template(&state, name, &line_tx));

    let first = match line_rx.recv().await {
        Some(Err(e)) => return Err(e),
        first => first,
    };
    let rest = futures::stream::unfold(line_rx, |mut rx| async move {
        rx.recv().await.map(|line| (line, rx))
    });

    Ok((
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        Body::from_stream(futures::stream::iter(first).chain(rest)),
    )
        .into_response())
}

/// Read, render and forward one line at a time. Runs on the blocking pool.
fn stream_template(state: &ServerState, name: &str, lines: &mpsc::Sender<PageLine>) {
    let reader = match state.assets.open(name) {
        Ok(reader) => reader,
        Err(e) => {
            let _ = lines.blocking_send(Err(e.into()));
            return;
        }
    };

    let info = NetworkInfo::collect(
        &state.build_id,
        state.controller.state(),
        state.radio.as_ref(),
        &state.config,
    );
    let vars = info.variables();

    let mut count = 0usize;
    for line in read_lines(reader) {
        let line = line
            .map(|line| render_line(&line, &vars).into_owned())
            .map_err(|source| {
                ApiError::from(AssetError::Io {
                    name: name.to_string(),
                    source,
                })
            });
        let failed = line.is_err();
        if lines.blocking_send(line).is_err() {
            debug!("Client left while rendering {}", name);
            return;
        }
        if failed {
            return;
        }
        count += 1;
    }
    debug!("Rendered {} ({} lines)", name, count);
}

/// GET /chartjs
async fn chart_js(State(state): State<AppState>) -> Result<Response, ApiError> {
    let assets = state.assets.clone();
    let script = tokio::task::spawn_blocking(move || assets.load(CHART_SCRIPT)).await??;
    Ok((
        [(header::CONTENT_TYPE, "application/javascript")],
        script,
    )
        .into_response())
}

/// GET /version
async fn version(State(state): State<AppState>) -> String {
    state.build_id.clone()
}
