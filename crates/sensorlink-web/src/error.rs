//! Request failures and the status codes they map to.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{error, warn};

use sensorlink_core::hal::{AssetError, GpioError, RadioError};
use sensorlink_core::StoreError;
use sensorlink_protocol::{CodecError, FormError};

#[derive(Debug, Error)]
pub enum ApiError {
    /// A posted form was missing a field or carried an unusable value.
    #[error(transparent)]
    Form(#[from] FormError),

    /// `/led` query absent or malformed.
    #[error("bad pin command: {0}")]
    PinCommand(String),

    #[error(transparent)]
    Gpio(#[from] GpioError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Radio(#[from] RadioError),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            // The device's form parser fails hard on an absent field.
            ApiError::Form(FormError::MissingField(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Form(FormError::InvalidField { .. }) => StatusCode::BAD_REQUEST,
            ApiError::PinCommand(_) | ApiError::Gpio(GpioError::InvalidPin(_)) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Asset(AssetError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Gpio(GpioError::Driver(_))
            | ApiError::Store(_)
            | ApiError::Radio(_)
            | ApiError::Asset(AssetError::Io { .. })
            | ApiError::Codec(_)
            | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}
