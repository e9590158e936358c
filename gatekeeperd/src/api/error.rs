use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use shared::mac::MacError;
use shared::types::ErrorResponse;
use crate::error::ProvisioningError;

/// Request failures as seen by HTTP callers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("mac query parameter is required")]
    MissingMac,

    #[error("{0}")]
    InvalidMac(#[from] MacError),

    #[error("registry connection not available")]
    RegistryUnavailable,

    #[error("{0}")]
    Provisioning(#[from] ProvisioningError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingMac | ApiError::InvalidMac(_) => StatusCode::BAD_REQUEST,
            ApiError::RegistryUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Provisioning(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ApiError::MissingMac | ApiError::InvalidMac(_) => "Invalid MAC address",
            ApiError::RegistryUnavailable => "Registry unavailable",
            ApiError::Provisioning(_) => "Failed to assign port",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("{}: {}", self.title(), self);
        } else {
            tracing::warn!("{}: {}", self.title(), self);
        }

        let body = ErrorResponse {
            error: self.title().to_string(),
            detail: Some(self.to_string()),
        };

        (status, Json(body)).into_response()
    }
}
