//! Gateway error taxonomy and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Incomplete or malformed input; the message is shown to the caller
    #[error("{0}")]
    Validation(String),

    #[error("Only POST supported")]
    MethodNotAllowed,

    /// Anything that went wrong talking to the completion service
    #[error("Translation failed")]
    Upstream(#[from] anyhow::Error),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// `{ "error": ... }` body shared by every failure response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::Upstream(ref e) = self {
            error!("Translation failed: {:#}", e);
        }

        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
