//! Application error types with Axum response mapping.
//!
//! Bodies are deliberately generic; the detailed cause goes to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::cognito::client::TokenExchangeError;
use crate::cognito::params::ConfigFetchError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("identity provider configuration unavailable: {0}")]
    ConfigUnavailable(#[from] ConfigFetchError),

    #[error("invalid authentication callback: {0}")]
    InvalidCallback(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(#[from] TokenExchangeError),

    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status and JSON body sent to the client.
    pub fn status_and_body(&self) -> (StatusCode, serde_json::Value) {
        match self {
            AppError::ConfigUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({"error": "Service configuration unavailable"}),
            ),
            AppError::InvalidCallback(_) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid authentication callback"}),
            ),
            AppError::TokenExchange(TokenExchangeError::Rejected { .. }) => (
                StatusCode::BAD_REQUEST,
                json!({"error": "Authentication failed"}),
            ),
            AppError::TokenExchange(_) => (
                StatusCode::BAD_GATEWAY,
                json!({"error": "Identity provider unavailable"}),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, json!({"message": "Forbidden"})),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": "Internal error"}),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        (status, axum::Json(body)).into_response()
    }
}
