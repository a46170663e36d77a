//! Gateway error surface.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mitos_core::accounts::AccountError;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the HTTP endpoints.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Credentials did not check out or the token is unknown.
    #[error("invalid credentials or token")]
    Unauthorized,
    /// The account store failed.
    #[error(transparent)]
    Storage(#[from] AccountError),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Storage(error) => {
                log::error!("account store failure: {error}");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}
