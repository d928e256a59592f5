use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use thiserror::Error;

use vellum_delivery::DeliveryError;

/// Errors that can occur when running the Vellum server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A delivery pipeline error surfaced through the API.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// The request is malformed (bad path ids, missing multipart fields).
    #[error("{0}")]
    BadRequest(String),

    /// Missing or wrong `x-app-key`.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The route exists but is switched off.
    #[error("{0}")]
    NotFound(String),

    /// The uploaded document cannot be processed.
    #[error("{0}")]
    Unprocessable(String),
}

impl ServerError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Config(_) | Self::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Unprocessable(_) => (StatusCode::UNPROCESSABLE_ENTITY, "render_error"),
            Self::Delivery(e) => {
                let status = match e {
                    DeliveryError::NotFound(_) => StatusCode::NOT_FOUND,
                    DeliveryError::Expired { .. } => StatusCode::GONE,
                    DeliveryError::QuotaExceeded { .. } => StatusCode::FORBIDDEN,
                    DeliveryError::Upstream(_) | DeliveryError::Render(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    DeliveryError::Validation(_) => StatusCode::BAD_REQUEST,
                };
                (status, e.code())
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }

        let days_expired = match &self {
            Self::Delivery(e) => e.days_expired(Utc::now()),
            _ => None,
        };
        let body = if let Some(days) = days_expired {
            serde_json::json!({ "error": self.to_string(), "code": code, "days_expired": days })
        } else {
            serde_json::json!({ "error": self.to_string(), "code": code })
        };

        (status, axum::Json(body)).into_response()
    }
}
