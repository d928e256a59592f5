pub mod download;
pub mod health;
pub mod openapi;
pub mod purchases;
pub mod schemas;
pub mod watermark;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use bytes::Bytes;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use vellum_delivery::DeliveryService;

use crate::error::ServerError;

use self::openapi::ApiDoc;

/// Largest accepted upload for `POST /v1/watermark`.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub delivery: Arc<DeliveryService>,
    /// Key guarding the standalone watermark endpoint. Disabled when `None`.
    pub app_key: Option<Arc<str>>,
}

/// Build the Axum router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/v1/offerings/{offering_id}/purchases",
            post(purchases::create_purchases),
        )
        .route(
            "/v1/purchases/{purchase_id}/download",
            get(download::download),
        )
        .route(
            "/v1/watermark",
            post(watermark::watermark).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Parse a UUID taken from the path or query string.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<Uuid, ServerError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServerError::BadRequest(format!("invalid {what} id")))
}

/// A file response with `Content-Disposition: attachment`.
pub(crate) fn attachment(content: Bytes, media_type: &str, file_name: &str) -> Response {
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        header_safe(file_name)
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    let content_type = HeaderValue::from_str(media_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response()
}

/// Replace characters that cannot appear inside a quoted header parameter.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_safe_replaces_quotes_and_non_ascii() {
        assert_eq!(header_safe("guide v2.pdf"), "guide v2.pdf");
        assert_eq!(header_safe("a\"b\\c.pdf"), "a_b_c.pdf");
        assert_eq!(header_safe("relatório.pdf"), "relat_rio.pdf");
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(parse_id("not-a-uuid", "purchase").is_err());
        let id = Uuid::now_v7();
        assert_eq!(parse_id(&format!(" {id} "), "purchase").unwrap(), id);
    }
}
