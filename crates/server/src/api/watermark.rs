use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::Response;
use bytes::Bytes;
use subtle::ConstantTimeEq;
use tracing::info;

use vellum_core::PDF_MEDIA_TYPE;
use vellum_delivery::DeliveryError;

use crate::error::ServerError;

use super::schemas::{ErrorResponse, WatermarkForm};
use super::{AppState, attachment};

/// Header carrying the shared key.
pub const APP_KEY_HEADER: &str = "x-app-key";

const DEFAULT_FILE_NAME: &str = "document.pdf";

/// `POST /v1/watermark` -- stamp arbitrary text onto an uploaded PDF.
#[utoipa::path(
    post,
    path = "/v1/watermark",
    tag = "Watermark",
    summary = "Watermark a PDF",
    description = "Stamps the `content` text onto every page of the uploaded `file` and returns the result as an attachment. Requires the x-app-key header.",
    request_body(content = WatermarkForm, content_type = "multipart/form-data"),
    params(
        ("x-app-key" = String, Header, description = "Shared application key")
    ),
    responses(
        (status = 200, description = "Stamped PDF (application/pdf attachment)"),
        (status = 400, description = "Missing file or empty content", body = ErrorResponse),
        (status = 401, description = "Missing or wrong app key", body = ErrorResponse),
        (status = 404, description = "Endpoint disabled", body = ErrorResponse),
        (status = 422, description = "File is not a readable PDF", body = ErrorResponse)
    )
)]
pub async fn watermark(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let Some(expected) = state.app_key.as_deref() else {
        return Err(ServerError::NotFound("watermark endpoint is disabled".into()));
    };
    let provided = headers
        .get(APP_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        return Err(ServerError::Unauthorized("invalid app key".into()));
    }

    let mut content = None;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("content") => content = Some(field.text().await.map_err(bad_multipart)?),
            Some("file") => file = Some(read_file(field).await?),
            _ => {}
        }
    }

    let content = content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(ServerError::BadRequest("content must not be empty".into()));
    }
    let (file_name, source) =
        file.ok_or_else(|| ServerError::BadRequest("missing file field".into()))?;
    if source.is_empty() {
        return Err(ServerError::BadRequest("file is empty".into()));
    }

    let size = source.len();
    let stamped = state
        .delivery
        .watermark(source, content.trim().to_owned())
        .await
        .map_err(|e| match e {
            DeliveryError::Render(msg) => ServerError::Unprocessable(msg),
            other => ServerError::Delivery(other),
        })?;
    info!(file = %file_name, bytes = size, "standalone watermark applied");

    Ok(attachment(Bytes::from(stamped), PDF_MEDIA_TYPE, &file_name))
}

async fn read_file(field: Field<'_>) -> Result<(String, Bytes), ServerError> {
    let file_name = field
        .file_name()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_FILE_NAME)
        .to_owned();
    let data = field.bytes().await.map_err(bad_multipart)?;
    Ok((file_name, data))
}

#[allow(clippy::needless_pass_by_value)]
fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ServerError {
    ServerError::BadRequest(format!("invalid multipart body: {}", e.body_text()))
}
