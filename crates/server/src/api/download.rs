use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::ServerError;

use super::schemas::ErrorResponse;
use super::{AppState, attachment, parse_id};

/// Header reporting downloads left after this one, on limited purchases.
pub const REMAINING_HEADER: &str = "x-downloads-remaining";

/// Query parameters for the download endpoint.
#[derive(Debug, Deserialize, Default)]
pub struct DownloadQuery {
    /// Document to download. Lists the purchase's documents when absent.
    pub document_id: Option<String>,
}

/// `GET /v1/purchases/{purchase_id}/download` -- fetch a watermarked copy of
/// one document, or list the documents when `document_id` is absent.
#[utoipa::path(
    get,
    path = "/v1/purchases/{purchase_id}/download",
    tag = "Downloads",
    summary = "Download or list documents",
    description = "With document_id, returns the document stamped with the buyer's identity and counts one download. Without it, lists the purchase's documents behind the same expiry and quota check.",
    params(
        ("purchase_id" = String, Path, description = "Purchase UUID"),
        ("document_id" = Option<String>, Query, description = "Document UUID")
    ),
    responses(
        (status = 200, description = "Watermarked file (attachment) or document listing", body = vellum_delivery::PurchaseListing),
        (status = 400, description = "Malformed ids", body = ErrorResponse),
        (status = 403, description = "Download limit reached", body = ErrorResponse),
        (status = 404, description = "Unknown purchase or document", body = ErrorResponse),
        (status = 410, description = "Purchase expired", body = ErrorResponse),
        (status = 500, description = "Document cannot be rendered, or storage failed; see `code`", body = ErrorResponse)
    )
)]
pub async fn download(
    State(state): State<AppState>,
    Path(purchase_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ServerError> {
    let purchase_id = parse_id(&purchase_id, "purchase")?;

    let Some(document_id) = query.document_id.as_deref().filter(|s| !s.trim().is_empty()) else {
        let listing = state.delivery.list_documents(purchase_id).await?;
        return Ok(Json(listing).into_response());
    };
    let document_id = parse_id(document_id, "document")?;

    let file = state
        .delivery
        .request_download(purchase_id, document_id)
        .await?;

    let mut response = attachment(file.content, &file.media_type, &file.file_name);
    if let Some(remaining) = file.purchase.remaining_downloads() {
        response
            .headers_mut()
            .insert(REMAINING_HEADER, HeaderValue::from(remaining));
    }
    Ok(response)
}
