use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::Duration;

use vellum_core::{DownloadLimit, GrantPolicy, PolicyError};
use vellum_delivery::DeliveryError;

use crate::error::ServerError;

use super::schemas::{CreatePurchasesRequest, CreatePurchasesResponse, ErrorResponse};
use super::{AppState, parse_id};

/// `POST /v1/offerings/{offering_id}/purchases` -- grant an offering to a
/// batch of buyers.
#[utoipa::path(
    post,
    path = "/v1/offerings/{offering_id}/purchases",
    tag = "Purchases",
    summary = "Create purchases",
    description = "Creates one purchase per buyer, all or nothing. Omitted expiry or limit fall back to the server defaults; null means no expiry or no cap. Buyers are notified in the background.",
    params(
        ("offering_id" = String, Path, description = "Offering UUID")
    ),
    request_body(content = CreatePurchasesRequest, description = "Buyers and access policy"),
    responses(
        (status = 200, description = "Batch committed", body = CreatePurchasesResponse),
        (status = 400, description = "Invalid ids or policy", body = ErrorResponse),
        (status = 404, description = "Unknown offering or buyers", body = ErrorResponse),
        (status = 500, description = "Purchase storage unavailable", body = ErrorResponse)
    )
)]
pub async fn create_purchases(
    State(state): State<AppState>,
    Path(offering_id): Path<String>,
    body: Result<Json<CreatePurchasesRequest>, JsonRejection>,
) -> Result<Json<CreatePurchasesResponse>, ServerError> {
    let offering_id = parse_id(&offering_id, "offering")?;
    let Json(request) = body.map_err(|e| ServerError::BadRequest(e.body_text()))?;

    let policy = resolve_policy(&request, state.delivery.config().default_policy)?;
    let purchases = state
        .delivery
        .create_batch(offering_id, &request.buyer_ids, policy)
        .await?;

    Ok(Json(CreatePurchasesResponse {
        created: purchases.len(),
        purchase_ids: purchases.iter().map(|p| p.id).collect(),
    }))
}

/// Merge request overrides into the configured default policy.
fn resolve_policy(
    request: &CreatePurchasesRequest,
    default: GrantPolicy,
) -> Result<GrantPolicy, DeliveryError> {
    let validity = match request.expires_in_days {
        None => default.validity,
        Some(days) => days
            .map(|d| Duration::try_days(d).ok_or(PolicyError::ValidityOutOfRange(d)))
            .transpose()?,
    };
    let download_limit = match request.download_limit {
        None => default.download_limit,
        Some(limit) => DownloadLimit::from(limit),
    };
    Ok(GrantPolicy {
        validity,
        download_limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> CreatePurchasesRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn omitted_fields_take_defaults() {
        let default = GrantPolicy::days(30, DownloadLimit::Limited(5)).unwrap();
        let policy = resolve_policy(&request(r#"{"buyer_ids": []}"#), default).unwrap();
        assert_eq!(policy, default);
    }

    #[test]
    fn null_fields_lift_restrictions() {
        let default = GrantPolicy::days(30, DownloadLimit::Limited(5)).unwrap();
        let policy = resolve_policy(
            &request(r#"{"buyer_ids": [], "expires_in_days": null, "download_limit": null}"#),
            default,
        )
        .unwrap();
        assert_eq!(policy.validity, None);
        assert_eq!(policy.download_limit, DownloadLimit::Unlimited);
    }

    #[test]
    fn explicit_values_win() {
        let policy = resolve_policy(
            &request(r#"{"buyer_ids": [], "expires_in_days": 7, "download_limit": 2}"#),
            GrantPolicy::default(),
        )
        .unwrap();
        assert_eq!(policy, GrantPolicy::days(7, DownloadLimit::Limited(2)).unwrap());
    }

    #[test]
    fn validity_beyond_duration_range_is_a_validation_error() {
        let err = resolve_policy(
            &request(r#"{"buyer_ids": [], "expires_in_days": 9223372036854775807}"#),
            GrantPolicy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeliveryError::Validation(_)));
    }
}
