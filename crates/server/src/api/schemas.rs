use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Response body for `GET /health`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
}

/// Request body for creating a purchase batch.
///
/// Leaving `expires_in_days` or `download_limit` out applies the server
/// default; sending `null` means no expiry or no cap.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePurchasesRequest {
    /// Buyers receiving one purchase each. Duplicates are collapsed.
    pub buyer_ids: Vec<Uuid>,
    /// Days until the purchases expire.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<i64>, example = 30)]
    pub expires_in_days: Option<Option<i64>>,
    /// Downloads allowed per purchase.
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<u32>, example = 3)]
    pub download_limit: Option<Option<u32>>,
}

/// Tell an absent field (`None`) apart from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Response body after a purchase batch commits.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreatePurchasesResponse {
    #[schema(example = 3)]
    pub created: usize,
    pub purchase_ids: Vec<Uuid>,
}

/// Generic error response returned on failures.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    #[schema(example = "purchase not found")]
    pub error: String,
    /// Machine-readable error code.
    #[schema(example = "not_found")]
    pub code: String,
    /// Whole days since expiry, only on `expired`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_expired: Option<i64>,
}

/// Multipart form accepted by `POST /v1/watermark`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct WatermarkForm {
    /// Text stamped on every page.
    #[schema(example = "Ana Souza - 123.456.789-00")]
    pub content: String,
    /// The PDF to stamp.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_null_differ() {
        let absent: CreatePurchasesRequest = serde_json::from_str(r#"{"buyer_ids": []}"#).unwrap();
        assert_eq!(absent.expires_in_days, None);
        assert_eq!(absent.download_limit, None);

        let null: CreatePurchasesRequest = serde_json::from_str(
            r#"{"buyer_ids": [], "expires_in_days": null, "download_limit": null}"#,
        )
        .unwrap();
        assert_eq!(null.expires_in_days, Some(None));
        assert_eq!(null.download_limit, Some(None));

        let set: CreatePurchasesRequest = serde_json::from_str(
            r#"{"buyer_ids": [], "expires_in_days": 7, "download_limit": 2}"#,
        )
        .unwrap();
        assert_eq!(set.expires_in_days, Some(Some(7)));
        assert_eq!(set.download_limit, Some(Some(2)));
    }

    #[test]
    fn negative_limit_is_rejected() {
        let parsed: Result<CreatePurchasesRequest, _> =
            serde_json::from_str(r#"{"buyer_ids": [], "download_limit": -1}"#);
        assert!(parsed.is_err());
    }
}
