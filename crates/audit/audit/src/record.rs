use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the caller tried to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    Download,
    Listing,
}

/// How an access attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AccessOutcome {
    Delivered,
    Expired,
    QuotaExceeded,
    NotFound,
    Failed,
}

macro_rules! str_enum {
    ($ty:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable storage form.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant),)+
                    other => Err(format!(concat!("unknown ", stringify!($ty), ": {}"), other)),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(AccessAction {
    Download => "download",
    Listing => "listing",
});

str_enum!(AccessOutcome {
    Delivered => "delivered",
    Expired => "expired",
    QuotaExceeded => "quota_exceeded",
    NotFound => "not_found",
    Failed => "failed",
});

/// One download or listing attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AccessRecord {
    /// Unique identifier (UUID-v7).
    pub id: Uuid,
    pub purchase_id: Uuid,
    /// Requested document; `None` for listings.
    pub document_id: Option<Uuid>,
    pub action: AccessAction,
    pub outcome: AccessOutcome,
    /// Short human-readable explanation. Never contains storage keys.
    #[serde(default)]
    pub detail: String,
    pub occurred_at: DateTime<Utc>,
}

impl AccessRecord {
    #[must_use]
    pub fn new(
        purchase_id: Uuid,
        document_id: Option<Uuid>,
        action: AccessAction,
        outcome: AccessOutcome,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            purchase_id,
            document_id,
            action,
            outcome,
            detail: String::new(),
            occurred_at,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_string_forms() {
        for outcome in [
            AccessOutcome::Delivered,
            AccessOutcome::Expired,
            AccessOutcome::QuotaExceeded,
            AccessOutcome::NotFound,
            AccessOutcome::Failed,
        ] {
            assert_eq!(outcome.as_str().parse::<AccessOutcome>(), Ok(outcome));
        }
        assert!("granted".parse::<AccessOutcome>().is_err());
        assert_eq!(AccessOutcome::QuotaExceeded.to_string(), "quota_exceeded");
    }

    #[test]
    fn serializes_snake_case() {
        let record = AccessRecord::new(
            Uuid::nil(),
            None,
            AccessAction::Listing,
            AccessOutcome::QuotaExceeded,
            Utc::now(),
        )
        .with_detail("limit 2 reached");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["action"], "listing");
        assert_eq!(json["outcome"], "quota_exceeded");
        assert_eq!(json["detail"], "limit 2 reached");
        assert!(json["document_id"].is_null());
    }
}
