use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tells a buyer that a new purchase can be downloaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseNotice {
    pub purchase_id: Uuid,
    pub buyer_name: String,
    /// May be empty, in which case nothing is sent.
    pub buyer_email: String,
    pub offering_title: String,
    pub document_count: usize,
    /// Absolute link to the purchase's download endpoint.
    pub download_url: String,
}

impl PurchaseNotice {
    /// Whether there is an address to deliver the notice to.
    #[must_use]
    pub fn has_recipient(&self) -> bool {
        !self.buyer_email.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_email_has_no_recipient() {
        let mut notice = PurchaseNotice {
            purchase_id: Uuid::nil(),
            buyer_name: "Ana".into(),
            buyer_email: "  ".into(),
            offering_title: "Guide".into(),
            document_count: 1,
            download_url: "https://example.com".into(),
        };
        assert!(!notice.has_recipient());
        notice.buyer_email = "ana@example.com".into();
        assert!(notice.has_recipient());
    }
}
