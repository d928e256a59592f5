//! Buyer-facing email content.

use std::fmt::Write as _;

use vellum_core::PurchaseNotice;

use crate::backend::EmailMessage;
use crate::config::EmailConfig;

pub const DOWNLOAD_READY_SUBJECT: &str = "Your documents are ready";

/// Build the "documents are ready" email for `notice`.
///
/// Returns `None` when the buyer has no email address.
#[must_use]
pub fn download_ready(notice: &PurchaseNotice, config: &EmailConfig) -> Option<EmailMessage> {
    if !notice.has_recipient() {
        return None;
    }

    let noun = if notice.document_count == 1 {
        "document"
    } else {
        "documents"
    };

    let mut body = String::new();
    let _ = writeln!(body, "Hello {},", notice.buyer_name);
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Your purchase of \"{}\" is ready: {} {noun} available.",
        notice.offering_title, notice.document_count
    );
    let _ = writeln!(body, "Download: {}", notice.download_url);
    let _ = writeln!(body);
    let _ = writeln!(
        body,
        "Each file is personalised for you. Please do not share it."
    );
    let _ = writeln!(body);
    let _ = write!(body, "{}", config.app_name);

    let html = format!(
        "<p>Hello {name},</p>\
         <p>Your purchase of <strong>{title}</strong> is ready: {count} {noun} available.</p>\
         <p><a href=\"{url}\">Download your files</a></p>\
         <p>Each file is personalised for you. Please do not share it.</p>\
         <p>{app}</p>",
        name = escape_html(&notice.buyer_name),
        title = escape_html(&notice.offering_title),
        count = notice.document_count,
        url = escape_html(&notice.download_url),
        app = escape_html(&config.app_name),
    );

    Some(EmailMessage {
        from: config.from_address.clone(),
        to: notice.buyer_email.trim().to_owned(),
        subject: DOWNLOAD_READY_SUBJECT.to_owned(),
        body: Some(body),
        html_body: Some(html),
        reply_to: None,
    })
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn notice(email: &str) -> PurchaseNotice {
        PurchaseNotice {
            purchase_id: Uuid::nil(),
            buyer_name: "Ana <Souza>".into(),
            buyer_email: email.into(),
            offering_title: "Tax Guide & Forms".into(),
            document_count: 2,
            download_url: "https://shop.example.com/v1/purchases/abc/download".into(),
        }
    }

    fn config() -> EmailConfig {
        EmailConfig::new("smtp.example.com", "noreply@example.com")
    }

    #[test]
    fn skips_empty_address() {
        assert!(download_ready(&notice(""), &config()).is_none());
        assert!(download_ready(&notice("   "), &config()).is_none());
    }

    #[test]
    fn includes_link_and_subject() {
        let msg = download_ready(&notice(" ana@example.com "), &config()).unwrap();
        assert_eq!(msg.to, "ana@example.com");
        assert_eq!(msg.from, "noreply@example.com");
        assert_eq!(msg.subject, DOWNLOAD_READY_SUBJECT);
        let body = msg.body.unwrap();
        assert!(body.contains("https://shop.example.com/v1/purchases/abc/download"));
        assert!(body.contains("2 documents"));
    }

    #[test]
    fn html_body_is_escaped() {
        let msg = download_ready(&notice("ana@example.com"), &config()).unwrap();
        let html = msg.html_body.unwrap();
        assert!(html.contains("Ana &lt;Souza&gt;"));
        assert!(html.contains("Tax Guide &amp; Forms"));
        assert!(!html.contains("<Souza>"));
    }

    #[test]
    fn singular_noun_for_one_document() {
        let mut n = notice("ana@example.com");
        n.document_count = 1;
        let msg = download_ready(&n, &config()).unwrap();
        assert!(msg.body.unwrap().contains("1 document available"));
    }
}
