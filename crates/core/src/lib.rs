pub mod entitlement;
pub mod notice;
pub mod offering;
pub mod policy;
pub mod purchase;
pub mod size;

pub use entitlement::{Entitlement, evaluate};
pub use notice::PurchaseNotice;
pub use offering::{Buyer, Document, Offering, PDF_MEDIA_TYPE};
pub use policy::{DEFAULT_VALIDITY_DAYS, GrantPolicy, MAX_DOWNLOAD_LIMIT, PolicyError};
pub use purchase::{BuyerSnapshot, DownloadLimit, DownloadLog, Purchase};
pub use size::format_size;
