//! Purchase lifecycle management.
//!
//! [`DeliveryService`] creates purchases in batches and serves downloads
//! through the gated pipeline: evaluate the entitlement, fetch the source,
//! stamp the buyer identity, record the consumed download, then hand the
//! file back. Notifications and access audit records are dispatched in the
//! background and never affect the caller.

pub mod builder;
pub mod config;
pub mod error;
pub mod file;
pub mod notifier;
pub mod service;

pub use builder::DeliveryServiceBuilder;
pub use config::DeliveryConfig;
pub use error::{DeliveryError, NotifyError};
pub use file::{DeliveredFile, ListedDocument, PurchaseListing, download_file_name};
pub use notifier::{EmailNotifier, LoggingNotifier, Notifier};
pub use service::DeliveryService;
