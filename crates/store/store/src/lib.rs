pub mod catalog;
pub mod error;
pub mod store;
pub mod testing;

pub use catalog::Catalog;
pub use error::StoreError;
pub use store::{ConsumeOutcome, PurchaseStore};
