pub mod error;
pub mod record;
pub mod store;
pub mod testing;

pub use error::AuditError;
pub use record::{AccessAction, AccessOutcome, AccessRecord};
pub use store::AuditStore;
