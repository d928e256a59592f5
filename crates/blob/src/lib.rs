pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use error::BlobError;
pub use memory::MemoryObjectStore;
pub use store::ObjectStore;
pub use types::{ObjectMetadata, content_key};
