mod catalog;
mod store;

pub use catalog::MemoryCatalog;
pub use store::MemoryPurchaseStore;
