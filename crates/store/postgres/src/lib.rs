mod catalog;
mod config;
mod migrations;
mod rows;
mod store;

pub use catalog::PostgresCatalog;
pub use config::PostgresConfig;
pub use migrations::run_migrations;
pub use store::{PostgresPurchaseStore, connect};
