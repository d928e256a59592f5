pub mod api;
pub mod audit_factory;
pub mod blob_factory;
pub mod config;
pub mod error;
pub mod notifier_factory;
pub mod store_factory;
pub mod telemetry;
