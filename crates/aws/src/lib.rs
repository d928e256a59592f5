//! S3 backend for the Vellum object store.
//!
//! [`S3ObjectStore`] implements [`vellum_blob::ObjectStore`] on top of
//! `aws-sdk-s3`. Credentials come from the standard AWS environment chain,
//! optionally exchanged for an assumed role (see [`auth::build_sdk_config`]).

pub mod auth;
pub mod config;
pub mod error;
pub mod s3;

pub use config::AwsBaseConfig;
pub use error::AwsError;
pub use s3::{S3Config, S3ObjectStore};
