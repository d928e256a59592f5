pub mod backend;
pub mod compose;
pub mod config;
pub mod error;
pub mod smtp;

pub use backend::{EmailBackend, EmailMessage, EmailResult};
pub use compose::download_ready;
pub use config::{EmailConfig, SmtpConfig};
pub use error::EmailError;
pub use smtp::SmtpBackend;
