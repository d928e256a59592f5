//! Stamps a buyer identity onto every page of a PDF.
//!
//! [`Watermarker::stamp`] appends one overlay content stream per page and
//! leaves existing page content untouched. Output depends only on the input
//! bytes, the identity and the [`WatermarkStyle`], so stamping the same
//! document twice yields identical bytes.

mod cancel;
mod error;
mod metrics;
mod render;
mod style;
pub mod testing;

pub use cancel::{CancelGuard, RenderCancel};
pub use error::WatermarkError;
pub use render::{Watermarker, stamp};
pub use style::{Placement, Position, WatermarkStyle};
