use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag for a render running on another thread.
///
/// The renderer checks it before each page and before writing output, and
/// gives up with [`WatermarkError::Cancelled`](crate::WatermarkError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct RenderCancel(Arc<AtomicBool>);

impl RenderCancel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// A guard that cancels the render when dropped.
    #[must_use]
    pub fn guard(&self) -> CancelGuard {
        CancelGuard(self.clone())
    }
}

/// Cancels its [`RenderCancel`] on drop.
#[derive(Debug)]
pub struct CancelGuard(RenderCancel);

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let cancel = RenderCancel::new();
        let other = cancel.clone();
        assert!(!other.is_cancelled());
        cancel.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn dropping_the_guard_cancels() {
        let cancel = RenderCancel::new();
        {
            let _guard = cancel.guard();
            assert!(!cancel.is_cancelled());
        }
        assert!(cancel.is_cancelled());
    }
}
