//! Batched invalidation.
//!
//! Views refresh after every structural change unless refresh is suspended.
//! [`InvalidationBatch`] is the bookkeeping for that: a suspend depth plus a
//! dirty flag. While the depth is non-zero, invalidations only mark the batch
//! dirty; the final `resume` reports whether a flush is owed.
//!
//! ```
//! use horizon_grid_core::InvalidationBatch;
//!
//! let mut batch = InvalidationBatch::new();
//! batch.suspend();
//! assert!(!batch.invalidate());
//! assert!(!batch.invalidate());
//! assert!(batch.resume());
//! assert!(batch.invalidate());
//! ```

use crate::logging::targets;

/// Suspend depth plus dirty flag for deferred refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationBatch {
    depth: usize,
    dirty: bool,
}

impl InvalidationBatch {
    /// Creates an idle batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters one level of suspension.
    pub fn suspend(&mut self) {
        self.depth += 1;
        tracing::trace!(target: targets::BATCH, depth = self.depth, "suspended");
    }

    /// Leaves one level of suspension.
    ///
    /// Returns `true` when this was the outermost level and something was
    /// invalidated while suspended; the caller then performs one refresh.
    /// Unbalanced calls are ignored.
    pub fn resume(&mut self) -> bool {
        if self.depth == 0 {
            tracing::warn!(target: targets::BATCH, "resume without matching suspend");
            return false;
        }
        self.depth -= 1;
        tracing::trace!(target: targets::BATCH, depth = self.depth, dirty = self.dirty, "resumed");
        if self.depth == 0 && self.dirty {
            self.dirty = false;
            true
        } else {
            false
        }
    }

    /// Records an invalidation.
    ///
    /// Returns `true` if the caller should refresh now, `false` if the
    /// refresh was deferred.
    pub fn invalidate(&mut self) -> bool {
        if self.depth > 0 {
            self.dirty = true;
            false
        } else {
            true
        }
    }

    /// Whether refresh is currently suspended.
    pub fn is_suspended(&self) -> bool {
        self.depth > 0
    }

    /// Whether an invalidation is pending behind a suspension.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_suspend_flushes_once() {
        let mut batch = InvalidationBatch::new();
        batch.suspend();
        batch.suspend();
        assert!(!batch.invalidate());
        assert!(batch.is_dirty());
        assert!(!batch.resume());
        assert!(batch.is_suspended());
        assert!(batch.resume());
        assert!(!batch.is_dirty());
        assert!(!batch.is_suspended());
    }

    #[test]
    fn test_clean_resume_does_not_flush() {
        let mut batch = InvalidationBatch::new();
        batch.suspend();
        assert!(!batch.resume());
    }

    #[test]
    fn test_unbalanced_resume_is_ignored() {
        let mut batch = InvalidationBatch::new();
        assert!(!batch.resume());
        assert!(batch.invalidate());
    }
}
