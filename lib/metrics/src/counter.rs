use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonic counter, cheap to clone and safe to increment from any task.
#[derive(Clone, Debug, Default)]
pub struct Counter(Arc<AtomicU64>);

impl Counter {
    #[inline]
    pub fn inc(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
