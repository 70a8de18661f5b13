use std::sync::atomic::{AtomicI64, Ordering::Relaxed};
use std::sync::Arc;

/// A monotonic-by-convention integer counter.
///
/// Cheaply clonable; clones share the same underlying value.  All operations
/// are lock-free atomics.
#[derive(Clone, Debug, Default)]
pub struct Counter {
    inner: Arc<AtomicI64>,
}

impl Counter {
    /// Creates a counter starting at zero.
    pub fn new() -> Counter {
        Counter::default()
    }

    /// Increments the counter by `n`.
    pub fn inc(&self, n: i64) {
        self.inner.fetch_add(n, Relaxed);
    }

    /// Decrements the counter by `n`.
    pub fn dec(&self, n: i64) {
        self.inner.fetch_sub(n, Relaxed);
    }

    /// Returns the current count.
    pub fn count(&self) -> i64 {
        self.inner.load(Relaxed)
    }

    /// Resets the counter to zero.
    pub fn clear(&self) {
        self.inner.store(0, Relaxed);
    }

    /// Freezes the current count.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot { count: self.count() }
    }
}

/// An immutable point-in-time reading of a [`Counter`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CounterSnapshot {
    count: i64,
}

impl CounterSnapshot {
    /// Returns the count at the time of the snapshot.
    pub fn count(&self) -> i64 {
        self.count
    }
}
