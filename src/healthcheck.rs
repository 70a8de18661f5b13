use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

type CheckFn = dyn Fn() -> Result<(), String> + Send + Sync;

/// A user-run predicate whose latest outcome is recorded for export.
///
/// [`check`](Healthcheck::check) runs the predicate and stores the result;
/// [`healthy`](Healthcheck::healthy) and
/// [`unhealthy`](Healthcheck::unhealthy) set the state directly.
#[derive(Clone)]
pub struct Healthcheck {
    inner: Arc<HealthcheckInner>,
}

struct HealthcheckInner {
    check: Box<CheckFn>,
    error: Mutex<Option<String>>,
}

impl Healthcheck {
    /// Creates a healthcheck around the given predicate.
    pub fn new(check: impl Fn() -> Result<(), String> + Send + Sync + 'static) -> Healthcheck {
        Healthcheck {
            inner: Arc::new(HealthcheckInner { check: Box::new(check), error: Mutex::new(None) }),
        }
    }

    /// Runs the predicate and records its outcome.
    pub fn check(&self) {
        let outcome = (self.inner.check)();
        *self.inner.error.lock() = outcome.err();
    }

    /// Marks the healthcheck as passing.
    pub fn healthy(&self) {
        *self.inner.error.lock() = None;
    }

    /// Marks the healthcheck as failing, with a reason.
    pub fn unhealthy(&self, reason: impl Into<String>) {
        *self.inner.error.lock() = Some(reason.into());
    }

    /// Returns the most recently recorded failure, if any.
    pub fn error(&self) -> Option<String> {
        self.inner.error.lock().clone()
    }

    /// Freezes the current outcome.
    pub fn snapshot(&self) -> HealthcheckSnapshot {
        HealthcheckSnapshot { error: self.error() }
    }
}

impl fmt::Debug for Healthcheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Healthcheck").field("error", &self.error()).finish_non_exhaustive()
    }
}

/// An immutable point-in-time reading of a [`Healthcheck`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthcheckSnapshot {
    error: Option<String>,
}

impl HealthcheckSnapshot {
    /// Returns the failure recorded at snapshot time, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering::Relaxed};
    use std::sync::Arc;

    use super::Healthcheck;

    #[test]
    fn test_check_records_outcome() {
        let failing = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&failing);
        let h = Healthcheck::new(move || {
            if flag.load(Relaxed) {
                Err("backend unreachable".to_string())
            } else {
                Ok(())
            }
        });

        h.check();
        assert_eq!(h.error(), None);

        failing.store(true, Relaxed);
        h.check();
        assert_eq!(h.error().as_deref(), Some("backend unreachable"));

        failing.store(false, Relaxed);
        h.check();
        assert_eq!(h.error(), None);
    }

    #[test]
    fn test_direct_transitions() {
        let h = Healthcheck::new(|| Ok(()));
        h.unhealthy("disk full");
        assert_eq!(h.error().as_deref(), Some("disk full"));

        h.healthy();
        assert_eq!(h.error(), None);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let h = Healthcheck::new(|| Ok(()));
        h.unhealthy("degraded");

        let snapshot = h.snapshot();
        h.healthy();

        assert_eq!(snapshot.error(), Some("degraded"));
        assert_eq!(h.error(), None);
    }
}
