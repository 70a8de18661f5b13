//! Instantaneous-value instruments.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering::Relaxed};
use std::sync::Arc;

/// Holds the most recent `i64` value it was updated to.
#[derive(Clone, Debug, Default)]
pub struct Gauge {
    inner: Arc<AtomicI64>,
}

impl Gauge {
    /// Creates a gauge starting at zero.
    pub fn new() -> Gauge {
        Gauge::default()
    }

    /// Replaces the gauge's value.
    pub fn update(&self, value: i64) {
        self.inner.store(value, Relaxed);
    }

    /// Returns the last value the gauge was updated to.
    pub fn value(&self) -> i64 {
        self.inner.load(Relaxed)
    }

    /// Freezes the current value.
    pub fn snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot { value: self.value() }
    }
}

/// An immutable point-in-time reading of a [`Gauge`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GaugeSnapshot {
    value: i64,
}

impl GaugeSnapshot {
    /// Returns the value at the time of the snapshot.
    pub fn value(&self) -> i64 {
        self.value
    }
}

/// Holds the most recent `f64` value it was updated to.
///
/// The value is stored as its IEEE 754 bit pattern in an atomic, so updates
/// and reads stay lock-free.
#[derive(Clone, Debug, Default)]
pub struct GaugeFloat {
    inner: Arc<AtomicU64>,
}

impl GaugeFloat {
    /// Creates a gauge starting at zero.
    pub fn new() -> GaugeFloat {
        GaugeFloat::default()
    }

    /// Replaces the gauge's value.
    pub fn update(&self, value: f64) {
        self.inner.store(value.to_bits(), Relaxed);
    }

    /// Returns the last value the gauge was updated to.
    pub fn value(&self) -> f64 {
        f64::from_bits(self.inner.load(Relaxed))
    }

    /// Freezes the current value.
    pub fn snapshot(&self) -> GaugeFloatSnapshot {
        GaugeFloatSnapshot { value: self.value() }
    }
}

/// An immutable point-in-time reading of a [`GaugeFloat`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaugeFloatSnapshot {
    value: f64,
}

impl GaugeFloatSnapshot {
    /// Returns the value at the time of the snapshot.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// A read-only gauge whose `i64` value is produced on demand by a closure.
#[derive(Clone)]
pub struct FunctionalGauge {
    f: Arc<dyn Fn() -> i64 + Send + Sync>,
}

impl FunctionalGauge {
    /// Creates a gauge backed by `f`.
    pub fn new(f: impl Fn() -> i64 + Send + Sync + 'static) -> FunctionalGauge {
        FunctionalGauge { f: Arc::new(f) }
    }

    /// Invokes the producer and returns its value.
    pub fn value(&self) -> i64 {
        (self.f)()
    }

    /// Freezes the producer's current value.
    pub fn snapshot(&self) -> GaugeSnapshot {
        GaugeSnapshot { value: self.value() }
    }
}

impl fmt::Debug for FunctionalGauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalGauge").finish_non_exhaustive()
    }
}

/// A read-only gauge whose `f64` value is produced on demand by a closure.
#[derive(Clone)]
pub struct FunctionalGaugeFloat {
    f: Arc<dyn Fn() -> f64 + Send + Sync>,
}

impl FunctionalGaugeFloat {
    /// Creates a gauge backed by `f`.
    pub fn new(f: impl Fn() -> f64 + Send + Sync + 'static) -> FunctionalGaugeFloat {
        FunctionalGaugeFloat { f: Arc::new(f) }
    }

    /// Invokes the producer and returns its value.
    pub fn value(&self) -> f64 {
        (self.f)()
    }

    /// Freezes the producer's current value.
    pub fn snapshot(&self) -> GaugeFloatSnapshot {
        GaugeFloatSnapshot { value: self.value() }
    }
}

impl fmt::Debug for FunctionalGaugeFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionalGaugeFloat").finish_non_exhaustive()
    }
}
