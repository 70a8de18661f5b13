use std::sync::Arc;
use std::time::Duration;

use quanta::{Clock, Instant};

use crate::histogram::{Histogram, HistogramSnapshot};
use crate::meter::{Meter, MeterSnapshot};
use crate::sample::ExpDecaySample;

/// Measures both the duration distribution and the rate of an operation.
///
/// A timer is a composition: durations (as nanoseconds) feed a
/// [`Histogram`], while each call marks a [`Meter`] once.  Statistics reads
/// go to the histogram, rate reads to the meter.
#[derive(Clone, Debug)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

#[derive(Debug)]
struct TimerInner {
    histogram: Histogram,
    meter: Meter,
    clock: Clock,
}

impl Timer {
    /// Creates a timer over an exponentially-decaying sample and the real
    /// clock.
    pub fn new() -> Timer {
        Timer::with_clock(Clock::new())
    }

    /// Creates a timer on the given clock, with a default histogram and
    /// meter.
    pub fn with_clock(clock: Clock) -> Timer {
        let histogram =
            Histogram::new(ExpDecaySample::builder().clock(clock.clone()).build());
        let meter = Meter::with_clock(clock.clone());
        Timer::custom(histogram, meter, clock)
    }

    /// Composes a timer from an existing histogram and meter.
    pub fn custom(histogram: Histogram, meter: Meter, clock: Clock) -> Timer {
        Timer { inner: Arc::new(TimerInner { histogram, meter, clock }) }
    }

    /// Records the duration of one completed operation.
    pub fn update(&self, duration: Duration) {
        self.inner.histogram.update(duration.as_nanos() as i64);
        self.inner.meter.mark(1);
    }

    /// Records the time elapsed since `start`.
    pub fn update_since(&self, start: Instant) {
        self.update(self.inner.clock.now().duration_since(start));
    }

    /// Measures the wall-clock duration of `f`, records it, and returns
    /// `f`'s result.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = self.inner.clock.now();
        let result = f();
        self.update_since(start);
        result
    }

    /// Returns the number of durations recorded.
    pub fn count(&self) -> u64 {
        self.inner.histogram.count()
    }

    /// Returns the largest retained duration, in nanoseconds.
    pub fn max(&self) -> i64 {
        self.inner.histogram.max()
    }

    /// Returns the mean retained duration, in nanoseconds.
    pub fn mean(&self) -> f64 {
        self.inner.histogram.mean()
    }

    /// Returns the smallest retained duration, in nanoseconds.
    pub fn min(&self) -> i64 {
        self.inner.histogram.min()
    }

    /// Returns an estimate of the given duration quantile.
    pub fn percentile(&self, p: f64) -> f64 {
        self.inner.histogram.percentile(p)
    }

    /// Returns estimates for each requested quantile, in request order.
    pub fn percentiles(&self, ps: &[f64]) -> Vec<f64> {
        self.inner.histogram.percentiles(ps)
    }

    /// Returns the population standard deviation of retained durations.
    pub fn std_dev(&self) -> f64 {
        self.inner.histogram.std_dev()
    }

    /// Returns the sum of retained durations, in nanoseconds.
    pub fn sum(&self) -> i64 {
        self.inner.histogram.sum()
    }

    /// Returns the population variance of retained durations.
    pub fn variance(&self) -> f64 {
        self.inner.histogram.variance()
    }

    /// Returns the one-minute moving average call rate.
    pub fn rate1(&self) -> f64 {
        self.inner.meter.rate1()
    }

    /// Returns the five-minute moving average call rate.
    pub fn rate5(&self) -> f64 {
        self.inner.meter.rate5()
    }

    /// Returns the fifteen-minute moving average call rate.
    pub fn rate15(&self) -> f64 {
        self.inner.meter.rate15()
    }

    /// Returns the mean call rate since the timer was created.
    pub fn rate_mean(&self) -> f64 {
        self.inner.meter.rate_mean()
    }

    /// Stops the timer's meter, removing it from the arbiter.
    pub fn stop(&self) {
        self.inner.meter.stop();
    }

    /// Freezes the timer's histogram and meter readings.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            histogram: self.inner.histogram.snapshot(),
            meter: self.inner.meter.snapshot(),
        }
    }
}

impl Default for Timer {
    fn default() -> Timer {
        Timer::new()
    }
}

/// An immutable point-in-time reading of a [`Timer`].
#[derive(Clone, Debug)]
pub struct TimerSnapshot {
    histogram: HistogramSnapshot,
    meter: MeterSnapshot,
}

impl TimerSnapshot {
    /// Returns the frozen duration distribution.
    pub fn histogram(&self) -> &HistogramSnapshot {
        &self.histogram
    }

    /// Returns the frozen rate readings.
    pub fn meter(&self) -> &MeterSnapshot {
        &self.meter
    }
}
