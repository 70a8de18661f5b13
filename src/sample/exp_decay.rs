use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use quanta::{Clock, Instant};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use super::{
    sample_max, sample_mean, sample_min, sample_percentiles, sample_sum, sample_variance, Sample,
    SampleSnapshot,
};

const DEFAULT_RESERVOIR_SIZE: usize = 1028;
const DEFAULT_ALPHA: f64 = 0.015;
const DEFAULT_RESCALE_THRESHOLD: Duration = Duration::from_secs(60 * 60);

/// A fixed-size, time-weighted reservoir using forward decay.
///
/// Each observation is assigned the priority `exp(alpha * delta) / u`, where
/// `delta` is the time in seconds since the start of the current epoch and
/// `u` is a uniform draw from `(0, 1]`.  The reservoir keeps the
/// highest-priority observations in a bounded min-heap, so recent
/// observations stochastically displace older ones and percentile estimates
/// track the recent past.  See Cormode et al., "Forward Decay: A Practical
/// Time Decay Model for Streaming Systems" (2009).
///
/// Priorities grow without bound within an epoch.  Once per
/// `rescale_threshold` the epoch restarts: every retained priority is scaled
/// down by the decay accumulated over the old epoch, and entries whose
/// priority underflows to zero are forgotten.  The rescale check runs on
/// reads as well as writes, so a dormant reservoir forgets stale
/// observations the next time anything looks at it.
///
/// Time is read through a [`quanta::Clock`], injectable for deterministic
/// tests.
#[derive(Debug)]
pub struct ExpDecaySample {
    capacity: usize,
    alpha: f64,
    rescale_threshold: Duration,
    clock: Clock,
    inner: Mutex<ExpDecayInner>,
}

#[derive(Debug)]
struct ExpDecayInner {
    count: u64,
    t0: Instant,
    next_rescale: Instant,
    heap: BinaryHeap<Reverse<WeightedValue>>,
    rng: Xoshiro256StarStar,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct WeightedValue {
    priority: OrderedFloat<f64>,
    value: i64,
}

impl ExpDecaySample {
    /// Creates a sample with the default parameters: reservoir size 1028,
    /// alpha 0.015, rescale threshold one hour.
    pub fn new() -> ExpDecaySample {
        ExpDecaySample::builder().build()
    }

    /// Returns a builder for configuring the sample.
    pub fn builder() -> ExpDecaySampleBuilder {
        ExpDecaySampleBuilder::default()
    }

    /// Records `value` at an explicit timestamp.
    ///
    /// The public [`update`](Sample::update) reads the sample's clock and
    /// delegates here; tests can instead feed a synthetic timeline.
    /// Timestamps must not move backwards.
    pub fn update_at(&self, now: Instant, value: i64) {
        let mut inner = self.inner.lock();
        self.rescale_if_due(&mut inner, now);

        inner.count += 1;

        // Delta in seconds, not nanoseconds: the raw nanosecond count drives
        // `exp` to +Inf within microseconds of the epoch start, freezing the
        // reservoir contents until the next rescale.
        let delta = now.duration_since(inner.t0).as_secs_f64();
        let u = 1.0 - inner.rng.random::<f64>();
        let priority = OrderedFloat((self.alpha * delta).exp() / u);

        if inner.heap.len() < self.capacity {
            inner.heap.push(Reverse(WeightedValue { priority, value }));
        } else if inner.heap.peek().is_some_and(|min| min.0.priority < priority) {
            inner.heap.pop();
            inner.heap.push(Reverse(WeightedValue { priority, value }));
        }
    }

    /// Scales every retained priority down by the decay accumulated since
    /// `t0` and starts a new epoch.  The decay factor underflows to zero for
    /// any entry older than a fraction of the rescale threshold, and those
    /// entries are dropped; every surviving priority is strictly positive.
    fn rescale_if_due(&self, inner: &mut ExpDecayInner, now: Instant) {
        if now < inner.next_rescale {
            return;
        }

        let elapsed = now.duration_since(inner.t0).as_nanos() as f64;
        let factor = (-self.alpha * elapsed).exp();

        let old = std::mem::take(&mut inner.heap);
        for Reverse(entry) in old {
            let rescaled = entry.priority.0 * factor;
            if rescaled > 0.0 {
                inner.heap.push(Reverse(WeightedValue {
                    priority: OrderedFloat(rescaled),
                    value: entry.value,
                }));
            }
        }

        inner.t0 = now;
        inner.next_rescale = now + self.rescale_threshold;
    }

    fn values_locked(&self) -> Vec<i64> {
        let mut inner = self.inner.lock();
        self.rescale_if_due(&mut inner, self.clock.now());
        inner.heap.iter().map(|Reverse(entry)| entry.value).collect()
    }
}

impl Default for ExpDecaySample {
    fn default() -> ExpDecaySample {
        ExpDecaySample::new()
    }
}

impl Sample for ExpDecaySample {
    fn clear(&self) {
        let mut inner = self.inner.lock();
        let now = self.clock.now();
        inner.count = 0;
        inner.heap.clear();
        inner.t0 = now;
        inner.next_rescale = now + self.rescale_threshold;
    }

    fn count(&self) -> u64 {
        self.inner.lock().count
    }

    fn max(&self) -> i64 {
        sample_max(&self.values_locked())
    }

    fn mean(&self) -> f64 {
        sample_mean(&self.values_locked())
    }

    fn min(&self) -> i64 {
        sample_min(&self.values_locked())
    }

    fn percentile(&self, p: f64) -> f64 {
        self.percentiles(&[p])[0]
    }

    fn percentiles(&self, ps: &[f64]) -> Vec<f64> {
        sample_percentiles(&self.values_locked(), ps)
    }

    fn size(&self) -> usize {
        let mut inner = self.inner.lock();
        self.rescale_if_due(&mut inner, self.clock.now());
        inner.heap.len()
    }

    fn snapshot(&self) -> SampleSnapshot {
        let mut inner = self.inner.lock();
        self.rescale_if_due(&mut inner, self.clock.now());
        let values = inner.heap.iter().map(|Reverse(entry)| entry.value).collect();
        SampleSnapshot::new(inner.count, values)
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    fn sum(&self) -> i64 {
        sample_sum(&self.values_locked())
    }

    fn update(&self, value: i64) {
        self.update_at(self.clock.now(), value);
    }

    fn values(&self) -> Vec<i64> {
        self.values_locked()
    }

    fn variance(&self) -> f64 {
        sample_variance(&self.values_locked())
    }
}

/// Builder for [`ExpDecaySample`].
#[derive(Debug)]
pub struct ExpDecaySampleBuilder {
    reservoir_size: usize,
    alpha: f64,
    rescale_threshold: Duration,
    clock: Option<Clock>,
    seed: Option<u64>,
}

impl Default for ExpDecaySampleBuilder {
    fn default() -> ExpDecaySampleBuilder {
        ExpDecaySampleBuilder {
            reservoir_size: DEFAULT_RESERVOIR_SIZE,
            alpha: DEFAULT_ALPHA,
            rescale_threshold: DEFAULT_RESCALE_THRESHOLD,
            clock: None,
            seed: None,
        }
    }
}

impl ExpDecaySampleBuilder {
    /// Sets the maximum number of retained values.
    pub fn reservoir_size(mut self, size: usize) -> Self {
        self.reservoir_size = size;
        self
    }

    /// Sets the decay factor.  Larger values bias retention more heavily
    /// towards recent observations.
    pub fn alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Sets how long an epoch may run before priorities are rescaled.
    pub fn rescale_threshold(mut self, threshold: Duration) -> Self {
        self.rescale_threshold = threshold;
        self
    }

    /// Sets the time source.  Defaults to the real clock.
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Seeds the PRNG for deterministic tests.  Defaults to an OS seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the sample, starting its first epoch at the clock's current
    /// time.
    pub fn build(self) -> ExpDecaySample {
        let clock = self.clock.unwrap_or_default();
        let rng = match self.seed {
            Some(seed) => Xoshiro256StarStar::seed_from_u64(seed),
            None => Xoshiro256StarStar::from_rng(&mut rand::rng()),
        };

        let t0 = clock.now();
        ExpDecaySample {
            capacity: self.reservoir_size,
            alpha: self.alpha,
            rescale_threshold: self.rescale_threshold,
            clock,
            inner: Mutex::new(ExpDecayInner {
                count: 0,
                t0,
                next_rescale: t0 + self.rescale_threshold,
                heap: BinaryHeap::with_capacity(self.reservoir_size),
                rng,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Reverse;
    use std::time::Duration;

    use quanta::Clock;

    use super::ExpDecaySample;
    use crate::sample::Sample;

    #[test]
    fn test_under_capacity_retains_everything() {
        let s = ExpDecaySample::builder().reservoir_size(100).alpha(0.99).seed(1).build();
        for i in 0..10 {
            s.update(i);
        }

        assert_eq!(s.count(), 10);
        assert_eq!(s.size(), 10);

        let mut values = s.values();
        values.sort_unstable();
        assert_eq!(values, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_large_reservoir_under_capacity() {
        let s = ExpDecaySample::builder().reservoir_size(1000).alpha(0.01).seed(1).build();
        for i in 0..100 {
            s.update(i);
        }

        assert_eq!(s.count(), 100);
        assert_eq!(s.size(), 100);

        let mut values = s.values();
        values.sort_unstable();
        assert_eq!(values, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_over_capacity_stays_bounded() {
        let s = ExpDecaySample::builder().reservoir_size(100).alpha(0.99).seed(1).build();
        for i in 0..1000 {
            s.update(i);
        }

        assert_eq!(s.count(), 1000);
        assert_eq!(s.size(), 100);

        for v in s.values() {
            assert!((0..1000).contains(&v));
        }
    }

    #[test]
    fn test_statistics_with_explicit_timestamps() {
        let (clock, _mock) = Clock::mock();
        let start = clock.now();
        let s = ExpDecaySample::builder().reservoir_size(100).alpha(0.99).clock(clock).seed(1).build();

        for i in 1..=10000i64 {
            s.update_at(start + Duration::from_nanos(i as u64), i);
        }

        assert_eq!(s.count(), 10000);
        assert_eq!(s.size(), 100);

        // A 10000ns spread is ~1e-5 seconds, so decay weighting is
        // negligible and retention is effectively uniform over 1..=10000.
        assert!(s.min() >= 1 && s.min() <= 2000, "min = {}", s.min());
        assert!(s.max() >= 8000 && s.max() <= 10000, "max = {}", s.max());
        assert!(s.mean() >= 3800.0 && s.mean() <= 6200.0, "mean = {}", s.mean());

        let ps = s.percentiles(&[0.5, 0.75, 0.99]);
        assert!(ps[0] >= 3000.0 && ps[0] <= 7000.0, "p50 = {}", ps[0]);
        assert!(ps[2] >= 9000.0 && ps[2] <= 10000.0, "p99 = {}", ps[2]);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let (clock, _mock) = Clock::mock();
        let start = clock.now();
        let s = ExpDecaySample::builder().reservoir_size(100).alpha(0.99).clock(clock).seed(1).build();

        for i in 1..=10000i64 {
            s.update_at(start + Duration::from_nanos(i as u64), i);
        }

        let snapshot = s.snapshot();
        let mean = snapshot.mean();
        let min = snapshot.min();

        s.update(1);

        assert_eq!(snapshot.count(), 10000);
        assert_eq!(snapshot.size(), 100);
        assert_eq!(snapshot.mean(), mean);
        assert_eq!(snapshot.min(), min);
    }

    // Priorities must be computed from the delta in seconds.  If the raw
    // nanosecond count leaks into `exp`, the first batch's priorities hit
    // +Inf and the second batch can never displace them, dragging the mean
    // towards 10.
    #[test]
    fn test_nanosecond_regression() {
        let (clock, mock) = Clock::mock();
        let s = ExpDecaySample::builder().reservoir_size(100).alpha(0.99).clock(clock).seed(1).build();

        for _ in 0..100 {
            s.update(10);
        }

        mock.increment(Duration::from_millis(1));

        for _ in 0..100 {
            s.update(20);
        }

        let values = s.values();
        let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
        assert!((14.0..=16.0).contains(&mean), "mean = {mean}");
    }

    #[test]
    fn test_rescale_forgets_old_values() {
        let (clock, mock) = Clock::mock();
        let s = ExpDecaySample::builder()
            .rescale_threshold(Duration::from_secs(30 * 60))
            .clock(clock)
            .seed(1)
            .build();

        s.update(1);
        assert_eq!(s.size(), 1);

        mock.increment(Duration::from_secs(31 * 60));

        // The read triggers the rescale, which underflows the lone
        // priority and drops the entry.
        assert!(s.values().is_empty());
        assert_eq!(s.size(), 0);
    }

    #[test]
    fn test_rescale_keeps_fresh_priorities_positive() {
        let (clock, mock) = Clock::mock();
        let s = ExpDecaySample::builder()
            .reservoir_size(2)
            .alpha(0.001)
            .clock(clock)
            .seed(1)
            .build();

        s.update(1);
        mock.increment(Duration::from_secs(60 * 60) + Duration::from_micros(1));
        s.update(1);

        let inner = s.inner.lock();
        assert!(!inner.heap.is_empty());
        for Reverse(entry) in inner.heap.iter() {
            assert!(entry.priority.0 > 0.0);
        }
    }

    #[test]
    fn test_clear_starts_a_new_epoch() {
        let s = ExpDecaySample::builder().reservoir_size(10).seed(1).build();
        for i in 0..10 {
            s.update(i);
        }

        s.clear();
        assert_eq!(s.count(), 0);
        assert_eq!(s.size(), 0);
        assert!(s.values().is_empty());

        s.update(7);
        assert_eq!(s.count(), 1);
        assert_eq!(s.values(), vec![7]);
    }

    #[test]
    fn test_defaults() {
        let s = ExpDecaySample::new();
        assert_eq!(s.capacity, 1028);
        assert_eq!(s.alpha, 0.015);
        assert_eq!(s.rescale_threshold, Duration::from_secs(3600));
    }
}
