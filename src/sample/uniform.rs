use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use super::{
    sample_max, sample_mean, sample_min, sample_percentiles, sample_sum, sample_variance, Sample,
    SampleSnapshot,
};

/// A fixed-size reservoir with uniform retention, per Vitter's "Algorithm R".
///
/// Once the reservoir has seen `n >= capacity` observations, every
/// observation in the stream has had a `capacity / n` chance of being
/// retained.  A fast [Xoshiro256\*\*][xoshiro256starstar] PRNG drives slot
/// selection; a single mutex serialises writers against readers for the
/// duration of the buffer mutation.
///
/// [xoshiro256starstar]: https://prng.di.unimi.it
#[derive(Debug)]
pub struct UniformSample {
    capacity: usize,
    inner: Mutex<UniformInner>,
}

#[derive(Debug)]
struct UniformInner {
    count: u64,
    values: Vec<i64>,
    rng: Xoshiro256StarStar,
}

impl UniformSample {
    /// Creates a reservoir retaining up to `reservoir_size` values, with an
    /// OS-seeded PRNG.
    pub fn new(reservoir_size: usize) -> UniformSample {
        UniformSample::from_rng(reservoir_size, Xoshiro256StarStar::from_rng(&mut rand::rng()))
    }

    /// Creates a reservoir with a deterministic PRNG stream, for
    /// reproducible tests.
    pub fn with_seed(reservoir_size: usize, seed: u64) -> UniformSample {
        UniformSample::from_rng(reservoir_size, Xoshiro256StarStar::seed_from_u64(seed))
    }

    fn from_rng(reservoir_size: usize, rng: Xoshiro256StarStar) -> UniformSample {
        UniformSample {
            capacity: reservoir_size,
            inner: Mutex::new(UniformInner {
                count: 0,
                values: Vec::with_capacity(reservoir_size),
                rng,
            }),
        }
    }
}

impl Sample for UniformSample {
    fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.count = 0;
        inner.values.clear();
    }

    fn count(&self) -> u64 {
        self.inner.lock().count
    }

    fn max(&self) -> i64 {
        sample_max(&self.inner.lock().values)
    }

    fn mean(&self) -> f64 {
        sample_mean(&self.inner.lock().values)
    }

    fn min(&self) -> i64 {
        sample_min(&self.inner.lock().values)
    }

    fn percentile(&self, p: f64) -> f64 {
        self.percentiles(&[p])[0]
    }

    fn percentiles(&self, ps: &[f64]) -> Vec<f64> {
        sample_percentiles(&self.inner.lock().values, ps)
    }

    fn size(&self) -> usize {
        self.inner.lock().values.len()
    }

    fn snapshot(&self) -> SampleSnapshot {
        let inner = self.inner.lock();
        SampleSnapshot::new(inner.count, inner.values.clone())
    }

    fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    fn sum(&self) -> i64 {
        sample_sum(&self.inner.lock().values)
    }

    fn update(&self, value: i64) {
        let mut inner = self.inner.lock();
        inner.count += 1;

        if inner.values.len() < self.capacity {
            inner.values.push(value);
        } else {
            let count = inner.count;
            let slot = inner.rng.random_range(0..count) as usize;
            if slot < self.capacity {
                inner.values[slot] = value;
            }
        }
    }

    fn values(&self) -> Vec<i64> {
        self.inner.lock().values.clone()
    }

    fn variance(&self) -> f64 {
        sample_variance(&self.inner.lock().values)
    }
}

#[cfg(test)]
mod tests {
    use super::UniformSample;
    use crate::sample::Sample;

    #[test]
    fn test_fill_then_replace() {
        let s = UniformSample::with_seed(100, 1);
        for i in 0..1000 {
            s.update(i);
        }

        assert_eq!(s.count(), 1000);
        assert_eq!(s.size(), 100);

        let values = s.values();
        assert_eq!(values.len(), 100);
        for v in values {
            assert!((0..1000).contains(&v));
        }
    }

    #[test]
    fn test_includes_tail_when_under_capacity() {
        let s = UniformSample::with_seed(100, 1);
        let max = 100;
        for i in 0..max {
            s.update(i);
        }

        // Nothing has been evicted, so the retained set is the whole stream.
        let sum: i64 = s.values().iter().sum();
        assert_eq!(sum, (max - 1) * max / 2);
    }

    #[test]
    fn test_statistics() {
        let s = UniformSample::with_seed(100, 1);
        for i in 1..=10000 {
            s.update(i);
        }

        assert_eq!(s.count(), 10000);
        assert_eq!(s.size(), 100);

        // With 100 uniformly retained values out of 1..=10000, the sample
        // statistics concentrate around the stream's; the bands below are
        // several standard errors wide.
        assert!(s.min() >= 1 && s.min() <= 2000, "min = {}", s.min());
        assert!(s.max() >= 8000 && s.max() <= 10000, "max = {}", s.max());
        assert!(s.mean() >= 3800.0 && s.mean() <= 6200.0, "mean = {}", s.mean());
        assert!(s.std_dev() >= 2000.0 && s.std_dev() <= 3700.0, "std_dev = {}", s.std_dev());

        let ps = s.percentiles(&[0.5, 0.75, 0.99]);
        assert!(ps[0] >= 3000.0 && ps[0] <= 7000.0, "p50 = {}", ps[0]);
        assert!(ps[1] >= 6000.0 && ps[1] <= 9000.0, "p75 = {}", ps[1]);
        assert!(ps[2] >= 9000.0 && ps[2] <= 10000.0, "p99 = {}", ps[2]);
        assert!(ps[0] < ps[1] && ps[1] < ps[2]);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let s = UniformSample::with_seed(100, 1);
        for i in 1..=10000 {
            s.update(i);
        }

        let snapshot = s.snapshot();
        let min = snapshot.min();
        let max = snapshot.max();
        let mean = snapshot.mean();

        s.update(-1_000_000);
        s.clear();

        assert_eq!(snapshot.count(), 10000);
        assert_eq!(snapshot.size(), 100);
        assert_eq!(snapshot.min(), min);
        assert_eq!(snapshot.max(), max);
        assert_eq!(snapshot.mean(), mean);
    }

    #[test]
    fn test_clear() {
        let s = UniformSample::with_seed(4, 1);
        for i in 0..10 {
            s.update(i);
        }

        s.clear();
        assert_eq!(s.count(), 0);
        assert_eq!(s.size(), 0);
        assert!(s.values().is_empty());
        assert_eq!(s.mean(), 0.0);
    }
}
