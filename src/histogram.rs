use std::sync::Arc;

use crate::sample::{Sample, SampleSnapshot};

/// Aggregates a stream of `i64` observations through a reservoir [`Sample`].
///
/// The histogram itself is a thin, cheaply-clonable wrapper; the retention
/// policy and all statistics live in the sample it was built over.
#[derive(Clone)]
pub struct Histogram {
    sample: Arc<dyn Sample>,
}

impl Histogram {
    /// Creates a histogram over the given sample.
    pub fn new(sample: impl Sample + 'static) -> Histogram {
        Histogram { sample: Arc::new(sample) }
    }

    /// Records a new observation.
    pub fn update(&self, value: i64) {
        self.sample.update(value);
    }

    /// Returns the number of observations ever recorded.
    pub fn count(&self) -> u64 {
        self.sample.count()
    }

    /// Returns the largest retained value.
    pub fn max(&self) -> i64 {
        self.sample.max()
    }

    /// Returns the mean of the retained values.
    pub fn mean(&self) -> f64 {
        self.sample.mean()
    }

    /// Returns the smallest retained value.
    pub fn min(&self) -> i64 {
        self.sample.min()
    }

    /// Returns an estimate of the given quantile.
    pub fn percentile(&self, p: f64) -> f64 {
        self.sample.percentile(p)
    }

    /// Returns estimates for each requested quantile, in request order.
    pub fn percentiles(&self, ps: &[f64]) -> Vec<f64> {
        self.sample.percentiles(ps)
    }

    /// Returns a handle to the underlying sample.
    pub fn sample(&self) -> Arc<dyn Sample> {
        Arc::clone(&self.sample)
    }

    /// Returns the population standard deviation of the retained values.
    pub fn std_dev(&self) -> f64 {
        self.sample.std_dev()
    }

    /// Returns the sum of the retained values.
    pub fn sum(&self) -> i64 {
        self.sample.sum()
    }

    /// Returns the population variance of the retained values.
    pub fn variance(&self) -> f64 {
        self.sample.variance()
    }

    /// Clears the underlying sample.
    pub fn clear(&self) {
        self.sample.clear();
    }

    /// Freezes the histogram into an immutable snapshot.
    pub fn snapshot(&self) -> HistogramSnapshot {
        HistogramSnapshot { sample: self.sample.snapshot() }
    }
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram").field("count", &self.count()).finish_non_exhaustive()
    }
}

/// An immutable point-in-time reading of a [`Histogram`].
#[derive(Clone, Debug)]
pub struct HistogramSnapshot {
    sample: SampleSnapshot,
}

impl HistogramSnapshot {
    /// Returns the frozen sample.
    pub fn sample(&self) -> &SampleSnapshot {
        &self.sample
    }

    /// Returns the number of observations recorded at snapshot time.
    pub fn count(&self) -> u64 {
        self.sample.count()
    }

    /// Returns the largest retained value.
    pub fn max(&self) -> i64 {
        self.sample.max()
    }

    /// Returns the mean of the retained values.
    pub fn mean(&self) -> f64 {
        self.sample.mean()
    }

    /// Returns the smallest retained value.
    pub fn min(&self) -> i64 {
        self.sample.min()
    }

    /// Returns an estimate of the given quantile.
    pub fn percentile(&self, p: f64) -> f64 {
        self.sample.percentile(p)
    }

    /// Returns estimates for each requested quantile, in request order.
    pub fn percentiles(&self, ps: &[f64]) -> Vec<f64> {
        self.sample.percentiles(ps)
    }

    /// Returns the population standard deviation of the retained values.
    pub fn std_dev(&self) -> f64 {
        self.sample.std_dev()
    }

    /// Returns the sum of the retained values.
    pub fn sum(&self) -> i64 {
        self.sample.sum()
    }

    /// Returns the population variance of the retained values.
    pub fn variance(&self) -> f64 {
        self.sample.variance()
    }
}

#[cfg(test)]
mod tests {
    use super::Histogram;
    use crate::sample::UniformSample;

    #[test]
    fn test_delegates_to_sample() {
        let h = Histogram::new(UniformSample::with_seed(100, 1));
        for i in 1..=10 {
            h.update(i);
        }

        assert_eq!(h.count(), 10);
        assert_eq!(h.min(), 1);
        assert_eq!(h.max(), 10);
        assert_eq!(h.mean(), 5.5);
        assert_eq!(h.sum(), 55);
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let h = Histogram::new(UniformSample::with_seed(100, 1));
        for i in 1..=10 {
            h.update(i);
        }

        let snapshot = h.snapshot();
        h.update(1_000);

        assert_eq!(snapshot.count(), 10);
        assert_eq!(snapshot.max(), 10);
        assert_eq!(h.max(), 1_000);
    }

    #[test]
    fn test_clear() {
        let h = Histogram::new(UniformSample::with_seed(100, 1));
        h.update(3);
        h.clear();

        assert_eq!(h.count(), 0);
        assert_eq!(h.mean(), 0.0);
    }

    #[test]
    fn test_clones_share_the_sample() {
        let h = Histogram::new(UniformSample::with_seed(100, 1));
        let h2 = h.clone();
        h.update(1);
        h2.update(2);
        assert_eq!(h.count(), 2);
    }
}
