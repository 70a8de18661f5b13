//! Exponentially-weighted moving averages of a rolling event count.

use std::sync::atomic::{
    AtomicBool, AtomicI64, AtomicU64,
    Ordering::{Acquire, Relaxed, Release},
};
use std::time::Duration;

/// How often the shared ticker fires.
///
/// The smoothing constants below are derived from this interval, so changing
/// it changes the half-life of every meter in the process.
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

const TICK_SECONDS: f64 = 5.0;

/// An exponentially-weighted moving average over a stream of event counts.
///
/// Events are accumulated with [`update`](Ewma::update) and folded into the
/// smoothed per-second rate by [`tick`](Ewma::tick), which the owning meter's
/// arbiter calls once every [`TICK_INTERVAL`].  The smoothing constant is
/// derived from the tick interval and a target half-life, so a one-minute
/// average takes one minute for an impulse to decay to `1/e` of its weight.
#[derive(Debug)]
pub struct Ewma {
    uncounted: AtomicI64,
    alpha: f64,
    rate: AtomicU64,
    init: AtomicBool,
}

impl Ewma {
    /// Creates an `Ewma` with an explicit smoothing constant.
    pub fn with_alpha(alpha: f64) -> Ewma {
        Ewma { uncounted: AtomicI64::new(0), alpha, rate: AtomicU64::new(0), init: AtomicBool::new(false) }
    }

    /// Creates an `Ewma` with a one-minute half-life.
    pub fn one_minute() -> Ewma {
        Ewma::with_alpha(alpha_for_minutes(1.0))
    }

    /// Creates an `Ewma` with a five-minute half-life.
    pub fn five_minutes() -> Ewma {
        Ewma::with_alpha(alpha_for_minutes(5.0))
    }

    /// Creates an `Ewma` with a fifteen-minute half-life.
    pub fn fifteen_minutes() -> Ewma {
        Ewma::with_alpha(alpha_for_minutes(15.0))
    }

    /// Adds `n` events to the count folded in at the next tick.
    pub fn update(&self, n: i64) {
        self.uncounted.fetch_add(n, Relaxed);
    }

    /// Folds the accumulated events into the smoothed rate.
    ///
    /// Must be called once per [`TICK_INTERVAL`], by a single driver.  The
    /// first tick seeds the rate with the instantaneous value; later ticks
    /// move it by `alpha` towards the instantaneous value.
    pub fn tick(&self) {
        let uncounted = self.uncounted.swap(0, Relaxed);
        let instant_rate = uncounted as f64 / TICK_SECONDS;

        if self.init.load(Acquire) {
            let rate = f64::from_bits(self.rate.load(Relaxed));
            let next = rate + self.alpha * (instant_rate - rate);
            self.rate.store(next.to_bits(), Relaxed);
        } else {
            self.rate.store(instant_rate.to_bits(), Relaxed);
            self.init.store(true, Release);
        }
    }

    /// Returns the smoothed rate in events per second.
    pub fn rate(&self) -> f64 {
        f64::from_bits(self.rate.load(Relaxed))
    }
}

fn alpha_for_minutes(minutes: f64) -> f64 {
    1.0 - (-TICK_SECONDS / 60.0 / minutes).exp()
}

#[cfg(test)]
mod tests {
    use super::{alpha_for_minutes, Ewma};

    const TICKS_PER_MINUTE: usize = 12;

    fn elapse_minute(e: &Ewma) {
        for _ in 0..TICKS_PER_MINUTE {
            e.tick();
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected ~{expected}, got {actual}");
    }

    #[test]
    fn test_alphas() {
        assert_close(alpha_for_minutes(1.0), 0.07995558537067671);
        assert_close(alpha_for_minutes(5.0), 0.016528546905689323);
        assert_close(alpha_for_minutes(15.0), 0.005540151995103271);
    }

    #[test]
    fn test_first_tick_seeds_rate() {
        let e = Ewma::one_minute();
        assert_eq!(e.rate(), 0.0);

        e.update(3);
        e.tick();
        assert_close(e.rate(), 0.6);
    }

    #[test]
    fn test_one_minute_decay() {
        let e = Ewma::one_minute();
        e.update(3);
        e.tick();

        for minute in 1..=3 {
            elapse_minute(&e);
            assert_close(e.rate(), 0.6 * (-(minute as f64)).exp());
        }
    }

    #[test]
    fn test_five_minute_decay() {
        let e = Ewma::five_minutes();
        e.update(3);
        e.tick();

        elapse_minute(&e);
        assert_close(e.rate(), 0.6 * (-1.0_f64 / 5.0).exp());
    }

    #[test]
    fn test_fifteen_minute_decay() {
        let e = Ewma::fifteen_minutes();
        e.update(3);
        e.tick();

        elapse_minute(&e);
        assert_close(e.rate(), 0.6 * (-1.0_f64 / 15.0).exp());
    }

    #[test]
    fn test_updates_drain_once() {
        let e = Ewma::one_minute();
        e.update(2);
        e.update(3);
        e.tick();
        assert_close(e.rate(), 1.0);

        // A second tick sees no new events and decays toward zero.
        e.tick();
        assert!(e.rate() < 1.0);
    }
}
