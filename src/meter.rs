//! Event-rate estimation.

use std::sync::atomic::{
    AtomicBool, AtomicI64,
    Ordering::{Acquire, Relaxed, Release},
};
use std::sync::{Arc, OnceLock, Weak};
use std::thread;

use parking_lot::Mutex;
use quanta::{Clock, Instant};
use tracing::{error, trace};

use crate::ewma::{Ewma, TICK_INTERVAL};

/// Measures the rate at which events occur.
///
/// A meter tracks the total number of marked events, the mean rate since
/// creation, and 1-, 5-, and 15-minute exponentially-weighted moving
/// averages.  The moving averages are advanced by a single process-wide
/// arbiter thread that ticks every live meter once per
/// [`TICK_INTERVAL`](crate::TICK_INTERVAL); the arbiter holds only weak
/// references, and [`stop`](Meter::stop) removes a meter from it
/// deterministically.
#[derive(Clone, Debug)]
pub struct Meter {
    inner: Arc<MeterInner>,
}

#[derive(Debug)]
pub(crate) struct MeterInner {
    count: AtomicI64,
    a1: Ewma,
    a5: Ewma,
    a15: Ewma,
    start: Instant,
    clock: Clock,
    stopped: AtomicBool,
}

impl MeterInner {
    fn new(clock: Clock) -> MeterInner {
        let start = clock.now();
        MeterInner {
            count: AtomicI64::new(0),
            a1: Ewma::one_minute(),
            a5: Ewma::five_minutes(),
            a15: Ewma::fifteen_minutes(),
            start,
            clock,
            stopped: AtomicBool::new(false),
        }
    }

    fn tick(&self) {
        self.a1.tick();
        self.a5.tick();
        self.a15.tick();
    }

    fn rate_mean(&self) -> f64 {
        let elapsed = self.clock.now().duration_since(self.start).as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.count.load(Relaxed) as f64 / elapsed
        }
    }
}

impl Meter {
    /// Creates a meter on the real clock and registers it with the arbiter.
    pub fn new() -> Meter {
        Meter::with_clock(Clock::new())
    }

    /// Creates a meter on the given clock and registers it with the arbiter.
    pub fn with_clock(clock: Clock) -> Meter {
        let meter = Meter::unregistered(clock);
        arbiter().register(&meter.inner);
        meter
    }

    /// Creates a meter that no arbiter drives.  Tests tick it by hand.
    pub(crate) fn unregistered(clock: Clock) -> Meter {
        Meter { inner: Arc::new(MeterInner::new(clock)) }
    }

    /// Records the occurrence of `n` events.
    ///
    /// Marking a stopped meter has no effect.
    pub fn mark(&self, n: i64) {
        if self.inner.stopped.load(Acquire) {
            return;
        }
        self.inner.count.fetch_add(n, Relaxed);
        self.inner.a1.update(n);
        self.inner.a5.update(n);
        self.inner.a15.update(n);
    }

    /// Returns the total number of events marked.
    pub fn count(&self) -> i64 {
        self.inner.count.load(Relaxed)
    }

    /// Returns the one-minute moving average rate, in events per second.
    pub fn rate1(&self) -> f64 {
        self.inner.a1.rate()
    }

    /// Returns the five-minute moving average rate, in events per second.
    pub fn rate5(&self) -> f64 {
        self.inner.a5.rate()
    }

    /// Returns the fifteen-minute moving average rate, in events per second.
    pub fn rate15(&self) -> f64 {
        self.inner.a15.rate()
    }

    /// Returns the mean rate since the meter was created, in events per
    /// second.
    pub fn rate_mean(&self) -> f64 {
        self.inner.rate_mean()
    }

    /// Removes the meter from the arbiter.
    ///
    /// After this returns the arbiter no longer holds a reference and will
    /// never tick this meter again.  Idempotent.
    pub fn stop(&self) {
        if !self.inner.stopped.swap(true, Release) {
            arbiter().unregister(&self.inner);
            trace!("meter stopped");
        }
    }

    /// Freezes the meter's readings.
    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            count: self.count(),
            rate1: self.rate1(),
            rate5: self.rate5(),
            rate15: self.rate15(),
            rate_mean: self.rate_mean(),
        }
    }

    #[cfg(test)]
    pub(crate) fn tick_for_test(&self) {
        self.inner.tick();
    }
}

impl Default for Meter {
    fn default() -> Meter {
        Meter::new()
    }
}

/// An immutable point-in-time reading of a [`Meter`].
#[derive(Clone, Copy, Debug)]
pub struct MeterSnapshot {
    count: i64,
    rate1: f64,
    rate5: f64,
    rate15: f64,
    rate_mean: f64,
}

impl MeterSnapshot {
    /// Returns the total number of events marked at snapshot time.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Returns the one-minute moving average rate.
    pub fn rate1(&self) -> f64 {
        self.rate1
    }

    /// Returns the five-minute moving average rate.
    pub fn rate5(&self) -> f64 {
        self.rate5
    }

    /// Returns the fifteen-minute moving average rate.
    pub fn rate15(&self) -> f64 {
        self.rate15
    }

    /// Returns the mean rate since the meter was created.
    pub fn rate_mean(&self) -> f64 {
        self.rate_mean
    }
}

/// Drives every live meter's moving averages from one ticker thread.
///
/// The thread is started lazily when the first meter registers and exits
/// once the live set drains, so an idle process carries no background work.
/// Meters are held weakly: dropping every handle to a meter removes it on
/// the next sweep, while [`Meter::stop`] removes it immediately.
pub(crate) struct MeterArbiter {
    state: Mutex<ArbiterState>,
}

struct ArbiterState {
    meters: Vec<Weak<MeterInner>>,
    ticking: bool,
}

fn arbiter() -> &'static MeterArbiter {
    static ARBITER: OnceLock<MeterArbiter> = OnceLock::new();
    ARBITER.get_or_init(MeterArbiter::new)
}

impl MeterArbiter {
    fn new() -> MeterArbiter {
        MeterArbiter { state: Mutex::new(ArbiterState { meters: Vec::new(), ticking: false }) }
    }

    fn register(&'static self, inner: &Arc<MeterInner>) {
        let mut state = self.state.lock();
        state.meters.push(Arc::downgrade(inner));

        if !state.ticking {
            let spawned = thread::Builder::new()
                .name("meter-arbiter".to_string())
                .spawn(move || self.run());
            match spawned {
                Ok(_) => state.ticking = true,
                Err(e) => error!(error = %e, "failed to spawn meter arbiter thread"),
            }
        }
    }

    fn unregister(&self, inner: &Arc<MeterInner>) {
        let mut state = self.state.lock();
        state.meters.retain(|weak| weak.as_ptr() != Arc::as_ptr(inner));
    }

    fn run(&self) {
        trace!("meter arbiter ticker started");
        let ticker = crossbeam_channel::tick(TICK_INTERVAL);
        while ticker.recv().is_ok() {
            if self.sweep() == 0 {
                break;
            }
        }
        trace!("meter arbiter ticker stopped");
    }

    /// Ticks every live meter, prunes dead and stopped entries, and returns
    /// the number of meters still live.  Clears the ticking flag when the
    /// set drains so the next registration restarts the thread.
    fn sweep(&self) -> usize {
        let mut state = self.state.lock();
        state.meters.retain(|weak| match weak.upgrade() {
            Some(meter) if !meter.stopped.load(Acquire) => {
                meter.tick();
                true
            }
            _ => false,
        });

        let live = state.meters.len();
        if live == 0 {
            state.ticking = false;
        }
        live
    }
}
