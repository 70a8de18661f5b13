//! In-process recording of quantitative telemetry.
//!
//! `metrics-instruments` provides the classic instrument vocabulary —
//! counters, gauges, histograms, meters, and timers — together with a
//! thread-safe [`Registry`] that binds instruments to names so periodic
//! readers (loggers, exporters) can enumerate and snapshot them.
//!
//! # Design
//!
//! Distribution estimates come from bounded reservoirs: [`UniformSample`]
//! retains a uniformly random subset of the stream, while [`ExpDecaySample`]
//! weights retention towards recent observations so percentiles track the
//! recent past.  Rates come from [`Meter`], which combines a mean rate with
//! 1-, 5-, and 15-minute exponentially-weighted moving averages driven by a
//! single process-wide ticker thread.  [`Timer`] composes the two over
//! operation durations.
//!
//! Instruments are cheaply-clonable handles sharing interior state, so a
//! handle can live in a hot loop while the registry keeps another for
//! export.  Reading an instrument never blocks writers for long: statistics
//! run over a materialised copy, and `snapshot()` on any instrument returns
//! an immutable reading that needs no further synchronisation.
//!
//! Time is always read through a [`quanta::Clock`], so reservoir decay and
//! meter rates are testable against a mock clock.
//!
//! # Example
//!
//! ```rust
//! use metrics_instruments::{Registry, UniformSample, Histogram};
//!
//! let registry = Registry::new();
//!
//! let requests = registry.get_or_register_counter("requests").unwrap();
//! requests.inc(1);
//!
//! let sizes = registry
//!     .get_or_register_histogram("response.sizes", || {
//!         Histogram::new(UniformSample::new(1028))
//!     })
//!     .unwrap();
//! sizes.update(512);
//!
//! let latency = registry.get_or_register_timer("db.get.latency").unwrap();
//! latency.time(|| {
//!     // ... the measured operation ...
//! });
//!
//! // Exporters walk the registry and read uniform per-kind summaries.
//! for (name, value) in registry.get_all() {
//!     println!("{name}: {value:?}");
//! }
//!
//! // Unregistering a meter or timer releases it from the shared ticker.
//! registry.unregister("db.get.latency").unwrap();
//! ```

mod counter;
mod ewma;
mod export;
mod gauge;
mod healthcheck;
mod histogram;
mod meter;
mod registry;
mod sample;
mod timer;

pub use counter::{Counter, CounterSnapshot};
pub use ewma::{Ewma, TICK_INTERVAL};
pub use export::{HistogramValues, MeterValues, MetricValue, TimerValues, EXPORT_PERCENTILES};
pub use gauge::{
    FunctionalGauge, FunctionalGaugeFloat, Gauge, GaugeFloat, GaugeFloatSnapshot, GaugeSnapshot,
};
pub use healthcheck::{Healthcheck, HealthcheckSnapshot};
pub use histogram::{Histogram, HistogramSnapshot};
pub use meter::{Meter, MeterSnapshot};
pub use registry::{
    default_registry, get_or_register_counter, get_or_register_gauge,
    get_or_register_gauge_float, get_or_register_histogram, get_or_register_meter,
    get_or_register_timer, new_registered_counter, new_registered_functional_gauge,
    new_registered_functional_gauge_float, new_registered_gauge, new_registered_gauge_float,
    new_registered_healthcheck, new_registered_histogram, new_registered_meter,
    new_registered_timer, Instrument, PrefixedRegistry, Registry, RegistryError,
};
pub use sample::{ExpDecaySample, ExpDecaySampleBuilder, Sample, SampleSnapshot, UniformSample};
pub use timer::{Timer, TimerSnapshot};
