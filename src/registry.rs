//! A thread-safe, name-indexed directory of instruments.

use std::collections::{hash_map::Entry, BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, trace};

use crate::counter::Counter;
use crate::export::MetricValue;
use crate::gauge::{FunctionalGauge, FunctionalGaugeFloat, Gauge, GaugeFloat};
use crate::healthcheck::Healthcheck;
use crate::histogram::Histogram;
use crate::meter::Meter;
use crate::sample::Sample;
use crate::timer::Timer;

/// Any of the instruments a registry can hold.
///
/// Instruments are cheaply-clonable handles; cloning a variant clones the
/// handle, not the underlying state.  Exporters dispatch on the variant and
/// read through [`value`](Instrument::value) or the per-kind snapshot.
#[derive(Clone, Debug)]
pub enum Instrument {
    /// See [`Counter`].
    Counter(Counter),
    /// See [`Gauge`].
    Gauge(Gauge),
    /// See [`GaugeFloat`].
    GaugeFloat(GaugeFloat),
    /// See [`FunctionalGauge`].
    FunctionalGauge(FunctionalGauge),
    /// See [`FunctionalGaugeFloat`].
    FunctionalGaugeFloat(FunctionalGaugeFloat),
    /// See [`Histogram`].
    Histogram(Histogram),
    /// See [`Meter`].
    Meter(Meter),
    /// See [`Timer`].
    Timer(Timer),
    /// See [`Healthcheck`].
    Healthcheck(Healthcheck),
}

impl Instrument {
    /// Returns the instrument's kind, for diagnostics and mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Instrument::Counter(_) => "counter",
            Instrument::Gauge(_) => "gauge",
            Instrument::GaugeFloat(_) => "gauge_float",
            Instrument::FunctionalGauge(_) => "functional_gauge",
            Instrument::FunctionalGaugeFloat(_) => "functional_gauge_float",
            Instrument::Histogram(_) => "histogram",
            Instrument::Meter(_) => "meter",
            Instrument::Timer(_) => "timer",
            Instrument::Healthcheck(_) => "healthcheck",
        }
    }

    /// Stops any background participation the instrument has.
    ///
    /// Meters and timers are removed from the shared arbiter; every other
    /// kind is a no-op.
    pub fn stop(&self) {
        match self {
            Instrument::Meter(m) => m.stop(),
            Instrument::Timer(t) => t.stop(),
            _ => {}
        }
    }
}

impl From<Counter> for Instrument {
    fn from(c: Counter) -> Instrument {
        Instrument::Counter(c)
    }
}

impl From<Gauge> for Instrument {
    fn from(g: Gauge) -> Instrument {
        Instrument::Gauge(g)
    }
}

impl From<GaugeFloat> for Instrument {
    fn from(g: GaugeFloat) -> Instrument {
        Instrument::GaugeFloat(g)
    }
}

impl From<FunctionalGauge> for Instrument {
    fn from(g: FunctionalGauge) -> Instrument {
        Instrument::FunctionalGauge(g)
    }
}

impl From<FunctionalGaugeFloat> for Instrument {
    fn from(g: FunctionalGaugeFloat) -> Instrument {
        Instrument::FunctionalGaugeFloat(g)
    }
}

impl From<Histogram> for Instrument {
    fn from(h: Histogram) -> Instrument {
        Instrument::Histogram(h)
    }
}

impl From<Meter> for Instrument {
    fn from(m: Meter) -> Instrument {
        Instrument::Meter(m)
    }
}

impl From<Timer> for Instrument {
    fn from(t: Timer) -> Instrument {
        Instrument::Timer(t)
    }
}

impl From<Healthcheck> for Instrument {
    fn from(h: Healthcheck) -> Instrument {
        Instrument::Healthcheck(h)
    }
}

/// Errors from registry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// [`Registry::register`] was called with a name that is already taken.
    #[error("a metric named `{0}` is already registered")]
    DuplicateName(String),

    /// [`Registry::unregister`] was called with an unknown name.
    #[error("no metric named `{0}` is registered")]
    NameNotFound(String),

    /// A typed `get_or_register_*` helper found an existing instrument of a
    /// different kind.  The existing entry is left untouched.
    #[error("metric `{name}` is a {actual}, not a {requested}")]
    TypeMismatch {
        /// The contested name.
        name: String,
        /// The kind the caller asked for.
        requested: &'static str,
        /// The kind already registered.
        actual: &'static str,
    },
}

macro_rules! typed_get_or_register {
    ($(#[$doc:meta])* $fn_name:ident, $kind:ident, $kind_str:literal, $handle:ty, $init:expr) => {
        $(#[$doc])*
        pub fn $fn_name(&self, name: impl Into<String>) -> Result<$handle, RegistryError> {
            let name = name.into();
            match self.get_or_register(name.clone(), || Instrument::$kind($init)) {
                Instrument::$kind(handle) => Ok(handle),
                other => Err(RegistryError::TypeMismatch {
                    name,
                    requested: $kind_str,
                    actual: other.kind(),
                }),
            }
        }
    };
}

/// A mapping from unique, non-empty names to instruments.
///
/// Lookup and get-or-create are thread-safe; iteration visits a consistent
/// snapshot of the entry set taken under the lock, so visitors may call back
/// into the registry freely.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: RwLock<HashMap<String, Instrument>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Registers `instrument` under `name`.
    ///
    /// Fails with [`RegistryError::DuplicateName`] if the name is taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        instrument: impl Into<Instrument>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let mut metrics = self.metrics.write();
        match metrics.entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicateName(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(instrument.into());
                Ok(())
            }
        }
    }

    /// Returns the instrument registered under `name`, if any.
    pub fn get(&self, name: &str) -> Option<Instrument> {
        self.metrics.read().get(name).cloned()
    }

    /// Returns the instrument under `name`, inserting the result of `init`
    /// if the name is free.
    ///
    /// On a hit the existing instrument is returned unchanged, whatever its
    /// kind; `init` runs at most once, and only when its result is actually
    /// inserted.
    pub fn get_or_register(
        &self,
        name: impl Into<String>,
        init: impl FnOnce() -> Instrument,
    ) -> Instrument {
        let name = name.into();
        if let Some(existing) = self.metrics.read().get(&name) {
            return existing.clone();
        }

        // Somebody may have inserted between the read and write locks.
        let mut metrics = self.metrics.write();
        match metrics.entry(name) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(init()).clone(),
        }
    }

    typed_get_or_register! {
        /// Returns the counter under `name`, creating it if absent.
        get_or_register_counter, Counter, "counter", Counter, Counter::new()
    }

    typed_get_or_register! {
        /// Returns the gauge under `name`, creating it if absent.
        get_or_register_gauge, Gauge, "gauge", Gauge, Gauge::new()
    }

    typed_get_or_register! {
        /// Returns the float gauge under `name`, creating it if absent.
        get_or_register_gauge_float, GaugeFloat, "gauge_float", GaugeFloat, GaugeFloat::new()
    }

    typed_get_or_register! {
        /// Returns the meter under `name`, creating it if absent.
        get_or_register_meter, Meter, "meter", Meter, Meter::new()
    }

    typed_get_or_register! {
        /// Returns the timer under `name`, creating it if absent.
        get_or_register_timer, Timer, "timer", Timer, Timer::new()
    }

    /// Returns the histogram under `name`, creating one over `sample_init`'s
    /// sample if absent.
    pub fn get_or_register_histogram(
        &self,
        name: impl Into<String>,
        sample_init: impl FnOnce() -> Histogram,
    ) -> Result<Histogram, RegistryError> {
        let name = name.into();
        match self.get_or_register(name.clone(), || Instrument::Histogram(sample_init())) {
            Instrument::Histogram(histogram) => Ok(histogram),
            other => Err(RegistryError::TypeMismatch {
                name,
                requested: "histogram",
                actual: other.kind(),
            }),
        }
    }

    /// Removes the instrument under `name`.
    ///
    /// A removed meter or timer is stopped, releasing it from the shared
    /// arbiter; forgetting to unregister one keeps it ticking forever.
    pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        let removed = self.metrics.write().remove(name);
        match removed {
            Some(instrument) => {
                instrument.stop();
                debug!(name, kind = instrument.kind(), "unregistered metric");
                Ok(())
            }
            None => Err(RegistryError::NameNotFound(name.to_string())),
        }
    }

    /// Stops and removes every instrument.
    pub fn unregister_all(&self) {
        let drained: Vec<(String, Instrument)> = self.metrics.write().drain().collect();
        trace!(count = drained.len(), "unregistering all metrics");
        for (_, instrument) in drained {
            instrument.stop();
        }
    }

    /// Calls `visitor` once per registered instrument.
    ///
    /// The entry set is snapshotted under the lock before visiting, so the
    /// visitor may register or unregister metrics without deadlocking.
    pub fn each(&self, mut visitor: impl FnMut(&str, &Instrument)) {
        let entries: Vec<(String, Instrument)> = {
            let metrics = self.metrics.read();
            metrics.iter().map(|(name, i)| (name.clone(), i.clone())).collect()
        };

        for (name, instrument) in &entries {
            visitor(name, instrument);
        }
    }

    /// Runs every registered healthcheck's predicate.
    pub fn run_healthchecks(&self) {
        self.each(|_, instrument| {
            if let Instrument::Healthcheck(h) = instrument {
                h.check();
            }
        });
    }

    /// Summarises every instrument into an export-ready value, keyed by
    /// name.
    pub fn get_all(&self) -> BTreeMap<String, MetricValue> {
        let mut all = BTreeMap::new();
        self.each(|name, instrument| {
            all.insert(name.to_string(), instrument.value());
        });
        all
    }
}

/// Decorates a registry so every name gains a constant prefix.
///
/// Registration, lookup and removal prepend the prefix; iteration and bulk
/// operations delegate to the underlying registry, whose entries already
/// carry their full names.
#[derive(Clone, Debug)]
pub struct PrefixedRegistry {
    underlying: Arc<Registry>,
    prefix: String,
}

impl PrefixedRegistry {
    /// Wraps `underlying`, prefixing every name with `prefix`.
    ///
    /// The prefix is used verbatim; include a trailing separator if you
    /// want one.
    pub fn new(underlying: Arc<Registry>, prefix: impl Into<String>) -> PrefixedRegistry {
        PrefixedRegistry { underlying, prefix: prefix.into() }
    }

    fn qualified(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    /// Registers `instrument` under the prefixed name.
    pub fn register(
        &self,
        name: &str,
        instrument: impl Into<Instrument>,
    ) -> Result<(), RegistryError> {
        self.underlying.register(self.qualified(name), instrument)
    }

    /// Returns the instrument under the prefixed name, if any.
    pub fn get(&self, name: &str) -> Option<Instrument> {
        self.underlying.get(&self.qualified(name))
    }

    /// Returns the instrument under the prefixed name, inserting the result
    /// of `init` if absent.
    pub fn get_or_register(&self, name: &str, init: impl FnOnce() -> Instrument) -> Instrument {
        self.underlying.get_or_register(self.qualified(name), init)
    }

    /// Removes the instrument under the prefixed name.
    pub fn unregister(&self, name: &str) -> Result<(), RegistryError> {
        self.underlying.unregister(&self.qualified(name))
    }

    /// Calls `visitor` once per instrument in the underlying registry.
    pub fn each(&self, visitor: impl FnMut(&str, &Instrument)) {
        self.underlying.each(visitor);
    }

    /// Summarises every instrument in the underlying registry.
    pub fn get_all(&self) -> BTreeMap<String, MetricValue> {
        self.underlying.get_all()
    }
}

/// Returns the process-wide default registry, constructed on first touch.
pub fn default_registry() -> &'static Registry {
    static DEFAULT: OnceLock<Registry> = OnceLock::new();
    DEFAULT.get_or_init(Registry::new)
}

fn registry_or_default(registry: Option<&Registry>) -> &Registry {
    registry.unwrap_or_else(|| default_registry())
}

/// Returns the counter under `name`, creating it if absent.
///
/// `None` falls back to the [default registry](default_registry).
pub fn get_or_register_counter(
    name: impl Into<String>,
    registry: Option<&Registry>,
) -> Result<Counter, RegistryError> {
    registry_or_default(registry).get_or_register_counter(name)
}

/// Returns the gauge under `name`, creating it if absent.
///
/// `None` falls back to the [default registry](default_registry).
pub fn get_or_register_gauge(
    name: impl Into<String>,
    registry: Option<&Registry>,
) -> Result<Gauge, RegistryError> {
    registry_or_default(registry).get_or_register_gauge(name)
}

/// Returns the float gauge under `name`, creating it if absent.
///
/// `None` falls back to the [default registry](default_registry).
pub fn get_or_register_gauge_float(
    name: impl Into<String>,
    registry: Option<&Registry>,
) -> Result<GaugeFloat, RegistryError> {
    registry_or_default(registry).get_or_register_gauge_float(name)
}

/// Returns the histogram under `name`, creating one over `sample_init`'s
/// sample if absent.
///
/// `None` falls back to the [default registry](default_registry).
pub fn get_or_register_histogram(
    name: impl Into<String>,
    registry: Option<&Registry>,
    sample_init: impl FnOnce() -> Histogram,
) -> Result<Histogram, RegistryError> {
    registry_or_default(registry).get_or_register_histogram(name, sample_init)
}

/// Returns the meter under `name`, creating it if absent.
///
/// `None` falls back to the [default registry](default_registry).
pub fn get_or_register_meter(
    name: impl Into<String>,
    registry: Option<&Registry>,
) -> Result<Meter, RegistryError> {
    registry_or_default(registry).get_or_register_meter(name)
}

/// Returns the timer under `name`, creating it if absent.
///
/// `None` falls back to the [default registry](default_registry).
pub fn get_or_register_timer(
    name: impl Into<String>,
    registry: Option<&Registry>,
) -> Result<Timer, RegistryError> {
    registry_or_default(registry).get_or_register_timer(name)
}

macro_rules! new_registered {
    ($(#[$doc:meta])* $fn_name:ident, $handle:ty, $make:expr) => {
        $(#[$doc])*
        ///
        /// `None` falls back to the [default registry](default_registry).
        pub fn $fn_name(
            name: impl Into<String>,
            registry: Option<&Registry>,
        ) -> Result<$handle, RegistryError> {
            let handle: $handle = $make;
            match registry_or_default(registry).register(name, handle.clone()) {
                Ok(()) => Ok(handle),
                Err(e) => {
                    // A rejected meter or timer must not stay on the arbiter.
                    Instrument::from(handle).stop();
                    Err(e)
                }
            }
        }
    };
}

new_registered! {
    /// Creates a counter and registers it under `name`.
    new_registered_counter, Counter, Counter::new()
}

new_registered! {
    /// Creates a gauge and registers it under `name`.
    new_registered_gauge, Gauge, Gauge::new()
}

new_registered! {
    /// Creates a float gauge and registers it under `name`.
    new_registered_gauge_float, GaugeFloat, GaugeFloat::new()
}

new_registered! {
    /// Creates a meter and registers it under `name`.
    new_registered_meter, Meter, Meter::new()
}

new_registered! {
    /// Creates a timer and registers it under `name`.
    new_registered_timer, Timer, Timer::new()
}

/// Creates a functional gauge over `f` and registers it under `name`.
///
/// `None` falls back to the [default registry](default_registry).
pub fn new_registered_functional_gauge(
    name: impl Into<String>,
    registry: Option<&Registry>,
    f: impl Fn() -> i64 + Send + Sync + 'static,
) -> Result<FunctionalGauge, RegistryError> {
    let gauge = FunctionalGauge::new(f);
    registry_or_default(registry).register(name, gauge.clone())?;
    Ok(gauge)
}

/// Creates a functional float gauge over `f` and registers it under `name`.
///
/// `None` falls back to the [default registry](default_registry).
pub fn new_registered_functional_gauge_float(
    name: impl Into<String>,
    registry: Option<&Registry>,
    f: impl Fn() -> f64 + Send + Sync + 'static,
) -> Result<FunctionalGaugeFloat, RegistryError> {
    let gauge = FunctionalGaugeFloat::new(f);
    registry_or_default(registry).register(name, gauge.clone())?;
    Ok(gauge)
}

/// Creates a histogram over `sample` and registers it under `name`.
///
/// `None` falls back to the [default registry](default_registry).
pub fn new_registered_histogram(
    name: impl Into<String>,
    registry: Option<&Registry>,
    sample: impl Sample + 'static,
) -> Result<Histogram, RegistryError> {
    let histogram = Histogram::new(sample);
    registry_or_default(registry).register(name, histogram.clone())?;
    Ok(histogram)
}

/// Creates a healthcheck around `check` and registers it under `name`.
///
/// `None` falls back to the [default registry](default_registry).
pub fn new_registered_healthcheck(
    name: impl Into<String>,
    registry: Option<&Registry>,
    check: impl Fn() -> Result<(), String> + Send + Sync + 'static,
) -> Result<Healthcheck, RegistryError> {
    let healthcheck = Healthcheck::new(check);
    registry_or_default(registry).register(name, healthcheck.clone())?;
    Ok(healthcheck)
}
