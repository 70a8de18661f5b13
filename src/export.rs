//! Uniform per-kind value summaries for exporters.
//!
//! Exporters consume the registry through [`Registry::each`] or
//! [`Registry::get_all`]; the latter flattens every instrument into a
//! [`MetricValue`], a plain-data summary that serializes to the familiar
//! `{count, m1, m5, ...}` shapes.
//!
//! [`Registry::each`]: crate::Registry::each
//! [`Registry::get_all`]: crate::Registry::get_all

use serde::Serialize;

use crate::histogram::HistogramSnapshot;
use crate::meter::MeterSnapshot;
use crate::registry::Instrument;

/// The quantiles exported for histograms and timers.
pub const EXPORT_PERCENTILES: [f64; 5] = [0.5, 0.75, 0.95, 0.99, 0.999];

/// A point-in-time, export-ready summary of one instrument.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    /// A counter's running total.
    Counter {
        /// The current count.
        count: i64,
    },
    /// An integer gauge's latest value.
    Gauge {
        /// The current value.
        value: i64,
    },
    /// A floating-point gauge's latest value.
    GaugeFloat {
        /// The current value.
        value: f64,
    },
    /// A histogram's distribution summary.
    Histogram(HistogramValues),
    /// A meter's rate summary.
    Meter(MeterValues),
    /// A timer's combined distribution and rate summary.
    Timer(TimerValues),
    /// A healthcheck's latest outcome.
    Healthcheck {
        /// The recorded failure, or `None` when healthy.
        error: Option<String>,
    },
}

/// Distribution summary fields shared by histograms and timers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramValues {
    /// Observations ever recorded.
    pub count: u64,
    /// Smallest retained value.
    pub min: i64,
    /// Largest retained value.
    pub max: i64,
    /// Mean of the retained values.
    pub mean: f64,
    /// Population standard deviation of the retained values.
    pub std_dev: f64,
    /// Population variance of the retained values.
    pub variance: f64,
    /// Median estimate.
    pub p50: f64,
    /// 75th percentile estimate.
    pub p75: f64,
    /// 95th percentile estimate.
    pub p95: f64,
    /// 99th percentile estimate.
    pub p99: f64,
    /// 99.9th percentile estimate.
    pub p999: f64,
}

/// Rate summary fields for meters.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterValues {
    /// Events ever marked.
    pub count: i64,
    /// One-minute moving average rate.
    pub m1: f64,
    /// Five-minute moving average rate.
    pub m5: f64,
    /// Fifteen-minute moving average rate.
    pub m15: f64,
    /// Mean rate since creation.
    pub mean: f64,
}

/// Combined duration and rate summary for timers.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerValues {
    /// Durations ever recorded.
    pub count: u64,
    /// Smallest retained duration, in nanoseconds.
    pub min: i64,
    /// Largest retained duration, in nanoseconds.
    pub max: i64,
    /// Mean retained duration, in nanoseconds.
    pub mean: f64,
    /// Population standard deviation of retained durations.
    pub std_dev: f64,
    /// Population variance of retained durations.
    pub variance: f64,
    /// Median estimate.
    pub p50: f64,
    /// 75th percentile estimate.
    pub p75: f64,
    /// 95th percentile estimate.
    pub p95: f64,
    /// 99th percentile estimate.
    pub p99: f64,
    /// 99.9th percentile estimate.
    pub p999: f64,
    /// One-minute moving average call rate.
    pub m1: f64,
    /// Five-minute moving average call rate.
    pub m5: f64,
    /// Fifteen-minute moving average call rate.
    pub m15: f64,
    /// Mean call rate since creation.
    pub mean_rate: f64,
}

fn histogram_values(snapshot: &HistogramSnapshot) -> HistogramValues {
    let ps = snapshot.percentiles(&EXPORT_PERCENTILES);
    HistogramValues {
        count: snapshot.count(),
        min: snapshot.min(),
        max: snapshot.max(),
        mean: snapshot.mean(),
        std_dev: snapshot.std_dev(),
        variance: snapshot.variance(),
        p50: ps[0],
        p75: ps[1],
        p95: ps[2],
        p99: ps[3],
        p999: ps[4],
    }
}

fn meter_values(snapshot: &MeterSnapshot) -> MeterValues {
    MeterValues {
        count: snapshot.count(),
        m1: snapshot.rate1(),
        m5: snapshot.rate5(),
        m15: snapshot.rate15(),
        mean: snapshot.rate_mean(),
    }
}

impl Instrument {
    /// Summarises the instrument into an export-ready [`MetricValue`].
    pub fn value(&self) -> MetricValue {
        match self {
            Instrument::Counter(c) => MetricValue::Counter { count: c.count() },
            Instrument::Gauge(g) => MetricValue::Gauge { value: g.value() },
            Instrument::GaugeFloat(g) => MetricValue::GaugeFloat { value: g.value() },
            Instrument::FunctionalGauge(g) => MetricValue::Gauge { value: g.value() },
            Instrument::FunctionalGaugeFloat(g) => {
                MetricValue::GaugeFloat { value: g.value() }
            }
            Instrument::Histogram(h) => {
                MetricValue::Histogram(histogram_values(&h.snapshot()))
            }
            Instrument::Meter(m) => MetricValue::Meter(meter_values(&m.snapshot())),
            Instrument::Timer(t) => {
                let snapshot = t.snapshot();
                let h = histogram_values(snapshot.histogram());
                let m = meter_values(snapshot.meter());
                MetricValue::Timer(TimerValues {
                    count: h.count,
                    min: h.min,
                    max: h.max,
                    mean: h.mean,
                    std_dev: h.std_dev,
                    variance: h.variance,
                    p50: h.p50,
                    p75: h.p75,
                    p95: h.p95,
                    p99: h.p99,
                    p999: h.p999,
                    m1: m.m1,
                    m5: m.m5,
                    m15: m.m15,
                    mean_rate: m.mean,
                })
            }
            Instrument::Healthcheck(h) => MetricValue::Healthcheck { error: h.error() },
        }
    }
}
