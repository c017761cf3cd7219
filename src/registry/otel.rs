//! OpenTelemetry-backed registry.
//!
//! Vectors map onto OTel instruments from a single [`Meter`]: counters onto
//! `u64_counter`, gauges onto `f64_gauge`, histograms onto `f64_histogram`
//! with explicit boundaries and timers onto an `f64_histogram` in
//! milliseconds.
//! Export is whatever the meter provider behind the meter is wired to; see
//! [`crate::telemetry::init_telemetry`].

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter as OtelCounter, Gauge as OtelGauge, Histogram as OtelHistogram, Meter};

use super::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec, Registry, Timer, TimerVec,
    VecDesc, VectorCache, project,
};
use crate::label::TagMap;

/// Instrumentation scope name used for the global meter.
pub const METER_NAME: &str = "callscope";

/// Registry creating OTel instruments from one meter.
///
/// Clones share the meter and the vector cache, so gauge state kept for
/// `add` is never split between two copies of the same vector.
#[derive(Clone)]
pub struct OtelRegistry {
    meter: Meter,
    cache: VectorCache,
}

static GLOBAL: OnceLock<OtelRegistry> = OnceLock::new();

impl OtelRegistry {
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            cache: VectorCache::new(),
        }
    }

    /// Process-wide registry over the globally-registered `MeterProvider`.
    /// Every call returns a handle to the same cache.
    pub fn global() -> Self {
        GLOBAL
            .get_or_init(|| Self::new(opentelemetry::global::meter(METER_NAME)))
            .clone()
    }
}

fn attributes(declared: &[String], tags: &TagMap) -> Vec<KeyValue> {
    project(declared, tags)
        .into_iter()
        .map(|(k, v)| KeyValue::new(k, v))
        .collect()
}

// ---------------------------------------------------------------------------
// Counter
// ---------------------------------------------------------------------------

struct CounterVector {
    counter: OtelCounter<u64>,
    tags: Vec<String>,
}

struct CounterInstance {
    counter: OtelCounter<u64>,
    attrs: Vec<KeyValue>,
}

impl Counter for CounterInstance {
    fn add(&self, delta: u64) {
        self.counter.add(delta, &self.attrs);
    }
}

impl CounterVec for CounterVector {
    fn with(&self, tags: &TagMap) -> Arc<dyn Counter> {
        Arc::new(CounterInstance {
            counter: self.counter.clone(),
            attrs: attributes(&self.tags, tags),
        })
    }
}

// ---------------------------------------------------------------------------
// Gauge
// ---------------------------------------------------------------------------

/// OTel gauges only accept absolute values, so the last value per series is
/// kept here to support `add`.
struct GaugeVector {
    gauge: OtelGauge<f64>,
    tags: Vec<String>,
    last: Arc<Mutex<BTreeMap<TagMap, f64>>>,
}

struct GaugeInstance {
    gauge: OtelGauge<f64>,
    attrs: Vec<KeyValue>,
    key: TagMap,
    last: Arc<Mutex<BTreeMap<TagMap, f64>>>,
}

impl GaugeInstance {
    fn update(&self, f: impl FnOnce(&mut f64)) {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let value = last.entry(self.key.clone()).or_insert(0.0);
        f(value);
        self.gauge.record(*value, &self.attrs);
    }
}

impl Gauge for GaugeInstance {
    fn set(&self, value: f64) {
        self.update(|v| *v = value);
    }

    fn add(&self, delta: f64) {
        self.update(|v| *v += delta);
    }
}

impl GaugeVec for GaugeVector {
    fn with(&self, tags: &TagMap) -> Arc<dyn Gauge> {
        let key = project(&self.tags, tags);
        Arc::new(GaugeInstance {
            gauge: self.gauge.clone(),
            attrs: key.iter().map(|(k, v)| KeyValue::new(k.clone(), v.clone())).collect(),
            key,
            last: Arc::clone(&self.last),
        })
    }
}

// ---------------------------------------------------------------------------
// Histogram and timer
// ---------------------------------------------------------------------------

struct HistogramVector {
    histogram: OtelHistogram<f64>,
    tags: Vec<String>,
}

struct HistogramInstance {
    histogram: OtelHistogram<f64>,
    attrs: Vec<KeyValue>,
}

impl Histogram for HistogramInstance {
    fn record(&self, value: f64) {
        self.histogram.record(value, &self.attrs);
    }
}

impl Timer for HistogramInstance {
    fn record(&self, elapsed: Duration) {
        self.histogram.record(millis(elapsed), &self.attrs);
    }
}

impl HistogramVector {
    fn instance(&self, tags: &TagMap) -> Arc<HistogramInstance> {
        Arc::new(HistogramInstance {
            histogram: self.histogram.clone(),
            attrs: attributes(&self.tags, tags),
        })
    }
}

impl HistogramVec for HistogramVector {
    fn with(&self, tags: &TagMap) -> Arc<dyn Histogram> {
        self.instance(tags)
    }
}

impl TimerVec for HistogramVector {
    fn with(&self, tags: &TagMap) -> Arc<dyn Timer> {
        self.instance(tags)
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

impl OtelRegistry {
    fn counter(&self, desc: &VecDesc) -> Arc<dyn CounterVec> {
        let counter = self
            .meter
            .u64_counter(desc.name.clone())
            .with_description(desc.description.clone())
            .build();
        Arc::new(CounterVector {
            counter,
            tags: desc.tags.clone(),
        })
    }

    fn gauge(&self, desc: &VecDesc) -> Arc<dyn GaugeVec> {
        let gauge = self
            .meter
            .f64_gauge(desc.name.clone())
            .with_description(desc.description.clone())
            .build();
        Arc::new(GaugeVector {
            gauge,
            tags: desc.tags.clone(),
            last: Arc::default(),
        })
    }

    fn histogram(&self, desc: &VecDesc, buckets: &[f64]) -> Arc<dyn HistogramVec> {
        let mut builder = self
            .meter
            .f64_histogram(desc.name.clone())
            .with_description(desc.description.clone());
        // No boundaries means the SDK default bucket layout.
        if !buckets.is_empty() {
            builder = builder.with_boundaries(buckets.to_vec());
        }
        Arc::new(HistogramVector {
            histogram: builder.build(),
            tags: desc.tags.clone(),
        })
    }

    /// Latency in milliseconds; the SDK default boundaries (0 to 10000) are
    /// laid out for that unit.
    fn timer(&self, desc: &VecDesc) -> Arc<dyn TimerVec> {
        let histogram = self
            .meter
            .f64_histogram(desc.name.clone())
            .with_description(desc.description.clone())
            .with_unit(TIMER_UNIT)
            .build();
        Arc::new(HistogramVector {
            histogram,
            tags: desc.tags.clone(),
        })
    }
}

impl Registry for OtelRegistry {
    fn counter_vec(&self, desc: &VecDesc) -> Arc<dyn CounterVec> {
        self.cache.counter(desc, || self.counter(desc))
    }

    fn gauge_vec(&self, desc: &VecDesc) -> Arc<dyn GaugeVec> {
        self.cache.gauge(desc, || self.gauge(desc))
    }

    fn histogram_vec(&self, desc: &VecDesc, buckets: &[f64]) -> Arc<dyn HistogramVec> {
        self.cache.histogram(desc, || self.histogram(desc, buckets))
    }

    fn timer_vec(&self, desc: &VecDesc) -> Arc<dyn TimerVec> {
        self.cache.timer(desc, || self.timer(desc))
    }
}

/// Unit of every timer instrument.
pub const TIMER_UNIT: &str = "ms";

fn millis(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}
