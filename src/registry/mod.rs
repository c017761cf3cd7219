//! Metric registry contract and the naming layer on top of it.
//!
//! A [`Registry`] is the external backend: it hands out labelled metric
//! vectors and resolves identical `(kind, name, tag-name set)` requests to
//! the same vector through its [`VectorCache`]. [`Namespace`] wraps one
//! registry with a subsystem path, the process version label and a detail
//! mask.

pub mod memory;
pub mod otel;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::details::Details;
use crate::label::{TagMap, Version};

// ---------------------------------------------------------------------------
// Instruments
// ---------------------------------------------------------------------------

/// Monotonic count.
pub trait Counter: Send + Sync {
    fn add(&self, delta: u64);

    fn inc(&self) {
        self.add(1);
    }
}

/// Last-value scalar.
pub trait Gauge: Send + Sync {
    fn set(&self, value: f64);
    fn add(&self, delta: f64);
}

/// Distribution of plain values.
pub trait Histogram: Send + Sync {
    fn record(&self, value: f64);
}

/// Distribution of durations.
pub trait Timer: Send + Sync {
    fn record(&self, elapsed: Duration);
}

pub trait CounterVec: Send + Sync {
    fn with(&self, tags: &TagMap) -> Arc<dyn Counter>;
}

pub trait GaugeVec: Send + Sync {
    fn with(&self, tags: &TagMap) -> Arc<dyn Gauge>;
}

pub trait HistogramVec: Send + Sync {
    fn with(&self, tags: &TagMap) -> Arc<dyn Histogram>;
}

pub trait TimerVec: Send + Sync {
    fn with(&self, tags: &TagMap) -> Arc<dyn Timer>;
}

/// Name, help text and declared tag names of a vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VecDesc {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
}

/// Backend that creates metric vectors.
///
/// Creation is idempotent: asking twice for the same kind, full name and set
/// of tag names must return the same vector, whoever asks. Implementations
/// get this by routing creation through a [`VectorCache`].
///
/// Implementations must make instances safe to update from many threads at
/// once. Tags passed to `with` that the vector did not declare are dropped;
/// declared tags that are missing are recorded as empty strings.
pub trait Registry: Send + Sync {
    fn counter_vec(&self, desc: &VecDesc) -> Arc<dyn CounterVec>;
    fn gauge_vec(&self, desc: &VecDesc) -> Arc<dyn GaugeVec>;
    fn histogram_vec(&self, desc: &VecDesc, buckets: &[f64]) -> Arc<dyn HistogramVec>;
    fn timer_vec(&self, desc: &VecDesc) -> Arc<dyn TimerVec>;
}

/// Restrict `tags` to `declared`, filling absent ones with `""`.
pub fn project(declared: &[String], tags: &TagMap) -> TagMap {
    declared
        .iter()
        .map(|name| (name.clone(), tags.get(name).cloned().unwrap_or_default()))
        .collect()
}

// ---------------------------------------------------------------------------
// Vector identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VecKey {
    name: String,
    tags: Vec<String>,
}

impl VecKey {
    fn new(desc: &VecDesc) -> Self {
        let mut tags = desc.tags.clone();
        tags.sort();
        tags.dedup();
        Self {
            name: desc.name.clone(),
            tags,
        }
    }
}

/// One map per vector kind, so kind is part of the identity.
#[derive(Default)]
struct Vectors {
    counters: HashMap<VecKey, Arc<dyn CounterVec>>,
    gauges: HashMap<VecKey, Arc<dyn GaugeVec>>,
    histograms: HashMap<VecKey, Arc<dyn HistogramVec>>,
    timers: HashMap<VecKey, Arc<dyn TimerVec>>,
}

fn get_or_create<V: ?Sized>(
    map: &mut HashMap<VecKey, Arc<V>>,
    kind: &str,
    desc: &VecDesc,
    create: impl FnOnce() -> Arc<V>,
) -> Arc<V> {
    map.entry(VecKey::new(desc))
        .or_insert_with(|| {
            debug!(name = %desc.name, kind, tags = ?desc.tags, "creating metric vector");
            create()
        })
        .clone()
}

/// Identity cache a [`Registry`] keeps its vectors in, keyed by kind, full
/// name and sorted tag-name set. Buckets are not part of the key; the first
/// histogram registered under a name keeps its layout.
///
/// Clones share the same cache.
#[derive(Clone, Default)]
pub struct VectorCache {
    inner: Arc<Mutex<Vectors>>,
}

impl fmt::Debug for VectorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vectors = self.lock();
        f.debug_struct("VectorCache")
            .field("counters", &vectors.counters.len())
            .field("gauges", &vectors.gauges.len())
            .field("histograms", &vectors.histograms.len())
            .field("timers", &vectors.timers.len())
            .finish()
    }
}

impl VectorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(
        &self,
        desc: &VecDesc,
        create: impl FnOnce() -> Arc<dyn CounterVec>,
    ) -> Arc<dyn CounterVec> {
        get_or_create(&mut self.lock().counters, "counter", desc, create)
    }

    pub fn gauge(&self, desc: &VecDesc, create: impl FnOnce() -> Arc<dyn GaugeVec>) -> Arc<dyn GaugeVec> {
        get_or_create(&mut self.lock().gauges, "gauge", desc, create)
    }

    pub fn histogram(
        &self,
        desc: &VecDesc,
        create: impl FnOnce() -> Arc<dyn HistogramVec>,
    ) -> Arc<dyn HistogramVec> {
        get_or_create(&mut self.lock().histograms, "histogram", desc, create)
    }

    pub fn timer(&self, desc: &VecDesc, create: impl FnOnce() -> Arc<dyn TimerVec>) -> Arc<dyn TimerVec> {
        get_or_create(&mut self.lock().timers, "timer", desc, create)
    }

    // A poisoned cache still holds valid vectors; keep serving them.
    fn lock(&self) -> MutexGuard<'_, Vectors> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Namespace
// ---------------------------------------------------------------------------

/// A registry viewed through a subsystem path.
///
/// Holds no vectors itself; every request goes to the registry, which
/// resolves identical requests to the same vector no matter which namespace
/// asked.
#[derive(Clone)]
pub struct Namespace {
    registry: Arc<dyn Registry>,
    path: String,
    separator: String,
    details: Details,
    version: Version,
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("path", &self.path)
            .field("separator", &self.separator)
            .field("details", &self.details)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl Namespace {
    /// Root namespace: empty path, `.` separator, every detail group enabled.
    pub fn new(registry: Arc<dyn Registry>) -> Self {
        Self {
            registry,
            path: String::new(),
            separator: ".".to_string(),
            details: Details::ALL,
            version: Version::default(),
        }
    }

    /// Replace the root path, e.g. the application prefix.
    pub fn namespace(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn details(mut self, details: Details) -> Self {
        self.details = details;
        self
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Child namespace one level deeper.
    pub fn with_system(&self, subsystem: &str) -> Self {
        Self {
            path: self.join(subsystem),
            ..self.clone()
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn detail_mask(&self) -> Details {
        self.details
    }

    pub fn version_label(&self) -> &Version {
        &self.version
    }

    /// Full metric name of `leaf` under this namespace.
    pub fn join(&self, leaf: &str) -> String {
        match (self.path.is_empty(), leaf.is_empty()) {
            (true, _) => leaf.to_string(),
            (false, true) => self.path.clone(),
            (false, false) => format!("{}{}{}", self.path, self.separator, leaf),
        }
    }

    pub fn counter_vec(&self, name: &str, description: &str, tags: &[String]) -> Arc<dyn CounterVec> {
        self.registry.counter_vec(&self.desc(name, description, tags))
    }

    pub fn gauge_vec(&self, name: &str, description: &str, tags: &[String]) -> Arc<dyn GaugeVec> {
        self.registry.gauge_vec(&self.desc(name, description, tags))
    }

    pub fn histogram_vec(
        &self,
        name: &str,
        description: &str,
        buckets: &[f64],
        tags: &[String],
    ) -> Arc<dyn HistogramVec> {
        self.registry
            .histogram_vec(&self.desc(name, description, tags), buckets)
    }

    pub fn timer_vec(&self, name: &str, description: &str, tags: &[String]) -> Arc<dyn TimerVec> {
        self.registry.timer_vec(&self.desc(name, description, tags))
    }

    fn desc(&self, name: &str, description: &str, tags: &[String]) -> VecDesc {
        VecDesc {
            name: self.join(name),
            description: description.to_string(),
            tags: tags.to_vec(),
        }
    }
}
