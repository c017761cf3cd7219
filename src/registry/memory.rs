//! In-process recording registry.
//!
//! Keeps every series and every observation in memory. Meant for tests and
//! for printing what a workload produced; it never aggregates beyond the
//! running counter/gauge value and never exports anything.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;

use super::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, HistogramVec, Registry, Timer, TimerVec,
    VecDesc, VectorCache, project,
};
use crate::label::TagMap;

/// Current state of one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Sample {
    Counter(u64),
    Gauge(f64),
    /// Every recorded value, in order.
    Histogram(Vec<f64>),
    /// Every recorded duration in seconds, in order.
    Timer(Vec<f64>),
}

impl Sample {
    /// Vector kind this sample belongs to.
    pub fn kind(&self) -> &'static str {
        match self {
            Sample::Counter(_) => "counter",
            Sample::Gauge(_) => "gauge",
            Sample::Histogram(_) => "histogram",
            Sample::Timer(_) => "timer",
        }
    }

    /// Number of writes for distributions, running value for counters.
    pub fn count(&self) -> usize {
        match self {
            Sample::Counter(n) => *n as usize,
            Sample::Gauge(_) => 1,
            Sample::Histogram(v) | Sample::Timer(v) => v.len(),
        }
    }
}

/// One labelled series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub tags: TagMap,
    pub sample: Sample,
}

impl Series {
    /// True if every `(tag, value)` in `filter` is present on this series.
    pub fn matches(&self, filter: &[(&str, &str)]) -> bool {
        filter
            .iter()
            .all(|(tag, value)| self.tags.get(*tag).is_some_and(|v| v == value))
    }
}

/// Name, kind and projected tags of one series. Vectors of different kinds
/// may share a name without sharing series.
type SeriesKey = (String, &'static str, TagMap);

type Store = Arc<Mutex<BTreeMap<SeriesKey, Sample>>>;

fn lock(store: &Store) -> MutexGuard<'_, BTreeMap<SeriesKey, Sample>> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Registry that records into memory and counts vector creations.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    store: Store,
    cache: VectorCache,
    created: AtomicUsize,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many distinct vectors the registry created.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// All series, ordered by name, kind, then tags.
    pub fn snapshot(&self) -> Vec<Series> {
        lock(&self.store)
            .iter()
            .map(|((name, _, tags), sample)| Series {
                name: name.clone(),
                tags: tags.clone(),
                sample: sample.clone(),
            })
            .collect()
    }

    /// Series named `name` whose tags match `filter`.
    pub fn find(&self, name: &str, filter: &[(&str, &str)]) -> Vec<Series> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.name == name && s.matches(filter))
            .collect()
    }

    /// Sum of matching counters.
    pub fn counter(&self, name: &str, filter: &[(&str, &str)]) -> u64 {
        self.find(name, filter)
            .iter()
            .map(|s| match s.sample {
                Sample::Counter(n) => n,
                _ => 0,
            })
            .sum()
    }

    /// Concatenated observations of matching histograms and timers.
    pub fn observations(&self, name: &str, filter: &[(&str, &str)]) -> Vec<f64> {
        self.find(name, filter)
            .into_iter()
            .flat_map(|s| match s.sample {
                Sample::Histogram(v) | Sample::Timer(v) => v,
                _ => Vec::new(),
            })
            .collect()
    }

    /// Value of the first matching gauge.
    pub fn gauge(&self, name: &str, filter: &[(&str, &str)]) -> Option<f64> {
        self.find(name, filter).into_iter().find_map(|s| match s.sample {
            Sample::Gauge(v) => Some(v),
            _ => None,
        })
    }

    fn vector(&self, desc: &VecDesc, empty: Sample) -> MemoryVec {
        self.created.fetch_add(1, Ordering::Relaxed);
        MemoryVec {
            store: Arc::clone(&self.store),
            name: desc.name.clone(),
            tags: desc.tags.clone(),
            empty,
        }
    }
}

/// Vector of any kind; the kind is fixed by the empty sample it starts from.
struct MemoryVec {
    store: Store,
    name: String,
    tags: Vec<String>,
    empty: Sample,
}

impl MemoryVec {
    fn instance(&self, tags: &TagMap) -> Arc<MemorySeries> {
        let key = (self.name.clone(), self.empty.kind(), project(&self.tags, tags));
        lock(&self.store)
            .entry(key.clone())
            .or_insert_with(|| self.empty.clone());
        Arc::new(MemorySeries {
            store: Arc::clone(&self.store),
            key,
        })
    }
}

struct MemorySeries {
    store: Store,
    key: SeriesKey,
}

impl MemorySeries {
    fn update(&self, f: impl FnOnce(&mut Sample)) {
        if let Some(sample) = lock(&self.store).get_mut(&self.key) {
            f(sample);
        }
    }
}

impl Counter for MemorySeries {
    fn add(&self, delta: u64) {
        self.update(|s| {
            if let Sample::Counter(n) = s {
                *n += delta;
            }
        });
    }
}

impl Gauge for MemorySeries {
    fn set(&self, value: f64) {
        self.update(|s| {
            if let Sample::Gauge(v) = s {
                *v = value;
            }
        });
    }

    fn add(&self, delta: f64) {
        self.update(|s| {
            if let Sample::Gauge(v) = s {
                *v += delta;
            }
        });
    }
}

impl Histogram for MemorySeries {
    fn record(&self, value: f64) {
        self.update(|s| {
            if let Sample::Histogram(v) = s {
                v.push(value);
            }
        });
    }
}

impl Timer for MemorySeries {
    fn record(&self, elapsed: Duration) {
        self.update(|s| {
            if let Sample::Timer(v) = s {
                v.push(elapsed.as_secs_f64());
            }
        });
    }
}

impl CounterVec for MemoryVec {
    fn with(&self, tags: &TagMap) -> Arc<dyn Counter> {
        self.instance(tags)
    }
}

impl GaugeVec for MemoryVec {
    fn with(&self, tags: &TagMap) -> Arc<dyn Gauge> {
        self.instance(tags)
    }
}

impl HistogramVec for MemoryVec {
    fn with(&self, tags: &TagMap) -> Arc<dyn Histogram> {
        self.instance(tags)
    }
}

impl TimerVec for MemoryVec {
    fn with(&self, tags: &TagMap) -> Arc<dyn Timer> {
        self.instance(tags)
    }
}

impl Registry for MemoryRegistry {
    fn counter_vec(&self, desc: &VecDesc) -> Arc<dyn CounterVec> {
        self.cache
            .counter(desc, || Arc::new(self.vector(desc, Sample::Counter(0))))
    }

    fn gauge_vec(&self, desc: &VecDesc) -> Arc<dyn GaugeVec> {
        self.cache
            .gauge(desc, || Arc::new(self.vector(desc, Sample::Gauge(0.0))))
    }

    fn histogram_vec(&self, desc: &VecDesc, _buckets: &[f64]) -> Arc<dyn HistogramVec> {
        self.cache.histogram(desc, || {
            Arc::new(self.vector(desc, Sample::Histogram(Vec::new())))
        })
    }

    fn timer_vec(&self, desc: &VecDesc) -> Arc<dyn TimerVec> {
        self.cache
            .timer(desc, || Arc::new(self.vector(desc, Sample::Timer(Vec::new()))))
    }
}
