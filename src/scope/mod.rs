//! Metric vectors bound to one call site.
//!
//! A [`Scope`] is built once at wiring time. It asks the namespace for the
//! vectors its [`Config`] enables and keeps those handles for its whole
//! lifetime; it never requests a vector again afterwards.

pub mod config;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

pub use self::config::{Config, ScopeOption, ValueKind};
use crate::label::{
    IN_FLIGHT, Label, TAG_ERR_CODE, TAG_ERROR, TAG_SUCCESS, TAG_VERSION, TagMap, concat, key_value,
};
use crate::registry::{CounterVec, GaugeVec, HistogramVec, Namespace, TimerVec};
use crate::trace::CallTrace;

enum ValueVec {
    Gauge(Arc<dyn GaugeVec>),
    Histogram(Arc<dyn HistogramVec>),
}

struct Inner {
    name: String,
    config: Config,
    version: Label,
    calls: Option<Arc<dyn CounterVec>>,
    latency: Option<Arc<dyn TimerVec>>,
    errors: Option<Arc<dyn CounterVec>>,
    value: Option<ValueVec>,
}

/// The calls/latency/errors/value vectors of one call site.
///
/// Cheap to clone; clones share the same vectors.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

fn tag_names(fixed: &[&str], extra: &[String]) -> Vec<String> {
    fixed
        .iter()
        .map(|t| t.to_string())
        .chain(extra.iter().cloned())
        .collect()
}

impl Scope {
    /// Bind call site `name` under `ns`, with `tags` as the extra tag names
    /// every observation of this call site carries.
    pub fn new(ns: &Namespace, name: &str, config: Config, tags: &[&str]) -> Self {
        let ns = ns.with_system(name);
        let extra: Vec<String> = tags.iter().map(|t| t.to_string()).collect();

        let calls = config.has_calls().then(|| {
            ns.counter_vec(
                "calls",
                &format!("calls of {name}"),
                &tag_names(&[TAG_SUCCESS, TAG_VERSION], &extra),
            )
        });
        let latency = config.has_latency().then(|| {
            ns.timer_vec(
                "latency",
                &format!("latency of {name}"),
                &tag_names(&[TAG_SUCCESS, TAG_VERSION], &extra),
            )
        });
        let errors = config.has_error().then(|| {
            ns.counter_vec(
                "errors",
                &format!("errors of {name}"),
                &tag_names(&[TAG_VERSION, TAG_ERROR, TAG_ERR_CODE], &extra),
            )
        });

        let mut value_tags = extra.clone();
        value_tags.push(TAG_VERSION.to_string());
        if config.has_error() {
            value_tags.push(TAG_SUCCESS.to_string());
        }
        let description = format!("value of {name}");
        let value = match config.value_kind() {
            ValueKind::None => None,
            ValueKind::Gauge => Some(ValueVec::Gauge(ns.gauge_vec("value", &description, &value_tags))),
            ValueKind::Histogram => {
                if config.buckets().is_empty() {
                    warn!(scope = %ns.path(), "histogram value channel without buckets");
                }
                Some(ValueVec::Histogram(ns.histogram_vec(
                    "value",
                    &description,
                    config.buckets(),
                    &value_tags,
                )))
            }
        };

        debug!(scope = %ns.path(), ?config, tags = ?extra, "scope bound");

        Self {
            inner: Arc::new(Inner {
                name: ns.path().to_string(),
                version: ns.version_label().label(),
                config,
                calls,
                latency,
                errors,
                value,
            }),
        }
    }

    /// Full name of the call site, including its namespace path.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The `sdk` label stamped on every observation.
    pub fn version(&self) -> &Label {
        &self.inner.version
    }

    /// Begin one invocation.
    ///
    /// With the calls channel on, this counts a provisional `success="wip"`
    /// call so the series exists before the first completion lands.
    pub fn start(&self, labels: &[Label]) -> CallTrace {
        if let Some(calls) = &self.inner.calls {
            let head = [self.inner.version.clone(), Label::new(TAG_SUCCESS, IN_FLIGHT)];
            calls.with(&key_value(&concat(&head, labels))).inc();
        }
        CallTrace::new(self.clone(), labels.to_vec())
    }

    /// Add `delta` calls. A delta of zero only registers the series.
    pub fn add_call(&self, tags: &TagMap, delta: u64) {
        if let Some(calls) = &self.inner.calls {
            calls.with(tags).add(delta);
        }
    }

    /// Count one error. `tags` must already carry the classification labels.
    pub fn add_error(&self, tags: &TagMap) {
        if let Some(errors) = &self.inner.errors {
            errors.with(tags).inc();
        }
    }

    pub fn record_latency(&self, tags: &TagMap, latency: Duration) {
        if let Some(timer) = &self.inner.latency {
            timer.with(tags).record(latency);
        }
    }

    /// Set the gauge or record one histogram observation.
    pub fn record_value(&self, tags: &TagMap, value: f64) {
        match &self.inner.value {
            Some(ValueVec::Gauge(gauge)) => gauge.with(tags).set(value),
            Some(ValueVec::Histogram(histogram)) => histogram.with(tags).record(value),
            None => {}
        }
    }
}
