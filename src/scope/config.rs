//! Per-call-site channel toggles.
//!
//! Built once from an ordered option list and immutable afterwards. Later
//! options override earlier ones addressing the same field.

use serde::{Deserialize, Serialize};

/// Kind of the optional value channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    None,
    Gauge,
    Histogram,
}

/// One construction option for [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeOption {
    WithoutCalls,
    WithoutLatency,
    WithoutError,
    Value(ValueKind),
    Buckets(Vec<f64>),
}

/// Which channels a call site records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    calls: bool,
    latency: bool,
    error: bool,
    value: ValueKind,
    buckets: Vec<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calls: true,
            latency: true,
            error: true,
            value: ValueKind::None,
            buckets: Vec::new(),
        }
    }
}

impl Config {
    /// Apply `opts` in order on top of the defaults.
    pub fn new(opts: impl IntoIterator<Item = ScopeOption>) -> Self {
        let mut cfg = Self::default();
        for opt in opts {
            match opt {
                ScopeOption::WithoutCalls => cfg.calls = false,
                ScopeOption::WithoutLatency => cfg.latency = false,
                ScopeOption::WithoutError => cfg.error = false,
                ScopeOption::Value(kind) => cfg.value = kind,
                ScopeOption::Buckets(buckets) => cfg.buckets = buckets,
            }
        }
        cfg
    }

    /// Histogram value channel with the given bucket boundaries.
    pub fn histogram(buckets: impl Into<Vec<f64>>) -> Self {
        Self::new([
            ScopeOption::Value(ValueKind::Histogram),
            ScopeOption::Buckets(buckets.into()),
        ])
    }

    /// Gauge value channel only: no calls, latency or errors.
    pub fn gauge_only() -> Self {
        Self::new([
            ScopeOption::WithoutCalls,
            ScopeOption::WithoutLatency,
            ScopeOption::WithoutError,
            ScopeOption::Value(ValueKind::Gauge),
        ])
    }

    pub fn has_calls(&self) -> bool {
        self.calls
    }

    pub fn has_latency(&self) -> bool {
        self.latency
    }

    pub fn has_error(&self) -> bool {
        self.error
    }

    pub fn value_kind(&self) -> ValueKind {
        self.value
    }

    pub fn buckets(&self) -> &[f64] {
        &self.buckets
    }

    /// Check bucket boundaries for a histogram value channel.
    ///
    /// Programmatic construction never fails; this is for configs read from
    /// call-site tables, where a bad boundary list is an operator mistake.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.value != ValueKind::Histogram {
            return Ok(());
        }
        if self.buckets.is_empty() {
            return Err("histogram value channel requires buckets".to_string());
        }
        if let Some(b) = self.buckets.iter().find(|b| !b.is_finite()) {
            return Err(format!("bucket boundary {b} is not finite"));
        }
        if let Some(w) = self.buckets.windows(2).find(|w| w[0] >= w[1]) {
            return Err(format!(
                "bucket boundaries must be strictly ascending ({} >= {})",
                w[0], w[1]
            ));
        }
        Ok(())
    }
}
