//! One measured invocation of a call site.
//!
//! A [`CallTrace`] is handed out by [`Scope::start`]. The `sync*` methods may
//! be called any number of times: multi-phase operations sync once per phase
//! with a stage label, and every sync is an independent observation.
//!
//! The trace is also a guard. If it is dropped before any sync happened (an
//! early return, a `?`, an unwinding panic) and the call site counts calls,
//! it records the invocation as canceled with the labels it was started
//! with, so the provisional `wip` call is always matched by a completion.

use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::classify::{Interrupted, err_labels};
use crate::label::{Label, concat, key_value};
use crate::scope::Scope;

pub struct CallTrace {
    scope: Scope,
    start: Instant,
    labels: Vec<Label>,
    settled: AtomicBool,
}

impl fmt::Debug for CallTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallTrace")
            .field("scope", &self.scope.name())
            .field("elapsed", &self.start.elapsed())
            .field("labels", &self.labels)
            .field("settled", &self.settled.load(Ordering::Relaxed))
            .finish()
    }
}

impl CallTrace {
    pub(crate) fn new(scope: Scope, labels: Vec<Label>) -> Self {
        Self {
            scope,
            start: Instant::now(),
            labels,
            settled: AtomicBool::new(false),
        }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Labels passed to [`Scope::start`].
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Time since [`Scope::start`].
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record one completion: a call and a latency tagged with `success`, and
    /// a classified error when `err` is set.
    ///
    /// Returns the call label set (`sdk`, `success`, then `labels`) so callers
    /// can register sibling series with the same dimensions.
    pub fn sync(&self, err: Option<&(dyn StdError + 'static)>, labels: &[Label]) -> Vec<Label> {
        self.settled.store(true, Ordering::Relaxed);
        let version = self.scope.version().clone();

        if let Some(err) = err {
            let tags = key_value(&err_labels(err, &concat(&[version.clone()], labels)));
            self.scope.add_error(&tags);
        }

        let call_labels = concat(&[version, Label::success(err.is_none())], labels);
        let tags = key_value(&call_labels);
        self.scope.add_call(&tags, 1);
        self.scope.record_latency(&tags, self.start.elapsed());
        call_labels
    }

    /// [`CallTrace::sync`] driven by a `Result`.
    pub fn sync_result<T, E>(&self, result: &Result<T, E>, labels: &[Label]) -> Vec<Label>
    where
        E: StdError + 'static,
    {
        match result {
            Ok(_) => self.sync(None, labels),
            Err(e) => self.sync(Some(e), labels),
        }
    }

    /// Write only the value channel.
    pub fn sync_value(&self, value: f64, labels: &[Label]) {
        self.settled.store(true, Ordering::Relaxed);
        let tags = key_value(&concat(&[self.scope.version().clone()], labels));
        self.scope.record_value(&tags, value);
    }

    /// [`CallTrace::sync`], then the value only when there was no error.
    pub fn sync_with_value(&self, err: Option<&(dyn StdError + 'static)>, value: f64, labels: &[Label]) {
        self.sync(err, labels);
        if err.is_none() {
            self.sync_value(value, labels);
        }
    }

    /// Drop without recording anything further.
    pub fn disarm(self) {
        self.settled.store(true, Ordering::Relaxed);
    }
}

impl Drop for CallTrace {
    fn drop(&mut self) {
        if self.settled.load(Ordering::Relaxed) || !self.scope.config().has_calls() {
            return;
        }
        debug!(
            scope = %self.scope.name(),
            panicking = std::thread::panicking(),
            "call trace dropped before completion, recording as canceled"
        );
        let labels = std::mem::take(&mut self.labels);
        self.sync(Some(&Interrupted::Canceled), &labels);
    }
}
