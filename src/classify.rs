//! Error taxonomy.
//!
//! Maps any observed error to a deterministic `(error, errCode)` label pair.
//! The mapping is total and performs no I/O: every error lands in exactly one
//! bucket, with `unknown/<message>` as the catch-all.
//!
//! Rules are checked in priority order and each rule looks at the whole
//! `source()` chain before the next rule is tried, so a deadline wrapped in an
//! application error still classifies as a deadline.

use std::error::Error as StdError;
use std::fmt;
use std::io;

use thiserror::Error;

use crate::label::{Label, TAG_ERR_CODE, TAG_ERROR};

/// `errCode` value for errors that carry no backend status code.
pub const NO_CODE: &str = "-1";

// ---------------------------------------------------------------------------
// Error shapes the classifier recognizes
// ---------------------------------------------------------------------------

/// A failed network operation (dial, read, write, close).
#[derive(Debug, Error)]
#[error("{op}: {source}")]
pub struct NetworkError {
    /// Operation that failed, e.g. `dial` or `read`.
    pub op: String,
    pub source: io::Error,
}

impl NetworkError {
    pub fn new(op: impl Into<String>, source: io::Error) -> Self {
        Self {
            op: op.into(),
            source,
        }
    }
}

/// The caller stopped waiting for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    #[error("deadline exceeded")]
    DeadlineExceeded,
    #[error("operation canceled")]
    Canceled,
}

/// Where a backend status error originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Failure of the RPC transport carrying the request.
    Transport,
    /// The backend processed the request and rejected it.
    Operation,
    /// Status with no transport/operation distinction.
    Generic,
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Layer::Transport => "transport",
            Layer::Operation => "operation",
            Layer::Generic => "backend",
        };
        f.write_str(s)
    }
}

/// Structured backend error: a status name plus its numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{layer} error {name} (code {code})")]
pub struct StatusError {
    pub layer: Layer,
    pub name: String,
    pub code: u32,
}

impl StatusError {
    pub fn transport(name: impl Into<String>, code: u32) -> Self {
        Self {
            layer: Layer::Transport,
            name: name.into(),
            code,
        }
    }

    pub fn operation(name: impl Into<String>, code: u32) -> Self {
        Self {
            layer: Layer::Operation,
            name: name.into(),
            code,
        }
    }

    pub fn generic(name: impl Into<String>, code: u32) -> Self {
        Self {
            layer: Layer::Generic,
            name: name.into(),
            code,
        }
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

type Rule = fn(&(dyn StdError + 'static)) -> Option<(String, String)>;

const RULES: &[Rule] = &[network, end_of_stream, deadline, canceled, transport, operation, generic];

/// Classify an error into its `[error, errCode]` label pair.
pub fn classify(err: &(dyn StdError + 'static)) -> [Label; 2] {
    let chain = chain(err);
    let (error, code) = RULES
        .iter()
        .find_map(|rule| chain.iter().find_map(|e| rule(*e)))
        .unwrap_or_else(|| (unknown(err), NO_CODE.to_string()));
    [Label::new(TAG_ERROR, error), Label::new(TAG_ERR_CODE, code)]
}

/// `base` followed by the classification of `err`.
pub fn err_labels(err: &(dyn StdError + 'static), base: &[Label]) -> Vec<Label> {
    let mut out = base.to_vec();
    out.extend(classify(err));
    out
}

/// The error followed by its sources. Custom payloads boxed inside an
/// `io::Error` are unwrapped too, since `io::Error::source` skips them.
fn chain<'a>(err: &'a (dyn StdError + 'static)) -> Vec<&'a (dyn StdError + 'static)> {
    let mut out = Vec::new();
    let mut next = Some(err);
    while let Some(e) = next {
        out.push(e);
        next = match e.downcast_ref::<io::Error>().and_then(io::Error::get_ref) {
            Some(inner) => Some(inner as &(dyn StdError + 'static)),
            None => e.source(),
        };
    }
    out
}

fn network(e: &(dyn StdError + 'static)) -> Option<(String, String)> {
    let net = e.downcast_ref::<NetworkError>()?;
    Some((
        format!("network/{} -> {}", net.op, net.source),
        NO_CODE.to_string(),
    ))
}

fn end_of_stream(e: &(dyn StdError + 'static)) -> Option<(String, String)> {
    let io = e.downcast_ref::<io::Error>()?;
    (io.kind() == io::ErrorKind::UnexpectedEof).then(|| ("io/EOF".to_string(), NO_CODE.to_string()))
}

fn deadline(e: &(dyn StdError + 'static)) -> Option<(String, String)> {
    let hit = e.downcast_ref::<Interrupted>() == Some(&Interrupted::DeadlineExceeded)
        || e.is::<tokio::time::error::Elapsed>()
        || e.downcast_ref::<io::Error>()
            .is_some_and(|io| io.kind() == io::ErrorKind::TimedOut);
    hit.then(|| ("context/DeadlineExceeded".to_string(), NO_CODE.to_string()))
}

fn canceled(e: &(dyn StdError + 'static)) -> Option<(String, String)> {
    (e.downcast_ref::<Interrupted>() == Some(&Interrupted::Canceled))
        .then(|| ("context/Canceled".to_string(), NO_CODE.to_string()))
}

fn status<'a>(e: &'a (dyn StdError + 'static), layer: Layer) -> Option<&'a StatusError> {
    e.downcast_ref::<StatusError>().filter(|s| s.layer == layer)
}

fn transport(e: &(dyn StdError + 'static)) -> Option<(String, String)> {
    let s = status(e, Layer::Transport)?;
    Some((format!("transport/{}", s.name), format!("{:06}", s.code)))
}

fn operation(e: &(dyn StdError + 'static)) -> Option<(String, String)> {
    let s = status(e, Layer::Operation)?;
    Some((format!("operation/{}", s.name), format!("{:06}", s.code)))
}

fn generic(e: &(dyn StdError + 'static)) -> Option<(String, String)> {
    let s = status(e, Layer::Generic)?;
    Some((s.name.clone(), s.code.to_string()))
}

fn unknown(e: &(dyn StdError + 'static)) -> String {
    format!("unknown/{}", e.to_string().replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("query failed")]
    struct Wrapped(#[source] Interrupted);

    #[test]
    fn wrapped_errors_classify_by_their_source() {
        let [error, code] = classify(&Wrapped(Interrupted::DeadlineExceeded));
        assert_eq!(error.value, "context/DeadlineExceeded");
        assert_eq!(code.value, NO_CODE);
    }

    #[test]
    fn io_error_payload_is_inspected() {
        let err = io::Error::other(StatusError::operation("OVERLOADED", 400060));
        let [error, code] = classify(&err);
        assert_eq!(error.value, "operation/OVERLOADED");
        assert_eq!(code.value, "400060");
    }

    #[test]
    fn network_beats_lower_priority_rules() {
        let err = NetworkError::new("dial", io::Error::new(io::ErrorKind::TimedOut, "i/o timeout"));
        let [error, _] = classify(&err);
        assert_eq!(error.value, "network/dial -> i/o timeout");
    }
}
