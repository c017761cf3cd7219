//! Error types for callscope.
//!
//! These cover the crate's own fallible setup paths (configuration, call-site
//! tables, telemetry export). Errors *observed* on traced operations are never
//! represented here; they flow through [`crate::classify`] untouched.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid call-site table {path}: {reason}")]
    Table { path: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("telemetry error: {0}")]
    Telemetry(String),
}

pub type Result<T> = std::result::Result<T, Error>;
