//! # callscope
//!
//! Lifecycle instrumentation for traced operations.
//!
//! A call site is measured through a [`scope::Scope`]: `start` opens a
//! [`trace::CallTrace`], and each `sync` on it records a call, its latency,
//! a classified error (see [`classify`]) and optionally a value. Metrics go
//! to any [`registry::Registry`]; OpenTelemetry and in-memory backends ship
//! with the crate. Call sites are described as data in [`site::Table`]s, and
//! [`catalog`] holds the built-in table.

pub mod catalog;
pub mod classify;
pub mod config;
pub mod details;
pub mod error;
pub mod label;
pub mod registry;
pub mod scope;
pub mod site;
pub mod telemetry;
pub mod trace;

pub use classify::{Interrupted, NetworkError, StatusError, classify};
pub use label::{Label, TagMap, Version, key_value};
pub use scope::Scope;
pub use trace::CallTrace;
