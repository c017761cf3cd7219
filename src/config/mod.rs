//! Typed process configuration from environment variables.
//!
//! Loads once at startup and fails fast on malformed values. Every variable
//! is optional; unset ones fall back to the defaults below.

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::catalog;
use crate::details::Details;
use crate::error::{Error, Result};
use crate::label::Version;
use crate::registry::{Namespace, Registry};
use crate::site::Table;

#[derive(Debug, Clone)]
pub struct Config {
    /// Value of the `sdk` tag on every observation.
    pub version: Version,
    /// Root of every metric name.
    pub namespace: String,
    /// Joins namespace segments.
    pub separator: String,
    /// Event groups to bind.
    pub details: Details,
    /// Directory of call-site TOML tables merged on top of the catalog.
    pub sites_dir: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let details = match optional_var("CALLSCOPE_DETAILS") {
            Some(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("CALLSCOPE_DETAILS: {e}")))?,
            None => Details::ALL,
        };
        let separator = optional_var("CALLSCOPE_SEPARATOR").unwrap_or_else(|| ".".to_string());
        if separator.is_empty() {
            return Err(Error::Config("CALLSCOPE_SEPARATOR must not be empty".to_string()));
        }

        Ok(Self {
            version: optional_var("CALLSCOPE_VERSION")
                .map(Version::new)
                .unwrap_or_default(),
            namespace: optional_var("CALLSCOPE_NAMESPACE").unwrap_or_default(),
            separator,
            details,
            sites_dir: optional_var("CALLSCOPE_SITES").map(PathBuf::from),
            otel_endpoint: optional_var("OTEL_ENDPOINT"),
            log_level: optional_var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Root namespace over `registry` with this configuration's naming,
    /// detail mask and version.
    pub fn root(&self, registry: Arc<dyn Registry>) -> Namespace {
        Namespace::new(registry)
            .namespace(self.namespace.clone())
            .separator(self.separator.clone())
            .details(self.details)
            .version(self.version.clone())
    }

    /// The built-in catalog plus any tables found in `sites_dir`.
    pub fn table(&self) -> Result<Table> {
        let base = catalog();
        let Some(dir) = &self.sites_dir else {
            return Ok(base);
        };
        let extra = Table::load_from_dir(dir)?;
        base.merge(extra).map_err(|reason| Error::Table {
            path: dir.display().to_string(),
            reason,
        })
    }
}

/// Unset and blank variables are both treated as absent.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
