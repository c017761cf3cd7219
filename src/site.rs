//! Declarative call-site tables and the generic binder.
//!
//! A call site is fully described by data: where it lives in the namespace,
//! which detail group gates it, which channels it records and which extra tag
//! names it carries. [`Bound::bind`] turns a [`Table`] into one [`Scope`] per
//! enabled site; [`Bound::binding`] pairs a scope with the function that
//! pulls labels out of the caller's event info.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::details::Details;
use crate::error::{Error, Result};
use crate::label::Label;
use crate::registry::Namespace;
use crate::scope::{Config, Scope};
use crate::trace::CallTrace;

// ---------------------------------------------------------------------------
// Call site
// ---------------------------------------------------------------------------

fn every_group() -> Details {
    Details::ALL
}

/// One row of a call-site table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CallSite {
    /// Subsystem path below the namespace root, e.g. `["driver", "net"]`.
    #[serde(default)]
    pub system: Vec<String>,
    pub name: String,
    /// Detail group gating this site. Defaults to every group.
    #[serde(default = "every_group")]
    pub group: Details,
    #[serde(default)]
    pub config: Config,
    /// Extra tag names beyond the per-channel fixed ones.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CallSite {
    pub fn new(system: &[&str], name: &str, group: Details, config: Config, tags: &[&str]) -> Self {
        Self {
            system: system.iter().map(|s| s.to_string()).collect(),
            name: name.to_string(),
            group,
            config,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Stable lookup key: system path and name joined with `.`.
    pub fn key(&self) -> String {
        let mut parts: Vec<&str> = self.system.iter().map(String::as_str).collect();
        parts.push(&self.name);
        parts.join(".")
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct TableFile {
    #[serde(default)]
    site: Vec<CallSite>,
}

/// An ordered set of call sites with unique keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    sites: Vec<CallSite>,
}

impl Table {
    /// Build a table, rejecting duplicate keys and bad value configs.
    pub fn new(sites: Vec<CallSite>) -> std::result::Result<Self, String> {
        let mut table = Self::default();
        for site in sites {
            table.push(site)?;
        }
        Ok(table)
    }

    fn push(&mut self, site: CallSite) -> std::result::Result<(), String> {
        let key = site.key();
        if site.name.is_empty() {
            return Err("call site with empty name".to_string());
        }
        if self.sites.iter().any(|s| s.key() == key) {
            return Err(format!("duplicate call site {key}"));
        }
        site.config
            .validate()
            .map_err(|reason| format!("call site {key}: {reason}"))?;
        self.sites.push(site);
        Ok(())
    }

    /// Parse a TOML document of `[[site]]` entries. `origin` names the source
    /// in error messages.
    pub fn from_toml(content: &str, origin: &str) -> Result<Self> {
        let file: TableFile = toml::from_str(content).map_err(|e| Error::Table {
            path: origin.to_string(),
            reason: e.to_string(),
        })?;
        Self::new(file.site).map_err(|reason| Error::Table {
            path: origin.to_string(),
            reason,
        })
    }

    /// Load every `.toml` file in `dir`, in file-name order, into one table.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(dir).map_err(|e| {
            Error::Config(format!("cannot read call-site dir {}: {e}", dir.display()))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut table = Self::default();
        for path in paths {
            let content = std::fs::read_to_string(&path)?;
            let origin = path.display().to_string();
            for site in Self::from_toml(&content, &origin)?.sites {
                table.push(site).map_err(|reason| Error::Table {
                    path: origin.clone(),
                    reason,
                })?;
            }
        }
        Ok(table)
    }

    /// Append every site of `other`.
    pub fn merge(mut self, other: Table) -> std::result::Result<Self, String> {
        for site in other.sites {
            self.push(site)?;
        }
        Ok(self)
    }

    pub fn sites(&self) -> &[CallSite] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Binder
// ---------------------------------------------------------------------------

/// Scopes bound from a table, keyed by [`CallSite::key`].
#[derive(Debug, Clone, Default)]
pub struct Bound {
    scopes: BTreeMap<String, Scope>,
}

impl Bound {
    /// Bind every site whose group is enabled in the namespace's detail mask.
    pub fn bind(ns: &Namespace, table: &Table) -> Self {
        let mask = ns.detail_mask();
        let mut scopes = BTreeMap::new();
        for site in table.sites() {
            if !mask.contains(site.group) {
                debug!(site = %site.key(), group = %site.group, "call site disabled by detail mask");
                continue;
            }
            let parent = site
                .system
                .iter()
                .fold(ns.clone(), |parent, system| parent.with_system(system));
            let tags: Vec<&str> = site.tags.iter().map(String::as_str).collect();
            let scope = Scope::new(&parent, &site.name, site.config.clone(), &tags);
            scopes.insert(site.key(), scope);
        }
        info!(bound = scopes.len(), total = table.len(), details = %mask, "call sites bound");
        Self { scopes }
    }

    pub fn get(&self, key: &str) -> Option<&Scope> {
        self.scopes.get(key)
    }

    /// Start an invocation of `key`; `None` when the site is not bound.
    pub fn start(&self, key: &str, labels: &[Label]) -> Option<CallTrace> {
        self.get(key).map(|scope| scope.start(labels))
    }

    /// Pair the scope for `key` with a label extractor over event info `I`.
    pub fn binding<I>(&self, key: &str, extract: fn(&I) -> Vec<Label>) -> Option<Binding<I>> {
        self.get(key).map(|scope| Binding {
            scope: scope.clone(),
            extract,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scope)> {
        self.scopes.iter().map(|(k, s)| (k.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// A bound scope plus the label extractor for its event info type.
pub struct Binding<I> {
    scope: Scope,
    extract: fn(&I) -> Vec<Label>,
}

impl<I> Clone for Binding<I> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            extract: self.extract,
        }
    }
}

impl<I> Binding<I> {
    pub fn new(scope: Scope, extract: fn(&I) -> Vec<Label>) -> Self {
        Self { scope, extract }
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn labels(&self, info: &I) -> Vec<Label> {
        (self.extract)(info)
    }

    /// Start an invocation labelled from `info`.
    pub fn start(&self, info: &I) -> CallTrace {
        self.scope.start(&self.labels(info))
    }
}
