//! Metric dimensions.
//!
//! A [`Label`] is one `(tag, value)` pair. Label sets are plain vectors; they
//! are collapsed into a [`TagMap`] right before they reach a registry vector.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Tag → value map handed to registry vectors.
///
/// Ordered so that two maps built from the same labels in a different order
/// compare and hash identically.
pub type TagMap = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Well-known tags
// ---------------------------------------------------------------------------

pub const TAG_VERSION: &str = "sdk";
pub const TAG_SOURCE: &str = "source";
pub const TAG_NAME: &str = "name";
pub const TAG_METHOD: &str = "method";
pub const TAG_ERROR: &str = "error";
pub const TAG_ERR_CODE: &str = "errCode";
pub const TAG_ADDRESS: &str = "address";
pub const TAG_ID: &str = "ID";
pub const TAG_NODE_ID: &str = "nodeID";
pub const TAG_DATA_CENTER: &str = "destination";
pub const TAG_STATE: &str = "state";
pub const TAG_IDEMPOTENT: &str = "idempotent";
pub const TAG_SUCCESS: &str = "success";
pub const TAG_STAGE: &str = "stage";

/// Value of the `success` tag on the provisional observation made by
/// [`crate::scope::Scope::start`].
pub const IN_FLIGHT: &str = "wip";

// ---------------------------------------------------------------------------
// Label
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Label {
    pub tag: String,
    pub value: String,
}

impl Label {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }

    /// `success="true"` / `success="false"`.
    pub fn success(ok: bool) -> Self {
        Self::new(TAG_SUCCESS, if ok { "true" } else { "false" })
    }

    /// Stage label for multi-phase operations (`init`, `intermediate`, `finish`).
    pub fn stage(stage: &str) -> Self {
        Self::new(TAG_STAGE, stage)
    }

    /// `destination` label: `local` or `remote` data center.
    pub fn data_center(local: bool) -> Self {
        Self::new(TAG_DATA_CENTER, if local { "local" } else { "remote" })
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.tag, self.value)
    }
}

/// Collapse a label sequence into a tag map. Later labels win on duplicate tags.
pub fn key_value<'a>(labels: impl IntoIterator<Item = &'a Label>) -> TagMap {
    labels
        .into_iter()
        .map(|l| (l.tag.clone(), l.value.clone()))
        .collect()
}

/// Build `head ++ tail` as a fresh label vector.
pub(crate) fn concat(head: &[Label], tail: &[Label]) -> Vec<Label> {
    let mut out = Vec::with_capacity(head.len() + tail.len());
    out.extend_from_slice(head);
    out.extend_from_slice(tail);
    out
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Process-wide value of the `sdk` tag.
///
/// Passed explicitly into every [`crate::registry::Namespace`] rather than read
/// from global state. Anything before the last `/` is dropped, so
/// `"driver/v3.11.0"` and `"v3.11.0"` produce the same label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref();
        let short = raw.rsplit('/').next().unwrap_or(raw);
        Self(short.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn label(&self) -> Label {
        Label::new(TAG_VERSION, self.0.clone())
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_value_last_label_wins() {
        let labels = vec![
            Label::new(TAG_ADDRESS, "a:1"),
            Label::new(TAG_STAGE, "init"),
            Label::new(TAG_ADDRESS, "b:2"),
        ];
        let kv = key_value(&labels);
        assert_eq!(kv.len(), 2);
        assert_eq!(kv[TAG_ADDRESS], "b:2");
        assert_eq!(kv[TAG_STAGE], "init");
    }

    #[test]
    fn key_value_ignores_order_of_distinct_tags() {
        let a = [Label::new("x", "1"), Label::new("y", "2")];
        let b = [Label::new("y", "2"), Label::new("x", "1")];
        assert_eq!(key_value(&a), key_value(&b));
    }

    #[test]
    fn version_keeps_last_path_segment() {
        assert_eq!(Version::new("driver/v3.11.0").as_str(), "v3.11.0");
        assert_eq!(Version::new("v3.11.0").as_str(), "v3.11.0");
        assert_eq!(Version::new("1.2.3").label(), Label::new(TAG_VERSION, "1.2.3"));
    }
}
