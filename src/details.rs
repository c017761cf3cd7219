//! Event-group detail mask.
//!
//! Call sites belong to a group; a [`crate::registry::Namespace`] carries the
//! mask of groups the process wants measured and the binder skips the rest.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Details(u32);

impl Details {
    pub const NONE: Details = Details(0);
    pub const DRIVER_NET: Details = Details(1 << 0);
    pub const DRIVER_CORE: Details = Details(1 << 1);
    pub const DRIVER_CLUSTER: Details = Details(1 << 2);
    pub const DRIVER_CREDENTIALS: Details = Details(1 << 3);
    pub const TABLE_POOL: Details = Details(1 << 4);
    pub const TABLE_SESSION: Details = Details(1 << 5);
    pub const RETRY: Details = Details(1 << 6);
    pub const DISCOVERY: Details = Details(1 << 7);
    pub const SCRIPTING: Details = Details(1 << 8);
    pub const DATABASE_SQL: Details = Details(1 << 9);

    pub const DRIVER: Details = Details(
        Self::DRIVER_NET.0 | Self::DRIVER_CORE.0 | Self::DRIVER_CLUSTER.0 | Self::DRIVER_CREDENTIALS.0,
    );
    pub const TABLE: Details = Details(Self::TABLE_POOL.0 | Self::TABLE_SESSION.0);
    pub const ALL: Details = Details((1 << 10) - 1);

    const NAMES: &'static [(&'static str, Details)] = &[
        ("driver.net", Self::DRIVER_NET),
        ("driver.core", Self::DRIVER_CORE),
        ("driver.cluster", Self::DRIVER_CLUSTER),
        ("driver.credentials", Self::DRIVER_CREDENTIALS),
        ("table.pool", Self::TABLE_POOL),
        ("table.session", Self::TABLE_SESSION),
        ("retry", Self::RETRY),
        ("discovery", Self::DISCOVERY),
        ("scripting", Self::SCRIPTING),
        ("database.sql", Self::DATABASE_SQL),
        ("driver", Self::DRIVER),
        ("table", Self::TABLE),
        ("all", Self::ALL),
    ];

    /// True if any group in `other` is enabled in `self`.
    pub fn contains(self, other: Details) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Details {
    type Output = Details;

    fn bitor(self, rhs: Details) -> Details {
        Details(self.0 | rhs.0)
    }
}

impl BitOrAssign for Details {
    fn bitor_assign(&mut self, rhs: Details) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Details {
    type Output = Details;

    fn bitand(self, rhs: Details) -> Details {
        Details(self.0 & rhs.0)
    }
}

/// Parses a comma-separated list of group names, e.g. `"driver.net,retry"`.
impl FromStr for Details {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = Details::NONE;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (_, flag) = Self::NAMES
                .iter()
                .find(|(name, _)| *name == part)
                .ok_or_else(|| format!("unknown detail group: {part}"))?;
            out |= *flag;
        }
        Ok(out)
    }
}

/// Single group name when exactly one matches, otherwise the list of leaf groups.
impl fmt::Display for Details {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((name, _)) = Self::NAMES.iter().rev().find(|(_, d)| *d == *self) {
            return f.write_str(name);
        }
        let leaves: Vec<&str> = Self::NAMES[..10]
            .iter()
            .filter(|(_, d)| self.contains(*d))
            .map(|(name, _)| *name)
            .collect();
        f.write_str(&leaves.join(","))
    }
}

impl Serialize for Details {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Details {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_group_lists() {
        let d: Details = "driver.net, retry".parse().unwrap();
        assert!(d.contains(Details::DRIVER_NET));
        assert!(d.contains(Details::RETRY));
        assert!(!d.contains(Details::DISCOVERY));
        assert_eq!("all".parse::<Details>().unwrap(), Details::ALL);
        assert!("".parse::<Details>().unwrap().is_empty());
    }

    #[test]
    fn rejects_unknown_groups() {
        assert!("driver.bogus".parse::<Details>().is_err());
    }

    #[test]
    fn displays_aliases_and_leaves() {
        assert_eq!(Details::DRIVER.to_string(), "driver");
        assert_eq!((Details::RETRY | Details::SCRIPTING).to_string(), "retry,scripting");
    }
}
