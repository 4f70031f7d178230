//! Core type definitions for the zone engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a tracked taxon.
///
/// Identifiers are assigned by the evolver in admission order and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaxonId(pub u64);

impl TaxonId {
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TaxonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a zone controller registered with an evolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub usize);

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the prior zones of a connectivity group relate to its current zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectivityType {
    /// A prior zone with no overlapping current zone.
    OneToNone,
    OneToOne,
    /// A prior zone split into several current zones.
    OneToMany,
    /// Several prior zones merged into one current zone.
    ManyToOne,
    ManyToMany,
    /// A current zone that overlaps no prior zone.
    NoneToOne,
}

impl ConnectivityType {
    /// Classify a group from its prior and current zone counts.
    ///
    /// Returns `None` for the empty group, which never occurs in a classification.
    pub fn from_counts(prior: usize, current: usize) -> Option<Self> {
        match (prior, current) {
            (0, 0) => None,
            (0, _) => Some(ConnectivityType::NoneToOne),
            (1, 0) => Some(ConnectivityType::OneToNone),
            (1, 1) => Some(ConnectivityType::OneToOne),
            (1, _) => Some(ConnectivityType::OneToMany),
            (_, 0) => Some(ConnectivityType::OneToNone),
            (_, 1) => Some(ConnectivityType::ManyToOne),
            (_, _) => Some(ConnectivityType::ManyToMany),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectivityType::OneToNone => "one-to-none",
            ConnectivityType::OneToOne => "one-to-one",
            ConnectivityType::OneToMany => "one-to-many",
            ConnectivityType::ManyToOne => "many-to-one",
            ConnectivityType::ManyToMany => "many-to-many",
            ConnectivityType::NoneToOne => "none-to-one",
        }
    }

    /// Whether the relationship splits a range across disjoint current zones.
    pub fn is_fragmenting(&self) -> bool {
        matches!(self, ConnectivityType::OneToMany | ConnectivityType::ManyToMany)
    }
}

impl fmt::Display for ConnectivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
