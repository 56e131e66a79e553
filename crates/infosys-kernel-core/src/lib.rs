//! Versioned record kernel for information-system registries.
//!
//! A [`Record`] carries one current [`RecordVersion`] and a newest-first history of
//! immutable snapshots. This crate resolves versions, diffs any two versions of the
//! same record, and tracks what a single viewer is looking at. It performs no I/O.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use ulid::Ulid;

mod diff;
mod schema;
mod version;
mod view;

pub use diff::{
    compare, compare_with, ComparisonResult, DiffKind, DiffOptions, DiffStats, FieldDiff,
    ResourceDiff,
};
pub use schema::{FieldKey, FieldValue, RecordDetail, ResourceEntry, ResourceKind};
pub use version::{
    find_version, history_version, list_versions_newest_first, resolve_version,
    resolve_version_detailed, Record, RecordListing, RecordStatus, RecordVersion, Resolution,
    VersionEntry,
};
pub use view::{ViewReport, ViewSession, ViewState};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum KernelError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("invalid view transition: {0}")]
    Transition(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one version, unique within a single record's history.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct VersionId(pub String);

impl VersionId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Mint a fresh, sortable version id for a newly committed version.
    #[must_use]
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VersionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a resource entry, unique within one version's resource list.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(transparent)]
pub struct ResourceId(pub String);

impl ResourceId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
