use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{KernelError, RecordDetail, RecordId, ResourceEntry, VersionId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    InUse,
    ApprovedNotBuilt,
    Maintenance,
    Archived,
}

impl RecordStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InUse => "in_use",
            Self::ApprovedNotBuilt => "approved_not_built",
            Self::Maintenance => "maintenance",
            Self::Archived => "archived",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::InUse => "在用",
            Self::ApprovedNotBuilt => "已批未建",
            Self::Maintenance => "维护中",
            Self::Archived => "已归档",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_use" => Some(Self::InUse),
            "approved_not_built" => Some(Self::ApprovedNotBuilt),
            "maintenance" => Some(Self::Maintenance),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// Registry-level metadata shown in record listings. Not versioned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordListing {
    pub department: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub status: RecordStatus,
    /// Percentage of detail fields filled in, `0..=100`.
    pub completeness: u8,
    pub linked_data_count: u32,
    pub linked_items_count: u32,
    pub is_cascaded: bool,
}

/// Immutable point-in-time capture of a record's detail and resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecordVersion {
    pub version_id: VersionId,
    pub version_label: String,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub modified_by: String,
    pub change_type: String,
    pub detail: RecordDetail,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

impl RecordVersion {
    /// Validate required fields and resource identity.
    ///
    /// # Errors
    /// Returns [`KernelError::Validation`] when an identifying field is blank or two
    /// resource entries share an id.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.version_id.as_str().trim().is_empty() {
            return Err(KernelError::Validation("version_id MUST be provided".to_string()));
        }

        if self.version_label.trim().is_empty() {
            return Err(KernelError::Validation(format!(
                "version_label MUST be provided for version {}",
                self.version_id
            )));
        }

        if self.modified_by.trim().is_empty() {
            return Err(KernelError::Validation(format!(
                "modified_by MUST be provided for version {}",
                self.version_id
            )));
        }

        let mut seen = BTreeSet::new();
        for entry in &self.resources {
            if !seen.insert(&entry.id) {
                return Err(KernelError::Validation(format!(
                    "duplicate resource id {} in version {}",
                    entry.id, self.version_id
                )));
            }
        }

        Ok(())
    }
}

/// A versioned information system: one current version plus newest-first history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub id: RecordId,
    pub name: String,
    pub listing: RecordListing,
    pub current_version: RecordVersion,
    #[serde(default)]
    pub history: Vec<RecordVersion>,
}

impl Record {
    /// Validate the record and every version it carries.
    ///
    /// # Errors
    /// Returns [`KernelError::Validation`] when the record identity is blank,
    /// completeness exceeds 100, a version is invalid, history contains the current
    /// version, or two history entries share an id.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.id.as_str().trim().is_empty() {
            return Err(KernelError::Validation("record id MUST be provided".to_string()));
        }

        if self.name.trim().is_empty() {
            return Err(KernelError::Validation(format!(
                "name MUST be provided for record {}",
                self.id
            )));
        }

        if self.listing.completeness > 100 {
            return Err(KernelError::Validation(format!(
                "completeness MUST be within 0..=100 for record {}",
                self.id
            )));
        }

        self.current_version.validate()?;

        let mut seen = BTreeSet::new();
        for version in &self.history {
            version.validate()?;
            if version.version_id == self.current_version.version_id {
                return Err(KernelError::Validation(format!(
                    "history MUST NOT contain current version {} of record {}",
                    version.version_id, self.id
                )));
            }
            if !seen.insert(&version.version_id) {
                return Err(KernelError::Validation(format!(
                    "duplicate history version {} in record {}",
                    version.version_id, self.id
                )));
            }
        }

        Ok(())
    }

    /// True when `version_id` names the current version or any history entry.
    #[must_use]
    pub fn contains_version(&self, version_id: &VersionId) -> bool {
        find_version(self, version_id).is_some()
    }
}

/// Outcome of a version lookup, with fallback made explicit.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub version: &'a RecordVersion,
    /// False when the requested id was unknown and the current version was substituted.
    pub found: bool,
}

/// One row of a newest-first version listing.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VersionEntry<'a> {
    #[serde(flatten)]
    pub version: &'a RecordVersion,
    pub is_current: bool,
}

/// Resolve `version_id` against `record`, falling back to the current version.
///
/// Unset ids and the current id map to the current version. Unknown ids also map
/// to the current version; compare the returned id against the request (or use
/// [`resolve_version_detailed`]) to detect the fallback.
#[must_use]
pub fn resolve_version<'a>(
    record: &'a Record,
    version_id: Option<&VersionId>,
) -> &'a RecordVersion {
    resolve_version_detailed(record, version_id).version
}

#[must_use]
pub fn resolve_version_detailed<'a>(
    record: &'a Record,
    version_id: Option<&VersionId>,
) -> Resolution<'a> {
    let Some(requested) = version_id else {
        return Resolution { version: &record.current_version, found: true };
    };

    if *requested == record.current_version.version_id {
        return Resolution { version: &record.current_version, found: true };
    }

    match history_version(record, requested) {
        Some(version) => Resolution { version, found: true },
        None => {
            tracing::warn!(
                record_id = %record.id,
                requested = %requested,
                fallback = %record.current_version.version_id,
                "unknown version requested, falling back to current"
            );
            Resolution { version: &record.current_version, found: false }
        }
    }
}

/// Find a history entry by id. The current version is never returned.
#[must_use]
pub fn history_version<'a>(
    record: &'a Record,
    version_id: &VersionId,
) -> Option<&'a RecordVersion> {
    record.history.iter().find(|version| version.version_id == *version_id)
}

/// Exact lookup over the current version and history. Never falls back.
#[must_use]
pub fn find_version<'a>(record: &'a Record, version_id: &VersionId) -> Option<&'a RecordVersion> {
    if record.current_version.version_id == *version_id {
        Some(&record.current_version)
    } else {
        history_version(record, version_id)
    }
}

#[must_use]
pub fn list_versions_newest_first(record: &Record) -> Vec<VersionEntry<'_>> {
    std::iter::once(VersionEntry { version: &record.current_version, is_current: true })
        .chain(record.history.iter().map(|version| VersionEntry { version, is_current: false }))
        .collect()
}
