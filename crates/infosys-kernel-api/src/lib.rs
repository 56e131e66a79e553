use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use infosys_kernel_core::{
    compare_with, find_version, list_versions_newest_first, resolve_version_detailed,
    ComparisonResult, DiffOptions, Record, RecordDetail, RecordId, RecordStatus, RecordVersion,
    ResourceEntry, VersionEntry, VersionId, ViewSession,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

/// Source of records for the kernel, plus the single-writer edit path.
pub trait RecordRepository {
    fn get_record(&self, record_id: &RecordId) -> Option<&Record>;

    fn list_records(&self) -> Vec<&Record>;

    /// Install `version` as the record's current version, pushing the previous
    /// current version onto the front of history.
    ///
    /// # Errors
    /// Returns an error when the record is unknown, the version id already exists in
    /// the record, or the resulting record fails validation.
    fn commit_version(&mut self, record_id: &RecordId, version: RecordVersion) -> Result<&Record>;
}

/// On-disk shape of a record dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dataset {
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: BTreeMap<RecordId, Record>,
}

impl InMemoryRepository {
    /// Build a repository from already-parsed records.
    ///
    /// # Errors
    /// Returns an error when a record fails validation or two records share an id.
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let mut repository = Self::default();
        for record in records {
            repository.insert(record)?;
        }
        Ok(repository)
    }

    /// Load a JSON dataset of the form `{ "records": [...] }`.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed, or a record is invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        let dataset: Dataset = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse dataset {}", path.display()))?;
        let repository = Self::from_records(dataset.records)?;
        tracing::info!(
            path = %path.display(),
            records = repository.records.len(),
            "loaded record dataset"
        );
        Ok(repository)
    }

    /// Add one record.
    ///
    /// # Errors
    /// Returns an error when the record is invalid or its id is already present.
    pub fn insert(&mut self, record: Record) -> Result<()> {
        record.validate().with_context(|| format!("invalid record {}", record.id))?;
        if self.records.contains_key(&record.id) {
            return Err(anyhow!("duplicate record id {} in dataset", record.id));
        }
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordRepository for InMemoryRepository {
    fn get_record(&self, record_id: &RecordId) -> Option<&Record> {
        self.records.get(record_id)
    }

    fn list_records(&self) -> Vec<&Record> {
        self.records.values().collect()
    }

    fn commit_version(&mut self, record_id: &RecordId, version: RecordVersion) -> Result<&Record> {
        let record = self
            .records
            .get_mut(record_id)
            .ok_or_else(|| anyhow!("record not found: {record_id}"))?;

        if record.contains_version(&version.version_id) {
            return Err(anyhow!(
                "version {} already exists in record {record_id}",
                version.version_id
            ));
        }
        version
            .validate()
            .with_context(|| format!("invalid version for record {record_id}"))?;

        let previous = std::mem::replace(&mut record.current_version, version);
        record.history.insert(0, previous);

        tracing::info!(
            record_id = %record_id,
            version_id = %record.current_version.version_id,
            history_len = record.history.len(),
            "committed record version"
        );
        Ok(&*record)
    }
}

/// New version submitted by the editing workflow. Missing id and timestamp are
/// generated at commit time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommitVersionRequest {
    pub record_id: RecordId,
    pub version_id: Option<VersionId>,
    pub version_label: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    pub modified_by: String,
    pub change_type: String,
    pub detail: RecordDetail,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompareRequest {
    pub record_id: RecordId,
    /// Defaults to the newest history entry.
    pub baseline: Option<VersionId>,
    /// Defaults to the current version.
    pub candidate: Option<VersionId>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComparisonEnvelope {
    pub comparison_id: String,
    pub record_id: RecordId,
    pub dataset_id: String,
    pub result: ComparisonResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordSummary {
    pub record_id: RecordId,
    pub name: String,
    pub department: String,
    pub status: RecordStatus,
    pub status_label: String,
    pub completeness: u8,
    pub current_version_id: VersionId,
    pub version_count: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShownVersion<'a> {
    pub record_id: &'a RecordId,
    pub requested: Option<&'a VersionId>,
    /// False when `requested` was unknown and the current version was shown instead.
    pub found: bool,
    pub is_current: bool,
    pub version: &'a RecordVersion,
}

#[derive(Debug, Clone)]
pub struct InfosysKernelApi<R = InMemoryRepository> {
    repository: R,
    options: DiffOptions,
}

impl InfosysKernelApi<InMemoryRepository> {
    /// Load the dataset at `path` into an in-memory repository.
    ///
    /// # Errors
    /// Returns an error when the dataset cannot be loaded.
    pub fn open(path: &Path, options: DiffOptions) -> Result<Self> {
        Ok(Self::new(InMemoryRepository::load(path)?, options))
    }
}

impl<R: RecordRepository> InfosysKernelApi<R> {
    #[must_use]
    pub fn new(repository: R, options: DiffOptions) -> Self {
        Self { repository, options }
    }

    #[must_use]
    pub fn repository(&self) -> &R {
        &self.repository
    }

    #[must_use]
    pub fn options(&self) -> DiffOptions {
        self.options
    }

    #[must_use]
    pub fn list_records(&self) -> Vec<RecordSummary> {
        self.repository
            .list_records()
            .into_iter()
            .map(|record| RecordSummary {
                record_id: record.id.clone(),
                name: record.name.clone(),
                department: record.listing.department.clone(),
                status: record.listing.status,
                status_label: record.listing.status.label().to_string(),
                completeness: record.listing.completeness,
                current_version_id: record.current_version.version_id.clone(),
                version_count: record.history.len() + 1,
                updated_at: record.current_version.updated_at,
            })
            .collect()
    }

    /// # Errors
    /// Returns an error when the record does not exist.
    pub fn get_record(&self, record_id: &RecordId) -> Result<&Record> {
        self.repository
            .get_record(record_id)
            .ok_or_else(|| anyhow!("record not found: {record_id}"))
    }

    /// Current version followed by history, newest first.
    ///
    /// # Errors
    /// Returns an error when the record does not exist.
    pub fn versions(&self, record_id: &RecordId) -> Result<Vec<VersionEntry<'_>>> {
        Ok(list_versions_newest_first(self.get_record(record_id)?))
    }

    /// Resolve one version for display. Unknown ids fall back to the current version
    /// and report `found = false`.
    ///
    /// # Errors
    /// Returns an error when the record does not exist.
    pub fn show_version<'a>(
        &'a self,
        record_id: &RecordId,
        version_id: Option<&'a VersionId>,
    ) -> Result<ShownVersion<'a>> {
        let record = self.get_record(record_id)?;
        let resolution = resolve_version_detailed(record, version_id);
        Ok(ShownVersion {
            record_id: &record.id,
            requested: version_id,
            found: resolution.found,
            is_current: resolution.version.version_id == record.current_version.version_id,
            version: resolution.version,
        })
    }

    /// Diff two versions of one record and wrap the result with stable ids.
    ///
    /// Explicitly named versions must exist; there is no silent fallback here.
    ///
    /// # Errors
    /// Returns an error when the record or a named version does not exist, or when
    /// no baseline is given and the record has no history.
    pub fn compare(&self, request: &CompareRequest) -> Result<ComparisonEnvelope> {
        let record = self.get_record(&request.record_id)?;

        let baseline = match &request.baseline {
            Some(version_id) => lookup_version(record, version_id)?,
            None => record.history.first().ok_or_else(|| {
                anyhow!("record {} has no history to compare against", record.id)
            })?,
        };
        let candidate = match &request.candidate {
            Some(version_id) => lookup_version(record, version_id)?,
            None => &record.current_version,
        };

        let result = compare_with(baseline, candidate, &self.options);
        Ok(ComparisonEnvelope {
            comparison_id: comparison_id(&record.id, &baseline.version_id, &candidate.version_id),
            record_id: record.id.clone(),
            dataset_id: self.dataset_id(),
            result,
        })
    }

    /// Open an independent view session over one record.
    ///
    /// # Errors
    /// Returns an error when the record does not exist.
    pub fn open_viewer(&self, record_id: &RecordId) -> Result<ViewSession<'_>> {
        Ok(ViewSession::with_options(self.get_record(record_id)?, self.options))
    }

    /// Commit a new current version, archiving the previous one to history.
    ///
    /// # Errors
    /// Returns an error when the record is unknown, the version id is taken, or the
    /// version is invalid.
    pub fn commit_version(&mut self, request: CommitVersionRequest) -> Result<RecordVersion> {
        let version = RecordVersion {
            version_id: request.version_id.unwrap_or_else(VersionId::generate),
            version_label: request.version_label,
            updated_at: request.updated_at.unwrap_or_else(OffsetDateTime::now_utc),
            modified_by: request.modified_by,
            change_type: request.change_type,
            detail: request.detail,
            resources: request.resources,
        };
        let record = self.repository.commit_version(&request.record_id, version)?;
        Ok(record.current_version.clone())
    }

    /// Content identifier of the loaded records, `ds_<16 hex>`.
    #[must_use]
    pub fn dataset_id(&self) -> String {
        compute_dataset_id(&self.repository.list_records())
    }
}

fn lookup_version<'a>(record: &'a Record, version_id: &VersionId) -> Result<&'a RecordVersion> {
    find_version(record, version_id)
        .ok_or_else(|| anyhow!("version not found: {version_id} in record {}", record.id))
}

fn comparison_id(record_id: &RecordId, baseline: &VersionId, candidate: &VersionId) -> String {
    format!("cmp_{record_id}_{baseline}_{candidate}")
}

fn compute_dataset_id(records: &[&Record]) -> String {
    let mut pairs = records
        .iter()
        .flat_map(|record| {
            std::iter::once(&record.current_version)
                .chain(record.history.iter())
                .map(move |version| format!("{}:{}", record.id, version.version_id))
        })
        .collect::<Vec<_>>();
    pairs.sort_unstable();

    let mut hasher = Sha256::new();
    for value in pairs {
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }

    let digest = hasher.finalize();
    let digest_hex = format!("{digest:x}");
    format!("ds_{}", &digest_hex[..16])
}
