use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::{FieldKey, FieldValue, RecordVersion, ResourceEntry, ResourceId, VersionId};

#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffKind {
    Added,
    Removed,
    Modified,
    Unchanged,
}

impl DiffKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Removed => "REMOVED",
            Self::Modified => "MODIFIED",
            Self::Unchanged => "UNCHANGED",
        }
    }
}

/// A detail field whose value differs between baseline and candidate.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FieldDiff {
    pub key: FieldKey,
    pub label: &'static str,
    pub old_value: FieldValue,
    pub new_value: FieldValue,
    pub kind: DiffKind,
}

/// Classification of one resource entry. `entry` is the candidate's copy unless the
/// entry was removed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResourceDiff {
    pub entry: ResourceEntry,
    pub kind: DiffKind,
    /// Baseline copy of a modified entry, so the prior name and count stay visible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<ResourceEntry>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
    /// Field diffs plus modified resources.
    pub modified: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComparisonResult {
    pub baseline_version_id: VersionId,
    pub candidate_version_id: VersionId,
    pub stats: DiffStats,
    pub field_diffs: BTreeMap<FieldKey, FieldDiff>,
    /// Candidate entries in candidate order, then removed entries in baseline order.
    pub resource_diffs: Vec<ResourceDiff>,
}

impl ComparisonResult {
    #[must_use]
    pub fn is_identical(&self) -> bool {
        self.field_diffs.is_empty()
            && self.resource_diffs.iter().all(|diff| diff.kind == DiffKind::Unchanged)
    }

    pub fn resources_of_kind(&self, kind: DiffKind) -> impl Iterator<Item = &ResourceDiff> + '_ {
        self.resource_diffs.iter().filter(move |diff| diff.kind == kind)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Treat a change of resource `kind` as a modification. Off by default: only
    /// `name` and `count` participate.
    pub include_resource_kind: bool,
}

/// Diff `candidate` against `baseline` with default options.
#[must_use]
pub fn compare(baseline: &RecordVersion, candidate: &RecordVersion) -> ComparisonResult {
    compare_with(baseline, candidate, &DiffOptions::default())
}

/// Diff two versions of the same record.
///
/// Both versions are assumed to share the record schema; this is not checked.
/// Runs in `O(n + m)` over the two resource lists.
#[must_use]
pub fn compare_with(
    baseline: &RecordVersion,
    candidate: &RecordVersion,
    options: &DiffOptions,
) -> ComparisonResult {
    let mut stats = DiffStats::default();

    let mut field_diffs = BTreeMap::new();
    for key in FieldKey::ALL {
        let old_value = baseline.detail.value(key);
        let new_value = candidate.detail.value(key);
        if old_value != new_value {
            let diff = FieldDiff {
                key,
                label: key.label(),
                old_value,
                new_value,
                kind: DiffKind::Modified,
            };
            field_diffs.insert(key, diff);
        }
    }
    stats.modified += field_diffs.len();

    let baseline_by_id: HashMap<&ResourceId, &ResourceEntry> =
        baseline.resources.iter().map(|entry| (&entry.id, entry)).collect();
    let candidate_by_id: HashMap<&ResourceId, &ResourceEntry> =
        candidate.resources.iter().map(|entry| (&entry.id, entry)).collect();

    let mut resource_diffs = Vec::with_capacity(candidate.resources.len());
    for entry in &candidate.resources {
        let (kind, previous) = match baseline_by_id.get(&entry.id) {
            None => {
                stats.added += 1;
                (DiffKind::Added, None)
            }
            Some(&old) if resource_changed(old, entry, options) => {
                stats.modified += 1;
                (DiffKind::Modified, Some(old.clone()))
            }
            Some(_) => (DiffKind::Unchanged, None),
        };
        resource_diffs.push(ResourceDiff { entry: entry.clone(), kind, previous });
    }

    for entry in &baseline.resources {
        if !candidate_by_id.contains_key(&entry.id) {
            stats.removed += 1;
            resource_diffs.push(ResourceDiff {
                entry: entry.clone(),
                kind: DiffKind::Removed,
                previous: None,
            });
        }
    }

    tracing::debug!(
        baseline = %baseline.version_id,
        candidate = %candidate.version_id,
        added = stats.added,
        removed = stats.removed,
        modified = stats.modified,
        "computed version comparison"
    );

    ComparisonResult {
        baseline_version_id: baseline.version_id.clone(),
        candidate_version_id: candidate.version_id.clone(),
        stats,
        field_diffs,
        resource_diffs,
    }
}

fn resource_changed(old: &ResourceEntry, new: &ResourceEntry, options: &DiffOptions) -> bool {
    old.name != new.name
        || old.count != new.count
        || (options.include_resource_kind && old.kind != new.kind)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use proptest::prelude::*;

    use super::*;
    use crate::fixtures::{detail, resource, three_version_record, version};
    use crate::{RecordDetail, ResourceKind};

    fn kinds(result: &ComparisonResult) -> Vec<(&str, DiffKind)> {
        result.resource_diffs.iter().map(|diff| (diff.entry.id.as_str(), diff.kind)).collect()
    }

    #[test]
    fn modified_count_and_added_entry_are_classified() {
        let baseline = version(
            "v1",
            0,
            detail(Some(30.0), "运行中"),
            vec![resource("r1", "A", 10, ResourceKind::Db)],
        );
        let candidate = version(
            "v2",
            1,
            detail(Some(30.0), "运行中"),
            vec![
                resource("r1", "A", 15, ResourceKind::Db),
                resource("r2", "B", 5, ResourceKind::Api),
            ],
        );

        let result = compare(&baseline, &candidate);

        assert_eq!(kinds(&result), vec![("r1", DiffKind::Modified), ("r2", DiffKind::Added)]);
        assert_eq!(result.stats, DiffStats { added: 1, removed: 0, modified: 1 });
        assert_eq!(result.resource_diffs[0].entry.count, 15);
        assert!(result.field_diffs.is_empty());
    }

    #[test]
    fn modified_entry_keeps_baseline_name_and_count() {
        let baseline = version(
            "v1",
            0,
            RecordDetail::default(),
            vec![
                resource("r1", "旧名称", 10, ResourceKind::Db),
                resource("r2", "B", 5, ResourceKind::Api),
            ],
        );
        let candidate = version(
            "v2",
            1,
            RecordDetail::default(),
            vec![
                resource("r1", "新名称", 25, ResourceKind::Db),
                resource("r2", "B", 5, ResourceKind::Api),
                resource("r3", "C", 1, ResourceKind::File),
            ],
        );

        let result = compare(&baseline, &candidate);

        let modified = &result.resource_diffs[0];
        assert_eq!(modified.kind, DiffKind::Modified);
        assert_eq!(modified.entry.name, "新名称");
        let previous = match &modified.previous {
            Some(previous) => previous,
            None => panic!("modified entry should carry its baseline copy"),
        };
        assert_eq!(previous.name, "旧名称");
        assert_eq!(previous.count, 10);
        assert!(result.resource_diffs[1..].iter().all(|diff| diff.previous.is_none()));

        let value = match serde_json::to_value(&result) {
            Ok(value) => value,
            Err(err) => panic!("comparison should serialize: {err}"),
        };
        assert_eq!(value["resource_diffs"][0]["previous"]["count"], 10);
        assert!(value["resource_diffs"][1].get("previous").is_none());
    }

    #[test]
    fn single_cost_change_yields_one_field_diff() {
        let baseline = version("v1", 0, detail(Some(30.0), "运行中"), vec![]);
        let candidate = version("v2", 1, detail(Some(50.0), "运行中"), vec![]);

        let result = compare(&baseline, &candidate);

        assert_eq!(result.field_diffs.len(), 1);
        let diff = match result.field_diffs.get(&FieldKey::Cost) {
            Some(diff) => diff,
            None => panic!("expected a cost diff"),
        };
        assert_eq!(diff.label, "总建设费用(万元)");
        assert_eq!(diff.old_value, FieldValue::Number(30.0));
        assert_eq!(diff.new_value, FieldValue::Number(50.0));
        assert_eq!(diff.kind, DiffKind::Modified);
        assert_eq!(result.stats.modified, 1);
        assert!(!result.field_diffs.contains_key(&FieldKey::RunStatus));
    }

    #[test]
    fn self_comparison_is_identical() {
        let record = three_version_record();
        let result = compare(&record.current_version, &record.current_version);

        assert!(result.is_identical());
        assert_eq!(result.stats, DiffStats::default());
        assert_eq!(result.resource_diffs.len(), 2);
    }

    #[test]
    fn history_against_current_reports_added_resource() {
        let record = three_version_record();
        let result = compare(&record.history[1], &record.current_version);

        assert_eq!(
            kinds(&result),
            vec![("res_1", DiffKind::Unchanged), ("res_2", DiffKind::Added)]
        );
        assert_eq!(result.baseline_version_id.as_str(), "v1");
        assert_eq!(result.candidate_version_id.as_str(), "v2");
        assert!(result.field_diffs.contains_key(&FieldKey::Cost));
        assert!(result.field_diffs.contains_key(&FieldKey::RunStatus));
        assert_eq!(result.stats, DiffStats { added: 1, removed: 0, modified: 2 });
    }

    #[test]
    fn removed_entries_follow_candidate_entries_in_baseline_order() {
        let baseline = version(
            "v1",
            0,
            RecordDetail::default(),
            vec![
                resource("r3", "C", 1, ResourceKind::File),
                resource("r1", "A", 1, ResourceKind::Db),
                resource("r2", "B", 1, ResourceKind::Db),
            ],
        );
        let candidate = version(
            "v2",
            1,
            RecordDetail::default(),
            vec![
                resource("r4", "D", 1, ResourceKind::Api),
                resource("r1", "A", 1, ResourceKind::Db),
            ],
        );

        let result = compare(&baseline, &candidate);

        assert_eq!(
            kinds(&result),
            vec![
                ("r4", DiffKind::Added),
                ("r1", DiffKind::Unchanged),
                ("r3", DiffKind::Removed),
                ("r2", DiffKind::Removed),
            ]
        );
        assert_eq!(result.stats, DiffStats { added: 1, removed: 2, modified: 0 });
    }

    #[test]
    fn empty_against_populated_resources() {
        let populated = version(
            "v2",
            1,
            RecordDetail::default(),
            vec![
                resource("r1", "A", 1, ResourceKind::Db),
                resource("r2", "B", 2, ResourceKind::Db),
            ],
        );
        let empty = version("v1", 0, RecordDetail::default(), vec![]);

        let grown = compare(&empty, &populated);
        assert_eq!(grown.resources_of_kind(DiffKind::Added).count(), 2);
        assert_eq!(grown.resource_diffs.len(), 2);

        let shrunk = compare(&populated, &empty);
        assert_eq!(shrunk.resources_of_kind(DiffKind::Removed).count(), 2);
        assert_eq!(shrunk.stats.removed, 2);
    }

    #[test]
    fn empty_to_populated_field_is_a_diff() {
        let baseline = version("v1", 0, RecordDetail::default(), vec![]);
        let candidate = version(
            "v2",
            1,
            RecordDetail { remark: "新增备注".to_string(), ..RecordDetail::default() },
            vec![],
        );

        let result = compare(&baseline, &candidate);
        let diff = match result.field_diffs.get(&FieldKey::Remark) {
            Some(diff) => diff,
            None => panic!("expected a remark diff"),
        };
        assert_eq!(diff.old_value, FieldValue::Empty);
        assert_eq!(diff.new_value, FieldValue::Text("新增备注".to_string()));
    }

    #[test]
    fn kind_change_is_ignored_unless_enabled() {
        let db = resource("r1", "A", 1, ResourceKind::Db);
        let api = resource("r1", "A", 1, ResourceKind::Api);
        let baseline = version("v1", 0, RecordDetail::default(), vec![db]);
        let candidate = version("v2", 1, RecordDetail::default(), vec![api]);

        assert_eq!(kinds(&compare(&baseline, &candidate)), vec![("r1", DiffKind::Unchanged)]);

        let strict = compare_with(
            &baseline,
            &candidate,
            &DiffOptions { include_resource_kind: true },
        );
        assert_eq!(kinds(&strict), vec![("r1", DiffKind::Modified)]);
        assert_eq!(strict.stats.modified, 1);
    }

    #[test]
    fn comparison_serializes_with_wire_names() {
        let record = three_version_record();
        let result = compare(&record.history[1], &record.current_version);
        let value = match serde_json::to_value(&result) {
            Ok(value) => value,
            Err(err) => panic!("comparison should serialize: {err}"),
        };

        assert_eq!(value["field_diffs"]["cost"]["kind"], "MODIFIED");
        assert_eq!(value["field_diffs"]["cost"]["old_value"], 30.0);
        assert_eq!(value["resource_diffs"][1]["kind"], "ADDED");
        assert_eq!(value["resource_diffs"][1]["entry"]["kind"], "DB");
        assert_eq!(value["stats"]["added"], 1);
    }

    const NAMES: [&str; 3] = ["甲", "乙", "丙"];
    const STATUSES: [&str; 3] = ["运行中", "停用", ""];

    fn resources_strategy() -> impl Strategy<Value = Vec<ResourceEntry>> {
        prop::collection::btree_map(0u8..12, (0usize..3, 0u64..4, 0u8..3), 0..8)
            .prop_map(|entries| {
                entries
                    .into_iter()
                    .map(|(id, (name, count, kind))| {
                        let kind = match kind {
                            0 => ResourceKind::Db,
                            1 => ResourceKind::Api,
                            _ => ResourceKind::File,
                        };
                        resource(&format!("r{id}"), NAMES[name], count, kind)
                    })
                    .collect::<Vec<_>>()
            })
            .prop_shuffle()
    }

    fn version_strategy(version_id: &'static str) -> impl Strategy<Value = RecordVersion> {
        (prop::option::of(0u8..4), 0usize..3, 0usize..3, resources_strategy()).prop_map(
            move |(cost, status, remark, resources)| {
                let detail = RecordDetail {
                    cost: cost.map(f64::from),
                    run_status: STATUSES[status].to_string(),
                    remark: STATUSES[remark].to_string(),
                    ..RecordDetail::default()
                };
                version(version_id, 0, detail, resources)
            },
        )
    }

    proptest! {
        #[test]
        fn property_self_comparison_has_no_changes(candidate in version_strategy("v1")) {
            let result = compare(&candidate, &candidate);

            prop_assert!(result.field_diffs.is_empty());
            prop_assert_eq!(result.stats, DiffStats::default());
            prop_assert_eq!(result.resource_diffs.len(), candidate.resources.len());
            prop_assert!(result.resource_diffs.iter().all(|diff| diff.kind == DiffKind::Unchanged));
        }

        #[test]
        fn property_field_diffs_cover_exactly_the_unequal_keys(
            baseline in version_strategy("v1"),
            candidate in version_strategy("v2"),
        ) {
            let result = compare(&baseline, &candidate);

            for key in FieldKey::ALL {
                let old_value = baseline.detail.value(key);
                let new_value = candidate.detail.value(key);
                match result.field_diffs.get(&key) {
                    Some(diff) => {
                        prop_assert_ne!(&old_value, &new_value);
                        prop_assert_eq!(&diff.old_value, &old_value);
                        prop_assert_eq!(&diff.new_value, &new_value);
                    }
                    None => prop_assert_eq!(&old_value, &new_value),
                }
            }
        }

        #[test]
        fn property_resources_are_partitioned_and_ordered(
            baseline in version_strategy("v1"),
            candidate in version_strategy("v2"),
        ) {
            let result = compare(&baseline, &candidate);
            let baseline_ids: BTreeSet<&ResourceId> =
                baseline.resources.iter().map(|entry| &entry.id).collect();
            let candidate_ids: BTreeSet<&ResourceId> =
                candidate.resources.iter().map(|entry| &entry.id).collect();

            let removed: Vec<&ResourceId> = baseline
                .resources
                .iter()
                .map(|entry| &entry.id)
                .filter(|id| !candidate_ids.contains(id))
                .collect();
            prop_assert_eq!(result.resource_diffs.len(), candidate.resources.len() + removed.len());

            let (head, tail) = result.resource_diffs.split_at(candidate.resources.len());
            for (diff, entry) in head.iter().zip(&candidate.resources) {
                prop_assert_eq!(&diff.entry, entry);
                prop_assert_eq!(diff.previous.is_some(), diff.kind == DiffKind::Modified);
                if baseline_ids.contains(&entry.id) {
                    prop_assert!(matches!(diff.kind, DiffKind::Modified | DiffKind::Unchanged));
                } else {
                    prop_assert_eq!(diff.kind, DiffKind::Added);
                }
            }
            let tail_ids: Vec<&ResourceId> = tail.iter().map(|diff| &diff.entry.id).collect();
            prop_assert_eq!(tail_ids, removed);
            prop_assert!(tail.iter().all(|diff| diff.kind == DiffKind::Removed));
        }

        #[test]
        fn property_stats_match_classifications(
            baseline in version_strategy("v1"),
            candidate in version_strategy("v2"),
            include_resource_kind in any::<bool>(),
        ) {
            let options = DiffOptions { include_resource_kind };
            let result = compare_with(&baseline, &candidate, &options);

            prop_assert_eq!(result.stats.added, result.resources_of_kind(DiffKind::Added).count());
            prop_assert_eq!(
                result.stats.removed,
                result.resources_of_kind(DiffKind::Removed).count()
            );
            prop_assert_eq!(
                result.stats.modified,
                result.field_diffs.len() + result.resources_of_kind(DiffKind::Modified).count()
            );
        }
    }
}
