use serde::{Deserialize, Serialize};

use crate::{
    compare_with, history_version, resolve_version, resolve_version_detailed, ComparisonResult,
    DiffOptions, KernelError, Record, RecordVersion, VersionId,
};

/// Which version a viewer is looking at.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(tag = "mode", content = "version_id", rename_all = "snake_case")]
pub enum ViewState {
    Latest,
    /// Read-only display of a historical version.
    Snapshot(VersionId),
    /// Current version diffed against the given historical baseline.
    Compare(VersionId),
}

impl ViewState {
    #[must_use]
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Snapshot(_) => "snapshot",
            Self::Compare(_) => "compare",
        }
    }
}

/// Per-viewer state over one record. Sessions never share state; open one per viewer.
#[derive(Debug, Clone)]
pub struct ViewSession<'a> {
    record: &'a Record,
    options: DiffOptions,
    state: ViewState,
    comparison: Option<ComparisonResult>,
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct ViewReport<'a> {
    pub record_id: &'a str,
    pub state: &'a ViewState,
    pub displayed_version_id: &'a VersionId,
    pub is_snapshot: bool,
    pub comparison: Option<&'a ComparisonResult>,
}

impl<'a> ViewSession<'a> {
    #[must_use]
    pub fn open(record: &'a Record) -> Self {
        Self::with_options(record, DiffOptions::default())
    }

    #[must_use]
    pub fn with_options(record: &'a Record, options: DiffOptions) -> Self {
        Self { record, options, state: ViewState::Latest, comparison: None }
    }

    #[must_use]
    pub fn record(&self) -> &'a Record {
        self.record
    }

    #[must_use]
    pub fn state(&self) -> &ViewState {
        &self.state
    }

    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        matches!(self.state, ViewState::Snapshot(_))
    }

    /// Version rendered as the primary pane. In compare mode this is the current
    /// version; the baseline is reachable through [`Self::comparison`].
    #[must_use]
    pub fn displayed_version(&self) -> &'a RecordVersion {
        match &self.state {
            ViewState::Snapshot(version_id) => resolve_version(self.record, Some(version_id)),
            ViewState::Latest | ViewState::Compare(_) => &self.record.current_version,
        }
    }

    /// Active comparison, only while in compare mode.
    #[must_use]
    pub fn comparison(&self) -> Option<&ComparisonResult> {
        match self.state {
            ViewState::Compare(_) => self.comparison.as_ref(),
            ViewState::Latest | ViewState::Snapshot(_) => None,
        }
    }

    /// Switch to a historical snapshot. The current id, or an id the record does not
    /// know, lands on `Latest`.
    pub fn view_history(&mut self, version_id: &VersionId) {
        let resolution = resolve_version_detailed(self.record, Some(version_id));
        let next = if !resolution.found || *version_id == self.record.current_version.version_id {
            ViewState::Latest
        } else {
            ViewState::Snapshot(version_id.clone())
        };
        self.transition(next);
    }

    pub fn return_to_latest(&mut self) {
        self.transition(ViewState::Latest);
    }

    /// Enter compare mode. From `Latest` the baseline is the newest history entry
    /// (no-op without history); from a snapshot the baseline is that snapshot.
    /// Already comparing is a no-op.
    pub fn start_compare(&mut self) {
        let target = match &self.state {
            ViewState::Latest => match self.record.history.first() {
                Some(newest) => newest.version_id.clone(),
                None => {
                    tracing::debug!(record_id = %self.record.id, "no history to compare against");
                    return;
                }
            },
            ViewState::Snapshot(version_id) => version_id.clone(),
            ViewState::Compare(_) => return,
        };
        self.enter_compare(target);
    }

    /// Re-target the comparison baseline while in compare mode.
    ///
    /// # Errors
    /// Returns [`KernelError::Transition`] outside compare mode and
    /// [`KernelError::Query`] when `version_id` is not a history entry. The state is
    /// unchanged on error.
    pub fn change_compare_target(&mut self, version_id: &VersionId) -> Result<(), KernelError> {
        if !matches!(self.state, ViewState::Compare(_)) {
            return Err(KernelError::Transition(format!(
                "cannot change compare target while in {} mode",
                self.state.mode()
            )));
        }

        if history_version(self.record, version_id).is_none() {
            return Err(KernelError::Query(format!(
                "version {version_id} is not in the history of record {}",
                self.record.id
            )));
        }

        self.enter_compare(version_id.clone());
        Ok(())
    }

    pub fn exit_compare(&mut self) {
        if matches!(self.state, ViewState::Compare(_)) {
            self.transition(ViewState::Latest);
        }
    }

    #[must_use]
    pub fn report(&self) -> ViewReport<'_> {
        ViewReport {
            record_id: self.record.id.as_str(),
            state: &self.state,
            displayed_version_id: &self.displayed_version().version_id,
            is_snapshot: self.is_snapshot(),
            comparison: self.comparison(),
        }
    }

    fn enter_compare(&mut self, baseline_id: VersionId) {
        let record = self.record;
        let current = &record.current_version;
        let cached = self.comparison.as_ref().is_some_and(|comparison| {
            comparison.baseline_version_id == baseline_id
                && comparison.candidate_version_id == current.version_id
        });

        if !cached {
            let baseline = resolve_version(record, Some(&baseline_id));
            self.comparison = Some(compare_with(baseline, current, &self.options));
        }
        self.transition(ViewState::Compare(baseline_id));
    }

    fn transition(&mut self, next: ViewState) {
        tracing::debug!(
            record_id = %self.record.id,
            from = self.state.mode(),
            to = next.mode(),
            "view transition"
        );
        self.state = next;
    }
}
