//! Review session state
//!
//! The poll task feeds authoritative snapshots in through
//! [`ReviewState::apply_snapshot`]. Local optimistic changes (rows submitted
//! for reprocessing) are reconciled against every snapshot: an awaiting row
//! is shown as `processing` until a snapshot reports a terminal status for
//! it, or until its override expires.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use ecp_common::api::ReviewSnapshot;
use ecp_common::models::{
    all_verified, ActivityCategory, Project, ProjectEvent, ProjectStatus, ReprocessStatus,
    ResultRow, VerificationStatus,
};
use tracing::debug;

use crate::selection::Selection;
use crate::table::{visible_rows, Filters, SortState};

/// Interval between polls
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Interval after a failed poll
pub const POLL_BACKOFF: Duration = Duration::from_secs(3);

/// How long a local "awaiting reprocessing" override may outlive confirmation
pub const DEFAULT_OVERRIDE_TTL: Duration = Duration::from_secs(5 * 60);

/// Number of events fetched per poll
pub const EVENT_WINDOW: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No snapshot received yet
    Loading,
    /// Project not ready; only the event log is meaningful
    WaitingForReady,
    /// Rows are final; polling stopped
    Ready,
    /// Rows shown, some still being reprocessed
    Polling,
}

#[derive(Debug, Clone)]
pub struct ReviewState {
    pub phase: Phase,
    pub project: Option<Project>,
    pub rows: Vec<ResultRow>,
    pub events: Vec<ProjectEvent>,
    pub selection: Selection,
    pub filters: Filters,
    pub sort: SortState,
    /// Row id -> time the reprocess request was submitted
    awaiting: HashMap<i64, Instant>,
    override_ttl: Duration,
    last_poll_failed: bool,
    /// Bumped on every change a renderer should pick up
    pub revision: u64,
}

impl Default for ReviewState {
    fn default() -> Self {
        Self::new(DEFAULT_OVERRIDE_TTL)
    }
}

fn is_reviewable(status: ProjectStatus) -> bool {
    matches!(status, ProjectStatus::Ready | ProjectStatus::Locked)
}

impl ReviewState {
    pub fn new(override_ttl: Duration) -> Self {
        Self {
            phase: Phase::Loading,
            project: None,
            rows: Vec::new(),
            events: Vec::new(),
            selection: Selection::default(),
            filters: Filters::default(),
            sort: SortState::default(),
            awaiting: HashMap::new(),
            override_ttl,
            last_poll_failed: false,
            revision: 0,
        }
    }

    /// Replace the snapshot and reconcile local overrides against it
    pub fn apply_snapshot(
        &mut self,
        snapshot: ReviewSnapshot,
        events: Vec<ProjectEvent>,
        now: Instant,
    ) {
        let ReviewSnapshot { project, mut rows } = snapshot;
        let ttl = self.override_ttl;

        self.awaiting.retain(|id, submitted| {
            let Some(row) = rows.iter_mut().find(|r| r.id == *id) else {
                return false;
            };
            if row.reprocess_status.is_terminal() {
                debug!(row_id = id, status = row.reprocess_status.as_str(), "Reprocess confirmed");
                return false;
            }
            if now.saturating_duration_since(*submitted) >= ttl {
                debug!(row_id = id, "Reprocess override expired");
                return false;
            }
            row.reprocess_status = ReprocessStatus::Processing;
            true
        });

        self.selection.retain_selectable(&rows);
        self.rows = rows;
        self.project = Some(project);
        self.events = events;
        self.last_poll_failed = false;
        self.update_phase();
        self.revision += 1;
    }

    /// A poll failed; the next one waits longer
    pub fn apply_poll_error(&mut self) {
        self.last_poll_failed = true;
    }

    fn update_phase(&mut self) {
        self.phase = match &self.project {
            None => Phase::Loading,
            Some(p) if !is_reviewable(p.status) => Phase::WaitingForReady,
            Some(_) if self.has_pending_reprocess() => Phase::Polling,
            Some(_) => Phase::Ready,
        };
    }

    fn has_pending_reprocess(&self) -> bool {
        !self.awaiting.is_empty()
            || self
                .rows
                .iter()
                .any(|r| r.reprocess_status == ReprocessStatus::Processing)
    }

    /// Polling stops once rows are final and the last poll succeeded
    pub fn should_keep_polling(&self) -> bool {
        self.phase != Phase::Ready || self.last_poll_failed
    }

    pub fn last_poll_failed(&self) -> bool {
        self.last_poll_failed
    }

    pub fn next_delay(&self) -> Duration {
        if self.last_poll_failed {
            POLL_BACKOFF
        } else {
            POLL_INTERVAL
        }
    }

    pub fn is_awaiting(&self, id: i64) -> bool {
        self.awaiting.contains_key(&id)
    }

    pub fn awaiting_count(&self) -> usize {
        self.awaiting.len()
    }

    /// Optimistically show a row as being reprocessed with its new category
    pub fn mark_reprocess_submitted(&mut self, id: i64, category: ActivityCategory, now: Instant) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.id == id) {
            row.reprocess_status = ReprocessStatus::Processing;
            row.category = Some(category);
        }
        self.awaiting.insert(id, now);
        self.update_phase();
        self.revision += 1;
    }

    /// The reprocess request was refused; the row is failed
    pub fn reprocess_rejected(&mut self, id: i64) {
        if let Some(row) = self.rows.iter_mut().find(|r| r.id == id) {
            row.reprocess_status = ReprocessStatus::Failed;
        }
        self.awaiting.remove(&id);
        self.update_phase();
        self.revision += 1;
    }

    /// Patch validated rows locally and clear the selection
    pub fn apply_validated(&mut self, ids: &[i64]) {
        for row in self.rows.iter_mut() {
            if row.requires_verification && ids.contains(&row.id) {
                row.verification_status = VerificationStatus::Validated;
            }
        }
        self.selection.clear();
        self.revision += 1;
    }

    /// Navigation to the final results view is allowed
    pub fn completion_gate(&self) -> bool {
        matches!(self.phase, Phase::Ready | Phase::Polling) && all_verified(&self.rows)
    }

    pub fn pending_verification(&self) -> usize {
        self.rows.iter().filter(|r| r.is_pending_verification()).count()
    }

    /// Rows in display order under the current filters and sort
    pub fn visible_rows(&self) -> Vec<&ResultRow> {
        visible_rows(&self.rows, &self.filters, &self.sort)
    }

    /// Select every visible selectable row
    pub fn select_all_visible(&mut self) {
        let visible = visible_rows(&self.rows, &self.filters, &self.sort);
        self.selection.select_all(visible);
    }

    pub fn select_none_visible(&mut self) {
        let visible = visible_rows(&self.rows, &self.filters, &self.sort);
        self.selection.select_none(visible);
    }
}
