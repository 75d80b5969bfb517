//! Row selection for bulk validation
//!
//! Keyed by row id so it survives re-sorting, filtering and refreshed
//! snapshots. Only rows requiring verification can be selected.

use std::collections::BTreeSet;

use ecp_common::models::ResultRow;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<i64>,
}

impl Selection {
    pub fn is_selectable(row: &ResultRow) -> bool {
        row.requires_verification
    }

    /// Toggle one row; returns whether it is selected afterwards
    pub fn toggle(&mut self, row: &ResultRow) -> bool {
        if !Self::is_selectable(row) {
            return false;
        }
        if !self.ids.remove(&row.id) {
            self.ids.insert(row.id);
            return true;
        }
        false
    }

    /// Select every selectable row among `visible`
    pub fn select_all<'a>(&mut self, visible: impl IntoIterator<Item = &'a ResultRow>) {
        self.ids.extend(
            visible
                .into_iter()
                .filter(|r| Self::is_selectable(r))
                .map(|r| r.id),
        );
    }

    /// Deselect every row among `visible`, leaving hidden selections alone
    pub fn select_none<'a>(&mut self, visible: impl IntoIterator<Item = &'a ResultRow>) {
        for row in visible {
            self.ids.remove(&row.id);
        }
    }

    /// Drop ids that no longer match a selectable row of the snapshot
    pub fn retain_selectable(&mut self, rows: &[ResultRow]) {
        self.ids.retain(|id| {
            rows.iter()
                .any(|r| r.id == *id && Self::is_selectable(r))
        });
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> Vec<i64> {
        self.ids.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
