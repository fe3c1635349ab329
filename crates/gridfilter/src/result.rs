//! Filtered result rows.
//!
//! A [`FilteredResult`] is the visible set: rows in canonical depth-first
//! order, each flagged with whether the record matched the filter itself or
//! is only present because a descendant did. It is produced by a full filter
//! pass and patched in place by the maintainer; callers only read it.

use serde::Serialize;
use std::collections::HashMap;

use crate::dataset::{Dataset, RecordId};
use crate::error::Result;

/// One visible row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilteredRow {
    pub id: RecordId,
    /// Nesting depth in the source tree (roots are 0).
    pub depth: usize,
    /// False when the row is only kept for a matching descendant.
    pub matched: bool,
    #[serde(skip)]
    pub(crate) position: usize,
}

/// Ordered visible rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilteredResult {
    rows: Vec<FilteredRow>,
    #[serde(skip)]
    positions: HashMap<RecordId, usize>,
}

impl FilteredResult {
    /// Builds a result from rows already sorted by position.
    pub(crate) fn from_sorted(rows: Vec<FilteredRow>) -> Self {
        let positions = rows.iter().map(|r| (r.id, r.position)).collect();
        Self { rows, positions }
    }

    pub fn rows(&self) -> &[FilteredRow] {
        &self.rows
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilteredRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Visible ids in order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.rows.iter().map(|r| r.id).collect()
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn get(&self, id: RecordId) -> Option<&FilteredRow> {
        let position = *self.positions.get(&id)?;
        self.slot(position).ok().map(|i| &self.rows[i])
    }

    /// Direct children of `id` that are visible, in order.
    ///
    /// An empty list means the row has nothing to expand under the current
    /// filter.
    pub fn visible_children(&self, dataset: &Dataset, id: RecordId) -> Result<Vec<RecordId>> {
        Ok(dataset
            .children(id)?
            .map(|r| r.id)
            .filter(|child| self.contains(*child))
            .collect())
    }

    fn slot(&self, position: usize) -> std::result::Result<usize, usize> {
        self.rows.binary_search_by_key(&position, |r| r.position)
    }

    /// Inserts a row at its canonical position. No-op if already present.
    pub(crate) fn insert(&mut self, row: FilteredRow) {
        if let Err(slot) = self.slot(row.position) {
            self.positions.insert(row.id, row.position);
            self.rows.insert(slot, row);
        }
    }

    pub(crate) fn remove(&mut self, id: RecordId) -> Option<FilteredRow> {
        let position = self.positions.remove(&id)?;
        let slot = self.slot(position).ok()?;
        Some(self.rows.remove(slot))
    }

    pub(crate) fn set_matched(&mut self, id: RecordId, matched: bool) {
        let Some(&position) = self.positions.get(&id) else {
            return;
        };
        if let Ok(slot) = self.slot(position) {
            self.rows[slot].matched = matched;
        }
    }
}
