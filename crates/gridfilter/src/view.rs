//! # Filtered-View Maintainer
//!
//! A [`FilteredView`] is a [`FilteredResult`] plus the bookkeeping needed to
//! patch it after a single cell changes, instead of re-running the whole
//! filter:
//!
//! - `matched[i]`: whether record `i` satisfies the tree on its own
//! - `included[i]`: whether record `i` is visible
//! - `included_children[i]`: how many direct children of `i` are visible
//!
//! All three are indexed by canonical position in the dataset.
//!
//! ## Patching
//!
//! After a write to record `r`, only `r` is re-evaluated. Inclusion is then
//! recomputed from `r` upwards through its ancestors using the stored flags
//! and counters. The walk stops at the first record whose inclusion did not
//! change, since nothing above it can change either. Rows that became visible
//! are inserted at their canonical position; rows that stopped being visible
//! are removed.
//!
//! The patched result is always identical to a fresh full pass over the
//! mutated dataset with the same strategy and tree.

use serde::Serialize;
use tracing::debug;

use crate::dataset::{Dataset, RecordId};
use crate::error::{FilterError, Result};
use crate::expression::ExpressionTree;
use crate::result::{FilteredResult, FilteredRow};
use crate::strategy::FilteringStrategy;

/// Rows that entered or left the visible set after an update, top-down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewPatch {
    pub inserted: Vec<RecordId>,
    pub removed: Vec<RecordId>,
}

impl ViewPatch {
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilteredView {
    matched: Vec<bool>,
    included: Vec<bool>,
    included_children: Vec<usize>,
    result: FilteredResult,
    active: bool,
}

impl FilteredView {
    /// Every record visible and matched; updates are no-ops.
    pub fn unfiltered(dataset: &Dataset) -> Self {
        let len = dataset.len();
        let rows = (0..len).map(|i| row_at(dataset, i, true)).collect();
        let included_children = (0..len).map(|i| dataset.child_positions(i).len()).collect();
        Self {
            matched: vec![true; len],
            included: vec![true; len],
            included_children,
            result: FilteredResult::from_sorted(rows),
            active: false,
        }
    }

    /// Runs a full pass of `strategy` over `dataset`.
    pub fn build<S>(strategy: &S, dataset: &Dataset, tree: &ExpressionTree) -> Result<Self>
    where
        S: FilteringStrategy + ?Sized,
    {
        if tree.is_empty() {
            debug!(
                strategy = strategy.name(),
                records = dataset.len(),
                "empty expression tree, passing all records through"
            );
            return Ok(Self::unfiltered(dataset));
        }

        let len = dataset.len();
        let mut matched = vec![false; len];
        let mut included = vec![false; len];
        let mut included_children = vec![0usize; len];

        // Positions are depth-first preorder, so walking them backwards
        // settles every child before its parent.
        for index in (0..len).rev() {
            matched[index] = tree.matches(dataset.record_at(index))?;
            included[index] = strategy.includes(matched[index], included_children[index] > 0);
            if included[index] {
                if let Some(parent) = dataset.parent_position(index) {
                    included_children[parent] += 1;
                }
            }
        }

        let rows: Vec<FilteredRow> = (0..len)
            .filter(|&i| included[i])
            .map(|i| row_at(dataset, i, matched[i]))
            .collect();

        debug!(
            strategy = strategy.name(),
            records = len,
            visible = rows.len(),
            "filter pass complete"
        );

        Ok(Self {
            matched,
            included,
            included_children,
            result: FilteredResult::from_sorted(rows),
            active: true,
        })
    }

    /// Whether a non-empty tree produced this view.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn result(&self) -> &FilteredResult {
        &self.result
    }

    pub fn into_result(self) -> FilteredResult {
        self.result
    }

    /// Patches the view after a field of record `id` has been written.
    ///
    /// `strategy`, `dataset` and `tree` must be the ones the view was built
    /// with; only field values of `dataset` may have changed since. A dataset
    /// with a different record count fails with
    /// [`FilterError::InvalidDataset`]. On error the view is left untouched.
    pub fn on_record_updated<S>(
        &mut self,
        strategy: &S,
        dataset: &Dataset,
        tree: &ExpressionTree,
        id: RecordId,
    ) -> Result<ViewPatch>
    where
        S: FilteringStrategy + ?Sized,
    {
        if dataset.len() != self.matched.len() {
            return Err(FilterError::InvalidDataset(format!(
                "view was built for {} records, dataset has {}",
                self.matched.len(),
                dataset.len()
            )));
        }
        let index = dataset.position(id)?;
        if !self.active {
            return Ok(ViewPatch::default());
        }

        let matched = tree.matches(dataset.record_at(index))?;
        self.matched[index] = matched;

        let mut patch = ViewPatch::default();
        let mut current = index;
        loop {
            let now = strategy.includes(self.matched[current], self.included_children[current] > 0);
            if now == self.included[current] {
                break;
            }
            self.included[current] = now;

            let current_id = dataset.record_at(current).id;
            if now {
                self.result.insert(row_at(dataset, current, self.matched[current]));
                patch.inserted.push(current_id);
            } else {
                self.result.remove(current_id);
                patch.removed.push(current_id);
            }

            let Some(parent) = dataset.parent_position(current) else {
                break;
            };
            if now {
                self.included_children[parent] += 1;
            } else {
                self.included_children[parent] -= 1;
            }
            current = parent;
        }

        if self.included[index] {
            self.result.set_matched(id, matched);
        }

        patch.inserted.reverse();
        patch.removed.reverse();
        debug!(
            record = %id,
            matched,
            inserted = patch.inserted.len(),
            removed = patch.removed.len(),
            "filtered view patched"
        );
        Ok(patch)
    }
}

fn row_at(dataset: &Dataset, index: usize, matched: bool) -> FilteredRow {
    FilteredRow {
        id: dataset.record_at(index).id,
        depth: dataset.depth_at(index),
        matched,
        position: index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::builtin_registry;
    use crate::dataset::Record;
    use crate::expression::{FilterExpression, Operator};
    use crate::strategy::{filter, AncestorInclusion, MatchingRecordsOnly};
    use crate::value::{DataType, FieldValue};

    // 1 > [2 > [3], 4 > [5]], 6
    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            (Record::new(1u64).with("Name", "root"), None),
            (Record::new(2u64).with("Name", "left"), Some(RecordId(1))),
            (Record::new(3u64).with("Name", "left leaf"), Some(RecordId(2))),
            (Record::new(4u64).with("Name", "right"), Some(RecordId(1))),
            (Record::new(5u64).with("Name", "right leaf"), Some(RecordId(4))),
            (Record::new(6u64).with("Name", "other"), None),
        ])
        .unwrap()
    }

    fn name_contains(value: &str) -> ExpressionTree {
        let leaf = FilterExpression::new(
            builtin_registry(),
            "Name",
            DataType::String,
            "contains",
            value,
            false,
        )
        .unwrap();
        ExpressionTree::new(Operator::And).with(leaf).unwrap()
    }

    fn rename(data: &mut Dataset, id: u64, name: &str) {
        data.set_field(RecordId(id), "Name", FieldValue::from(name))
            .unwrap();
    }

    fn ids(view: &FilteredView) -> Vec<u64> {
        view.result().iter().map(|r| r.id.0).collect()
    }

    fn assert_consistent<S: FilteringStrategy>(
        view: &FilteredView,
        strategy: &S,
        data: &Dataset,
        tree: &ExpressionTree,
    ) {
        let fresh = filter(strategy, data, tree).unwrap();
        assert_eq!(view.result(), &fresh);
    }

    #[test]
    fn new_match_inserts_hidden_ancestors() {
        let mut data = dataset();
        let tree = name_contains("leaf");
        let mut view = FilteredView::build(&AncestorInclusion, &data, &tree).unwrap();
        rename(&mut data, 5, "plain");
        let patch = view
            .on_record_updated(&AncestorInclusion, &data, &tree, RecordId(5))
            .unwrap();
        assert_eq!(patch.removed, vec![RecordId(4), RecordId(5)]);
        assert_eq!(ids(&view), vec![1, 2, 3]);

        rename(&mut data, 5, "leaf again");
        let patch = view
            .on_record_updated(&AncestorInclusion, &data, &tree, RecordId(5))
            .unwrap();
        assert_eq!(patch.inserted, vec![RecordId(4), RecordId(5)]);
        assert!(patch.removed.is_empty());
        assert_eq!(ids(&view), vec![1, 2, 3, 4, 5]);
        assert_consistent(&view, &AncestorInclusion, &data, &tree);
    }

    #[test]
    fn walk_stops_at_still_included_ancestor() {
        let mut data = dataset();
        let tree = name_contains("leaf");
        let mut view = FilteredView::build(&AncestorInclusion, &data, &tree).unwrap();

        rename(&mut data, 3, "gone");
        let patch = view
            .on_record_updated(&AncestorInclusion, &data, &tree, RecordId(3))
            .unwrap();
        // Root stays: record 5 still matches under it.
        assert_eq!(patch.removed, vec![RecordId(2), RecordId(3)]);
        assert_eq!(ids(&view), vec![1, 4, 5]);
        assert_consistent(&view, &AncestorInclusion, &data, &tree);
    }

    #[test]
    fn edited_row_that_stays_visible_refreshes_matched_flag() {
        let mut data = dataset();
        let tree = name_contains("r");
        let mut view = FilteredView::build(&AncestorInclusion, &data, &tree).unwrap();
        assert!(view.result().get(RecordId(1)).unwrap().matched);

        rename(&mut data, 1, "top");
        let patch = view
            .on_record_updated(&AncestorInclusion, &data, &tree, RecordId(1))
            .unwrap();
        assert!(patch.is_empty());
        assert!(!view.result().get(RecordId(1)).unwrap().matched);
        assert_consistent(&view, &AncestorInclusion, &data, &tree);
    }

    #[test]
    fn matching_only_never_touches_ancestors() {
        let mut data = dataset();
        let tree = name_contains("leaf");
        let mut view = FilteredView::build(&MatchingRecordsOnly, &data, &tree).unwrap();
        assert_eq!(ids(&view), vec![3, 5]);

        rename(&mut data, 5, "plain");
        let patch = view
            .on_record_updated(&MatchingRecordsOnly, &data, &tree, RecordId(5))
            .unwrap();
        assert_eq!(patch.removed, vec![RecordId(5)]);
        assert_eq!(ids(&view), vec![3]);
        assert_consistent(&view, &MatchingRecordsOnly, &data, &tree);
    }

    #[test]
    fn inactive_view_ignores_updates() {
        let mut data = dataset();
        let tree = ExpressionTree::default();
        let mut view = FilteredView::build(&AncestorInclusion, &data, &tree).unwrap();
        assert!(!view.is_active());
        rename(&mut data, 2, "anything");
        let patch = view
            .on_record_updated(&AncestorInclusion, &data, &tree, RecordId(2))
            .unwrap();
        assert!(patch.is_empty());
        assert_eq!(view.result().len(), 6);
    }

    #[test]
    fn unknown_record_is_an_error() {
        let data = dataset();
        let tree = name_contains("leaf");
        let mut view = FilteredView::build(&AncestorInclusion, &data, &tree).unwrap();
        assert!(view
            .on_record_updated(&AncestorInclusion, &data, &tree, RecordId(42))
            .is_err());
    }

    #[test]
    fn view_rejects_a_different_dataset() {
        let data = dataset();
        let tree = name_contains("leaf");
        let mut view = FilteredView::build(&AncestorInclusion, &data, &tree).unwrap();

        let other = Dataset::from_records(vec![(Record::new(1u64).with("Name", "leaf"), None)])
            .unwrap();
        let err = view
            .on_record_updated(&AncestorInclusion, &other, &tree, RecordId(1))
            .unwrap_err();
        assert!(matches!(err, FilterError::InvalidDataset(_)));
        assert_eq!(ids(&view), vec![1, 2, 3, 4, 5]);
    }
}
