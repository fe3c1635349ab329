use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::Result;
use crate::expression::ExpressionTree;
use crate::result::FilteredResult;
use crate::view::FilteredView;

/// Decides which records of a dataset are visible under an expression tree.
///
/// The inclusion rule is the only extension point. The full pass ([`filter`])
/// and the incremental maintainer ([`FilteredView`]) are both driven by
/// [`includes`](Self::includes) alone, so a strategy cannot make them
/// disagree. The rule must depend only on its two arguments.
pub trait FilteringStrategy: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Whether a record is visible, given whether it matches the tree itself
    /// and whether at least one of its children is visible.
    fn includes(&self, matches: bool, has_included_child: bool) -> bool;
}

/// Full pass of `strategy` in depth-first order, children decided before
/// parents. An empty tree includes every record.
pub fn filter<S>(strategy: &S, dataset: &Dataset, tree: &ExpressionTree) -> Result<FilteredResult>
where
    S: FilteringStrategy + ?Sized,
{
    FilteredView::build(strategy, dataset, tree).map(FilteredView::into_result)
}

/// Keeps a record when it matches or when any descendant is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestorInclusion;

impl FilteringStrategy for AncestorInclusion {
    fn name(&self) -> &str {
        "ancestor-inclusion"
    }

    fn includes(&self, matches: bool, has_included_child: bool) -> bool {
        matches || has_included_child
    }
}

/// Keeps only the records that match, flattening the hierarchy away.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingRecordsOnly;

impl FilteringStrategy for MatchingRecordsOnly {
    fn name(&self) -> &str {
        "matching-records-only"
    }

    fn includes(&self, matches: bool, _has_included_child: bool) -> bool {
        matches
    }
}

/// Built-in strategies, as named in configuration files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    #[default]
    AncestorInclusion,
    MatchingRecordsOnly,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn FilteringStrategy> {
        match self {
            StrategyKind::AncestorInclusion => Box::new(AncestorInclusion),
            StrategyKind::MatchingRecordsOnly => Box::new(MatchingRecordsOnly),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::builtin_registry;
    use crate::dataset::{Record, RecordId};
    use crate::expression::{FilterExpression, Operator};
    use crate::value::DataType;

    fn dataset() -> Dataset {
        Dataset::from_records(vec![
            (Record::new(1u64).with("Name", "John Winchester"), None),
            (Record::new(2u64).with("Name", "Michael Langdon"), Some(RecordId(1))),
            (Record::new(3u64).with("Name", "Thomas Hardy"), Some(RecordId(2))),
            (Record::new(4u64).with("Name", "Ana Sanders"), Some(RecordId(1))),
            (Record::new(5u64).with("Name", "Yang Wang"), None),
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
            true,
        )
        .unwrap();
        ExpressionTree::new(Operator::And).with(leaf).unwrap()
    }

    fn ids(result: &FilteredResult) -> Vec<u64> {
        result.iter().map(|r| r.id.0).collect()
    }

    #[test]
    fn empty_tree_passes_everything_through() {
        let data = dataset();
        let tree = ExpressionTree::default();
        for strategy in [StrategyKind::AncestorInclusion, StrategyKind::MatchingRecordsOnly] {
            let result = filter(strategy.build().as_ref(), &data, &tree).unwrap();
            assert_eq!(ids(&result), vec![1, 2, 3, 4, 5]);
            assert!(result.iter().all(|r| r.matched));
        }
    }

    #[test]
    fn ancestors_of_matches_are_kept_unmatched() {
        let data = dataset();
        let result = filter(&AncestorInclusion, &data, &name_contains("hardy")).unwrap();

        assert_eq!(ids(&result), vec![1, 2, 3]);
        let flags: Vec<bool> = result.iter().map(|r| r.matched).collect();
        assert_eq!(flags, vec![false, false, true]);
        let depths: Vec<usize> = result.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 1, 2]);
    }

    #[test]
    fn matching_only_drops_ancestors() {
        let data = dataset();
        let result = filter(&MatchingRecordsOnly, &data, &name_contains("an")).unwrap();
        assert_eq!(ids(&result), vec![2, 4, 5]);
    }

    #[test]
    fn nothing_matches() {
        let data = dataset();
        let result = filter(&AncestorInclusion, &data, &name_contains("zzz")).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn evaluation_errors_propagate() {
        let data =
            Dataset::from_records(vec![(Record::new(1u64).with("Name", 3i64), None)]).unwrap();
        assert!(filter(&AncestorInclusion, &data, &name_contains("a")).is_err());
    }

    #[test]
    fn kind_names_round_trip_through_serde() {
        let kind: StrategyKind = serde_json::from_str("\"matching-records-only\"").unwrap();
        assert_eq!(kind, StrategyKind::MatchingRecordsOnly);
        assert_eq!(kind.build().name(), "matching-records-only");
        assert_eq!(StrategyKind::default().build().name(), "ancestor-inclusion");
    }
}
