//! # Filtering Service
//!
//! [`FilteringService`] is the single entry point a grid talks to. It owns the
//! dataset, its schema, the condition registry, the active expression tree and
//! strategy, and the filtered view, and keeps them consistent:
//!
//! - every change to the tree or the strategy runs a full filter pass
//! - every cell write goes through [`FilteringService::update_cell`], which
//!   patches the view incrementally
//!
//! ## Tree Shape
//!
//! Column filters applied through [`FilteringService::filter`] live as
//! per-field subtrees under a root AND tree, one subtree per column. Filtering
//! a column again replaces its subtree; clearing a column removes it. Trees
//! installed with [`FilteringService::set_expression_tree`] may have any shape.
//!
//! ## Failure Atomicity
//!
//! A failed call leaves the previous tree, strategy, data and result in
//! place. New trees are evaluated into a fresh view first and only committed
//! once the pass succeeded; a cell write that cannot be evaluated is rolled
//! back.

use tracing::{debug, trace};

use crate::condition::ConditionRegistry;
use crate::config::FilterConfig;
use crate::dataset::{Dataset, RecordId};
use crate::error::{FilterError, Result};
use crate::expression::{ExpressionTree, FilterExpression, Operator};
use crate::result::FilteredResult;
use crate::schema::Schema;
use crate::strategy::FilteringStrategy;
use crate::value::FieldValue;
use crate::view::{FilteredView, ViewPatch};

pub struct FilteringService {
    dataset: Dataset,
    schema: Schema,
    registry: ConditionRegistry,
    config: FilterConfig,
    tree: ExpressionTree,
    strategy: Box<dyn FilteringStrategy>,
    view: FilteredView,
}

impl FilteringService {
    pub fn new(dataset: Dataset, schema: Schema) -> Self {
        Self::with_config(dataset, schema, FilterConfig::default())
    }

    pub fn with_config(dataset: Dataset, schema: Schema, config: FilterConfig) -> Self {
        Self::with_registry(dataset, schema, config, ConditionRegistry::with_builtins())
    }

    /// Uses `registry` instead of the built-in conditions, e.g. to add custom
    /// ones.
    pub fn with_registry(
        dataset: Dataset,
        schema: Schema,
        config: FilterConfig,
        registry: ConditionRegistry,
    ) -> Self {
        let view = FilteredView::unfiltered(&dataset);
        let strategy = config.strategy.build();
        Self {
            dataset,
            schema,
            registry,
            config,
            tree: ExpressionTree::default(),
            strategy,
            view,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConditionRegistry {
        &self.registry
    }

    /// Registering conditions does not touch the active tree; leaves keep the
    /// condition they resolved when built.
    pub fn registry_mut(&mut self) -> &mut ConditionRegistry {
        &mut self.registry
    }

    pub fn expression_tree(&self) -> &ExpressionTree {
        &self.tree
    }

    pub fn filtered_result(&self) -> &FilteredResult {
        self.view.result()
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Filters `field` with a single condition, replacing any previous filter
    /// on that field. `ignore_case` falls back to the configured default.
    pub fn filter(
        &mut self,
        field: &str,
        value: impl Into<FieldValue>,
        condition: &str,
        ignore_case: Option<bool>,
    ) -> Result<&FilteredResult> {
        let data_type = self.schema.data_type(field)?;
        let ignore_case = ignore_case.unwrap_or(self.config.ignore_case);
        let expression = FilterExpression::new(
            &self.registry,
            field,
            data_type,
            condition,
            value,
            ignore_case,
        )?;
        let subtree = ExpressionTree::for_field(field, Operator::And).with(expression)?;

        let mut tree = self.tree.clone();
        tree.replace_field(subtree)?;
        debug!(field, condition, "column filter applied");
        self.apply(tree)?;
        Ok(self.view.result())
    }

    /// Installs `tree` as the active filter and runs a full pass.
    ///
    /// Every leaf must name a schema field of the data type its condition was
    /// resolved for.
    pub fn set_expression_tree(&mut self, tree: ExpressionTree) -> Result<&FilteredResult> {
        for expression in tree.expressions() {
            let declared = self.schema.data_type(expression.field())?;
            if declared != expression.data_type() {
                return Err(FilterError::TypeMismatch {
                    field: expression.field().to_string(),
                    expected: declared,
                    found: expression.data_type().to_string(),
                });
            }
        }
        self.apply(tree)?;
        Ok(self.view.result())
    }

    /// Clears the filter on `field`, or every filter when `None`.
    ///
    /// Clearing everything restores the full record set in order.
    pub fn clear_expression_tree(&mut self, field: Option<&str>) -> Result<&FilteredResult> {
        let mut tree = self.tree.clone();
        match field {
            Some(field) => {
                if !tree.remove_field(field) {
                    return Ok(self.view.result());
                }
            }
            None => tree.clear(),
        }
        debug!(field = field.unwrap_or("*"), "filter cleared");
        self.apply(tree)?;
        Ok(self.view.result())
    }

    /// Installs `strategy` and re-runs the active filter with it.
    pub fn set_strategy(
        &mut self,
        strategy: Box<dyn FilteringStrategy>,
    ) -> Result<&FilteredResult> {
        let view = FilteredView::build(strategy.as_ref(), &self.dataset, &self.tree)?;
        debug!(strategy = strategy.name(), "strategy installed");
        self.strategy = strategy;
        self.view = view;
        Ok(self.view.result())
    }

    /// Re-runs the active filter from scratch.
    pub fn refilter(&mut self) -> Result<&FilteredResult> {
        self.view = FilteredView::build(self.strategy.as_ref(), &self.dataset, &self.tree)?;
        Ok(self.view.result())
    }

    /// Writes `value` into `field` of record `id` and patches the view.
    pub fn update_cell(
        &mut self,
        id: RecordId,
        field: &str,
        value: impl Into<FieldValue>,
    ) -> Result<ViewPatch> {
        let value = value.into();
        self.schema.check(field, &value)?;

        let existed = self
            .dataset
            .get(id)
            .ok_or(FilterError::RecordNotFound(id))?
            .has(field);
        let previous = self.dataset.set_field(id, field, value)?;
        trace!(record = %id, field, "cell written");

        match self
            .view
            .on_record_updated(self.strategy.as_ref(), &self.dataset, &self.tree, id)
        {
            Ok(patch) => Ok(patch),
            Err(err) => {
                if existed {
                    self.dataset.set_field(id, field, previous)?;
                } else {
                    self.dataset.remove_field(id, field)?;
                }
                Err(err)
            }
        }
    }

    fn apply(&mut self, tree: ExpressionTree) -> Result<()> {
        let view = FilteredView::build(self.strategy.as_ref(), &self.dataset, &tree)?;
        self.tree = tree;
        self.view = view;
        Ok(())
    }
}

impl std::fmt::Debug for FilteringService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteringService")
            .field("records", &self.dataset.len())
            .field("strategy", &self.strategy.name())
            .field("tree", &self.tree)
            .field("visible", &self.view.result().len())
            .finish()
    }
}
