//! # Filter Expression Tree
//!
//! A filter is a tree: leaves are [`FilterExpression`]s (field, condition,
//! search value, case flag) and inner nodes are [`ExpressionTree`]s that
//! combine their operands with AND or OR.
//!
//! ## Resolution at Construction
//!
//! A leaf resolves its condition against a [`ConditionRegistry`] when it is
//! built, and checks the search value against the column type. Unknown
//! conditions and mistyped search values therefore fail before any record is
//! evaluated.
//!
//! ## Evaluation
//!
//! [`ExpressionTree::matches`] is pure. AND stops at the first operand that
//! does not match, OR at the first that does. A tree with no operands
//! matches every record.
//!
//! ## Per-Field Subtrees
//!
//! A tree may be tagged with a field ([`ExpressionTree::for_field`]). Such a
//! tree only accepts leaves on that field; the service keeps one of these per
//! filtered column under its root AND tree.

use serde::Serialize;
use std::str::FromStr;

use crate::condition::{ConditionRef, ConditionRegistry};
use crate::dataset::Record;
use crate::error::{FilterError, Result};
use crate::value::{DataType, FieldValue};

/// Logical operator of a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    And,
    Or,
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operator::And => write!(f, "and"),
            Operator::Or => write!(f, "or"),
        }
    }
}

impl FromStr for Operator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "and" => Ok(Operator::And),
            "or" => Ok(Operator::Or),
            _ => Err(FilterError::InvalidExpressionTree(format!(
                "unrecognized operator '{}'",
                s
            ))),
        }
    }
}

/// A leaf condition on a single field.
#[derive(Debug, Clone)]
pub struct FilterExpression {
    field: String,
    condition: ConditionRef,
    search_value: FieldValue,
    folded_search: FieldValue,
    ignore_case: bool,
}

impl FilterExpression {
    /// Resolves `condition` for `data_type` in `registry` and builds the leaf.
    pub fn new(
        registry: &ConditionRegistry,
        field: impl Into<String>,
        data_type: DataType,
        condition: &str,
        search_value: impl Into<FieldValue>,
        ignore_case: bool,
    ) -> Result<Self> {
        let condition = registry.resolve(data_type, condition)?;
        Self::with_condition(field, condition, search_value, ignore_case)
    }

    /// Builds a leaf from an already resolved condition.
    ///
    /// Binary conditions need a search value of the condition's data type.
    pub fn with_condition(
        field: impl Into<String>,
        condition: ConditionRef,
        search_value: impl Into<FieldValue>,
        ignore_case: bool,
    ) -> Result<Self> {
        let field = field.into();
        let search_value = search_value.into();
        let data_type = condition.data_type();

        if !condition.is_unary() && search_value.data_type() != Some(data_type) {
            return Err(FilterError::TypeMismatch {
                field,
                expected: data_type,
                found: search_value.type_name(),
            });
        }

        let ignore_case = ignore_case && data_type == DataType::String;
        let folded_search = if ignore_case {
            search_value.fold_case()
        } else {
            search_value.clone()
        };

        Ok(Self {
            field,
            condition,
            search_value,
            folded_search,
            ignore_case,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn data_type(&self) -> DataType {
        self.condition.data_type()
    }

    pub fn condition(&self) -> &ConditionRef {
        &self.condition
    }

    pub fn search_value(&self) -> &FieldValue {
        &self.search_value
    }

    /// Only ever true for string fields.
    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }

    /// Evaluates the condition against the record's value for this field.
    ///
    /// A missing field is evaluated as null. A non-null value of another data
    /// type fails with [`FilterError::TypeMismatch`].
    pub fn matches(&self, record: &Record) -> Result<bool> {
        let value = record.get(&self.field);
        let data_type = self.data_type();
        if !value.fits(data_type) {
            return Err(FilterError::TypeMismatch {
                field: self.field.clone(),
                expected: data_type,
                found: value.type_name(),
            });
        }

        if self.ignore_case {
            Ok(self.condition.evaluate(&value.fold_case(), &self.folded_search))
        } else {
            Ok(self.condition.evaluate(value, &self.search_value))
        }
    }
}

/// An operand of a composite: a leaf or a nested tree.
#[derive(Debug, Clone)]
pub enum Operand {
    Expression(FilterExpression),
    Tree(ExpressionTree),
}

impl Operand {
    pub fn matches(&self, record: &Record) -> Result<bool> {
        match self {
            Operand::Expression(expr) => expr.matches(record),
            Operand::Tree(tree) => tree.matches(record),
        }
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Operand::Expression(expr) => {
                if !out.contains(&expr.field()) {
                    out.push(expr.field());
                }
            }
            Operand::Tree(tree) => {
                for operand in &tree.operands {
                    operand.collect_fields(out);
                }
            }
        }
    }
}

impl From<FilterExpression> for Operand {
    fn from(value: FilterExpression) -> Self {
        Operand::Expression(value)
    }
}

impl From<ExpressionTree> for Operand {
    fn from(value: ExpressionTree) -> Self {
        Operand::Tree(value)
    }
}

/// AND/OR composite of filter expressions.
#[derive(Debug, Clone)]
pub struct ExpressionTree {
    operator: Operator,
    field: Option<String>,
    operands: Vec<Operand>,
}

impl Default for ExpressionTree {
    fn default() -> Self {
        Self::new(Operator::And)
    }
}

impl ExpressionTree {
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            field: None,
            operands: Vec::new(),
        }
    }

    /// A subtree that only holds expressions on `field`.
    pub fn for_field(field: impl Into<String>, operator: Operator) -> Self {
        Self {
            operator,
            field: Some(field.into()),
            operands: Vec::new(),
        }
    }

    /// Appends an operand.
    ///
    /// Fails with [`FilterError::InvalidExpressionTree`] when this tree is
    /// tied to a field and the operand references another one.
    pub fn push(&mut self, operand: impl Into<Operand>) -> Result<()> {
        let operand = operand.into();
        if let Some(field) = &self.field {
            if let Operand::Tree(tree) = &operand {
                if tree.field.as_deref().is_some_and(|f| f != field) {
                    return Err(FilterError::InvalidExpressionTree(format!(
                        "subtree for '{}' cannot hold a subtree for '{}'",
                        field,
                        tree.field.as_deref().unwrap_or_default()
                    )));
                }
            }
            let mut fields = Vec::new();
            operand.collect_fields(&mut fields);
            if let Some(other) = fields.into_iter().find(|f| *f != field.as_str()) {
                return Err(FilterError::InvalidExpressionTree(format!(
                    "subtree for '{}' cannot hold an expression on '{}'",
                    field, other
                )));
            }
        }
        self.operands.push(operand);
        Ok(())
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, operand: impl Into<Operand>) -> Result<Self> {
        self.push(operand)?;
        Ok(self)
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    /// No operands: the tree matches everything.
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operands.len()
    }

    pub fn matches(&self, record: &Record) -> Result<bool> {
        if self.operands.is_empty() {
            return Ok(true);
        }
        match self.operator {
            Operator::And => {
                for operand in &self.operands {
                    if !operand.matches(record)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Operator::Or => {
                for operand in &self.operands {
                    if operand.matches(record)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Distinct fields referenced anywhere in the tree, in first-use order.
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for operand in &self.operands {
            operand.collect_fields(&mut out);
        }
        out
    }

    /// Every leaf in the tree, depth-first.
    pub fn expressions(&self) -> Vec<&FilterExpression> {
        let mut out = Vec::new();
        let mut stack: Vec<&Operand> = self.operands.iter().rev().collect();
        while let Some(operand) = stack.pop() {
            match operand {
                Operand::Expression(expr) => out.push(expr),
                Operand::Tree(tree) => stack.extend(tree.operands.iter().rev()),
            }
        }
        out
    }

    /// The direct per-field subtree for `field`, if any.
    pub fn find(&self, field: &str) -> Option<&ExpressionTree> {
        self.operands.iter().find_map(|operand| match operand {
            Operand::Tree(tree) if tree.field.as_deref() == Some(field) => Some(tree),
            _ => None,
        })
    }

    /// Replaces the direct subtree tied to the same field as `subtree`, or
    /// appends it when there is none.
    pub fn replace_field(&mut self, subtree: ExpressionTree) -> Result<()> {
        let Some(field) = subtree.field.clone() else {
            return Err(FilterError::InvalidExpressionTree(
                "replacement subtree must be tied to a field".to_string(),
            ));
        };
        if self.field.as_ref().is_some_and(|own| *own != field) {
            return Err(FilterError::InvalidExpressionTree(format!(
                "subtree for '{}' cannot hold a subtree for '{}'",
                self.field.as_deref().unwrap_or_default(),
                field
            )));
        }

        let existing = self.operands.iter_mut().find(|operand| {
            matches!(operand, Operand::Tree(tree) if tree.field.as_deref() == Some(field.as_str()))
        });
        match existing {
            Some(slot) => *slot = Operand::Tree(subtree),
            None => self.operands.push(Operand::Tree(subtree)),
        }
        Ok(())
    }

    /// Removes every expression on `field`.
    ///
    /// Subtrees left without operands are removed as well, so clearing one
    /// field never turns an OR branch into match-everything. Returns whether
    /// anything was removed.
    pub fn remove_field(&mut self, field: &str) -> bool {
        let before = self.operands.len();
        let mut changed = false;
        self.operands.retain_mut(|operand| match operand {
            Operand::Expression(expr) => expr.field() != field,
            Operand::Tree(tree) => {
                if tree.field.as_deref() == Some(field) {
                    return false;
                }
                if tree.remove_field(field) {
                    changed = true;
                    return !tree.is_empty();
                }
                true
            }
        });
        changed || self.operands.len() != before
    }

    /// Drops all operands.
    pub fn clear(&mut self) {
        self.operands.clear();
    }
}
