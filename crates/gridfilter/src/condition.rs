//! # Filtering Condition Registry
//!
//! Conditions are named predicates `(field_value, search_value) -> bool`,
//! grouped in one table per [`DataType`]. Names are unique within a table;
//! registering an existing name replaces it.
//!
//! ## Built-in Catalog
//!
//! | Type | Conditions |
//! |------|------------|
//! | `string` | `contains`, `doesNotContain`, `startsWith`, `endsWith`, `equals`, `doesNotEqual` |
//! | `number` | `equals`, `doesNotEqual`, `greaterThan`, `lessThan`, `greaterThanOrEqualTo`, `lessThanOrEqualTo` |
//! | `date` | `equals`, `doesNotEqual`, `before`, `after`, `onOrBefore`, `onOrAfter` |
//! | `boolean` | `all`, `true`, `false` |
//!
//! Every type also has the unary `empty`, `notEmpty`, `null` and `notNull`.
//! Unary conditions ignore the search value.
//!
//! ## Null Handling
//!
//! Binary comparisons are false when either side is null. The negated forms
//! (`doesNotEqual`, `doesNotContain`) are defined as the negation of their
//! positive form, so they are true for null.
//!
//! ## Case Folding
//!
//! Predicates never fold case. A leaf with `ignore_case` lowercases both
//! operands before calling the predicate, so one predicate serves both modes.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{FilterError, Result};
use crate::value::{DataType, FieldValue};

/// A pure predicate over `(field_value, search_value)`.
pub type Predicate = Arc<dyn Fn(&FieldValue, &FieldValue) -> bool + Send + Sync>;

/// A registered condition.
#[derive(Clone)]
pub struct Condition {
    name: String,
    data_type: DataType,
    unary: bool,
    predicate: Predicate,
}

impl Condition {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Unary conditions do not look at the search value.
    pub fn is_unary(&self) -> bool {
        self.unary
    }

    pub fn evaluate(&self, value: &FieldValue, search: &FieldValue) -> bool {
        (self.predicate)(value, search)
    }
}

impl std::fmt::Debug for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Condition")
            .field("name", &self.name)
            .field("data_type", &self.data_type)
            .field("unary", &self.unary)
            .finish_non_exhaustive()
    }
}

/// A resolved handle to a condition.
pub type ConditionRef = Arc<Condition>;

struct Builtin {
    name: &'static str,
    unary: bool,
    predicate: fn(&FieldValue, &FieldValue) -> bool,
}

impl Builtin {
    const fn new(name: &'static str, predicate: fn(&FieldValue, &FieldValue) -> bool) -> Self {
        Self {
            name,
            unary: false,
            predicate,
        }
    }

    const fn unary(mut self) -> Self {
        self.unary = true;
        self
    }
}

const STRING_CONDITIONS: &[Builtin] = &[
    Builtin::new("contains", str_contains),
    Builtin::new("doesNotContain", |v, s| !str_contains(v, s)),
    Builtin::new("startsWith", |v, s| {
        matches!(strings(v, s), Some((v, s)) if v.starts_with(s))
    }),
    Builtin::new("endsWith", |v, s| {
        matches!(strings(v, s), Some((v, s)) if v.ends_with(s))
    }),
    Builtin::new("equals", str_equals),
    Builtin::new("doesNotEqual", |v, s| !str_equals(v, s)),
    Builtin::new("empty", |v, _| str_empty(v)).unary(),
    Builtin::new("notEmpty", |v, _| !str_empty(v)).unary(),
    Builtin::new("null", is_null).unary(),
    Builtin::new("notNull", |v, s| !is_null(v, s)).unary(),
];

const NUMBER_CONDITIONS: &[Builtin] = &[
    Builtin::new("equals", num_equals),
    Builtin::new("doesNotEqual", |v, s| !num_equals(v, s)),
    Builtin::new("greaterThan", |v, s| {
        matches!(numbers(v, s), Some((v, s)) if v > s)
    }),
    Builtin::new("lessThan", |v, s| {
        matches!(numbers(v, s), Some((v, s)) if v < s)
    }),
    Builtin::new("greaterThanOrEqualTo", |v, s| {
        matches!(numbers(v, s), Some((v, s)) if v >= s)
    }),
    Builtin::new("lessThanOrEqualTo", |v, s| {
        matches!(numbers(v, s), Some((v, s)) if v <= s)
    }),
    Builtin::new("empty", |v, _| num_empty(v)).unary(),
    Builtin::new("notEmpty", |v, _| !num_empty(v)).unary(),
    Builtin::new("null", is_null).unary(),
    Builtin::new("notNull", |v, s| !is_null(v, s)).unary(),
];

const DATE_CONDITIONS: &[Builtin] = &[
    Builtin::new("equals", date_equals),
    Builtin::new("doesNotEqual", |v, s| !date_equals(v, s)),
    Builtin::new("before", |v, s| matches!(dates(v, s), Some((v, s)) if v < s)),
    Builtin::new("after", |v, s| matches!(dates(v, s), Some((v, s)) if v > s)),
    Builtin::new("onOrBefore", |v, s| {
        matches!(dates(v, s), Some((v, s)) if v <= s)
    }),
    Builtin::new("onOrAfter", |v, s| {
        matches!(dates(v, s), Some((v, s)) if v >= s)
    }),
    Builtin::new("empty", is_null).unary(),
    Builtin::new("notEmpty", |v, s| !is_null(v, s)).unary(),
    Builtin::new("null", is_null).unary(),
    Builtin::new("notNull", |v, s| !is_null(v, s)).unary(),
];

const BOOLEAN_CONDITIONS: &[Builtin] = &[
    Builtin::new("all", |_, _| true).unary(),
    Builtin::new("true", |v, _| v.as_bool() == Some(true)).unary(),
    Builtin::new("false", |v, _| v.as_bool() == Some(false)).unary(),
    Builtin::new("empty", is_null).unary(),
    Builtin::new("notEmpty", |v, s| !is_null(v, s)).unary(),
    Builtin::new("null", is_null).unary(),
    Builtin::new("notNull", |v, s| !is_null(v, s)).unary(),
];

fn builtins(data_type: DataType) -> &'static [Builtin] {
    match data_type {
        DataType::String => STRING_CONDITIONS,
        DataType::Number => NUMBER_CONDITIONS,
        DataType::Date => DATE_CONDITIONS,
        DataType::Boolean => BOOLEAN_CONDITIONS,
    }
}

fn strings<'a>(v: &'a FieldValue, s: &'a FieldValue) -> Option<(&'a str, &'a str)> {
    Some((v.as_str()?, s.as_str()?))
}

fn numbers(v: &FieldValue, s: &FieldValue) -> Option<(f64, f64)> {
    Some((v.as_number()?, s.as_number()?))
}

fn dates(v: &FieldValue, s: &FieldValue) -> Option<(chrono::NaiveDate, chrono::NaiveDate)> {
    Some((v.as_date()?, s.as_date()?))
}

fn str_contains(v: &FieldValue, s: &FieldValue) -> bool {
    matches!(strings(v, s), Some((v, s)) if v.contains(s))
}

fn str_equals(v: &FieldValue, s: &FieldValue) -> bool {
    matches!(strings(v, s), Some((v, s)) if v == s)
}

fn str_empty(v: &FieldValue) -> bool {
    match v {
        FieldValue::Null => true,
        FieldValue::String(s) => s.is_empty(),
        _ => false,
    }
}

fn num_equals(v: &FieldValue, s: &FieldValue) -> bool {
    matches!(numbers(v, s), Some((v, s)) if v == s)
}

fn num_empty(v: &FieldValue) -> bool {
    match v {
        FieldValue::Null => true,
        FieldValue::Number(n) => n.is_nan(),
        _ => false,
    }
}

fn date_equals(v: &FieldValue, s: &FieldValue) -> bool {
    matches!(dates(v, s), Some((v, s)) if v == s)
}

fn is_null(v: &FieldValue, _: &FieldValue) -> bool {
    v.is_null()
}

/// Condition tables keyed by data type.
#[derive(Clone)]
pub struct ConditionRegistry {
    tables: HashMap<DataType, Vec<ConditionRef>>,
}

impl ConditionRegistry {
    /// A registry with no conditions at all.
    pub fn empty() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    /// A registry preloaded with the built-in catalog.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for data_type in [
            DataType::String,
            DataType::Number,
            DataType::Date,
            DataType::Boolean,
        ] {
            for builtin in builtins(data_type) {
                registry.register(data_type, builtin.name, builtin.predicate, builtin.unary);
            }
        }
        registry
    }

    /// Registers a condition, returning the one it replaced, if any.
    pub fn register<F>(
        &mut self,
        data_type: DataType,
        name: impl Into<String>,
        predicate: F,
        unary: bool,
    ) -> Option<ConditionRef>
    where
        F: Fn(&FieldValue, &FieldValue) -> bool + Send + Sync + 'static,
    {
        let condition = Arc::new(Condition {
            name: name.into(),
            data_type,
            unary,
            predicate: Arc::new(predicate),
        });
        let table = self.tables.entry(data_type).or_default();
        match table.iter_mut().find(|c| c.name == condition.name) {
            Some(slot) => Some(std::mem::replace(slot, condition)),
            None => {
                table.push(condition);
                None
            }
        }
    }

    /// Looks up `name` in the table for `data_type`.
    pub fn resolve(&self, data_type: DataType, name: &str) -> Result<ConditionRef> {
        self.tables
            .get(&data_type)
            .and_then(|table| table.iter().find(|c| c.name == name))
            .cloned()
            .ok_or_else(|| FilterError::UnknownCondition {
                data_type,
                name: name.to_string(),
            })
    }

    /// Condition names for `data_type`, in registration order.
    pub fn names(&self, data_type: DataType) -> impl Iterator<Item = &str> {
        self.tables
            .get(&data_type)
            .into_iter()
            .flatten()
            .map(|c| c.name.as_str())
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(
                self.tables
                    .iter()
                    .map(|(t, table)| (t, table.iter().map(|c| &c.name).collect::<Vec<_>>())),
            )
            .finish()
    }
}

static BUILTIN_REGISTRY: Lazy<ConditionRegistry> = Lazy::new(ConditionRegistry::with_builtins);

/// Shared registry holding only the built-in catalog.
pub fn builtin_registry() -> &'static ConditionRegistry {
    &BUILTIN_REGISTRY
}
