//! # Gridfilter Architecture
//!
//! Gridfilter filters **hierarchical records** the way a tree grid shows
//! them: a record is kept when it matches, and its ancestors are kept so the
//! match stays reachable in the tree. After a single cell changes, the visible
//! set is patched instead of recomputed.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Service (service.rs)                                       │
//! │  - Owns dataset, schema, registry, tree, strategy, view     │
//! │  - Column filters, clearing, strategy swaps, cell updates   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Strategy + Maintainer (strategy.rs, view.rs)               │
//! │  - Inclusion rule over (matches, has included child)        │
//! │  - Full pass and incremental patch built on that one rule   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Expressions (expression.rs, condition.rs)                  │
//! │  - AND/OR trees of field conditions                         │
//! │  - Conditions resolved from a per-type registry             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Data (dataset.rs, schema.rs, value.rs)                     │
//! │  - Forest of records in depth-first order                   │
//! │  - Typed field values checked against a column schema       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Principle: Pure Evaluation
//!
//! Conditions and trees never mutate records and never perform I/O. The only
//! writes go through [`FilteringService::update_cell`], which keeps the
//! filtered view in step with the data. Everything runs synchronously on the
//! caller's thread.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events (`debug` per filter pass and patch,
//! `trace` per cell write) and never installs a subscriber.
//!
//! ## Example
//!
//! ```
//! use gridfilter::{DataType, Dataset, FilteringService, Record, RecordId, Schema};
//!
//! let schema = Schema::new().column("Name", DataType::String);
//! let dataset = Dataset::from_records(vec![
//!     (Record::new(1u64).with("Name", "John Winchester"), None),
//!     (Record::new(2u64).with("Name", "Michael Langdon"), Some(RecordId(1))),
//! ])
//! .unwrap();
//!
//! let mut service = FilteringService::new(dataset, schema);
//! let result = service.filter("Name", "langdon", "contains", None).unwrap();
//! assert_eq!(result.ids(), vec![RecordId(1), RecordId(2)]);
//! assert!(!result.get(RecordId(1)).unwrap().matched);
//! ```

pub mod condition;
pub mod config;
pub mod dataset;
pub mod error;
pub mod expression;
pub mod result;
pub mod schema;
pub mod service;
pub mod strategy;
pub mod value;
pub mod view;

pub use condition::{builtin_registry, Condition, ConditionRef, ConditionRegistry};
pub use config::FilterConfig;
pub use dataset::{Dataset, Record, RecordId};
pub use error::{FilterError, Result};
pub use expression::{ExpressionTree, FilterExpression, Operand, Operator};
pub use result::{FilteredResult, FilteredRow};
pub use schema::{Column, Schema};
pub use service::FilteringService;
pub use strategy::{
    filter, AncestorInclusion, FilteringStrategy, MatchingRecordsOnly, StrategyKind,
};
pub use value::{DataType, FieldValue};
pub use view::{FilteredView, ViewPatch};
