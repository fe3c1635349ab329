#![allow(dead_code)]

use gridfilter::{
    DataType, Dataset, FieldValue, FilteredResult, FilteringService, FilteringStrategy, RecordId,
    Schema,
};
use tracing_subscriber::EnvFilter;

pub const EMPLOYEES_JSON: &str = include_str!("../fixtures/employees.json");

/// Installs a test subscriber once; `RUST_LOG=gridfilter=debug` shows passes.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")),
        )
        .with_test_writer()
        .try_init();
}

pub fn schema() -> Schema {
    Schema::new()
        .column("ID", DataType::Number)
        .column("Name", DataType::String)
        .column("HireDate", DataType::Date)
        .column("Age", DataType::Number)
        .column("OnPTO", DataType::Boolean)
}

pub fn employees() -> Dataset {
    Dataset::from_json_nested(EMPLOYEES_JSON, &schema(), "ID", "Employees").unwrap()
}

pub fn setup() -> FilteringService {
    init_tracing();
    FilteringService::new(employees(), schema())
}

pub fn ids(result: &FilteredResult) -> Vec<u64> {
    result.iter().map(|r| r.id.0).collect()
}

/// Ids of rows kept only for a matching descendant.
pub fn unmatched(result: &FilteredResult) -> Vec<u64> {
    result.iter().filter(|r| !r.matched).map(|r| r.id.0).collect()
}

pub fn date(text: &str) -> FieldValue {
    FieldValue::Date(chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d").unwrap())
}

pub fn id(value: u64) -> RecordId {
    RecordId(value)
}

/// Keeps the most specific matches: a match is hidden when one of its
/// children is visible.
#[derive(Debug, Clone, Copy)]
pub struct DeepestMatches;

impl FilteringStrategy for DeepestMatches {
    fn name(&self) -> &str {
        "deepest-matches"
    }

    fn includes(&self, matches: bool, has_included_child: bool) -> bool {
        matches && !has_included_child
    }
}
