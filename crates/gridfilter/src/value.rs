//! Field value types.
//!
//! This module defines the runtime representation of a cell value and the
//! data types a column can declare. Conditions are registered per
//! [`DataType`], and every non-null [`FieldValue`] belongs to exactly one.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;

use crate::error::{FilterError, Result};

/// The declared type of a column.
///
/// Determines which condition table a filter expression resolves against
/// and which values a cell of that column may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    Number,
    Date,
    Boolean,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::String => "string",
            DataType::Number => "number",
            DataType::Date => "date",
            DataType::Boolean => "boolean",
        };
        write!(f, "{}", name)
    }
}

/// Runtime representation of a cell value.
///
/// `Null` covers both a missing field and an explicit null; condition
/// predicates decide what a null means for them.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Null,
    String(String),
    Number(f64),
    Date(NaiveDate),
    Boolean(bool),
}

impl FieldValue {
    /// The data type of this value, or `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            FieldValue::Null => None,
            FieldValue::String(_) => Some(DataType::String),
            FieldValue::Number(_) => Some(DataType::Number),
            FieldValue::Date(_) => Some(DataType::Date),
            FieldValue::Boolean(_) => Some(DataType::Boolean),
        }
    }

    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> String {
        match self.data_type() {
            Some(data_type) => data_type.to_string(),
            None => "null".to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Whether this value may be stored in a column of `data_type`.
    ///
    /// Null fits every column.
    pub fn fits(&self, data_type: DataType) -> bool {
        match self.data_type() {
            Some(own) => own == data_type,
            None => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            FieldValue::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Lowercases string values; every other value is returned unchanged.
    pub fn fold_case(&self) -> FieldValue {
        match self {
            FieldValue::String(s) => FieldValue::String(s.to_lowercase()),
            other => other.clone(),
        }
    }

    /// Converts a JSON value into a field value of the declared type.
    ///
    /// Dates are accepted as `YYYY-MM-DD` or RFC 3339 strings (the time part
    /// is dropped). Anything that does not fit the declared type fails with
    /// [`FilterError::TypeMismatch`].
    pub fn from_json(field: &str, json: &serde_json::Value, data_type: DataType) -> Result<Self> {
        use serde_json::Value;

        let mismatch = |found: &str| FilterError::TypeMismatch {
            field: field.to_string(),
            expected: data_type,
            found: found.to_string(),
        };

        match (data_type, json) {
            (_, Value::Null) => Ok(FieldValue::Null),
            (DataType::String, Value::String(s)) => Ok(FieldValue::String(s.clone())),
            (DataType::Number, Value::Number(n)) => n
                .as_f64()
                .map(FieldValue::Number)
                .ok_or_else(|| mismatch("number")),
            (DataType::Boolean, Value::Bool(b)) => Ok(FieldValue::Boolean(*b)),
            (DataType::Date, Value::String(s)) => parse_date(s)
                .map(FieldValue::Date)
                .ok_or_else(|| mismatch(&format!("\"{}\"", s))),
            (_, other) => Err(mismatch(json_type_name(other))),
        }
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    use serde_json::Value;
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(value: NaiveDate) -> Self {
        FieldValue::Date(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn data_type_of_values() {
        assert_eq!(FieldValue::from("x").data_type(), Some(DataType::String));
        assert_eq!(FieldValue::from(3i64).data_type(), Some(DataType::Number));
        assert_eq!(FieldValue::from(true).data_type(), Some(DataType::Boolean));
        assert_eq!(FieldValue::Null.data_type(), None);
    }

    #[test]
    fn null_fits_every_type() {
        assert!(FieldValue::Null.fits(DataType::Date));
        assert!(FieldValue::Null.fits(DataType::String));
        assert!(!FieldValue::from("x").fits(DataType::Number));
    }

    #[test]
    fn fold_case_only_touches_strings() {
        assert_eq!(FieldValue::from("AnA").fold_case(), FieldValue::from("ana"));
        assert_eq!(FieldValue::from(1.5).fold_case(), FieldValue::from(1.5));
    }

    #[test]
    fn from_json_parses_dates() {
        let date = NaiveDate::from_ymd_opt(2010, 7, 25).unwrap();
        assert_eq!(
            FieldValue::from_json("HireDate", &json!("2010-07-25"), DataType::Date).unwrap(),
            FieldValue::Date(date)
        );
        assert_eq!(
            FieldValue::from_json("HireDate", &json!("2010-07-25T10:00:00Z"), DataType::Date)
                .unwrap(),
            FieldValue::Date(date)
        );
    }

    #[test]
    fn from_json_rejects_wrong_type() {
        let err = FieldValue::from_json("ID", &json!("147"), DataType::Number).unwrap_err();
        assert!(matches!(err, FilterError::TypeMismatch { .. }));

        let err =
            FieldValue::from_json("HireDate", &json!("yesterday"), DataType::Date).unwrap_err();
        assert!(matches!(err, FilterError::TypeMismatch { .. }));
    }

    #[test]
    fn from_json_null_is_null_for_any_type() {
        assert_eq!(
            FieldValue::from_json("Name", &json!(null), DataType::String).unwrap(),
            FieldValue::Null
        );
    }
}
