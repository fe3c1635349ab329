//! Column schema.
//!
//! A [`Schema`] is the single source of truth for which fields exist and what
//! type each one declares. Filter expressions take their data type from it,
//! and cell writes are checked against it.

use serde::Serialize;

use crate::error::{FilterError, Result};
use crate::value::{DataType, FieldValue};

/// A single column: field name plus declared data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub field: String,
    pub data_type: DataType,
}

impl Column {
    pub fn new(field: impl Into<String>, data_type: DataType) -> Self {
        Self {
            field: field.into(),
            data_type,
        }
    }
}

/// Ordered set of columns with unique field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a column, replacing any previous column with the same field.
    pub fn column(mut self, field: impl Into<String>, data_type: DataType) -> Self {
        let column = Column::new(field, data_type);
        match self.columns.iter_mut().find(|c| c.field == column.field) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
        self
    }

    pub fn get(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Declared type of `field`, or [`FilterError::UnknownField`].
    pub fn data_type(&self, field: &str) -> Result<DataType> {
        self.get(field)
            .map(|c| c.data_type)
            .ok_or_else(|| FilterError::UnknownField(field.to_string()))
    }

    /// Checks that `value` may be stored in `field`.
    pub fn check(&self, field: &str, value: &FieldValue) -> Result<()> {
        let expected = self.data_type(field)?;
        if value.fits(expected) {
            Ok(())
        } else {
            Err(FilterError::TypeMismatch {
                field: field.to_string(),
                expected,
                found: value.type_name(),
            })
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.field.as_str())
    }
}
