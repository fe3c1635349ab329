use crate::dataset::RecordId;
use crate::value::DataType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Unknown condition '{name}' for {data_type} fields")]
    UnknownCondition { data_type: DataType, name: String },

    #[error("Type mismatch on '{field}': expected {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: DataType,
        found: String,
    },

    #[error("Invalid expression tree: {0}")]
    InvalidExpressionTree(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] confique::Error),
}

pub type Result<T> = std::result::Result<T, FilterError>;
