use thiserror::Error;

use crate::db::TableName;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown column {table}.{column}")]
    UnknownColumn { table: TableName, column: String },

    #[error("type mismatch for {table}.{column}: expected {expected}")]
    TypeMismatch {
        table: TableName,
        column: String,
        expected: &'static str,
    },

    #[error("column {table}.{column} is read-only")]
    ReadOnlyColumn { table: TableName, column: String },

    #[error("duplicate row in {table} for ({key})")]
    Duplicate { table: TableName, key: String },

    #[error("{table}: update/delete requires at least one filter")]
    UnfilteredMutation { table: TableName },
}

pub type Result<T> = std::result::Result<T, StoreError>;
