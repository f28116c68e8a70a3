//! FILENAME: crosstab-engine/src/error.rs

use table::ColumnType;
use thiserror::Error;

/// Invalid-configuration conditions, all detected before any row is read.
///
/// Structural contract violations inside the engine (mixed tree node states,
/// mismatched merge shapes, diverged function lists) are driver bugs, not
/// configuration errors; those panic instead of surfacing here.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("column index {index} is out of bounds for a table with {column_count} columns")]
    ColumnOutOfBounds { index: usize, column_count: usize },

    #[error("aggregation {kind} cannot be applied to column '{column}' of type {column_type:?}")]
    IncompatibleColumnType {
        kind: &'static str,
        column: String,
        column_type: ColumnType,
    },

    #[error("weighted median of column '{0}' requires a weight column")]
    MissingWeightColumn(String),

    #[error("weight column '{column}' of type {column_type:?} is not numeric")]
    NonNumericWeightColumn {
        column: String,
        column_type: ColumnType,
    },

    #[error("partitioning does not cover the row range exactly: {0}")]
    InvalidPartitioning(String),
}
