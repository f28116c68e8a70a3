//! FILENAME: table/src/value.rs
//! PURPOSE: The fundamental column value type shared by the engine and its callers.
//! CONTEXT: `DataValue` doubles as a hash-map key — grouping keys nodes directly
//! on column values — so equality and hashing are implemented by hand with
//! NaN-safe semantics instead of being derived.

use serde::{Deserialize, Serialize};

/// The type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Number,
    Text,
    Bool,
}

/// Wrapper around f64 that implements Eq and Hash for use as a map key.
/// All NaN payloads are treated as equal to each other, and 0.0 hashes
/// the same as -0.0 (they compare equal, so they must hash alike).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        if self.0.is_nan() && other.0.is_nan() {
            true
        } else {
            self.0 == other.0
        }
    }
}

impl Eq for OrderedFloat {}

impl std::hash::Hash for OrderedFloat {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.0.is_nan() {
            u64::MAX.hash(state);
        } else if self.0 == 0.0 {
            0.0f64.to_bits().hash(state);
        } else {
            self.0.to_bits().hash(state);
        }
    }
}

impl OrderedFloat {
    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// A single cell value in a column-typed table.
///
/// `Missing` is a first-class value: a missing group-by or pivot entry forms
/// its own group instead of being dropped or poisoning an aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataValue {
    Missing,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataValue::Missing, DataValue::Missing) => true,
            (DataValue::Number(a), DataValue::Number(b)) => OrderedFloat(*a) == OrderedFloat(*b),
            (DataValue::Text(a), DataValue::Text(b)) => a == b,
            (DataValue::Bool(a), DataValue::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DataValue {}

impl std::hash::Hash for DataValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            DataValue::Missing => {}
            DataValue::Number(n) => OrderedFloat(*n).hash(state),
            DataValue::Text(s) => s.hash(state),
            DataValue::Bool(b) => b.hash(state),
        }
    }
}

impl DataValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, DataValue::Missing)
    }

    /// Returns the numeric payload, or None for anything that is not a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The column type this value belongs to; None for the missing sentinel,
    /// which is valid in a column of any type.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            DataValue::Missing => None,
            DataValue::Number(_) => Some(ColumnType::Number),
            DataValue::Text(_) => Some(ColumnType::Text),
            DataValue::Bool(_) => Some(ColumnType::Bool),
        }
    }

    /// Returns the display form of the value, used when deriving result
    /// column headers.
    pub fn display(&self) -> String {
        match self {
            DataValue::Missing => "(missing)".to_string(),
            DataValue::Number(n) => {
                // Format without unnecessary decimal places
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{:.0}", n)
                } else {
                    format!("{}", n)
                }
            }
            DataValue::Text(s) => s.clone(),
            DataValue::Bool(b) => {
                if *b { "TRUE" } else { "FALSE" }.to_string()
            }
        }
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Number(value)
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::Text(value.to_string())
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Bool(value)
    }
}
