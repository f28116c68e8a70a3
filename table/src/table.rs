//! FILENAME: table/src/table.rs
//! Columnar table storage and the result-table builder.
//!
//! A `Table` is a set of equally long, named, typed columns. Rows are
//! addressed by index; the engine streams them as `(row, column)` lookups.
//! `TableBuilder` is the write-side counterpart: it accepts completed column
//! buffers (for result tables, those come straight out of aggregation
//! collectors) and assembles a `Table`.

use serde::{Deserialize, Serialize};

use crate::value::{ColumnType, DataValue};

/// A named, typed column of values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    values: Vec<DataValue>,
}

impl Column {
    /// Creates a column. Every value must be of `column_type` or `Missing`;
    /// handing in anything else is a caller bug.
    pub fn new(name: impl Into<String>, column_type: ColumnType, values: Vec<DataValue>) -> Self {
        debug_assert!(
            values
                .iter()
                .all(|v| v.column_type().map_or(true, |t| t == column_type)),
            "column value does not match the declared column type"
        );
        Column {
            name: name.into(),
            column_type,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, row: usize) -> &DataValue {
        &self.values[row]
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }
}

/// An immutable columnar table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Builds a table from pre-assembled columns. All columns must be the
    /// same length; a mismatch is a caller bug, not recoverable input.
    pub fn new(columns: Vec<Column>) -> Self {
        let row_count = columns.first().map_or(0, Column::len);
        assert!(
            columns.iter().all(|c| c.len() == row_count),
            "all table columns must have the same length"
        );
        Table { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> &Column {
        &self.columns[index]
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Looks up a column by index, for validation paths that must not panic.
    pub fn get_column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn value(&self, row: usize, column: usize) -> &DataValue {
        self.columns[column].value(row)
    }
}

/// Assembles a table column by column, for a fixed row count known up front.
///
/// This is the sink side of the engine contract: each call hands over a
/// completed backing buffer plus the computed result type.
#[derive(Debug)]
pub struct TableBuilder {
    row_count: usize,
    columns: Vec<Column>,
}

impl TableBuilder {
    pub fn new(row_count: usize) -> Self {
        TableBuilder {
            row_count,
            columns: Vec::new(),
        }
    }

    /// Adds a completed column buffer. The buffer length must equal the
    /// builder's row count; a mismatch is a caller bug.
    pub fn add_column(
        &mut self,
        name: impl Into<String>,
        column_type: ColumnType,
        values: Vec<DataValue>,
    ) -> &mut Self {
        assert_eq!(
            values.len(),
            self.row_count,
            "column buffer length must equal the output row count"
        );
        self.columns.push(Column::new(name, column_type, values));
        self
    }

    pub fn build(self) -> Table {
        Table {
            row_count: self.row_count,
            columns: self.columns,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_table() -> Table {
        Table::new(vec![
            Column::new(
                "region",
                ColumnType::Text,
                vec!["North".into(), "South".into()],
            ),
            Column::new(
                "sales",
                ColumnType::Number,
                vec![100.0.into(), DataValue::Missing],
            ),
        ])
    }

    #[test]
    fn test_row_and_column_access() {
        let table = create_test_table();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.value(0, 0), &DataValue::Text("North".to_string()));
        assert_eq!(table.value(1, 1), &DataValue::Missing);
        assert_eq!(table.column(1).name, "sales");
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn test_unequal_column_lengths_panic() {
        Table::new(vec![
            Column::new("a", ColumnType::Number, vec![1.0.into()]),
            Column::new("b", ColumnType::Number, vec![1.0.into(), 2.0.into()]),
        ]);
    }

    #[test]
    fn test_builder_assembles_table() {
        let mut builder = TableBuilder::new(2);
        builder.add_column(
            "total",
            ColumnType::Number,
            vec![10.0.into(), DataValue::Missing],
        );
        let table = builder.build();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column(0).name, "total");
        assert_eq!(table.value(0, 0), &DataValue::Number(10.0));
    }

    #[test]
    #[should_panic(expected = "output row count")]
    fn test_builder_rejects_short_buffer() {
        let mut builder = TableBuilder::new(3);
        builder.add_column("total", ColumnType::Number, vec![10.0.into()]);
    }

    #[test]
    fn test_empty_table() {
        let table = Table::new(Vec::new());
        assert_eq!(table.row_count(), 0);
        assert_eq!(table.column_count(), 0);
    }
}
