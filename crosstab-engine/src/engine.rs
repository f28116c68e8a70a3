//! FILENAME: crosstab-engine/src/engine.rs
//! The driver - streams rows into grouping trees and produces result columns.
//!
//! Algorithm:
//! 1. Resolve and validate the spec (column bounds, type compatibility)
//!    before any row is read
//! 2. Stream each partition's rows through a private grouping tree
//! 3. Merge partial trees pairwise, always in partition index order
//! 4. Flatten the surviving tree once, single-threaded, into collectors
//!
//! The build phase shares nothing between partitions, so it parallelizes
//! without locks; the fixed merge order is what keeps representative-row
//! selection reproducible across runs.

use std::ops::Range;

use rayon::prelude::*;
use smallvec::SmallVec;

use table::{ColumnType, DataValue, Table, TableBuilder};

use crate::aggregate::RowView;
use crate::definition::{AggregationManager, ColumnIndex, CrosstabSpec, Warnings};
use crate::error::EngineError;
use crate::tree::GroupNode;

// ============================================================================
// PARTITIONING
// ============================================================================

/// How the input row range is split for the parallel build phase.
#[derive(Debug, Clone)]
pub enum Partitioning {
    /// Split `[0, row_count)` into up to `n` near-equal contiguous chunks.
    Chunks(usize),
    /// Explicit half-open row ranges, in merge order.
    Ranges(Vec<Range<usize>>),
}

impl Partitioning {
    /// Resolves to concrete ranges and verifies they cover the input exactly
    /// once: in order, gap-free, overlap-free.
    fn resolve(&self, row_count: usize) -> Result<Vec<Range<usize>>, EngineError> {
        let ranges = match self {
            Partitioning::Chunks(n) => {
                let n = (*n).clamp(1, row_count.max(1));
                let base = row_count / n;
                let remainder = row_count % n;
                let mut ranges = Vec::with_capacity(n);
                let mut start = 0;
                for i in 0..n {
                    let len = base + usize::from(i < remainder);
                    ranges.push(start..start + len);
                    start += len;
                }
                ranges
            }
            Partitioning::Ranges(ranges) => ranges.clone(),
        };

        let mut expected = 0usize;
        for range in &ranges {
            if range.start != expected || range.end < range.start || range.end > row_count {
                return Err(EngineError::InvalidPartitioning(format!(
                    "range {range:?} does not continue the cover at row {expected}"
                )));
            }
            expected = range.end;
        }
        if expected != row_count {
            return Err(EngineError::InvalidPartitioning(format!(
                "ranges end at row {expected}, table has {row_count} rows"
            )));
        }
        Ok(ranges)
    }
}

// ============================================================================
// OUTPUT
// ============================================================================

/// A completed result column: the collector's backing buffer plus its type.
#[derive(Debug, Clone)]
pub struct ResultColumn {
    pub name: String,
    pub column_type: ColumnType,
    pub values: Vec<DataValue>,
}

/// One distinct pivot value's worth of result columns, one per requested
/// aggregation, in request order.
#[derive(Debug)]
pub struct PivotGroup {
    pub pivot_value: DataValue,
    pub columns: Vec<ResultColumn>,
}

/// Counters describing one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub input_rows: usize,
    pub output_rows: usize,
    pub pivot_values: usize,
    pub partitions: usize,
}

/// Everything a run produces.
#[derive(Debug)]
pub struct CrosstabOutput {
    /// Number of output rows — one per distinct group-by tuple.
    pub row_count: usize,

    /// Output row → the first source row observed for that group; used to
    /// recover the group-by columns' display values.
    pub row_mapping: Vec<usize>,

    /// Per distinct pivot value, in the order the flatten pass first met
    /// them.
    pub pivot_groups: Vec<PivotGroup>,

    /// Messages recorded while the run was configured (e.g. a percentile
    /// rank that fell back to its default).
    pub warnings: Vec<String>,

    pub stats: EngineStats,
}

impl CrosstabOutput {
    /// Assembles a result table: the group-by columns' values recovered
    /// through `row_mapping`, then one column per (pivot value, aggregation)
    /// named `"{pivot} - {aggregation}"`.
    pub fn into_table(self, source: &Table, spec: &CrosstabSpec) -> Table {
        let mut builder = TableBuilder::new(self.row_count);
        for &index in &spec.group_columns {
            let column = source.column(index);
            let values = self
                .row_mapping
                .iter()
                .map(|&row| source.value(row, index).clone())
                .collect();
            builder.add_column(column.name.clone(), column.column_type, values);
        }
        for group in self.pivot_groups {
            let pivot_label = group.pivot_value.display();
            for column in group.columns {
                builder.add_column(
                    format!("{} - {}", pivot_label, column.name),
                    column.column_type,
                    column.values,
                );
            }
        }
        builder.build()
    }
}

// ============================================================================
// RUN SETUP
// ============================================================================

/// Everything resolved before the first row is read: validated group and
/// pivot columns, managers with their slot assignments, and the slot →
/// source-column map the row loop reads through.
struct RunSetup {
    group_columns: Vec<ColumnIndex>,
    pivot_column: ColumnIndex,
    managers: Vec<AggregationManager>,
    slot_columns: Vec<ColumnIndex>,
}

impl RunSetup {
    fn prepare(
        source: &Table,
        spec: &CrosstabSpec,
        warnings: &mut Warnings,
    ) -> Result<Self, EngineError> {
        for &index in spec
            .group_columns
            .iter()
            .chain(std::iter::once(&spec.pivot_column))
        {
            if index >= source.column_count() {
                return Err(EngineError::ColumnOutOfBounds {
                    index,
                    column_count: source.column_count(),
                });
            }
        }

        let mut slot_columns = Vec::new();
        let managers = spec
            .aggregations
            .iter()
            .map(|request| {
                AggregationManager::from_request(request, source, &mut slot_columns, warnings)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RunSetup {
            group_columns: spec.group_columns.clone(),
            pivot_column: spec.pivot_column,
            managers,
            slot_columns,
        })
    }

    /// Streams one partition's rows through a private tree. Nothing is
    /// shared, so disjoint ranges may run concurrently.
    fn build_tree(&self, source: &Table, rows: Range<usize>) -> GroupNode {
        let mut root = GroupNode::new();
        for row in rows {
            let mut node = &mut root;
            for &column in &self.group_columns {
                node = node.child_for(source.value(row, column));
            }
            let leaf = node.leaf_for(source.value(row, self.pivot_column), row, || {
                self.managers.iter().map(|m| m.make_function()).collect()
            });

            let slots: SmallVec<[&DataValue; 8]> = self
                .slot_columns
                .iter()
                .map(|&column| source.value(row, column))
                .collect();
            let view = RowView::new(&slots);
            for function in &mut leaf.functions {
                function.accept_row(&view);
            }
        }
        root
    }
}

fn finish(
    tree: GroupNode,
    setup: RunSetup,
    warnings: Warnings,
    input_rows: usize,
    partitions: usize,
) -> CrosstabOutput {
    let row_count = tree.group_count();
    let managers = setup.managers;
    let result = tree.flatten(|| {
        managers
            .iter()
            .map(|manager| manager.make_collector(row_count))
            .collect()
    });
    debug_assert_eq!(result.row_count, row_count);

    let pivot_groups = result
        .groups
        .into_iter()
        .map(|(pivot_value, collectors)| PivotGroup {
            pivot_value,
            columns: collectors
                .into_iter()
                .map(|collector| {
                    let (name, column_type, values) = collector.into_parts();
                    ResultColumn {
                        name,
                        column_type,
                        values,
                    }
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    CrosstabOutput {
        row_count,
        row_mapping: result.row_mapping,
        stats: EngineStats {
            input_rows,
            output_rows: row_count,
            pivot_values: pivot_groups.len(),
            partitions,
        },
        pivot_groups,
        warnings: warnings.into_messages(),
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Runs the full grouping/pivot aggregation in a single streaming pass on
/// the calling thread.
pub fn run(source: &Table, spec: &CrosstabSpec) -> Result<CrosstabOutput, EngineError> {
    let mut warnings = Warnings::default();
    let setup = RunSetup::prepare(source, spec, &mut warnings)?;
    let tree = setup.build_tree(source, 0..source.row_count());
    Ok(finish(tree, setup, warnings, source.row_count(), 1))
}

/// Parallel variant: builds one tree per partition, merges them in partition
/// index order, then flattens on the calling thread.
///
/// Aggregate values and the output row count are independent of the
/// partitioning; the representative source rows (and with them the output
/// row order) are reproducible for a fixed partitioning because the merge
/// order is fixed.
pub fn run_partitioned(
    source: &Table,
    spec: &CrosstabSpec,
    partitioning: &Partitioning,
) -> Result<CrosstabOutput, EngineError> {
    let mut warnings = Warnings::default();
    let setup = RunSetup::prepare(source, spec, &mut warnings)?;
    let ranges = partitioning.resolve(source.row_count())?;
    let partitions = ranges.len();

    let trees: Vec<GroupNode> = ranges
        .into_par_iter()
        .map(|range| setup.build_tree(source, range))
        .collect();

    let mut merged = GroupNode::new();
    for tree in trees {
        merged.merge(tree);
    }
    Ok(finish(merged, setup, warnings, source.row_count(), partitions))
}
