//! FILENAME: crosstab-engine/src/definition.rs
//! Run configuration - the serializable description of one crosstab run.
//!
//! This module contains the types that DESCRIBE a run, plus the immutable
//! per-aggregation `AggregationManager` resolved from them. These structures
//! are designed to be:
//! - Serializable (for saving/loading analysis documents)
//! - Validated once, before any row is streamed
//! - Immutable snapshots of caller intent

use serde::{Deserialize, Serialize};

use table::{ColumnType, Table};

use crate::aggregate::{AggregationCollector, AggregationFunction, NumericAggregator};
use crate::error::EngineError;

/// Index into the source table's columns (0-based).
pub type ColumnIndex = usize;

/// Rank applied when a percentile request carries no parameter, or an
/// out-of-range one.
pub const DEFAULT_PERCENTILE_RANK: f64 = 75.0;

// ============================================================================
// AGGREGATION KINDS
// ============================================================================

/// Supported aggregation functions for value columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationKind {
    Count,
    Sum,
    Product,
    Min,
    Max,
    Average,
    Variance,
    StdDev,
    Median,
    WeightedMedian,
    Percentile,
    LeastFrequent,
    MostFrequent,
}

impl AggregationKind {
    /// Short display name, used in result column headers and error messages.
    pub fn label(&self) -> &'static str {
        match self {
            AggregationKind::Count => "Count",
            AggregationKind::Sum => "Sum",
            AggregationKind::Product => "Product",
            AggregationKind::Min => "Min",
            AggregationKind::Max => "Max",
            AggregationKind::Average => "Average",
            AggregationKind::Variance => "Variance",
            AggregationKind::StdDev => "StdDev",
            AggregationKind::Median => "Median",
            AggregationKind::WeightedMedian => "WeightedMedian",
            AggregationKind::Percentile => "Percentile",
            AggregationKind::LeastFrequent => "LeastFrequent",
            AggregationKind::MostFrequent => "MostFrequent",
        }
    }

    /// Type compatibility check, run once before streaming begins.
    /// Returns the result column type, or None when `input` cannot feed this
    /// aggregation. `Count` is the one kind that accepts any column type.
    pub fn check_column_type(&self, input: ColumnType) -> Option<ColumnType> {
        match self {
            AggregationKind::Count => Some(ColumnType::Number),
            _ => (input == ColumnType::Number).then_some(ColumnType::Number),
        }
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

/// One requested aggregation: which column, which function, and the optional
/// extras some kinds take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationRequest {
    /// Source column the aggregation reads.
    pub column: ColumnIndex,

    /// The aggregation function to apply.
    pub kind: AggregationKind,

    /// Percentile rank in `(0, 100]`. Ignored by every other kind.
    #[serde(default)]
    pub parameter: Option<f64>,

    /// Weight column for `WeightedMedian`. Ignored by every other kind.
    #[serde(default)]
    pub weight_column: Option<ColumnIndex>,
}

impl AggregationRequest {
    pub fn new(column: ColumnIndex, kind: AggregationKind) -> Self {
        AggregationRequest {
            column,
            kind,
            parameter: None,
            weight_column: None,
        }
    }

    pub fn with_parameter(mut self, parameter: f64) -> Self {
        self.parameter = Some(parameter);
        self
    }

    pub fn with_weight_column(mut self, weight_column: ColumnIndex) -> Self {
        self.weight_column = Some(weight_column);
        self
    }
}

/// The full description of one run: the group-by columns (outermost first),
/// the pivot column, and the requested aggregations in output order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosstabSpec {
    pub group_columns: Vec<ColumnIndex>,
    pub pivot_column: ColumnIndex,
    pub aggregations: Vec<AggregationRequest>,
}

impl CrosstabSpec {
    pub fn new(
        group_columns: Vec<ColumnIndex>,
        pivot_column: ColumnIndex,
        aggregations: Vec<AggregationRequest>,
    ) -> Self {
        CrosstabSpec {
            group_columns,
            pivot_column,
            aggregations,
        }
    }
}

// ============================================================================
// WARNINGS
// ============================================================================

/// Collects human-readable warnings raised while a run is configured.
///
/// Passed explicitly so the engine stays free of global state; everything
/// recorded here is also emitted through `log::warn!`.
#[derive(Debug, Default)]
pub struct Warnings {
    messages: Vec<String>,
}

impl Warnings {
    pub fn record(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{message}");
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<String> {
        self.messages
    }
}

// ============================================================================
// MANAGER
// ============================================================================

/// Immutable per-run configuration for one requested aggregation.
///
/// Built once from an [`AggregationRequest`] before streaming begins. The
/// manager validates type compatibility, owns the slot index its column
/// occupies in the row-reading view, and manufactures the per-leaf
/// [`AggregationFunction`]s and the output-sized collectors.
#[derive(Debug, Clone)]
pub struct AggregationManager {
    column: ColumnIndex,
    column_name: String,
    kind: AggregationKind,
    parameter: f64,
    input_slot: usize,
    weight_slot: Option<usize>,
    result_type: ColumnType,
}

impl AggregationManager {
    /// Resolves a request against the source table, claiming the row-view
    /// slots the driver will fill for it. `slot_columns` maps each claimed
    /// slot back to its source column; this manager appends its own entries.
    ///
    /// Fails fast on bad column indices and incompatible column types. An
    /// out-of-range percentile rank is not fatal: it degrades to
    /// [`DEFAULT_PERCENTILE_RANK`] with a recorded warning.
    pub fn from_request(
        request: &AggregationRequest,
        source: &Table,
        slot_columns: &mut Vec<ColumnIndex>,
        warnings: &mut Warnings,
    ) -> Result<Self, EngineError> {
        let column = source
            .get_column(request.column)
            .ok_or(EngineError::ColumnOutOfBounds {
                index: request.column,
                column_count: source.column_count(),
            })?;

        let result_type = request.kind.check_column_type(column.column_type).ok_or(
            EngineError::IncompatibleColumnType {
                kind: request.kind.label(),
                column: column.name.clone(),
                column_type: column.column_type,
            },
        )?;

        let parameter = match request.kind {
            AggregationKind::Percentile => match request.parameter {
                None => DEFAULT_PERCENTILE_RANK,
                Some(rank) if rank.is_finite() && rank > 0.0 && rank <= 100.0 => rank,
                Some(rank) => {
                    warnings.record(format!(
                        "percentile rank {rank} for column '{}' is outside (0, 100]; \
                         falling back to {DEFAULT_PERCENTILE_RANK}",
                        column.name
                    ));
                    DEFAULT_PERCENTILE_RANK
                }
            },
            _ => 0.0,
        };

        let input_slot = slot_columns.len();
        slot_columns.push(request.column);

        let weight_slot = match request.kind {
            AggregationKind::WeightedMedian => {
                let weight_index = request
                    .weight_column
                    .ok_or_else(|| EngineError::MissingWeightColumn(column.name.clone()))?;
                let weight = source.get_column(weight_index).ok_or(
                    EngineError::ColumnOutOfBounds {
                        index: weight_index,
                        column_count: source.column_count(),
                    },
                )?;
                if weight.column_type != ColumnType::Number {
                    return Err(EngineError::NonNumericWeightColumn {
                        column: weight.name.clone(),
                        column_type: weight.column_type,
                    });
                }
                let slot = slot_columns.len();
                slot_columns.push(weight_index);
                Some(slot)
            }
            _ => None,
        };

        Ok(AggregationManager {
            column: request.column,
            column_name: column.name.clone(),
            kind: request.kind,
            parameter,
            input_slot,
            weight_slot,
            result_type,
        })
    }

    pub fn column(&self) -> ColumnIndex {
        self.column
    }

    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    pub fn result_type(&self) -> ColumnType {
        self.result_type
    }

    /// Display name of the result column, e.g. `Sum(price)` or `P75(price)`.
    pub fn result_name(&self) -> String {
        match self.kind {
            AggregationKind::Percentile => {
                if self.parameter.fract() == 0.0 {
                    format!("P{:.0}({})", self.parameter, self.column_name)
                } else {
                    format!("P{}({})", self.parameter, self.column_name)
                }
            }
            kind => format!("{}({})", kind.label(), self.column_name),
        }
    }

    /// Manufactures a fresh accumulator bundle for one (group, pivot) cell.
    pub fn make_function(&self) -> AggregationFunction {
        AggregationFunction::new(
            self.input_slot,
            self.weight_slot,
            NumericAggregator::new(self.kind, self.parameter),
        )
    }

    /// Manufactures the write sink for this aggregation's result column,
    /// sized to the final output row count.
    pub fn make_collector(&self, row_count: usize) -> AggregationCollector {
        AggregationCollector::new(self.result_name(), self.result_type, row_count)
    }
}
