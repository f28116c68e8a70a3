//! FILENAME: crosstab-engine/src/lib.rs
//! Grouping and pivot aggregation engine.
//!
//! Given a column-typed table, a list of group-by columns, a pivot column
//! and a list of requested aggregations, computes one output row per
//! distinct group-by tuple and, within it, one aggregated value per distinct
//! pivot value — in a single streaming pass, with an optional partitioned
//! build that merges partial results in a fixed, reproducible order.
//!
//! Layers:
//! - `definition`: serializable configuration (what a run IS)
//! - `aggregate`: streaming accumulators and the selection algorithm
//! - `tree`: the grouping tree (build, merge, flatten)
//! - `engine`: the driver (run / run_partitioned)

pub mod aggregate;
pub mod definition;
pub mod engine;
pub mod error;
pub mod tree;

pub use aggregate::{
    quick_nth, quick_nth_weighted, AggregationCollector, AggregationFunction, NumericAggregator,
    RowView, WeightedValue,
};
pub use definition::{
    AggregationKind, AggregationManager, AggregationRequest, ColumnIndex, CrosstabSpec, Warnings,
    DEFAULT_PERCENTILE_RANK,
};
pub use engine::{
    run, run_partitioned, CrosstabOutput, EngineStats, Partitioning, PivotGroup, ResultColumn,
};
pub use error::EngineError;
pub use tree::{FlattenResult, GroupNode, Leaf};
