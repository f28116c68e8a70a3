//! FILENAME: crosstab-engine/benches/group_aggregate.rs
//! Benchmarks for the streaming build + flatten path, single-threaded and
//! partitioned.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use crosstab_engine::{
    run, run_partitioned, AggregationKind, AggregationRequest, CrosstabSpec, Partitioning,
};
use table::{Column, ColumnType, DataValue, Table};

const REGIONS: [&str; 8] = [
    "North", "South", "East", "West", "Centre", "Coast", "Inland", "Islands",
];
const PRODUCTS: [&str; 12] = [
    "Apples", "Oranges", "Pears", "Plums", "Grapes", "Cherries", "Lemons", "Limes", "Kiwis",
    "Mangoes", "Melons", "Figs",
];

/// Deterministic synthetic sales data: cycling keys, wave-shaped values.
fn build_table(rows: usize) -> Table {
    let mut regions = Vec::with_capacity(rows);
    let mut products = Vec::with_capacity(rows);
    let mut sales = Vec::with_capacity(rows);
    for i in 0..rows {
        regions.push(DataValue::Text(REGIONS[i % REGIONS.len()].to_string()));
        products.push(DataValue::Text(PRODUCTS[(i / 3) % PRODUCTS.len()].to_string()));
        sales.push(DataValue::Number(((i % 997) as f64) * 0.5 + 1.0));
    }
    Table::new(vec![
        Column::new("region", ColumnType::Text, regions),
        Column::new("product", ColumnType::Text, products),
        Column::new("sales", ColumnType::Number, sales),
    ])
}

fn bench_group_aggregate(c: &mut Criterion) {
    let table = build_table(100_000);
    let spec = CrosstabSpec::new(
        vec![0],
        1,
        vec![
            AggregationRequest::new(2, AggregationKind::Sum),
            AggregationRequest::new(2, AggregationKind::Average),
            AggregationRequest::new(2, AggregationKind::Median),
        ],
    );

    c.bench_function("run_100k_rows", |b| {
        b.iter(|| run(black_box(&table), black_box(&spec)).unwrap())
    });

    c.bench_function("run_partitioned_100k_rows_8_chunks", |b| {
        b.iter(|| {
            run_partitioned(black_box(&table), black_box(&spec), &Partitioning::Chunks(8)).unwrap()
        })
    });
}

criterion_group!(benches, bench_group_aggregate);
criterion_main!(benches);
