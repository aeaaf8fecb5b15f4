//! Query building and in-memory execution benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use elif_record::prelude::*;
use elif_record::sql::select_sql;
use serde_json::json;

struct Shipment;

impl Entity for Shipment {
    fn table_name() -> &'static str {
        "shipments"
    }

    fn columns() -> &'static [&'static str] {
        &["id", "reference", "status", "weight", "carrier_id", "created_at", "updated_at"]
    }

    fn fillable() -> &'static [&'static str] {
        &["reference", "status", "weight", "carrier_id"]
    }
}

fn bench_query_building(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_building");

    group.bench_function("simple_where", |b| {
        b.iter(|| {
            let query = Model::<Shipment>::query()
                .where_eq(black_box("status"), black_box("in_transit"))
                .order_by_desc("created_at")
                .limit(20);
            black_box(query)
        })
    });

    for &conditions in &[1usize, 5, 10, 25] {
        group.bench_with_input(
            BenchmarkId::new("render_sql", conditions),
            &conditions,
            |b, &conditions| {
                b.iter(|| {
                    let query = (0..conditions).fold(Model::<Shipment>::query(), |query, i| {
                        query.where_gt("weight", i as i64)
                    });
                    black_box(select_sql(query.state()))
                })
            },
        );
    }

    group.finish();
}

fn bench_memory_execution(c: &mut Criterion) {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(error) => panic!("failed to start runtime: {error}"),
    };

    let db = Database::new(MemoryAdapter::new());
    runtime.block_on(async {
        let payloads = (0..1_000)
            .map(|i| {
                json!({
                    "reference": format!("SHP-{i:05}"),
                    "status": if i % 4 == 0 { "delivered" } else { "in_transit" },
                    "weight": i % 50,
                    "carrier_id": i % 7
                })
                .as_object()
                .cloned()
                .unwrap_or_default()
            })
            .collect();
        if let Err(error) = Model::<Shipment>::create_many(&db, payloads).await {
            panic!("failed to seed shipments: {error}");
        }
    });

    let mut group = c.benchmark_group("memory_execution");

    group.bench_function("filtered_page", |b| {
        b.to_async(&runtime).iter(|| async {
            let page = Model::<Shipment>::where_eq("status", "in_transit")
                .order_by("weight")
                .paginate(&db, PaginationOptions::new().limit(25).page(3))
                .await;
            black_box(page)
        })
    });

    group.bench_function("grouped_count", |b| {
        b.to_async(&runtime).iter(|| async {
            black_box(Model::<Shipment>::query().group_by("carrier_id").count(&db).await)
        })
    });

    group.finish();
}

criterion_group!(benches, bench_query_building, bench_memory_execution);
criterion_main!(benches);
