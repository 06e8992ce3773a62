use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crm_data_sync::processing::{clean, merge_tables, Transform, TransformContext};
use crm_data_sync::types::{Table, Value};

// Every 10th row repeats the previous one and every 7th is a test contact.
fn contacts(rows: usize) -> Table {
    let columns = ["id", "name", "email", "city", "signup_date"]
        .into_iter()
        .map(String::from)
        .collect();
    let mut data = Vec::with_capacity(rows);
    for i in 0..rows {
        let id = if i % 10 == 9 { i as i64 - 1 } else { i as i64 };
        let name = if i % 7 == 0 { "Test Contact".to_string() } else { format!(" name {id} ") };
        data.push(vec![
            Value::Int64(id),
            Value::Utf8(name),
            if i % 3 == 0 { Value::Null } else { Value::Utf8(format!("c{id}@example.com")) },
            Value::Utf8("nan".to_string()),
            Value::Utf8(format!("2025-{:02}-01", id % 12 + 1)),
        ]);
    }
    Table::from_cells(columns, data)
}

fn bench_clean(c: &mut Criterion) {
    let mut group = c.benchmark_group("clean");
    for rows in [1_000usize, 10_000, 100_000] {
        let table = contacts(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &table, |b, t| {
            b.iter(|| clean(black_box(t.clone())))
        });
    }
    group.finish();
}

fn bench_merge_and_transform(c: &mut Criterion) {
    let parts: Vec<Table> = (0..8).map(|_| contacts(5_000)).collect();
    let transforms: Vec<Transform> = ["no-test-data", "recent:180", "dedupe:email"]
        .into_iter()
        .map(|s| s.parse().unwrap())
        .collect();
    let ctx = TransformContext::now();

    c.bench_function("merge_8x5000", |b| b.iter(|| merge_tables(black_box(&parts))));
    c.bench_function("transforms_40000", |b| {
        let merged = merge_tables(&parts);
        b.iter(|| {
            transforms
                .iter()
                .try_fold(merged.clone(), |t, tr| tr.apply(t, &ctx))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_clean, bench_merge_and_transform);
criterion_main!(benches);
