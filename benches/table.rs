//! Benchmarks for rule table evaluation.
//!
//! Run with: cargo bench --bench table

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tcpgated::firewall::{RuleTable, Verdict};

fn table_with_rules(n: usize) -> RuleTable {
    let mut table = RuleTable::new();
    for i in 0..n {
        table.add(&format!("10.0.{}.{}", i / 256, i % 256), 8080, Verdict::Allow);
    }
    table
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("table/evaluate");

    // Query matching the first rule
    group.bench_function("first_hit", |b| {
        let table = table_with_rules(1000);
        b.iter(|| black_box(table.evaluate("10.0.0.0", 8080)))
    });

    // Query matching the last rule of a large table
    group.bench_function("deep_hit", |b| {
        let table = table_with_rules(1000);
        b.iter(|| black_box(table.evaluate("10.0.3.231", 8080)))
    });

    // Query matching nothing (default deny)
    group.bench_function("miss", |b| {
        let table = table_with_rules(1000);
        b.iter(|| black_box(table.evaluate("192.0.2.1", 443)))
    });

    group.finish();
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
