//! Performance benchmarks for ledger-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ledger_engine::{reconcile, DedupPolicy, Record, Summary, Transaction};

const CATEGORIES: [&str; 4] = ["groceries", "dining", "transport", "salary"];

fn transaction(i: usize) -> Transaction {
    let category = CATEGORIES[i % CATEGORIES.len()];
    if category == "salary" {
        Transaction::income((i % 50) as f64 + 1.0, category)
    } else {
        Transaction::expense((i % 50) as f64 + 1.0, category)
    }
}

fn remote_records(n: usize) -> Vec<Record<Transaction>> {
    (0..n)
        .map(|i| Record::new_remote(format!("r{i}"), i as u64 * 10_000, transaction(i)))
        .collect()
}

fn pending_records(n: usize, offset: u64) -> Vec<Record<Transaction>> {
    (0..n)
        .map(|i| {
            let at = offset + i as u64 * 10_000;
            Record::new_local(format!("local_{at}_{i}"), at, transaction(i))
        })
        .collect()
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile");
    let policy = DedupPolicy::default();

    for size in [10usize, 100, 1000] {
        let remote = remote_records(size);
        let local = remote.clone();
        // Half the pending set duplicates remote writes, half is new
        let mut pending = pending_records(size / 2, 1_000);
        pending.extend(pending_records(size / 2, size as u64 * 10_000));

        group.bench_with_input(BenchmarkId::new("mixed", size), &size, |b, _| {
            b.iter(|| {
                reconcile(
                    black_box(&policy),
                    black_box(&remote),
                    black_box(&local),
                    black_box(&pending),
                )
            })
        });
    }

    group.finish();
}

fn bench_summary(c: &mut Criterion) {
    let records = remote_records(1000);

    c.bench_function("summary_1000", |b| {
        b.iter(|| Summary::of(black_box(&records), black_box(5)))
    });
}

criterion_group!(benches, bench_reconcile, bench_summary);
criterion_main!(benches);
