//! Deduplication benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use dom::{NodeResult, RuleResult};
use journal::SeenViolations;

fn batch(rules: usize, nodes: usize) -> Vec<RuleResult> {
    (0..rules)
        .map(|r| RuleResult {
            id: format!("rule-{r}"),
            nodes: (0..nodes).map(|n| NodeResult::at(format!("#node-{n}"))).collect(),
            ..RuleResult::default()
        })
        .collect()
}

fn bench_filter(c: &mut Criterion) {
    c.bench_function("filter_fresh_20x50", |b| {
        b.iter_batched(
            || (SeenViolations::new(), batch(20, 50)),
            |(seen, results)| black_box(seen.filter(results)),
            BatchSize::SmallInput,
        );
    });

    // Steady state: every key already reported
    let seen = SeenViolations::new();
    seen.filter(batch(20, 50));
    c.bench_function("filter_repeat_20x50", |b| {
        b.iter_batched(
            || batch(20, 50),
            |results| black_box(seen.filter(results)),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_filter);
criterion_main!(benches);
