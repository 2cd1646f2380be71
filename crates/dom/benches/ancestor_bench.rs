//! Scan scope resolution benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dom::{common_ancestor, resolve_scope, Document, NodeId};

/// Build a body with `width` sibling chains, each `depth` elements deep
fn wide_tree(width: usize, depth: usize) -> (Document, Vec<NodeId>) {
    let mut doc = Document::new();
    let body = doc.body().unwrap();
    let mut leaves = Vec::with_capacity(width);
    for _ in 0..width {
        let mut parent = body;
        for _ in 0..depth {
            let child = doc.create_element("div");
            doc.append_child(parent, child).unwrap();
            parent = child;
        }
        leaves.push(parent);
    }
    (doc, leaves)
}

fn bench_common_ancestor(c: &mut Criterion) {
    let (doc, leaves) = wide_tree(64, 32);

    c.bench_function("common_ancestor_64_leaves", |b| {
        b.iter(|| black_box(common_ancestor(&doc, black_box(&leaves))));
    });

    c.bench_function("resolve_scope_64_leaves", |b| {
        b.iter(|| black_box(resolve_scope(&doc, black_box(&leaves))));
    });

    let pair = [leaves[0], leaves[0]];
    c.bench_function("common_ancestor_deep_pair", |b| {
        b.iter(|| black_box(common_ancestor(&doc, black_box(&pair))));
    });
}

criterion_group!(benches, bench_common_ancestor);
criterion_main!(benches);
