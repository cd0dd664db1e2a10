// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use understory_node_tree::{LeafData, NodeId, Tree};
use understory_selection::selection::{Selection, top_level};

/// A chain of `depth` nested groups under a root, with one leaf at the bottom
/// and one leaf after the chain.
fn gen_deep(depth: usize) -> (Tree, NodeId, NodeId, NodeId) {
    let mut tree = Tree::new();
    let root = tree.create_group("root");
    let mut parent = root;
    for i in 0..depth {
        let g = tree.create_group(format!("g{i}"));
        tree.add(parent, &[g]).expect("fixture");
        parent = g;
    }
    let bottom = tree.create_leaf("bottom", LeafData::default());
    tree.add(parent, &[bottom]).expect("fixture");
    let tail = tree.create_leaf("tail", LeafData::default());
    tree.add(root, &[tail]).expect("fixture");
    (tree, root, bottom, tail)
}

/// A root with `n` groups of 8 leaves each.
fn gen_wide(n: usize) -> (Tree, NodeId, Vec<NodeId>) {
    let mut tree = Tree::new();
    let root = tree.create_group("root");
    let mut leaves = Vec::with_capacity(n * 8);
    for i in 0..n {
        let g = tree.create_group(format!("g{i}"));
        tree.add(root, &[g]).expect("fixture");
        let batch: Vec<NodeId> = (0..8)
            .map(|j| tree.create_leaf(format!("l{i}.{j}"), LeafData::default()))
            .collect();
        tree.add(g, &batch).expect("fixture");
        leaves.extend(batch);
    }
    (tree, root, leaves)
}

fn bench_nodes_between(c: &mut Criterion) {
    let mut group = c.benchmark_group("nodes_between");
    for &depth in &[100usize, 1_000, 10_000] {
        let (tree, _, bottom, tail) = gen_deep(depth);
        group.throughput(Throughput::Elements(depth as u64));
        group.bench_function(format!("deep_d{depth}"), |b| {
            b.iter(|| black_box(tree.nodes_between(bottom, tail).map(|v| v.len())));
        });
    }
    for &n in &[64usize, 512, 4_096] {
        let (tree, _, leaves) = gen_wide(n);
        let first = leaves[0];
        let last = leaves[leaves.len() - 1];
        group.throughput(Throughput::Elements((n * 9) as u64));
        group.bench_function(format!("wide_n{n}"), |b| {
            b.iter(|| black_box(tree.nodes_between(last, first).map(|v| v.len())));
        });
    }
    group.finish();
}

fn bench_flatten_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("records");
    for &n in &[64usize, 512] {
        let (tree, root, _) = gen_wide(n);
        let records = tree.flatten(root).unwrap_or_default();
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_function(format!("flatten_n{n}"), |b| {
            b.iter(|| black_box(tree.flatten(root).map(|v| v.len())));
        });
        group.bench_function(format!("rebuild_n{n}"), |b| {
            b.iter_batched(
                Tree::new,
                |mut t| {
                    let rebuilt = t.rebuild(&records);
                    black_box(rebuilt.warnings.len());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_visibility(c: &mut Criterion) {
    let mut group = c.benchmark_group("visibility");
    for &n in &[64usize, 512, 4_096] {
        let (mut tree, root, _) = gen_wide(n);
        group.throughput(Throughput::Elements((n * 9) as u64));
        group.bench_function(format!("toggle_root_n{n}"), |b| {
            b.iter(|| {
                let _ = tree.set_visible(root, false);
                let _ = tree.set_visible(root, true);
            });
        });
    }
    group.finish();
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("selection");
    let (tree, root, leaves) = gen_wide(512);
    let groups: Vec<NodeId> = tree.children(root).collect();
    group.bench_function("extend_to_wide_n512", |b| {
        b.iter_batched(
            || {
                let mut sel = Selection::new();
                let _ = sel.select(leaves[0]);
                sel
            },
            |mut sel| {
                let events = sel.extend_to(leaves[leaves.len() - 1], &tree);
                black_box(events.map(|e| e.len()));
            },
            BatchSize::SmallInput,
        );
    });
    let mixed: Vec<NodeId> = groups.iter().copied().chain(leaves.iter().copied()).collect();
    group.bench_function("top_level_wide_n512", |b| {
        b.iter(|| black_box(top_level(&mixed, &tree).len()));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_nodes_between,
    bench_flatten_rebuild,
    bench_visibility,
    bench_selection,
);
criterion_main!(benches);
