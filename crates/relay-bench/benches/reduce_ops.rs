//! Criterion micro-benchmarks for the reduction primitives.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use relay_bench::reference_graph;
use relay_scatter::{scatter, segment_csr, spmm, Reduce};

/// Benchmark: scatter-sum 80K gathered messages into 10K nodes.
fn bench_scatter_sum_80k(c: &mut Criterion) {
    let p = reference_graph(42);
    let source = p.edge_index.row_as_usize(0).unwrap();
    let target = p.edge_index.row_as_usize(1).unwrap();
    let messages = p.x.index_select(0, &source).unwrap();

    c.bench_function("scatter_sum_80k", |b| {
        b.iter(|| {
            let out = scatter(&messages, &target, 0, p.num_nodes, Reduce::Sum).unwrap();
            black_box(&out);
        });
    });
}

/// Benchmark: the same reduction over CSR segments.
fn bench_segment_sum_80k(c: &mut Criterion) {
    let p = reference_graph(42);
    let messages = p.x.index_select(0, p.adj_t.col()).unwrap();

    c.bench_function("segment_sum_80k", |b| {
        b.iter(|| {
            let out = segment_csr(&messages, p.adj_t.rowptr(), 0, Reduce::Sum).unwrap();
            black_box(&out);
        });
    });
}

/// Benchmark: sparse-dense max product over the 10K-node graph.
fn bench_spmm_max_10k(c: &mut Criterion) {
    let p = reference_graph(42);

    c.bench_function("spmm_max_10k", |b| {
        b.iter(|| {
            let out = spmm(&p.adj_t, &p.x, 0, Reduce::Max).unwrap();
            black_box(&out);
        });
    });
}

criterion_group!(
    benches,
    bench_scatter_sum_80k,
    bench_segment_sum_80k,
    bench_spmm_max_10k
);
criterion_main!(benches);
