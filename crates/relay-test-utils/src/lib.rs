//! Test utilities for Relay development.
//!
//! Provides fixture layers ([`fixtures`]) covering each hook combination
//! the dispatcher distinguishes, and seeded graph and feature generators
//! for building test scenarios.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use relay_core::{IndexTensor, SparseTensor, Tensor};

/// Directed 3-cycle `0 → 1 → 2 → 0`.
pub fn triangle() -> IndexTensor {
    edge_list(&[0, 1, 2], &[1, 2, 0])
}

/// Edge list from `source` and `target` ids.
///
/// # Panics
///
/// If the rows differ in length.
pub fn edge_list(source: &[i64], target: &[i64]) -> IndexTensor {
    IndexTensor::edge_index(source, target).expect("source and target rows must match")
}

/// Deterministic random edge list over `num_nodes` nodes.
///
/// Multi-edges and self-loops are allowed.
pub fn random_edge_list(seed: u64, num_nodes: usize, num_edges: usize) -> IndexTensor {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = num_nodes as i64;
    let source: Vec<i64> = (0..num_edges).map(|_| rng.random_range(0..n)).collect();
    let target: Vec<i64> = (0..num_edges).map(|_| rng.random_range(0..n)).collect();
    edge_list(&source, &target)
}

/// Deterministic `[num_nodes, channels]` features in `[-1, 1)`.
pub fn random_features(seed: u64, num_nodes: usize, channels: usize) -> Tensor {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data = (0..num_nodes * channels)
        .map(|_| rng.random_range(-1.0f32..1.0))
        .collect();
    Tensor::new(&[num_nodes, channels], data).expect("length matches shape")
}

/// Transposed sparse adjacency of an edge list (row = target).
pub fn adj_t(edge_index: &IndexTensor, num_nodes: usize) -> SparseTensor {
    SparseTensor::adj_t_from_edge_index(edge_index, None, num_nodes)
        .expect("edge list ids must be below num_nodes")
}

/// Dense `[num_nodes, num_nodes]` adjacency in `adj_t` orientation.
/// Parallel edges accumulate.
pub fn dense_adj_t(edge_index: &IndexTensor, num_nodes: usize) -> Tensor {
    adj_t(edge_index, num_nodes)
        .to_dense()
        .expect("dense size fits the backend")
}
