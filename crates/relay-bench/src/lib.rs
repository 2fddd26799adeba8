//! Benchmark profiles for the Relay message-passing engine.
//!
//! - [`reference_graph`]: 10K nodes, average in-degree 8, 32 channels
//! - [`stress_graph`]: 100K nodes, average in-degree 16, 32 channels
//! - [`Profile::connectivity`]: the same graph in each representation

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use relay_core::{IndexTensor, SparseTensor, Tensor, TensorError};
use relay_pass::{Connectivity, Kwargs, Representation};
use relay_test_utils::{adj_t, random_edge_list, random_features};

/// A random graph with node features.
pub struct Profile {
    /// Node count.
    pub num_nodes: usize,
    /// Edge list.
    pub edge_index: IndexTensor,
    /// `adj_t` of the edge list.
    pub adj_t: SparseTensor,
    /// `[num_nodes, channels]` features.
    pub x: Tensor,
}

impl Profile {
    /// Build a profile with `num_nodes * avg_degree` edges.
    pub fn new(seed: u64, num_nodes: usize, avg_degree: usize, channels: usize) -> Self {
        let edge_index = random_edge_list(seed, num_nodes, num_nodes * avg_degree);
        let adj_t = adj_t(&edge_index, num_nodes);
        Self {
            num_nodes,
            edge_index,
            adj_t,
            x: random_features(seed ^ 0x5eed, num_nodes, channels),
        }
    }

    /// The graph in representation `repr`.
    ///
    /// Dense matrices hold `num_nodes²` entries; keep `num_nodes` small.
    pub fn connectivity(&self, repr: Representation) -> Result<Connectivity, TensorError> {
        Ok(match repr {
            Representation::EdgeIndex => self.edge_index.clone().into(),
            Representation::SparseAdj => self.adj_t.clone().into(),
            Representation::DenseAdj => self.adj_t.to_dense()?.into(),
        })
    }

    /// `x` as propagation arguments.
    pub fn kwargs(&self) -> Kwargs {
        Kwargs::new().with("x", self.x.clone())
    }
}

/// 10K nodes, average in-degree 8, 32 channels.
pub fn reference_graph(seed: u64) -> Profile {
    Profile::new(seed, 10_000, 8, 32)
}

/// 100K nodes, average in-degree 16, 32 channels.
pub fn stress_graph(seed: u64) -> Profile {
    Profile::new(seed, 100_000, 16, 32)
}
