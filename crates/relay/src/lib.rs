//! Relay: a message-passing dispatch engine for graph neural network layers.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! Relay sub-crates. For most users, adding `relay` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use relay::prelude::*;
//!
//! // Sum of neighbour features, with a fused path for sparse adjacency.
//! struct SumNeighbours;
//! impl MessagePassing for SumNeighbours {
//!     fn name(&self) -> &str { "SumNeighbours" }
//!     fn signatures(&self) -> Vec<Signature> {
//!         vec![
//!             Signature::new(Hook::SparseMessageAndAggregate).param("adj_t").param("x"),
//!             Signature::new(Hook::Message).param("x_j"),
//!         ]
//!     }
//!     fn sparse_message_and_aggregate(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
//!         Ok(relay::scatter::spmm(args.sparse_adj_t()?, args.tensor("x")?, args.node_dim(), Reduce::Sum)?)
//!     }
//!     fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
//!         Ok(args.tensor("x_j")?.clone())
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new(SumNeighbours, DispatchConfig::default()).unwrap();
//! let edges = IndexTensor::edge_index(&[0, 1, 2], &[1, 2, 0]).unwrap();
//! let x = Tensor::from_vec(vec![1.0, 2.0, 3.0]).unwrap();
//! let kwargs = Kwargs::new().with("x", x);
//!
//! // Edge list: gather, message, scatter.
//! let a = dispatcher.propagate(&edges.clone().into(), None, &kwargs).unwrap();
//! // Transposed sparse adjacency: one fused call.
//! let adj_t = SparseTensor::adj_t_from_edge_index(&edges, None, 3).unwrap();
//! let b = dispatcher.propagate(&adj_t.into(), None, &kwargs).unwrap();
//!
//! assert_eq!(a.to_vec().unwrap(), &[3.0, 1.0, 2.0]);
//! assert_eq!(a, b);
//! assert_eq!(dispatcher.resolved_strategy(Representation::SparseAdj), Some(Strategy::Fused));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`tensor`] | `relay-core` | Dense tensors, index tensors, sparse adjacency |
//! | [`scatter`] | `relay-scatter` | Scatter, segment and masked reductions; `spmm` |
//! | [`pass`] | `relay-pass` | Layer trait, dispatcher, format resolution |
//! | [`layers`] | `relay-layers` | Reference layers and graph preprocessing |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Tensor types (`relay-core`).
///
/// [`tensor::Tensor`] for dense `f32` data, [`tensor::IndexTensor`] for
/// edge lists and [`tensor::SparseTensor`] for CSR adjacency.
pub use relay_core as tensor;

/// Reduction primitives (`relay-scatter`).
///
/// [`scatter::scatter`], [`scatter::segment_csr`],
/// [`scatter::masked_reduce`] and [`scatter::spmm`].
pub use relay_scatter as scatter;

/// The dispatch engine (`relay-pass`).
///
/// Implement [`pass::MessagePassing`] and wrap the layer in a
/// [`pass::Dispatcher`].
pub use relay_pass as pass;

/// Reference layers (`relay-layers`).
///
/// [`layers::GraphConv`], [`layers::GcnConv`] and
/// [`layers::NeighborPool`], plus the normalisation helpers in
/// [`layers::utils`].
pub use relay_layers as layers;

/// Common imports for typical Relay usage.
///
/// ```rust
/// use relay::prelude::*;
/// ```
pub mod prelude {
    // Tensors
    pub use relay_core::{IndexTensor, SparseTensor, Tensor, TensorError};

    // Reductions
    pub use relay_scatter::Reduce;

    // Layer authoring
    pub use relay_pass::{Hook, HookArgs, HookError, MessagePassing, Signature};

    // Dispatch
    pub use relay_pass::{
        Aggregation, Connectivity, DispatchConfig, Dispatcher, Flow, Kwargs, Representation,
        Size, Strategy,
    };

    // Errors
    pub use relay_pass::{ConfigError, PropagateError};

    // Layers
    pub use relay_layers::{GcnConv, GraphConv, NeighborPool};
}
