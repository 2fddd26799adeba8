//! Reference message-passing layers for the Relay dispatch engine.
//!
//! Each layer wraps a [`Dispatcher`](relay_pass::Dispatcher) over its own
//! hook set and applies its dense projection outside propagation:
//!
//! - [`GraphConv`]: root plus neighbour projection; fused sparse and
//!   message paths.
//! - [`GcnConv`]: symmetric-normalised convolution; fused sparse, fused
//!   dense and message paths.
//! - [`NeighborPool`]: parameter-free pooling; message and partial paths.
//!
//! [`utils`] holds the graph preprocessing they share.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod gcn_conv;
pub mod graph_conv;
mod linear;
pub mod pool;
pub mod utils;

pub use gcn_conv::{GcnConv, GcnHooks};
pub use graph_conv::{GraphConv, GraphConvHooks};
pub use pool::{NeighborPool, PoolHooks};
pub use utils::{add_self_loops, degree, gcn_norm, gcn_norm_dense, gcn_norm_sparse};
