//! Core numeric types for the Relay message-passing engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! values that flow through a propagation call: dense [`Tensor`]s of `f32`
//! (backed by `candle-core` on the CPU),
//! integer [`IndexTensor`]s (edge lists), CSR-ordered [`SparseTensor`]
//! adjacency matrices, and the shared [`TensorError`] type.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod index;
pub mod sparse;
pub mod tensor;

pub use error::TensorError;
pub use index::IndexTensor;
pub use sparse::SparseTensor;
pub use tensor::{index_vector, AxisLayout, Shape, Tensor};
