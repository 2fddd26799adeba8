//! Reduction primitives for message aggregation.
//!
//! Two layouts describe how per-edge values are grouped into per-node
//! buckets:
//!
//! - **index-scatter** ([`scatter`]): an explicit group id per item;
//! - **segment-reduce** ([`segment_csr`]): contiguous groups bounded by a
//!   CSR row pointer.
//!
//! Both reduce along an arbitrary axis with [`Reduce::Sum`], [`Reduce::Mean`]
//! or [`Reduce::Max`], and agree for equivalent encodings of the same
//! grouping. Sums and means run on candle's `index_add`; maxima, which
//! candle cannot scatter, run on the host. Empty groups produce zeros. [`masked_reduce`] covers padded
//! neighbourhood tensors and [`spmm`] is the sparse-dense product built from
//! the two primitives.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod masked;
pub mod matmul;
pub mod reduce;
pub mod scatter;
pub mod segment;

pub use masked::masked_reduce;
pub use matmul::spmm;
pub use reduce::Reduce;
pub use scatter::scatter;
pub use segment::{segment_csr, segment_ids};
