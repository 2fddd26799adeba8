//! Sparse-dense matrix product with a configurable reduction.

use relay_core::{SparseTensor, Tensor, TensorError};

use crate::reduce::Reduce;
use crate::segment::segment_csr;

/// Compute `adj ⊗ x` along `dim`.
///
/// Row `r` of the result is the reduction of `value[e] * x[col[e]]` over the
/// entries `e` stored in row `r` of `adj`. Value-less matrices use weight 1.
/// With [`Reduce::Sum`] this is the ordinary product `adj · x`.
///
/// `x` must have `adj.sparse_sizes().1` slices along `dim`; the output has
/// `adj.sparse_sizes().0`.
pub fn spmm(
    adj: &SparseTensor,
    x: &Tensor,
    dim: usize,
    reduce: Reduce,
) -> Result<Tensor, TensorError> {
    let (_, cols) = adj.sparse_sizes();
    let len = x.dim(dim)?;
    if len != cols {
        return Err(TensorError::ShapeMismatch {
            expected: x.shape_with(dim, cols)?.to_vec(),
            actual: x.shape().to_vec(),
        });
    }
    let gathered = x.index_select(dim, adj.col())?;
    let weighted = match adj.value() {
        Some(value) => gathered.scale_along(dim, value)?,
        None => gathered,
    };
    segment_csr(&weighted, adj.rowptr(), dim, reduce)
}
