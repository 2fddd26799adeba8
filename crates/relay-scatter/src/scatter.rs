//! Index-scatter reduction.

use candle_core::{DType, Device};
use relay_core::{index_vector, Tensor, TensorError};

use crate::reduce::{inverse_counts, Maxima, Reduce};

/// Reduce slices of `src` along `dim` into `dim_size` buckets.
///
/// Slice `k` of `src` (along `dim`) is routed to bucket `index[k]`. The
/// output has the shape of `src` with `dim` resized to `dim_size`. Sum and
/// mean run on candle's `index_add`.
///
/// # Errors
///
/// - [`TensorError::AxisOutOfRange`] if `dim` is not an axis of `src`;
/// - [`TensorError::ShapeMismatch`] if `index.len()` differs from the
///   length of `dim`;
/// - [`TensorError::IndexOutOfBounds`] if a bucket id is `>= dim_size`.
pub fn scatter(
    src: &Tensor,
    index: &[usize],
    dim: usize,
    dim_size: usize,
    reduce: Reduce,
) -> Result<Tensor, TensorError> {
    let len = src.dim(dim)?;
    if index.len() != len {
        return Err(TensorError::ShapeMismatch {
            expected: vec![len],
            actual: vec![index.len()],
        });
    }
    if let Some(&bad) = index.iter().find(|&&g| g >= dim_size) {
        return Err(TensorError::IndexOutOfBounds {
            index: bad,
            bound: dim_size,
        });
    }

    match reduce {
        Reduce::Sum => scatter_sum(src, index, dim, dim_size),
        Reduce::Mean => {
            let mut counts = vec![0usize; dim_size];
            for &g in index {
                counts[g] += 1;
            }
            scatter_sum(src, index, dim, dim_size)?.scale_along(dim, &inverse_counts(&counts))
        }
        Reduce::Max => scatter_max(src, index, dim, dim_size),
    }
}

fn scatter_sum(
    src: &Tensor,
    index: &[usize],
    dim: usize,
    dim_size: usize,
) -> Result<Tensor, TensorError> {
    let zeros = candle_core::Tensor::zeros(
        src.shape_with(dim, dim_size)?.as_slice(),
        DType::F32,
        &Device::Cpu,
    )?;
    if index.is_empty() {
        return Tensor::from_candle(zeros);
    }
    let out = zeros.index_add(&index_vector(index)?, &src.as_candle().contiguous()?, dim)?;
    Tensor::from_candle(out)
}

fn scatter_max(
    src: &Tensor,
    index: &[usize],
    dim: usize,
    dim_size: usize,
) -> Result<Tensor, TensorError> {
    let layout = src.layout(dim)?;
    let data = src.to_vec()?;
    let mut acc = Maxima::new(layout.outer * dim_size * layout.inner);
    for o in 0..layout.outer {
        for (k, &g) in index.iter().enumerate() {
            let from = layout.offset(o, k, 0);
            let to = (o * dim_size + g) * layout.inner;
            for n in 0..layout.inner {
                acc.push(to + n, data[from + n]);
            }
        }
    }
    Tensor::new(&src.shape_with(dim, dim_size)?, acc.finish())
}
