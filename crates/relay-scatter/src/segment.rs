//! Segment reduction over CSR row pointers.

use relay_core::{Tensor, TensorError};

use crate::reduce::Reduce;
use crate::scatter::scatter;

/// Check that `ptr` is a valid row pointer over `len` items.
///
/// A valid pointer is non-empty, starts at 0, never decreases, and ends at
/// `len`. Segment `s` covers items `ptr[s]..ptr[s + 1]`.
pub fn validate_ptr(ptr: &[usize], len: usize) -> Result<(), TensorError> {
    match (ptr.first(), ptr.last()) {
        (Some(&0), Some(&last)) if last == len => {}
        (None, _) => {
            return Err(TensorError::InvalidPointer {
                reason: "row pointer is empty".into(),
            })
        }
        _ => {
            return Err(TensorError::InvalidPointer {
                reason: format!("row pointer must span 0..{len}, got {ptr:?}"),
            })
        }
    }
    if ptr.windows(2).any(|w| w[1] < w[0]) {
        return Err(TensorError::InvalidPointer {
            reason: "row pointer decreases".into(),
        });
    }
    Ok(())
}

/// Reduce contiguous segments of `src` along `dim`.
///
/// The output has the shape of `src` with `dim` resized to `ptr.len() - 1`.
/// The pointer is expanded to one segment id per item and routed through
/// [`scatter`], so both layouts produce identical values.
pub fn segment_csr(
    src: &Tensor,
    ptr: &[usize],
    dim: usize,
    reduce: Reduce,
) -> Result<Tensor, TensorError> {
    let len = src.dim(dim)?;
    validate_ptr(ptr, len)?;
    scatter(src, &segment_ids(ptr), dim, ptr.len() - 1, reduce)
}

/// Segment id of every item covered by a valid row pointer.
pub fn segment_ids(ptr: &[usize]) -> Vec<usize> {
    ptr.windows(2)
        .enumerate()
        .flat_map(|(s, bounds)| std::iter::repeat_n(s, bounds[1] - bounds[0]))
        .collect()
}
