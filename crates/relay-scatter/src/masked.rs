//! Masked reduction over a padded neighbourhood axis.

use candle_core::Device;
use relay_core::{Tensor, TensorError};

use crate::reduce::{inverse_counts, Maxima, Reduce};

/// Reduce `src` over `axis`, skipping entries whose mask bit is `false`.
///
/// `src` holds padded neighbourhoods: axis `axis - 1` indexes rows and
/// `axis` indexes the padded neighbour slots of each row. `mask` is the
/// row-major `[rows, slots]` validity mask. The output drops `axis`; rows
/// with no valid slot reduce to 0.
pub fn masked_reduce(
    src: &Tensor,
    mask: &[bool],
    axis: usize,
    reduce: Reduce,
) -> Result<Tensor, TensorError> {
    if axis == 0 {
        return Err(TensorError::InvalidShape {
            reason: "masked reduction needs a row axis before the slot axis".into(),
        });
    }
    let slots = src.dim(axis)?;
    let rows = src.dim(axis - 1)?;
    if mask.len() != rows * slots {
        return Err(TensorError::ShapeMismatch {
            expected: vec![rows, slots],
            actual: vec![mask.len()],
        });
    }

    match reduce {
        Reduce::Sum => masked_sum(src, mask, axis, rows, slots),
        Reduce::Mean => {
            let counts: Vec<usize> = mask
                .chunks(slots.max(1))
                .map(|row| row.iter().filter(|&&m| m).count())
                .collect();
            masked_sum(src, mask, axis, rows, slots)?
                .scale_along(axis - 1, &inverse_counts(&counts))
        }
        Reduce::Max => masked_max(src, mask, axis, rows),
    }
}

fn masked_sum(
    src: &Tensor,
    mask: &[bool],
    axis: usize,
    rows: usize,
    slots: usize,
) -> Result<Tensor, TensorError> {
    if src.numel() == 0 {
        let mut reduced = src.shape().to_vec();
        reduced.remove(axis);
        return Tensor::zeros(&reduced);
    }
    let mut shape = vec![1usize; src.rank()];
    shape[axis - 1] = rows;
    shape[axis] = slots;
    let weights: Vec<f32> = mask.iter().map(|&m| if m { 1.0 } else { 0.0 }).collect();
    let weights = candle_core::Tensor::from_vec(weights, shape, &Device::Cpu)?;
    let summed = src.as_candle().broadcast_mul(&weights)?.sum(axis)?;
    Tensor::from_candle(summed)
}

fn masked_max(src: &Tensor, mask: &[bool], axis: usize, rows: usize) -> Result<Tensor, TensorError> {
    let layout = src.layout(axis)?;
    let data = src.to_vec()?;
    let mut acc = Maxima::new(layout.outer * layout.inner);
    for o in 0..layout.outer {
        let r = o % rows;
        for k in 0..layout.len {
            if !mask[r * layout.len + k] {
                continue;
            }
            let from = layout.offset(o, k, 0);
            for n in 0..layout.inner {
                acc.push(o * layout.inner + n, data[from + n]);
            }
        }
    }
    let mut shape = src.shape().to_vec();
    shape.remove(axis);
    Tensor::new(&shape, acc.finish())
}
