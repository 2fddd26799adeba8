//! Reference aggregators, the default bodies of
//! [`MessagePassing::aggregate`](crate::MessagePassing::aggregate) and
//! [`MessagePassing::partial_aggregate`](crate::MessagePassing::partial_aggregate).

use relay_core::Tensor;
use relay_scatter::{masked_reduce, scatter, segment_csr};

use crate::args::HookArgs;
use crate::error::HookError;
use crate::layer::Hook;

/// Reduce per-edge `inputs` into per-node outputs along the node axis.
///
/// Uses segment reduction when a `ptr` row pointer is present (CSR-ordered
/// edges), otherwise index-scatter over `index` into `dim_size` buckets
/// (one past the largest index when `dim_size` is absent). Both layouts
/// give identical results for the same grouping.
///
/// # Errors
///
/// [`HookError::NotImplemented`] when the configured aggregation is `none`.
pub fn reference_aggregate(inputs: &Tensor, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
    let reduce = args
        .aggregation()
        .reduce()
        .ok_or(HookError::NotImplemented {
            hook: Hook::Aggregate,
        })?;
    let dim = args.node_dim();
    if let Some(ptr) = args.opt_index("ptr")? {
        return Ok(segment_csr(inputs, ptr, dim, reduce)?);
    }
    let index = args.index("index")?;
    let dim_size = match args.opt_count("dim_size")? {
        Some(n) => n,
        None => index.iter().max().map_or(0, |&m| m + 1),
    };
    Ok(scatter(inputs, index, dim, dim_size, reduce)?)
}

/// Reduce a bin's `[.., R, K, ..]` messages over the neighbour axis
/// (`node_dim + 1`), ignoring padded slots.
///
/// `mask` is the bin's `[R, K]` validity tensor; non-zero entries are real
/// neighbours.
pub fn reference_partial_aggregate(
    inputs: &Tensor,
    args: &HookArgs<'_>,
) -> Result<Tensor, HookError> {
    let reduce = args
        .aggregation()
        .reduce()
        .ok_or(HookError::NotImplemented {
            hook: Hook::PartialAggregate,
        })?;
    let mask: Vec<bool> = args.tensor("mask")?.to_vec()?.iter().map(|&v| v != 0.0).collect();
    Ok(masked_reduce(inputs, &mask, args.node_dim() + 1, reduce)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Aggregation;

    fn messages() -> Tensor {
        Tensor::new(&[3, 1], vec![2.0, 4.0, 6.0]).unwrap()
    }

    #[test]
    fn index_and_pointer_layouts_agree() {
        let by_index = HookArgs::new(Hook::Aggregate, 0, Aggregation::Mean)
            .with("index", vec![0usize, 0, 2])
            .with("dim_size", 3usize);
        let by_ptr = HookArgs::new(Hook::Aggregate, 0, Aggregation::Mean)
            .with("index", vec![0usize, 0, 2])
            .with("ptr", vec![0usize, 2, 2, 3]);
        let a = reference_aggregate(&messages(), &by_index).unwrap();
        let b = reference_aggregate(&messages(), &by_ptr).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_vec().unwrap(), &[3.0, 0.0, 6.0]);
    }

    #[test]
    fn dim_size_defaults_to_max_index() {
        let args = HookArgs::new(Hook::Aggregate, 0, Aggregation::Max).with("index", vec![1usize, 0, 1]);
        let out = reference_aggregate(&messages(), &args).unwrap();
        assert_eq!(out.to_vec().unwrap(), &[4.0, 6.0]);
    }

    #[test]
    fn no_aggregation_is_not_implemented() {
        let args = HookArgs::new(Hook::Aggregate, 0, Aggregation::None).with("index", vec![0usize; 3]);
        assert_eq!(
            reference_aggregate(&messages(), &args),
            Err(HookError::NotImplemented {
                hook: Hook::Aggregate
            })
        );
    }

    #[test]
    fn partial_reduces_over_valid_slots() {
        let bin = Tensor::new(&[2, 2, 1], vec![1.0, 5.0, 7.0, 0.0]).unwrap();
        let mask = Tensor::new(&[2, 2], vec![1.0, 1.0, 1.0, 0.0]).unwrap();
        let args = HookArgs::new(Hook::PartialAggregate, 0, Aggregation::Add).with("mask", mask);
        let out = reference_partial_aggregate(&bin, &args).unwrap();
        assert_eq!(out.shape(), &[2, 1]);
        assert_eq!(out.to_vec().unwrap(), &[6.0, 7.0]);
    }
}
