//! `NeighborPool`: parameter-free neighbourhood pooling.
//!
//! Has no fused hook, so dense adjacency matrices run through padded
//! neighbourhood bins.

use relay_core::Tensor;
use relay_pass::{
    ConfigError, Connectivity, DispatchConfig, Dispatcher, Hook, HookArgs, HookError, Kwargs,
    MessagePassing, PropagateError, Signature,
};

/// Hooks of [`NeighborPool`]: neighbour features, per edge or per bin.
#[derive(Debug)]
pub struct PoolHooks;

impl MessagePassing for PoolHooks {
    fn name(&self) -> &str {
        "NeighborPool"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new(Hook::Message).param("x_j"),
            Signature::new(Hook::PartialMessage).param("x_j"),
        ]
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Ok(args.tensor("x_j")?.clone())
    }

    fn partial_message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Ok(args.tensor("x_j")?.clone())
    }
}

/// Pools neighbour features with the configured reduction. Edge weights
/// and adjacency values are ignored; only the pattern matters.
#[derive(Debug)]
pub struct NeighborPool {
    propagate: Dispatcher<PoolHooks>,
}

impl NeighborPool {
    /// Build with `config`'s reduction, flow and bin settings.
    pub fn new(config: DispatchConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            propagate: Dispatcher::new(PoolHooks, config)?,
        })
    }

    /// The underlying dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<PoolHooks> {
        &self.propagate
    }

    /// Pool the neighbours of every node.
    pub fn forward(&self, x: &Tensor, connectivity: &Connectivity) -> Result<Tensor, PropagateError> {
        let kwargs = Kwargs::new().with("x", x.clone());
        self.propagate.propagate(connectivity, None, &kwargs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{IndexTensor, SparseTensor};
    use relay_pass::{Aggregation, Representation, Strategy};

    fn star() -> (IndexTensor, Tensor) {
        // Node 0 receives from 1, 2 and 3; node 3 from 0.
        let edges = IndexTensor::edge_index(&[1, 2, 3, 0], &[0, 0, 0, 3]).unwrap();
        let x = Tensor::new(&[4, 2], vec![0.0, 1.0, 5.0, -2.0, 1.0, 4.0, 3.0, 3.0]).unwrap();
        (edges, x)
    }

    #[test]
    fn max_pool_over_dense_adjacency_uses_bins() {
        let (edges, x) = star();
        let pool = NeighborPool::new(DispatchConfig::with_aggr(Aggregation::Max)).unwrap();
        let dense = SparseTensor::adj_t_from_edge_index(&edges, None, 4).unwrap().to_dense().unwrap();
        let out = pool.forward(&x, &dense.into()).unwrap();
        assert_eq!(out.to_vec().unwrap(), &[5.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(
            pool.dispatcher().resolved_strategy(Representation::DenseAdj),
            Some(Strategy::Partial)
        );
        assert_eq!(pool.forward(&x, &edges.into()).unwrap(), out);
    }

    #[test]
    fn mean_pool_with_split_rows() {
        let (edges, x) = star();
        let config = DispatchConfig {
            aggr: Aggregation::Mean,
            format: Some(Strategy::Partial),
            partial_max_deg: Some(2),
            ..DispatchConfig::default()
        };
        let pool = NeighborPool::new(config).unwrap();
        let adj_t = SparseTensor::adj_t_from_edge_index(&edges, None, 4).unwrap();
        let out = pool.forward(&x, &adj_t.into()).unwrap();
        let expected = Tensor::new(&[4, 2], vec![3.0, 5.0 / 3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        assert!(out.approx_eq(&expected, 1e-6));
    }
}
