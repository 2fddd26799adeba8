//! `GraphConv`: `x'_i = W_root x_i + W_rel · aggr_{j → i}(e_ji · x_j)`.

use relay_core::Tensor;
use relay_pass::{
    Connectivity, DispatchConfig, Dispatcher, Hook, HookArgs, HookError, Kwargs,
    MessagePassing, PropagateError, Signature,
};
use relay_scatter::spmm;

use crate::linear::Linear;

/// Hooks of [`GraphConv`]: weighted neighbour features, with a fused path
/// for sparse adjacency matrices.
#[derive(Debug)]
pub struct GraphConvHooks;

impl MessagePassing for GraphConvHooks {
    fn name(&self) -> &str {
        "GraphConv"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new(Hook::SparseMessageAndAggregate)
                .param("adj_t")
                .param("x"),
            Signature::new(Hook::Message)
                .param("x_j")
                .optional("edge_weight"),
        ]
    }

    fn sparse_message_and_aggregate(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let reduce = args
            .aggregation()
            .reduce()
            .ok_or(HookError::NotImplemented {
                hook: Hook::SparseMessageAndAggregate,
            })?;
        Ok(spmm(args.sparse_adj_t()?, args.tensor("x")?, args.node_dim(), reduce)?)
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let x_j = args.tensor("x_j")?;
        match args.opt_tensor("edge_weight")? {
            Some(w) => Ok(x_j.scale_along(args.node_dim(), &w.to_vec()?)?),
            None => Ok(x_j.clone()),
        }
    }
}

/// Graph convolution with separate root and neighbour weights.
///
/// Node features are `[N, in]`. On sparse adjacency matrices the stored
/// values weight the neighbours; on edge lists the optional `edge_weight`
/// does.
#[derive(Debug)]
pub struct GraphConv {
    propagate: Dispatcher<GraphConvHooks>,
    rel: Linear,
    root: Linear,
}

impl GraphConv {
    /// Build from `[in, out]` neighbour and root weights.
    ///
    /// # Errors
    ///
    /// The weights must be rank 2 and equally shaped, and `config` must
    /// validate.
    pub fn new(
        weight_rel: Tensor,
        weight_root: Tensor,
        config: DispatchConfig,
    ) -> Result<Self, PropagateError> {
        if weight_rel.shape() != weight_root.shape() {
            return Err(relay_core::TensorError::ShapeMismatch {
                expected: weight_rel.shape().to_vec(),
                actual: weight_root.shape().to_vec(),
            }
            .into());
        }
        Ok(Self {
            propagate: Dispatcher::new(GraphConvHooks, config)?,
            rel: Linear::new(weight_rel)?,
            root: Linear::new(weight_root)?,
        })
    }

    /// Add a bias of length `out` to the root projection.
    pub fn with_bias(mut self, bias: Vec<f32>) -> Result<Self, PropagateError> {
        self.root = self.root.with_bias(bias)?;
        Ok(self)
    }

    /// The underlying dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<GraphConvHooks> {
        &self.propagate
    }

    /// Input feature width.
    pub fn in_channels(&self) -> usize {
        self.rel.in_channels()
    }

    /// Apply the layer to `[N, in]` features.
    pub fn forward(
        &self,
        x: &Tensor,
        connectivity: &Connectivity,
        edge_weight: Option<&Tensor>,
    ) -> Result<Tensor, PropagateError> {
        let mut kwargs = Kwargs::new().with("x", x.clone());
        if let Some(w) = edge_weight {
            kwargs.insert("edge_weight", w.clone());
        }
        let aggregated = self.propagate.propagate(connectivity, None, &kwargs)?;
        Ok(self.rel.apply(&aggregated)?.add(&self.root.apply(x)?)?)
    }
}
