//! `GcnConv`: `x' = D^-1/2 (A + I) D^-1/2 · x W + b`.
//!
//! The projection runs before propagation so messages carry `out` channels.
//! Normalisation happens in [`GcnConv::forward`], producing the same
//! matrix for every connectivity representation; the hooks only apply it.

use relay_core::Tensor;
use relay_pass::{
    Connectivity, DispatchConfig, Dispatcher, Hook, HookArgs, HookError, Kwargs,
    MessagePassing, PropagateError, Signature, Size, Strategy,
};
use relay_scatter::{spmm, Reduce};

use crate::linear::Linear;
use crate::utils::{gcn_norm, gcn_norm_dense, gcn_norm_sparse};

/// Hooks of [`GcnConv`]. Both fused paths and the message path are
/// implemented.
#[derive(Debug)]
pub struct GcnHooks;

impl MessagePassing for GcnHooks {
    fn name(&self) -> &str {
        "GcnConv"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new(Hook::SparseMessageAndAggregate)
                .param("adj_t")
                .param("x"),
            Signature::new(Hook::DenseMessageAndAggregate)
                .param("adj_t")
                .param("x"),
            Signature::new(Hook::Message)
                .param("x_j")
                .param("edge_weight"),
        ]
    }

    fn sparse_message_and_aggregate(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Ok(spmm(args.sparse_adj_t()?, args.tensor("x")?, args.node_dim(), Reduce::Sum)?)
    }

    fn dense_message_and_aggregate(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Ok(args.dense_adj_t()?.matmul(args.tensor("x")?)?)
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let w = args.tensor("edge_weight")?;
        Ok(args.tensor("x_j")?.scale_along(args.node_dim(), &w.to_vec()?)?)
    }
}

/// Graph convolution with symmetric degree normalisation.
#[derive(Debug)]
pub struct GcnConv {
    propagate: Dispatcher<GcnHooks>,
    lin: Linear,
    self_loops: bool,
}

impl GcnConv {
    /// Build from a `[in, out]` weight, optionally forcing a strategy.
    pub fn new(weight: Tensor, format: Option<Strategy>) -> Result<Self, PropagateError> {
        let config = DispatchConfig {
            format,
            ..DispatchConfig::default()
        };
        Ok(Self {
            propagate: Dispatcher::new(GcnHooks, config)?,
            lin: Linear::new(weight)?,
            self_loops: true,
        })
    }

    /// Add a bias of length `out` after propagation.
    pub fn with_bias(mut self, bias: Vec<f32>) -> Result<Self, PropagateError> {
        self.lin = self.lin.with_bias(bias)?;
        Ok(self)
    }

    /// Skip the self-loops normally added before normalisation.
    #[must_use]
    pub fn without_self_loops(mut self) -> Self {
        self.self_loops = false;
        self
    }

    /// The underlying dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher<GcnHooks> {
        &self.propagate
    }

    /// Explain the layer: one logit per edge of the input edge list.
    /// Self-loops added by the layer are left unmasked.
    pub fn set_edge_mask(&mut self, logits: Vec<f32>) {
        self.propagate.set_edge_mask(logits);
    }

    /// Remove the explain mask.
    pub fn clear_edge_mask(&mut self) -> Option<Vec<f32>> {
        self.propagate.clear_edge_mask()
    }

    /// Apply the layer to `[N, in]` features.
    pub fn forward(
        &self,
        x: &Tensor,
        connectivity: &Connectivity,
        edge_weight: Option<&[f32]>,
    ) -> Result<Tensor, PropagateError> {
        let num_nodes = x.dim(0)?;
        let h = self.lin.project(x)?;
        let mut kwargs = Kwargs::new().with("x", h);
        let normalised = match connectivity {
            Connectivity::Index(edges) if edges.is_edge_list() => {
                let (edges, norm) = gcn_norm(edges, edge_weight, num_nodes, self.self_loops)?;
                kwargs.insert("edge_weight", Tensor::from_vec(norm)?);
                Connectivity::Index(edges)
            }
            Connectivity::Index(matrix) => {
                Connectivity::Dense(gcn_norm_dense(&matrix.to_float()?, self.self_loops)?)
            }
            Connectivity::Sparse(adj_t) => {
                Connectivity::Sparse(gcn_norm_sparse(adj_t, self.self_loops)?)
            }
            Connectivity::Dense(adj_t) => {
                Connectivity::Dense(gcn_norm_dense(adj_t, self.self_loops)?)
            }
        };
        let out = self
            .propagate
            .propagate(&normalised, Some(Size::square(num_nodes)), &kwargs)?;
        Ok(self.lin.add_bias(out)?)
    }
}
