//! Reusable fixture layers.
//!
//! - [`ConstMessage`]: every edge sends the same value.
//! - [`EdgeValues`]: messages are a caller-supplied per-edge tensor.
//! - [`CopySource`]: sends `x_j`, optionally weighted by `edge_weight`.
//! - [`FusedCopy`]: [`CopySource`] plus a fused sparse hook; counts calls.
//! - [`DenseCopy`]: fused dense hook only.
//! - [`PartialCopy`]: [`CopySource`] plus the partial hooks.
//! - [`UpdatingLayer`]: declares the forbidden `update` hook.
//! - [`FailingLayer`]: its message hook always fails.

use std::sync::atomic::{AtomicUsize, Ordering};

use relay_core::{Tensor, TensorError};
use relay_pass::{Hook, HookArgs, HookError, MessagePassing, Signature};

/// Sends `value` along every edge. Messages are 1-D, one per edge.
pub struct ConstMessage {
    pub value: f32,
}

impl ConstMessage {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl MessagePassing for ConstMessage {
    fn name(&self) -> &str {
        "ConstMessage"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(Hook::Message).param("index")]
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let edges = args.index("index")?.len();
        Ok(Tensor::full(&[edges], self.value)?)
    }
}

/// Uses the caller's `values` tensor as the messages.
pub struct EdgeValues;

impl MessagePassing for EdgeValues {
    fn name(&self) -> &str {
        "EdgeValues"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(Hook::Message).param("values")]
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Ok(args.tensor("values")?.clone())
    }
}

/// Sends the source node's features, scaled by `edge_weight` if given.
pub struct CopySource;

impl MessagePassing for CopySource {
    fn name(&self) -> &str {
        "CopySource"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(Hook::Message)
            .param("x_j")
            .optional("edge_weight")]
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        copy_message(args)
    }
}

fn copy_message(args: &HookArgs<'_>) -> Result<Tensor, HookError> {
    let x_j = args.tensor("x_j")?;
    match args.opt_tensor("edge_weight")? {
        Some(w) => Ok(x_j.scale_along(args.node_dim(), &w.to_vec()?)?),
        None => Ok(x_j.clone()),
    }
}

/// [`CopySource`] with a fused sparse path that multiplies by `adj_t`.
///
/// Counts calls per path so tests can tell which strategy ran. Uses
/// `AtomicUsize` so the layer stays `Sync`.
#[derive(Default)]
pub struct FusedCopy {
    fused_calls: AtomicUsize,
    message_calls: AtomicUsize,
}

impl FusedCopy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls of `sparse_message_and_aggregate`.
    pub fn fused_calls(&self) -> usize {
        self.fused_calls.load(Ordering::Relaxed)
    }

    /// Calls of `message`.
    pub fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::Relaxed)
    }
}

impl MessagePassing for FusedCopy {
    fn name(&self) -> &str {
        "FusedCopy"
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
        self.fused_calls.fetch_add(1, Ordering::Relaxed);
        let reduce = args
            .aggregation()
            .reduce()
            .ok_or(HookError::NotImplemented {
                hook: Hook::SparseMessageAndAggregate,
            })?;
        let adj_t = args.sparse_adj_t()?;
        Ok(relay_scatter::spmm(adj_t, args.tensor("x")?, args.node_dim(), reduce)?)
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        self.message_calls.fetch_add(1, Ordering::Relaxed);
        copy_message(args)
    }
}

/// Fused dense propagation `adj_t · x`. Requires rank-2 `x`.
pub struct DenseCopy;

impl MessagePassing for DenseCopy {
    fn name(&self) -> &str {
        "DenseCopy"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(Hook::DenseMessageAndAggregate)
            .param("adj_t")
            .param("x")]
    }

    fn dense_message_and_aggregate(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Ok(args.dense_adj_t()?.matmul(args.tensor("x")?)?)
    }
}

/// [`CopySource`] plus partial hooks that send padded `x_j` rows.
///
/// Expects `node_dim = 0`.
pub struct PartialCopy;

impl MessagePassing for PartialCopy {
    fn name(&self) -> &str {
        "PartialCopy"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new(Hook::Message)
                .param("x_j")
                .optional("edge_weight"),
            Signature::new(Hook::PartialMessage)
                .param("x_j")
                .param("edge_weight"),
        ]
    }

    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        copy_message(args)
    }

    fn partial_message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Ok(scale_bin(args.tensor("x_j")?, args.tensor("edge_weight")?)?)
    }
}

/// Multiply a `[R, K, ..]` bin by its `[R, K]` weights.
fn scale_bin(x_j: &Tensor, weights: &Tensor) -> Result<Tensor, TensorError> {
    let shape = x_j.shape().to_vec();
    let slots = weights.numel();
    let mut flat = vec![slots];
    flat.extend_from_slice(shape.get(2..).unwrap_or_default());
    x_j.clone()
        .reshape(&flat)?
        .scale_along(0, &weights.to_vec()?)?
        .reshape(&shape)
}

/// Declares the `update` hook, which the dispatcher rejects.
pub struct UpdatingLayer;

impl MessagePassing for UpdatingLayer {
    fn name(&self) -> &str {
        "UpdatingLayer"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![
            Signature::new(Hook::Message).param("x_j"),
            Signature::new(Hook::Update).param("inputs"),
        ]
    }
}

/// Fails in `message` with a fixed reason.
pub struct FailingLayer;

impl MessagePassing for FailingLayer {
    fn name(&self) -> &str {
        "FailingLayer"
    }

    fn signatures(&self) -> Vec<Signature> {
        vec![Signature::new(Hook::Message).param("x_j")]
    }

    fn message(&self, _args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        Err(HookError::Failed {
            reason: "deliberate failure".into(),
        })
    }
}
