//! The propagation engine.
//!
//! A [`Dispatcher`] owns one layer, its validated configuration, the
//! capability record built at construction, and the strategy cache. Each
//! [`propagate`](Dispatcher::propagate) call runs, in order: classify,
//! flow check, explain check, resolve, collect, hooks, edge mask,
//! aggregate.

use std::borrow::Cow;
use std::fmt;

use relay_core::{SparseTensor, Tensor};
use relay_scatter::{scatter, Reduce};
use tracing::{debug, trace, warn};

use crate::args::{Adjacency, HookArgs, Kwargs, Size};
use crate::collector::{ArgMap, Binned, CollectContext, Collected, Collection, Collector};
use crate::config::{Aggregation, DispatchConfig, Flow};
use crate::error::{ConfigError, PropagateError};
use crate::format::{classify, resolve, Connectivity, Representation, Strategy, StrategyCache};
use crate::inspector::Capabilities;
use crate::layer::{Hook, MessagePassing};

/// Tolerance of [`Dispatcher::check_propagate_consistency`].
pub const CONSISTENCY_TOLERANCE: f32 = 1e-5;

/// Dispatches propagation calls to a layer's hooks.
///
/// The dispatcher is `Send + Sync` whenever the layer is; concurrent
/// `propagate` calls share only the strategy cache.
///
/// # Examples
///
/// ```
/// use relay_core::{IndexTensor, Tensor};
/// use relay_pass::{
///     Connectivity, DispatchConfig, Dispatcher, Hook, HookArgs, HookError, Kwargs,
///     MessagePassing, Signature,
/// };
///
/// struct Copy;
///
/// impl MessagePassing for Copy {
///     fn name(&self) -> &str { "Copy" }
///     fn signatures(&self) -> Vec<Signature> {
///         vec![Signature::new(Hook::Message).param("x_j")]
///     }
///     fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
///         Ok(args.tensor("x_j")?.clone())
///     }
/// }
///
/// let dispatcher = Dispatcher::new(Copy, DispatchConfig::default()).unwrap();
/// let edges = Connectivity::Index(IndexTensor::edge_index(&[0, 1], &[1, 2]).unwrap());
/// let x = Tensor::from_vec(vec![1.0, 2.0, 3.0]).unwrap();
/// let out = dispatcher.propagate(&edges, None, &Kwargs::new().with("x", x)).unwrap();
/// assert_eq!(out.to_vec().unwrap(), &[0.0, 1.0, 2.0]);
/// assert_eq!(dispatcher.to_string(), "Copy()");
/// ```
pub struct Dispatcher<L> {
    layer: L,
    config: DispatchConfig,
    caps: Capabilities,
    cache: StrategyCache,
    edge_mask: Option<Vec<f32>>,
}

impl<L: MessagePassing> Dispatcher<L> {
    /// Validate `config`, inspect `layer` and build a dispatcher.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if the configuration is invalid or the layer's
    /// signatures are malformed or declare the `update` hook.
    pub fn new(layer: L, config: DispatchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let caps = Capabilities::inspect(&layer.signatures(), config.aggr)?;
        debug!(
            layer = layer.name(),
            aggr = %config.aggr,
            fused_sparse = caps.supports_fused_sparse(),
            fused_dense = caps.supports_fused_dense(),
            sparse = caps.supports_sparse(),
            partial = caps.supports_partial(),
            "inspected layer"
        );
        Ok(Self {
            layer,
            config,
            caps,
            cache: StrategyCache::new(),
            edge_mask: None,
        })
    }

    /// The wrapped layer.
    pub fn layer(&self) -> &L {
        &self.layer
    }

    /// The validated configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// The capability record built at construction.
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// The strategy cached for `repr`, if a call has resolved one.
    pub fn resolved_strategy(&self, repr: Representation) -> Option<Strategy> {
        self.cache.get(repr)
    }

    /// Install an explain mask: one logit per edge of the edge lists passed
    /// to subsequent calls. Messages are scaled by `sigmoid(logit)`.
    pub fn set_edge_mask(&mut self, logits: Vec<f32>) {
        self.edge_mask = Some(logits);
    }

    /// Remove the explain mask, returning it.
    pub fn clear_edge_mask(&mut self) -> Option<Vec<f32>> {
        self.edge_mask.take()
    }

    /// The installed explain mask.
    pub fn edge_mask(&self) -> Option<&[f32]> {
        self.edge_mask.as_deref()
    }

    /// Aggregate messages for every node.
    ///
    /// `size` is optional for edge lists whose node counts can be read off
    /// the node tensors, and must agree with the matrix shape for
    /// adjacency inputs.
    ///
    /// # Errors
    ///
    /// See [`PropagateError`]. Errors are raised before any hook runs
    /// whenever they can be detected from the inputs alone.
    pub fn propagate(
        &self,
        connectivity: &Connectivity,
        size: Option<Size>,
        kwargs: &Kwargs,
    ) -> Result<Tensor, PropagateError> {
        let repr = classify(connectivity)?;
        if self.config.flow == Flow::TargetToSource && repr != Representation::EdgeIndex {
            return Err(ConfigError::FlowRequiresEdgeIndex {
                representation: repr,
            }
            .into());
        }
        if self.edge_mask.is_some() {
            self.check_explain(repr)?;
        }
        let strategy = resolve(repr, &self.caps, self.config.format, &self.cache)?;
        let collector =
            Collector::bind(repr, strategy).ok_or(PropagateError::UnsupportedFormat {
                representation: repr,
                requested: Some(strategy),
            })?;
        trace!(
            layer = self.layer.name(),
            representation = %repr,
            strategy = %strategy,
            "propagate"
        );
        self.run(collector, connectivity, size, kwargs, self.edge_mask.as_deref())
    }

    /// Run the fused sparse hook and the message/aggregate path on the same
    /// `adj_t` and report whether they agree within
    /// [`CONSISTENCY_TOLERANCE`].
    ///
    /// Bypasses the strategy cache and ignores the edge mask.
    ///
    /// # Errors
    ///
    /// [`PropagateError::UnsupportedFormat`] unless the layer supports both
    /// strategies; otherwise any error either path raises.
    pub fn check_propagate_consistency(
        &self,
        adj_t: &SparseTensor,
        size: Option<Size>,
        kwargs: &Kwargs,
    ) -> Result<bool, PropagateError> {
        let missing = if !self.caps.supports_fused_sparse() {
            Some(Strategy::Fused)
        } else if !self.caps.supports_sparse() {
            Some(Strategy::Sparse)
        } else {
            None
        };
        if let Some(strategy) = missing {
            return Err(PropagateError::UnsupportedFormat {
                representation: Representation::SparseAdj,
                requested: Some(strategy),
            });
        }
        if self.config.flow == Flow::TargetToSource {
            return Err(ConfigError::FlowRequiresEdgeIndex {
                representation: Representation::SparseAdj,
            }
            .into());
        }
        let connectivity = Connectivity::Sparse(adj_t.clone());
        let fused = self.run(Collector::SparseAdjFused, &connectivity, size, kwargs, None)?;
        let sparse = self.run(Collector::SparseAdjSparse, &connectivity, size, kwargs, None)?;
        Ok(fused.approx_eq(&sparse, CONSISTENCY_TOLERANCE))
    }

    fn check_explain(&self, repr: Representation) -> Result<(), ConfigError> {
        let reason = if repr != Representation::EdgeIndex {
            format!("{repr} input cannot be explained, pass an edge list")
        } else if let Some(format) = self.config.format.filter(|&f| f != Strategy::Sparse) {
            format!("format '{format}' was requested, explaining needs 'sparse'")
        } else if !self.caps.supports_sparse() {
            "the layer has no message/aggregate path".to_string()
        } else {
            return Ok(());
        };
        Err(ConfigError::ExplainUnsupported { reason })
    }

    fn context(&self, collector: Collector) -> CollectContext<'_> {
        CollectContext {
            flow: self.config.flow,
            node_dim: self.config.node_dim,
            bindings: self.caps.bindings_for(collector.hooks()),
            partial_max_deg: self.config.partial_max_deg,
            partial_binning: self.config.partial_binning,
        }
    }

    fn run(
        &self,
        collector: Collector,
        connectivity: &Connectivity,
        size: Option<Size>,
        kwargs: &Kwargs,
        edge_mask: Option<&[f32]>,
    ) -> Result<Tensor, PropagateError> {
        let ctx = self.context(collector);
        match collector.collect(connectivity, size, kwargs, &ctx)? {
            Collection::Edges(collected) => match collector.strategy() {
                Strategy::Fused => self.fused(collector.hooks()[0], &collected),
                _ => self.message_and_aggregate(&collected, edge_mask),
            },
            Collection::Bins(binned) => self.partial(&binned),
        }
    }

    /// Restrict collected values to the parameters `hook` declared.
    fn project<'s>(
        &self,
        hook: Hook,
        values: &'s ArgMap<'_>,
        adj_t: Option<&'s Adjacency<'_>>,
    ) -> Result<HookArgs<'s>, PropagateError> {
        let mut args = HookArgs::new(hook, self.config.node_dim, self.config.aggr);
        for b in self.caps.bindings(hook) {
            if b.name == "adj_t" {
                if let Some(adj) = adj_t {
                    args.set_adj(adj.reborrow());
                    continue;
                }
            }
            match values.get(&b.name) {
                Some(v) => args.insert(b.name.clone(), Cow::Borrowed(&**v)),
                None if b.required => {
                    return Err(PropagateError::MissingArgument {
                        hook,
                        name: b.name.clone(),
                    })
                }
                None => {}
            }
        }
        Ok(args)
    }

    fn fused(&self, hook: Hook, collected: &Collected<'_>) -> Result<Tensor, PropagateError> {
        let args = self.project(hook, &collected.values, collected.adj_t.as_ref())?;
        let out = match hook {
            Hook::DenseMessageAndAggregate => self.layer.dense_message_and_aggregate(&args),
            _ => self.layer.sparse_message_and_aggregate(&args),
        };
        out.map_err(|e| PropagateError::from_hook(hook, e))
    }

    fn message_and_aggregate(
        &self,
        collected: &Collected<'_>,
        edge_mask: Option<&[f32]>,
    ) -> Result<Tensor, PropagateError> {
        let args = self.project(Hook::Message, &collected.values, None)?;
        let mut messages = self
            .layer
            .message(&args)
            .map_err(|e| PropagateError::from_hook(Hook::Message, e))?;
        if let Some(logits) = edge_mask {
            messages = self.apply_edge_mask(messages, logits, collected.size)?;
        }
        let args = self.project(Hook::Aggregate, &collected.values, None)?;
        self.layer
            .aggregate(messages, &args)
            .map_err(|e| PropagateError::from_hook(Hook::Aggregate, e))
    }

    /// Scale messages by `sigmoid(logits)` along the edge axis.
    ///
    /// A layer may append one self-loop per receiving node before building
    /// messages; the mask is then padded with that many ones.
    fn apply_edge_mask(
        &self,
        messages: Tensor,
        logits: &[f32],
        size: Size,
    ) -> Result<Tensor, PropagateError> {
        let node_dim = self.config.node_dim;
        let num_messages = messages.dim(node_dim)?;
        let mut weights = Tensor::from_vec(logits.to_vec())?.sigmoid()?.to_vec()?;
        if num_messages > weights.len() {
            let loops = size.of_row(self.config.flow.rows().0);
            warn!(
                layer = self.layer.name(),
                mask = weights.len(),
                messages = num_messages,
                loops,
                "edge mask shorter than messages, padding for self-loops"
            );
            weights.extend(std::iter::repeat_n(1.0, loops));
        }
        if weights.len() != num_messages {
            return Err(ConfigError::EdgeMaskMismatch {
                expected: num_messages,
                actual: weights.len(),
            }
            .into());
        }
        Ok(messages.scale_along(node_dim, &weights)?)
    }

    fn partial(&self, binned: &Binned<'_>) -> Result<Tensor, PropagateError> {
        let node_dim = self.config.node_dim;
        let mut outputs = Vec::with_capacity(binned.bins.len());
        let mut rows = Vec::new();
        let mut counts = Vec::new();
        for bin in &binned.bins {
            let args = self.project(Hook::PartialMessage, &bin.values, None)?;
            let messages = self
                .layer
                .partial_message(&args)
                .map_err(|e| PropagateError::from_hook(Hook::PartialMessage, e))?;
            let args = self.project(Hook::PartialAggregate, &bin.values, None)?;
            let reduced = self
                .layer
                .partial_aggregate(messages, &args)
                .map_err(|e| PropagateError::from_hook(Hook::PartialAggregate, e))?;
            outputs.push(reduced);
            rows.extend_from_slice(&bin.rows);
            counts.extend(bin.counts.iter().map(|&c| c as f32));
        }

        let refs: Vec<&Tensor> = outputs.iter().collect();
        let stacked = Tensor::cat(&refs, node_dim)?;
        let num_targets = binned.size.num_targets;
        let builtin = !self.caps.implements(Hook::PartialAggregate);
        let out = match self.config.aggr {
            Aggregation::Max => scatter(&stacked, &rows, node_dim, num_targets, Reduce::Max)?,
            Aggregation::Mean if builtin => {
                // Chunks of one row hold partial means; weight them by size.
                let weighted = stacked.scale_along(node_dim, &counts)?;
                let sums = scatter(&weighted, &rows, node_dim, num_targets, Reduce::Sum)?;
                let mut totals = vec![0.0f32; num_targets];
                for (&row, &c) in rows.iter().zip(&counts) {
                    totals[row] += c;
                }
                let inv: Vec<f32> = totals
                    .iter()
                    .map(|&t| if t > 0.0 { 1.0 / t } else { 0.0 })
                    .collect();
                sums.scale_along(node_dim, &inv)?
            }
            // Layer-defined partial outputs are combined by addition.
            Aggregation::Mean | Aggregation::Add | Aggregation::Sum | Aggregation::None => {
                scatter(&stacked, &rows, node_dim, num_targets, Reduce::Sum)?
            }
        };
        Ok(out)
    }
}

impl<L: MessagePassing> fmt::Display for Dispatcher<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}()", self.layer.name())
    }
}

impl<L: MessagePassing> fmt::Debug for Dispatcher<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("layer", &self.layer.name())
            .field("config", &self.config)
            .field("capabilities", &self.caps)
            .field("edge_mask", &self.edge_mask.as_ref().map(Vec::len))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Arg;
    use crate::error::HookError;
    use crate::layer::Signature;
    use relay_core::IndexTensor;

    /// Emits `x_j` per edge.
    struct Copy;

    impl MessagePassing for Copy {
        fn name(&self) -> &str {
            "Copy"
        }

        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(Hook::Message).param("x_j")]
        }

        fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
            Ok(args.tensor("x_j")?.clone())
        }
    }

    /// Declares `message` but never overrides it.
    struct Hollow;

    impl MessagePassing for Hollow {
        fn name(&self) -> &str {
            "Hollow"
        }

        fn signatures(&self) -> Vec<Signature> {
            vec![Signature::new(Hook::Message).param("index")]
        }
    }

    fn chain() -> Connectivity {
        Connectivity::Index(IndexTensor::edge_index(&[0, 1], &[1, 2]).unwrap())
    }

    fn x() -> Kwargs {
        Kwargs::new().with("x", Tensor::from_vec(vec![1.0, 2.0, 3.0]).unwrap())
    }

    #[test]
    fn dispatcher_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Dispatcher<Copy>>();
    }

    #[test]
    fn reversed_flow_sends_backwards() {
        let cfg = DispatchConfig {
            flow: Flow::TargetToSource,
            ..DispatchConfig::default()
        };
        let d = Dispatcher::new(Copy, cfg).unwrap();
        let out = d.propagate(&chain(), None, &x()).unwrap();
        assert_eq!(out.to_vec().unwrap(), &[2.0, 3.0, 0.0]);
    }

    #[test]
    fn reversed_flow_rejects_adjacency() {
        let cfg = DispatchConfig {
            flow: Flow::TargetToSource,
            ..DispatchConfig::default()
        };
        let d = Dispatcher::new(Copy, cfg).unwrap();
        let dense = Connectivity::Dense(Tensor::zeros(&[3, 3]).unwrap());
        assert_eq!(
            d.propagate(&dense, None, &x()),
            Err(PropagateError::Configuration(ConfigError::FlowRequiresEdgeIndex {
                representation: Representation::DenseAdj
            }))
        );
        assert_eq!(d.resolved_strategy(Representation::DenseAdj), None);
    }

    #[test]
    fn missing_required_argument_is_reported() {
        let d = Dispatcher::new(Copy, DispatchConfig::default()).unwrap();
        let err = d.propagate(&chain(), Some(Size::square(3)), &Kwargs::new());
        assert_eq!(
            err,
            Err(PropagateError::MissingArgument {
                hook: Hook::Message,
                name: "x_j".into()
            })
        );
    }

    #[test]
    fn unimplemented_hook_surfaces() {
        let d = Dispatcher::new(Hollow, DispatchConfig::default()).unwrap();
        let err = d.propagate(&chain(), Some(Size::square(3)), &Kwargs::new());
        assert_eq!(
            err,
            Err(PropagateError::NotImplemented {
                hook: Hook::Message
            })
        );
    }

    #[test]
    fn no_aggregation_fails_on_edge_lists() {
        let d = Dispatcher::new(Copy, DispatchConfig::with_aggr(Aggregation::None)).unwrap();
        assert_eq!(
            d.propagate(&chain(), None, &x()),
            Err(PropagateError::NotImplemented {
                hook: Hook::Aggregate
            })
        );
    }

    #[test]
    fn edge_mask_scales_messages() {
        let mut d = Dispatcher::new(Copy, DispatchConfig::default()).unwrap();
        d.set_edge_mask(vec![0.0, 100.0]);
        let out = d.propagate(&chain(), None, &x()).unwrap();
        assert!(out.approx_eq(&Tensor::from_vec(vec![0.0, 0.5, 2.0]).unwrap(), 1e-6));
        assert_eq!(d.clear_edge_mask(), Some(vec![0.0, 100.0]));
        assert_eq!(d.edge_mask(), None);
    }

    #[test]
    fn edge_mask_length_mismatch() {
        let mut d = Dispatcher::new(Copy, DispatchConfig::default()).unwrap();
        d.set_edge_mask(vec![0.0, 0.0, 0.0]);
        assert!(matches!(
            d.propagate(&chain(), None, &x()),
            Err(PropagateError::Configuration(ConfigError::EdgeMaskMismatch {
                expected: 2,
                actual: 3
            }))
        ));
    }

    #[test]
    fn explain_refuses_adjacency_inputs() {
        let mut d = Dispatcher::new(Copy, DispatchConfig::default()).unwrap();
        d.set_edge_mask(vec![0.0; 2]);
        let adj = Connectivity::Sparse(SparseTensor::empty((3, 3)));
        assert!(matches!(
            d.propagate(&adj, None, &x()),
            Err(PropagateError::Configuration(ConfigError::ExplainUnsupported { .. }))
        ));

        let cfg = DispatchConfig {
            format: Some(Strategy::Partial),
            ..DispatchConfig::default()
        };
        let mut d = Dispatcher::new(Copy, cfg).unwrap();
        d.set_edge_mask(vec![0.0; 2]);
        assert!(matches!(
            d.propagate(&chain(), None, &x()),
            Err(PropagateError::Configuration(ConfigError::ExplainUnsupported { .. }))
        ));
    }

    /// Partial messages copy `x_j`; the partial aggregate sums each bin row
    /// and halves it.
    struct HalfSum;

    impl MessagePassing for HalfSum {
        fn name(&self) -> &str {
            "HalfSum"
        }

        fn signatures(&self) -> Vec<Signature> {
            vec![
                Signature::new(Hook::PartialMessage).param("x_j"),
                Signature::new(Hook::PartialAggregate).param("mask"),
            ]
        }

        fn partial_message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
            Ok(args.tensor("x_j")?.clone())
        }

        fn partial_aggregate(&self, inputs: Tensor, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
            let mask: Vec<bool> = args.tensor("mask")?.to_vec()?.iter().map(|&v| v != 0.0).collect();
            let sums = relay_scatter::masked_reduce(&inputs, &mask, 1, Reduce::Sum)?;
            let halves = vec![0.5; sums.dim(0)?];
            Ok(sums.scale_along(0, &halves)?)
        }
    }

    #[test]
    fn custom_partial_aggregate_adds_under_mean() {
        let cfg = DispatchConfig {
            format: Some(Strategy::Partial),
            partial_max_deg: Some(1),
            ..DispatchConfig::with_aggr(Aggregation::Mean)
        };
        let d = Dispatcher::new(HalfSum, cfg).unwrap();
        // Node 0 receives from nodes 1 and 2, one chunk per neighbour.
        let adj_t = SparseTensor::from_coo(vec![0, 0], vec![1, 2], None, (3, 3)).unwrap();
        let kwargs = Kwargs::new().with("x", Tensor::from_vec(vec![0.0, 2.0, 6.0]).unwrap());
        let out = d.propagate(&Connectivity::Sparse(adj_t), None, &kwargs).unwrap();
        assert_eq!(out.to_vec().unwrap(), &[4.0, 0.0, 0.0]);
    }

    #[test]
    fn project_skips_absent_optionals() {
        let d = Dispatcher::new(Copy, DispatchConfig::default()).unwrap();
        let mut values = ArgMap::new();
        values.insert("index".into(), Cow::Owned(Arg::Index(vec![0])));
        let args = d.project(Hook::Aggregate, &values, None).unwrap();
        assert!(args.contains("index"));
        assert!(!args.contains("ptr"));
        assert!(matches!(
            d.project(Hook::Message, &values, None),
            Err(PropagateError::MissingArgument { .. })
        ));
    }

    #[test]
    fn display_names_the_layer() {
        let d = Dispatcher::new(Copy, DispatchConfig::default()).unwrap();
        assert_eq!(d.to_string(), "Copy()");
        assert!(format!("{d:?}").contains("Copy"));
    }
}
