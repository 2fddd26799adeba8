//! The [`MessagePassing`] trait, its [`Hook`]s and their [`Signature`]s.
//!
//! A layer is a user-supplied set of hooks. It declares once, through
//! [`MessagePassing::signatures`], which hooks it implements and which named
//! inputs each hook consumes; the engine never calls a hook with inputs it
//! did not declare.

use std::fmt;

use relay_core::Tensor;

use crate::aggregate::{reference_aggregate, reference_partial_aggregate};
use crate::args::HookArgs;
use crate::error::HookError;

/// An overridable computation step of a message-passing layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Fused message + aggregation over a sparse adjacency matrix.
    SparseMessageAndAggregate,
    /// Fused message + aggregation over a dense adjacency matrix.
    DenseMessageAndAggregate,
    /// Per-edge message construction.
    Message,
    /// Reduction of per-edge messages into per-node outputs.
    Aggregate,
    /// Message construction over padded neighbourhood bins.
    PartialMessage,
    /// Reduction over the neighbour axis of a bin.
    PartialAggregate,
    /// Post-aggregation update. Layers may not declare it.
    Update,
}

impl Hook {
    /// The six hooks a layer may implement, in capability-table order.
    pub const IMPLEMENTABLE: [Hook; 6] = [
        Hook::SparseMessageAndAggregate,
        Hook::DenseMessageAndAggregate,
        Hook::Message,
        Hook::Aggregate,
        Hook::PartialMessage,
        Hook::PartialAggregate,
    ];

    /// Position in [`IMPLEMENTABLE`](Self::IMPLEMENTABLE), `None` for
    /// [`Hook::Update`].
    pub fn slot(self) -> Option<usize> {
        match self {
            Self::SparseMessageAndAggregate => Some(0),
            Self::DenseMessageAndAggregate => Some(1),
            Self::Message => Some(2),
            Self::Aggregate => Some(3),
            Self::PartialMessage => Some(4),
            Self::PartialAggregate => Some(5),
            Self::Update => None,
        }
    }

    /// Parameters the reference implementation of this hook consumes.
    ///
    /// Used when a layer relies on the built-in aggregators instead of
    /// declaring its own signature.
    pub fn default_signature(self) -> Signature {
        let sig = Signature::new(self);
        match self {
            Self::Aggregate => sig.param("index").optional("ptr").optional("dim_size"),
            Self::PartialAggregate => sig.param("mask"),
            _ => sig,
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SparseMessageAndAggregate => "sparse_message_and_aggregate",
            Self::DenseMessageAndAggregate => "dense_message_and_aggregate",
            Self::Message => "message",
            Self::Aggregate => "aggregate",
            Self::PartialMessage => "partial_message",
            Self::PartialAggregate => "partial_aggregate",
            Self::Update => "update",
        };
        f.write_str(name)
    }
}

/// One declared input of a hook.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, e.g. `x_j` or `edge_weight`.
    pub name: String,
    /// Whether the hook fails without it.
    pub required: bool,
}

/// The declared parameter list of one hook.
///
/// For `aggregate` and `partial_aggregate` the first input (the messages)
/// is supplied by the engine and is not part of the list.
///
/// ```
/// use relay_pass::{Hook, Signature};
///
/// let sig = Signature::new(Hook::Message).param("x_j").optional("edge_weight");
/// assert_eq!(sig.hook(), Hook::Message);
/// assert_eq!(sig.params().len(), 2);
/// assert!(!sig.params()[1].required);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct Signature {
    hook: Hook,
    params: Vec<Param>,
}

impl Signature {
    /// An empty parameter list for `hook`.
    pub fn new(hook: Hook) -> Self {
        Self {
            hook,
            params: Vec::new(),
        }
    }

    /// Append a required parameter.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: true,
        });
        self
    }

    /// Append an optional parameter.
    pub fn optional(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            required: false,
        });
        self
    }

    /// The hook this signature describes.
    pub fn hook(&self) -> Hook {
        self.hook
    }

    /// Declared parameters, in order.
    pub fn params(&self) -> &[Param] {
        &self.params
    }
}

/// A graph neural network layer driven by the dispatch engine.
///
/// # Contract
///
/// - `signatures()` is called once, when the
///   [`Dispatcher`](crate::Dispatcher) is built. A hook is considered
///   implemented exactly when it has a signature there.
/// - Hooks are `&self`: learned parameters are read-only during a call.
/// - Unimplemented hooks keep their default bodies, which report
///   [`HookError::NotImplemented`]. `aggregate` and `partial_aggregate`
///   default to the reference reductions, which honour the configured
///   aggregation.
///
/// # Examples
///
/// A layer that sums its neighbours' features:
///
/// ```
/// use relay_pass::{HookArgs, HookError, Hook, MessagePassing, Signature};
/// use relay_core::Tensor;
///
/// struct SumNeighbours;
///
/// impl MessagePassing for SumNeighbours {
///     fn name(&self) -> &str { "SumNeighbours" }
///
///     fn signatures(&self) -> Vec<Signature> {
///         vec![Signature::new(Hook::Message).param("x_j")]
///     }
///
///     fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
///         Ok(args.tensor("x_j")?.clone())
///     }
/// }
///
/// assert_eq!(SumNeighbours.signatures().len(), 1);
/// ```
pub trait MessagePassing: Send + Sync {
    /// Layer name, used in logs and in the dispatcher's `Display`.
    fn name(&self) -> &str;

    /// Hooks this layer implements, with their parameter lists.
    fn signatures(&self) -> Vec<Signature>;

    /// Fused propagation over a sparse `adj_t`. Returns per-node output.
    fn sparse_message_and_aggregate(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let _ = args;
        Err(HookError::NotImplemented {
            hook: Hook::SparseMessageAndAggregate,
        })
    }

    /// Fused propagation over a dense `adj_t`. Returns per-node output.
    fn dense_message_and_aggregate(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let _ = args;
        Err(HookError::NotImplemented {
            hook: Hook::DenseMessageAndAggregate,
        })
    }

    /// Per-edge messages, with edges along the node axis.
    fn message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let _ = args;
        Err(HookError::NotImplemented {
            hook: Hook::Message,
        })
    }

    /// Reduce per-edge `inputs` into per-node outputs.
    fn aggregate(&self, inputs: Tensor, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        reference_aggregate(&inputs, args)
    }

    /// Messages for one neighbourhood bin, shaped `[.., R, K, ..]`.
    fn partial_message(&self, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        let _ = args;
        Err(HookError::NotImplemented {
            hook: Hook::PartialMessage,
        })
    }

    /// Reduce a bin's `[.., R, K, ..]` messages to `[.., R, ..]`.
    fn partial_aggregate(&self, inputs: Tensor, args: &HookArgs<'_>) -> Result<Tensor, HookError> {
        reference_partial_aggregate(&inputs, args)
    }
}
