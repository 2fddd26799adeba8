//! Error types for layer construction, hook execution and propagation.

use std::error::Error;
use std::fmt;

use relay_core::TensorError;

use crate::format::{Representation, Strategy};
use crate::layer::Hook;

// ── ConfigError ────────────────────────────────────────────────────

/// A layer, its configuration, or a call's arguments are inconsistent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Unknown aggregation name.
    InvalidAggregation {
        /// The rejected string.
        value: String,
    },
    /// Unknown flow direction.
    InvalidFlow {
        /// The rejected string.
        value: String,
    },
    /// Unknown execution format.
    InvalidFormat {
        /// The rejected string.
        value: String,
    },
    /// `partial_max_deg` was set to zero.
    InvalidPartialMaxDeg,
    /// The layer declares a hook the engine refuses to run.
    ForbiddenHook {
        /// The offending hook.
        hook: Hook,
    },
    /// The layer declares the same hook twice.
    DuplicateHook {
        /// The repeated hook.
        hook: Hook,
    },
    /// A declared parameter is malformed.
    InvalidParam {
        /// Hook declaring it.
        hook: Hook,
        /// The parameter name as declared.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// `target_to_source` flow was used with an adjacency matrix.
    FlowRequiresEdgeIndex {
        /// The supplied representation.
        representation: Representation,
    },
    /// An edge mask is installed but the call cannot honour it.
    ExplainUnsupported {
        /// Why the call was refused.
        reason: String,
    },
    /// Neither side of an edge list has a known node count.
    UnknownSize,
    /// Two sources disagree on a node count.
    SizeMismatch {
        /// `"source"` or `"target"`.
        side: &'static str,
        /// The count established first.
        expected: usize,
        /// The disagreeing count.
        actual: usize,
    },
    /// A node tensor has no axis `node_dim`.
    NodeDimOutOfRange {
        /// Argument holding the tensor.
        name: String,
        /// Configured node axis.
        node_dim: usize,
        /// Rank of the tensor.
        rank: usize,
    },
    /// The edge mask does not cover the messages.
    EdgeMaskMismatch {
        /// Number of messages.
        expected: usize,
        /// Mask length after padding.
        actual: usize,
    },
    /// Endpoint-suffixed parameters cannot be sliced from a dense matrix.
    SuffixedDenseParam {
        /// The offending parameter.
        name: String,
    },
    /// A suffixed parameter's base holds a value with no node axis.
    UnsliceableParam {
        /// The suffixed parameter.
        name: String,
        /// Kind of the base value.
        kind: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAggregation { value } => write!(
                f,
                "invalid aggregation '{value}', expected one of add, sum, mean, max, none"
            ),
            Self::InvalidFlow { value } => write!(
                f,
                "invalid flow '{value}', expected source_to_target or target_to_source"
            ),
            Self::InvalidFormat { value } => write!(
                f,
                "invalid format '{value}', expected fused, sparse, partial or unset"
            ),
            Self::InvalidPartialMaxDeg => write!(f, "partial_max_deg must be at least 1"),
            Self::ForbiddenHook { hook } => {
                write!(f, "layers may not implement the '{hook}' hook")
            }
            Self::DuplicateHook { hook } => write!(f, "hook '{hook}' declared twice"),
            Self::InvalidParam { hook, name, reason } => {
                write!(f, "invalid parameter '{name}' on '{hook}': {reason}")
            }
            Self::FlowRequiresEdgeIndex { representation } => write!(
                f,
                "flow target_to_source is only supported for edge lists, got {representation}"
            ),
            Self::ExplainUnsupported { reason } => {
                write!(f, "edge mask installed but {reason}")
            }
            Self::UnknownSize => write!(
                f,
                "cannot infer node counts: pass a size or a node tensor through an _i/_j parameter"
            ),
            Self::SizeMismatch {
                side,
                expected,
                actual,
            } => write!(
                f,
                "{side} node count mismatch: expected {expected}, got {actual}"
            ),
            Self::NodeDimOutOfRange {
                name,
                node_dim,
                rank,
            } => write!(
                f,
                "argument '{name}' has rank {rank}, no node axis {node_dim}"
            ),
            Self::EdgeMaskMismatch { expected, actual } => write!(
                f,
                "edge mask covers {actual} edges but {expected} messages were produced"
            ),
            Self::SuffixedDenseParam { name } => write!(
                f,
                "parameter '{name}' needs endpoint slicing, which dense adjacency does not support"
            ),
            Self::UnsliceableParam { name, kind } => write!(
                f,
                "parameter '{name}' needs endpoint slicing, but its base holds a {kind}"
            ),
        }
    }
}

impl Error for ConfigError {}

// ── HookError ──────────────────────────────────────────────────────

/// Failure reported by a layer hook.
#[derive(Clone, Debug, PartialEq)]
pub enum HookError {
    /// The hook has no implementation for this layer.
    NotImplemented {
        /// The missing hook.
        hook: Hook,
    },
    /// The hook read an argument it was not given.
    MissingArgument {
        /// Argument name.
        name: String,
    },
    /// An argument holds a different kind of value.
    WrongArgumentType {
        /// Argument name.
        name: String,
        /// The kind the hook asked for.
        expected: &'static str,
    },
    /// A tensor operation inside the hook failed.
    Tensor(TensorError),
    /// Any other failure.
    Failed {
        /// Human-readable cause.
        reason: String,
    },
}

impl fmt::Display for HookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotImplemented { hook } => write!(f, "hook '{hook}' is not implemented"),
            Self::MissingArgument { name } => write!(f, "missing argument '{name}'"),
            Self::WrongArgumentType { name, expected } => {
                write!(f, "argument '{name}' is not a {expected}")
            }
            Self::Tensor(e) => write!(f, "tensor: {e}"),
            Self::Failed { reason } => f.write_str(reason),
        }
    }
}

impl Error for HookError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tensor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<TensorError> for HookError {
    fn from(e: TensorError) -> Self {
        Self::Tensor(e)
    }
}

// ── PropagateError ─────────────────────────────────────────────────

/// Errors from [`Dispatcher::propagate`](crate::Dispatcher::propagate).
#[derive(Clone, Debug, PartialEq)]
pub enum PropagateError {
    /// The connectivity value is malformed or refers to unknown nodes.
    InvalidConnectivity {
        /// What is wrong with it.
        reason: String,
    },
    /// No strategy the layer supports can consume the representation.
    UnsupportedFormat {
        /// The classified representation.
        representation: Representation,
        /// The explicitly requested strategy, if any.
        requested: Option<Strategy>,
    },
    /// Construction or call arguments are inconsistent.
    Configuration(ConfigError),
    /// The selected strategy reached a hook the layer does not implement.
    NotImplemented {
        /// The missing hook.
        hook: Hook,
    },
    /// A hook's required argument was not supplied.
    MissingArgument {
        /// The hook that needed it.
        hook: Hook,
        /// Argument name.
        name: String,
    },
    /// A hook failed.
    HookFailed {
        /// The failing hook.
        hook: Hook,
        /// Its reported cause.
        reason: String,
    },
    /// A tensor operation performed by the engine failed.
    Tensor(TensorError),
}

impl PropagateError {
    /// Attribute a hook's failure to the hook.
    pub(crate) fn from_hook(hook: Hook, err: HookError) -> Self {
        match err {
            HookError::NotImplemented { hook } => Self::NotImplemented { hook },
            HookError::MissingArgument { name } => Self::MissingArgument { hook, name },
            other => Self::HookFailed {
                hook,
                reason: other.to_string(),
            },
        }
    }
}

impl fmt::Display for PropagateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConnectivity { reason } => write!(f, "invalid connectivity: {reason}"),
            Self::UnsupportedFormat {
                representation,
                requested: Some(strategy),
            } => write!(
                f,
                "strategy '{strategy}' is not available for {representation} with this layer"
            ),
            Self::UnsupportedFormat {
                representation,
                requested: None,
            } => write!(f, "layer implements no strategy for {representation}"),
            Self::Configuration(e) => write!(f, "configuration: {e}"),
            Self::NotImplemented { hook } => write!(f, "hook '{hook}' is not implemented"),
            Self::MissingArgument { hook, name } => {
                write!(f, "hook '{hook}' requires argument '{name}'")
            }
            Self::HookFailed { hook, reason } => write!(f, "hook '{hook}' failed: {reason}"),
            Self::Tensor(e) => write!(f, "tensor: {e}"),
        }
    }
}

impl Error for PropagateError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::Tensor(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for PropagateError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e)
    }
}

impl From<TensorError> for PropagateError {
    fn from(e: TensorError) -> Self {
        Self::Tensor(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hook_errors_are_attributed() {
        let e = PropagateError::from_hook(
            Hook::Message,
            HookError::MissingArgument { name: "x_j".into() },
        );
        assert_eq!(
            e,
            PropagateError::MissingArgument {
                hook: Hook::Message,
                name: "x_j".into()
            }
        );
        let e = PropagateError::from_hook(
            Hook::Aggregate,
            HookError::NotImplemented {
                hook: Hook::Aggregate,
            },
        );
        assert!(matches!(e, PropagateError::NotImplemented { hook: Hook::Aggregate }));
        let e = PropagateError::from_hook(Hook::Message, HookError::Failed { reason: "nan".into() });
        assert_eq!(e.to_string(), "hook 'message' failed: nan");
    }

    #[test]
    fn source_chains_nested_errors() {
        let e: PropagateError = ConfigError::UnknownSize.into();
        assert!(e.source().is_some());
        let e: PropagateError = TensorError::AxisOutOfRange { axis: 2, rank: 1 }.into();
        assert!(e.source().is_some());
        assert!(PropagateError::NotImplemented { hook: Hook::Message }
            .source()
            .is_none());
    }
}
