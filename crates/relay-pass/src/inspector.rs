//! Capability inspection.
//!
//! [`Capabilities::inspect`] runs once at dispatcher construction. It turns
//! a layer's declared [`Signature`]s into a flag table (which hooks are
//! implemented) and a binding table (how every declared parameter is
//! resolved), so nothing is re-derived per call.

use crate::config::Aggregation;
use crate::error::ConfigError;
use crate::layer::{Hook, Signature};

/// Names the collectors inject themselves. They are never endpoint-sliced,
/// even when they end in `_i` or `_j`.
pub const STRUCTURAL_PARAMS: [&str; 9] = [
    "adj_t",
    "edge_index_i",
    "edge_index_j",
    "index",
    "ptr",
    "size_i",
    "size_j",
    "dim_size",
    "mask",
];

/// Which side of an edge a suffixed parameter is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `_i`: the receiving node.
    I,
    /// `_j`: the sending node.
    J,
}

/// How one declared parameter is resolved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamBinding {
    /// The declared name.
    pub name: String,
    /// Argument the value is derived from (the name without its suffix).
    pub base: String,
    /// Endpoint to slice at, for `_i`/`_j` parameters.
    pub endpoint: Option<Endpoint>,
    /// Whether the hook fails without it.
    pub required: bool,
}

impl ParamBinding {
    fn parse(hook: Hook, name: &str, required: bool) -> Result<Self, ConfigError> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ConfigError::InvalidParam {
                hook,
                name: name.to_string(),
                reason: "names must be non-empty and contain no whitespace",
            });
        }
        if name == "_i" || name == "_j" {
            return Err(ConfigError::InvalidParam {
                hook,
                name: name.to_string(),
                reason: "endpoint suffix without a base name",
            });
        }
        let endpoint = if STRUCTURAL_PARAMS.contains(&name) {
            None
        } else if name.ends_with("_i") {
            Some(Endpoint::I)
        } else if name.ends_with("_j") {
            Some(Endpoint::J)
        } else {
            None
        };
        let base = match endpoint {
            Some(_) => &name[..name.len() - 2],
            None => name,
        };
        Ok(Self {
            name: name.to_string(),
            base: base.to_string(),
            endpoint,
            required,
        })
    }
}

/// What a layer can do, derived from its signatures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capabilities {
    implemented: [bool; 6],
    bindings: [Vec<ParamBinding>; 6],
    has_builtin_aggr: bool,
}

impl Capabilities {
    /// Build the capability record for a layer.
    ///
    /// # Errors
    ///
    /// [`ConfigError`] if a signature declares [`Hook::Update`], a hook is
    /// declared twice, or a parameter name is empty, malformed, or repeated
    /// within one hook.
    pub fn inspect(signatures: &[Signature], aggr: Aggregation) -> Result<Self, ConfigError> {
        let mut implemented = [false; 6];
        let mut bindings: [Vec<ParamBinding>; 6] = Default::default();

        for sig in signatures {
            let hook = sig.hook();
            let slot = hook.slot().ok_or(ConfigError::ForbiddenHook { hook })?;
            if implemented[slot] {
                return Err(ConfigError::DuplicateHook { hook });
            }
            implemented[slot] = true;
            bindings[slot] = parse_params(sig)?;
        }

        // Unimplemented aggregators fall back to the reference reductions,
        // which consume the structural layout.
        for hook in [Hook::Aggregate, Hook::PartialAggregate] {
            if let Some(slot) = hook.slot() {
                if !implemented[slot] {
                    bindings[slot] = parse_params(&hook.default_signature())?;
                }
            }
        }

        Ok(Self {
            implemented,
            bindings,
            has_builtin_aggr: aggr.reduce().is_some(),
        })
    }

    /// Whether the layer declared `hook`.
    pub fn implements(&self, hook: Hook) -> bool {
        hook.slot().is_some_and(|s| self.implemented[s])
    }

    /// Parameter bindings the engine supplies to `hook`.
    pub fn bindings(&self, hook: Hook) -> &[ParamBinding] {
        match hook.slot() {
            Some(s) => &self.bindings[s],
            None => &[],
        }
    }

    /// Union of the bindings of `hooks`, in declaration order.
    pub(crate) fn bindings_for(&self, hooks: &[Hook]) -> Vec<&ParamBinding> {
        hooks.iter().flat_map(|&h| self.bindings(h)).collect()
    }

    /// The layer implements `sparse_message_and_aggregate`.
    pub fn supports_fused_sparse(&self) -> bool {
        self.implements(Hook::SparseMessageAndAggregate)
    }

    /// The layer implements `dense_message_and_aggregate`.
    pub fn supports_fused_dense(&self) -> bool {
        self.implements(Hook::DenseMessageAndAggregate)
    }

    /// `message` plus an aggregator (its own or a built-in reduction).
    pub fn supports_sparse(&self) -> bool {
        self.implements(Hook::Message)
            && (self.implements(Hook::Aggregate) || self.has_builtin_aggr)
    }

    /// `partial_message` plus a partial aggregator.
    pub fn supports_partial(&self) -> bool {
        self.implements(Hook::PartialMessage)
            && (self.implements(Hook::PartialAggregate) || self.has_builtin_aggr)
    }
}

fn parse_params(sig: &Signature) -> Result<Vec<ParamBinding>, ConfigError> {
    let mut out: Vec<ParamBinding> = Vec::with_capacity(sig.params().len());
    for p in sig.params() {
        if out.iter().any(|b| b.name == p.name) {
            return Err(ConfigError::InvalidParam {
                hook: sig.hook(),
                name: p.name.clone(),
                reason: "declared twice",
            });
        }
        out.push(ParamBinding::parse(sig.hook(), &p.name, p.required)?);
    }
    Ok(out)
}
