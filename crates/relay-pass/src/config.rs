//! Dispatcher construction parameters.
//!
//! [`DispatchConfig`] is a plain struct with defaults matching the common
//! case (sum aggregation, source-to-target flow, automatic format).
//! [`validate()`](DispatchConfig::validate) is called by
//! [`Dispatcher::new`](crate::Dispatcher::new). Every enum parses from its
//! string form so configurations can be read from text.

use std::fmt;
use std::str::FromStr;

use relay_scatter::Reduce;

use crate::error::ConfigError;
use crate::format::Strategy;

// ── Aggregation ────────────────────────────────────────────────────

/// The reduction a layer applies to incoming messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Aggregation {
    /// Sum of messages.
    #[default]
    Add,
    /// Alias of [`Add`](Self::Add).
    Sum,
    /// Mean of messages.
    Mean,
    /// Elementwise maximum of messages.
    Max,
    /// No built-in reduction; the layer must provide its own aggregator.
    None,
}

impl Aggregation {
    /// The scatter reduction implementing this aggregation.
    pub fn reduce(self) -> Option<Reduce> {
        match self {
            Self::Add | Self::Sum => Some(Reduce::Sum),
            Self::Mean => Some(Reduce::Mean),
            Self::Max => Some(Reduce::Max),
            Self::None => None,
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "add",
            Self::Sum => "sum",
            Self::Mean => "mean",
            Self::Max => "max",
            Self::None => "none",
        })
    }
}

impl FromStr for Aggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "sum" => Ok(Self::Sum),
            "mean" => Ok(Self::Mean),
            "max" => Ok(Self::Max),
            "none" => Ok(Self::None),
            other => Err(ConfigError::InvalidAggregation {
                value: other.to_string(),
            }),
        }
    }
}

// ── Flow ───────────────────────────────────────────────────────────

/// Direction messages travel along an edge list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Flow {
    /// Row 0 sends, row 1 receives.
    #[default]
    SourceToTarget,
    /// Row 1 sends, row 0 receives. Edge lists only.
    TargetToSource,
}

impl Flow {
    /// Edge-list rows holding the `(receiving, sending)` node ids.
    pub fn rows(self) -> (usize, usize) {
        match self {
            Self::SourceToTarget => (1, 0),
            Self::TargetToSource => (0, 1),
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SourceToTarget => "source_to_target",
            Self::TargetToSource => "target_to_source",
        })
    }
}

impl FromStr for Flow {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "source_to_target" => Ok(Self::SourceToTarget),
            "target_to_source" => Ok(Self::TargetToSource),
            other => Err(ConfigError::InvalidFlow {
                value: other.to_string(),
            }),
        }
    }
}

// ── DispatchConfig ─────────────────────────────────────────────────

/// Construction parameters of a [`Dispatcher`](crate::Dispatcher).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Reduction used by the reference aggregators. Default: `add`.
    pub aggr: Aggregation,
    /// Message direction. Default: `source_to_target`.
    pub flow: Flow,
    /// Explicit strategy for adjacency-matrix inputs. Default: automatic.
    pub format: Option<Strategy>,
    /// Axis of node tensors that indexes nodes. Default: 0.
    pub node_dim: usize,
    /// Maximum neighbours per row in a partial bin; longer rows are split.
    pub partial_max_deg: Option<usize>,
    /// Group partial rows by power-of-two degree class. Default: `true`.
    pub partial_binning: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            aggr: Aggregation::Add,
            flow: Flow::SourceToTarget,
            format: None,
            node_dim: 0,
            partial_max_deg: None,
            partial_binning: true,
        }
    }
}

impl DispatchConfig {
    /// Default configuration with the given aggregation.
    pub fn with_aggr(aggr: Aggregation) -> Self {
        Self {
            aggr,
            ..Self::default()
        }
    }

    /// Parse a format string; `"unset"` (or empty) selects automatic
    /// resolution.
    pub fn parse_format(s: &str) -> Result<Option<Strategy>, ConfigError> {
        match s {
            "" | "unset" => Ok(None),
            other => other.parse().map(Some),
        }
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partial_max_deg == Some(0) {
            return Err(ConfigError::InvalidPartialMaxDeg);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = DispatchConfig::default();
        assert_eq!(cfg.aggr, Aggregation::Add);
        assert_eq!(cfg.flow, Flow::SourceToTarget);
        assert!(cfg.partial_binning);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_max_degree_rejected() {
        let cfg = DispatchConfig {
            partial_max_deg: Some(0),
            ..DispatchConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidPartialMaxDeg));
    }

    #[test]
    fn enums_parse_from_strings() {
        assert_eq!("mean".parse::<Aggregation>(), Ok(Aggregation::Mean));
        assert_eq!("target_to_source".parse::<Flow>(), Ok(Flow::TargetToSource));
        assert_eq!(DispatchConfig::parse_format("unset"), Ok(None));
        assert_eq!(
            DispatchConfig::parse_format("partial"),
            Ok(Some(Strategy::Partial))
        );
        assert!(matches!(
            "avg".parse::<Aggregation>(),
            Err(ConfigError::InvalidAggregation { .. })
        ));
        assert!(matches!(
            "sideways".parse::<Flow>(),
            Err(ConfigError::InvalidFlow { .. })
        ));
        assert!(matches!(
            DispatchConfig::parse_format("csr"),
            Err(ConfigError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn aggregations_map_to_reductions() {
        assert_eq!(Aggregation::Add.reduce(), Some(Reduce::Sum));
        assert_eq!(Aggregation::Sum.reduce(), Some(Reduce::Sum));
        assert_eq!(Aggregation::None.reduce(), None);
        assert_eq!(Aggregation::Max.to_string(), "max");
    }
}
