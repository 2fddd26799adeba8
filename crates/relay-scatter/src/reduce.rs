//! The [`Reduce`] enum and the host-side running maximum.

use std::fmt;

/// Reduction applied to the members of each group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Reduce {
    /// Sum of the members. Empty groups yield 0.
    Sum,
    /// Arithmetic mean of the members. Empty groups yield 0.
    Mean,
    /// Elementwise maximum of the members. Empty groups yield 0.
    Max,
}

impl fmt::Display for Reduce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Mean => write!(f, "mean"),
            Self::Max => write!(f, "max"),
        }
    }
}

/// Running maximum over a flat set of output slots.
///
/// candle has `index_add` but no max-scatter, so the max kernels feed
/// every routed element through here. Slots that never receive a value
/// finish as 0.
pub(crate) struct Maxima {
    values: Vec<f32>,
    seen: Vec<bool>,
}

impl Maxima {
    pub(crate) fn new(slots: usize) -> Self {
        Self {
            values: vec![f32::NEG_INFINITY; slots],
            seen: vec![false; slots],
        }
    }

    #[inline]
    pub(crate) fn push(&mut self, slot: usize, value: f32) {
        if !self.seen[slot] || value > self.values[slot] {
            self.values[slot] = value;
        }
        self.seen[slot] = true;
    }

    pub(crate) fn finish(mut self) -> Vec<f32> {
        for (v, &seen) in self.values.iter_mut().zip(&self.seen) {
            if !seen {
                *v = 0.0;
            }
        }
        self.values
    }
}

/// `1 / max(count, 1)` per group, the divisor of a mean with empty groups.
pub(crate) fn inverse_counts(counts: &[usize]) -> Vec<f32> {
    counts.iter().map(|&c| 1.0 / c.max(1) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slots_are_zero() {
        assert_eq!(Maxima::new(2).finish(), vec![0.0, 0.0]);
    }

    #[test]
    fn max_keeps_negative_values() {
        let mut acc = Maxima::new(1);
        acc.push(0, -3.0);
        acc.push(0, -1.5);
        acc.push(0, -2.0);
        assert_eq!(acc.finish(), vec![-1.5]);
    }

    #[test]
    fn empty_groups_divide_by_one() {
        assert_eq!(inverse_counts(&[2, 0, 4]), vec![0.5, 1.0, 0.25]);
    }
}
