//! Dense projection applied by layers outside propagation.

use relay_core::{Tensor, TensorError};

/// A `[in, out]` weight matrix with an optional `[out]` bias.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Linear {
    weight: Tensor,
    bias: Option<Tensor>,
}

impl Linear {
    pub(crate) fn new(weight: Tensor) -> Result<Self, TensorError> {
        if weight.rank() != 2 {
            return Err(TensorError::InvalidShape {
                reason: format!("weight must be [in, out], got {:?}", weight.shape()),
            });
        }
        Ok(Self { weight, bias: None })
    }

    pub(crate) fn with_bias(mut self, bias: Vec<f32>) -> Result<Self, TensorError> {
        let out = self.out_channels();
        if bias.len() != out {
            return Err(TensorError::ShapeMismatch {
                expected: vec![out],
                actual: vec![bias.len()],
            });
        }
        self.bias = Some(Tensor::from_vec(bias)?);
        Ok(self)
    }

    pub(crate) fn in_channels(&self) -> usize {
        self.weight.shape()[0]
    }

    pub(crate) fn out_channels(&self) -> usize {
        self.weight.shape()[1]
    }

    /// `x · W` for `x` of shape `[N, in]`.
    pub(crate) fn project(&self, x: &Tensor) -> Result<Tensor, TensorError> {
        x.matmul(&self.weight)
    }

    /// Add the bias, if any, to every row of `[N, out]`.
    pub(crate) fn add_bias(&self, out: Tensor) -> Result<Tensor, TensorError> {
        match &self.bias {
            Some(bias) => Tensor::from_candle(out.as_candle().broadcast_add(bias.as_candle())?),
            None => Ok(out),
        }
    }

    /// `x · W + b`.
    pub(crate) fn apply(&self, x: &Tensor) -> Result<Tensor, TensorError> {
        self.add_bias(self.project(x)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bias_is_added_per_row() {
        let lin = Linear::new(Tensor::new(&[2, 1], vec![1.0, 2.0]).unwrap())
            .unwrap()
            .with_bias(vec![0.5])
            .unwrap();
        let x = Tensor::new(&[2, 2], vec![1.0, 1.0, 0.0, 3.0]).unwrap();
        assert_eq!(lin.apply(&x).unwrap().to_vec().unwrap(), &[3.5, 6.5]);
        assert_eq!((lin.in_channels(), lin.out_channels()), (2, 1));
    }

    #[test]
    fn shapes_are_checked() {
        assert!(Linear::new(Tensor::zeros(&[3]).unwrap()).is_err());
        let lin = Linear::new(Tensor::zeros(&[2, 2]).unwrap()).unwrap();
        assert!(lin.with_bias(vec![0.0]).is_err());
    }
}
