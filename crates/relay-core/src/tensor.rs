//! Dense `f32` tensors on the candle CPU backend, plus axis arithmetic.

use candle_core::{DType, Device};
use smallvec::SmallVec;

use crate::error::TensorError;

/// Tensor shape.
///
/// Uses `SmallVec<[usize; 4]>` so node feature matrices, per-edge messages
/// and binned neighbourhoods (rank ≤ 4) never allocate for their shape.
pub type Shape = SmallVec<[usize; 4]>;

/// View of a tensor as `outer × len × inner` around one axis.
///
/// Element `(o, k, n)` lives at `o * len * inner + k * inner + n` in the
/// row-major buffer returned by [`Tensor::to_vec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxisLayout {
    /// Product of the dimensions before the axis.
    pub outer: usize,
    /// Length of the axis.
    pub len: usize,
    /// Product of the dimensions after the axis.
    pub inner: usize,
}

impl AxisLayout {
    /// Flat offset of element `(o, k, n)`.
    #[inline]
    pub fn offset(&self, o: usize, k: usize, n: usize) -> usize {
        (o * self.len + k) * self.inner + n
    }
}

/// A `u32` candle index vector holding `ids`.
pub fn index_vector(ids: &[usize]) -> Result<candle_core::Tensor, TensorError> {
    let ids = ids
        .iter()
        .map(|&id| {
            u32::try_from(id).map_err(|_| TensorError::IndexOutOfBounds {
                index: id,
                bound: u32::MAX as usize,
            })
        })
        .collect::<Result<Vec<u32>, _>>()?;
    let len = ids.len();
    Ok(candle_core::Tensor::from_vec(ids, len, &Device::Cpu)?)
}

/// A dense `f32` tensor.
///
/// Wraps a [`candle_core::Tensor`] on the CPU device. Node features are
/// indexed along a configurable node axis; per-edge messages share the
/// same layout with the node axis replaced by the edge axis. Operations
/// never broadcast implicitly: shape agreement is checked up front and
/// reported through [`TensorError`].
#[derive(Clone, Debug)]
pub struct Tensor {
    inner: candle_core::Tensor,
}

impl Tensor {
    /// Create a tensor from a shape and a row-major buffer.
    pub fn new(shape: &[usize], data: Vec<f32>) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::DataLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            inner: candle_core::Tensor::from_vec(data, shape, &Device::Cpu)?,
        })
    }

    /// Adopt a candle tensor, converting it to `f32` on the CPU.
    pub fn from_candle(inner: candle_core::Tensor) -> Result<Self, TensorError> {
        Ok(Self {
            inner: inner
                .to_device(&Device::Cpu)?
                .to_dtype(DType::F32)?
                .contiguous()?,
        })
    }

    /// The underlying candle tensor.
    pub fn as_candle(&self) -> &candle_core::Tensor {
        &self.inner
    }

    /// Create a rank-1 tensor.
    pub fn from_vec(data: Vec<f32>) -> Result<Self, TensorError> {
        let len = data.len();
        Self::new(&[len], data)
    }

    /// Create a rank-2 tensor from equally long rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, TensorError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(TensorError::ShapeMismatch {
                    expected: vec![cols],
                    actual: vec![row.len()],
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(&[rows.len(), cols], data)
    }

    /// A tensor filled with `value`.
    pub fn full(shape: &[usize], value: f32) -> Result<Self, TensorError> {
        Ok(Self {
            inner: candle_core::Tensor::full(value, shape, &Device::Cpu)?.contiguous()?,
        })
    }

    /// A tensor of zeros.
    pub fn zeros(shape: &[usize]) -> Result<Self, TensorError> {
        Ok(Self {
            inner: candle_core::Tensor::zeros(shape, DType::F32, &Device::Cpu)?,
        })
    }

    /// A tensor of ones.
    pub fn ones(shape: &[usize]) -> Result<Self, TensorError> {
        Self::full(shape, 1.0)
    }

    /// The shape.
    pub fn shape(&self) -> &[usize] {
        self.inner.dims()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.inner.rank()
    }

    /// Length of one axis.
    pub fn dim(&self, axis: usize) -> Result<usize, TensorError> {
        self.shape()
            .get(axis)
            .copied()
            .ok_or(TensorError::AxisOutOfRange {
                axis,
                rank: self.rank(),
            })
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.inner.elem_count()
    }

    /// Copy the elements out in row-major order.
    pub fn to_vec(&self) -> Result<Vec<f32>, TensorError> {
        Ok(self.inner.flatten_all()?.to_vec1::<f32>()?)
    }

    /// Decompose the tensor around `axis`.
    pub fn layout(&self, axis: usize) -> Result<AxisLayout, TensorError> {
        let len = self.dim(axis)?;
        let shape = self.shape();
        Ok(AxisLayout {
            outer: shape[..axis].iter().product(),
            len,
            inner: shape[axis + 1..].iter().product(),
        })
    }

    /// Copy of the shape with `axis` resized to `len`.
    pub fn shape_with(&self, axis: usize, len: usize) -> Result<Shape, TensorError> {
        self.dim(axis)?;
        let mut shape = Shape::from_slice(self.shape());
        shape[axis] = len;
        Ok(shape)
    }

    /// Reinterpret the elements under a new shape with the same count.
    pub fn reshape(self, shape: &[usize]) -> Result<Self, TensorError> {
        let expected: usize = shape.iter().product();
        if expected != self.numel() {
            return Err(TensorError::DataLength {
                expected,
                actual: self.numel(),
            });
        }
        Ok(Self {
            inner: self.inner.reshape(shape)?,
        })
    }

    /// Gather slices along `axis` at `ids`, in order. Ids may repeat.
    pub fn index_select(&self, axis: usize, ids: &[usize]) -> Result<Self, TensorError> {
        let len = self.dim(axis)?;
        if let Some(&bad) = ids.iter().find(|&&id| id >= len) {
            return Err(TensorError::IndexOutOfBounds {
                index: bad,
                bound: len,
            });
        }
        if ids.is_empty() {
            return Self::zeros(&self.shape_with(axis, 0)?);
        }
        Ok(Self {
            inner: self.inner.index_select(&index_vector(ids)?, axis)?,
        })
    }

    /// Like [`index_select`](Self::index_select), but `None` entries produce
    /// zero-filled slices. Used to pad ragged neighbourhoods.
    pub fn index_select_padded(
        &self,
        axis: usize,
        ids: &[Option<usize>],
    ) -> Result<Self, TensorError> {
        let len = self.dim(axis)?;
        if let Some(bad) = ids.iter().flatten().find(|&&id| id >= len) {
            return Err(TensorError::IndexOutOfBounds {
                index: *bad,
                bound: len,
            });
        }
        if ids.is_empty() {
            return Self::zeros(&self.shape_with(axis, 0)?);
        }
        // One zero slice is appended at position `len` for the padding.
        let pad = candle_core::Tensor::zeros(
            self.shape_with(axis, 1)?.as_slice(),
            DType::F32,
            &Device::Cpu,
        )?;
        let extended = candle_core::Tensor::cat(&[&self.inner, &pad], axis)?;
        let slots: Vec<usize> = ids.iter().map(|id| id.unwrap_or(len)).collect();
        Ok(Self {
            inner: extended.index_select(&index_vector(&slots)?, axis)?,
        })
    }

    /// Elementwise logistic sigmoid.
    pub fn sigmoid(&self) -> Result<Self, TensorError> {
        Ok(Self {
            inner: candle_nn::ops::sigmoid(&self.inner)?,
        })
    }

    /// Elementwise sum of two equally shaped tensors.
    pub fn add(&self, other: &Self) -> Result<Self, TensorError> {
        if self.shape() != other.shape() {
            return Err(TensorError::ShapeMismatch {
                expected: self.shape().to_vec(),
                actual: other.shape().to_vec(),
            });
        }
        Ok(Self {
            inner: self.inner.add(&other.inner)?,
        })
    }

    /// Multiply every slice along `axis` by the matching weight.
    ///
    /// This is the broadcast used for per-edge weights and edge masks:
    /// `weights.len()` must equal the axis length.
    pub fn scale_along(&self, axis: usize, weights: &[f32]) -> Result<Self, TensorError> {
        let len = self.dim(axis)?;
        if weights.len() != len {
            return Err(TensorError::ShapeMismatch {
                expected: vec![len],
                actual: vec![weights.len()],
            });
        }
        let mut shape = vec![1usize; self.rank()];
        shape[axis] = len;
        let w = candle_core::Tensor::from_vec(weights.to_vec(), shape, &Device::Cpu)?;
        Ok(Self {
            inner: self.inner.broadcast_mul(&w)?,
        })
    }

    /// Concatenate tensors along `axis`. All other dimensions must agree.
    pub fn cat(tensors: &[&Self], axis: usize) -> Result<Self, TensorError> {
        let first = tensors.first().ok_or_else(|| TensorError::InvalidShape {
            reason: "cannot concatenate zero tensors".into(),
        })?;
        first.dim(axis)?;
        for t in tensors {
            let agrees = t.rank() == first.rank()
                && t.shape()
                    .iter()
                    .zip(first.shape())
                    .enumerate()
                    .all(|(a, (x, y))| a == axis || x == y);
            if !agrees {
                return Err(TensorError::ShapeMismatch {
                    expected: first.shape().to_vec(),
                    actual: t.shape().to_vec(),
                });
            }
        }
        let inners: Vec<&candle_core::Tensor> = tensors.iter().map(|t| &t.inner).collect();
        Ok(Self {
            inner: candle_core::Tensor::cat(&inners, axis)?,
        })
    }

    /// Rank-2 matrix product `self · other`.
    pub fn matmul(&self, other: &Self) -> Result<Self, TensorError> {
        if self.rank() != 2 || other.rank() != 2 || self.shape()[1] != other.shape()[0] {
            return Err(TensorError::InvalidShape {
                reason: format!("cannot multiply {:?} by {:?}", self.shape(), other.shape()),
            });
        }
        Ok(Self {
            inner: self.inner.matmul(&other.inner)?,
        })
    }

    /// Swap the two axes of a rank-2 tensor.
    pub fn transpose(&self) -> Result<Self, TensorError> {
        if self.rank() != 2 {
            return Err(TensorError::InvalidShape {
                reason: format!("transpose needs rank 2, got shape {:?}", self.shape()),
            });
        }
        Ok(Self {
            inner: self.inner.t()?.contiguous()?,
        })
    }

    /// Whether two tensors have the same shape and every element pair
    /// differs by at most `tol * max(1, |a|, |b|)`.
    pub fn approx_eq(&self, other: &Self, tol: f32) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        match (self.to_vec(), other.to_vec()) {
            (Ok(a), Ok(b)) => a.iter().zip(&b).all(|(&a, &b)| {
                let scale = 1.0f32.max(a.abs()).max(b.abs());
                (a - b).abs() <= tol * scale || (a.is_nan() && b.is_nan())
            }),
            _ => false,
        }
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape()
            && matches!((self.to_vec(), other.to_vec()), (Ok(a), Ok(b)) if a == b)
    }
}
