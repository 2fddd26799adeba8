//! Error type shared by every numeric operation in the workspace.

use std::error::Error;
use std::fmt;

/// Errors from tensor construction and tensor arithmetic.
///
/// Returned by [`Tensor`](crate::Tensor), [`IndexTensor`](crate::IndexTensor)
/// and [`SparseTensor`](crate::SparseTensor) operations, and by the reduction
/// kernels in `relay-scatter`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TensorError {
    /// Two operands (or an operand and its expected shape) disagree.
    ShapeMismatch {
        /// The shape the operation required.
        expected: Vec<usize>,
        /// The shape it received.
        actual: Vec<usize>,
    },
    /// The backing buffer length does not match the product of the shape.
    DataLength {
        /// Number of elements implied by the shape.
        expected: usize,
        /// Number of elements supplied.
        actual: usize,
    },
    /// An axis argument is not smaller than the tensor rank.
    AxisOutOfRange {
        /// The requested axis.
        axis: usize,
        /// Rank of the tensor.
        rank: usize,
    },
    /// An index points past the end of the indexed dimension.
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// Length of the indexed dimension.
        bound: usize,
    },
    /// A CSR row pointer is malformed (empty, decreasing, or not ending at
    /// the segment length).
    InvalidPointer {
        /// Description of the defect.
        reason: String,
    },
    /// The shape itself is unusable for the requested operation.
    InvalidShape {
        /// Description of the defect.
        reason: String,
    },
    /// The candle backend rejected an operation.
    Backend {
        /// The backend's message.
        reason: String,
    },
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShapeMismatch { expected, actual } => {
                write!(f, "shape mismatch: expected {expected:?}, got {actual:?}")
            }
            Self::DataLength { expected, actual } => {
                write!(f, "shape implies {expected} elements, buffer holds {actual}")
            }
            Self::AxisOutOfRange { axis, rank } => {
                write!(f, "axis {axis} out of range for rank-{rank} tensor")
            }
            Self::IndexOutOfBounds { index, bound } => {
                write!(f, "index {index} out of bounds for dimension of size {bound}")
            }
            Self::InvalidPointer { reason } => write!(f, "invalid row pointer: {reason}"),
            Self::InvalidShape { reason } => write!(f, "invalid shape: {reason}"),
            Self::Backend { reason } => write!(f, "backend: {reason}"),
        }
    }
}

impl Error for TensorError {}

impl From<candle_core::Error> for TensorError {
    fn from(e: candle_core::Error) -> Self {
        Self::Backend {
            reason: e.to_string(),
        }
    }
}
