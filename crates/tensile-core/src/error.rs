use crate::dtype::DType;
use crate::shape::Shape;

/// All errors that can occur within Tensile.
///
/// Every failure is a contract violation surfaced to the caller immediately:
/// incompatible shapes, out-of-range indices, iterator misuse, operations on
/// element types that do not support them, and gradient requests that cannot
/// be honoured.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Two operands cannot be combined (broadcast, elementwise, matmul, ...).
    #[error("shape mismatch in {op}: {lhs} vs {rhs}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Shape,
        rhs: Shape,
    },

    /// A logical index is beyond the extent of its dimension.
    #[error("index {index} out of range for dim {dim} with extent {extent}")]
    IndexOutOfRange {
        dim: usize,
        index: usize,
        extent: usize,
    },

    /// Dimension index out of range for the array's rank.
    #[error("dimension out of range: dim {dim} for array with {rank} dimensions")]
    DimOutOfRange { dim: usize, rank: usize },

    /// `next_offset()` was called on an exhausted pointer iterator.
    #[error("pointer iterator has no elements left")]
    OutOfElements,

    /// The operation is not defined for this element type.
    #[error("{op} is not supported for element type {dtype}")]
    UnsupportedElementType { op: &'static str, dtype: DType },

    /// Gradient machinery was invoked on a tensor that cannot carry a gradient.
    #[error("ungraded tensor: {reason}")]
    UngradedTensor { reason: String },

    /// Element count mismatch when creating from a buffer or reshaping.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// Tensors from two different graphs were combined.
    #[error("tensor belongs to a different graph")]
    ForeignTensor,

    /// Generic message for cases not covered above.
    #[error("{0}")]
    Msg(String),
}

impl Error {
    /// Create an error from any string message.
    pub fn msg(s: impl Into<String>) -> Self {
        Error::Msg(s.into())
    }

    pub(crate) fn shape_mismatch(op: &'static str, lhs: &Shape, rhs: &Shape) -> Self {
        Error::ShapeMismatch {
            op,
            lhs: lhs.clone(),
            rhs: rhs.clone(),
        }
    }

    pub(crate) fn ungraded(reason: impl Into<String>) -> Self {
        Error::UngradedTensor {
            reason: reason.into(),
        }
    }
}

/// Convenience Result type used throughout Tensile.
pub type Result<T> = std::result::Result<T, Error>;

/// Early return with a formatted error message.
/// Usage: `bail!("something went wrong: {}", detail)`
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::Error::Msg(format!($($arg)*)))
    };
}
