use crate::dtype::DType;
use thiserror::Error;

/// Everything a dispatch call can reject. Any `Err` means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantError {
    #[error("unsupported type combination: {from} -> {to}")]
    Unsupported { from: DType, to: DType },

    #[error("invalid shift {shift}: must be in [{min}, 62]")]
    InvalidShift { shift: i32, min: i32 },

    #[error("buffer too small: need {needed} bytes, got {got}")]
    BufferTooSmall { needed: usize, got: usize },

    #[error("multiplier {0} outside the Q31 range [-2^31, 2^31]")]
    InvalidMultiplier(i64),

    #[error("operand {0} outside the 8-bit range [-128, 255]")]
    OperandOutOfRange(i32),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid element width {0} (expected 1, 2 or 4 bytes)")]
    InvalidElementWidth(usize),

    #[error("invalid permutation {0:?}")]
    InvalidPermutation([usize; 4]),
}

pub type Result<T> = std::result::Result<T, QuantError>;
