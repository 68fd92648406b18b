//! Error types for program construction and transformation.

use crate::dtype::DType;
use crate::primitive::AtomicOp;

/// Errors raised while building, checking or rewriting a [`Program`](crate::Program).
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("unknown variable v{0}")]
    UnknownVariable(u32),

    #[error("{primitive}: expected {expected} operands, found {found}")]
    Arity {
        primitive: String,
        expected: usize,
        found: usize,
    },

    #[error("{primitive}: type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        primitive: String,
        expected: String,
        found: String,
    },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// The element type cannot be updated atomically with this operation.
    #[error("atomic {op} is not supported for {dtype}")]
    UnsupportedAtomicType { op: AtomicOp, dtype: DType },

    #[error("invalid indexer: {0}")]
    InvalidIndexer(String),

    #[error("axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid block mapping: {0}")]
    InvalidBlockMapping(String),

    /// An extent or element count does not fit the kernel's `i32` indices.
    #[error("{0} exceeds the 32-bit index range")]
    IndexOverflow(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),
}
