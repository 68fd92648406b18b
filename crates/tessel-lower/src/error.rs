//! Error types for lowering.

use tessel_ir::IrError;
use tessel_program::{AtomicOp, DType, PrimitiveKind, ProgramError};

/// Errors raised while lowering a program to kernel IR.
///
/// Lowering is all-or-nothing: any error aborts the whole kernel.
#[derive(Debug, thiserror::Error)]
pub enum LowerError {
    /// No rule is registered for this primitive.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(PrimitiveKind),

    #[error("atomic {op} is not supported for {dtype}")]
    UnsupportedAtomicType { op: AtomicOp, dtype: DType },

    #[error("shape mismatch: expected {expected:?}, found {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("variable v{0} is used before it is defined")]
    UnboundVariable(u32),

    #[error("axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    #[error(transparent)]
    Ir(#[from] IrError),

    #[error(transparent)]
    Program(ProgramError),
}

impl From<ProgramError> for LowerError {
    fn from(err: ProgramError) -> Self {
        match err {
            ProgramError::UnsupportedAtomicType { op, dtype } => {
                Self::UnsupportedAtomicType { op, dtype }
            }
            ProgramError::ShapeMismatch { expected, found } => Self::ShapeMismatch {
                expected,
                actual: found,
            },
            ProgramError::NotImplemented(feature) => Self::NotImplemented(feature),
            other => Self::Program(other),
        }
    }
}

impl LowerError {
    pub(crate) fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented(feature.into())
    }
}
