//! Error types for kernel interpretation.

/// Errors raised while running a kernel.
#[derive(Debug, thiserror::Error)]
pub enum InterpError {
    #[error("module has no entry point")]
    NoEntryPoint,

    #[error("expected {expected} kernel arguments, found {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("kernel argument {index} must be {expected}")]
    ArgumentType { index: usize, expected: String },

    #[error("unknown buffer {0}")]
    UnknownBuffer(usize),

    /// A lane addressed memory outside its buffer.
    #[error("offset {offset} out of bounds for buffer {buffer} (length: {len})")]
    OutOfBounds { buffer: usize, offset: i64, len: usize },

    #[error("integer division by zero")]
    DivisionByZero,

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// An operand was read before the statement that defines it ran.
    #[error("expression {0} used before it was evaluated")]
    Unevaluated(usize),

    #[error("launch grid {0:?} has more than three axes")]
    InvalidGrid(Vec<usize>),

    #[error("loop step must be positive, found {0}")]
    InvalidStep(i64),

    #[error(transparent)]
    Shape(#[from] ndarray::ShapeError),
}
