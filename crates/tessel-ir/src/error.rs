//! Error types for kernel IR construction.

/// Errors raised by the [`Builder`](crate::Builder) when an operation is ill-typed.
#[derive(Debug, thiserror::Error)]
pub enum IrError {
    /// A handle index is out of bounds for its arena.
    #[error("handle index {index} out of bounds (arena size: {size})")]
    BadHandle { index: usize, size: usize },

    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("rank mismatch: expected rank {expected}, found rank {found}")]
    RankMismatch { expected: usize, found: usize },

    #[error("axis {axis} out of range for rank {rank}")]
    InvalidAxis { axis: usize, rank: usize },

    #[error("empty range [{start}, {end})")]
    EmptyRange { start: i64, end: i64 },

    /// A loop scope was closed out of order or left open at `finish`.
    #[error("unbalanced loop scope: {0}")]
    UnbalancedScope(String),
}
