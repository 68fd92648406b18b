//! Expressions: pure SSA values over scalars and blocks.
//!
//! Block-producing expressions carry their result shape explicitly; the
//! element type lives in the function's parallel expression-type table.

use crate::arena::Handle;
use crate::types::Scalar;

/// A scalar constant. Its width comes from the expression's type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Literal {
    /// The zero value of `scalar`.
    pub fn zero(scalar: Scalar) -> Self {
        if scalar.is_bool() {
            Self::Bool(false)
        } else if scalar.is_float() {
            Self::Float(0.0)
        } else {
            Self::Int(0)
        }
    }

    /// Reinterprets the literal as a value of `scalar`, truncating floats toward zero.
    pub fn convert(self, scalar: Scalar) -> Self {
        let as_f64 = match self {
            Self::Bool(b) => f64::from(u8::from(b)),
            Self::Int(i) => i as f64,
            Self::Float(f) => f,
        };
        if scalar.is_bool() {
            Self::Bool(as_f64 != 0.0)
        } else if scalar.is_float() {
            Self::Float(as_f64)
        } else {
            match self {
                Self::Int(i) => Self::Int(i),
                _ => Self::Int(as_f64.trunc() as i64),
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum UnaryOp {
    Negate,
    LogicalNot,
    BitwiseNot,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    /// True division for floats, truncating division for integers.
    Divide,
    /// Remainder with the sign of the dividend.
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
}

impl BinaryOp {
    /// Comparison operators produce boolean lanes.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Equal
                | Self::NotEqual
                | Self::Less
                | Self::LessEqual
                | Self::Greater
                | Self::GreaterEqual
        )
    }
}

/// Element-wise floating point math.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum MathFunction {
    Exp,
    Log,
    Log1p,
    Sin,
    Cos,
    Tanh,
    Sqrt,
    InverseSqrt,
    /// Two-argument power; the exponent is `arg1`.
    Pow,
}

/// Reduction along a single axis.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum ReduceOp {
    Sum,
    Max,
    Min,
    /// Index of the first maximum, as `i32`.
    ArgMax,
    /// Index of the first minimum, as `i32`.
    ArgMin,
}

/// Read-modify-write operation of an [`Atomic`](crate::Statement::Atomic) statement.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum AtomicFunction {
    Exchange,
    Add,
    Max,
    Min,
    And,
    InclusiveOr,
    ExclusiveOr,
}

/// Compiler hints attached to integer blocks.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum HintKind {
    /// Runs of this many consecutive values are contiguous.
    MaxContiguous,
    /// Every value is a multiple of this.
    MultipleOf,
}

/// An expression in a kernel function.
///
/// Expressions bound by a statement ([`AtomicResult`](Self::AtomicResult) and the
/// loop values) are never covered by an `Emit`; they receive their value when the
/// owning statement executes.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    Literal(Literal),
    /// Kernel argument by position.
    FunctionArgument(u32),
    /// Coordinate of the running instance along a launch axis (0..3).
    ProgramId { axis: u32 },
    /// `[start, end)` as a rank-1 `i32` block.
    Arange { start: i64, end: i64 },
    /// Scalar replicated into a block.
    Splat {
        value: Handle<Expression>,
        shape: Vec<usize>,
    },
    /// Block with unit extents stretched to `shape` (same rank).
    Broadcast {
        value: Handle<Expression>,
        shape: Vec<usize>,
    },
    /// Inserts a unit axis at `axis`.
    ExpandDims {
        value: Handle<Expression>,
        axis: u32,
    },
    /// Row-major reinterpretation with the same number of elements.
    Reshape {
        value: Handle<Expression>,
        shape: Vec<usize>,
    },
    Unary {
        op: UnaryOp,
        expr: Handle<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Handle<Expression>,
        right: Handle<Expression>,
    },
    Math {
        fun: MathFunction,
        arg: Handle<Expression>,
        arg1: Option<Handle<Expression>>,
    },
    /// Numeric conversion to `convert`.
    As {
        expr: Handle<Expression>,
        convert: Scalar,
    },
    Select {
        condition: Handle<Expression>,
        accept: Handle<Expression>,
        reject: Handle<Expression>,
    },
    /// 2-D transpose.
    Trans { value: Handle<Expression> },
    /// 2-D matrix product accumulated in `f32` (floats) or `i32` (integers).
    Dot {
        lhs: Handle<Expression>,
        rhs: Handle<Expression>,
        allow_tf32: bool,
    },
    Reduce {
        op: ReduceOp,
        value: Handle<Expression>,
        axis: u32,
    },
    Hint {
        value: Handle<Expression>,
        kind: HintKind,
        values: Vec<u32>,
    },
    /// Pointer arithmetic in elements of the pointee type.
    Offset {
        pointer: Handle<Expression>,
        offset: Handle<Expression>,
    },
    /// Masked gather from global memory; inactive lanes take `other`.
    Load {
        pointer: Handle<Expression>,
        mask: Option<Handle<Expression>>,
        other: Option<Handle<Expression>>,
    },
    /// Previous memory contents, bound by an `Atomic` statement.
    AtomicResult,
    /// Induction variable of the loop with the given id.
    LoopInduction { loop_id: u32 },
    /// Loop-carried value `index` as seen at the top of an iteration.
    LoopArgument { loop_id: u32, index: u32 },
    /// Loop-carried value `index` after the loop exits.
    LoopResult { loop_id: u32, index: u32 },
}

impl Expression {
    /// Operands of this expression, in a fixed order.
    pub fn operands(&self) -> Vec<Handle<Expression>> {
        match self {
            Self::Literal(_)
            | Self::FunctionArgument(_)
            | Self::ProgramId { .. }
            | Self::Arange { .. }
            | Self::AtomicResult
            | Self::LoopInduction { .. }
            | Self::LoopArgument { .. }
            | Self::LoopResult { .. } => Vec::new(),
            Self::Splat { value, .. }
            | Self::Broadcast { value, .. }
            | Self::ExpandDims { value, .. }
            | Self::Reshape { value, .. }
            | Self::Trans { value }
            | Self::Reduce { value, .. }
            | Self::Hint { value, .. } => vec![*value],
            Self::Unary { expr, .. } | Self::As { expr, .. } => vec![*expr],
            Self::Binary { left, right, .. } => vec![*left, *right],
            Self::Math { arg, arg1, .. } => std::iter::once(*arg).chain(*arg1).collect(),
            Self::Select {
                condition,
                accept,
                reject,
            } => vec![*condition, *accept, *reject],
            Self::Dot { lhs, rhs, .. } => vec![*lhs, *rhs],
            Self::Offset { pointer, offset } => vec![*pointer, *offset],
            Self::Load {
                pointer,
                mask,
                other,
            } => std::iter::once(*pointer).chain(*mask).chain(*other).collect(),
        }
    }

    /// Whether the value is bound by a statement rather than an `Emit`.
    pub fn is_statement_bound(&self) -> bool {
        matches!(
            self,
            Self::FunctionArgument(_)
                | Self::AtomicResult
                | Self::LoopInduction { .. }
                | Self::LoopArgument { .. }
                | Self::LoopResult { .. }
        )
    }
}
