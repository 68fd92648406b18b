//! The closed set of primitives a program may apply.
//!
//! Operand conventions for the reference-indexing primitives (`idx...` are the
//! indexer's dynamic operands, see [`IndexerSpec::num_operands`]):
//!
//! | primitive     | operands                              | results    |
//! |---------------|---------------------------------------|------------|
//! | `get`         | `ref, idx...`                         | value      |
//! | `swap`        | `ref, idx..., value`                  | old value  |
//! | `addupdate`   | `ref, idx..., value`                  | none       |
//! | `load`        | `ref, idx..., [mask], [other]`        | value      |
//! | `masked_swap` | `ref, idx..., value, [mask]`          | old value  |
//! | `atomic_rmw`  | `ref, idx..., value, [mask]`          | old value  |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dtype::{Aval, DType};
use crate::indexer::IndexerSpec;
use crate::program::Program;

/// Matrix-product precision request.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    Default,
    High,
    Highest,
}

/// Operation of an `atomic_rmw` equation.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomicOp {
    Xchg,
    Add,
    Max,
    Min,
    And,
    Or,
    Xor,
}

impl AtomicOp {
    pub fn is_bitwise(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor)
    }
}

impl fmt::Display for AtomicOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Xchg => "xchg",
            Self::Add => "add",
            Self::Max => "max",
            Self::Min => "min",
            Self::And => "and",
            Self::Or => "or",
            Self::Xor => "xor",
        };
        write!(f, "{name}")
    }
}

/// A primitive together with its static parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Primitive {
    /// Coordinate along a logical grid axis.
    ProgramId {
        axis: usize,
    },

    Add,
    /// Addition of tangents; lowers exactly like `add`.
    AddAny,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Max,
    Min,

    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,

    /// `select_n(pred, on_false, on_true)`.
    SelectN,

    Exp,
    Log,
    Log1p,
    Logistic,
    Sin,
    Cos,
    Tanh,
    Sqrt,
    Rsqrt,
    IntegerPow {
        y: i32,
    },

    ConvertElementType {
        new_dtype: DType,
    },
    BroadcastInDim {
        shape: Vec<usize>,
        broadcast_dimensions: Vec<usize>,
    },
    Squeeze {
        dimensions: Vec<usize>,
    },
    Iota {
        dtype: DType,
        shape: Vec<usize>,
        dimension: usize,
    },
    Transpose {
        permutation: Vec<usize>,
    },
    DotGeneral {
        lhs_contracting: Vec<usize>,
        rhs_contracting: Vec<usize>,
        #[serde(default)]
        lhs_batch: Vec<usize>,
        #[serde(default)]
        rhs_batch: Vec<usize>,
        #[serde(default)]
        precision: Precision,
    },

    ReduceMax {
        axes: Vec<usize>,
    },
    ReduceMin {
        axes: Vec<usize>,
    },
    ReduceSum {
        axes: Vec<usize>,
    },
    Argmax {
        axes: Vec<usize>,
        index_dtype: DType,
    },
    Argmin {
        axes: Vec<usize>,
        index_dtype: DType,
    },

    MaxContiguous {
        values: Vec<u32>,
    },
    MultipleOf {
        values: Vec<u32>,
    },

    Get {
        indexer: IndexerSpec,
    },
    Swap {
        indexer: IndexerSpec,
    },
    #[serde(rename = "addupdate")]
    AddUpdate {
        indexer: IndexerSpec,
    },
    Load {
        indexer: IndexerSpec,
        #[serde(default)]
        masked: bool,
        #[serde(default)]
        has_other: bool,
    },
    MaskedSwap {
        indexer: IndexerSpec,
        #[serde(default)]
        masked: bool,
    },
    AtomicRmw {
        indexer: IndexerSpec,
        atomic: AtomicOp,
        #[serde(default)]
        masked: bool,
    },

    /// `for i in 0..nsteps { body(i, refs...) }`. The body sees every operand
    /// as a reference; array operands are carried between iterations and the
    /// equation returns their final values.
    For {
        body: Box<Program>,
        nsteps: usize,
        #[serde(default)]
        reverse: bool,
        #[serde(default = "default_unroll")]
        unroll: usize,
    },
    While {
        cond: Box<Program>,
        body: Box<Program>,
    },
    /// Inlines `body` applied to the operands.
    Call {
        body: Box<Program>,
    },
    /// An operation defined outside this crate, with its declared results.
    /// No built-in lowering exists.
    Custom {
        name: String,
        #[serde(default)]
        outputs: Vec<Aval>,
    },
}

fn default_unroll() -> usize {
    1
}

/// The identity of a primitive, without its parameters.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum PrimitiveKind {
    ProgramId,
    Add,
    AddAny,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Max,
    Min,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    SelectN,
    Exp,
    Log,
    Log1p,
    Logistic,
    Sin,
    Cos,
    Tanh,
    Sqrt,
    Rsqrt,
    IntegerPow,
    ConvertElementType,
    BroadcastInDim,
    Squeeze,
    Iota,
    Transpose,
    DotGeneral,
    ReduceMax,
    ReduceMin,
    ReduceSum,
    Argmax,
    Argmin,
    MaxContiguous,
    MultipleOf,
    Get,
    Swap,
    AddUpdate,
    Load,
    MaskedSwap,
    AtomicRmw,
    For,
    While,
    Call,
    Custom(String),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        use PrimitiveKind as K;
        match self {
            Self::ProgramId { .. } => K::ProgramId,
            Self::Add => K::Add,
            Self::AddAny => K::AddAny,
            Self::Sub => K::Sub,
            Self::Mul => K::Mul,
            Self::Div => K::Div,
            Self::Rem => K::Rem,
            Self::Neg => K::Neg,
            Self::Max => K::Max,
            Self::Min => K::Min,
            Self::Lt => K::Lt,
            Self::Le => K::Le,
            Self::Gt => K::Gt,
            Self::Ge => K::Ge,
            Self::Eq => K::Eq,
            Self::Ne => K::Ne,
            Self::SelectN => K::SelectN,
            Self::Exp => K::Exp,
            Self::Log => K::Log,
            Self::Log1p => K::Log1p,
            Self::Logistic => K::Logistic,
            Self::Sin => K::Sin,
            Self::Cos => K::Cos,
            Self::Tanh => K::Tanh,
            Self::Sqrt => K::Sqrt,
            Self::Rsqrt => K::Rsqrt,
            Self::IntegerPow { .. } => K::IntegerPow,
            Self::ConvertElementType { .. } => K::ConvertElementType,
            Self::BroadcastInDim { .. } => K::BroadcastInDim,
            Self::Squeeze { .. } => K::Squeeze,
            Self::Iota { .. } => K::Iota,
            Self::Transpose { .. } => K::Transpose,
            Self::DotGeneral { .. } => K::DotGeneral,
            Self::ReduceMax { .. } => K::ReduceMax,
            Self::ReduceMin { .. } => K::ReduceMin,
            Self::ReduceSum { .. } => K::ReduceSum,
            Self::Argmax { .. } => K::Argmax,
            Self::Argmin { .. } => K::Argmin,
            Self::MaxContiguous { .. } => K::MaxContiguous,
            Self::MultipleOf { .. } => K::MultipleOf,
            Self::Get { .. } => K::Get,
            Self::Swap { .. } => K::Swap,
            Self::AddUpdate { .. } => K::AddUpdate,
            Self::Load { .. } => K::Load,
            Self::MaskedSwap { .. } => K::MaskedSwap,
            Self::AtomicRmw { .. } => K::AtomicRmw,
            Self::For { .. } => K::For,
            Self::While { .. } => K::While,
            Self::Call { .. } => K::Call,
            Self::Custom { name, .. } => K::Custom(name.clone()),
        }
    }

    /// The indexer of a reference-indexing primitive.
    pub fn indexer(&self) -> Option<&IndexerSpec> {
        match self {
            Self::Get { indexer }
            | Self::Swap { indexer }
            | Self::AddUpdate { indexer }
            | Self::Load { indexer, .. }
            | Self::MaskedSwap { indexer, .. }
            | Self::AtomicRmw { indexer, .. } => Some(indexer),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ProgramId => "program_id",
            Self::Add => "add",
            Self::AddAny => "add_any",
            Self::Sub => "sub",
            Self::Mul => "mul",
            Self::Div => "div",
            Self::Rem => "rem",
            Self::Neg => "neg",
            Self::Max => "max",
            Self::Min => "min",
            Self::Lt => "lt",
            Self::Le => "le",
            Self::Gt => "gt",
            Self::Ge => "ge",
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::SelectN => "select_n",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log1p => "log1p",
            Self::Logistic => "logistic",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tanh => "tanh",
            Self::Sqrt => "sqrt",
            Self::Rsqrt => "rsqrt",
            Self::IntegerPow => "integer_pow",
            Self::ConvertElementType => "convert_element_type",
            Self::BroadcastInDim => "broadcast_in_dim",
            Self::Squeeze => "squeeze",
            Self::Iota => "iota",
            Self::Transpose => "transpose",
            Self::DotGeneral => "dot_general",
            Self::ReduceMax => "reduce_max",
            Self::ReduceMin => "reduce_min",
            Self::ReduceSum => "reduce_sum",
            Self::Argmax => "argmax",
            Self::Argmin => "argmin",
            Self::MaxContiguous => "max_contiguous",
            Self::MultipleOf => "multiple_of",
            Self::Get => "get",
            Self::Swap => "swap",
            Self::AddUpdate => "addupdate",
            Self::Load => "load",
            Self::MaskedSwap => "masked_swap",
            Self::AtomicRmw => "atomic_rmw",
            Self::For => "for",
            Self::While => "while",
            Self::Call => "call",
            Self::Custom(name) => name.as_str(),
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}
