//! Tessel kernel IR.
//!
//! An arena-based SSA IR for single GPU kernels operating on statically shaped
//! blocks: element-wise arithmetic, pointer arithmetic, masked loads and
//! stores, atomics, reductions, matrix products and counted loops with
//! loop-carried values. Kernels are assembled with [`Builder`].

pub mod arena;
mod builder;
mod display;
mod error;
mod expr;
mod func;
mod stmt;
mod types;

pub use arena::{Arena, Handle, Range, UniqueArena};
pub use builder::{Builder, ForScope, Value, broadcast_shapes};
pub use display::{dump_module, format_type};
pub use error::IrError;
pub use expr::{
    AtomicFunction, BinaryOp, Expression, HintKind, Literal, MathFunction, ReduceOp, UnaryOp,
};
pub use func::{EntryPoint, Function, FunctionArgument};
pub use stmt::{Block, Statement};
pub use types::{Bytes, Element, Scalar, ScalarKind, Type};

/// A compiled kernel module.
#[derive(Clone, Debug, Default)]
pub struct Module {
    /// Deduplicated type arena.
    pub types: UniqueArena<Type>,
    /// Kernel entry points; the lowering produces exactly one.
    pub entry_points: Vec<EntryPoint>,
}
