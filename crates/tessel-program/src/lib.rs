//! Source tensor programs for kernel lowering.
//!
//! A [`Program`] is a closed, topologically ordered list of [`Equation`]s over
//! SSA variables. Each equation applies one [`Primitive`] and declares its
//! side effects on reference operands. Programs are checked by abstract
//! evaluation when built with [`ProgramBuilder`], and carry the grid and block
//! layout of the kernel they describe in a [`GridSpec`].

mod builder;
mod dce;
mod discharge;
mod dtype;
mod error;
mod eval;
mod grid;
mod indexer;
mod primitive;
mod program;

pub use builder::{Index, ProgramBuilder, float32, int32};
pub use dce::dce;
pub use discharge::discharge_state;
pub use dtype::{Aval, DType};
pub use error::ProgramError;
pub use eval::{abstract_eval, check_atomic_dtype, check_indexed, infer_effects, loop_effects};
pub use grid::{BlockDim, BlockMapping, GridSpec, MAX_INDEX, checked_elements};
pub use indexer::{IndexExpr, IndexTerm, IndexerSpec, NDIndexer, SliceStart, Start};
pub use primitive::{AtomicOp, Precision, Primitive, PrimitiveKind};
pub use program::{Atom, Effect, EffectKind, Equation, LiteralValue, Program, VarId};
