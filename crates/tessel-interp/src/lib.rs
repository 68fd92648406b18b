//! Reference interpreter for Tessel kernel IR.
//!
//! Runs a lowered kernel instance by instance against host [`Memory`]. Every
//! block is an [`ndarray`] array of [`Lane`]s; memory effects happen lane by
//! lane in row-major order, and launching a grid runs its instances one after
//! another. The interpreter is meant for checking lowered kernels numerically,
//! not for speed.

mod error;
mod exec;
mod memory;
mod value;

pub use error::InterpError;
pub use exec::Interpreter;
pub use memory::{ArgValue, Buffer, Memory};
pub use value::{Lane, Pointer, Tensor};
