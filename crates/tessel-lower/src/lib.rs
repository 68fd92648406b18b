//! Lowering of tensor programs to Tessel kernel IR.
//!
//! [`build_kernel`] turns a kernel [`Program`](tessel_program::Program) and its
//! [`GridSpec`](tessel_program::GridSpec) into a single-entry-point IR module:
//! it declares pointer arguments, maps the logical grid onto the launch axes,
//! evaluates each operand's block mapping and then walks the body, dispatching
//! every equation to the rule registered for its primitive in a [`RuleTable`].

mod address;
mod context;
mod error;
mod kernel;
mod registry;
mod request;
mod rules;
mod walker;

#[cfg(test)]
mod test_util;

pub use address::{compute_addresses, strides_from_shape};
pub use context::{BlockInfo, ModuleContext, RuleContext, scalar_of};
pub use error::LowerError;
pub use kernel::{LowerOptions, LoweredKernel, MAX_LAUNCH_AXES, build_kernel, process_grid};
pub use registry::{Rule, RuleTable};
pub use request::KernelRequest;
pub use walker::lower_program;
