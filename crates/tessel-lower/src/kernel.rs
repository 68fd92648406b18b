//! Kernel prologue: arguments, launch grid, block offsets, then the body.

use tessel_ir::{BinaryOp, Builder, Literal, Module, Scalar, Type, Value};
use tessel_program::{
    Aval, BlockDim, GridSpec, MAX_INDEX, Program, ProgramError, checked_elements, dce,
    infer_effects,
};

use crate::context::{BlockInfo, ModuleContext, scalar_of};
use crate::error::LowerError;
use crate::registry::RuleTable;
use crate::walker::lower_program;

/// Number of hardware launch axes.
pub const MAX_LAUNCH_AXES: usize = 3;

/// Knobs of the kernel prologue.
#[derive(Clone, Debug)]
pub struct LowerOptions {
    /// Alignment in bytes promised for every kernel argument.
    pub alignment: u32,
}

impl Default for LowerOptions {
    fn default() -> Self {
        Self { alignment: 16 }
    }
}

/// A lowered kernel and the grid it must be launched on.
#[derive(Debug)]
pub struct LoweredKernel {
    pub module: Module,
    pub grid: Vec<usize>,
}

/// Maps the logical grid onto at most three launch axes.
///
/// Returns one coordinate per logical axis and the launch grid. Grids of rank
/// above three flatten their leading axes into launch axis 0; those
/// coordinates are recovered by div/mod, most significant axis first.
pub fn process_grid(builder: &mut Builder, grid: &[usize]) -> Result<(Vec<Value>, Vec<usize>), LowerError> {
    if let Some(&extent) = grid.iter().find(|&&d| d > MAX_INDEX) {
        return Err(ProgramError::IndexOverflow(format!("grid extent {extent}")).into());
    }
    if grid.len() <= MAX_LAUNCH_AXES {
        let ids = (0..grid.len())
            .map(|axis| builder.program_id(axis))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok((ids, grid.to_vec()));
    }

    let split = grid.len() - 2;
    let (prefix, suffix) = grid.split_at(split);
    let flat = prefix
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n <= MAX_INDEX)
        .ok_or_else(|| ProgramError::IndexOverflow(format!("flattened grid {prefix:?}")))?;
    let mut launch = vec![flat];
    launch.extend_from_slice(suffix);

    let mut remaining = builder.program_id(0)?;
    let mut coords = vec![remaining; split];
    for (axis, &extent) in prefix.iter().enumerate().rev() {
        let extent = builder.constant(Literal::Int(extent as i64), Scalar::I32);
        coords[axis] = builder.binary(BinaryOp::Modulo, remaining, extent)?;
        remaining = builder.binary(BinaryOp::Divide, remaining, extent)?;
    }
    coords.push(builder.program_id(1)?);
    coords.push(builder.program_id(2)?);
    log::debug!("grid {grid:?} launched as {launch:?}");
    Ok((coords, launch))
}

fn check_operands(program: &Program, in_shapes: &[Aval], grid_spec: &GridSpec) -> Result<(), LowerError> {
    grid_spec.validate()?;
    if !program.outvars.is_empty() {
        return Err(LowerError::not_implemented("kernels that return values"));
    }
    if in_shapes.len() != program.invars.len() {
        return Err(LowerError::TypeMismatch {
            expected: format!("{} operand shapes", program.invars.len()),
            found: format!("{} operand shapes", in_shapes.len()),
        });
    }
    if !grid_spec.block_mappings.is_empty() && grid_spec.block_mappings.len() != program.invars.len() {
        return Err(ProgramError::InvalidBlockMapping(format!(
            "{} block mappings for {} operands",
            grid_spec.block_mappings.len(),
            program.invars.len()
        ))
        .into());
    }
    for (i, (var, full)) in program.invars.iter().zip(in_shapes).enumerate() {
        let aval = program.aval(*var)?;
        if !aval.is_ref() {
            return Err(LowerError::TypeMismatch {
                expected: "a reference operand".into(),
                found: aval.to_string(),
            });
        }
        checked_elements(full.shape())?;
        if aval.dtype() != full.dtype() {
            return Err(LowerError::TypeMismatch {
                expected: full.dtype().to_string(),
                found: aval.dtype().to_string(),
            });
        }
        let block_shape = match grid_spec.block_mappings.get(i).and_then(Option::as_ref) {
            Some(mapping) => {
                mapping.validate(full.shape(), grid_spec.grid.len())?;
                mapping.kernel_shape()
            }
            None => full.shape().to_vec(),
        };
        if aval.shape() != block_shape.as_slice() {
            return Err(LowerError::ShapeMismatch {
                expected: block_shape,
                actual: aval.shape().to_vec(),
            });
        }
    }
    Ok(())
}

/// Lowers a kernel program to a module with a single entry point.
///
/// Every program input is a reference to one operand, passed as a pointer
/// argument. `in_shapes` gives the full shape and dtype of each operand.
pub fn build_kernel(
    program: &Program,
    in_shapes: &[Aval],
    grid_spec: &GridSpec,
    name: &str,
    rules: &RuleTable,
    options: &LowerOptions,
) -> Result<LoweredKernel, LowerError> {
    check_operands(program, in_shapes, grid_spec)?;
    let mut program = program.clone();
    infer_effects(&mut program)?;
    dce(&mut program);

    let mut ctx = ModuleContext::new(name);
    let mut args = Vec::with_capacity(program.invars.len());
    for (i, var) in program.invars.iter().enumerate() {
        let dtype = program.aval(*var)?.dtype();
        args.push(ctx.builder.argument(
            format!("arg{i}"),
            Type::pointer(scalar_of(dtype)),
            Some(options.alignment),
        ));
    }

    let (program_ids, launch) = process_grid(&mut ctx.builder, &grid_spec.grid)?;
    ctx.program_ids = grid_spec
        .visible_axes()
        .into_iter()
        .map(|axis| program_ids[axis])
        .collect();

    let mut block_infos = Vec::with_capacity(in_shapes.len());
    for (i, full) in in_shapes.iter().enumerate() {
        let Some(mapping) = grid_spec.block_mappings.get(i).and_then(Option::as_ref) else {
            block_infos.push(None);
            continue;
        };
        let block_indices = lower_program(&mut ctx, rules, &mapping.index_map, &[], &program_ids)?;
        let mut start_indices = Vec::with_capacity(block_indices.len());
        for (index, dim) in block_indices.into_iter().zip(&mapping.block_shape) {
            start_indices.push(match dim {
                BlockDim::Mapped => index,
                BlockDim::Extent(extent) => {
                    let extent = ctx.i32(*extent as i64);
                    let index = ctx.builder.cast(index, Scalar::I32)?;
                    ctx.builder.binary(BinaryOp::Multiply, index, extent)?
                }
            });
        }
        block_infos.push(Some(BlockInfo {
            full_shape: full.shape().to_vec(),
            dtype: full.dtype(),
            start_indices,
            block_shape: mapping.block_shape.clone(),
        }));
    }

    lower_program(&mut ctx, rules, &program, &block_infos, &args)?;
    ctx.builder.ret();
    let module = ctx.builder.finish()?;
    log::debug!(
        "lowered kernel `{name}`: {} arguments, {} expressions, launch grid {launch:?}",
        args.len(),
        module.entry_points.first().map_or(0, |ep| ep.function.expressions.len())
    );
    Ok(LoweredKernel { module, grid: launch })
}
