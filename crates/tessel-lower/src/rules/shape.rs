//! Shape manipulation and compiler hints.

use tessel_ir::{HintKind, Value};
use tessel_program::Primitive;

use super::operands;
use crate::context::{RuleContext, scalar_of};
use crate::error::LowerError;

/// Inserts a unit axis for every output axis not covered by
/// `broadcast_dimensions`, then broadcasts to the output shape.
pub(crate) fn broadcast_in_dim(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::BroadcastInDim {
        shape,
        broadcast_dimensions,
    } = p
    else {
        return Err(LowerError::not_implemented(format!("{p} as broadcast_in_dim")));
    };
    let [mut x] = operands(p, args)?;
    let b = ctx.builder();
    if !b.shape(x).is_empty() {
        for axis in (0..shape.len()).filter(|i| !broadcast_dimensions.contains(i)) {
            x = b.expand_dims(x, axis)?;
        }
    }
    Ok(vec![b.broadcast_to(x, shape)?])
}

pub(crate) fn squeeze(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let [x] = operands(p, args)?;
    let shape = ctx.aval_out(0)?.shape().to_vec();
    Ok(vec![ctx.builder().reshape(x, &shape)?])
}

pub(crate) fn iota(
    ctx: &mut RuleContext<'_>,
    _args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::Iota {
        dtype,
        shape,
        dimension,
    } = p
    else {
        return Err(LowerError::not_implemented(format!("{p} as iota")));
    };
    if *dimension != 0 || shape.len() != 1 {
        return Err(LowerError::not_implemented(format!(
            "iota of shape {shape:?} along dimension {dimension}"
        )));
    }
    let b = ctx.builder();
    let range = b.arange(0, shape[0] as i64)?;
    Ok(vec![b.cast(range, scalar_of(*dtype))?])
}

pub(crate) fn transpose(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::Transpose { permutation } = p else {
        return Err(LowerError::not_implemented(format!("{p} as transpose")));
    };
    if permutation.as_slice() != [1, 0] {
        return Err(LowerError::not_implemented(format!(
            "transpose with permutation {permutation:?}"
        )));
    }
    let [x] = operands(p, args)?;
    Ok(vec![ctx.builder().trans(x)?])
}

pub(crate) fn hint(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let (kind, values) = match p {
        Primitive::MaxContiguous { values } => (HintKind::MaxContiguous, values),
        Primitive::MultipleOf { values } => (HintKind::MultipleOf, values),
        _ => return Err(LowerError::not_implemented(format!("{p} as a hint"))),
    };
    let [x] = operands(p, args)?;
    Ok(vec![ctx.builder().hint(x, kind, values.clone())])
}
