//! Shared fixtures for rule tests.

use tessel_ir::{Element, Expression, Type, Value, format_type};
use tessel_program::{Atom, Aval, DType, Primitive, ProgramBuilder};

use crate::context::{ModuleContext, scalar_of};
use crate::error::LowerError;
use crate::registry::RuleTable;
use crate::walker::lower_program;

/// The IR type of a kernel argument holding `aval`.
pub(crate) fn arg_type(aval: &Aval) -> Type {
    let scalar = scalar_of(aval.dtype());
    if aval.is_ref() {
        Type::pointer(scalar)
    } else if aval.shape().is_empty() {
        Type::scalar(scalar)
    } else {
        Type::block(Element::Scalar(scalar), aval.shape().to_vec())
    }
}

/// Lowers a single application of `p` to arguments of type `inputs`.
pub(crate) fn lower_eqn(
    p: Primitive,
    inputs: &[Aval],
) -> Result<(ModuleContext, Vec<Value>), LowerError> {
    let mut b = ProgramBuilder::new();
    let vars: Vec<Atom> = inputs.iter().map(|a| Atom::Var(b.input(a.clone()))).collect();
    let outs = b.apply(p, vars)?;
    let program = b.finish(outs.into_iter().map(Atom::Var).collect())?;

    let mut ctx = ModuleContext::new("test");
    let args: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, a)| ctx.builder.argument(format!("arg{i}"), arg_type(a), None))
        .collect();
    let outs = lower_program(&mut ctx, &RuleTable::with_builtins(), &program, &[], &args)?;
    Ok((ctx, outs))
}

/// Type and defining expression of the first result.
pub(crate) fn describe(ctx: &ModuleContext, outs: &[Value]) -> (String, Expression) {
    let v = outs[0];
    (
        format_type(ctx.builder.ty(v)),
        ctx.builder.function().expressions[v.expr].clone(),
    )
}

pub(crate) fn lower_unary(p: Primitive, dtype: DType, shape: &[usize]) -> (String, Expression) {
    let (ctx, outs) = lower_eqn(p, &[Aval::array(shape.to_vec(), dtype)]).unwrap();
    describe(&ctx, &outs)
}

pub(crate) fn lower_binary(p: Primitive, dtype: DType, shape: &[usize]) -> (String, Expression) {
    let x = Aval::array(shape.to_vec(), dtype);
    let (ctx, outs) = lower_eqn(p, &[x.clone(), x]).unwrap();
    describe(&ctx, &outs)
}

/// Number of expressions in the function matching `pred`.
pub(crate) fn count(ctx: &ModuleContext, pred: impl Fn(&Expression) -> bool) -> usize {
    ctx.builder
        .function()
        .expressions
        .iter()
        .filter(|(_, e)| pred(e))
        .count()
}
