//! Reference reads, writes and atomics.
//!
//! Every access computes its address block once with
//! [`compute_addresses`](crate::address::compute_addresses) and reuses it for
//! both halves of a read-modify-write.

use tessel_ir::{AtomicFunction, BinaryOp, Literal, Value};
use tessel_program::{AtomicOp, Primitive, check_atomic_dtype};

use crate::address::compute_addresses;
use crate::context::RuleContext;
use crate::error::LowerError;

/// An access split into its address block and the operands after the indices.
struct Access<'v> {
    pointer: Value,
    rest: &'v [Value],
}

fn access<'v>(
    ctx: &mut RuleContext<'_>,
    p: &Primitive,
    args: &'v [Value],
) -> Result<Access<'v>, LowerError> {
    let indexer = p
        .indexer()
        .ok_or_else(|| LowerError::not_implemented(format!("{p} without an indexer")))?;
    let n = indexer.num_operands();
    let Some((&base, tail)) = args.split_first() else {
        return Err(LowerError::TypeMismatch {
            expected: format!("a reference operand for {p}"),
            found: "no operands".into(),
        });
    };
    if tail.len() < n {
        return Err(LowerError::TypeMismatch {
            expected: format!("{n} index operands for {p}"),
            found: format!("{} operands", tail.len()),
        });
    }
    let (indices, rest) = tail.split_at(n);
    let nd = indexer.unflatten(indices)?;
    let info = ctx.block_info(0).cloned();
    let shape = ctx.aval_in(0)?.shape().to_vec();
    let pointer = compute_addresses(ctx.builder(), base, info.as_ref(), &nd, &shape)?;
    Ok(Access { pointer, rest })
}

fn zero_of(ctx: &mut RuleContext<'_>, pointer: Value) -> Result<Value, LowerError> {
    let b = ctx.builder();
    let pointee = b.element(pointer).scalar();
    Ok(b.constant(Literal::zero(pointee), pointee))
}

pub(crate) fn get(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Access { pointer, .. } = access(ctx, p, args)?;
    Ok(vec![ctx.builder().load(pointer, None, None)?])
}

/// Stores the new value and returns the old one.
pub(crate) fn swap(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Access { pointer, rest } = access(ctx, p, args)?;
    let &[value] = rest else {
        return Err(value_arity(p, rest.len()));
    };
    let b = ctx.builder();
    let old = b.load(pointer, None, None)?;
    b.store(pointer, value, None)?;
    Ok(vec![old])
}

/// Non-atomic load, add, store.
pub(crate) fn addupdate(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Access { pointer, rest } = access(ctx, p, args)?;
    let &[value] = rest else {
        return Err(value_arity(p, rest.len()));
    };
    let b = ctx.builder();
    let old = b.load(pointer, None, None)?;
    let new = b.binary(BinaryOp::Add, old, value)?;
    b.store(pointer, new, None)?;
    Ok(Vec::new())
}

/// Masked lanes without an explicit fallback read as zero.
pub(crate) fn load(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::Load {
        masked, has_other, ..
    } = *p
    else {
        return Err(LowerError::not_implemented(format!("{p} as load")));
    };
    if has_other && !masked {
        return Err(LowerError::not_implemented("load with a fallback value but no mask"));
    }
    let Access { pointer, rest } = access(ctx, p, args)?;
    let expected = usize::from(masked) + usize::from(has_other);
    if rest.len() != expected {
        return Err(value_arity(p, rest.len()));
    }
    let mask = masked.then(|| rest[0]);
    let other = match (masked, has_other) {
        (true, true) => Some(rest[1]),
        (true, false) => Some(zero_of(ctx, pointer)?),
        _ => None,
    };
    Ok(vec![ctx.builder().load(pointer, mask, other)?])
}

/// Masked store returning the previous contents of the active lanes.
pub(crate) fn masked_swap(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::MaskedSwap { masked, .. } = *p else {
        return Err(LowerError::not_implemented(format!("{p} as masked_swap")));
    };
    let Access { pointer, rest } = access(ctx, p, args)?;
    let (value, mask) = value_and_mask(p, rest, masked)?;
    let other = match mask {
        Some(_) => Some(zero_of(ctx, pointer)?),
        None => None,
    };
    let b = ctx.builder();
    let old = b.load(pointer, mask, other)?;
    b.store(pointer, value, mask)?;
    Ok(vec![old])
}

pub(crate) fn atomic_rmw(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::AtomicRmw { atomic, masked, .. } = *p else {
        return Err(LowerError::not_implemented(format!("{p} as atomic_rmw")));
    };
    check_atomic_dtype(atomic, ctx.aval_in(0)?.dtype())?;
    let fun = match atomic {
        AtomicOp::Xchg => AtomicFunction::Exchange,
        AtomicOp::Add => AtomicFunction::Add,
        AtomicOp::Max => AtomicFunction::Max,
        AtomicOp::Min => AtomicFunction::Min,
        AtomicOp::And => AtomicFunction::And,
        AtomicOp::Or => AtomicFunction::InclusiveOr,
        AtomicOp::Xor => AtomicFunction::ExclusiveOr,
    };
    let Access { pointer, rest } = access(ctx, p, args)?;
    let (value, mask) = value_and_mask(p, rest, masked)?;
    Ok(vec![ctx.builder().atomic(fun, pointer, value, mask)?])
}

fn value_and_mask(
    p: &Primitive,
    rest: &[Value],
    masked: bool,
) -> Result<(Value, Option<Value>), LowerError> {
    match (rest, masked) {
        (&[value], false) => Ok((value, None)),
        (&[value, mask], true) => Ok((value, Some(mask))),
        _ => Err(value_arity(p, rest.len())),
    }
}

fn value_arity(p: &Primitive, found: usize) -> LowerError {
    LowerError::TypeMismatch {
        expected: format!("the value operands of {p}"),
        found: format!("{found} trailing operands"),
    }
}

#[cfg(test)]
mod tests {
    use crate::context::ModuleContext;
    use crate::error::LowerError;
    use crate::test_util::{arg_type, count, describe, lower_eqn};
    use crate::registry::RuleTable;
    use crate::walker::lower_program;
    use tessel_ir::{AtomicFunction, Expression, Statement};
    use tessel_program::{
        Atom, AtomicOp, Aval, DType, Equation, IndexerSpec, Primitive, Program, VarId,
    };

    fn f32_ref(shape: &[usize]) -> Aval {
        Aval::reference(shape.to_vec(), DType::Float32)
    }

    fn statements(ctx: ModuleContext) -> Vec<Statement> {
        let module = ctx.builder.finish().unwrap();
        module.entry_points[0]
            .function
            .body
            .iter()
            .filter(|s| !matches!(s, Statement::Emit(_)))
            .cloned()
            .collect()
    }

    #[test]
    fn get_is_a_plain_load() {
        let (ctx, outs) = lower_eqn(
            Primitive::Get {
                indexer: IndexerSpec::full(2),
            },
            &[f32_ref(&[4, 8])],
        )
        .unwrap();
        let (ty, out) = describe(&ctx, &outs);
        assert_eq!(ty, "tensor<4x8xf32>");
        assert!(matches!(out, Expression::Load { mask: None, other: None, .. }));
    }

    #[test]
    fn swap_loads_then_stores() {
        let (ctx, outs) = lower_eqn(
            Primitive::Swap {
                indexer: IndexerSpec::full(1),
            },
            &[f32_ref(&[16]), Aval::array(vec![16], DType::Float32)],
        )
        .unwrap();
        assert!(matches!(describe(&ctx, &outs).1, Expression::Load { .. }));
        let stmts = statements(ctx);
        assert!(matches!(stmts.as_slice(), [Statement::Store { mask: None, .. }]));
    }

    #[test]
    fn addupdate_returns_nothing() {
        let (ctx, outs) = lower_eqn(
            Primitive::AddUpdate {
                indexer: IndexerSpec::full(1),
            },
            &[f32_ref(&[16]), Aval::array(vec![16], DType::Float32)],
        )
        .unwrap();
        assert!(outs.is_empty());
        assert_eq!(count(&ctx, |e| matches!(e, Expression::Load { .. })), 1);
        assert_eq!(statements(ctx).len(), 1);
    }

    #[test]
    fn masked_load_without_fallback_reads_zero() {
        let (ctx, outs) = lower_eqn(
            Primitive::Load {
                indexer: IndexerSpec::full(1),
                masked: true,
                has_other: false,
            },
            &[f32_ref(&[8]), Aval::array(vec![8], DType::Bool)],
        )
        .unwrap();
        let (_, out) = describe(&ctx, &outs);
        let Expression::Load {
            mask: Some(_),
            other: Some(other),
            ..
        } = out
        else {
            panic!("expected a masked load with a fallback");
        };
        let exprs = &ctx.builder.function().expressions;
        let Expression::Splat { value, .. } = &exprs[other] else {
            panic!("expected a splatted fallback");
        };
        assert_eq!(exprs[*value], Expression::Literal(tessel_ir::Literal::Float(0.0)));
    }

    #[test]
    fn masked_swap_guards_the_store() {
        let (ctx, _) = lower_eqn(
            Primitive::MaskedSwap {
                indexer: IndexerSpec::full(1),
                masked: true,
            },
            &[
                f32_ref(&[8]),
                Aval::array(vec![8], DType::Float32),
                Aval::array(vec![8], DType::Bool),
            ],
        )
        .unwrap();
        assert!(matches!(
            statements(ctx).as_slice(),
            [Statement::Store { mask: Some(_), .. }]
        ));
    }

    #[test]
    fn atomic_add_binds_the_old_value() {
        let (ctx, outs) = lower_eqn(
            Primitive::AtomicRmw {
                indexer: IndexerSpec::full(1),
                atomic: AtomicOp::Add,
                masked: false,
            },
            &[f32_ref(&[8]), Aval::array(vec![8], DType::Float32)],
        )
        .unwrap();
        assert!(matches!(describe(&ctx, &outs).1, Expression::AtomicResult));
        assert!(matches!(
            statements(ctx).as_slice(),
            [Statement::Atomic {
                fun: AtomicFunction::Add,
                mask: None,
                ..
            }]
        ));
    }

    #[test]
    fn atomic_dtype_is_checked_before_emitting() {
        // Built by hand so the rule, not abstract evaluation, sees the bad dtype.
        let r = Aval::reference(vec![8], DType::Int8);
        let x = Aval::array(vec![8], DType::Int8);
        let program = Program {
            avals: vec![r.clone(), x.clone(), x.clone()],
            invars: vec![VarId(0), VarId(1)],
            outvars: Vec::new(),
            eqns: vec![Equation {
                primitive: Primitive::AtomicRmw {
                    indexer: IndexerSpec::full(1),
                    atomic: AtomicOp::Add,
                    masked: false,
                },
                inputs: vec![Atom::Var(VarId(0)), Atom::Var(VarId(1))],
                outputs: vec![VarId(2)],
                effects: Vec::new(),
            }],
        };
        let mut ctx = ModuleContext::new("k");
        let args = vec![
            ctx.builder.argument("r", arg_type(&r), None),
            ctx.builder.argument("x", arg_type(&x), None),
        ];
        let before = ctx.builder.function().expressions.len();
        let err = lower_program(&mut ctx, &RuleTable::with_builtins(), &program, &[], &args)
            .unwrap_err();
        assert!(matches!(
            err,
            LowerError::UnsupportedAtomicType {
                op: AtomicOp::Add,
                dtype: DType::Int8
            }
        ));
        assert_eq!(ctx.builder.function().expressions.len(), before);
    }
}
