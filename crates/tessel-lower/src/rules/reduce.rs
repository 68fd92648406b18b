//! Matrix products and single-axis reductions.

use tessel_ir::{ReduceOp, Value};
use tessel_program::{DType, Precision, Primitive};

use super::operands;
use crate::context::{RuleContext, scalar_of};
use crate::error::LowerError;

pub(crate) fn dot_general(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::DotGeneral {
        lhs_contracting,
        rhs_contracting,
        lhs_batch,
        rhs_batch,
        precision,
    } = p
    else {
        return Err(LowerError::not_implemented(format!("{p} as dot_general")));
    };
    let (&[lhs_k], &[rhs_k]) = (lhs_contracting.as_slice(), rhs_contracting.as_slice()) else {
        return Err(LowerError::not_implemented(
            "dot_general with more than one contracting dimension",
        ));
    };
    if !lhs_batch.is_empty() || !rhs_batch.is_empty() {
        return Err(LowerError::not_implemented("batched dot_general"));
    }
    let ranks = (ctx.aval_in(0)?.shape().len(), ctx.aval_in(1)?.shape().len());
    if ranks != (2, 2) {
        return Err(LowerError::not_implemented(format!(
            "dot_general of rank {} by rank {}",
            ranks.0, ranks.1
        )));
    }
    let out = scalar_of(ctx.aval_out(0)?.dtype());
    let allow_tf32 = matches!(precision, Precision::Default | Precision::High);

    let [mut lhs, mut rhs] = operands(p, args)?;
    let b = ctx.builder();
    if lhs_k == 0 {
        lhs = b.trans(lhs)?;
    }
    if rhs_k == 1 {
        rhs = b.trans(rhs)?;
    }
    let acc = b.dot(lhs, rhs, allow_tf32)?;
    Ok(vec![b.cast(acc, out)?])
}

pub(crate) fn reduce(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let (op, axes) = match p {
        Primitive::ReduceMax { axes } => (ReduceOp::Max, axes),
        Primitive::ReduceMin { axes } => (ReduceOp::Min, axes),
        Primitive::ReduceSum { axes } => (ReduceOp::Sum, axes),
        Primitive::Argmax { axes, index_dtype } | Primitive::Argmin { axes, index_dtype } => {
            if *index_dtype != DType::Int32 {
                return Err(LowerError::not_implemented(format!(
                    "{p} with {index_dtype} indices"
                )));
            }
            let op = match p {
                Primitive::Argmax { .. } => ReduceOp::ArgMax,
                _ => ReduceOp::ArgMin,
            };
            (op, axes)
        }
        _ => return Err(LowerError::not_implemented(format!("{p} as a reduction"))),
    };
    let &[axis] = axes.as_slice() else {
        return Err(LowerError::not_implemented(format!(
            "{p} over {} axes",
            axes.len()
        )));
    };
    let [x] = operands(p, args)?;
    Ok(vec![ctx.builder().reduce(op, x, axis)?])
}

#[cfg(test)]
mod tests {
    use crate::error::LowerError;
    use crate::test_util::{count, describe, lower_eqn, lower_unary};
    use tessel_ir::{Expression, ReduceOp};
    use tessel_program::{Aval, DType, Precision, Primitive};

    fn dot(lhs_k: usize, rhs_k: usize, precision: Precision) -> Primitive {
        Primitive::DotGeneral {
            lhs_contracting: vec![lhs_k],
            rhs_contracting: vec![rhs_k],
            lhs_batch: Vec::new(),
            rhs_batch: Vec::new(),
            precision,
        }
    }

    #[test]
    fn plain_matmul_casts_the_accumulator() {
        let a = Aval::array(vec![16, 32], DType::Float16);
        let b = Aval::array(vec![32, 8], DType::Float16);
        let (ctx, outs) = lower_eqn(dot(1, 0, Precision::Default), &[a, b]).unwrap();
        let (ty, out) = describe(&ctx, &outs);
        assert_eq!(ty, "tensor<16x8xf16>");
        assert!(matches!(out, Expression::As { .. }));
        assert_eq!(count(&ctx, |e| matches!(e, Expression::Trans { .. })), 0);
        assert_eq!(
            count(&ctx, |e| matches!(e, Expression::Dot { allow_tf32: true, .. })),
            1
        );
    }

    #[test]
    fn contracting_dims_pick_transposes() {
        let a = Aval::array(vec![32, 16], DType::Float32);
        let b = Aval::array(vec![8, 32], DType::Float32);
        let (ctx, outs) = lower_eqn(dot(0, 1, Precision::Highest), &[a, b]).unwrap();
        let (ty, out) = describe(&ctx, &outs);
        assert_eq!(ty, "tensor<16x8xf32>");
        assert!(matches!(out, Expression::Dot { allow_tf32: false, .. }));
        assert_eq!(count(&ctx, |e| matches!(e, Expression::Trans { .. })), 2);
    }

    #[test]
    fn reductions_drop_the_axis() {
        let (ty, out) = lower_unary(
            Primitive::ReduceSum { axes: vec![1] },
            DType::Float32,
            &[4, 8],
        );
        assert_eq!(ty, "tensor<4xf32>");
        assert!(matches!(out, Expression::Reduce { op: ReduceOp::Sum, axis: 1, .. }));

        let (ty, _) = lower_unary(
            Primitive::Argmax {
                axes: vec![0],
                index_dtype: DType::Int32,
            },
            DType::Float32,
            &[8],
        );
        assert_eq!(ty, "i32");
    }

    #[test]
    fn unsupported_reductions() {
        let x = Aval::array(vec![4, 8], DType::Float32);
        let err = lower_eqn(Primitive::ReduceMax { axes: vec![0, 1] }, &[x.clone()])
            .err()
            .unwrap();
        assert!(matches!(err, LowerError::NotImplemented(_)));

        let err = lower_eqn(
            Primitive::Argmin {
                axes: vec![0],
                index_dtype: DType::Int64,
            },
            &[x],
        )
        .err()
        .unwrap();
        assert!(matches!(err, LowerError::NotImplemented(_)));
    }
}
