//! Element-wise arithmetic, comparisons, selection and conversion.

use tessel_ir::{BinaryOp, UnaryOp, Value};
use tessel_program::Primitive;

use super::operands;
use crate::context::{RuleContext, scalar_of};
use crate::error::LowerError;

pub(crate) fn program_id(
    ctx: &mut RuleContext<'_>,
    _args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::ProgramId { axis } = *p else {
        return Err(LowerError::not_implemented(format!("{p} as program_id")));
    };
    let id = ctx
        .module
        .program_ids
        .get(axis)
        .copied()
        .ok_or(LowerError::InvalidAxis {
            axis,
            rank: ctx.module.program_ids.len(),
        })?;
    Ok(vec![id])
}

pub(crate) fn binary(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let op = match p {
        Primitive::Add | Primitive::AddAny => BinaryOp::Add,
        Primitive::Sub => BinaryOp::Subtract,
        Primitive::Mul => BinaryOp::Multiply,
        Primitive::Div => BinaryOp::Divide,
        Primitive::Rem => BinaryOp::Modulo,
        Primitive::Lt => BinaryOp::Less,
        Primitive::Le => BinaryOp::LessEqual,
        Primitive::Gt => BinaryOp::Greater,
        Primitive::Ge => BinaryOp::GreaterEqual,
        Primitive::Eq => BinaryOp::Equal,
        Primitive::Ne => BinaryOp::NotEqual,
        _ => return Err(LowerError::not_implemented(format!("{p} as a binary operator"))),
    };
    let [a, b] = operands(p, args)?;
    Ok(vec![ctx.builder().binary(op, a, b)?])
}

pub(crate) fn neg(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let [x] = operands(p, args)?;
    Ok(vec![ctx.builder().unary(UnaryOp::Negate, x)?])
}

/// `max(a, b)` is `a > b ? a : b`; `min` uses `<`.
pub(crate) fn min_max(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let [a, b] = operands(p, args)?;
    let cmp = match p {
        Primitive::Max => BinaryOp::Greater,
        _ => BinaryOp::Less,
    };
    let b_ = ctx.builder();
    let pred = b_.binary(cmp, a, b)?;
    Ok(vec![b_.select(pred, a, b)?])
}

/// `select_n(pred, on_false, on_true)`.
pub(crate) fn select_n(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let [pred, on_false, on_true] = operands(p, args).map_err(|_| {
        LowerError::not_implemented(format!("select_n with {} cases", args.len().saturating_sub(1)))
    })?;
    Ok(vec![ctx.builder().select(pred, on_true, on_false)?])
}

pub(crate) fn convert_element_type(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::ConvertElementType { new_dtype } = *p else {
        return Err(LowerError::not_implemented(format!("{p} as a conversion")));
    };
    let [x] = operands(p, args)?;
    Ok(vec![ctx.builder().cast(x, scalar_of(new_dtype))?])
}

#[cfg(test)]
mod tests {
    use crate::test_util::{lower_binary, lower_unary};
    use tessel_ir::{BinaryOp, Expression, Scalar};
    use tessel_program::{DType, Primitive};

    #[test]
    fn add_any_lowers_like_add() {
        let (ty, out) = lower_binary(Primitive::AddAny, DType::Float32, &[4]);
        assert!(matches!(out, Expression::Binary { op: BinaryOp::Add, .. }));
        assert_eq!(ty, "tensor<4xf32>");
    }

    #[test]
    fn comparisons_produce_predicates() {
        let (ty, out) = lower_binary(Primitive::Le, DType::Int32, &[8]);
        assert!(matches!(out, Expression::Binary { op: BinaryOp::LessEqual, .. }));
        assert_eq!(ty, "tensor<8xi1>");
    }

    #[test]
    fn max_is_compare_and_select() {
        let (ty, out) = lower_binary(Primitive::Max, DType::Float32, &[2, 2]);
        assert!(matches!(out, Expression::Select { .. }));
        assert_eq!(ty, "tensor<2x2xf32>");
    }

    #[test]
    fn conversion_to_the_same_type_is_free() {
        let (ty, out) = lower_unary(
            Primitive::ConvertElementType {
                new_dtype: DType::Float32,
            },
            DType::Float32,
            &[4],
        );
        assert!(matches!(out, Expression::FunctionArgument(_)));
        assert_eq!(ty, "tensor<4xf32>");

        let (ty, out) = lower_unary(
            Primitive::ConvertElementType {
                new_dtype: DType::Bfloat16,
            },
            DType::Float32,
            &[4],
        );
        assert!(matches!(out, Expression::As { convert, .. } if convert == Scalar::BF16));
        assert_eq!(ty, "tensor<4xbf16>");
    }
}
