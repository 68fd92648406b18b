//! Transcendental and power functions.

use tessel_ir::{BinaryOp, Literal, MathFunction, UnaryOp, Value};
use tessel_program::Primitive;

use super::operands;
use crate::context::RuleContext;
use crate::error::LowerError;

pub(crate) fn elementary(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let fun = match p {
        Primitive::Exp => MathFunction::Exp,
        Primitive::Log => MathFunction::Log,
        Primitive::Log1p => MathFunction::Log1p,
        Primitive::Sin => MathFunction::Sin,
        Primitive::Cos => MathFunction::Cos,
        Primitive::Tanh => MathFunction::Tanh,
        Primitive::Sqrt => MathFunction::Sqrt,
        Primitive::Rsqrt => MathFunction::InverseSqrt,
        _ => return Err(LowerError::not_implemented(format!("{p} as a math function"))),
    };
    let [x] = operands(p, args)?;
    Ok(vec![ctx.builder().math(fun, x, None)?])
}

/// `1 / (1 + exp(-x))`
pub(crate) fn logistic(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let [x] = operands(p, args)?;
    let b = ctx.builder();
    let scalar = b.scalar(x)?;
    let one = b.constant(Literal::Float(1.0), scalar);
    let neg = b.unary(UnaryOp::Negate, x)?;
    let exp = b.math(MathFunction::Exp, neg, None)?;
    let den = b.binary(BinaryOp::Add, one, exp)?;
    Ok(vec![b.binary(BinaryOp::Divide, one, den)?])
}

/// Small exponents expand to multiplications; the rest go through `pow`.
pub(crate) fn integer_pow(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::IntegerPow { y } = *p else {
        return Err(LowerError::not_implemented(format!("{p} as integer_pow")));
    };
    let [x] = operands(p, args)?;
    let b = ctx.builder();
    let scalar = b.scalar(x)?;
    let out = match y {
        2 => b.binary(BinaryOp::Multiply, x, x)?,
        3 => {
            let square = b.binary(BinaryOp::Multiply, x, x)?;
            b.binary(BinaryOp::Multiply, x, square)?
        }
        -2 => {
            let one = b.constant(Literal::Int(1), scalar);
            let square = b.binary(BinaryOp::Multiply, x, x)?;
            b.binary(BinaryOp::Divide, one, square)?
        }
        _ if scalar.is_float() => {
            let exponent = b.constant(Literal::Float(f64::from(y)), scalar);
            b.math(MathFunction::Pow, x, Some(exponent))?
        }
        _ => {
            return Err(LowerError::not_implemented(format!(
                "integer_pow with exponent {y} on {scalar}"
            )));
        }
    };
    Ok(vec![out])
}

#[cfg(test)]
mod tests {
    use crate::error::LowerError;
    use crate::test_util::{count, lower_eqn, lower_unary};
    use tessel_ir::{BinaryOp, Expression, MathFunction};
    use tessel_program::{Aval, DType, Primitive};

    #[test]
    fn rsqrt_maps_to_inverse_sqrt() {
        let (ty, out) = lower_unary(Primitive::Rsqrt, DType::Float16, &[8]);
        assert!(matches!(
            out,
            Expression::Math {
                fun: MathFunction::InverseSqrt,
                arg1: None,
                ..
            }
        ));
        assert_eq!(ty, "tensor<8xf16>");
    }

    #[test]
    fn logistic_is_a_division() {
        let (ty, out) = lower_unary(Primitive::Logistic, DType::Float32, &[4]);
        assert!(matches!(out, Expression::Binary { op: BinaryOp::Divide, .. }));
        assert_eq!(ty, "tensor<4xf32>");
    }

    #[test]
    fn small_powers_expand_to_products() {
        let x = Aval::array(vec![4], DType::Float32);
        let (ctx, _) = lower_eqn(Primitive::IntegerPow { y: 3 }, &[x.clone()]).unwrap();
        let muls = count(&ctx, |e| matches!(e, Expression::Binary { op: BinaryOp::Multiply, .. }));
        assert_eq!(muls, 2);

        let (ctx, outs) = lower_eqn(Primitive::IntegerPow { y: -2 }, &[x.clone()]).unwrap();
        let (_, out) = crate::test_util::describe(&ctx, &outs);
        assert!(matches!(out, Expression::Binary { op: BinaryOp::Divide, .. }));
        assert_eq!(count(&ctx, |e| matches!(e, Expression::Math { .. })), 0);

        let (ctx, _) = lower_eqn(Primitive::IntegerPow { y: 5 }, &[x]).unwrap();
        assert_eq!(
            count(&ctx, |e| matches!(e, Expression::Math { fun: MathFunction::Pow, .. })),
            1
        );
    }

    #[test]
    fn general_integer_powers_need_floats() {
        let x = Aval::array(vec![4], DType::Int32);
        assert!(lower_eqn(Primitive::IntegerPow { y: 2 }, &[x.clone()]).is_ok());
        let err = lower_eqn(Primitive::IntegerPow { y: 4 }, &[x]).err().unwrap();
        assert!(matches!(err, LowerError::NotImplemented(_)));
    }
}
