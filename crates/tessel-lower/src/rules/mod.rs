//! Built-in lowering rules.

mod arith;
mod control;
mod math;
mod memory;
mod reduce;
mod shape;

use tessel_ir::Value;
use tessel_program::{Primitive, PrimitiveKind};

use crate::error::LowerError;
use crate::registry::RuleTable;

/// Destructures a fixed number of operands.
pub(crate) fn operands<const N: usize>(p: &Primitive, args: &[Value]) -> Result<[Value; N], LowerError> {
    <[Value; N]>::try_from(args).map_err(|_| LowerError::TypeMismatch {
        expected: format!("{N} operands for {p}"),
        found: format!("{} operands", args.len()),
    })
}

pub(crate) fn register_builtins(table: &mut RuleTable) {
    use PrimitiveKind as K;

    table.register(K::ProgramId, arith::program_id);
    for kind in [
        K::Add,
        K::AddAny,
        K::Sub,
        K::Mul,
        K::Div,
        K::Rem,
        K::Lt,
        K::Le,
        K::Gt,
        K::Ge,
        K::Eq,
        K::Ne,
    ] {
        table.register(kind, arith::binary);
    }
    table.register(K::Neg, arith::neg);
    table.register(K::Max, arith::min_max);
    table.register(K::Min, arith::min_max);
    table.register(K::SelectN, arith::select_n);
    table.register(K::ConvertElementType, arith::convert_element_type);

    for kind in [
        K::Exp,
        K::Log,
        K::Log1p,
        K::Sin,
        K::Cos,
        K::Tanh,
        K::Sqrt,
        K::Rsqrt,
    ] {
        table.register(kind, math::elementary);
    }
    table.register(K::Logistic, math::logistic);
    table.register(K::IntegerPow, math::integer_pow);

    table.register(K::BroadcastInDim, shape::broadcast_in_dim);
    table.register(K::Squeeze, shape::squeeze);
    table.register(K::Iota, shape::iota);
    table.register(K::Transpose, shape::transpose);
    table.register(K::MaxContiguous, shape::hint);
    table.register(K::MultipleOf, shape::hint);

    table.register(K::DotGeneral, reduce::dot_general);
    for kind in [K::ReduceMax, K::ReduceMin, K::ReduceSum, K::Argmax, K::Argmin] {
        table.register(kind, reduce::reduce);
    }

    table.register(K::Get, memory::get);
    table.register(K::Swap, memory::swap);
    table.register(K::AddUpdate, memory::addupdate);
    table.register(K::Load, memory::load);
    table.register(K::MaskedSwap, memory::masked_swap);
    table.register(K::AtomicRmw, memory::atomic_rmw);

    table.register(K::For, control::for_loop);
    table.register(K::While, control::while_loop);
    table.register(K::Call, control::call);
}
