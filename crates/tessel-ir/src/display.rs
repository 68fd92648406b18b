//! Display implementations and the textual module dump.

use std::fmt;
use std::fmt::Write as _;

use crate::Module;
use crate::arena::Handle;
use crate::expr::{
    AtomicFunction, BinaryOp, Expression, HintKind, Literal, MathFunction, ReduceOp, UnaryOp,
};
use crate::func::Function;
use crate::stmt::Statement;
use crate::types::{Element, Scalar, ScalarKind, Type};

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ScalarKind::Bool => write!(f, "i1"),
            ScalarKind::Sint => write!(f, "i{}", self.width * 8),
            ScalarKind::Uint => write!(f, "u{}", self.width * 8),
            ScalarKind::Float => write!(f, "f{}", self.width * 8),
            ScalarKind::BFloat => write!(f, "bf{}", self.width * 8),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(s) => write!(f, "{s}"),
            Self::Pointer(s) => write!(f, "ptr<{s}>"),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Negate => write!(f, "neg"),
            Self::LogicalNot => write!(f, "not"),
            Self::BitwiseNot => write!(f, "bitnot"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "add",
            Self::Subtract => "sub",
            Self::Multiply => "mul",
            Self::Divide => "div",
            Self::Modulo => "rem",
            Self::Equal => "eq",
            Self::NotEqual => "ne",
            Self::Less => "lt",
            Self::LessEqual => "le",
            Self::Greater => "gt",
            Self::GreaterEqual => "ge",
            Self::LogicalAnd => "and",
            Self::LogicalOr => "or",
            Self::BitwiseAnd => "bitand",
            Self::BitwiseOr => "bitor",
            Self::BitwiseXor => "bitxor",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for MathFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log1p => "log1p",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tanh => "tanh",
            Self::Sqrt => "sqrt",
            Self::InverseSqrt => "rsqrt",
            Self::Pow => "pow",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for ReduceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sum => "sum",
            Self::Max => "max",
            Self::Min => "min",
            Self::ArgMax => "argmax",
            Self::ArgMin => "argmin",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for AtomicFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exchange => "atomic_xchg",
            Self::Add => "atomic_add",
            Self::Max => "atomic_max",
            Self::Min => "atomic_min",
            Self::And => "atomic_and",
            Self::InclusiveOr => "atomic_or",
            Self::ExclusiveOr => "atomic_xor",
        };
        write!(f, "{name}")
    }
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxContiguous => write!(f, "max_contiguous"),
            Self::MultipleOf => write!(f, "multiple_of"),
        }
    }
}

/// Formats a type: `f32`, `ptr<f16>`, `tensor<16x32xf32>`.
pub fn format_type(ty: &Type) -> String {
    if ty.shape.is_empty() {
        return ty.element.to_string();
    }
    let dims: Vec<String> = ty.shape.iter().map(ToString::to_string).collect();
    format!("tensor<{}x{}>", dims.join("x"), ty.element)
}

fn join(handles: &[Handle<Expression>]) -> String {
    handles
        .iter()
        .map(|h| format!("{h:?}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_expr(expr: &Expression) -> String {
    match expr {
        Expression::Literal(lit) => format!("constant {lit}"),
        Expression::FunctionArgument(i) => format!("arg {i}"),
        Expression::ProgramId { axis } => format!("program_id {axis}"),
        Expression::Arange { start, end } => format!("arange {start}, {end}"),
        Expression::Splat { value, .. } => format!("splat {value:?}"),
        Expression::Broadcast { value, .. } => format!("broadcast {value:?}"),
        Expression::ExpandDims { value, axis } => format!("expand_dims {value:?}, axis {axis}"),
        Expression::Reshape { value, .. } => format!("reshape {value:?}"),
        Expression::Unary { op, expr } => format!("{op} {expr:?}"),
        Expression::Binary { op, left, right } => format!("{op} {left:?}, {right:?}"),
        Expression::Math { fun, arg, arg1 } => match arg1 {
            Some(a1) => format!("{fun} {arg:?}, {a1:?}"),
            None => format!("{fun} {arg:?}"),
        },
        Expression::As { expr, convert } => format!("cast {expr:?} to {convert}"),
        Expression::Select {
            condition,
            accept,
            reject,
        } => format!("select {condition:?}, {accept:?}, {reject:?}"),
        Expression::Trans { value } => format!("trans {value:?}"),
        Expression::Dot {
            lhs,
            rhs,
            allow_tf32,
        } => format!("dot {lhs:?}, {rhs:?} {{allow_tf32 = {allow_tf32}}}"),
        Expression::Reduce { op, value, axis } => format!("reduce.{op} {value:?}, axis {axis}"),
        Expression::Hint { value, kind, values } => format!("{kind} {value:?}, {values:?}"),
        Expression::Offset { pointer, offset } => format!("addptr {pointer:?}, {offset:?}"),
        Expression::Load {
            pointer,
            mask,
            other,
        } => {
            let mut s = format!("load {pointer:?}");
            if let Some(m) = mask {
                let _ = write!(s, ", mask {m:?}");
            }
            if let Some(o) = other {
                let _ = write!(s, ", other {o:?}");
            }
            s
        }
        Expression::AtomicResult => "atomic_result".into(),
        Expression::LoopInduction { loop_id } => format!("induction loop{loop_id}"),
        Expression::LoopArgument { loop_id, index } => format!("iter_arg loop{loop_id}#{index}"),
        Expression::LoopResult { loop_id, index } => format!("result loop{loop_id}#{index}"),
    }
}

fn write_expr_line(out: &mut String, pad: &str, handle: Handle<Expression>, module: &Module, func: &Function) {
    let ty = func
        .type_of(handle)
        .and_then(|t| module.types.try_get(t))
        .map(format_type)
        .unwrap_or_else(|| "?".into());
    let _ = writeln!(
        out,
        "{pad}{handle:?} = {} : {ty}",
        format_expr(&func.expressions[handle])
    );
}

fn write_stmt(out: &mut String, stmt: &Statement, indent: usize, module: &Module, func: &Function) {
    let pad = " ".repeat(indent);
    match stmt {
        Statement::Emit(range) => {
            for handle in range.iter() {
                write_expr_line(out, &pad, handle, module, func);
            }
        }
        Statement::Store {
            pointer,
            value,
            mask,
        } => match mask {
            Some(m) => {
                let _ = writeln!(out, "{pad}store {pointer:?}, {value:?}, mask {m:?}");
            }
            None => {
                let _ = writeln!(out, "{pad}store {pointer:?}, {value:?}");
            }
        },
        Statement::Atomic {
            pointer,
            fun,
            value,
            mask,
            result,
        } => {
            let mask = mask.map(|m| format!(", mask {m:?}")).unwrap_or_default();
            let _ = writeln!(out, "{pad}{result:?} = {fun} {pointer:?}, {value:?}{mask}");
        }
        Statement::For {
            id,
            lower,
            upper,
            step,
            induction,
            init,
            arguments,
            body,
            yields,
            results,
        } => {
            let _ = writeln!(
                out,
                "{pad}{} = for loop{id} {induction:?} = {lower:?} to {upper:?} step {step:?} iter_args({}) = ({}) {{",
                join(results),
                join(arguments),
                join(init)
            );
            for s in body {
                write_stmt(out, s, indent + 4, module, func);
            }
            let _ = writeln!(out, "{pad}    yield {}", join(yields));
            let _ = writeln!(out, "{pad}}}");
        }
        Statement::Return { value } => match value {
            Some(v) => {
                let _ = writeln!(out, "{pad}return {v:?}");
            }
            None => {
                let _ = writeln!(out, "{pad}return");
            }
        },
    }
}

/// Produces a human-readable text dump of a [`Module`] for debugging.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();

    out.push_str("Types:\n");
    for (handle, ty) in module.types.iter() {
        let _ = writeln!(out, "  {handle:?} {}", format_type(ty));
    }

    for ep in &module.entry_points {
        let func = &ep.function;
        let args: Vec<String> = func
            .arguments
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                let name = arg.name.as_deref().unwrap_or("_");
                let ty = module
                    .types
                    .try_get(arg.ty)
                    .map(format_type)
                    .unwrap_or_else(|| "?".into());
                match arg.divisibility {
                    Some(d) => format!("%arg{i} {name}: {ty} {{divisibility = {d}}}"),
                    None => format!("%arg{i} {name}: {ty}"),
                }
            })
            .collect();
        let _ = writeln!(out, "\nkernel @{}({}) {{", ep.name, args.join(", "));
        for stmt in &func.body {
            write_stmt(&mut out, stmt, 2, module, func);
        }
        out.push_str("}\n");
    }

    out
}
