//! Kernel execution.

use std::cmp::Ordering;
use std::ops::ControlFlow;

use ndarray::{ArrayD, ArrayView1, Axis, Ix2, IxDyn};
use tessel_ir::{
    AtomicFunction, BinaryOp, Block, Element, EntryPoint, Expression, Function, Handle,
    MathFunction, Module, ReduceOp, Statement, Type, UnaryOp,
};

use crate::error::InterpError;
use crate::memory::{ArgValue, Memory};
use crate::value::{Lane, Pointer, Tensor};

const LAUNCH_AXES: usize = 3;

/// Runs the entry point of a kernel module.
#[derive(Debug)]
pub struct Interpreter<'a> {
    module: &'a Module,
    entry: &'a EntryPoint,
}

/// Values of one running instance, indexed by expression handle.
struct Frame {
    program_id: [usize; LAUNCH_AXES],
    values: Vec<Option<Tensor>>,
}

impl Frame {
    fn get(&self, handle: Handle<Expression>) -> Result<&Tensor, InterpError> {
        self.values
            .get(handle.index())
            .and_then(Option::as_ref)
            .ok_or(InterpError::Unevaluated(handle.index()))
    }

    fn set(&mut self, handle: Handle<Expression>, value: Tensor) {
        if let Some(slot) = self.values.get_mut(handle.index()) {
            *slot = Some(value);
        }
    }
}

impl<'a> Interpreter<'a> {
    pub fn new(module: &'a Module) -> Result<Self, InterpError> {
        let entry = module
            .entry_points
            .first()
            .ok_or(InterpError::NoEntryPoint)?;
        Ok(Self { module, entry })
    }

    /// Runs one kernel instance.
    pub fn run(
        &self,
        memory: &mut Memory,
        args: &[ArgValue],
        program_id: [usize; LAUNCH_AXES],
    ) -> Result<(), InterpError> {
        self.execute(memory, args, program_id).map(drop)
    }

    /// Runs every instance of `grid`, one after another, in row-major order
    /// of `(z, y, x)`. Missing axes count as 1.
    pub fn launch(
        &self,
        memory: &mut Memory,
        args: &[ArgValue],
        grid: &[usize],
    ) -> Result<(), InterpError> {
        if grid.len() > LAUNCH_AXES {
            return Err(InterpError::InvalidGrid(grid.to_vec()));
        }
        let mut dims = [1; LAUNCH_AXES];
        dims[..grid.len()].copy_from_slice(grid);
        log::debug!(
            "launching '{}' over {} instance(s) {dims:?}",
            self.entry.name,
            dims.iter().product::<usize>()
        );
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    self.run(memory, args, [x, y, z])?;
                }
            }
        }
        Ok(())
    }

    /// Runs one instance and returns the value `handle` holds once it
    /// finishes. Values computed inside a loop hold their last iteration.
    pub fn evaluate(
        &self,
        memory: &mut Memory,
        args: &[ArgValue],
        program_id: [usize; LAUNCH_AXES],
        handle: Handle<Expression>,
    ) -> Result<Tensor, InterpError> {
        let mut frame = self.execute(memory, args, program_id)?;
        frame
            .values
            .get_mut(handle.index())
            .and_then(Option::take)
            .ok_or(InterpError::Unevaluated(handle.index()))
    }

    fn function(&self) -> &'a Function {
        &self.entry.function
    }

    fn ty(&self, handle: Handle<Expression>) -> Result<&'a Type, InterpError> {
        self.function()
            .type_of(handle)
            .and_then(|ty| self.module.types.try_get(ty))
            .ok_or_else(|| InterpError::TypeMismatch {
                expected: "a typed expression".into(),
                found: format!("untyped expression {}", handle.index()),
            })
    }

    fn execute(
        &self,
        memory: &mut Memory,
        args: &[ArgValue],
        program_id: [usize; LAUNCH_AXES],
    ) -> Result<Frame, InterpError> {
        log::trace!("running '{}' at {program_id:?}", self.entry.name);
        let function = self.function();
        let mut frame = Frame {
            program_id,
            values: vec![None; function.expressions.len()],
        };
        self.bind_arguments(&mut frame, memory, args)?;
        self.exec_block(&mut frame, memory, &function.body)?;
        Ok(frame)
    }

    fn bind_arguments(
        &self,
        frame: &mut Frame,
        memory: &Memory,
        args: &[ArgValue],
    ) -> Result<(), InterpError> {
        let function = self.function();
        if args.len() != function.arguments.len() {
            return Err(InterpError::ArgumentCount {
                expected: function.arguments.len(),
                found: args.len(),
            });
        }
        for (handle, expr) in function.expressions.iter() {
            let Expression::FunctionArgument(index) = *expr else {
                continue;
            };
            let index = index as usize;
            let ty = self.ty(handle)?;
            let lane = match (ty.element, args.get(index)) {
                (Element::Pointer(_), Some(&ArgValue::Buffer(id))) => {
                    memory.buffer(id)?;
                    Lane::Ptr(Pointer::new(id))
                }
                (Element::Scalar(s), Some(&ArgValue::Scalar(lane))) => lane.convert(s)?,
                (Element::Pointer(s), _) => {
                    return Err(InterpError::ArgumentType {
                        index,
                        expected: format!("a buffer of {s}"),
                    });
                }
                (Element::Scalar(s), _) => {
                    return Err(InterpError::ArgumentType {
                        index,
                        expected: format!("a {s} scalar"),
                    });
                }
            };
            frame.set(handle, Tensor::scalar(ty.element, lane));
        }
        Ok(())
    }

    // ----------------------------------------------------------------------
    // Statements
    // ----------------------------------------------------------------------

    fn exec_block(
        &self,
        frame: &mut Frame,
        memory: &mut Memory,
        block: &Block,
    ) -> Result<ControlFlow<()>, InterpError> {
        for statement in block {
            if self.exec_statement(frame, memory, statement)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        }
        Ok(ControlFlow::Continue(()))
    }

    fn exec_statement(
        &self,
        frame: &mut Frame,
        memory: &mut Memory,
        statement: &Statement,
    ) -> Result<ControlFlow<()>, InterpError> {
        match statement {
            Statement::Emit(range) => {
                let expressions = &self.function().expressions;
                for handle in range.iter() {
                    let expr = &expressions[handle];
                    if expr.is_statement_bound() {
                        continue;
                    }
                    let value = self.eval(frame, memory, handle, expr)?;
                    frame.set(handle, value);
                }
            }
            Statement::Store {
                pointer,
                value,
                mask,
            } => {
                let pointers = frame.get(*pointer)?;
                let values = frame.get(*value)?;
                expect_shape(values, pointers.shape())?;
                let active = mask_lanes(frame, *mask, pointers.shape())?;
                for ((p, v), on) in pointers.lanes().zip(values.lanes()).zip(active) {
                    if on {
                        memory.write(p.as_pointer()?, v)?;
                    }
                }
            }
            Statement::Atomic {
                pointer,
                fun,
                value,
                mask,
                result,
            } => {
                let pointers = frame.get(*pointer)?;
                let values = frame.get(*value)?;
                let pointee = pointers.element.scalar();
                expect_shape(values, pointers.shape())?;
                let active = mask_lanes(frame, *mask, pointers.shape())?;
                let mut old = Vec::with_capacity(active.len());
                for ((p, v), on) in pointers.lanes().zip(values.lanes()).zip(active) {
                    if !on {
                        old.push(Lane::zero(pointee));
                        continue;
                    }
                    let p = p.as_pointer()?;
                    let previous = memory.read(p)?.convert(pointee)?;
                    memory.write(p, atomic_lane(*fun, previous, v.convert(pointee)?)?)?;
                    old.push(previous);
                }
                let data = ArrayD::from_shape_vec(IxDyn(pointers.shape()), old)?;
                frame.set(*result, Tensor::new(Element::Scalar(pointee), data));
            }
            Statement::For {
                lower,
                upper,
                step,
                induction,
                init,
                arguments,
                body,
                yields,
                results,
                ..
            } => {
                let lower = frame.get(*lower)?.item()?.as_i64()?;
                let upper = frame.get(*upper)?.item()?.as_i64()?;
                let step = frame.get(*step)?.item()?.as_i64()?;
                if step <= 0 {
                    return Err(InterpError::InvalidStep(step));
                }
                let counter = self.ty(*induction)?.element;
                let mut carried = carried_values(frame, init)?;
                let mut i = lower;
                while i < upper {
                    frame.set(*induction, Tensor::scalar(counter, Lane::Int(i)));
                    for (&argument, value) in arguments.iter().zip(carried) {
                        frame.set(argument, value);
                    }
                    if self.exec_block(frame, memory, body)?.is_break() {
                        return Ok(ControlFlow::Break(()));
                    }
                    carried = carried_values(frame, yields)?;
                    i += step;
                }
                for (&result, value) in results.iter().zip(carried) {
                    frame.set(result, value);
                }
            }
            Statement::Return { .. } => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }

    // ----------------------------------------------------------------------
    // Expressions
    // ----------------------------------------------------------------------

    fn eval(
        &self,
        frame: &Frame,
        memory: &Memory,
        handle: Handle<Expression>,
        expr: &Expression,
    ) -> Result<Tensor, InterpError> {
        let ty = self.ty(handle)?;
        let data = match *expr {
            Expression::Literal(literal) => scalar_data(Lane::from_literal(literal)),
            Expression::ProgramId { axis } => {
                let id = frame.program_id.get(axis as usize).copied().unwrap_or(0);
                scalar_data(Lane::Int(id as i64))
            }
            Expression::Arange { start, end } => {
                let len = usize::try_from(end - start).unwrap_or(0);
                ArrayD::from_shape_vec(IxDyn(&[len]), (start..end).map(Lane::Int).collect())?
            }
            Expression::Splat { value, ref shape } => {
                ArrayD::from_elem(IxDyn(shape), frame.get(value)?.item()?)
            }
            Expression::Broadcast { value, ref shape } => {
                let value = frame.get(value)?;
                value
                    .data
                    .broadcast(IxDyn(shape))
                    .ok_or_else(|| InterpError::ShapeMismatch {
                        expected: shape.clone(),
                        found: value.shape().to_vec(),
                    })?
                    .to_owned()
            }
            Expression::ExpandDims { value, axis } => {
                let value = frame.get(value)?;
                if axis as usize > value.data.ndim() {
                    return Err(InterpError::ShapeMismatch {
                        expected: ty.shape.clone(),
                        found: value.shape().to_vec(),
                    });
                }
                value.data.clone().insert_axis(Axis(axis as usize))
            }
            Expression::Reshape { value, ref shape } => {
                ArrayD::from_shape_vec(IxDyn(shape), frame.get(value)?.lanes().collect())?
            }
            Expression::Unary { op, expr } => map(frame.get(expr)?, |l| unary_lane(op, l))?,
            Expression::Binary { op, left, right } => {
                zip(frame.get(left)?, frame.get(right)?, |a, b| binary_lane(op, a, b))?
            }
            Expression::Math { fun, arg, arg1 } => match arg1 {
                Some(arg1) => zip(frame.get(arg)?, frame.get(arg1)?, |a, b| {
                    math_lane(fun, a, Some(b))
                })?,
                None => map(frame.get(arg)?, |a| math_lane(fun, a, None))?,
            },
            Expression::As { expr, convert } => map(frame.get(expr)?, |l| l.convert(convert))?,
            Expression::Select {
                condition,
                accept,
                reject,
            } => {
                let (condition, accept, reject) =
                    (frame.get(condition)?, frame.get(accept)?, frame.get(reject)?);
                expect_shape(condition, accept.shape())?;
                expect_shape(reject, accept.shape())?;
                let lanes = condition
                    .lanes()
                    .zip(accept.lanes().zip(reject.lanes()))
                    .map(|(c, (a, r))| Ok(if c.as_bool()? { a } else { r }))
                    .collect::<Result<Vec<_>, InterpError>>()?;
                ArrayD::from_shape_vec(IxDyn(accept.shape()), lanes)?
            }
            Expression::Trans { value } => {
                let value = frame.get(value)?;
                value.data.view().into_dimensionality::<Ix2>()?;
                value.data.t().to_owned()
            }
            Expression::Dot { lhs, rhs, .. } => dot(frame.get(lhs)?, frame.get(rhs)?)?,
            Expression::Reduce { op, value, axis } => {
                let value = frame.get(value)?;
                let axis = axis as usize;
                if axis >= value.data.ndim() {
                    return Err(InterpError::ShapeMismatch {
                        expected: ty.shape.clone(),
                        found: value.shape().to_vec(),
                    });
                }
                value.data.map_axis(Axis(axis), |lane| reduce_lane(op, lane))
            }
            Expression::Hint { value, .. } => frame.get(value)?.data.clone(),
            Expression::Offset { pointer, offset } => {
                zip(frame.get(pointer)?, frame.get(offset)?, |p, o| {
                    Ok(Lane::Ptr(p.as_pointer()?.add(o.as_i64()?)))
                })?
            }
            Expression::Load {
                pointer,
                mask,
                other,
            } => load(frame, memory, pointer, mask, other)?,
            Expression::FunctionArgument(_)
            | Expression::AtomicResult
            | Expression::LoopInduction { .. }
            | Expression::LoopArgument { .. }
            | Expression::LoopResult { .. } => return frame.get(handle).cloned(),
        };

        if data.shape() != ty.shape.as_slice() {
            return Err(InterpError::ShapeMismatch {
                expected: ty.shape.clone(),
                found: data.shape().to_vec(),
            });
        }
        let data = match ty.element {
            Element::Scalar(scalar) => data.mapv(|lane| lane.normalize(scalar)),
            Element::Pointer(_) => data,
        };
        Ok(Tensor::new(ty.element, data))
    }
}

fn scalar_data(lane: Lane) -> ArrayD<Lane> {
    ArrayD::from_elem(IxDyn(&[]), lane)
}

fn expect_shape(value: &Tensor, shape: &[usize]) -> Result<(), InterpError> {
    if value.shape() != shape {
        return Err(InterpError::ShapeMismatch {
            expected: shape.to_vec(),
            found: value.shape().to_vec(),
        });
    }
    Ok(())
}

fn carried_values(frame: &Frame, handles: &[Handle<Expression>]) -> Result<Vec<Tensor>, InterpError> {
    handles.iter().map(|&h| frame.get(h).cloned()).collect()
}

/// Active lanes of an optional mask; every lane is active without one.
fn mask_lanes(
    frame: &Frame,
    mask: Option<Handle<Expression>>,
    shape: &[usize],
) -> Result<Vec<bool>, InterpError> {
    match mask {
        None => Ok(vec![true; shape.iter().product()]),
        Some(mask) => {
            let mask = frame.get(mask)?;
            expect_shape(mask, shape)?;
            mask.lanes().map(Lane::as_bool).collect()
        }
    }
}

fn map(
    value: &Tensor,
    f: impl Fn(Lane) -> Result<Lane, InterpError>,
) -> Result<ArrayD<Lane>, InterpError> {
    let lanes = value.lanes().map(f).collect::<Result<Vec<_>, _>>()?;
    Ok(ArrayD::from_shape_vec(IxDyn(value.shape()), lanes)?)
}

fn zip(
    a: &Tensor,
    b: &Tensor,
    f: impl Fn(Lane, Lane) -> Result<Lane, InterpError>,
) -> Result<ArrayD<Lane>, InterpError> {
    expect_shape(b, a.shape())?;
    let lanes = a
        .lanes()
        .zip(b.lanes())
        .map(|(x, y)| f(x, y))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ArrayD::from_shape_vec(IxDyn(a.shape()), lanes)?)
}

/// Masked gather; inactive lanes take `other`, or zero without one.
fn load(
    frame: &Frame,
    memory: &Memory,
    pointer: Handle<Expression>,
    mask: Option<Handle<Expression>>,
    other: Option<Handle<Expression>>,
) -> Result<ArrayD<Lane>, InterpError> {
    let pointers = frame.get(pointer)?;
    let pointee = pointers.element.scalar();
    let shape = pointers.shape();
    let active = mask_lanes(frame, mask, shape)?;
    let fallback: Vec<Lane> = match other {
        Some(other) => {
            let other = frame.get(other)?;
            expect_shape(other, shape)?;
            other.lanes().collect()
        }
        None => vec![Lane::zero(pointee); active.len()],
    };
    let lanes = pointers
        .lanes()
        .zip(active)
        .zip(fallback)
        .map(|((p, on), fallback)| {
            if on {
                memory.read(p.as_pointer()?)?.convert(pointee)
            } else {
                Ok(fallback)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ArrayD::from_shape_vec(IxDyn(shape), lanes)?)
}

fn unsupported(what: impl std::fmt::Debug, lane: Lane) -> InterpError {
    InterpError::TypeMismatch {
        expected: format!("an operand supported by {what:?}"),
        found: format!("{lane:?}"),
    }
}

fn unary_lane(op: UnaryOp, lane: Lane) -> Result<Lane, InterpError> {
    Ok(match (op, lane) {
        (UnaryOp::Negate, Lane::Float(x)) => Lane::Float(-x),
        (UnaryOp::Negate, Lane::Int(x)) => Lane::Int(x.wrapping_neg()),
        (UnaryOp::LogicalNot | UnaryOp::BitwiseNot, Lane::Bool(b)) => Lane::Bool(!b),
        (UnaryOp::LogicalNot, Lane::Int(x)) => Lane::Int(i64::from(x == 0)),
        (UnaryOp::BitwiseNot, Lane::Int(x)) => Lane::Int(!x),
        _ => return Err(unsupported(op, lane)),
    })
}

fn binary_lane(op: BinaryOp, a: Lane, b: Lane) -> Result<Lane, InterpError> {
    match (a, b) {
        (Lane::Float(x), Lane::Float(y)) => {
            float_binary(op, x, y).ok_or_else(|| unsupported(op, a))
        }
        (Lane::Int(x), Lane::Int(y)) => int_binary(op, x, y),
        (Lane::Bool(x), Lane::Bool(y)) => {
            bool_binary(op, x, y).ok_or_else(|| unsupported(op, a))
        }
        _ => Err(InterpError::TypeMismatch {
            expected: "operands of the same kind".into(),
            found: format!("{a:?} and {b:?}"),
        }),
    }
}

fn compare<T: PartialOrd>(op: BinaryOp, x: T, y: T) -> Option<bool> {
    Some(match op {
        BinaryOp::Equal => x == y,
        BinaryOp::NotEqual => x != y,
        BinaryOp::Less => x < y,
        BinaryOp::LessEqual => x <= y,
        BinaryOp::Greater => x > y,
        BinaryOp::GreaterEqual => x >= y,
        _ => return None,
    })
}

fn float_binary(op: BinaryOp, x: f64, y: f64) -> Option<Lane> {
    let value = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Subtract => x - y,
        BinaryOp::Multiply => x * y,
        BinaryOp::Divide => x / y,
        BinaryOp::Modulo => x % y,
        _ => return compare(op, x, y).map(Lane::Bool),
    };
    Some(Lane::Float(value))
}

fn int_binary(op: BinaryOp, x: i64, y: i64) -> Result<Lane, InterpError> {
    let value = match op {
        BinaryOp::Add => x.wrapping_add(y),
        BinaryOp::Subtract => x.wrapping_sub(y),
        BinaryOp::Multiply => x.wrapping_mul(y),
        BinaryOp::Divide | BinaryOp::Modulo if y == 0 => return Err(InterpError::DivisionByZero),
        BinaryOp::Divide => x.wrapping_div(y),
        BinaryOp::Modulo => x.wrapping_rem(y),
        BinaryOp::BitwiseAnd => x & y,
        BinaryOp::BitwiseOr => x | y,
        BinaryOp::BitwiseXor => x ^ y,
        BinaryOp::LogicalAnd => i64::from(x != 0 && y != 0),
        BinaryOp::LogicalOr => i64::from(x != 0 || y != 0),
        _ => {
            return compare(op, x, y)
                .map(Lane::Bool)
                .ok_or_else(|| unsupported(op, Lane::Int(x)));
        }
    };
    Ok(Lane::Int(value))
}

fn bool_binary(op: BinaryOp, x: bool, y: bool) -> Option<Lane> {
    let value = match op {
        BinaryOp::LogicalAnd | BinaryOp::BitwiseAnd => x & y,
        BinaryOp::LogicalOr | BinaryOp::BitwiseOr => x | y,
        BinaryOp::BitwiseXor => x ^ y,
        _ => return compare(op, x, y).map(Lane::Bool),
    };
    Some(Lane::Bool(value))
}

fn math_lane(fun: MathFunction, a: Lane, b: Option<Lane>) -> Result<Lane, InterpError> {
    let x = a.as_f64()?;
    let value = match fun {
        MathFunction::Exp => x.exp(),
        MathFunction::Log => x.ln(),
        MathFunction::Log1p => x.ln_1p(),
        MathFunction::Sin => x.sin(),
        MathFunction::Cos => x.cos(),
        MathFunction::Tanh => x.tanh(),
        MathFunction::Sqrt => x.sqrt(),
        MathFunction::InverseSqrt => 1.0 / x.sqrt(),
        MathFunction::Pow => {
            let exponent = b.ok_or_else(|| InterpError::TypeMismatch {
                expected: "an exponent".into(),
                found: "none".into(),
            })?;
            x.powf(exponent.as_f64()?)
        }
    };
    Ok(Lane::Float(value))
}

fn atomic_lane(fun: AtomicFunction, old: Lane, value: Lane) -> Result<Lane, InterpError> {
    let op = match fun {
        AtomicFunction::Exchange => return Ok(value),
        AtomicFunction::Add => BinaryOp::Add,
        AtomicFunction::Max | AtomicFunction::Min => {
            let wins = match fun {
                AtomicFunction::Max => BinaryOp::Greater,
                _ => BinaryOp::Less,
            };
            let replace = binary_lane(wins, value, old)?.as_bool()?;
            return Ok(if replace { value } else { old });
        }
        AtomicFunction::And => BinaryOp::BitwiseAnd,
        AtomicFunction::InclusiveOr => BinaryOp::BitwiseOr,
        AtomicFunction::ExclusiveOr => BinaryOp::BitwiseXor,
    };
    binary_lane(op, old, value)
}

fn order(a: Lane, b: Lane) -> Ordering {
    match (a, b) {
        (Lane::Float(x), Lane::Float(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Lane::Int(x), Lane::Int(y)) => x.cmp(&y),
        (Lane::Bool(x), Lane::Bool(y)) => x.cmp(&y),
        _ => Ordering::Equal,
    }
}

fn sum(a: Lane, b: Lane) -> Lane {
    match (a, b) {
        (Lane::Float(x), Lane::Float(y)) => Lane::Float(x + y),
        (Lane::Int(x), Lane::Int(y)) => Lane::Int(x.wrapping_add(y)),
        (Lane::Bool(x), Lane::Bool(y)) => Lane::Bool(x | y),
        (a, _) => a,
    }
}

/// Index of the first lane that no later lane beats in direction `wins`.
fn arg_best(lanes: &ArrayView1<'_, Lane>, wins: Ordering) -> Lane {
    let mut best = 0;
    for (i, &lane) in lanes.iter().enumerate().skip(1) {
        if order(lane, lanes[best]) == wins {
            best = i;
        }
    }
    Lane::Int(best as i64)
}

fn reduce_lane(op: ReduceOp, lanes: ArrayView1<'_, Lane>) -> Lane {
    let pick = |wins: Ordering| {
        move |a: Lane, b: Lane| if order(b, a) == wins { b } else { a }
    };
    let reduced = match op {
        ReduceOp::Sum => lanes.iter().copied().reduce(sum),
        ReduceOp::Max => lanes.iter().copied().reduce(pick(Ordering::Greater)),
        ReduceOp::Min => lanes.iter().copied().reduce(pick(Ordering::Less)),
        ReduceOp::ArgMax => return arg_best(&lanes, Ordering::Greater),
        ReduceOp::ArgMin => return arg_best(&lanes, Ordering::Less),
    };
    reduced.unwrap_or(Lane::Int(0))
}

fn dot(lhs: &Tensor, rhs: &Tensor) -> Result<ArrayD<Lane>, InterpError> {
    let a = lhs.data.view().into_dimensionality::<Ix2>()?;
    let b = rhs.data.view().into_dimensionality::<Ix2>()?;
    let ((m, k), (k2, n)) = (a.dim(), b.dim());
    if k != k2 {
        return Err(InterpError::ShapeMismatch {
            expected: vec![k, n],
            found: vec![k2, n],
        });
    }
    let float = lhs.element.scalar().is_float();
    let mut out = Vec::with_capacity(m * n);
    for i in 0..m {
        for j in 0..n {
            let lane = if float {
                let mut acc = 0.0;
                for p in 0..k {
                    acc += a[[i, p]].as_f64()? * b[[p, j]].as_f64()?;
                }
                Lane::Float(acc)
            } else {
                let mut acc = 0i64;
                for p in 0..k {
                    acc = acc.wrapping_add(a[[i, p]].as_i64()?.wrapping_mul(b[[p, j]].as_i64()?));
                }
                Lane::Int(acc)
            };
            out.push(lane);
        }
    }
    Ok(ArrayD::from_shape_vec(IxDyn(&[m, n]), out)?)
}
