//! Structured construction of a single-kernel [`Module`].
//!
//! The builder owns the module and the function under construction. Its
//! insertion cursor is a stack of open blocks: [`Builder::begin_for`] pushes a
//! loop body and [`Builder::end_for`] pops it and appends the finished loop to
//! the enclosing block. Every operation validates its operands before touching
//! the function, so a failed call leaves no partially built expression behind.
//!
//! Element-wise operations broadcast their operands explicitly: the emitted
//! `Binary`, `Select`, `Load` and `Store` nodes always see operands of one shape.

use crate::Module;
use crate::arena::Handle;
use crate::display::format_type;
use crate::error::IrError;
use crate::expr::{
    AtomicFunction, BinaryOp, Expression, HintKind, Literal, MathFunction, ReduceOp, UnaryOp,
};
use crate::func::{EntryPoint, Function, FunctionArgument};
use crate::stmt::{Block, Statement};
use crate::types::{Element, Scalar, Type};

/// A typed SSA value produced by the builder.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Value {
    pub expr: Handle<Expression>,
    pub ty: Handle<Type>,
}

/// An open counted loop. Close it with [`Builder::end_for`].
#[derive(Debug)]
#[must_use = "an open loop must be closed with Builder::end_for"]
pub struct ForScope {
    id: u32,
    depth: usize,
    lower: Handle<Expression>,
    upper: Handle<Expression>,
    step: Handle<Expression>,
    induction: Value,
    init: Vec<Value>,
    arguments: Vec<Value>,
}

impl ForScope {
    /// The loop counter, valid inside the body.
    pub fn induction(&self) -> Value {
        self.induction
    }

    /// Loop-carried values as seen at the top of each iteration.
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }
}

/// Broadcast two shapes against each other. Scalars broadcast to anything;
/// blocks must share a rank and agree on every axis that is not 1.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> Result<Vec<usize>, IrError> {
    if a.is_empty() {
        return Ok(b.to_vec());
    }
    if b.is_empty() || a == b {
        return Ok(a.to_vec());
    }
    if a.len() != b.len() {
        return Err(IrError::RankMismatch {
            expected: a.len(),
            found: b.len(),
        });
    }
    a.iter()
        .zip(b)
        .map(|(&x, &y)| match (x, y) {
            _ if x == y => Ok(x),
            (1, _) => Ok(y),
            (_, 1) => Ok(x),
            _ => Err(IrError::ShapeMismatch {
                expected: a.to_vec(),
                found: b.to_vec(),
            }),
        })
        .collect()
}

/// Builds one kernel function.
pub struct Builder {
    module: Module,
    function: Function,
    blocks: Vec<Block>,
    emit_start: Handle<Expression>,
    next_loop_id: u32,
}

impl Builder {
    pub fn new(name: impl Into<String>) -> Self {
        let function = Function::new(name);
        let emit_start = function.expressions.next_handle();
        Self {
            module: Module::default(),
            function,
            blocks: vec![Vec::new()],
            emit_start,
            next_loop_id: 0,
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Number of open blocks; 1 at the top level of the kernel.
    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    pub fn ty(&self, value: Value) -> &Type {
        &self.module.types[value.ty]
    }

    pub fn shape(&self, value: Value) -> &[usize] {
        &self.module.types[value.ty].shape
    }

    pub fn element(&self, value: Value) -> Element {
        self.module.types[value.ty].element
    }

    /// Lane type of a non-pointer value.
    pub fn scalar(&self, value: Value) -> Result<Scalar, IrError> {
        match self.element(value) {
            Element::Scalar(s) => Ok(s),
            Element::Pointer(_) => Err(IrError::TypeMismatch {
                expected: "a scalar element".into(),
                found: format_type(self.ty(value)),
            }),
        }
    }

    fn pointee(&self, pointer: Value) -> Result<Scalar, IrError> {
        match self.element(pointer) {
            Element::Pointer(s) => Ok(s),
            Element::Scalar(_) => Err(IrError::TypeMismatch {
                expected: "a pointer".into(),
                found: format_type(self.ty(pointer)),
            }),
        }
    }

    fn expect_scalar(&self, value: Value, expected: Scalar) -> Result<(), IrError> {
        let found = self.scalar(value)?;
        if found != expected {
            return Err(IrError::TypeMismatch {
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }

    fn expect_rank(&self, value: Value, rank: usize) -> Result<(), IrError> {
        let found = self.shape(value).len();
        if found != rank {
            return Err(IrError::RankMismatch {
                expected: rank,
                found,
            });
        }
        Ok(())
    }

    fn emit(&mut self, expr: Expression, ty: Type) -> Value {
        let ty = self.module.types.insert(ty);
        let expr = self.function.append(expr, ty);
        Value { expr, ty }
    }

    /// Appends an expression whose value is bound by a statement, keeping it
    /// out of every `Emit` range.
    fn bind(&mut self, expr: Expression, ty: Type) -> Value {
        self.flush();
        let value = self.emit(expr, ty);
        self.emit_start = self.function.expressions.next_handle();
        value
    }

    fn flush(&mut self) {
        let range = self.function.expressions.range_from(self.emit_start);
        if !range.is_empty() {
            if let Some(block) = self.blocks.last_mut() {
                block.push(Statement::Emit(range));
            }
        }
        self.emit_start = self.function.expressions.next_handle();
    }

    fn push_statement(&mut self, statement: Statement) {
        self.flush();
        if let Some(block) = self.blocks.last_mut() {
            block.push(statement);
        }
    }

    // ----------------------------------------------------------------------
    // Leaves
    // ----------------------------------------------------------------------

    /// Declares the next kernel argument.
    pub fn argument(&mut self, name: impl Into<String>, ty: Type, divisibility: Option<u32>) -> Value {
        let index = self.function.arguments.len() as u32;
        let value = self.bind(Expression::FunctionArgument(index), ty);
        self.function.arguments.push(FunctionArgument {
            name: Some(name.into()),
            ty: value.ty,
            divisibility,
        });
        value
    }

    pub fn constant(&mut self, literal: Literal, scalar: Scalar) -> Value {
        self.emit(
            Expression::Literal(literal.convert(scalar)),
            Type::scalar(scalar),
        )
    }

    /// A block of zeros; a scalar zero when `shape` is empty.
    pub fn zeros(&mut self, scalar: Scalar, shape: &[usize]) -> Result<Value, IrError> {
        let zero = self.constant(Literal::zero(scalar), scalar);
        self.splat(zero, shape)
    }

    pub fn program_id(&mut self, axis: usize) -> Result<Value, IrError> {
        if axis >= 3 {
            return Err(IrError::InvalidAxis { axis, rank: 3 });
        }
        Ok(self.emit(
            Expression::ProgramId { axis: axis as u32 },
            Type::scalar(Scalar::I32),
        ))
    }

    pub fn arange(&mut self, start: i64, end: i64) -> Result<Value, IrError> {
        if end <= start {
            return Err(IrError::EmptyRange { start, end });
        }
        let len = (end - start) as usize;
        Ok(self.emit(
            Expression::Arange { start, end },
            Type::block(Element::Scalar(Scalar::I32), vec![len]),
        ))
    }

    // ----------------------------------------------------------------------
    // Shape manipulation
    // ----------------------------------------------------------------------

    pub fn splat(&mut self, value: Value, shape: &[usize]) -> Result<Value, IrError> {
        if shape.is_empty() {
            return Ok(value);
        }
        if self.ty(value).is_block() {
            return Err(IrError::ShapeMismatch {
                expected: Vec::new(),
                found: self.shape(value).to_vec(),
            });
        }
        let ty = self.ty(value).with_shape(shape.to_vec());
        Ok(self.emit(
            Expression::Splat {
                value: value.expr,
                shape: shape.to_vec(),
            },
            ty,
        ))
    }

    pub fn broadcast_to(&mut self, value: Value, shape: &[usize]) -> Result<Value, IrError> {
        let source = self.shape(value).to_vec();
        if source == shape {
            return Ok(value);
        }
        if source.is_empty() {
            return self.splat(value, shape);
        }
        let compatible = source.len() == shape.len()
            && source.iter().zip(shape).all(|(&s, &d)| s == d || s == 1);
        if !compatible {
            return Err(IrError::ShapeMismatch {
                expected: shape.to_vec(),
                found: source,
            });
        }
        let ty = self.ty(value).with_shape(shape.to_vec());
        Ok(self.emit(
            Expression::Broadcast {
                value: value.expr,
                shape: shape.to_vec(),
            },
            ty,
        ))
    }

    /// Broadcasts two values to their common shape.
    pub fn broadcast_pair(&mut self, a: Value, b: Value) -> Result<(Value, Value), IrError> {
        let shape = broadcast_shapes(self.shape(a), self.shape(b))?;
        Ok((self.broadcast_to(a, &shape)?, self.broadcast_to(b, &shape)?))
    }

    pub fn expand_dims(&mut self, value: Value, axis: usize) -> Result<Value, IrError> {
        let mut shape = self.shape(value).to_vec();
        if axis > shape.len() {
            return Err(IrError::InvalidAxis {
                axis,
                rank: shape.len(),
            });
        }
        shape.insert(axis, 1);
        let ty = self.ty(value).with_shape(shape);
        Ok(self.emit(
            Expression::ExpandDims {
                value: value.expr,
                axis: axis as u32,
            },
            ty,
        ))
    }

    pub fn reshape(&mut self, value: Value, shape: &[usize]) -> Result<Value, IrError> {
        let source = self.shape(value);
        if source == shape {
            return Ok(value);
        }
        if source.iter().product::<usize>() != shape.iter().product::<usize>() {
            return Err(IrError::ShapeMismatch {
                expected: shape.to_vec(),
                found: source.to_vec(),
            });
        }
        let ty = self.ty(value).with_shape(shape.to_vec());
        Ok(self.emit(
            Expression::Reshape {
                value: value.expr,
                shape: shape.to_vec(),
            },
            ty,
        ))
    }

    pub fn trans(&mut self, value: Value) -> Result<Value, IrError> {
        self.expect_rank(value, 2)?;
        let shape = self.shape(value);
        let ty = self.ty(value).with_shape(vec![shape[1], shape[0]]);
        Ok(self.emit(Expression::Trans { value: value.expr }, ty))
    }

    // ----------------------------------------------------------------------
    // Arithmetic
    // ----------------------------------------------------------------------

    pub fn unary(&mut self, op: UnaryOp, value: Value) -> Result<Value, IrError> {
        self.scalar(value)?;
        let ty = self.ty(value).clone();
        Ok(self.emit(
            Expression::Unary {
                op,
                expr: value.expr,
            },
            ty,
        ))
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, IrError> {
        let scalar = self.scalar(lhs)?;
        self.expect_scalar(rhs, scalar)?;
        let shape = broadcast_shapes(self.shape(lhs), self.shape(rhs))?;
        let left = self.broadcast_to(lhs, &shape)?;
        let right = self.broadcast_to(rhs, &shape)?;
        let result = if op.is_comparison() {
            Scalar::BOOL
        } else {
            scalar
        };
        Ok(self.emit(
            Expression::Binary {
                op,
                left: left.expr,
                right: right.expr,
            },
            Type::block(Element::Scalar(result), shape),
        ))
    }

    /// Floating point math; `Pow` takes its exponent in `arg1`.
    pub fn math(
        &mut self,
        fun: MathFunction,
        arg: Value,
        arg1: Option<Value>,
    ) -> Result<Value, IrError> {
        let scalar = self.scalar(arg)?;
        if !scalar.is_float() {
            return Err(IrError::TypeMismatch {
                expected: "a floating point element".into(),
                found: scalar.to_string(),
            });
        }
        let (arg, arg1) = match (fun, arg1) {
            (MathFunction::Pow, Some(exponent)) => {
                self.expect_scalar(exponent, scalar)?;
                let (base, exponent) = self.broadcast_pair(arg, exponent)?;
                (base, Some(exponent.expr))
            }
            (MathFunction::Pow, None) => {
                return Err(IrError::TypeMismatch {
                    expected: "an exponent operand".into(),
                    found: "none".into(),
                });
            }
            (_, _) => (arg, None),
        };
        let ty = self.ty(arg).clone();
        Ok(self.emit(
            Expression::Math {
                fun,
                arg: arg.expr,
                arg1,
            },
            ty,
        ))
    }

    /// Numeric conversion; a no-op when the element type already matches.
    pub fn cast(&mut self, value: Value, to: Scalar) -> Result<Value, IrError> {
        if self.scalar(value)? == to {
            return Ok(value);
        }
        let ty = self.ty(value).with_element(Element::Scalar(to));
        Ok(self.emit(
            Expression::As {
                expr: value.expr,
                convert: to,
            },
            ty,
        ))
    }

    pub fn select(
        &mut self,
        condition: Value,
        accept: Value,
        reject: Value,
    ) -> Result<Value, IrError> {
        self.expect_scalar(condition, Scalar::BOOL)?;
        let scalar = self.scalar(accept)?;
        self.expect_scalar(reject, scalar)?;
        let shape = broadcast_shapes(self.shape(accept), self.shape(reject))?;
        let shape = broadcast_shapes(self.shape(condition), &shape)?;
        let condition = self.broadcast_to(condition, &shape)?;
        let accept = self.broadcast_to(accept, &shape)?;
        let reject = self.broadcast_to(reject, &shape)?;
        Ok(self.emit(
            Expression::Select {
                condition: condition.expr,
                accept: accept.expr,
                reject: reject.expr,
            },
            Type::block(Element::Scalar(scalar), shape),
        ))
    }

    pub fn dot(&mut self, lhs: Value, rhs: Value, allow_tf32: bool) -> Result<Value, IrError> {
        self.expect_rank(lhs, 2)?;
        self.expect_rank(rhs, 2)?;
        let scalar = self.scalar(lhs)?;
        self.expect_scalar(rhs, scalar)?;
        let (m, k) = (self.shape(lhs)[0], self.shape(lhs)[1]);
        let (k2, n) = (self.shape(rhs)[0], self.shape(rhs)[1]);
        if k != k2 {
            return Err(IrError::ShapeMismatch {
                expected: vec![k, n],
                found: vec![k2, n],
            });
        }
        let accumulator = if scalar.is_float() {
            Scalar::F32
        } else {
            Scalar::I32
        };
        Ok(self.emit(
            Expression::Dot {
                lhs: lhs.expr,
                rhs: rhs.expr,
                allow_tf32,
            },
            Type::block(Element::Scalar(accumulator), vec![m, n]),
        ))
    }

    pub fn reduce(&mut self, op: ReduceOp, value: Value, axis: usize) -> Result<Value, IrError> {
        let scalar = self.scalar(value)?;
        let mut shape = self.shape(value).to_vec();
        if axis >= shape.len() {
            return Err(IrError::InvalidAxis {
                axis,
                rank: shape.len(),
            });
        }
        shape.remove(axis);
        let result = match op {
            ReduceOp::ArgMax | ReduceOp::ArgMin => Scalar::I32,
            ReduceOp::Sum | ReduceOp::Max | ReduceOp::Min => scalar,
        };
        Ok(self.emit(
            Expression::Reduce {
                op,
                value: value.expr,
                axis: axis as u32,
            },
            Type::block(Element::Scalar(result), shape),
        ))
    }

    pub fn hint(&mut self, value: Value, kind: HintKind, values: Vec<u32>) -> Value {
        let ty = self.ty(value).clone();
        self.emit(
            Expression::Hint {
                value: value.expr,
                kind,
                values,
            },
            ty,
        )
    }

    // ----------------------------------------------------------------------
    // Memory
    // ----------------------------------------------------------------------

    /// `pointer + offset`, in elements of the pointee type.
    pub fn offset(&mut self, pointer: Value, offset: Value) -> Result<Value, IrError> {
        let pointee = self.pointee(pointer)?;
        let index = self.scalar(offset)?;
        if !index.is_integer() {
            return Err(IrError::TypeMismatch {
                expected: "an integer offset".into(),
                found: index.to_string(),
            });
        }
        let (pointer, offset) = self.broadcast_pair(pointer, offset)?;
        let shape = self.shape(pointer).to_vec();
        Ok(self.emit(
            Expression::Offset {
                pointer: pointer.expr,
                offset: offset.expr,
            },
            Type::block(Element::Pointer(pointee), shape),
        ))
    }

    fn lane_mask(&mut self, mask: Option<Value>, shape: &[usize]) -> Result<Option<Value>, IrError> {
        mask.map(|mask| {
            self.expect_scalar(mask, Scalar::BOOL)?;
            self.broadcast_to(mask, shape)
        })
        .transpose()
    }

    pub fn load(
        &mut self,
        pointer: Value,
        mask: Option<Value>,
        other: Option<Value>,
    ) -> Result<Value, IrError> {
        let pointee = self.pointee(pointer)?;
        if let Some(other) = other {
            self.expect_scalar(other, pointee)?;
        }
        let shape = self.shape(pointer).to_vec();
        let mask = self.lane_mask(mask, &shape)?;
        let other = other
            .map(|other| self.broadcast_to(other, &shape))
            .transpose()?;
        Ok(self.emit(
            Expression::Load {
                pointer: pointer.expr,
                mask: mask.map(|m| m.expr),
                other: other.map(|o| o.expr),
            },
            Type::block(Element::Scalar(pointee), shape),
        ))
    }

    pub fn store(
        &mut self,
        pointer: Value,
        value: Value,
        mask: Option<Value>,
    ) -> Result<(), IrError> {
        let pointee = self.pointee(pointer)?;
        self.expect_scalar(value, pointee)?;
        let shape = self.shape(pointer).to_vec();
        let value = self.broadcast_to(value, &shape)?;
        let mask = self.lane_mask(mask, &shape)?;
        self.push_statement(Statement::Store {
            pointer: pointer.expr,
            value: value.expr,
            mask: mask.map(|m| m.expr),
        });
        Ok(())
    }

    /// Emits an atomic read-modify-write and returns the previous contents.
    pub fn atomic(
        &mut self,
        fun: AtomicFunction,
        pointer: Value,
        value: Value,
        mask: Option<Value>,
    ) -> Result<Value, IrError> {
        let pointee = self.pointee(pointer)?;
        self.expect_scalar(value, pointee)?;
        let shape = self.shape(pointer).to_vec();
        let value = self.broadcast_to(value, &shape)?;
        let mask = self.lane_mask(mask, &shape)?;
        let result = self.bind(
            Expression::AtomicResult,
            Type::block(Element::Scalar(pointee), shape),
        );
        self.push_statement(Statement::Atomic {
            pointer: pointer.expr,
            fun,
            value: value.expr,
            mask: mask.map(|m| m.expr),
            result: result.expr,
        });
        Ok(result)
    }

    // ----------------------------------------------------------------------
    // Control flow
    // ----------------------------------------------------------------------

    /// Opens a counted loop and moves the cursor into its body.
    pub fn begin_for(
        &mut self,
        lower: Value,
        upper: Value,
        step: Value,
        init: &[Value],
    ) -> Result<ForScope, IrError> {
        let counter = self.scalar(lower)?;
        for bound in [lower, upper, step] {
            self.expect_rank(bound, 0)?;
            self.expect_scalar(bound, counter)?;
        }
        if !counter.is_integer() {
            return Err(IrError::TypeMismatch {
                expected: "an integer loop bound".into(),
                found: counter.to_string(),
            });
        }

        self.flush();
        let id = self.next_loop_id;
        self.next_loop_id += 1;
        self.blocks.push(Vec::new());

        let induction = self.bind(Expression::LoopInduction { loop_id: id }, Type::scalar(counter));
        let arguments = init
            .iter()
            .enumerate()
            .map(|(index, v)| {
                let ty = self.ty(*v).clone();
                self.bind(
                    Expression::LoopArgument {
                        loop_id: id,
                        index: index as u32,
                    },
                    ty,
                )
            })
            .collect();

        Ok(ForScope {
            id,
            depth: self.blocks.len(),
            lower: lower.expr,
            upper: upper.expr,
            step: step.expr,
            induction,
            init: init.to_vec(),
            arguments,
        })
    }

    /// Closes `scope`, yielding the next value of every loop-carried value, and
    /// returns the values the loop produces on exit.
    pub fn end_for(&mut self, scope: ForScope, yields: &[Value]) -> Result<Vec<Value>, IrError> {
        if scope.depth != self.blocks.len() {
            return Err(IrError::UnbalancedScope(format!(
                "loop {} closed at depth {} but opened at depth {}",
                scope.id,
                self.blocks.len(),
                scope.depth
            )));
        }
        if yields.len() != scope.init.len() {
            return Err(IrError::TypeMismatch {
                expected: format!("{} yielded values", scope.init.len()),
                found: format!("{} yielded values", yields.len()),
            });
        }
        for (init, yielded) in scope.init.iter().zip(yields) {
            if init.ty != yielded.ty {
                return Err(IrError::TypeMismatch {
                    expected: format_type(self.ty(*init)),
                    found: format_type(self.ty(*yielded)),
                });
            }
        }

        self.flush();
        let body = self.blocks.pop().unwrap_or_default();
        let results: Vec<Value> = scope
            .init
            .iter()
            .enumerate()
            .map(|(index, v)| {
                let ty = self.ty(*v).clone();
                self.bind(
                    Expression::LoopResult {
                        loop_id: scope.id,
                        index: index as u32,
                    },
                    ty,
                )
            })
            .collect();
        self.push_statement(Statement::For {
            id: scope.id,
            lower: scope.lower,
            upper: scope.upper,
            step: scope.step,
            induction: scope.induction.expr,
            init: scope.init.iter().map(|v| v.expr).collect(),
            arguments: scope.arguments.iter().map(|v| v.expr).collect(),
            body,
            yields: yields.iter().map(|v| v.expr).collect(),
            results: results.iter().map(|v| v.expr).collect(),
        });
        Ok(results)
    }

    pub fn ret(&mut self) {
        self.push_statement(Statement::Return { value: None });
    }

    /// Seals the kernel into a module with a single entry point.
    pub fn finish(mut self) -> Result<Module, IrError> {
        if self.blocks.len() != 1 {
            return Err(IrError::UnbalancedScope(format!(
                "{} loop scope(s) left open",
                self.blocks.len() - 1
            )));
        }
        self.flush();
        self.function.body = self.blocks.pop().unwrap_or_default();
        let name = self.function.name.clone().unwrap_or_default();
        self.module.entry_points.push(EntryPoint {
            name,
            function: self.function,
        });
        Ok(self.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_ptr(b: &mut Builder) -> Value {
        b.argument("x_ptr", Type::pointer(Scalar::F32), Some(16))
    }

    #[test]
    fn statements_flush_pending_expressions() {
        let mut b = Builder::new("k");
        let x = f32_ptr(&mut b);
        let offsets = b.arange(0, 8).unwrap();
        let ptrs = b.offset(x, offsets).unwrap();
        let value = b.load(ptrs, None, None).unwrap();
        b.store(ptrs, value, None).unwrap();
        b.ret();
        let module = b.finish().unwrap();

        let body = &module.entry_points[0].function.body;
        assert!(matches!(body[0], Statement::Emit(_)));
        assert!(matches!(body[1], Statement::Store { .. }));
        assert!(matches!(body[2], Statement::Return { value: None }));
        let Statement::Emit(range) = &body[0] else {
            unreachable!()
        };
        // arange, splat of the base pointer, offset, load
        assert_eq!(range.len(), 4);
        assert!(!range.contains(x.expr));
    }

    #[test]
    fn binary_broadcasts_scalar_operand() {
        let mut b = Builder::new("k");
        let block = b.arange(0, 4).unwrap();
        let two = b.constant(Literal::Int(2), Scalar::I32);
        let sum = b.binary(BinaryOp::Multiply, block, two).unwrap();
        assert_eq!(b.shape(sum), &[4]);
        let cmp = b.binary(BinaryOp::Less, sum, two).unwrap();
        assert_eq!(b.scalar(cmp).unwrap(), Scalar::BOOL);
    }

    #[test]
    fn binary_rejects_mixed_element_types() {
        let mut b = Builder::new("k");
        let i = b.constant(Literal::Int(1), Scalar::I32);
        let f = b.constant(Literal::Float(1.0), Scalar::F32);
        let err = b.binary(BinaryOp::Add, i, f).unwrap_err();
        assert!(matches!(err, IrError::TypeMismatch { .. }));
    }

    #[test]
    fn broadcast_shapes_follows_unit_axes() {
        assert_eq!(broadcast_shapes(&[4, 1], &[1, 8]).unwrap(), vec![4, 8]);
        assert_eq!(broadcast_shapes(&[], &[3]).unwrap(), vec![3]);
        assert!(matches!(
            broadcast_shapes(&[4, 2], &[4, 3]),
            Err(IrError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            broadcast_shapes(&[4], &[4, 4]),
            Err(IrError::RankMismatch { .. })
        ));
    }

    #[test]
    fn for_loop_nests_body_and_binds_results() {
        let mut b = Builder::new("k");
        let zero = b.constant(Literal::Int(0), Scalar::I32);
        let ten = b.constant(Literal::Int(10), Scalar::I32);
        let one = b.constant(Literal::Int(1), Scalar::I32);
        let acc = b.zeros(Scalar::F32, &[4]).unwrap();
        let scope = b.begin_for(zero, ten, one, &[acc]).unwrap();
        assert_eq!(b.depth(), 2);
        let carried = scope.arguments()[0];
        let next = b.binary(BinaryOp::Add, carried, carried).unwrap();
        let results = b.end_for(scope, &[next]).unwrap();
        assert_eq!(b.depth(), 1);
        assert_eq!(results[0].ty, acc.ty);
        let module = b.finish().unwrap();

        let body = &module.entry_points[0].function.body;
        let Some(Statement::For { body: inner, .. }) =
            body.iter().find(|s| matches!(s, Statement::For { .. }))
        else {
            panic!("expected a For statement");
        };
        assert!(matches!(inner.as_slice(), [Statement::Emit(_)]));
    }

    #[test]
    fn end_for_rejects_retyped_yield() {
        let mut b = Builder::new("k");
        let zero = b.constant(Literal::Int(0), Scalar::I32);
        let acc = b.zeros(Scalar::F32, &[]).unwrap();
        let scope = b.begin_for(zero, zero, zero, &[acc]).unwrap();
        let wrong = b.cast(scope.arguments()[0], Scalar::I32).unwrap();
        let err = b.end_for(scope, &[wrong]).unwrap_err();
        assert!(matches!(err, IrError::TypeMismatch { .. }));
    }

    #[test]
    fn finish_rejects_open_loop() {
        let mut b = Builder::new("k");
        let zero = b.constant(Literal::Int(0), Scalar::I32);
        let _scope = b.begin_for(zero, zero, zero, &[]).unwrap();
        assert!(matches!(b.finish(), Err(IrError::UnbalancedScope(_))));
    }

    #[test]
    fn atomic_result_is_not_emitted() {
        let mut b = Builder::new("k");
        let x = f32_ptr(&mut b);
        let one = b.constant(Literal::Float(1.0), Scalar::F32);
        let old = b.atomic(AtomicFunction::Add, x, one, None).unwrap();
        let module = b.finish().unwrap();
        let body = &module.entry_points[0].function.body;
        for stmt in body {
            if let Statement::Emit(range) = stmt {
                assert!(!range.contains(old.expr));
            }
        }
        assert!(matches!(body.last(), Some(Statement::Atomic { fun: AtomicFunction::Add, .. })));
    }

    #[test]
    fn store_rejects_wrong_element_type() {
        let mut b = Builder::new("k");
        let x = f32_ptr(&mut b);
        let v = b.constant(Literal::Int(1), Scalar::I32);
        assert!(matches!(
            b.store(x, v, None),
            Err(IrError::TypeMismatch { .. })
        ));
    }
}
