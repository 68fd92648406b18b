//! Abstract evaluation: result types and effects of a primitive application.
//!
//! Shape and dtype contracts are enforced here, before any lowering happens.

use crate::dtype::{Aval, DType};
use crate::error::ProgramError;
use crate::indexer::{IndexExpr, IndexerSpec, Start};
use crate::primitive::{AtomicOp, Primitive};
use crate::program::{Effect, EffectKind, Program};

fn arity(primitive: &Primitive, inputs: &[Aval], expected: usize) -> Result<(), ProgramError> {
    if inputs.len() != expected {
        return Err(ProgramError::Arity {
            primitive: primitive.to_string(),
            expected,
            found: inputs.len(),
        });
    }
    Ok(())
}

fn mismatch(primitive: &Primitive, expected: impl ToString, found: impl ToString) -> ProgramError {
    ProgramError::TypeMismatch {
        primitive: primitive.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

fn expect_array<'a>(primitive: &Primitive, aval: &'a Aval) -> Result<&'a Aval, ProgramError> {
    if aval.is_ref() {
        return Err(mismatch(primitive, "an array", aval));
    }
    Ok(aval)
}

/// Shape of an element-wise result; scalar operands broadcast.
fn elementwise_shape(a: &Aval, b: &Aval) -> Result<Vec<usize>, ProgramError> {
    match (a.shape(), b.shape()) {
        (x, y) if x == y => Ok(x.to_vec()),
        ([], y) => Ok(y.to_vec()),
        (x, []) => Ok(x.to_vec()),
        (x, y) => Err(ProgramError::ShapeMismatch {
            expected: x.to_vec(),
            found: y.to_vec(),
        }),
    }
}

fn binary(primitive: &Primitive, inputs: &[Aval], result: Option<DType>) -> Result<Aval, ProgramError> {
    arity(primitive, inputs, 2)?;
    let (a, b) = (expect_array(primitive, &inputs[0])?, expect_array(primitive, &inputs[1])?);
    if a.dtype() != b.dtype() {
        return Err(mismatch(primitive, a.dtype(), b.dtype()));
    }
    let shape = elementwise_shape(a, b)?;
    Ok(Aval::array(shape, result.unwrap_or(a.dtype())))
}

fn unary(primitive: &Primitive, inputs: &[Aval], float_only: bool) -> Result<Aval, ProgramError> {
    arity(primitive, inputs, 1)?;
    let x = expect_array(primitive, &inputs[0])?;
    if float_only && !x.dtype().is_float() {
        return Err(mismatch(primitive, "a floating point dtype", x.dtype()));
    }
    Ok(x.clone())
}

fn reduced_shape(shape: &[usize], axes: &[usize]) -> Result<Vec<usize>, ProgramError> {
    for (i, &axis) in axes.iter().enumerate() {
        if axis >= shape.len() || axes[..i].contains(&axis) {
            return Err(ProgramError::InvalidAxis {
                axis,
                rank: shape.len(),
            });
        }
    }
    Ok(shape
        .iter()
        .enumerate()
        .filter(|(i, _)| !axes.contains(i))
        .map(|(_, &d)| d)
        .collect())
}

fn contracted_extents(x: &Aval, axes: &[usize]) -> Result<Vec<usize>, ProgramError> {
    axes.iter()
        .map(|&axis| {
            x.shape().get(axis).copied().ok_or(ProgramError::InvalidAxis {
                axis,
                rank: x.shape().len(),
            })
        })
        .collect()
}

/// Validates a reference access and returns the indexed block's shape.
pub fn check_indexed(
    primitive: &Primitive,
    indexer: &IndexerSpec,
    reference: &Aval,
    index_operands: &[Aval],
) -> Result<Vec<usize>, ProgramError> {
    if !reference.is_ref() {
        return Err(mismatch(primitive, "a reference", reference));
    }
    let shape = indexer.indexer_shape(reference.shape())?;
    let nd = indexer.unflatten(index_operands)?;
    for index in &nd.indices {
        let operand = match index {
            IndexExpr::Full | IndexExpr::Slice { start: Start::Static(_), .. } => continue,
            IndexExpr::Slice { start: Start::Dynamic(start), .. } => {
                if !start.shape().is_empty() {
                    return Err(ProgramError::InvalidIndexer(format!(
                        "dynamic slice start must be a scalar, found {start}"
                    )));
                }
                start
            }
            IndexExpr::Gather(index) => {
                if !index.shape().is_empty() && index.shape() != nd.int_indexer_shape {
                    return Err(ProgramError::ShapeMismatch {
                        expected: nd.int_indexer_shape.clone(),
                        found: index.shape().to_vec(),
                    });
                }
                index
            }
        };
        if !operand.dtype().is_integer() {
            return Err(mismatch(primitive, "an integer index", operand.dtype()));
        }
    }
    Ok(shape)
}

fn check_value(
    primitive: &Primitive,
    reference: &Aval,
    value: &Aval,
    shape: &[usize],
) -> Result<(), ProgramError> {
    if value.shape() != shape {
        return Err(ProgramError::ShapeMismatch {
            expected: shape.to_vec(),
            found: value.shape().to_vec(),
        });
    }
    if value.dtype() != reference.dtype() {
        return Err(mismatch(primitive, reference.dtype(), value.dtype()));
    }
    Ok(())
}

fn check_mask(primitive: &Primitive, mask: &Aval, shape: &[usize]) -> Result<(), ProgramError> {
    if mask.dtype() != DType::Bool {
        return Err(mismatch(primitive, DType::Bool, mask.dtype()));
    }
    if !mask.shape().is_empty() && mask.shape() != shape {
        return Err(ProgramError::ShapeMismatch {
            expected: shape.to_vec(),
            found: mask.shape().to_vec(),
        });
    }
    Ok(())
}

/// Element types `atomic_rmw` can update with `op`.
pub fn check_atomic_dtype(op: AtomicOp, dtype: DType) -> Result<(), ProgramError> {
    let unsupported = match dtype {
        DType::Bool | DType::Int8 | DType::Int16 | DType::Bfloat16 => true,
        DType::Float16 => op != AtomicOp::Add,
        d if d.is_float() => op.is_bitwise(),
        _ => false,
    };
    if unsupported {
        return Err(ProgramError::UnsupportedAtomicType { op, dtype });
    }
    Ok(())
}

fn effect(kind: EffectKind) -> Vec<Effect> {
    vec![Effect { kind, input: 0 }]
}

/// Effects of a loop body on the outer operands. Body input 0 is the loop
/// index; body input `k + 1` is operand `k`.
pub fn loop_effects(body: &Program, operands: &[Aval]) -> Vec<Effect> {
    body.effects()
        .into_iter()
        .filter_map(|e| {
            let input = e.input.checked_sub(1)?;
            operands
                .get(input)
                .filter(|a| a.is_ref())
                .map(|_| Effect { kind: e.kind, input })
        })
        .collect()
}

fn describe(avals: &[Aval]) -> String {
    let parts: Vec<String> = avals.iter().map(ToString::to_string).collect();
    format!("({})", parts.join(", "))
}

/// Re-derives the effects of every equation, nested bodies first, and checks
/// each equation's declared result avals against abstract evaluation.
///
/// Programs that were not built with [`ProgramBuilder`](crate::ProgramBuilder)
/// may omit or misstate effects, and both liveness and loop carrying read them.
pub fn infer_effects(program: &mut Program) -> Result<(), ProgramError> {
    for i in 0..program.eqns.len() {
        match program.eqns[i].primitive {
            Primitive::For { ref mut body, .. } | Primitive::Call { ref mut body } => {
                infer_effects(body)?
            }
            Primitive::While {
                ref mut cond,
                ref mut body,
            } => {
                infer_effects(cond)?;
                infer_effects(body)?;
            }
            _ => {}
        }

        let eqn = &program.eqns[i];
        let in_avals = eqn
            .inputs
            .iter()
            .map(|a| program.atom_aval(a))
            .collect::<Result<Vec<_>, _>>()?;
        let (out_avals, effects) = abstract_eval(&eqn.primitive, &in_avals)?;
        let declared = eqn
            .outputs
            .iter()
            .map(|v| program.aval(*v).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        if declared != out_avals {
            return Err(ProgramError::TypeMismatch {
                primitive: eqn.primitive.to_string(),
                expected: describe(&out_avals),
                found: describe(&declared),
            });
        }
        program.eqns[i].effects = effects;
    }
    Ok(())
}

fn check_program_inputs(
    primitive: &Primitive,
    program: &Program,
    inputs: &[Aval],
) -> Result<(), ProgramError> {
    let expected = program.in_avals()?;
    arity(primitive, inputs, expected.len())?;
    for (want, got) in expected.iter().zip(inputs) {
        if want != got {
            return Err(mismatch(primitive, want, got));
        }
    }
    Ok(())
}

/// Result avals and effects of applying `primitive` to operands of type `inputs`.
pub fn abstract_eval(
    primitive: &Primitive,
    inputs: &[Aval],
) -> Result<(Vec<Aval>, Vec<Effect>), ProgramError> {
    let p = primitive;
    let pure = |aval: Aval| Ok((vec![aval], Vec::new()));
    match p {
        Primitive::ProgramId { .. } => {
            arity(p, inputs, 0)?;
            pure(Aval::scalar(DType::Int32))
        }
        Primitive::Add
        | Primitive::AddAny
        | Primitive::Sub
        | Primitive::Mul
        | Primitive::Div
        | Primitive::Rem
        | Primitive::Max
        | Primitive::Min => pure(binary(p, inputs, None)?),
        Primitive::Lt | Primitive::Le | Primitive::Gt | Primitive::Ge | Primitive::Eq | Primitive::Ne => {
            pure(binary(p, inputs, Some(DType::Bool))?)
        }
        Primitive::Neg | Primitive::IntegerPow { .. } => pure(unary(p, inputs, false)?),
        Primitive::Exp
        | Primitive::Log
        | Primitive::Log1p
        | Primitive::Logistic
        | Primitive::Sin
        | Primitive::Cos
        | Primitive::Tanh
        | Primitive::Sqrt
        | Primitive::Rsqrt => pure(unary(p, inputs, true)?),
        Primitive::SelectN => {
            arity(p, inputs, 3)?;
            let pred = expect_array(p, &inputs[0])?;
            if pred.dtype() != DType::Bool {
                return Err(mismatch(p, DType::Bool, pred.dtype()));
            }
            let case = binary(p, &inputs[1..], None)?;
            let shape = elementwise_shape(pred, &case)?;
            pure(Aval::array(shape, case.dtype()))
        }
        Primitive::ConvertElementType { new_dtype } => {
            let x = unary(p, inputs, false)?;
            pure(Aval::array(x.shape().to_vec(), *new_dtype))
        }
        Primitive::BroadcastInDim {
            shape,
            broadcast_dimensions,
        } => {
            let x = unary(p, inputs, false)?;
            if broadcast_dimensions.len() != x.shape().len() {
                return Err(ProgramError::ShapeMismatch {
                    expected: x.shape().to_vec(),
                    found: broadcast_dimensions.clone(),
                });
            }
            for (i, (&dim, &extent)) in broadcast_dimensions.iter().zip(x.shape()).enumerate() {
                let ordered = i == 0 || broadcast_dimensions[i - 1] < dim;
                match shape.get(dim) {
                    Some(&target) if ordered && (extent == target || extent == 1) => {}
                    _ => {
                        return Err(ProgramError::InvalidAxis {
                            axis: dim,
                            rank: shape.len(),
                        });
                    }
                }
            }
            pure(Aval::array(shape.clone(), x.dtype()))
        }
        Primitive::Squeeze { dimensions } => {
            let x = unary(p, inputs, false)?;
            if let Some(&axis) = dimensions.iter().find(|&&d| x.shape().get(d) != Some(&1)) {
                return Err(ProgramError::InvalidAxis {
                    axis,
                    rank: x.shape().len(),
                });
            }
            pure(Aval::array(reduced_shape(x.shape(), dimensions)?, x.dtype()))
        }
        Primitive::Iota {
            dtype,
            shape,
            dimension,
        } => {
            arity(p, inputs, 0)?;
            if *dimension >= shape.len() {
                return Err(ProgramError::InvalidAxis {
                    axis: *dimension,
                    rank: shape.len(),
                });
            }
            pure(Aval::array(shape.clone(), *dtype))
        }
        Primitive::Transpose { permutation } => {
            let x = unary(p, inputs, false)?;
            let rank = x.shape().len();
            let mut seen = vec![false; rank];
            for &axis in permutation {
                if axis >= rank || std::mem::replace(&mut seen[axis], true) {
                    return Err(ProgramError::InvalidAxis { axis, rank });
                }
            }
            if permutation.len() != rank {
                return Err(ProgramError::ShapeMismatch {
                    expected: x.shape().to_vec(),
                    found: permutation.clone(),
                });
            }
            let shape = permutation.iter().map(|&a| x.shape()[a]).collect();
            pure(Aval::array(shape, x.dtype()))
        }
        Primitive::DotGeneral {
            lhs_contracting,
            rhs_contracting,
            lhs_batch,
            rhs_batch,
            ..
        } => {
            arity(p, inputs, 2)?;
            let (lhs, rhs) = (expect_array(p, &inputs[0])?, expect_array(p, &inputs[1])?);
            if !lhs_batch.is_empty() || !rhs_batch.is_empty() {
                return Err(ProgramError::NotImplemented("batched dot_general".into()));
            }
            if lhs.dtype() != rhs.dtype() {
                return Err(mismatch(p, lhs.dtype(), rhs.dtype()));
            }
            let lhs_k = contracted_extents(lhs, lhs_contracting)?;
            let rhs_k = contracted_extents(rhs, rhs_contracting)?;
            if lhs_k != rhs_k {
                return Err(ProgramError::ShapeMismatch {
                    expected: lhs_k,
                    found: rhs_k,
                });
            }
            let mut shape = reduced_shape(lhs.shape(), lhs_contracting)?;
            shape.extend(reduced_shape(rhs.shape(), rhs_contracting)?);
            pure(Aval::array(shape, lhs.dtype()))
        }
        Primitive::ReduceMax { axes } | Primitive::ReduceMin { axes } | Primitive::ReduceSum { axes } => {
            let x = unary(p, inputs, false)?;
            pure(Aval::array(reduced_shape(x.shape(), axes)?, x.dtype()))
        }
        Primitive::Argmax { axes, index_dtype } | Primitive::Argmin { axes, index_dtype } => {
            let x = unary(p, inputs, false)?;
            if !index_dtype.is_integer() {
                return Err(mismatch(p, "an integer index dtype", index_dtype));
            }
            pure(Aval::array(reduced_shape(x.shape(), axes)?, *index_dtype))
        }
        Primitive::MaxContiguous { .. } | Primitive::MultipleOf { .. } => {
            pure(unary(p, inputs, false)?)
        }
        Primitive::Get { indexer } => {
            let n = indexer.num_operands();
            arity(p, inputs, 1 + n)?;
            let shape = check_indexed(p, indexer, &inputs[0], &inputs[1..])?;
            Ok((
                vec![Aval::array(shape, inputs[0].dtype())],
                effect(EffectKind::Read),
            ))
        }
        Primitive::Swap { indexer } | Primitive::AddUpdate { indexer } => {
            let n = indexer.num_operands();
            arity(p, inputs, 2 + n)?;
            let shape = check_indexed(p, indexer, &inputs[0], &inputs[1..=n])?;
            check_value(p, &inputs[0], &inputs[1 + n], &shape)?;
            if matches!(p, Primitive::AddUpdate { .. }) {
                Ok((Vec::new(), effect(EffectKind::Accum)))
            } else {
                Ok((
                    vec![Aval::array(shape, inputs[0].dtype())],
                    effect(EffectKind::Write),
                ))
            }
        }
        Primitive::Load {
            indexer,
            masked,
            has_other,
        } => {
            if *has_other && !*masked {
                return Err(ProgramError::InvalidIndexer(
                    "a fallback value requires a mask".into(),
                ));
            }
            let n = indexer.num_operands();
            arity(p, inputs, 1 + n + usize::from(*masked) + usize::from(*has_other))?;
            let shape = check_indexed(p, indexer, &inputs[0], &inputs[1..=n])?;
            if *masked {
                check_mask(p, &inputs[1 + n], &shape)?;
            }
            if *has_other {
                let other = &inputs[2 + n];
                if other.dtype() != inputs[0].dtype() {
                    return Err(mismatch(p, inputs[0].dtype(), other.dtype()));
                }
                elementwise_shape(other, &Aval::array(shape.clone(), other.dtype()))?;
            }
            Ok((
                vec![Aval::array(shape, inputs[0].dtype())],
                effect(EffectKind::Read),
            ))
        }
        Primitive::MaskedSwap {
            indexer, masked, ..
        }
        | Primitive::AtomicRmw {
            indexer, masked, ..
        } => {
            let n = indexer.num_operands();
            arity(p, inputs, 2 + n + usize::from(*masked))?;
            if let Primitive::AtomicRmw { atomic, .. } = p {
                check_atomic_dtype(*atomic, inputs[0].dtype())?;
            }
            let shape = check_indexed(p, indexer, &inputs[0], &inputs[1..=n])?;
            check_value(p, &inputs[0], &inputs[1 + n], &shape)?;
            if *masked {
                check_mask(p, &inputs[2 + n], &shape)?;
            }
            Ok((
                vec![Aval::array(shape, inputs[0].dtype())],
                effect(EffectKind::Write),
            ))
        }
        Primitive::For { body, .. } => {
            let mut expected = vec![Aval::scalar(DType::Int32)];
            expected.extend(inputs.iter().map(|a| Aval::reference(a.shape().to_vec(), a.dtype())));
            check_program_inputs(p, body, &expected)?;
            if !body.outvars.is_empty() {
                return Err(mismatch(p, "a loop body without results", body.outvars.len()));
            }
            Ok((inputs.to_vec(), loop_effects(body, inputs)))
        }
        Primitive::While { body, .. } => Ok((body.out_avals()?, Vec::new())),
        Primitive::Call { body } => {
            check_program_inputs(p, body, inputs)?;
            let effects = body.effects();
            Ok((body.out_avals()?, effects))
        }
        Primitive::Custom { outputs, .. } => Ok((outputs.clone(), Vec::new())),
    }
}
