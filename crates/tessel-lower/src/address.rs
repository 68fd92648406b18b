//! Pointer arithmetic for indexed accesses into strided arrays.
//!
//! The address block of an access has the indexer's shape: the common gather
//! shape first, then one axis per slice or full range, in order. Each axis of
//! the full array contributes `(index + block_start) * stride`, broadcast to
//! that shape; the addresses are the base pointer plus the sum of all
//! contributions.

use tessel_ir::{BinaryOp, Builder, Literal, Scalar, Value};
use tessel_program::{BlockDim, IndexExpr, NDIndexer, Start};

use crate::context::BlockInfo;
use crate::error::LowerError;

/// Row-major element strides of `shape`.
pub fn strides_from_shape(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

fn i32_constant(builder: &mut Builder, value: i64) -> Value {
    builder.constant(Literal::Int(value), Scalar::I32)
}

/// Computes the addresses selected by `indexer` from the array at `base`.
///
/// Without block info, `array_shape` is the full shape and every axis is
/// indexed from zero. With block info, the full shape, block extents and block
/// start offsets come from it, and mapped axes consume no index term.
pub fn compute_addresses(
    builder: &mut Builder,
    base: Value,
    block_info: Option<&BlockInfo>,
    indexer: &NDIndexer<Value>,
    array_shape: &[usize],
) -> Result<Value, LowerError> {
    let (full_shape, block_shape): (&[usize], Vec<BlockDim>) = match block_info {
        Some(info) => (&info.full_shape, info.block_shape.clone()),
        None => (
            array_shape,
            array_shape.iter().map(|&d| BlockDim::Extent(d)).collect(),
        ),
    };
    let num_mapped = block_shape.iter().filter(|d| **d == BlockDim::Mapped).count();
    if block_shape.len() != full_shape.len() || indexer.indices.len() + num_mapped != full_shape.len() {
        return Err(LowerError::TypeMismatch {
            expected: format!("{} index terms", full_shape.len().saturating_sub(num_mapped)),
            found: format!("{} index terms", indexer.indices.len()),
        });
    }
    if let Some(info) = block_info {
        if info.start_indices.len() != full_shape.len() {
            return Err(LowerError::TypeMismatch {
                expected: format!("{} block start offsets", full_shape.len()),
                found: format!("{} block start offsets", info.start_indices.len()),
            });
        }
    }

    let extents = block_shape.iter().filter_map(|d| match d {
        BlockDim::Mapped => None,
        BlockDim::Extent(n) => Some(*n),
    });
    let other_shape: Vec<usize> = indexer
        .indices
        .iter()
        .zip(extents)
        .filter_map(|(index, extent)| match index {
            IndexExpr::Full => Some(extent),
            IndexExpr::Slice { size, .. } => Some(*size),
            IndexExpr::Gather(_) => None,
        })
        .collect();
    let int_rank = indexer.int_indexer_shape.len();
    let mut indexer_shape = indexer.int_indexer_shape.clone();
    indexer_shape.extend(&other_shape);
    let rank = indexer_shape.len();

    let strides = strides_from_shape(full_shape);
    let mut indices = indexer.indices.iter();
    let mut other_idx = 0;
    let mut total: Option<Value> = None;

    for (axis, dim) in block_shape.iter().enumerate() {
        let (mut offset, left, right) = match *dim {
            BlockDim::Mapped => (i32_constant(builder, 0), 0, 0),
            BlockDim::Extent(extent) => {
                let index = indices.next().ok_or_else(|| LowerError::TypeMismatch {
                    expected: format!("an index term for axis {axis}"),
                    found: "none".into(),
                })?;
                match index {
                    IndexExpr::Gather(value) => {
                        let value = builder.cast(*value, Scalar::I32)?;
                        let shape = builder.shape(value);
                        if shape.is_empty() {
                            (value, 0, 0)
                        } else if shape == indexer.int_indexer_shape.as_slice() {
                            (value, 0, other_shape.len())
                        } else {
                            return Err(LowerError::ShapeMismatch {
                                expected: indexer.int_indexer_shape.clone(),
                                actual: shape.to_vec(),
                            });
                        }
                    }
                    IndexExpr::Full | IndexExpr::Slice { .. } => {
                        let range = match index {
                            IndexExpr::Slice {
                                start: Start::Static(start),
                                size,
                            } => builder.arange(*start, start + *size as i64)?,
                            IndexExpr::Slice {
                                start: Start::Dynamic(start),
                                size,
                            } => {
                                let start = builder.cast(*start, Scalar::I32)?;
                                let range = builder.arange(0, *size as i64)?;
                                builder.binary(BinaryOp::Add, start, range)?
                            }
                            _ => builder.arange(0, extent as i64)?,
                        };
                        let left = int_rank + other_idx;
                        let right = other_shape.len() - other_idx - 1;
                        other_idx += 1;
                        (range, left, right)
                    }
                }
            }
        };

        if builder.shape(offset).is_empty() {
            if rank > 0 {
                offset = builder.splat(offset, &vec![1; rank])?;
            }
        } else {
            for _ in 0..left {
                offset = builder.expand_dims(offset, 0)?;
            }
            for _ in 0..right {
                let end = builder.shape(offset).len();
                offset = builder.expand_dims(offset, end)?;
            }
        }
        if let Some(info) = block_info {
            let start = builder.cast(info.start_indices[axis], Scalar::I32)?;
            offset = builder.binary(BinaryOp::Add, offset, start)?;
        }
        let stride = i32_constant(builder, strides[axis] as i64);
        offset = builder.binary(BinaryOp::Multiply, offset, stride)?;
        offset = builder.broadcast_to(offset, &indexer_shape)?;

        total = Some(match total {
            Some(sum) => builder.binary(BinaryOp::Add, sum, offset)?,
            None => offset,
        });
    }

    match total {
        Some(offset) => Ok(builder.offset(base, offset)?),
        None => Ok(base),
    }
}
