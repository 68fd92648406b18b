//! Runtime values: lanes, pointers and blocks.

use ndarray::{ArrayD, IxDyn};
use tessel_ir::{Element, Literal, Scalar, ScalarKind};

use crate::error::InterpError;

/// A global-memory address: a buffer and an element offset into it.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct Pointer {
    pub buffer: usize,
    pub offset: i64,
}

impl Pointer {
    pub fn new(buffer: usize) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn add(self, elements: i64) -> Self {
        Self {
            buffer: self.buffer,
            offset: self.offset + elements,
        }
    }
}

/// One lane of a value.
///
/// Integers of every width are held as `i64` and floats as `f64`; both are
/// normalized to their IR type after every operation. Unsigned 64-bit lanes
/// keep their bit pattern.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lane {
    Bool(bool),
    Int(i64),
    Float(f64),
    Ptr(Pointer),
}

impl Lane {
    pub fn zero(scalar: Scalar) -> Self {
        Self::from_literal(Literal::zero(scalar))
    }

    pub fn from_literal(literal: Literal) -> Self {
        match literal {
            Literal::Bool(b) => Self::Bool(b),
            Literal::Int(i) => Self::Int(i),
            Literal::Float(f) => Self::Float(f),
        }
    }

    pub fn as_f64(self) -> Result<f64, InterpError> {
        match self {
            Self::Float(f) => Ok(f),
            Self::Int(i) => Ok(i as f64),
            Self::Bool(b) => Ok(f64::from(u8::from(b))),
            Self::Ptr(_) => Err(mismatch("a number", self)),
        }
    }

    pub fn as_i64(self) -> Result<i64, InterpError> {
        match self {
            Self::Int(i) => Ok(i),
            Self::Bool(b) => Ok(i64::from(b)),
            _ => Err(mismatch("an integer", self)),
        }
    }

    pub fn as_bool(self) -> Result<bool, InterpError> {
        match self {
            Self::Bool(b) => Ok(b),
            _ => Err(mismatch("a boolean", self)),
        }
    }

    pub fn as_pointer(self) -> Result<Pointer, InterpError> {
        match self {
            Self::Ptr(p) => Ok(p),
            _ => Err(mismatch("a pointer", self)),
        }
    }

    /// Numeric conversion to `scalar`; floats truncate toward zero when
    /// converted to integers.
    pub fn convert(self, scalar: Scalar) -> Result<Self, InterpError> {
        let lane = if scalar.is_bool() {
            Self::Bool(self.as_f64()? != 0.0)
        } else if scalar.is_float() {
            Self::Float(self.as_f64()?)
        } else {
            match self {
                Self::Float(f) => Self::Int(f.trunc() as i64),
                other => Self::Int(other.as_i64()?),
            }
        };
        Ok(lane.normalize(scalar))
    }

    /// Wraps integers to the width of `scalar` and rounds floats to its precision.
    pub fn normalize(self, scalar: Scalar) -> Self {
        match self {
            Self::Int(i) => Self::Int(wrap(i, scalar)),
            Self::Float(f) => Self::Float(round(f, scalar)),
            other => other,
        }
    }
}

fn mismatch(expected: &str, found: Lane) -> InterpError {
    InterpError::TypeMismatch {
        expected: expected.into(),
        found: format!("{found:?}"),
    }
}

fn wrap(value: i64, scalar: Scalar) -> i64 {
    match (scalar.kind, scalar.width) {
        (ScalarKind::Sint, 1) => i64::from(value as i8),
        (ScalarKind::Sint, 2) => i64::from(value as i16),
        (ScalarKind::Sint, 4) => i64::from(value as i32),
        (ScalarKind::Uint, 1) => i64::from(value as u8),
        (ScalarKind::Uint, 2) => i64::from(value as u16),
        (ScalarKind::Uint, 4) => i64::from(value as u32),
        _ => value,
    }
}

/// Rounds to the precision of `scalar`. Half-precision lanes are carried at
/// `f32` precision; `bf16` rounds to nearest even.
fn round(value: f64, scalar: Scalar) -> f64 {
    match (scalar.kind, scalar.width) {
        (ScalarKind::Float, 8) => value,
        (ScalarKind::BFloat, _) => f64::from(round_bf16(value as f32)),
        _ => f64::from(value as f32),
    }
}

fn round_bf16(value: f32) -> f32 {
    if value.is_nan() {
        return value;
    }
    let bits = value.to_bits();
    let rounded = bits.wrapping_add(0x7fff + ((bits >> 16) & 1));
    f32::from_bits(rounded & 0xffff_0000)
}

/// A scalar or block value with the element type it was computed at.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    pub element: Element,
    pub data: ArrayD<Lane>,
}

impl Tensor {
    pub fn new(element: Element, data: ArrayD<Lane>) -> Self {
        Self { element, data }
    }

    /// A rank-0 value.
    pub fn scalar(element: Element, lane: Lane) -> Self {
        Self {
            element,
            data: ArrayD::from_elem(IxDyn(&[]), lane),
        }
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Lanes in row-major order.
    pub fn lanes(&self) -> impl Iterator<Item = Lane> + '_ {
        self.data.iter().copied()
    }

    /// The single lane of a rank-0 value.
    pub fn item(&self) -> Result<Lane, InterpError> {
        match self.data.ndim() {
            0 => self.data.first().copied().ok_or(InterpError::ShapeMismatch {
                expected: Vec::new(),
                found: self.shape().to_vec(),
            }),
            _ => Err(InterpError::ShapeMismatch {
                expected: Vec::new(),
                found: self.shape().to_vec(),
            }),
        }
    }

    pub fn to_f32_vec(&self) -> Result<Vec<f32>, InterpError> {
        self.lanes().map(|l| l.as_f64().map(|f| f as f32)).collect()
    }

    pub fn to_i64_vec(&self) -> Result<Vec<i64>, InterpError> {
        self.lanes().map(Lane::as_i64).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_wrap_to_their_width() {
        assert_eq!(Lane::Int(130).normalize(Scalar::I8), Lane::Int(-126));
        assert_eq!(Lane::Int(-1).normalize(Scalar::U16), Lane::Int(65535));
        assert_eq!(
            Lane::Int(i64::from(i32::MAX) + 1).normalize(Scalar::I32),
            Lane::Int(i64::from(i32::MIN))
        );
        assert_eq!(Lane::Int(1 << 40).normalize(Scalar::I64), Lane::Int(1 << 40));
    }

    #[test]
    fn floats_round_to_their_precision() {
        let third = 1.0 / 3.0;
        assert_eq!(Lane::Float(third).normalize(Scalar::F64), Lane::Float(third));
        assert_eq!(
            Lane::Float(third).normalize(Scalar::F32),
            Lane::Float(f64::from(third as f32))
        );
        // bf16 keeps 8 bits of mantissa.
        assert_eq!(Lane::Float(1.00390625).normalize(Scalar::BF16), Lane::Float(1.0));
        assert_eq!(Lane::Float(3.0).normalize(Scalar::BF16), Lane::Float(3.0));
    }

    #[test]
    fn conversion_truncates_toward_zero() {
        assert_eq!(Lane::Float(-2.7).convert(Scalar::I32).unwrap(), Lane::Int(-2));
        assert_eq!(Lane::Int(3).convert(Scalar::F32).unwrap(), Lane::Float(3.0));
        assert_eq!(Lane::Int(0).convert(Scalar::BOOL).unwrap(), Lane::Bool(false));
        assert_eq!(Lane::Bool(true).convert(Scalar::I8).unwrap(), Lane::Int(1));
        assert!(Lane::Ptr(Pointer::new(0)).convert(Scalar::F32).is_err());
    }

    #[test]
    fn scalar_tensors_expose_their_item() {
        let t = Tensor::scalar(Element::Scalar(Scalar::I32), Lane::Int(7));
        assert!(t.shape().is_empty());
        assert_eq!(t.item().unwrap(), Lane::Int(7));

        let block = Tensor::new(
            Element::Scalar(Scalar::I32),
            ArrayD::from_shape_vec(IxDyn(&[2]), vec![Lane::Int(1), Lane::Int(2)]).unwrap(),
        );
        assert!(block.item().is_err());
        assert_eq!(block.to_i64_vec().unwrap(), vec![1, 2]);
    }
}
