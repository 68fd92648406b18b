//! Host memory: typed buffers addressed by [`Pointer`]s.

use tessel_ir::Scalar;

use crate::error::InterpError;
use crate::value::{Lane, Pointer};

/// A flat array of lanes of one scalar type.
#[derive(Clone, Debug, PartialEq)]
pub struct Buffer {
    scalar: Scalar,
    data: Vec<Lane>,
}

impl Buffer {
    /// Wraps `data`, normalizing every lane to `scalar`.
    pub fn new(scalar: Scalar, data: Vec<Lane>) -> Result<Self, InterpError> {
        let data = data
            .into_iter()
            .map(|lane| lane.convert(scalar))
            .collect::<Result<_, _>>()?;
        Ok(Self { scalar, data })
    }

    pub fn zeros(scalar: Scalar, len: usize) -> Self {
        Self {
            scalar,
            data: vec![Lane::zero(scalar); len],
        }
    }

    pub fn from_f32(values: &[f32]) -> Self {
        Self {
            scalar: Scalar::F32,
            data: values.iter().map(|&v| Lane::Float(f64::from(v))).collect(),
        }
    }

    pub fn from_i32(values: &[i32]) -> Self {
        Self {
            scalar: Scalar::I32,
            data: values.iter().map(|&v| Lane::Int(i64::from(v))).collect(),
        }
    }

    pub fn scalar(&self) -> Scalar {
        self.scalar
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.data
    }

    pub fn to_f32(&self) -> Result<Vec<f32>, InterpError> {
        self.data
            .iter()
            .map(|l| l.as_f64().map(|f| f as f32))
            .collect()
    }

    pub fn to_i64(&self) -> Result<Vec<i64>, InterpError> {
        self.data.iter().map(|l| l.as_i64()).collect()
    }

    fn slot(&self, buffer: usize, offset: i64) -> Result<usize, InterpError> {
        usize::try_from(offset)
            .ok()
            .filter(|&i| i < self.data.len())
            .ok_or(InterpError::OutOfBounds {
                buffer,
                offset,
                len: self.data.len(),
            })
    }
}

/// The set of buffers a kernel can address.
#[derive(Clone, Debug, Default)]
pub struct Memory {
    buffers: Vec<Buffer>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a buffer and returns its id.
    pub fn add(&mut self, buffer: Buffer) -> usize {
        self.buffers.push(buffer);
        self.buffers.len() - 1
    }

    pub fn buffer(&self, id: usize) -> Result<&Buffer, InterpError> {
        self.buffers.get(id).ok_or(InterpError::UnknownBuffer(id))
    }

    pub fn read(&self, pointer: Pointer) -> Result<Lane, InterpError> {
        let buffer = self.buffer(pointer.buffer)?;
        let slot = buffer.slot(pointer.buffer, pointer.offset)?;
        Ok(buffer.data[slot])
    }

    /// Writes `lane`, converted to the buffer's scalar type.
    pub fn write(&mut self, pointer: Pointer, lane: Lane) -> Result<(), InterpError> {
        let buffer = self
            .buffers
            .get_mut(pointer.buffer)
            .ok_or(InterpError::UnknownBuffer(pointer.buffer))?;
        let slot = buffer.slot(pointer.buffer, pointer.offset)?;
        buffer.data[slot] = lane.convert(buffer.scalar)?;
        Ok(())
    }
}

/// A kernel argument: a buffer for pointer parameters, a lane for scalars.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ArgValue {
    Buffer(usize),
    Scalar(Lane),
}
