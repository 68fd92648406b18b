//! Element types and abstract values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Array element type.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float16,
    Bfloat16,
    Float32,
    Float64,
}

impl DType {
    pub fn is_float(self) -> bool {
        matches!(
            self,
            Self::Float16 | Self::Bfloat16 | Self::Float32 | Self::Float64
        )
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float16 => "float16",
            Self::Bfloat16 => "bfloat16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        };
        write!(f, "{name}")
    }
}

/// The abstract value of a program variable: an immutable array, or a
/// mutable reference to one.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Aval {
    Array { shape: Vec<usize>, dtype: DType },
    Ref { shape: Vec<usize>, dtype: DType },
}

impl Aval {
    pub fn array(shape: Vec<usize>, dtype: DType) -> Self {
        Self::Array {
            shape,
            dtype,
        }
    }

    pub fn reference(shape: Vec<usize>, dtype: DType) -> Self {
        Self::Ref {
            shape,
            dtype,
        }
    }

    pub fn scalar(dtype: DType) -> Self {
        Self::array(Vec::new(), dtype)
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Array { shape, .. } | Self::Ref { shape, .. } => shape,
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::Array { dtype, .. } | Self::Ref { dtype, .. } => *dtype,
        }
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Self::Ref { .. })
    }

    /// The array a reference points at; arrays map to themselves.
    pub fn to_array(&self) -> Self {
        Self::array(self.shape().to_vec(), self.dtype())
    }
}

impl fmt::Display for Aval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self.shape().iter().map(ToString::to_string).collect();
        match self {
            Self::Array { dtype, .. } => write!(f, "{dtype}[{}]", dims.join(",")),
            Self::Ref { dtype, .. } => write!(f, "Ref{{{dtype}[{}]}}", dims.join(",")),
        }
    }
}
