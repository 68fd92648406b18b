//! State shared between lowering rules.

use tessel_ir::{Builder, Literal, Scalar, Value};
use tessel_program::{Aval, BlockDim, DType, LiteralValue};

use crate::error::LowerError;
use crate::registry::RuleTable;

/// Per-kernel lowering state. Owns the IR builder for the whole pass.
pub struct ModuleContext {
    pub name: String,
    pub builder: Builder,
    /// Grid coordinates visible to `program_id`, mapped axes removed.
    pub program_ids: Vec<Value>,
}

impl ModuleContext {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            builder: Builder::new(name.clone()),
            name,
            program_ids: Vec::new(),
        }
    }

    /// Materializes a literal operand as an IR constant.
    pub fn literal(&mut self, value: LiteralValue, dtype: DType) -> Value {
        let literal = match value {
            LiteralValue::Bool(b) => Literal::Bool(b),
            LiteralValue::Int(i) => Literal::Int(i),
            LiteralValue::Float(x) => Literal::Float(x),
        };
        self.builder.constant(literal, scalar_of(dtype))
    }

    pub fn i32(&mut self, value: i64) -> Value {
        self.builder.constant(Literal::Int(value), Scalar::I32)
    }
}

/// The evaluated block mapping of one operand for the current grid cell.
#[derive(Clone, Debug)]
pub struct BlockInfo {
    pub full_shape: Vec<usize>,
    pub dtype: DType,
    /// First element of the block along each axis of the full array.
    pub start_indices: Vec<Value>,
    pub block_shape: Vec<BlockDim>,
}

/// Everything a rule sees while lowering one equation.
pub struct RuleContext<'a> {
    pub module: &'a mut ModuleContext,
    pub rules: &'a RuleTable,
    pub avals_in: &'a [Aval],
    pub avals_out: &'a [Aval],
    /// Block info of each operand, parallel to `avals_in`.
    pub block_infos: &'a [Option<BlockInfo>],
}

impl RuleContext<'_> {
    pub fn builder(&mut self) -> &mut Builder {
        &mut self.module.builder
    }

    pub fn aval_in(&self, index: usize) -> Result<&Aval, LowerError> {
        self.avals_in.get(index).ok_or(LowerError::InvalidAxis {
            axis: index,
            rank: self.avals_in.len(),
        })
    }

    pub fn aval_out(&self, index: usize) -> Result<&Aval, LowerError> {
        self.avals_out.get(index).ok_or(LowerError::InvalidAxis {
            axis: index,
            rank: self.avals_out.len(),
        })
    }

    pub fn block_info(&self, index: usize) -> Option<&BlockInfo> {
        self.block_infos.get(index).and_then(Option::as_ref)
    }
}

/// The IR lane type of a program dtype.
pub fn scalar_of(dtype: DType) -> Scalar {
    match dtype {
        DType::Bool => Scalar::BOOL,
        DType::Int8 => Scalar::I8,
        DType::Int16 => Scalar::I16,
        DType::Int32 => Scalar::I32,
        DType::Int64 => Scalar::I64,
        DType::Uint8 => Scalar::U8,
        DType::Uint16 => Scalar::U16,
        DType::Uint32 => Scalar::U32,
        DType::Uint64 => Scalar::U64,
        DType::Float16 => Scalar::F16,
        DType::Bfloat16 => Scalar::BF16,
        DType::Float32 => Scalar::F32,
        DType::Float64 => Scalar::F64,
    }
}
