//! Launch grids and per-operand block mappings.

use serde::{Deserialize, Serialize};

use crate::error::ProgramError;
use crate::program::Program;

/// Largest extent or element count addressable with the kernel's `i32` indices.
pub const MAX_INDEX: usize = i32::MAX as usize;

/// Number of elements of `shape`, checked against [`MAX_INDEX`].
pub fn checked_elements(shape: &[usize]) -> Result<usize, ProgramError> {
    shape
        .iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .filter(|&n| n <= MAX_INDEX)
        .ok_or_else(|| ProgramError::IndexOverflow(format!("shape {shape:?}")))
}

/// Extent of one axis of an operand block.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockDim {
    /// The axis is consumed by the grid; the kernel sees a single element of it
    /// and the axis is absent from the kernel-side block shape.
    Mapped,
    Extent(usize),
}

/// How an operand is carved into blocks for each grid cell.
///
/// `index_map` takes every grid coordinate as an `int32` scalar and returns
/// one block index per axis of the full array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlockMapping {
    pub block_shape: Vec<BlockDim>,
    pub index_map: Program,
}

impl BlockMapping {
    pub fn num_mapped(&self) -> usize {
        self.block_shape
            .iter()
            .filter(|d| matches!(d, BlockDim::Mapped))
            .count()
    }

    /// Block shape as seen inside the kernel, without mapped axes.
    pub fn kernel_shape(&self) -> Vec<usize> {
        self.block_shape
            .iter()
            .filter_map(|d| match d {
                BlockDim::Mapped => None,
                BlockDim::Extent(n) => Some(*n),
            })
            .collect()
    }

    pub fn validate(&self, full_shape: &[usize], grid_rank: usize) -> Result<(), ProgramError> {
        if self.block_shape.len() != full_shape.len() {
            return Err(ProgramError::InvalidBlockMapping(format!(
                "{} block extents for a rank-{} array",
                self.block_shape.len(),
                full_shape.len()
            )));
        }
        if self.block_shape.contains(&BlockDim::Extent(0)) {
            return Err(ProgramError::InvalidBlockMapping(
                "zero block extent".into(),
            ));
        }
        checked_elements(&self.kernel_shape())?;
        if self.index_map.invars.len() != grid_rank {
            return Err(ProgramError::InvalidBlockMapping(format!(
                "index map takes {} coordinates but the grid has rank {grid_rank}",
                self.index_map.invars.len()
            )));
        }
        if self.index_map.outvars.len() != full_shape.len() {
            return Err(ProgramError::InvalidBlockMapping(format!(
                "index map returns {} block indices for a rank-{} array",
                self.index_map.outvars.len(),
                full_shape.len()
            )));
        }
        Ok(())
    }
}

/// The logical launch grid and the block mapping of each kernel operand.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub grid: Vec<usize>,
    /// One entry per kernel operand; `None` passes the whole array.
    pub block_mappings: Vec<Option<BlockMapping>>,
    /// Grid axes hidden from `program_id` inside the kernel body.
    #[serde(default)]
    pub mapped_dims: Vec<usize>,
}

impl GridSpec {
    pub fn new(grid: Vec<usize>) -> Self {
        Self {
            grid,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ProgramError> {
        if self.grid.contains(&0) {
            return Err(ProgramError::InvalidGrid(format!(
                "grid {:?} has an empty axis",
                self.grid
            )));
        }
        if let Some(&extent) = self.grid.iter().find(|&&d| d > MAX_INDEX) {
            return Err(ProgramError::IndexOverflow(format!("grid extent {extent}")));
        }
        if let Some(&axis) = self.mapped_dims.iter().find(|&&d| d >= self.grid.len()) {
            return Err(ProgramError::InvalidAxis {
                axis,
                rank: self.grid.len(),
            });
        }
        Ok(())
    }

    /// Grid axes visible to `program_id`, in order.
    pub fn visible_axes(&self) -> Vec<usize> {
        (0..self.grid.len())
            .filter(|d| !self.mapped_dims.contains(d))
            .collect()
    }
}
