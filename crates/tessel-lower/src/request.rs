//! Self-contained, serializable lowering requests.

use serde::{Deserialize, Serialize};
use tessel_program::{Aval, GridSpec, Program};

use crate::error::LowerError;
use crate::kernel::{LoweredKernel, LowerOptions, build_kernel};
use crate::registry::RuleTable;

fn default_alignment() -> u32 {
    LowerOptions::default().alignment
}

/// Everything needed to lower one kernel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KernelRequest {
    pub name: String,
    pub program: Program,
    /// Full shape and dtype of every operand, parallel to the program inputs.
    pub operands: Vec<Aval>,
    pub grid_spec: GridSpec,
    #[serde(default = "default_alignment")]
    pub alignment: u32,
}

impl KernelRequest {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn options(&self) -> LowerOptions {
        LowerOptions {
            alignment: self.alignment,
        }
    }

    pub fn lower(&self, rules: &RuleTable) -> Result<LoweredKernel, LowerError> {
        build_kernel(
            &self.program,
            &self.operands,
            &self.grid_spec,
            &self.name,
            rules,
            &self.options(),
        )
    }
}
