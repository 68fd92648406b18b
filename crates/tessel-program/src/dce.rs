//! Dead-code elimination over program equations.

use std::collections::HashSet;

use crate::program::{Atom, Program, VarId};

/// Removes equations whose results are never used.
///
/// Equations with declared effects are always live. Inputs and outputs of the
/// program are left untouched. Returns the number of equations removed.
pub fn dce(program: &mut Program) -> usize {
    let mut live: HashSet<VarId> = program.outvars.iter().filter_map(Atom::var).collect();
    let mut keep = vec![false; program.eqns.len()];

    for (i, eqn) in program.eqns.iter().enumerate().rev() {
        if eqn.has_effects() || eqn.outputs.iter().any(|v| live.contains(v)) {
            keep[i] = true;
            live.extend(eqn.inputs.iter().filter_map(Atom::var));
        }
    }

    let before = program.eqns.len();
    let mut flags = keep.into_iter();
    program.eqns.retain(|_| flags.next().unwrap_or(true));
    let removed = before - program.eqns.len();
    if removed > 0 {
        log::debug!("dce removed {removed} of {before} equations");
    }
    removed
}
