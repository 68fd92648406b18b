//! The environment-threading walk over a program's equations.

use std::collections::HashMap;

use tessel_ir::Value;
use tessel_program::{Atom, Program, VarId};

use crate::context::{BlockInfo, ModuleContext, RuleContext};
use crate::error::LowerError;
use crate::registry::RuleTable;

fn read(ctx: &mut ModuleContext, env: &HashMap<VarId, Value>, atom: &Atom) -> Result<Value, LowerError> {
    match atom {
        Atom::Var(v) => env.get(v).copied().ok_or(LowerError::UnboundVariable(v.0)),
        Atom::Literal { value, dtype } => Ok(ctx.literal(*value, *dtype)),
    }
}

/// Lowers `program` at the builder's current cursor and returns the values of
/// its outputs.
///
/// `args` and `block_infos` are parallel to the program inputs. Literal
/// operands are materialized at each use. Nested bodies are lowered by calling
/// this function again with their own inputs.
pub fn lower_program(
    ctx: &mut ModuleContext,
    rules: &RuleTable,
    program: &Program,
    block_infos: &[Option<BlockInfo>],
    args: &[Value],
) -> Result<Vec<Value>, LowerError> {
    if args.len() != program.invars.len() {
        return Err(LowerError::TypeMismatch {
            expected: format!("{} program arguments", program.invars.len()),
            found: format!("{} arguments", args.len()),
        });
    }

    let mut env: HashMap<VarId, Value> = program.invars.iter().copied().zip(args.iter().copied()).collect();
    let mut block_env: HashMap<VarId, BlockInfo> = HashMap::new();
    for (var, info) in program.invars.iter().zip(block_infos) {
        if let Some(info) = info {
            block_env.insert(*var, info.clone());
        }
    }

    for eqn in &program.eqns {
        let kind = eqn.primitive.kind();
        let rule = rules.lookup(&kind)?;
        let avals_in = eqn
            .inputs
            .iter()
            .map(|a| program.atom_aval(a))
            .collect::<Result<Vec<_>, _>>()?;
        let avals_out = eqn
            .outputs
            .iter()
            .map(|v| program.aval(*v).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let eqn_block_infos: Vec<Option<BlockInfo>> = eqn
            .inputs
            .iter()
            .map(|a| a.var().and_then(|v| block_env.get(&v)).cloned())
            .collect();
        let invals = eqn
            .inputs
            .iter()
            .map(|a| read(ctx, &env, a))
            .collect::<Result<Vec<_>, _>>()?;

        log::trace!(
            "lowering {kind}({}) -> {}",
            eqn.inputs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
            eqn.outputs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
        );

        let mut rule_ctx = RuleContext {
            module: ctx,
            rules,
            avals_in: &avals_in,
            avals_out: &avals_out,
            block_infos: &eqn_block_infos,
        };
        let outvals = rule(&mut rule_ctx, &invals, &eqn.primitive)?;
        if outvals.len() != eqn.outputs.len() {
            return Err(LowerError::TypeMismatch {
                expected: format!("{} results from {kind}", eqn.outputs.len()),
                found: format!("{} results", outvals.len()),
            });
        }
        env.extend(eqn.outputs.iter().copied().zip(outvals));
    }

    program.outvars.iter().map(|a| read(ctx, &env, a)).collect()
}
