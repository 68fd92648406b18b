//! Structured control flow: counted loops and inlined calls.

use tessel_ir::Value;
use tessel_program::{EffectKind, MAX_INDEX, Primitive, ProgramError, discharge_state};

use crate::context::RuleContext;
use crate::error::LowerError;
use crate::walker::lower_program;

/// Interleaves `on_false` and `on_true` in the order given by `mask`.
fn merge<T: Copy>(mask: &[bool], on_false: &[T], on_true: &[T]) -> Result<Vec<T>, LowerError> {
    let wanted = mask.iter().filter(|&&m| m).count();
    if on_true.len() != wanted || on_false.len() != mask.len() - wanted {
        return Err(LowerError::TypeMismatch {
            expected: format!("{wanted} of {} merged values", mask.len()),
            found: format!("{} and {}", on_true.len(), on_false.len()),
        });
    }
    let (mut t, mut f) = (on_true.iter(), on_false.iter());
    Ok(mask
        .iter()
        .filter_map(|&m| if m { t.next() } else { f.next() })
        .copied()
        .collect())
}

fn select<T: Copy>(mask: &[bool], values: &[T], keep: bool) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter(|&(_, &m)| m == keep)
        .map(|(v, _)| *v)
        .collect()
}

/// Lowers `for i in 0..nsteps` to a counted loop.
///
/// Reference operands are passed through as pointers. Array operands are
/// discharged: the body reads and writes them as values, and those it writes
/// become loop-carried values. Arrays the body only reads are passed in
/// unchanged.
pub(crate) fn for_loop(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::For {
        body,
        nsteps,
        reverse,
        unroll,
    } = p
    else {
        return Err(LowerError::not_implemented(format!("{p} as for")));
    };
    if *reverse {
        return Err(LowerError::not_implemented("reversed for loops"));
    }
    if *unroll != 1 {
        return Err(LowerError::not_implemented(format!("for loops unrolled {unroll} times")));
    }
    if *nsteps > MAX_INDEX {
        return Err(ProgramError::IndexOverflow(format!("loop of {nsteps} steps")).into());
    }
    if args.len() != ctx.avals_in.len() {
        return Err(LowerError::TypeMismatch {
            expected: format!("{} loop operands", ctx.avals_in.len()),
            found: format!("{} loop operands", args.len()),
        });
    }

    let should_discharge: Vec<bool> = ctx.avals_in.iter().map(|a| !a.is_ref()).collect();
    // Body input 0 is the loop index; operand k is body input k + 1.
    let effects = body.effects();
    let is_loop_arg: Vec<bool> = should_discharge
        .iter()
        .enumerate()
        .map(|(k, &discharge)| {
            let read_only = effects
                .iter()
                .filter(|e| e.input == k + 1)
                .all(|e| e.kind == EffectKind::Read);
            discharge && !read_only
        })
        .collect();

    let mut flags = vec![false];
    flags.extend(&should_discharge);
    let discharged = discharge_state(body, &flags)?;

    let init = select(&is_loop_arg, args, true);
    let non_loop_args = select(&is_loop_arg, args, false);
    let pointers = select(&should_discharge, args, false);
    log::trace!(
        "for loop over {nsteps} steps: {} carried, {} passed through",
        init.len(),
        non_loop_args.len()
    );

    let lower = ctx.module.i32(0);
    let upper = ctx.module.i32(*nsteps as i64);
    let step = ctx.module.i32(1);
    let scope = ctx.builder().begin_for(lower, upper, step, &init)?;

    let mut body_args = vec![scope.induction()];
    body_args.extend(merge(&is_loop_arg, &non_loop_args, scope.arguments())?);
    let mut block_infos = vec![None];
    block_infos.extend(ctx.block_infos.iter().cloned());
    let out_discharged = lower_program(ctx.module, ctx.rules, &discharged, &block_infos, &body_args)?;

    let all_out = merge(&should_discharge, &pointers, &out_discharged)?;
    let loop_out = select(&is_loop_arg, &all_out, true);
    let results = ctx.builder().end_for(scope, &loop_out)?;
    merge(&is_loop_arg, &non_loop_args, &results)
}

pub(crate) fn while_loop(
    _ctx: &mut RuleContext<'_>,
    _args: &[Value],
    _p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    Err(LowerError::not_implemented("while loops"))
}

/// Inlines the callee at the current cursor.
pub(crate) fn call(
    ctx: &mut RuleContext<'_>,
    args: &[Value],
    p: &Primitive,
) -> Result<Vec<Value>, LowerError> {
    let Primitive::Call { body } = p else {
        return Err(LowerError::not_implemented(format!("{p} as call")));
    };
    lower_program(ctx.module, ctx.rules, body, ctx.block_infos, args)
}
