//! State discharge: rewriting reference effects into pure dataflow.
//!
//! A discharged input is turned from a reference into an array. Whole-reference
//! `get` becomes an alias of the current value, `swap` returns the current value
//! and rebinds it, `addupdate` becomes an `add` and a rebind. The final value of
//! every discharged reference is appended to the program outputs.

use std::collections::HashMap;

use crate::dtype::Aval;
use crate::error::ProgramError;
use crate::eval::abstract_eval;
use crate::primitive::Primitive;
use crate::program::{Atom, Equation, Program, VarId};

struct Discharger<'a> {
    source: &'a Program,
    avals: Vec<Aval>,
    eqns: Vec<Equation>,
    /// Current value of each discharged reference.
    current: HashMap<VarId, Atom>,
    /// Outputs of removed equations, replaced by existing values.
    aliases: HashMap<VarId, Atom>,
}

impl Discharger<'_> {
    fn resolve(&self, atom: &Atom) -> Atom {
        match atom.var().and_then(|v| self.aliases.get(&v)) {
            Some(alias) => alias.clone(),
            None => atom.clone(),
        }
    }

    fn is_discharged(&self, atom: &Atom) -> bool {
        atom.var().is_some_and(|v| self.current.contains_key(&v))
    }

    fn unsupported(eqn: &Equation) -> ProgramError {
        ProgramError::NotImplemented(format!(
            "{} on a discharged reference",
            eqn.primitive.kind()
        ))
    }

    fn whole_access(&self, eqn: &Equation, reference: VarId) -> Result<(), ProgramError> {
        let shape = self.source.aval(reference)?.shape();
        let whole = eqn
            .primitive
            .indexer()
            .is_some_and(|indexer| indexer.num_operands() == 0 && indexer.is_whole(shape));
        if !whole || eqn.inputs[1..].iter().any(|a| self.is_discharged(a)) {
            return Err(Self::unsupported(eqn));
        }
        Ok(())
    }

    fn equation(&mut self, eqn: &Equation) -> Result<(), ProgramError> {
        let target = match eqn.inputs.first() {
            Some(first) if self.is_discharged(first) => first.var(),
            _ => None,
        };
        let Some(reference) = target else {
            if eqn.inputs.iter().any(|a| self.is_discharged(a)) {
                return Err(Self::unsupported(eqn));
            }
            let inputs = eqn.inputs.iter().map(|a| self.resolve(a)).collect();
            self.eqns.push(Equation {
                inputs,
                ..eqn.clone()
            });
            return Ok(());
        };

        self.whole_access(eqn, reference)?;
        let value = self
            .current
            .get(&reference)
            .cloned()
            .ok_or(ProgramError::UnknownVariable(reference.0))?;
        match &eqn.primitive {
            Primitive::Get { .. } if eqn.inputs.len() == 1 => {
                self.aliases.insert(eqn.outputs[0], value);
            }
            Primitive::Swap { .. } if eqn.inputs.len() == 2 => {
                self.aliases.insert(eqn.outputs[0], value);
                let new = self.resolve(&eqn.inputs[1]);
                self.current.insert(reference, new);
            }
            Primitive::AddUpdate { .. } if eqn.inputs.len() == 2 => {
                let update = self.resolve(&eqn.inputs[1]);
                let in_avals = [self.atom_aval(&value)?, self.atom_aval(&update)?];
                let (out_avals, _) = abstract_eval(&Primitive::Add, &in_avals)?;
                let sum = VarId(self.avals.len() as u32);
                self.avals.extend(out_avals);
                self.eqns.push(Equation {
                    primitive: Primitive::Add,
                    inputs: vec![value, update],
                    outputs: vec![sum],
                    effects: Vec::new(),
                });
                self.current.insert(reference, Atom::Var(sum));
            }
            _ => return Err(Self::unsupported(eqn)),
        }
        Ok(())
    }

    fn atom_aval(&self, atom: &Atom) -> Result<Aval, ProgramError> {
        match atom {
            Atom::Var(v) => self
                .avals
                .get(v.index())
                .cloned()
                .ok_or(ProgramError::UnknownVariable(v.0)),
            Atom::Literal { dtype, .. } => Ok(Aval::scalar(*dtype)),
        }
    }
}

/// Discharges the inputs of `program` flagged in `should_discharge`.
///
/// Flagged inputs that are references become arrays; the returned program
/// outputs the original outputs followed by the final value of each
/// discharged input, in input order.
pub fn discharge_state(program: &Program, should_discharge: &[bool]) -> Result<Program, ProgramError> {
    if should_discharge.len() != program.invars.len() {
        return Err(ProgramError::Arity {
            primitive: "discharge".into(),
            expected: program.invars.len(),
            found: should_discharge.len(),
        });
    }

    let mut d = Discharger {
        source: program,
        avals: program.avals.clone(),
        eqns: Vec::with_capacity(program.eqns.len()),
        current: HashMap::new(),
        aliases: HashMap::new(),
    };
    let mut discharged = Vec::new();
    for (&var, &flag) in program.invars.iter().zip(should_discharge) {
        let aval = program.aval(var)?;
        if flag && aval.is_ref() {
            d.avals[var.index()] = aval.to_array();
            d.current.insert(var, Atom::Var(var));
            discharged.push(var);
        }
    }

    for eqn in &program.eqns {
        d.equation(eqn)?;
    }

    let mut outvars = Vec::with_capacity(program.outvars.len() + discharged.len());
    for atom in &program.outvars {
        if d.is_discharged(atom) {
            return Err(ProgramError::NotImplemented(
                "returning a discharged reference".into(),
            ));
        }
        outvars.push(d.resolve(atom));
    }
    for var in &discharged {
        let value = d
            .current
            .get(var)
            .cloned()
            .ok_or(ProgramError::UnknownVariable(var.0))?;
        outvars.push(value);
    }

    Ok(Program {
        avals: d.avals,
        invars: program.invars.clone(),
        outvars,
        eqns: d.eqns,
    })
}
