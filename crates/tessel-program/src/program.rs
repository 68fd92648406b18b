//! Programs: straight-line equations over SSA variables with declared effects.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dtype::{Aval, DType};
use crate::error::ProgramError;
use crate::primitive::Primitive;

/// A program variable. Its abstract value is `Program::avals[id]`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarId(pub u32);

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A scalar constant appearing directly as an operand.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

/// An equation operand: a variable or an inline scalar literal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Atom {
    Var(VarId),
    Literal { value: LiteralValue, dtype: DType },
}

impl Atom {
    pub fn var(&self) -> Option<VarId> {
        match self {
            Self::Var(v) => Some(*v),
            Self::Literal { .. } => None,
        }
    }
}

impl From<VarId> for Atom {
    fn from(v: VarId) -> Self {
        Self::Var(v)
    }
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Read,
    Write,
    Accum,
}

/// A side effect on the reference passed as operand `input`.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub kind: EffectKind,
    pub input: usize,
}

/// One primitive application.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Equation {
    pub primitive: Primitive,
    pub inputs: Vec<Atom>,
    pub outputs: Vec<VarId>,
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl Equation {
    pub fn has_effects(&self) -> bool {
        !self.effects.is_empty()
    }
}

/// A closed program in SSA form. Equations are listed in dependency order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Abstract value of every variable, indexed by [`VarId`].
    pub avals: Vec<Aval>,
    pub invars: Vec<VarId>,
    pub outvars: Vec<Atom>,
    pub eqns: Vec<Equation>,
}

impl Program {
    pub fn aval(&self, var: VarId) -> Result<&Aval, ProgramError> {
        self.avals
            .get(var.index())
            .ok_or(ProgramError::UnknownVariable(var.0))
    }

    /// Abstract value of an operand; literals are scalar arrays.
    pub fn atom_aval(&self, atom: &Atom) -> Result<Aval, ProgramError> {
        match atom {
            Atom::Var(v) => self.aval(*v).cloned(),
            Atom::Literal { dtype, .. } => Ok(Aval::scalar(*dtype)),
        }
    }

    pub fn in_avals(&self) -> Result<Vec<Aval>, ProgramError> {
        self.invars.iter().map(|v| self.aval(*v).cloned()).collect()
    }

    pub fn out_avals(&self) -> Result<Vec<Aval>, ProgramError> {
        self.outvars.iter().map(|a| self.atom_aval(a)).collect()
    }

    /// Effects of the whole program, keyed by input position.
    pub fn effects(&self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for eqn in &self.eqns {
            for effect in &eqn.effects {
                let Some(target) = eqn.inputs.get(effect.input).and_then(Atom::var) else {
                    continue;
                };
                if let Some(input) = self.invars.iter().position(|v| *v == target) {
                    let effect = Effect {
                        kind: effect.kind,
                        input,
                    };
                    if !effects.contains(&effect) {
                        effects.push(effect);
                    }
                }
            }
        }
        effects
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(v) => write!(f, "{v}"),
            Self::Literal { value, dtype } => match value {
                LiteralValue::Bool(b) => write!(f, "{b}:{dtype}"),
                LiteralValue::Int(i) => write!(f, "{i}:{dtype}"),
                LiteralValue::Float(x) => write!(f, "{x:?}:{dtype}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::IndexerSpec;

    #[test]
    fn literal_avals_are_scalars() {
        let program = Program::default();
        let atom = Atom::Literal {
            value: LiteralValue::Float(0.5),
            dtype: DType::Float32,
        };
        assert_eq!(program.atom_aval(&atom).unwrap(), Aval::scalar(DType::Float32));
        assert!(matches!(
            program.aval(VarId(3)),
            Err(ProgramError::UnknownVariable(3))
        ));
    }

    #[test]
    fn program_effects_map_to_input_positions() {
        let program = Program {
            avals: vec![
                Aval::reference(vec![4], DType::Float32),
                Aval::reference(vec![4], DType::Float32),
                Aval::array(vec![4], DType::Float32),
            ],
            invars: vec![VarId(0), VarId(1)],
            outvars: Vec::new(),
            eqns: vec![Equation {
                primitive: Primitive::Get {
                    indexer: IndexerSpec::full(1),
                },
                inputs: vec![Atom::Var(VarId(1))],
                outputs: vec![VarId(2)],
                effects: vec![Effect {
                    kind: EffectKind::Read,
                    input: 0,
                }],
            }],
        };
        assert_eq!(
            program.effects(),
            vec![Effect {
                kind: EffectKind::Read,
                input: 1
            }]
        );
    }

    #[test]
    fn literal_atoms_deserialize_untagged_values() {
        let atom: Atom =
            serde_json::from_str(r#"{"literal":{"value":2,"dtype":"int32"}}"#).unwrap();
        assert_eq!(
            atom,
            Atom::Literal {
                value: LiteralValue::Int(2),
                dtype: DType::Int32
            }
        );
        assert_eq!(atom.to_string(), "2:int32");
    }
}
