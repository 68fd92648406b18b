//! Incremental construction of [`Program`]s with abstract evaluation.

use crate::dtype::{Aval, DType};
use crate::error::ProgramError;
use crate::eval::abstract_eval;
use crate::indexer::{IndexTerm, IndexerSpec, SliceStart};
use crate::primitive::Primitive;
use crate::program::{Atom, Equation, LiteralValue, Program, VarId};

/// One axis of a reference access as written by the caller.
#[derive(Clone, Debug)]
pub enum Index {
    /// The whole axis.
    Full,
    /// `size` elements starting at `start`; a literal start is static.
    Slice { start: Atom, size: usize },
    /// An integer index, scalar or array.
    At(Atom),
}

/// Builds a [`Program`], deriving result avals and effects for each equation.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh(&mut self, aval: Aval) -> VarId {
        let id = VarId(self.program.avals.len() as u32);
        self.program.avals.push(aval);
        id
    }

    /// Declares the next program input.
    pub fn input(&mut self, aval: Aval) -> VarId {
        let var = self.fresh(aval);
        self.program.invars.push(var);
        var
    }

    pub fn aval(&self, atom: &Atom) -> Result<Aval, ProgramError> {
        self.program.atom_aval(atom)
    }

    /// Appends `primitive(inputs...)` and returns its result variables.
    pub fn apply(
        &mut self,
        primitive: Primitive,
        inputs: Vec<Atom>,
    ) -> Result<Vec<VarId>, ProgramError> {
        let in_avals = inputs
            .iter()
            .map(|a| self.program.atom_aval(a))
            .collect::<Result<Vec<_>, _>>()?;
        let (out_avals, effects) = abstract_eval(&primitive, &in_avals)?;
        let outputs = out_avals.into_iter().map(|a| self.fresh(a)).collect::<Vec<_>>();
        self.program.eqns.push(Equation {
            primitive,
            inputs,
            outputs: outputs.clone(),
            effects,
        });
        Ok(outputs)
    }

    /// Like [`apply`](Self::apply) for single-result primitives.
    pub fn apply1(&mut self, primitive: Primitive, inputs: Vec<Atom>) -> Result<Atom, ProgramError> {
        let name = primitive.to_string();
        let outputs = self.apply(primitive, inputs)?;
        match outputs.as_slice() {
            [v] => Ok(Atom::Var(*v)),
            _ => Err(ProgramError::Arity {
                primitive: name,
                expected: 1,
                found: outputs.len(),
            }),
        }
    }

    /// Turns per-axis indices into an indexer and its operand list.
    ///
    /// Integer indices are broadcast into the concatenation of their shapes,
    /// each index occupying its own run of axes, so every gather operand ends
    /// up with the same shape.
    pub fn indexer(
        &mut self,
        reference: &Aval,
        indices: Vec<Index>,
    ) -> Result<(IndexerSpec, Vec<Atom>), ProgramError> {
        if indices.len() != reference.shape().len() {
            return Err(ProgramError::InvalidIndexer(format!(
                "{} indices for a rank-{} reference",
                indices.len(),
                reference.shape().len()
            )));
        }
        let mut gather_shapes = Vec::new();
        for index in &indices {
            if let Index::At(atom) = index {
                gather_shapes.push(self.aval(atom)?.shape().to_vec());
            }
        }
        let int_indexer_shape: Vec<usize> = gather_shapes.iter().flatten().copied().collect();

        let mut terms = Vec::with_capacity(indices.len());
        let mut operands = Vec::new();
        let mut next_axis = 0;
        for index in indices {
            match index {
                Index::Full => terms.push(IndexTerm::Full),
                Index::Slice { start, size } => match start {
                    Atom::Literal {
                        value: LiteralValue::Int(s),
                        ..
                    } => terms.push(IndexTerm::Slice {
                        start: SliceStart::Static(s),
                        size,
                    }),
                    start => {
                        terms.push(IndexTerm::Slice {
                            start: SliceStart::Dynamic,
                            size,
                        });
                        operands.push(start);
                    }
                },
                Index::At(atom) => {
                    let rank = self.aval(&atom)?.shape().len();
                    let dims: Vec<usize> = (next_axis..next_axis + rank).collect();
                    next_axis += rank;
                    let atom = if self.aval(&atom)?.shape() == int_indexer_shape.as_slice() {
                        atom
                    } else {
                        self.apply1(
                            Primitive::BroadcastInDim {
                                shape: int_indexer_shape.clone(),
                                broadcast_dimensions: dims,
                            },
                            vec![atom],
                        )?
                    };
                    terms.push(IndexTerm::Gather);
                    operands.push(atom);
                }
            }
        }
        Ok((
            IndexerSpec {
                terms,
                int_indexer_shape,
            },
            operands,
        ))
    }

    /// Marks the program outputs and returns the finished program.
    pub fn finish(mut self, outvars: Vec<Atom>) -> Result<Program, ProgramError> {
        for atom in &outvars {
            self.program.atom_aval(atom)?;
        }
        self.program.outvars = outvars;
        Ok(self.program)
    }
}

/// Convenience constructors for literal operands.
pub fn int32(value: i64) -> Atom {
    Atom::Literal {
        value: LiteralValue::Int(value),
        dtype: DType::Int32,
    }
}

pub fn float32(value: f64) -> Atom {
    Atom::Literal {
        value: LiteralValue::Float(value),
        dtype: DType::Float32,
    }
}
