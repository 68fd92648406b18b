//! Per-axis indexing of references.
//!
//! An [`IndexerSpec`] is the static part of an indexer stored on an equation;
//! the dynamic parts (slice starts that are not constants, gather indices) are
//! equation operands, consumed in axis order by [`IndexerSpec::unflatten`].

use serde::{Deserialize, Serialize};

use crate::error::ProgramError;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceStart {
    Static(i64),
    /// Taken from the next index operand.
    Dynamic,
}

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IndexTerm {
    /// Every element of the axis.
    Full,
    /// `size` consecutive elements starting at `start`.
    Slice { start: SliceStart, size: usize },
    /// Integer index (scalar or array) taken from the next index operand.
    Gather,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexerSpec {
    pub terms: Vec<IndexTerm>,
    /// Common shape of the gather operands. Each array gather operand has
    /// exactly this shape; scalar gathers broadcast against it.
    #[serde(default)]
    pub int_indexer_shape: Vec<usize>,
}

impl IndexerSpec {
    /// Selects every element of a rank-`rank` reference.
    pub fn full(rank: usize) -> Self {
        Self {
            terms: vec![IndexTerm::Full; rank],
            int_indexer_shape: Vec::new(),
        }
    }

    /// Number of index operands the indexer consumes.
    pub fn num_operands(&self) -> usize {
        self.terms
            .iter()
            .filter(|t| {
                matches!(
                    t,
                    IndexTerm::Gather
                        | IndexTerm::Slice {
                            start: SliceStart::Dynamic,
                            ..
                        }
                )
            })
            .count()
    }

    fn check_rank(&self, ref_shape: &[usize]) -> Result<(), ProgramError> {
        if self.terms.len() != ref_shape.len() {
            return Err(ProgramError::InvalidIndexer(format!(
                "{} index terms for a rank-{} reference",
                self.terms.len(),
                ref_shape.len()
            )));
        }
        Ok(())
    }

    /// Shape of the indexed block: the gather shape followed by the extent of
    /// every slice and full axis, in axis order.
    pub fn indexer_shape(&self, ref_shape: &[usize]) -> Result<Vec<usize>, ProgramError> {
        self.check_rank(ref_shape)?;
        let mut shape = self.int_indexer_shape.clone();
        for (term, &dim) in self.terms.iter().zip(ref_shape) {
            match *term {
                IndexTerm::Full => shape.push(dim),
                IndexTerm::Slice { start, size } => {
                    if let SliceStart::Static(start) = start {
                        if start < 0 || start as usize + size > dim {
                            return Err(ProgramError::InvalidIndexer(format!(
                                "slice [{start}, {}) out of bounds for extent {dim}",
                                start as usize + size
                            )));
                        }
                    }
                    shape.push(size);
                }
                IndexTerm::Gather => {}
            }
        }
        Ok(shape)
    }

    /// Whether the indexer selects the whole reference in its natural order.
    pub fn is_whole(&self, ref_shape: &[usize]) -> bool {
        self.terms.len() == ref_shape.len()
            && self.terms.iter().zip(ref_shape).all(|(term, &dim)| match *term {
                IndexTerm::Full => true,
                IndexTerm::Slice {
                    start: SliceStart::Static(0),
                    size,
                } => size == dim,
                _ => false,
            })
    }

    /// Pairs the static terms with their dynamic operands.
    pub fn unflatten<T: Clone>(&self, operands: &[T]) -> Result<NDIndexer<T>, ProgramError> {
        if operands.len() != self.num_operands() {
            return Err(ProgramError::InvalidIndexer(format!(
                "expected {} index operands, found {}",
                self.num_operands(),
                operands.len()
            )));
        }
        let mut next = operands.iter().cloned();
        let mut indices = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let index = match *term {
                IndexTerm::Full => IndexExpr::Full,
                IndexTerm::Slice { start, size } => {
                    let start = match start {
                        SliceStart::Static(s) => Start::Static(s),
                        SliceStart::Dynamic => Start::Dynamic(next_operand(&mut next)?),
                    };
                    IndexExpr::Slice { start, size }
                }
                IndexTerm::Gather => IndexExpr::Gather(next_operand(&mut next)?),
            };
            indices.push(index);
        }
        Ok(NDIndexer {
            indices,
            int_indexer_shape: self.int_indexer_shape.clone(),
        })
    }
}

fn next_operand<T>(it: &mut impl Iterator<Item = T>) -> Result<T, ProgramError> {
    it.next()
        .ok_or_else(|| ProgramError::InvalidIndexer("index operands exhausted".into()))
}

/// Start of a slice: a constant, or a runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Start<T> {
    Static(i64),
    Dynamic(T),
}

/// One axis of an [`NDIndexer`].
#[derive(Clone, Debug, PartialEq)]
pub enum IndexExpr<T> {
    Full,
    Slice { start: Start<T>, size: usize },
    Gather(T),
}

/// A resolved indexer whose dynamic parts are values of type `T`.
#[derive(Clone, Debug, PartialEq)]
pub struct NDIndexer<T> {
    pub indices: Vec<IndexExpr<T>>,
    pub int_indexer_shape: Vec<usize>,
}

impl<T> NDIndexer<T> {
    /// Number of axes selected by a slice or full range.
    pub fn num_slices(&self) -> usize {
        self.indices
            .iter()
            .filter(|i| !matches!(i, IndexExpr::Gather(_)))
            .count()
    }
}
