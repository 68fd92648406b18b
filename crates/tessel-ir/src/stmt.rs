//! Statements: memory effects and structured control flow.

use crate::arena::{Handle, Range};
use crate::expr::{AtomicFunction, Expression};

/// A block of statements.
pub type Block = Vec<Statement>;

/// A statement in a kernel body.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// Evaluates a run of expressions at this point of the body.
    Emit(Range<Expression>),
    /// Masked scatter to global memory.
    Store {
        pointer: Handle<Expression>,
        value: Handle<Expression>,
        mask: Option<Handle<Expression>>,
    },
    /// Lane-wise atomic read-modify-write; `result` receives the old contents.
    Atomic {
        pointer: Handle<Expression>,
        fun: AtomicFunction,
        value: Handle<Expression>,
        mask: Option<Handle<Expression>>,
        result: Handle<Expression>,
    },
    /// Counted loop `for i in (lower..upper).step_by(step)` with loop-carried values.
    ///
    /// `arguments[k]` starts as `init[k]` and takes `yields[k]` after every
    /// iteration; `results[k]` holds the final value.
    For {
        id: u32,
        lower: Handle<Expression>,
        upper: Handle<Expression>,
        step: Handle<Expression>,
        induction: Handle<Expression>,
        init: Vec<Handle<Expression>>,
        arguments: Vec<Handle<Expression>>,
        body: Block,
        yields: Vec<Handle<Expression>>,
        results: Vec<Handle<Expression>>,
    },
    Return { value: Option<Handle<Expression>> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::expr::Literal;

    #[test]
    fn for_statement_pairs_carried_values() {
        let mut exprs = Arena::new();
        let zero = exprs.append(Expression::Literal(Literal::Int(0)));
        let ten = exprs.append(Expression::Literal(Literal::Int(10)));
        let one = exprs.append(Expression::Literal(Literal::Int(1)));
        let i = exprs.append(Expression::LoopInduction { loop_id: 0 });
        let acc = exprs.append(Expression::LoopArgument {
            loop_id: 0,
            index: 0,
        });
        let out = exprs.append(Expression::LoopResult {
            loop_id: 0,
            index: 0,
        });
        let stmt = Statement::For {
            id: 0,
            lower: zero,
            upper: ten,
            step: one,
            induction: i,
            init: vec![zero],
            arguments: vec![acc],
            body: Vec::new(),
            yields: vec![acc],
            results: vec![out],
        };
        let Statement::For {
            init,
            arguments,
            yields,
            results,
            ..
        } = &stmt
        else {
            panic!("expected For");
        };
        assert_eq!(init.len(), arguments.len());
        assert_eq!(yields.len(), results.len());
    }
}
