//! Kernel functions and entry points.

use crate::arena::{Arena, Handle};
use crate::expr::Expression;
use crate::stmt::Block;
use crate::types::Type;

/// A kernel argument declaration.
#[derive(Clone, Debug)]
pub struct FunctionArgument {
    pub name: Option<String>,
    pub ty: Handle<Type>,
    /// Byte alignment the caller guarantees for pointer arguments.
    pub divisibility: Option<u32>,
}

/// A kernel function.
///
/// `expression_types[i]` is the type of the `i`-th expression; the two are
/// only ever grown together through [`Function::append`].
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Option<String>,
    pub arguments: Vec<FunctionArgument>,
    pub expressions: Arena<Expression>,
    pub expression_types: Vec<Handle<Type>>,
    pub body: Block,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            arguments: Vec::new(),
            expressions: Arena::new(),
            expression_types: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Appends an expression together with its type.
    pub fn append(&mut self, expr: Expression, ty: Handle<Type>) -> Handle<Expression> {
        self.expression_types.push(ty);
        self.expressions.append(expr)
    }

    pub fn type_of(&self, expr: Handle<Expression>) -> Option<Handle<Type>> {
        self.expression_types.get(expr.index()).copied()
    }
}

/// A kernel entry point.
#[derive(Clone, Debug)]
pub struct EntryPoint {
    pub name: String,
    pub function: Function,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::UniqueArena;
    use crate::expr::Literal;
    use crate::types::Scalar;

    #[test]
    fn append_records_expression_type() {
        let mut types = UniqueArena::new();
        let f32_ty = types.insert(Type::scalar(Scalar::F32));
        let mut f = Function::new("kernel");
        let h = f.append(Expression::Literal(Literal::Float(1.5)), f32_ty);
        assert_eq!(f.type_of(h), Some(f32_ty));
        assert_eq!(f.expressions.len(), f.expression_types.len());
        assert!(f.body.is_empty());
    }
}
