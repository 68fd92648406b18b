//! The table of lowering rules, keyed by primitive kind.

use std::collections::HashMap;

use tessel_ir::Value;
use tessel_program::{Primitive, PrimitiveKind};

use crate::context::RuleContext;
use crate::error::LowerError;

/// Lowers one equation: operands in, results out.
///
/// `primitive` carries the equation's static parameters; its kind is the key
/// the rule was registered under.
pub type Rule =
    fn(&mut RuleContext<'_>, &[Value], &Primitive) -> Result<Vec<Value>, LowerError>;

/// Registry of lowering rules, built once and passed explicitly to the walker.
#[derive(Clone, Default)]
pub struct RuleTable {
    rules: HashMap<PrimitiveKind, Rule>,
}

impl RuleTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding every built-in rule.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        crate::rules::register_builtins(&mut table);
        table
    }

    /// Registers `rule` for `kind`.
    ///
    /// Registration is last-write-wins: an existing rule for the same kind is
    /// replaced and returned.
    pub fn register(&mut self, kind: PrimitiveKind, rule: Rule) -> Option<Rule> {
        let previous = self.rules.insert(kind.clone(), rule);
        if previous.is_some() {
            log::warn!("lowering rule for `{kind}` replaced");
        }
        previous
    }

    pub fn lookup(&self, kind: &PrimitiveKind) -> Result<Rule, LowerError> {
        self.rules
            .get(kind)
            .copied()
            .ok_or_else(|| LowerError::UnsupportedOperation(kind.clone()))
    }

    pub fn contains(&self, kind: &PrimitiveKind) -> bool {
        self.rules.contains_key(kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&PrimitiveKind> {
        let mut kinds: Vec<_> = self.rules.keys().collect();
        kinds.sort();
        kinds
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
