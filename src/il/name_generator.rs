use std::rc::Rc;

use crate::ast::typed::Symbol;

use super::tac::{Name, Variable};

/// Produces the names used in the flattened instruction stream: fresh
/// temporaries from a monotonic counter, and scope-qualified variable names
/// for resolved symbols. Both are unique within a generation session.
pub struct NameGenerator {
    index: usize,
}

impl NameGenerator {
    pub fn new() -> Self {
        Self { index: 0 }
    }

    /// Generates a new unique temporary name.
    pub fn next_temp(&mut self) -> Name {
        let temp = Name::Temp(self.index);
        self.index += 1;
        temp
    }

    /// The scope-qualified name of a resolved symbol. Stateless: the same
    /// symbol always qualifies to the same name.
    pub fn qualify(&self, sym: &Rc<Symbol>) -> Name {
        Name::Var(Variable::from_symbol(sym))
    }
}
