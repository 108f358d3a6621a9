//! Validated, type-annotated syntax tree definitions.
//!
//! The tree defined here is the *output* of the lexing, parsing, scope
//! resolution and semantic analysis phases: every identifier reference has
//! been resolved to a [`Symbol`] with an inferred type and a defining scope,
//! and every `break`/`continue` has been bound to its enclosing loop. The
//! intermediate-code generator assumes these guarantees and never re-checks
//! them.

mod type_spec;
pub mod typed;

pub use type_spec::*;
