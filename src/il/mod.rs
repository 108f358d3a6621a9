//! Intermediate code generation.

mod backpatch;
mod error;
mod generator;
mod name_generator;
mod tac;

pub use error::IcgError;
pub use generator::generate;
pub use tac::*;
