//! Mini-C type specifications.
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// A Mini-C type. Comparisons and logical operators produce `int` (0 or 1);
/// there is no separate boolean type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSpec {
    Int,
    Char,
    Str,
    Void,
}
impl Display for TypeSpec {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TypeSpec::Int => f.write_str("int"),
            TypeSpec::Char => f.write_str("char"),
            TypeSpec::Str => f.write_str("string"),
            TypeSpec::Void => f.write_str("void"),
        }
    }
}
impl FromStr for TypeSpec {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "int" => TypeSpec::Int,
            "char" => TypeSpec::Char,
            "string" => TypeSpec::Str,
            "void" => TypeSpec::Void,
            _ => return Err(()),
        })
    }
}
