//! Three-Address Code

use std::{
    fmt::{self, Display, Formatter, Write},
    rc::Rc,
};

use crate::{
    ast::typed::{ScopeId, Symbol},
    listing::{Listing, Position},
};

use super::error::IcgError;

pub type TacListing = Listing<Instr>;

/// A TAC opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
    /// Unary arithmetic negation.
    Neg,
    Assign,
    Goto,
    IfTrue,
    IfFalse,
    /// Push an argument value for an upcoming call.
    Push,
    /// Pop an argument slot into a parameter at function entry.
    Pop,
    Call,
    Return,
    /// Terminates execution of the top-level sequence, keeping control from
    /// falling into the function bodies emitted after it.
    End,
}
impl Op {
    /// The infix symbol of a binary opcode.
    fn symbol(self) -> Option<&'static str> {
        Some(match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Eq => "==",
            Op::Neq => "!=",
            Op::Lt => "<",
            Op::Leq => "<=",
            Op::Gt => ">",
            Op::Geq => ">=",
            _ => return None,
        })
    }

    /// True for opcodes that carry a jump target, immediately or after
    /// patching.
    pub fn is_control_transfer(self) -> bool {
        matches!(self, Op::Goto | Op::IfTrue | Op::IfFalse | Op::Call)
    }
}

/// A single TAC instruction: an opcode, an optional destination name, up to
/// two operands, an optional absolute jump target, and a free-form
/// diagnostic comment. The position of an instruction is its index in the
/// enclosing [`TacListing`] and never changes once appended; only the jump
/// target may be amended afterwards, via [`TacListing::patch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instr {
    pub op: Op,
    pub dest: Option<Name>,
    pub lhs: Option<Operand>,
    pub rhs: Option<Operand>,
    pub target: Option<Position>,
    pub comment: Option<String>,
}
impl Instr {
    fn new(op: Op) -> Self {
        Self {
            op,
            dest: None,
            lhs: None,
            rhs: None,
            target: None,
            comment: None,
        }
    }

    /// A binary arithmetic or comparison instruction.
    pub fn bin(op: Op, dest: Name, lhs: Operand, rhs: Operand) -> Self {
        debug_assert!(op.symbol().is_some());
        Self {
            dest: Some(dest),
            lhs: Some(lhs),
            rhs: Some(rhs),
            ..Self::new(op)
        }
    }

    pub fn assign(dest: Name, value: Operand) -> Self {
        Self {
            dest: Some(dest),
            lhs: Some(value),
            ..Self::new(Op::Assign)
        }
    }

    /// An assignment of the void marker, used for uninitialised declarations
    /// and for the implicit return value of a void function.
    pub fn assign_void(dest: Name) -> Self {
        Self {
            dest: Some(dest),
            ..Self::new(Op::Assign)
        }
    }

    pub fn neg(dest: Name, operand: Operand) -> Self {
        Self {
            dest: Some(dest),
            lhs: Some(operand),
            ..Self::new(Op::Neg)
        }
    }

    /// An unconditional jump. The target may be left open and patched later.
    pub fn goto(target: Option<Position>) -> Self {
        Self {
            target,
            ..Self::new(Op::Goto)
        }
    }

    pub fn if_true(value: Operand, target: Option<Position>) -> Self {
        Self {
            lhs: Some(value),
            target,
            ..Self::new(Op::IfTrue)
        }
    }

    pub fn if_false(value: Operand, target: Option<Position>) -> Self {
        Self {
            lhs: Some(value),
            target,
            ..Self::new(Op::IfFalse)
        }
    }

    pub fn push(value: Operand) -> Self {
        Self {
            lhs: Some(value),
            ..Self::new(Op::Push)
        }
    }

    pub fn pop(dest: Name, slot: usize) -> Self {
        Self {
            dest: Some(dest),
            lhs: Some(Operand::ArgSlot(slot)),
            ..Self::new(Op::Pop)
        }
    }

    /// A call with an as-yet unresolved target. The callee's name is kept as
    /// a comment, since the resolved target is a bare address.
    pub fn call(callee: &str, args: usize) -> Self {
        Self {
            comment: Some(format!("call {} ({} args)", callee, args)),
            ..Self::new(Op::Call)
        }
    }

    pub fn ret() -> Self {
        Self::new(Op::Return)
    }

    pub fn end() -> Self {
        Self::new(Op::End)
    }

    pub fn with_comment<S: Into<String>>(mut self, comment: S) -> Self {
        self.comment = Some(comment.into());
        self
    }
}
impl Display for Instr {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        fn target(t: &Option<Position>) -> String {
            match t {
                Some(pos) => pos.to_string(),
                None => "?".to_string(),
            }
        }
        fn value(v: &Option<Operand>) -> String {
            match v {
                Some(operand) => operand.to_string(),
                None => "void".to_string(),
            }
        }
        fn dest(d: &Option<Name>) -> String {
            match d {
                Some(name) => name.to_string(),
                None => "?".to_string(),
            }
        }

        match self.op {
            Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Eq
            | Op::Neq
            | Op::Lt
            | Op::Leq
            | Op::Gt
            | Op::Geq => write!(
                f,
                "{} = {} {} {}",
                dest(&self.dest),
                value(&self.lhs),
                self.op.symbol().unwrap(),
                value(&self.rhs),
            )?,
            Op::Neg => write!(f, "{} = -{}", dest(&self.dest), value(&self.lhs))?,
            Op::Assign => write!(f, "{} = {}", dest(&self.dest), value(&self.lhs))?,
            Op::Goto => write!(f, "goto {}", target(&self.target))?,
            Op::IfTrue => write!(f, "if_true {} goto {}", value(&self.lhs), target(&self.target))?,
            Op::IfFalse => write!(
                f,
                "if_false {} goto {}",
                value(&self.lhs),
                target(&self.target)
            )?,
            Op::Push => write!(f, "push {}", value(&self.lhs))?,
            Op::Pop => write!(f, "{} = pop {}", dest(&self.dest), value(&self.lhs))?,
            Op::Call => write!(f, "call {}", target(&self.target))?,
            Op::Return => f.write_str("return")?,
            Op::End => f.write_str("end")?,
        }

        if let Some(comment) = &self.comment {
            write!(f, " ; {}", comment)?;
        }
        Ok(())
    }
}

impl Listing<Instr> {
    /// Resolve the jump target of the control-transfer instruction at
    /// `position`. Patching is idempotent: re-patching with the same target
    /// leaves the instruction unchanged.
    pub fn patch(&mut self, position: Position, target: Position) -> Result<(), IcgError> {
        if target > self.next_position() {
            return Err(IcgError::TargetOutOfRange {
                target,
                len: self.len(),
            });
        }
        match self.get_mut(position) {
            Some(instr) if instr.op.is_control_transfer() => {
                instr.target = Some(target);
                Ok(())
            }
            _ => Err(IcgError::NotPatchable(position)),
        }
    }

    /// The diagnostic rendering: one line per instruction, showing the
    /// position, the mnemonic form and the trailing comment.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (position, instr) in self.iter_lines() {
            let _ = writeln!(out, "{:>4}: {}", position, instr);
        }
        out
    }
}

/// A TAC name: a symbolic address naming a value in the flattened
/// instruction stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Name {
    /// A generated temporary.
    Temp(usize),
    /// A scope-qualified source variable.
    Var(Variable),
    /// The well-known return-value slot, written by `return` and read by
    /// call sites.
    Ret,
}
impl Display for Name {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Name::Temp(index) => write!(f, "t{}", index),
            Name::Var(var) => var.fmt(f),
            Name::Ret => f.write_str("ret"),
        }
    }
}

/// A source variable qualified with the id of its defining scope, so that
/// two distinct bindings with the same source name never alias each other
/// in the flattened stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub scope: ScopeId,
}
impl Variable {
    pub fn from_symbol(sym: &Rc<Symbol>) -> Self {
        Self {
            name: sym.name.clone(),
            scope: sym.scope,
        }
    }
}
impl Display for Variable {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.scope)
    }
}

/// A TAC operand. Operands are immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Int(i32),
    Char(char),
    Str(String),
    /// A reference to a name defined earlier.
    Name(Name),
    /// An argument slot index, used by [`Op::Pop`].
    ArgSlot(usize),
}
impl From<Name> for Operand {
    fn from(name: Name) -> Self {
        Operand::Name(name)
    }
}
impl Display for Operand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Operand::Int(i) => write!(f, "{}", i),
            Operand::Char(c) => write!(f, "'{}'", c),
            Operand::Str(s) => write!(f, "\"{}\"", s),
            Operand::Name(name) => name.fmt(f),
            Operand::ArgSlot(slot) => write!(f, "{}", slot),
        }
    }
}
