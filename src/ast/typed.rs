//! Validated syntax tree nodes.
use std::{
    fmt::{self, Display, Formatter},
    rc::Rc,
};

use super::TypeSpec;

/// Stable numeric identifier of a scope, assigned by scope resolution.
/// Qualifying a variable name with its defining scope's id keeps distinct
/// source bindings distinct once nested scopes are flattened into a single
/// instruction stream.
pub type ScopeId = usize;

/// Declaration-order identifier of a function definition.
pub type FuncId = usize;

/// Identity of a syntax tree node. Only loop nodes need one: a `break` or
/// `continue` carries the id of the loop it was bound to, and the generator
/// checks that binding against the loop it is actually lowering.
pub type NodeId = usize;

/// A resolved symbol, produced by scope resolution and shared by every
/// reference to the same binding.
#[derive(Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeSpec,
    /// The id of the scope the symbol was declared in.
    pub scope: ScopeId,
}
impl Symbol {
    pub fn new<S: Into<String>>(name: S, ty: TypeSpec, scope: ScopeId) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            ty,
            scope,
        })
    }
}
impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}_{}", self.name, self.scope)
    }
}

/// A whole validated program: the top-level statement sequence, in source
/// order, with function definitions interspersed where they were declared.
#[derive(Debug)]
pub struct Program {
    pub body: Vec<Stmt>,
}
impl Program {
    pub fn new(body: Vec<Stmt>) -> Self {
        Self { body }
    }
}

#[derive(Debug)]
pub enum Stmt {
    /// A single declared variable, with an optional initialiser. A source
    /// declaration listing several variables appears as one `Decl` per
    /// variable.
    Decl(VarDef),
    Assign(Assign),
    /// A bare expression statement, evaluated for its side effects.
    Evaluate(Expr),
    If(If),
    While(While),
    For(For),
    /// Bound to its enclosing loop by semantic analysis.
    Break { loop_id: NodeId },
    Continue { loop_id: NodeId },
    Return(Option<Expr>),
    FuncDef(FuncDef),
    Block(Vec<Stmt>),
    /// The empty statement (`;`).
    Empty,
}

#[derive(Debug)]
pub struct VarDef {
    pub sym: Rc<Symbol>,
    pub value: Option<Expr>,
}

#[derive(Debug)]
pub struct Assign {
    pub target: Rc<Symbol>,
    pub value: Expr,
}

#[derive(Debug)]
pub struct If {
    pub condition: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Option<Vec<Stmt>>,
}

#[derive(Debug)]
pub struct While {
    pub node_id: NodeId,
    pub condition: Expr,
    pub body: Vec<Stmt>,
}

/// A `for` loop. Any of the three header parts may be omitted; an omitted
/// condition means the loop only exits through `break` or `return`.
#[derive(Debug)]
pub struct For {
    pub node_id: NodeId,
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub update: Option<Expr>,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct FuncDef {
    /// Declaration-order id; call expressions refer to the callee by it.
    pub id: FuncId,
    pub name: String,
    /// Parameter symbols in declaration order; argument slot numbering
    /// follows this order.
    pub params: Vec<Rc<Symbol>>,
    pub ret_ty: TypeSpec,
    pub body: Vec<Stmt>,
}

#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    /// Inferred by semantic analysis.
    pub ty: TypeSpec,
}
impl Expr {
    pub fn new(kind: ExprKind, ty: TypeSpec) -> Self {
        Self { kind, ty }
    }
}

#[derive(Debug)]
pub enum ExprKind {
    Literal(Literal),
    /// A reference to a resolved symbol.
    Id(Rc<Symbol>),
    Unary(Box<UnExpr>),
    Binary(Box<BinExpr>),
    Call(Box<CallExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Int(i32),
    Char(char),
    Str(String),
}
impl Display for Literal {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Char(c) => write!(f, "'{}'", c),
            Literal::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(Debug)]
pub struct UnExpr {
    pub op: UnOp,
    pub operand: Expr,
}

/// Unary operators. The increment/decrement forms require their operand to
/// be a plain identifier reference, which semantic analysis has validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}
impl Display for UnOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            UnOp::Neg => f.write_str("-"),
            UnOp::Not => f.write_str("!"),
            UnOp::PreInc => f.write_str("++(pre)"),
            UnOp::PreDec => f.write_str("--(pre)"),
            UnOp::PostInc => f.write_str("++(post)"),
            UnOp::PostDec => f.write_str("--(post)"),
        }
    }
}

#[derive(Debug)]
pub struct BinExpr {
    pub lhs: Expr,
    pub op: BinOp,
    pub rhs: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
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
    And,
    Or,
}
impl BinOp {
    /// Logical operators go through the short-circuit translator instead of
    /// the ordinary binary lowering.
    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }
}
impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let op = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Leq => "<=",
            BinOp::Gt => ">",
            BinOp::Geq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        };
        f.write_str(op)
    }
}

/// A call to a user-defined function, resolved to the callee's
/// declaration-order id. The callee may be defined later in the source than
/// the call site.
#[derive(Debug)]
pub struct CallExpr {
    pub callee: FuncId,
    pub name: String,
    pub args: Vec<Expr>,
}
