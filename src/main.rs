use std::{env, rc::Rc};

use anyhow::Result;
use log::info;

mod ast;
mod il;
mod listing;

use ast::{typed::*, TypeSpec};

fn main() -> Result<()> {
    let verbosity = env::args().skip(1).filter(|arg| arg == "-v").count();
    stderrlog::new().verbosity(verbosity + 1).init()?;

    info!("generating intermediate code");
    let listing = il::generate(sample_program())?;
    print!("{}", listing.render());

    Ok(())
}

/// The demo input: a validated tree equivalent to the Mini-C program below.
/// The phases that would produce it from source text (lexer, parser, scope
/// resolution, semantic analysis) live upstream of this crate.
///
/// ```text
/// int x, y;
/// x = 10;
/// y = sum(x, 5);
/// if (x > y && y != 0)
///     y = y + 1;
/// else
///     y = -y;
/// while (x > 0) {
///     x--;
///     if (x == 3)
///         continue;
/// }
/// int sum(int a, int b) {
///     return a + b;
/// }
/// ```
fn sample_program() -> Program {
    let x = Symbol::new("x", TypeSpec::Int, 0);
    let y = Symbol::new("y", TypeSpec::Int, 0);
    let a = Symbol::new("a", TypeSpec::Int, 1);
    let b = Symbol::new("b", TypeSpec::Int, 1);

    let int = |i| Expr::new(ExprKind::Literal(Literal::Int(i)), TypeSpec::Int);
    let id = |sym: &Rc<Symbol>| Expr::new(ExprKind::Id(Rc::clone(sym)), sym.ty);
    let bin = |op, lhs, rhs| {
        Expr::new(
            ExprKind::Binary(Box::new(BinExpr { lhs, op, rhs })),
            TypeSpec::Int,
        )
    };

    Program::new(vec![
        Stmt::Decl(VarDef {
            sym: Rc::clone(&x),
            value: None,
        }),
        Stmt::Decl(VarDef {
            sym: Rc::clone(&y),
            value: None,
        }),
        Stmt::Assign(Assign {
            target: Rc::clone(&x),
            value: int(10),
        }),
        Stmt::Assign(Assign {
            target: Rc::clone(&y),
            value: Expr::new(
                ExprKind::Call(Box::new(CallExpr {
                    callee: 0,
                    name: "sum".to_string(),
                    args: vec![id(&x), int(5)],
                })),
                TypeSpec::Int,
            ),
        }),
        Stmt::If(If {
            condition: bin(
                BinOp::And,
                bin(BinOp::Gt, id(&x), id(&y)),
                bin(BinOp::Neq, id(&y), int(0)),
            ),
            then_body: vec![Stmt::Assign(Assign {
                target: Rc::clone(&y),
                value: bin(BinOp::Add, id(&y), int(1)),
            })],
            else_body: Some(vec![Stmt::Assign(Assign {
                target: Rc::clone(&y),
                value: Expr::new(
                    ExprKind::Unary(Box::new(UnExpr {
                        op: UnOp::Neg,
                        operand: id(&y),
                    })),
                    TypeSpec::Int,
                ),
            })]),
        }),
        Stmt::While(While {
            node_id: 1,
            condition: bin(BinOp::Gt, id(&x), int(0)),
            body: vec![
                Stmt::Evaluate(Expr::new(
                    ExprKind::Unary(Box::new(UnExpr {
                        op: UnOp::PostDec,
                        operand: id(&x),
                    })),
                    TypeSpec::Int,
                )),
                Stmt::If(If {
                    condition: bin(BinOp::Eq, id(&x), int(3)),
                    then_body: vec![Stmt::Continue { loop_id: 1 }],
                    else_body: None,
                }),
            ],
        }),
        Stmt::FuncDef(FuncDef {
            id: 0,
            name: "sum".to_string(),
            params: vec![Rc::clone(&a), Rc::clone(&b)],
            ret_ty: TypeSpec::Int,
            body: vec![Stmt::Return(Some(bin(BinOp::Add, id(&a), id(&b))))],
        }),
    ])
}
