use std::collections::{HashMap, VecDeque};

use log::{debug, trace};

use crate::{
    ast::typed::*,
    listing::Position,
};

use super::{backpatch::*, error::IcgError, name_generator::NameGenerator, tac::*};

type Result<T> = std::result::Result<T, IcgError>;

/// Generate a fully target-resolved TAC listing for a validated program.
pub fn generate(program: Program) -> Result<TacListing> {
    TacGenerator::generate(program)
}

/// Bookkeeping for one lexically active loop. Break and continue jumps
/// emitted while lowering the loop's body accumulate here and are resolved
/// when the loop finishes lowering.
struct LoopContext {
    /// Identity of the loop's source node, checked against the binding of
    /// every break/continue lowered inside it.
    node_id: NodeId,
    break_list: PatchList,
    continue_list: PatchList,
}
impl LoopContext {
    fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            break_list: PatchList::empty(),
            continue_list: PatchList::empty(),
        }
    }
}

/// Call sites awaiting a function's entry address.
struct PendingCalls {
    name: String,
    sites: Vec<Position>,
}

struct TacGenerator {
    listing: TacListing,
    names: NameGenerator,
    loops: Vec<LoopContext>,
    /// Function definitions encountered in the top-level sequence, deferred
    /// until that sequence has been fully lowered.
    pending_funcs: VecDeque<FuncDef>,
    /// Entry addresses of functions that have been lowered.
    entries: HashMap<FuncId, Position>,
    /// Calls to functions that have not been lowered yet, keyed by the
    /// callee's declaration-order id.
    call_patches: HashMap<FuncId, PendingCalls>,
}
impl TacGenerator {
    /// Lower the top-level statement sequence, then drain the function
    /// queue in FIFO order. This two-phase ordering is what makes forward
    /// calls resolvable; it must not be reordered.
    fn generate(program: Program) -> Result<TacListing> {
        let mut tac = Self {
            listing: TacListing::new(),
            names: NameGenerator::new(),
            loops: vec![],
            pending_funcs: VecDeque::new(),
            entries: HashMap::new(),
            call_patches: HashMap::new(),
        };

        for stmt in program.body {
            tac.lower_stmt(stmt)?;
        }
        tac.emit(Instr::end());

        while let Some(func) = tac.pending_funcs.pop_front() {
            tac.lower_function(func)?;
        }

        tac.verify_resolved()?;
        Ok(tac.listing)
    }

    fn lower_stmt(&mut self, stmt: Stmt) -> Result<()> {
        match stmt {
            Stmt::Decl(var_def) => self.lower_var_def(var_def),
            Stmt::Assign(assign) => self.lower_assign(assign),
            Stmt::Evaluate(expr) => {
                trace!("discarding the {} value of an expression statement", expr.ty);
                self.lower_expr(expr)?;
                Ok(())
            }
            Stmt::If(if_stmt) => self.lower_if(if_stmt),
            Stmt::While(while_stmt) => self.lower_while(while_stmt),
            Stmt::For(for_stmt) => self.lower_for(for_stmt),
            Stmt::Break { loop_id } => self.lower_break(loop_id),
            Stmt::Continue { loop_id } => self.lower_continue(loop_id),
            Stmt::Return(value) => self.lower_return(value),
            Stmt::FuncDef(func) => {
                debug!("queueing function `{}` (id {})", func.name, func.id);
                self.pending_funcs.push_back(func);
                Ok(())
            }
            Stmt::Block(stmts) => self.lower_block(stmts),
            Stmt::Empty => Ok(()),
        }
    }

    fn lower_block(&mut self, stmts: Vec<Stmt>) -> Result<()> {
        for stmt in stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    /// Lower a single declared variable. A variable without an initialiser
    /// is assigned the void marker.
    fn lower_var_def(&mut self, var_def: VarDef) -> Result<()> {
        let dest = self.names.qualify(&var_def.sym);
        let instr = match var_def.value {
            Some(expr) => {
                let value = self.lower_expr(expr)?;
                Instr::assign(dest, value)
            }
            None => Instr::assign_void(dest),
        };
        self.emit(instr);
        Ok(())
    }

    fn lower_assign(&mut self, assign: Assign) -> Result<()> {
        let value = self.lower_expr(assign.value)?;
        let dest = self.names.qualify(&assign.target);
        self.emit(Instr::assign(dest, value));
        Ok(())
    }

    /// Lower an expression to the operand holding its value. Literals and
    /// bare identifier references lower to terminal operands without
    /// emitting code; everything else emits instructions whose final
    /// destination names the value.
    fn lower_expr(&mut self, expr: Expr) -> Result<Operand> {
        match expr.kind {
            ExprKind::Literal(lit) => Ok(convert_literal(lit)),
            ExprKind::Id(sym) => Ok(Operand::Name(self.names.qualify(&sym))),
            ExprKind::Unary(un) => self.lower_unexpr(*un),
            ExprKind::Binary(bin) => self.lower_binexpr(*bin),
            ExprKind::Call(call) => self.lower_call(*call),
        }
    }

    /// Lower a binary expression: both operands depth-first, then one
    /// instruction combining them into a fresh temporary. Logical operators
    /// are dispatched to the short-circuit translator instead.
    fn lower_binexpr(&mut self, expr: BinExpr) -> Result<Operand> {
        if expr.op.is_logical() {
            let value = self.lower_bool_binary(expr)?;
            return Ok(value.into());
        }

        let lhs = self.lower_expr(expr.lhs)?;
        let rhs = self.lower_expr(expr.rhs)?;

        let dest = self.names.next_temp();
        self.emit(Instr::bin(convert_binop(expr.op), dest.clone(), lhs, rhs));
        Ok(dest.into())
    }

    fn lower_unexpr(&mut self, expr: UnExpr) -> Result<Operand> {
        match expr.op {
            UnOp::Neg => {
                let operand = self.lower_expr(expr.operand)?;
                let dest = self.names.next_temp();
                self.emit(Instr::neg(dest.clone(), operand));
                Ok(dest.into())
            }
            UnOp::Not => {
                let value = self.lower_bool_not(expr.operand)?;
                Ok(value.into())
            }
            UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec => {
                self.lower_inc_dec(expr.op, expr.operand)
            }
        }
    }

    /// Lower an increment/decrement. The post-forms capture the original
    /// value before the mutating add/subtract, so the expression's value
    /// reflects the pre-mutation state; the pre-forms mutate first.
    fn lower_inc_dec(&mut self, op: UnOp, operand: Expr) -> Result<Operand> {
        let sym = match operand.kind {
            ExprKind::Id(sym) => sym,
            _ => return Err(IcgError::IncDecTarget(op)),
        };
        let var = self.names.qualify(&sym);
        let step = match op {
            UnOp::PreInc | UnOp::PostInc => Op::Add,
            _ => Op::Sub,
        };

        match op {
            UnOp::PostInc | UnOp::PostDec => {
                let dest = self.names.next_temp();
                self.emit(Instr::assign(dest.clone(), var.clone().into()));
                self.emit(Instr::bin(step, var.clone(), var.into(), Operand::Int(1)));
                Ok(dest.into())
            }
            _ => {
                self.emit(Instr::bin(
                    step,
                    var.clone(),
                    var.clone().into(),
                    Operand::Int(1),
                ));
                let dest = self.names.next_temp();
                self.emit(Instr::assign(dest.clone(), var.into()));
                Ok(dest.into())
            }
        }
    }

    /// Translate `&&`/`||` to jumping code. The left operand short-circuits
    /// past the right operand's code, and the accumulated true/false lists
    /// are resolved by materializing a 0/1 temporary.
    fn lower_bool_binary(&mut self, expr: BinExpr) -> Result<Name> {
        let first = self.listing.next_position();
        let op = expr.op;

        let lhs = self.lower_expr(expr.lhs)?;
        let mut true_list = PatchList::empty();
        let mut false_list = PatchList::empty();
        match op {
            BinOp::And => false_list.add(self.emit(Instr::if_false(lhs, None))),
            BinOp::Or => true_list.add(self.emit(Instr::if_true(lhs, None))),
            _ => unreachable!("non-logical operator in short-circuit translation"),
        }

        let rhs = self.lower_expr(expr.rhs)?;
        let last = self.emit(Instr::if_false(rhs, None));
        false_list.add(last);

        self.materialize(BoolExpr {
            true_list,
            false_list,
            first,
            last,
        })
    }

    /// Translate `!`: the operand's true outcome is the result's false case,
    /// and falling through (operand false) is its true case.
    fn lower_bool_not(&mut self, operand: Expr) -> Result<Name> {
        let first = self.listing.next_position();
        let value = self.lower_expr(operand)?;
        let last = self.emit(Instr::if_true(value, None));

        self.materialize(BoolExpr {
            true_list: PatchList::empty(),
            false_list: PatchList::one(last),
            first,
            last,
        })
    }

    /// Materialize the 0/1 value of a translated logical expression:
    /// assign-true (true-list target and fall-through), a skip jump,
    /// assign-false (false-list target). Emitted unconditionally, even when
    /// the consumer only needs control flow; an enclosing condition then
    /// re-tests the temporary with one more conditional jump.
    fn materialize(&mut self, cond: BoolExpr) -> Result<Name> {
        trace!(
            "materializing logical expression spanning {}..{}",
            cond.first,
            cond.last
        );
        let result = self.names.next_temp();

        let assign_true = self.emit(Instr::assign(result.clone(), Operand::Int(1)));
        self.backpatch(cond.true_list, assign_true)?;
        let skip = self.emit(Instr::goto(None));
        let assign_false = self.emit(Instr::assign(result.clone(), Operand::Int(0)));
        self.backpatch(cond.false_list, assign_false)?;
        self.listing.patch(skip, self.listing.next_position())?;

        Ok(result)
    }

    /// Lower a function call: arguments in argument-list order, pushed, then
    /// the call itself. If the callee has already been lowered its entry is
    /// filled in immediately; otherwise the call site is recorded against
    /// the callee's declaration-order id for later patching. The call's
    /// value is the return slot, copied into a fresh temporary.
    fn lower_call(&mut self, call: CallExpr) -> Result<Operand> {
        let args = call
            .args
            .into_iter()
            .map(|arg| self.lower_expr(arg))
            .collect::<Result<Vec<_>>>()?;
        let argc = args.len();
        for arg in args {
            self.emit(Instr::push(arg));
        }

        let site = self.emit(Instr::call(&call.name, argc));
        match self.entries.get(&call.callee) {
            Some(&entry) => self.listing.patch(site, entry)?,
            None => self
                .call_patches
                .entry(call.callee)
                .or_insert_with(|| PendingCalls {
                    name: call.name.clone(),
                    sites: vec![],
                })
                .sites
                .push(site),
        }

        let result = self.names.next_temp();
        self.emit(Instr::assign(result.clone(), Operand::Name(Name::Ret)));
        Ok(result.into())
    }

    /// Lower an if or if/else statement.
    fn lower_if(&mut self, if_stmt: If) -> Result<()> {
        let cond = self.lower_expr(if_stmt.condition)?;
        let false_jump = self.emit(Instr::if_false(cond, None));

        self.lower_block(if_stmt.then_body)?;

        match if_stmt.else_body {
            Some(else_body) => {
                let skip = self.emit(Instr::goto(None));
                self.listing.patch(false_jump, self.listing.next_position())?;
                self.lower_block(else_body)?;
                self.listing.patch(skip, self.listing.next_position())?;
            }
            None => self.listing.patch(false_jump, self.listing.next_position())?,
        }
        Ok(())
    }

    /// Lower a while loop. The condition's code is emitted once and jumped
    /// back to; `continue` re-enters at the condition re-check and `break`
    /// leaves to the first instruction after the loop.
    fn lower_while(&mut self, while_stmt: While) -> Result<()> {
        self.loops.push(LoopContext::new(while_stmt.node_id));

        let cond_first = self.listing.next_position();
        let cond = self.lower_expr(while_stmt.condition)?;
        let false_jump = self.emit(Instr::if_false(cond, None));

        self.lower_block(while_stmt.body)?;
        self.emit(Instr::goto(Some(cond_first)));
        let after = self.listing.next_position();

        let ctx = self.pop_loop();
        self.backpatch(ctx.continue_list, cond_first)?;
        self.backpatch(ctx.break_list.merge(PatchList::one(false_jump)), after)?;
        Ok(())
    }

    /// Lower a for loop. The init runs once; an omitted condition means the
    /// body is entered unconditionally. `continue` jumps to the condition
    /// re-check, which skips the update expression.
    fn lower_for(&mut self, for_stmt: For) -> Result<()> {
        if let Some(init) = for_stmt.init {
            self.lower_stmt(*init)?;
        }
        self.loops.push(LoopContext::new(for_stmt.node_id));

        let cond_first = self.listing.next_position();
        let false_list = match for_stmt.condition {
            Some(condition) => {
                let cond = self.lower_expr(condition)?;
                PatchList::one(self.emit(Instr::if_false(cond, None)))
            }
            None => PatchList::empty(),
        };

        self.lower_block(for_stmt.body)?;
        if let Some(update) = for_stmt.update {
            self.lower_expr(update)?;
        }
        self.emit(Instr::goto(Some(cond_first)));
        let after = self.listing.next_position();

        let ctx = self.pop_loop();
        self.backpatch(ctx.continue_list, cond_first)?;
        self.backpatch(ctx.break_list.merge(false_list), after)?;
        Ok(())
    }

    fn lower_break(&mut self, loop_id: NodeId) -> Result<()> {
        let jump = self.emit(Instr::goto(None).with_comment("break"));
        let ctx = self.bound_loop("break", loop_id)?;
        ctx.break_list.add(jump);
        Ok(())
    }

    fn lower_continue(&mut self, loop_id: NodeId) -> Result<()> {
        let jump = self.emit(Instr::goto(None).with_comment("continue"));
        let ctx = self.bound_loop("continue", loop_id)?;
        ctx.continue_list.add(jump);
        Ok(())
    }

    /// The innermost active loop context, checked against the loop the
    /// break/continue was bound to by semantic analysis.
    fn bound_loop(&mut self, stmt: &'static str, loop_id: NodeId) -> Result<&mut LoopContext> {
        match self.loops.last_mut() {
            None => Err(IcgError::LoopExitOutsideLoop(stmt)),
            Some(ctx) if ctx.node_id != loop_id => Err(IcgError::LoopBindingMismatch {
                stmt,
                bound: loop_id,
                active: ctx.node_id,
            }),
            Some(ctx) => Ok(ctx),
        }
    }

    /// Lower a return statement: the value (or the void marker) goes into
    /// the well-known return slot, followed by a return instruction.
    fn lower_return(&mut self, value: Option<Expr>) -> Result<()> {
        let instr = match value {
            Some(expr) => {
                let value = self.lower_expr(expr)?;
                Instr::assign(Name::Ret, value)
            }
            None => Instr::assign_void(Name::Ret),
        };
        self.emit(instr);
        self.emit(Instr::ret());
        Ok(())
    }

    /// Lower a queued function: parameter pops in declaration order, then
    /// the body, then an implicit void return if the body did not end in
    /// one. The entry address is recorded up front so that recursive calls
    /// (and calls lowered later) resolve immediately, and every call site
    /// recorded before this point is patched to it.
    fn lower_function(&mut self, func: FuncDef) -> Result<()> {
        debug!(
            "lowering function `{}` (id {}, returns {})",
            func.name, func.id, func.ret_ty
        );
        let entry = self.listing.next_position();
        self.entries.insert(func.id, entry);

        for (slot, param) in func.params.iter().enumerate() {
            let dest = self.names.qualify(param);
            self.emit(Instr::pop(dest, slot).with_comment(format!("param of {}", func.name)));
        }

        // Whether the body itself ends in a return decides this, not the
        // last emitted instruction: a trailing `if` whose branch returns
        // still needs a landing pad for its false-jump.
        let ends_in_return = matches!(func.body.last(), Some(Stmt::Return(_)));
        self.lower_block(func.body)?;
        if !ends_in_return {
            self.emit(Instr::assign_void(Name::Ret));
            self.emit(Instr::ret());
        }

        if let Some(pending) = self.call_patches.remove(&func.id) {
            for site in pending.sites {
                self.listing.patch(site, entry)?;
            }
        }
        Ok(())
    }

    /// Resolve every position in a patch list to one concrete target,
    /// consuming the list.
    fn backpatch(&mut self, list: PatchList, target: Position) -> Result<()> {
        for position in list.into_positions() {
            self.listing.patch(position, target)?;
        }
        Ok(())
    }

    /// The stream is handed to downstream consumers only once every control
    /// transfer has an in-range target and no call is still pending.
    fn verify_resolved(&self) -> Result<()> {
        if let Some(pending) = self.call_patches.values().next() {
            return Err(IcgError::UnresolvedCall(pending.name.clone()));
        }
        for (position, instr) in self.listing.iter_lines() {
            if instr.op.is_control_transfer() {
                match instr.target {
                    Some(target) if target.0 < self.listing.len() => (),
                    _ => return Err(IcgError::UnresolvedTarget(position)),
                }
            }
        }
        Ok(())
    }

    fn pop_loop(&mut self) -> LoopContext {
        self.loops.pop().expect("loop context pushed on entry")
    }

    fn emit(&mut self, instr: Instr) -> Position {
        debug!("emit {}", instr);
        self.listing.push(instr)
    }
}

/// Convert a literal to an [`Operand`]. This does not result in the
/// emission of intermediate code.
fn convert_literal(lit: Literal) -> Operand {
    match lit {
        Literal::Int(i) => Operand::Int(i),
        Literal::Char(c) => Operand::Char(c),
        Literal::Str(s) => Operand::Str(s),
    }
}

fn convert_binop(op: BinOp) -> Op {
    match op {
        BinOp::Add => Op::Add,
        BinOp::Sub => Op::Sub,
        BinOp::Mul => Op::Mul,
        BinOp::Div => Op::Div,
        BinOp::Eq => Op::Eq,
        BinOp::Neq => Op::Neq,
        BinOp::Lt => Op::Lt,
        BinOp::Leq => Op::Leq,
        BinOp::Gt => Op::Gt,
        BinOp::Geq => Op::Geq,
        BinOp::And | BinOp::Or => {
            unreachable!("logical operators take the short-circuit path")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::ast::TypeSpec;

    use super::*;

    fn int(i: i32) -> Expr {
        Expr::new(ExprKind::Literal(Literal::Int(i)), TypeSpec::Int)
    }

    fn id(sym: &Rc<Symbol>) -> Expr {
        Expr::new(ExprKind::Id(Rc::clone(sym)), sym.ty)
    }

    fn bin(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary(Box::new(BinExpr { lhs, op, rhs })),
            TypeSpec::Int,
        )
    }

    fn un(op: UnOp, operand: Expr) -> Expr {
        Expr::new(ExprKind::Unary(Box::new(UnExpr { op, operand })), TypeSpec::Int)
    }

    fn call(callee: FuncId, name: &str, args: Vec<Expr>) -> Expr {
        Expr::new(
            ExprKind::Call(Box::new(CallExpr {
                callee,
                name: name.to_string(),
                args,
            })),
            TypeSpec::Int,
        )
    }

    fn assign(target: &Rc<Symbol>, value: Expr) -> Stmt {
        Stmt::Assign(Assign {
            target: Rc::clone(target),
            value,
        })
    }

    macro_rules! assert_generates {
        ($body:expr, $il:expr) => {{
            let listing = generate(Program::new($body)).unwrap();
            let lines: Vec<_> = listing
                .iter_instructions()
                .map(|instr| instr.to_string())
                .collect();
            assert_eq!(&$il[..], lines);
        }};
    }

    #[test]
    fn arithmetic_lowers_depth_first_into_temporaries() {
        // x = 3 + 4 * 2;
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![assign(&x, bin(BinOp::Add, int(3), bin(BinOp::Mul, int(4), int(2))))],
            ["t0 = 4 * 2", "t1 = 3 + t0", "x_0 = t1", "end"]
        );
    }

    #[test]
    fn declaration_without_initialiser_assigns_void() {
        let x = Symbol::new("x", TypeSpec::Int, 0);
        let y = Symbol::new("y", TypeSpec::Int, 0);
        assert_generates!(
            vec![
                Stmt::Decl(VarDef {
                    sym: Rc::clone(&x),
                    value: None,
                }),
                Stmt::Decl(VarDef {
                    sym: Rc::clone(&y),
                    value: Some(int(5)),
                }),
                Stmt::Empty,
            ],
            ["x_0 = void", "y_0 = 5", "end"]
        );
    }

    #[test]
    fn same_name_in_nested_scope_gets_a_distinct_qualified_name() {
        let outer = Symbol::new("a", TypeSpec::Int, 0);
        let inner = Symbol::new("a", TypeSpec::Int, 2);
        assert_generates!(
            vec![
                assign(&outer, int(1)),
                Stmt::Block(vec![assign(&inner, int(2))]),
            ],
            ["a_0 = 1", "a_2 = 2", "end"]
        );
    }

    #[test]
    fn if_else_patches_false_jump_to_else_branch() {
        // if (a > b) x = 1; else x = 2;
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let b = Symbol::new("b", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![Stmt::If(If {
                condition: bin(BinOp::Gt, id(&a), id(&b)),
                then_body: vec![assign(&x, int(1))],
                else_body: Some(vec![assign(&x, int(2))]),
            })],
            [
                "t0 = a_0 > b_0",
                "if_false t0 goto 4",
                "x_0 = 1",
                "goto 5",
                "x_0 = 2",
                "end",
            ]
        );
    }

    #[test]
    fn if_without_else_patches_false_jump_past_the_branch() {
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![Stmt::If(If {
                condition: id(&a),
                then_body: vec![assign(&x, int(1))],
                else_body: None,
            })],
            ["if_false a_0 goto 2", "x_0 = 1", "end"]
        );
    }

    #[test]
    fn while_loop_jumps_back_to_the_condition() {
        // while (a < 10) a = a + 1;
        let a = Symbol::new("a", TypeSpec::Int, 0);
        assert_generates!(
            vec![Stmt::While(While {
                node_id: 1,
                condition: bin(BinOp::Lt, id(&a), int(10)),
                body: vec![assign(&a, bin(BinOp::Add, id(&a), int(1)))],
            })],
            [
                "t0 = a_0 < 10",
                "if_false t0 goto 5",
                "t1 = a_0 + 1",
                "a_0 = t1",
                "goto 0",
                "end",
            ]
        );
    }

    #[test]
    fn break_leaves_the_loop_and_continue_recheck_the_condition() {
        // while (1) { if (a > 5) break; continue; }
        let a = Symbol::new("a", TypeSpec::Int, 0);
        assert_generates!(
            vec![Stmt::While(While {
                node_id: 7,
                condition: int(1),
                body: vec![
                    Stmt::If(If {
                        condition: bin(BinOp::Gt, id(&a), int(5)),
                        then_body: vec![Stmt::Break { loop_id: 7 }],
                        else_body: None,
                    }),
                    Stmt::Continue { loop_id: 7 },
                ],
            })],
            [
                "if_false 1 goto 6",
                "t0 = a_0 > 5",
                "if_false t0 goto 4",
                "goto 6 ; break",
                "goto 0 ; continue",
                "goto 0",
                "end",
            ]
        );
    }

    #[test]
    fn for_loop_continue_skips_the_update_expression() {
        // for (i = 0; i < 3; i++) continue;
        let i = Symbol::new("i", TypeSpec::Int, 0);
        assert_generates!(
            vec![Stmt::For(For {
                node_id: 3,
                init: Some(Box::new(assign(&i, int(0)))),
                condition: Some(bin(BinOp::Lt, id(&i), int(3))),
                update: Some(un(UnOp::PostInc, id(&i))),
                body: vec![Stmt::Continue { loop_id: 3 }],
            })],
            [
                "i_0 = 0",
                "t0 = i_0 < 3",
                "if_false t0 goto 7",
                "goto 1 ; continue",
                "t1 = i_0",
                "i_0 = i_0 + 1",
                "goto 1",
                "end",
            ]
        );
    }

    #[test]
    fn for_loop_without_condition_runs_unconditionally() {
        let i = Symbol::new("i", TypeSpec::Int, 0);
        assert_generates!(
            vec![Stmt::For(For {
                node_id: 4,
                init: None,
                condition: None,
                update: None,
                body: vec![Stmt::If(If {
                    condition: id(&i),
                    then_body: vec![Stmt::Break { loop_id: 4 }],
                    else_body: None,
                })],
            })],
            ["if_false i_0 goto 2", "goto 3 ; break", "goto 0", "end"]
        );
    }

    #[test]
    fn logical_and_short_circuits_and_materializes() {
        // if (a < 1 && b < 2) x = 1;
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let b = Symbol::new("b", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![Stmt::If(If {
                condition: bin(
                    BinOp::And,
                    bin(BinOp::Lt, id(&a), int(1)),
                    bin(BinOp::Lt, id(&b), int(2)),
                ),
                then_body: vec![assign(&x, int(1))],
                else_body: None,
            })],
            [
                "t0 = a_0 < 1",
                "if_false t0 goto 6",
                "t1 = b_0 < 2",
                "if_false t1 goto 6",
                "t2 = 1",
                "goto 7",
                "t2 = 0",
                "if_false t2 goto 9",
                "x_0 = 1",
                "end",
            ]
        );
    }

    #[test]
    fn logical_or_skips_the_right_operand_when_left_is_true() {
        // x = a || b;
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let b = Symbol::new("b", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![assign(&x, bin(BinOp::Or, id(&a), id(&b)))],
            [
                "if_true a_0 goto 2",
                "if_false b_0 goto 4",
                "t0 = 1",
                "goto 5",
                "t0 = 0",
                "x_0 = t0",
                "end",
            ]
        );
    }

    #[test]
    fn logical_not_inverts_through_the_jump_translation() {
        // x = !a;
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![assign(&x, un(UnOp::Not, id(&a)))],
            [
                "if_true a_0 goto 3",
                "t0 = 1",
                "goto 4",
                "t0 = 0",
                "x_0 = t0",
                "end",
            ]
        );
    }

    #[test]
    fn post_increment_captures_the_value_before_mutation() {
        // x = a++;
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![assign(&x, un(UnOp::PostInc, id(&a)))],
            ["t0 = a_0", "a_0 = a_0 + 1", "x_0 = t0", "end"]
        );
    }

    #[test]
    fn pre_decrement_mutates_before_capturing_the_value() {
        // x = --a;
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![assign(&x, un(UnOp::PreDec, id(&a)))],
            ["a_0 = a_0 - 1", "t0 = a_0", "x_0 = t0", "end"]
        );
    }

    #[test]
    fn unary_minus_emits_one_instruction() {
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        assert_generates!(
            vec![assign(&x, un(UnOp::Neg, bin(BinOp::Add, id(&a), int(1))))],
            ["t0 = a_0 + 1", "t1 = -t0", "x_0 = t1", "end"]
        );
    }

    #[test]
    fn forward_call_is_patched_once_the_function_is_lowered() {
        // foo(2); int foo(int x) { return x + 1; }
        let param = Symbol::new("x", TypeSpec::Int, 1);
        assert_generates!(
            vec![
                Stmt::Evaluate(call(0, "foo", vec![int(2)])),
                Stmt::FuncDef(FuncDef {
                    id: 0,
                    name: "foo".to_string(),
                    params: vec![Rc::clone(&param)],
                    ret_ty: TypeSpec::Int,
                    body: vec![Stmt::Return(Some(bin(BinOp::Add, id(&param), int(1))))],
                }),
            ],
            [
                "push 2",
                "call 4 ; call foo (1 args)",
                "t0 = ret",
                "end",
                "x_1 = pop 0 ; param of foo",
                "t1 = x_1 + 1",
                "ret = t1",
                "return",
            ]
        );
    }

    #[test]
    fn call_after_the_callee_resolves_immediately() {
        // int foo() { return 1; } int main() { return foo(); }
        assert_generates!(
            vec![
                Stmt::FuncDef(FuncDef {
                    id: 0,
                    name: "foo".to_string(),
                    params: vec![],
                    ret_ty: TypeSpec::Int,
                    body: vec![Stmt::Return(Some(int(1)))],
                }),
                Stmt::FuncDef(FuncDef {
                    id: 1,
                    name: "main".to_string(),
                    params: vec![],
                    ret_ty: TypeSpec::Int,
                    body: vec![Stmt::Return(Some(call(0, "foo", vec![])))],
                }),
            ],
            [
                "end",
                "ret = 1",
                "return",
                "call 1 ; call foo (0 args)",
                "t0 = ret",
                "ret = t0",
                "return",
            ]
        );
    }

    #[test]
    fn function_without_a_final_return_gets_an_implicit_void_return() {
        let a = Symbol::new("a", TypeSpec::Int, 1);
        assert_generates!(
            vec![Stmt::FuncDef(FuncDef {
                id: 0,
                name: "noop".to_string(),
                params: vec![],
                ret_ty: TypeSpec::Void,
                body: vec![Stmt::Decl(VarDef {
                    sym: Rc::clone(&a),
                    value: Some(int(1)),
                })],
            })],
            ["end", "a_1 = 1", "ret = void", "return"]
        );
    }

    #[test]
    fn function_ending_in_a_conditional_return_still_gets_an_implicit_one() {
        // void f(int c) { if (c) return; }
        // The false-jump of the trailing `if` needs an instruction to land
        // on inside the function.
        let c = Symbol::new("c", TypeSpec::Int, 1);
        assert_generates!(
            vec![Stmt::FuncDef(FuncDef {
                id: 0,
                name: "f".to_string(),
                params: vec![Rc::clone(&c)],
                ret_ty: TypeSpec::Void,
                body: vec![Stmt::If(If {
                    condition: id(&c),
                    then_body: vec![Stmt::Return(None)],
                    else_body: None,
                })],
            })],
            [
                "end",
                "c_1 = pop 0 ; param of f",
                "if_false c_1 goto 5",
                "ret = void",
                "return",
                "ret = void",
                "return",
            ]
        );
    }

    #[test]
    fn trailing_if_else_where_both_branches_return_resolves_the_else_skip() {
        // int g(int c) { if (c) return 1; else return 2; }
        let c = Symbol::new("c", TypeSpec::Int, 1);
        assert_generates!(
            vec![Stmt::FuncDef(FuncDef {
                id: 0,
                name: "g".to_string(),
                params: vec![Rc::clone(&c)],
                ret_ty: TypeSpec::Int,
                body: vec![Stmt::If(If {
                    condition: id(&c),
                    then_body: vec![Stmt::Return(Some(int(1)))],
                    else_body: Some(vec![Stmt::Return(Some(int(2)))]),
                })],
            })],
            [
                "end",
                "c_1 = pop 0 ; param of g",
                "if_false c_1 goto 6",
                "ret = 1",
                "return",
                "goto 8",
                "ret = 2",
                "return",
                "ret = void",
                "return",
            ]
        );
    }

    #[test]
    fn conditional_return_in_the_last_queued_function_resolves_all_targets() {
        // void f(int c) { if (c) return; }  followed by a call to it.
        let c = Symbol::new("c", TypeSpec::Int, 1);
        let listing = generate(Program::new(vec![
            Stmt::Evaluate(call(0, "f", vec![int(0)])),
            Stmt::FuncDef(FuncDef {
                id: 0,
                name: "f".to_string(),
                params: vec![Rc::clone(&c)],
                ret_ty: TypeSpec::Void,
                body: vec![Stmt::If(If {
                    condition: id(&c),
                    then_body: vec![Stmt::Return(None)],
                    else_body: None,
                })],
            }),
        ]))
        .unwrap();

        for (_, instr) in listing.iter_lines() {
            if instr.op.is_control_transfer() {
                let target = instr.target.expect("unresolved target");
                assert!(target.0 < listing.len());
            }
        }
    }

    #[test]
    fn recursive_call_resolves_against_the_functions_own_entry() {
        // int loop() { return loop(); }
        assert_generates!(
            vec![Stmt::FuncDef(FuncDef {
                id: 0,
                name: "loop".to_string(),
                params: vec![],
                ret_ty: TypeSpec::Int,
                body: vec![Stmt::Return(Some(call(0, "loop", vec![])))],
            })],
            [
                "end",
                "call 1 ; call loop (0 args)",
                "t0 = ret",
                "ret = t0",
                "return",
            ]
        );
    }

    #[test]
    fn break_outside_a_loop_is_an_internal_error() {
        let result = generate(Program::new(vec![Stmt::Break { loop_id: 0 }]));
        assert_eq!(Err(IcgError::LoopExitOutsideLoop("break")), result);
    }

    #[test]
    fn continue_bound_to_a_different_loop_is_an_internal_error() {
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let result = generate(Program::new(vec![Stmt::While(While {
            node_id: 1,
            condition: id(&a),
            body: vec![Stmt::Continue { loop_id: 9 }],
        })]));
        assert_eq!(
            Err(IcgError::LoopBindingMismatch {
                stmt: "continue",
                bound: 9,
                active: 1,
            }),
            result
        );
    }

    #[test]
    fn increment_of_a_non_identifier_is_an_internal_error() {
        let result = generate(Program::new(vec![Stmt::Evaluate(un(
            UnOp::PostInc,
            int(1),
        ))]));
        assert_eq!(Err(IcgError::IncDecTarget(UnOp::PostInc)), result);
    }

    #[test]
    fn call_to_a_function_that_is_never_lowered_is_an_internal_error() {
        let result = generate(Program::new(vec![Stmt::Evaluate(call(
            5,
            "ghost",
            vec![],
        ))]));
        assert_eq!(Err(IcgError::UnresolvedCall("ghost".to_string())), result);
    }

    #[test]
    fn all_targets_are_resolved_after_generation() {
        let a = Symbol::new("a", TypeSpec::Int, 0);
        let x = Symbol::new("x", TypeSpec::Int, 0);
        let listing = generate(Program::new(vec![
            Stmt::While(While {
                node_id: 1,
                condition: bin(
                    BinOp::Or,
                    bin(BinOp::Lt, id(&a), int(3)),
                    un(UnOp::Not, id(&x)),
                ),
                body: vec![Stmt::If(If {
                    condition: id(&x),
                    then_body: vec![Stmt::Break { loop_id: 1 }],
                    else_body: Some(vec![assign(&a, un(UnOp::PreInc, id(&a)))]),
                })],
            }),
        ]))
        .unwrap();

        for (_, instr) in listing.iter_lines() {
            if instr.op.is_control_transfer() {
                let target = instr.target.expect("unresolved target");
                assert!(target.0 < listing.len());
            }
        }
    }

    #[test]
    fn short_circuit_truth_table_for_and_and_or() {
        // Evaluate the materialized value of every combination by tracing
        // the jumps through the generated listing.
        for (op, table) in [
            (BinOp::And, [(0, 0, 0), (0, 1, 0), (1, 0, 0), (1, 1, 1)]),
            (BinOp::Or, [(0, 0, 0), (0, 1, 1), (1, 0, 1), (1, 1, 1)]),
        ] {
            for (lhs, rhs, expected) in table {
                let listing =
                    generate(Program::new(vec![Stmt::Evaluate(bin(op, int(lhs), int(rhs)))]))
                        .unwrap();
                assert_eq!(
                    expected,
                    eval_materialized(&listing),
                    "{} {} {}",
                    lhs,
                    op,
                    rhs
                );
            }
        }
    }

    /// Walk the listing like a tiny interpreter, tracking only integer
    /// constants and the single materialized temporary, and return the
    /// temporary's final value.
    fn eval_materialized(listing: &TacListing) -> i32 {
        let mut result = -1;
        let mut position = Position(0);
        loop {
            let instr = listing.get(position).expect("ran off the listing");
            match instr.op {
                Op::Assign => {
                    if let Some(Operand::Int(i)) = &instr.lhs {
                        result = *i;
                    }
                    position = position + 1;
                }
                Op::IfTrue | Op::IfFalse => {
                    let value = match &instr.lhs {
                        Some(Operand::Int(i)) => *i,
                        _ => panic!("expected a constant condition"),
                    };
                    let taken = (instr.op == Op::IfTrue) == (value != 0);
                    position = if taken {
                        instr.target.expect("unresolved target")
                    } else {
                        position + 1
                    };
                }
                Op::Goto => position = instr.target.expect("unresolved target"),
                Op::End => return result,
                _ => position = position + 1,
            }
        }
    }
}
