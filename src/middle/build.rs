//! AST → CFG lowering (spec.md §4.C).
//!
//! Exports two mutually recursive lowerings sharing one `Builder`:
//! `visit_expr` compiles an expression as a *value*; `visit_cond` compiles
//! it as a *condition*, branching directly to a `then`/`else` block instead
//! of materializing a boolean. The split is what lets `if`/`and`/`or`
//! compile straight to `cmpq`/`j??` chains instead of round-tripping
//! through a boolean register.

use crate::common::{intern, CompileError, ErrorList, Id};
use crate::front::ast::{Expr, ExprKind};

use super::ir::{BlockId, Function, Label, Op, Program, Register};
use super::scope::{Binding, BuildScope};

const NEWTUPLE_SYMBOL: &str = "psc_newtuple";

pub struct LowerResult {
    pub program: Program,
    pub errors: ErrorList,
}

/// Lower a type-checked top-level expression into a [`Program`]. The
/// top-level expression becomes an implicit, nameless entry function; any
/// nested `func` expressions become additional functions in the program,
/// in the order they were first lowered.
pub fn lower(expr: &Expr) -> LowerResult {
    let mut b = Builder {
        funcs: vec![],
        next_reg: 0,
        next_label: 0,
        errors: ErrorList::new(),
    };
    let entry_name = intern("psc_main");
    let func_idx = b.start_function(entry_name);
    let entry_block = BlockId(0);
    let mut scope = BuildScope::new();
    let (final_block, result) = b.visit_expr(&mut scope, func_idx, entry_block, expr);
    b.emit(func_idx, final_block, Op::ret(result));

    LowerResult {
        program: Program { funcs: b.funcs },
        errors: b.errors,
    }
}

struct Builder {
    funcs: Vec<Function>,
    next_reg: u32,
    next_label: u32,
    errors: ErrorList,
}

impl Builder {
    fn new_register(&mut self) -> Register {
        let r = Register(self.next_reg);
        self.next_reg += 1;
        r
    }

    fn new_label(&mut self, prefix: &str) -> Label {
        let n = self.next_label;
        self.next_label += 1;
        Label(intern(format!("{prefix}{n}")))
    }

    fn start_function(&mut self, name: Id) -> usize {
        let mut f = Function::new(name);
        f.add_block(Label(intern("entry")));
        self.funcs.push(f);
        self.funcs.len() - 1
    }

    fn emit(&mut self, func: usize, block: BlockId, op: Op) {
        self.funcs[func].block_mut(block).code.push(op);
    }

    fn add_block(&mut self, func: usize, name: Label) -> BlockId {
        self.funcs[func].add_block(name)
    }

    fn add_block_named(&mut self, func: usize, prefix: &str) -> BlockId {
        let name = self.new_label(prefix);
        self.add_block(func, name)
    }

    fn add_edge(&mut self, func: usize, from: BlockId, to: BlockId) {
        self.funcs[func].add_edge(from, to);
    }

    fn error(&mut self, span: usize, message: impl Into<String>) {
        self.errors.push(CompileError::new(Some(span), message.into()));
    }

    // ---------------------------------------------------------------
    // Value context
    // ---------------------------------------------------------------

    /// Compile `e` as a value, returning the (possibly new) current block
    /// and the register holding the result.
    fn visit_expr(&mut self, scope: &mut BuildScope, func: usize, block: BlockId, e: &Expr) -> (BlockId, Register) {
        match &e.kind {
            ExprKind::Var(name) => match scope.lookup(*name).copied() {
                Some(Binding::Value(r)) => (block, r),
                Some(Binding::Function(fname)) => {
                    let dst = self.new_register();
                    self.emit(func, block, Op::func_literal(dst, fname));
                    (block, dst)
                }
                None => {
                    self.error(e.span, format!("{name} is not in scope"));
                    // Invent a fresh, uninitialized register so later passes
                    // still have something to allocate (spec.md §4.A).
                    let dst = self.new_register();
                    self.emit(func, block, Op::literal(dst, 0));
                    (block, dst)
                }
            },
            ExprKind::Int(n) => {
                let dst = self.new_register();
                self.emit(func, block, Op::literal(dst, *n));
                (block, dst)
            }
            ExprKind::Bool(b) => {
                let dst = self.new_register();
                self.emit(func, block, Op::literal(dst, if *b { 1 } else { 0 }));
                (block, dst)
            }
            ExprKind::BinOp { op, lhs, rhs } => {
                let (block, l) = self.visit_expr(scope, func, block, lhs);
                let (block, r) = self.visit_expr(scope, func, block, rhs);
                let dst = self.new_register();
                // Comparison variants still emit `binop` (not `compare`) in
                // value context; the selector lowers this one to
                // `cmpq; setCC; movzbq` (spec.md §4.C, §4.D).
                self.emit(func, block, Op::binop(*op, dst, l, r));
                (block, dst)
            }
            ExprKind::And(..) | ExprKind::Or(..) => self.visit_short_circuit_value(scope, func, block, e),
            ExprKind::Call { callee, args } => {
                let (block, callee_reg) = self.visit_expr(scope, func, block, callee);
                let mut block = block;
                let mut arg_regs = Vec::with_capacity(args.len());
                for a in args {
                    let (b2, r) = self.visit_expr(scope, func, block, a);
                    block = b2;
                    arg_regs.push(r);
                }
                let dst = self.new_register();
                self.emit(func, block, Op::call(dst, callee_reg, arg_regs));
                (block, dst)
            }
            ExprKind::Dot(..) => crate::common::bug("Dot survived type-checking; it should always be a type error"),
            ExprKind::Let { name, value, body } => {
                let (block, v) = self.visit_expr(scope, func, block, value);
                scope.push();
                scope.define(*name, Binding::Value(v));
                let (block, r) = self.visit_expr(scope, func, block, body);
                scope.pop();
                (block, r)
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                let then_blk = self.add_block_named(func, "then");
                let else_blk = self.add_block_named(func, "else");
                self.visit_cond(scope, func, block, cond, then_blk, else_blk);

                let (then_end, then_val) = self.visit_expr(scope, func, then_blk, then_branch);
                let (else_end, else_val) = self.visit_expr(scope, func, else_blk, else_branch);

                let join = self.add_block_named(func, "continuation");
                let result = self.new_register();
                self.funcs[func].block_mut(join).args.push(result);

                self.emit(func, then_end, Op::jump(self.funcs[func].block(join).name, vec![then_val]));
                self.emit(func, else_end, Op::jump(self.funcs[func].block(join).name, vec![else_val]));
                self.add_edge(func, then_end, join);
                self.add_edge(func, else_end, join);

                (join, result)
            }
            ExprKind::Func { name, params, body } => {
                let (inner_idx, func_name) = self.lower_function(*name, params, body);
                let dst = self.new_register();
                self.emit(func, block, Op::func_literal(dst, func_name));
                debug_assert!(inner_idx < self.funcs.len());
                (block, dst)
            }
            ExprKind::Tuple(elems) => {
                let mut block = block;
                let mut elem_regs = Vec::with_capacity(elems.len());
                for elem in elems {
                    let (b2, r) = self.visit_expr(scope, func, block, elem);
                    block = b2;
                    elem_regs.push(r);
                }
                let len_reg = self.new_register();
                self.emit(func, block, Op::literal(len_reg, elems.len() as i64));
                let mask_reg = self.new_register();
                // Pointer mask: always zero for now (glossary: placeholder
                // for future type info).
                self.emit(func, block, Op::literal(mask_reg, 0));
                let tuple_reg = self.new_register();
                self.emit(func, block, Op::call_runtime(tuple_reg, NEWTUPLE_SYMBOL, vec![len_reg, mask_reg]));
                for (i, r) in elem_regs.into_iter().enumerate() {
                    self.emit(func, block, Op::record_set(tuple_reg, r, i as i64));
                }
                (block, tuple_reg)
            }
            ExprKind::TupleIndex { base, index } => {
                let (block, base_reg) = self.visit_expr(scope, func, block, base);
                let dst = self.new_register();
                self.emit(func, block, Op::record_get(dst, base_reg, *index as i64));
                (block, dst)
            }
        }
    }

    /// `and`/`or` compiled as a value: branch into a `then`/`else` pair via
    /// `visit_cond`, then join the two boolean literals they produce
    /// (spec.md §4.C).
    fn visit_short_circuit_value(&mut self, scope: &mut BuildScope, func: usize, block: BlockId, e: &Expr) -> (BlockId, Register) {
        let then_blk = self.add_block_named(func, "then");
        let else_blk = self.add_block_named(func, "else");
        self.visit_cond(scope, func, block, e, then_blk, else_blk);

        let join = self.add_block_named(func, "continuation");
        let result = self.new_register();
        self.funcs[func].block_mut(join).args.push(result);

        let true_reg = self.new_register();
        self.emit(func, then_blk, Op::literal(true_reg, 1));
        self.emit(func, then_blk, Op::jump(self.funcs[func].block(join).name, vec![true_reg]));
        self.add_edge(func, then_blk, join);

        let false_reg = self.new_register();
        self.emit(func, else_blk, Op::literal(false_reg, 0));
        self.emit(func, else_blk, Op::jump(self.funcs[func].block(join).name, vec![false_reg]));
        self.add_edge(func, else_blk, join);

        (join, result)
    }

    fn lower_function(&mut self, name: Option<Id>, params: &[Id], body: &Expr) -> (usize, Id) {
        let internal_name = match name {
            Some(n) => intern(format!("{n}_{}", self.next_label)),
            None => intern(format!("lambda_{}", self.next_label)),
        };
        self.next_label += 1;

        let func_idx = self.start_function(internal_name);
        let entry = BlockId(0);

        let mut inner_scope = BuildScope::new();
        if let Some(n) = name {
            inner_scope.define(n, Binding::Function(internal_name));
        }
        let mut param_regs = Vec::with_capacity(params.len());
        for p in params {
            let r = self.new_register();
            inner_scope.define(*p, Binding::Value(r));
            param_regs.push(r);
        }
        self.funcs[func_idx].block_mut(entry).args = param_regs;

        let (final_block, result) = self.visit_expr(&mut inner_scope, func_idx, entry, body);
        self.emit(func_idx, final_block, Op::ret(result));

        (func_idx, internal_name)
    }

    // ---------------------------------------------------------------
    // Condition context
    // ---------------------------------------------------------------

    /// Compile `e` as a condition: emit terminators in `block` (and any
    /// blocks created along the way) that branch to `then_blk`/`else_blk`.
    fn visit_cond(&mut self, scope: &mut BuildScope, func: usize, block: BlockId, e: &Expr, then_blk: BlockId, else_blk: BlockId) {
        match &e.kind {
            ExprKind::Bool(b) => {
                let target = if *b { then_blk } else { else_blk };
                let name = self.funcs[func].block(target).name;
                self.emit(func, block, Op::jump(name, vec![]));
                self.add_edge(func, block, target);
            }
            ExprKind::BinOp { op, lhs, rhs } if op.is_comparison() => {
                let (block, l) = self.visit_expr(scope, func, block, lhs);
                let (block, r) = self.visit_expr(scope, func, block, rhs);
                self.emit(func, block, Op::compare(*op, l, r));
                let then_name = self.funcs[func].block(then_blk).name;
                let else_name = self.funcs[func].block(else_blk).name;
                self.emit(func, block, Op::branch_flags(*op, then_name, else_name));
                self.add_edge(func, block, then_blk);
                self.add_edge(func, block, else_blk);
            }
            ExprKind::Var(name) => match scope.lookup(*name).copied() {
                Some(Binding::Value(r)) => self.emit_branch_bool(func, block, r, then_blk, else_blk),
                Some(Binding::Function(_)) => {
                    // A bare function reference is always truthy; still
                    // routes through visit_expr so a `func_literal` op gets
                    // emitted for any side effects future passes may add.
                    let (block, r) = self.visit_expr(scope, func, block, e);
                    self.emit_branch_bool(func, block, r, then_blk, else_blk);
                }
                None => {
                    self.error(e.span, format!("{name} is not in scope"));
                    let name = self.funcs[func].block(else_blk).name;
                    self.emit(func, block, Op::jump(name, vec![]));
                    self.add_edge(func, block, else_blk);
                }
            },
            ExprKind::And(l, r) => {
                // a and b: if a is false, short-circuit straight to else.
                // When `a` is a statically-known boolean (spec.md §8: "a
                // and b where a is false statically never evaluates b"),
                // fold it here rather than emitting a dead `mid` block
                // that would still lower `b`'s subtree into the output.
                if let ExprKind::Bool(a) = l.kind {
                    if a {
                        self.visit_cond(scope, func, block, r, then_blk, else_blk);
                    } else {
                        let name = self.funcs[func].block(else_blk).name;
                        self.emit(func, block, Op::jump(name, vec![]));
                        self.add_edge(func, block, else_blk);
                    }
                    return;
                }
                let mid = self.add_block_named(func, "and");
                self.visit_cond(scope, func, block, l, mid, else_blk);
                self.visit_cond(scope, func, mid, r, then_blk, else_blk);
            }
            ExprKind::Or(l, r) => {
                // a or b: if a is true, short-circuit straight to then.
                // Same static folding as `And` above, dually.
                if let ExprKind::Bool(a) = l.kind {
                    if a {
                        let name = self.funcs[func].block(then_blk).name;
                        self.emit(func, block, Op::jump(name, vec![]));
                        self.add_edge(func, block, then_blk);
                    } else {
                        self.visit_cond(scope, func, block, r, then_blk, else_blk);
                    }
                    return;
                }
                let mid = self.add_block_named(func, "or");
                self.visit_cond(scope, func, block, l, then_blk, mid);
                self.visit_cond(scope, func, mid, r, then_blk, else_blk);
            }
            ExprKind::If { cond, then_branch, else_branch } => {
                // Nested if in condition context: recurse without ever
                // materializing a boolean for the outer condition.
                let inner_then = self.add_block_named(func, "then");
                let inner_else = self.add_block_named(func, "else");
                self.visit_cond(scope, func, block, cond, inner_then, inner_else);
                self.visit_cond(scope, func, inner_then, then_branch, then_blk, else_blk);
                self.visit_cond(scope, func, inner_else, else_branch, then_blk, else_blk);
            }
            ExprKind::Let { name, value, body } => {
                let (block, v) = self.visit_expr(scope, func, block, value);
                scope.push();
                scope.define(*name, Binding::Value(v));
                self.visit_cond(scope, func, block, body, then_blk, else_blk);
                scope.pop();
            }
            _ => {
                // Anything else (calls, tuple index, arithmetic-valued
                // expressions, ...) has to be materialized as a value and
                // then tested.
                let (block, r) = self.visit_expr(scope, func, block, e);
                self.emit_branch_bool(func, block, r, then_blk, else_blk);
            }
        }
    }

    fn emit_branch_bool(&mut self, func: usize, block: BlockId, cond: Register, then_blk: BlockId, else_blk: BlockId) {
        let then_name = self.funcs[func].block(then_blk).name;
        let else_name = self.funcs[func].block(else_blk).name;
        self.emit(func, block, Op::branch_bool(cond, then_name, else_name));
        self.add_edge(func, block, then_blk);
        self.add_edge(func, block, else_blk);
    }
}
