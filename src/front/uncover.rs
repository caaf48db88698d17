//! The uncover-bools and uncover-tuples passes (spec.md §4.O,
//! `original_source/front.go`).
//!
//! Both passes are scope-aware tree rewrites that run before type-checking
//! so the checker (and later, the IR builder) never has to special-case a
//! bare `Var("true")` or `Call(Var("tuple"), ..)`. Shadowing a builtin name
//! with a `let` or function parameter turns it back into an ordinary
//! variable/call, exactly as the original source's `uncoverTupleBuiltins`
//! does.

use crate::common::{intern, Scope};

use super::ast::{Expr, ExprKind};

/// Replace any unshadowed `true`/`false` variable reference with a `Bool`
/// literal.
pub fn uncover_bools(e: Expr) -> Expr {
    let mut scope = Scope::new();
    walk_bools(&mut scope, e)
}

fn walk_bools(scope: &mut Scope<()>, e: Expr) -> Expr {
    let span = e.span;
    let kind = match e.kind {
        ExprKind::Var(name) if !scope.has(name) && &*name == "true" => ExprKind::Bool(true),
        ExprKind::Var(name) if !scope.has(name) && &*name == "false" => ExprKind::Bool(false),
        ExprKind::Var(name) => ExprKind::Var(name),
        ExprKind::Int(n) => ExprKind::Int(n),
        ExprKind::Bool(b) => ExprKind::Bool(b),
        ExprKind::BinOp { op, lhs, rhs } => ExprKind::BinOp {
            op,
            lhs: Box::new(walk_bools(scope, *lhs)),
            rhs: Box::new(walk_bools(scope, *rhs)),
        },
        ExprKind::And(l, r) => ExprKind::And(Box::new(walk_bools(scope, *l)), Box::new(walk_bools(scope, *r))),
        ExprKind::Or(l, r) => ExprKind::Or(Box::new(walk_bools(scope, *l)), Box::new(walk_bools(scope, *r))),
        ExprKind::Call { callee, args } => ExprKind::Call {
            callee: Box::new(walk_bools(scope, *callee)),
            args: args.into_iter().map(|a| walk_bools(scope, a)).collect(),
        },
        ExprKind::Dot(base, field) => ExprKind::Dot(Box::new(walk_bools(scope, *base)), field),
        ExprKind::Let { name, value, body } => {
            let value = walk_bools(scope, *value);
            scope.push();
            scope.define(name, ());
            let body = walk_bools(scope, *body);
            scope.pop();
            ExprKind::Let { name, value: Box::new(value), body: Box::new(body) }
        }
        ExprKind::If { cond, then_branch, else_branch } => ExprKind::If {
            cond: Box::new(walk_bools(scope, *cond)),
            then_branch: Box::new(walk_bools(scope, *then_branch)),
            else_branch: Box::new(walk_bools(scope, *else_branch)),
        },
        ExprKind::Func { name, params, body } => {
            scope.push();
            if let Some(n) = name {
                scope.define(n, ());
            }
            for p in &params {
                scope.define(*p, ());
            }
            let body = walk_bools(scope, *body);
            scope.pop();
            ExprKind::Func { name, params, body: Box::new(body) }
        }
        ExprKind::Tuple(args) => ExprKind::Tuple(args.into_iter().map(|a| walk_bools(scope, a)).collect()),
        ExprKind::TupleIndex { base, index } => {
            ExprKind::TupleIndex { base: Box::new(walk_bools(scope, *base)), index }
        }
    };
    Expr::new(span, kind)
}

/// Replace `tuple(args...)` and `get(base, N)` calls with dedicated AST
/// nodes, when `tuple`/`get` are unshadowed.
pub fn uncover_tuples(e: Expr) -> Expr {
    let mut scope = Scope::new();
    walk_tuples(&mut scope, e)
}

fn walk_tuples(scope: &mut Scope<()>, e: Expr) -> Expr {
    let span = e.span;
    let kind = match e.kind {
        ExprKind::Call { callee, args } => {
            if let ExprKind::Var(name) = &callee.kind {
                if !scope.has(*name) && &**name == "tuple" {
                    return Expr::new(
                        span,
                        ExprKind::Tuple(args.into_iter().map(|a| walk_tuples(scope, a)).collect()),
                    );
                }
                if !scope.has(*name) && &**name == "get" && args.len() == 2 {
                    if let ExprKind::Int(n) = args[1].kind {
                        if n >= 0 {
                            let mut args = args;
                            let base = args.remove(0);
                            return Expr::new(
                                span,
                                ExprKind::TupleIndex {
                                    base: Box::new(walk_tuples(scope, base)),
                                    index: n as usize,
                                },
                            );
                        }
                    }
                }
            }
            ExprKind::Call {
                callee: Box::new(walk_tuples(scope, *callee)),
                args: args.into_iter().map(|a| walk_tuples(scope, a)).collect(),
            }
        }
        ExprKind::Var(name) => ExprKind::Var(name),
        ExprKind::Int(n) => ExprKind::Int(n),
        ExprKind::Bool(b) => ExprKind::Bool(b),
        ExprKind::BinOp { op, lhs, rhs } => ExprKind::BinOp {
            op,
            lhs: Box::new(walk_tuples(scope, *lhs)),
            rhs: Box::new(walk_tuples(scope, *rhs)),
        },
        ExprKind::And(l, r) => ExprKind::And(Box::new(walk_tuples(scope, *l)), Box::new(walk_tuples(scope, *r))),
        ExprKind::Or(l, r) => ExprKind::Or(Box::new(walk_tuples(scope, *l)), Box::new(walk_tuples(scope, *r))),
        ExprKind::Dot(base, field) => ExprKind::Dot(Box::new(walk_tuples(scope, *base)), field),
        ExprKind::Let { name, value, body } => {
            let value = walk_tuples(scope, *value);
            scope.push();
            scope.define(name, ());
            let body = walk_tuples(scope, *body);
            scope.pop();
            ExprKind::Let { name, value: Box::new(value), body: Box::new(body) }
        }
        ExprKind::If { cond, then_branch, else_branch } => ExprKind::If {
            cond: Box::new(walk_tuples(scope, *cond)),
            then_branch: Box::new(walk_tuples(scope, *then_branch)),
            else_branch: Box::new(walk_tuples(scope, *else_branch)),
        },
        ExprKind::Func { name, params, body } => {
            scope.push();
            if let Some(n) = name {
                scope.define(n, ());
            }
            for p in &params {
                scope.define(*p, ());
            }
            let body = walk_tuples(scope, *body);
            scope.pop();
            ExprKind::Func { name, params, body: Box::new(body) }
        }
        ExprKind::Tuple(args) => ExprKind::Tuple(args.into_iter().map(|a| walk_tuples(scope, a)).collect()),
        ExprKind::TupleIndex { base, index } => {
            ExprKind::TupleIndex { base: Box::new(walk_tuples(scope, *base)), index }
        }
    };
    Expr::new(span, kind)
}

/// Run both uncover passes in sequence, as the driver does (spec.md §6).
pub fn uncover(e: Expr) -> Expr {
    uncover_tuples(uncover_bools(e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse::parse;

    #[test]
    fn uncovers_true_and_false() {
        let e = uncover_bools(parse("if true then 1 else 0 end").unwrap());
        match e.kind {
            ExprKind::If { cond, .. } => assert!(matches!(cond.kind, ExprKind::Bool(true))),
            _ => panic!(),
        }
    }

    #[test]
    fn shadowed_true_is_not_uncovered() {
        let e = uncover_bools(parse("let true = 1 in true end").unwrap());
        match e.kind {
            ExprKind::Let { body, .. } => assert!(matches!(body.kind, ExprKind::Var(_))),
            _ => panic!(),
        }
    }

    #[test]
    fn uncovers_tuple_and_get() {
        let e = uncover(parse("get(tuple(1, 42, 3), 1)").unwrap());
        match e.kind {
            ExprKind::TupleIndex { base, index } => {
                assert_eq!(index, 1);
                assert!(matches!(base.kind, ExprKind::Tuple(_)));
            }
            _ => panic!("expected a tuple index node"),
        }
    }

    #[test]
    fn shadowed_get_stays_a_call() {
        let e = uncover(parse("let get = func get(a, b) a end in get(1, 2) end").unwrap());
        match e.kind {
            ExprKind::Let { body, .. } => assert!(matches!(body.kind, ExprKind::Call { .. })),
            _ => panic!(),
        }
    }
}
