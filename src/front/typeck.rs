//! The type checker (spec.md §4.N, grounded on `original_source/types.go`).
//!
//! Structural types over `Int | Bool | Func | Tuple | Any`. `Any` is
//! returned alongside an error so checking of the surrounding expression
//! can continue instead of aborting at the first problem, matching the
//! original source's `AnyT{}` fallback.

use std::rc::Rc;

use crate::common::{CompileError, ErrorList, Scope};

use super::ast::{BOp, Expr, ExprKind};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Int,
    Bool,
    Func(Vec<Type>, Rc<Type>),
    Tuple(Vec<Type>),
    /// Standing in for "checking already failed here"; never equal to
    /// itself in a way that produces cascading errors (see `unify`).
    Any,
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
            Type::Func(params, ret) => {
                write!(f, "func(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            Type::Any => write!(f, "?"),
        }
    }
}

/// Type-check `e`, returning the program's type or the list of user errors
/// found. Checking does not stop at the first error: as many as possible
/// are collected before returning `Err`.
pub fn typecheck(e: &Expr) -> Result<Type, ErrorList> {
    let mut errors = ErrorList::new();
    let mut scope = Scope::new();
    let ty = check(&mut scope, &mut errors, e);
    if errors.is_empty() {
        Ok(ty)
    } else {
        Err(errors)
    }
}

fn check(scope: &mut Scope<Type>, errors: &mut ErrorList, e: &Expr) -> Type {
    match &e.kind {
        ExprKind::Var(name) => match scope.lookup(*name) {
            Some(t) => t.clone(),
            None => {
                errors.push(CompileError::new(Some(e.span), format!("{name} is not in scope")));
                Type::Any
            }
        },
        ExprKind::Int(_) => Type::Int,
        ExprKind::Bool(_) => Type::Bool,
        ExprKind::BinOp { op, lhs, rhs } => {
            let lt = check(scope, errors, lhs);
            let rt = check(scope, errors, rhs);
            if !matches!(lt, Type::Any) && lt != Type::Int {
                errors.push(CompileError::new(Some(lhs.span), format!("left operand of {op} must be Int, found {lt}")));
            }
            if !matches!(rt, Type::Any) && rt != Type::Int {
                errors.push(CompileError::new(Some(rhs.span), format!("right operand of {op} must be Int, found {rt}")));
            }
            if op.is_comparison() {
                Type::Bool
            } else {
                Type::Int
            }
        }
        ExprKind::And(l, r) | ExprKind::Or(l, r) => {
            let lt = check(scope, errors, l);
            let rt = check(scope, errors, r);
            if !matches!(lt, Type::Any) && lt != Type::Bool {
                errors.push(CompileError::new(Some(l.span), format!("operand must be Bool, found {lt}")));
            }
            if !matches!(rt, Type::Any) && rt != Type::Bool {
                errors.push(CompileError::new(Some(r.span), format!("operand must be Bool, found {rt}")));
            }
            Type::Bool
        }
        ExprKind::Dot(base, field) => {
            check(scope, errors, base);
            errors.push(CompileError::new(
                Some(e.span),
                format!("field access `.{field}` is not supported (the language has no record types)"),
            ));
            Type::Any
        }
        ExprKind::Let { name, value, body } => {
            let vt = check(scope, errors, value);
            scope.push();
            scope.define(*name, vt);
            let bt = check(scope, errors, body);
            scope.pop();
            bt
        }
        ExprKind::If { cond, then_branch, else_branch } => {
            let ct = check(scope, errors, cond);
            if !matches!(ct, Type::Any) && ct != Type::Bool {
                errors.push(CompileError::new(Some(cond.span), format!("if condition must be Bool, found {ct}")));
            }
            let tt = check(scope, errors, then_branch);
            let ft = check(scope, errors, else_branch);
            unify(errors, e.span, tt, ft)
        }
        ExprKind::Func { name, params, body } => {
            // Parameters are Any: this language has no type annotations, so
            // parameter types are not known ahead of checking the body. A
            // fully inferred Hindley-Milner checker is out of scope; this
            // mirrors the original source's untyped-parameter treatment.
            scope.push();
            if let Some(n) = name {
                // Recursive calls resolve against a placeholder Func type;
                // real call-site checking is therefore arity-only for
                // recursive calls (see `ExprKind::Call` below).
                scope.define(
                    *n,
                    Type::Func(params.iter().map(|_| Type::Any).collect(), Rc::new(Type::Any)),
                );
            }
            for p in params {
                scope.define(*p, Type::Any);
            }
            let body_ty = check(scope, errors, body);
            scope.pop();
            Type::Func(params.iter().map(|_| Type::Any).collect(), Rc::new(body_ty))
        }
        ExprKind::Call { callee, args } => {
            let ct = check(scope, errors, callee);
            let arg_types: Vec<Type> = args.iter().map(|a| check(scope, errors, a)).collect();
            match ct {
                Type::Func(params, ret) => {
                    if params.len() != arg_types.len() {
                        errors.push(CompileError::new(
                            Some(e.span),
                            format!("call expects {} argument(s), found {}", params.len(), arg_types.len()),
                        ));
                    }
                    (*ret).clone()
                }
                Type::Any => Type::Any,
                other => {
                    errors.push(CompileError::new(Some(callee.span), format!("cannot call a value of type {other}")));
                    Type::Any
                }
            }
        }
        ExprKind::Tuple(elems) => Type::Tuple(elems.iter().map(|e| check(scope, errors, e)).collect()),
        ExprKind::TupleIndex { base, index } => {
            let bt = check(scope, errors, base);
            match bt {
                Type::Tuple(elems) => match elems.get(*index) {
                    Some(t) => t.clone(),
                    None => {
                        errors.push(CompileError::new(
                            Some(e.span),
                            format!("tuple index {index} out of range for a {}-element tuple", elems.len()),
                        ));
                        Type::Any
                    }
                },
                Type::Any => Type::Any,
                other => {
                    errors.push(CompileError::new(Some(base.span), format!("first argument to `get` must be a tuple, found {other}")));
                    Type::Any
                }
            }
        }
    }
}

/// Combine the types of an `if`'s two branches. Disagreement is a user
/// error; `Any` on either side suppresses a cascading report.
fn unify(errors: &mut ErrorList, span: crate::common::Span, a: Type, b: Type) -> Type {
    if matches!(a, Type::Any) {
        return b;
    }
    if matches!(b, Type::Any) {
        return a;
    }
    if a == b {
        a
    } else {
        errors.push(CompileError::new(Some(span), format!("if branches have different types: {a} vs {b}")));
        Type::Any
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::{parse::parse, uncover::uncover};

    fn ty(src: &str) -> Result<Type, ErrorList> {
        typecheck(&uncover(parse(src).unwrap()))
    }

    #[test]
    fn arithmetic_is_well_typed() {
        assert_eq!(ty("1 + 2 * 3").unwrap(), Type::Int);
    }

    #[test]
    fn if_of_equal_branch_types_is_well_typed() {
        assert_eq!(ty("if 2 < 1 then 100 else 42 end").unwrap(), Type::Int);
    }

    #[test]
    fn mismatched_if_branches_is_an_error() {
        assert!(ty("if true then 1 else false end").is_err());
    }

    #[test]
    fn non_literal_get_index_is_an_error() {
        // `get`'s second argument did not uncover to a TupleIndex (it
        // wasn't a literal), so it's still a plain call to an unbound
        // name `get` -- a scope error, not a tuple-shape error.
        assert!(ty("let n = 1 in get(tuple(1, 2), n) end").is_err());
    }

    #[test]
    fn out_of_range_tuple_index_is_an_error() {
        assert!(ty("get(tuple(1, 2), 5)").is_err());
    }

    #[test]
    fn recursive_function_name_is_bound_in_its_own_body() {
        assert!(ty("let f = func f(n) if n < 1 then 0 else n + f(n - 1) end end in f(3) end").is_ok());
    }
}
