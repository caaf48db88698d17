//! Surface-syntax printer for the AST (spec.md §4.P), used by `--emit ast`
//! and in test failure messages. Grounded on `original_source/format.go`'s
//! `#tuple(...)` printer.

use std::fmt;

use super::ast::{Expr, ExprKind};

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Var(name) => write!(f, "{name}"),
            ExprKind::Int(n) => write!(f, "{n}"),
            ExprKind::Bool(b) => write!(f, "{b}"),
            ExprKind::BinOp { op, lhs, rhs } => write!(f, "({lhs} {op} {rhs})"),
            ExprKind::And(l, r) => write!(f, "({l} and {r})"),
            ExprKind::Or(l, r) => write!(f, "({l} or {r})"),
            ExprKind::Call { callee, args } => {
                write!(f, "{callee}(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{a}")?;
                }
                write!(f, ")")
            }
            ExprKind::Dot(base, field) => write!(f, "{base}.{field}"),
            ExprKind::Let { name, value, body } => write!(f, "let {name} = {value} in {body} end"),
            ExprKind::If { cond, then_branch, else_branch } => {
                write!(f, "if {cond} then {then_branch} else {else_branch} end")
            }
            ExprKind::Func { name, params, body } => {
                write!(f, "func {}(", name.map(|n| n.to_string()).unwrap_or_default())?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") {body} end")
            }
            ExprKind::Tuple(elems) => {
                write!(f, "#tuple(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            ExprKind::TupleIndex { base, index } => write!(f, "get({base}, {index})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::front::parse::parse;

    #[test]
    fn reprints_surface_syntax() {
        let e = parse("let x = 1 in x + 2 end").unwrap();
        assert_eq!(e.to_string(), "let x = 1 in (x + 2) end");
    }
}
