//! The abstract syntax tree.
//!
//! A program is a single expression. The AST is immutable once it leaves
//! the parser: the uncover-bools and uncover-tuples passes (see
//! `front::uncover`) build a fresh tree rather than mutate this one.

use crate::common::{Id, Span};
use derive_more::Display;

/// Binary arithmetic and comparison operators.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum BOp {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

impl BOp {
    /// Arithmetic operators produce an `Int`; comparisons produce a `Bool`.
    pub fn is_comparison(self) -> bool {
        matches!(self, BOp::Eq | BOp::Ne | BOp::Lt | BOp::Le | BOp::Gt | BOp::Ge)
    }

    /// The textual variant name used on IR `binop`/`compare` ops (spec.md §3).
    pub fn variant(self) -> &'static str {
        match self {
            BOp::Add => "+",
            BOp::Sub => "-",
            BOp::Mul => "*",
            BOp::Div => "/",
            BOp::Eq => "eq",
            BOp::Ne => "ne",
            BOp::Lt => "<",
            BOp::Le => "<=",
            BOp::Gt => ">",
            BOp::Ge => ">=",
        }
    }
}

/// An expression node, tagged with the byte offset it started at (used for
/// diagnostics by the type checker and name resolver).
#[derive(Debug)]
pub struct Expr {
    pub span: Span,
    pub kind: ExprKind,
}

impl Expr {
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Expr { span, kind }
    }
}

/// A single sum type for every expression form, so that every pass below
/// matches it exhaustively and the compiler enforces coverage of new forms.
#[derive(Debug)]
pub enum ExprKind {
    Var(Id),
    Int(i64),
    /// Introduced only by the uncover-bools pass; the parser never produces
    /// this directly (`true`/`false` parse as `Var`).
    Bool(bool),
    BinOp {
        op: BOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Field access (`e.name`). Not produced by any currently-typeable
    /// program in this language (no record types), but retained at the AST
    /// level per spec.md §3 ("field-access (dot)"); the type checker
    /// rejects it as a user error since no value ever has a record type
    /// with named fields.
    Dot(Box<Expr>, Id),
    Let {
        name: Id,
        value: Box<Expr>,
        body: Box<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    Func {
        name: Option<Id>,
        params: Vec<Id>,
        body: Box<Expr>,
    },
    /// Introduced only by the uncover-tuples pass; the parser produces
    /// `Call(Var("tuple"), args)` instead.
    Tuple(Vec<Expr>),
    /// Introduced only by the uncover-tuples pass; the parser produces
    /// `Call(Var("get"), [base, Int(n)])` instead.
    TupleIndex {
        base: Box<Expr>,
        index: usize,
    },
}
