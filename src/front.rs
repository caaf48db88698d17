//! The front-end of the compiler: lexing, parsing, name/type checking, and
//! the uncover-bools/uncover-tuples rewrites. Specified only at its
//! interface with the core (spec.md §1): it must hand the middle end a
//! well-scoped, well-typed `Expr` tree, or an `ErrorList`.

pub mod ast;
pub mod lex;
pub mod parse;
pub mod print;
pub mod typeck;
pub mod uncover;

pub use ast::{BOp, Expr, ExprKind};
pub use parse::{parse, ParseError};
pub use typeck::{typecheck, Type};
pub use uncover::uncover;
