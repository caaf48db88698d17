//! The middle end: lowering a type-checked AST to the typed three-address
//! CFG IR consumed by the back end (spec.md §3, §4.C).

pub mod build;
pub mod ir;
pub mod scope;

pub use build::{lower, LowerResult};
pub use ir::{Block, BlockId, Function, Label, Literal, Op, Opcode, Program, Register};
