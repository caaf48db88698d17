//! Name resolution for the IR builder (spec.md §4.A).
//!
//! A thin wrapper around [`crate::common::Scope`] that also records *why* a
//! name resolved the way it did: a `let`/parameter binding names a register
//! that already holds its value, while a recursive function's own name
//! names the function itself (a `func_literal` must be (re-)materialized at
//! each use, since a function's address is not a plain value the builder
//! ever puts in a register ahead of time).

use crate::common::{Id, Scope};
use crate::middle::ir::Register;

#[derive(Clone, Copy, Debug)]
pub enum Binding {
    Value(Register),
    Function(Id),
}

pub type BuildScope = Scope<Binding>;
