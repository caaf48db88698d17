//! The back end: instruction selection, liveness, register allocation,
//! home assignment, patching, legality verification, and AT&T emission
//! (spec.md §4.D–§4.J). `compile_ir` drives the whole pipeline in the
//! order spec.md §6 lays out.

pub mod asm;
pub mod emit;
pub mod home;
pub mod liveness;
pub mod patch;
pub mod regalloc;
pub mod select;
pub mod verify;

use crate::middle::ir;

/// Run every back-end pass over a lowered [`ir::Program`] and return its
/// AT&T assembly text. Mirrors `driver::compile`'s middle-to-back-end
/// segment (spec.md §6): select → verify → (per function) liveness →
/// regalloc → home assignment → patch, then emit the whole program.
pub fn compile_ir(program: &ir::Program) -> String {
    let mut asm_program = select::select_program(program);
    verify::verify_program(&asm_program);
    for func in &mut asm_program.funcs {
        log::trace!("allocating registers for {}", func.name);
        let live = liveness::analyze(func);
        let colors = regalloc::allocate(func, &live);
        home::assign_homes(func, &colors);
        patch::patch_function(func);
    }
    emit::emit_program(&asm_program)
}
