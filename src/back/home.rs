//! Home assignment (spec.md §4.G): map each variable's color to a
//! physical register or an 8-byte stack slot, size the frame, and
//! prepend/append the `subq`/`addq %rsp` frame instructions.

use crate::common::Map;
use crate::middle::Register;

use super::asm::{AsmArg, AsmFunction, AsmOp, WORD_SIZE};
use super::regalloc::{color_register, ColorMap};

/// Walks `func` once, replacing every [`AsmArg::Var`] with a concrete
/// register or stack-relative memory operand, then pads and records
/// `stacksize` and prepends/appends the frame `subq`/`addq` pair.
pub fn assign_homes(func: &mut AsmFunction, colors: &ColorMap) {
    let mut slots: Map<Register, i32> = Map::new();
    let mut next_offset: i32 = 0;

    for block in &mut func.blocks {
        for op in &mut block.code {
            for arg in &mut op.args {
                home_one(arg, colors, &mut slots, &mut next_offset);
            }
        }
    }

    // Pad to a 16-byte multiple (System V alignment requirement at call
    // sites, spec.md §4.G).
    let mut stacksize = next_offset;
    if stacksize % 16 != 0 {
        stacksize += 16 - (stacksize % 16);
    }
    func.stacksize = stacksize;

    if stacksize > 0 {
        let rsp = AsmArg::Reg(super::asm::PhysReg::Rsp);
        if let Some(entry) = func.blocks.first_mut() {
            entry.code.insert(0, AsmOp::instr("subq", vec![rsp, AsmArg::Imm(stacksize as i64)]));
        }
        if let Some(exit) = func.blocks.iter_mut().find(|b| b.code.iter().any(|op| op.mnemonic == "ret")) {
            let ret_pos = exit.code.iter().position(|op| op.mnemonic == "ret").expect("just checked");
            exit.code.insert(ret_pos, AsmOp::instr("addq", vec![rsp, AsmArg::Imm(stacksize as i64)]));
        }
    }
}

fn home_one(arg: &mut AsmArg, colors: &ColorMap, slots: &mut Map<Register, i32>, next_offset: &mut i32) {
    let AsmArg::Var(r) = *arg else { return };
    let color = *colors.get(&r).unwrap_or_else(|| crate::common::bug(format!("{r} reached home assignment uncolored")));
    if let Some(reg) = color_register(color) {
        *arg = AsmArg::Reg(reg);
        return;
    }
    let offset = *slots.entry(r).or_insert_with(|| {
        *next_offset += WORD_SIZE;
        *next_offset
    });
    *arg = AsmArg::Mem {
        base: super::asm::PhysReg::Rsp,
        disp: offset - WORD_SIZE,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::back::{liveness, regalloc, select};
    use crate::front::{parse::parse, typeck::typecheck, uncover::uncover};
    use crate::middle::build::lower;

    fn compile_function(src: &str) -> AsmFunction {
        let ast = uncover(parse(src).unwrap());
        typecheck(&ast).unwrap();
        let lowered = lower(&ast);
        assert!(lowered.errors.is_empty());
        let program = select::select_program(&lowered.program);
        program.funcs.into_iter().next().unwrap()
    }

    #[test]
    fn stacksize_is_16_byte_aligned() {
        let mut func = compile_function("let x = 5 in let y = x + 7 in let z = x + 1 in z - y end end end");
        let live = liveness::analyze(&func);
        let colors = regalloc::allocate(&func, &live);
        assign_homes(&mut func, &colors);
        assert_eq!(func.stacksize % 16, 0);
    }

    #[test]
    fn no_stack_slots_for_few_live_variables() {
        let mut func = compile_function("let x = 5 in let y = x + 7 in let z = x + 1 in z - y end end end");
        let live = liveness::analyze(&func);
        let colors = regalloc::allocate(&func, &live);
        assign_homes(&mut func, &colors);
        assert_eq!(func.stacksize, 0);
    }
}
