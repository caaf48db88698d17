//! The patcher (spec.md §4.H): after home assignment, enforce "at most
//! one memory operand per two-operand instruction" by staging one side
//! through the scratch register `%rax`. Grounded on
//! `original_source/asm.go`'s `patchInstructions`, generalized from its
//! single-mnemonic assumption to every two-operand mnemonic this backend
//! emits, with `imul`'s exemption from spec.md §4.H (it accepts memory as
//! its second operand directly).
use super::asm::{AsmArg, AsmFunction, AsmOp, SCRATCH};

pub fn patch_function(func: &mut AsmFunction) {
    for block in &mut func.blocks {
        patch_block(block);
    }
}

fn patch_block(block: &mut super::asm::AsmBlock) {
    let mut patched = Vec::with_capacity(block.code.len());
    for op in block.code.drain(..) {
        patch_op(op, &mut patched);
    }
    block.code = patched;
}

fn patch_op(op: AsmOp, out: &mut Vec<AsmOp>) {
    if op.mnemonic == "imul" || op.args.len() != 2 {
        out.push(op);
        return;
    }
    let dst = op.args[0];
    let src = op.args[1];
    if dst.is_memory() && src.is_memory() {
        let rax = AsmArg::Reg(SCRATCH);
        out.push(AsmOp::instr("movq", vec![rax, src]));
        out.push(AsmOp::instr(op.mnemonic.clone(), vec![dst, rax]));
    } else {
        out.push(op);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::back::asm::{AsmBlock, AsmOpKind, PhysReg};
    use crate::common::intern;
    use crate::middle::Label;

    fn mem(disp: i32) -> AsmArg {
        AsmArg::Mem { base: PhysReg::Rsp, disp }
    }

    #[test]
    fn stages_double_memory_operand_through_rax() {
        let mut func = AsmFunction {
            name: intern("f"),
            blocks: vec![AsmBlock {
                name: Label(intern("entry")),
                code: vec![AsmOp::instr("addq", vec![mem(0), mem(8)])],
            }],
            stacksize: 16,
            is_entry: false,
        };
        patch_function(&mut func);
        let code = &func.blocks[0].code;
        assert_eq!(code.len(), 2);
        assert_eq!(code[0].mnemonic, "movq");
        assert_eq!(code[0].args[0], AsmArg::Reg(SCRATCH));
        assert_eq!(code[1].mnemonic, "addq");
        assert_eq!(code[1].args[1], AsmArg::Reg(SCRATCH));
    }

    #[test]
    fn leaves_single_memory_operand_alone() {
        let mut func = AsmFunction {
            name: intern("f"),
            blocks: vec![AsmBlock {
                name: Label(intern("entry")),
                code: vec![AsmOp::instr("addq", vec![mem(0), AsmArg::Reg(PhysReg::Rcx)])],
            }],
            stacksize: 16,
            is_entry: false,
        };
        patch_function(&mut func);
        assert_eq!(func.blocks[0].code.len(), 1);
    }

    #[test]
    fn imul_is_exempt() {
        let mut func = AsmFunction {
            name: intern("f"),
            blocks: vec![AsmBlock {
                name: Label(intern("entry")),
                code: vec![AsmOp::instr("imul", vec![mem(0), mem(8)])],
            }],
            stacksize: 16,
            is_entry: false,
        };
        patch_function(&mut func);
        assert_eq!(func.blocks[0].code.len(), 1);
    }

    #[test]
    fn jump_and_call_ops_pass_through() {
        let mut func = AsmFunction {
            name: intern("f"),
            blocks: vec![AsmBlock {
                name: Label(intern("entry")),
                code: vec![AsmOp {
                    kind: AsmOpKind::Jump,
                    mnemonic: String::new(),
                    args: vec![],
                    label: Some(Label(intern("next"))),
                    variant: String::new(),
                }],
            }],
            stacksize: 0,
            is_entry: false,
        };
        patch_function(&mut func);
        assert_eq!(func.blocks[0].code.len(), 1);
    }
}
