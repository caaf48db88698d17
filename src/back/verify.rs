//! Machine-legality verification (spec.md §4.J): reject any mnemonic
//! outside [`ALLOWED_MNEMONICS`] before emission. A failure here is a
//! compiler bug (spec.md §7 taxon 2) — instruction selection must only
//! ever produce legal instructions; a verifier rejection means a selector
//! bug, not a problem with the user's source.

use super::asm::{AsmFunction, AsmOpKind, ALLOWED_MNEMONICS};

/// Scan every instruction in every block of `func`. Panics (a compiler
/// bug, never triggered by valid selector output) on the first mnemonic
/// outside the allowed set, or on a non-`Instr` op carrying a stray
/// mnemonic (spec.md §4.J: "Non-`instr` ops must have empty `mnemonic`
/// except `jump`, which stores the condition-code suffix in `variant`").
pub fn verify_function(func: &AsmFunction) {
    for block in &func.blocks {
        for op in &block.code {
            match op.kind {
                AsmOpKind::Instr => {
                    if !ALLOWED_MNEMONICS.contains(&op.mnemonic.as_str()) {
                        crate::common::bug(format!("illegal mnemonic `{}` in function {}", op.mnemonic, func.name));
                    }
                }
                AsmOpKind::Jump | AsmOpKind::Call => {
                    if !op.mnemonic.is_empty() {
                        crate::common::bug(format!("{:?} op carries a stray mnemonic `{}`", op.kind, op.mnemonic));
                    }
                }
            }
        }
    }
}

pub fn verify_program(program: &super::asm::AsmProgram) {
    for func in &program.funcs {
        verify_function(func);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::back::asm::{AsmArg, AsmBlock, AsmFunction, AsmOp};
    use crate::common::intern;
    use crate::middle::Label;

    #[test]
    fn accepts_allowed_mnemonics() {
        let func = AsmFunction {
            name: intern("f"),
            blocks: vec![AsmBlock {
                name: Label(intern("entry")),
                code: vec![AsmOp::instr("movq", vec![AsmArg::Reg(crate::back::asm::PhysReg::Rcx), AsmArg::Imm(1)])],
            }],
            stacksize: 0,
            is_entry: false,
        };
        verify_function(&func);
    }

    #[test]
    #[should_panic(expected = "illegal mnemonic")]
    fn rejects_unknown_mnemonic() {
        let func = AsmFunction {
            name: intern("f"),
            blocks: vec![AsmBlock {
                name: Label(intern("entry")),
                code: vec![AsmOp::instr("leaq", vec![AsmArg::Reg(crate::back::asm::PhysReg::Rcx), AsmArg::Imm(1)])],
            }],
            stacksize: 0,
            is_entry: false,
        };
        verify_function(&func);
    }
}
