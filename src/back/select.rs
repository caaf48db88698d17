//! Instruction selection: IR ops to virtual x86-64 assembly (spec.md §4.D).
//!
//! Translates each block's `code` in place, in the sense that the output
//! `AsmBlock` keeps the same name and position as the IR block it came
//! from; `pred`/`succ` are not needed past this point since later passes
//! (liveness, allocation) walk blocks by name/label instead.
//!
//! `func_literal` never emits an instruction (there is no `leaq` in the
//! allowed mnemonic set, and this language never takes a function's
//! address for anything but an immediate call — see DESIGN.md). Instead
//! the selector remembers which register each `func_literal` defined and,
//! on the `call` that consumes it, emits a direct `callq` to that
//! function's symbol.

use crate::common::{bug, Id, Map};
use crate::middle::{ir, Label, Literal, Opcode, Register};

use super::asm::{self, ARG_REGISTERS, AsmArg, AsmBlock, AsmFunction, AsmOp, AsmProgram, Cc};

pub fn select_program(program: &ir::Program) -> AsmProgram {
    let funcs = program.funcs.iter().enumerate().map(|(i, f)| select_function(f, i == 0)).collect();
    AsmProgram { funcs }
}

fn select_function(func: &ir::Function, is_entry: bool) -> AsmFunction {
    let mut literals: Map<Register, i64> = Map::new();
    let mut func_literals: Map<Register, Id> = Map::new();
    for block in &func.blocks {
        for op in &block.code {
            match op.opcode {
                Opcode::Literal => {
                    if let Some(Literal::Int(n)) = &op.value {
                        literals.insert(op.dst[0], *n);
                    }
                }
                Opcode::FuncLiteral => {
                    if let Some(Literal::Func(name)) = &op.value {
                        func_literals.insert(op.dst[0], *name);
                    }
                }
                _ => {}
            }
        }
    }

    let get_operand = |r: Register| -> AsmArg {
        match literals.get(&r) {
            Some(n) => AsmArg::Imm(*n),
            None => AsmArg::Var(r),
        }
    };

    let mut blocks: Vec<AsmBlock> = func
        .blocks
        .iter()
        .map(|block| select_block(func, block, &get_operand, &func_literals))
        .collect();

    // Parameter prologue: the entry block is only ever reached by a
    // `callq`, never a `jump`, so unlike a `jump`'s block arguments
    // (materialized at the call site by `select_jump`) the function's own
    // parameters have to be moved out of the ABI argument registers here,
    // once, at the top of the entry block (spec.md §4.D/§6).
    if let Some(entry) = func.blocks.first() {
        if let Some(entry_asm) = blocks.first_mut() {
            let prologue = param_prologue(&entry.args);
            entry_asm.code.splice(0..0, prologue);
        }
    }

    AsmFunction {
        name: func.name,
        blocks,
        stacksize: 0,
        is_entry,
    }
}

/// `movq param_i, ARG_REGISTERS[i]` for each entry-block parameter.
fn param_prologue(params: &[Register]) -> Vec<AsmOp> {
    if params.len() > ARG_REGISTERS.len() {
        bug("more than 6 function parameters is not supported");
    }
    params
        .iter()
        .zip(ARG_REGISTERS.iter())
        .map(|(param, reg)| AsmOp::instr("movq", vec![AsmArg::Var(*param), AsmArg::Reg(*reg)]))
        .collect()
}

fn select_block(
    func: &ir::Function,
    block: &ir::Block,
    get_operand: &impl Fn(Register) -> AsmArg,
    func_literals: &Map<Register, Id>,
) -> AsmBlock {
    let mut code = Vec::new();
    for op in &block.code {
        select_op(func, op, get_operand, func_literals, &mut code);
    }
    AsmBlock { name: block.name, code }
}

fn select_op(
    func: &ir::Function,
    op: &ir::Op,
    get_operand: &impl Fn(Register) -> AsmArg,
    func_literals: &Map<Register, Id>,
    out: &mut Vec<AsmOp>,
) {
    match op.opcode {
        Opcode::Literal | Opcode::FuncLiteral => {
            // Folded into immediates / direct calls by the caller; no
            // instruction of their own.
        }
        Opcode::BinOp => select_binop(op, get_operand, out),
        Opcode::Compare => select_compare(op, get_operand, out),
        Opcode::Branch => select_branch(op, get_operand, out),
        Opcode::Jump => select_jump(func, op, get_operand, out),
        Opcode::Call => select_call(op, get_operand, func_literals, out),
        Opcode::Return => {
            let src = get_operand(op.src[0]);
            emit_move(AsmArg::Reg(asm::PhysReg::Rax), src, out);
            out.push(AsmOp::instr("ret", vec![]));
        }
        Opcode::RecordSet => select_record_set(op, get_operand, out),
        Opcode::RecordGet => select_record_get(op, get_operand, out),
    }
}

/// `movq dst, src`, eliding the self-move immediately (the emitter also
/// elides any self-move introduced later by home assignment, per spec.md
/// §8's invariant, but folding obvious ones here keeps the virtual form
/// smaller too).
fn emit_move(dst: AsmArg, src: AsmArg, out: &mut Vec<AsmOp>) {
    if dst == src {
        return;
    }
    out.push(AsmOp::instr("movq", vec![dst, src]));
}

fn select_binop(op: &ir::Op, get_operand: &impl Fn(Register) -> AsmArg, out: &mut Vec<AsmOp>) {
    let dst_reg = op.dst[0];
    let dst = AsmArg::Var(dst_reg);
    let lhs_reg = op.src[0];
    let rhs_reg = op.src[1];
    let lhs = get_operand(lhs_reg);
    let rhs = get_operand(rhs_reg);

    match op.variant.as_str() {
        "+" => {
            if dst_reg == lhs_reg {
                out.push(AsmOp::instr("addq", vec![dst, rhs]));
            } else if dst_reg == rhs_reg {
                out.push(AsmOp::instr("addq", vec![dst, lhs]));
            } else {
                emit_move(dst, lhs, out);
                out.push(AsmOp::instr("addq", vec![dst, rhs]));
            }
        }
        "-" => {
            // `0 - x` peephole: the lhs of the binop is the literal zero.
            if matches!(lhs, AsmArg::Imm(0)) {
                if dst_reg == rhs_reg {
                    out.push(AsmOp::instr("negq", vec![dst]));
                } else {
                    emit_move(dst, rhs, out);
                    out.push(AsmOp::instr("negq", vec![dst]));
                }
            } else if dst_reg == lhs_reg {
                out.push(AsmOp::instr("subq", vec![dst, rhs]));
            } else {
                emit_move(dst, lhs, out);
                out.push(AsmOp::instr("subq", vec![dst, rhs]));
            }
        }
        "*" => {
            emit_move(dst, lhs, out);
            out.push(AsmOp::instr("imul", vec![dst, rhs]));
        }
        "/" => {
            emit_move(AsmArg::Reg(asm::PhysReg::Rax), lhs, out);
            out.push(AsmOp::instr("cqto", vec![]));
            out.push(AsmOp::instr("idiv", vec![rhs]));
            emit_move(dst, AsmArg::Reg(asm::PhysReg::Rax), out);
        }
        "eq" | "ne" | "<" | "<=" | ">" | ">=" => {
            let cc = Cc::from_variant(&op.variant);
            out.push(AsmOp::instr("cmpq", vec![lhs, rhs]));
            out.push(AsmOp::instr(cc.set_mnemonic(), vec![AsmArg::Reg(asm::PhysReg::Al)]));
            out.push(AsmOp::instr("movzbq", vec![dst, AsmArg::Reg(asm::PhysReg::Al)]));
        }
        other => bug(format!("unknown binop variant {other}")),
    }
}

fn select_compare(op: &ir::Op, get_operand: &impl Fn(Register) -> AsmArg, out: &mut Vec<AsmOp>) {
    let lhs = get_operand(op.src[0]);
    let rhs = get_operand(op.src[1]);
    out.push(AsmOp::instr("cmpq", vec![lhs, rhs]));
}

/// A `compare` immediately followed by `branch` coalesces into
/// `cmpq; jCC then; jmp else` (spec.md §4.D). Since `select_op` is driven
/// by a single pass over `block.code`, the preceding `cmpq` was already
/// pushed by `select_compare`; this only has to add the two jumps, using
/// the original comparison's variant carried on the `compare` op. Plain
/// boolean branches (`src.len() == 1`, no preceding `compare`) instead
/// test the register directly.
fn select_branch(op: &ir::Op, get_operand: &impl Fn(Register) -> AsmArg, out: &mut Vec<AsmOp>) {
    let then_label = op.label[0];
    let else_label = op.label[1];
    if op.src.len() == 1 {
        let cond = get_operand(op.src[0]);
        out.push(AsmOp::instr("cmpq", vec![cond, AsmArg::Imm(0)]));
        out.push(AsmOp::jump(then_label, Some(Cc::Nz)));
        out.push(AsmOp::jump(else_label, None));
        return;
    }
    // Flags-based branch: the preceding `cmpq` was emitted by
    // `select_compare`; recover its condition from `out`'s last op isn't
    // reliable across block boundaries, so the condition is instead
    // threaded through `op.variant`, set by the IR builder to the
    // comparison's variant string.
    let cc = Cc::from_variant(&op.variant);
    out.push(AsmOp::jump(then_label, Some(cc)));
    out.push(AsmOp::jump(else_label, None));
}

fn select_jump(func: &ir::Function, op: &ir::Op, get_operand: &impl Fn(Register) -> AsmArg, out: &mut Vec<AsmOp>) {
    let target_label = op.label[0];
    let target = func.block_by_label(target_label);
    let params = func.block(target).args.clone();
    if params.len() != op.src.len() {
        bug(format!(
            "jump to {target_label} passes {} args but the block takes {}",
            op.src.len(),
            params.len()
        ));
    }
    for (param, arg) in params.iter().zip(op.src.iter()) {
        emit_move(AsmArg::Var(*param), get_operand(*arg), out);
    }
    out.push(AsmOp::jump(target_label, None));
}

fn select_call(
    op: &ir::Op,
    get_operand: &impl Fn(Register) -> AsmArg,
    func_literals: &Map<Register, Id>,
    out: &mut Vec<AsmOp>,
) {
    let (callee_label, args): (Label, &[Register]) = if op.variant.is_empty() {
        let callee_reg = op.src[0];
        let name = *func_literals
            .get(&callee_reg)
            .unwrap_or_else(|| bug("call target was never produced by a func_literal"));
        (Label(name), &op.src[1..])
    } else {
        (Label(crate::common::intern(op.variant.clone())), &op.src[..])
    };

    if args.len() > ARG_REGISTERS.len() {
        bug("more than 6 call arguments is not supported");
    }
    for (reg, arg) in ARG_REGISTERS.iter().zip(args.iter()) {
        emit_move(AsmArg::Reg(*reg), get_operand(*arg), out);
    }
    out.push(AsmOp::call(callee_label));
    emit_move(AsmArg::Var(op.dst[0]), AsmArg::Reg(asm::PhysReg::Rax), out);
}

/// `record_set(t, v, i)`: base is `src[0]` (the tuple address), value is
/// `src[1]`, index is the `value` field (spec.md §9 resolves the source's
/// inconsistency this way).
fn select_record_set(op: &ir::Op, get_operand: &impl Fn(Register) -> AsmArg, out: &mut Vec<AsmOp>) {
    let base = get_operand(op.src[0]);
    let value = get_operand(op.src[1]);
    let index = op.record_index();
    emit_move(AsmArg::Reg(asm::RECORD_BASE), base, out);
    out.push(AsmOp::instr(
        "movq",
        vec![
            AsmArg::Mem {
                base: asm::RECORD_BASE,
                disp: (index * asm::WORD_SIZE as i64) as i32,
            },
            value,
        ],
    ));
}

fn select_record_get(op: &ir::Op, get_operand: &impl Fn(Register) -> AsmArg, out: &mut Vec<AsmOp>) {
    let base = get_operand(op.src[0]);
    let index = op.record_index();
    emit_move(AsmArg::Reg(asm::RECORD_BASE), base, out);
    out.push(AsmOp::instr(
        "movq",
        vec![
            AsmArg::Var(op.dst[0]),
            AsmArg::Mem {
                base: asm::RECORD_BASE,
                disp: (index * asm::WORD_SIZE as i64) as i32,
            },
        ],
    ));
}
