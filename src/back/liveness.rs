//! Backward liveness analysis over the virtual-assembly CFG (spec.md §4.E).
//!
//! Tracks only virtual registers ([`Register`]), not physical ones: every
//! physical register this backend ever names directly (`%rax`, `%r11`,
//! the ABI argument registers) is either reserved scratch excluded from
//! allocation entirely, or is immediately consumed by the very next
//! instruction, so its own cross-instruction liveness is never needed —
//! only *what it interferes with* at its single definition point, which
//! the register allocator (`back::regalloc`) derives directly from the
//! instruction shape rather than from a tracked live set (spec.md §5:
//! "the selector and emitter may name them freely without risk of
//! aliasing an allocated variable").

use crate::common::Map;
use crate::middle::{Label, Register};

use super::asm::{AsmBlock, AsmFunction, AsmOp, AsmOpKind};

pub type LiveSet = crate::common::Set<Register>;

/// Per-block, per-instruction-position live-before sets. `per_block[name]`
/// has length `code.len() + 1`; index `i` is live-before instruction `i`,
/// and the last entry is the block's live-out set.
pub struct Liveness {
    per_block: Map<Label, Vec<LiveSet>>,
}

impl Liveness {
    pub fn live_before(&self, block: Label, instr: usize) -> &LiveSet {
        &self.per_block[&block][instr]
    }

    pub fn live_after(&self, block: Label, instr: usize) -> &LiveSet {
        &self.per_block[&block][instr + 1]
    }
}

/// Every block this function's terminators can reach, read off the
/// trailing run of `Jump`-kind ops (one for a plain jump, two for a
/// coalesced `compare`+`branch`). A block ending in `ret` has none.
fn successors(block: &AsmBlock) -> Vec<Label> {
    let mut succs = Vec::new();
    for op in block.code.iter().rev() {
        if op.kind != AsmOpKind::Jump {
            break;
        }
        succs.push(op.label.unwrap_or_else(|| crate::common::bug("jump op without a label")));
    }
    succs
}

/// Registers defined/used by a single virtual-asm op (spec.md §4.E).
/// Implicit physical writes (`idiv`'s `rax`/`rdx`, `cqto`'s `rdx`,
/// `setCC`'s `%al`) are deliberately not represented here: they're
/// reserved or handled by the allocator directly (see module docs).
fn def_use(op: &AsmOp) -> (Option<Register>, Vec<Register>) {
    if op.kind != AsmOpKind::Instr {
        return (None, vec![]);
    }
    let var = |a: &super::asm::AsmArg| a.variable();
    match op.mnemonic.as_str() {
        "movq" | "movzbq" => {
            let dst = var(&op.args[0]);
            let uses = op.args.get(1).and_then(var).into_iter().collect();
            (dst, uses)
        }
        "addq" | "subq" | "imul" => {
            let dst = var(&op.args[0]);
            let mut uses: Vec<Register> = dst.into_iter().collect();
            uses.extend(op.args.get(1).and_then(var));
            (dst, uses)
        }
        "negq" => {
            let dst = var(&op.args[0]);
            (dst, dst.into_iter().collect())
        }
        "idiv" => (None, op.args.first().and_then(var).into_iter().collect()),
        "cmpq" => (None, op.args.iter().filter_map(var).collect()),
        "cqto" | "setz" | "setnz" | "setl" | "setle" | "setge" | "setg" | "ret" => (None, vec![]),
        other => crate::common::bug(format!("liveness: unhandled mnemonic {other}")),
    }
}

pub fn analyze(func: &AsmFunction) -> Liveness {
    let mut live_in: Map<Label, LiveSet> = func.blocks.iter().map(|b| (b.name, LiveSet::new())).collect();

    loop {
        let mut changed = false;
        for block in func.blocks.iter().rev() {
            let mut live = LiveSet::new();
            for succ in successors(block) {
                live.extend(live_in[&succ].iter().copied());
            }
            for op in block.code.iter().rev() {
                let (def, uses) = def_use(op);
                if let Some(d) = def {
                    live.remove(&d);
                }
                live.extend(uses);
            }
            let entry = live_in.get_mut(&block.name).unwrap();
            if *entry != live {
                *entry = live;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut per_block = Map::new();
    for block in &func.blocks {
        let n = block.code.len();
        let mut sets = vec![LiveSet::new(); n + 1];
        let mut live = LiveSet::new();
        for succ in successors(block) {
            live.extend(live_in[&succ].iter().copied());
        }
        sets[n] = live.clone();
        for i in (0..n).rev() {
            let (def, uses) = def_use(&block.code[i]);
            if let Some(d) = def {
                live.remove(&d);
            }
            live.extend(uses);
            sets[i] = live.clone();
        }
        per_block.insert(block.name, sets);
    }

    Liveness { per_block }
}
