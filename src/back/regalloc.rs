//! Graph-coloring register allocation (spec.md §4.F).
//!
//! Builds an interference graph over virtual variables and pre-colored
//! physical-register operands, then colors it with a saturation-plus-
//! move-bias order. Grounded on `original_source/reg.go`'s `regalloc`,
//! completed per spec.md's corrections to that source's TODOs: call
//! interference against caller-save registers (there left as "HOLD Up
//! wait does that mean i need registers in my variable graph??"), and
//! pre-colored register nodes (not attempted there at all).

use crate::common::{Id, Map, Set};
use crate::middle::Register;

use super::asm::{AsmArg, AsmFunction, AsmOp, AsmOpKind, CALLER_SAVE, PhysReg, ALLOCATABLE};
use super::liveness::Liveness;

/// Either a virtual variable or a physical register that appeared in an
/// operand position (spec.md §4.F: "a node per virtual variable and per
/// physical register that actually appears in operands").
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Node {
    Var(Register),
    Phys(PhysReg),
}

impl Node {
    /// Lexicographic tie-break key (spec.md §9 Design Notes: "add a final
    /// tie-break on variable name"). Physical registers sort by their
    /// display name so the ordering is total and stable regardless of
    /// discovery order.
    fn name_key(&self) -> Id {
        match self {
            Node::Var(r) => crate::common::intern(r.to_string()),
            Node::Phys(p) => crate::common::intern(p.to_string()),
        }
    }
}

struct ColorNode {
    assigned_color: Option<i32>,
    conflict: Set<Node>,
    moves: Set<Node>,
    in_use: Set<i32>,
    order: usize,
}

impl ColorNode {
    fn new(order: usize) -> Self {
        ColorNode {
            assigned_color: None,
            conflict: Set::new(),
            moves: Set::new(),
            in_use: Set::new(),
            order,
        }
    }

    fn has_bias(&self, graph: &Map<Node, ColorNode>) -> bool {
        self.moves.iter().any(|m| match graph.get(m).and_then(|n| n.assigned_color) {
            Some(c) => !self.in_use.contains(&c),
            None => false,
        })
    }
}

/// A color: `< registers.len()` means a physical register at that index
/// into [`ALLOCATABLE`]; `>= registers.len()` means a spill slot.
pub type ColorMap = Map<Register, i32>;

/// Colors every variable in `func`, given its liveness. Pre-colored
/// physical-register operands participate in the graph (so the allocator
/// never hands out a color they already occupy) but never themselves
/// need a color assigned; only `Register` entries appear in the result.
pub fn allocate(func: &AsmFunction, liveness: &Liveness) -> ColorMap {
    let mut graph: Map<Node, ColorNode> = Map::new();
    let mut order = 0usize;

    // Pre-color every physical register that appears in an operand
    // (spec.md §4.F). Its color is simply its index into ALLOCATABLE if
    // it's allocatable; reserved registers (%rax/%r11/%r15/%rbp/%rsp) and
    // %al never reach this function as operands of instructions the
    // allocator cares about, but are handled uniformly anyway in case a
    // future mnemonic names one.
    let phys_color = |p: PhysReg| -> Option<i32> { ALLOCATABLE.iter().position(|&r| r == p).map(|i| i as i32) };

    for block in &func.blocks {
        for (i, op) in block.code.iter().enumerate() {
            add_constraints(&mut graph, &mut order, block.name, i, op, liveness, phys_color);
        }
    }

    // Propagate pre-colored nodes: every interference neighbor's in_use
    // gains the neighbor's color (spec.md §4.F, "After construction,
    // propagate pre-colored nodes").
    let precolored: Vec<(Node, i32)> = graph
        .iter()
        .filter_map(|(n, cn)| cn.assigned_color.map(|c| (*n, c)))
        .collect();
    for (n, color) in &precolored {
        let neighbors: Vec<Node> = graph[n].conflict.iter().copied().collect();
        for nb in neighbors {
            if let Some(nbnode) = graph.get_mut(&nb) {
                if nbnode.assigned_color.is_none() {
                    nbnode.in_use.insert(*color);
                }
            }
        }
    }

    // Color the graph: work over uncolored nodes only.
    let mut uncolored: Vec<Node> = graph
        .iter()
        .filter(|(_, cn)| cn.assigned_color.is_none())
        .map(|(n, _)| *n)
        .collect();

    while !uncolored.is_empty() {
        uncolored.sort_by(|a, b| {
            let na = &graph[a];
            let nb = &graph[b];
            // (|inUse| asc, hasMoveBias? desc, order asc) then pop the
            // *last* element (spec.md §4.F): so sort ascending on all
            // three keys and pop from the end picks the node with the
            // largest saturation, preferring bias, then the most
            // recently created, with a final lexicographic tie-break for
            // determinism (spec.md §5, §9).
            na.in_use
                .len()
                .cmp(&nb.in_use.len())
                .then_with(|| na.has_bias(&graph).cmp(&nb.has_bias(&graph)))
                .then_with(|| na.order.cmp(&nb.order))
                .then_with(|| a.name_key().cmp(&b.name_key()))
        });
        let node = uncolored.pop().unwrap();
        let cn = &graph[&node];
        let mut color = 0i32;
        while cn.in_use.contains(&color) {
            color += 1;
        }
        graph.get_mut(&node).unwrap().assigned_color = Some(color);
        let neighbors: Vec<Node> = graph[&node].conflict.iter().copied().collect();
        for nb in neighbors {
            if let Some(nbnode) = graph.get_mut(&nb) {
                if nbnode.assigned_color.is_none() {
                    nbnode.in_use.insert(color);
                }
            }
        }
    }

    graph
        .into_iter()
        .filter_map(|(n, cn)| match n {
            Node::Var(r) => Some((r, cn.assigned_color.expect("every node was colored"))),
            Node::Phys(_) => None,
        })
        .collect()
}

/// Graph node for an operand, or `None` if this operand doesn't
/// participate in coloring at all. Only `ALLOCATABLE` physical registers
/// get nodes (spec.md §5: the reserved scratch registers `%rax`/`%r11`/
/// `%r15`/`%rbp`/`%rsp`, and the `%al` alias, are outside the allocator's
/// register universe entirely and must never gain or lose a color).
fn operand_node(a: &AsmArg) -> Option<Node> {
    match a {
        AsmArg::Var(r) => Some(Node::Var(*r)),
        AsmArg::Reg(p) if ALLOCATABLE.contains(p) => Some(Node::Phys(*p)),
        AsmArg::Reg(_) | AsmArg::Imm(_) | AsmArg::Mem { .. } => None,
    }
}

fn add_constraints(
    graph: &mut Map<Node, ColorNode>,
    order: &mut usize,
    block: crate::middle::Label,
    i: usize,
    op: &AsmOp,
    liveness: &Liveness,
    phys_color: impl Fn(PhysReg) -> Option<i32>,
) {
    let ensure = |graph: &mut Map<Node, ColorNode>, n: Node| {
        if !graph.contains_key(&n) {
            let ord = *order;
            *order += 1;
            let mut cn = ColorNode::new(ord);
            if let Node::Phys(p) = n {
                cn.assigned_color = phys_color(p);
            }
            graph.insert(n, cn);
        }
    };

    if op.kind == AsmOpKind::Call {
        // Every variable live immediately after a call interferes with
        // every caller-save register's color (spec.md §4.F: the `inUse`
        // shortcut, avoiding inventing node objects for registers not
        // otherwise referenced as operands).
        let caller_colors: Vec<i32> = CALLER_SAVE.iter().filter_map(|&p| phys_color(p)).collect();
        for v in liveness.live_after(block, i) {
            let n = Node::Var(*v);
            ensure(graph, n);
            graph.get_mut(&n).unwrap().in_use.extend(caller_colors.iter().copied());
        }
        return;
    }

    if op.kind != AsmOpKind::Instr {
        return;
    }
    let Some(dst_arg) = dest_arg(op) else { return };
    let Some(dst) = operand_node(dst_arg) else { return };
    ensure(graph, dst);

    let live_after = liveness.live_after(block, i);

    if op.mnemonic == "movq" {
        if let Some(src_arg) = op.args.get(1) {
            if let Some(src) = operand_node(src_arg) {
                ensure(graph, src);
                graph.get_mut(&dst).unwrap().moves.insert(src);
                graph.get_mut(&src).unwrap().moves.insert(dst);
                for v in live_after {
                    let vn = Node::Var(*v);
                    if vn != dst && vn != src {
                        ensure(graph, vn);
                        add_conflict(graph, dst, vn);
                    }
                }
                return;
            }
        }
    }

    for v in live_after {
        let vn = Node::Var(*v);
        if vn != dst {
            ensure(graph, vn);
            add_conflict(graph, dst, vn);
        }
    }
}

/// The operand an instruction writes, mirroring `liveness::def_use`'s
/// per-mnemonic semantics (only `movq/movzbq/addq/subq/negq/imul` write
/// `args[0]`; `idiv/cqto/cmpq/setCC/ret` either write only implicit
/// physical registers outside the allocator's universe or write nothing).
fn dest_arg(op: &AsmOp) -> Option<&AsmArg> {
    match op.mnemonic.as_str() {
        "movq" | "movzbq" | "addq" | "subq" | "negq" | "imul" => op.args.first(),
        "idiv" | "cqto" | "cmpq" | "setz" | "setnz" | "setl" | "setle" | "setge" | "setg" | "ret" => None,
        other => crate::common::bug(format!("regalloc: unhandled mnemonic {other}")),
    }
}

fn add_conflict(graph: &mut Map<Node, ColorNode>, a: Node, b: Node) {
    graph.get_mut(&a).unwrap().conflict.insert(b);
    graph.get_mut(&b).unwrap().conflict.insert(a);
}

/// Turn a color into the physical register it names, or `None` for a
/// spill slot (spec.md §4.F: "Colors `< |registers|` mean that physical
/// register; colors `>= |registers|` mean a spill slot").
pub fn color_register(color: i32) -> Option<PhysReg> {
    ALLOCATABLE.get(color as usize).copied()
}
