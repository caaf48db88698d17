//! The typed three-address IR (spec.md §3): a basic-block CFG whose
//! instructions are still in terms of symbolic registers and literal
//! values. Produced by `middle::build::lower`, consumed by
//! `back::select::select_instructions`.

use crate::common::{Id, Map};
use crate::front::ast::BOp;

/// An opaque virtual register, conventionally printed as `r<N>`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Register(pub u32);

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// An index into a [`Function`]'s block arena. Blocks reference each other
/// only through `BlockId`s (never raw pointers), so the CFG's cyclic
/// pred/succ edges can't create a reference cycle.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(pub u32);

/// A unique block name, used only for human-readable labels in the
/// generated assembly; CFG edges themselves are `BlockId`s.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Label(pub Id);

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A literal payload. `Int` covers integer and (post-uncover) boolean
/// literals (booleans are 1/0, per spec.md §4.C); `Func` names the
/// function a `func_literal` op takes the address of.
#[derive(Clone, Debug)]
pub enum Literal {
    Int(i64),
    Func(Id),
}

/// One three-address IR instruction. The `opcode` tag plus the shape of
/// `dst`/`src`/`label`/`value` together determine which of spec.md §3's
/// opcodes this is; see `Op::opcode` constructors below for the canonical
/// shape of each.
#[derive(Clone, Debug)]
pub struct Op {
    pub opcode: Opcode,
    /// Binary-op / comparison variant text (`"+"`, `"eq"`, ...), function
    /// name for `call`, empty otherwise.
    pub variant: String,
    pub dst: Vec<Register>,
    pub src: Vec<Register>,
    pub label: Vec<Label>,
    pub value: Option<Literal>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Opcode {
    Literal,
    FuncLiteral,
    BinOp,
    Compare,
    Branch,
    Jump,
    Call,
    Return,
    RecordSet,
    RecordGet,
}

impl Op {
    pub fn literal(dst: Register, value: i64) -> Op {
        Op { opcode: Opcode::Literal, variant: String::new(), dst: vec![dst], src: vec![], label: vec![], value: Some(Literal::Int(value)) }
    }

    pub fn func_literal(dst: Register, func_name: Id) -> Op {
        Op { opcode: Opcode::FuncLiteral, variant: String::new(), dst: vec![dst], src: vec![], label: vec![], value: Some(Literal::Func(func_name)) }
    }

    pub fn binop(op: BOp, dst: Register, lhs: Register, rhs: Register) -> Op {
        Op { opcode: Opcode::BinOp, variant: op.variant().to_string(), dst: vec![dst], src: vec![lhs, rhs], label: vec![], value: None }
    }

    /// A `compare` MUST be immediately followed by the `branch` that
    /// consumes its flags (spec.md §3 invariant).
    pub fn compare(op: BOp, lhs: Register, rhs: Register) -> Op {
        Op { opcode: Opcode::Compare, variant: op.variant().to_string(), dst: vec![], src: vec![lhs, rhs], label: vec![], value: None }
    }

    /// Branch consuming the flags left by a preceding `compare`. `op` is
    /// the comparison's variant, carried on the branch itself so the
    /// selector can recover the condition code without having to look
    /// back at the `compare` op that preceded it.
    pub fn branch_flags(op: BOp, then_label: Label, else_label: Label) -> Op {
        Op { opcode: Opcode::Branch, variant: op.variant().to_string(), dst: vec![], src: vec![], label: vec![then_label, else_label], value: None }
    }

    /// Branch on a boolean register's truthiness (no preceding `compare`).
    pub fn branch_bool(cond: Register, then_label: Label, else_label: Label) -> Op {
        Op { opcode: Opcode::Branch, variant: String::new(), dst: vec![], src: vec![cond], label: vec![then_label, else_label], value: None }
    }

    pub fn jump(target: Label, args: Vec<Register>) -> Op {
        Op { opcode: Opcode::Jump, variant: String::new(), dst: vec![], src: args, label: vec![target], value: None }
    }

    pub fn call(dst: Register, callee: Register, args: Vec<Register>) -> Op {
        let mut src = vec![callee];
        src.extend(args);
        Op { opcode: Opcode::Call, variant: String::new(), dst: vec![dst], src, label: vec![], value: None }
    }

    /// A call to a fixed runtime symbol rather than a computed callee
    /// register (spec.md §4.C: `psc_newtuple`).
    pub fn call_runtime(dst: Register, symbol: &str, args: Vec<Register>) -> Op {
        Op { opcode: Opcode::Call, variant: symbol.to_string(), dst: vec![dst], src: args, label: vec![], value: None }
    }

    pub fn ret(src: Register) -> Op {
        Op { opcode: Opcode::Return, variant: String::new(), dst: vec![], src: vec![src], label: vec![], value: None }
    }

    pub fn record_set(tuple: Register, value: Register, index: i64) -> Op {
        Op { opcode: Opcode::RecordSet, variant: String::new(), dst: vec![], src: vec![tuple, value], label: vec![], value: Some(Literal::Int(index)) }
    }

    pub fn record_get(dst: Register, tuple: Register, index: i64) -> Op {
        Op { opcode: Opcode::RecordGet, variant: String::new(), dst: vec![dst], src: vec![tuple], label: vec![], value: Some(Literal::Int(index)) }
    }

    /// Is this op a block terminator? Exactly one must appear, at the tail
    /// of every block (spec.md §3 invariant).
    pub fn is_terminator(&self) -> bool {
        matches!(self.opcode, Opcode::Jump | Opcode::Branch | Opcode::Return)
    }

    pub fn record_index(&self) -> i64 {
        match &self.value {
            Some(Literal::Int(n)) => *n,
            _ => crate::common::bug("record op without an integer index"),
        }
    }
}

/// A basic block: a maximal straight-line instruction sequence terminated
/// by exactly one control-flow op (spec.md §3/glossary).
#[derive(Clone, Debug)]
pub struct Block {
    pub name: Label,
    /// Block parameters (SSA phi-equivalent); every predecessor `jump`'s
    /// `src` must match this in length (spec.md §3 invariant).
    pub args: Vec<Register>,
    pub code: Vec<Op>,
    pub pred: Vec<BlockId>,
    pub succ: Vec<BlockId>,
}

impl Block {
    pub fn new(name: Label) -> Block {
        Block { name, args: vec![], code: vec![], pred: vec![], succ: vec![] }
    }

    pub fn terminator(&self) -> &Op {
        self.code.last().unwrap_or_else(|| crate::common::bug(format!("block {} has no terminator", self.name)))
    }
}

/// A function: an arena of blocks, the first of which is the entry block
/// (its `args` are the function's parameters). `literals` caches the
/// integer constants introduced by `literal` ops so the instruction
/// selector can fold them into immediates (spec.md §3).
#[derive(Clone, Debug)]
pub struct Function {
    pub name: Id,
    pub blocks: Vec<Block>,
    pub literals: Map<Register, i64>,
}

pub const ENTRY: BlockId = BlockId(0);

impl Function {
    pub fn new(name: Id) -> Function {
        Function { name, blocks: vec![], literals: Map::new() }
    }

    pub fn entry(&self) -> &Block {
        &self.blocks[ENTRY.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0 as usize]
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn add_block(&mut self, name: Label) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(name));
        id
    }

    pub fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succ.push(to);
        self.block_mut(to).pred.push(from);
    }

    pub fn block_by_label(&self, label: Label) -> BlockId {
        self.block_ids()
            .find(|&id| self.block(id).name == label)
            .unwrap_or_else(|| crate::common::bug(format!("no block named {label}")))
    }
}

/// A whole compiled program: every function lowered from the AST, in
/// declaration order. The first function is the program's top-level
/// entry point.
#[derive(Clone, Debug)]
pub struct Program {
    pub funcs: Vec<Function>,
}
