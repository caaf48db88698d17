//! The x86-64 (AT&T syntax) backend, targeting the System V calling
//! convention.
//!
//! Unlike a backend that fuses register allocation into code generation,
//! this one keeps every stage separate: instruction selection (`select`)
//! produces virtual assembly whose operands may still be symbolic
//! variables, liveness (`liveness`) and register allocation (`regalloc`)
//! assign each variable a color, home assignment (`home`) turns colors
//! into concrete registers or stack slots, the patcher (`patch`) repairs
//! any resulting illegal two-memory-operand instruction, and the emitter
//! (`emit`) prints AT&T text.
//!
//! # Call stack frame
//!
//! The stack grows down and must be 16-byte aligned at every `call`
//! instruction (System V ABI). A function's frame looks like:
//!
//! ```txt
//!   High memory addresses
//!
//!   +-------------------------+
//!   | Previous stack frame    |
//!   +-------------------------+
//!   | Return address          | <- pushed by `call`
//!   +-------------------------+
//!   | Saved %rbp              | <- %rbp points here
//!   +-------------------------+
//!   | Saved %r15 (root stack) |
//!   +-------------------------+
//!   | Spill slots             |
//!   +-------------------------+ <- %rsp
//!
//!   Low memory addresses
//! ```
//!
//! # Calling convention
//!
//! Arguments are passed in `rdi, rsi, rdx, rcx, r8, r9` in order; the
//! return value comes back in `rax`. `rax`, `r11`, and `r15` are reserved
//! for the compiler's own use (scratch, record base, root stack) and are
//! never handed to the allocator.
//!
//! # Register allocation
//!
//! Performed by a separate graph-coloring pass (`back::regalloc`); this
//! module only defines the operand and instruction shapes the rest of the
//! backend rewrites in place.
#![allow(dead_code)]

use derive_more::Display;

use crate::middle::{Label, Register};

/// Word and pointer size for this processor.
pub const WORD_SIZE: i32 = 8;

/// The runtime entry point emitted by the selector/emitter.
pub const MAIN_SYMBOL: &str = "psc_main";

/// General-purpose x86-64 registers this backend ever names, in AT&T
/// syntax. `Al` is the 8-bit alias of `rax` used only as the destination
/// of `setCC`.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[allow(missing_docs)]
pub enum PhysReg {
    #[display("%rax")]
    Rax,
    #[display("%rbx")]
    Rbx,
    #[display("%rcx")]
    Rcx,
    #[display("%rdx")]
    Rdx,
    #[display("%rsi")]
    Rsi,
    #[display("%rdi")]
    Rdi,
    #[display("%rbp")]
    Rbp,
    #[display("%rsp")]
    Rsp,
    #[display("%r8")]
    R8,
    #[display("%r9")]
    R9,
    #[display("%r10")]
    R10,
    #[display("%r11")]
    R11,
    #[display("%r12")]
    R12,
    #[display("%r13")]
    R13,
    #[display("%r14")]
    R14,
    #[display("%r15")]
    R15,
    /// The low 8 bits of `rax`; only ever the destination of `setCC`.
    #[display("%al")]
    Al,
}

/// Registers actually handed to the allocator (spec.md §6 ABI descriptor).
pub const ALLOCATABLE: [PhysReg; 6] = [PhysReg::Rcx, PhysReg::Rdx, PhysReg::Rsi, PhysReg::Rdi, PhysReg::R8, PhysReg::R9];

pub const CALLER_SAVE: [PhysReg; 8] = [
    PhysReg::Rdi,
    PhysReg::Rsi,
    PhysReg::Rdx,
    PhysReg::Rcx,
    PhysReg::R8,
    PhysReg::R9,
    PhysReg::R10,
    PhysReg::R11,
];

pub const CALLEE_SAVE: [PhysReg; 5] = [PhysReg::Rbx, PhysReg::R12, PhysReg::R13, PhysReg::R14, PhysReg::R15];

/// Argument-passing registers, in order (spec.md §6).
pub const ARG_REGISTERS: [PhysReg; 6] = [PhysReg::Rdi, PhysReg::Rsi, PhysReg::Rdx, PhysReg::Rcx, PhysReg::R8, PhysReg::R9];

/// Reserved for the patcher's scratch staging (spec.md §4.H).
pub const SCRATCH: PhysReg = PhysReg::Rax;
/// Reserved as the base register for `record_set`/`record_get` (spec.md §4.D).
pub const RECORD_BASE: PhysReg = PhysReg::R11;
/// Reserved for the GC root stack pointer (spec.md §4.I).
pub const ROOT_STACK: PhysReg = PhysReg::R15;

/// A virtual assembly operand: either concrete (a physical register, an
/// immediate, a memory reference) or still symbolic (a pre-allocation
/// variable, named by the IR register that produced it).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AsmArg {
    Reg(PhysReg),
    Imm(i64),
    /// `disp(%base)`.
    Mem { base: PhysReg, disp: i32 },
    /// Symbolic; replaced by `Reg` or `Mem` during home assignment.
    Var(Register),
}

impl std::fmt::Display for AsmArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AsmArg::Reg(r) => write!(f, "{r}"),
            AsmArg::Imm(n) => write!(f, "${n}"),
            AsmArg::Mem { base, disp } => write!(f, "{disp}({base})"),
            AsmArg::Var(r) => write!(f, "<{r}>"),
        }
    }
}

impl AsmArg {
    pub fn is_memory(&self) -> bool {
        matches!(self, AsmArg::Mem { .. })
    }

    /// The variable this operand still needs a home for, if any.
    pub fn variable(&self) -> Option<Register> {
        match self {
            AsmArg::Var(r) => Some(*r),
            _ => None,
        }
    }
}

/// A condition code, shared by `setCC` (instruction selection) and `jCC`
/// (emission). CC mapping per spec.md §4.D: `eq→z, ne→nz, <→l, <=→le,
/// >→g, >=→ge`.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Cc {
    #[display("z")]
    Z,
    #[display("nz")]
    Nz,
    #[display("l")]
    L,
    #[display("le")]
    Le,
    #[display("g")]
    G,
    #[display("ge")]
    Ge,
}

impl Cc {
    pub fn from_bop(op: crate::front::ast::BOp) -> Cc {
        use crate::front::ast::BOp;
        match op {
            BOp::Eq => Cc::Z,
            BOp::Ne => Cc::Nz,
            BOp::Lt => Cc::L,
            BOp::Le => Cc::Le,
            BOp::Gt => Cc::G,
            BOp::Ge => Cc::Ge,
            BOp::Add | BOp::Sub | BOp::Mul | BOp::Div => crate::common::bug(format!("{op} is not a comparison")),
        }
    }

    /// Map an IR `binop`/`compare` variant string (spec.md §3, `BOp::variant`)
    /// to its condition code.
    pub fn from_variant(variant: &str) -> Cc {
        match variant {
            "eq" => Cc::Z,
            "ne" => Cc::Nz,
            "<" => Cc::L,
            "<=" => Cc::Le,
            ">" => Cc::G,
            ">=" => Cc::Ge,
            other => crate::common::bug(format!("{other} is not a comparison variant")),
        }
    }

    /// The `setCC` mnemonic for this condition.
    pub fn set_mnemonic(self) -> &'static str {
        match self {
            Cc::Z => "setz",
            Cc::Nz => "setnz",
            Cc::L => "setl",
            Cc::Le => "setle",
            Cc::G => "setg",
            Cc::Ge => "setge",
        }
    }

    /// The `jCC` mnemonic for this condition.
    pub fn jump_mnemonic(self) -> &'static str {
        match self {
            Cc::Z => "jz",
            Cc::Nz => "jnz",
            Cc::L => "jl",
            Cc::Le => "jle",
            Cc::G => "jg",
            Cc::Ge => "jge",
        }
    }
}

/// The kind of a virtual assembly op (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AsmOpKind {
    Instr,
    Jump,
    Call,
}

/// One virtual assembly operation. For `Instr`, `args[0]` is the
/// destination (source order); the emitter prints it last (AT&T order).
/// `Jump`/`Call` ignore `mnemonic`/`args` and instead use `label`;
/// `Jump` additionally uses `variant` to hold an optional condition-code
/// suffix (empty means an unconditional `jmp`).
#[derive(Clone, Debug)]
pub struct AsmOp {
    pub kind: AsmOpKind,
    pub mnemonic: String,
    pub args: Vec<AsmArg>,
    pub label: Option<Label>,
    pub variant: String,
}

impl AsmOp {
    pub fn instr(mnemonic: impl Into<String>, args: Vec<AsmArg>) -> AsmOp {
        AsmOp {
            kind: AsmOpKind::Instr,
            mnemonic: mnemonic.into(),
            args,
            label: None,
            variant: String::new(),
        }
    }

    pub fn jump(label: Label, cc: Option<Cc>) -> AsmOp {
        AsmOp {
            kind: AsmOpKind::Jump,
            mnemonic: String::new(),
            args: vec![],
            label: Some(label),
            variant: cc.map(|c| c.to_string()).unwrap_or_default(),
        }
    }

    pub fn call(label: Label) -> AsmOp {
        AsmOp {
            kind: AsmOpKind::Call,
            mnemonic: String::new(),
            args: vec![],
            label: Some(label),
            variant: String::new(),
        }
    }

    /// Destination operand, for `Instr` ops that write one.
    pub fn dst(&self) -> Option<&AsmArg> {
        self.args.first()
    }

    /// Every operand position that could carry a not-yet-homed variable.
    pub fn variables(&self) -> impl Iterator<Item = Register> + '_ {
        self.args.iter().filter_map(AsmArg::variable)
    }
}

/// Mnemonics the verifier accepts (spec.md §3). Anything else reaching the
/// verifier is a compiler bug.
pub const ALLOWED_MNEMONICS: &[&str] = &[
    "movq", "addq", "subq", "negq", "imul", "idiv", "cqto", "cmpq", "popq", "pushq", "setz", "setnz", "setl", "setle",
    "setge", "setg", "movzbq", "ret",
];

/// A basic block of virtual (pre- or post-allocation) assembly, keeping
/// the same name/pred/succ shape as the IR block it was selected from
/// (spec.md §3 "Lifecycles").
#[derive(Clone, Debug)]
pub struct AsmBlock {
    pub name: Label,
    pub code: Vec<AsmOp>,
}

/// A whole function after instruction selection.
#[derive(Clone, Debug)]
pub struct AsmFunction {
    pub name: crate::common::Id,
    pub blocks: Vec<AsmBlock>,
    /// Stack frame size in bytes, padded to 16 after home assignment
    /// (spec.md §4.G). Zero until `home::assign_homes` runs.
    pub stacksize: i32,
    /// Is this the program's entry point? Only the entry function gets
    /// the GC-init / root-stack prologue (spec.md §4.I).
    pub is_entry: bool,
}

/// A whole compiled program, ready for liveness/allocation/emission.
#[derive(Clone, Debug)]
pub struct AsmProgram {
    pub funcs: Vec<AsmFunction>,
}
