//! Decoded instruction representation.

use crate::{
    Architecture, DecodedOperand, DeferredOperands, Operand, OperandKind, OperandState, Prefixes,
    Register,
};

/// A decoded x86 instruction.
///
/// Produced by a decoder and not modified afterwards, except for the
/// one-way transition of [`Instruction::operands`] from deferred to
/// complete.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Instruction {
    /// Virtual address of this instruction.
    pub address: u64,
    /// Size in bytes.
    pub size: usize,
    /// Raw bytes of the instruction.
    pub bytes: Vec<u8>,
    /// Mode the instruction was decoded in.
    pub arch: Architecture,
    /// High-level operation category.
    pub operation: Operation,
    /// Mnemonic string (e.g., "mov", "add", "cdqe").
    pub mnemonic: String,
    /// Prefixes that preceded the opcode.
    pub prefixes: Prefixes,
    /// Operands (destination first, then sources).
    pub operands: OperandState,
    /// Control flow information.
    pub control_flow: ControlFlow,
}

impl Instruction {
    /// Returns the end address (address + size).
    pub fn end_address(&self) -> u64 {
        self.address.wrapping_add(self.size as u64)
    }

    /// Returns true once deferred operands have been resolved.
    pub fn is_complete(&self) -> bool {
        self.operands.is_complete()
    }

    /// Resolved operands, or `None` while they are still deferred.
    pub fn operands(&self) -> Option<&[DecodedOperand]> {
        match &self.operands {
            OperandState::Complete(operands) => Some(operands),
            OperandState::Deferred(_) => None,
        }
    }

    /// Skeleton operands, or `None` once completed.
    pub fn deferred(&self) -> Option<&DeferredOperands> {
        match &self.operands {
            OperandState::Deferred(deferred) => Some(deferred),
            OperandState::Complete(_) => None,
        }
    }

    /// Number of explicit operands.
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }

    /// Operand kinds, available without completing the instruction.
    pub fn operand_kinds(&self) -> Vec<OperandKind> {
        self.operands.kinds()
    }

    /// Registers read through explicit operands.
    ///
    /// Base and index registers of memory operands are always read.
    /// Empty while operands are deferred.
    pub fn read_set(&self) -> Vec<Register> {
        let mut regs = Vec::new();
        for op in self.operands().unwrap_or(&[]) {
            match &op.operand {
                Operand::Register(reg) if op.access.read => push_unique(&mut regs, *reg),
                Operand::Memory(mem) => {
                    for reg in mem.address_registers() {
                        push_unique(&mut regs, reg);
                    }
                }
                _ => {}
            }
        }
        regs
    }

    /// Registers written through explicit operands. Empty while operands
    /// are deferred.
    pub fn write_set(&self) -> Vec<Register> {
        let mut regs = Vec::new();
        for op in self.operands().unwrap_or(&[]) {
            if let Operand::Register(reg) = &op.operand {
                if op.access.write {
                    push_unique(&mut regs, *reg);
                }
            }
        }
        regs
    }
}

fn push_unique(regs: &mut Vec<Register>, reg: Register) {
    if !regs.contains(&reg) {
        regs.push(reg);
    }
}

/// High-level operation categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation {
    // Data movement
    Move,
    Load,
    ConditionalMove,
    Push,
    Pop,
    Exchange,
    CompareExchange,
    LoadEffectiveAddress,
    SignExtend,
    ZeroExtend,
    Convert,
    ByteSwap,
    SetCondition,
    String,
    PortIo,

    // Arithmetic
    Add,
    AddWithCarry,
    Sub,
    SubWithBorrow,
    Mul,
    Div,
    ExchangeAdd,
    Neg,
    Inc,
    Dec,
    DecimalAdjust,

    // Logical
    And,
    Or,
    Xor,
    Not,
    Shl,
    Shr,
    Sar,
    Rol,
    Ror,
    ShiftDouble,
    BitTest,
    BitScan,
    BitCount,

    // Comparison
    Compare,
    Test,

    // Control flow
    Jump,
    ConditionalJump,
    Loop,
    Call,
    Return,
    Enter,
    Leave,

    // System
    Syscall,
    Interrupt,
    Undefined,
    FlagControl,
    Nop,
    Prefetch,
    Halt,

    // Other
    Other(u16),
}

/// Branch condition for conditional jumps, moves and sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Condition {
    // Unsigned comparisons
    Equal,
    NotEqual,
    Above,        // CF=0 and ZF=0
    AboveOrEqual, // CF=0
    Below,        // CF=1
    BelowOrEqual, // CF=1 or ZF=1

    // Signed comparisons
    Greater,        // ZF=0 and SF=OF
    GreaterOrEqual, // SF=OF
    Less,           // SF!=OF
    LessOrEqual,    // ZF=1 or SF!=OF

    // Flag-based
    Sign,
    NotSign,
    Overflow,
    NotOverflow,
    Parity,
    NotParity,

    // Counter-based
    CounterZero,
    CounterNotZero,
    /// LOOPE: count not zero and ZF=1
    CounterNotZeroAndEqual,
    /// LOOPNE: count not zero and ZF=0
    CounterNotZeroAndNotEqual,
}

impl Condition {
    /// Decodes the condition in the low nibble of a Jcc/SETcc/CMOVcc opcode.
    pub fn from_opcode(opcode: u8) -> Self {
        match opcode & 0x0F {
            0x0 => Self::Overflow,
            0x1 => Self::NotOverflow,
            0x2 => Self::Below,
            0x3 => Self::AboveOrEqual,
            0x4 => Self::Equal,
            0x5 => Self::NotEqual,
            0x6 => Self::BelowOrEqual,
            0x7 => Self::Above,
            0x8 => Self::Sign,
            0x9 => Self::NotSign,
            0xA => Self::Parity,
            0xB => Self::NotParity,
            0xC => Self::Less,
            0xD => Self::GreaterOrEqual,
            0xE => Self::LessOrEqual,
            _ => Self::Greater,
        }
    }
}

/// Control flow classification.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlFlow {
    /// Sequential - falls through to next instruction.
    Sequential,

    /// Unconditional branch to a known address.
    UnconditionalBranch { target: u64 },

    /// Conditional branch - may fall through or jump.
    ConditionalBranch {
        target: u64,
        condition: Condition,
        fallthrough: u64,
    },

    /// Indirect jump (target in register or memory).
    IndirectBranch,

    /// Function call to known address.
    Call { target: u64, return_addr: u64 },

    /// Indirect call.
    IndirectCall { return_addr: u64 },

    /// Return from function.
    Return,

    /// System call.
    Syscall,

    /// Halts execution (trap, undefined, etc.).
    Halt,
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}:  ", self.address)?;

        for byte in &self.bytes {
            write!(f, "{:02x} ", byte)?;
        }

        // Pad to align mnemonic
        for _ in self.bytes.len()..8 {
            write!(f, "   ")?;
        }

        write!(f, " ")?;
        if self.prefixes.lock {
            write!(f, "lock ")?;
        }
        if self.prefixes.rep && self.operation == Operation::String {
            write!(f, "rep ")?;
        } else if self.prefixes.repne && self.operation == Operation::String {
            write!(f, "repne ")?;
        }
        write!(f, "{}", self.mnemonic)?;

        match &self.operands {
            OperandState::Complete(operands) if !operands.is_empty() => {
                write!(f, " ")?;
                for (i, op) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", op.operand)?;
                }
            }
            OperandState::Deferred(deferred) if !deferred.slots.is_empty() => {
                write!(f, " <deferred>")?;
            }
            _ => {}
        }

        Ok(())
    }
}
