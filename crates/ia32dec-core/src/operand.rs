//! Instruction operand types.

use crate::Register;

/// An instruction operand.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operand {
    /// Register operand.
    Register(Register),
    /// Immediate value.
    Immediate(Immediate),
    /// Memory reference.
    Memory(MemoryRef),
    /// PC-relative address (used in branches/calls).
    PcRelative {
        /// Offset from the end of the instruction.
        offset: i64,
        /// Resolved target address.
        target: u64,
    },
}

impl Operand {
    /// Creates a register operand.
    pub fn reg(reg: Register) -> Self {
        Self::Register(reg)
    }

    /// Creates an immediate operand.
    pub fn imm(value: i128, size: u8) -> Self {
        Self::Immediate(Immediate {
            value,
            size,
            signed: true,
        })
    }

    /// Creates an unsigned immediate operand.
    pub fn imm_unsigned(value: u64, size: u8) -> Self {
        Self::Immediate(Immediate {
            value: value as i128,
            size,
            signed: false,
        })
    }

    /// Creates a PC-relative operand.
    pub fn pc_rel(offset: i64, target: u64) -> Self {
        Self::PcRelative { offset, target }
    }

    /// Returns the kind of this operand.
    pub fn kind(&self) -> OperandKind {
        match self {
            Self::Register(_) => OperandKind::Register,
            Self::Immediate(_) => OperandKind::Immediate,
            Self::Memory(_) => OperandKind::Memory,
            Self::PcRelative { .. } => OperandKind::Relative,
        }
    }
}

/// Operand category, known before the operand itself is materialised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandKind {
    Register,
    Memory,
    Immediate,
    Relative,
}

/// How an instruction uses one of its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Access {
    pub read: bool,
    pub write: bool,
}

impl Access {
    /// Neither read nor written (LEA's address, hint NOP operands).
    pub const NONE: Self = Self {
        read: false,
        write: false,
    };
    pub const READ: Self = Self {
        read: true,
        write: false,
    };
    pub const WRITE: Self = Self {
        read: false,
        write: true,
    };
    pub const READ_WRITE: Self = Self {
        read: true,
        write: true,
    };
}

/// A fully decoded operand together with its access flags.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DecodedOperand {
    /// The operand value.
    pub operand: Operand,
    /// Operand width in bits (0 when the operand has no data width).
    pub size: u16,
    /// Read/write usage.
    pub access: Access,
}

impl DecodedOperand {
    pub fn new(operand: Operand, size: u16, access: Access) -> Self {
        Self {
            operand,
            size,
            access,
        }
    }

    pub fn kind(&self) -> OperandKind {
        self.operand.kind()
    }
}

/// Immediate value operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Immediate {
    /// The value (sign-extended to i128 for uniformity).
    pub value: i128,
    /// Encoded size in bits.
    pub size: u8,
    /// Whether this is a signed immediate.
    pub signed: bool,
}

/// Memory reference operand.
///
/// Represents x86 memory addressing like `seg:[base + index*scale + disp]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryRef {
    /// Base register (if any).
    pub base: Option<Register>,
    /// Index register (if any).
    pub index: Option<Register>,
    /// Scale factor for index (1, 2, 4, or 8).
    pub scale: u8,
    /// Displacement/offset.
    pub displacement: i64,
    /// Access size in bytes (0 for address-only operands).
    pub size: u8,
    /// Segment override.
    pub segment: Option<Register>,
}

impl MemoryRef {
    /// Creates a memory reference with base and displacement.
    pub fn base_disp(base: Register, displacement: i64, size: u8) -> Self {
        Self::sib(Some(base), None, 1, displacement, size)
    }

    /// Creates a memory reference with just a displacement (absolute address).
    pub fn absolute(address: i64, size: u8) -> Self {
        Self::sib(None, None, 1, address, size)
    }

    /// Creates a full SIB-style memory reference.
    pub fn sib(
        base: Option<Register>,
        index: Option<Register>,
        scale: u8,
        displacement: i64,
        size: u8,
    ) -> Self {
        Self {
            base,
            index,
            scale,
            displacement,
            size,
            segment: None,
        }
    }

    /// Sets the segment override.
    pub fn with_segment(mut self, segment: Register) -> Self {
        self.segment = Some(segment);
        self
    }

    /// Registers used to form the address.
    pub fn address_registers(&self) -> impl Iterator<Item = Register> + '_ {
        self.base.iter().chain(self.index.iter()).copied()
    }
}

fn size_keyword(bytes: u8) -> Option<&'static str> {
    match bytes {
        1 => Some("byte"),
        2 => Some("word"),
        4 => Some("dword"),
        8 => Some("qword"),
        16 => Some("xmmword"),
        _ => None,
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register(reg) => write!(f, "{}", reg.name()),
            Self::Immediate(imm) => {
                if imm.signed && imm.value < 0 {
                    write!(f, "-{:#x}", -imm.value)
                } else {
                    write!(f, "{:#x}", imm.value)
                }
            }
            Self::Memory(mem) => {
                if let Some(keyword) = size_keyword(mem.size) {
                    write!(f, "{} ptr ", keyword)?;
                }
                if let Some(ref segment) = mem.segment {
                    write!(f, "{}:", segment.name())?;
                }
                write!(f, "[")?;
                let mut has_content = false;

                if let Some(ref base) = mem.base {
                    write!(f, "{}", base.name())?;
                    has_content = true;
                }

                if let Some(ref index) = mem.index {
                    if has_content {
                        write!(f, " + ")?;
                    }
                    write!(f, "{}", index.name())?;
                    if mem.scale > 1 {
                        write!(f, "*{}", mem.scale)?;
                    }
                    has_content = true;
                }

                if mem.displacement != 0 || !has_content {
                    if has_content {
                        if mem.displacement > 0 {
                            write!(f, " + {:#x}", mem.displacement)?;
                        } else {
                            write!(f, " - {:#x}", mem.displacement.unsigned_abs())?;
                        }
                    } else {
                        write!(f, "{:#x}", mem.displacement)?;
                    }
                }

                write!(f, "]")
            }
            Self::PcRelative { target, .. } => write!(f, "{:#x}", target),
        }
    }
}
