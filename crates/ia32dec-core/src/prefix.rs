//! Instruction prefix state recorded on decoded instructions.

use crate::register::{x86, Register};

/// Legacy and REX prefixes seen before an instruction's opcode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Prefixes {
    /// LOCK prefix (0xF0)
    pub lock: bool,
    /// REPNE/REPNZ prefix (0xF2)
    pub repne: bool,
    /// REP/REPE/REPZ prefix (0xF3)
    pub rep: bool,
    /// Segment override
    pub segment: Option<Segment>,
    /// Operand size override (0x66)
    pub operand_size: bool,
    /// Address size override (0x67)
    pub address_size: bool,
    /// REX prefix (64-bit mode only)
    pub rex: Option<Rex>,
}

impl Prefixes {
    /// REX fields, all clear when no REX prefix is present.
    pub fn rex_bits(&self) -> Rex {
        self.rex.unwrap_or_default()
    }

    /// Returns true if REX.W is set.
    pub fn rex_w(&self) -> bool {
        self.rex.map(|r| r.w).unwrap_or(false)
    }
}

/// Segment override prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Segment {
    CS,
    SS,
    DS,
    ES,
    FS,
    GS,
}

impl Segment {
    /// Returns the segment register.
    pub fn register(&self) -> Register {
        let id = match self {
            Self::CS => x86::CS,
            Self::SS => x86::SS,
            Self::DS => x86::DS,
            Self::ES => x86::ES,
            Self::FS => x86::FS,
            Self::GS => x86::GS,
        };
        Register::segment(id)
    }
}

/// REX prefix fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rex {
    /// REX.W - 64-bit operand size
    pub w: bool,
    /// REX.R - extends ModR/M reg field
    pub r: bool,
    /// REX.X - extends SIB index field
    pub x: bool,
    /// REX.B - extends ModR/M r/m, SIB base, or opcode reg
    pub b: bool,
}

impl Rex {
    /// Parse a REX byte.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            w: byte & 0x08 != 0,
            r: byte & 0x04 != 0,
            x: byte & 0x02 != 0,
            b: byte & 0x01 != 0,
        }
    }
}
