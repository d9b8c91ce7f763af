//! ModR/M and SIB byte decoding.

use ia32dec_core::{
    register::{x86, RegisterClass},
    Architecture, MemoryRef, Register, Rex,
};

/// Decoded ModR/M byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModRM {
    /// Mod field (2 bits)
    pub mod_: u8,
    /// Reg field (3 bits, extended by REX.R)
    pub reg: u8,
    /// R/M field (3 bits, extended by REX.B)
    pub rm: u8,
}

impl ModRM {
    /// Parse a ModR/M byte with REX extension.
    pub fn parse(byte: u8, rex: Option<Rex>) -> Self {
        let rex = rex.unwrap_or_default();
        Self {
            mod_: (byte >> 6) & 0x3,
            reg: ((byte >> 3) & 0x7) | ((rex.r as u8) << 3),
            rm: (byte & 0x7) | ((rex.b as u8) << 3),
        }
    }

    /// Returns true if this ModR/M encodes a register operand (mod=11).
    pub fn is_register(&self) -> bool {
        self.mod_ == 0b11
    }

    /// Returns true if this ModR/M requires a SIB byte.
    /// 16-bit addressing has no SIB form.
    pub fn needs_sib(&self, address_size: u16) -> bool {
        address_size != 16 && self.mod_ != 0b11 && (self.rm & 0x7) == 0x4
    }

    /// Displacement width in bytes for this addressing form.
    pub fn displacement_width(&self, address_size: u16, sib: Option<Sib>) -> u8 {
        match (self.mod_, address_size) {
            (0b11, _) => 0,
            (0b01, _) => 1,
            (0b10, 16) => 2,
            (0b10, _) => 4,
            (_, 16) if (self.rm & 0x7) == 0x6 => 2,
            (_, 16) => 0,
            _ if (self.rm & 0x7) == 0x5 => 4,
            _ => match sib {
                Some(sib) if (sib.base & 0x7) == 0x5 => 4,
                _ => 0,
            },
        }
    }
}

/// Decoded SIB byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sib {
    /// Scale (2 bits) - actual scale is 1 << scale
    pub scale: u8,
    /// Index register (3 bits, extended by REX.X)
    pub index: u8,
    /// Base register (3 bits, extended by REX.B)
    pub base: u8,
}

impl Sib {
    /// Parse a SIB byte with REX extension.
    pub fn parse(byte: u8, rex: Option<Rex>) -> Self {
        let rex = rex.unwrap_or_default();
        Self {
            scale: (byte >> 6) & 0x3,
            index: ((byte >> 3) & 0x7) | ((rex.x as u8) << 3),
            base: (byte & 0x7) | ((rex.b as u8) << 3),
        }
    }

    /// Returns the actual scale factor (1, 2, 4, or 8).
    pub fn scale_factor(&self) -> u8 {
        1 << self.scale
    }
}

/// Decode a general purpose register from a register number.
///
/// Byte registers 4-7 are AH/CH/DH/BH unless a REX prefix is present, in
/// which case they are SPL/BPL/SIL/DIL.
pub fn decode_gpr(reg: u8, size: u16, rex_present: bool) -> Register {
    if size == 8 && !rex_present && (4..8).contains(&reg) {
        Register::gpr(x86::AH + (reg - 4) as u16, 8)
    } else {
        Register::gpr(reg as u16, size)
    }
}

/// Segment register encoded in a ModR/M reg field. REX.R is ignored and
/// encodings 6 and 7 are reserved.
pub fn decode_segment(reg: u8) -> Option<Register> {
    let id = match reg & 0x7 {
        0 => x86::ES,
        1 => x86::CS,
        2 => x86::SS,
        3 => x86::DS,
        4 => x86::FS,
        5 => x86::GS,
        _ => return None,
    };
    Some(Register::segment(id))
}

/// Build the memory expression for a non-register r/m operand.
///
/// `displacement` is the already sign-extended displacement value (zero when
/// the form has none); `size` is the access width in bytes.
pub fn decode_memory(
    modrm: ModRM,
    sib: Option<Sib>,
    displacement: i64,
    address_size: u16,
    arch: Architecture,
    size: u8,
) -> MemoryRef {
    if address_size == 16 {
        return decode_memory_16(modrm, displacement, size);
    }

    let mask = if address_size == 32 { 0xFFFF_FFFF } else { u64::MAX };

    if let Some(sib) = sib {
        // Index 100 (without REX.X) means no index
        let index = (sib.index != 0x4).then(|| decode_gpr(sib.index, address_size, true));
        let scale = if index.is_some() { sib.scale_factor() } else { 1 };
        let base = if (sib.base & 0x7) == 0x5 && modrm.mod_ == 0b00 {
            None
        } else {
            Some(decode_gpr(sib.base, address_size, true))
        };
        let displacement = if base.is_none() && index.is_none() {
            (displacement as u64 & mask) as i64
        } else {
            displacement
        };
        return MemoryRef::sib(base, index, scale, displacement, size);
    }

    if (modrm.rm & 0x7) == 0x5 && modrm.mod_ == 0b00 {
        return match arch {
            Architecture::X86_64 => {
                let pc = Register::new(RegisterClass::ProgramCounter, x86::RIP, address_size);
                MemoryRef::base_disp(pc, displacement, size)
            }
            Architecture::X86 => MemoryRef::absolute((displacement as u64 & mask) as i64, size),
        };
    }

    MemoryRef::base_disp(
        decode_gpr(modrm.rm, address_size, true),
        displacement,
        size,
    )
}

/// 16-bit addressing: fixed base/index pairs selected by r/m.
fn decode_memory_16(modrm: ModRM, displacement: i64, size: u8) -> MemoryRef {
    let reg = |id| Some(Register::gpr(id, 16));
    let (base, index) = match modrm.rm & 0x7 {
        0 => (reg(x86::RBX), reg(x86::RSI)),
        1 => (reg(x86::RBX), reg(x86::RDI)),
        2 => (reg(x86::RBP), reg(x86::RSI)),
        3 => (reg(x86::RBP), reg(x86::RDI)),
        4 => (reg(x86::RSI), None),
        5 => (reg(x86::RDI), None),
        6 if modrm.mod_ == 0b00 => {
            return MemoryRef::absolute((displacement as u64 & 0xFFFF) as i64, size)
        }
        6 => (reg(x86::RBP), None),
        _ => (reg(x86::RBX), None),
    };
    MemoryRef::sib(base, index, 1, displacement, size)
}
