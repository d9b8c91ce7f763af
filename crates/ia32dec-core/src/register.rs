//! x86 register representation.

/// Register class (general purpose, segment, etc.).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterClass {
    /// General purpose register (rax, r8d, al, ah, ...)
    General,
    /// Segment register (cs, ds, etc.)
    Segment,
    /// Instruction pointer (rip / eip)
    ProgramCounter,
}

/// A machine register.
///
/// Each register is identified by its class, a numeric ID from the [`x86`]
/// module and its width. `eax` and `rax` share an ID and differ in size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Register {
    /// The class of register.
    pub class: RegisterClass,
    /// Register ID.
    pub id: u16,
    /// Size of the register in bits.
    pub size: u16,
}

impl Register {
    /// Creates a new register.
    pub fn new(class: RegisterClass, id: u16, size: u16) -> Self {
        Self { class, id, size }
    }

    /// Creates a general purpose register.
    pub fn gpr(id: u16, size: u16) -> Self {
        Self::new(RegisterClass::General, id, size)
    }

    /// Creates a segment register.
    pub fn segment(id: u16) -> Self {
        Self::new(RegisterClass::Segment, id, 16)
    }

    /// Returns the canonical name for this register.
    pub fn name(&self) -> &'static str {
        x86_reg_name(self.id, self.size)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// x86/x86_64 register IDs.
pub mod x86 {
    pub const RAX: u16 = 0;
    pub const RCX: u16 = 1;
    pub const RDX: u16 = 2;
    pub const RBX: u16 = 3;
    pub const RSP: u16 = 4;
    pub const RBP: u16 = 5;
    pub const RSI: u16 = 6;
    pub const RDI: u16 = 7;
    pub const R8: u16 = 8;
    pub const R9: u16 = 9;
    pub const R10: u16 = 10;
    pub const R11: u16 = 11;
    pub const R12: u16 = 12;
    pub const R13: u16 = 13;
    pub const R14: u16 = 14;
    pub const R15: u16 = 15;

    // Instruction pointer
    pub const RIP: u16 = 16;

    // Legacy high-byte registers, only reachable without REX
    pub const AH: u16 = 20;
    pub const CH: u16 = 21;
    pub const DH: u16 = 22;
    pub const BH: u16 = 23;

    // Segment registers
    pub const CS: u16 = 32;
    pub const DS: u16 = 33;
    pub const ES: u16 = 34;
    pub const FS: u16 = 35;
    pub const GS: u16 = 36;
    pub const SS: u16 = 37;
}

fn x86_reg_name(id: u16, size: u16) -> &'static str {
    const NAMES_64: [&str; 16] = [
        "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
        "r13", "r14", "r15",
    ];
    const NAMES_32: [&str; 16] = [
        "eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi", "r8d", "r9d", "r10d", "r11d",
        "r12d", "r13d", "r14d", "r15d",
    ];
    const NAMES_16: [&str; 16] = [
        "ax", "cx", "dx", "bx", "sp", "bp", "si", "di", "r8w", "r9w", "r10w", "r11w", "r12w",
        "r13w", "r14w", "r15w",
    ];
    const NAMES_8: [&str; 16] = [
        "al", "cl", "dl", "bl", "spl", "bpl", "sil", "dil", "r8b", "r9b", "r10b", "r11b", "r12b",
        "r13b", "r14b", "r15b",
    ];

    match (id, size) {
        (0..=15, 64) => NAMES_64[id as usize],
        (0..=15, 32) => NAMES_32[id as usize],
        (0..=15, 16) => NAMES_16[id as usize],
        (0..=15, 8) => NAMES_8[id as usize],

        (x86::RIP, 64) => "rip",
        (x86::RIP, 32) => "eip",
        (x86::RIP, 16) => "ip",

        (x86::AH, _) => "ah",
        (x86::CH, _) => "ch",
        (x86::DH, _) => "dh",
        (x86::BH, _) => "bh",

        (x86::CS, _) => "cs",
        (x86::DS, _) => "ds",
        (x86::ES, _) => "es",
        (x86::FS, _) => "fs",
        (x86::GS, _) => "gs",
        (x86::SS, _) => "ss",

        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpr_names_by_width() {
        assert_eq!(Register::gpr(x86::RAX, 64).name(), "rax");
        assert_eq!(Register::gpr(x86::RAX, 32).name(), "eax");
        assert_eq!(Register::gpr(x86::R9, 16).name(), "r9w");
        assert_eq!(Register::gpr(x86::RSI, 8).name(), "sil");
        assert_eq!(Register::gpr(x86::BH, 8).name(), "bh");
    }

    #[test]
    fn test_special_registers() {
        assert_eq!(Register::segment(x86::FS).name(), "fs");
        let eip = Register::new(RegisterClass::ProgramCounter, x86::RIP, 32);
        assert_eq!(eip.to_string(), "eip");
    }
}
