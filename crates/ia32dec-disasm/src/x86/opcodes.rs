//! x86 opcode definitions and lookup.
//!
//! The tables are plain `static` data built at compile time. Decoders hold a
//! `&'static OpcodeTables` and never mutate it, so any number of decoder
//! instances on any number of threads can share them.
//!
//! Operand templates use the Intel manual's shorthand: `E` is the ModR/M
//! r/m field, `G` the ModR/M reg field, `M` a memory-only r/m, `Z` the low
//! opcode bits, `I` an immediate, `J` a relative branch offset and `O` an
//! absolute memory offset, and `S` a segment register in the ModR/M reg
//! field. Size codes `b`/`w`/`d` are fixed widths, `v` follows the operand
//! size (16/32/64) and `z` is 16 or 32.
//!
//! Opcodes whose meaning changes under a mandatory F3 prefix (POPCNT,
//! TZCNT, LZCNT) live in a separate map that is consulted first.

use ia32dec_core::{register::x86, Access, Operation};

/// Where an operand comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loc {
    E,
    G,
    M,
    Z,
    I,
    J,
    O,
    /// Segment register in the ModR/M reg field.
    S,
    /// Implied general purpose register.
    Reg(u16),
    /// Implied segment register.
    Seg(u16),
    /// The constant 1 (shift/rotate by one).
    One,
}

/// Operand size code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sz {
    B,
    W,
    D,
    V,
    Z,
    /// Operand size on a register, a word in memory (MOV r/m, Sreg).
    RvMw,
    /// 64 bits, or 128 with REX.W (CMPXCHG8B / CMPXCHG16B).
    Pair,
    /// No data width (address-only operands).
    None,
}

impl Sz {
    /// Width in bits for the given effective operand size.
    pub fn bits(self, operand_size: u16) -> u16 {
        match self {
            Self::B => 8,
            Self::W => 16,
            Self::D => 32,
            Self::V => operand_size,
            Self::Z => operand_size.min(32),
            Self::RvMw => operand_size,
            Self::Pair if operand_size == 64 => 128,
            Self::Pair => 64,
            Self::None => 0,
        }
    }
}

/// One operand of an opcode's template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandSpec {
    pub loc: Loc,
    pub size: Sz,
    pub access: Access,
    /// Immediates only: sign-extend when materialised.
    pub signed: bool,
}

impl OperandSpec {
    pub const fn new(loc: Loc, size: Sz, access: Access) -> Self {
        Self {
            loc,
            size,
            access,
            signed: true,
        }
    }

    pub const fn unsigned(mut self) -> Self {
        self.signed = false;
        self
    }

    /// Returns true if this operand is encoded in a ModR/M byte.
    pub fn uses_modrm(&self) -> bool {
        matches!(self.loc, Loc::E | Loc::G | Loc::M | Loc::S)
    }
}

/// Operand size defaults to 64 bits in long mode.
pub const DEFAULT_64: u8 = 0x01;
/// Opcode does not exist in 64-bit mode.
pub const ONLY_32: u8 = 0x02;
/// Opcode only exists in 64-bit mode.
pub const ONLY_64: u8 = 0x04;
/// Accepts a LOCK prefix when the destination is in memory.
pub const LOCKABLE: u8 = 0x08;

/// Opcode table entry.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeEntry {
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Operation category
    pub operation: Operation,
    /// Operand template, destination first
    pub operands: &'static [OperandSpec],
    /// Mode flags (`DEFAULT_64`, `ONLY_32`, `ONLY_64`, `LOCKABLE`)
    pub flags: u8,
    /// Mnemonics for 16, 32 and 64-bit operand sizes (cwde, movsq, ...)
    pub sized: Option<[&'static str; 3]>,
}

impl OpcodeEntry {
    pub const fn new(
        mnemonic: &'static str,
        operation: Operation,
        operands: &'static [OperandSpec],
    ) -> Self {
        Self {
            mnemonic,
            operation,
            operands,
            flags: 0,
            sized: None,
        }
    }

    pub const fn with_flags(mut self, flags: u8) -> Self {
        self.flags |= flags;
        self
    }

    pub const fn with_sized(mut self, names: [&'static str; 3]) -> Self {
        self.sized = Some(names);
        self
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }

    /// Returns true if any operand lives in a ModR/M byte.
    pub fn needs_modrm(&self) -> bool {
        self.operands.iter().any(OperandSpec::uses_modrm)
    }

    /// Mnemonic for the effective operand size.
    pub fn mnemonic_for(&self, operand_size: u16) -> &'static str {
        match (self.sized, operand_size) {
            (Some(names), 16) => names[0],
            (Some(names), 64) => names[2],
            (Some(names), _) => names[1],
            (None, _) => self.mnemonic,
        }
    }
}

/// One entry of a primary opcode map.
#[derive(Debug, Clone, Copy)]
pub enum Slot {
    Empty,
    Entry(OpcodeEntry),
    /// Opcode extension group; the ModR/M reg field selects the entry.
    Group(usize),
}

/// All opcode maps used by the decoder.
#[derive(Debug)]
pub struct OpcodeTables {
    pub one_byte: &'static [Slot; 256],
    pub two_byte: &'static [Slot; 256],
    /// 0x0F map entries that require an F3 prefix.
    pub two_byte_f3: &'static [Slot; 256],
    pub groups: &'static [[Option<OpcodeEntry>; 8]; GROUP_COUNT],
}

impl OpcodeTables {
    /// Looks up the primary map slot for an opcode byte. `rep` selects the
    /// F3 map for escaped opcodes that have an entry there.
    pub fn lookup(&self, escaped: bool, opcode: u8, rep: bool) -> Slot {
        match (escaped, rep) {
            (false, _) => self.one_byte[opcode as usize],
            (true, true) if !matches!(self.two_byte_f3[opcode as usize], Slot::Empty) => {
                self.two_byte_f3[opcode as usize]
            }
            (true, _) => self.two_byte[opcode as usize],
        }
    }

    /// Looks up an opcode group entry by ModR/M reg field.
    pub fn group_entry(&self, group: usize, reg: u8) -> Option<&OpcodeEntry> {
        self.groups
            .get(group)
            .and_then(|g| g[(reg & 0x7) as usize].as_ref())
    }
}

/// The shared opcode tables.
pub static TABLES: OpcodeTables = OpcodeTables {
    one_byte: &OPCODE_TABLE,
    two_byte: &OPCODE_TABLE_0F,
    two_byte_f3: &OPCODE_TABLE_F3_0F,
    groups: &GROUPS,
};

// ============================================================================
// Operand templates
// ============================================================================

const R: Access = Access::READ;
const W: Access = Access::WRITE;
const RW: Access = Access::READ_WRITE;

const EB_R: OperandSpec = OperandSpec::new(Loc::E, Sz::B, R);
const EB_W: OperandSpec = OperandSpec::new(Loc::E, Sz::B, W);
const EB_RW: OperandSpec = OperandSpec::new(Loc::E, Sz::B, RW);
const EW_R: OperandSpec = OperandSpec::new(Loc::E, Sz::W, R);
const ED_R: OperandSpec = OperandSpec::new(Loc::E, Sz::D, R);
const EV_R: OperandSpec = OperandSpec::new(Loc::E, Sz::V, R);
const EV_W: OperandSpec = OperandSpec::new(Loc::E, Sz::V, W);
const EV_RW: OperandSpec = OperandSpec::new(Loc::E, Sz::V, RW);
const EV_NONE: OperandSpec = OperandSpec::new(Loc::E, Sz::V, Access::NONE);
const GB_R: OperandSpec = OperandSpec::new(Loc::G, Sz::B, R);
const GB_W: OperandSpec = OperandSpec::new(Loc::G, Sz::B, W);
const GB_RW: OperandSpec = OperandSpec::new(Loc::G, Sz::B, RW);
const GV_R: OperandSpec = OperandSpec::new(Loc::G, Sz::V, R);
const GV_W: OperandSpec = OperandSpec::new(Loc::G, Sz::V, W);
const GV_RW: OperandSpec = OperandSpec::new(Loc::G, Sz::V, RW);
const M_ADDR: OperandSpec = OperandSpec::new(Loc::M, Sz::None, Access::NONE);
const MB_NONE: OperandSpec = OperandSpec::new(Loc::M, Sz::B, Access::NONE);
const M_PAIR_RW: OperandSpec = OperandSpec::new(Loc::M, Sz::Pair, RW);
const SW_R: OperandSpec = OperandSpec::new(Loc::S, Sz::W, R);
const SW_W: OperandSpec = OperandSpec::new(Loc::S, Sz::W, W);
const ERV_W: OperandSpec = OperandSpec::new(Loc::E, Sz::RvMw, W);
const ZB_W: OperandSpec = OperandSpec::new(Loc::Z, Sz::B, W);
const ZV_R: OperandSpec = OperandSpec::new(Loc::Z, Sz::V, R);
const ZV_W: OperandSpec = OperandSpec::new(Loc::Z, Sz::V, W);
const ZV_RW: OperandSpec = OperandSpec::new(Loc::Z, Sz::V, RW);
const IB: OperandSpec = OperandSpec::new(Loc::I, Sz::B, R);
const IB_U: OperandSpec = IB.unsigned();
const IW_U: OperandSpec = OperandSpec::new(Loc::I, Sz::W, R).unsigned();
const IZ: OperandSpec = OperandSpec::new(Loc::I, Sz::Z, R);
const IV: OperandSpec = OperandSpec::new(Loc::I, Sz::V, R);
const JB: OperandSpec = OperandSpec::new(Loc::J, Sz::B, R);
const JZ: OperandSpec = OperandSpec::new(Loc::J, Sz::Z, R);
const OB_R: OperandSpec = OperandSpec::new(Loc::O, Sz::B, R);
const OB_W: OperandSpec = OperandSpec::new(Loc::O, Sz::B, W);
const OV_R: OperandSpec = OperandSpec::new(Loc::O, Sz::V, R);
const OV_W: OperandSpec = OperandSpec::new(Loc::O, Sz::V, W);
const AL_R: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::B, R);
const AL_W: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::B, W);
const AL_RW: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::B, RW);
const EAX_R: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::V, R);
const EAX_W: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::V, W);
const EAX_RW: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::V, RW);
const EAXZ_R: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::Z, R);
const EAXZ_W: OperandSpec = OperandSpec::new(Loc::Reg(x86::RAX), Sz::Z, W);
const CL_R: OperandSpec = OperandSpec::new(Loc::Reg(x86::RCX), Sz::B, R);
const DX_R: OperandSpec = OperandSpec::new(Loc::Reg(x86::RDX), Sz::W, R);
const ONE: OperandSpec = OperandSpec::new(Loc::One, Sz::B, R);

// Arithmetic: destination read and written
const T_EB_GB: &[OperandSpec] = &[EB_RW, GB_R];
const T_EV_GV: &[OperandSpec] = &[EV_RW, GV_R];
const T_GB_EB: &[OperandSpec] = &[GB_RW, EB_R];
const T_GV_EV: &[OperandSpec] = &[GV_RW, EV_R];
const T_AL_IB: &[OperandSpec] = &[AL_RW, IB];
const T_EAX_IZ: &[OperandSpec] = &[EAX_RW, IZ];

// Comparisons: nothing written
const T_EB_GB_R: &[OperandSpec] = &[EB_R, GB_R];
const T_EV_GV_R: &[OperandSpec] = &[EV_R, GV_R];
const T_GB_EB_R: &[OperandSpec] = &[GB_R, EB_R];
const T_GV_EV_R: &[OperandSpec] = &[GV_R, EV_R];
const T_AL_IB_R: &[OperandSpec] = &[AL_R, IB];
const T_EAX_IZ_R: &[OperandSpec] = &[EAX_R, IZ];

// Moves: destination written only
const T_MOV_EB_GB: &[OperandSpec] = &[EB_W, GB_R];
const T_MOV_EV_GV: &[OperandSpec] = &[EV_W, GV_R];
const T_MOV_GB_EB: &[OperandSpec] = &[GB_W, EB_R];
const T_MOV_GV_EV: &[OperandSpec] = &[GV_W, EV_R];
const T_MOV_GV_EB: &[OperandSpec] = &[GV_W, EB_R];
const T_MOV_GV_EW: &[OperandSpec] = &[GV_W, EW_R];
const T_MOV_GV_ED: &[OperandSpec] = &[GV_W, ED_R];
const T_MOV_ZB_IB: &[OperandSpec] = &[ZB_W, IB];
const T_MOV_ZV_IV: &[OperandSpec] = &[ZV_W, IV];
const T_MOV_AL_OB: &[OperandSpec] = &[AL_W, OB_R];
const T_MOV_EAX_OV: &[OperandSpec] = &[EAX_W, OV_R];
const T_MOV_OB_AL: &[OperandSpec] = &[OB_W, AL_R];
const T_MOV_OV_EAX: &[OperandSpec] = &[OV_W, EAX_R];
const T_LEA: &[OperandSpec] = &[GV_W, M_ADDR];
const T_MOV_EV_SW: &[OperandSpec] = &[ERV_W, SW_R];
const T_MOV_SW_EW: &[OperandSpec] = &[SW_W, EW_R];

const T_XCHG_EB_GB: &[OperandSpec] = &[EB_RW, GB_RW];
const T_XCHG_EV_GV: &[OperandSpec] = &[EV_RW, GV_RW];
const T_XCHG_ZV_EAX: &[OperandSpec] = &[ZV_RW, EAX_RW];

const T_ZV_R: &[OperandSpec] = &[ZV_R];
const T_ZV_W: &[OperandSpec] = &[ZV_W];
const T_ZV_RW: &[OperandSpec] = &[ZV_RW];
const T_EB_R: &[OperandSpec] = &[EB_R];
const T_EB_W: &[OperandSpec] = &[EB_W];
const T_EB_RW: &[OperandSpec] = &[EB_RW];
const T_EV_R: &[OperandSpec] = &[EV_R];
const T_EV_W: &[OperandSpec] = &[EV_W];
const T_EV_RW: &[OperandSpec] = &[EV_RW];
const T_EV_NONE: &[OperandSpec] = &[EV_NONE];
const T_PREFETCH: &[OperandSpec] = &[MB_NONE];
const T_CMPXCHG8B: &[OperandSpec] = &[M_PAIR_RW];

const T_IB: &[OperandSpec] = &[IB];
const T_IZ: &[OperandSpec] = &[IZ];
const T_IB_U: &[OperandSpec] = &[IB_U];
const T_IW_U: &[OperandSpec] = &[IW_U];
const T_ENTER: &[OperandSpec] = &[IW_U, IB_U];
const T_JB: &[OperandSpec] = &[JB];
const T_JZ: &[OperandSpec] = &[JZ];

const T_IMUL_IZ: &[OperandSpec] = &[GV_W, EV_R, IZ];
const T_IMUL_IB: &[OperandSpec] = &[GV_W, EV_R, IB];

const T_IN_AL_IB: &[OperandSpec] = &[AL_W, IB_U];
const T_IN_EAX_IB: &[OperandSpec] = &[EAXZ_W, IB_U];
const T_OUT_IB_AL: &[OperandSpec] = &[IB_U, AL_R];
const T_OUT_IB_EAX: &[OperandSpec] = &[IB_U, EAXZ_R];
const T_IN_AL_DX: &[OperandSpec] = &[AL_W, DX_R];
const T_IN_EAX_DX: &[OperandSpec] = &[EAXZ_W, DX_R];
const T_OUT_DX_AL: &[OperandSpec] = &[DX_R, AL_R];
const T_OUT_DX_EAX: &[OperandSpec] = &[DX_R, EAXZ_R];

// Group templates
const T_EB_IB: &[OperandSpec] = &[EB_RW, IB];
const T_EV_IZ: &[OperandSpec] = &[EV_RW, IZ];
const T_EV_IB: &[OperandSpec] = &[EV_RW, IB];
const T_EB_IB_R: &[OperandSpec] = &[EB_R, IB];
const T_EV_IZ_R: &[OperandSpec] = &[EV_R, IZ];
const T_EV_IB_R: &[OperandSpec] = &[EV_R, IB];
const T_MOV_EB_IB: &[OperandSpec] = &[EB_W, IB];
const T_MOV_EV_IZ: &[OperandSpec] = &[EV_W, IZ];
const T_SHIFT_EB_IB: &[OperandSpec] = &[EB_RW, IB_U];
const T_SHIFT_EV_IB: &[OperandSpec] = &[EV_RW, IB_U];
const T_SHIFT_EB_1: &[OperandSpec] = &[EB_RW, ONE];
const T_SHIFT_EV_1: &[OperandSpec] = &[EV_RW, ONE];
const T_SHIFT_EB_CL: &[OperandSpec] = &[EB_RW, CL_R];
const T_SHIFT_EV_CL: &[OperandSpec] = &[EV_RW, CL_R];
const T_BT_EV_IB: &[OperandSpec] = &[EV_R, IB_U];
const T_BTS_EV_IB: &[OperandSpec] = &[EV_RW, IB_U];
const T_SHIFTD_IB: &[OperandSpec] = &[EV_RW, GV_R, IB_U];
const T_SHIFTD_CL: &[OperandSpec] = &[EV_RW, GV_R, CL_R];

const T_PUSH_ES: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::ES), Sz::W, R)];
const T_PUSH_CS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::CS), Sz::W, R)];
const T_PUSH_SS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::SS), Sz::W, R)];
const T_PUSH_DS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::DS), Sz::W, R)];
const T_PUSH_FS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::FS), Sz::W, R)];
const T_PUSH_GS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::GS), Sz::W, R)];
const T_POP_ES: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::ES), Sz::W, W)];
const T_POP_SS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::SS), Sz::W, W)];
const T_POP_DS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::DS), Sz::W, W)];
const T_POP_FS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::FS), Sz::W, W)];
const T_POP_GS: &[OperandSpec] = &[OperandSpec::new(Loc::Seg(x86::GS), Sz::W, W)];

const fn push_seg(ops: &'static [OperandSpec]) -> OpcodeEntry {
    OpcodeEntry::new("push", Operation::Push, ops).with_flags(DEFAULT_64)
}

const fn pop_seg(ops: &'static [OperandSpec]) -> OpcodeEntry {
    OpcodeEntry::new("pop", Operation::Pop, ops).with_flags(DEFAULT_64)
}

// ============================================================================
// Condition code mnemonics, indexed by the low opcode nibble
// ============================================================================

const JCC: [&str; 16] = [
    "jo", "jno", "jb", "jae", "je", "jne", "jbe", "ja", "js", "jns", "jp", "jnp", "jl", "jge",
    "jle", "jg",
];
const SETCC: [&str; 16] = [
    "seto", "setno", "setb", "setae", "sete", "setne", "setbe", "seta", "sets", "setns", "setp",
    "setnp", "setl", "setge", "setle", "setg",
];
const CMOVCC: [&str; 16] = [
    "cmovo", "cmovno", "cmovb", "cmovae", "cmove", "cmovne", "cmovbe", "cmova", "cmovs",
    "cmovns", "cmovp", "cmovnp", "cmovl", "cmovge", "cmovle", "cmovg",
];

// ============================================================================
// Opcode extension groups
// ============================================================================

pub const GROUP_1_EB_IB: usize = 0;
pub const GROUP_1_EV_IZ: usize = 1;
pub const GROUP_1_EV_IB: usize = 2;
pub const GROUP_1A: usize = 3;
pub const GROUP_2_EB_IB: usize = 4;
pub const GROUP_2_EV_IB: usize = 5;
pub const GROUP_2_EB_1: usize = 6;
pub const GROUP_2_EV_1: usize = 7;
pub const GROUP_2_EB_CL: usize = 8;
pub const GROUP_2_EV_CL: usize = 9;
pub const GROUP_3_EB: usize = 10;
pub const GROUP_3_EV: usize = 11;
pub const GROUP_4: usize = 12;
pub const GROUP_5: usize = 13;
pub const GROUP_11_EB: usize = 14;
pub const GROUP_11_EV: usize = 15;
pub const GROUP_8: usize = 16;
pub const GROUP_9: usize = 17;
pub const GROUP_16: usize = 18;
pub const GROUP_P: usize = 19;
pub const GROUP_COUNT: usize = 20;

/// Group 1 (0x80-0x83): arithmetic with an immediate source.
const fn group1(ops: &'static [OperandSpec], cmp: &'static [OperandSpec]) -> [Option<OpcodeEntry>; 8] {
    [
        Some(OpcodeEntry::new("add", Operation::Add, ops).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("or", Operation::Or, ops).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("adc", Operation::AddWithCarry, ops).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("sbb", Operation::SubWithBorrow, ops).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("and", Operation::And, ops).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("sub", Operation::Sub, ops).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("xor", Operation::Xor, ops).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("cmp", Operation::Compare, cmp)),
    ]
}

/// Group 2 (0xC0-0xC1, 0xD0-0xD3): shifts and rotates.
const fn group2(ops: &'static [OperandSpec]) -> [Option<OpcodeEntry>; 8] {
    [
        Some(OpcodeEntry::new("rol", Operation::Rol, ops)),
        Some(OpcodeEntry::new("ror", Operation::Ror, ops)),
        Some(OpcodeEntry::new("rcl", Operation::Rol, ops)),
        Some(OpcodeEntry::new("rcr", Operation::Ror, ops)),
        Some(OpcodeEntry::new("shl", Operation::Shl, ops)),
        Some(OpcodeEntry::new("shr", Operation::Shr, ops)),
        // /6 is an undocumented alias of SHL
        Some(OpcodeEntry::new("shl", Operation::Shl, ops)),
        Some(OpcodeEntry::new("sar", Operation::Sar, ops)),
    ]
}

/// Group 3 (0xF6/0xF7): unary operations on r/m.
const fn group3(
    test: &'static [OperandSpec],
    unary: &'static [OperandSpec],
    implicit: &'static [OperandSpec],
) -> [Option<OpcodeEntry>; 8] {
    [
        Some(OpcodeEntry::new("test", Operation::Test, test)),
        Some(OpcodeEntry::new("test", Operation::Test, test)),
        Some(OpcodeEntry::new("not", Operation::Not, unary).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("neg", Operation::Neg, unary).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("mul", Operation::Mul, implicit)),
        Some(OpcodeEntry::new("imul", Operation::Mul, implicit)),
        Some(OpcodeEntry::new("div", Operation::Div, implicit)),
        Some(OpcodeEntry::new("idiv", Operation::Div, implicit)),
    ]
}

/// Opcode extension groups, indexed by the `GROUP_*` constants.
pub static GROUPS: [[Option<OpcodeEntry>; 8]; GROUP_COUNT] = [
    group1(T_EB_IB, T_EB_IB_R),
    group1(T_EV_IZ, T_EV_IZ_R),
    group1(T_EV_IB, T_EV_IB_R),
    // Group 1A (0x8F): POP r/m
    [
        Some(OpcodeEntry::new("pop", Operation::Pop, T_EV_W).with_flags(DEFAULT_64)),
        None,
        None,
        None,
        None,
        None,
        None,
        None,
    ],
    group2(T_SHIFT_EB_IB),
    group2(T_SHIFT_EV_IB),
    group2(T_SHIFT_EB_1),
    group2(T_SHIFT_EV_1),
    group2(T_SHIFT_EB_CL),
    group2(T_SHIFT_EV_CL),
    group3(T_EB_IB_R, T_EB_RW, T_EB_R),
    group3(T_EV_IZ_R, T_EV_RW, T_EV_R),
    // Group 4 (0xFE)
    [
        Some(OpcodeEntry::new("inc", Operation::Inc, T_EB_RW).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("dec", Operation::Dec, T_EB_RW).with_flags(LOCKABLE)),
        None,
        None,
        None,
        None,
        None,
        None,
    ],
    // Group 5 (0xFF); far call/jmp (/3, /5) are not supported
    [
        Some(OpcodeEntry::new("inc", Operation::Inc, T_EV_RW).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("dec", Operation::Dec, T_EV_RW).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("call", Operation::Call, T_EV_R).with_flags(DEFAULT_64)),
        None,
        Some(OpcodeEntry::new("jmp", Operation::Jump, T_EV_R).with_flags(DEFAULT_64)),
        None,
        Some(OpcodeEntry::new("push", Operation::Push, T_EV_R).with_flags(DEFAULT_64)),
        None,
    ],
    // Group 11 (0xC6/0xC7): MOV r/m, imm
    [
        Some(OpcodeEntry::new("mov", Operation::Move, T_MOV_EB_IB)),
        None,
        None,
        None,
        None,
        None,
        None,
        None,
    ],
    [
        Some(OpcodeEntry::new("mov", Operation::Move, T_MOV_EV_IZ)),
        None,
        None,
        None,
        None,
        None,
        None,
        None,
    ],
    // Group 8 (0F BA): bit test with immediate
    [
        None,
        None,
        None,
        None,
        Some(OpcodeEntry::new("bt", Operation::BitTest, T_BT_EV_IB)),
        Some(OpcodeEntry::new("bts", Operation::BitTest, T_BTS_EV_IB).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("btr", Operation::BitTest, T_BTS_EV_IB).with_flags(LOCKABLE)),
        Some(OpcodeEntry::new("btc", Operation::BitTest, T_BTS_EV_IB).with_flags(LOCKABLE)),
    ],
    // Group 9 (0F C7): CMPXCHG8B, CMPXCHG16B with REX.W
    [
        None,
        Some(
            OpcodeEntry::new("cmpxchg8b", Operation::CompareExchange, T_CMPXCHG8B)
                .with_sized(["cmpxchg8b", "cmpxchg8b", "cmpxchg16b"])
                .with_flags(LOCKABLE),
        ),
        None,
        None,
        None,
        None,
        None,
        None,
    ],
    // Group 16 (0F 18): prefetch hints, /4-/7 are reserved NOPs
    [
        Some(OpcodeEntry::new("prefetchnta", Operation::Prefetch, T_PREFETCH)),
        Some(OpcodeEntry::new("prefetcht0", Operation::Prefetch, T_PREFETCH)),
        Some(OpcodeEntry::new("prefetcht1", Operation::Prefetch, T_PREFETCH)),
        Some(OpcodeEntry::new("prefetcht2", Operation::Prefetch, T_PREFETCH)),
        Some(OpcodeEntry::new("nop", Operation::Nop, T_EV_NONE)),
        Some(OpcodeEntry::new("nop", Operation::Nop, T_EV_NONE)),
        Some(OpcodeEntry::new("nop", Operation::Nop, T_EV_NONE)),
        Some(OpcodeEntry::new("nop", Operation::Nop, T_EV_NONE)),
    ],
    // Group P (0F 0D): PREFETCH / PREFETCHW
    [
        Some(OpcodeEntry::new("prefetch", Operation::Prefetch, T_PREFETCH)),
        Some(OpcodeEntry::new("prefetchw", Operation::Prefetch, T_PREFETCH)),
        None,
        None,
        None,
        None,
        None,
        None,
    ],
];

/// NOP (0x90) becomes XCHG when REX.B selects r8.
pub const XCHG_R8_RAX: OpcodeEntry =
    OpcodeEntry::new("xchg", Operation::Exchange, T_XCHG_ZV_EAX);

/// F3 90.
pub const PAUSE: OpcodeEntry = OpcodeEntry::new("pause", Operation::Nop, &[]);

/// F3 0F 1E FA / FB: CET branch targets, hint NOPs on older processors.
pub const ENDBR64: OpcodeEntry = OpcodeEntry::new("endbr64", Operation::Nop, &[]);
pub const ENDBR32: OpcodeEntry = OpcodeEntry::new("endbr32", Operation::Nop, &[]);

const EMPTY: Slot = Slot::Empty;

const fn entry(mnemonic: &'static str, operation: Operation, ops: &'static [OperandSpec]) -> Slot {
    Slot::Entry(OpcodeEntry::new(mnemonic, operation, ops))
}

const fn entry_with(e: OpcodeEntry) -> Slot {
    Slot::Entry(e)
}

const fn lockable(mnemonic: &'static str, operation: Operation, ops: &'static [OperandSpec]) -> Slot {
    Slot::Entry(OpcodeEntry::new(mnemonic, operation, ops).with_flags(LOCKABLE))
}

/// The six standard encodings of a classic ALU opcode row
/// (Eb,Gb / Ev,Gv / Gb,Eb / Gv,Ev / AL,Ib / eAX,Iz).
const fn alu_row(mnemonic: &'static str, operation: Operation, compare: bool) -> [Slot; 6] {
    if compare {
        [
            entry(mnemonic, operation, T_EB_GB_R),
            entry(mnemonic, operation, T_EV_GV_R),
            entry(mnemonic, operation, T_GB_EB_R),
            entry(mnemonic, operation, T_GV_EV_R),
            entry(mnemonic, operation, T_AL_IB_R),
            entry(mnemonic, operation, T_EAX_IZ_R),
        ]
    } else {
        // Only the r/m destination forms can take LOCK
        [
            lockable(mnemonic, operation, T_EB_GB),
            lockable(mnemonic, operation, T_EV_GV),
            entry(mnemonic, operation, T_GB_EB),
            entry(mnemonic, operation, T_GV_EV),
            entry(mnemonic, operation, T_AL_IB),
            entry(mnemonic, operation, T_EAX_IZ),
        ]
    }
}

/// One-byte opcode table.
pub static OPCODE_TABLE: [Slot; 256] = {
    let mut table: [Slot; 256] = [EMPTY; 256];

    let rows: [(usize, &str, Operation, bool); 8] = [
        (0x00, "add", Operation::Add, false),
        (0x08, "or", Operation::Or, false),
        (0x10, "adc", Operation::AddWithCarry, false),
        (0x18, "sbb", Operation::SubWithBorrow, false),
        (0x20, "and", Operation::And, false),
        (0x28, "sub", Operation::Sub, false),
        (0x30, "xor", Operation::Xor, false),
        (0x38, "cmp", Operation::Compare, true),
    ];
    let mut row = 0;
    while row < rows.len() {
        let (base, mnemonic, operation, compare) = rows[row];
        let slots = alu_row(mnemonic, operation, compare);
        let mut j = 0;
        while j < 6 {
            table[base + j] = slots[j];
            j += 1;
        }
        row += 1;
    }

    // PUSH/POP segment registers (not valid in 64-bit mode)
    table[0x06] = entry_with(push_seg(T_PUSH_ES).with_flags(ONLY_32));
    table[0x07] = entry_with(pop_seg(T_POP_ES).with_flags(ONLY_32));
    table[0x0E] = entry_with(push_seg(T_PUSH_CS).with_flags(ONLY_32));
    table[0x16] = entry_with(push_seg(T_PUSH_SS).with_flags(ONLY_32));
    table[0x17] = entry_with(pop_seg(T_POP_SS).with_flags(ONLY_32));
    table[0x1E] = entry_with(push_seg(T_PUSH_DS).with_flags(ONLY_32));
    table[0x1F] = entry_with(pop_seg(T_POP_DS).with_flags(ONLY_32));

    // BCD adjustments
    table[0x27] = entry_with(OpcodeEntry::new("daa", Operation::DecimalAdjust, &[]).with_flags(ONLY_32));
    table[0x2F] = entry_with(OpcodeEntry::new("das", Operation::DecimalAdjust, &[]).with_flags(ONLY_32));
    table[0x37] = entry_with(OpcodeEntry::new("aaa", Operation::DecimalAdjust, &[]).with_flags(ONLY_32));
    table[0x3F] = entry_with(OpcodeEntry::new("aas", Operation::DecimalAdjust, &[]).with_flags(ONLY_32));

    // INC/DEC r32 (REX prefixes in 64-bit mode), PUSH/POP r
    let mut i = 0;
    while i < 8 {
        table[0x40 + i] = entry_with(OpcodeEntry::new("inc", Operation::Inc, T_ZV_RW).with_flags(ONLY_32));
        table[0x48 + i] = entry_with(OpcodeEntry::new("dec", Operation::Dec, T_ZV_RW).with_flags(ONLY_32));
        table[0x50 + i] = entry_with(OpcodeEntry::new("push", Operation::Push, T_ZV_R).with_flags(DEFAULT_64));
        table[0x58 + i] = entry_with(OpcodeEntry::new("pop", Operation::Pop, T_ZV_W).with_flags(DEFAULT_64));
        i += 1;
    }

    table[0x60] = entry_with(
        OpcodeEntry::new("pusha", Operation::Push, &[])
            .with_sized(["pusha", "pushad", "pushad"])
            .with_flags(ONLY_32),
    );
    table[0x61] = entry_with(
        OpcodeEntry::new("popa", Operation::Pop, &[])
            .with_sized(["popa", "popad", "popad"])
            .with_flags(ONLY_32),
    );

    // MOVSXD (sign-extend dword to qword)
    table[0x63] = entry_with(OpcodeEntry::new("movsxd", Operation::SignExtend, T_MOV_GV_ED).with_flags(ONLY_64));

    table[0x68] = entry_with(OpcodeEntry::new("push", Operation::Push, T_IZ).with_flags(DEFAULT_64));
    table[0x69] = entry("imul", Operation::Mul, T_IMUL_IZ);
    table[0x6A] = entry_with(OpcodeEntry::new("push", Operation::Push, T_IB).with_flags(DEFAULT_64));
    table[0x6B] = entry("imul", Operation::Mul, T_IMUL_IB);

    // Jcc rel8
    let mut cc = 0;
    while cc < 16 {
        table[0x70 + cc] = entry_with(
            OpcodeEntry::new(JCC[cc], Operation::ConditionalJump, T_JB).with_flags(DEFAULT_64),
        );
        cc += 1;
    }

    table[0x80] = Slot::Group(GROUP_1_EB_IB);
    table[0x81] = Slot::Group(GROUP_1_EV_IZ);
    // 0x82 aliases 0x80 outside 64-bit mode; resolved by the decoder
    table[0x82] = Slot::Group(GROUP_1_EB_IB);
    table[0x83] = Slot::Group(GROUP_1_EV_IB);

    table[0x84] = entry("test", Operation::Test, T_EB_GB_R);
    table[0x85] = entry("test", Operation::Test, T_EV_GV_R);
    table[0x86] = lockable("xchg", Operation::Exchange, T_XCHG_EB_GB);
    table[0x87] = lockable("xchg", Operation::Exchange, T_XCHG_EV_GV);

    // MOV
    table[0x88] = entry("mov", Operation::Move, T_MOV_EB_GB);
    table[0x89] = entry("mov", Operation::Move, T_MOV_EV_GV);
    table[0x8A] = entry("mov", Operation::Move, T_MOV_GB_EB);
    table[0x8B] = entry("mov", Operation::Move, T_MOV_GV_EV);

    // MOV r/m, Sreg / MOV Sreg, r/m
    table[0x8C] = entry("mov", Operation::Move, T_MOV_EV_SW);
    table[0x8E] = entry("mov", Operation::Move, T_MOV_SW_EW);

    // LEA r, m
    table[0x8D] = entry("lea", Operation::LoadEffectiveAddress, T_LEA);
    table[0x8F] = Slot::Group(GROUP_1A);

    // NOP / XCHG r, eAX
    table[0x90] = entry("nop", Operation::Nop, &[]);
    let mut r = 1;
    while r < 8 {
        table[0x90 + r] = entry("xchg", Operation::Exchange, T_XCHG_ZV_EAX);
        r += 1;
    }

    table[0x98] = entry_with(OpcodeEntry::new("cwde", Operation::Convert, &[]).with_sized(["cbw", "cwde", "cdqe"]));
    table[0x99] = entry_with(OpcodeEntry::new("cdq", Operation::Convert, &[]).with_sized(["cwd", "cdq", "cqo"]));
    table[0x9C] = entry_with(
        OpcodeEntry::new("pushf", Operation::Push, &[])
            .with_sized(["pushf", "pushfd", "pushfq"])
            .with_flags(DEFAULT_64),
    );
    table[0x9D] = entry_with(
        OpcodeEntry::new("popf", Operation::Pop, &[])
            .with_sized(["popf", "popfd", "popfq"])
            .with_flags(DEFAULT_64),
    );
    table[0x9E] = entry("sahf", Operation::FlagControl, &[]);
    table[0x9F] = entry("lahf", Operation::FlagControl, &[]);

    // MOV AL/eAX <-> moffs
    table[0xA0] = entry("mov", Operation::Move, T_MOV_AL_OB);
    table[0xA1] = entry("mov", Operation::Move, T_MOV_EAX_OV);
    table[0xA2] = entry("mov", Operation::Move, T_MOV_OB_AL);
    table[0xA3] = entry("mov", Operation::Move, T_MOV_OV_EAX);

    // String operations (implicit operands)
    table[0xA4] = entry("movsb", Operation::String, &[]);
    table[0xA5] = entry_with(OpcodeEntry::new("movsd", Operation::String, &[]).with_sized(["movsw", "movsd", "movsq"]));
    table[0xA6] = entry("cmpsb", Operation::String, &[]);
    table[0xA7] = entry_with(OpcodeEntry::new("cmpsd", Operation::String, &[]).with_sized(["cmpsw", "cmpsd", "cmpsq"]));
    table[0xAA] = entry("stosb", Operation::String, &[]);
    table[0xAB] = entry_with(OpcodeEntry::new("stosd", Operation::String, &[]).with_sized(["stosw", "stosd", "stosq"]));
    table[0xAC] = entry("lodsb", Operation::String, &[]);
    table[0xAD] = entry_with(OpcodeEntry::new("lodsd", Operation::String, &[]).with_sized(["lodsw", "lodsd", "lodsq"]));
    table[0xAE] = entry("scasb", Operation::String, &[]);
    table[0xAF] = entry_with(OpcodeEntry::new("scasd", Operation::String, &[]).with_sized(["scasw", "scasd", "scasq"]));

    // TEST AL/eAX, imm
    table[0xA8] = entry("test", Operation::Test, T_AL_IB_R);
    table[0xA9] = entry("test", Operation::Test, T_EAX_IZ_R);

    // MOV r, imm
    let mut r = 0;
    while r < 8 {
        table[0xB0 + r] = entry("mov", Operation::Move, T_MOV_ZB_IB);
        table[0xB8 + r] = entry("mov", Operation::Move, T_MOV_ZV_IV);
        r += 1;
    }

    table[0xC0] = Slot::Group(GROUP_2_EB_IB);
    table[0xC1] = Slot::Group(GROUP_2_EV_IB);
    table[0xC2] = entry_with(OpcodeEntry::new("ret", Operation::Return, T_IW_U).with_flags(DEFAULT_64));
    table[0xC3] = entry_with(OpcodeEntry::new("ret", Operation::Return, &[]).with_flags(DEFAULT_64));
    table[0xC6] = Slot::Group(GROUP_11_EB);
    table[0xC7] = Slot::Group(GROUP_11_EV);
    table[0xC8] = entry_with(OpcodeEntry::new("enter", Operation::Enter, T_ENTER).with_flags(DEFAULT_64));
    table[0xC9] = entry_with(OpcodeEntry::new("leave", Operation::Leave, &[]).with_flags(DEFAULT_64));

    // INT 3 / INT imm8 / INTO
    table[0xCC] = entry("int3", Operation::Interrupt, &[]);
    table[0xCD] = entry("int", Operation::Interrupt, T_IB_U);
    table[0xCE] = entry_with(OpcodeEntry::new("into", Operation::Interrupt, &[]).with_flags(ONLY_32));

    table[0xD0] = Slot::Group(GROUP_2_EB_1);
    table[0xD1] = Slot::Group(GROUP_2_EV_1);
    table[0xD2] = Slot::Group(GROUP_2_EB_CL);
    table[0xD3] = Slot::Group(GROUP_2_EV_CL);
    // XLAT: AL = [rBX + AL]
    table[0xD7] = entry("xlatb", Operation::Load, &[]);

    // LOOPcc / JCXZ
    table[0xE0] = entry_with(OpcodeEntry::new("loopne", Operation::Loop, T_JB).with_flags(DEFAULT_64));
    table[0xE1] = entry_with(OpcodeEntry::new("loope", Operation::Loop, T_JB).with_flags(DEFAULT_64));
    table[0xE2] = entry_with(OpcodeEntry::new("loop", Operation::Loop, T_JB).with_flags(DEFAULT_64));
    table[0xE3] = entry_with(OpcodeEntry::new("jecxz", Operation::ConditionalJump, T_JB).with_flags(DEFAULT_64));

    // Port I/O
    table[0xE4] = entry("in", Operation::PortIo, T_IN_AL_IB);
    table[0xE5] = entry("in", Operation::PortIo, T_IN_EAX_IB);
    table[0xE6] = entry("out", Operation::PortIo, T_OUT_IB_AL);
    table[0xE7] = entry("out", Operation::PortIo, T_OUT_IB_EAX);
    table[0xEC] = entry("in", Operation::PortIo, T_IN_AL_DX);
    table[0xED] = entry("in", Operation::PortIo, T_IN_EAX_DX);
    table[0xEE] = entry("out", Operation::PortIo, T_OUT_DX_AL);
    table[0xEF] = entry("out", Operation::PortIo, T_OUT_DX_EAX);

    // CALL/JMP
    table[0xE8] = entry_with(OpcodeEntry::new("call", Operation::Call, T_JZ).with_flags(DEFAULT_64));
    table[0xE9] = entry_with(OpcodeEntry::new("jmp", Operation::Jump, T_JZ).with_flags(DEFAULT_64));
    table[0xEB] = entry_with(OpcodeEntry::new("jmp", Operation::Jump, T_JB).with_flags(DEFAULT_64));

    table[0xF4] = entry("hlt", Operation::Halt, &[]);
    table[0xF5] = entry("cmc", Operation::FlagControl, &[]);
    table[0xF6] = Slot::Group(GROUP_3_EB);
    table[0xF7] = Slot::Group(GROUP_3_EV);
    table[0xF8] = entry("clc", Operation::FlagControl, &[]);
    table[0xF9] = entry("stc", Operation::FlagControl, &[]);
    table[0xFA] = entry("cli", Operation::FlagControl, &[]);
    table[0xFB] = entry("sti", Operation::FlagControl, &[]);
    table[0xFC] = entry("cld", Operation::FlagControl, &[]);
    table[0xFD] = entry("std", Operation::FlagControl, &[]);
    table[0xFE] = Slot::Group(GROUP_4);
    table[0xFF] = Slot::Group(GROUP_5);

    table
};

/// Two-byte opcode table (0x0F escape).
pub static OPCODE_TABLE_0F: [Slot; 256] = {
    let mut table: [Slot; 256] = [EMPTY; 256];

    table[0x05] = entry_with(OpcodeEntry::new("syscall", Operation::Syscall, &[]).with_flags(ONLY_64));
    table[0x0B] = entry("ud2", Operation::Undefined, &[]);
    table[0x0D] = Slot::Group(GROUP_P);
    table[0x18] = Slot::Group(GROUP_16);
    // Hint NOPs (0F 19-1E) and the multi-byte NOP (0F 1F)
    let mut hint = 0x19;
    while hint <= 0x1F {
        table[hint] = entry("nop", Operation::Nop, T_EV_NONE);
        hint += 1;
    }
    table[0x31] = entry("rdtsc", Operation::Other(0x31), &[]);
    table[0x34] = entry("sysenter", Operation::Syscall, &[]);
    table[0xA2] = entry("cpuid", Operation::Other(0xA2), &[]);

    table[0xA0] = entry_with(push_seg(T_PUSH_FS));
    table[0xA1] = entry_with(pop_seg(T_POP_FS));
    table[0xA8] = entry_with(push_seg(T_PUSH_GS));
    table[0xA9] = entry_with(pop_seg(T_POP_GS));

    let mut cc = 0;
    while cc < 16 {
        table[0x40 + cc] = entry(CMOVCC[cc], Operation::ConditionalMove, T_GV_EV);
        table[0x80 + cc] = entry_with(
            OpcodeEntry::new(JCC[cc], Operation::ConditionalJump, T_JZ).with_flags(DEFAULT_64),
        );
        table[0x90 + cc] = entry(SETCC[cc], Operation::SetCondition, T_EB_W);
        cc += 1;
    }

    table[0xA3] = entry("bt", Operation::BitTest, T_EV_GV_R);
    table[0xAB] = lockable("bts", Operation::BitTest, T_EV_GV);
    table[0xAF] = entry("imul", Operation::Mul, T_GV_EV);
    table[0xB3] = lockable("btr", Operation::BitTest, T_EV_GV);
    table[0xBB] = lockable("btc", Operation::BitTest, T_EV_GV);
    table[0xBA] = Slot::Group(GROUP_8);

    // SHLD / SHRD
    table[0xA4] = entry("shld", Operation::ShiftDouble, T_SHIFTD_IB);
    table[0xA5] = entry("shld", Operation::ShiftDouble, T_SHIFTD_CL);
    table[0xAC] = entry("shrd", Operation::ShiftDouble, T_SHIFTD_IB);
    table[0xAD] = entry("shrd", Operation::ShiftDouble, T_SHIFTD_CL);

    // CMPXCHG / XADD (accumulator and flags are implicit)
    table[0xB0] = lockable("cmpxchg", Operation::CompareExchange, T_EB_GB);
    table[0xB1] = lockable("cmpxchg", Operation::CompareExchange, T_EV_GV);
    table[0xC0] = lockable("xadd", Operation::ExchangeAdd, T_XCHG_EB_GB);
    table[0xC1] = lockable("xadd", Operation::ExchangeAdd, T_XCHG_EV_GV);
    table[0xC7] = Slot::Group(GROUP_9);

    // BSF / BSR (TZCNT / LZCNT under F3)
    table[0xBC] = entry("bsf", Operation::BitScan, T_MOV_GV_EV);
    table[0xBD] = entry("bsr", Operation::BitScan, T_MOV_GV_EV);

    // MOVZX / MOVSX
    table[0xB6] = entry("movzx", Operation::ZeroExtend, T_MOV_GV_EB);
    table[0xB7] = entry("movzx", Operation::ZeroExtend, T_MOV_GV_EW);
    table[0xBE] = entry("movsx", Operation::SignExtend, T_MOV_GV_EB);
    table[0xBF] = entry("movsx", Operation::SignExtend, T_MOV_GV_EW);

    // BSWAP r
    let mut r = 0;
    while r < 8 {
        table[0xC8 + r] = entry("bswap", Operation::ByteSwap, T_ZV_RW);
        r += 1;
    }

    table
};

/// 0x0F map entries selected by a mandatory F3 prefix.
pub static OPCODE_TABLE_F3_0F: [Slot; 256] = {
    let mut table: [Slot; 256] = [EMPTY; 256];

    table[0x1E] = entry("nop", Operation::Nop, T_EV_NONE);
    table[0xB8] = entry("popcnt", Operation::BitCount, T_MOV_GV_EV);
    table[0xBC] = entry("tzcnt", Operation::BitCount, T_MOV_GV_EV);
    table[0xBD] = entry("lzcnt", Operation::BitCount, T_MOV_GV_EV);

    table
};
