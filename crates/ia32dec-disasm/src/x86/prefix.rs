//! x86 prefix parsing and operand/address size resolution.

use super::MAX_INSTRUCTION_LEN;
use ia32dec_core::{Architecture, Prefixes, Rex, Segment};

fn is_legacy_prefix(byte: u8) -> bool {
    matches!(
        byte,
        0xF0 | 0xF2 | 0xF3 | 0x26 | 0x2E | 0x36 | 0x3E | 0x64 | 0x65 | 0x66 | 0x67
    )
}

/// Parse prefixes from the start of an instruction.
/// Returns the prefixes and the number of bytes consumed.
///
/// REX bytes are only prefixes in 64-bit mode and must directly precede
/// the opcode; a REX followed by another prefix is ignored. Parsing stops
/// after [`MAX_INSTRUCTION_LEN`] bytes.
pub fn parse(bytes: &[u8], arch: Architecture) -> (Prefixes, usize) {
    let mut prefixes = Prefixes::default();
    let mut offset = 0;

    while offset < bytes.len() && offset < MAX_INSTRUCTION_LEN {
        let byte = bytes[offset];

        match byte {
            // Group 1: LOCK and repeat
            0xF0 => prefixes.lock = true,
            0xF2 => {
                prefixes.repne = true;
                prefixes.rep = false;
            }
            0xF3 => {
                prefixes.rep = true;
                prefixes.repne = false;
            }

            // Group 2: Segment overrides
            0x26 => prefixes.segment = Some(Segment::ES),
            0x2E => prefixes.segment = Some(Segment::CS),
            0x36 => prefixes.segment = Some(Segment::SS),
            0x3E => prefixes.segment = Some(Segment::DS),
            0x64 => prefixes.segment = Some(Segment::FS),
            0x65 => prefixes.segment = Some(Segment::GS),

            // Group 3: Operand size override
            0x66 => prefixes.operand_size = true,

            // Group 4: Address size override
            0x67 => prefixes.address_size = true,

            0x40..=0x4F if arch == Architecture::X86_64 => {
                offset += 1;
                match bytes.get(offset) {
                    Some(&next) if is_legacy_prefix(next) || (0x40..=0x4F).contains(&next) => {
                        prefixes.rex = None;
                        continue;
                    }
                    _ => {
                        prefixes.rex = Some(Rex::from_byte(byte));
                        break;
                    }
                }
            }

            // Not a prefix
            _ => break,
        }

        // A legacy prefix cancels any REX seen before it.
        prefixes.rex = None;
        offset += 1;
    }

    (prefixes, offset)
}

/// Returns the effective operand size in bits.
///
/// `default_64` marks opcodes whose operand size defaults to 64 bits in
/// long mode (near branches, push/pop).
pub fn operand_size(prefixes: &Prefixes, arch: Architecture, default_64: bool) -> u16 {
    match arch {
        Architecture::X86_64 => {
            if prefixes.rex_w() {
                64
            } else if prefixes.operand_size {
                16
            } else if default_64 {
                64
            } else {
                32
            }
        }
        Architecture::X86 => {
            if prefixes.operand_size {
                16
            } else {
                32
            }
        }
    }
}

/// Returns the effective address size in bits.
pub fn address_size(prefixes: &Prefixes, arch: Architecture) -> u16 {
    match (arch, prefixes.address_size) {
        (Architecture::X86_64, false) => 64,
        (Architecture::X86_64, true) => 32,
        (Architecture::X86, false) => 32,
        (Architecture::X86, true) => 16,
    }
}
