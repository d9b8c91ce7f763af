//! Deferred operand completion.
//!
//! Everything here works from the data recorded on the instruction itself
//! (bytes, prefixes, architecture and the encoding layout), so completing
//! an instruction gives the same result regardless of what the decoder has
//! done since.

use super::modrm::{decode_gpr, decode_memory, decode_segment, ModRM, Sib};
use crate::error::DecodeError;
use ia32dec_core::{
    Access, Architecture, DecodedOperand, DeferredOperands, EncodingLayout, Instruction,
    MemoryRef, Operand, OperandSlot, OperandSource, Register,
};

/// Read a little-endian unsigned value of `width` bytes.
pub(crate) fn read_le(bytes: &[u8], offset: usize, width: usize) -> Option<u64> {
    let end = offset.checked_add(width)?;
    let raw = bytes.get(offset..end)?;
    Some(
        raw.iter()
            .rev()
            .fold(0u64, |acc, &byte| (acc << 8) | byte as u64),
    )
}

/// Sign-extend the low `width` bytes of `value`.
pub(crate) fn sign_extend(value: u64, width: usize) -> i64 {
    match width {
        1 => value as u8 as i8 as i64,
        2 => value as u16 as i16 as i64,
        4 => value as u32 as i32 as i64,
        _ => value as i64,
    }
}

/// Target of a relative branch. Outside long mode the instruction pointer
/// wraps at the operand size.
pub(crate) fn branch_target(arch: Architecture, operand_size: u16, next: u64, rel: i64) -> u64 {
    let target = next.wrapping_add(rel as u64);
    match (arch, operand_size) {
        (Architecture::X86_64, _) => target,
        (Architecture::X86, 16) => target & 0xFFFF,
        (Architecture::X86, _) => target & 0xFFFF_FFFF,
    }
}

/// Materialise every operand slot of a deferred instruction.
pub fn resolve(
    insn: &Instruction,
    deferred: &DeferredOperands,
) -> Result<Vec<DecodedOperand>, DecodeError> {
    deferred
        .slots
        .iter()
        .map(|slot| {
            let operand = resolve_slot(insn, &deferred.layout, slot)?;
            Ok(DecodedOperand::new(operand, slot.size, slot.access))
        })
        .collect()
}

fn resolve_slot(
    insn: &Instruction,
    layout: &EncodingLayout,
    slot: &OperandSlot,
) -> Result<Operand, DecodeError> {
    let rex_present = insn.prefixes.rex.is_some();
    let byte_at = |offset: u8| {
        insn.bytes
            .get(offset as usize)
            .copied()
            .ok_or_else(|| DecodeError::truncated(insn.address, offset as usize + 1, insn.bytes.len()))
    };
    let modrm = || -> Result<ModRM, DecodeError> {
        let offset = layout
            .modrm
            .ok_or_else(|| DecodeError::invalid_encoding(insn.address, "operand needs a ModR/M byte"))?;
        Ok(ModRM::parse(byte_at(offset)?, insn.prefixes.rex))
    };
    let field = |offset: u8, width: u8| {
        read_le(&insn.bytes, offset as usize, width as usize).ok_or_else(|| {
            DecodeError::truncated(
                insn.address,
                offset as usize + width as usize,
                insn.bytes.len(),
            )
        })
    };

    let operand = match slot.source {
        OperandSource::ModRmReg => Operand::reg(decode_gpr(modrm()?.reg, slot.size, rex_present)),

        OperandSource::ModRmRm => {
            let modrm = modrm()?;
            if modrm.is_register() {
                Operand::reg(decode_gpr(modrm.rm, slot.size, rex_present))
            } else {
                let sib = match layout.sib {
                    Some(offset) => Some(Sib::parse(byte_at(offset)?, insn.prefixes.rex)),
                    None => None,
                };
                let displacement = match layout.displacement {
                    Some(disp) => sign_extend(field(disp.offset, disp.width)?, disp.width as usize),
                    None => 0,
                };
                let mut mem = decode_memory(
                    modrm,
                    sib,
                    displacement,
                    layout.address_size,
                    insn.arch,
                    (slot.size / 8) as u8,
                );
                // Address-only operands (LEA, hint NOPs) never touch memory
                let segment = insn.prefixes.segment.filter(|_| slot.access != Access::NONE);
                if let Some(segment) = segment {
                    mem = mem.with_segment(segment.register());
                }
                Operand::Memory(mem)
            }
        }

        OperandSource::OpcodeReg => {
            let reg = (byte_at(layout.opcode)? & 0x7) | ((insn.prefixes.rex_bits().b as u8) << 3);
            Operand::reg(decode_gpr(reg, slot.size, rex_present))
        }

        OperandSource::FixedRegister(id) => Operand::reg(Register::gpr(id, slot.size)),

        OperandSource::SegmentRegister(id) => Operand::reg(Register::segment(id)),

        OperandSource::ModRmSegment => {
            let segment = decode_segment(modrm()?.reg).ok_or_else(|| {
                DecodeError::invalid_encoding(insn.address, "reserved segment register encoding")
            })?;
            Operand::reg(segment)
        }

        OperandSource::Immediate {
            offset,
            width,
            signed,
        } => {
            let raw = field(offset, width)?;
            if signed {
                Operand::imm(sign_extend(raw, width as usize) as i128, width * 8)
            } else {
                Operand::imm_unsigned(raw, width * 8)
            }
        }

        OperandSource::Relative { offset, width } => {
            let rel = sign_extend(field(offset, width)?, width as usize);
            let target = branch_target(insn.arch, slot.size, insn.end_address(), rel);
            Operand::pc_rel(rel, target)
        }

        OperandSource::MemoryOffset { offset, width } => {
            let address = field(offset, width)?;
            let mut mem = MemoryRef::absolute(address as i64, (slot.size / 8) as u8);
            if let Some(segment) = insn.prefixes.segment {
                mem = mem.with_segment(segment.register());
            }
            Operand::Memory(mem)
        }

        OperandSource::Constant(value) => Operand::imm(value as i128, 8),
    };

    Ok(operand)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_le() {
        let bytes = [0x78, 0x56, 0x34, 0x12, 0xff];
        assert_eq!(read_le(&bytes, 0, 4), Some(0x1234_5678));
        assert_eq!(read_le(&bytes, 4, 1), Some(0xff));
        assert_eq!(read_le(&bytes, 3, 4), None);
        assert_eq!(read_le(&bytes, usize::MAX, 2), None);
    }

    #[test]
    fn test_sign_extend() {
        assert_eq!(sign_extend(0xff, 1), -1);
        assert_eq!(sign_extend(0x7f, 1), 127);
        assert_eq!(sign_extend(0xfffe, 2), -2);
        assert_eq!(sign_extend(0x8000_0000, 4), i32::MIN as i64);
    }

    #[test]
    fn test_branch_target_wraps_outside_long_mode() {
        assert_eq!(branch_target(Architecture::X86, 32, 0xFFFF_FFFE, 4), 0x2);
        assert_eq!(branch_target(Architecture::X86, 16, 0x1_0010, -0x20), 0xFFF0);
        assert_eq!(
            branch_target(Architecture::X86_64, 64, 0xFFFF_FFFE, 4),
            0x1_0000_0002
        );
    }
}
