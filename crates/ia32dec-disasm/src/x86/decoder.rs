//! x86 / x86-64 instruction decoder.

use super::modrm::{decode_segment, ModRM, Sib};
use super::opcodes::{
    Loc, OpcodeEntry, OpcodeTables, Slot, Sz, DEFAULT_64, ENDBR32, ENDBR64, LOCKABLE, ONLY_32,
    ONLY_64, PAUSE, TABLES, XCHG_R8_RAX,
};
use super::operands::{branch_target, read_le, resolve, sign_extend};
use super::{prefix, MAX_INSTRUCTION_LEN};
use crate::config::DecoderConfig;
use crate::error::DecodeError;
use crate::traits::Disassembler;
use ia32dec_core::{
    Architecture, Condition, ControlFlow, DeferredOperands, Displacement, EncodingLayout,
    Instruction, OperandKind, OperandSlot, OperandSource, OperandState, Operation, Prefixes,
};
use std::iter::FusedIterator;

/// x86 instruction decoder.
///
/// A decoder optionally borrows a byte buffer and keeps a cursor into it.
/// [`decode`](Self::decode) reads the instruction at the cursor and moves
/// past it; [`decode_at`](Self::decode_at) decodes any other slice without
/// touching the cursor. The decoding mode (32 or 64-bit) is the only state
/// that carries over between calls.
#[derive(Debug, Clone)]
pub struct X86Decoder<'a> {
    buffer: Option<&'a [u8]>,
    cursor: usize,
    arch: Architecture,
    base_address: u64,
    defer_operands: bool,
    tables: &'static OpcodeTables,
}

impl<'a> X86Decoder<'a> {
    /// Creates a decoder over `buffer` in the given mode.
    pub fn new(buffer: &'a [u8], arch: Architecture) -> Self {
        Self::with_config(buffer, DecoderConfig::new(arch))
    }

    /// Creates a decoder over `buffer` with explicit options.
    pub fn with_config(buffer: &'a [u8], config: DecoderConfig) -> Self {
        Self {
            buffer: Some(buffer),
            ..Self::from_config(config)
        }
    }

    /// Creates a decoder with no bound buffer, for use with
    /// [`decode_at`](Self::decode_at).
    pub fn detached(arch: Architecture) -> Self {
        Self::from_config(DecoderConfig::new(arch))
    }

    /// Creates a decoder with no bound buffer and explicit options.
    pub fn from_config(config: DecoderConfig) -> Self {
        Self {
            buffer: None,
            cursor: 0,
            arch: config.architecture,
            base_address: config.base_address,
            defer_operands: config.defer_operands,
            tables: &TABLES,
        }
    }

    /// Decodes the instruction at the cursor.
    ///
    /// On success the cursor advances by the instruction's size. On failure
    /// it stays where it was. Without a bound buffer, or with the cursor at
    /// the end of it, this returns [`DecodeError::EndOfBuffer`].
    pub fn decode(&mut self) -> Result<Instruction, DecodeError> {
        let address = self.base_address.wrapping_add(self.cursor as u64);
        let remaining = self
            .buffer
            .and_then(|buffer| buffer.get(self.cursor..))
            .unwrap_or(&[]);

        let insn = self.decode_at(remaining, address)?;
        self.cursor += insn.size;
        Ok(insn)
    }

    /// Decodes one instruction from the start of `bytes`, independent of the
    /// bound buffer and cursor.
    pub fn decode_at(&self, bytes: &[u8], address: u64) -> Result<Instruction, DecodeError> {
        let result = self.decode_skeleton(bytes, address).and_then(|mut insn| {
            if !self.defer_operands {
                complete(&mut insn)?;
            }
            Ok(insn)
        });

        match &result {
            Ok(insn) => log::trace!(
                "{:#x}: {} ({} bytes, {})",
                address,
                insn.mnemonic,
                insn.size,
                self.arch
            ),
            Err(err) => log::debug!("decode failed in {} mode: {}", self.arch, err),
        }

        result
    }

    /// Resolves the deferred operands of `insn`. Does nothing if the
    /// operands are already complete.
    ///
    /// Completion uses only what was recorded on the instruction, so the
    /// result does not depend on this decoder's current mode.
    pub fn complete(&self, insn: &mut Instruction) -> Result<(), DecodeError> {
        complete(insn)
    }

    /// Switches between 32-bit (`false`) and 64-bit (`true`) decoding.
    pub fn set_mode(&mut self, is_64: bool) {
        self.set_architecture(Architecture::from_mode(is_64));
    }

    /// Sets the decoding mode.
    pub fn set_architecture(&mut self, arch: Architecture) {
        if self.arch != arch {
            log::debug!("decoder mode {} -> {}", self.arch, arch);
        }
        self.arch = arch;
    }

    /// Binds a new buffer and resets the cursor to its start.
    pub fn rebind(&mut self, buffer: &'a [u8]) {
        log::debug!("decoder rebound to {} bytes", buffer.len());
        self.buffer = Some(buffer);
        self.cursor = 0;
    }

    /// Moves the cursor forward to `offset`.
    ///
    /// Returns false, leaving the cursor unchanged, if `offset` lies behind
    /// the cursor or past the end of the bound buffer.
    pub fn seek(&mut self, offset: usize) -> bool {
        let len = self.buffer.map_or(0, <[u8]>::len);
        if offset < self.cursor || offset > len {
            return false;
        }
        self.cursor = offset;
        true
    }

    /// Current cursor offset into the bound buffer.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.buffer
            .map_or(0, |buffer| buffer.len().saturating_sub(self.cursor))
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Address of the first byte of the bound buffer.
    pub fn base_address(&self) -> u64 {
        self.base_address
    }

    /// Address of the byte at the cursor.
    pub fn current_address(&self) -> u64 {
        self.base_address.wrapping_add(self.cursor as u64)
    }

    pub fn architecture(&self) -> Architecture {
        self.arch
    }

    pub fn is_64bit(&self) -> bool {
        self.arch.is_64bit()
    }

    pub fn defers_operands(&self) -> bool {
        self.defer_operands
    }

    /// Iterates over the instructions remaining in the bound buffer.
    ///
    /// Stops at the end of the buffer or after the first error.
    pub fn instructions(&mut self) -> Instructions<'_, 'a> {
        Instructions {
            decoder: self,
            done: false,
        }
    }

    /// First phase: validate the encoding and build the skeleton.
    fn decode_skeleton(&self, bytes: &[u8], address: u64) -> Result<Instruction, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::end_of_buffer(address));
        }

        let arch = self.arch;
        let (prefixes, prefix_len) = prefix::parse(bytes, arch);
        if prefix_len >= MAX_INSTRUCTION_LEN {
            return Err(DecodeError::invalid_encoding(
                address,
                "prefixes exceed the maximum instruction length",
            ));
        }

        let mut reader = Reader {
            bytes,
            address,
            offset: prefix_len,
        };

        // Check for two-byte opcode escape
        let mut opcode = reader.byte()?;
        let escaped = opcode == 0x0F;
        if escaped {
            opcode = reader.byte()?;
        }
        let opcode_offset = reader.offset - 1;

        let (entry, modrm) = match self.tables.lookup(escaped, opcode, prefixes.rep) {
            Slot::Empty => {
                return Err(DecodeError::unknown_opcode(address, &bytes[..reader.offset]));
            }
            Slot::Entry(entry) => {
                let modrm = if entry.needs_modrm() {
                    Some((reader.offset, reader.byte()?))
                } else {
                    None
                };
                (entry, modrm)
            }
            Slot::Group(group) => {
                if !escaped && opcode == 0x82 && arch == Architecture::X86_64 {
                    return Err(DecodeError::invalid_encoding(
                        address,
                        "opcode 0x82 is not valid in 64-bit mode",
                    ));
                }
                let offset = reader.offset;
                let byte = reader.byte()?;
                let entry = self
                    .tables
                    .group_entry(group, (byte >> 3) & 0x7)
                    .copied()
                    .ok_or_else(|| DecodeError::unknown_opcode(address, &bytes[..reader.offset]))?;
                (entry, Some((offset, byte)))
            }
        };

        let entry = Self::special_case(entry, escaped, opcode, &prefixes, modrm.map(|(_, b)| b));
        Self::check_mode(&entry, arch, address)?;

        // Near branches always use 64-bit operands in long mode
        let is_branch = entry.operands.iter().any(|op| op.loc == Loc::J);
        let operand_size = if is_branch && arch == Architecture::X86_64 {
            64
        } else {
            prefix::operand_size(&prefixes, arch, entry.has_flag(DEFAULT_64))
        };
        let address_size = prefix::address_size(&prefixes, arch);

        let mut layout = EncodingLayout {
            opcode: opcode_offset as u8,
            address_size,
            ..Default::default()
        };

        // ModR/M, SIB and displacement
        let modrm = match modrm {
            Some((offset, byte)) => {
                let modrm = ModRM::parse(byte, prefixes.rex);
                layout.modrm = Some(offset as u8);

                let memory_only = entry.operands.iter().any(|op| op.loc == Loc::M);
                if memory_only && modrm.is_register() {
                    return Err(DecodeError::invalid_encoding(
                        address,
                        format!("{} requires a memory operand", entry.mnemonic),
                    ));
                }

                if let Some(segment) = entry.operands.iter().find(|op| op.loc == Loc::S) {
                    if decode_segment(modrm.reg).is_none() {
                        return Err(DecodeError::invalid_encoding(
                            address,
                            "reserved segment register encoding",
                        ));
                    }
                    // MOV CS, r/m does not exist
                    if segment.access.write && modrm.reg & 0x7 == 1 {
                        return Err(DecodeError::invalid_encoding(
                            address,
                            "cs cannot be loaded with mov",
                        ));
                    }
                }

                let sib = if modrm.needs_sib(address_size) {
                    layout.sib = Some(reader.offset as u8);
                    Some(Sib::parse(reader.byte()?, prefixes.rex))
                } else {
                    None
                };

                let width = modrm.displacement_width(address_size, sib);
                if width > 0 {
                    let offset = reader.take(width as usize)?;
                    layout.displacement = Some(Displacement {
                        offset: offset as u8,
                        width,
                    });
                }
                Some(modrm)
            }
            None => None,
        };
        Self::check_lock(&entry, &prefixes, modrm, address)?;

        // Operand slots, immediates consumed in template order
        let mut slots = Vec::with_capacity(entry.operands.len());
        let mut relative = None;
        for spec in entry.operands {
            let size = spec.size.bits(operand_size);
            let (kind, source, size) = match spec.loc {
                Loc::E | Loc::M => {
                    let modrm = modrm.ok_or_else(|| {
                        DecodeError::invalid_encoding(address, "missing ModR/M byte")
                    })?;
                    if modrm.is_register() {
                        (OperandKind::Register, OperandSource::ModRmRm, size)
                    } else if spec.size == Sz::RvMw {
                        (OperandKind::Memory, OperandSource::ModRmRm, 16)
                    } else {
                        (OperandKind::Memory, OperandSource::ModRmRm, size)
                    }
                }
                Loc::G => (OperandKind::Register, OperandSource::ModRmReg, size),
                Loc::S => (OperandKind::Register, OperandSource::ModRmSegment, 16),
                Loc::Z => (OperandKind::Register, OperandSource::OpcodeReg, size),
                Loc::Reg(id) => (OperandKind::Register, OperandSource::FixedRegister(id), size),
                Loc::Seg(id) => (OperandKind::Register, OperandSource::SegmentRegister(id), 16),
                Loc::One => (OperandKind::Immediate, OperandSource::Constant(1), 8),
                Loc::I => {
                    let width = (size / 8) as u8;
                    let offset = reader.take(width as usize)? as u8;
                    let source = OperandSource::Immediate {
                        offset,
                        width,
                        signed: spec.signed,
                    };
                    (OperandKind::Immediate, source, size)
                }
                Loc::J => {
                    let width = (size / 8) as u8;
                    let offset = reader.take(width as usize)? as u8;
                    relative = Some((offset as usize, width as usize));
                    let source = OperandSource::Relative { offset, width };
                    (OperandKind::Relative, source, operand_size)
                }
                Loc::O => {
                    let width = (address_size / 8) as u8;
                    let offset = reader.take(width as usize)? as u8;
                    let source = OperandSource::MemoryOffset { offset, width };
                    (OperandKind::Memory, source, size)
                }
            };
            slots.push(OperandSlot {
                kind,
                source,
                size,
                access: spec.access,
            });
        }

        let size = reader.offset;
        if size > MAX_INSTRUCTION_LEN {
            return Err(DecodeError::invalid_encoding(
                address,
                format!("instruction is {} bytes long", size),
            ));
        }

        let mnemonic = if !escaped && opcode == 0xE3 {
            match address_size {
                16 => "jcxz",
                32 => "jecxz",
                _ => "jrcxz",
            }
        } else {
            entry.mnemonic_for(operand_size)
        };

        let next = address.wrapping_add(size as u64);
        let target = relative.and_then(|(offset, width)| {
            let rel = sign_extend(read_le(bytes, offset, width)?, width);
            Some(branch_target(arch, operand_size, next, rel))
        });
        let control_flow = Self::control_flow(&entry, escaped, opcode, target, next);

        Ok(Instruction {
            address,
            size,
            bytes: bytes[..size].to_vec(),
            arch,
            operation: entry.operation,
            mnemonic: mnemonic.to_string(),
            prefixes,
            operands: OperandState::Deferred(DeferredOperands { slots, layout }),
            control_flow,
        })
    }

    /// Encodings whose meaning depends on prefixes rather than the opcode
    /// map alone.
    fn special_case(
        entry: OpcodeEntry,
        escaped: bool,
        opcode: u8,
        prefixes: &Prefixes,
        modrm: Option<u8>,
    ) -> OpcodeEntry {
        match (escaped, opcode, modrm) {
            (false, 0x90, _) if prefixes.rex_bits().b => XCHG_R8_RAX,
            (false, 0x90, _) if prefixes.rep => PAUSE,
            (true, 0x1E, Some(0xFA)) if prefixes.rep => ENDBR64,
            (true, 0x1E, Some(0xFB)) if prefixes.rep => ENDBR32,
            _ => entry,
        }
    }

    /// LOCK is only valid on read-modify-write instructions with a memory
    /// destination.
    fn check_lock(
        entry: &OpcodeEntry,
        prefixes: &Prefixes,
        modrm: Option<ModRM>,
        address: u64,
    ) -> Result<(), DecodeError> {
        if !prefixes.lock {
            return Ok(());
        }
        if !entry.has_flag(LOCKABLE) {
            return Err(DecodeError::invalid_encoding(
                address,
                format!("lock prefix is not allowed on {}", entry.mnemonic),
            ));
        }
        let memory_destination = entry
            .operands
            .first()
            .is_some_and(|op| matches!(op.loc, Loc::E | Loc::M))
            && modrm.is_some_and(|modrm| !modrm.is_register());
        if !memory_destination {
            return Err(DecodeError::invalid_encoding(
                address,
                format!("lock {} requires a memory destination", entry.mnemonic),
            ));
        }
        Ok(())
    }

    fn check_mode(entry: &OpcodeEntry, arch: Architecture, address: u64) -> Result<(), DecodeError> {
        match arch {
            Architecture::X86_64 if entry.has_flag(ONLY_32) => Err(DecodeError::invalid_encoding(
                address,
                format!("{} is not valid in 64-bit mode", entry.mnemonic),
            )),
            Architecture::X86 if entry.has_flag(ONLY_64) => Err(DecodeError::invalid_encoding(
                address,
                format!("{} is only valid in 64-bit mode", entry.mnemonic),
            )),
            _ => Ok(()),
        }
    }

    fn control_flow(
        entry: &OpcodeEntry,
        escaped: bool,
        opcode: u8,
        target: Option<u64>,
        next: u64,
    ) -> ControlFlow {
        match (entry.operation, target) {
            (Operation::Jump, Some(target)) => ControlFlow::UnconditionalBranch { target },
            (Operation::Jump, None) => ControlFlow::IndirectBranch,
            (Operation::ConditionalJump, Some(target)) => {
                let condition = if !escaped && opcode == 0xE3 {
                    Condition::CounterZero
                } else {
                    Condition::from_opcode(opcode)
                };
                ControlFlow::ConditionalBranch {
                    target,
                    condition,
                    fallthrough: next,
                }
            }
            (Operation::Loop, Some(target)) => {
                let condition = match opcode {
                    0xE0 => Condition::CounterNotZeroAndNotEqual,
                    0xE1 => Condition::CounterNotZeroAndEqual,
                    _ => Condition::CounterNotZero,
                };
                ControlFlow::ConditionalBranch {
                    target,
                    condition,
                    fallthrough: next,
                }
            }
            (Operation::Call, Some(target)) => ControlFlow::Call {
                target,
                return_addr: next,
            },
            (Operation::Call, None) => ControlFlow::IndirectCall { return_addr: next },
            (Operation::Return, _) => ControlFlow::Return,
            (Operation::Syscall, _) => ControlFlow::Syscall,
            // int imm8 is the legacy system call gate
            (Operation::Interrupt, _) if !escaped && opcode == 0xCD => ControlFlow::Syscall,
            (Operation::Interrupt | Operation::Halt | Operation::Undefined, _) => ControlFlow::Halt,
            _ => ControlFlow::Sequential,
        }
    }
}

impl Default for X86Decoder<'_> {
    /// A 32-bit decoder with no bound buffer.
    fn default() -> Self {
        Self::from_config(DecoderConfig::default())
    }
}

/// Resolves the deferred operands of `insn` in place.
///
/// Idempotent: an instruction whose operands are already complete is left
/// untouched.
pub fn complete(insn: &mut Instruction) -> Result<(), DecodeError> {
    let operands = match &insn.operands {
        OperandState::Complete(_) => return Ok(()),
        OperandState::Deferred(deferred) => resolve(insn, deferred)?,
    };
    insn.operands = OperandState::Complete(operands);
    Ok(())
}

/// Bounds-checked reader over the bytes of one instruction.
struct Reader<'b> {
    bytes: &'b [u8],
    address: u64,
    offset: usize,
}

impl Reader<'_> {
    fn byte(&mut self) -> Result<u8, DecodeError> {
        let byte = *self.bytes.get(self.offset).ok_or_else(|| {
            DecodeError::truncated(self.address, self.offset + 1, self.bytes.len())
        })?;
        self.offset += 1;
        Ok(byte)
    }

    /// Skips `width` bytes, returning the offset of the first.
    fn take(&mut self, width: usize) -> Result<usize, DecodeError> {
        let start = self.offset;
        let end = start + width;
        if end > self.bytes.len() {
            return Err(DecodeError::truncated(self.address, end, self.bytes.len()));
        }
        self.offset = end;
        Ok(start)
    }
}

/// Iterator returned by [`X86Decoder::instructions`].
#[derive(Debug)]
pub struct Instructions<'d, 'a> {
    decoder: &'d mut X86Decoder<'a>,
    done: bool,
}

impl Iterator for Instructions<'_, '_> {
    type Item = Result<Instruction, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.decoder.decode() {
            Ok(insn) => Some(Ok(insn)),
            Err(err) if err.is_end_of_buffer() => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for Instructions<'_, '_> {}

impl Disassembler for X86Decoder<'_> {
    fn decode_instruction(&self, bytes: &[u8], address: u64) -> Result<Instruction, DecodeError> {
        self.decode_at(bytes, address)
    }

    fn complete(&self, insn: &mut Instruction) -> Result<(), DecodeError> {
        complete(insn)
    }

    fn min_instruction_size(&self) -> usize {
        1
    }

    fn max_instruction_size(&self) -> usize {
        MAX_INSTRUCTION_LEN
    }

    fn is_fixed_width(&self) -> bool {
        false
    }

    fn architecture(&self) -> Architecture {
        self.arch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ia32dec_core::{register::x86, Operand, Register};

    fn decode64(bytes: &[u8]) -> Instruction {
        let decoder = X86Decoder::detached(Architecture::X86_64);
        let mut insn = decoder.decode_at(bytes, 0x1000).unwrap();
        decoder.complete(&mut insn).unwrap();
        insn
    }

    fn decode32(bytes: &[u8]) -> Instruction {
        let decoder = X86Decoder::detached(Architecture::X86);
        let mut insn = decoder.decode_at(bytes, 0x1000).unwrap();
        decoder.complete(&mut insn).unwrap();
        insn
    }

    fn text(insn: &Instruction) -> String {
        let ops: Vec<String> = insn
            .operands()
            .unwrap()
            .iter()
            .map(|op| op.operand.to_string())
            .collect();
        if ops.is_empty() {
            insn.mnemonic.clone()
        } else {
            format!("{} {}", insn.mnemonic, ops.join(", "))
        }
    }

    #[test]
    fn test_nop() {
        let insn = decode64(&[0x90]);
        assert_eq!(insn.mnemonic, "nop");
        assert_eq!(insn.size, 1);
    }

    #[test]
    fn test_push_rbp() {
        let insn = decode64(&[0x55]);
        assert_eq!(text(&insn), "push rbp");
        assert_eq!(text(&decode32(&[0x55])), "push ebp");
    }

    #[test]
    fn test_mov_rbp_rsp() {
        // mov rbp, rsp (48 89 e5)
        let insn = decode64(&[0x48, 0x89, 0xe5]);
        assert_eq!(text(&insn), "mov rbp, rsp");
        assert_eq!(insn.size, 3);
    }

    #[test]
    fn test_ret() {
        let insn = decode64(&[0xc3]);
        assert_eq!(insn.mnemonic, "ret");
        assert!(matches!(insn.control_flow, ControlFlow::Return));
    }

    #[test]
    fn test_call_rel32() {
        // call +0x100
        let insn = decode64(&[0xe8, 0x00, 0x01, 0x00, 0x00]);
        assert_eq!(insn.mnemonic, "call");
        assert!(matches!(insn.control_flow, ControlFlow::Call { target: 0x1105, .. }));
        assert_eq!(text(&insn), "call 0x1105");
    }

    #[test]
    fn test_jne_rel8() {
        // jne +0x10
        let insn = decode64(&[0x75, 0x10]);
        assert_eq!(insn.mnemonic, "jne");
        assert!(matches!(
            insn.control_flow,
            ControlFlow::ConditionalBranch { target: 0x1012, condition: Condition::NotEqual, .. }
        ));
    }

    #[test]
    fn test_add_eax_imm() {
        // add eax, 0x42
        let insn = decode64(&[0x05, 0x42, 0x00, 0x00, 0x00]);
        assert_eq!(text(&insn), "add eax, 0x42");
        assert_eq!(insn.operand_count(), 2);
    }

    #[test]
    fn test_syscall() {
        let insn = decode64(&[0x0f, 0x05]);
        assert_eq!(insn.mnemonic, "syscall");
        assert!(matches!(insn.control_flow, ControlFlow::Syscall));
    }

    #[test]
    fn test_group1_sign_extended_imm8() {
        // sub rsp, 0x10
        assert_eq!(text(&decode64(&[0x48, 0x83, 0xec, 0x10])), "sub rsp, 0x10");
        // and esp, -0x10
        assert_eq!(text(&decode32(&[0x83, 0xe4, 0xf0])), "and esp, -0x10");
    }

    #[test]
    fn test_memory_operands() {
        // mov dword ptr [rbp - 0x4], edi
        assert_eq!(
            text(&decode64(&[0x89, 0x7d, 0xfc])),
            "mov dword ptr [rbp - 0x4], edi"
        );
        // mov rax, qword ptr fs:[0x28]
        assert_eq!(
            text(&decode64(&[0x64, 0x48, 0x8b, 0x04, 0x25, 0x28, 0x00, 0x00, 0x00])),
            "mov rax, qword ptr fs:[0x28]"
        );
        // lea rdi, [rip + 0x2f5e]
        assert_eq!(
            text(&decode64(&[0x48, 0x8d, 0x3d, 0x5e, 0x2f, 0x00, 0x00])),
            "lea rdi, [rip + 0x2f5e]"
        );
    }

    #[test]
    fn test_16bit_addressing_in_32bit_mode() {
        // mov ax, word ptr [bx + si]
        assert_eq!(
            text(&decode32(&[0x66, 0x67, 0x8b, 0x00])),
            "mov ax, word ptr [bx + si]"
        );
    }

    #[test]
    fn test_rex_extended_registers() {
        // mov r8, r9
        assert_eq!(text(&decode64(&[0x4d, 0x89, 0xc8])), "mov r8, r9");
        // push r12
        assert_eq!(text(&decode64(&[0x41, 0x54])), "push r12");
        // xchg r8, rax
        assert_eq!(text(&decode64(&[0x49, 0x90])), "xchg r8, rax");
    }

    #[test]
    fn test_high_byte_registers_without_rex() {
        // mov ah, bh
        assert_eq!(text(&decode64(&[0x88, 0xfc])), "mov ah, bh");
        // mov spl, dil
        assert_eq!(text(&decode64(&[0x40, 0x88, 0xfc])), "mov spl, dil");
    }

    #[test]
    fn test_mov_imm64() {
        let insn = decode64(&[0x48, 0xb8, 0xef, 0xbe, 0xad, 0xde, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(insn.size, 10);
        assert_eq!(text(&insn), "mov rax, 0xdeadbeef");
    }

    #[test]
    fn test_sized_mnemonics() {
        assert_eq!(decode64(&[0x48, 0x98]).mnemonic, "cdqe");
        assert_eq!(decode32(&[0x98]).mnemonic, "cwde");
        assert_eq!(decode32(&[0x66, 0x98]).mnemonic, "cbw");
        assert_eq!(decode64(&[0xf3, 0x48, 0xab]).mnemonic, "stosq");
        assert_eq!(decode64(&[0xf3, 0x90]).mnemonic, "pause");
    }

    #[test]
    fn test_moffs_uses_address_size() {
        // mov eax, dword ptr [0x12345678]
        let insn = decode32(&[0xa1, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(insn.size, 5);
        assert_eq!(text(&insn), "mov eax, dword ptr [0x12345678]");

        let insn = decode64(&[0xa1, 0x78, 0x56, 0x34, 0x12, 0, 0, 0, 0]);
        assert_eq!(insn.size, 9);
    }

    #[test]
    fn test_enter_and_ret_imm() {
        assert_eq!(text(&decode32(&[0xc8, 0x10, 0x00, 0x01])), "enter 0x10, 0x1");
        assert_eq!(text(&decode32(&[0xc2, 0x08, 0x00])), "ret 0x8");
    }

    #[test]
    fn test_shift_forms() {
        assert_eq!(text(&decode64(&[0xd1, 0xe0])), "shl eax, 0x1");
        assert_eq!(text(&decode64(&[0x48, 0xd3, 0xf8])), "sar rax, cl");
        assert_eq!(text(&decode64(&[0xc1, 0xe8, 0x04])), "shr eax, 0x4");
    }

    #[test]
    fn test_two_byte_opcodes() {
        assert_eq!(text(&decode64(&[0x0f, 0xb6, 0xc0])), "movzx eax, al");
        assert_eq!(text(&decode64(&[0x0f, 0x94, 0xc0])), "sete al");
        assert_eq!(text(&decode64(&[0x48, 0x0f, 0x4f, 0xc1])), "cmovg rax, rcx");
        assert_eq!(text(&decode64(&[0x0f, 0xc8])), "bswap eax");
        assert_eq!(text(&decode64(&[0x48, 0x63, 0xc7])), "movsxd rax, edi");
    }

    #[test]
    fn test_jcc_rel32_in_32bit_mode_wraps() {
        // je -0x1007 from 0x1000 wraps below zero
        let insn = decode32(&[0x0f, 0x84, 0xf9, 0xef, 0xff, 0xff]);
        assert!(matches!(
            insn.control_flow,
            ControlFlow::ConditionalBranch { target: 0xFFFF_FFFF, .. }
        ));
    }

    #[test]
    fn test_indirect_branches() {
        // call qword ptr [rax]
        let insn = decode64(&[0xff, 0x10]);
        assert!(matches!(insn.control_flow, ControlFlow::IndirectCall { return_addr: 0x1002 }));
        // jmp rax
        let insn = decode64(&[0xff, 0xe0]);
        assert!(matches!(insn.control_flow, ControlFlow::IndirectBranch));
        assert_eq!(text(&insn), "jmp rax");
    }

    #[test]
    fn test_mode_invalid_opcodes() {
        let decoder = X86Decoder::detached(Architecture::X86_64);
        for bytes in [&[0x06][..], &[0x27], &[0x60], &[0xce], &[0x82, 0xc0, 0x01]] {
            let err = decoder.decode_at(bytes, 0).unwrap_err();
            assert!(matches!(err, DecodeError::InvalidEncoding { .. }), "{bytes:02x?}");
        }

        let decoder = X86Decoder::detached(Architecture::X86);
        assert!(decoder.decode_at(&[0x0f, 0x05], 0).is_err());
        assert!(decoder.decode_at(&[0x63, 0xc7], 0).is_err());
        assert_eq!(decoder.decode_at(&[0x06], 0).unwrap().mnemonic, "push");
    }

    #[test]
    fn test_lea_register_form_is_invalid() {
        let decoder = X86Decoder::detached(Architecture::X86_64);
        let err = decoder.decode_at(&[0x48, 0x8d, 0xc0], 0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_unknown_opcode() {
        let decoder = X86Decoder::detached(Architecture::X86_64);
        let err = decoder.decode_at(&[0x0f, 0xff], 0x40).unwrap_err();
        assert_eq!(err, DecodeError::unknown_opcode(0x40, &[0x0f, 0xff]));
        // ff /7 is unassigned
        assert!(matches!(
            decoder.decode_at(&[0xff, 0xf8], 0),
            Err(DecodeError::UnknownOpcode { .. })
        ));
    }

    #[test]
    fn test_overlong_instruction() {
        let decoder = X86Decoder::detached(Architecture::X86);
        let mut bytes = vec![0x66; 14];
        bytes.extend_from_slice(&[0x05, 0x01, 0x00]);
        let err = decoder.decode_at(&bytes, 0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding { .. }));

        let err = decoder.decode_at(&[0x66; 20], 0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_truncated() {
        let decoder = X86Decoder::detached(Architecture::X86_64);
        let err = decoder.decode_at(&[0xe8, 0x00, 0x01], 0x10).unwrap_err();
        assert_eq!(err, DecodeError::truncated(0x10, 5, 3));
        assert!(decoder.decode_at(&[0x48], 0).is_err());
        assert!(decoder.decode_at(&[0x0f], 0).is_err());
    }

    #[test]
    fn test_eager_config_completes_operands() {
        let config = DecoderConfig::new(Architecture::X86_64).eager();
        let decoder = X86Decoder::from_config(config);
        let insn = decoder.decode_at(&[0x48, 0x89, 0xe5], 0).unwrap();
        assert!(insn.is_complete());
        assert!(insn.deferred().is_none());
        assert_eq!(insn.write_set(), vec![Register::gpr(x86::RBP, 64)]);
    }

    #[test]
    fn test_deferred_skeleton_kinds() {
        let decoder = X86Decoder::detached(Architecture::X86_64);
        let insn = decoder.decode_at(&[0x89, 0x7d, 0xfc], 0).unwrap();
        assert!(!insn.is_complete());
        assert_eq!(
            insn.operand_kinds(),
            vec![OperandKind::Memory, OperandKind::Register]
        );
        let layout = insn.deferred().map(|deferred| deferred.layout);
        assert_eq!(layout.and_then(|layout| layout.displacement.map(|d| d.offset)), Some(2));
        assert!(insn.to_string().ends_with("mov <deferred>"));
    }

    #[test]
    fn test_completion_ignores_current_mode() {
        let mut decoder = X86Decoder::detached(Architecture::X86_64);
        let mut insn = decoder.decode_at(&[0x48, 0x89, 0xe5], 0).unwrap();
        decoder.set_mode(false);
        decoder.complete(&mut insn).unwrap();
        let ops = insn.operands().unwrap();
        assert_eq!(ops[0].operand, Operand::reg(Register::gpr(x86::RBP, 64)));
    }

    #[test]
    fn test_seek_is_forward_only() {
        let code = [0x90, 0x90, 0x90];
        let mut decoder = X86Decoder::new(&code, Architecture::X86);
        assert!(decoder.seek(2));
        assert!(!decoder.seek(1));
        assert!(!decoder.seek(4));
        assert_eq!(decoder.position(), 2);
        assert_eq!(decoder.remaining(), 1);
    }

    #[test]
    fn test_atomic_read_modify_write() {
        let insn = decode64(&[0xf0, 0x0f, 0xb1, 0x0a]);
        assert_eq!(text(&insn), "cmpxchg dword ptr [rdx], ecx");
        assert!(insn.prefixes.lock);
        assert!(insn.to_string().ends_with("lock cmpxchg dword ptr [rdx], ecx"));

        assert_eq!(text(&decode64(&[0xf0, 0x0f, 0xc1, 0x02])), "xadd dword ptr [rdx], eax");
        assert_eq!(text(&decode64(&[0x0f, 0xb0, 0xd1])), "cmpxchg cl, dl");
        assert_eq!(
            text(&decode64(&[0x48, 0x0f, 0xc7, 0x0f])),
            "cmpxchg16b xmmword ptr [rdi]"
        );
        assert_eq!(text(&decode32(&[0x0f, 0xc7, 0x0e])), "cmpxchg8b qword ptr [esi]");

        // CMPXCHG8B has no register form
        let decoder = X86Decoder::detached(Architecture::X86_64);
        let err = decoder.decode_at(&[0x0f, 0xc7, 0xc8], 0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_bit_scan_and_count() {
        assert_eq!(text(&decode64(&[0x0f, 0xbc, 0xc0])), "bsf eax, eax");
        assert_eq!(text(&decode64(&[0x48, 0x0f, 0xbd, 0xc7])), "bsr rax, rdi");
        assert_eq!(text(&decode64(&[0xf3, 0x48, 0x0f, 0xb8, 0xc0])), "popcnt rax, rax");
        assert_eq!(text(&decode64(&[0xf3, 0x0f, 0xbc, 0xc1])), "tzcnt eax, ecx");
        assert_eq!(text(&decode64(&[0xf3, 0x0f, 0xbd, 0xc1])), "lzcnt eax, ecx");

        // 0F B8 needs the F3 prefix
        let decoder = X86Decoder::detached(Architecture::X86_64);
        assert!(matches!(
            decoder.decode_at(&[0x0f, 0xb8, 0xc0], 0),
            Err(DecodeError::UnknownOpcode { .. })
        ));
    }

    #[test]
    fn test_double_shifts() {
        assert_eq!(text(&decode64(&[0x0f, 0xa4, 0xc8, 0x04])), "shld eax, ecx, 0x4");
        assert_eq!(text(&decode64(&[0x48, 0x0f, 0xa5, 0xd0])), "shld rax, rdx, cl");
        assert_eq!(text(&decode64(&[0x0f, 0xac, 0x03, 0x08])), "shrd dword ptr [rbx], eax, 0x8");
        assert_eq!(text(&decode32(&[0x0f, 0xad, 0xc2])), "shrd edx, eax, cl");
    }

    #[test]
    fn test_segment_register_moves() {
        assert_eq!(text(&decode64(&[0x8c, 0xd8])), "mov eax, ds");
        assert_eq!(text(&decode64(&[0x8c, 0x18])), "mov word ptr [rax], ds");
        assert_eq!(text(&decode32(&[0x8e, 0xd8])), "mov ds, ax");
        assert_eq!(text(&decode64(&[0x8e, 0x20])), "mov fs, word ptr [rax]");

        let decoder = X86Decoder::detached(Architecture::X86_64);
        // Segment encodings 6 and 7 are reserved
        for bytes in [[0x8c, 0xf0], [0x8e, 0xf8]] {
            let err = decoder.decode_at(&bytes, 0).unwrap_err();
            assert!(matches!(err, DecodeError::InvalidEncoding { .. }), "{bytes:02x?}");
        }
        // mov cs, eax
        let err = decoder.decode_at(&[0x8e, 0xc8], 0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidEncoding { .. }));
    }

    #[test]
    fn test_xlat_and_hints() {
        let insn = decode64(&[0xd7]);
        assert_eq!(insn.mnemonic, "xlatb");
        assert_eq!(insn.operation, Operation::Load);

        assert_eq!(text(&decode64(&[0x0f, 0x18, 0x08])), "prefetcht0 byte ptr [rax]");
        assert_eq!(text(&decode64(&[0x0f, 0x18, 0x00])), "prefetchnta byte ptr [rax]");
        assert_eq!(text(&decode64(&[0x0f, 0x0d, 0x09])), "prefetchw byte ptr [rcx]");

        let insn = decode64(&[0xf3, 0x0f, 0x1e, 0xfa]);
        assert_eq!(insn.mnemonic, "endbr64");
        assert_eq!(insn.size, 4);
        assert_eq!(insn.operand_count(), 0);
        assert_eq!(decode32(&[0xf3, 0x0f, 0x1e, 0xfb]).mnemonic, "endbr32");
        // Without F3 it is a hint NOP
        assert_eq!(decode64(&[0x0f, 0x1e, 0xfa]).mnemonic, "nop");
    }

    #[test]
    fn test_lock_prefix_validation() {
        let decoder = X86Decoder::detached(Architecture::X86_64);
        let invalid: [&[u8]; 6] = [
            &[0xf0, 0x90],                   // lock nop
            &[0xf0, 0x89, 0xc0],             // lock mov eax, eax
            &[0xf0, 0x89, 0x00],             // mov is never lockable
            &[0xf0, 0x01, 0xc0],             // register destination
            &[0xf0, 0x83, 0x38, 0x01],       // cmp does not write
            &[0xf0, 0x05, 0x01, 0x00, 0x00, 0x00], // accumulator form
        ];
        for bytes in invalid {
            let err = decoder.decode_at(bytes, 0).unwrap_err();
            assert!(matches!(err, DecodeError::InvalidEncoding { .. }), "{bytes:02x?}");
        }

        assert_eq!(
            text(&decode64(&[0xf0, 0x48, 0x83, 0x00, 0x01])),
            "add qword ptr [rax], 0x1"
        );
        assert_eq!(text(&decode64(&[0xf0, 0xff, 0x03])), "inc dword ptr [rbx]");
        assert_eq!(text(&decode64(&[0xf0, 0x87, 0x03])), "xchg dword ptr [rbx], eax");
        assert_eq!(text(&decode64(&[0xf0, 0x0f, 0xba, 0x28, 0x03])), "bts dword ptr [rax], 0x3");
        assert_eq!(text(&decode64(&[0xf0, 0xf7, 0x1e])), "neg dword ptr [rsi]");
    }

    #[test]
    fn test_address_size_override_in_long_mode() {
        // EIP-relative
        assert_eq!(
            text(&decode64(&[0x67, 0x48, 0x8d, 0x05, 0x10, 0x00, 0x00, 0x00])),
            "lea rax, [eip + 0x10]"
        );
        // 32-bit base and index
        assert_eq!(
            text(&decode64(&[0x67, 0x8b, 0x04, 0x8b])),
            "mov eax, dword ptr [ebx + ecx*4]"
        );
        // moffs shrinks to four bytes
        let insn = decode64(&[0x67, 0xa1, 0x78, 0x56, 0x34, 0x12]);
        assert_eq!(insn.size, 6);
        assert_eq!(text(&insn), "mov eax, dword ptr [0x12345678]");
    }

    #[test]
    fn test_sib_without_base_or_index() {
        // disp32 is sign-extended to the address size
        assert_eq!(
            text(&decode64(&[0x8b, 0x04, 0x25, 0xf0, 0xff, 0xff, 0xff])),
            "mov eax, dword ptr [0xfffffffffffffff0]"
        );
        assert_eq!(
            text(&decode64(&[0x67, 0x8b, 0x04, 0x25, 0xf0, 0xff, 0xff, 0xff])),
            "mov eax, dword ptr [0xfffffff0]"
        );
        assert_eq!(
            text(&decode32(&[0x8b, 0x04, 0x25, 0x00, 0x10, 0x00, 0x00])),
            "mov eax, dword ptr [0x1000]"
        );
    }

    #[test]
    fn test_rex_before_legacy_prefix_is_ignored() {
        // REX.W is discarded because 0x66 follows it
        let insn = decode64(&[0x48, 0x66, 0x89, 0xe5]);
        assert_eq!(insn.size, 4);
        assert!(insn.prefixes.rex.is_none());
        assert_eq!(text(&insn), "mov bp, sp");

        // REX.B lost the same way: r/m is rax, not r8
        assert_eq!(text(&decode64(&[0x41, 0xf3, 0x90])), "pause");
        assert_eq!(text(&decode64(&[0x49, 0x2e, 0x89, 0xc0])), "mov eax, eax");
    }

    #[test]
    fn test_address_only_operands_drop_segment() {
        assert_eq!(text(&decode64(&[0x64, 0x48, 0x8d, 0x00])), "lea rax, [rax]");
        assert_eq!(text(&decode64(&[0x64, 0x48, 0x8b, 0x00])), "mov rax, qword ptr fs:[rax]");
    }

    #[test]
    fn test_loop_conditions() {
        let condition = |opcode| match decode64(&[opcode, 0xfe]).control_flow {
            ControlFlow::ConditionalBranch {
                target, condition, ..
            } => {
                assert_eq!(target, 0x1000);
                condition
            }
            other => panic!("expected a conditional branch, got {other:?}"),
        };
        assert_eq!(condition(0xe0), Condition::CounterNotZeroAndNotEqual);
        assert_eq!(condition(0xe1), Condition::CounterNotZeroAndEqual);
        assert_eq!(condition(0xe2), Condition::CounterNotZero);
        assert_eq!(condition(0xe3), Condition::CounterZero);
    }
}
