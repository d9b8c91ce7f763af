//! Decoder traits.

use crate::DecodeError;
use ia32dec_core::{Architecture, Instruction};

/// Contract shared by every instruction decoder in the crate.
pub trait Disassembler {
    /// Decode a single instruction starting at the given address.
    ///
    /// # Arguments
    /// * `bytes` - The raw bytes to decode
    /// * `address` - The virtual address of the first byte
    ///
    /// # Returns
    /// The decoded instruction; its `size` is the number of bytes consumed.
    fn decode_instruction(&self, bytes: &[u8], address: u64) -> Result<Instruction, DecodeError>;

    /// Resolve deferred operands. Calling this on a completed instruction
    /// is a no-op.
    fn complete(&self, insn: &mut Instruction) -> Result<(), DecodeError>;

    /// Returns the minimum instruction size for this architecture.
    fn min_instruction_size(&self) -> usize;

    /// Returns the maximum instruction size for this architecture.
    fn max_instruction_size(&self) -> usize;

    /// Returns whether instructions are fixed-width.
    fn is_fixed_width(&self) -> bool;

    /// Returns the current decoding architecture.
    fn architecture(&self) -> Architecture;

    /// Disassemble a block of code into instructions.
    fn disassemble_block(
        &self,
        bytes: &[u8],
        start_address: u64,
    ) -> Vec<Result<Instruction, DecodeError>> {
        let mut instructions = Vec::new();
        let mut offset = 0;

        while offset < bytes.len() {
            let remaining = &bytes[offset..];
            let address = start_address.wrapping_add(offset as u64);

            match self.decode_instruction(remaining, address) {
                Ok(insn) => {
                    offset += insn.size;
                    instructions.push(Ok(insn));
                }
                Err(e) => {
                    // On error, skip one byte and continue
                    offset += 1;
                    instructions.push(Err(e));
                }
            }
        }

        instructions
    }
}
