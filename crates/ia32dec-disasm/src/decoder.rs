//! Architecture-keyed decoder selection.

use crate::config::DecoderConfig;
use crate::traits::Disassembler;
use crate::x86::X86Decoder;
use crate::DecodeError;
use ia32dec_core::{Architecture, Instruction};

/// The set of decoders this crate provides.
///
/// Closed on purpose: callers match on it instead of holding a trait object,
/// and each variant implements [`Disassembler`].
#[derive(Debug, Clone)]
pub enum Decoder<'a> {
    /// IA-32 and x86-64 (mode switchable at runtime).
    X86(X86Decoder<'a>),
}

/// Creates the decoder for `arch`, optionally bound to a buffer.
pub fn make_decoder(arch: Architecture, buffer: Option<&[u8]>) -> Decoder<'_> {
    make_decoder_with_config(buffer, DecoderConfig::new(arch))
}

/// Creates a decoder from explicit options.
pub fn make_decoder_with_config(buffer: Option<&[u8]>, config: DecoderConfig) -> Decoder<'_> {
    match config.architecture {
        Architecture::X86 | Architecture::X86_64 => Decoder::X86(match buffer {
            Some(buffer) => X86Decoder::with_config(buffer, config),
            None => X86Decoder::from_config(config),
        }),
    }
}

impl<'a> Decoder<'a> {
    /// Decodes the instruction at the cursor of the bound buffer.
    pub fn decode(&mut self) -> Result<Instruction, DecodeError> {
        match self {
            Self::X86(decoder) => decoder.decode(),
        }
    }

    /// Decodes one instruction from `bytes`, ignoring the bound buffer.
    pub fn decode_at(&self, bytes: &[u8], address: u64) -> Result<Instruction, DecodeError> {
        match self {
            Self::X86(decoder) => decoder.decode_at(bytes, address),
        }
    }

    /// Switches between 32 and 64-bit decoding.
    pub fn set_mode(&mut self, is_64: bool) {
        match self {
            Self::X86(decoder) => decoder.set_mode(is_64),
        }
    }

    pub fn complete(&self, insn: &mut Instruction) -> Result<(), DecodeError> {
        match self {
            Self::X86(decoder) => decoder.complete(insn),
        }
    }

    pub fn rebind(&mut self, buffer: &'a [u8]) {
        match self {
            Self::X86(decoder) => decoder.rebind(buffer),
        }
    }

    pub fn position(&self) -> usize {
        match self {
            Self::X86(decoder) => decoder.position(),
        }
    }

    pub fn is_at_end(&self) -> bool {
        match self {
            Self::X86(decoder) => decoder.is_at_end(),
        }
    }
}

impl Disassembler for Decoder<'_> {
    fn decode_instruction(&self, bytes: &[u8], address: u64) -> Result<Instruction, DecodeError> {
        self.decode_at(bytes, address)
    }

    fn complete(&self, insn: &mut Instruction) -> Result<(), DecodeError> {
        Decoder::complete(self, insn)
    }

    fn min_instruction_size(&self) -> usize {
        match self {
            Self::X86(decoder) => decoder.min_instruction_size(),
        }
    }

    fn max_instruction_size(&self) -> usize {
        match self {
            Self::X86(decoder) => decoder.max_instruction_size(),
        }
    }

    fn is_fixed_width(&self) -> bool {
        match self {
            Self::X86(decoder) => decoder.is_fixed_width(),
        }
    }

    fn architecture(&self) -> Architecture {
        match self {
            Self::X86(decoder) => decoder.architecture(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_decoder_bound() {
        let code = [0x55, 0xc3];
        let mut decoder = make_decoder(Architecture::X86_64, Some(&code));
        assert_eq!(decoder.architecture(), Architecture::X86_64);
        assert_eq!(decoder.decode().unwrap().mnemonic, "push");
        assert_eq!(decoder.decode().unwrap().mnemonic, "ret");
        assert!(decoder.decode().unwrap_err().is_end_of_buffer());
        assert!(decoder.is_at_end());
    }

    #[test]
    fn test_make_decoder_detached() {
        let mut decoder = make_decoder(Architecture::X86, None);
        assert!(decoder.decode().unwrap_err().is_end_of_buffer());
        decoder.set_mode(true);
        assert_eq!(decoder.architecture(), Architecture::X86_64);
        let insn = decoder.decode_at(&[0x48, 0x89, 0xe5], 0).unwrap();
        assert_eq!(insn.size, 3);
        assert_eq!(decoder.position(), 0);
    }

    #[test]
    fn test_disassemble_block_skips_bad_bytes() {
        let decoder = make_decoder(Architecture::X86_64, None);
        // nop, (0x06 invalid in 64-bit), ret
        let results = decoder.disassemble_block(&[0x90, 0x06, 0xc3], 0x400000);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().address, 0x400002);
    }
}
