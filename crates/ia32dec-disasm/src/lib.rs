//! # ia32dec-disasm
//!
//! x86 and x86-64 instruction decoding.
//!
//! A decoder walks a byte buffer one instruction at a time, or decodes
//! arbitrary slices on request. Operands are left deferred by default and
//! resolved with `complete`, so sweeping large regions only pays for the
//! length decode.
//!
//! ```
//! use ia32dec_disasm::{Architecture, X86Decoder};
//!
//! let code = [0x55, 0x48, 0x89, 0xe5, 0xc3];
//! let mut decoder = X86Decoder::new(&code, Architecture::X86_64);
//! let mut insn = decoder.decode().unwrap();
//! decoder.complete(&mut insn).unwrap();
//! assert_eq!(insn.mnemonic, "push");
//! assert_eq!(decoder.position(), 1);
//! ```

pub mod config;
pub mod decoder;
pub mod error;
pub mod traits;
pub mod x86;

pub use config::DecoderConfig;
pub use decoder::{make_decoder, make_decoder_with_config, Decoder};
pub use error::DecodeError;
pub use ia32dec_core::{Architecture, Instruction, OperandState};
pub use traits::Disassembler;
pub use x86::{Instructions, X86Decoder, MAX_INSTRUCTION_LEN};
