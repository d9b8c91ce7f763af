//! x86 / x86-64 instruction decoder.
//!
//! Handles:
//! - Legacy prefixes (REP, LOCK, segment overrides, operand/address size)
//! - REX prefix for 64-bit operands and extended registers
//! - ModR/M and SIB byte decoding, including 16-bit addressing
//! - The general purpose one-byte and 0x0F opcode maps, plus the F3 0x0F
//!   map for popcnt/tzcnt/lzcnt and endbr
//! - LOCK validation: lockable opcodes with a memory destination only
//!
//! Decoding is split in two phases. [`X86Decoder::decode`] validates the
//! whole encoding and records where each operand lives; [`complete`] turns
//! that skeleton into registers, memory expressions and immediates.

mod decoder;
mod modrm;
mod opcodes;
mod operands;
mod prefix;

pub use decoder::{complete, Instructions, X86Decoder};

/// Architectural limit on the length of one instruction.
pub const MAX_INSTRUCTION_LEN: usize = 15;
