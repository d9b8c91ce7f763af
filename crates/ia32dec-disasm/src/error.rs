//! Decoding error types.

use thiserror::Error;

/// Error type for instruction decoding.
///
/// Every variant maps to the "invalid instruction" outcome of a decode call;
/// the variants only add diagnostics. Use [`Result::ok`] to collapse a
/// decode result into an optional instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No bytes left to decode.
    #[error("end of buffer at {address:#x}")]
    EndOfBuffer { address: u64 },

    /// Unknown opcode encountered.
    #[error("unknown opcode at {address:#x}: {bytes:02x?}")]
    UnknownOpcode { address: u64, bytes: Vec<u8> },

    /// Instruction was truncated (not enough bytes).
    #[error("truncated instruction at {address:#x}: need {needed} bytes, have {available}")]
    Truncated {
        address: u64,
        needed: usize,
        available: usize,
    },

    /// Invalid instruction encoding.
    #[error("invalid encoding at {address:#x}: {reason}")]
    InvalidEncoding { address: u64, reason: String },
}

impl DecodeError {
    /// Creates a new EndOfBuffer error.
    pub fn end_of_buffer(address: u64) -> Self {
        Self::EndOfBuffer { address }
    }

    /// Creates a new UnknownOpcode error.
    pub fn unknown_opcode(address: u64, bytes: &[u8]) -> Self {
        Self::UnknownOpcode {
            address,
            bytes: bytes.to_vec(),
        }
    }

    /// Creates a new Truncated error.
    pub fn truncated(address: u64, needed: usize, available: usize) -> Self {
        Self::Truncated {
            address,
            needed,
            available,
        }
    }

    /// Creates a new InvalidEncoding error.
    pub fn invalid_encoding(address: u64, reason: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            address,
            reason: reason.into(),
        }
    }

    /// Returns true if decoding stopped because the stream ended.
    pub fn is_end_of_buffer(&self) -> bool {
        matches!(self, Self::EndOfBuffer { .. })
    }

    /// Address of the instruction that failed to decode.
    pub fn address(&self) -> u64 {
        match self {
            Self::EndOfBuffer { address }
            | Self::UnknownOpcode { address, .. }
            | Self::Truncated { address, .. }
            | Self::InvalidEncoding { address, .. } => *address,
        }
    }
}
