//! Two-phase operand state.
//!
//! Decoding an instruction validates every byte and records where each
//! operand lives in the encoding, but materialising registers, memory
//! expressions and immediates is postponed until a caller asks for it.
//! An instruction's operands are either [`OperandState::Deferred`] or
//! [`OperandState::Complete`]; completion is the only transition.

use crate::{Access, DecodedOperand, OperandKind};

/// Operands of an instruction, before or after completion.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandState {
    /// Kinds, sizes and access flags known; values not yet built.
    Deferred(DeferredOperands),
    /// Every operand resolved.
    Complete(Vec<DecodedOperand>),
}

impl OperandState {
    /// Returns true once operands have been resolved.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// Number of explicit operands.
    pub fn len(&self) -> usize {
        match self {
            Self::Deferred(deferred) => deferred.slots.len(),
            Self::Complete(operands) => operands.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Operand kinds in order, available in both states.
    pub fn kinds(&self) -> Vec<OperandKind> {
        match self {
            Self::Deferred(deferred) => deferred.slots.iter().map(|s| s.kind).collect(),
            Self::Complete(operands) => operands.iter().map(|o| o.kind()).collect(),
        }
    }

    /// Access flags in order, available in both states.
    pub fn accesses(&self) -> Vec<Access> {
        match self {
            Self::Deferred(deferred) => deferred.slots.iter().map(|s| s.access).collect(),
            Self::Complete(operands) => operands.iter().map(|o| o.access).collect(),
        }
    }
}

/// Skeleton operands: one slot per operand plus the byte layout needed to
/// resolve them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeferredOperands {
    pub slots: Vec<OperandSlot>,
    pub layout: EncodingLayout,
}

/// One operand whose value has not been materialised yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperandSlot {
    pub kind: OperandKind,
    pub source: OperandSource,
    /// Width in bits after prefix and mode resolution.
    pub size: u16,
    pub access: Access,
}

/// Where in the encoding an operand comes from.
///
/// Byte offsets are relative to the first byte of the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OperandSource {
    /// ModR/M reg field.
    ModRmReg,
    /// ModR/M r/m field (register when mod=11, memory otherwise).
    ModRmRm,
    /// Low three bits of the last opcode byte.
    OpcodeReg,
    /// General purpose register implied by the opcode.
    FixedRegister(u16),
    /// Segment register implied by the opcode.
    SegmentRegister(u16),
    /// Segment register selected by the ModR/M reg field (MOV Sreg).
    ModRmSegment,
    /// Immediate bytes.
    Immediate { offset: u8, width: u8, signed: bool },
    /// Branch displacement relative to the next instruction.
    Relative { offset: u8, width: u8 },
    /// Absolute address (moffs), `width` follows the address size.
    MemoryOffset { offset: u8, width: u8 },
    /// Constant operand implied by the opcode (shift by one).
    Constant(i64),
}

/// Byte layout of the addressing part of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodingLayout {
    /// Offset of the last opcode byte.
    pub opcode: u8,
    /// Offset of the ModR/M byte.
    pub modrm: Option<u8>,
    /// Offset of the SIB byte.
    pub sib: Option<u8>,
    /// Displacement location.
    pub displacement: Option<Displacement>,
    /// Effective address size in bits (16, 32 or 64).
    pub address_size: u16,
}

/// Location and width of a ModR/M displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Displacement {
    pub offset: u8,
    pub width: u8,
}
