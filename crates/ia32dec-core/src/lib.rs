//! # ia32dec-core
//!
//! Value types shared by the ia32dec decoders: architectures, registers,
//! operands, prefixes and the instruction representation, including the
//! deferred (skeleton) operand state produced by lazy decoding.

pub mod arch;
pub mod deferred;
pub mod instruction;
pub mod operand;
pub mod prefix;
pub mod register;

pub use arch::Architecture;
pub use deferred::{
    DeferredOperands, Displacement, EncodingLayout, OperandSlot, OperandSource, OperandState,
};
pub use instruction::{Condition, ControlFlow, Instruction, Operation};
pub use operand::{Access, DecodedOperand, Immediate, MemoryRef, Operand, OperandKind};
pub use prefix::{Prefixes, Rex, Segment};
pub use register::{Register, RegisterClass};
