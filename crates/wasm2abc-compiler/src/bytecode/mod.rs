//! Bytecode types for the translator.
//!
//! - [`OpCode`] and [`Operand`] - The AVM2 instruction set and operand layouts
//! - [`disassemble`] - Decoder for emitted method bodies

mod disasm;
mod opcode;

pub use disasm::{
    Instruction, assert_contains_opcodes, assert_opcodes, disassemble, opcodes, stack_peak,
};
pub use opcode::{OpCode, Operand};
