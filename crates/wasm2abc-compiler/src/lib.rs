//! wasm2abc Compiler
//!
//! Translates a lowered WebAssembly module into one AVM2 class.
//!
//! ## Architecture
//!
//! - **Function pass**: every defined function becomes a method on the class;
//!   runtime helpers are generated the first time a function needs them
//! - **Class pass**: the instance constructor wires up imports, memory, globals,
//!   the call table and the exports object, and a script defines the class
//!
//! ## Modules
//!
//! - [`bytecode`]: Instruction set and disassembler
//! - [`emit`]: Bytecode assembler with labels and stack tracking
//! - [`members`]: Class member table
//! - [`options`]: Naming and version options
//! - [`runtime`]: Generated helper methods
//! - [`translate`]: Expression translator for function bodies
//! - [`class_builder`]: Initializers and class records
//! - [`session`]: Whole-module driver

pub mod bytecode;
pub mod class_builder;
pub mod emit;
pub mod members;
pub mod options;
pub mod runtime;
pub mod session;
pub mod translate;

pub use bytecode::{Instruction, OpCode, disassemble};
pub use emit::{AssembledCode, Assembler, Label};
pub use members::{ClassMembers, Member, MemberKind, SlotInit};
pub use options::{CompileOptions, QualifiedName};
pub use runtime::{Helper, HelperSet};
pub use session::{CompiledModule, compile_module};
pub use translate::translate_function;
