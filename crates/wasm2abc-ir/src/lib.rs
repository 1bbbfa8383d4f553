//! Input contract for wasm2abc: an already-parsed, already-lowered
//! WebAssembly module as nested expression trees.
//!
//! Producing this IR (parsing, validation, 64-bit lowering) is the job of an
//! upstream library. The translator only consumes it.

pub mod expr;
pub mod module;
pub mod ops;
pub mod types;

pub use expr::{AtomicKind, BulkMemoryKind, ExceptionKind, Expr, SimdKind, TupleKind};
pub use module::{
    DataSegment, Export, ExportKind, Function, Global, GlobalInit, Import, Memory, Module,
    TableSegment,
};
pub use ops::{BinaryOp, Comparison, UnaryOp};
pub use types::{Literal, ValType};
