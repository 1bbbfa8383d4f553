//! Core types for wasm2abc: the ABC file model and its binary encoding.
//!
//! This crate provides:
//! - [`varint`]: the variable-length integer and raw value codec
//! - [`ConstantPool`]: interning store for the seven pooled value kinds
//! - [`records`]: method, trait, class, script and body records
//! - [`AbcFile`]: the whole-file record set and serializer
//! - The error hierarchy shared by every layer

pub mod abc_file;
pub mod constant;
pub mod error;
pub mod records;
pub mod varint;

pub use abc_file::{AbcFile, DEFAULT_MAJOR_VERSION, DEFAULT_MINOR_VERSION};
pub use constant::{ConstantPool, Multiname, Namespace, NamespaceKind, NamespaceSet};
pub use error::{AssembleError, EncodeError, TranslateError, Wasm2AbcError};
pub use records::{
    ClassInfo, ExceptionInfo, InstanceFlags, InstanceInfo, Metadata, MethodBody, MethodFlags,
    MethodInfo, OptionDetail, ScriptInfo, Trait, TraitAttributes, TraitData, ValueKind,
};
pub use varint::ByteReader;
