//! wasm2abc - WebAssembly to AVM2 bytecode translator.
//!
//! Takes a lowered WebAssembly module ([`wasm2abc_ir::Module`]) and produces
//! the bytes of an ABC file defining one class per module.
//!
//! # Example
//!
//! ```
//! use wasm2abc::{CompileOptions, translate};
//! use wasm2abc::ir::{BinaryOp, Expr, Function, Module, ValType};
//!
//! let mut module = Module::new();
//! module.add_function(Function::new(
//!     "add",
//!     vec![ValType::I32, ValType::I32],
//!     vec![ValType::I32],
//!     Expr::binary(
//!         BinaryOp::I32Add,
//!         Expr::local_get(0, ValType::I32),
//!         Expr::local_get(1, ValType::I32),
//!     ),
//! ));
//! module.export_function("add", "add");
//!
//! let out = translate(&module, &CompileOptions::default()).unwrap();
//! assert_eq!(out.class_names, vec!["Instance".to_string()]);
//! assert_eq!(&out.abc[..4], &[16, 0, 46, 0]);
//! ```

pub use wasm2abc_compiler::{CompileOptions, CompiledModule, QualifiedName, compile_module};
pub use wasm2abc_core::{AssembleError, EncodeError, TranslateError, Wasm2AbcError};

/// The input IR.
pub mod ir {
    pub use wasm2abc_ir::*;
}

/// The ABC file model and encoder.
pub mod abc {
    pub use wasm2abc_core::*;
}

/// Lower-level translator pieces: assembler, opcodes and member tables.
pub mod compiler {
    pub use wasm2abc_compiler::*;
}

/// An encoded ABC file and the classes it defines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub abc: Vec<u8>,
    /// Dotted class names, for the container's symbol table.
    pub class_names: Vec<String>,
}

/// Translate and encode `module`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn translate(
    module: &ir::Module,
    options: &CompileOptions,
) -> Result<Translation, Wasm2AbcError> {
    let compiled = compile_module(module, options)?;
    let abc = {
        #[cfg(feature = "profiling")]
        profiling::scope!("encode");
        compiled.abc.encode()?
    };
    tracing::debug!(
        bytes = abc.len(),
        classes = compiled.class_names.len(),
        "encoded ABC file"
    );
    Ok(Translation {
        abc,
        class_names: compiled.class_names,
    })
}
