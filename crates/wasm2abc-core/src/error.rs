//! Unified error types for wasm2abc.
//!
//! Every error in this crate family is fatal: a translation either produces a
//! complete ABC file or fails with one of these diagnostics and produces nothing.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Wasm2AbcError (top-level wrapper)
//! ├── EncodeError    - Values outside an encodable range, malformed file structure
//! ├── AssembleError  - Per-function assembler invariants (stack, labels)
//! └── TranslateError - Unsupported or malformed input IR
//! ```

use thiserror::Error;

// ============================================================================
// Encode Errors
// ============================================================================

/// Errors raised while encoding values or whole-file structures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A `u30` value was `>= 2^30`.
    #[error("value {value} does not fit in a u30")]
    U30OutOfRange { value: u64 },

    /// A branch displacement does not fit in a signed 24-bit field.
    #[error("branch displacement {displacement} does not fit in 24 bits")]
    BranchOutOfRange { displacement: i64 },

    /// Instance and class tables must have the same length.
    #[error("instance count {instances} does not match class count {classes}")]
    ClassCountMismatch { instances: usize, classes: usize },

    /// Input ended before a complete value could be decoded.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// A variable-length integer used more than five groups.
    #[error("malformed variable-length integer at offset {offset}")]
    MalformedVarint { offset: usize },

    /// A string constant is not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    /// An opcode byte that is not part of the instruction set.
    #[error("unknown opcode 0x{byte:02x} at offset {offset}")]
    UnknownOpcode { byte: u8, offset: usize },
}

// ============================================================================
// Assemble Errors
// ============================================================================

/// Internal-consistency errors raised by the per-function assembler.
///
/// These always indicate a translator defect or malformed upstream IR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    /// An instruction popped more operands than the modeled stack holds.
    #[error("operand stack underflow at '{op}': depth {depth}, pops {pops}")]
    StackUnderflow {
        op: &'static str,
        depth: u32,
        pops: u32,
    },

    /// A `popscope` without a matching `pushscope`.
    #[error("scope stack underflow at offset {offset}")]
    ScopeUnderflow { offset: usize },

    /// A branch references a label that was never placed.
    #[error("fixup to unresolved label '{name}'")]
    UnresolvedLabel { name: String },

    /// An opcode whose stack effect depends on its operands was emitted
    /// through a fixed-effect path.
    #[error("opcode '{op}' has an operand-dependent stack effect")]
    VariableStackEffect { op: &'static str },

    /// A label was placed a second time.
    #[error("label '{name}' is already resolved")]
    LabelRebound { name: String },

    /// An operand value could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

// ============================================================================
// Translate Errors
// ============================================================================

/// Errors raised while translating the input IR.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// A construct that must have been lowered upstream reached the translator.
    #[error("unsupported construct '{construct}' (should have been eliminated upstream)")]
    Unsupported { construct: String },

    /// A break or switch named a label that no enclosing block declares.
    #[error("cannot find label '{name}'")]
    UnknownLabel { name: String },

    /// A call or table segment referenced a function the module does not define.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// A global access referenced a global the module does not define.
    #[error("unknown global '{name}'")]
    UnknownGlobal { name: String },

    /// Two different members of the emitted class want the same name.
    #[error("member name '{name}' is already declared")]
    DuplicateMember { name: String },

    /// The module violates a structural expectation (e.g. a local index out of range).
    #[error("invalid module: {message}")]
    InvalidModule { message: String },

    /// Assembler failure while emitting a function.
    #[error("in function '{function}': {source}")]
    Assemble {
        function: String,
        #[source]
        source: AssembleError,
    },

    /// Encoding failure outside of a function body.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

impl TranslateError {
    /// Shorthand for [`TranslateError::Unsupported`].
    pub fn unsupported(construct: impl Into<String>) -> Self {
        TranslateError::Unsupported {
            construct: construct.into(),
        }
    }

    /// Shorthand for [`TranslateError::InvalidModule`].
    pub fn invalid(message: impl Into<String>) -> Self {
        TranslateError::InvalidModule {
            message: message.into(),
        }
    }
}

// ============================================================================
// Top-level Error
// ============================================================================

/// Top-level error for a whole translation session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Wasm2AbcError {
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("assemble error: {0}")]
    Assemble(#[from] AssembleError),

    #[error("translate error: {0}")]
    Translate(#[from] TranslateError),
}
