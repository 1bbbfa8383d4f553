//! Function translator: IR expression trees to AVM2 method bodies.
//!
//! The [`FunctionTranslator`] walks one function body and drives an
//! [`Assembler`], handling:
//! - Structured control flow (blocks, loops, ifs, breaks, switches)
//! - Locals, globals and linear memory access
//! - Direct, imported and indirect calls
//! - Numeric operators, including helper-method lowerings
//!
//! Class members needed along the way (global slots, import slots, helper
//! methods) are registered in the session's [`ClassMembers`] and [`HelperSet`].
//!
//! # Example
//!
//! ```ignore
//! let code = translate_function(&mut pool, &module, function, &mut members, &mut helpers, &options)?;
//! ```

mod calls;
mod control;
mod memory;
mod numeric;

pub(crate) use memory::avm_type;

use wasm2abc_core::{AssembleError, ConstantPool, TranslateError};
use wasm2abc_ir::{Expr, Function, Module, ValType};

use crate::bytecode::OpCode;
use crate::emit::{AssembledCode, Assembler, Label};
use crate::members::ClassMembers;
use crate::options::CompileOptions;
use crate::runtime::HelperSet;

/// Failure inside a function, before it is attributed to the function.
#[derive(Debug)]
enum Error {
    Assemble(AssembleError),
    Translate(TranslateError),
}

impl From<AssembleError> for Error {
    fn from(err: AssembleError) -> Self {
        Error::Assemble(err)
    }
}

impl From<TranslateError> for Error {
    fn from(err: TranslateError) -> Self {
        Error::Translate(err)
    }
}

impl Error {
    fn in_function(self, function: &str) -> TranslateError {
        match self {
            Error::Assemble(source) => TranslateError::Assemble {
                function: function.to_owned(),
                source,
            },
            Error::Translate(err) => err,
        }
    }
}

type Result<T> = std::result::Result<T, Error>;

/// A label in scope for branches.
struct BranchTarget {
    name: String,
    label: Label,
    /// Stack depth at the first branch to the label.
    depth: Option<u32>,
}

/// Translates a single function body.
pub struct FunctionTranslator<'a, 'pool> {
    asm: Assembler<'pool>,
    module: &'a Module,
    function: &'a Function,
    members: &'a mut ClassMembers,
    helpers: &'a mut HelperSet,
    options: &'a CompileOptions,
    /// Enclosing named blocks and loops, innermost last.
    targets: Vec<BranchTarget>,
}

/// Translate `function` into a method body.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn translate_function(
    pool: &mut ConstantPool,
    module: &Module,
    function: &Function,
    members: &mut ClassMembers,
    helpers: &mut HelperSet,
    options: &CompileOptions,
) -> std::result::Result<AssembledCode, TranslateError> {
    tracing::debug!(
        function = %function.name,
        params = function.params.len(),
        vars = function.vars.len(),
        "translating function"
    );
    let translator = FunctionTranslator {
        asm: Assembler::new(pool, function.params.len() as u32),
        module,
        function,
        members,
        helpers,
        options,
        targets: Vec::new(),
    };
    let code = translator
        .run()
        .map_err(|err| err.in_function(&function.name))?;
    tracing::debug!(
        function = %function.name,
        bytes = code.code.len(),
        max_stack = code.max_stack,
        "translated function"
    );
    Ok(code)
}

impl<'a, 'pool> FunctionTranslator<'a, 'pool> {
    fn run(mut self) -> Result<AssembledCode> {
        let function = self.function;
        if function.results.len() > 1 {
            return Err(TranslateError::unsupported("multi-value").into());
        }
        for &ty in function.params.iter().chain(&function.results) {
            check_type(ty)?;
        }

        self.prologue()?;
        self.expr(&function.body)?;
        self.epilogue()?;
        Ok(self.asm.finish()?)
    }

    /// Zero-initialize declared locals.
    fn prologue(&mut self) -> Result<()> {
        let first = self.function.params.len() as u32 + 1;
        for (i, &ty) in self.function.vars.iter().enumerate() {
            check_type(ty)?;
            if ty.is_float() {
                self.asm.push_double(0.0)?;
            } else {
                self.asm.push_int(0)?;
            }
            self.asm.set_local(first + i as u32)?;
        }
        Ok(())
    }

    fn epilogue(&mut self) -> Result<()> {
        if !self.asm.falls_through() {
            return Ok(());
        }
        match self.function.result() {
            Some(_) => self.asm.emit(OpCode::ReturnValue)?,
            None => self.asm.emit(OpCode::ReturnVoid)?,
        }
        Ok(())
    }

    // ==========================================================================
    // Dispatch
    // ==========================================================================

    /// Emit code for one expression, leaving its value (if any) on the stack.
    fn expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Block { name, children } => self.block(name.as_deref(), children),
            Expr::If {
                condition,
                if_true,
                if_false,
            } => self.if_else(condition, if_true, if_false.as_deref()),
            Expr::Loop { name, body } => self.loop_(name, body),
            Expr::Break {
                name,
                condition,
                value,
            } => self.break_(name, condition.as_deref(), value.as_deref()),
            Expr::Switch {
                names,
                default_name,
                condition,
                value,
            } => self.switch(names, default_name, condition, value.as_deref()),
            Expr::Call {
                target,
                operands,
                ty,
            } => self.call(target, operands, *ty),
            Expr::CallIndirect {
                target,
                operands,
                ty,
            } => self.call_indirect(target, operands, *ty),
            Expr::LocalGet { index, .. } => {
                let (slot, _) = self.local(*index)?;
                Ok(self.asm.get_local(slot)?)
            }
            Expr::LocalSet {
                index,
                value,
                is_tee,
            } => self.local_set(*index, value, *is_tee),
            Expr::GlobalGet { name, .. } => self.global_get(name),
            Expr::GlobalSet { name, value } => self.global_set(name, value),
            Expr::Load {
                bytes,
                signed,
                offset,
                ty,
                ptr,
            } => self.load(*bytes, *signed, *offset, *ty, ptr),
            Expr::Store {
                bytes,
                offset,
                ptr,
                value,
                value_ty,
            } => self.store(*bytes, *offset, ptr, value, *value_ty),
            Expr::Const(literal) => self.constant(literal),
            Expr::Unary { op, value } => self.unary(*op, value),
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Select {
                if_true,
                if_false,
                condition,
            } => self.select(if_true, if_false, condition),
            Expr::Drop { value } => {
                self.expr(value)?;
                Ok(self.asm.emit(OpCode::Pop)?)
            }
            Expr::Return { value } => self.return_(value.as_deref()),
            Expr::MemorySize => self.memory_size(),
            Expr::MemoryGrow { delta } => self.memory_grow(delta),
            Expr::Nop => Ok(self.asm.emit(OpCode::Nop)?),
            Expr::Unreachable => self.unreachable(),
            Expr::Atomic(_)
            | Expr::Simd(_)
            | Expr::BulkMemory(_)
            | Expr::Exception(_)
            | Expr::Tuple(_) => Err(TranslateError::unsupported(expr.kind_name()).into()),
        }
    }
}

/// Reject value types that should have been lowered upstream.
fn check_type(ty: ValType) -> std::result::Result<(), TranslateError> {
    if ty.is_lowered() {
        Ok(())
    } else {
        Err(TranslateError::unsupported(ty.name()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Result of translating one function in isolation.
    pub struct Translated {
        pub code: AssembledCode,
        pub pool: ConstantPool,
        pub members: ClassMembers,
        pub helpers: HelperSet,
    }

    /// Translate the function `name` of `module` with a fresh session state.
    pub fn translate(module: &Module, name: &str) -> std::result::Result<Translated, TranslateError> {
        let mut pool = ConstantPool::new();
        let mut members = ClassMembers::with_reserved_slots();
        let mut helpers = HelperSet::new();
        let options = CompileOptions::default();
        let function = module
            .function(name)
            .ok_or_else(|| TranslateError::UnknownFunction { name: name.into() })?;
        let code = translate_function(
            &mut pool,
            module,
            function,
            &mut members,
            &mut helpers,
            &options,
        )?;
        Ok(Translated {
            code,
            pool,
            members,
            helpers,
        })
    }

    /// A module holding the single function `f`.
    pub fn single(params: Vec<ValType>, results: Vec<ValType>, body: Expr) -> Module {
        let mut module = Module::new();
        module.add_function(Function::new("f", params, results, body));
        module
    }

    /// Translate `f` from [`single`].
    #[track_caller]
    pub fn code_of(params: Vec<ValType>, results: Vec<ValType>, body: Expr) -> AssembledCode {
        translate(&single(params, results, body), "f").unwrap().code
    }
}
