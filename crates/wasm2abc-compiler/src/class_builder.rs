//! Class and script boilerplate around the translated methods.
//!
//! Each module becomes one class. This module emits its instance constructor,
//! its static initializer and the script that defines it, and assembles the
//! instance and class records.
//!
//! Scope depths follow the base class chain: the script initializer starts at
//! depth 1, the static initializer at `chain + 1` and instance methods at
//! `chain + 2`.

use wasm2abc_core::{
    AbcFile, AssembleError, ClassInfo, ConstantPool, InstanceFlags, InstanceInfo, MethodBody,
    MethodInfo, Multiname, ScriptInfo, Trait, TranslateError,
};
use wasm2abc_ir::{DataSegment, ExportKind, GlobalInit, Import, Literal, Module, ValType};

use crate::bytecode::OpCode;
use crate::emit::{AssembledCode, Assembler};
use crate::members::{ClassMembers, EXPORTS_SLOT, MEMORY_SLOT, SlotInit, TABLE_SLOT};
use crate::options::{CompileOptions, QualifiedName};
use crate::runtime::{self, PAGE_SIZE};
use crate::translate::avm_type;

/// Minimum domain memory length accepted by the runtime.
pub const MIN_MEMORY_BYTES: u32 = 1024;

/// Largest page-aligned length that fits in a `u32`.
pub const MAX_MEMORY_BYTES: u32 = u32::MAX & !(PAGE_SIZE as u32 - 1);

/// Scope depths for the methods of a class with a given base chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeLayout {
    pub chain: u32,
}

impl ScopeLayout {
    pub fn new(options: &CompileOptions) -> Self {
        Self {
            chain: options.base_classes.len() as u32,
        }
    }

    pub fn script_init(&self) -> u32 {
        1
    }

    pub fn class_init(&self) -> u32 {
        self.chain + 1
    }

    pub fn instance_method(&self) -> u32 {
        self.chain + 2
    }
}

/// Wrap assembled code in a method body record.
pub fn method_body(method: u32, code: AssembledCode, init_scope_depth: u32) -> MethodBody {
    MethodBody {
        method,
        max_stack: code.max_stack,
        local_count: code.local_count,
        init_scope_depth,
        max_scope_depth: init_scope_depth + code.scope_watermark,
        code: code.code,
        exceptions: Vec::new(),
        traits: Vec::new(),
    }
}

fn in_method(name: &str) -> impl FnOnce(AssembleError) -> TranslateError + '_ {
    move |source| TranslateError::Assemble {
        function: name.to_owned(),
        source,
    }
}

// ============================================================================
// Referenced members
// ============================================================================

/// Declare the slots exports and table segments refer to.
///
/// Functions and globals used only from code are declared while translating;
/// exported ones and table entries may not be.
pub fn declare_referenced(module: &Module, members: &mut ClassMembers) -> Result<(), TranslateError> {
    let function_refs = module
        .exports
        .iter()
        .filter_map(|export| match &export.kind {
            ExportKind::Function(name) => Some(name.as_str()),
            _ => None,
        })
        .chain(
            module
                .table_segments
                .iter()
                .flat_map(|segment| segment.functions.iter().map(String::as_str)),
        );
    for name in function_refs {
        let function = module
            .function(name)
            .ok_or_else(|| TranslateError::UnknownFunction {
                name: name.to_owned(),
            })?;
        if let Some(import) = &function.import {
            members.declare_slot(name, None, SlotInit::Import(import.clone()))?;
        }
    }

    for export in &module.exports {
        if let ExportKind::Global(name) = &export.kind {
            let global = module
                .global(name)
                .ok_or_else(|| TranslateError::UnknownGlobal { name: name.clone() })?;
            members.declare_slot(name, Some(avm_type(global.ty)?), SlotInit::Global)?;
        }
    }
    Ok(())
}

// ============================================================================
// Instance constructor
// ============================================================================

/// Initial value of a global slot.
#[derive(Debug, Clone, PartialEq)]
enum GlobalValue {
    Int(i32),
    Number(f64),
    Import(Import, ValType),
}

/// Everything the instance constructor initializes, resolved up front.
#[derive(Debug)]
struct ConstructorPlan<'m> {
    memory_bytes: u32,
    segments: &'m [DataSegment],
    imports: Vec<(String, Import)>,
    globals: Vec<(String, GlobalValue)>,
    table: Vec<(u32, &'m str)>,
    exports: Vec<(&'m str, &'m str)>,
}

impl<'m> ConstructorPlan<'m> {
    fn new(module: &'m Module, members: &ClassMembers) -> Result<Self, TranslateError> {
        let (initial, segments) = match &module.memory {
            Some(memory) => (memory.initial, memory.segments.as_slice()),
            None => (0, &[][..]),
        };
        let memory_bytes = (u64::from(initial) * PAGE_SIZE as u64)
            .clamp(u64::from(MIN_MEMORY_BYTES), u64::from(MAX_MEMORY_BYTES)) as u32;

        let mut imports = Vec::new();
        let mut globals = Vec::new();
        for (name, init) in members.slots() {
            match init {
                SlotInit::Import(import) => imports.push((name.to_owned(), import.clone())),
                SlotInit::Global => {
                    let global = module
                        .global(name)
                        .ok_or_else(|| TranslateError::UnknownGlobal {
                            name: name.to_owned(),
                        })?;
                    let value = match &global.init {
                        GlobalInit::Const(Literal::I32(v)) => GlobalValue::Int(*v),
                        GlobalInit::Const(Literal::F32(v)) => GlobalValue::Number(f64::from(*v)),
                        GlobalInit::Const(Literal::F64(v)) => GlobalValue::Number(*v),
                        GlobalInit::Const(Literal::I64(_)) => {
                            return Err(TranslateError::unsupported("i64"));
                        }
                        GlobalInit::Import(import) => {
                            avm_type(global.ty)?;
                            GlobalValue::Import(import.clone(), global.ty)
                        }
                    };
                    globals.push((name.to_owned(), value));
                }
                SlotInit::Memory | SlotInit::Table | SlotInit::Exports => {}
            }
        }

        let table = module
            .table_segments
            .iter()
            .flat_map(|segment| {
                segment
                    .functions
                    .iter()
                    .enumerate()
                    .map(move |(i, name)| (segment.offset + i as u32, name.as_str()))
            })
            .collect();

        let exports = module
            .exports
            .iter()
            .map(|export| {
                let property = match &export.kind {
                    ExportKind::Function(name) | ExportKind::Global(name) => name.as_str(),
                    ExportKind::Memory => MEMORY_SLOT,
                    ExportKind::Table => TABLE_SLOT,
                };
                (export.name.as_str(), property)
            })
            .collect();

        Ok(Self {
            memory_bytes,
            segments,
            imports,
            globals,
            table,
            exports,
        })
    }

    fn emit(&self, asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
        asm.get_local(0)?;
        asm.push_scope()?;
        asm.get_local(0)?;
        asm.construct_super(0)?;

        self.emit_imports(asm)?;
        self.emit_memory(asm)?;
        self.emit_globals(asm)?;
        self.emit_table(asm)?;
        self.emit_exports(asm)?;

        asm.emit(OpCode::ReturnVoid)
    }

    /// `this.name = imports[module][base]`
    fn emit_imports(&self, asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
        for (name, import) in &self.imports {
            let slot = asm.pool().public_qname(name);
            asm.get_local(0)?;
            load_import(asm, import)?;
            asm.set_property(slot)?;
        }
        Ok(())
    }

    fn emit_memory(&self, asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
        let memory = asm.pool().public_qname(MEMORY_SLOT);
        let byte_array = asm.pool().package_qname("flash.utils", "ByteArray");
        let length = asm.pool().public_qname("length");

        asm.get_local(0)?;
        asm.find_prop_strict(byte_array)?;
        asm.construct_prop(byte_array, 0)?;
        asm.set_property(memory)?;

        asm.get_local(0)?;
        asm.get_property(memory)?;
        push_u32(asm, self.memory_bytes)?;
        asm.set_property(length)?;

        runtime::bind_domain_memory(asm)?;

        for segment in self.segments {
            let words = segment.data.chunks_exact(4);
            let tail = words.remainder();
            let mut address = segment.offset;
            for word in words {
                let value = i32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                asm.push_int(value)?;
                push_u32(asm, address)?;
                asm.emit(OpCode::Si32)?;
                address = address.wrapping_add(4);
            }
            for &byte in tail {
                asm.push_int(i32::from(byte))?;
                push_u32(asm, address)?;
                asm.emit(OpCode::Si8)?;
                address = address.wrapping_add(1);
            }
        }
        Ok(())
    }

    fn emit_globals(&self, asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
        for (name, value) in &self.globals {
            let slot = asm.pool().public_qname(name);
            asm.get_local(0)?;
            match value {
                GlobalValue::Int(v) => asm.push_int(*v)?,
                GlobalValue::Number(v) => asm.push_double(*v)?,
                GlobalValue::Import(import, ty) => {
                    load_import(asm, import)?;
                    let coerce = if ty.is_float() {
                        OpCode::ConvertD
                    } else {
                        OpCode::ConvertI
                    };
                    asm.emit(coerce)?;
                }
            }
            asm.set_property(slot)?;
        }
        Ok(())
    }

    /// Fill the call table with bound method closures.
    fn emit_table(&self, asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
        let table = asm.pool().public_qname(TABLE_SLOT);
        let ns_set = asm.pool().public_ns_set();
        let element = asm
            .pool()
            .intern_multiname(Multiname::MultinameL { ns_set });

        asm.get_local(0)?;
        asm.new_array(0)?;
        asm.set_property(table)?;

        for &(index, function) in &self.table {
            let function = asm.pool().public_qname(function);
            asm.get_local(0)?;
            asm.get_property(table)?;
            push_u32(asm, index)?;
            asm.get_local(0)?;
            asm.get_property(function)?;
            asm.set_property(element)?;
        }
        Ok(())
    }

    fn emit_exports(&self, asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
        let exports = asm.pool().public_qname(EXPORTS_SLOT);
        asm.get_local(0)?;
        for &(name, property) in &self.exports {
            let property = asm.pool().public_qname(property);
            asm.push_string(name)?;
            asm.get_local(0)?;
            asm.get_property(property)?;
        }
        asm.new_object(self.exports.len() as u32)?;
        asm.set_property(exports)
    }
}

/// `imports[module][base]`, with the imports object in local 1.
fn load_import(asm: &mut Assembler<'_>, import: &Import) -> Result<(), AssembleError> {
    let module = asm.pool().public_qname(&import.module);
    let base = asm.pool().public_qname(&import.base);
    asm.get_local(1)?;
    asm.get_property(module)?;
    asm.get_property(base)
}

fn push_u32(asm: &mut Assembler<'_>, value: u32) -> Result<(), AssembleError> {
    match i32::try_from(value) {
        Ok(value) => asm.push_int(value),
        Err(_) => asm.push_uint(value),
    }
}

/// Assemble the instance constructor `new Class(imports)`.
pub fn instance_init(
    pool: &mut ConstantPool,
    module: &Module,
    members: &ClassMembers,
) -> Result<AssembledCode, TranslateError> {
    const NAME: &str = "constructor";
    let plan = ConstructorPlan::new(module, members)?;
    tracing::debug!(
        imports = plan.imports.len(),
        globals = plan.globals.len(),
        table = plan.table.len(),
        exports = plan.exports.len(),
        "building instance constructor"
    );
    let mut asm = Assembler::new(pool, 1);
    plan.emit(&mut asm).map_err(in_method(NAME))?;
    asm.finish().map_err(in_method(NAME))
}

// ============================================================================
// Static and script initializers
// ============================================================================

/// `getlocal0; pushscope; returnvoid`
pub fn class_init(pool: &mut ConstantPool) -> Result<AssembledCode, TranslateError> {
    let mut asm = Assembler::new(pool, 0);
    emit_class_init(&mut asm).map_err(in_method("class initializer"))?;
    asm.finish().map_err(in_method("class initializer"))
}

fn emit_class_init(asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
    asm.get_local(0)?;
    asm.push_scope()?;
    asm.emit(OpCode::ReturnVoid)
}

/// Define the class on the global object.
///
/// Pushes every base class as a scope, creates the class with `newclass`,
/// pops the scopes again and stores the class in its global property.
pub fn script_init(
    pool: &mut ConstantPool,
    options: &CompileOptions,
    class: u32,
) -> Result<AssembledCode, TranslateError> {
    let mut asm = Assembler::new(pool, 0);
    emit_script_init(&mut asm, options, class).map_err(in_method("script initializer"))?;
    asm.finish().map_err(in_method("script initializer"))
}

fn emit_script_init(
    asm: &mut Assembler<'_>,
    options: &CompileOptions,
    class: u32,
) -> Result<(), AssembleError> {
    asm.get_local(0)?;
    asm.push_scope()?;
    asm.get_scope_object(0)?;
    for base in &options.base_classes {
        let base = base.intern(asm.pool());
        asm.get_lex(base)?;
        asm.push_scope()?;
    }
    let super_class = options.super_class().intern(asm.pool());
    asm.get_lex(super_class)?;
    asm.new_class(class)?;
    for _ in &options.base_classes {
        asm.pop_scope()?;
    }
    let name = options.class_qname().intern(asm.pool());
    asm.init_property(name)?;
    asm.emit(OpCode::ReturnVoid)
}

// ============================================================================
// Records
// ============================================================================

/// Add the instance/class pair and the defining script to `abc`.
///
/// `cinit` and `iinit` must already have bodies. Returns the class index.
pub fn finish_class(
    abc: &mut AbcFile,
    members: &ClassMembers,
    options: &CompileOptions,
    cinit: u32,
    iinit: u32,
) -> Result<u32, TranslateError> {
    let layout = ScopeLayout::new(options);
    let class_name = options.class_qname();

    let instance = InstanceInfo {
        name: class_name.intern(&mut abc.pool),
        super_name: options.super_class().intern(&mut abc.pool),
        flags: InstanceFlags::SEALED,
        iinit,
        traits: members.to_traits(&mut abc.pool),
        ..InstanceInfo::default()
    };
    let class = abc.add_class(
        instance,
        ClassInfo {
            cinit,
            traits: Vec::new(),
        },
    );

    let code = script_init(&mut abc.pool, options, class)?;
    let init = abc.add_method(MethodInfo::default());
    abc.add_body(method_body(init, code, layout.script_init()));

    let name = class_name.intern(&mut abc.pool);
    abc.add_script(ScriptInfo {
        init,
        traits: vec![Trait::class(name, 1, class)],
    });
    tracing::debug!(class = %class_name, index = class, "defined class");
    Ok(class)
}

/// Signature of a method taking and returning the given slot types.
pub fn method_info(
    pool: &mut ConstantPool,
    name: &str,
    params: &[QualifiedName],
    result: Option<&QualifiedName>,
) -> MethodInfo {
    let return_type = match result {
        Some(ty) => ty.intern(pool),
        None => QualifiedName::public("void").intern(pool),
    };
    MethodInfo {
        param_types: params.iter().map(|ty| ty.intern(pool)).collect(),
        return_type,
        name: pool.intern_string(name),
        ..MethodInfo::default()
    }
}
