//! Whole-module translation.
//!
//! A session owns the file being built. Method indices are allocated in a
//! fixed order: the static and instance initializers first, then every
//! defined function followed by the helpers it introduced, then the script
//! initializer.

use wasm2abc_core::{AbcFile, MethodInfo, TranslateError};
use wasm2abc_ir::{Function, Module};

use crate::class_builder::{self, ScopeLayout, method_body, method_info};
use crate::emit::Assembler;
use crate::members::ClassMembers;
use crate::options::CompileOptions;
use crate::runtime::{Helper, HelperSet, MAX_PAGES};
use crate::translate::{avm_type, translate_function};

/// Output of [`compile_module`].
#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub abc: AbcFile,
    /// Dotted names of the classes the file defines.
    pub class_names: Vec<String>,
}

struct Session<'m> {
    abc: AbcFile,
    module: &'m Module,
    options: &'m CompileOptions,
    members: ClassMembers,
    helpers: HelperSet,
    layout: ScopeLayout,
    max_pages: u32,
}

/// Translate `module` into a single-class ABC file.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn compile_module(
    module: &Module,
    options: &CompileOptions,
) -> Result<CompiledModule, TranslateError> {
    let max_pages = module
        .memory
        .as_ref()
        .and_then(|memory| memory.maximum)
        .map_or(MAX_PAGES, |maximum| maximum.min(MAX_PAGES));

    let mut session = Session {
        abc: AbcFile::new(options.minor_version, options.major_version),
        module,
        options,
        members: ClassMembers::with_reserved_slots(),
        helpers: HelperSet::new(),
        layout: ScopeLayout::new(options),
        max_pages,
    };

    let cinit = session.abc.add_method(MethodInfo::default());
    // new Class(imports: *)
    let iinit = session.abc.add_method(MethodInfo {
        param_types: vec![0],
        ..MethodInfo::default()
    });

    for function in module.functions.iter().filter(|f| !f.is_import()) {
        session.function(function)?;
    }
    tracing::debug!(
        functions = module.functions.len(),
        members = session.members.len(),
        "translated functions"
    );

    class_builder::declare_referenced(module, &mut session.members)?;
    session.initializers(cinit, iinit)?;
    class_builder::finish_class(&mut session.abc, &session.members, options, cinit, iinit)?;

    let class_names = vec![options.class_qname().dotted()];
    tracing::debug!(
        methods = session.abc.methods.len(),
        bodies = session.abc.bodies.len(),
        "compiled module"
    );
    Ok(CompiledModule {
        abc: session.abc,
        class_names,
    })
}

impl Session<'_> {
    fn function(&mut self, function: &Function) -> Result<(), TranslateError> {
        let code = translate_function(
            &mut self.abc.pool,
            self.module,
            function,
            &mut self.members,
            &mut self.helpers,
            self.options,
        )?;

        let params = function
            .params
            .iter()
            .map(|&ty| avm_type(ty))
            .collect::<Result<Vec<_>, _>>()?;
        let result = function.result().map(avm_type).transpose()?;
        let info = method_info(&mut self.abc.pool, &function.name, &params, result.as_ref());
        let method = self.abc.add_method(info);
        self.abc
            .add_body(method_body(method, code, self.layout.instance_method()));
        self.members.declare_method(&function.name, method)?;

        for helper in self.helpers.take_pending() {
            self.helper(helper)?;
        }
        Ok(())
    }

    fn helper(&mut self, helper: Helper) -> Result<(), TranslateError> {
        tracing::debug!(helper = helper.name(), "generating helper");
        let params: Vec<_> = helper.params().iter().map(|ty| ty.qname()).collect();
        let result = helper.result().qname();
        let info = method_info(&mut self.abc.pool, helper.name(), &params, Some(&result));

        let max_pages = self.max_pages;
        let mut asm = Assembler::new(&mut self.abc.pool, params.len() as u32);
        let code = helper
            .assemble(&mut asm, max_pages)
            .and_then(|()| asm.finish())
            .map_err(|source| TranslateError::Assemble {
                function: helper.name().to_owned(),
                source,
            })?;

        let method = self.abc.add_method(info);
        self.abc
            .add_body(method_body(method, code, self.layout.instance_method()));
        self.members.declare_method(helper.name(), method)
    }

    fn initializers(&mut self, cinit: u32, iinit: u32) -> Result<(), TranslateError> {
        let code = class_builder::class_init(&mut self.abc.pool)?;
        self.abc
            .add_body(method_body(cinit, code, self.layout.class_init()));

        let code = class_builder::instance_init(&mut self.abc.pool, self.module, &self.members)?;
        self.abc
            .add_body(method_body(iinit, code, self.layout.instance_method()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm2abc_ir::{BinaryOp, Expr, Import, Memory, ValType};

    fn add_module() -> Module {
        let mut module = Module::new();
        module.add_function(Function::new(
            "add",
            vec![ValType::I32, ValType::I32],
            vec![ValType::I32],
            Expr::binary(
                BinaryOp::I32Add,
                Expr::local_get(0, ValType::I32),
                Expr::local_get(1, ValType::I32),
            ),
        ));
        module.export_function("add", "add");
        module
    }

    #[test]
    fn method_order() {
        let out = compile_module(&add_module(), &CompileOptions::default()).unwrap();
        // cinit, iinit, add, script init
        assert_eq!(out.abc.methods.len(), 4);
        assert_eq!(out.abc.bodies.len(), 4);
        assert_eq!(out.abc.instances[0].iinit, 1);
        assert_eq!(out.abc.classes[0].cinit, 0);
        assert_eq!(out.abc.scripts[0].init, 3);
        assert_eq!(out.class_names, vec!["Instance".to_owned()]);
    }

    #[test]
    fn body_scope_depths() {
        let options = CompileOptions::new().with_sprite_base();
        let out = compile_module(&add_module(), &options).unwrap();
        let add = out.abc.body_of(2).unwrap();
        assert_eq!(add.init_scope_depth, 8);
        assert_eq!(add.max_scope_depth, 8);
        let cinit = out.abc.body_of(0).unwrap();
        assert_eq!(cinit.init_scope_depth, 7);
        assert_eq!(cinit.max_scope_depth, 8);
        let iinit = out.abc.body_of(1).unwrap();
        assert_eq!(iinit.max_scope_depth, 9);
    }

    #[test]
    fn helpers_follow_their_first_user() {
        let mut module = Module::new();
        module.memory = Some(Memory {
            initial: 1,
            maximum: Some(4),
            segments: Vec::new(),
        });
        module.add_function(Function::new(
            "size",
            vec![],
            vec![ValType::I32],
            Expr::MemorySize,
        ));
        module.add_function(Function::new(
            "size2",
            vec![],
            vec![ValType::I32],
            Expr::MemorySize,
        ));
        let out = compile_module(&module, &CompileOptions::default()).unwrap();
        // cinit, iinit, size, helper, size2, script init
        assert_eq!(out.abc.methods.len(), 6);
        let helper = out.abc.pool.string(out.abc.methods[3].name);
        assert_eq!(helper, Some(Helper::MemorySize.name()));
    }

    #[test]
    fn imports_become_slots_not_methods() {
        let mut module = add_module();
        module.add_function(Function::imported(
            "log",
            Import::new("env", "log"),
            vec![ValType::I32],
            vec![],
        ));
        module.export_function("log", "log");
        let out = compile_module(&module, &CompileOptions::default()).unwrap();
        assert_eq!(out.abc.methods.len(), 4);
        let traits = &out.abc.instances[0].traits;
        // three reserved slots, add, log
        assert_eq!(traits.len(), 5);
    }

    #[test]
    fn unsupported_signature_is_rejected() {
        let mut module = Module::new();
        module.add_function(Function::new(
            "wide",
            vec![ValType::I64],
            vec![],
            Expr::Nop,
        ));
        assert_eq!(
            compile_module(&module, &CompileOptions::default()).err(),
            Some(TranslateError::Unsupported {
                construct: "i64".into()
            })
        );
    }
}
