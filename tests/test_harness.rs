//! Shared helpers for the translation integration tests.

#![allow(dead_code)]

use wasm2abc::abc::{MethodBody, TraitData};
use wasm2abc::compiler::bytecode::{Instruction, OpCode, disassemble};
use wasm2abc::ir::{Expr, Function, Module, ValType};
use wasm2abc::{CompileOptions, CompiledModule, compile_module};

/// A module holding the given functions, each exported under its own name.
pub fn module_of(functions: Vec<Function>) -> Module {
    let mut module = Module::new();
    for function in functions {
        let name = function.name.clone();
        module.add_function(function);
        module.export_function(name.clone(), name);
    }
    module
}

/// A single exported function named `f`.
pub fn single(params: Vec<ValType>, results: Vec<ValType>, body: Expr) -> Module {
    module_of(vec![Function::new("f", params, results, body)])
}

pub fn compile(module: &Module) -> CompiledModule {
    compile_module(module, &CompileOptions::default())
        .unwrap_or_else(|e| panic!("translation failed: {e}"))
}

/// Index of the method whose name is `name`.
pub fn method_index(out: &CompiledModule, name: &str) -> u32 {
    out.abc
        .methods
        .iter()
        .position(|m| m.name != 0 && out.abc.pool.string(m.name) == Some(name))
        .unwrap_or_else(|| panic!("no method named {name}")) as u32
}

pub fn body<'a>(out: &'a CompiledModule, name: &str) -> &'a MethodBody {
    let index = method_index(out, name);
    out.abc
        .body_of(index)
        .unwrap_or_else(|| panic!("method {name} has no body"))
}

pub fn instructions(out: &CompiledModule, name: &str) -> Vec<Instruction> {
    disassemble(&body(out, name).code).expect("body should disassemble")
}

pub fn ops(out: &CompiledModule, name: &str) -> Vec<OpCode> {
    instructions(out, name).iter().map(|i| i.op).collect()
}

/// `(disp_id, method)` of every method trait on the instance, in trait order.
pub fn method_traits(out: &CompiledModule) -> Vec<(u32, u32)> {
    out.abc.instances[0]
        .traits
        .iter()
        .filter_map(|t| match t.data {
            TraitData::Method { disp_id, method } => Some((disp_id, method)),
            _ => None,
        })
        .collect()
}

/// Every branch in `body` targets the start of an instruction.
pub fn assert_branches_land_on_instructions(body: &MethodBody) {
    let insts = disassemble(&body.code).expect("body should disassemble");
    let starts: Vec<i64> = insts.iter().map(|i| i.offset as i64).collect();
    for inst in &insts {
        for target in inst.branch_targets(inst.end(&body.code)) {
            assert!(
                starts.contains(&target),
                "{} at {} targets {target}, which is not an instruction boundary",
                inst.op.name(),
                inst.offset
            );
        }
    }
}
