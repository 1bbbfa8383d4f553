//! Direct, imported, indirect and helper calls.
//!
//! Every call goes through a property of the receiver: defined functions are
//! methods, imports are slots holding the imported function, and the call
//! table is an array indexed at runtime.

use wasm2abc_core::{Multiname, TranslateError};
use wasm2abc_ir::{Expr, Import, ValType};

use crate::bytecode::OpCode;
use crate::members::{SlotInit, TABLE_SLOT};
use crate::runtime::Helper;

use super::{FunctionTranslator, Result};

/// Scratch functions used to reinterpret bits between `i32` and `f32`.
pub(super) const SCRATCH_STORE_I32: &str = "wasm2js_scratch_store_i32";
pub(super) const SCRATCH_LOAD_I32: &str = "wasm2js_scratch_load_i32";
pub(super) const SCRATCH_STORE_F32: &str = "wasm2js_scratch_store_f32";
pub(super) const SCRATCH_LOAD_F32: &str = "wasm2js_scratch_load_f32";

impl<'a, 'pool> FunctionTranslator<'a, 'pool> {
    /// Emit the call instruction for a result of type `ty` and coerce it.
    fn finish_call(&mut self, property: u32, argc: u32, ty: Option<ValType>) -> Result<()> {
        match ty {
            None => Ok(self.asm.call_prop_void(property, argc)?),
            Some(ValType::I32) => {
                self.asm.call_property(property, argc)?;
                Ok(self.asm.emit(OpCode::ConvertI)?)
            }
            Some(ValType::F32 | ValType::F64) => {
                self.asm.call_property(property, argc)?;
                Ok(self.asm.emit(OpCode::ConvertD)?)
            }
            Some(ty @ (ValType::I64 | ValType::V128)) => {
                Err(TranslateError::unsupported(ty.name()).into())
            }
        }
    }

    pub(super) fn call(&mut self, target: &str, operands: &[Expr], ty: Option<ValType>) -> Result<()> {
        let callee = self
            .module
            .function(target)
            .ok_or_else(|| TranslateError::UnknownFunction {
                name: target.to_owned(),
            })?;
        if callee.results.len() > 1 {
            return Err(TranslateError::unsupported("multi-value").into());
        }
        if let Some(import) = &callee.import {
            self.members
                .declare_slot(target, None, SlotInit::Import(import.clone()))?;
        }

        let property = self.asm.pool().public_qname(target);
        self.asm.get_local(0)?;
        for operand in operands {
            self.expr(operand)?;
        }
        self.finish_call(property, operands.len() as u32, ty)
    }

    /// `this.table[index](args...)`
    pub(super) fn call_indirect(
        &mut self,
        target: &Expr,
        operands: &[Expr],
        ty: Option<ValType>,
    ) -> Result<()> {
        let table = self.asm.pool().public_qname(TABLE_SLOT);
        let ns_set = self.asm.pool().public_ns_set();
        let element = self
            .asm
            .pool()
            .intern_multiname(Multiname::MultinameL { ns_set });

        self.asm.get_local(0)?;
        self.asm.get_property(table)?;
        self.expr(target)?;
        for operand in operands {
            self.expr(operand)?;
        }
        self.finish_call(element, operands.len() as u32, ty)
    }

    /// Call a runtime helper method, requesting it from the session.
    pub(super) fn call_helper(&mut self, helper: Helper, args: &[&Expr]) -> Result<()> {
        self.helpers.request(helper);
        let property = self.asm.pool().public_qname(helper.name());
        self.asm.get_local(0)?;
        for arg in args {
            self.expr(arg)?;
        }
        Ok(self.asm.call_property(property, args.len() as u32)?)
    }

    /// Declare the import slot of a scratch function and return its name.
    fn scratch(&mut self, name: &str) -> Result<u32> {
        let import = Import::new(self.options.scratch_module.clone(), name);
        self.members
            .declare_slot(name, None, SlotInit::Import(import))?;
        Ok(self.asm.pool().public_qname(name))
    }

    /// Move the bits of `value` through the scratch functions `store` and
    /// `load`, leaving the loaded value on the stack.
    pub(super) fn reinterpret(&mut self, value: &Expr, store: &str, load: &str) -> Result<()> {
        let store = self.scratch(store)?;
        let load = self.scratch(load)?;
        self.asm.get_local(0)?;
        self.expr(value)?;
        self.asm.call_prop_void(store, 1)?;
        self.asm.get_local(0)?;
        Ok(self.asm.call_property(load, 0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::assert_opcodes;
    use crate::members::MemberKind;
    use crate::translate::testing::*;
    use wasm2abc_ir::{Function, Module, UnaryOp};

    fn with_callee(callee: Function, body: Expr, results: Vec<ValType>) -> Module {
        let mut module = Module::new();
        module.add_function(callee);
        module.add_function(Function::new("f", vec![ValType::I32], results, body));
        module
    }

    #[test]
    fn direct_call_coerces_result() {
        let callee = Function::new("g", vec![ValType::I32], vec![ValType::F64], Expr::f64(0.0));
        let body = Expr::call(
            "g",
            vec![Expr::local_get(0, ValType::I32)],
            Some(ValType::F64),
        );
        let out = translate(&with_callee(callee, body, vec![ValType::F64]), "f").unwrap();
        assert_opcodes(
            &out.code.code,
            &[
                OpCode::GetLocal0,
                OpCode::GetLocal1,
                OpCode::CallProperty,
                OpCode::ConvertD,
                OpCode::ReturnValue,
            ],
        );
    }

    #[test]
    fn void_call_uses_callpropvoid() {
        let callee = Function::new("g", vec![], vec![], Expr::Nop);
        let body = Expr::call("g", vec![], None);
        let out = translate(&with_callee(callee, body, vec![]), "f").unwrap();
        assert_opcodes(
            &out.code.code,
            &[OpCode::GetLocal0, OpCode::CallPropVoid, OpCode::ReturnVoid],
        );
    }

    #[test]
    fn imported_callee_gets_a_slot() {
        let callee = Function::imported(
            "print",
            Import::new("env", "print"),
            vec![ValType::I32],
            vec![],
        );
        let body = Expr::block(None, vec![
            Expr::call("print", vec![Expr::i32(1)], None),
            Expr::call("print", vec![Expr::i32(2)], None),
        ]);
        let out = translate(&with_callee(callee, body, vec![]), "f").unwrap();
        let member = out.members.get("print").unwrap();
        assert_eq!(
            member.kind,
            MemberKind::Slot {
                type_name: None,
                init: SlotInit::Import(Import::new("env", "print")),
            }
        );
        assert_eq!(out.members.len(), 4);
    }

    #[test]
    fn unknown_callee_is_reported() {
        let module = single(vec![], vec![], Expr::call("missing", vec![], None));
        assert_eq!(
            translate(&module, "f").err(),
            Some(TranslateError::UnknownFunction {
                name: "missing".into()
            })
        );
    }

    #[test]
    fn indirect_call_goes_through_the_table() {
        let body = Expr::call_indirect(
            Expr::local_get(0, ValType::I32),
            vec![Expr::i32(4)],
            Some(ValType::I32),
        );
        let code = code_of(vec![ValType::I32], vec![ValType::I32], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::GetLocal0,
                OpCode::GetProperty,
                OpCode::GetLocal1,
                OpCode::PushByte,
                OpCode::CallProperty,
                OpCode::ConvertI,
                OpCode::ReturnValue,
            ],
        );
        assert_eq!(code.max_stack, 3);
    }

    #[test]
    fn scratch_slots_are_declared_once() {
        let reinterpret = |v| Expr::unary(UnaryOp::I32ReinterpretF32, Expr::f32(v));
        let body = Expr::binary(
            wasm2abc_ir::BinaryOp::I32Xor,
            reinterpret(1.0),
            reinterpret(2.0),
        );
        let out = translate(&single(vec![], vec![ValType::I32], body), "f").unwrap();
        let scratch: Vec<_> = out
            .members
            .iter()
            .filter(|m| m.name.starts_with("wasm2js_scratch"))
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(scratch, vec![SCRATCH_STORE_F32, SCRATCH_LOAD_I32]);
    }
}
