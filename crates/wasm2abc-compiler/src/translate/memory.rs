//! Locals, globals and linear memory.

use wasm2abc_core::TranslateError;
use wasm2abc_ir::{BinaryOp, Expr, ValType};

use crate::bytecode::OpCode;
use crate::members::SlotInit;
use crate::options::QualifiedName;
use crate::runtime::Helper;

use super::{FunctionTranslator, Result};

/// Static type of a value slot.
pub(crate) fn avm_type(ty: ValType) -> std::result::Result<QualifiedName, TranslateError> {
    match ty {
        ValType::I32 => Ok(QualifiedName::public("int")),
        ValType::F32 | ValType::F64 => Ok(QualifiedName::public("Number")),
        ValType::I64 | ValType::V128 => Err(TranslateError::unsupported(ty.name())),
    }
}

/// The `±1` step of `local = local ± const`, if that is what `value` computes.
fn local_step(index: u32, value: &Expr) -> Option<i32> {
    let Expr::Binary { op, left, right } = value else {
        return None;
    };
    match left.as_ref() {
        Expr::LocalGet { index: source, .. } if *source == index => {}
        _ => return None,
    }
    let step = match (op, right.as_i32_const()?) {
        (BinaryOp::I32Add, c) => c,
        (BinaryOp::I32Sub, c) => c.checked_neg()?,
        _ => return None,
    };
    matches!(step, 1 | -1).then_some(step)
}

impl<'a, 'pool> FunctionTranslator<'a, 'pool> {
    // ==========================================================================
    // Locals
    // ==========================================================================

    /// Register slot and type of local `index`. Slot 0 is the receiver.
    pub(super) fn local(&self, index: u32) -> Result<(u32, ValType)> {
        let ty = self.function.local_type(index).ok_or_else(|| {
            TranslateError::invalid(format!(
                "local {} out of range in '{}'",
                index, self.function.name
            ))
        })?;
        Ok((index + 1, ty))
    }

    pub(super) fn local_set(&mut self, index: u32, value: &Expr, is_tee: bool) -> Result<()> {
        let (slot, ty) = self.local(index)?;

        if ty == ValType::I32 {
            if let Some(step) = local_step(index, value) {
                if step == 1 {
                    self.asm.inc_local_i(slot)?;
                } else {
                    self.asm.dec_local_i(slot)?;
                }
                if is_tee {
                    self.asm.get_local(slot)?;
                }
                return Ok(());
            }
        }

        self.expr(value)?;
        if is_tee {
            self.asm.emit(OpCode::Dup)?;
        }
        Ok(self.asm.set_local(slot)?)
    }

    // ==========================================================================
    // Globals
    // ==========================================================================

    /// Declare the slot backing global `name` and return its property name.
    fn global_slot(&mut self, name: &str) -> Result<u32> {
        let global = self
            .module
            .global(name)
            .ok_or_else(|| TranslateError::UnknownGlobal {
                name: name.to_owned(),
            })?;
        let ty = avm_type(global.ty)?;
        self.members.declare_slot(name, Some(ty), SlotInit::Global)?;
        Ok(self.asm.pool().public_qname(name))
    }

    pub(super) fn global_get(&mut self, name: &str) -> Result<()> {
        let property = self.global_slot(name)?;
        self.asm.get_local(0)?;
        Ok(self.asm.get_property(property)?)
    }

    pub(super) fn global_set(&mut self, name: &str, value: &Expr) -> Result<()> {
        let property = self.global_slot(name)?;
        self.asm.get_local(0)?;
        self.expr(value)?;
        Ok(self.asm.set_property(property)?)
    }

    // ==========================================================================
    // Linear memory
    // ==========================================================================

    /// Effective address `ptr + offset`, folded when `ptr` is constant.
    fn address(&mut self, ptr: &Expr, offset: u32) -> Result<()> {
        if let Some(base) = ptr.as_i32_const() {
            return Ok(self.asm.push_int(base.wrapping_add(offset as i32))?);
        }
        self.expr(ptr)?;
        if offset != 0 {
            self.asm.push_int(offset as i32)?;
            self.asm.emit(OpCode::AddI)?;
        }
        Ok(())
    }

    pub(super) fn load(
        &mut self,
        bytes: u8,
        signed: bool,
        offset: u32,
        ty: ValType,
        ptr: &Expr,
    ) -> Result<()> {
        let (op, extend) = match (ty, bytes) {
            (ValType::I32, 1) => (OpCode::Li8, signed.then_some(OpCode::Sxi8)),
            (ValType::I32, 2) => (OpCode::Li16, signed.then_some(OpCode::Sxi16)),
            (ValType::I32, 4) => (OpCode::Li32, None),
            (ValType::F32, 4) => (OpCode::Lf32, None),
            (ValType::F64, 8) => (OpCode::Lf64, None),
            (ValType::I64 | ValType::V128, _) => {
                return Err(TranslateError::unsupported(format!("{}.load", ty)).into());
            }
            _ => {
                return Err(
                    TranslateError::invalid(format!("{}-byte load of {}", bytes, ty)).into(),
                );
            }
        };

        self.address(ptr, offset)?;
        self.asm.emit(op)?;
        if let Some(extend) = extend {
            self.asm.emit(extend)?;
        }
        Ok(())
    }

    pub(super) fn store(
        &mut self,
        bytes: u8,
        offset: u32,
        ptr: &Expr,
        value: &Expr,
        value_ty: ValType,
    ) -> Result<()> {
        let op = match (value_ty, bytes) {
            (ValType::I32, 1) => OpCode::Si8,
            (ValType::I32, 2) => OpCode::Si16,
            (ValType::I32, 4) => OpCode::Si32,
            (ValType::F32, 4) => OpCode::Sf32,
            (ValType::F64, 8) => OpCode::Sf64,
            (ValType::I64 | ValType::V128, _) => {
                return Err(TranslateError::unsupported(format!("{}.store", value_ty)).into());
            }
            _ => {
                return Err(TranslateError::invalid(format!(
                    "{}-byte store of {}",
                    bytes, value_ty
                ))
                .into());
            }
        };

        // Store instructions take the address on top.
        self.address(ptr, offset)?;
        self.expr(value)?;
        self.asm.emit(OpCode::Swap)?;
        Ok(self.asm.emit(op)?)
    }

    pub(super) fn memory_size(&mut self) -> Result<()> {
        self.call_helper(Helper::MemorySize, &[])?;
        Ok(self.asm.emit(OpCode::ConvertI)?)
    }

    pub(super) fn memory_grow(&mut self, delta: &Expr) -> Result<()> {
        self.call_helper(Helper::MemoryGrow, &[delta])?;
        Ok(self.asm.emit(OpCode::ConvertI)?)
    }
}
