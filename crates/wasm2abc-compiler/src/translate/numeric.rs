//! Constants and numeric operators.
//!
//! `i32` values live as `int`, `f32` and `f64` as `Number`. Operators the VM
//! computes in `Number` are coerced back with `convert_i`; unsigned operands are
//! widened with `convert_u` first.

use wasm2abc_core::TranslateError;
use wasm2abc_ir::{BinaryOp, Comparison, Expr, Literal, UnaryOp, ValType};

use crate::bytecode::OpCode;
use crate::runtime::Helper;

use super::calls::{SCRATCH_LOAD_F32, SCRATCH_LOAD_I32, SCRATCH_STORE_F32, SCRATCH_STORE_I32};
use super::{FunctionTranslator, Result};

/// Value-producing opcode for a comparison.
fn compare_op(cmp: Comparison) -> OpCode {
    match cmp {
        Comparison::Eq | Comparison::Ne => OpCode::StrictEquals,
        Comparison::Lt => OpCode::LessThan,
        Comparison::Le => OpCode::LessEquals,
        Comparison::Gt => OpCode::GreaterThan,
        Comparison::Ge => OpCode::GreaterEquals,
    }
}

impl<'a, 'pool> FunctionTranslator<'a, 'pool> {
    pub(super) fn constant(&mut self, literal: &Literal) -> Result<()> {
        match *literal {
            Literal::I32(value) => Ok(self.asm.push_int(value)?),
            Literal::F32(value) => Ok(self.asm.push_double(f64::from(value))?),
            Literal::F64(value) => Ok(self.asm.push_double(value)?),
            Literal::I64(_) => Err(TranslateError::unsupported("i64.const").into()),
        }
    }

    // ==========================================================================
    // Unary operators
    // ==========================================================================

    pub(super) fn unary(&mut self, op: UnaryOp, value: &Expr) -> Result<()> {
        use UnaryOp::*;

        if op.involves_i64() {
            return Err(TranslateError::unsupported(op.name()).into());
        }

        match op {
            I32Clz => {
                self.call_helper(Helper::Clz32, &[value])?;
                Ok(self.asm.emit(OpCode::ConvertI)?)
            }
            I32Eqz => {
                self.expr(value)?;
                self.asm.push_int(0)?;
                self.asm.emit(OpCode::StrictEquals)?;
                Ok(self.asm.emit(OpCode::ConvertI)?)
            }
            I32Extend8S => self.then_emit(value, &[OpCode::Sxi8]),
            I32Extend16S => self.then_emit(value, &[OpCode::Sxi16]),

            F32Neg | F64Neg => self.then_emit(value, &[OpCode::Negate]),
            F32Abs | F64Abs => self.call_helper(Helper::Abs, &[value]),
            F32Ceil | F64Ceil => self.call_helper(Helper::Ceil, &[value]),
            F32Floor | F64Floor => self.call_helper(Helper::Floor, &[value]),
            F32Sqrt | F64Sqrt => self.call_helper(Helper::Sqrt, &[value]),

            I32TruncF32S | I32TruncF64S | I32TruncSatF32S | I32TruncSatF64S => {
                self.then_emit(value, &[OpCode::ConvertI])
            }
            I32TruncF32U | I32TruncF64U | I32TruncSatF32U | I32TruncSatF64U => {
                self.then_emit(value, &[OpCode::ConvertU])
            }
            F32ConvertI32S | F64ConvertI32S => self.then_emit(value, &[OpCode::ConvertD]),
            F32ConvertI32U | F64ConvertI32U => {
                self.then_emit(value, &[OpCode::ConvertU, OpCode::ConvertD])
            }
            // Both widths are `Number`.
            F64PromoteF32 | F32DemoteF64 => self.expr(value),

            I32ReinterpretF32 => {
                self.reinterpret(value, SCRATCH_STORE_F32, SCRATCH_LOAD_I32)?;
                Ok(self.asm.emit(OpCode::ConvertI)?)
            }
            F32ReinterpretI32 => {
                self.reinterpret(value, SCRATCH_STORE_I32, SCRATCH_LOAD_F32)?;
                Ok(self.asm.emit(OpCode::ConvertD)?)
            }

            // ctz, popcnt, trunc and nearest are lowered upstream.
            _ => Err(TranslateError::unsupported(op.name()).into()),
        }
    }

    /// Emit `value` followed by `ops`.
    fn then_emit(&mut self, value: &Expr, ops: &[OpCode]) -> Result<()> {
        self.expr(value)?;
        for &op in ops {
            self.asm.emit(op)?;
        }
        Ok(())
    }

    // ==========================================================================
    // Binary operators
    // ==========================================================================

    pub(super) fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<()> {
        use BinaryOp::*;

        if op.operand_type() == ValType::I64 {
            return Err(TranslateError::unsupported(op.name()).into());
        }

        if let Some((cmp, unsigned)) = op.comparison() {
            self.operand(left, unsigned)?;
            self.operand(right, unsigned)?;
            self.asm.emit(compare_op(cmp))?;
            if cmp == Comparison::Ne {
                self.asm.emit(OpCode::Not)?;
            }
            return Ok(self.asm.emit(OpCode::ConvertI)?);
        }

        match op {
            I32Add => self.step_or(left, right, 1, OpCode::AddI),
            I32Sub => self.step_or(left, right, -1, OpCode::SubtractI),
            I32Mul => self.operands_then(left, right, false, &[OpCode::MultiplyI]),
            I32DivS => self.operands_then(left, right, false, &[OpCode::Divide, OpCode::ConvertI]),
            I32DivU => self.operands_then(left, right, true, &[OpCode::Divide, OpCode::ConvertI]),
            I32RemS => self.operands_then(left, right, false, &[OpCode::Modulo, OpCode::ConvertI]),
            I32RemU => self.operands_then(left, right, true, &[OpCode::Modulo, OpCode::ConvertI]),
            I32And => self.operands_then(left, right, false, &[OpCode::BitAnd]),
            I32Or => self.operands_then(left, right, false, &[OpCode::BitOr]),
            I32Xor => self.operands_then(left, right, false, &[OpCode::BitXor]),
            I32Shl => self.operands_then(left, right, false, &[OpCode::LShift]),
            I32ShrS => self.operands_then(left, right, false, &[OpCode::RShift]),
            I32ShrU => {
                self.operands_then(left, right, false, &[OpCode::URShift, OpCode::ConvertI])
            }

            F32Add | F64Add => self.operands_then(left, right, false, &[OpCode::Add]),
            F32Sub | F64Sub => self.operands_then(left, right, false, &[OpCode::Subtract]),
            F32Mul | F64Mul => self.operands_then(left, right, false, &[OpCode::Multiply]),
            F32Div | F64Div => self.operands_then(left, right, false, &[OpCode::Divide]),
            F32Min | F64Min => self.call_helper(Helper::Min, &[left, right]),
            F32Max | F64Max => self.call_helper(Helper::Max, &[left, right]),

            _ => Err(TranslateError::unsupported(op.name()).into()),
        }
    }

    fn operands_then(
        &mut self,
        left: &Expr,
        right: &Expr,
        unsigned: bool,
        ops: &[OpCode],
    ) -> Result<()> {
        self.operand(left, unsigned)?;
        self.operand(right, unsigned)?;
        for &op in ops {
            self.asm.emit(op)?;
        }
        Ok(())
    }

    /// `left ± right`, using `increment_i` / `decrement_i` when `right` is a
    /// unit constant. `sign` is `1` for addition and `-1` for subtraction.
    fn step_or(&mut self, left: &Expr, right: &Expr, sign: i32, op: OpCode) -> Result<()> {
        let step = right.as_i32_const().and_then(|c| c.checked_mul(sign));
        match step {
            Some(1) => self.then_emit(left, &[OpCode::IncrementI]),
            Some(-1) => self.then_emit(left, &[OpCode::DecrementI]),
            _ => self.operands_then(left, right, false, &[op]),
        }
    }
}
