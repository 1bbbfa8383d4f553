//! Unary and binary operators.
//!
//! The operator sets mirror the WebAssembly MVP plus sign extension and
//! saturating truncation. 64-bit integer operators are kept so the translator
//! can reject them by name.

use crate::types::ValType;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Eqz,
    I32Extend8S,
    I32Extend16S,

    F32Neg,
    F32Abs,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32Nearest,
    F32Sqrt,
    F64Neg,
    F64Abs,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64Nearest,
    F64Sqrt,

    I32TruncF32S,
    I32TruncF32U,
    I32TruncF64S,
    I32TruncF64U,
    I32TruncSatF32S,
    I32TruncSatF32U,
    I32TruncSatF64S,
    I32TruncSatF64U,
    F32ConvertI32S,
    F32ConvertI32U,
    F64ConvertI32S,
    F64ConvertI32U,
    F64PromoteF32,
    F32DemoteF64,
    I32ReinterpretF32,
    F32ReinterpretI32,

    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Eqz,
    I64Extend8S,
    I64Extend16S,
    I64Extend32S,
    I64ExtendI32S,
    I64ExtendI32U,
    I32WrapI64,
    I64TruncF32S,
    I64TruncF32U,
    I64TruncF64S,
    I64TruncF64U,
    F32ConvertI64S,
    F32ConvertI64U,
    F64ConvertI64S,
    F64ConvertI64U,
    I64ReinterpretF64,
    F64ReinterpretI64,
}

impl UnaryOp {
    /// Whether the operator reads or produces a 64-bit integer.
    pub fn involves_i64(self) -> bool {
        use UnaryOp::*;
        matches!(
            self,
            I64Clz
                | I64Ctz
                | I64Popcnt
                | I64Eqz
                | I64Extend8S
                | I64Extend16S
                | I64Extend32S
                | I64ExtendI32S
                | I64ExtendI32U
                | I32WrapI64
                | I64TruncF32S
                | I64TruncF32U
                | I64TruncF64S
                | I64TruncF64U
                | F32ConvertI64S
                | F32ConvertI64U
                | F64ConvertI64S
                | F64ConvertI64U
                | I64ReinterpretF64
                | F64ReinterpretI64
        )
    }

    /// Text-format mnemonic.
    pub fn name(self) -> &'static str {
        use UnaryOp::*;
        match self {
            I32Clz => "i32.clz",
            I32Ctz => "i32.ctz",
            I32Popcnt => "i32.popcnt",
            I32Eqz => "i32.eqz",
            I32Extend8S => "i32.extend8_s",
            I32Extend16S => "i32.extend16_s",
            F32Neg => "f32.neg",
            F32Abs => "f32.abs",
            F32Ceil => "f32.ceil",
            F32Floor => "f32.floor",
            F32Trunc => "f32.trunc",
            F32Nearest => "f32.nearest",
            F32Sqrt => "f32.sqrt",
            F64Neg => "f64.neg",
            F64Abs => "f64.abs",
            F64Ceil => "f64.ceil",
            F64Floor => "f64.floor",
            F64Trunc => "f64.trunc",
            F64Nearest => "f64.nearest",
            F64Sqrt => "f64.sqrt",
            I32TruncF32S => "i32.trunc_f32_s",
            I32TruncF32U => "i32.trunc_f32_u",
            I32TruncF64S => "i32.trunc_f64_s",
            I32TruncF64U => "i32.trunc_f64_u",
            I32TruncSatF32S => "i32.trunc_sat_f32_s",
            I32TruncSatF32U => "i32.trunc_sat_f32_u",
            I32TruncSatF64S => "i32.trunc_sat_f64_s",
            I32TruncSatF64U => "i32.trunc_sat_f64_u",
            F32ConvertI32S => "f32.convert_i32_s",
            F32ConvertI32U => "f32.convert_i32_u",
            F64ConvertI32S => "f64.convert_i32_s",
            F64ConvertI32U => "f64.convert_i32_u",
            F64PromoteF32 => "f64.promote_f32",
            F32DemoteF64 => "f32.demote_f64",
            I32ReinterpretF32 => "i32.reinterpret_f32",
            F32ReinterpretI32 => "f32.reinterpret_i32",
            I64Clz => "i64.clz",
            I64Ctz => "i64.ctz",
            I64Popcnt => "i64.popcnt",
            I64Eqz => "i64.eqz",
            I64Extend8S => "i64.extend8_s",
            I64Extend16S => "i64.extend16_s",
            I64Extend32S => "i64.extend32_s",
            I64ExtendI32S => "i64.extend_i32_s",
            I64ExtendI32U => "i64.extend_i32_u",
            I32WrapI64 => "i32.wrap_i64",
            I64TruncF32S => "i64.trunc_f32_s",
            I64TruncF32U => "i64.trunc_f32_u",
            I64TruncF64S => "i64.trunc_f64_s",
            I64TruncF64U => "i64.trunc_f64_u",
            F32ConvertI64S => "f32.convert_i64_s",
            F32ConvertI64U => "f32.convert_i64_u",
            F64ConvertI64S => "f64.convert_i64_s",
            F64ConvertI64U => "f64.convert_i64_u",
            I64ReinterpretF64 => "i64.reinterpret_f64",
            F64ReinterpretI64 => "f64.reinterpret_i64",
        }
    }
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32LeS,
    I32LeU,
    I32GtS,
    I32GtU,
    I32GeS,
    I32GeU,

    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32Copysign,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Le,
    F32Gt,
    F32Ge,

    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64Copysign,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Le,
    F64Gt,
    F64Ge,

    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rotl,
    I64Rotr,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64LeS,
    I64LeU,
    I64GtS,
    I64GtU,
    I64GeS,
    I64GeU,
}

/// The comparison a relational operator performs, independent of type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    /// Operand type of the operator.
    pub fn operand_type(self) -> ValType {
        use BinaryOp::*;
        match self {
            I32Add | I32Sub | I32Mul | I32DivS | I32DivU | I32RemS | I32RemU | I32And | I32Or
            | I32Xor | I32Shl | I32ShrS | I32ShrU | I32Rotl | I32Rotr | I32Eq | I32Ne | I32LtS
            | I32LtU | I32LeS | I32LeU | I32GtS | I32GtU | I32GeS | I32GeU => ValType::I32,
            F32Add | F32Sub | F32Mul | F32Div | F32Min | F32Max | F32Copysign | F32Eq | F32Ne
            | F32Lt | F32Le | F32Gt | F32Ge => ValType::F32,
            F64Add | F64Sub | F64Mul | F64Div | F64Min | F64Max | F64Copysign | F64Eq | F64Ne
            | F64Lt | F64Le | F64Gt | F64Ge => ValType::F64,
            _ => ValType::I64,
        }
    }

    /// For relational operators: the comparison and whether it is unsigned.
    pub fn comparison(self) -> Option<(Comparison, bool)> {
        use BinaryOp::*;
        let cmp = match self {
            I32Eq | F32Eq | F64Eq | I64Eq => (Comparison::Eq, false),
            I32Ne | F32Ne | F64Ne | I64Ne => (Comparison::Ne, false),
            I32LtS | F32Lt | F64Lt | I64LtS => (Comparison::Lt, false),
            I32LeS | F32Le | F64Le | I64LeS => (Comparison::Le, false),
            I32GtS | F32Gt | F64Gt | I64GtS => (Comparison::Gt, false),
            I32GeS | F32Ge | F64Ge | I64GeS => (Comparison::Ge, false),
            I32LtU | I64LtU => (Comparison::Lt, true),
            I32LeU | I64LeU => (Comparison::Le, true),
            I32GtU | I64GtU => (Comparison::Gt, true),
            I32GeU | I64GeU => (Comparison::Ge, true),
            _ => return None,
        };
        Some(cmp)
    }

    /// Text-format mnemonic.
    pub fn name(self) -> &'static str {
        use BinaryOp::*;
        match self {
            I32Add => "i32.add",
            I32Sub => "i32.sub",
            I32Mul => "i32.mul",
            I32DivS => "i32.div_s",
            I32DivU => "i32.div_u",
            I32RemS => "i32.rem_s",
            I32RemU => "i32.rem_u",
            I32And => "i32.and",
            I32Or => "i32.or",
            I32Xor => "i32.xor",
            I32Shl => "i32.shl",
            I32ShrS => "i32.shr_s",
            I32ShrU => "i32.shr_u",
            I32Rotl => "i32.rotl",
            I32Rotr => "i32.rotr",
            I32Eq => "i32.eq",
            I32Ne => "i32.ne",
            I32LtS => "i32.lt_s",
            I32LtU => "i32.lt_u",
            I32LeS => "i32.le_s",
            I32LeU => "i32.le_u",
            I32GtS => "i32.gt_s",
            I32GtU => "i32.gt_u",
            I32GeS => "i32.ge_s",
            I32GeU => "i32.ge_u",
            F32Add => "f32.add",
            F32Sub => "f32.sub",
            F32Mul => "f32.mul",
            F32Div => "f32.div",
            F32Min => "f32.min",
            F32Max => "f32.max",
            F32Copysign => "f32.copysign",
            F32Eq => "f32.eq",
            F32Ne => "f32.ne",
            F32Lt => "f32.lt",
            F32Le => "f32.le",
            F32Gt => "f32.gt",
            F32Ge => "f32.ge",
            F64Add => "f64.add",
            F64Sub => "f64.sub",
            F64Mul => "f64.mul",
            F64Div => "f64.div",
            F64Min => "f64.min",
            F64Max => "f64.max",
            F64Copysign => "f64.copysign",
            F64Eq => "f64.eq",
            F64Ne => "f64.ne",
            F64Lt => "f64.lt",
            F64Le => "f64.le",
            F64Gt => "f64.gt",
            F64Ge => "f64.ge",
            I64Add => "i64.add",
            I64Sub => "i64.sub",
            I64Mul => "i64.mul",
            I64DivS => "i64.div_s",
            I64DivU => "i64.div_u",
            I64RemS => "i64.rem_s",
            I64RemU => "i64.rem_u",
            I64And => "i64.and",
            I64Or => "i64.or",
            I64Xor => "i64.xor",
            I64Shl => "i64.shl",
            I64ShrS => "i64.shr_s",
            I64ShrU => "i64.shr_u",
            I64Rotl => "i64.rotl",
            I64Rotr => "i64.rotr",
            I64Eq => "i64.eq",
            I64Ne => "i64.ne",
            I64LtS => "i64.lt_s",
            I64LtU => "i64.lt_u",
            I64LeS => "i64.le_s",
            I64LeU => "i64.le_u",
            I64GtS => "i64.gt_s",
            I64GtU => "i64.gt_u",
            I64GeS => "i64.ge_s",
            I64GeU => "i64.ge_u",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_classification() {
        assert_eq!(
            BinaryOp::I32LtU.comparison(),
            Some((Comparison::Lt, true))
        );
        assert_eq!(
            BinaryOp::F64Ne.comparison(),
            Some((Comparison::Ne, false))
        );
        assert_eq!(BinaryOp::I32Add.comparison(), None);
    }

    #[test]
    fn operand_types() {
        assert_eq!(BinaryOp::I32Shl.operand_type(), ValType::I32);
        assert_eq!(BinaryOp::F32Copysign.operand_type(), ValType::F32);
        assert_eq!(BinaryOp::I64Add.operand_type(), ValType::I64);
    }

    #[test]
    fn i64_unary_detection() {
        assert!(UnaryOp::I32WrapI64.involves_i64());
        assert!(!UnaryOp::I32Eqz.involves_i64());
    }
}
