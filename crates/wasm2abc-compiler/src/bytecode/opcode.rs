//! AVM2 operation codes.
//!
//! Each opcode is a single byte followed by its operands. Operand layouts are
//! described by [`OpCode::operands`] so code can be walked without knowing
//! what an instruction does.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// AVM2 operation codes emitted by the translator.
///
/// The machine is stack based. Most operations pop operands from the operand
/// stack and push results back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum OpCode {
    // =========================================================================
    // Control
    // =========================================================================
    Nop = 0x02,
    Throw = 0x03,
    Kill = 0x08,
    /// Marks a backward branch target.
    Label = 0x09,
    IfNlt = 0x0c,
    IfNle = 0x0d,
    IfNgt = 0x0e,
    IfNge = 0x0f,
    Jump = 0x10,
    IfTrue = 0x11,
    IfFalse = 0x12,
    IfEq = 0x13,
    IfNe = 0x14,
    IfLt = 0x15,
    IfLe = 0x16,
    IfGt = 0x17,
    IfGe = 0x18,
    IfStrictEq = 0x19,
    IfStrictNe = 0x1a,
    /// Operands: s24 default, u30 case count - 1, s24 per case.
    LookupSwitch = 0x1b,
    PopScope = 0x1d,

    // =========================================================================
    // Constants and stack
    // =========================================================================
    PushNull = 0x20,
    PushUndefined = 0x21,
    /// Operand: u8 (sign-extended)
    PushByte = 0x24,
    /// Operand: u30 holding a sign-extended 16-bit value
    PushShort = 0x25,
    PushTrue = 0x26,
    PushFalse = 0x27,
    PushNan = 0x28,
    Pop = 0x29,
    Dup = 0x2a,
    Swap = 0x2b,
    /// Operand: u30 string index
    PushString = 0x2c,
    /// Operand: u30 integer index
    PushInt = 0x2d,
    /// Operand: u30 unsigned integer index
    PushUint = 0x2e,
    /// Operand: u30 double index
    PushDouble = 0x2f,
    PushScope = 0x30,

    // =========================================================================
    // Domain memory
    // =========================================================================
    Li8 = 0x35,
    Li16 = 0x36,
    Li32 = 0x37,
    Lf32 = 0x38,
    Lf64 = 0x39,
    Si8 = 0x3a,
    Si16 = 0x3b,
    Si32 = 0x3c,
    Sf32 = 0x3d,
    Sf64 = 0x3e,

    // =========================================================================
    // Calls and construction
    // =========================================================================
    NewFunction = 0x40,
    Call = 0x41,
    Construct = 0x42,
    /// Operands: u30 dispatch id, u30 argument count
    CallMethod = 0x43,
    /// Operands: u30 multiname, u30 argument count
    CallProperty = 0x46,
    ReturnVoid = 0x47,
    ReturnValue = 0x48,
    ConstructSuper = 0x49,
    ConstructProp = 0x4a,
    CallPropLex = 0x4c,
    CallPropVoid = 0x4f,
    Sxi1 = 0x50,
    Sxi8 = 0x51,
    Sxi16 = 0x52,
    NewObject = 0x55,
    NewArray = 0x56,
    NewClass = 0x58,

    // =========================================================================
    // Properties, scopes and locals
    // =========================================================================
    FindPropStrict = 0x5d,
    GetLex = 0x60,
    SetProperty = 0x61,
    GetLocal = 0x62,
    SetLocal = 0x63,
    GetGlobalScope = 0x64,
    /// Operand: u8 scope index
    GetScopeObject = 0x65,
    GetProperty = 0x66,
    InitProperty = 0x68,
    GetSlot = 0x6c,
    SetSlot = 0x6d,

    // =========================================================================
    // Conversions
    // =========================================================================
    ConvertI = 0x73,
    ConvertU = 0x74,
    ConvertD = 0x75,
    Coerce = 0x80,

    // =========================================================================
    // Arithmetic and comparison
    // =========================================================================
    Negate = 0x90,
    Increment = 0x91,
    IncLocal = 0x92,
    Decrement = 0x93,
    DecLocal = 0x94,
    Not = 0x96,
    BitNot = 0x97,
    Add = 0xa0,
    Subtract = 0xa1,
    Multiply = 0xa2,
    Divide = 0xa3,
    Modulo = 0xa4,
    LShift = 0xa5,
    RShift = 0xa6,
    URShift = 0xa7,
    BitAnd = 0xa8,
    BitOr = 0xa9,
    BitXor = 0xaa,
    Equals = 0xab,
    StrictEquals = 0xac,
    LessThan = 0xad,
    LessEquals = 0xae,
    GreaterThan = 0xaf,
    GreaterEquals = 0xb0,
    IncrementI = 0xc0,
    DecrementI = 0xc1,
    IncLocalI = 0xc2,
    DecLocalI = 0xc3,
    NegateI = 0xc4,
    AddI = 0xc5,
    SubtractI = 0xc6,
    MultiplyI = 0xc7,
    GetLocal0 = 0xd0,
    GetLocal1 = 0xd1,
    GetLocal2 = 0xd2,
    GetLocal3 = 0xd3,
    SetLocal0 = 0xd4,
    SetLocal1 = 0xd5,
    SetLocal2 = 0xd6,
    SetLocal3 = 0xd7,
}

/// The encoding of one operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// Raw byte.
    U8,
    /// Plain `u30` immediate (local slot, count, scope index).
    U30,
    /// Branch displacement.
    S24,
    /// `u30` index into the integer pool.
    Int,
    /// `u30` index into the unsigned integer pool.
    UInt,
    /// `u30` index into the double pool.
    Double,
    /// `u30` index into the string pool.
    String,
    /// `u30` index into the multiname pool.
    Multiname,
    /// `u30` index into the method table.
    Method,
    /// `u30` index into the class table.
    Class,
}

impl OpCode {
    /// Convert from u8, returning None for bytes outside the instruction set.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::try_from(value).ok()
    }

    /// Operand layout following the opcode byte.
    ///
    /// `LookupSwitch` has a variable layout and reports only its default
    /// displacement and case count; the case table follows.
    pub fn operands(&self) -> &'static [Operand] {
        use Operand::*;
        match self {
            OpCode::IfNlt
            | OpCode::IfNle
            | OpCode::IfNgt
            | OpCode::IfNge
            | OpCode::Jump
            | OpCode::IfTrue
            | OpCode::IfFalse
            | OpCode::IfEq
            | OpCode::IfNe
            | OpCode::IfLt
            | OpCode::IfLe
            | OpCode::IfGt
            | OpCode::IfGe
            | OpCode::IfStrictEq
            | OpCode::IfStrictNe => &[S24],
            OpCode::LookupSwitch => &[S24, U30],

            OpCode::PushByte | OpCode::GetScopeObject => &[U8],
            OpCode::PushShort
            | OpCode::Kill
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::IncLocal
            | OpCode::DecLocal
            | OpCode::IncLocalI
            | OpCode::DecLocalI
            | OpCode::GetSlot
            | OpCode::SetSlot
            | OpCode::Call
            | OpCode::Construct
            | OpCode::ConstructSuper
            | OpCode::NewObject
            | OpCode::NewArray => &[U30],
            OpCode::PushString => &[String],
            OpCode::PushInt => &[Int],
            OpCode::PushUint => &[UInt],
            OpCode::PushDouble => &[Double],

            OpCode::GetProperty
            | OpCode::SetProperty
            | OpCode::InitProperty
            | OpCode::GetLex
            | OpCode::FindPropStrict
            | OpCode::Coerce => &[Multiname],
            OpCode::CallProperty
            | OpCode::CallPropVoid
            | OpCode::CallPropLex
            | OpCode::ConstructProp => &[Multiname, U30],
            OpCode::CallMethod => &[U30, U30],
            OpCode::NewFunction => &[Method],
            OpCode::NewClass => &[Class],

            _ => &[],
        }
    }

    /// Fixed `(pops, pushes)` for opcodes whose stack effect does not depend on
    /// their operands. `None` for call-like and runtime-name instructions.
    pub fn stack_effect(&self) -> Option<(u32, u32)> {
        let effect = match self {
            OpCode::Nop | OpCode::Label | OpCode::Jump | OpCode::Kill => (0, 0),
            OpCode::IncLocal | OpCode::DecLocal | OpCode::IncLocalI | OpCode::DecLocalI => (0, 0),
            OpCode::ReturnVoid | OpCode::PopScope => (0, 0),
            OpCode::Throw | OpCode::ReturnValue | OpCode::Pop | OpCode::PushScope => (1, 0),
            OpCode::IfTrue | OpCode::IfFalse | OpCode::LookupSwitch => (1, 0),
            OpCode::IfNlt
            | OpCode::IfNle
            | OpCode::IfNgt
            | OpCode::IfNge
            | OpCode::IfEq
            | OpCode::IfNe
            | OpCode::IfLt
            | OpCode::IfLe
            | OpCode::IfGt
            | OpCode::IfGe
            | OpCode::IfStrictEq
            | OpCode::IfStrictNe => (2, 0),

            OpCode::PushNull
            | OpCode::PushUndefined
            | OpCode::PushByte
            | OpCode::PushShort
            | OpCode::PushTrue
            | OpCode::PushFalse
            | OpCode::PushNan
            | OpCode::PushString
            | OpCode::PushInt
            | OpCode::PushUint
            | OpCode::PushDouble
            | OpCode::GetLocal
            | OpCode::GetLocal0
            | OpCode::GetLocal1
            | OpCode::GetLocal2
            | OpCode::GetLocal3
            | OpCode::GetGlobalScope
            | OpCode::GetScopeObject
            | OpCode::GetLex
            | OpCode::FindPropStrict
            | OpCode::NewFunction => (0, 1),

            OpCode::SetLocal
            | OpCode::SetLocal0
            | OpCode::SetLocal1
            | OpCode::SetLocal2
            | OpCode::SetLocal3 => (1, 0),

            OpCode::Dup => (1, 2),
            OpCode::Swap => (2, 2),

            OpCode::Li8
            | OpCode::Li16
            | OpCode::Li32
            | OpCode::Lf32
            | OpCode::Lf64
            | OpCode::Sxi1
            | OpCode::Sxi8
            | OpCode::Sxi16
            | OpCode::ConvertI
            | OpCode::ConvertU
            | OpCode::ConvertD
            | OpCode::Coerce
            | OpCode::Negate
            | OpCode::Increment
            | OpCode::Decrement
            | OpCode::Not
            | OpCode::BitNot
            | OpCode::IncrementI
            | OpCode::DecrementI
            | OpCode::NegateI
            | OpCode::GetSlot
            | OpCode::NewClass => (1, 1),

            OpCode::Si8
            | OpCode::Si16
            | OpCode::Si32
            | OpCode::Sf32
            | OpCode::Sf64
            | OpCode::SetSlot => (2, 0),

            OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Modulo
            | OpCode::LShift
            | OpCode::RShift
            | OpCode::URShift
            | OpCode::BitAnd
            | OpCode::BitOr
            | OpCode::BitXor
            | OpCode::Equals
            | OpCode::StrictEquals
            | OpCode::LessThan
            | OpCode::LessEquals
            | OpCode::GreaterThan
            | OpCode::GreaterEquals
            | OpCode::AddI
            | OpCode::SubtractI
            | OpCode::MultiplyI => (2, 1),

            OpCode::Call
            | OpCode::Construct
            | OpCode::CallMethod
            | OpCode::CallProperty
            | OpCode::ConstructSuper
            | OpCode::ConstructProp
            | OpCode::CallPropLex
            | OpCode::CallPropVoid
            | OpCode::NewObject
            | OpCode::NewArray
            | OpCode::SetProperty
            | OpCode::GetProperty
            | OpCode::InitProperty => return None,
        };
        Some(effect)
    }

    /// Whether control never continues to the next instruction.
    pub fn ends_flow(&self) -> bool {
        matches!(
            self,
            OpCode::Jump
                | OpCode::ReturnVoid
                | OpCode::ReturnValue
                | OpCode::Throw
                | OpCode::LookupSwitch
        )
    }

    /// Whether this is a branch with a single s24 displacement.
    pub fn is_branch(&self) -> bool {
        self.operands() == [Operand::S24]
    }

    /// Assembly mnemonic.
    pub fn name(&self) -> &'static str {
        match self {
            OpCode::Nop => "nop",
            OpCode::Throw => "throw",
            OpCode::Kill => "kill",
            OpCode::Label => "label",
            OpCode::IfNlt => "ifnlt",
            OpCode::IfNle => "ifnle",
            OpCode::IfNgt => "ifngt",
            OpCode::IfNge => "ifnge",
            OpCode::Jump => "jump",
            OpCode::IfTrue => "iftrue",
            OpCode::IfFalse => "iffalse",
            OpCode::IfEq => "ifeq",
            OpCode::IfNe => "ifne",
            OpCode::IfLt => "iflt",
            OpCode::IfLe => "ifle",
            OpCode::IfGt => "ifgt",
            OpCode::IfGe => "ifge",
            OpCode::IfStrictEq => "ifstricteq",
            OpCode::IfStrictNe => "ifstrictne",
            OpCode::LookupSwitch => "lookupswitch",
            OpCode::PopScope => "popscope",
            OpCode::PushNull => "pushnull",
            OpCode::PushUndefined => "pushundefined",
            OpCode::PushByte => "pushbyte",
            OpCode::PushShort => "pushshort",
            OpCode::PushTrue => "pushtrue",
            OpCode::PushFalse => "pushfalse",
            OpCode::PushNan => "pushnan",
            OpCode::Pop => "pop",
            OpCode::Dup => "dup",
            OpCode::Swap => "swap",
            OpCode::PushString => "pushstring",
            OpCode::PushInt => "pushint",
            OpCode::PushUint => "pushuint",
            OpCode::PushDouble => "pushdouble",
            OpCode::PushScope => "pushscope",
            OpCode::Li8 => "li8",
            OpCode::Li16 => "li16",
            OpCode::Li32 => "li32",
            OpCode::Lf32 => "lf32",
            OpCode::Lf64 => "lf64",
            OpCode::Si8 => "si8",
            OpCode::Si16 => "si16",
            OpCode::Si32 => "si32",
            OpCode::Sf32 => "sf32",
            OpCode::Sf64 => "sf64",
            OpCode::NewFunction => "newfunction",
            OpCode::Call => "call",
            OpCode::Construct => "construct",
            OpCode::CallMethod => "callmethod",
            OpCode::CallProperty => "callproperty",
            OpCode::ReturnVoid => "returnvoid",
            OpCode::ReturnValue => "returnvalue",
            OpCode::ConstructSuper => "constructsuper",
            OpCode::ConstructProp => "constructprop",
            OpCode::CallPropLex => "callproplex",
            OpCode::CallPropVoid => "callpropvoid",
            OpCode::Sxi1 => "sxi1",
            OpCode::Sxi8 => "sxi8",
            OpCode::Sxi16 => "sxi16",
            OpCode::NewObject => "newobject",
            OpCode::NewArray => "newarray",
            OpCode::NewClass => "newclass",
            OpCode::FindPropStrict => "findpropstrict",
            OpCode::GetLex => "getlex",
            OpCode::SetProperty => "setproperty",
            OpCode::GetLocal => "getlocal",
            OpCode::SetLocal => "setlocal",
            OpCode::GetGlobalScope => "getglobalscope",
            OpCode::GetScopeObject => "getscopeobject",
            OpCode::GetProperty => "getproperty",
            OpCode::InitProperty => "initproperty",
            OpCode::GetSlot => "getslot",
            OpCode::SetSlot => "setslot",
            OpCode::ConvertI => "convert_i",
            OpCode::ConvertU => "convert_u",
            OpCode::ConvertD => "convert_d",
            OpCode::Coerce => "coerce",
            OpCode::Negate => "negate",
            OpCode::Increment => "increment",
            OpCode::IncLocal => "inclocal",
            OpCode::Decrement => "decrement",
            OpCode::DecLocal => "declocal",
            OpCode::Not => "not",
            OpCode::BitNot => "bitnot",
            OpCode::Add => "add",
            OpCode::Subtract => "subtract",
            OpCode::Multiply => "multiply",
            OpCode::Divide => "divide",
            OpCode::Modulo => "modulo",
            OpCode::LShift => "lshift",
            OpCode::RShift => "rshift",
            OpCode::URShift => "urshift",
            OpCode::BitAnd => "bitand",
            OpCode::BitOr => "bitor",
            OpCode::BitXor => "bitxor",
            OpCode::Equals => "equals",
            OpCode::StrictEquals => "strictequals",
            OpCode::LessThan => "lessthan",
            OpCode::LessEquals => "lessequals",
            OpCode::GreaterThan => "greaterthan",
            OpCode::GreaterEquals => "greaterequals",
            OpCode::IncrementI => "increment_i",
            OpCode::DecrementI => "decrement_i",
            OpCode::IncLocalI => "inclocal_i",
            OpCode::DecLocalI => "declocal_i",
            OpCode::NegateI => "negate_i",
            OpCode::AddI => "add_i",
            OpCode::SubtractI => "subtract_i",
            OpCode::MultiplyI => "multiply_i",
            OpCode::GetLocal0 => "getlocal0",
            OpCode::GetLocal1 => "getlocal1",
            OpCode::GetLocal2 => "getlocal2",
            OpCode::GetLocal3 => "getlocal3",
            OpCode::SetLocal0 => "setlocal0",
            OpCode::SetLocal1 => "setlocal1",
            OpCode::SetLocal2 => "setlocal2",
            OpCode::SetLocal3 => "setlocal3",
        }
    }
}
