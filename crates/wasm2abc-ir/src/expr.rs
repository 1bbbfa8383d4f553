//! Expression trees.

use crate::ops::{BinaryOp, UnaryOp};
use crate::types::{Literal, ValType};

/// An expression node of a function body.
///
/// Structured control flow is nested: blocks, loops and ifs own their
/// children, and branches name their target by label.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A sequence of expressions. A named block is a forward branch target.
    Block {
        name: Option<String>,
        children: Vec<Expr>,
    },
    If {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Option<Box<Expr>>,
    },
    /// A loop. Branches to `name` jump back to the top.
    Loop { name: String, body: Box<Expr> },
    /// `br` / `br_if` with an optional carried value.
    Break {
        name: String,
        condition: Option<Box<Expr>>,
        value: Option<Box<Expr>>,
    },
    /// `br_table`.
    Switch {
        names: Vec<String>,
        default_name: String,
        condition: Box<Expr>,
        value: Option<Box<Expr>>,
    },
    Call {
        target: String,
        operands: Vec<Expr>,
        ty: Option<ValType>,
    },
    CallIndirect {
        target: Box<Expr>,
        operands: Vec<Expr>,
        ty: Option<ValType>,
    },
    LocalGet { index: u32, ty: ValType },
    /// `local.set`, or `local.tee` when `is_tee` is set.
    LocalSet {
        index: u32,
        value: Box<Expr>,
        is_tee: bool,
    },
    GlobalGet { name: String, ty: ValType },
    GlobalSet { name: String, value: Box<Expr> },
    Load {
        bytes: u8,
        signed: bool,
        offset: u32,
        ty: ValType,
        ptr: Box<Expr>,
    },
    Store {
        bytes: u8,
        offset: u32,
        ptr: Box<Expr>,
        value: Box<Expr>,
        value_ty: ValType,
    },
    Const(Literal),
    Unary { op: UnaryOp, value: Box<Expr> },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Select {
        if_true: Box<Expr>,
        if_false: Box<Expr>,
        condition: Box<Expr>,
    },
    Drop { value: Box<Expr> },
    Return { value: Option<Box<Expr>> },
    MemorySize,
    MemoryGrow { delta: Box<Expr> },
    Nop,
    Unreachable,
    /// Atomic memory access.
    Atomic(AtomicKind),
    /// 128-bit vector operation.
    Simd(SimdKind),
    /// Bulk memory operation.
    BulkMemory(BulkMemoryKind),
    /// Exception handling.
    Exception(ExceptionKind),
    /// Multi-value tuple construction or projection.
    Tuple(TupleKind),
}

/// Atomic expression kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtomicKind {
    Rmw,
    Cmpxchg,
    Wait,
    Notify,
    Fence,
}

/// SIMD expression kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdKind {
    Extract,
    Replace,
    Shuffle,
    Ternary,
    Shift,
    Load,
}

/// Bulk memory expression kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkMemoryKind {
    MemoryInit,
    DataDrop,
    MemoryCopy,
    MemoryFill,
}

/// Exception handling expression kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Try,
    Throw,
    Rethrow,
    BrOnExn,
}

/// Multi-value expression kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupleKind {
    Make,
    Extract,
}

impl Expr {
    /// Short name of the expression kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Block { .. } => "block",
            Expr::If { .. } => "if",
            Expr::Loop { .. } => "loop",
            Expr::Break { .. } => "br",
            Expr::Switch { .. } => "br_table",
            Expr::Call { .. } => "call",
            Expr::CallIndirect { .. } => "call_indirect",
            Expr::LocalGet { .. } => "local.get",
            Expr::LocalSet { is_tee: true, .. } => "local.tee",
            Expr::LocalSet { .. } => "local.set",
            Expr::GlobalGet { .. } => "global.get",
            Expr::GlobalSet { .. } => "global.set",
            Expr::Load { .. } => "load",
            Expr::Store { .. } => "store",
            Expr::Const(_) => "const",
            Expr::Unary { op, .. } => op.name(),
            Expr::Binary { op, .. } => op.name(),
            Expr::Select { .. } => "select",
            Expr::Drop { .. } => "drop",
            Expr::Return { .. } => "return",
            Expr::MemorySize => "memory.size",
            Expr::MemoryGrow { .. } => "memory.grow",
            Expr::Nop => "nop",
            Expr::Unreachable => "unreachable",
            Expr::Atomic(kind) => match kind {
                AtomicKind::Rmw => "atomic.rmw",
                AtomicKind::Cmpxchg => "atomic.cmpxchg",
                AtomicKind::Wait => "atomic.wait",
                AtomicKind::Notify => "atomic.notify",
                AtomicKind::Fence => "atomic.fence",
            },
            Expr::Simd(kind) => match kind {
                SimdKind::Extract => "simd.extract",
                SimdKind::Replace => "simd.replace",
                SimdKind::Shuffle => "simd.shuffle",
                SimdKind::Ternary => "simd.ternary",
                SimdKind::Shift => "simd.shift",
                SimdKind::Load => "simd.load",
            },
            Expr::BulkMemory(kind) => match kind {
                BulkMemoryKind::MemoryInit => "memory.init",
                BulkMemoryKind::DataDrop => "data.drop",
                BulkMemoryKind::MemoryCopy => "memory.copy",
                BulkMemoryKind::MemoryFill => "memory.fill",
            },
            Expr::Exception(kind) => match kind {
                ExceptionKind::Try => "try",
                ExceptionKind::Throw => "throw",
                ExceptionKind::Rethrow => "rethrow",
                ExceptionKind::BrOnExn => "br_on_exn",
            },
            Expr::Tuple(kind) => match kind {
                TupleKind::Make => "tuple.make",
                TupleKind::Extract => "tuple.extract",
            },
        }
    }

    // ========================================================================
    // Builders
    // ========================================================================

    pub fn i32(value: i32) -> Self {
        Expr::Const(Literal::I32(value))
    }

    pub fn f32(value: f32) -> Self {
        Expr::Const(Literal::F32(value))
    }

    pub fn f64(value: f64) -> Self {
        Expr::Const(Literal::F64(value))
    }

    pub fn local_get(index: u32, ty: ValType) -> Self {
        Expr::LocalGet { index, ty }
    }

    pub fn local_set(index: u32, value: Expr) -> Self {
        Expr::LocalSet {
            index,
            value: Box::new(value),
            is_tee: false,
        }
    }

    pub fn local_tee(index: u32, value: Expr) -> Self {
        Expr::LocalSet {
            index,
            value: Box::new(value),
            is_tee: true,
        }
    }

    pub fn global_get(name: impl Into<String>, ty: ValType) -> Self {
        Expr::GlobalGet {
            name: name.into(),
            ty,
        }
    }

    pub fn global_set(name: impl Into<String>, value: Expr) -> Self {
        Expr::GlobalSet {
            name: name.into(),
            value: Box::new(value),
        }
    }

    pub fn unary(op: UnaryOp, value: Expr) -> Self {
        Expr::Unary {
            op,
            value: Box::new(value),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn block(name: Option<&str>, children: Vec<Expr>) -> Self {
        Expr::Block {
            name: name.map(str::to_owned),
            children,
        }
    }

    pub fn loop_(name: impl Into<String>, body: Expr) -> Self {
        Expr::Loop {
            name: name.into(),
            body: Box::new(body),
        }
    }

    pub fn if_(condition: Expr, if_true: Expr, if_false: Option<Expr>) -> Self {
        Expr::If {
            condition: Box::new(condition),
            if_true: Box::new(if_true),
            if_false: if_false.map(Box::new),
        }
    }

    pub fn br(name: impl Into<String>) -> Self {
        Expr::Break {
            name: name.into(),
            condition: None,
            value: None,
        }
    }

    pub fn br_if(name: impl Into<String>, condition: Expr) -> Self {
        Expr::Break {
            name: name.into(),
            condition: Some(Box::new(condition)),
            value: None,
        }
    }

    pub fn switch(names: Vec<&str>, default_name: &str, condition: Expr) -> Self {
        Expr::Switch {
            names: names.into_iter().map(str::to_owned).collect(),
            default_name: default_name.to_owned(),
            condition: Box::new(condition),
            value: None,
        }
    }

    pub fn call(target: impl Into<String>, operands: Vec<Expr>, ty: Option<ValType>) -> Self {
        Expr::Call {
            target: target.into(),
            operands,
            ty,
        }
    }

    pub fn call_indirect(target: Expr, operands: Vec<Expr>, ty: Option<ValType>) -> Self {
        Expr::CallIndirect {
            target: Box::new(target),
            operands,
            ty,
        }
    }

    pub fn load(bytes: u8, signed: bool, offset: u32, ty: ValType, ptr: Expr) -> Self {
        Expr::Load {
            bytes,
            signed,
            offset,
            ty,
            ptr: Box::new(ptr),
        }
    }

    pub fn store(bytes: u8, offset: u32, ptr: Expr, value: Expr, value_ty: ValType) -> Self {
        Expr::Store {
            bytes,
            offset,
            ptr: Box::new(ptr),
            value: Box::new(value),
            value_ty,
        }
    }

    pub fn select(if_true: Expr, if_false: Expr, condition: Expr) -> Self {
        Expr::Select {
            if_true: Box::new(if_true),
            if_false: Box::new(if_false),
            condition: Box::new(condition),
        }
    }

    pub fn drop(value: Expr) -> Self {
        Expr::Drop {
            value: Box::new(value),
        }
    }

    pub fn ret(value: Option<Expr>) -> Self {
        Expr::Return {
            value: value.map(Box::new),
        }
    }

    pub fn memory_grow(delta: Expr) -> Self {
        Expr::MemoryGrow {
            delta: Box::new(delta),
        }
    }

    /// The constant `i32` value of this node, if it is one.
    pub fn as_i32_const(&self) -> Option<i32> {
        match self {
            Expr::Const(lit) => lit.as_i32(),
            _ => None,
        }
    }
}
