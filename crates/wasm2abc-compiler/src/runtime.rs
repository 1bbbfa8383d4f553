//! Runtime helper methods.
//!
//! Operations with no direct instruction are lowered to calls of private
//! instance methods. A helper is declared the first time a function needs it
//! and its body is generated once per session.

use wasm2abc_core::{AssembleError, ConstantPool};

use crate::bytecode::OpCode;
use crate::emit::Assembler;
use crate::members::MEMORY_SLOT;
use crate::options::QualifiedName;

/// Bytes per linear memory page.
pub const PAGE_SIZE: i32 = 65536;

/// Page limit used when the memory declares no maximum.
pub const MAX_PAGES: u32 = 65536;

/// Helper methods generated on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Helper {
    MemorySize,
    MemoryGrow,
    Clz32,
    Abs,
    Ceil,
    Floor,
    Sqrt,
    Min,
    Max,
}

/// Static type of a helper parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperType {
    Int,
    Number,
}

impl HelperType {
    pub fn qname(self) -> QualifiedName {
        match self {
            HelperType::Int => QualifiedName::public("int"),
            HelperType::Number => QualifiedName::public("Number"),
        }
    }
}

impl Helper {
    /// Member name on the emitted class.
    pub fn name(self) -> &'static str {
        match self {
            Helper::MemorySize => "__wasm2swf_memory_size",
            Helper::MemoryGrow => "__wasm2swf_memory_grow",
            Helper::Clz32 => "__wasm2swf_clz32",
            Helper::Abs => "__wasm2swf_abs",
            Helper::Ceil => "__wasm2swf_ceil",
            Helper::Floor => "__wasm2swf_floor",
            Helper::Sqrt => "__wasm2swf_sqrt",
            Helper::Min => "__wasm2swf_min",
            Helper::Max => "__wasm2swf_max",
        }
    }

    pub fn params(self) -> &'static [HelperType] {
        match self {
            Helper::MemorySize => &[],
            Helper::MemoryGrow | Helper::Clz32 => &[HelperType::Int],
            Helper::Abs | Helper::Ceil | Helper::Floor | Helper::Sqrt => &[HelperType::Number],
            Helper::Min | Helper::Max => &[HelperType::Number, HelperType::Number],
        }
    }

    pub fn result(self) -> HelperType {
        match self {
            Helper::MemorySize | Helper::MemoryGrow | Helper::Clz32 => HelperType::Int,
            _ => HelperType::Number,
        }
    }

    /// Emit the helper's body.
    ///
    /// `max_pages` bounds `memory.grow`.
    pub fn assemble(self, asm: &mut Assembler<'_>, max_pages: u32) -> Result<(), AssembleError> {
        match self {
            Helper::MemorySize => {
                current_pages(asm)?;
                asm.emit(OpCode::ReturnValue)
            }
            Helper::MemoryGrow => memory_grow(asm, max_pages),
            Helper::Clz32 => clz32(asm),
            Helper::Abs => forward_to_math(asm, "abs", 1),
            Helper::Ceil => forward_to_math(asm, "ceil", 1),
            Helper::Floor => forward_to_math(asm, "floor", 1),
            Helper::Sqrt => forward_to_math(asm, "sqrt", 1),
            Helper::Min => forward_to_math(asm, "min", 2),
            Helper::Max => forward_to_math(asm, "max", 2),
        }
    }
}

/// `return Math.<method>(args...)`
fn forward_to_math(asm: &mut Assembler<'_>, method: &str, argc: u32) -> Result<(), AssembleError> {
    let math = asm.pool().public_qname("Math");
    let method = asm.pool().public_qname(method);
    asm.get_lex(math)?;
    for slot in 1..=argc {
        asm.get_local(slot)?;
    }
    asm.call_property(method, argc)?;
    asm.emit(OpCode::ReturnValue)
}

/// `this.memory.length / PAGE_SIZE` as an int.
fn current_pages(asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
    let memory = asm.pool().public_qname(MEMORY_SLOT);
    let length = asm.pool().public_qname("length");
    asm.get_local(0)?;
    asm.get_property(memory)?;
    asm.get_property(length)?;
    asm.push_int(PAGE_SIZE)?;
    asm.emit(OpCode::Divide)?;
    asm.emit(OpCode::ConvertI)
}

/// Rebind the memory buffer as the current domain memory.
pub(crate) fn bind_domain_memory(asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
    let pool: &mut ConstantPool = asm.pool();
    let app_domain = pool.package_qname("flash.system", "ApplicationDomain");
    let current = pool.public_qname("currentDomain");
    let domain_memory = pool.public_qname("domainMemory");
    let memory = pool.public_qname(MEMORY_SLOT);

    asm.get_lex(app_domain)?;
    asm.get_property(current)?;
    asm.get_local(0)?;
    asm.get_property(memory)?;
    asm.set_property(domain_memory)
}

/// `grow(delta)`: old page count on success, -1 past the limit.
fn memory_grow(asm: &mut Assembler<'_>, max_pages: u32) -> Result<(), AssembleError> {
    let memory = asm.pool().public_qname(MEMORY_SLOT);
    let length = asm.pool().public_qname("length");
    let ok = asm.new_label(Some("grow"));

    current_pages(asm)?;
    asm.set_local(2)?;

    asm.get_local(2)?;
    asm.get_local(1)?;
    asm.emit(OpCode::ConvertU)?;
    asm.emit(OpCode::Add)?;
    asm.push_int(max_pages.min(i32::MAX as u32) as i32)?;
    asm.branch(OpCode::IfNgt, ok)?;
    asm.push_int(-1)?;
    asm.emit(OpCode::ReturnValue)?;

    asm.label(ok)?;
    asm.get_local(0)?;
    asm.get_property(memory)?;
    asm.get_local(2)?;
    asm.get_local(1)?;
    asm.emit(OpCode::Add)?;
    asm.push_int(PAGE_SIZE)?;
    asm.emit(OpCode::Multiply)?;
    asm.set_property(length)?;

    bind_domain_memory(asm)?;
    asm.get_local(2)?;
    asm.emit(OpCode::ReturnValue)
}

/// Count leading zeros by shifting until the sign bit is set.
fn clz32(asm: &mut Assembler<'_>) -> Result<(), AssembleError> {
    let start = asm.new_label(Some("start"));
    let top = asm.new_label(Some("top"));
    let done = asm.new_label(Some("done"));

    asm.get_local(1)?;
    asm.push_int(0)?;
    asm.branch(OpCode::IfNe, start)?;
    asm.push_int(32)?;
    asm.emit(OpCode::ReturnValue)?;

    asm.label(start)?;
    asm.push_int(0)?;
    asm.set_local(2)?;

    asm.label(top)?;
    asm.get_local(1)?;
    asm.push_int(i32::MIN)?;
    asm.emit(OpCode::BitAnd)?;
    asm.push_int(0)?;
    asm.branch(OpCode::IfNe, done)?;
    asm.get_local(1)?;
    asm.push_int(1)?;
    asm.emit(OpCode::LShift)?;
    asm.set_local(1)?;
    asm.inc_local_i(2)?;
    asm.jump(top)?;

    asm.label(done)?;
    asm.get_local(2)?;
    asm.emit(OpCode::ReturnValue)
}

// ============================================================================
// Request tracking
// ============================================================================

/// Helpers requested so far and how many have been generated.
#[derive(Debug, Default)]
pub struct HelperSet {
    requested: Vec<Helper>,
    built: usize,
}

impl HelperSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a use. Returns `true` the first time `helper` is requested.
    pub fn request(&mut self, helper: Helper) -> bool {
        if self.requested.contains(&helper) {
            return false;
        }
        tracing::debug!(helper = helper.name(), "requested runtime helper");
        self.requested.push(helper);
        true
    }

    pub fn contains(&self, helper: Helper) -> bool {
        self.requested.contains(&helper)
    }

    /// Helpers requested but not yet generated, in request order.
    pub fn take_pending(&mut self) -> Vec<Helper> {
        let pending = self.requested[self.built..].to_vec();
        self.built = self.requested.len();
        pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assert_contains_opcodes, assert_opcodes, disassemble};

    fn assemble(helper: Helper) -> crate::emit::AssembledCode {
        let mut pool = ConstantPool::new();
        let mut asm = Assembler::new(&mut pool, helper.params().len() as u32);
        helper.assemble(&mut asm, MAX_PAGES).unwrap();
        assert!(!asm.falls_through());
        asm.finish().unwrap()
    }

    #[test]
    fn helpers_are_requested_once() {
        let mut set = HelperSet::new();
        assert!(set.request(Helper::Clz32));
        assert!(!set.request(Helper::Clz32));
        assert!(set.request(Helper::Abs));
        assert_eq!(set.take_pending(), vec![Helper::Clz32, Helper::Abs]);
        assert!(set.take_pending().is_empty());
        assert!(!set.request(Helper::Abs));
        assert!(set.request(Helper::Max));
        assert_eq!(set.take_pending(), vec![Helper::Max]);
    }

    #[test]
    fn float_helpers_forward_to_math() {
        let out = assemble(Helper::Min);
        assert_opcodes(
            &out.code,
            &[
                OpCode::GetLex,
                OpCode::GetLocal1,
                OpCode::GetLocal2,
                OpCode::CallProperty,
                OpCode::ReturnValue,
            ],
        );
        assert_eq!(out.max_stack, 3);
    }

    #[test]
    fn memory_size_divides_by_page() {
        let out = assemble(Helper::MemorySize);
        assert_opcodes(
            &out.code,
            &[
                OpCode::GetLocal0,
                OpCode::GetProperty,
                OpCode::GetProperty,
                OpCode::PushInt,
                OpCode::Divide,
                OpCode::ConvertI,
                OpCode::ReturnValue,
            ],
        );
    }

    #[test]
    fn memory_grow_checks_limit_and_rebinds() {
        let out = assemble(Helper::MemoryGrow);
        assert_contains_opcodes(&out.code, &[OpCode::IfNgt, OpCode::SetProperty, OpCode::GetLex]);
        assert_eq!(out.local_count, 3);
    }

    #[test]
    fn clz32_loops_back_to_its_label() {
        let out = assemble(Helper::Clz32);
        let insts = disassemble(&out.code).unwrap();
        let jump = insts.iter().find(|i| i.op == OpCode::Jump).unwrap();
        let target = (jump.end(&out.code) as i64 + jump.operands[0]) as usize;
        let landed = insts.iter().find(|i| i.offset == target).unwrap();
        assert_eq!(landed.op, OpCode::Label);
        assert_eq!(out.local_count, 3);
    }

    #[test]
    fn names_and_signatures() {
        assert_eq!(Helper::MemoryGrow.name(), "__wasm2swf_memory_grow");
        assert_eq!(Helper::Sqrt.params(), &[HelperType::Number]);
        assert_eq!(Helper::Clz32.result(), HelperType::Int);
        assert_eq!(Helper::Max.result(), HelperType::Number);
    }
}
