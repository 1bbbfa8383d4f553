//! Bytecode assembler for one method body.
//!
//! The [`Assembler`] appends instructions, models the operand and scope stacks
//! to compute the frame sizes a method body must declare, and relocates
//! branches through labels.
//!
//! # Example
//!
//! ```ignore
//! use wasm2abc_compiler::emit::Assembler;
//! use wasm2abc_core::ConstantPool;
//!
//! let mut pool = ConstantPool::new();
//! let mut asm = Assembler::new(&mut pool, 2);
//!
//! asm.get_local(1)?;
//! asm.get_local(2)?;
//! asm.emit(OpCode::AddI)?;
//! asm.emit(OpCode::ReturnValue)?;
//!
//! let code = asm.finish()?;
//! assert_eq!(code.max_stack, 2);
//! ```

mod labels;

use wasm2abc_core::varint::{patch_s24, write_s24, write_u30, write_u30_usize};
use wasm2abc_core::{AssembleError, ConstantPool};

use crate::bytecode::OpCode;
pub use labels::{Fixup, Label, LabelTable};

type Result<T> = std::result::Result<T, AssembleError>;

/// Output of a finished assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledCode {
    pub code: Vec<u8>,
    /// Highest operand stack depth reached, taken over both the modeled
    /// depth and the depth of a straight replay in byte order.
    pub max_stack: u32,
    /// Local slots used, receiver included.
    pub local_count: u32,
    /// Highest scope depth pushed by this body.
    pub scope_watermark: u32,
}

/// Emits AVM2 instructions for a single method.
///
/// Uses the session-wide constant pool so pool entries are shared across
/// methods.
pub struct Assembler<'pool> {
    code: Vec<u8>,
    pool: &'pool mut ConstantPool,
    labels: LabelTable,

    depth: u32,
    /// Depth summed in byte order. Never reset at joins.
    linear_depth: u32,
    max_stack: u32,
    scope_depth: u32,
    max_scope: u32,
    local_count: u32,

    /// Whether control can reach the end of the emitted code.
    falls_through: bool,
}

impl<'pool> Assembler<'pool> {
    /// Create an assembler for a method taking `param_count` parameters.
    ///
    /// Slot 0 holds the receiver and slots `1..=param_count` the parameters.
    pub fn new(pool: &'pool mut ConstantPool, param_count: u32) -> Self {
        Self {
            code: Vec::new(),
            pool,
            labels: LabelTable::new(),
            depth: 0,
            linear_depth: 0,
            max_stack: 0,
            scope_depth: 0,
            max_scope: 0,
            local_count: param_count + 1,
            falls_through: true,
        }
    }

    /// The shared constant pool.
    pub fn pool(&mut self) -> &mut ConstantPool {
        &mut *self.pool
    }

    /// Current code offset.
    pub fn offset(&self) -> usize {
        self.code.len()
    }

    /// Current modeled operand stack depth.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Reset the modeled depth at a control-flow join.
    ///
    /// Only the modeled depth changes. `max_stack` is a watermark and is
    /// never lowered.
    pub fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
        self.max_stack = self.max_stack.max(depth);
    }

    pub fn max_stack(&self) -> u32 {
        self.max_stack
    }

    pub fn scope_depth(&self) -> u32 {
        self.scope_depth
    }

    /// Whether control can fall through the last emitted instruction.
    pub fn falls_through(&self) -> bool {
        self.falls_through
    }

    /// The code emitted so far.
    pub fn code(&self) -> &[u8] {
        &self.code
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    /// Append an opcode byte and apply its stack effect.
    fn begin(&mut self, op: OpCode, pops: u32, pushes: u32) -> Result<()> {
        if self.depth < pops {
            return Err(AssembleError::StackUnderflow {
                op: op.name(),
                depth: self.depth,
                pops,
            });
        }
        tracing::trace!(
            offset = self.code.len(),
            op = op.name(),
            depth = self.depth,
            "emit"
        );
        self.depth = self.depth - pops + pushes;
        self.linear_depth = self.linear_depth.saturating_sub(pops) + pushes;
        self.max_stack = self.max_stack.max(self.depth).max(self.linear_depth);
        self.falls_through = !op.ends_flow();
        self.code.push(op.into());
        Ok(())
    }

    /// Stack effect of an opcode whose effect does not depend on operands.
    fn fixed_effect(op: OpCode) -> Result<(u32, u32)> {
        op.stack_effect()
            .ok_or(AssembleError::VariableStackEffect { op: op.name() })
    }

    /// Emit an operand-free opcode with a fixed stack effect.
    pub fn emit(&mut self, op: OpCode) -> Result<()> {
        debug_assert!(op.operands().is_empty(), "{} takes operands", op.name());
        let (pops, pushes) = Self::fixed_effect(op)?;
        self.begin(op, pops, pushes)
    }

    /// Emit an opcode with one fixed-effect `u30` operand.
    fn emit_u30(&mut self, op: OpCode, operand: u32) -> Result<()> {
        let (pops, pushes) = Self::fixed_effect(op)?;
        self.begin(op, pops, pushes)?;
        write_u30(&mut self.code, operand)?;
        Ok(())
    }

    /// Stack operands a multiname consumes at runtime.
    fn runtime_operands(&self, multiname: u32) -> u32 {
        self.pool
            .multiname(multiname)
            .map_or(0, |name| name.runtime_operands())
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    /// Push an `int` using the smallest encoding.
    ///
    /// `pushbyte` for `[-128, 127]`, `pushshort` for `[-32768, 32767]`,
    /// otherwise `pushint` through the integer pool.
    pub fn push_int(&mut self, value: i32) -> Result<()> {
        match value {
            -128..=127 => {
                self.begin(OpCode::PushByte, 0, 1)?;
                self.code.push(value as i8 as u8);
                Ok(())
            }
            -32768..=32767 => self.emit_u30(OpCode::PushShort, u32::from(value as i16 as u16)),
            _ => {
                let index = self.pool.intern_int(value);
                self.emit_u30(OpCode::PushInt, index)
            }
        }
    }

    pub fn push_uint(&mut self, value: u32) -> Result<()> {
        let index = self.pool.intern_uint(value);
        self.emit_u30(OpCode::PushUint, index)
    }

    /// Push a `Number`. NaN uses `pushnan`.
    pub fn push_double(&mut self, value: f64) -> Result<()> {
        if value.is_nan() {
            return self.emit(OpCode::PushNan);
        }
        let index = self.pool.intern_double(value);
        self.emit_u30(OpCode::PushDouble, index)
    }

    pub fn push_string(&mut self, value: &str) -> Result<()> {
        let index = self.pool.intern_string(value);
        self.emit_u30(OpCode::PushString, index)
    }

    // ==========================================================================
    // Local Variables
    // ==========================================================================

    fn touch_local(&mut self, slot: u32) {
        self.local_count = self.local_count.max(slot + 1);
    }

    /// Load a local slot, using the compact form for slots 0-3.
    pub fn get_local(&mut self, slot: u32) -> Result<()> {
        self.touch_local(slot);
        match slot {
            0 => self.emit(OpCode::GetLocal0),
            1 => self.emit(OpCode::GetLocal1),
            2 => self.emit(OpCode::GetLocal2),
            3 => self.emit(OpCode::GetLocal3),
            _ => self.emit_u30(OpCode::GetLocal, slot),
        }
    }

    /// Store to a local slot, using the compact form for slots 0-3.
    pub fn set_local(&mut self, slot: u32) -> Result<()> {
        self.touch_local(slot);
        match slot {
            0 => self.emit(OpCode::SetLocal0),
            1 => self.emit(OpCode::SetLocal1),
            2 => self.emit(OpCode::SetLocal2),
            3 => self.emit(OpCode::SetLocal3),
            _ => self.emit_u30(OpCode::SetLocal, slot),
        }
    }

    pub fn inc_local_i(&mut self, slot: u32) -> Result<()> {
        self.touch_local(slot);
        self.emit_u30(OpCode::IncLocalI, slot)
    }

    pub fn dec_local_i(&mut self, slot: u32) -> Result<()> {
        self.touch_local(slot);
        self.emit_u30(OpCode::DecLocalI, slot)
    }

    // ==========================================================================
    // Scopes
    // ==========================================================================

    pub fn push_scope(&mut self) -> Result<()> {
        self.emit(OpCode::PushScope)?;
        self.scope_depth += 1;
        self.max_scope = self.max_scope.max(self.scope_depth);
        Ok(())
    }

    pub fn pop_scope(&mut self) -> Result<()> {
        if self.scope_depth == 0 {
            return Err(AssembleError::ScopeUnderflow {
                offset: self.code.len(),
            });
        }
        self.emit(OpCode::PopScope)?;
        self.scope_depth -= 1;
        Ok(())
    }

    pub fn get_scope_object(&mut self, index: u8) -> Result<()> {
        self.begin(OpCode::GetScopeObject, 0, 1)?;
        self.code.push(index);
        Ok(())
    }

    // ==========================================================================
    // Properties
    // ==========================================================================

    pub fn get_property(&mut self, multiname: u32) -> Result<()> {
        let rt = self.runtime_operands(multiname);
        self.begin(OpCode::GetProperty, 1 + rt, 1)?;
        write_u30(&mut self.code, multiname)?;
        Ok(())
    }

    pub fn set_property(&mut self, multiname: u32) -> Result<()> {
        let rt = self.runtime_operands(multiname);
        self.begin(OpCode::SetProperty, 2 + rt, 0)?;
        write_u30(&mut self.code, multiname)?;
        Ok(())
    }

    pub fn init_property(&mut self, multiname: u32) -> Result<()> {
        let rt = self.runtime_operands(multiname);
        self.begin(OpCode::InitProperty, 2 + rt, 0)?;
        write_u30(&mut self.code, multiname)?;
        Ok(())
    }

    pub fn get_lex(&mut self, multiname: u32) -> Result<()> {
        self.emit_u30(OpCode::GetLex, multiname)
    }

    pub fn find_prop_strict(&mut self, multiname: u32) -> Result<()> {
        let rt = self.runtime_operands(multiname);
        self.begin(OpCode::FindPropStrict, rt, 1)?;
        write_u30(&mut self.code, multiname)?;
        Ok(())
    }

    pub fn coerce(&mut self, multiname: u32) -> Result<()> {
        self.emit_u30(OpCode::Coerce, multiname)
    }

    // ==========================================================================
    // Calls and construction
    // ==========================================================================

    fn call_like(&mut self, op: OpCode, multiname: u32, argc: u32, pushes: u32) -> Result<()> {
        let rt = self.runtime_operands(multiname);
        self.begin(op, 1 + rt + argc, pushes)?;
        write_u30(&mut self.code, multiname)?;
        write_u30(&mut self.code, argc)?;
        Ok(())
    }

    /// `receiver args... -> result`
    pub fn call_property(&mut self, multiname: u32, argc: u32) -> Result<()> {
        self.call_like(OpCode::CallProperty, multiname, argc, 1)
    }

    /// `receiver args... ->`
    pub fn call_prop_void(&mut self, multiname: u32, argc: u32) -> Result<()> {
        self.call_like(OpCode::CallPropVoid, multiname, argc, 0)
    }

    /// `object args... -> instance`
    pub fn construct_prop(&mut self, multiname: u32, argc: u32) -> Result<()> {
        self.call_like(OpCode::ConstructProp, multiname, argc, 1)
    }

    /// Call a method of the receiver by dispatch id.
    pub fn call_method(&mut self, disp_id: u32, argc: u32) -> Result<()> {
        self.begin(OpCode::CallMethod, 1 + argc, 1)?;
        write_u30(&mut self.code, disp_id)?;
        write_u30(&mut self.code, argc)?;
        Ok(())
    }

    pub fn construct_super(&mut self, argc: u32) -> Result<()> {
        self.begin(OpCode::ConstructSuper, 1 + argc, 0)?;
        write_u30(&mut self.code, argc)?;
        Ok(())
    }

    /// Build an object from `pairs` name/value pairs.
    pub fn new_object(&mut self, pairs: u32) -> Result<()> {
        self.begin(OpCode::NewObject, 2 * pairs, 1)?;
        write_u30(&mut self.code, pairs)?;
        Ok(())
    }

    pub fn new_array(&mut self, len: u32) -> Result<()> {
        self.begin(OpCode::NewArray, len, 1)?;
        write_u30(&mut self.code, len)?;
        Ok(())
    }

    pub fn new_class(&mut self, class: u32) -> Result<()> {
        self.emit_u30(OpCode::NewClass, class)
    }

    // ==========================================================================
    // Labels and branches
    // ==========================================================================

    /// Allocate a pending label.
    pub fn new_label(&mut self, name: Option<&str>) -> Label {
        self.labels.create(name)
    }

    pub fn label_name(&self, label: Label) -> &str {
        self.labels.name(label)
    }

    /// Whether any branch targets `label`.
    pub fn is_used(&self, label: Label) -> bool {
        self.labels.is_used(label)
    }

    /// Resolve `label` here and emit a `label` marker instruction.
    pub fn label(&mut self, label: Label) -> Result<()> {
        self.labels.resolve(label, self.code.len())?;
        self.emit(OpCode::Label)
    }

    /// Write a displacement to `target` relative to `anchor`.
    fn displacement(&mut self, anchor: usize, target: Label) -> Result<()> {
        self.labels.mark_used(target);
        match self.labels.offset(target) {
            Some(offset) => write_s24(&mut self.code, offset as i64 - anchor as i64)?,
            None => {
                let site = self.code.len();
                self.labels.add_fixup(site, anchor, target);
                self.code.extend_from_slice(&[0, 0, 0]);
            }
        }
        Ok(())
    }

    /// Emit a conditional or unconditional branch.
    pub fn branch(&mut self, op: OpCode, target: Label) -> Result<()> {
        debug_assert!(op.is_branch(), "{} is not a branch", op.name());
        let (pops, pushes) = Self::fixed_effect(op)?;
        self.begin(op, pops, pushes)?;
        let anchor = self.code.len() + 3;
        self.displacement(anchor, target)
    }

    pub fn jump(&mut self, target: Label) -> Result<()> {
        self.branch(OpCode::Jump, target)
    }

    /// Emit a multi-way branch on the integer on top of the stack.
    ///
    /// Displacements are relative to the start of the instruction. An empty
    /// case list is encoded as a single case targeting `default`.
    pub fn lookup_switch(&mut self, default: Label, cases: &[Label]) -> Result<()> {
        let start = self.code.len();
        self.begin(OpCode::LookupSwitch, 1, 0)?;
        self.displacement(start, default)?;
        let single = [default];
        let cases = if cases.is_empty() { &single[..] } else { cases };
        write_u30_usize(&mut self.code, cases.len() - 1)?;
        for &case in cases {
            self.displacement(start, case)?;
        }
        Ok(())
    }

    // ==========================================================================
    // Finish
    // ==========================================================================

    /// Patch every fixup and return the finished code.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn finish(mut self) -> Result<AssembledCode> {
        for fixup in self.labels.take_fixups() {
            let offset =
                self.labels
                    .offset(fixup.label)
                    .ok_or_else(|| AssembleError::UnresolvedLabel {
                        name: self.labels.name(fixup.label).to_owned(),
                    })?;
            patch_s24(
                &mut self.code,
                fixup.site,
                offset as i64 - fixup.anchor as i64,
            )?;
        }
        Ok(AssembledCode {
            code: self.code,
            max_stack: self.max_stack,
            local_count: self.local_count,
            scope_watermark: self.max_scope,
        })
    }
}
