//! Structured control flow.
//!
//! Blocks and loops push a [`BranchTarget`] while their children are
//! translated; breaks resolve to the innermost target with a matching name.
//!
//! Conditions that are a single comparison are fused into one
//! compare-and-branch instruction instead of materializing a boolean.

use wasm2abc_core::TranslateError;
use wasm2abc_ir::{BinaryOp, Comparison, Expr, UnaryOp, ValType};

use crate::bytecode::OpCode;
use crate::emit::Label;

use super::{BranchTarget, FunctionTranslator, Result};

/// Compare-and-branch opcode taken when the comparison holds.
fn branch_when_true(cmp: Comparison) -> OpCode {
    match cmp {
        Comparison::Eq => OpCode::IfEq,
        Comparison::Ne => OpCode::IfNe,
        Comparison::Lt => OpCode::IfLt,
        Comparison::Le => OpCode::IfLe,
        Comparison::Gt => OpCode::IfGt,
        Comparison::Ge => OpCode::IfGe,
    }
}

/// Compare-and-branch opcode taken when the comparison fails.
///
/// The negated relational forms also branch on unordered operands.
fn branch_when_false(cmp: Comparison) -> OpCode {
    match cmp {
        Comparison::Eq => OpCode::IfNe,
        Comparison::Ne => OpCode::IfEq,
        Comparison::Lt => OpCode::IfNlt,
        Comparison::Le => OpCode::IfNle,
        Comparison::Gt => OpCode::IfNgt,
        Comparison::Ge => OpCode::IfNge,
    }
}

impl<'a, 'pool> FunctionTranslator<'a, 'pool> {
    // ==========================================================================
    // Branch targets
    // ==========================================================================

    fn push_target(&mut self, name: &str, label: Label) {
        self.targets.push(BranchTarget {
            name: name.to_owned(),
            label,
            depth: None,
        });
    }

    /// Innermost enclosing target named `name`.
    fn target(&mut self, name: &str) -> Result<&mut BranchTarget> {
        self.targets
            .iter_mut()
            .rev()
            .find(|target| target.name == name)
            .ok_or_else(|| {
                TranslateError::UnknownLabel {
                    name: name.to_owned(),
                }
                .into()
            })
    }

    /// Remember the stack depth control arrives with at `name`.
    fn record_arrival(&mut self, name: &str) -> Result<()> {
        let depth = self.asm.depth();
        self.target(name)?.depth.get_or_insert(depth);
        Ok(())
    }

    // ==========================================================================
    // Blocks and loops
    // ==========================================================================

    pub(super) fn block(&mut self, name: Option<&str>, children: &[Expr]) -> Result<()> {
        let Some(name) = name else {
            return children.iter().try_for_each(|child| self.expr(child));
        };

        let end = self.asm.new_label(Some(name));
        self.push_target(name, end);
        let result = children.iter().try_for_each(|child| self.expr(child));
        let target = self.targets.pop();
        result?;

        if self.asm.is_used(end) {
            // Code after an unconditional branch is dead; the join takes the
            // depth branches arrive with.
            if !self.asm.falls_through() {
                if let Some(depth) = target.and_then(|t| t.depth) {
                    self.asm.set_depth(depth);
                }
            }
            self.asm.label(end)?;
        }
        Ok(())
    }

    /// A loop's label sits at the top, so breaks to it continue the loop.
    pub(super) fn loop_(&mut self, name: &str, body: &Expr) -> Result<()> {
        let top = self.asm.new_label(Some(name));
        self.asm.label(top)?;
        self.push_target(name, top);
        let result = self.expr(body);
        self.targets.pop();
        result
    }

    // ==========================================================================
    // Conditionals
    // ==========================================================================

    /// Emit `condition` and branch to `target` when it is `when`.
    fn branch_on(&mut self, condition: &Expr, target: Label, when: bool) -> Result<()> {
        if let Expr::Binary { op, left, right } = condition {
            if let Some((cmp, unsigned)) = fused_comparison(*op) {
                self.operand(left, unsigned)?;
                self.operand(right, unsigned)?;
                let op = if when {
                    branch_when_true(cmp)
                } else {
                    branch_when_false(cmp)
                };
                return Ok(self.asm.branch(op, target)?);
            }
        }
        if let Expr::Unary {
            op: UnaryOp::I32Eqz,
            value,
        } = condition
        {
            self.expr(value)?;
            self.asm.push_int(0)?;
            let op = if when { OpCode::IfEq } else { OpCode::IfNe };
            return Ok(self.asm.branch(op, target)?);
        }

        self.expr(condition)?;
        let op = if when { OpCode::IfTrue } else { OpCode::IfFalse };
        Ok(self.asm.branch(op, target)?)
    }

    /// A comparison operand, reinterpreted as unsigned when requested.
    pub(super) fn operand(&mut self, value: &Expr, unsigned: bool) -> Result<()> {
        self.expr(value)?;
        if unsigned {
            self.asm.emit(OpCode::ConvertU)?;
        }
        Ok(())
    }

    pub(super) fn if_else(
        &mut self,
        condition: &Expr,
        if_true: &Expr,
        if_false: Option<&Expr>,
    ) -> Result<()> {
        let else_label = self.asm.new_label(None);
        self.branch_on(condition, else_label, false)?;
        let entry = self.asm.depth();

        self.expr(if_true)?;
        let Some(if_false) = if_false else {
            if !self.asm.falls_through() {
                self.asm.set_depth(entry);
            }
            return Ok(self.asm.label(else_label)?);
        };

        let then_falls = self.asm.falls_through();
        let then_depth = self.asm.depth();
        let end = self.asm.new_label(None);
        if then_falls {
            self.asm.jump(end)?;
        }

        self.asm.set_depth(entry);
        self.asm.label(else_label)?;
        self.expr(if_false)?;

        if then_falls {
            if !self.asm.falls_through() {
                self.asm.set_depth(then_depth);
            }
            self.asm.label(end)?;
        }
        Ok(())
    }

    /// `T; F; cond; iftrue L; swap; L: pop` keeps `T` when `cond` holds.
    pub(super) fn select(&mut self, if_true: &Expr, if_false: &Expr, condition: &Expr) -> Result<()> {
        let keep = self.asm.new_label(None);
        self.expr(if_true)?;
        self.expr(if_false)?;
        self.expr(condition)?;
        self.asm.branch(OpCode::IfTrue, keep)?;
        self.asm.emit(OpCode::Swap)?;
        self.asm.label(keep)?;
        Ok(self.asm.emit(OpCode::Pop)?)
    }

    // ==========================================================================
    // Branches
    // ==========================================================================

    pub(super) fn break_(
        &mut self,
        name: &str,
        condition: Option<&Expr>,
        value: Option<&Expr>,
    ) -> Result<()> {
        let label = self.target(name)?.label;
        if let Some(value) = value {
            self.expr(value)?;
        }
        match condition {
            Some(condition) => self.branch_on(condition, label, true)?,
            None => self.asm.jump(label)?,
        }
        self.record_arrival(name)
    }

    pub(super) fn switch(
        &mut self,
        names: &[String],
        default_name: &str,
        condition: &Expr,
        value: Option<&Expr>,
    ) -> Result<()> {
        let default = self.target(default_name)?.label;
        let mut cases = Vec::with_capacity(names.len());
        for name in names {
            cases.push(self.target(name)?.label);
        }

        if let Some(value) = value {
            self.expr(value)?;
        }
        self.expr(condition)?;
        if cases.is_empty() {
            self.asm.emit(OpCode::Pop)?;
            self.asm.jump(default)?;
        } else {
            self.asm.lookup_switch(default, &cases)?;
        }

        self.record_arrival(default_name)?;
        for name in names {
            self.record_arrival(name)?;
        }
        Ok(())
    }

    pub(super) fn return_(&mut self, value: Option<&Expr>) -> Result<()> {
        match value {
            Some(value) => {
                self.expr(value)?;
                Ok(self.asm.emit(OpCode::ReturnValue)?)
            }
            None => Ok(self.asm.emit(OpCode::ReturnVoid)?),
        }
    }

    /// Throw `new Error("unreachable")`.
    pub(super) fn unreachable(&mut self) -> Result<()> {
        let error = self.asm.pool().public_qname("Error");
        self.asm.find_prop_strict(error)?;
        self.asm.push_string("unreachable")?;
        self.asm.construct_prop(error, 1)?;
        Ok(self.asm.emit(OpCode::Throw)?)
    }
}

/// The comparison a branch can fuse, for relational operators on 32-bit or
/// float operands.
fn fused_comparison(op: BinaryOp) -> Option<(Comparison, bool)> {
    if op.operand_type() == ValType::I64 {
        return None;
    }
    op.comparison()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{assert_contains_opcodes, assert_opcodes, disassemble};
    use crate::translate::testing::*;

    fn i32_param() -> Expr {
        Expr::local_get(0, ValType::I32)
    }

    #[test]
    fn if_eqz_fuses_compare_and_branch() {
        let body = Expr::if_(
            Expr::unary(UnaryOp::I32Eqz, i32_param()),
            Expr::ret(Some(Expr::i32(1))),
            None,
        );
        let code = code_of(vec![ValType::I32], vec![ValType::I32], Expr::block(None, vec![
            body,
            Expr::i32(0),
        ]));
        assert_opcodes(
            &code.code,
            &[
                OpCode::GetLocal1,
                OpCode::PushByte,
                OpCode::IfNe,
                OpCode::PushByte,
                OpCode::ReturnValue,
                OpCode::Label,
                OpCode::PushByte,
                OpCode::ReturnValue,
            ],
        );
    }

    #[test]
    fn unsigned_comparison_converts_operands() {
        let cond = Expr::binary(BinaryOp::I32LtU, i32_param(), Expr::i32(10));
        let body = Expr::if_(cond, Expr::Nop, None);
        let code = code_of(vec![ValType::I32], vec![], body);
        assert_contains_opcodes(
            &code.code,
            &[
                OpCode::GetLocal1,
                OpCode::ConvertU,
                OpCode::PushByte,
                OpCode::ConvertU,
                OpCode::IfNlt,
            ],
        );
    }

    #[test]
    fn float_comparisons_fuse_and_i64_does_not() {
        assert_eq!(
            fused_comparison(BinaryOp::F64Ge),
            Some((Comparison::Ge, false))
        );
        assert_eq!(
            fused_comparison(BinaryOp::I32GtU),
            Some((Comparison::Gt, true))
        );
        assert_eq!(fused_comparison(BinaryOp::I64Eq), None);
        assert_eq!(fused_comparison(BinaryOp::F64Add), None);
    }

    #[test]
    fn plain_condition_uses_iffalse() {
        let body = Expr::if_(i32_param(), Expr::Nop, None);
        let code = code_of(vec![ValType::I32], vec![], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::GetLocal1,
                OpCode::IfFalse,
                OpCode::Nop,
                OpCode::Label,
                OpCode::ReturnVoid,
            ],
        );
    }

    #[test]
    fn if_else_joins_with_a_value() {
        let body = Expr::if_(i32_param(), Expr::i32(1), Some(Expr::i32(2)));
        let code = code_of(vec![ValType::I32], vec![ValType::I32], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::GetLocal1,
                OpCode::IfFalse,
                OpCode::PushByte,
                OpCode::Jump,
                OpCode::Label,
                OpCode::PushByte,
                OpCode::Label,
                OpCode::ReturnValue,
            ],
        );
        // Replayed in byte order the two arms stack up.
        assert_eq!(code.max_stack, 2);
    }

    #[test]
    fn join_never_lowers_the_watermark() {
        // (if x (then 1) (else (2 + 3))) + 4
        let body = Expr::binary(
            BinaryOp::I32Add,
            Expr::if_(
                i32_param(),
                Expr::i32(1),
                Some(Expr::binary(BinaryOp::I32Add, Expr::i32(2), Expr::i32(3))),
            ),
            Expr::i32(4),
        );
        let code = code_of(vec![ValType::I32], vec![ValType::I32], body);
        let mut depth = 0u32;
        let mut peak = 0u32;
        for inst in disassemble(&code.code).unwrap() {
            let (pops, pushes) = inst.op.stack_effect().unwrap();
            depth = depth.saturating_sub(pops) + pushes;
            peak = peak.max(depth);
        }
        assert_eq!(peak, 3);
        assert!(code.max_stack >= peak);
    }

    #[test]
    fn returning_then_arm_skips_the_jump() {
        let body = Expr::block(None, vec![
            Expr::if_(i32_param(), Expr::ret(None), Some(Expr::Nop)),
        ]);
        let code = code_of(vec![ValType::I32], vec![], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::GetLocal1,
                OpCode::IfFalse,
                OpCode::ReturnVoid,
                OpCode::Label,
                OpCode::Nop,
                OpCode::ReturnVoid,
            ],
        );
    }

    #[test]
    fn loop_back_edge_lands_on_its_label() {
        let body = Expr::loop_(
            "top",
            Expr::br_if(
                "top",
                Expr::binary(BinaryOp::I32Ne, i32_param(), Expr::i32(0)),
            ),
        );
        let code = code_of(vec![ValType::I32], vec![], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::Label,
                OpCode::GetLocal1,
                OpCode::PushByte,
                OpCode::IfNe,
                OpCode::ReturnVoid,
            ],
        );
        let insts = disassemble(&code.code).unwrap();
        let branch = &insts[3];
        let target = branch.branch_targets(branch.end(&code.code))[0];
        assert_eq!(target, 0);
    }

    #[test]
    fn br_if_eqz_branches_on_equal() {
        let body = Expr::block(Some("out"), vec![
            Expr::br_if("out", Expr::unary(UnaryOp::I32Eqz, i32_param())),
            Expr::Nop,
        ]);
        let code = code_of(vec![ValType::I32], vec![], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::GetLocal1,
                OpCode::PushByte,
                OpCode::IfEq,
                OpCode::Nop,
                OpCode::Label,
                OpCode::ReturnVoid,
            ],
        );
    }

    #[test]
    fn unused_block_label_is_not_emitted() {
        let body = Expr::block(Some("unused"), vec![Expr::Nop]);
        let code = code_of(vec![], vec![], body);
        assert_opcodes(&code.code, &[OpCode::Nop, OpCode::ReturnVoid]);
    }

    #[test]
    fn breaks_resolve_to_the_innermost_label() {
        // Both blocks are named "b"; the break must exit only the inner one.
        let body = Expr::block(Some("b"), vec![
            Expr::block(Some("b"), vec![Expr::br("b"), Expr::Nop]),
            Expr::Unreachable,
        ]);
        let code = code_of(vec![], vec![], body);
        let insts = disassemble(&code.code).unwrap();
        assert_eq!(insts[0].op, OpCode::Jump);
        let target = insts[0].branch_targets(insts[0].end(&code.code))[0] as usize;
        // The inner label precedes the unreachable sequence.
        let landed = insts.iter().position(|i| i.offset == target).unwrap();
        assert_eq!(insts[landed].op, OpCode::Label);
        assert_eq!(insts[landed + 1].op, OpCode::FindPropStrict);
    }

    #[test]
    fn unknown_label_is_reported() {
        let module = single(vec![], vec![], Expr::br("nowhere"));
        assert_eq!(
            translate(&module, "f").err(),
            Some(TranslateError::UnknownLabel {
                name: "nowhere".into()
            })
        );
    }

    #[test]
    fn break_with_value_sets_join_depth() {
        let body = Expr::block(Some("out"), vec![Expr::Break {
            name: "out".into(),
            condition: None,
            value: Some(Box::new(Expr::i32(5))),
        }]);
        let code = code_of(vec![], vec![ValType::I32], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::PushByte,
                OpCode::Jump,
                OpCode::Label,
                OpCode::ReturnValue,
            ],
        );
    }

    #[test]
    fn switch_uses_lookupswitch() {
        let body = Expr::block(Some("default"), vec![
            Expr::block(Some("a"), vec![Expr::switch(vec!["a", "default"], "default", i32_param())]),
            Expr::Nop,
        ]);
        let code = code_of(vec![ValType::I32], vec![], body);
        assert_contains_opcodes(
            &code.code,
            &[OpCode::GetLocal1, OpCode::LookupSwitch, OpCode::Label, OpCode::Nop, OpCode::Label],
        );
    }

    #[test]
    fn switch_without_cases_jumps_to_default() {
        let body = Expr::block(Some("d"), vec![Expr::switch(vec![], "d", i32_param())]);
        let code = code_of(vec![ValType::I32], vec![], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::GetLocal1,
                OpCode::Pop,
                OpCode::Jump,
                OpCode::Label,
                OpCode::ReturnVoid,
            ],
        );
    }

    #[test]
    fn select_keeps_the_chosen_value() {
        let body = Expr::select(Expr::i32(1), Expr::i32(2), i32_param());
        let code = code_of(vec![ValType::I32], vec![ValType::I32], body);
        assert_opcodes(
            &code.code,
            &[
                OpCode::PushByte,
                OpCode::PushByte,
                OpCode::GetLocal1,
                OpCode::IfTrue,
                OpCode::Swap,
                OpCode::Label,
                OpCode::Pop,
                OpCode::ReturnValue,
            ],
        );
        assert_eq!(code.max_stack, 3);
    }

    #[test]
    fn unreachable_throws_an_error() {
        let code = code_of(vec![], vec![], Expr::Unreachable);
        assert_opcodes(
            &code.code,
            &[
                OpCode::FindPropStrict,
                OpCode::PushString,
                OpCode::ConstructProp,
                OpCode::Throw,
            ],
        );
    }
}
