//! End-to-end translation of small modules.

mod test_harness;

use test_harness::*;
use wasm2abc::abc::{Multiname, TraitData};
use wasm2abc::compiler::bytecode::OpCode;
use wasm2abc::ir::{BinaryOp, Expr, Function, Import, Memory, UnaryOp, ValType};
use wasm2abc::{CompileOptions, TranslateError, Wasm2AbcError, translate};

fn param(index: u32) -> Expr {
    Expr::local_get(index, ValType::I32)
}

#[test]
fn add_two_ints() {
    let module = single(
        vec![ValType::I32, ValType::I32],
        vec![ValType::I32],
        Expr::binary(BinaryOp::I32Add, param(0), param(1)),
    );
    let out = compile(&module);
    assert_eq!(
        ops(&out, "f"),
        vec![
            OpCode::GetLocal1,
            OpCode::GetLocal2,
            OpCode::AddI,
            OpCode::ReturnValue,
        ]
    );
    let body = body(&out, "f");
    assert_eq!(body.max_stack, 2);
    assert_eq!(body.local_count, 3);
}

#[test]
fn equality_with_zero_branches_directly() {
    let module = single(
        vec![ValType::I32],
        vec![ValType::I32],
        Expr::if_(
            Expr::binary(BinaryOp::I32Eq, param(0), Expr::i32(0)),
            Expr::i32(10),
            Some(Expr::i32(20)),
        ),
    );
    let out = compile(&module);
    let ops = ops(&out, "f");
    assert_eq!(&ops[..3], &[OpCode::GetLocal1, OpCode::PushByte, OpCode::IfNe]);
    assert!(!ops.contains(&OpCode::Equals));
    assert!(!ops.contains(&OpCode::IfFalse));
    assert_branches_land_on_instructions(body(&out, "f"));
}

#[test]
fn loop_back_edge_targets_loop_label() {
    // loop $top { local0 = local0 - 1; br_if $top (local0 != 0) }
    let module = single(
        vec![ValType::I32],
        vec![],
        Expr::loop_(
            "top",
            Expr::block(None, vec![
                Expr::local_set(
                    0,
                    Expr::binary(BinaryOp::I32Sub, param(0), Expr::i32(1)),
                ),
                Expr::br_if("top", Expr::binary(BinaryOp::I32Ne, param(0), Expr::i32(0))),
            ]),
        ),
    );
    let out = compile(&module);
    let insts = instructions(&out, "f");
    assert_eq!(insts[0].op, OpCode::Label);
    let code = &body(&out, "f").code;
    let back_edge = insts
        .iter()
        .find(|i| i.op == OpCode::IfNe)
        .expect("loop should end in a conditional branch");
    assert_eq!(
        back_edge.branch_targets(back_edge.end(code)),
        vec![insts[0].offset as i64]
    );
    assert!(back_edge.operands[0] < 0);
}

#[test]
fn scratch_import_is_shared_between_functions() {
    let bits = |name: &str| {
        Function::new(
            name,
            vec![],
            vec![ValType::I32],
            Expr::unary(UnaryOp::I32ReinterpretF32, Expr::f32(1.5)),
        )
    };
    let mut out = compile(&module_of(vec![bits("a"), bits("b")]));
    let store = out.abc.pool.public_qname("wasm2js_scratch_store_f32");
    let slots = out.abc.instances[0]
        .traits
        .iter()
        .filter(|t| t.name == store)
        .count();
    assert_eq!(slots, 1);
    for name in ["a", "b"] {
        assert!(ops(&out, name).contains(&OpCode::CallPropVoid));
    }
}

#[test]
fn dispatch_ids_match_method_indices() {
    let module = module_of(vec![
        Function::new("first", vec![], vec![], Expr::Nop),
        Function::new(
            "second",
            vec![ValType::F64],
            vec![ValType::F64],
            Expr::unary(UnaryOp::F64Sqrt, Expr::local_get(0, ValType::F64)),
        ),
        Function::new("third", vec![], vec![ValType::I32], Expr::i32(3)),
    ]);
    let out = compile(&module);
    let methods = method_traits(&out);
    // three functions and the sqrt helper
    assert_eq!(methods.len(), 4);
    for &(disp_id, method) in &methods {
        assert_eq!(disp_id, method);
    }
    assert!(methods.windows(2).all(|w| w[0].1 < w[1].1));
    assert!(method_index(&out, "__wasm2swf_sqrt") > method_index(&out, "second"));
    assert!(method_index(&out, "__wasm2swf_sqrt") < method_index(&out, "third"));
}

#[test]
fn indirect_calls_use_runtime_names() {
    let mut module = module_of(vec![
        Function::new("target", vec![], vec![ValType::I32], Expr::i32(7)),
        Function::new(
            "caller",
            vec![ValType::I32],
            vec![ValType::I32],
            Expr::call_indirect(param(0), vec![], Some(ValType::I32)),
        ),
    ]);
    module.table_segments.push(wasm2abc::ir::TableSegment {
        offset: 0,
        functions: vec!["target".into()],
    });
    let out = compile(&module);
    let insts = instructions(&out, "caller");
    let call = insts
        .iter()
        .find(|i| i.op == OpCode::CallProperty)
        .expect("indirect call");
    assert!(matches!(
        out.abc.pool.multiname(call.operands[0] as u32),
        Some(Multiname::MultinameL { .. })
    ));
}

#[test]
fn imported_function_becomes_a_slot() {
    let mut module = module_of(vec![Function::new(
        "main",
        vec![],
        vec![],
        Expr::call("print", vec![Expr::i32(1)], None),
    )]);
    module.add_function(Function::imported(
        "print",
        Import::new("env", "print"),
        vec![ValType::I32],
        vec![],
    ));
    let mut out = compile(&module);
    let print = out.abc.pool.public_qname("print");
    let slot = out.abc.instances[0]
        .traits
        .iter()
        .find(|t| t.name == print)
        .expect("import slot");
    assert!(matches!(slot.data, TraitData::Slot { .. }));
    assert!(
        ops(&out, "main")
            .windows(2)
            .any(|w| w == [OpCode::PushByte, OpCode::CallPropVoid])
    );
}

#[test]
fn memory_grow_helper_is_bounded_by_maximum() {
    let mut module = single(
        vec![ValType::I32],
        vec![ValType::I32],
        Expr::memory_grow(param(0)),
    );
    module.memory = Some(Memory {
        initial: 1,
        maximum: Some(2),
        segments: Vec::new(),
    });
    let out = compile(&module);
    let helper = instructions(&out, "__wasm2swf_memory_grow");
    assert!(helper.iter().any(|i| i.op == OpCode::PushByte && i.operands == vec![2]));
    assert_branches_land_on_instructions(body(&out, "__wasm2swf_memory_grow"));
}

#[test]
fn i64_arithmetic_is_rejected() {
    let module = single(
        vec![],
        vec![],
        Expr::drop(Expr::binary(
            BinaryOp::I64Add,
            Expr::Const(wasm2abc::ir::Literal::I64(1)),
            Expr::Const(wasm2abc::ir::Literal::I64(2)),
        )),
    );
    let err = translate(&module, &CompileOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        Wasm2AbcError::Translate(TranslateError::Unsupported { .. })
    ));
}

#[test]
fn unknown_branch_label_is_reported() {
    let module = single(vec![], vec![], Expr::br("nowhere"));
    let err = translate(&module, &CompileOptions::default()).unwrap_err();
    assert_eq!(
        err,
        Wasm2AbcError::Translate(TranslateError::UnknownLabel {
            name: "nowhere".into()
        })
    );
}
