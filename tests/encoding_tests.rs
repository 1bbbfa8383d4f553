//! Whole-file encoding through the facade.

mod test_harness;

use proptest::prelude::*;
use test_harness::*;
use wasm2abc::abc::ByteReader;
use wasm2abc::ir::{BinaryOp, DataSegment, Expr, Function, Memory, Module, ValType};
use wasm2abc::{CompileOptions, QualifiedName, translate};

fn add_module() -> Module {
    single(
        vec![ValType::I32, ValType::I32],
        vec![ValType::I32],
        Expr::binary(
            BinaryOp::I32Add,
            Expr::local_get(0, ValType::I32),
            Expr::local_get(1, ValType::I32),
        ),
    )
}

#[test]
fn header_carries_version() {
    let out = translate(&add_module(), &CompileOptions::default()).unwrap();
    assert_eq!(&out.abc[..4], &[16, 0, 46, 0]);

    let options = CompileOptions::new().with_version(0, 47);
    let out = translate(&add_module(), &options).unwrap();
    assert_eq!(&out.abc[..4], &[0, 0, 47, 0]);
}

#[test]
fn class_names_are_dotted() {
    let options = CompileOptions::new()
        .with_package("demo.wasm")
        .with_class_name("Adder")
        .with_sprite_base();
    let out = translate(&add_module(), &options).unwrap();
    assert_eq!(out.class_names, vec!["demo.wasm.Adder".to_owned()]);
}

#[test]
fn custom_base_chain_sets_super_name() {
    let chain = vec![
        QualifiedName::public("Object"),
        QualifiedName::new("lib", "Base"),
    ];
    let options = CompileOptions::new().with_base_classes(chain);
    let mut out = wasm2abc::compile_module(&add_module(), &options).unwrap();
    let base = QualifiedName::new("lib", "Base").intern(&mut out.abc.pool);
    assert_eq!(out.abc.instances[0].super_name, base);
    assert_eq!(body(&out, "f").init_scope_depth, 4);
}

#[test]
fn encoding_is_deterministic() {
    let mut module = add_module();
    module.memory = Some(Memory {
        initial: 1,
        maximum: None,
        segments: vec![DataSegment {
            offset: 8,
            data: b"hello, world".to_vec(),
        }],
    });
    let first = translate(&module, &CompileOptions::default()).unwrap();
    let second = translate(&module, &CompileOptions::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn every_body_is_well_formed() {
    let module = module_of(vec![
        Function::new(
            "max",
            vec![ValType::F64, ValType::F64],
            vec![ValType::F64],
            Expr::binary(
                BinaryOp::F64Max,
                Expr::local_get(0, ValType::F64),
                Expr::local_get(1, ValType::F64),
            ),
        ),
        Function::new(
            "clz",
            vec![ValType::I32],
            vec![ValType::I32],
            Expr::unary(
                wasm2abc::ir::UnaryOp::I32Clz,
                Expr::local_get(0, ValType::I32),
            ),
        ),
    ]);
    let out = compile(&module);
    for body in &out.abc.bodies {
        assert_branches_land_on_instructions(body);
        assert!(body.max_scope_depth >= body.init_scope_depth);
    }
}

#[test]
fn method_count_follows_header_and_pool() {
    let out = translate(&add_module(), &CompileOptions::default()).unwrap();
    let compiled = compile(&add_module());

    // Skip the version and re-encode the pool alone to find where methods start.
    let mut pool = Vec::new();
    compiled.abc.pool.write_to(&mut pool).unwrap();
    let mut reader = ByteReader::new(&out.abc[4 + pool.len()..]);
    assert_eq!(reader.read_u30().unwrap() as usize, compiled.abc.methods.len());
}

proptest! {
    #[test]
    fn data_segments_always_encode(
        offset in 0u32..60_000,
        data in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let mut module = add_module();
        module.memory = Some(Memory {
            initial: 1,
            maximum: None,
            segments: vec![DataSegment { offset, data }],
        });
        let out = translate(&module, &CompileOptions::default());
        prop_assert!(out.is_ok());
    }

    #[test]
    fn constants_round_trip_through_pushes(value in any::<i32>()) {
        let module = single(vec![], vec![ValType::I32], Expr::i32(value));
        let out = compile(&module);
        let insts = instructions(&out, "f");
        let push = &insts[0];
        let decoded = match push.op {
            wasm2abc::compiler::bytecode::OpCode::PushInt => {
                out.abc.pool.int(push.operands[0] as u32).map(i64::from)
            }
            _ => Some(push.operands[0]),
        };
        prop_assert_eq!(decoded, Some(i64::from(value)));
    }
}
