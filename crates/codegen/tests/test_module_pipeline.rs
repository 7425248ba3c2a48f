//! Module Pipeline Tests
//!
//! End-to-end: typed program in, ALKB bytes out, read back and executed.
//! Also covers configuration variants and lowering errors.

mod common;

use alkv_codegen::ast::{AstBuilder, BinaryOp, Expr, ExprId, ExprKind, Program, Stmt, TypedProgram};
use alkv_codegen::bytecode::format::{read_from, read_module, write_legacy_code, write_module, write_to};
use alkv_codegen::bytecode::{CompiledFunction, CompiledModule, ConstantPool, Instruction, Opcode};
use alkv_codegen::{compile, compile_with_config, disasm, CodegenConfig, CodegenError, Type};
use common::{class, compile_program, ctor, func, program, var_decl, Value, Vm};
use std::fs::File;
use std::io::{Seek, SeekFrom};

/// Two free functions and a class with a method and a constructor.
fn sample() -> TypedProgram {
    let mut b = AstBuilder::new();
    let point = Type::Class("Point".into());

    // class Point { x: int; new(x: int) { this.x = x; } fn get() -> int { return this.x; } }
    let this = b.var("this", point.clone());
    let field = b.field(this, "x", Type::Int);
    let x = b.var("x", Type::Int);
    let store = b.assign(field, x);
    let this = b.var("this", point.clone());
    let read = b.field(this, "x", Type::Int);
    let get = func("get", &[], Type::Int, vec![Stmt::Return(Some(read))]);
    let point_class = class(
        "Point",
        &[("x", Type::Int)],
        vec![get],
        vec![ctor(&[("x", Type::Int)], vec![Stmt::Expr(store)])],
    );

    // fn twice(n: int) -> int { return n + n; }
    let n = b.var("n", Type::Int);
    let n2 = b.var("n", Type::Int);
    let sum = b.binary(BinaryOp::Add, n, n2);
    let twice = func("twice", &[("n", Type::Int)], Type::Int, vec![Stmt::Return(Some(sum))]);

    // fn main() -> int { var p = new Point(21); return twice(p.get()); }
    let arg = b.int(21);
    let obj = b.new_object("Point", vec![arg]);
    let p = b.var("p", point.clone());
    let callee = b.field(p, "get", Type::Void);
    let got = b.call(callee, vec![], Type::Int);
    let doubled = b.call_fn("twice", vec![got], Type::Int);
    let main = func(
        "main",
        &[],
        Type::Int,
        vec![var_decl("p", point, obj), Stmt::Return(Some(doubled))],
    );

    TypedProgram {
        program: Program {
            functions: vec![twice, main],
            classes: vec![point_class],
        },
        types: b.finish(),
    }
}

// ===== Round trips =====

#[test]
fn test_compiled_module_round_trips_and_runs() {
    let typed = sample();
    let module = compile_program(&typed.program, &typed.types);
    assert_eq!(module.len(), 4);

    let bytes = write_module(&module).unwrap();
    assert_eq!(&bytes[..4], b"ALKB");

    let decoded = read_module(&bytes).unwrap();
    assert_eq!(decoded, module);

    let mut vm = Vm::new(&decoded);
    assert_eq!(vm.call("main", vec![]), Value::Int(42));
}

#[test]
fn test_main_module_round_trip() {
    let module = CompiledModule::from(vec![CompiledFunction::new(
        "main".to_string(),
        0,
        1,
        ConstantPool::new(),
        vec![Instruction::abc(Opcode::Ret, 255, 0, 0)],
    )]);

    let decoded = read_module(&write_module(&module).unwrap()).unwrap();
    let main = &decoded.functions[0];
    assert_eq!(main.name, "main");
    assert_eq!(main.num_params, 0);
    assert_eq!(main.num_registers, 1);
    assert_eq!(main.code.len(), 1);
}

#[test]
fn test_file_round_trip() {
    let typed = sample();
    let module = compile_program(&typed.program, &typed.types);

    let mut file: File = tempfile::tempfile().unwrap();
    write_to(&module, &mut file).unwrap();
    file.seek(SeekFrom::Start(0)).unwrap();

    assert_eq!(read_from(&mut file).unwrap(), module);
}

#[test]
fn test_legacy_output_of_compiled_function() {
    let typed = sample();
    let module = compile_program(&typed.program, &typed.types);
    let twice = module.function("twice").unwrap();

    let decoded = read_module(&write_legacy_code(&twice.code).unwrap()).unwrap();
    let main = &decoded.functions[0];
    assert_eq!(main.name, "main");
    assert_eq!(main.code, twice.code);
    assert_eq!(main.num_registers, twice.num_registers);
    assert!(main.constants.is_empty());
}

#[test]
fn test_jump_offsets_survive_serialization() {
    // while (i < 3) { i = i + 1; }
    let mut b = AstBuilder::new();
    let i = b.var("i", Type::Int);
    let three = b.int(3);
    let cond = b.binary(BinaryOp::Lt, i, three);
    let target = b.var("i", Type::Int);
    let i2 = b.var("i", Type::Int);
    let one = b.int(1);
    let next = b.binary(BinaryOp::Add, i2, one);
    let step = b.assign(target, next);
    let f = func(
        "spin",
        &[("i", Type::Int)],
        Type::Void,
        vec![Stmt::While {
            cond,
            body: alkv_codegen::ast::Block::new(vec![Stmt::Expr(step)]),
        }],
    );

    let module = compile_program(&program(vec![f]), &b.finish());
    let decoded = read_module(&write_module(&module).unwrap()).unwrap();

    let targets = |m: &CompiledModule| -> Vec<i64> {
        m.functions[0]
            .code
            .iter()
            .enumerate()
            .filter_map(|(pc, ins)| ins.jump_target(pc))
            .collect()
    };
    assert_eq!(targets(&module), targets(&decoded));
    assert_eq!(targets(&module).len(), 2);
}

// ===== Configuration =====

#[test]
fn test_parallel_matches_sequential() {
    let typed = sample();
    let sequential = compile(&typed.program, &typed.types).unwrap();
    let parallel = compile_with_config(
        &typed.program,
        &typed.types,
        CodegenConfig {
            parallel: true,
            ..CodegenConfig::default()
        },
    )
    .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(
        write_module(&sequential).unwrap(),
        write_module(&parallel).unwrap()
    );
}

#[test]
fn test_custom_builtin_receiver() {
    let mut b = AstBuilder::new();
    let receiver = b.var("sys", Type::Void);
    let callee = b.field(receiver, "Out", Type::Void);
    let one = b.int(1);
    let call = b.call(callee, vec![one], Type::Void);
    let main = func("main", &[], Type::Void, vec![Stmt::Expr(call)]);

    let config = CodegenConfig {
        builtin_receiver: "sys".into(),
        ..CodegenConfig::default()
    };
    let module = compile_with_config(&program(vec![main]), &b.finish(), config).unwrap();

    let mut vm = Vm::new(&module);
    vm.call("main", vec![]);
    assert_eq!(vm.output, vec![Value::Int(1)]);
}

#[test]
fn test_typed_program_from_json() {
    let typed = sample();
    let json = serde_json::to_string(&typed).unwrap();
    let parsed: TypedProgram = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed, typed);
    assert_eq!(
        compile(&parsed.program, &parsed.types).unwrap(),
        compile(&typed.program, &typed.types).unwrap()
    );
}

#[test]
fn test_disassembly_lists_every_function() {
    let typed = sample();
    let module = compile_program(&typed.program, &typed.types);
    let text = disasm::disassemble_module(&module);

    for name in ["twice", "main", "Point.get", "Point.<init>"] {
        assert!(text.contains(&format!("function {} ", name)), "{}", name);
    }
    assert!(text.contains("; func twice/1"));
}

// ===== Errors =====

#[test]
fn test_unknown_variable() {
    let mut b = AstBuilder::new();
    let ghost = b.var("ghost", Type::Int);
    let f = func("f", &[], Type::Int, vec![Stmt::Return(Some(ghost))]);

    let err = compile(&program(vec![f]), &b.finish()).unwrap_err();
    assert!(matches!(err, CodegenError::UnknownVariable(ref name) if name == "ghost"));
}

#[test]
fn test_invalid_assign_target() {
    let mut b = AstBuilder::new();
    let lhs = b.int(1);
    let rhs = b.int(2);
    let bad = b.assign(lhs, rhs);
    let f = func("f", &[], Type::Void, vec![Stmt::Expr(bad)]);

    let err = compile(&program(vec![f]), &b.finish()).unwrap_err();
    assert!(matches!(err, CodegenError::InvalidAssignTarget));
}

#[test]
fn test_missing_type_entry() {
    let mut b = AstBuilder::new();
    let untyped = Expr {
        id: ExprId(9999),
        kind: ExprKind::Int(1),
    };
    let one = b.int(1);
    let sum = b.binary(BinaryOp::Add, untyped, one);
    let f = func("f", &[], Type::Int, vec![Stmt::Return(Some(sum))]);

    let err = compile(&program(vec![f]), &b.finish()).unwrap_err();
    assert!(matches!(err, CodegenError::MissingType(9999)));
}

#[test]
fn test_register_pressure() {
    let mut b = AstBuilder::new();
    let stmts = (0..300)
        .map(|i| {
            let init = b.int(i);
            var_decl(&format!("v{}", i), Type::Int, init)
        })
        .collect();
    let f = func("wide", &[], Type::Void, stmts);

    let err = compile(&program(vec![f]), &b.finish()).unwrap_err();
    assert!(matches!(err, CodegenError::RegisterPressure { .. }));
}

#[test]
fn test_error_in_one_function_fails_the_module() {
    let mut b = AstBuilder::new();
    let ok = func("ok", &[], Type::Void, vec![]);
    let ghost = b.var("ghost", Type::Int);
    let bad = func("bad", &[], Type::Int, vec![Stmt::Return(Some(ghost))]);
    let prog = program(vec![ok, bad]);
    let types = b.finish();

    for parallel in [false, true] {
        let config = CodegenConfig {
            parallel,
            ..CodegenConfig::default()
        };
        assert!(compile_with_config(&prog, &types, config).is_err());
    }
}
