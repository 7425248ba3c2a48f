//! Shared helpers for the integration tests: program construction shortcuts
//! and a small reference interpreter that executes compiled modules.

#![allow(dead_code)]

use alkv_codegen::ast::{Block, ClassDecl, ConstructorDecl, FunctionDecl, Param, Program, Stmt};
use alkv_codegen::bytecode::{CompiledFunction, CompiledModule, Constant, Opcode};
use alkv_codegen::{compile, Type, TypeTable};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

// ===== Program construction =====

pub fn func(name: &str, params: &[(&str, Type)], ret: Type, stmts: Vec<Stmt>) -> FunctionDecl {
    FunctionDecl {
        name: name.to_string(),
        params: params
            .iter()
            .map(|(n, t)| Param::new(*n, t.clone()))
            .collect(),
        return_type: ret,
        body: Block::new(stmts),
    }
}

pub fn ctor(params: &[(&str, Type)], stmts: Vec<Stmt>) -> ConstructorDecl {
    ConstructorDecl {
        params: params
            .iter()
            .map(|(n, t)| Param::new(*n, t.clone()))
            .collect(),
        body: Block::new(stmts),
    }
}

pub fn class(
    name: &str,
    fields: &[(&str, Type)],
    methods: Vec<FunctionDecl>,
    constructors: Vec<ConstructorDecl>,
) -> ClassDecl {
    ClassDecl {
        name: name.to_string(),
        fields: fields
            .iter()
            .map(|(n, t)| Param::new(*n, t.clone()))
            .collect(),
        methods,
        constructors,
    }
}

pub fn var_decl(name: &str, ty: Type, init: alkv_codegen::ast::Expr) -> Stmt {
    Stmt::VarDecl {
        name: name.to_string(),
        ty,
        init: Some(init),
    }
}

pub fn program(functions: Vec<FunctionDecl>) -> Program {
    Program {
        functions,
        classes: vec![],
    }
}

pub fn compile_program(program: &Program, types: &TypeTable) -> CompiledModule {
    compile(program, types).unwrap()
}

pub fn opcodes(function: &CompiledFunction) -> Vec<Opcode> {
    function.code.iter().map(|i| i.opcode().unwrap()).collect()
}

pub fn count(function: &CompiledFunction, op: Opcode) -> usize {
    opcodes(function).into_iter().filter(|o| *o == op).count()
}

// ===== Reference interpreter =====

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Int(i32),
    Float(f32),
    Bool(bool),
    Str(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<HashMap<String, Value>>>),
    Ref(Constant),
}

impl Value {
    fn int(&self) -> i32 {
        match self {
            Value::Int(v) => *v,
            other => panic!("expected int, found {:?}", other),
        }
    }

    fn float(&self) -> f32 {
        match self {
            Value::Float(v) => *v,
            other => panic!("expected float, found {:?}", other),
        }
    }

    fn truthy(&self) -> bool {
        match self {
            Value::Bool(v) => *v,
            other => panic!("expected bool, found {:?}", other),
        }
    }
}

/// Executes a module with the frame semantics the bytecode assumes: each
/// call gets a fresh register file, and the callee's parameters are the
/// caller's registers `0..argc` at the time of the call.
pub struct Vm<'m> {
    module: &'m CompiledModule,
    pub output: Vec<Value>,
    steps: usize,
}

impl<'m> Vm<'m> {
    pub fn new(module: &'m CompiledModule) -> Self {
        Self {
            module,
            output: Vec::new(),
            steps: 0,
        }
    }

    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Value {
        let function = self
            .module
            .resolve_call(name, args.len() as u32)
            .unwrap_or_else(|| panic!("no function {}/{}", name, args.len()));

        let mut regs = vec![Value::Void; function.num_registers as usize];
        for (i, arg) in args.into_iter().enumerate() {
            regs[i] = arg;
        }

        let mut pc = 0usize;
        loop {
            self.steps += 1;
            assert!(self.steps < 1_000_000, "step limit exceeded in {}", name);

            let ins = function.code[pc];
            let (a, b, c) = (ins.a() as usize, ins.b() as usize, ins.c() as usize);
            let here = pc;
            pc += 1;

            let op = ins.opcode().unwrap();
            match op {
                Opcode::Nop => {}
                Opcode::Mov => regs[a] = regs[b].clone(),
                Opcode::LoadK => {
                    regs[a] = load(function.constants.get(ins.bx() as usize).unwrap())
                }
                Opcode::AddI => regs[a] = Value::Int(regs[b].int().wrapping_add(regs[c].int())),
                Opcode::SubI => regs[a] = Value::Int(regs[b].int().wrapping_sub(regs[c].int())),
                Opcode::MulI => regs[a] = Value::Int(regs[b].int().wrapping_mul(regs[c].int())),
                Opcode::DivI => regs[a] = Value::Int(regs[b].int() / regs[c].int()),
                Opcode::ModI => regs[a] = Value::Int(regs[b].int() % regs[c].int()),
                Opcode::AddF => regs[a] = Value::Float(regs[b].float() + regs[c].float()),
                Opcode::SubF => regs[a] = Value::Float(regs[b].float() - regs[c].float()),
                Opcode::MulF => regs[a] = Value::Float(regs[b].float() * regs[c].float()),
                Opcode::DivF => regs[a] = Value::Float(regs[b].float() / regs[c].float()),
                Opcode::ModF => regs[a] = Value::Float(regs[b].float() % regs[c].float()),
                Opcode::LtI => regs[a] = Value::Bool(regs[b].int() < regs[c].int()),
                Opcode::LeI => regs[a] = Value::Bool(regs[b].int() <= regs[c].int()),
                Opcode::GtI => regs[a] = Value::Bool(regs[b].int() > regs[c].int()),
                Opcode::GeI => regs[a] = Value::Bool(regs[b].int() >= regs[c].int()),
                Opcode::LtF => regs[a] = Value::Bool(regs[b].float() < regs[c].float()),
                Opcode::LeF => regs[a] = Value::Bool(regs[b].float() <= regs[c].float()),
                Opcode::GtF => regs[a] = Value::Bool(regs[b].float() > regs[c].float()),
                Opcode::GeF => regs[a] = Value::Bool(regs[b].float() >= regs[c].float()),
                Opcode::Eq => regs[a] = Value::Bool(regs[b] == regs[c]),
                Opcode::Ne => regs[a] = Value::Bool(regs[b] != regs[c]),
                Opcode::Not => regs[a] = Value::Bool(!regs[b].truthy()),
                Opcode::Jmp => pc = ins.jump_target(here).unwrap() as usize,
                Opcode::JmpT => {
                    if regs[a].truthy() {
                        pc = ins.jump_target(here).unwrap() as usize;
                    }
                }
                Opcode::JmpF => {
                    if !regs[a].truthy() {
                        pc = ins.jump_target(here).unwrap() as usize;
                    }
                }
                Opcode::I2F => regs[a] = Value::Float(regs[b].int() as f32),
                Opcode::NewArr => {
                    let size = regs[b].int() as usize;
                    regs[a] = Value::Array(Rc::new(RefCell::new(vec![Value::Void; size])));
                }
                Opcode::GetElem => {
                    let idx = regs[c].int() as usize;
                    regs[a] = match &regs[b] {
                        Value::Array(items) => items.borrow()[idx].clone(),
                        other => panic!("GET_ELEM on {:?}", other),
                    };
                }
                Opcode::SetElem => {
                    let idx = regs[b].int() as usize;
                    let value = regs[c].clone();
                    match &regs[a] {
                        Value::Array(items) => items.borrow_mut()[idx] = value,
                        other => panic!("SET_ELEM on {:?}", other),
                    }
                }
                Opcode::NewObj => {
                    regs[a] = Value::Object(Rc::new(RefCell::new(HashMap::new())));
                }
                Opcode::GetField => {
                    let field = field_name(&regs[c]);
                    regs[a] = match &regs[b] {
                        Value::Object(fields) => {
                            fields.borrow().get(&field).cloned().unwrap_or(Value::Void)
                        }
                        other => panic!("GET_FIELD on {:?}", other),
                    };
                }
                Opcode::SetField => {
                    let field = field_name(&regs[b]);
                    let value = regs[c].clone();
                    match &regs[a] {
                        Value::Object(fields) => {
                            fields.borrow_mut().insert(field, value);
                        }
                        other => panic!("SET_FIELD on {:?}", other),
                    }
                }
                Opcode::CallK => {
                    let (callee, arity) = match function.constants.get(ins.bx() as usize) {
                        Some(Constant::FunctionRef { name, arity }) => (name.clone(), *arity),
                        other => panic!("CALLK through {:?}", other),
                    };
                    let args = regs[..arity as usize].to_vec();
                    regs[a] = self.call(&callee, args);
                }
                Opcode::CallNative => {
                    let args = regs[..c].to_vec();
                    regs[a] = self.native(b as u8, args);
                }
                Opcode::Call => panic!("CALL is never emitted"),
                Opcode::Ret => {
                    return if a == 255 {
                        Value::Void
                    } else {
                        regs[a].clone()
                    };
                }
            }
        }
    }

    fn native(&mut self, id: u8, args: Vec<Value>) -> Value {
        match id {
            1 => {
                self.output.extend(args);
                Value::Void
            }
            2 => Value::Int(0),
            4 => Value::Int(args[0].int().max(args[1].int())),
            5 => Value::Int(args[0].int().min(args[1].int())),
            _ => Value::Void,
        }
    }
}

fn load(constant: &Constant) -> Value {
    match constant {
        Constant::Int(v) => Value::Int(*v),
        Constant::Float(v) => Value::Float(*v),
        Constant::Bool(v) => Value::Bool(*v),
        Constant::String(s) => Value::Str(s.clone()),
        other => Value::Ref(other.clone()),
    }
}

fn field_name(value: &Value) -> String {
    match value {
        Value::Ref(Constant::FieldRef { field, .. }) => field.clone(),
        other => panic!("expected a field reference, found {:?}", other),
    }
}
