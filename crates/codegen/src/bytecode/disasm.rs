//! Human-readable listings of compiled functions.

use super::function::CompiledFunction;
use super::instruction::Instruction;
use super::module::CompiledModule;
use super::opcode::{OperandFormat, Opcode};
use crate::config::DEFAULT_BUILTIN_RECEIVER;
use crate::stdlib::Builtin;
use std::fmt::Write;

pub fn disassemble_module(module: &CompiledModule) -> String {
    let mut out = String::new();
    for (i, function) in module.functions.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&disassemble_function(function));
    }
    out
}

pub fn disassemble_function(function: &CompiledFunction) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "function {} (params: {}, registers: {}, constants: {})",
        function.name,
        function.num_params,
        function.num_registers,
        function.constants.len()
    );

    if !function.constants.is_empty() {
        out.push_str("  constants:\n");
        for (index, constant) in function.constants.iter() {
            let _ = writeln!(out, "    [{}] {}", index, constant);
        }
    }

    out.push_str("  code:\n");
    for (pc, ins) in function.code.iter().enumerate() {
        let _ = writeln!(out, "    {:04}  {}", pc, format_instruction(function, pc, *ins));
    }
    out
}

/// One instruction with its operands, annotated with jump targets and the
/// constants it refers to.
pub fn format_instruction(function: &CompiledFunction, pc: usize, ins: Instruction) -> String {
    let Some(op) = ins.opcode() else {
        return format!("<bad opcode {}> {:#010x}", ins.op_byte(), ins.word());
    };

    let operands = match op.format() {
        OperandFormat::Abc => format!("{} {} {}", ins.a(), ins.b(), ins.c()),
        OperandFormat::Abx => format!("{} {}", ins.a(), ins.bx()),
        OperandFormat::AsBx => format!("{} {:+}", ins.a(), ins.sbx()),
    };

    let note = match op {
        Opcode::Jmp | Opcode::JmpT | Opcode::JmpF => ins
            .jump_target(pc)
            .map(|target| format!("-> {}", target)),
        Opcode::LoadK | Opcode::NewObj | Opcode::CallK => function
            .constants
            .get(ins.bx() as usize)
            .map(|c| c.to_string()),
        Opcode::CallNative => Builtin::from_native_id(ins.b())
            .map(|builtin| {
                let note = format!("{} {}", DEFAULT_BUILTIN_RECEIVER, builtin.member());
                if builtin.arity().contains(&ins.c()) {
                    note
                } else {
                    format!("{} (bad argc)", note)
                }
            }),
        _ => None,
    };

    match note {
        Some(note) => format!("{:<12}{:<12}; {}", op.name(), operands, note),
        None => format!("{:<12}{}", op.name(), operands),
    }
}
