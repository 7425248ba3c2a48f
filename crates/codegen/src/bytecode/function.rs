//! Function bytecode representation
//!
//! Each function is compiled to a self-contained chunk:
//! - Name (mangled for methods and constructors)
//! - Parameter count, including an implicit `this`
//! - Register count for the VM frame
//! - Its own constant pool and instruction stream

use super::constant_pool::ConstantPool;
use super::instruction::Instruction;
use super::register::VOID_REG;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledFunction {
    pub name: String,
    pub num_params: u32,
    pub num_registers: u32,
    pub constants: ConstantPool,
    pub code: Vec<Instruction>,
}

impl CompiledFunction {
    pub fn new(
        name: String,
        num_params: u32,
        num_registers: u32,
        constants: ConstantPool,
        code: Vec<Instruction>,
    ) -> Self {
        Self {
            name,
            num_params,
            num_registers,
            constants,
            code,
        }
    }

    /// Build a parameterless, constant-free function around raw code, sizing
    /// the frame from the highest register operand the code touches.
    pub fn from_code(name: String, code: Vec<Instruction>) -> Self {
        let num_registers = infer_register_count(&code);
        Self::new(name, 0, num_registers, ConstantPool::new(), code)
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }
}

/// One more than the highest register operand in `code`, ignoring the void
/// sentinel. Operands that hold ids, counts or offsets are not registers.
pub fn infer_register_count(code: &[Instruction]) -> u32 {
    let mut highest: Option<u8> = None;
    let mut note = |reg: u8| {
        if reg != VOID_REG {
            highest = Some(highest.map_or(reg, |h| h.max(reg)));
        }
    };

    for ins in code {
        let Some(op) = ins.opcode() else {
            continue;
        };
        if op.a_is_register() {
            note(ins.a());
        }
        if op.b_is_register() {
            note(ins.b());
        }
        if op.c_is_register() {
            note(ins.c());
        }
    }

    highest.map_or(0, |h| h as u32 + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::Opcode;

    #[test]
    fn test_create_function() {
        let code = vec![Instruction::abc(Opcode::Ret, 255, 0, 0)];
        let func = CompiledFunction::new("main".to_string(), 0, 1, ConstantPool::new(), code);

        assert_eq!(func.name, "main");
        assert_eq!(func.num_registers, 1);
        assert_eq!(func.len(), 1);
    }

    #[test]
    fn test_infer_ignores_void_and_ids() {
        let code = vec![
            Instruction::abx(Opcode::LoadK, 2, 40).unwrap(),
            Instruction::abc(Opcode::CallNative, 3, 1, 1),
            Instruction::abc(Opcode::Ret, 255, 0, 0),
        ];
        assert_eq!(infer_register_count(&code), 4);
    }

    #[test]
    fn test_infer_reads_b_and_c() {
        let code = vec![
            Instruction::abc(Opcode::AddI, 0, 7, 9),
            Instruction::asbx(Opcode::JmpF, 1, -1).unwrap(),
        ];
        assert_eq!(infer_register_count(&code), 10);
    }

    #[test]
    fn test_infer_empty() {
        assert_eq!(infer_register_count(&[]), 0);
        let only_void = vec![Instruction::abc(Opcode::Ret, 255, 0, 0)];
        assert_eq!(infer_register_count(&only_void), 0);
    }
}
