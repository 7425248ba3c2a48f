//! Fixed-width instruction words
//!
//! Every instruction is one 32-bit word with the opcode in the low
//! byte and operand A in bits 8-15. The upper half holds either B (16-23)
//! and C (24-31), an unsigned Bx, or a signed sBx relative to the address
//! after the jump.

use super::opcode::{OperandFormat, Opcode};
use crate::error::{CodegenError, CodegenResult};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instruction(u32);

impl Instruction {
    pub const fn from_word(word: u32) -> Self {
        Self(word)
    }

    pub const fn word(self) -> u32 {
        self.0
    }

    pub fn abc(op: Opcode, a: u8, b: u8, c: u8) -> Self {
        Self(op as u32 | (a as u32) << 8 | (b as u32) << 16 | (c as u32) << 24)
    }

    pub fn abx(op: Opcode, a: u8, bx: usize) -> CodegenResult<Self> {
        let bx = u16::try_from(bx).map_err(|_| CodegenError::OperandOverflow {
            field: "Bx",
            value: bx as i64,
            bits: 16,
        })?;
        Ok(Self(op as u32 | (a as u32) << 8 | (bx as u32) << 16))
    }

    pub fn asbx(op: Opcode, a: u8, sbx: i64) -> CodegenResult<Self> {
        let sbx = i16::try_from(sbx).map_err(|_| CodegenError::OperandOverflow {
            field: "sBx",
            value: sbx,
            bits: 16,
        })?;
        Ok(Self(op as u32 | (a as u32) << 8 | (sbx as u16 as u32) << 16))
    }

    pub fn op_byte(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn opcode(self) -> Option<Opcode> {
        Opcode::from_u8(self.op_byte())
    }

    pub fn a(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn b(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn c(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn bx(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn sbx(self) -> i16 {
        (self.0 >> 16) as u16 as i16
    }

    /// Rewrite the sBx field, keeping opcode and A.
    pub fn with_sbx(self, sbx: i64) -> CodegenResult<Self> {
        let op = self.opcode().ok_or_else(|| {
            CodegenError::InvalidInstruction(format!("bad opcode byte {}", self.op_byte()))
        })?;
        if op.format() != OperandFormat::AsBx {
            return Err(CodegenError::InvalidInstruction(format!(
                "{} is not a jump",
                op.name()
            )));
        }
        Self::asbx(op, self.a(), sbx)
    }

    /// Absolute target of a jump located at `pc`.
    pub fn jump_target(self, pc: usize) -> Option<i64> {
        match self.opcode() {
            Some(op) if op.is_jump() => Some(pc as i64 + 1 + self.sbx() as i64),
            _ => None,
        }
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:#010x}]", self, self.0)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = self.opcode() else {
            return write!(f, "<bad opcode {}>", self.op_byte());
        };
        match op.format() {
            OperandFormat::Abc => write!(f, "{} {} {} {}", op.name(), self.a(), self.b(), self.c()),
            OperandFormat::Abx => write!(f, "{} {} {}", op.name(), self.a(), self.bx()),
            OperandFormat::AsBx => write!(f, "{} {} {:+}", op.name(), self.a(), self.sbx()),
        }
    }
}
