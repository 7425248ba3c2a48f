//! Opcode definitions for the register VM instruction set
//!
//! The byte value of each opcode is part of the ALKB format and must never
//! be renumbered:
//! - Moves and constant loads (0-2)
//! - Typed arithmetic (3-12)
//! - Typed ordering, generic equality, boolean not (13-23)
//! - Control flow (24-26)
//! - Conversion (27)
//! - Arrays and objects (28-33)
//! - Calls and return (34-37)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[repr(u8)]
pub enum Opcode {
    Nop = 0,
    Mov = 1,
    LoadK = 2,

    AddI = 3,
    SubI = 4,
    MulI = 5,
    DivI = 6,
    ModI = 7,
    AddF = 8,
    SubF = 9,
    MulF = 10,
    DivF = 11,
    ModF = 12,

    LtI = 13,
    LeI = 14,
    GtI = 15,
    GeI = 16,
    LtF = 17,
    LeF = 18,
    GtF = 19,
    GeF = 20,
    Eq = 21,
    Ne = 22,
    Not = 23,

    Jmp = 24,
    JmpT = 25,
    JmpF = 26,

    I2F = 27,

    NewArr = 28,
    GetElem = 29,
    SetElem = 30,
    NewObj = 31,
    GetField = 32,
    SetField = 33,

    Call = 34,
    CallK = 35,
    CallNative = 36,
    Ret = 37,
}

/// Operand layout of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandFormat {
    /// Three 8-bit operands.
    Abc,
    /// 8-bit A plus unsigned 16-bit Bx.
    Abx,
    /// 8-bit A plus signed 16-bit sBx (jumps only).
    AsBx,
}

impl Opcode {
    pub const ALL: [Opcode; 38] = [
        Opcode::Nop,
        Opcode::Mov,
        Opcode::LoadK,
        Opcode::AddI,
        Opcode::SubI,
        Opcode::MulI,
        Opcode::DivI,
        Opcode::ModI,
        Opcode::AddF,
        Opcode::SubF,
        Opcode::MulF,
        Opcode::DivF,
        Opcode::ModF,
        Opcode::LtI,
        Opcode::LeI,
        Opcode::GtI,
        Opcode::GeI,
        Opcode::LtF,
        Opcode::LeF,
        Opcode::GtF,
        Opcode::GeF,
        Opcode::Eq,
        Opcode::Ne,
        Opcode::Not,
        Opcode::Jmp,
        Opcode::JmpT,
        Opcode::JmpF,
        Opcode::I2F,
        Opcode::NewArr,
        Opcode::GetElem,
        Opcode::SetElem,
        Opcode::NewObj,
        Opcode::GetField,
        Opcode::SetField,
        Opcode::Call,
        Opcode::CallK,
        Opcode::CallNative,
        Opcode::Ret,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Nop => "NOP",
            Opcode::Mov => "MOV",
            Opcode::LoadK => "LOADK",
            Opcode::AddI => "ADD_I",
            Opcode::SubI => "SUB_I",
            Opcode::MulI => "MUL_I",
            Opcode::DivI => "DIV_I",
            Opcode::ModI => "MOD_I",
            Opcode::AddF => "ADD_F",
            Opcode::SubF => "SUB_F",
            Opcode::MulF => "MUL_F",
            Opcode::DivF => "DIV_F",
            Opcode::ModF => "MOD_F",
            Opcode::LtI => "LT_I",
            Opcode::LeI => "LE_I",
            Opcode::GtI => "GT_I",
            Opcode::GeI => "GE_I",
            Opcode::LtF => "LT_F",
            Opcode::LeF => "LE_F",
            Opcode::GtF => "GT_F",
            Opcode::GeF => "GE_F",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Not => "NOT",
            Opcode::Jmp => "JMP",
            Opcode::JmpT => "JMP_T",
            Opcode::JmpF => "JMP_F",
            Opcode::I2F => "I2F",
            Opcode::NewArr => "NEW_ARR",
            Opcode::GetElem => "GET_ELEM",
            Opcode::SetElem => "SET_ELEM",
            Opcode::NewObj => "NEW_OBJ",
            Opcode::GetField => "GET_FIELD",
            Opcode::SetField => "SET_FIELD",
            Opcode::Call => "CALL",
            Opcode::CallK => "CALLK",
            Opcode::CallNative => "CALL_NATIVE",
            Opcode::Ret => "RET",
        }
    }

    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.get(byte as usize).copied()
    }

    pub fn format(&self) -> OperandFormat {
        match self {
            Opcode::LoadK | Opcode::NewObj | Opcode::CallK => OperandFormat::Abx,
            Opcode::Jmp | Opcode::JmpT | Opcode::JmpF => OperandFormat::AsBx,
            _ => OperandFormat::Abc,
        }
    }

    pub fn is_jump(&self) -> bool {
        self.format() == OperandFormat::AsBx
    }

    /// Whether operand B names a register (as opposed to an id or count).
    pub fn b_is_register(&self) -> bool {
        !matches!(
            self,
            Opcode::Nop | Opcode::Ret | Opcode::CallNative | Opcode::Jmp
        ) && self.format() == OperandFormat::Abc
    }

    /// Whether operand C names a register.
    pub fn c_is_register(&self) -> bool {
        matches!(
            self,
            Opcode::AddI
                | Opcode::SubI
                | Opcode::MulI
                | Opcode::DivI
                | Opcode::ModI
                | Opcode::AddF
                | Opcode::SubF
                | Opcode::MulF
                | Opcode::DivF
                | Opcode::ModF
                | Opcode::LtI
                | Opcode::LeI
                | Opcode::GtI
                | Opcode::GeI
                | Opcode::LtF
                | Opcode::LeF
                | Opcode::GtF
                | Opcode::GeF
                | Opcode::Eq
                | Opcode::Ne
                | Opcode::GetElem
                | Opcode::SetElem
                | Opcode::GetField
                | Opcode::SetField
        )
    }

    /// Whether operand A names a register. `JMP` ignores A entirely.
    pub fn a_is_register(&self) -> bool {
        !matches!(self, Opcode::Nop | Opcode::Jmp)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
