//! Codegen and module-format error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("Register pressure exceeded: register {requested} is past the ceiling of {ceiling}")]
    RegisterPressure { requested: u16, ceiling: u8 },

    #[error("Operand out of range: {field} = {value} does not fit in {bits} bits")]
    OperandOverflow {
        field: &'static str,
        value: i64,
        bits: u8,
    },

    #[error("Jump offset {offset} at pc {site} does not fit in a signed 16-bit field")]
    JumpOutOfRange { site: usize, offset: i64 },

    #[error("Label already bound at pc {0}")]
    LabelAlreadyBound(usize),

    #[error("Label patched before it was bound")]
    LabelNotBound,

    #[error("Function `{function}` ends with {count} unresolved jump site(s)")]
    UnresolvedJumps { function: String, count: usize },

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown builtin: {receiver}.{member}")]
    UnknownBuiltin { receiver: String, member: String },

    #[error("Builtin {member} takes {expected} argument(s), got {found}")]
    BuiltinArity {
        member: &'static str,
        expected: String,
        found: usize,
    },

    #[error("Missing type annotation for expression #{0}")]
    MissingType(u32),

    #[error("Expression #{0} is not class-typed")]
    NotAClass(u32),

    #[error("Invalid assignment target")]
    InvalidAssignTarget,

    #[error("Unsupported callee: {0}")]
    UnsupportedCallee(String),

    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),
}

pub type CodegenResult<T> = Result<T, CodegenError>;

/// Failures while reading or writing an ALKB module.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Bad magic: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("Unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },

    #[error("Tag mismatch at offset {offset}: expected `{expected}`, found `{found}`")]
    TagMismatch {
        expected: String,
        found: String,
        offset: usize,
    },

    #[error("Unexpected end of input at offset {offset}: needed {needed} more byte(s)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Unknown constant tag {tag} at offset {offset}")]
    UnknownConstantTag { tag: u8, offset: usize },

    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Section `{section}` declares {declared} byte(s) but holds {actual}")]
    SizeMismatch {
        section: &'static str,
        declared: usize,
        actual: usize,
    },

    #[error("Code section size {size} is not a multiple of 4")]
    MisalignedCode { size: usize },

    #[error("Duplicate constant at pool index {index}")]
    DuplicateConstant { index: usize },

    #[error("{count} trailing byte(s) after the last function")]
    TrailingBytes { count: usize },

    #[error("{what} value {value} does not fit in its field")]
    ValueTooLarge { what: &'static str, value: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FormatResult<T> = Result<T, FormatError>;
