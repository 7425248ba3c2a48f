//! Bytecode module root
//! Re-exports the instruction set, per-function building blocks and the
//! ALKB serializer.

pub mod constant_pool;
pub mod disasm;
pub mod emitter;
pub mod format;
pub mod function;
pub mod instruction;
pub mod module;
pub mod opcode;
pub mod register;

pub use constant_pool::{Constant, ConstantPool};
pub use emitter::{Emitter, Label};
pub use function::CompiledFunction;
pub use instruction::Instruction;
pub use module::CompiledModule;
pub use opcode::{OperandFormat, Opcode};
pub use register::{Reg, RegisterAllocator, REGISTER_CEILING, VOID_REG};
