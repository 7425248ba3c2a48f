//! # alkv Code Generation
//!
//! This crate lowers a type-checked alkv program into register bytecode and
//! reads and writes the ALKB binary module format.
//!
//! ## Architecture
//!
//! The code generation pipeline:
//! 1. **Input**: [`ast::Program`] plus a [`types::TypeInfo`] context from semantic analysis
//! 2. **Flattening**: methods and constructors become mangled free functions
//! 3. **Lowering**: each function gets its own constant pool, register frame and
//!    label-patched instruction stream
//! 4. **Output**: a [`CompiledModule`], serializable with [`format::write_module`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use alkv_codegen::{compile, format};
//!
//! let module = compile(&typed.program, &typed.types)?;
//! let bytes = format::write_module(&module)?;
//! ```

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod config;
pub mod error;
pub mod stdlib;
pub mod types;

pub use bytecode::{
    disasm, format, CompiledFunction, CompiledModule, Constant, ConstantPool, Instruction, Opcode,
};
pub use compiler::module::ModuleCompiler;
pub use config::CodegenConfig;
pub use error::{CodegenError, CodegenResult, FormatError, FormatResult};
pub use stdlib::{Builtin, BuiltinRegistry};
pub use types::{Type, TypeInfo, TypeTable};

/// Compile a typed program with the default configuration.
pub fn compile<T>(program: &ast::Program, types: &T) -> CodegenResult<CompiledModule>
where
    T: TypeInfo + Sync,
{
    compile_with_config(program, types, CodegenConfig::default())
}

pub fn compile_with_config<T>(
    program: &ast::Program,
    types: &T,
    config: CodegenConfig,
) -> CodegenResult<CompiledModule>
where
    T: TypeInfo + Sync,
{
    ModuleCompiler::new(config).compile(program, types)
}
