//! Pipeline for compiling typed programs and inspecting ALKB modules.
//!
//! `compile` reads a `TypedProgram` as JSON, lowers it and writes the module
//! through a temporary file in the destination directory, so a failed run
//! never leaves a truncated module behind. `dump` and `verify` only read.

use alkv_codegen::ast::TypedProgram;
use alkv_codegen::{
    compile_with_config, disasm, format, CodegenConfig, CodegenError, CompiledModule, FormatError,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid typed program: {0}")]
    Json(#[from] serde_json::Error),

    #[error("code generation failed: {0}")]
    Codegen(#[from] CodegenError),

    #[error("malformed module: {0}")]
    Format(#[from] FormatError),

    #[error("module has no functions")]
    EmptyModule,

    #[error("no function named `{0}`")]
    NoSuchFunction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileSummary {
    pub functions: usize,
    pub bytes: usize,
}

pub fn compile_file(
    input: &Path,
    output: &Path,
    legacy: bool,
    config: CodegenConfig,
) -> PipelineResult<CompileSummary> {
    let source = fs::read_to_string(input)?;
    let typed: TypedProgram = serde_json::from_str(&source)?;

    let module = compile_with_config(&typed.program, &typed.types, config)?;

    let bytes = if legacy {
        let first = module.functions.first().ok_or(PipelineError::EmptyModule)?;
        format::write_legacy_code(&first.code)?
    } else {
        format::write_module(&module)?
    };

    write_atomically(output, &bytes)?;
    info!(output = %output.display(), bytes = bytes.len(), legacy, "wrote module");

    Ok(CompileSummary {
        functions: module.len(),
        bytes: bytes.len(),
    })
}

pub fn dump_file(path: &Path, function: Option<&str>) -> PipelineResult<String> {
    let module = load_module(path)?;
    match function {
        Some(name) => module
            .function(name)
            .map(disasm::disassemble_function)
            .ok_or_else(|| PipelineError::NoSuchFunction(name.to_string())),
        None => Ok(disasm::disassemble_module(&module)),
    }
}

/// Number of functions in a well-formed module.
pub fn verify_file(path: &Path) -> PipelineResult<usize> {
    let module = load_module(path)?;
    Ok(module.len())
}

fn load_module(path: &Path) -> PipelineResult<CompiledModule> {
    let bytes = fs::read(path)?;
    debug!(path = %path.display(), bytes = bytes.len(), "reading module");
    Ok(format::read_module(&bytes)?)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> PipelineResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
