//! Function compilation

use crate::bytecode::{CompiledFunction, Opcode, VOID_REG};
use crate::compiler::class::FunctionUnit;
use crate::compiler::context::CompilationContext;
use crate::compiler::stmt::StmtCompiler;
use crate::config::CodegenConfig;
use crate::error::CodegenResult;
use crate::stdlib::BuiltinRegistry;
use crate::types::TypeInfo;
use tracing::debug;

pub struct FunctionCompiler;

impl FunctionCompiler {
    /// Lower one function into a self-contained chunk with its own constant
    /// pool and register frame. Parameters take registers `0..n` in order.
    pub fn compile(
        unit: &FunctionUnit,
        types: &dyn TypeInfo,
        builtins: &BuiltinRegistry,
        config: &CodegenConfig,
    ) -> CodegenResult<CompiledFunction> {
        let mut ctx = CompilationContext::new(unit.name.as_str(), types, builtins, config);

        ctx.push_scope();

        for param in &unit.params {
            let reg = ctx.alloc()?;
            ctx.define_local(param.name.as_str(), reg);
        }

        StmtCompiler::compile_block(&mut ctx, unit.body)?;

        if !unit.body.ends_with_return() {
            ctx.emit(Opcode::Ret, VOID_REG, 0, 0);
        }

        ctx.pop_scope();

        let (code, constants, registers) = ctx.finish()?;

        debug!(
            function = %unit.name,
            params = unit.params.len(),
            registers,
            instructions = code.len(),
            constants = constants.len(),
            "compiled function"
        );

        Ok(CompiledFunction::new(
            unit.name.clone(),
            unit.num_params(),
            u32::from(registers),
            constants,
            code,
        ))
    }
}
