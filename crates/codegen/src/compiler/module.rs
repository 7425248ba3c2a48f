//! Module compilation orchestration
//!
//! Flattens classes into functions and lowers every function independently,
//! optionally across the rayon thread pool. Output order is always free
//! functions, then each class's methods and constructors.

use crate::ast::Program;
use crate::bytecode::{CompiledFunction, CompiledModule};
use crate::compiler::class::{ClassLowering, FunctionUnit};
use crate::compiler::function::FunctionCompiler;
use crate::config::CodegenConfig;
use crate::error::CodegenResult;
use crate::stdlib::BuiltinRegistry;
use crate::types::TypeInfo;
use rayon::prelude::*;
use tracing::debug;

pub struct ModuleCompiler {
    config: CodegenConfig,
    builtins: BuiltinRegistry,
}

impl ModuleCompiler {
    pub fn new(config: CodegenConfig) -> Self {
        Self {
            config,
            builtins: BuiltinRegistry::new(),
        }
    }

    pub fn compile<T>(&self, program: &Program, types: &T) -> CodegenResult<CompiledModule>
    where
        T: TypeInfo + Sync,
    {
        let units = ClassLowering::units(program);

        debug!(
            functions = program.functions.len(),
            classes = program.classes.len(),
            units = units.len(),
            parallel = self.config.parallel,
            "compiling module"
        );

        let functions = if self.config.parallel {
            units
                .par_iter()
                .map(|unit| self.compile_unit(unit, types))
                .collect::<CodegenResult<Vec<_>>>()?
        } else {
            units
                .iter()
                .map(|unit| self.compile_unit(unit, types))
                .collect::<CodegenResult<Vec<_>>>()?
        };

        Ok(CompiledModule::from(functions))
    }

    fn compile_unit<T: TypeInfo>(
        &self,
        unit: &FunctionUnit,
        types: &T,
    ) -> CodegenResult<CompiledFunction> {
        FunctionCompiler::compile(unit, types, &self.builtins, &self.config)
    }
}

impl Default for ModuleCompiler {
    fn default() -> Self {
        Self::new(CodegenConfig::default())
    }
}
