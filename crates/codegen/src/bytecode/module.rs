//! Bytecode module: the ordered set of compiled functions for one program
//! and the unit the ALKB format reads and writes.

use super::function::CompiledFunction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledModule {
    pub functions: Vec<CompiledFunction>,
}

impl CompiledModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(&mut self, function: CompiledFunction) {
        self.functions.push(function);
    }

    pub fn function(&self, name: &str) -> Option<&CompiledFunction> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Look up a call target the way `CALLK` names it: by name and arity.
    pub fn resolve_call(&self, name: &str, arity: u32) -> Option<&CompiledFunction> {
        self.functions
            .iter()
            .find(|f| f.name == name && f.num_params == arity)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl From<Vec<CompiledFunction>> for CompiledModule {
    fn from(functions: Vec<CompiledFunction>) -> Self {
        Self { functions }
    }
}
