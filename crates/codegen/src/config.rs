//! Code generation settings

use serde::{Deserialize, Serialize};

/// Receiver name under which the VM's native builtins are reached.
pub const DEFAULT_BUILTIN_RECEIVER: &str = "ochev";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenConfig {
    /// Emit a `trace` event for every lowered statement
    pub trace_lowering: bool,
    /// Lower independent functions on the rayon pool
    pub parallel: bool,
    /// Name that designates builtin calls (`ochev.Out(x)`)
    pub builtin_receiver: String,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            trace_lowering: false,
            parallel: false,
            builtin_receiver: DEFAULT_BUILTIN_RECEIVER.to_string(),
        }
    }
}
