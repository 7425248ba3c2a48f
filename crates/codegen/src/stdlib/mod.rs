//! Standard library integration

pub mod builtins;

pub use builtins::{Builtin, BuiltinRegistry};
