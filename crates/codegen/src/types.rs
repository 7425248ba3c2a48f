//! Static types and the read-only type context handed over by semantic
//! analysis.

use crate::ast::ExprId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    Void,
    Array(Box<Type>),
    Class(String),
}

impl Type {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Float)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float)
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::Bool => f.write_str("bool"),
            Type::String => f.write_str("string"),
            Type::Void => f.write_str("void"),
            Type::Array(elem) => write!(f, "{}[]", elem),
            Type::Class(name) => f.write_str(name),
        }
    }
}

/// Resolved static facts about expressions. Lowering only ever reads
/// through this trait.
pub trait TypeInfo {
    fn type_of(&self, expr: ExprId) -> Option<&Type>;

    /// Class name of a class-valued expression.
    fn class_of(&self, expr: ExprId) -> Option<&str> {
        self.type_of(expr).and_then(Type::class_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTable {
    types: HashMap<ExprId, Type>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, expr: ExprId, ty: Type) {
        self.types.insert(expr, ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl TypeInfo for TypeTable {
    fn type_of(&self, expr: ExprId) -> Option<&Type> {
        self.types.get(&expr)
    }
}
