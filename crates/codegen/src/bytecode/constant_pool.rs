//! Constant pool for bytecode instructions
//!
//! Each compiled function owns one pool. Instructions reference entries by
//! index (`LOADK`, `NEW_OBJ`, `CALLK`), so an index never changes once
//! handed out: a structurally equal constant always maps back to the slot
//! it first occupied, and new constants append at the end.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Constant {
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
    FunctionRef { name: String, arity: u32 },
    ClassRef(String),
    FieldRef { class: String, field: String },
    MethodRef {
        class: String,
        method: String,
        arity: u32,
    },
}

impl Constant {
    /// Type tag used by the serialized pool.
    pub fn tag(&self) -> u8 {
        match self {
            Constant::Int(_) => 0,
            Constant::Float(_) => 1,
            Constant::Bool(_) => 2,
            Constant::String(_) => 3,
            Constant::FunctionRef { .. } => 4,
            Constant::ClassRef(_) => 5,
            Constant::FieldRef { .. } => 6,
            Constant::MethodRef { .. } => 7,
        }
    }
}

// Floats compare by bit pattern so that every constant is hashable and
// `0.0` / `-0.0` stay distinct slots.
impl PartialEq for Constant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Constant::Int(a), Constant::Int(b)) => a == b,
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            (Constant::Bool(a), Constant::Bool(b)) => a == b,
            (Constant::String(a), Constant::String(b)) => a == b,
            (
                Constant::FunctionRef { name: a, arity: x },
                Constant::FunctionRef { name: b, arity: y },
            ) => a == b && x == y,
            (Constant::ClassRef(a), Constant::ClassRef(b)) => a == b,
            (
                Constant::FieldRef { class: c1, field: f1 },
                Constant::FieldRef { class: c2, field: f2 },
            ) => c1 == c2 && f1 == f2,
            (
                Constant::MethodRef {
                    class: c1,
                    method: m1,
                    arity: a1,
                },
                Constant::MethodRef {
                    class: c2,
                    method: m2,
                    arity: a2,
                },
            ) => c1 == c2 && m1 == m2 && a1 == a2,
            _ => false,
        }
    }
}

impl Eq for Constant {}

impl Hash for Constant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            Constant::Int(v) => v.hash(state),
            Constant::Float(v) => v.to_bits().hash(state),
            Constant::Bool(v) => v.hash(state),
            Constant::String(s) | Constant::ClassRef(s) => s.hash(state),
            Constant::FunctionRef { name, arity } => {
                name.hash(state);
                arity.hash(state);
            }
            Constant::FieldRef { class, field } => {
                class.hash(state);
                field.hash(state);
            }
            Constant::MethodRef {
                class,
                method,
                arity,
            } => {
                class.hash(state);
                method.hash(state);
                arity.hash(state);
            }
        }
    }
}

impl std::fmt::Display for Constant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "int {}", v),
            Constant::Float(v) => write!(f, "float {:?}", v),
            Constant::Bool(v) => write!(f, "bool {}", v),
            Constant::String(s) => write!(f, "string {:?}", s),
            Constant::FunctionRef { name, arity } => write!(f, "func {}/{}", name, arity),
            Constant::ClassRef(name) => write!(f, "class {}", name),
            Constant::FieldRef { class, field } => write!(f, "field {}.{}", class, field),
            Constant::MethodRef {
                class,
                method,
                arity,
            } => write!(f, "method {}.{}/{}", class, method, arity),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantPool {
    constants: IndexSet<Constant>,
}

// `IndexSet` equality ignores order; pools are equal only slot for slot.
impl PartialEq for ConstantPool {
    fn eq(&self, other: &Self) -> bool {
        self.constants.iter().eq(other.constants.iter())
    }
}

impl Eq for ConstantPool {}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `constant`, returning its stable index.
    pub fn add(&mut self, constant: Constant) -> usize {
        self.constants.insert_full(constant).0
    }

    pub fn add_int(&mut self, value: i32) -> usize {
        self.add(Constant::Int(value))
    }

    pub fn add_float(&mut self, value: f32) -> usize {
        self.add(Constant::Float(value))
    }

    pub fn add_bool(&mut self, value: bool) -> usize {
        self.add(Constant::Bool(value))
    }

    pub fn add_string(&mut self, value: impl Into<String>) -> usize {
        self.add(Constant::String(value.into()))
    }

    /// Append a constant that must not already be present. Used when
    /// rebuilding a pool from its serialized form, where silently merging
    /// two entries would shift every later index.
    pub fn push_unique(&mut self, constant: Constant) -> Result<usize, usize> {
        match self.constants.insert_full(constant) {
            (index, true) => Ok(index),
            (index, false) => Err(index),
        }
    }

    pub fn get(&self, index: usize) -> Option<&Constant> {
        self.constants.get_index(index)
    }

    pub fn index_of(&self, constant: &Constant) -> Option<usize> {
        self.constants.get_index_of(constant)
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Constant)> {
        self.constants.iter().enumerate()
    }
}
