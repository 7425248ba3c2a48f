//! Class flattening
//!
//! Classes have no runtime representation beyond their name. Each method
//! becomes a free function `Class.method` and each constructor becomes
//! `Class.<init>`, both taking the receiver as an implicit first parameter
//! named `this`.

use crate::ast::{Block, ClassDecl, FunctionDecl, Param, Program};
use crate::types::Type;

pub const CONSTRUCTOR: &str = "<init>";
pub const RECEIVER: &str = "this";

/// Mangled name of `member` on `class`.
pub fn mangle(class: &str, member: &str) -> String {
    format!("{}.{}", class, member)
}

pub fn constructor_name(class: &str) -> String {
    mangle(class, CONSTRUCTOR)
}

/// One function ready for lowering, borrowing its body from the program.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionUnit<'p> {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Type,
    pub body: &'p Block,
}

impl<'p> FunctionUnit<'p> {
    pub fn free(decl: &'p FunctionDecl) -> Self {
        Self {
            name: decl.name.clone(),
            params: decl.params.clone(),
            return_type: decl.return_type.clone(),
            body: &decl.body,
        }
    }

    pub fn num_params(&self) -> u32 {
        self.params.len() as u32
    }
}

pub struct ClassLowering;

impl ClassLowering {
    /// All functions of `program` in module order: free functions first,
    /// then for each class its methods followed by its constructors.
    pub fn units(program: &Program) -> Vec<FunctionUnit<'_>> {
        let mut units: Vec<_> = program.functions.iter().map(FunctionUnit::free).collect();
        for class in &program.classes {
            units.extend(Self::lower_class(class));
        }
        units
    }

    pub fn lower_class(class: &ClassDecl) -> Vec<FunctionUnit<'_>> {
        let methods = class.methods.iter().map(|method| FunctionUnit {
            name: mangle(&class.name, &method.name),
            params: with_receiver(&class.name, &method.params),
            return_type: method.return_type.clone(),
            body: &method.body,
        });

        let constructors = class.constructors.iter().map(|ctor| FunctionUnit {
            name: constructor_name(&class.name),
            params: with_receiver(&class.name, &ctor.params),
            return_type: Type::Class(class.name.clone()),
            body: &ctor.body,
        });

        methods.chain(constructors).collect()
    }
}

fn with_receiver(class: &str, params: &[Param]) -> Vec<Param> {
    let mut all = Vec::with_capacity(params.len() + 1);
    all.push(Param::new(RECEIVER, Type::Class(class.to_string())));
    all.extend_from_slice(params);
    all
}
