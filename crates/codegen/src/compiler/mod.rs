//! Compiler orchestration
//!
//! Lowers a typed program into per-function register bytecode.

pub mod call;
pub mod class;
pub mod context;
pub mod expr;
pub mod function;
pub mod module;
pub mod stmt;
