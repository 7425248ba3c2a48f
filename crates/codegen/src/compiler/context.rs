//! Per-function compilation state
//!
//! One context lowers one function. It owns that function's constant pool,
//! instruction stream and register allocator, and borrows the read-only
//! type context and builtin registry.

use crate::ast::Expr;
use crate::bytecode::{
    Constant, ConstantPool, Emitter, Instruction, Label, Opcode, Reg, RegisterAllocator,
};
use crate::config::CodegenConfig;
use crate::error::{CodegenError, CodegenResult};
use crate::stdlib::BuiltinRegistry;
use crate::types::{Type, TypeInfo};

pub struct CompilationContext<'a> {
    pub function_name: String,
    pub emitter: Emitter,
    pub constants: ConstantPool,
    pub registers: RegisterAllocator,
    pub types: &'a dyn TypeInfo,
    pub builtins: &'a BuiltinRegistry,
    pub config: &'a CodegenConfig,
}

impl<'a> CompilationContext<'a> {
    pub fn new(
        function_name: impl Into<String>,
        types: &'a dyn TypeInfo,
        builtins: &'a BuiltinRegistry,
        config: &'a CodegenConfig,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            emitter: Emitter::new(),
            constants: ConstantPool::new(),
            registers: RegisterAllocator::new(),
            types,
            builtins,
            config,
        }
    }

    // ===== Registers and scopes =====

    pub fn alloc(&mut self) -> CodegenResult<Reg> {
        self.registers.allocate()
    }

    pub fn free(&mut self, reg: Reg) {
        self.registers.free(reg);
    }

    pub fn push_scope(&mut self) {
        self.registers.push_scope();
    }

    pub fn pop_scope(&mut self) {
        self.registers.pop_scope();
    }

    pub fn define_local(&mut self, name: impl Into<String>, reg: Reg) {
        self.registers.define(name, reg);
    }

    pub fn resolve(&self, name: &str) -> CodegenResult<Reg> {
        self.registers.resolve(name)
    }

    // ===== Emission =====

    pub fn emit(&mut self, op: Opcode, a: Reg, b: u8, c: u8) {
        self.emitter.emit_abc(op, a, b, c);
    }

    pub fn emit_move(&mut self, dst: Reg, src: Reg) {
        self.emit(Opcode::Mov, dst, src, 0);
    }

    /// Emit an ABx instruction whose Bx is an index into the constant pool.
    pub fn emit_with_constant(
        &mut self,
        op: Opcode,
        a: Reg,
        constant: Constant,
    ) -> CodegenResult<()> {
        let index = self.constants.add(constant);
        self.emitter.emit_abx(op, a, index)?;
        Ok(())
    }

    /// `LOADK` into a fresh register.
    pub fn load_constant(&mut self, constant: Constant) -> CodegenResult<Reg> {
        let reg = self.alloc()?;
        self.emit_with_constant(Opcode::LoadK, reg, constant)?;
        Ok(reg)
    }

    pub fn new_label(&mut self) -> Label {
        self.emitter.new_label()
    }

    /// Bind `label` at the current address and patch its pending jumps.
    pub fn place(&mut self, label: Label) -> CodegenResult<()> {
        self.emitter.place(label)
    }

    pub fn jump(&mut self, label: Label) -> CodegenResult<()> {
        self.emitter.jump(label).map(|_| ())
    }

    pub fn jump_if_true(&mut self, cond: Reg, label: Label) -> CodegenResult<()> {
        self.emitter.jump_if_true(cond, label).map(|_| ())
    }

    pub fn jump_if_false(&mut self, cond: Reg, label: Label) -> CodegenResult<()> {
        self.emitter.jump_if_false(cond, label).map(|_| ())
    }

    // ===== Type context =====

    pub fn type_of(&self, expr: &Expr) -> CodegenResult<&'a Type> {
        self.types
            .type_of(expr.id)
            .ok_or(CodegenError::MissingType(expr.id.0))
    }

    pub fn class_of(&self, expr: &Expr) -> CodegenResult<&'a str> {
        self.types
            .class_of(expr.id)
            .ok_or(CodegenError::NotAClass(expr.id.0))
    }

    /// Whether `name` currently designates the builtin receiver, i.e. it is
    /// the configured receiver name and no local shadows it.
    pub fn is_builtin_receiver(&self, name: &str) -> bool {
        name == self.config.builtin_receiver && self.registers.lookup(name).is_none()
    }

    pub fn finish(self) -> CodegenResult<(Vec<Instruction>, ConstantPool, u16)> {
        let count = self.registers.register_count();
        let code = self.emitter.finish(&self.function_name)?;
        Ok((code, self.constants, count))
    }
}
