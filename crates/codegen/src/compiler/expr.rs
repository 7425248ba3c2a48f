//! Expression compilation to bytecode
//!
//! Every expression lowers into a register. Variable reads hand back the
//! variable's own register; everything else produces a temporary that the
//! caller releases once the value has been consumed.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::bytecode::{Constant, Opcode, Reg};
use crate::compiler::call::CallCompiler;
use crate::compiler::context::CompilationContext;
use crate::error::{CodegenError, CodegenResult};
use crate::types::Type;

pub struct ExprCompiler;

impl ExprCompiler {
    pub fn compile(ctx: &mut CompilationContext, expr: &Expr) -> CodegenResult<Reg> {
        match &expr.kind {
            ExprKind::Int(v) => ctx.load_constant(Constant::Int(*v)),
            ExprKind::Float(v) => ctx.load_constant(Constant::Float(*v)),
            ExprKind::Bool(v) => ctx.load_constant(Constant::Bool(*v)),
            ExprKind::Str(s) => ctx.load_constant(Constant::String(s.clone())),
            ExprKind::Var(name) => ctx.resolve(name),
            ExprKind::Unary { op, operand } => Self::compile_unary(ctx, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::And => Self::compile_and(ctx, lhs, rhs),
                BinaryOp::Or => Self::compile_or(ctx, lhs, rhs),
                _ => Self::compile_binary(ctx, *op, lhs, rhs),
            },
            ExprKind::Assign { target, value } => Self::compile_assign(ctx, target, value),
            ExprKind::Call { callee, args } => CallCompiler::compile_call(ctx, callee, args),
            ExprKind::Array(elems) => Self::compile_array(ctx, elems),
            ExprKind::Index { array, index } => Self::compile_index(ctx, array, index),
            ExprKind::Field { target, field } => Self::compile_field(ctx, target, field),
            ExprKind::New { class, args } => CallCompiler::compile_new(ctx, class, args),
        }
    }

    fn compile_unary(
        ctx: &mut CompilationContext,
        op: UnaryOp,
        operand: &Expr,
    ) -> CodegenResult<Reg> {
        let value = Self::compile(ctx, operand)?;
        let dst = ctx.alloc()?;

        match op {
            UnaryOp::Not => ctx.emit(Opcode::Not, dst, value, 0),
            UnaryOp::Neg => {
                // -x => 0 - x in the operand's own numeric type
                let (zero, sub) = if ctx.type_of(operand)?.is_float() {
                    (Constant::Float(0.0), Opcode::SubF)
                } else {
                    (Constant::Int(0), Opcode::SubI)
                };
                let zero = ctx.load_constant(zero)?;
                ctx.emit(sub, dst, zero, value);
                ctx.free(zero);
            }
        }

        ctx.free(value);
        Ok(dst)
    }

    fn compile_binary(
        ctx: &mut CompilationContext,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
    ) -> CodegenResult<Reg> {
        let lhs_ty = ctx.type_of(lhs)?;
        let rhs_ty = ctx.type_of(rhs)?;

        let mut l = Self::compile(ctx, lhs)?;
        let mut r = Self::compile(ctx, rhs)?;

        let want_float = (op.is_arithmetic() || op.is_ordering() || op.is_equality())
            && lhs_ty.is_numeric()
            && rhs_ty.is_numeric()
            && (lhs_ty.is_float() || rhs_ty.is_float());

        if want_float {
            if *lhs_ty == Type::Int {
                l = Self::promote(ctx, l)?;
            }
            if *rhs_ty == Type::Int {
                r = Self::promote(ctx, r)?;
            }
        }

        let opcode = binary_opcode(op, want_float).ok_or_else(|| {
            CodegenError::InvalidInstruction(format!("{:?} has no direct opcode", op))
        })?;
        let dst = ctx.alloc()?;
        ctx.emit(opcode, dst, l, r);

        ctx.free(l);
        ctx.free(r);
        Ok(dst)
    }

    /// `I2F` into a fresh register, releasing the int source.
    fn promote(ctx: &mut CompilationContext, reg: Reg) -> CodegenResult<Reg> {
        let promoted = ctx.alloc()?;
        ctx.emit(Opcode::I2F, promoted, reg, 0);
        ctx.free(reg);
        Ok(promoted)
    }

    /// `a && b`: `b` is evaluated only when `a` is true.
    fn compile_and(ctx: &mut CompilationContext, lhs: &Expr, rhs: &Expr) -> CodegenResult<Reg> {
        let short = ctx.new_label();
        let end = ctx.new_label();

        let dst = ctx.alloc()?;

        let l = Self::compile(ctx, lhs)?;
        ctx.jump_if_false(l, short)?;
        ctx.free(l);

        let r = Self::compile(ctx, rhs)?;
        ctx.emit_move(dst, r);
        ctx.free(r);
        ctx.jump(end)?;

        ctx.place(short)?;
        let f = ctx.load_constant(Constant::Bool(false))?;
        ctx.emit_move(dst, f);
        ctx.free(f);

        ctx.place(end)?;
        Ok(dst)
    }

    /// `a || b`: `b` is evaluated only when `a` is false.
    fn compile_or(ctx: &mut CompilationContext, lhs: &Expr, rhs: &Expr) -> CodegenResult<Reg> {
        let short = ctx.new_label();
        let end = ctx.new_label();

        let dst = ctx.alloc()?;

        let l = Self::compile(ctx, lhs)?;
        ctx.jump_if_true(l, short)?;
        ctx.free(l);

        let r = Self::compile(ctx, rhs)?;
        ctx.emit_move(dst, r);
        ctx.free(r);
        ctx.jump(end)?;

        ctx.place(short)?;
        let t = ctx.load_constant(Constant::Bool(true))?;
        ctx.emit_move(dst, t);
        ctx.free(t);

        ctx.place(end)?;
        Ok(dst)
    }

    fn compile_assign(
        ctx: &mut CompilationContext,
        target: &Expr,
        value: &Expr,
    ) -> CodegenResult<Reg> {
        let rhs = Self::compile(ctx, value)?;

        match &target.kind {
            ExprKind::Var(name) => {
                let dst = ctx.resolve(name)?;
                ctx.emit_move(dst, rhs);
                ctx.free(rhs);
                Ok(dst)
            }
            ExprKind::Index { array, index } => {
                let arr = Self::compile(ctx, array)?;
                let idx = Self::compile(ctx, index)?;
                ctx.emit(Opcode::SetElem, arr, idx, rhs);
                ctx.free(idx);
                ctx.free(rhs);
                Ok(arr)
            }
            ExprKind::Field { target: object, field } => {
                let obj = Self::compile(ctx, object)?;
                let field_ref = Self::load_field_ref(ctx, object, field)?;
                ctx.emit(Opcode::SetField, obj, field_ref, rhs);
                ctx.free(field_ref);
                ctx.free(rhs);
                Ok(obj)
            }
            _ => Err(CodegenError::InvalidAssignTarget),
        }
    }

    fn compile_array(ctx: &mut CompilationContext, elems: &[Expr]) -> CodegenResult<Reg> {
        let len = i32::try_from(elems.len()).map_err(|_| CodegenError::OperandOverflow {
            field: "array length",
            value: elems.len() as i64,
            bits: 32,
        })?;
        let size = ctx.load_constant(Constant::Int(len))?;
        let arr = ctx.alloc()?;
        ctx.emit(Opcode::NewArr, arr, size, 0);
        ctx.free(size);

        for (i, elem) in (0..len).zip(elems) {
            let idx = ctx.load_constant(Constant::Int(i))?;
            let value = Self::compile(ctx, elem)?;
            ctx.emit(Opcode::SetElem, arr, idx, value);
            ctx.free(idx);
            ctx.free(value);
        }

        Ok(arr)
    }

    fn compile_index(ctx: &mut CompilationContext, array: &Expr, index: &Expr) -> CodegenResult<Reg> {
        let arr = Self::compile(ctx, array)?;
        let idx = Self::compile(ctx, index)?;
        let dst = ctx.alloc()?;
        ctx.emit(Opcode::GetElem, dst, arr, idx);
        ctx.free(arr);
        ctx.free(idx);
        Ok(dst)
    }

    fn compile_field(ctx: &mut CompilationContext, target: &Expr, field: &str) -> CodegenResult<Reg> {
        let obj = Self::compile(ctx, target)?;
        let field_ref = Self::load_field_ref(ctx, target, field)?;
        let dst = ctx.alloc()?;
        ctx.emit(Opcode::GetField, dst, obj, field_ref);
        ctx.free(field_ref);
        ctx.free(obj);
        Ok(dst)
    }

    /// Load the `(class, field)` constant for a field of `target`, keyed by
    /// the target's static class.
    fn load_field_ref(
        ctx: &mut CompilationContext,
        target: &Expr,
        field: &str,
    ) -> CodegenResult<Reg> {
        let class = ctx.class_of(target)?;
        ctx.load_constant(Constant::FieldRef {
            class: class.to_string(),
            field: field.to_string(),
        })
    }
}

fn binary_opcode(op: BinaryOp, float: bool) -> Option<Opcode> {
    let opcode = match (op, float) {
        (BinaryOp::Add, false) => Opcode::AddI,
        (BinaryOp::Add, true) => Opcode::AddF,
        (BinaryOp::Sub, false) => Opcode::SubI,
        (BinaryOp::Sub, true) => Opcode::SubF,
        (BinaryOp::Mul, false) => Opcode::MulI,
        (BinaryOp::Mul, true) => Opcode::MulF,
        (BinaryOp::Div, false) => Opcode::DivI,
        (BinaryOp::Div, true) => Opcode::DivF,
        (BinaryOp::Mod, false) => Opcode::ModI,
        (BinaryOp::Mod, true) => Opcode::ModF,
        (BinaryOp::Lt, false) => Opcode::LtI,
        (BinaryOp::Lt, true) => Opcode::LtF,
        (BinaryOp::Le, false) => Opcode::LeI,
        (BinaryOp::Le, true) => Opcode::LeF,
        (BinaryOp::Gt, false) => Opcode::GtI,
        (BinaryOp::Gt, true) => Opcode::GtF,
        (BinaryOp::Ge, false) => Opcode::GeI,
        (BinaryOp::Ge, true) => Opcode::GeF,
        (BinaryOp::Eq, _) => Opcode::Eq,
        (BinaryOp::Ne, _) => Opcode::Ne,
        (BinaryOp::And | BinaryOp::Or, _) => return None,
    };
    Some(opcode)
}
