//! Statement compilation to bytecode

use crate::ast::{Block, Expr, IfBranch, Stmt, SwitchCase};
use crate::bytecode::{Constant, Opcode, VOID_REG};
use crate::compiler::context::CompilationContext;
use crate::compiler::expr::ExprCompiler;
use crate::error::CodegenResult;
use tracing::trace;

pub struct StmtCompiler;

impl StmtCompiler {
    pub fn compile(ctx: &mut CompilationContext, stmt: &Stmt) -> CodegenResult<()> {
        if ctx.config.trace_lowering {
            trace!(
                function = %ctx.function_name,
                pc = ctx.emitter.pc(),
                stmt = stmt_kind(stmt),
                "lowering statement"
            );
        }

        match stmt {
            Stmt::Block(block) => Self::compile_block(ctx, block),
            Stmt::VarDecl { name, init, .. } => Self::compile_var_decl(ctx, name, init.as_ref()),
            Stmt::Expr(expr) => {
                let reg = ExprCompiler::compile(ctx, expr)?;
                ctx.free(reg);
                Ok(())
            }
            Stmt::Return(value) => Self::compile_return(ctx, value.as_ref()),
            Stmt::If {
                branches,
                else_block,
            } => Self::compile_if(ctx, branches, else_block.as_ref()),
            Stmt::While { cond, body } => Self::compile_while(ctx, cond, body),
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => Self::compile_for(ctx, init.as_deref(), cond.as_ref(), update.as_ref(), body),
            Stmt::ForRange {
                var,
                from,
                to,
                body,
            } => Self::compile_for_range(ctx, var, from, to, body),
            Stmt::Switch {
                subject,
                cases,
                default,
            } => Self::compile_switch(ctx, subject, cases, default.as_ref()),
        }
    }

    pub fn compile_block(ctx: &mut CompilationContext, block: &Block) -> CodegenResult<()> {
        ctx.push_scope();
        let result = Self::compile_stmts(ctx, &block.stmts);
        ctx.pop_scope();
        result
    }

    pub fn compile_stmts(ctx: &mut CompilationContext, stmts: &[Stmt]) -> CodegenResult<()> {
        for stmt in stmts {
            Self::compile(ctx, stmt)?;
        }
        Ok(())
    }

    fn compile_var_decl(
        ctx: &mut CompilationContext,
        name: &str,
        init: Option<&Expr>,
    ) -> CodegenResult<()> {
        let dst = ctx.alloc()?;
        ctx.define_local(name, dst);

        if let Some(init) = init {
            let value = ExprCompiler::compile(ctx, init)?;
            ctx.emit_move(dst, value);
            ctx.free(value);
        }
        Ok(())
    }

    fn compile_return(ctx: &mut CompilationContext, value: Option<&Expr>) -> CodegenResult<()> {
        match value {
            Some(value) => {
                let reg = ExprCompiler::compile(ctx, value)?;
                ctx.emit(Opcode::Ret, reg, 0, 0);
                ctx.free(reg);
            }
            None => ctx.emit(Opcode::Ret, VOID_REG, 0, 0),
        }
        Ok(())
    }

    fn compile_if(
        ctx: &mut CompilationContext,
        branches: &[IfBranch],
        else_block: Option<&Block>,
    ) -> CodegenResult<()> {
        let end = ctx.new_label();

        for branch in branches {
            let next = ctx.new_label();

            let cond = ExprCompiler::compile(ctx, &branch.cond)?;
            ctx.jump_if_false(cond, next)?;
            ctx.free(cond);

            Self::compile_block(ctx, &branch.body)?;
            ctx.jump(end)?;

            ctx.place(next)?;
        }

        if let Some(else_block) = else_block {
            Self::compile_block(ctx, else_block)?;
        }

        ctx.place(end)
    }

    fn compile_while(ctx: &mut CompilationContext, cond: &Expr, body: &Block) -> CodegenResult<()> {
        let head = ctx.new_label();
        let exit = ctx.new_label();

        ctx.place(head)?;

        let cond = ExprCompiler::compile(ctx, cond)?;
        ctx.jump_if_false(cond, exit)?;
        ctx.free(cond);

        Self::compile_block(ctx, body)?;
        ctx.jump(head)?;

        ctx.place(exit)
    }

    fn compile_for(
        ctx: &mut CompilationContext,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Block,
    ) -> CodegenResult<()> {
        ctx.push_scope();
        let result = Self::compile_for_scoped(ctx, init, cond, update, body);
        ctx.pop_scope();
        result
    }

    fn compile_for_scoped(
        ctx: &mut CompilationContext,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        update: Option<&Expr>,
        body: &Block,
    ) -> CodegenResult<()> {
        if let Some(init) = init {
            Self::compile(ctx, init)?;
        }

        let head = ctx.new_label();
        let exit = ctx.new_label();

        ctx.place(head)?;

        // no condition: loop forever
        if let Some(cond) = cond {
            let cond = ExprCompiler::compile(ctx, cond)?;
            ctx.jump_if_false(cond, exit)?;
            ctx.free(cond);
        }

        Self::compile_block(ctx, body)?;

        if let Some(update) = update {
            let reg = ExprCompiler::compile(ctx, update)?;
            ctx.free(reg);
        }

        ctx.jump(head)?;
        ctx.place(exit)
    }

    /// `for x in from...to { body }` lowers as
    /// `x = from; while x < to { body; x = x + 1 }` with `to` re-evaluated
    /// on every iteration.
    fn compile_for_range(
        ctx: &mut CompilationContext,
        var: &str,
        from: &Expr,
        to: &Expr,
        body: &Block,
    ) -> CodegenResult<()> {
        ctx.push_scope();
        let result = Self::compile_for_range_scoped(ctx, var, from, to, body);
        ctx.pop_scope();
        result
    }

    fn compile_for_range_scoped(
        ctx: &mut CompilationContext,
        var: &str,
        from: &Expr,
        to: &Expr,
        body: &Block,
    ) -> CodegenResult<()> {
        let counter = ctx.alloc()?;
        ctx.define_local(var, counter);

        let start = ExprCompiler::compile(ctx, from)?;
        ctx.emit_move(counter, start);
        ctx.free(start);

        let head = ctx.new_label();
        let exit = ctx.new_label();

        ctx.place(head)?;

        let bound = ExprCompiler::compile(ctx, to)?;
        let cond = ctx.alloc()?;
        ctx.emit(Opcode::LtI, cond, counter, bound);
        ctx.free(bound);

        ctx.jump_if_false(cond, exit)?;
        ctx.free(cond);

        Self::compile_block(ctx, body)?;

        let one = ctx.load_constant(Constant::Int(1))?;
        let next = ctx.alloc()?;
        ctx.emit(Opcode::AddI, next, counter, one);
        ctx.emit_move(counter, next);
        ctx.free(one);
        ctx.free(next);

        ctx.jump(head)?;
        ctx.place(exit)
    }

    /// Sequential equality tests against the subject; the first matching
    /// case wins.
    fn compile_switch(
        ctx: &mut CompilationContext,
        subject: &Expr,
        cases: &[SwitchCase],
        default: Option<&Block>,
    ) -> CodegenResult<()> {
        let end = ctx.new_label();
        let subject = ExprCompiler::compile(ctx, subject)?;

        let case_labels: Vec<_> = cases.iter().map(|_| ctx.new_label()).collect();
        let default_label = ctx.new_label();

        for (case, &label) in cases.iter().zip(&case_labels) {
            let value = ExprCompiler::compile(ctx, &case.value)?;
            let matched = ctx.alloc()?;
            ctx.emit(Opcode::Eq, matched, subject, value);
            ctx.free(value);

            ctx.jump_if_true(matched, label)?;
            ctx.free(matched);
        }

        ctx.jump(default_label)?;

        for (case, &label) in cases.iter().zip(&case_labels) {
            ctx.place(label)?;
            Self::compile_block(ctx, &case.body)?;
            ctx.jump(end)?;
        }

        ctx.place(default_label)?;
        if let Some(default) = default {
            Self::compile_block(ctx, default)?;
        }

        ctx.place(end)?;
        ctx.free(subject);
        Ok(())
    }
}

fn stmt_kind(stmt: &Stmt) -> &'static str {
    match stmt {
        Stmt::Block(_) => "block",
        Stmt::VarDecl { .. } => "var",
        Stmt::Expr(_) => "expr",
        Stmt::Return(_) => "return",
        Stmt::If { .. } => "if",
        Stmt::While { .. } => "while",
        Stmt::For { .. } => "for",
        Stmt::ForRange { .. } => "for-range",
        Stmt::Switch { .. } => "switch",
    }
}
