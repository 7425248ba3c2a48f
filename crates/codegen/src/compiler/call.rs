//! Call lowering and the fixed-register calling convention
//!
//! Arguments travel in registers `0..argc`. Immediately before the call
//! instruction the caller moves each argument into its slot; any value in
//! that window that is still needed afterwards (a named local, a parameter,
//! a pending temporary) is first copied out above the window and moved back,
//! in reverse order, right after the call.

use crate::ast::{Expr, ExprKind};
use crate::bytecode::{Constant, Opcode, Reg};
use crate::compiler::class::{constructor_name, mangle};
use crate::compiler::context::CompilationContext;
use crate::compiler::expr::ExprCompiler;
use crate::error::{CodegenError, CodegenResult};
use smallvec::SmallVec;

type ArgRegs = SmallVec<[Reg; 8]>;

pub struct CallCompiler;

impl CallCompiler {
    pub fn compile_call(
        ctx: &mut CompilationContext,
        callee: &Expr,
        args: &[Expr],
    ) -> CodegenResult<Reg> {
        match &callee.kind {
            ExprKind::Field { target, field } => {
                if let ExprKind::Var(receiver) = &target.kind {
                    if ctx.is_builtin_receiver(receiver) {
                        return Self::compile_builtin(ctx, receiver, field, args);
                    }
                }
                Self::compile_method(ctx, target, field, args)
            }
            ExprKind::Var(name) => {
                let regs = Self::compile_args(ctx, ArgRegs::new(), args)?;
                let dst = Self::call_by_name(ctx, name, &regs, &[])?;
                Self::release(ctx, &regs);
                Ok(dst)
            }
            other => Err(CodegenError::UnsupportedCallee(format!("{:?}", other))),
        }
    }

    /// `ochev.Member(args)` lowers to `CALL_NATIVE dst, id, argc`.
    fn compile_builtin(
        ctx: &mut CompilationContext,
        receiver: &str,
        member: &str,
        args: &[Expr],
    ) -> CodegenResult<Reg> {
        let builtin = ctx
            .builtins
            .lookup(member)
            .ok_or_else(|| CodegenError::UnknownBuiltin {
                receiver: receiver.to_string(),
                member: member.to_string(),
            })?;

        let arity = builtin.arity();
        if !u8::try_from(args.len()).map_or(false, |n| arity.contains(&n)) {
            let expected = if arity.start() == arity.end() {
                arity.start().to_string()
            } else {
                format!("{}-{}", arity.start(), arity.end())
            };
            return Err(CodegenError::BuiltinArity {
                member: builtin.member(),
                expected,
                found: args.len(),
            });
        }

        let regs = Self::compile_args(ctx, ArgRegs::new(), args)?;
        let argc = arg_count(regs.len())?;
        let dst = ctx.alloc()?;

        Self::with_args_in_place(ctx, &regs, dst, &[], |ctx| {
            ctx.emit(Opcode::CallNative, dst, builtin.native_id(), argc);
            Ok(())
        })?;

        Self::release(ctx, &regs);
        Ok(dst)
    }

    /// `recv.m(args)` calls `Class.m(recv, args)`, with the class taken from
    /// the receiver's static type.
    fn compile_method(
        ctx: &mut CompilationContext,
        target: &Expr,
        method: &str,
        args: &[Expr],
    ) -> CodegenResult<Reg> {
        let obj = ExprCompiler::compile(ctx, target)?;
        let class = ctx.class_of(target)?;

        let mut first = ArgRegs::new();
        first.push(obj);
        let regs = Self::compile_args(ctx, first, args)?;

        let dst = Self::call_by_name(ctx, &mangle(class, method), &regs, &[])?;
        Self::release(ctx, &regs);
        Ok(dst)
    }

    /// `new C(args)`: allocate the instance, run `C.<init>(obj, args)` and
    /// yield the instance. The constructor's own result is dropped.
    pub fn compile_new(
        ctx: &mut CompilationContext,
        class: &str,
        args: &[Expr],
    ) -> CodegenResult<Reg> {
        let obj = ctx.alloc()?;
        ctx.emit_with_constant(Opcode::NewObj, obj, Constant::ClassRef(class.to_string()))?;

        let mut first = ArgRegs::new();
        first.push(obj);
        let regs = Self::compile_args(ctx, first, args)?;

        let ret = Self::call_by_name(ctx, &constructor_name(class), &regs, &[obj])?;
        ctx.free(ret);

        Self::release(ctx, &regs[1..]);
        Ok(obj)
    }

    fn compile_args(
        ctx: &mut CompilationContext,
        mut regs: ArgRegs,
        args: &[Expr],
    ) -> CodegenResult<ArgRegs> {
        for arg in args {
            regs.push(ExprCompiler::compile(ctx, arg)?);
        }
        Ok(regs)
    }

    fn release(ctx: &mut CompilationContext, regs: &[Reg]) {
        for &reg in regs {
            ctx.free(reg);
        }
    }

    /// `CALLK dst, FunctionRef(name, argc)` under the calling convention.
    fn call_by_name(
        ctx: &mut CompilationContext,
        name: &str,
        args: &[Reg],
        preserve: &[Reg],
    ) -> CodegenResult<Reg> {
        let argc = arg_count(args.len())?;
        let dst = ctx.alloc()?;
        let function = Constant::FunctionRef {
            name: name.to_string(),
            arity: argc as u32,
        };

        Self::with_args_in_place(ctx, args, dst, preserve, |ctx| {
            ctx.emit_with_constant(Opcode::CallK, dst, function)
        })?;
        Ok(dst)
    }

    /// Move `args` into `0..argc`, run `emit_call`, then restore the window.
    ///
    /// Registers in the window are saved when they hold anything still
    /// needed after the call: bound variables, live temporaries that are not
    /// plain arguments, and anything in `preserve`. An argument whose source
    /// slot is overwritten earlier in the placement sequence is read from
    /// its saved copy, or from a copy taken before placement starts.
    pub fn with_args_in_place(
        ctx: &mut CompilationContext,
        args: &[Reg],
        dst: Reg,
        preserve: &[Reg],
        emit_call: impl FnOnce(&mut CompilationContext) -> CodegenResult<()>,
    ) -> CodegenResult<()> {
        let argc = arg_count(args.len())?;
        let mut parked = ArgRegs::new();

        let needs_save: ArgRegs = (0..argc)
            .filter(|&slot| {
                if slot == dst || !ctx.registers.is_live(slot) {
                    return false;
                }
                let consumed = args.contains(&slot)
                    && !ctx.registers.is_bound(slot)
                    && !preserve.contains(&slot);
                !consumed
            })
            .collect();

        let mut saved: SmallVec<[(Reg, Reg); 8]> = SmallVec::new();
        for slot in needs_save {
            let tmp = Self::alloc_outside(ctx, argc, &mut parked)?;
            ctx.emit_move(tmp, slot);
            saved.push((slot, tmp));
        }

        let mut copies: SmallVec<[(Reg, Reg); 4]> = SmallVec::new();
        for (i, &src) in args.iter().enumerate() {
            let clobbered = (src as usize) < i;
            let covered = saved.iter().any(|&(slot, _)| slot == src)
                || copies.iter().any(|&(from, _)| from == src);
            if clobbered && !covered {
                let tmp = Self::alloc_outside(ctx, argc, &mut parked)?;
                ctx.emit_move(tmp, src);
                copies.push((src, tmp));
            }
        }

        for (i, &src) in args.iter().enumerate() {
            let from = if (src as usize) < i {
                saved
                    .iter()
                    .chain(copies.iter())
                    .find(|&&(orig, _)| orig == src)
                    .map_or(src, |&(_, tmp)| tmp)
            } else {
                src
            };
            ctx.emit_move(i as Reg, from);
        }

        emit_call(ctx)?;

        for &(slot, tmp) in saved.iter().rev() {
            ctx.emit_move(slot, tmp);
            ctx.free(tmp);
        }
        for &(_, tmp) in &copies {
            ctx.free(tmp);
        }
        for reg in parked {
            ctx.free(reg);
        }
        Ok(())
    }

    /// A fresh register at or above `floor`. Registers handed out below it
    /// are parked until the call sequence is finished.
    fn alloc_outside(
        ctx: &mut CompilationContext,
        floor: u8,
        parked: &mut ArgRegs,
    ) -> CodegenResult<Reg> {
        loop {
            let reg = ctx.alloc()?;
            if reg >= floor {
                return Ok(reg);
            }
            parked.push(reg);
        }
    }
}

fn arg_count(len: usize) -> CodegenResult<u8> {
    u8::try_from(len).map_err(|_| CodegenError::OperandOverflow {
        field: "argc",
        value: len as i64,
        bits: 8,
    })
}
