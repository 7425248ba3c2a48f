//! Append-only instruction stream with label backpatching
//!
//! Structured control flow is linearized with [`Label`]s. A jump to a label
//! that is already bound gets its offset right away (loop heads); a jump to
//! an unbound label is emitted with a zero offset and remembered as a patch
//! site until the label is bound and patched (branch exits).

use super::instruction::Instruction;
use super::opcode::Opcode;
use super::register::Reg;
use crate::error::{CodegenError, CodegenResult};
use smallvec::SmallVec;

/// Handle to a jump target owned by an [`Emitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

#[derive(Debug, Default)]
struct LabelState {
    position: Option<usize>,
    patch_sites: SmallVec<[usize; 4]>,
}

#[derive(Debug, Default)]
pub struct Emitter {
    code: Vec<Instruction>,
    labels: Vec<LabelState>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the next instruction will occupy.
    pub fn pc(&self) -> usize {
        self.code.len()
    }

    pub fn code(&self) -> &[Instruction] {
        &self.code
    }

    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let at = self.code.len();
        self.code.push(instruction);
        at
    }

    pub fn emit_abc(&mut self, op: Opcode, a: Reg, b: u8, c: u8) -> usize {
        self.emit(Instruction::abc(op, a, b, c))
    }

    pub fn emit_abx(&mut self, op: Opcode, a: Reg, bx: usize) -> CodegenResult<usize> {
        Ok(self.emit(Instruction::abx(op, a, bx)?))
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.labels.len() as u32);
        self.labels.push(LabelState::default());
        label
    }

    /// Fix `label` at the current address.
    pub fn bind(&mut self, label: Label) -> CodegenResult<()> {
        let pc = self.pc();
        let state = self.state_mut(label);
        if let Some(position) = state.position {
            return Err(CodegenError::LabelAlreadyBound(position));
        }
        state.position = Some(pc);
        Ok(())
    }

    /// Rewrite every pending jump to `label` now that its address is known.
    pub fn patch(&mut self, label: Label) -> CodegenResult<()> {
        let state = &mut self.labels[label.0 as usize];
        let position = state.position.ok_or(CodegenError::LabelNotBound)?;
        let sites = std::mem::take(&mut state.patch_sites);

        for site in sites {
            let offset = relative_offset(site, position)?;
            self.code[site] = self.code[site].with_sbx(offset)?;
        }
        Ok(())
    }

    /// Bind `label` here and resolve every jump already waiting on it.
    pub fn place(&mut self, label: Label) -> CodegenResult<()> {
        self.bind(label)?;
        self.patch(label)
    }

    pub fn jump(&mut self, target: Label) -> CodegenResult<usize> {
        self.emit_jump(Opcode::Jmp, 0, target)
    }

    pub fn jump_if_true(&mut self, cond: Reg, target: Label) -> CodegenResult<usize> {
        self.emit_jump(Opcode::JmpT, cond, target)
    }

    pub fn jump_if_false(&mut self, cond: Reg, target: Label) -> CodegenResult<usize> {
        self.emit_jump(Opcode::JmpF, cond, target)
    }

    fn emit_jump(&mut self, op: Opcode, a: Reg, target: Label) -> CodegenResult<usize> {
        let at = self.pc();
        let position = self.state_mut(target).position;
        match position {
            Some(position) => {
                let offset = relative_offset(at, position)?;
                Ok(self.emit(Instruction::asbx(op, a, offset)?))
            }
            None => {
                self.state_mut(target).patch_sites.push(at);
                Ok(self.emit(Instruction::asbx(op, a, 0)?))
            }
        }
    }

    /// Jump sites still waiting on a label.
    pub fn unresolved_sites(&self) -> usize {
        self.labels.iter().map(|s| s.patch_sites.len()).sum()
    }

    /// Hand over the finished stream. Fails if any jump was never patched.
    pub fn finish(self, function: &str) -> CodegenResult<Vec<Instruction>> {
        let count = self.unresolved_sites();
        if count > 0 {
            return Err(CodegenError::UnresolvedJumps {
                function: function.to_string(),
                count,
            });
        }
        Ok(self.code)
    }

    fn state_mut(&mut self, label: Label) -> &mut LabelState {
        &mut self.labels[label.0 as usize]
    }
}

fn relative_offset(site: usize, target: usize) -> CodegenResult<i64> {
    let offset = target as i64 - (site as i64 + 1);
    if offset < i16::MIN as i64 || offset > i16::MAX as i64 {
        return Err(CodegenError::JumpOutOfRange { site, offset });
    }
    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nop(e: &mut Emitter) {
        e.emit_abc(Opcode::Nop, 0, 0, 0);
    }

    #[test]
    fn test_forward_jump_is_patched() {
        let mut e = Emitter::new();
        let exit = e.new_label();
        let site = e.jump_if_false(3, exit).unwrap();
        nop(&mut e);
        nop(&mut e);
        assert_eq!(e.unresolved_sites(), 1);
        assert_eq!(e.code()[site].sbx(), 0);

        e.place(exit).unwrap();
        assert_eq!(e.code()[site].sbx(), 2);
        assert_eq!(e.code()[site].a(), 3);
        assert_eq!(e.unresolved_sites(), 0);
    }

    #[test]
    fn test_backward_jump_is_immediate() {
        let mut e = Emitter::new();
        let head = e.new_label();
        e.bind(head).unwrap();
        nop(&mut e);
        nop(&mut e);
        let site = e.jump(head).unwrap();

        assert_eq!(e.code()[site].sbx(), -3);
        assert_eq!(e.code()[site].jump_target(site), Some(0));
        assert_eq!(e.unresolved_sites(), 0);
    }

    #[test]
    fn test_mixed_jumps_round_trip() {
        let mut e = Emitter::new();
        let head = e.new_label();
        let exit = e.new_label();
        e.bind(head).unwrap();
        let fwd = e.jump_if_false(0, exit).unwrap();
        nop(&mut e);
        let back = e.jump(head).unwrap();
        e.place(exit).unwrap();

        let code = e.finish("loop").unwrap();
        assert_eq!(code[fwd].jump_target(fwd), Some(3));
        assert_eq!(code[back].jump_target(back), Some(0));
    }

    #[test]
    fn test_double_bind_fails() {
        let mut e = Emitter::new();
        let l = e.new_label();
        e.bind(l).unwrap();
        nop(&mut e);
        assert!(matches!(e.bind(l), Err(CodegenError::LabelAlreadyBound(0))));
    }

    #[test]
    fn test_patch_before_bind_fails() {
        let mut e = Emitter::new();
        let l = e.new_label();
        e.jump(l).unwrap();
        assert!(matches!(e.patch(l), Err(CodegenError::LabelNotBound)));
    }

    #[test]
    fn test_patch_is_idempotent() {
        let mut e = Emitter::new();
        let l = e.new_label();
        let site = e.jump(l).unwrap();
        e.place(l).unwrap();
        e.patch(l).unwrap();
        assert_eq!(e.code()[site].sbx(), 0);
    }

    #[test]
    fn test_unresolved_jump_fails_finish() {
        let mut e = Emitter::new();
        let l = e.new_label();
        e.jump(l).unwrap();
        let err = e.finish("f").unwrap_err();
        assert!(matches!(err, CodegenError::UnresolvedJumps { count: 1, .. }));
    }

    #[test]
    fn test_offset_out_of_range() {
        let mut e = Emitter::new();
        let l = e.new_label();
        e.jump(l).unwrap();
        for _ in 0..40_000 {
            nop(&mut e);
        }
        e.bind(l).unwrap();
        assert!(matches!(
            e.patch(l),
            Err(CodegenError::JumpOutOfRange { site: 0, .. })
        ));
    }
}
