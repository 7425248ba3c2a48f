//! Register allocation and scope tracking for bytecode generation
//!
//! Named variables live in a stack of lexical scopes; temporaries come from a
//! free list that hands back the most recently released register first. A
//! register bound by any live scope is never released as a temporary, and a
//! scope's registers become reusable only once the scope is popped.

use crate::error::{CodegenError, CodegenResult};
use indexmap::IndexMap;

/// Register operand as it appears in an instruction word.
pub type Reg = u8;

/// "No register": the operand of a valueless `RET` and similar void slots.
pub const VOID_REG: Reg = 255;

/// Highest register the allocator will hand out.
pub const REGISTER_CEILING: Reg = 250;

#[derive(Debug, Clone)]
pub struct RegisterAllocator {
    scopes: Vec<IndexMap<String, Reg>>,
    free_list: Vec<Reg>,
    is_free: [bool; 256],
    next_reg: u16,
}

impl RegisterAllocator {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            free_list: Vec::new(),
            is_free: [false; 256],
            next_reg: 0,
        }
    }

    pub fn allocate(&mut self) -> CodegenResult<Reg> {
        if let Some(reg) = self.free_list.pop() {
            self.is_free[reg as usize] = false;
            return Ok(reg);
        }

        if self.next_reg > REGISTER_CEILING as u16 {
            return Err(CodegenError::RegisterPressure {
                requested: self.next_reg,
                ceiling: REGISTER_CEILING,
            });
        }

        let reg = self.next_reg as Reg;
        self.next_reg += 1;
        Ok(reg)
    }

    /// Return `reg` to the free list. Does nothing for the void sentinel,
    /// for a register that is already free, or for one still bound by a live
    /// scope.
    pub fn free(&mut self, reg: Reg) {
        if reg == VOID_REG || self.is_free[reg as usize] || self.is_bound(reg) {
            return;
        }
        if reg as u16 >= self.next_reg {
            return;
        }
        self.is_free[reg as usize] = true;
        self.free_list.push(reg);
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(IndexMap::new());
    }

    /// Drop the innermost scope and release every register it owned, in
    /// declaration order.
    pub fn pop_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (_, reg) in scope {
                self.free(reg);
            }
        }
    }

    /// Bind `name` to `reg` in the innermost scope. Redeclaring a name in the
    /// same scope releases the register it previously held.
    pub fn define(&mut self, name: impl Into<String>, reg: Reg) {
        if self.scopes.is_empty() {
            self.push_scope();
        }
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if let Some(old) = scope.insert(name.into(), reg) {
            if old != reg {
                self.free(old);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Reg> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub fn resolve(&self, name: &str) -> CodegenResult<Reg> {
        self.lookup(name)
            .ok_or_else(|| CodegenError::UnknownVariable(name.to_string()))
    }

    /// Whether `reg` is held by a named variable in any live scope.
    pub fn is_bound(&self, reg: Reg) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.values().any(|&r| r == reg))
    }

    /// Whether `reg` currently holds a value: handed out and not yet freed.
    pub fn is_live(&self, reg: Reg) -> bool {
        (reg as u16) < self.next_reg && !self.is_free[reg as usize]
    }

    /// Number of distinct registers the function needs.
    pub fn register_count(&self) -> u16 {
        self.next_reg
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for RegisterAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_registers() {
        let mut alloc = RegisterAllocator::new();
        let r0 = alloc.allocate().unwrap();
        let r1 = alloc.allocate().unwrap();

        assert_eq!(r0, 0);
        assert_eq!(r1, 1);
        assert_eq!(alloc.register_count(), 2);
    }

    #[test]
    fn test_register_pressure() {
        let mut alloc = RegisterAllocator::new();
        for expected in 0..=REGISTER_CEILING {
            assert_eq!(alloc.allocate().unwrap(), expected);
        }

        let result = alloc.allocate();
        assert!(matches!(
            result,
            Err(CodegenError::RegisterPressure { requested: 251, .. })
        ));
    }

    #[test]
    fn test_free_list_is_lifo() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        let _c = alloc.allocate().unwrap();
        alloc.free(a);
        alloc.free(b);

        assert_eq!(alloc.allocate().unwrap(), b);
        assert_eq!(alloc.allocate().unwrap(), a);
        assert_eq!(alloc.allocate().unwrap(), 3);
        assert_eq!(alloc.register_count(), 4);
    }

    #[test]
    fn test_double_free_is_ignored() {
        let mut alloc = RegisterAllocator::new();
        let a = alloc.allocate().unwrap();
        alloc.free(a);
        alloc.free(a);
        alloc.free(VOID_REG);

        assert_eq!(alloc.allocate().unwrap(), a);
        assert_eq!(alloc.allocate().unwrap(), 1);
    }

    #[test]
    fn test_bound_registers_are_not_freed() {
        let mut alloc = RegisterAllocator::new();
        alloc.push_scope();
        let x = alloc.allocate().unwrap();
        alloc.define("x", x);

        alloc.free(x);
        assert!(alloc.is_live(x));
        assert_ne!(alloc.allocate().unwrap(), x);
    }

    #[test]
    fn test_scope_lookup_innermost_first() {
        let mut alloc = RegisterAllocator::new();
        alloc.push_scope();
        let outer = alloc.allocate().unwrap();
        alloc.define("x", outer);

        alloc.push_scope();
        let inner = alloc.allocate().unwrap();
        alloc.define("x", inner);
        assert_eq!(alloc.resolve("x").unwrap(), inner);

        alloc.pop_scope();
        assert_eq!(alloc.resolve("x").unwrap(), outer);
        assert!(alloc.resolve("y").is_err());
    }

    #[test]
    fn test_pop_scope_releases_locals() {
        let mut alloc = RegisterAllocator::new();
        alloc.push_scope();
        let p = alloc.allocate().unwrap();
        alloc.define("p", p);

        alloc.push_scope();
        let a = alloc.allocate().unwrap();
        alloc.define("a", a);
        let b = alloc.allocate().unwrap();
        alloc.define("b", b);
        assert_eq!(alloc.scope_depth(), 2);
        alloc.pop_scope();

        assert!(!alloc.is_live(a));
        assert!(!alloc.is_live(b));
        assert!(alloc.is_live(p));
        // b was released last, so it comes back first
        assert_eq!(alloc.allocate().unwrap(), b);
        assert_eq!(alloc.allocate().unwrap(), a);
        assert_eq!(alloc.register_count(), 3);
    }

    #[test]
    fn test_redefinition_releases_old_register() {
        let mut alloc = RegisterAllocator::new();
        alloc.push_scope();
        let first = alloc.allocate().unwrap();
        alloc.define("x", first);
        let second = alloc.allocate().unwrap();
        alloc.define("x", second);

        assert_eq!(alloc.resolve("x").unwrap(), second);
        assert!(!alloc.is_bound(first));
        assert_eq!(alloc.allocate().unwrap(), first);
    }
}
