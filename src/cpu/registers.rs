//! LS-8 CPU registers.
//!
//! The LS-8 has:
//! - R0-R7: eight 8-bit general-purpose registers (R7 doubles as the stack pointer)
//! - PC: program counter
//! - FL: flag register, of which only the E (equal) bit is used

use crate::cpu::memory::AddressError;
use serde::{Serialize, Deserialize};

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Index of the register used as the stack pointer.
pub const SP: usize = 7;

/// Initial stack pointer value. The stack grows down from here.
pub const STACK_START: u8 = 0xF4;

/// FL bit set when the last CMP found its operands equal.
pub const FLAG_EQUAL: u8 = 0b0000_0001;

/// The LS-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    pub gpr: [u8; REGISTER_COUNT],

    /// Program counter. Kept wider than a byte so a run past the end of
    /// memory shows up as an address error on the next fetch.
    pub pc: usize,

    /// FL: only bit 0 (E) is ever set.
    pub fl: u8,
}

impl Registers {
    /// Create a register file in its power-on state.
    pub fn new() -> Self {
        let mut gpr = [0; REGISTER_COUNT];
        gpr[SP] = STACK_START;
        Self { gpr, pc: 0, fl: 0 }
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a general-purpose register.
    #[inline]
    pub fn get(&self, index: usize) -> Result<u8, AddressError> {
        self.gpr
            .get(index)
            .copied()
            .ok_or(AddressError::Register(index))
    }

    /// Write a general-purpose register.
    #[inline]
    pub fn set(&mut self, index: usize, value: u8) -> Result<(), AddressError> {
        let reg = self.gpr
            .get_mut(index)
            .ok_or(AddressError::Register(index))?;
        *reg = value;
        Ok(())
    }

    /// Current stack pointer.
    pub fn sp(&self) -> u8 {
        self.gpr[SP]
    }

    /// Overwrite the stack pointer.
    pub fn set_sp(&mut self, value: u8) {
        self.gpr[SP] = value;
    }

    /// Record the outcome of a comparison in FL.
    pub fn set_equal(&mut self, equal: bool) {
        self.fl = if equal { FLAG_EQUAL } else { 0 };
    }

    /// Whether the E flag is set.
    pub fn is_equal(&self) -> bool {
        self.fl & FLAG_EQUAL != 0
    }

    /// Advance the program counter by `len` bytes.
    pub fn advance_pc(&mut self, len: usize) {
        self.pc += len;
    }

    /// Set the program counter to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.pc = usize::from(addr);
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let regs = Registers::new();

        assert_eq!(regs.gpr[..SP], [0; 7]);
        assert_eq!(regs.sp(), 0xF4);
        assert_eq!(regs.pc, 0);
        assert_eq!(regs.fl, 0);
    }

    #[test]
    fn test_register_bounds() {
        let mut regs = Registers::new();

        regs.set(3, 99).unwrap();
        assert_eq!(regs.get(3).unwrap(), 99);

        assert_eq!(regs.get(8), Err(AddressError::Register(8)));
        assert_eq!(regs.set(200, 1), Err(AddressError::Register(200)));
    }

    #[test]
    fn test_equal_flag() {
        let mut regs = Registers::new();

        regs.set_equal(true);
        assert!(regs.is_equal());
        assert_eq!(regs.fl, 0b0000_0001);

        regs.set_equal(false);
        assert!(!regs.is_equal());
        assert_eq!(regs.fl, 0);
    }

    #[test]
    fn test_advance_pc() {
        let mut regs = Registers::new();
        regs.pc = 10;

        regs.advance_pc(3);
        assert_eq!(regs.pc, 13);

        regs.jump(0xF0);
        assert_eq!(regs.pc, 240);
    }
}
