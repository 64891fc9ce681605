//! Machine state: memory plus registers, with the stack discipline on top.

use crate::cpu::memory::{AddressError, Memory, MemoryError};
use crate::cpu::registers::{Registers, REGISTER_COUNT};
use serde::{Serialize, Deserialize};

/// Read-only view of the machine for tracers and debuggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub pc: usize,
    pub fl: u8,
    pub registers: [u8; REGISTER_COUNT],
    /// Bytes at PC, PC+1 and PC+2; `None` past the end of memory.
    pub window: [Option<u8>; 3],
}

/// Everything an instruction can observe or modify.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Machine {
    pub regs: Registers,
    pub mem: Memory,
}

impl Machine {
    /// Zeroed memory, registers at power-on values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
    }

    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8, AddressError> {
        self.mem.read(addr)
    }

    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), AddressError> {
        self.mem.write(addr, value)
    }

    #[inline]
    pub fn get_register(&self, index: usize) -> Result<u8, AddressError> {
        self.regs.get(index)
    }

    #[inline]
    pub fn set_register(&mut self, index: usize, value: u8) -> Result<(), AddressError> {
        self.regs.set(index, value)
    }

    /// Copy a program image into memory.
    pub fn load(&mut self, addr: usize, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load(addr, program)
    }

    /// Decrement SP, then store `value` at the new top of stack.
    pub fn push(&mut self, value: u8) -> Result<(), AddressError> {
        let sp = self.regs.sp().wrapping_sub(1);
        self.regs.set_sp(sp);
        self.mem.write(usize::from(sp), value)
    }

    /// Load the top of stack, then increment SP.
    pub fn pop(&mut self) -> Result<u8, AddressError> {
        let sp = self.regs.sp();
        let value = self.mem.read(usize::from(sp))?;
        self.regs.set_sp(sp.wrapping_add(1));
        Ok(value)
    }

    pub fn snapshot(&self) -> Snapshot {
        let pc = self.regs.pc;
        let window = [0, 1, 2].map(|offset| self.mem.read(pc.saturating_add(offset)).ok());

        Snapshot {
            pc,
            fl: self.regs.fl,
            registers: self.regs.gpr,
            window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::STACK_START;

    #[test]
    fn test_push_decrements_before_write() {
        let mut m = Machine::new();

        m.push(0xAB).unwrap();

        assert_eq!(m.regs.sp(), STACK_START - 1);
        assert_eq!(m.read(usize::from(STACK_START - 1)).unwrap(), 0xAB);
        assert_eq!(m.read(usize::from(STACK_START)).unwrap(), 0);
    }

    #[test]
    fn test_pop_reads_before_increment() {
        let mut m = Machine::new();

        m.push(1).unwrap();
        m.push(2).unwrap();

        assert_eq!(m.pop().unwrap(), 2);
        assert_eq!(m.pop().unwrap(), 1);
        assert_eq!(m.regs.sp(), STACK_START);
    }

    #[test]
    fn test_stack_pointer_wraps() {
        let mut m = Machine::new();
        m.regs.set_sp(0);

        m.push(5).unwrap();
        assert_eq!(m.regs.sp(), 255);
        assert_eq!(m.read(255).unwrap(), 5);

        assert_eq!(m.pop().unwrap(), 5);
        assert_eq!(m.regs.sp(), 0);
    }

    #[test]
    fn test_snapshot_window() {
        let mut m = Machine::new();
        m.load(0, &[0x82, 0x00, 0x08]).unwrap();
        m.set_register(2, 17).unwrap();

        let snap = m.snapshot();
        assert_eq!(snap.pc, 0);
        assert_eq!(snap.window, [Some(0x82), Some(0x00), Some(0x08)]);
        assert_eq!(snap.registers[2], 17);
        assert_eq!(snap.registers[7], STACK_START);

        m.regs.pc = 254;
        assert_eq!(m.snapshot().window, [Some(0), Some(0), None]);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut m = Machine::new();
        m.load(0, &[1, 2, 3]).unwrap();
        let before = m.regs.clone();

        let _ = m.snapshot();

        assert_eq!(m.regs, before);
        assert_eq!(m.mem.as_slice()[..3], [1, 2, 3]);
    }
}
