//! LS-8 memory subsystem.
//!
//! A single flat array of 256 bytes shared by program code, data and the
//! stack. There is no protection between the regions.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of addressable bytes.
pub const MEMORY_SIZE: usize = 256;

/// LS-8 memory: 256 eight-bit cells.
///
/// Serialized as a plain byte array. Deserializing rejects any array that
/// is not exactly [`MEMORY_SIZE`] bytes long.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<u8>", into = "Vec<u8>")]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a byte.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8, AddressError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(AddressError::Memory(addr))
    }

    /// Write a byte, overwriting whatever was there.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), AddressError> {
        let cell = self.cells
            .get_mut(addr)
            .ok_or(AddressError::Memory(addr))?;
        *cell = value;
        Ok(())
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy a program image into memory starting at `start_addr`.
    pub fn load(&mut self, start_addr: usize, program: &[u8]) -> Result<(), MemoryError> {
        let available = self.cells.len().saturating_sub(start_addr);
        if start_addr > self.cells.len() || program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        self.cells[start_addr..start_addr + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u8)> {
        let end = start.saturating_add(count).min(self.cells.len());
        (start.min(end)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }

    /// The whole memory as a slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<u8>> for Memory {
    type Error = MemoryError;

    fn try_from(cells: Vec<u8>) -> Result<Self, Self::Error> {
        if cells.len() != MEMORY_SIZE {
            return Err(MemoryError::WrongSize { size: cells.len() });
        }
        Ok(Self { cells })
    }
}

impl From<Memory> for Vec<u8> {
    fn from(mem: Memory) -> Self {
        mem.cells
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only count non-zero cells
        let non_zero = self.cells.iter().filter(|&&cell| cell != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// An access outside the memory array or the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum AddressError {
    #[error("memory address {0} out of range (0-255)")]
    Memory(usize),

    #[error("register index {0} out of range (0-7)")]
    Register(usize),
}

/// Errors raised while loading a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },

    #[error("memory image has {size} bytes, expected {}", MEMORY_SIZE)]
    WrongSize { size: usize },
}
