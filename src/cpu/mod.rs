//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 bytes of memory shared by code, data and stack
//! - 8 registers R0-R7 (R7 is the stack pointer), PC and FL
//! - 18-instruction set whose opcodes encode their own length

pub mod memory;
pub mod registers;
pub mod machine;
pub mod decode;
pub mod execute;

pub use memory::{Memory, AddressError, MemoryError};
pub use registers::Registers;
pub use machine::{Machine, Snapshot};
pub use decode::{Instruction, Opcode, DecodeError};
pub use execute::{Cpu, CpuError, CpuState};
