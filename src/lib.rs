//! # LS-8 Emulator
//!
//! An emulator for the LS-8, a small 8-bit register machine with 256 bytes
//! of memory, eight registers and an 18-instruction set.
//!
//! The [`cpu`] module is the machine itself. Everything else (program
//! images, the assembler, trace formatting and the front ends) talks to it
//! through [`Cpu::load_program`], [`Cpu::step`] and [`Cpu::snapshot`].

pub mod cpu;
pub mod asm;
pub mod trace;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, CpuState, CpuError, AddressError, Memory, Registers, Machine, Snapshot, Instruction, Opcode};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, LoadError, load_ls8, parse_ls8, save_ls8};
pub use trace::format_trace;

#[cfg(feature = "tui")]
pub use tui::run_debugger;
