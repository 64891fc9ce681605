//! Program tooling for the LS-8.
//!
//! This module provides:
//! - `.ls8` program image loading and saving
//! - A simple two-pass assembler (text → program bytes)
//! - A disassembler (program bytes → readable text)

pub mod assembler;
pub mod disasm;
pub mod program;

pub use assembler::{assemble, AssemblerError};
pub use disasm::disassemble;
pub use program::{ProgramImage, LoadError, load_ls8, parse_ls8, save_ls8};
