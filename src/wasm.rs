//! WebAssembly bindings for the LS-8 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::Cpu;
use crate::asm::assembler::assemble;
use crate::asm::disasm::{disassemble_at, format_instruction};
use crate::asm::program::parse_ls8;
use crate::trace::{format_trace, snapshot_json};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly CPU wrapper.
#[wasm_bindgen]
pub struct WasmCpu {
    cpu: Cpu,
    program: Vec<u8>,
}

#[wasm_bindgen]
impl WasmCpu {
    /// Create a new CPU instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            program: Vec::new(),
        }
    }

    /// Load a program from `.ls8` text. Returns its size in bytes.
    #[wasm_bindgen]
    pub fn load_ls8(&mut self, source: &str) -> Result<usize, JsError> {
        let image = parse_ls8(source)
            .map_err(|e| JsError::new(&e.to_string()))?;
        self.load_bytes(image.bytes)
    }

    /// Load a program from assembly source code. Returns its size in bytes.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let bytes = assemble(source)
            .map_err(|e| JsError::new(&e.to_string()))?;
        self.load_bytes(bytes)
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let instr = self.cpu.step()
            .map_err(|e| JsError::new(&e.to_string()))?;

        Ok(format_instruction(&instr))
    }

    /// Run until halt or max cycles. Returns the total cycle count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        self.cpu.run_limited(u64::from(max_cycles))
            .map_err(|e| JsError::new(&e.to_string()))?;
        Ok(self.cpu.cycles)
    }

    /// Reset CPU to initial state with loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        // The program already fitted when it was first loaded
        let _ = self.cpu.load_program(&self.program);
    }

    /// Values printed by PRN since the last call.
    #[wasm_bindgen]
    pub fn take_output(&mut self) -> Vec<u8> {
        self.cpu.take_output()
    }

    /// Check if CPU is running.
    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> usize {
        self.cpu.machine.regs.pc
    }

    /// Get flag register.
    #[wasm_bindgen]
    pub fn fl(&self) -> u8 {
        self.cpu.machine.regs.fl
    }

    /// Get register R0-R7 (0 for an invalid index).
    #[wasm_bindgen]
    pub fn register(&self, index: usize) -> u8 {
        self.cpu.machine.get_register(index).unwrap_or(0)
    }

    /// Get state as string.
    #[wasm_bindgen]
    pub fn state(&self) -> String {
        format!("{:?}", self.cpu.state)
    }

    /// Get all of memory as a byte array.
    #[wasm_bindgen]
    pub fn memory(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.cpu.machine.mem.as_slice())
    }

    /// Disassemble the instruction at `addr`.
    #[wasm_bindgen]
    pub fn disassemble_at(&self, addr: usize) -> String {
        disassemble_at(self.cpu.machine.mem.as_slice(), addr).0
    }

    /// Classic one-line trace of the current state.
    #[wasm_bindgen]
    pub fn trace(&self) -> String {
        format_trace(&self.cpu.snapshot())
    }

    /// Current snapshot as a JSON string.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        snapshot_json(&self.cpu.snapshot())
            .map_err(|e| JsError::new(&e.to_string()))
    }
}

impl WasmCpu {
    fn load_bytes(&mut self, bytes: Vec<u8>) -> Result<usize, JsError> {
        let mut cpu = Cpu::new();
        cpu.load_program(&bytes)
            .map_err(|e| JsError::new(&e.to_string()))?;

        let len = bytes.len();
        self.cpu = cpu;
        self.program = bytes;
        Ok(len)
    }
}

impl Default for WasmCpu {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the program bytes.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u8>, JsError> {
    assemble(source).map_err(|e| JsError::new(&e.to_string()))
}
