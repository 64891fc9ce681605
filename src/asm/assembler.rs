//! Simple assembler for LS-8 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (# also works)
//! LABEL:              ; Define a label
//!     LDI R0, 8       ; Load immediate
//!     LDI R1, LABEL   ; Labels are valid immediates
//!     MUL R0, R1      ; Two-register ALU op
//!     CALL R1         ; Jumps and calls take a register
//!     HLT             ; Halt
//!
//!     ORG 0x40        ; Set origin address
//!     DB 42, 0b1010   ; Define data bytes
//! ```

use crate::cpu::decode::Opcode;
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::registers::REGISTER_COUNT;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a memory image starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// The assembler state.
struct Assembler {
    /// Current address (origin).
    current_addr: usize,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// Pending references: (address, label, source_line).
    pending: Vec<(usize, String, usize)>,
    /// Output image.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(|c: char| c == ';' || c == '#') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim();

        if line.is_empty() {
            return Ok(());
        }

        // Check for label definition
        if let Some((label, rest)) = line.split_once(':') {
            self.define_label(label.trim(), line_num)?;

            let rest = rest.trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        let valid = label.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label '{}'", label),
            });
        }

        let addr = u8::try_from(self.current_addr)
            .map_err(|_| AssemblerError::ProgramTooLarge { line: line_num })?;

        let key = label.to_uppercase();
        if self.symbols.insert(key.clone(), addr).is_some() {
            return Err(AssemblerError::DuplicateLabel { line: line_num, label: key });
        }
        Ok(())
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = line
            .split_once(char::is_whitespace)
            .unwrap_or((line, ""));
        let mnemonic = mnemonic.to_uppercase();
        let operands: Vec<&str> = if rest.trim().is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let [operand] = operands[..] else {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "ORG requires one address".into(),
                    });
                };
                let addr = self.parse_number(operand, line_num)?;
                self.current_addr = usize::try_from(addr)
                    .ok()
                    .filter(|a| *a < MEMORY_SIZE)
                    .ok_or(AssemblerError::ValueOutOfRange { line: line_num, value: addr })?;
            }

            "DB" | "DATA" => {
                if operands.is_empty() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "DB requires at least one value".into(),
                    });
                }
                for operand in operands {
                    let value = self.parse_immediate(operand, line_num)?;
                    self.emit(value, line_num)?;
                }
            }

            // Instructions
            _ => {
                let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic { line: line_num, mnemonic: mnemonic.clone() }
                })?;
                self.emit_instruction(opcode, &operands, line_num)?;
            }
        }

        Ok(())
    }

    fn emit_instruction(&mut self, opcode: Opcode, operands: &[&str], line_num: usize)
        -> Result<(), AssemblerError>
    {
        if operands.len() != opcode.operand_count() {
            return Err(AssemblerError::OperandCount {
                line: line_num,
                mnemonic: opcode.mnemonic(),
                expected: opcode.operand_count(),
                found: operands.len(),
            });
        }

        self.emit(opcode.byte(), line_num)?;

        for (i, operand) in operands.iter().enumerate() {
            // LDI is the only instruction with an immediate; everything else names registers
            let byte = if opcode == Opcode::Ldi && i == 1 {
                self.parse_immediate(operand, line_num)?
            } else {
                parse_register(operand, line_num)?
            };
            self.emit(byte, line_num)?;
        }

        Ok(())
    }

    /// A byte value or a label reference resolved in pass 2.
    fn parse_immediate(&mut self, operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
        let starts_like_number = operand
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '-');

        if starts_like_number {
            let value = self.parse_number(operand, line_num)?;
            return u8::try_from(value)
                .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value });
        }

        // Must be a label reference - store for pass 2
        self.pending.push((self.current_addr, operand.to_uppercase(), line_num));
        Ok(0) // Placeholder, patched in pass 2
    }

    fn parse_number(&self, operand: &str, line_num: usize) -> Result<i64, AssemblerError> {
        let invalid = |kind: &str| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid {} literal '{}'", kind, operand),
        };

        if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            return i64::from_str_radix(hex, 16).map_err(|_| invalid("hex"));
        }

        if let Some(bin) = operand.strip_prefix("0b").or_else(|| operand.strip_prefix("0B")) {
            return i64::from_str_radix(&bin.replace('_', ""), 2).map_err(|_| invalid("binary"));
        }

        operand.parse::<i64>().map_err(|_| invalid("decimal"))
    }

    fn emit(&mut self, byte: u8, line_num: usize) -> Result<(), AssemblerError> {
        if self.current_addr >= MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }
        if self.output.len() <= self.current_addr {
            self.output.resize(self.current_addr + 1, 0);
        }
        self.output[self.current_addr] = byte;
        self.current_addr += 1;
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (addr, label, line_num) in &self.pending {
            let value = self.symbols.get(label).ok_or_else(|| {
                AssemblerError::UndefinedLabel { line: *line_num, label: label.clone() }
            })?;
            self.output[*addr] = *value;
        }
        Ok(())
    }
}

/// Parse `R0`..`R7`.
fn parse_register(operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
    let index = operand
        .strip_prefix(|c: char| c == 'R' || c == 'r')
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| usize::from(*n) < REGISTER_COUNT);

    index.ok_or_else(|| AssemblerError::InvalidRegister {
        line: line_num,
        operand: operand.to_string(),
    })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("line {line}: {mnemonic} takes {expected} operand(s), found {found}")]
    OperandCount { line: usize, mnemonic: &'static str, expected: usize, found: usize },

    #[error("invalid register on line {line}: {operand}")]
    InvalidRegister { line: usize, operand: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program does not fit in memory (line {line})")]
    ProgramTooLarge { line: usize },
}
