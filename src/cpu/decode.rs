//! Instruction decoder for the LS-8.
//!
//! Every instruction starts with a one-byte opcode. The opcode itself
//! carries its layout:
//!
//! ```text
//! AABCDDDD
//! ||||└┴┴┴─ instruction identifier
//! |||└───── (unused by this decoder)
//! ||└────── sets PC: the handler moves PC itself
//! |└─────── ALU operation
//! └┴─────── number of operands (0-2)
//! ```
//!
//! Operand bytes follow the opcode in memory and are register indices or
//! immediates depending on the instruction.

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Bit marking an opcode whose handler updates PC itself.
const SETS_PC_BIT: u8 = 0b0001_0000;

/// The closed LS-8 opcode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ==================== Control ====================

    /// Halt the CPU
    Hlt = 0b0000_0001,

    // ==================== Data Movement ====================

    /// Load immediate: reg := imm8
    Ldi = 0b1000_0010,

    /// Print a register as a decimal number
    Prn = 0b0100_0111,

    // ==================== ALU ====================

    Add = 0b1010_0000,
    Sub = 0b1010_0001,
    Mul = 0b1010_0010,
    /// Compare: FL.E := regA == regB
    Cmp = 0b1010_0111,
    And = 0b1010_1000,
    Not = 0b0110_1001,
    Or = 0b1010_1010,
    Xor = 0b1010_1011,

    // ==================== Stack ====================

    Push = 0b0100_0101,
    Pop = 0b0100_0110,

    // ==================== Control Transfer ====================

    /// Push return address, jump to reg
    Call = 0b0101_0000,
    /// Pop return address into PC
    Ret = 0b0001_0001,
    Jmp = 0b0101_0100,
    /// Jump if E is set
    Jeq = 0b0101_0101,
    /// Jump if E is clear
    Jne = 0b0101_0110,
}

impl Opcode {
    /// Every opcode the CPU understands.
    pub const ALL: [Opcode; 18] = [
        Opcode::Hlt,
        Opcode::Ldi,
        Opcode::Prn,
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Cmp,
        Opcode::And,
        Opcode::Not,
        Opcode::Or,
        Opcode::Xor,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Jmp,
        Opcode::Jeq,
        Opcode::Jne,
    ];

    /// Look up an opcode byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            0b0000_0001 => Opcode::Hlt,
            0b1000_0010 => Opcode::Ldi,
            0b0100_0111 => Opcode::Prn,
            0b1010_0000 => Opcode::Add,
            0b1010_0001 => Opcode::Sub,
            0b1010_0010 => Opcode::Mul,
            0b1010_0111 => Opcode::Cmp,
            0b1010_1000 => Opcode::And,
            0b0110_1001 => Opcode::Not,
            0b1010_1010 => Opcode::Or,
            0b1010_1011 => Opcode::Xor,
            0b0100_0101 => Opcode::Push,
            0b0100_0110 => Opcode::Pop,
            0b0101_0000 => Opcode::Call,
            0b0001_0001 => Opcode::Ret,
            0b0101_0100 => Opcode::Jmp,
            0b0101_0101 => Opcode::Jeq,
            0b0101_0110 => Opcode::Jne,
            _ => return None,
        };
        Some(op)
    }

    /// The encoded opcode byte.
    #[inline]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Number of operand bytes, from the top two bits.
    #[inline]
    pub const fn operand_count(self) -> usize {
        ((self.byte() >> 6) & 0b11) as usize
    }

    /// Total encoded length in bytes (1, 2 or 3).
    #[inline]
    pub const fn len(self) -> usize {
        self.operand_count() + 1
    }

    /// Whether the handler positions PC itself, so the loop must not advance it.
    #[inline]
    pub const fn sets_pc(self) -> bool {
        self.byte() & SETS_PC_BIT != 0
    }

    /// Assembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Ldi => "LDI",
            Opcode::Prn => "PRN",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Mul => "MUL",
            Opcode::Cmp => "CMP",
            Opcode::And => "AND",
            Opcode::Not => "NOT",
            Opcode::Or => "OR",
            Opcode::Xor => "XOR",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Call => "CALL",
            Opcode::Ret => "RET",
            Opcode::Jmp => "JMP",
            Opcode::Jeq => "JEQ",
            Opcode::Jne => "JNE",
        }
    }

    /// Parse a mnemonic, case-insensitively.
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction with the two bytes that follow it.
///
/// Both operands are always fetched; instructions with fewer operands
/// simply ignore the extra bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand_a: u8,
    pub operand_b: u8,
}

impl Instruction {
    /// The bytes this instruction actually occupies.
    pub fn encode(&self) -> Vec<u8> {
        [self.opcode.byte(), self.operand_a, self.operand_b][..self.opcode.len()].to_vec()
    }
}

/// Decode a three-byte fetch window.
pub fn decode(window: [u8; 3]) -> Result<Instruction, DecodeError> {
    let [byte, operand_a, operand_b] = window;
    let opcode = Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode(byte))?;

    Ok(Instruction {
        opcode,
        operand_a,
        operand_b,
    })
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),
}
