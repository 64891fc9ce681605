//! Disassembler for LS-8 programs.
//!
//! Converts raw program bytes back to readable assembly.

use crate::cpu::decode::{Instruction, Opcode};

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the number of bytes it covers. Bytes that are not
/// a known opcode, or instructions cut off by the end of the slice, are
/// rendered as data.
pub fn disassemble_at(bytes: &[u8], addr: usize) -> (String, usize) {
    let Some(&byte) = bytes.get(addr) else {
        return (String::new(), 0);
    };

    match Opcode::from_byte(byte) {
        Some(op) if addr + op.len() <= bytes.len() => {
            let operand = |i: usize| bytes[addr + i];
            let instr = Instruction {
                opcode: op,
                operand_a: if op.len() > 1 { operand(1) } else { 0 },
                operand_b: if op.len() > 2 { operand(2) } else { 0 },
            };
            (format_instruction(&instr), op.len())
        }
        _ => (format!("DB {:#04x}", byte), 1),
    }
}

/// Disassemble a whole program image into a listing.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; ----------------\n\n");

    let mut addr = 0;
    while addr < bytes.len() {
        let (line, len) = disassemble_at(bytes, addr);
        let raw: Vec<String> = bytes[addr..addr + len]
            .iter()
            .map(|b| format!("{:08b}", b))
            .collect();
        output.push_str(&format!("{:02X}: {:<14} ; {}\n", addr, line, raw.join(" ")));
        addr += len;
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    let op = instr.opcode;
    match op {
        Opcode::Ldi => format!("{} R{}, {}", op, instr.operand_a, instr.operand_b),
        _ => match op.operand_count() {
            0 => op.mnemonic().to_string(),
            1 => format!("{} R{}", op, instr.operand_a),
            _ => format!("{} R{}, R{}", op, instr.operand_a, instr.operand_b),
        },
    }
}
