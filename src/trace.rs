//! Trace formatting for CPU snapshots.
//!
//! The CPU only exposes [`Snapshot`]; layout is decided here.

use crate::cpu::Snapshot;
use std::fmt::Write;

/// One trace line:
///
/// ```text
/// TRACE: 00 | 82 00 08 | FL 00 | 00 00 00 00 00 00 00 F4
/// ```
///
/// Bytes past the end of memory print as `--`.
pub fn format_trace(snap: &Snapshot) -> String {
    let mut line = format!("TRACE: {:02X} |", snap.pc);

    for byte in snap.window {
        let _ = match byte {
            Some(b) => write!(line, " {:02X}", b),
            None => write!(line, " --"),
        };
    }

    let _ = write!(line, " | FL {:02X} |", snap.fl);

    for reg in snap.registers {
        let _ = write!(line, " {:02X}", reg);
    }

    line
}

/// The snapshot as a JSON object.
pub fn snapshot_json(snap: &Snapshot) -> serde_json::Result<String> {
    serde_json::to_string(snap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cpu;

    #[test]
    fn test_trace_line() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0x82, 0x00, 0x08, 0x47, 0x00, 0x01]).unwrap();

        assert_eq!(
            format_trace(&cpu.snapshot()),
            "TRACE: 00 | 82 00 08 | FL 00 | 00 00 00 00 00 00 00 F4"
        );

        cpu.step().unwrap();
        assert_eq!(
            format_trace(&cpu.snapshot()),
            "TRACE: 03 | 47 00 01 | FL 00 | 08 00 00 00 00 00 00 F4"
        );
    }

    #[test]
    fn test_trace_at_top_of_memory() {
        let mut cpu = Cpu::new();
        cpu.machine.regs.pc = 255;

        assert!(format_trace(&cpu.snapshot()).starts_with("TRACE: FF | 00 -- -- |"));
    }

    #[test]
    fn test_snapshot_json() {
        let cpu = Cpu::new();
        let json = snapshot_json(&cpu.snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["pc"], 0);
        assert_eq!(value["registers"][7], 244);
        assert_eq!(value["window"][0], 0);
    }
}
