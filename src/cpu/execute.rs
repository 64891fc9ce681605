//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::decode::{self, DecodeError, Instruction, Opcode};
use crate::cpu::machine::{Machine, Snapshot};
use crate::cpu::memory::{AddressError, MemoryError};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted, by HLT or after a fatal error.
    Halted,
}

/// The LS-8 CPU.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// Registers and memory.
    pub machine: Machine,
    /// Current execution state.
    pub state: CpuState,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Values printed by PRN and not yet collected.
    output: Vec<u8>,
}

impl Cpu {
    /// Create a new CPU with zeroed memory and power-on registers.
    pub fn new() -> Self {
        Self {
            machine: Machine::new(),
            state: CpuState::Running,
            cycles: 0,
            output: Vec::new(),
        }
    }

    /// Reset the CPU to initial state.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.output.clear();
    }

    /// Load a program into memory at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.load_program_at(0, program)
    }

    /// Load a program into memory at `addr`.
    pub fn load_program_at(&mut self, addr: usize, program: &[u8]) -> Result<(), MemoryError> {
        self.machine.load(addr, program)
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. Any error
    /// other than `NotRunning` leaves the CPU halted.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.cycle() {
            Ok(instr) => {
                self.cycles += 1;
                Ok(instr)
            }
            Err(e) => {
                tracing::warn!(pc = self.machine.regs.pc, error = %e, "fatal CPU error");
                self.state = CpuState::Halted;
                Err(e)
            }
        }
    }

    /// One fetch/decode/execute cycle.
    fn cycle(&mut self) -> Result<Instruction, CpuError> {
        let pc = self.machine.regs.pc;

        // Fetch a fixed three-byte window
        let window = [
            self.machine.read(pc)?,
            self.machine.read(pc + 1)?,
            self.machine.read(pc + 2)?,
        ];

        // Decode
        let instr = decode::decode(window).map_err(|e| match e {
            DecodeError::UnknownOpcode(opcode) => CpuError::UnknownInstruction { opcode, pc },
        })?;

        tracing::trace!(
            pc,
            op = %instr.opcode,
            a = instr.operand_a,
            b = instr.operand_b,
            "execute"
        );

        // Execute
        self.execute(instr)?;

        if !instr.opcode.sets_pc() {
            self.machine.regs.advance_pc(instr.opcode.len());
        }

        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        let a = usize::from(instr.operand_a);
        let b = usize::from(instr.operand_b);

        match instr.opcode {
            Opcode::Hlt => {
                tracing::debug!(pc = self.machine.regs.pc, "halt");
                self.state = CpuState::Halted;
            }

            // ==================== Data Movement ====================

            Opcode::Ldi => {
                self.machine.set_register(a, instr.operand_b)?;
            }

            Opcode::Prn => {
                let value = self.machine.get_register(a)?;
                tracing::debug!(register = a, value, "print");
                self.output.push(value);
            }

            // ==================== ALU ====================

            Opcode::Add => self.alu(a, b, u8::wrapping_add)?,
            Opcode::Sub => self.alu(a, b, u8::wrapping_sub)?,
            Opcode::Mul => self.alu(a, b, u8::wrapping_mul)?,
            Opcode::And => self.alu(a, b, |x, y| x & y)?,
            Opcode::Or => self.alu(a, b, |x, y| x | y)?,
            Opcode::Xor => self.alu(a, b, |x, y| x ^ y)?,

            Opcode::Not => {
                let value = self.machine.get_register(a)?;
                self.machine.set_register(a, !value)?;
            }

            Opcode::Cmp => {
                let lhs = self.machine.get_register(a)?;
                let rhs = self.machine.get_register(b)?;
                self.machine.regs.set_equal(lhs == rhs);
            }

            // ==================== Stack ====================

            Opcode::Push => {
                let value = self.machine.get_register(a)?;
                self.machine.push(value)?;
            }

            Opcode::Pop => {
                // Validate the destination before touching SP
                self.machine.get_register(a)?;
                let value = self.machine.pop()?;
                self.machine.set_register(a, value)?;
            }

            // ==================== Control Transfer ====================

            Opcode::Call => {
                let target = self.machine.get_register(a)?;
                let ret = self.machine.regs.pc + 2;
                let ret = u8::try_from(ret).map_err(|_| AddressError::Memory(ret))?;
                self.machine.push(ret)?;
                self.machine.regs.jump(target);
            }

            Opcode::Ret => {
                let ret = self.machine.pop()?;
                self.machine.regs.jump(ret);
            }

            Opcode::Jmp => {
                let target = self.machine.get_register(a)?;
                self.machine.regs.jump(target);
            }

            Opcode::Jeq => {
                let taken = self.machine.regs.is_equal();
                self.branch(a, taken)?;
            }

            Opcode::Jne => {
                let taken = !self.machine.regs.is_equal();
                self.branch(a, taken)?;
            }
        }

        Ok(())
    }

    /// Two-register arithmetic and logic: `R[a] = op(R[a], R[b])`.
    fn alu(&mut self, a: usize, b: usize, op: fn(u8, u8) -> u8) -> Result<(), CpuError> {
        let lhs = self.machine.get_register(a)?;
        let rhs = self.machine.get_register(b)?;
        self.machine.set_register(a, op(lhs, rhs))?;
        Ok(())
    }

    /// Conditional jump to the address in register `reg`, otherwise skip
    /// over the two-byte jump instruction.
    fn branch(&mut self, reg: usize, taken: bool) -> Result<(), CpuError> {
        let target = self.machine.get_register(reg)?;
        if taken {
            self.machine.regs.jump(target);
        } else {
            self.machine.regs.advance_pc(2);
        }
        Ok(())
    }

    /// Read-only view of the machine.
    pub fn snapshot(&self) -> Snapshot {
        self.machine.snapshot()
    }

    /// Values printed since the last call, oldest first.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Values printed and not yet taken.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.machine.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unknown instruction {opcode:#010b} at PC={pc}")]
    UnknownInstruction { opcode: u8, pc: usize },

    #[error("address error: {0}")]
    Address(#[from] AddressError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::{SP, STACK_START};
    use proptest::prelude::*;

    const HLT: u8 = 0b0000_0001;
    const LDI: u8 = 0b1000_0010;
    const PRN: u8 = 0b0100_0111;
    const ADD: u8 = 0b1010_0000;
    const SUB: u8 = 0b1010_0001;
    const MUL: u8 = 0b1010_0010;
    const CMP: u8 = 0b1010_0111;
    const AND: u8 = 0b1010_1000;
    const NOT: u8 = 0b0110_1001;
    const OR: u8 = 0b1010_1010;
    const XOR: u8 = 0b1010_1011;
    const PUSH: u8 = 0b0100_0101;
    const POP: u8 = 0b0100_0110;
    const CALL: u8 = 0b0101_0000;
    const RET: u8 = 0b0001_0001;
    const JMP: u8 = 0b0101_0100;
    const JEQ: u8 = 0b0101_0101;
    const JNE: u8 = 0b0101_0110;

    fn run_program(program: &[u8]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_program(program).unwrap();
        cpu.run().unwrap();
        cpu
    }

    fn reg(cpu: &Cpu, index: usize) -> u8 {
        cpu.machine.get_register(index).unwrap()
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[HLT]).unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.machine.regs.pc, 1);
    }

    #[test]
    fn test_step_after_halt() {
        let mut cpu = run_program(&[HLT]);

        assert_eq!(cpu.step(), Err(CpuError::NotRunning(CpuState::Halted)));
    }

    #[test]
    fn test_print8() {
        let mut cpu = run_program(&[
            0b1000_0010, 0, 8, // LDI R0,8
            0b0100_0111, 0,    // PRN R0
            0b0000_0001,       // HLT
        ]);

        assert_eq!(cpu.take_output(), vec![8]);
        assert!(cpu.is_halted());
        assert_eq!(cpu.cycles, 3);
    }

    #[test]
    fn test_mult() {
        let mut cpu = run_program(&[
            LDI, 0, 8,
            LDI, 1, 9,
            MUL, 0, 1,
            PRN, 0,
            HLT,
        ]);

        assert_eq!(cpu.take_output(), vec![72]);
    }

    #[test]
    fn test_alu_operations() {
        let cases = [
            (ADD, 200, 100, 44),
            (SUB, 5, 10, 251),
            (MUL, 16, 17, 16),
            (AND, 0b1100, 0b1010, 0b1000),
            (OR, 0b1100, 0b1010, 0b1110),
            (XOR, 0b1100, 0b1010, 0b0110),
        ];

        for (op, x, y, expected) in cases {
            let cpu = run_program(&[LDI, 2, x, LDI, 3, y, op, 2, 3, HLT]);
            assert_eq!(reg(&cpu, 2), expected, "opcode {op:#010b}");
            assert_eq!(reg(&cpu, 3), y);
        }
    }

    #[test]
    fn test_not() {
        let cpu = run_program(&[LDI, 4, 0b0000_1111, NOT, 4, HLT]);
        assert_eq!(reg(&cpu, 4), 0b1111_0000);
    }

    #[test]
    fn test_cmp_equal_zero_and_nonzero() {
        let cpu = run_program(&[CMP, 0, 1, HLT]);
        assert_eq!(cpu.machine.regs.fl, 1);

        let cpu = run_program(&[LDI, 0, 42, LDI, 1, 42, CMP, 0, 1, HLT]);
        assert_eq!(cpu.machine.regs.fl, 1);

        let cpu = run_program(&[LDI, 0, 42, LDI, 1, 43, CMP, 0, 1, HLT]);
        assert_eq!(cpu.machine.regs.fl, 0);
    }

    #[test]
    fn test_push_pop() {
        let cpu = run_program(&[
            LDI, 0, 1,
            LDI, 1, 2,
            PUSH, 0,
            PUSH, 1,
            POP, 0,
            POP, 1,
            HLT,
        ]);

        assert_eq!(reg(&cpu, 0), 2);
        assert_eq!(reg(&cpu, 1), 1);
        assert_eq!(reg(&cpu, SP), STACK_START);
    }

    #[test]
    fn test_call_ret() {
        // 0: LDI R1,10
        // 3: CALL R1
        // 5: PRN R0
        // 7: HLT
        // 10: LDI R0,99 ; RET
        let mut program = vec![LDI, 1, 10, CALL, 1, PRN, 0, HLT, 0, 0];
        program.extend_from_slice(&[LDI, 0, 99, RET]);

        let mut cpu = run_program(&program);

        assert_eq!(cpu.take_output(), vec![99]);
        assert_eq!(cpu.machine.regs.pc, 8);
        assert_eq!(reg(&cpu, SP), STACK_START);
    }

    #[test]
    fn test_call_pushes_return_address() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 1, 20, CALL, 1]).unwrap();

        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.machine.regs.pc, 20);
        assert_eq!(cpu.machine.read(usize::from(STACK_START - 1)).unwrap(), 5);
    }

    #[test]
    fn test_jmp() {
        // 0: LDI R0,7 ; 3: JMP R0 ; 5: PRN R0 (skipped) ; 7: HLT
        let mut cpu = run_program(&[LDI, 0, 7, JMP, 0, PRN, 0, HLT]);

        assert!(cpu.take_output().is_empty());
        assert_eq!(cpu.cycles, 3);
    }

    #[test]
    fn test_jeq_jne_follow_flag() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 2, 100, CMP, 0, 1, JEQ, 2, JNE, 2]).unwrap();
        for _ in 0..3 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.machine.regs.pc, 100, "JEQ taken when equal");

        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 2, 100, CMP, 0, 1, JNE, 2, HLT]).unwrap();
        for _ in 0..3 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.machine.regs.pc, 8, "JNE falls through when equal");

        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 2, 100, LDI, 1, 1, CMP, 0, 1, JEQ, 2, HLT]).unwrap();
        for _ in 0..4 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.machine.regs.pc, 11, "JEQ falls through when not equal");

        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 2, 100, LDI, 1, 1, CMP, 0, 1, JNE, 2, HLT]).unwrap();
        for _ in 0..4 {
            cpu.step().unwrap();
        }
        assert_eq!(cpu.machine.regs.pc, 100, "JNE taken when not equal");
    }

    #[test]
    fn test_unknown_instruction() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[0xFF]).unwrap();

        let err = cpu.run().unwrap_err();

        assert_eq!(err, CpuError::UnknownInstruction { opcode: 0xFF, pc: 0 });
        assert!(cpu.is_halted());
        assert_eq!(cpu.cycles, 0);
    }

    #[test]
    fn test_unknown_instruction_reports_pc() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 0, 1, 0x00]).unwrap();

        let err = cpu.run().unwrap_err();

        assert_eq!(err, CpuError::UnknownInstruction { opcode: 0x00, pc: 3 });
    }

    #[test]
    fn test_fetch_past_end_of_memory() {
        let mut cpu = Cpu::new();
        cpu.load_program_at(254, &[HLT]).unwrap();
        cpu.machine.regs.pc = 254;

        let err = cpu.step().unwrap_err();

        assert_eq!(err, CpuError::Address(AddressError::Memory(256)));
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_bad_register_operand() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 8, 1, HLT]).unwrap();

        let err = cpu.run().unwrap_err();

        assert_eq!(err, CpuError::Address(AddressError::Register(8)));
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_alu_bad_register_is_address_error() {
        for op in [ADD, SUB, MUL, AND, OR, XOR] {
            let mut cpu = Cpu::new();
            cpu.load_program(&[LDI, 0, 5, op, 0, 9, HLT]).unwrap();

            let err = cpu.run().unwrap_err();

            assert_eq!(err, CpuError::Address(AddressError::Register(9)), "opcode {op:#010b}");
            assert_eq!(reg(&cpu, 0), 5);
            assert!(cpu.is_halted());
        }
    }

    #[test]
    fn test_pop_into_bad_register_leaves_sp() {
        let mut cpu = Cpu::new();
        cpu.load_program(&[POP, 9]).unwrap();

        assert!(cpu.step().is_err());
        assert_eq!(reg(&cpu, SP), STACK_START);
    }

    #[test]
    fn test_run_limited() {
        // 0: LDI R0,3 ; 3: JMP R0 (spins forever)
        let mut cpu = Cpu::new();
        cpu.load_program(&[LDI, 0, 3, JMP, 0]).unwrap();

        let executed = cpu.run_limited(10).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_reset() {
        let mut cpu = run_program(&[LDI, 0, 8, PRN, 0, HLT]);

        cpu.reset();

        assert!(cpu.is_running());
        assert_eq!(cpu.cycles, 0);
        assert!(cpu.output().is_empty());
        assert_eq!(cpu.machine.read(0).unwrap(), 0);
        assert_eq!(reg(&cpu, SP), STACK_START);
    }

    proptest! {
        #[test]
        fn prop_add_wraps(a in 0usize..8, b in 0usize..8, v1: u8, v2: u8) {
            prop_assume!(a != b);
            let cpu = run_program(&[LDI, a as u8, v1, LDI, b as u8, v2, ADD, a as u8, b as u8, HLT]);
            prop_assert_eq!(reg(&cpu, a), v1.wrapping_add(v2));
        }

        #[test]
        fn prop_add_same_register_doubles(r in 0usize..8, v: u8) {
            let cpu = run_program(&[LDI, r as u8, v, ADD, r as u8, r as u8, HLT]);
            prop_assert_eq!(reg(&cpu, r), v.wrapping_add(v));
        }

        #[test]
        fn prop_cmp_sets_equal(v1: u8, v2: u8) {
            let cpu = run_program(&[LDI, 0, v1, LDI, 1, v2, CMP, 0, 1, HLT]);
            prop_assert_eq!(cpu.machine.regs.fl, u8::from(v1 == v2));
        }

        #[test]
        fn prop_push_pop_roundtrip(v: u8) {
            let cpu = run_program(&[LDI, 0, v, PUSH, 0, LDI, 0, 0, POP, 0, HLT]);
            prop_assert_eq!(reg(&cpu, 0), v);
            prop_assert_eq!(reg(&cpu, SP), STACK_START);
        }

        #[test]
        fn prop_call_ret_resumes_after_call(target in 20u8..200) {
            // 0: LDI R1,target ; 3: CALL R1 ; 5: HLT ; target: RET
            let mut cpu = Cpu::new();
            cpu.load_program(&[LDI, 1, target, CALL, 1, HLT]).unwrap();
            cpu.machine.write(usize::from(target), RET).unwrap();

            cpu.step().unwrap();
            cpu.step().unwrap();
            prop_assert_eq!(cpu.machine.regs.pc, usize::from(target));
            cpu.step().unwrap();
            prop_assert_eq!(cpu.machine.regs.pc, 5);
            prop_assert_eq!(cpu.run().unwrap(), 1);
        }

        #[test]
        fn prop_stepping_matches_run(values in proptest::collection::vec(any::<u8>(), 1..6)) {
            let mut program = Vec::new();
            for v in &values {
                program.extend_from_slice(&[LDI, 0, *v, LDI, 1, 3, MUL, 0, 1, PUSH, 0, PRN, 0]);
            }
            program.push(HLT);

            let mut ran = Cpu::new();
            ran.load_program(&program).unwrap();
            ran.run().unwrap();

            let mut stepped = Cpu::new();
            stepped.load_program(&program).unwrap();
            while stepped.is_running() {
                stepped.step().unwrap();
            }

            prop_assert_eq!(ran.snapshot(), stepped.snapshot());
            prop_assert_eq!(ran.cycles, stepped.cycles);
            prop_assert_eq!(ran.take_output(), stepped.take_output());
        }
    }
}
