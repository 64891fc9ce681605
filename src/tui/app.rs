//! Debugger application state and logic.

use crate::Cpu;
use crate::asm::disasm::disassemble_at;
use crate::cpu::memory::MEMORY_SIZE;
use std::collections::HashSet;

/// Printed values kept for the output panel.
const OUTPUT_HISTORY: usize = 64;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reset.
    pub program: Vec<u8>,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<usize>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Step past a breakpoint at the current PC on the next tick.
    resuming: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in 8-byte rows.
    pub mem_scroll: usize,
    /// Values printed by PRN, newest last.
    pub output: Vec<u8>,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(program: Vec<u8>) -> Self {
        let mut app = Self {
            cpu: Cpu::new(),
            program,
            breakpoints: HashSet::new(),
            running: false,
            resuming: false,
            should_quit: false,
            status: String::new(),
            mem_scroll: 0,
            output: Vec::new(),
        };
        app.reset();
        if !app.status.starts_with("Error") {
            app.status = "Ready. Press 's' to step, 'r' to run, 'q' to quit.".into();
        }
        app
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU halted after {} cycles", self.cpu.cycles);
            self.running = false;
            return;
        }

        let pc = self.cpu.machine.regs.pc;
        let (disasm, _) = disassemble_at(self.cpu.machine.mem.as_slice(), pc);
        match self.cpu.step() {
            Ok(_) => {
                self.status = format!("PC={:02X}: {}", pc, disasm);
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }

        self.output.extend(self.cpu.take_output());
        if self.output.len() > OUTPUT_HISTORY {
            let excess = self.output.len() - OUTPUT_HISTORY;
            self.output.drain(..excess);
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.resuming = true;
        self.status = "Running...".into();
    }

    /// Run one iteration of continuous execution.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        if !self.cpu.is_running() {
            self.running = false;
            self.status = format!("Halted after {} cycles", self.cpu.cycles);
            return;
        }

        // Check for breakpoint, except where the run started
        let pc = self.cpu.machine.regs.pc;
        let resuming = std::mem::take(&mut self.resuming);
        if !resuming && self.breakpoints.contains(&pc) {
            self.running = false;
            self.status = format!("Breakpoint at PC={:02X}", pc);
            return;
        }

        self.step();
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.machine.regs.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:02X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:02X}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu = Cpu::new();
        self.output.clear();
        self.running = false;
        self.resuming = false;
        self.status = match self.cpu.load_program(&self.program) {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Error: {}", e),
        };
    }

    /// Scroll the memory view, clamped to the last row.
    pub fn scroll_memory(&mut self, delta: isize) {
        let max_row = MEMORY_SIZE / 8 - 1;
        self.mem_scroll = self.mem_scroll.saturating_add_signed(delta).min(max_row);
    }

    /// Get disassembly starting a little before the current PC.
    ///
    /// Instructions are decoded forward from there, so lines before PC may
    /// be misaligned if they land in the middle of an instruction.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let mem = self.cpu.machine.mem.as_slice();
        let pc = self.cpu.machine.regs.pc;
        let mut addr = pc.saturating_sub(lines / 2).min(MEMORY_SIZE);

        let mut out = Vec::with_capacity(lines);
        while out.len() < lines && addr < MEMORY_SIZE {
            let (text, len) = disassemble_at(mem, addr);
            out.push((addr, text, addr == pc));
            addr += len.max(1);
        }
        out
    }
}

/// Run the debugger with a program.
pub fn run_debugger(program: Vec<u8>) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Create app
    let mut app = DebuggerApp::new(program);

    // Main loop
    loop {
        // Draw
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        // Handle input
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        _ => {}
                    }
                }
            }
        }

        // Tick for continuous running
        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // LDI R0,8 ; PRN R0 ; HLT
    const PRINT8: [u8; 6] = [0x82, 0, 8, 0x47, 0, 0x01];

    #[test]
    fn test_step_collects_output() {
        let mut app = DebuggerApp::new(PRINT8.to_vec());

        app.step();
        app.step();

        assert_eq!(app.output, vec![8]);
        assert!(app.status.contains("PRN R0"));
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = DebuggerApp::new(PRINT8.to_vec());
        app.step();
        app.toggle_breakpoint();
        app.reset();

        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(!app.running);
        assert_eq!(app.cpu.machine.regs.pc, 3);
        assert!(app.status.contains("Breakpoint"));
    }

    #[test]
    fn test_run_resumes_from_breakpoint() {
        let mut app = DebuggerApp::new(PRINT8.to_vec());
        app.toggle_breakpoint();

        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(app.cpu.is_halted());
        assert_eq!(app.output, vec![8]);
    }

    #[test]
    fn test_breakpoint_hit_again_after_resume() {
        // 0: LDI R0,3 ; 3: JMP R0 (loops on itself)
        let mut app = DebuggerApp::new(vec![0x82, 0, 3, 0x54, 0]);
        app.step();
        app.toggle_breakpoint();

        app.run();
        app.tick();
        app.tick();

        assert!(!app.running);
        assert_eq!(app.cpu.machine.regs.pc, 3);
        assert_eq!(app.cpu.cycles, 2);
        assert!(app.status.contains("Breakpoint"));
    }

    #[test]
    fn test_run_to_halt() {
        let mut app = DebuggerApp::new(PRINT8.to_vec());

        app.run();
        for _ in 0..10 {
            app.tick();
        }

        assert!(app.cpu.is_halted());
        assert!(!app.running);
    }

    #[test]
    fn test_disassembly_marks_pc() {
        let app = DebuggerApp::new(PRINT8.to_vec());
        let lines = app.get_disassembly(4);

        assert_eq!(lines[0], (0, "LDI R0, 8".to_string(), true));
        assert_eq!(lines[1], (3, "PRN R0".to_string(), false));
        assert_eq!(lines[2], (5, "HLT".to_string(), false));
    }

    #[test]
    fn test_scroll_clamps() {
        let mut app = DebuggerApp::new(PRINT8.to_vec());

        app.scroll_memory(-5);
        assert_eq!(app.mem_scroll, 0);

        app.scroll_memory(1000);
        assert_eq!(app.mem_scroll, 31);
    }
}
