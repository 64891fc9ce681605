//! LS-8 Emulator - CLI Entry Point
//!
//! Commands:
//! - `ls8-emu run <program>` - Run an `.ls8` or `.asm` file
//! - `ls8-emu debug <program>` - Interactive debugger
//! - `ls8-emu asm <source>` - Assemble to `.ls8`
//! - `ls8-emu disasm <program>` - Disassemble an `.ls8` file
//! - `ls8-emu test` - Built-in self-test

use clap::{ArgAction, Parser, Subcommand};
use ls8::{Cpu, CpuError};
use tracing_subscriber::EnvFilter;

/// Exit code for a program that could not be read, parsed or loaded.
const EXIT_LOAD: i32 = 1;
/// Exit code for an unrecognised opcode.
const EXIT_UNKNOWN_INSTRUCTION: i32 = 2;
/// Exit code for a memory or register address outside its range.
const EXIT_ADDRESS: i32 = 3;

#[derive(Parser)]
#[command(name = "ls8-emu")]
#[command(version)]
#[command(about = "An emulator for the LS-8 8-bit register machine")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the .ls8 or .asm file to execute
        program: String,
        /// Maximum number of instructions to run (default: 100000)
        #[arg(short, long, default_value = "100000")]
        max_cycles: u64,
        /// Print a trace line before every instruction
        #[arg(short, long)]
        trace: bool,
        /// Print the final machine state as JSON
        #[arg(long)]
        json: bool,
        /// Address the program is loaded at
        #[arg(short, long, default_value = "0", value_parser = clap::value_parser!(u8))]
        load_address: u8,
    },
    /// Interactive debugger
    Debug {
        /// Path to the .ls8 or .asm file to debug
        program: String,
    },
    /// Assemble source to .ls8
    Asm {
        /// Path to the source file
        source: String,
        /// Output .ls8 file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble an .ls8 file to readable text
    Disasm {
        /// Path to the .ls8 file
        program: String,
    },
    /// Run the built-in self-test
    Test,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Run { program, max_cycles, trace, json, load_address }) => {
            run_program(&program, max_cycles, trace, json, usize::from(load_address));
        }
        Some(Commands::Debug { program }) => {
            debug_program(&program);
        }
        Some(Commands::Asm { source, output }) => {
            assemble_file(&source, output);
        }
        Some(Commands::Disasm { program }) => {
            disassemble_file(&program);
        }
        Some(Commands::Test) => {
            run_self_test();
        }
        None => {
            println!("LS-8 Emulator v{}", env!("CARGO_PKG_VERSION"));
            println!("An 8-bit register machine emulator");
            println!();
            println!("Use --help for available commands");
            println!();
            demo_programs();
        }
    }
}

/// Logs go to stderr so they never mix with PRN output.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read a program image, assembling `.asm` sources on the way.
fn read_program(path: &str) -> Vec<u8> {
    use ls8::{assemble, load_ls8};

    if path.ends_with(".asm") {
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("❌ Failed to read file: {}", e);
                std::process::exit(EXIT_LOAD);
            }
        };

        match assemble(&source) {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("❌ Assembly error: {}", e);
                std::process::exit(EXIT_LOAD);
            }
        }
    } else {
        match load_ls8(path) {
            Ok(image) => image.bytes,
            Err(e) => {
                eprintln!("❌ Failed to load {}: {}", path, e);
                std::process::exit(EXIT_LOAD);
            }
        }
    }
}

fn exit_code(err: &CpuError) -> i32 {
    match err {
        CpuError::UnknownInstruction { .. } => EXIT_UNKNOWN_INSTRUCTION,
        CpuError::Address(_) => EXIT_ADDRESS,
        CpuError::NotRunning(_) => EXIT_LOAD,
    }
}

fn run_program(path: &str, max_cycles: u64, trace: bool, json: bool, load_address: usize) {
    use ls8::format_trace;
    use ls8::trace::snapshot_json;

    let program = read_program(path);
    tracing::info!(path, bytes = program.len(), load_address, "program loaded");

    let mut cpu = Cpu::new();
    if let Err(e) = cpu.load_program_at(load_address, &program) {
        eprintln!("❌ Failed to load program: {}", e);
        std::process::exit(EXIT_LOAD);
    }
    cpu.machine.regs.pc = load_address;

    while cpu.is_running() && cpu.cycles < max_cycles {
        if trace {
            println!("{}", format_trace(&cpu.snapshot()));
        }

        let result = cpu.step();

        for value in cpu.take_output() {
            println!("{}", value);
        }

        if let Err(e) = result {
            eprintln!("❌ {}", e);
            std::process::exit(exit_code(&e));
        }
    }

    if cpu.is_running() {
        eprintln!("⚠️  Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }

    if json {
        match snapshot_json(&cpu.snapshot()) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("❌ Failed to serialize state: {}", e),
        }
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str) {
    use ls8::run_debugger;

    let program = read_program(path);

    if let Err(e) = run_debugger(program) {
        eprintln!("❌ Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &str) {
    eprintln!("❌ This build has no debugger; rebuild with the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(source_path: &str, output: Option<String>) {
    use ls8::{assemble, save_ls8, ProgramImage};

    let out_path = output.unwrap_or_else(|| {
        std::path::Path::new(source_path)
            .with_extension("ls8")
            .to_string_lossy()
            .into_owned()
    });

    println!("📝 Assembling: {} → {}", source_path, out_path);

    let source = match std::fs::read_to_string(source_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ Failed to read file: {}", e);
            std::process::exit(EXIT_LOAD);
        }
    };

    let bytes = match assemble(&source) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("❌ Assembly error: {}", e);
            std::process::exit(EXIT_LOAD);
        }
    };

    println!("✓ Assembled {} bytes", bytes.len());

    if let Err(e) = save_ls8(&out_path, &ProgramImage::from_bytes(bytes)) {
        eprintln!("❌ Failed to save program: {}", e);
        std::process::exit(EXIT_LOAD);
    }

    println!("✓ Saved to {}", out_path);
}

fn disassemble_file(path: &str) {
    use ls8::disassemble;

    let program = read_program(path);
    println!("{}", disassemble(&program));
}

/// The two classic first programs.
fn demo_programs() {
    use ls8::disassemble;

    let print8: [u8; 6] = [
        0b1000_0010, 0b0000_0000, 0b0000_1000, // LDI R0,8
        0b0100_0111, 0b0000_0000,              // PRN R0
        0b0000_0001,                           // HLT
    ];
    let mult: [u8; 12] = [
        0b1000_0010, 0, 8, // LDI R0,8
        0b1000_0010, 1, 9, // LDI R1,9
        0b1010_0010, 0, 1, // MUL R0,R1
        0b0100_0111, 0,    // PRN R0
        0b0000_0001,       // HLT
    ];

    for (name, program) in [("print8", &print8[..]), ("mult", &mult[..])] {
        println!("━━━ {} ━━━", name);
        print!("{}", disassemble(program));

        let mut cpu = Cpu::new();
        let result = cpu.load_program(program)
            .map_err(|e| e.to_string())
            .and_then(|()| cpu.run().map_err(|e| e.to_string()));

        match result {
            Ok(cycles) => {
                let output: Vec<String> = cpu.take_output().iter().map(u8::to_string).collect();
                println!("Output: {}  ({} instructions)", output.join(" "), cycles);
            }
            Err(e) => println!("❌ {}", e),
        }
        println!();
    }
}

fn run_self_test() {
    use ls8::{assemble, AddressError, Memory};

    println!("━━━ LS-8 Emulator Self-Test ━━━");
    println!();

    let mut passed = 0;
    let mut failed = 0;

    let mut check = |name: &str, ok: bool| {
        if ok {
            println!("{}... ✓", name);
            passed += 1;
        } else {
            println!("{}... ✗", name);
            failed += 1;
        }
    };

    let run = |source: &str| -> Option<Cpu> {
        let program = assemble(source).ok()?;
        let mut cpu = Cpu::new();
        cpu.load_program(&program).ok()?;
        cpu.run().ok()?;
        Some(cpu)
    };

    // Test 1: print8
    let ok = run("LDI R0,8\nPRN R0\nHLT")
        .is_some_and(|mut cpu| cpu.take_output() == [8u8] && cpu.is_halted());
    check("Print 8", ok);

    // Test 2: multiplication
    let ok = run("LDI R0,8\nLDI R1,9\nMUL R0,R1\nPRN R0\nHLT")
        .is_some_and(|mut cpu| cpu.take_output() == [72u8]);
    check("Multiply 8 × 9", ok);

    // Test 3: wraparound
    let ok = run("LDI R0,200\nLDI R1,100\nADD R0,R1\nHLT")
        .is_some_and(|cpu| cpu.machine.regs.gpr[0] == 44);
    check("ADD wraps modulo 256", ok);

    // Test 4: stack round trip
    let ok = run("LDI R0,77\nPUSH R0\nLDI R0,0\nPOP R0\nHLT")
        .is_some_and(|cpu| cpu.machine.regs.gpr[0] == 77 && cpu.machine.regs.sp() == 0xF4);
    check("PUSH/POP round trip", ok);

    // Test 5: subroutine call
    let ok = run("LDI R1,SUB\nCALL R1\nPRN R0\nHLT\nSUB: LDI R0,5\nRET")
        .is_some_and(|mut cpu| cpu.take_output() == [5u8]);
    check("CALL/RET", ok);

    // Test 6: conditional jump
    let ok = run("LDI R0,1\nLDI R1,1\nLDI R2,SKIP\nCMP R0,R1\nJEQ R2\nPRN R0\nSKIP: HLT")
        .is_some_and(|mut cpu| cpu.take_output().is_empty());
    check("CMP/JEQ", ok);

    // Test 7: unknown opcode
    let mut cpu = Cpu::new();
    let ok = cpu.load_program(&[0xFF]).is_ok()
        && matches!(cpu.run(), Err(CpuError::UnknownInstruction { opcode: 0xFF, pc: 0 }))
        && cpu.is_halted();
    check("Unknown opcode halts", ok);

    // Test 8: addressing
    check("Address 300 rejected", Memory::new().read(300) == Err(AddressError::Memory(300)));

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed == 0 {
        println!("✓ All tests passed!");
    } else {
        std::process::exit(1);
    }
}
