//! `.ls8` program images.
//!
//! A simple text format:
//! - One byte per line, written as exactly 8 binary digits
//! - `#` starts a comment, either on its own line or after the byte
//! - Blank lines are ignored
//!
//! ```text
//! # print8.ls8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```

use crate::asm::disasm::disassemble_at;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// A parsed program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// Program bytes, in address order.
    pub bytes: Vec<u8>,
}

impl ProgramImage {
    /// Create an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an image from raw bytes, e.g. assembler output.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse `.ls8` text.
pub fn parse_ls8(text: &str) -> Result<ProgramImage, LoadError> {
    read_lines(text.lines().map(|l| Ok(l.to_string())))
}

/// Load an `.ls8` file from disk.
pub fn load_ls8<P: AsRef<Path>>(path: P) -> Result<ProgramImage, LoadError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| LoadError::IoError(e.to_string()))?;
    let reader = BufReader::new(file);

    let image = read_lines(reader.lines())?;
    tracing::debug!(path = %path.as_ref().display(), bytes = image.len(), "loaded program");
    Ok(image)
}

fn read_lines<I>(lines: I) -> Result<ProgramImage, LoadError>
where
    I: Iterator<Item = std::io::Result<String>>,
{
    let mut image = ProgramImage::new();

    for (line_idx, line_result) in lines.enumerate() {
        let line_num = line_idx + 1;
        let line = line_result.map_err(|e| LoadError::IoError(e.to_string()))?;

        // Strip comments
        let code = line.split('#').next().unwrap_or("").trim();
        if code.is_empty() {
            continue;
        }

        image.bytes.push(parse_byte(code, line_num)?);
    }

    if image.is_empty() {
        return Err(LoadError::Empty);
    }

    Ok(image)
}

fn parse_byte(code: &str, line: usize) -> Result<u8, LoadError> {
    if code.len() != 8 || !code.bytes().all(|b| b == b'0' || b == b'1') {
        return Err(LoadError::ParseError {
            line,
            message: format!("expected 8 binary digits, found '{}'", code),
        });
    }

    u8::from_str_radix(code, 2).map_err(|e| LoadError::ParseError {
        line,
        message: e.to_string(),
    })
}

/// Save a program image as `.ls8` text, annotated with disassembly.
pub fn save_ls8<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), LoadError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| LoadError::IoError(e.to_string()))?;
    file.write_all(render_ls8(&image.bytes).as_bytes())
        .map_err(|e| LoadError::IoError(e.to_string()))
}

/// Render bytes as `.ls8` text.
pub fn render_ls8(bytes: &[u8]) -> String {
    let mut out = String::new();
    out.push_str("# LS-8 program\n");
    out.push_str(&format!("# {} bytes\n\n", bytes.len()));

    let mut addr = 0;
    while addr < bytes.len() {
        let (text, len) = disassemble_at(bytes, addr);
        out.push_str(&format!("{:08b} # {:02X}: {}\n", bytes[addr], addr, text));
        for operand in &bytes[addr + 1..addr + len] {
            out.push_str(&format!("{:08b}\n", operand));
        }
        addr += len;
    }

    out
}

/// Errors that can occur while loading a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("program contains no instructions")]
    Empty,
}
