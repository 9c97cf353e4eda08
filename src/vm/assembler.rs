//! Assembler - Parses node program text into instructions
//!
//! ## Assembly Syntax
//!
//! ```text
//! ; Comments start with semicolon or hash
//! MOV CH3 INPUT          # broadcast the next input on channel 3
//! MOV ACC INPUT
//! loop: MOV CH1 ACC
//! wait: JNZ CH2 wait     ; spin while channel 2 is non-zero
//! DEC
//! JMP loop
//! ```
//!
//! - One instruction per line, optionally prefixed by `label:`
//! - Case-insensitive; operands separated by whitespace or commas
//! - `NOP` assembles to `MOV NIL NIL`
//! - Jump targets are labels, signed relative offsets, or a live read of
//!   `ACC`, `NIL`, `INPUT` or a channel
//!
//! Assembly never aborts: the earliest error (by line) is kept on the
//! program and every other valid line is still assembled, so an editor can
//! keep showing labels and instructions while the player types.

use super::labels::resolve_labels;
use super::register::parse_channel;
use super::{Instruction, Opcode, Operand, OperandKind, Register};
use std::collections::BTreeMap;

/// Assembled node program
#[derive(Debug, Clone, Default)]
pub struct AssembledProgram {
    /// Well-formed instructions, in execution order
    pub instructions: Vec<Instruction>,
    /// Labels to instruction indices
    pub labels: BTreeMap<String, usize>,
    /// Physical source lines (blank and comment lines included)
    pub line_count: usize,
    /// Earliest static error, if any
    pub error: Option<AssemblerError>,
}

impl AssembledProgram {
    /// True when the program has no static error
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Assembler for node programs
pub struct Assembler {
    /// Current line number (zero-based, for error reporting)
    line_number: usize,
    /// Maximum physical lines
    capacity: usize,
    /// Accumulated instructions
    instructions: Vec<Instruction>,
    /// Label names to source lines
    label_lines: BTreeMap<String, usize>,
    /// Earliest error so far
    error: Option<AssemblerError>,
}

impl Assembler {
    pub fn new(capacity: usize) -> Self {
        Self {
            line_number: 0,
            capacity,
            instructions: Vec::new(),
            label_lines: BTreeMap::new(),
            error: None,
        }
    }

    /// Assemble source code into a program
    pub fn assemble(&mut self, source: &str) -> AssembledProgram {
        self.instructions.clear();
        self.label_lines.clear();
        self.error = None;

        let mut line_count = 0;
        for (idx, raw) in source.lines().enumerate() {
            self.line_number = idx;
            line_count = idx + 1;

            let mut line = raw.to_lowercase();

            // Remove comments
            if let Some(pos) = line.find(|c| c == ';' || c == '#') {
                line.truncate(pos);
            }
            let mut line = line.trim();

            // Label prefix
            if let Some((label, rest)) = split_label(line) {
                if self.label_lines.contains_key(label) {
                    self.note_error(format!("Duplicate label \"{}\"", label.to_uppercase()));
                } else {
                    self.label_lines.insert(label.to_string(), idx);
                }
                line = rest.trim();
            }

            if line.is_empty() {
                continue;
            }

            match self.parse_instruction(line) {
                Ok(instr) => self.instructions.push(instr),
                Err(message) => self.note_error(message),
            }
        }

        // Resolve labels
        let (labels, label_errors) = resolve_labels(&mut self.instructions, &self.label_lines);
        for err in label_errors {
            self.keep_earliest(err);
        }

        // Overflow wins over everything else
        if line_count > self.capacity {
            self.error = Some(AssemblerError {
                line: self.capacity.saturating_sub(1),
                message: format!("Too many lines (max {})", self.capacity),
            });
        }

        log::debug!(
            "Assembled {} instructions, {} labels from {} lines{}",
            self.instructions.len(),
            labels.len(),
            line_count,
            if self.error.is_some() { " (with error)" } else { "" }
        );

        AssembledProgram {
            instructions: self.instructions.clone(),
            labels,
            line_count,
            error: self.error.clone(),
        }
    }

    /// Parse an instruction line (lowercase, comment and label stripped)
    fn parse_instruction(&self, line: &str) -> Result<Instruction, String> {
        let toks: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .collect();
        let Some(&mnemonic) = toks.first() else {
            return Err(format!("Invalid operand \"{}\"", line.to_uppercase()));
        };

        if mnemonic == "nop" && toks.len() == 1 {
            return Ok(Instruction::nop(self.line_number));
        }

        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| format!("Unknown instruction \"{}\"", mnemonic.to_uppercase()))?;
        let signature = opcode.signature();

        if toks.len() != signature.len() + 1 {
            return Err(format!(
                "\"{}\" requires {} operand(s)",
                mnemonic.to_uppercase(),
                signature.len()
            ));
        }

        let operands = signature
            .iter()
            .zip(&toks[1..])
            .enumerate()
            .map(|(i, (kind, tok))| parse_operand(tok, *kind, i))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Instruction::new(opcode, operands, self.line_number))
    }

    /// Record an error at the current line
    fn note_error(&mut self, message: String) {
        let err = self.error(message);
        self.keep_earliest(err);
    }

    fn keep_earliest(&mut self, err: AssemblerError) {
        match &self.error {
            Some(existing) if existing.line <= err.line => {}
            _ => self.error = Some(err),
        }
    }

    /// Create an error at current line
    fn error(&self, message: String) -> AssemblerError {
        AssemblerError {
            line: self.line_number,
            message,
        }
    }
}

/// Split `name: rest` when `name` is a valid label identifier
fn split_label(line: &str) -> Option<(&str, &str)> {
    let (name, rest) = line.split_once(':')?;
    if is_identifier(name) {
        Some((name, rest))
    } else {
        None
    }
}

/// `[a-z][a-z0-9_]*`
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Parse one operand token against its declared kind
fn parse_operand(tok: &str, kind: OperandKind, index: usize) -> Result<Operand, String> {
    if let Ok(value) = tok.parse::<i64>() {
        return match kind {
            OperandKind::Number => Ok(Operand::Immediate(value)),
            OperandKind::Label => i32::try_from(value)
                .map(Operand::RelativeOffset)
                .map_err(|_| format!("Offset {} is out of range", value)),
            _ => Err(format!("Operand {} must be a {}", index + 1, kind)),
        };
    }

    match kind {
        OperandKind::Channel => parse_channel(tok)
            .map(Operand::Channel)
            .ok_or_else(|| format!("Operand {} must be a channel", index + 1)),
        OperandKind::Label => {
            if let Some(reg) = Register::parse(tok) {
                if !reg.is_readable() {
                    return Err(format!("{} cannot be read", reg));
                }
                Ok(Operand::Register(reg))
            } else if let Some(id) = parse_channel(tok) {
                Ok(Operand::Channel(id))
            } else if is_identifier(tok) {
                Ok(Operand::UnresolvedLabel(tok.to_string()))
            } else {
                Err(format!("Invalid label \"{}\"", tok.to_uppercase()))
            }
        }
        OperandKind::Register | OperandKind::Number => {
            if let Some(reg) = Register::parse(tok) {
                if kind == OperandKind::Register && !reg.is_writable() {
                    return Err(format!("{} cannot be written to", reg));
                }
                if kind == OperandKind::Number && !reg.is_readable() {
                    return Err(format!("{} cannot be read", reg));
                }
                Ok(Operand::Register(reg))
            } else if let Some(id) = parse_channel(tok) {
                Ok(Operand::Channel(id))
            } else {
                Err(format!("Invalid operand \"{}\"", tok.to_uppercase()))
            }
        }
    }
}

/// Assembler error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblerError {
    /// Zero-based source line
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for AssemblerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Line {}: {}", self.line + 1, self.message)
    }
}

impl std::error::Error for AssemblerError {}

/// Convenience function to assemble source for a node of `capacity` lines
pub fn assemble(source: &str, capacity: usize) -> AssembledProgram {
    Assembler::new(capacity).assemble(source)
}

/// Assemble and turn a static error into `Err`
pub fn assemble_strict(source: &str, capacity: usize) -> Result<AssembledProgram, AssemblerError> {
    let program = assemble(source, capacity);
    match program.error.clone() {
        Some(err) => Err(err),
        None => Ok(program),
    }
}
