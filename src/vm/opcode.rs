//! Opcode - Instruction set for node programs
//!
//! | Mnemonic | Operands          | Effect                                   |
//! |----------|-------------------|------------------------------------------|
//! | MOV      | register, number  | dst = src                                |
//! | INC      |                   | ACC = ACC + 1 (saturating)               |
//! | DEC      |                   | ACC = ACC - 1 (saturating)               |
//! | NEG      |                   | ACC = -ACC                               |
//! | JMP      | label             | relative jump                            |
//! | JLZ      | channel, label    | jump if channel < 0                      |
//! | JEZ      | channel, label    | jump if channel = 0                      |
//! | JGZ      | channel, label    | jump if channel > 0                      |
//! | JNZ      | channel, label    | jump if channel != 0                     |
//!
//! `NOP` is accepted in source and assembles to `MOV NIL NIL`.

use std::fmt;

/// Declared kind of an operand position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    /// Write target: ACC, NIL, OUTPUT or a channel
    Register,
    /// Read source: immediate, ACC, NIL, INPUT or a channel
    Number,
    /// Jump target: offset, label, or a live read
    Label,
    /// Channel reference
    Channel,
}

impl OperandKind {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Number => "number",
            Self::Label => "label",
            Self::Channel => "channel",
        }
    }
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Branch condition tested against a channel value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    LessThanZero,
    EqualZero,
    GreaterThanZero,
    NotZero,
}

impl Condition {
    pub const fn holds(&self, value: i64) -> bool {
        match self {
            Self::LessThanZero => value < 0,
            Self::EqualZero => value == 0,
            Self::GreaterThanZero => value > 0,
            Self::NotZero => value != 0,
        }
    }
}

/// Node opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Mov,
    Inc,
    Dec,
    Neg,
    Jmp,
    Jlz,
    Jez,
    Jgz,
    Jnz,
}

const NO_OPERANDS: &[OperandKind] = &[];
const MOV_OPERANDS: &[OperandKind] = &[OperandKind::Register, OperandKind::Number];
const JMP_OPERANDS: &[OperandKind] = &[OperandKind::Label];
const BRANCH_OPERANDS: &[OperandKind] = &[OperandKind::Channel, OperandKind::Label];

impl Opcode {
    /// Every opcode, in encoding order
    pub const ALL: [Opcode; 9] = [
        Self::Mov,
        Self::Inc,
        Self::Dec,
        Self::Neg,
        Self::Jmp,
        Self::Jlz,
        Self::Jez,
        Self::Jgz,
        Self::Jnz,
    ];

    /// Look up a lowercase mnemonic
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.mnemonic() == name)
    }

    /// Lowercase mnemonic
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Self::Mov => "mov",
            Self::Inc => "inc",
            Self::Dec => "dec",
            Self::Neg => "neg",
            Self::Jmp => "jmp",
            Self::Jlz => "jlz",
            Self::Jez => "jez",
            Self::Jgz => "jgz",
            Self::Jnz => "jnz",
        }
    }

    /// Declared operand kinds, one per position
    pub const fn signature(&self) -> &'static [OperandKind] {
        match self {
            Self::Mov => MOV_OPERANDS,
            Self::Inc | Self::Dec | Self::Neg => NO_OPERANDS,
            Self::Jmp => JMP_OPERANDS,
            Self::Jlz | Self::Jez | Self::Jgz | Self::Jnz => BRANCH_OPERANDS,
        }
    }

    pub const fn arity(&self) -> usize {
        self.signature().len()
    }

    /// Branch condition for conditional jumps
    pub const fn condition(&self) -> Option<Condition> {
        match self {
            Self::Jlz => Some(Condition::LessThanZero),
            Self::Jez => Some(Condition::EqualZero),
            Self::Jgz => Some(Condition::GreaterThanZero),
            Self::Jnz => Some(Condition::NotZero),
            _ => None,
        }
    }

    /// Does this opcode carry a jump target?
    pub const fn is_jump(&self) -> bool {
        matches!(
            self,
            Self::Jmp | Self::Jlz | Self::Jez | Self::Jgz | Self::Jnz
        )
    }

    /// Single-letter code used by the program codec
    pub const fn code(&self) -> char {
        match self {
            Self::Mov => 'm',
            Self::Inc => 'i',
            Self::Dec => 'd',
            Self::Neg => 'n',
            Self::Jmp => 'j',
            Self::Jlz => 'l',
            Self::Jez => 'e',
            Self::Jgz => 'g',
            Self::Jnz => 'z',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic().to_uppercase())
    }
}
