//! Instruction - Decoded node instruction
//!
//! ## Format
//!
//! ```text
//! { opcode, operands[0..=2], source_line }
//!
//! MOV ACC INPUT      Mov [Register(Acc), Register(Input)]
//! MOV CH3 -4         Mov [Channel(3), Immediate(-4)]
//! JNZ CH2 wait       Jnz [Channel(2), UnresolvedLabel("wait")]   (before resolution)
//! JNZ CH2 0          Jnz [Channel(2), RelativeOffset(0)]         (after resolution)
//! JMP ACC            Jmp [Register(Acc)]                         (computed target)
//! ```

use super::{Opcode, OperandKind, Register};
use std::fmt;

/// A single operand
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Literal number
    Immediate(i64),
    /// Reserved register word
    Register(Register),
    /// Channel id (>= 1)
    Channel(u32),
    /// Resolved jump offset, relative to the owning instruction
    RelativeOffset(i32),
    /// Symbolic jump target awaiting resolution
    UnresolvedLabel(String),
}

impl Operand {
    /// Check that this operand may appear in a position of `kind`
    pub fn fits(&self, kind: OperandKind) -> bool {
        match (kind, self) {
            (OperandKind::Register, Self::Register(r)) => r.is_writable(),
            (OperandKind::Register, Self::Channel(_)) => true,
            (OperandKind::Number, Self::Immediate(_)) => true,
            (OperandKind::Number, Self::Register(r)) => r.is_readable(),
            (OperandKind::Number, Self::Channel(_)) => true,
            (OperandKind::Label, Self::RelativeOffset(_) | Self::UnresolvedLabel(_)) => true,
            (OperandKind::Label, Self::Register(r)) => r.is_readable(),
            (OperandKind::Label, Self::Channel(_)) => true,
            (OperandKind::Channel, Self::Channel(_)) => true,
            _ => false,
        }
    }

    /// Channel id, if this operand is a channel
    pub fn channel(&self) -> Option<u32> {
        match self {
            Self::Channel(id) => Some(*id),
            _ => None,
        }
    }

    /// Is this a jump target that must be read at execution time?
    pub fn is_computed_target(&self) -> bool {
        matches!(self, Self::Register(_) | Self::Channel(_))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(v) => write!(f, "{}", v),
            Self::Register(r) => write!(f, "{}", r),
            Self::Channel(id) => write!(f, "CH{}", id),
            Self::RelativeOffset(o) => write!(f, "{}", o),
            Self::UnresolvedLabel(name) => write!(f, "{}", name),
        }
    }
}

/// A node instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Operation
    pub opcode: Opcode,
    /// Operands, exactly `opcode.arity()` of them
    pub operands: Vec<Operand>,
    /// Zero-based source line the instruction came from
    pub source_line: usize,
}

impl Instruction {
    pub fn new(opcode: Opcode, operands: Vec<Operand>, source_line: usize) -> Self {
        Self {
            opcode,
            operands,
            source_line,
        }
    }

    /// `MOV NIL NIL`
    pub fn nop(source_line: usize) -> Self {
        Self::mov(
            Operand::Register(Register::Nil),
            Operand::Register(Register::Nil),
            source_line,
        )
    }

    pub fn mov(target: Operand, source: Operand, source_line: usize) -> Self {
        Self::new(Opcode::Mov, vec![target, source], source_line)
    }

    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }

    /// Jump target operand (last operand of a jump)
    pub fn jump_target(&self) -> Option<&Operand> {
        if self.opcode.is_jump() {
            self.operands.last()
        } else {
            None
        }
    }

    pub fn jump_target_mut(&mut self) -> Option<&mut Operand> {
        if self.opcode.is_jump() {
            self.operands.last_mut()
        } else {
            None
        }
    }

    /// Check operand count and kinds against the opcode signature
    pub fn conforms(&self) -> bool {
        let signature = self.opcode.signature();
        signature.len() == self.operands.len()
            && signature
                .iter()
                .zip(&self.operands)
                .all(|(kind, op)| op.fits(*kind))
    }

    /// Same opcode and operands, ignoring source position
    pub fn same_stream(&self, other: &Instruction) -> bool {
        self.opcode == other.opcode && self.operands == other.operands
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.opcode)?;
        for op in &self.operands {
            write!(f, " {}", op)?;
        }
        Ok(())
    }
}

/// Render instructions as canonical source text, one per line
pub fn disassemble(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .map(|instr| instr.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
