//! Compact text encoding for node programs and whole layouts
//!
//! Programs and layouts are shared as short ASCII strings. The encoding is
//! lossless over the resolved instruction stream (source positions are not
//! kept), so `encode(decode(s)) == s` byte for byte.
//!
//! ## Format
//!
//! ```text
//! PROGRAM
//! └── For each instruction:
//!     ├── Opcode:   one letter  m i d n j l e g z
//!     └── Operands: 0..2 of
//!         ├── X  nil        A  acc       I  input     O  output
//!         ├── Z  zero
//!         ├── P<magnitude>  positive literal
//!         ├── N<magnitude>  negative literal
//!         └── C<number>     channel
//!
//! LAYOUT
//! └── For each node:
//!     ├── Marker:   '@'
//!     ├── Class:    one letter  a b c d
//!     ├── Slot:     decimal
//!     └── PROGRAM
//! ```
//!
//! Literals are immediates in `number` slots and relative offsets in `label`
//! slots. Magnitudes are canonical decimal: no leading zeros, never zero.
//!
//! Example: `@b0mAIimOA@a1jZ` is an 8x3 node in slot 0 running
//! `MOV ACC INPUT / INC / MOV OUTPUT ACC` and a 4x1 node in slot 1 running
//! `JMP 0`.

use super::{Instruction, NodeClass, Opcode, Operand, OperandKind, Register};
use thiserror::Error;

/// Layout node marker
pub const NODE_MARKER: u8 = b'@';

/// Codec failures. Malformed input is never partially recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Unknown opcode '{code}' at offset {offset}")]
    UnknownOpcode { code: char, offset: usize },

    #[error("Unknown operand '{code}' at offset {offset}")]
    UnknownOperand { code: char, offset: usize },

    #[error("Truncated input at offset {0}")]
    Truncated(usize),

    #[error("Non-canonical number at offset {0}")]
    NonCanonicalNumber(usize),

    #[error("Number out of range at offset {0}")]
    NumberOutOfRange(usize),

    #[error("Jump offset {value} of instruction {index} outside a {len}-instruction program")]
    OffsetOutOfRange { index: usize, value: i32, len: usize },

    #[error("Operand {position} not allowed for {opcode} at offset {offset}")]
    OperandNotAllowed {
        opcode: Opcode,
        position: usize,
        offset: usize,
    },

    #[error("Unknown node class '{code}' at offset {offset}")]
    UnknownNodeClass { code: char, offset: usize },

    #[error("Expected node marker '@' at offset {0}")]
    MissingNodeMarker(usize),

    #[error("Duplicate slot {0}")]
    DuplicateSlot(u8),

    #[error("Unresolved label \"{0}\" cannot be encoded")]
    UnresolvedLabel(String),

    #[error("Instruction {index} does not match its signature")]
    InvalidInstruction { index: usize },

    #[error("Round trip mismatch: {first} != {second}")]
    RoundTripMismatch { first: String, second: String },
}

pub type Result<T> = std::result::Result<T, CodecError>;

// =============================================================================
// Programs
// =============================================================================

/// Encode a resolved program
pub fn encode_program(instructions: &[Instruction]) -> Result<String> {
    let mut out = String::new();
    for (index, instr) in instructions.iter().enumerate() {
        if let Some(Operand::UnresolvedLabel(name)) = instr.jump_target() {
            return Err(CodecError::UnresolvedLabel(name.clone()));
        }
        if !instr.conforms() {
            return Err(CodecError::InvalidInstruction { index });
        }
        out.push(instr.opcode.code());
        for op in &instr.operands {
            encode_operand(op, &mut out)?;
        }
    }
    Ok(out)
}

fn encode_operand(op: &Operand, out: &mut String) -> Result<()> {
    match op {
        Operand::Register(Register::Nil) => out.push('X'),
        Operand::Register(Register::Acc) => out.push('A'),
        Operand::Register(Register::Input) => out.push('I'),
        Operand::Register(Register::Output) => out.push('O'),
        Operand::Immediate(v) => encode_number(*v, out),
        Operand::RelativeOffset(v) => encode_number(*v as i64, out),
        Operand::Channel(id) => {
            out.push('C');
            out.push_str(&id.to_string());
        }
        Operand::UnresolvedLabel(name) => return Err(CodecError::UnresolvedLabel(name.clone())),
    }
    Ok(())
}

fn encode_number(value: i64, out: &mut String) {
    if value == 0 {
        out.push('Z');
    } else if value > 0 {
        out.push('P');
        out.push_str(&value.to_string());
    } else {
        out.push('N');
        out.push_str(&value.unsigned_abs().to_string());
    }
}

/// Decode a program string
///
/// Decoded instructions get `source_line == index`, matching their
/// disassembled text.
pub fn decode_program(encoded: &str) -> Result<Vec<Instruction>> {
    let data = encoded.as_bytes();
    let mut offset = 0;
    let instructions = decode_instructions(data, &mut offset)?;
    if offset != data.len() {
        return Err(CodecError::UnknownOpcode {
            code: data[offset] as char,
            offset,
        });
    }
    Ok(instructions)
}

/// Decode instructions until end of input or a node marker
fn decode_instructions(data: &[u8], offset: &mut usize) -> Result<Vec<Instruction>> {
    let mut instructions = Vec::new();
    while *offset < data.len() && data[*offset] != NODE_MARKER {
        let start = *offset;
        let code = data[start] as char;
        let opcode = Opcode::from_code(code).ok_or(CodecError::UnknownOpcode {
            code,
            offset: start,
        })?;
        *offset += 1;

        let mut operands = Vec::with_capacity(opcode.arity());
        for (position, kind) in opcode.signature().iter().enumerate() {
            let op_start = *offset;
            let op = decode_operand(data, offset, *kind)?;
            if !op.fits(*kind) {
                return Err(CodecError::OperandNotAllowed {
                    opcode,
                    position: position + 1,
                    offset: op_start,
                });
            }
            operands.push(op);
        }

        let index = instructions.len();
        instructions.push(Instruction::new(opcode, operands, index));
    }

    // Offsets are stored normalised into 0..len
    let len = instructions.len();
    for (index, instr) in instructions.iter().enumerate() {
        if let Some(&Operand::RelativeOffset(value)) = instr.jump_target() {
            if value < 0 || value as usize >= len {
                return Err(CodecError::OffsetOutOfRange { index, value, len });
            }
        }
    }
    Ok(instructions)
}

fn decode_operand(data: &[u8], offset: &mut usize, kind: OperandKind) -> Result<Operand> {
    let start = *offset;
    let Some(&tag) = data.get(start) else {
        return Err(CodecError::Truncated(start));
    };
    *offset += 1;

    let op = match tag {
        b'X' => Operand::Register(Register::Nil),
        b'A' => Operand::Register(Register::Acc),
        b'I' => Operand::Register(Register::Input),
        b'O' => Operand::Register(Register::Output),
        b'Z' => literal(0, kind),
        b'P' => {
            let n = read_magnitude(data, offset)?;
            let value = i64::try_from(n).map_err(|_| CodecError::NumberOutOfRange(start + 1))?;
            literal(value, kind)
        }
        b'N' => {
            let n = read_magnitude(data, offset)?;
            let value = 0i64
                .checked_sub_unsigned(n)
                .ok_or(CodecError::NumberOutOfRange(start + 1))?;
            literal(value, kind)
        }
        b'C' => {
            let n = read_magnitude(data, offset)?;
            let id = u32::try_from(n).map_err(|_| CodecError::NumberOutOfRange(start + 1))?;
            Operand::Channel(id)
        }
        other => {
            return Err(CodecError::UnknownOperand {
                code: other as char,
                offset: start,
            })
        }
    };

    Ok(op)
}

/// A literal is an offset in a label slot and an immediate elsewhere.
/// Offsets outside `i32` come back as immediates and fail the signature check.
fn literal(value: i64, kind: OperandKind) -> Operand {
    match kind {
        OperandKind::Label => match i32::try_from(value) {
            Ok(v) => Operand::RelativeOffset(v),
            Err(_) => Operand::Immediate(value),
        },
        _ => Operand::Immediate(value),
    }
}

/// Read canonical decimal digits: non-empty, no leading zero, never zero
fn read_magnitude(data: &[u8], offset: &mut usize) -> Result<u64> {
    let start = *offset;
    while *offset < data.len() && data[*offset].is_ascii_digit() {
        *offset += 1;
    }
    let digits = &data[start..*offset];
    if digits.is_empty() {
        return Err(CodecError::Truncated(start));
    }
    if digits[0] == b'0' {
        return Err(CodecError::NonCanonicalNumber(start));
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or(CodecError::NumberOutOfRange(start))
}

/// Encode, decode and re-encode, checking nothing was lost
///
/// Returns the encoded string on success.
pub fn verify_roundtrip(instructions: &[Instruction]) -> Result<String> {
    let first = encode_program(instructions)?;
    let decoded = decode_program(&first)?;
    let second = encode_program(&decoded)?;

    let structural = decoded.len() == instructions.len()
        && decoded
            .iter()
            .zip(instructions)
            .all(|(a, b)| a.same_stream(b));

    if first != second || !structural {
        return Err(CodecError::RoundTripMismatch { first, second });
    }
    Ok(first)
}

// =============================================================================
// Layouts
// =============================================================================

/// One node of an encoded layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub class: NodeClass,
    pub slot: u8,
    pub instructions: Vec<Instruction>,
}

/// Encode a layout, nodes in the given order
pub fn encode_layout(entries: &[LayoutEntry]) -> Result<String> {
    let mut seen = [false; 256];
    let mut out = String::new();
    for entry in entries {
        if std::mem::replace(&mut seen[entry.slot as usize], true) {
            return Err(CodecError::DuplicateSlot(entry.slot));
        }
        out.push(NODE_MARKER as char);
        out.push(entry.class.code());
        out.push_str(&entry.slot.to_string());
        out.push_str(&encode_program(&entry.instructions)?);
    }
    Ok(out)
}

/// Decode a layout string
pub fn decode_layout(encoded: &str) -> Result<Vec<LayoutEntry>> {
    let data = encoded.as_bytes();
    let mut offset = 0;
    let mut seen = [false; 256];
    let mut entries = Vec::new();

    while offset < data.len() {
        if data[offset] != NODE_MARKER {
            return Err(CodecError::MissingNodeMarker(offset));
        }
        offset += 1;

        let Some(&code) = data.get(offset) else {
            return Err(CodecError::Truncated(offset));
        };
        let class = NodeClass::from_code(code as char).ok_or(CodecError::UnknownNodeClass {
            code: code as char,
            offset,
        })?;
        offset += 1;

        let slot = read_slot(data, &mut offset)?;
        if std::mem::replace(&mut seen[slot as usize], true) {
            return Err(CodecError::DuplicateSlot(slot));
        }

        let instructions = decode_instructions(data, &mut offset)?;
        entries.push(LayoutEntry {
            class,
            slot,
            instructions,
        });
    }

    Ok(entries)
}

/// Slot index: canonical decimal, `0` allowed
fn read_slot(data: &[u8], offset: &mut usize) -> Result<u8> {
    let start = *offset;
    while *offset < data.len() && data[*offset].is_ascii_digit() {
        *offset += 1;
    }
    let digits = &data[start..*offset];
    if digits.is_empty() {
        return Err(CodecError::Truncated(start));
    }
    if digits.len() > 1 && digits[0] == b'0' {
        return Err(CodecError::NonCanonicalNumber(start));
    }
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<u8>().ok())
        .ok_or(CodecError::NumberOutOfRange(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::assemble;

    fn program(source: &str) -> Vec<Instruction> {
        let assembled = assemble(source, 15);
        assert!(assembled.is_ok(), "{:?}", assembled.error);
        assembled.instructions
    }

    #[test]
    fn test_encode_program() {
        let instrs = program("MOV ch3 INPUT\nMOV ACC -4\nloop: INC\nJNZ ch2 loop\nNOP");
        assert_eq!(encode_program(&instrs).unwrap(), "mC3ImAN4izC2P4mXX");
    }

    #[test]
    fn test_zero_and_computed_targets() {
        let instrs = program("MOV ACC 0\nJMP ACC\nJEZ ch1 ch2\nJMP 0");
        assert_eq!(encode_program(&instrs).unwrap(), "mAZjAeC1C2jZ");
    }

    #[test]
    fn test_decode_matches_source() {
        let instrs = program("MOV ch3 INPUT\nMOV ACC -4\nloop: INC\nJNZ ch2 loop\nNOP");
        let decoded = decode_program("mC3ImAN4izC2P4mXX").unwrap();
        assert_eq!(decoded.len(), instrs.len());
        for (a, b) in decoded.iter().zip(&instrs) {
            assert!(a.same_stream(b), "{} vs {}", a, b);
        }
        assert_eq!(decoded[3].source_line, 3);
    }

    #[test]
    fn test_string_roundtrip_is_byte_exact() {
        for s in ["", "i", "mAP490", "mC12N1jP1", "lC1ZeC2P1gC3AzC4C5"] {
            let decoded = decode_program(s).unwrap();
            assert_eq!(encode_program(&decoded).unwrap(), s);
        }
    }

    #[test]
    fn test_extreme_literals() {
        let instrs = program("MOV ACC -9223372036854775808\nMOV ACC 9223372036854775807");
        let encoded = verify_roundtrip(&instrs).unwrap();
        assert_eq!(encoded, "mAN9223372036854775808mAP9223372036854775807");

        assert_eq!(
            decode_program("mAP9223372036854775808"),
            Err(CodecError::NumberOutOfRange(3))
        );
        assert_eq!(
            decode_program("mAN9223372036854775809"),
            Err(CodecError::NumberOutOfRange(3))
        );
        assert_eq!(
            decode_program("mAN99999999999999999999"),
            Err(CodecError::NumberOutOfRange(3))
        );
    }

    #[test]
    fn test_offsets_must_be_normalised() {
        assert_eq!(
            decode_program("ijP5"),
            Err(CodecError::OffsetOutOfRange { index: 1, value: 5, len: 2 })
        );
        assert_eq!(
            decode_program("ijP2"),
            Err(CodecError::OffsetOutOfRange { index: 1, value: 2, len: 2 })
        );
        assert!(matches!(
            decode_program("jN1"),
            Err(CodecError::OffsetOutOfRange { value: -1, .. })
        ));
        assert!(decode_program("ijP1").is_ok());
        assert!(matches!(
            decode_layout("@b0ijP5"),
            Err(CodecError::OffsetOutOfRange { .. })
        ));
    }

    #[test]
    fn test_verify_roundtrip() {
        let instrs = program("MOV ACC INPUT\nINC\nMOV OUTPUT ACC");
        assert_eq!(verify_roundtrip(&instrs).unwrap(), "mAIimOA");
    }

    #[test]
    fn test_unresolved_label_refused() {
        let instr = Instruction::new(
            Opcode::Jmp,
            vec![Operand::UnresolvedLabel("top".to_string())],
            0,
        );
        assert_eq!(
            encode_program(&[instr]),
            Err(CodecError::UnresolvedLabel("top".to_string()))
        );
    }

    #[test]
    fn test_malformed_programs() {
        assert!(matches!(
            decode_program("q"),
            Err(CodecError::UnknownOpcode { code: 'q', offset: 0 })
        ));
        assert_eq!(decode_program("mA"), Err(CodecError::Truncated(2)));
        assert_eq!(decode_program("mAP"), Err(CodecError::Truncated(3)));
        assert_eq!(decode_program("mAP07"), Err(CodecError::NonCanonicalNumber(3)));
        assert_eq!(decode_program("mAN0"), Err(CodecError::NonCanonicalNumber(3)));
        assert_eq!(decode_program("mC0Z"), Err(CodecError::NonCanonicalNumber(2)));
        assert!(matches!(
            decode_program("mAQ"),
            Err(CodecError::UnknownOperand { code: 'Q', .. })
        ));
        // INPUT is not writable
        assert!(matches!(
            decode_program("mIZ"),
            Err(CodecError::OperandNotAllowed { position: 1, .. })
        ));
        // OUTPUT is not readable
        assert!(matches!(
            decode_program("mAO"),
            Err(CodecError::OperandNotAllowed { position: 2, .. })
        ));
        // branch condition must be a channel
        assert!(matches!(
            decode_program("eAZ"),
            Err(CodecError::OperandNotAllowed { position: 1, .. })
        ));
        // a layout marker inside a bare program
        assert!(matches!(
            decode_program("i@a0"),
            Err(CodecError::UnknownOpcode { code: '@', offset: 1 })
        ));
    }

    #[test]
    fn test_layout_roundtrip() {
        let entries = vec![
            LayoutEntry {
                class: NodeClass::Small,
                slot: 0,
                instructions: program("MOV ACC INPUT\nINC"),
            },
            LayoutEntry {
                class: NodeClass::Tiny,
                slot: 12,
                instructions: vec![],
            },
            LayoutEntry {
                class: NodeClass::Large,
                slot: 3,
                instructions: program("MOV OUTPUT ch1"),
            },
        ];
        let encoded = encode_layout(&entries).unwrap();
        assert_eq!(encoded, "@b0mAIi@a12@d3mOC1");

        let decoded = decode_layout(&encoded).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[1].class, NodeClass::Tiny);
        assert_eq!(decoded[1].slot, 12);
        assert!(decoded[1].instructions.is_empty());
        assert_eq!(encode_layout(&decoded).unwrap(), encoded);
    }

    #[test]
    fn test_malformed_layouts() {
        assert_eq!(decode_layout("b0i"), Err(CodecError::MissingNodeMarker(0)));
        assert_eq!(decode_layout("@"), Err(CodecError::Truncated(1)));
        assert!(matches!(
            decode_layout("@x0i"),
            Err(CodecError::UnknownNodeClass { code: 'x', .. })
        ));
        assert_eq!(decode_layout("@ai"), Err(CodecError::Truncated(2)));
        assert_eq!(decode_layout("@a01i"), Err(CodecError::NonCanonicalNumber(2)));
        assert_eq!(decode_layout("@a300"), Err(CodecError::NumberOutOfRange(2)));
        assert_eq!(decode_layout("@a1i@b1d"), Err(CodecError::DuplicateSlot(1)));
        assert_eq!(decode_layout(""), Ok(vec![]));
    }
}
