//! Label resolution
//!
//! Labels name source lines. A label resolves to the first instruction at or
//! after its line; a label with nothing after it (end of file) resolves to
//! instruction 0, so it loops back to the start.
//!
//! Every static jump target is stored as an offset relative to its own
//! instruction, normalized into `[0, len)`, so execution adds it to the
//! program counter and wraps.

use super::{AssemblerError, Instruction, Operand};
use std::collections::BTreeMap;

/// Map each label to an instruction index
pub fn label_indices(
    instructions: &[Instruction],
    label_lines: &BTreeMap<String, usize>,
) -> BTreeMap<String, usize> {
    label_lines
        .iter()
        .map(|(name, &line)| (name.clone(), index_at_or_after(instructions, line)))
        .collect()
}

/// Index of the first instruction whose source line is `>= line`, or 0
pub fn index_at_or_after(instructions: &[Instruction], line: usize) -> usize {
    instructions
        .iter()
        .position(|instr| instr.source_line >= line)
        .unwrap_or(0)
}

/// Normalize a relative offset into `[0, len)`
pub fn normalize_offset(offset: i64, len: usize) -> i32 {
    if len == 0 {
        return 0;
    }
    offset.rem_euclid(len as i64) as i32
}

/// Resolve symbolic and numeric jump targets in place
///
/// Returns the label-to-index table and one error per unknown label
/// reference, in instruction order. Unknown references are left unresolved.
pub fn resolve_labels(
    instructions: &mut [Instruction],
    label_lines: &BTreeMap<String, usize>,
) -> (BTreeMap<String, usize>, Vec<AssemblerError>) {
    let table = label_indices(instructions, label_lines);
    let len = instructions.len();
    let mut errors = Vec::new();

    for (idx, instr) in instructions.iter_mut().enumerate() {
        let line = instr.source_line;
        let Some(target) = instr.jump_target_mut() else {
            continue;
        };
        match target {
            Operand::UnresolvedLabel(name) => match table.get(name.as_str()) {
                Some(&dest) => {
                    let offset = dest as i64 - idx as i64;
                    *target = Operand::RelativeOffset(normalize_offset(offset, len));
                }
                None => errors.push(AssemblerError {
                    line,
                    message: format!("Unknown label \"{}\"", name.to_uppercase()),
                }),
            },
            Operand::RelativeOffset(offset) => {
                *offset = normalize_offset(*offset as i64, len);
            }
            _ => {}
        }
    }

    (table, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{Opcode, Register};

    fn jmp(target: Operand, line: usize) -> Instruction {
        Instruction::new(Opcode::Jmp, vec![target], line)
    }

    fn inc(line: usize) -> Instruction {
        Instruction::new(Opcode::Inc, vec![], line)
    }

    #[test]
    fn test_label_points_at_next_instruction() {
        // line 0: inc, line 1: (blank), line 2: top: (label only), line 3: inc
        let instrs = vec![inc(0), inc(3)];
        let mut lines = BTreeMap::new();
        lines.insert("top".to_string(), 2);
        let table = label_indices(&instrs, &lines);
        assert_eq!(table["top"], 1);
    }

    #[test]
    fn test_label_at_end_wraps_to_start() {
        let instrs = vec![inc(0), inc(1)];
        let mut lines = BTreeMap::new();
        lines.insert("end".to_string(), 5);
        let table = label_indices(&instrs, &lines);
        assert_eq!(table["end"], 0);
    }

    #[test]
    fn test_backward_jump_normalized() {
        let mut instrs = vec![
            inc(0),
            inc(1),
            jmp(Operand::UnresolvedLabel("top".to_string()), 2),
        ];
        let mut lines = BTreeMap::new();
        lines.insert("top".to_string(), 0);
        let (_, errors) = resolve_labels(&mut instrs, &lines);
        assert!(errors.is_empty());
        // 0 - 2 = -2 => 1 (mod 3)
        assert_eq!(instrs[2].operands[0], Operand::RelativeOffset(1));
    }

    #[test]
    fn test_numeric_offsets_normalized() {
        let mut instrs = vec![
            inc(0),
            jmp(Operand::RelativeOffset(-1), 1),
            jmp(Operand::RelativeOffset(7), 2),
        ];
        let (_, errors) = resolve_labels(&mut instrs, &BTreeMap::new());
        assert!(errors.is_empty());
        assert_eq!(instrs[1].operands[0], Operand::RelativeOffset(2));
        assert_eq!(instrs[2].operands[0], Operand::RelativeOffset(1));
    }

    #[test]
    fn test_computed_targets_untouched() {
        let mut instrs = vec![jmp(Operand::Register(Register::Acc), 0)];
        let (_, errors) = resolve_labels(&mut instrs, &BTreeMap::new());
        assert!(errors.is_empty());
        assert_eq!(instrs[0].operands[0], Operand::Register(Register::Acc));
    }

    #[test]
    fn test_unknown_label_reported_at_instruction_line() {
        let mut instrs = vec![inc(0), jmp(Operand::UnresolvedLabel("nowhere".to_string()), 4)];
        let (_, errors) = resolve_labels(&mut instrs, &BTreeMap::new());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, 4);
        assert!(errors[0].message.contains("NOWHERE"));
    }

    #[test]
    fn test_normalize_offset() {
        assert_eq!(normalize_offset(-1, 5), 4);
        assert_eq!(normalize_offset(5, 5), 0);
        assert_eq!(normalize_offset(12, 5), 2);
        assert_eq!(normalize_offset(3, 0), 0);
    }
}
