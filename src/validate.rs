//! Validation utilities for node program files
//!
//! Provides batch validation with detailed error reporting.
//! Two levels of checking:
//! - Assembly (always): syntax, operand kinds, labels, line capacity
//! - Lint (always, reported as diagnostics): patterns that assemble but are
//!   certain or likely to raise a runtime error
//!
//! A file's capacity comes from its `<slot>-<class>.qasm` name; other
//! `.qasm` files are checked against the largest class.
//!
//! # Example
//!
//! ```ignore
//! use qpca::validate::{validate_directory, ValidationResult};
//!
//! let results = validate_directory("solutions")?;
//! for result in &results {
//!     match result {
//!         ValidationResult::Ok { path, program, diagnostics, .. } => {
//!             println!("✓ {}: {} instructions, {} diagnostics",
//!                 path.display(), program.instructions.len(), diagnostics.len());
//!         }
//!         ValidationResult::Err { path, error } => {
//!             eprintln!("✗ {}: {}", path.display(), error);
//!         }
//!     }
//! }
//! ```

use crate::loader::{parse_layout_file_name, PROGRAM_EXTENSION};
use crate::vm::{assemble, AssembledProgram, NodeClass, Opcode, Operand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Lint finding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Zero-based source line
    pub line: usize,
    pub message: String,
}

/// Result of validating a single program file
#[derive(Debug)]
pub enum ValidationResult {
    /// File assembled successfully
    Ok {
        path: PathBuf,
        class: NodeClass,
        program: AssembledProgram,
        diagnostics: Vec<Diagnostic>,
    },
    /// File could not be read or failed to assemble
    Err {
        path: PathBuf,
        error: ValidationError,
    },
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }

    pub fn is_err(&self) -> bool {
        !self.is_ok()
    }

    /// Get the path
    pub fn path(&self) -> &Path {
        match self {
            Self::Ok { path, .. } => path,
            Self::Err { path, .. } => path,
        }
    }

    /// Get diagnostics (empty for Err variant)
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Ok { diagnostics, .. } => diagnostics,
            Self::Err { .. } => &[],
        }
    }
}

/// Validation error with context
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// One-based line number (if available)
    pub line: Option<usize>,
    /// Error message
    pub message: String,
    /// Offending source line (if available)
    pub snippet: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(line) = self.line {
            write!(f, "line {}: {}", line, self.message)?;
        } else {
            write!(f, "{}", self.message)?;
        }
        if let Some(snippet) = &self.snippet {
            write!(f, "\n  | {}", snippet)?;
        }
        Ok(())
    }
}

impl From<std::io::Error> for ValidationError {
    fn from(e: std::io::Error) -> Self {
        Self {
            line: None,
            message: e.to_string(),
            snippet: None,
        }
    }
}

/// Class implied by a file name, or the largest class
pub fn class_for_path(path: &Path) -> NodeClass {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_layout_file_name)
        .map(|(_, class)| class)
        .unwrap_or(NodeClass::Large)
}

/// Validate program text for a node class
pub fn validate_source(path: PathBuf, source: &str, class: NodeClass) -> ValidationResult {
    let program = assemble(source, class.lines());

    if let Some(e) = &program.error {
        let snippet = source
            .lines()
            .nth(e.line)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        return ValidationResult::Err {
            path,
            error: ValidationError {
                line: Some(e.line + 1),
                message: e.message.clone(),
                snippet,
            },
        };
    }

    let diagnostics = lint(&program, class);
    ValidationResult::Ok {
        path,
        class,
        program,
        diagnostics,
    }
}

/// Validate a single program file
pub fn validate_file<P: AsRef<Path>>(path: P) -> ValidationResult {
    let path = path.as_ref().to_path_buf();

    let source = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(e) => {
            return ValidationResult::Err {
                path,
                error: e.into(),
            };
        }
    };

    let class = class_for_path(&path);
    validate_source(path, &source, class)
}

/// Flag instructions that assemble but will fail or likely fail at runtime
pub fn lint(program: &AssembledProgram, class: NodeClass) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    // Channels this program may broadcast on
    let mut broadcast: BTreeSet<u32> = BTreeSet::new();
    for instr in &program.instructions {
        if instr.opcode != Opcode::Mov {
            continue;
        }
        if let (Some(Operand::Channel(id)), Some(src)) = (instr.operand(0), instr.operand(1)) {
            if *src != Operand::Immediate(0) {
                broadcast.insert(*id);
            }
        }
    }

    for instr in &program.instructions {
        let line = instr.source_line;
        if let (Some(Operand::Channel(a)), Some(Operand::Channel(b))) =
            (instr.operand(0), instr.operand(1))
        {
            if instr.opcode == Opcode::Mov && a == b {
                diagnostics.push(Diagnostic {
                    line,
                    message: format!("Reads and writes CH{} in one instruction", a),
                });
                continue;
            }
        }

        let reads = instr
            .operands
            .iter()
            .enumerate()
            .filter(|(i, _)| instr.opcode != Opcode::Mov || *i == 1)
            .filter_map(|(_, op)| op.channel());
        for id in reads {
            if broadcast.contains(&id) {
                diagnostics.push(Diagnostic {
                    line,
                    message: format!(
                        "Reads CH{} which this node also broadcasts; turn it off first",
                        id
                    ),
                });
            }
        }
    }

    if broadcast.len() > class.channels() {
        diagnostics.push(Diagnostic {
            line: 0,
            message: format!(
                "Broadcasts on {} channels but {} allows {}",
                broadcast.len(),
                class,
                class.channels()
            ),
        });
    }

    diagnostics
}

/// Validate all .qasm files in a directory (recursive)
pub fn validate_directory<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<ValidationResult>> {
    let mut results = Vec::new();
    validate_directory_recursive(dir.as_ref(), &mut results)?;

    // Sort by path for consistent output
    results.sort_by(|a, b| a.path().cmp(b.path()));

    Ok(results)
}

fn validate_directory_recursive(
    dir: &Path,
    results: &mut Vec<ValidationResult>,
) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            validate_directory_recursive(&path, results)?;
        } else if path.extension().map_or(false, |e| e == PROGRAM_EXTENSION) {
            results.push(validate_file(&path));
        }
    }

    Ok(())
}

/// Summary of validation results
#[derive(Debug, Default)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, ValidationError)>,
    pub warnings: Vec<(PathBuf, Diagnostic)>,
}

impl ValidationSummary {
    /// Create summary from results
    pub fn from_results(results: &[ValidationResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };

        for result in results {
            match result {
                ValidationResult::Ok {
                    path, diagnostics, ..
                } => {
                    summary.passed += 1;
                    for d in diagnostics {
                        summary.warnings.push((path.clone(), d.clone()));
                    }
                }
                ValidationResult::Err { path, error } => {
                    summary.failed += 1;
                    summary.errors.push((path.clone(), error.clone()));
                }
            }
        }

        summary
    }

    /// Print summary to stderr
    pub fn print_report(&self) {
        if !self.errors.is_empty() {
            eprintln!("\n{} ASSEMBLY ERRORS:", self.errors.len());
            for (path, error) in &self.errors {
                eprintln!("\n  {}", path.display());
                if let Some(line) = error.line {
                    eprintln!("    line {}: {}", line, error.message);
                } else {
                    eprintln!("    {}", error.message);
                }
                if let Some(snippet) = &error.snippet {
                    eprintln!("    | {}", snippet);
                }
            }
            eprintln!();
        }

        if !self.warnings.is_empty() {
            eprintln!("{} WARNINGS:", self.warnings.len());
            for (path, d) in &self.warnings {
                eprintln!("  {}:{}: {}", path.display(), d.line + 1, d.message);
            }
            eprintln!();
        }

        eprintln!(
            "Validated {} files: {} passed, {} failed",
            self.total, self.passed, self.failed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_valid_source() {
        let result = validate_source(
            PathBuf::from("0-8x3.qasm"),
            "MOV ACC INPUT\nINC\nMOV OUTPUT ACC",
            NodeClass::Small,
        );
        assert!(result.is_ok());
        assert!(result.diagnostics().is_empty());
        if let ValidationResult::Ok { program, .. } = result {
            assert_eq!(program.instructions.len(), 3);
        }
    }

    #[test]
    fn test_validate_invalid_source() {
        let result = validate_source(
            PathBuf::from("bad.qasm"),
            "INC\n  FROB acc\nDEC",
            NodeClass::Small,
        );
        match result {
            ValidationResult::Err { error, .. } => {
                assert_eq!(error.line, Some(2));
                assert_eq!(error.message, "Unknown instruction \"FROB\"");
                assert_eq!(error.snippet.as_deref(), Some("FROB acc"));
                assert!(error.to_string().starts_with("line 2: "));
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_capacity_from_file_name() {
        assert_eq!(class_for_path(Path::new("dir/3-4x1.qasm")), NodeClass::Tiny);
        assert_eq!(class_for_path(Path::new("dir/scratch.qasm")), NodeClass::Large);

        let dir = TempDir::new().unwrap();
        let source = "INC\nINC\nINC\nINC\nINC";
        std::fs::write(dir.path().join("0-4x1.qasm"), source).unwrap();
        std::fs::write(dir.path().join("1-8x3.qasm"), source).unwrap();

        let results = validate_directory(dir.path()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_err());
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_lint() {
        let program = assemble("MOV CH1 CH1\nMOV CH2 5\nMOV ACC CH2\nMOV CH3 ACC", 15);
        let diagnostics = lint(&program, NodeClass::Tiny);
        assert_eq!(diagnostics.len(), 3);
        assert_eq!(diagnostics[0].line, 0);
        assert!(diagnostics[1].message.contains("CH2"));
        assert!(diagnostics[2].message.contains("4x1 allows 1"));

        // Turning a channel off is not a broadcast
        let program = assemble("MOV CH1 0\nJEZ CH1 0", 8);
        assert!(lint(&program, NodeClass::Small).is_empty());
    }

    #[test]
    fn test_directory_and_summary() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(dir.path().join("0-8x3.qasm"), "MOV ACC INPUT").unwrap();
        std::fs::write(nested.join("1-8x3.qasm"), "JMP nowhere").unwrap();
        std::fs::write(nested.join("readme.txt"), "ignored").unwrap();

        let results = validate_directory(dir.path()).unwrap();
        assert_eq!(results.len(), 2);

        let summary = ValidationSummary::from_results(&results);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.errors[0].1.message, "Unknown label \"NOWHERE\"");
    }

    #[test]
    fn test_missing_file() {
        let result = validate_file("/nonexistent/0-8x3.qasm");
        assert!(result.is_err());
        assert_eq!(result.path(), Path::new("/nonexistent/0-8x3.qasm"));
    }
}
