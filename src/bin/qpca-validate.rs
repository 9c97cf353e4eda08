//! qpca-validate - Check node program files before running them
//!
//! # Usage
//!
//! ```bash
//! # Validate all .qasm files in a directory
//! qpca-validate solutions/
//!
//! # Treat lint warnings as failures
//! qpca-validate --strict solutions/increment
//!
//! # Verbose output with class and instruction counts
//! qpca-validate -v solutions/increment/0-8x3.qasm
//! ```
//!
//! # Exit Codes
//!
//! - 0: All files validated successfully
//! - 1: One or more files failed to assemble (or produced warnings with --strict)
//! - 2: Invalid arguments or IO error

use qpca::validate::{validate_directory, validate_file, ValidationResult, ValidationSummary};
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let mut verbose = false;
    let mut strict = false;
    let mut paths = Vec::new();

    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            "-s" | "--strict" => strict = true,
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown option: {}\n", arg);
                print_help();
                return ExitCode::from(2);
            }
            _ => paths.push(arg.clone()),
        }
    }

    if paths.is_empty() {
        eprintln!("Error: No path specified\n");
        print_help();
        return ExitCode::from(2);
    }

    let mut all_results = Vec::new();

    for path_str in &paths {
        let path = Path::new(path_str);

        if !path.exists() {
            eprintln!("Error: Path does not exist: {}", path.display());
            return ExitCode::from(2);
        }

        if path.is_file() {
            let result = validate_file(path);
            print_result(&result, verbose);
            all_results.push(result);
        } else if path.is_dir() {
            match validate_directory(path) {
                Ok(results) => {
                    for result in &results {
                        print_result(result, verbose);
                    }
                    all_results.extend(results);
                }
                Err(e) => {
                    eprintln!("Error reading directory {}: {}", path.display(), e);
                    return ExitCode::from(2);
                }
            }
        }
    }

    let summary = ValidationSummary::from_results(&all_results);
    eprintln!();
    summary.print_report();

    if summary.failed > 0 || (strict && !summary.warnings.is_empty()) {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_result(result: &ValidationResult, verbose: bool) {
    match result {
        ValidationResult::Ok {
            path,
            class,
            program,
            diagnostics,
        } => {
            let marker = if diagnostics.is_empty() { "+" } else { "!" };

            if verbose {
                println!(
                    "{} {} ({}, {}/{} lines, {} instrs)",
                    marker,
                    path.display(),
                    class,
                    program.line_count,
                    class.lines(),
                    program.instructions.len()
                );
            } else {
                println!("{} {}", marker, path.display());
            }

            for d in diagnostics {
                eprintln!("  WARN  line {}: {}", d.line + 1, d.message);
            }
        }
        ValidationResult::Err { path, error } => {
            eprintln!("x {}", path.display());
            if let Some(line) = error.line {
                eprintln!("  line {}: {}", line, error.message);
            } else {
                eprintln!("  {}", error.message);
            }
            if let Some(snippet) = &error.snippet {
                eprintln!("  | {}", snippet);
            }
        }
    }
}

fn print_help() {
    eprintln!("qpca-validate - Validate node program (.qasm) files");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    qpca-validate [OPTIONS] <PATH>...");
    eprintln!();
    eprintln!("ARGS:");
    eprintln!("    <PATH>    File or directory to validate (recursive for directories)");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    -v, --verbose    Show class, line usage and instruction counts");
    eprintln!("    -s, --strict     Fail on lint warnings as well as assembly errors");
    eprintln!("    -h, --help       Print this help message");
    eprintln!();
    eprintln!("Files named <slot>-<class>.qasm are checked against that class's");
    eprintln!("line limit; other .qasm files against the 15x5 limit.");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    All files validated successfully");
    eprintln!("    1    One or more files failed validation");
    eprintln!("    2    Invalid arguments or IO error");
}
