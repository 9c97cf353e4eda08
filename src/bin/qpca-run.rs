//! qpca-run - Run a layout against a puzzle without a display
//!
//! # Usage
//!
//! ```bash
//! # Run a layout directory of <slot>-<class>.qasm files
//! qpca-run --puzzle puzzles/increment.json --layout solutions/increment
//!
//! # Run an encoded layout string
//! qpca-run --puzzle puzzles/increment.json --encoded "@b0mAIi..."
//!
//! # Print every event and the encoded layout
//! qpca-run -v --encode --puzzle puzzles/increment.json --layout solutions/increment
//! ```
//!
//! # Exit Codes
//!
//! - 0: Every test set passed
//! - 1: The layout halted on a runtime error or ran out of ticks
//! - 2: Invalid arguments, IO error, or the layout failed to load

use anyhow::{bail, Context, Result};
use qpca::loader::{apply_layout, load_layout_dir, load_puzzle};
use qpca::vm::TickOutcome;
use qpca::{SimConfig, SimEvent, Simulation};
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_MAX_TICKS: u64 = 100_000;

#[derive(Debug, Default)]
struct Args {
    puzzle: Option<PathBuf>,
    layout: Option<PathBuf>,
    encoded: Option<String>,
    config: Option<PathBuf>,
    max_ticks: Option<u64>,
    encode: bool,
    verbose: bool,
}

fn parse_args() -> Result<Option<Args>> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => args.verbose = true,
            "-e" | "--encode" => args.encode = true,
            "-h" | "--help" => return Ok(None),
            "--puzzle" | "--layout" | "--encoded" | "--config" | "--max-ticks" => {
                let value = iter
                    .next()
                    .with_context(|| format!("{} needs a value", arg))?;
                match arg.as_str() {
                    "--puzzle" => args.puzzle = Some(value.into()),
                    "--layout" => args.layout = Some(value.into()),
                    "--encoded" => args.encoded = Some(value),
                    "--config" => args.config = Some(value.into()),
                    _ => {
                        args.max_ticks = Some(
                            value
                                .parse()
                                .with_context(|| format!("Invalid tick count: {}", value))?,
                        )
                    }
                }
            }
            _ => bail!("Unknown argument: {}", arg),
        }
    }

    if args.puzzle.is_none() {
        bail!("No puzzle specified");
    }
    if args.layout.is_some() == args.encoded.is_some() {
        bail!("Specify exactly one of --layout or --encoded");
    }
    Ok(Some(args))
}

fn build_simulation(args: &Args) -> Result<Simulation> {
    let config = match &args.config {
        Some(path) => SimConfig::from_json_file(path)?,
        None => SimConfig::headless(),
    };
    let puzzle_path = args.puzzle.as_ref().context("No puzzle specified")?;
    let puzzle = load_puzzle(puzzle_path)?;

    if let Some(encoded) = &args.encoded {
        return Simulation::from_encoded_layout(puzzle, config, encoded)
            .context("Failed to decode layout");
    }

    let dir = args.layout.as_ref().context("No layout specified")?;
    let files = load_layout_dir(dir)?;
    let mut sim = Simulation::new(puzzle, config)?;
    apply_layout(&mut sim, &files)?;
    Ok(sim)
}

fn print_event(event: &SimEvent) {
    match event {
        SimEvent::OutputAccepted { slot, value, index } => {
            println!("  out[{}] = {} (node {})", index, value, slot)
        }
        SimEvent::OutputMismatch {
            slot,
            index,
            expected,
            actual,
        } => match expected {
            Some(e) => println!("  out[{}] = {}, expected {} (node {})", index, actual, e, slot),
            None => println!("  out[{}] = {}, nothing expected (node {})", index, actual, slot),
        },
        SimEvent::AccWritten { slot, value } => println!("  node {} acc = {}", slot, value),
        SimEvent::RuntimeError {
            slot,
            line,
            message,
        } => println!("  node {} line {}: {}", slot, line + 1, message),
        SimEvent::SetPassed { set_index } => println!("set {} passed", set_index + 1),
        SimEvent::Won { score } => println!("won: {}", score),
    }
}

fn run(args: &Args) -> Result<ExitCode> {
    let mut sim = build_simulation(args)?;

    let static_errors: Vec<_> = sim
        .nodes()
        .filter_map(|n| n.error().filter(|e| e.is_static()).map(|e| (n.slot(), e.clone())))
        .collect();
    if !static_errors.is_empty() {
        for (slot, error) in &static_errors {
            eprintln!("node {}: {}", slot, error);
        }
        bail!("{} node(s) failed to assemble", static_errors.len());
    }

    if args.encode {
        println!("{}", sim.encode_layout()?);
    }

    sim.start()?;
    let max_ticks = args.max_ticks.unwrap_or(DEFAULT_MAX_TICKS);
    let verbose = args.verbose;
    let mut sink = |event: SimEvent| {
        if verbose {
            print_event(&event);
        }
    };
    let outcome = sim.run_until_settled(max_ticks, &mut sink);

    match outcome {
        TickOutcome::Won(score) => {
            println!("PASSED: {}", score);
            Ok(ExitCode::SUCCESS)
        }
        TickOutcome::Halted { slot, error } => {
            println!(
                "HALTED after {} ticks: node {}: {}",
                sim.ticks(),
                slot,
                error
            );
            Ok(ExitCode::FAILURE)
        }
        _ => {
            println!(
                "INCOMPLETE after {} ticks: set {}, {} outputs",
                sim.ticks(),
                sim.set_index() + 1,
                sim.output().len()
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("Error: {}\n", e);
            print_help();
            return ExitCode::from(2);
        }
    };

    match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn print_help() {
    eprintln!("qpca-run - Run a node layout against a puzzle");
    eprintln!();
    eprintln!("USAGE:");
    eprintln!("    qpca-run --puzzle <FILE> (--layout <DIR> | --encoded <STRING>) [OPTIONS]");
    eprintln!();
    eprintln!("OPTIONS:");
    eprintln!("    --puzzle <FILE>       Puzzle descriptor (JSON)");
    eprintln!("    --layout <DIR>        Directory of <slot>-<class>.qasm files");
    eprintln!("    --encoded <STRING>    Encoded layout string");
    eprintln!("    --config <FILE>       Simulation config (JSON)");
    eprintln!("    --max-ticks <N>       Give up after N ticks (default {})", DEFAULT_MAX_TICKS);
    eprintln!("    -e, --encode          Print the encoded layout before running");
    eprintln!("    -v, --verbose         Print every simulation event");
    eprintln!("    -h, --help            Print this help message");
    eprintln!();
    eprintln!("EXIT CODES:");
    eprintln!("    0    Every test set passed");
    eprintln!("    1    Halted or ran out of ticks");
    eprintln!("    2    Invalid arguments or load error");
}
