//! # QPCA - Channel-Broadcast Node Puzzles
//!
//! An assembler, codec and lock-step simulation engine for small node
//! programs. Each node runs its own program; nodes communicate only by
//! broadcasting integers on numbered channels, and every node executes one
//! instruction per global tick.
//!
//! ## Core Components
//!
//! - **Assembler**: Source text to instructions with labels resolved to offsets
//! - **Codec**: Compact single-string encoding of programs and whole layouts
//! - **Simulation**: Lock-step scheduler, input/output arbitration, scoring
//! - **Pacer**: Normal and eased fast-forward tick timing over an injected clock
//! - **Hot reload**: Watch a layout directory and swap programs in place
//!
//! ## Example
//!
//! ```ignore
//! use qpca::{Puzzle, SimConfig, Simulation, NodeClass, NullSink};
//!
//! let puzzle = Puzzle::single("inc", vec![1, 2], vec![2, 3]);
//! let mut sim = Simulation::new(puzzle, SimConfig::headless())?;
//! sim.add_node(NodeClass::Small, 0)?;
//! sim.set_program(0, "MOV ACC INPUT\nINC\nMOV OUTPUT ACC")?;
//! sim.start()?;
//! let outcome = sim.run_until_settled(1000, &mut NullSink);
//! ```

// Node VM - assembler, codec, scheduler
pub mod vm;
pub use vm::{
    // Program model
    Instruction, Opcode, Operand, Register, NodeClass,
    // Assembly
    assemble, AssembledProgram, AssemblerError,
    // Codec
    encode_program, decode_program, encode_layout, decode_layout, CodecError, LayoutEntry,
    // Simulation
    Node, NodeError, RunMode, Simulation, TickOutcome,
    EventSink, NullSink, RecordingSink, SimEvent,
    // Pacing
    Clock, ManualClock, MonotonicClock, PaceMode, SimulationDriver, TickPacer,
    // Hot reload
    HotReloadManager, ReloadableSimulation,
};

// Puzzle descriptors and scoring
pub mod puzzle;
pub use puzzle::{Puzzle, Score, TestSet};

// Runtime configuration
pub mod config;
pub use config::{SimConfig, TimingConfig};

// Error types
mod error;
pub use error::{QpcaError, Result};

// File loading - puzzles and layout directories
pub mod loader;
pub use loader::{load_layout_dir, load_puzzle, load_simulation, save_layout_dir, LayoutFile};

// Validation utilities
pub mod validate;
pub use validate::{
    validate_file, validate_directory,
    ValidationResult, ValidationError, ValidationSummary,
};
