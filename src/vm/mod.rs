//! Node VM - assembler, codec and lock-step simulation of node programs
//!
//! Players write short programs for independent nodes. Nodes share nothing
//! but numeric broadcast channels; all of them execute one instruction per
//! global tick, then the channel map is rebuilt for the next tick.
//!
//! ## Pipeline
//!
//! ```text
//! source text ──assembler──▶ instructions ──labels──▶ resolved program
//!                                                      │        │
//!                                               codec ◀┘        └▶ node.step
//!                                          "mAIimOA"                │
//!                                                              scheduler tick
//! ```
//!
//! ## Value Range
//!
//! Every stored value (accumulator, broadcasts, channel sums, output) is
//! clamped to `[MIN_VALUE, MAX_VALUE]`.
//!
//! ## Example Program
//!
//! ```text
//! ; emit INPUT + 1 forever
//! top: MOV ACC INPUT
//! INC
//! MOV OUTPUT ACC
//! JMP top
//! ```

pub mod assembler;
pub mod codec;
pub mod events;
mod hot_reload;
mod instruction;
pub mod labels;
mod node;
mod node_class;
mod opcode;
pub mod pacer;
mod register;
pub mod scheduler;

pub use assembler::{assemble, assemble_strict, AssembledProgram, Assembler, AssemblerError};
pub use codec::{
    decode_layout, decode_program, encode_layout, encode_program, verify_roundtrip, CodecError,
    LayoutEntry,
};
pub use events::{EventSink, NullSink, RecordingSink, SimEvent};
pub use hot_reload::{reload_into, HotReloadManager, ReloadEvent, ReloadableSimulation};
pub use instruction::{disassemble, Instruction, Operand};
pub use node::{ChannelMap, Node, NodeError, NodeIo, StepResult};
pub use node_class::NodeClass;
pub use opcode::{Condition, Opcode, OperandKind};
pub use pacer::{Clock, ManualClock, MonotonicClock, PaceMode, SimulationDriver, TickPacer};
pub use register::{parse_channel, Register};
pub use scheduler::{RunMode, Simulation, TickOutcome};

/// Smallest storable value
pub const MIN_VALUE: i64 = -490;

/// Largest storable value
pub const MAX_VALUE: i64 = 490;

/// Saturate a value into `[MIN_VALUE, MAX_VALUE]`
#[inline]
pub fn clamp_value(value: i64) -> i64 {
    value.clamp(MIN_VALUE, MAX_VALUE)
}
