//! Node - one processor's runtime state and its single-step transition
//!
//! A node owns its program, accumulator, program counter and the channels it
//! is currently broadcasting on. It sees other nodes only through the channel
//! snapshot handed to [`Node::step`], and reaches puzzle input/output only
//! through the [`NodeIo`] port, so the scheduler arbitrates both.
//!
//! ```text
//! ┌────────────── Node (8x3) ──────────────┐
//! │ program   MOV ACC INPUT ...   pc ──▶ 1  │
//! │ acc       3                            │
//! │ broadcast ch1=3  ch3=7  (max 3)        │
//! └────────────────────────────────────────┘
//!         ▲ snapshot            │ broadcasts
//!         └──── ChannelMap ◀────┘  (rebuilt each tick)
//! ```

use super::assembler::{assemble, AssembledProgram};
use super::labels::normalize_offset;
use super::{clamp_value, Instruction, NodeClass, Opcode, Operand, Register};
use std::collections::BTreeMap;
use std::fmt;

/// Channel id to aggregate value, as of the end of the previous tick
pub type ChannelMap = BTreeMap<u32, i64>;

/// Node error state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// Parse, validation or label error; the node is never stepped
    Static { line: usize, message: String },
    /// Raised while stepping; halts the simulation
    Runtime { line: usize, message: String },
}

impl NodeError {
    pub fn line(&self) -> usize {
        match self {
            Self::Static { line, .. } | Self::Runtime { line, .. } => *line,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Static { message, .. } | Self::Runtime { message, .. } => message,
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static { .. })
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, Self::Runtime { .. })
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Line {}: {}", self.line() + 1, self.message())
    }
}

/// Puzzle input/output as seen from one node
pub trait NodeIo {
    /// Current input value, or 0 once the input is exhausted
    fn read_input(&mut self) -> i64;

    /// Offer a value to the output stream; `Err` carries the runtime error
    fn write_output(&mut self, value: i64) -> Result<(), String>;
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// Nothing to run (empty program or error state)
    Idle,
    /// Executed, pc moved to the next instruction
    Continue,
    /// Executed a taken jump
    Jumped,
    /// Runtime error raised; pc unchanged
    Error(String),
}

/// A processor node
#[derive(Debug, Clone)]
pub struct Node {
    class: NodeClass,
    slot: u8,
    fixed: bool,
    source: String,
    program: Vec<Instruction>,
    labels: BTreeMap<String, usize>,
    line_count: usize,
    acc: i64,
    pc: usize,
    /// Active broadcast ids, in activation order
    active: Vec<u32>,
    /// Broadcast values for `active`
    values: BTreeMap<u32, i64>,
    error: Option<NodeError>,
    acc_written: bool,
}

impl Node {
    pub fn new(class: NodeClass, slot: u8) -> Self {
        Self {
            class,
            slot,
            fixed: false,
            source: String::new(),
            program: Vec::new(),
            labels: BTreeMap::new(),
            line_count: 0,
            acc: 0,
            pc: 0,
            active: Vec::new(),
            values: BTreeMap::new(),
            error: None,
            acc_written: false,
        }
    }

    /// A node placed by the puzzle itself
    pub fn fixed(class: NodeClass, slot: u8) -> Self {
        Self {
            fixed: true,
            ..Self::new(class, slot)
        }
    }

    /// Replace the program text, reassemble and reset runtime state
    pub fn set_program(&mut self, source: &str) {
        let assembled = self.assemble(source);
        self.install(source, assembled);
    }

    /// Assemble against this node's line capacity without touching it
    pub fn assemble(&self, source: &str) -> AssembledProgram {
        assemble(source, self.class.lines())
    }

    /// Replace program and source with an already assembled program
    pub(crate) fn install(&mut self, source: &str, assembled: AssembledProgram) {
        self.source = source.to_string();
        self.program = assembled.instructions;
        self.labels = assembled.labels;
        self.line_count = assembled.line_count;
        self.error = assembled.error.map(|e| NodeError::Static {
            line: e.line,
            message: e.message,
        });
        self.reset_runtime();
    }

    /// Clear registers, broadcasts and any runtime error. Programs and
    /// static errors are kept.
    pub fn reset_runtime(&mut self) {
        self.acc = 0;
        self.pc = 0;
        self.active.clear();
        self.values.clear();
        self.acc_written = false;
        if matches!(self.error, Some(NodeError::Runtime { .. })) {
            self.error = None;
        }
    }

    /// Can this node execute?
    pub fn is_steppable(&self) -> bool {
        self.error.is_none() && !self.program.is_empty()
    }

    /// Execute one instruction
    pub fn step(&mut self, channels: &ChannelMap, io: &mut dyn NodeIo) -> StepResult {
        if !self.is_steppable() {
            return StepResult::Idle;
        }

        let instr = self.program[self.pc].clone();
        match self.execute(&instr, channels, io) {
            Ok(Some(offset)) => {
                let len = self.program.len();
                self.pc = (self.pc + offset) % len;
                StepResult::Jumped
            }
            Ok(None) => {
                self.pc = (self.pc + 1) % self.program.len();
                StepResult::Continue
            }
            Err(message) => {
                log::debug!(
                    "Node {} runtime error at line {}: {}",
                    self.slot,
                    instr.source_line + 1,
                    message
                );
                self.error = Some(NodeError::Runtime {
                    line: instr.source_line,
                    message: message.clone(),
                });
                StepResult::Error(message)
            }
        }
    }

    /// Execute an instruction. `Ok(Some(offset))` is a taken jump.
    fn execute(
        &mut self,
        instr: &Instruction,
        channels: &ChannelMap,
        io: &mut dyn NodeIo,
    ) -> Result<Option<usize>, String> {
        match instr.opcode {
            Opcode::Mov => {
                let (dst, src) = match instr.operands.as_slice() {
                    [dst, src] => (dst, src),
                    _ => return Err(format!("{} requires 2 operand(s)", instr.opcode)),
                };
                if let (Some(a), Some(b)) = (dst.channel(), src.channel()) {
                    if a == b {
                        return Err(format!("Cannot read and write CH{} at once", a));
                    }
                }
                let value = self.read(src, channels, io)?;
                self.write(dst, value, io)?;
                Ok(None)
            }
            Opcode::Inc => {
                self.store_acc(self.acc.saturating_add(1));
                Ok(None)
            }
            Opcode::Dec => {
                self.store_acc(self.acc.saturating_sub(1));
                Ok(None)
            }
            Opcode::Neg => {
                self.store_acc(-self.acc);
                Ok(None)
            }
            Opcode::Jmp => {
                let target = instr.jump_target().ok_or("Missing jump target")?;
                self.jump_offset(target, channels, io).map(Some)
            }
            Opcode::Jlz | Opcode::Jez | Opcode::Jgz | Opcode::Jnz => {
                let cond = instr.operand(0).ok_or("Missing channel")?;
                let value = self.read(cond, channels, io)?;
                let taken = instr
                    .opcode
                    .condition()
                    .map_or(false, |c| c.holds(value));
                if !taken {
                    return Ok(None);
                }
                let target = instr.jump_target().ok_or("Missing jump target")?;
                self.jump_offset(target, channels, io).map(Some)
            }
        }
    }

    /// Resolve a jump target to an offset in `[0, len)`
    fn jump_offset(
        &mut self,
        target: &Operand,
        channels: &ChannelMap,
        io: &mut dyn NodeIo,
    ) -> Result<usize, String> {
        let raw = match target {
            Operand::RelativeOffset(offset) => *offset as i64,
            Operand::UnresolvedLabel(name) => {
                return Err(format!("Unknown label \"{}\"", name.to_uppercase()))
            }
            live => self.read(live, channels, io)?,
        };
        Ok(normalize_offset(raw, self.program.len()) as usize)
    }

    /// Evaluate a source operand
    fn read(
        &mut self,
        op: &Operand,
        channels: &ChannelMap,
        io: &mut dyn NodeIo,
    ) -> Result<i64, String> {
        match op {
            Operand::Immediate(v) => Ok(*v),
            Operand::RelativeOffset(v) => Ok(*v as i64),
            Operand::Register(Register::Acc) => Ok(self.acc),
            Operand::Register(Register::Nil) => Ok(0),
            Operand::Register(Register::Input) => Ok(io.read_input()),
            Operand::Register(Register::Output) => Err("OUTPUT cannot be read".to_string()),
            Operand::Channel(id) => {
                if self.values.contains_key(id) {
                    return Err(format!("Cannot read CH{} while broadcasting on it", id));
                }
                Ok(channels.get(id).copied().unwrap_or(0))
            }
            Operand::UnresolvedLabel(name) => {
                Err(format!("Unknown label \"{}\"", name.to_uppercase()))
            }
        }
    }

    /// Store into a destination operand
    fn write(&mut self, op: &Operand, value: i64, io: &mut dyn NodeIo) -> Result<(), String> {
        let value = clamp_value(value);
        match op {
            Operand::Register(Register::Nil) => Ok(()),
            Operand::Register(Register::Acc) => {
                self.store_acc(value);
                Ok(())
            }
            Operand::Register(Register::Output) => io.write_output(value),
            Operand::Register(Register::Input) => Err("INPUT cannot be written to".to_string()),
            Operand::Channel(id) => self.broadcast(*id, value),
            other => Err(format!("Cannot write to {}", other)),
        }
    }

    fn store_acc(&mut self, value: i64) {
        self.acc = clamp_value(value);
        self.acc_written = true;
    }

    /// Start, update or stop a broadcast. Zero turns it off.
    fn broadcast(&mut self, id: u32, value: i64) -> Result<(), String> {
        if value == 0 {
            self.active.retain(|&c| c != id);
            self.values.remove(&id);
            return Ok(());
        }
        if !self.values.contains_key(&id) {
            if self.active.len() >= self.class.channels() {
                return Err(format!("Too many channels (max {})", self.class.channels()));
            }
            self.active.push(id);
        }
        self.values.insert(id, value);
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn class(&self) -> NodeClass {
        self.class
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &[Instruction] {
        &self.program
    }

    pub fn labels(&self) -> &BTreeMap<String, usize> {
        &self.labels
    }

    /// Physical source lines
    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn acc(&self) -> i64 {
        self.acc
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Source line of the next instruction, if any
    pub fn current_line(&self) -> Option<usize> {
        self.program.get(self.pc).map(|i| i.source_line)
    }

    /// Active broadcast ids, in activation order
    pub fn active_channels(&self) -> &[u32] {
        &self.active
    }

    /// Active broadcasts as (id, value)
    pub fn broadcasts(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.values.iter().map(|(&id, &v)| (id, v))
    }

    pub fn error(&self) -> Option<&NodeError> {
        self.error.as_ref()
    }

    /// Read and clear the accumulator-activity flag
    pub fn take_acc_written(&mut self) -> bool {
        std::mem::take(&mut self.acc_written)
    }
}
