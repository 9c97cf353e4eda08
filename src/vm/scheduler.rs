//! Simulation - lock-step scheduler for a layout of nodes
//!
//! ## Tick
//!
//! ```text
//! ┌─ tick n ───────────────────────────────────────────────┐
//! │ input   = puzzle.input[cursor]  (same for every read)  │
//! │ for node in slot order: node.step(snapshot n-1, io)    │
//! │ snapshot n = Σ active broadcasts per channel (clamped) │
//! │ cursor += 1 if any node read INPUT                     │
//! │ runtime error?             -> halt                     │
//! │ output == expected && all input consumed -> next set   │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Nodes see each other only through the previous tick's snapshot, so the
//! stepping order never changes the outcome except for which of two
//! conflicting output writes is reported as the collision.
//!
//! ## Modes
//!
//! ```text
//! Edit --start--> Running --pause--> Paused --resume--> Running
//!   ^                |                  |
//!   +------stop------+------------------+   (stop works from any mode)
//!                    +--last set passes--> Won
//! ```
//!
//! A runtime error halts ticking without leaving `Running`. Editing the
//! offending node (or stopping) clears the halt.

use super::codec::{self, LayoutEntry};
use super::events::{EventSink, SimEvent};
use super::instruction::disassemble;
use super::node::{ChannelMap, Node, NodeError, NodeIo, StepResult};
use super::{clamp_value, NodeClass};
use crate::config::SimConfig;
use crate::error::{QpcaError, Result};
use crate::puzzle::{Puzzle, Score};
use std::collections::BTreeMap;
use std::fmt;

/// Simulation run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunMode {
    Edit,
    Running,
    Paused,
    Won,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Edit => "editing",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Won => "won",
        };
        write!(f, "{}", name)
    }
}

/// What a call to [`Simulation::tick`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No tick ran (not running, or halted)
    Idle,
    /// Tick ran; the current set is still in progress
    Advanced,
    /// Tick ran and passed a set; the next set starts on the next tick
    SetPassed { set_index: usize },
    /// Tick ran and passed the last set
    Won(Score),
    /// A node raised a runtime error; ticking is halted
    Halted { slot: u8, error: NodeError },
}

/// Per-tick input/output arbiter handed to every node
struct TickIo<'a, S: ?Sized> {
    input: &'a [i64],
    cursor: usize,
    consumed: bool,
    expected: &'a [i64],
    output: &'a mut Vec<i64>,
    max_output_len: usize,
    written: Option<i64>,
    slot: u8,
    sink: &'a mut S,
}

impl<S: EventSink + ?Sized> NodeIo for TickIo<'_, S> {
    fn read_input(&mut self) -> i64 {
        match self.input.get(self.cursor) {
            Some(&v) => {
                self.consumed = true;
                v
            }
            None => 0,
        }
    }

    fn write_output(&mut self, value: i64) -> std::result::Result<(), String> {
        if let Some(previous) = self.written {
            if previous == value {
                return Ok(());
            }
            return Err("Output collision".to_string());
        }
        if self.output.len() >= self.max_output_len {
            return Err("Output overflow".to_string());
        }

        let value = clamp_value(value);
        let index = self.output.len();
        self.output.push(value);
        self.written = Some(value);

        self.sink.emit(SimEvent::OutputAccepted {
            slot: self.slot,
            value,
            index,
        });
        let expected = self.expected.get(index).copied();
        if expected != Some(value) {
            self.sink.emit(SimEvent::OutputMismatch {
                slot: self.slot,
                index,
                expected,
                actual: value,
            });
        }
        Ok(())
    }
}

/// A puzzle, a layout of nodes, and their lock-step execution
#[derive(Debug, Clone)]
pub struct Simulation {
    puzzle: Puzzle,
    config: SimConfig,
    /// Nodes by slot; iteration order is the stepping order
    nodes: BTreeMap<u8, Node>,
    channels: ChannelMap,
    mode: RunMode,
    halted: bool,
    set_index: usize,
    sets_passed: usize,
    input_cursor: usize,
    output: Vec<i64>,
    ticks: u64,
    score: Option<Score>,
}

impl Simulation {
    /// Create a simulation in `Edit` mode with the puzzle's fixed nodes in
    /// slots `0..`
    pub fn new(puzzle: Puzzle, config: SimConfig) -> Result<Self> {
        let mut nodes = BTreeMap::new();
        for (index, &class) in puzzle.fixed_nodes.iter().enumerate() {
            let slot = u8::try_from(index)
                .map_err(|_| QpcaError::TooManyFixedNodes(puzzle.fixed_nodes.len()))?;
            nodes.insert(slot, Node::fixed(class, slot));
        }

        Ok(Self {
            puzzle,
            config,
            nodes,
            channels: ChannelMap::new(),
            mode: RunMode::Edit,
            halted: false,
            set_index: 0,
            sets_passed: 0,
            input_cursor: 0,
            output: Vec::new(),
            ticks: 0,
            score: None,
        })
    }

    /// Rebuild a simulation from an encoded layout
    ///
    /// Decoded programs are disassembled back into source text, so every
    /// node ends up editable.
    pub fn from_encoded_layout(puzzle: Puzzle, config: SimConfig, encoded: &str) -> Result<Self> {
        let entries = codec::decode_layout(encoded)?;
        let mut sim = Self::new(puzzle, config)?;

        for entry in entries {
            match sim.nodes.get(&entry.slot) {
                Some(existing) if existing.is_fixed() && existing.class() == entry.class => {}
                Some(_) => return Err(QpcaError::SlotOccupied(entry.slot)),
                None => sim.add_node(entry.class, entry.slot)?,
            }
            sim.set_program(entry.slot, &disassemble(&entry.instructions))?;
        }

        log::debug!("Decoded layout with {} nodes", sim.nodes.len());
        Ok(sim)
    }

    // =========================================================================
    // Layout editing (allowed in every mode)
    // =========================================================================

    /// Place an empty node
    pub fn add_node(&mut self, class: NodeClass, slot: u8) -> Result<()> {
        if self.nodes.contains_key(&slot) {
            return Err(QpcaError::SlotOccupied(slot));
        }
        self.nodes.insert(slot, Node::new(class, slot));
        Ok(())
    }

    /// Remove a player-placed node
    pub fn remove_node(&mut self, slot: u8) -> Result<Node> {
        match self.nodes.get(&slot) {
            None => return Err(QpcaError::UnknownSlot(slot)),
            Some(node) if node.is_fixed() => return Err(QpcaError::FixedNode(slot)),
            Some(_) => {}
        }
        let node = self.nodes.remove(&slot).ok_or(QpcaError::UnknownSlot(slot))?;
        self.rebuild_channels();
        self.clear_halt_if_resolved();
        Ok(node)
    }

    /// Replace a node's program text
    ///
    /// The node is reassembled and its runtime state reset. Programs that
    /// assemble cleanly are checked through the codec round trip first; if
    /// that fails the node is left untouched. Static errors are not failures
    /// here; read them from [`Node::error`].
    pub fn set_program(&mut self, slot: u8, source: &str) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&slot)
            .ok_or(QpcaError::UnknownSlot(slot))?;
        let assembled = node.assemble(source);
        if assembled.error.is_none() {
            codec::verify_roundtrip(&assembled.instructions)?;
        }
        node.install(source, assembled);
        log::debug!(
            "Slot {} program set: {} instructions{}",
            slot,
            node.program().len(),
            if node.error().is_some() { " (static error)" } else { "" }
        );

        self.rebuild_channels();
        self.clear_halt_if_resolved();
        Ok(())
    }

    fn clear_halt_if_resolved(&mut self) {
        if self.halted && self.runtime_errors().next().is_none() {
            log::debug!("Halt cleared");
            self.halted = false;
        }
    }

    /// Current layout, in slot order
    pub fn layout(&self) -> Vec<LayoutEntry> {
        self.nodes
            .values()
            .map(|node| LayoutEntry {
                class: node.class(),
                slot: node.slot(),
                instructions: node.program().to_vec(),
            })
            .collect()
    }

    /// Encode the current layout
    pub fn encode_layout(&self) -> Result<String> {
        Ok(codec::encode_layout(&self.layout())?)
    }

    // =========================================================================
    // Mode transitions
    // =========================================================================

    /// Edit -> Running, from the first set with fresh runtime state
    ///
    /// A puzzle without test sets cannot be started.
    pub fn start(&mut self) -> Result<()> {
        if self.puzzle.sets.is_empty() {
            return Err(QpcaError::NoTestSets(self.puzzle.id.clone()));
        }
        self.transition(RunMode::Edit, RunMode::Running, "start")?;
        self.reset_run();
        log::debug!(
            "Started {} with {} nodes, {} sets",
            self.puzzle.id,
            self.nodes.len(),
            self.puzzle.sets.len()
        );
        Ok(())
    }

    /// Running -> Paused
    pub fn pause(&mut self) -> Result<()> {
        self.transition(RunMode::Running, RunMode::Paused, "pause")
    }

    /// Paused -> Running
    pub fn resume(&mut self) -> Result<()> {
        self.transition(RunMode::Paused, RunMode::Running, "resume")
    }

    /// Any mode -> Edit, discarding runtime state
    pub fn stop(&mut self) {
        self.mode = RunMode::Edit;
        self.reset_run();
    }

    fn transition(&mut self, from: RunMode, to: RunMode, action: &'static str) -> Result<()> {
        if self.mode != from {
            return Err(QpcaError::InvalidTransition {
                from: self.mode,
                action,
            });
        }
        self.mode = to;
        Ok(())
    }

    fn reset_run(&mut self) {
        self.set_index = 0;
        self.sets_passed = 0;
        self.ticks = 0;
        self.halted = false;
        self.score = None;
        self.reset_set_state();
    }

    /// Outputs, input cursor, channels and node registers. Programs stay.
    fn reset_set_state(&mut self) {
        self.output.clear();
        self.input_cursor = 0;
        self.channels.clear();
        for node in self.nodes.values_mut() {
            node.reset_runtime();
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Advance every node by one instruction
    pub fn tick(&mut self, sink: &mut dyn EventSink) -> TickOutcome {
        if self.mode != RunMode::Running || self.halted {
            return TickOutcome::Idle;
        }
        self.ticks += 1;

        let (input, expected): (&[i64], &[i64]) = match self.puzzle.sets.get(self.set_index) {
            Some(set) => (set.input.as_slice(), set.output.as_slice()),
            None => (&[], &[]),
        };

        let mut io = TickIo {
            input,
            cursor: self.input_cursor,
            consumed: false,
            expected,
            output: &mut self.output,
            max_output_len: self.config.max_output_len,
            written: None,
            slot: 0,
            sink: &mut *sink,
        };

        let mut failure: Option<(u8, NodeError)> = None;
        for node in self.nodes.values_mut() {
            io.slot = node.slot();
            if let StepResult::Error(_) = node.step(&self.channels, &mut io) {
                if let (None, Some(err)) = (&failure, node.error()) {
                    failure = Some((node.slot(), err.clone()));
                }
            }
            if node.take_acc_written() {
                io.sink.emit(SimEvent::AccWritten {
                    slot: node.slot(),
                    value: node.acc(),
                });
            }
        }
        let consumed = io.consumed;
        let output_matches = self.output.as_slice() == expected;
        let input_len = input.len();

        self.rebuild_channels();
        if consumed {
            self.input_cursor += 1;
        }

        if let Some((slot, error)) = failure {
            self.halted = true;
            log::warn!(
                "Halted at tick {}: slot {} {}",
                self.ticks,
                slot,
                error
            );
            sink.emit(SimEvent::RuntimeError {
                slot,
                line: error.line(),
                message: error.message().to_string(),
            });
            return TickOutcome::Halted { slot, error };
        }

        if !output_matches || self.input_cursor != input_len {
            return TickOutcome::Advanced;
        }

        // Set passed
        let passed = self.set_index;
        self.sets_passed += 1;
        sink.emit(SimEvent::SetPassed { set_index: passed });

        if self.set_index + 1 < self.puzzle.sets.len() {
            self.set_index += 1;
            self.reset_set_state();
            log::debug!("Set {} passed at tick {}", passed, self.ticks);
            return TickOutcome::SetPassed { set_index: passed };
        }

        let score = self.current_score();
        self.mode = RunMode::Won;
        self.score = Some(score);
        log::info!("Puzzle {} solved: {}", self.puzzle.id, score);
        sink.emit(SimEvent::Won { score });
        TickOutcome::Won(score)
    }

    /// Tick until won, halted or idle, at most `max_ticks` times
    pub fn run_until_settled(&mut self, max_ticks: u64, sink: &mut dyn EventSink) -> TickOutcome {
        let mut last = TickOutcome::Idle;
        for _ in 0..max_ticks {
            last = self.tick(sink);
            match last {
                TickOutcome::Advanced | TickOutcome::SetPassed { .. } => {}
                _ => break,
            }
        }
        last
    }

    /// Aggregate every active broadcast into a fresh channel map
    fn rebuild_channels(&mut self) {
        let mut sums: ChannelMap = BTreeMap::new();
        for node in self.nodes.values() {
            for (id, value) in node.broadcasts() {
                *sums.entry(id).or_insert(0) += value;
            }
        }
        for value in sums.values_mut() {
            *value = clamp_value(*value);
        }
        self.channels = sums;
    }

    fn current_score(&self) -> Score {
        Score {
            lines_of_code: self.nodes.values().map(|n| n.program().len()).sum(),
            total_node_cost: self.nodes.values().map(|n| n.class().cost()).sum(),
            ticks_elapsed: self.ticks,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Stopped by a runtime error (mode stays `Running`)
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn node(&self, slot: u8) -> Option<&Node> {
        self.nodes.get(&slot)
    }

    /// Nodes in slot order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Nodes currently in a runtime error state
    pub fn runtime_errors(&self) -> impl Iterator<Item = (u8, &NodeError)> {
        self.nodes
            .values()
            .filter_map(|n| n.error().filter(|e| e.is_runtime()).map(|e| (n.slot(), e)))
    }

    /// Channel snapshot as of the last tick
    pub fn channels(&self) -> &ChannelMap {
        &self.channels
    }

    pub fn output(&self) -> &[i64] {
        &self.output
    }

    pub fn input_cursor(&self) -> usize {
        self.input_cursor
    }

    pub fn set_index(&self) -> usize {
        self.set_index
    }

    pub fn sets_passed(&self) -> usize {
        self.sets_passed
    }

    /// Ticks since `start`, across all sets
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Final score once `Won`
    pub fn score(&self) -> Option<Score> {
        self.score
    }
}
