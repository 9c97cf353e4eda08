//! Simulation events
//!
//! The scheduler reports everything a presentation layer might react to
//! (sounds, highlights, score screens) through an [`EventSink`] passed in by
//! the caller.

use crate::puzzle::Score;

/// Something observable happened during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    /// A value was appended to the output stream
    OutputAccepted { slot: u8, value: i64, index: usize },
    /// An appended value differs from the expected one at that position
    OutputMismatch {
        slot: u8,
        index: usize,
        expected: Option<i64>,
        actual: i64,
    },
    /// A node stored into its accumulator
    AccWritten { slot: u8, value: i64 },
    /// A node raised a runtime error; ticking halts
    RuntimeError { slot: u8, line: usize, message: String },
    /// A test set passed
    SetPassed { set_index: usize },
    /// Every test set passed
    Won { score: Score },
}

/// Receiver for simulation events
pub trait EventSink {
    fn emit(&mut self, event: SimEvent);
}

/// Discards events
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: SimEvent) {}
}

/// Keeps every event, for tests and replays
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub events: Vec<SimEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain recorded events
    pub fn take(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: SimEvent) {
        self.events.push(event);
    }
}

impl<F: FnMut(SimEvent)> EventSink for F {
    fn emit(&mut self, event: SimEvent) {
        self(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink() {
        let mut sink = RecordingSink::new();
        sink.emit(SimEvent::SetPassed { set_index: 0 });
        sink.emit(SimEvent::AccWritten { slot: 1, value: 4 });
        assert_eq!(sink.events.len(), 2);
        let drained = sink.take();
        assert_eq!(drained[0], SimEvent::SetPassed { set_index: 0 });
        assert!(sink.events.is_empty());
    }

    #[test]
    fn test_closure_sink() {
        let mut count = 0;
        {
            let mut sink = |_e: SimEvent| count += 1;
            sink.emit(SimEvent::SetPassed { set_index: 2 });
            sink.emit(SimEvent::SetPassed { set_index: 3 });
        }
        assert_eq!(count, 2);
    }
}
