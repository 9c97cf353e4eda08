//! Error types for qpca

use crate::vm::codec::CodecError;
use crate::vm::RunMode;
use thiserror::Error;

/// qpca error type
#[derive(Debug, Error)]
pub enum QpcaError {
    /// Requested run-mode transition is not allowed from the current mode
    #[error("Cannot {action} while {from}")]
    InvalidTransition { from: RunMode, action: &'static str },

    /// No node occupies the slot
    #[error("No node in slot {0}")]
    UnknownSlot(u8),

    /// Slot already holds a node
    #[error("Slot {0} is already occupied")]
    SlotOccupied(u8),

    /// Node was placed by the puzzle and cannot be removed
    #[error("Node in slot {0} is fixed by the puzzle")]
    FixedNode(u8),

    /// Puzzle fixes more nodes than there are slots
    #[error("Puzzle fixes {0} nodes, at most 256 fit")]
    TooManyFixedNodes(usize),

    /// Puzzle has nothing to run
    #[error("Puzzle {0} has no test sets")]
    NoTestSets(String),

    /// Unknown node class name
    #[error("Unknown node class: {0}")]
    UnknownNodeClass(String),

    /// Program codec failure
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON descriptor error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QpcaError>;
