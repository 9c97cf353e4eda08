//! Puzzle descriptors and scores
//!
//! Puzzles are data. A descriptor lists ordered test sets, each an input
//! sequence and the exact output sequence a solution must produce, plus any
//! nodes the puzzle places on its own.
//!
//! ```json
//! {
//!   "id": "increment",
//!   "title": "Increment",
//!   "goal": "OUTPUT = INPUT + 1",
//!   "sets": [ { "input": [3, 7], "output": [4, 8] } ],
//!   "fixed_nodes": ["8x3"]
//! }
//! ```

use crate::vm::NodeClass;
use serde::{Deserialize, Serialize};

/// One input/expected-output pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSet {
    pub input: Vec<i64>,
    pub output: Vec<i64>,
}

/// Puzzle descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id: String,
    pub title: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    pub sets: Vec<TestSet>,
    /// Nodes created automatically in slots 0.. and never removable
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixed_nodes: Vec<NodeClass>,
}

impl Puzzle {
    /// Puzzle with a single test set
    pub fn single(id: &str, input: Vec<i64>, output: Vec<i64>) -> Self {
        Self {
            id: id.to_string(),
            title: id.to_string(),
            goal: String::new(),
            desc: None,
            sets: vec![TestSet { input, output }],
            fixed_nodes: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn set(&self, index: usize) -> Option<&TestSet> {
        self.sets.get(index)
    }

    /// Longest expected output across all sets
    pub fn max_expected_output(&self) -> usize {
        self.sets.iter().map(|s| s.output.len()).max().unwrap_or(0)
    }
}

/// Final score of a solved puzzle. Lower is better on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    /// Instructions across all nodes (blank, comment and label-only lines
    /// excluded)
    pub lines_of_code: usize,
    pub total_node_cost: u32,
    pub ticks_elapsed: u64,
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} lines, cost {}, {} ticks",
            self.lines_of_code, self.total_node_cost, self.ticks_elapsed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_descriptor() {
        let json = r#"{
            "id": "increment",
            "title": "Increment",
            "goal": "OUTPUT = INPUT + 1",
            "sets": [
                { "input": [3, 7], "output": [4, 8] },
                { "input": [-1], "output": [0] }
            ],
            "fixed_nodes": ["4x1", "15x5"]
        }"#;
        let puzzle = Puzzle::from_json(json).unwrap();
        assert_eq!(puzzle.sets.len(), 2);
        assert_eq!(puzzle.set(1).unwrap().output, vec![0]);
        assert_eq!(puzzle.fixed_nodes, vec![NodeClass::Tiny, NodeClass::Large]);
        assert_eq!(puzzle.desc, None);
        assert_eq!(puzzle.max_expected_output(), 2);
    }

    #[test]
    fn test_optional_fields_roundtrip() {
        let puzzle = Puzzle::single("id", vec![1], vec![2]);
        let json = serde_json::to_string(&puzzle).unwrap();
        assert!(!json.contains("fixed_nodes"));
        assert!(!json.contains("desc"));
        assert_eq!(Puzzle::from_json(&json).unwrap(), puzzle);
    }

    #[test]
    fn test_unknown_class_rejected() {
        let json = r#"{"id":"x","title":"x","goal":"","sets":[],"fixed_nodes":["2x2"]}"#;
        assert!(Puzzle::from_json(json).is_err());
    }

    #[test]
    fn test_score_display() {
        let score = Score {
            lines_of_code: 15,
            total_node_cost: 6,
            ticks_elapsed: 9,
        };
        assert_eq!(score.to_string(), "15 lines, cost 6, 9 ticks");
    }
}
