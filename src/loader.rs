//! File loading for puzzles and layouts
//!
//! # Usage
//!
//! ```ignore
//! use qpca::loader::{load_puzzle, load_simulation};
//! use qpca::SimConfig;
//!
//! let puzzle = load_puzzle("puzzles/increment.json")?;
//! let sim = load_simulation("puzzles/increment.json", "solutions/increment", SimConfig::default())?;
//! ```
//!
//! # Layout Directories
//!
//! One program per node, named `<slot>-<class>.qasm`:
//!
//! ```text
//! solutions/increment/
//! ├── 0-8x3.qasm
//! └── 1-8x3.qasm
//! ```
//!
//! Other files are ignored with a warning.

use crate::config::SimConfig;
use crate::puzzle::Puzzle;
use crate::vm::{NodeClass, Simulation};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Program file extension
pub const PROGRAM_EXTENSION: &str = "qasm";

/// Load a puzzle descriptor from JSON
pub fn load_puzzle(path: impl AsRef<Path>) -> Result<Puzzle> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read puzzle: {}", path.display()))?;
    Puzzle::from_json(&text).with_context(|| format!("Failed to parse puzzle: {}", path.display()))
}

/// Parse `<slot>-<class>.qasm` into slot and class
pub fn parse_layout_file_name(name: &str) -> Option<(u8, NodeClass)> {
    let stem = name.strip_suffix(".qasm")?;
    let (slot, class) = stem.split_once('-')?;
    if slot.is_empty() || !slot.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((slot.parse().ok()?, NodeClass::parse(class)?))
}

/// File name for a node
pub fn layout_file_name(slot: u8, class: NodeClass) -> String {
    format!("{}-{}.{}", slot, class, PROGRAM_EXTENSION)
}

/// One node program read from a layout directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutFile {
    pub slot: u8,
    pub class: NodeClass,
    pub path: PathBuf,
    pub source: String,
}

impl LayoutFile {
    /// Read a single layout file; its name must follow `<slot>-<class>.qasm`
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?;
        let Some((slot, class)) = parse_layout_file_name(name) else {
            bail!("Expected <slot>-<class>.qasm, got {}", path.display());
        };
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self {
            slot,
            class,
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Read every layout file in a directory, sorted by slot
pub fn load_layout_dir(dir: impl AsRef<Path>) -> Result<Vec<LayoutFile>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read layout directory: {}", dir.display()))?;

    let mut files: Vec<LayoutFile> = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let named = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_layout_file_name);
        if named.is_none() {
            log::warn!("Ignoring {} (expected <slot>-<class>.qasm)", path.display());
            continue;
        }
        let file = LayoutFile::read(&path)?;
        if let Some(other) = files.iter().find(|f| f.slot == file.slot) {
            bail!(
                "Slot {} defined twice: {} and {}",
                file.slot,
                other.path.display(),
                file.path.display()
            );
        }
        files.push(file);
    }

    files.sort_by_key(|f| f.slot);
    log::debug!("Loaded {} layout files from {}", files.len(), dir.display());
    Ok(files)
}

/// Place layout files into a simulation
///
/// A file for a puzzle-fixed slot must use that slot's class; it only
/// supplies the program.
pub fn apply_layout(sim: &mut Simulation, files: &[LayoutFile]) -> Result<()> {
    for file in files {
        match sim.node(file.slot) {
            Some(node) if node.is_fixed() && node.class() == file.class => {}
            Some(node) => bail!(
                "{}: slot {} already holds a {} node",
                file.path.display(),
                file.slot,
                node.class()
            ),
            None => sim.add_node(file.class, file.slot)?,
        }
        sim.set_program(file.slot, &file.source)
            .with_context(|| format!("Failed to load {}", file.path.display()))?;
    }
    Ok(())
}

/// Load a puzzle and a layout directory into a ready simulation
pub fn load_simulation(
    puzzle_path: impl AsRef<Path>,
    layout_dir: impl AsRef<Path>,
    config: SimConfig,
) -> Result<Simulation> {
    let puzzle = load_puzzle(puzzle_path)?;
    let files = load_layout_dir(layout_dir)?;
    let mut sim = Simulation::new(puzzle, config)?;
    apply_layout(&mut sim, &files)?;
    Ok(sim)
}

/// Write every node's program text to `<slot>-<class>.qasm` files
pub fn save_layout_dir(sim: &Simulation, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let mut written = Vec::new();
    for node in sim.nodes() {
        let path = dir.join(layout_file_name(node.slot(), node.class()));
        std::fs::write(&path, node.source())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::events::NullSink;
    use crate::vm::TickOutcome;
    use tempfile::TempDir;

    const PUZZLE: &str = r#"{
        "id": "copy",
        "title": "Copy",
        "goal": "OUTPUT = INPUT",
        "sets": [{ "input": [3], "output": [3] }]
    }"#;

    #[test]
    fn test_parse_layout_file_name() {
        assert_eq!(parse_layout_file_name("0-8x3.qasm"), Some((0, NodeClass::Small)));
        assert_eq!(parse_layout_file_name("12-15x5.qasm"), Some((12, NodeClass::Large)));
        assert_eq!(parse_layout_file_name("1-8x3.txt"), None);
        assert_eq!(parse_layout_file_name("-8x3.qasm"), None);
        assert_eq!(parse_layout_file_name("+1-8x3.qasm"), None);
        assert_eq!(parse_layout_file_name("1-3x3.qasm"), None);
        assert_eq!(parse_layout_file_name("300-4x1.qasm"), None);
        assert_eq!(layout_file_name(4, NodeClass::Standard), "4-9x3.qasm");
    }

    #[test]
    fn test_load_puzzle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("copy.json");
        std::fs::write(&path, PUZZLE).unwrap();
        let puzzle = load_puzzle(&path).unwrap();
        assert_eq!(puzzle.id, "copy");

        std::fs::write(&path, "{").unwrap();
        let err = load_puzzle(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse puzzle"));
    }

    #[test]
    fn test_load_layout_dir_and_run() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("puzzle.json"), PUZZLE).unwrap();
        let layout = dir.path().join("layout");
        std::fs::create_dir(&layout).unwrap();
        std::fs::write(layout.join("0-8x3.qasm"), "MOV ACC INPUT\nMOV CH1 ACC\nw: JMP w").unwrap();
        std::fs::write(layout.join("1-4x1.qasm"), "w: JEZ CH1 w\nMOV OUTPUT CH1\nx: JMP x").unwrap();
        std::fs::write(layout.join("README.md"), "notes").unwrap();

        let files = load_layout_dir(&layout).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[1].slot, 1);

        let mut sim =
            load_simulation(dir.path().join("puzzle.json"), &layout, SimConfig::headless())
                .unwrap();
        assert_eq!(sim.nodes().count(), 2);
        assert!(sim.nodes().all(|n| n.error().is_none()));
        sim.start().unwrap();
        let outcome = sim.run_until_settled(50, &mut NullSink);
        assert!(matches!(outcome, TickOutcome::Won(score) if score.ticks_elapsed == 4));
        assert_eq!(sim.output(), &[3]);
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("0-8x3.qasm"), "INC").unwrap();
        std::fs::write(dir.path().join("0-4x1.qasm"), "DEC").unwrap();
        let err = load_layout_dir(dir.path()).unwrap_err();
        assert!(err.to_string().contains("Slot 0 defined twice"));
    }

    #[test]
    fn test_save_and_reload_layout() {
        let mut sim = Simulation::new(Puzzle::from_json(PUZZLE).unwrap(), SimConfig::headless()).unwrap();
        sim.add_node(NodeClass::Tiny, 3).unwrap();
        sim.set_program(3, "MOV ACC INPUT\nMOV OUTPUT ACC").unwrap();

        let dir = TempDir::new().unwrap();
        let written = save_layout_dir(&sim, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("3-4x1.qasm")]);

        let files = load_layout_dir(dir.path()).unwrap();
        assert_eq!(files[0].source, "MOV ACC INPUT\nMOV OUTPUT ACC");
        assert_eq!(files[0].class, NodeClass::Tiny);
    }

    #[test]
    fn test_fixed_slot_class_mismatch() {
        let mut puzzle = Puzzle::from_json(PUZZLE).unwrap();
        puzzle.fixed_nodes = vec![NodeClass::Tiny];
        let mut sim = Simulation::new(puzzle, SimConfig::headless()).unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0-8x3.qasm");
        std::fs::write(&path, "INC").unwrap();
        let files = vec![LayoutFile::read(&path).unwrap()];
        assert!(apply_layout(&mut sim, &files).is_err());

        let path = dir.path().join("0-4x1.qasm");
        std::fs::write(&path, "INC").unwrap();
        let files = vec![LayoutFile::read(&path).unwrap()];
        apply_layout(&mut sim, &files).unwrap();
        assert_eq!(sim.node(0).unwrap().source(), "INC");
    }
}
