//! Hot reload of layout directories into a live simulation
//!
//! Edit a `<slot>-<class>.qasm` file and the node in that slot picks up the
//! new program, exactly as if it had been edited in place: the node is
//! reassembled and its runtime state reset, and a halt caused by it clears.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               HotReloadManager                  │
//! ├─────────────────────────────────────────────────┤
//! │  watcher thread ──paths──▶ mpsc ──▶ poll        │
//! │                                                 │
//! │  1. File change detected (watcher thread)       │
//! │  2. Debounce per path (caller thread)           │
//! │  3. Read <slot>-<class>.qasm                    │
//! │  4. Place or replace the node                   │
//! │  5. set_program (assemble, verify, reset)       │
//! │  6. Record reload event                         │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qpca::vm::ReloadableSimulation;
//!
//! let mut live = ReloadableSimulation::from_dir(puzzle, config, "solutions/increment")?;
//! live.sim_mut().start()?;
//!
//! // In main loop
//! let outcome = live.tick(&mut sink)?;
//! ```

use super::events::EventSink;
use super::node::NodeError;
use super::scheduler::{Simulation, TickOutcome};
use crate::config::SimConfig;
use crate::loader::{apply_layout, load_layout_dir, parse_layout_file_name, LayoutFile};
use crate::puzzle::Puzzle;
use anyhow::{bail, Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Reload event recorded when a node program is replaced from disk
#[derive(Debug, Clone)]
pub struct ReloadEvent {
    /// Path of the reloaded file
    pub path: PathBuf,
    /// Slot that received the program
    pub slot: u8,
    /// Timestamp of reload
    pub timestamp: Instant,
    /// Number of instructions in the new program
    pub instruction_count: usize,
    /// Static error in the new program, if any
    pub error: Option<NodeError>,
}

/// Watches a layout directory for changed program files
pub struct HotReloadManager {
    /// Directory being watched
    watch_path: PathBuf,
    /// File watcher
    _watcher: RecommendedWatcher,
    /// Channel for file change events
    change_rx: Receiver<PathBuf>,
    /// Debounce duration to avoid rapid reloads
    debounce: Duration,
    /// Changed paths and when they last changed
    pending: BTreeMap<PathBuf, Instant>,
}

impl HotReloadManager {
    /// Watch a directory of `<slot>-<class>.qasm` files
    pub fn watch_directory(dir: impl AsRef<Path>) -> Result<Self> {
        let watch_path = dir.as_ref().to_path_buf();
        let (tx, rx) = channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) {
                    for path in event.paths {
                        if is_layout_file(&path) {
                            let _ = tx.send(path);
                        }
                    }
                }
            }
        })
        .context("Failed to create file watcher")?;

        watcher
            .watch(&watch_path, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", watch_path.display()))?;

        Ok(Self {
            watch_path,
            _watcher: watcher,
            change_rx: rx,
            debounce: Duration::from_millis(100),
            pending: BTreeMap::new(),
        })
    }

    /// Set debounce duration
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    /// Poll for changed files (non-blocking)
    ///
    /// Returns the files whose debounce period has passed, read from disk.
    pub fn poll_changes(&mut self) -> Result<Vec<LayoutFile>> {
        loop {
            match self.change_rx.try_recv() {
                Ok(path) => {
                    self.pending.insert(path, Instant::now());
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    bail!("File watcher disconnected");
                }
            }
        }

        take_due(&mut self.pending, Instant::now(), self.debounce)
            .into_iter()
            .map(|path| LayoutFile::read(&path))
            .collect()
    }

    /// Get the watch path
    pub fn watch_path(&self) -> &Path {
        &self.watch_path
    }
}

fn is_layout_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_layout_file_name)
        .is_some()
}

/// Remove and return paths that have been quiet for `debounce`
fn take_due(pending: &mut BTreeMap<PathBuf, Instant>, now: Instant, debounce: Duration) -> Vec<PathBuf> {
    let due: Vec<PathBuf> = pending
        .iter()
        .filter(|(_, &changed)| now.saturating_duration_since(changed) >= debounce)
        .map(|(path, _)| path.clone())
        .collect();
    for path in &due {
        pending.remove(path);
    }
    due
}

/// Load one file into the simulation
///
/// A new slot gets a new node. A player node whose class changed is
/// replaced; a puzzle-fixed node cannot change class.
pub fn reload_into(sim: &mut Simulation, file: &LayoutFile) -> Result<ReloadEvent> {
    let timestamp = Instant::now();
    match sim.node(file.slot) {
        None => sim.add_node(file.class, file.slot)?,
        Some(node) if node.class() == file.class => {}
        Some(node) if node.is_fixed() => bail!(
            "{}: slot {} is fixed as {}",
            file.path.display(),
            file.slot,
            node.class()
        ),
        Some(_) => {
            sim.remove_node(file.slot)?;
            sim.add_node(file.class, file.slot)?;
        }
    }
    sim.set_program(file.slot, &file.source)
        .with_context(|| format!("Failed to reload {}", file.path.display()))?;

    let node = sim
        .node(file.slot)
        .with_context(|| format!("Slot {} vanished during reload", file.slot))?;
    log::debug!(
        "Reloaded slot {} from {} ({} instructions)",
        file.slot,
        file.path.display(),
        node.program().len()
    );

    Ok(ReloadEvent {
        path: file.path.clone(),
        slot: file.slot,
        timestamp,
        instruction_count: node.program().len(),
        error: node.error().cloned(),
    })
}

/// Managed hot-reloadable simulation
///
/// Combines a Simulation with a HotReloadManager for automatic reloading.
pub struct ReloadableSimulation {
    /// The simulation
    sim: Simulation,
    /// Hot reload manager
    manager: HotReloadManager,
    /// Reload history
    reload_history: Vec<ReloadEvent>,
    /// Max history entries
    max_history: usize,
}

impl ReloadableSimulation {
    /// Load a layout directory and start watching it
    pub fn from_dir(puzzle: Puzzle, config: SimConfig, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let files = load_layout_dir(dir)?;
        let mut sim = Simulation::new(puzzle, config)?;
        apply_layout(&mut sim, &files)?;
        let manager = HotReloadManager::watch_directory(dir)?;

        Ok(Self {
            sim,
            manager,
            reload_history: Vec::new(),
            max_history: 100,
        })
    }

    /// Set max history entries
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    /// Check for and apply any pending reloads
    ///
    /// Returns the number of files reloaded.
    pub fn check_reload(&mut self) -> Result<usize> {
        let files = self.manager.poll_changes()?;
        for file in &files {
            let event = reload_into(&mut self.sim, file)?;
            self.reload_history.push(event);
            if self.reload_history.len() > self.max_history {
                self.reload_history.remove(0);
            }
        }
        Ok(files.len())
    }

    /// Tick with automatic reload check
    pub fn tick(&mut self, sink: &mut dyn EventSink) -> Result<TickOutcome> {
        self.check_reload()?;
        Ok(self.sim.tick(sink))
    }

    /// Get the simulation
    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    /// Get mutable simulation
    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    /// Get reload history
    pub fn reload_history(&self) -> &[ReloadEvent] {
        &self.reload_history
    }

    /// Get last reload event
    pub fn last_reload(&self) -> Option<&ReloadEvent> {
        self.reload_history.last()
    }

    /// Get the watch path
    pub fn watch_path(&self) -> &Path {
        self.manager.watch_path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::events::NullSink;
    use crate::vm::NodeClass;
    use tempfile::TempDir;

    fn file(dir: &TempDir, name: &str, source: &str) -> LayoutFile {
        let path = dir.path().join(name);
        std::fs::write(&path, source).unwrap();
        LayoutFile::read(&path).unwrap()
    }

    fn puzzle() -> Puzzle {
        Puzzle::single("r", vec![], vec![1])
    }

    #[test]
    fn test_reload_new_and_existing_slot() {
        let dir = TempDir::new().unwrap();
        let mut sim = Simulation::new(puzzle(), SimConfig::headless()).unwrap();

        let event = reload_into(&mut sim, &file(&dir, "2-8x3.qasm", "INC\nDEC")).unwrap();
        assert_eq!(event.slot, 2);
        assert_eq!(event.instruction_count, 2);
        assert!(event.error.is_none());
        assert_eq!(sim.node(2).unwrap().class(), NodeClass::Small);

        let event = reload_into(&mut sim, &file(&dir, "2-8x3.qasm", "BAD")).unwrap();
        assert!(event.error.unwrap().is_static());
        assert_eq!(sim.node(2).unwrap().source(), "BAD");
    }

    #[test]
    fn test_reload_changes_class() {
        let dir = TempDir::new().unwrap();
        let mut sim = Simulation::new(puzzle(), SimConfig::headless()).unwrap();
        reload_into(&mut sim, &file(&dir, "0-8x3.qasm", "INC")).unwrap();
        reload_into(&mut sim, &file(&dir, "0-15x5.qasm", "DEC")).unwrap();
        assert_eq!(sim.node(0).unwrap().class(), NodeClass::Large);
        assert_eq!(sim.nodes().count(), 1);
    }

    #[test]
    fn test_reload_refuses_fixed_class_change() {
        let dir = TempDir::new().unwrap();
        let puzzle = Puzzle {
            fixed_nodes: vec![NodeClass::Tiny],
            ..puzzle()
        };
        let mut sim = Simulation::new(puzzle, SimConfig::headless()).unwrap();
        assert!(reload_into(&mut sim, &file(&dir, "0-8x3.qasm", "INC")).is_err());
        reload_into(&mut sim, &file(&dir, "0-4x1.qasm", "INC")).unwrap();
        assert_eq!(sim.node(0).unwrap().source(), "INC");
    }

    #[test]
    fn test_reload_clears_halt() {
        let dir = TempDir::new().unwrap();
        let mut sim = Simulation::new(puzzle(), SimConfig::headless()).unwrap();
        reload_into(&mut sim, &file(&dir, "0-8x3.qasm", "MOV CH1 1\nMOV ACC CH1")).unwrap();
        sim.start().unwrap();
        sim.run_until_settled(5, &mut NullSink);
        assert!(sim.is_halted());

        reload_into(&mut sim, &file(&dir, "0-8x3.qasm", "MOV OUTPUT 1")).unwrap();
        assert!(!sim.is_halted());
        assert!(matches!(sim.tick(&mut NullSink), TickOutcome::Won(_)));
    }

    #[test]
    fn test_take_due_debounces() {
        let now = Instant::now();
        let mut pending = BTreeMap::new();
        pending.insert(PathBuf::from("0-4x1.qasm"), now);
        pending.insert(PathBuf::from("1-4x1.qasm"), now + Duration::from_millis(80));

        let later = now + Duration::from_millis(100);
        let due = take_due(&mut pending, later, Duration::from_millis(100));
        assert_eq!(due, vec![PathBuf::from("0-4x1.qasm")]);
        assert_eq!(pending.len(), 1);

        let due = take_due(&mut pending, later + Duration::from_millis(100), Duration::from_millis(100));
        assert_eq!(due.len(), 1);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_is_layout_file() {
        assert!(is_layout_file(Path::new("/tmp/x/3-9x3.qasm")));
        assert!(!is_layout_file(Path::new("/tmp/x/notes.qasm")));
        assert!(!is_layout_file(Path::new("/tmp/x/3-9x3.qasm.swp")));
    }
}
