use std::collections::VecDeque;

use tracing::debug;

use crate::config::HistoryConfig;
use crate::params::ParameterSet;

/// Undo/redo over whole Parameter Set snapshots.
///
/// Snapshots are plain clones; 3D LUT payloads sit behind an `Arc`, so a
/// snapshot only copies the scalar fields and curve points.
///
/// Snapshots are taken before destructive actions (commits, presets, crop,
/// end of a rotation drag, auto adjustments), never per slider tick.
#[derive(Clone, Debug)]
pub struct History {
    undo_stack: VecDeque<ParameterSet>,
    redo_stack: VecDeque<ParameterSet>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(config.limit)
    }

    /// Snapshot `current` before it is changed. Clears the redo stack.
    pub fn push(&mut self, current: &ParameterSet) {
        self.redo_stack.clear();
        self.undo_stack.push_back(current.clone());
        if self.undo_stack.len() > self.limit {
            self.undo_stack.pop_front();
        }
        debug!(depth = self.undo_stack.len(), "history push");
    }

    /// Restore the latest snapshot into `current`. Returns `false` when
    /// there is nothing to undo.
    pub fn undo(&mut self, current: &mut ParameterSet) -> bool {
        let Some(snapshot) = self.undo_stack.pop_back() else {
            return false;
        };
        let replaced = restore(current, snapshot);
        self.redo_stack.push_back(replaced);
        debug!(
            undo = self.undo_stack.len(),
            redo = self.redo_stack.len(),
            "undo"
        );
        true
    }

    pub fn redo(&mut self, current: &mut ParameterSet) -> bool {
        let Some(snapshot) = self.redo_stack.pop_back() else {
            return false;
        };
        let replaced = restore(current, snapshot);
        self.undo_stack.push_back(replaced);
        debug!(
            undo = self.undo_stack.len(),
            redo = self.redo_stack.len(),
            "redo"
        );
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}

/// Swap `snapshot` into `current` and return what was there.
///
/// The source type belongs to the scan, not the edit, so it is carried
/// over from `current` and the inversion flag is re-derived from it.
fn restore(current: &mut ParameterSet, mut snapshot: ParameterSet) -> ParameterSet {
    snapshot.set_source_type(current.source_type);
    std::mem::replace(current, snapshot)
}
