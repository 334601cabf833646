use std::collections::VecDeque;

use tracing::debug;

use crate::error::{HistoryDirection, MindMapError, Result};
use crate::mindmap::MindMap;

pub const DEFAULT_HISTORY_DEPTH: usize = 30;

/// Bounded undo/redo over full map snapshots.
///
/// Each entry is an independent deep copy, so later edits to the live map
/// never reach into history. Recording a new checkpoint drops the redo
/// branch; past `depth` entries the oldest checkpoint is evicted first.
#[derive(Debug, Clone)]
pub struct History {
    undo: VecDeque<MindMap>,
    redo: Vec<MindMap>,
    depth: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl History {
    pub fn new(depth: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(depth),
            redo: Vec::new(),
            depth: depth.max(1),
        }
    }

    pub fn checkpoint(&mut self, map: &MindMap) {
        self.undo.push_back(map.clone());
        self.redo.clear();
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
    }

    /// Swaps `current` for the most recent checkpoint, keeping `current` for redo.
    pub fn undo(&mut self, current: &MindMap) -> Result<MindMap> {
        let previous = self
            .undo
            .pop_back()
            .ok_or(MindMapError::EmptyHistory(HistoryDirection::Undo))?;
        self.redo.push(current.clone());
        debug!(undo = self.undo.len(), redo = self.redo.len(), "undo");
        Ok(previous)
    }

    pub fn redo(&mut self, current: &MindMap) -> Result<MindMap> {
        let next = self
            .redo
            .pop()
            .ok_or(MindMapError::EmptyHistory(HistoryDirection::Redo))?;
        self.undo.push_back(current.clone());
        while self.undo.len() > self.depth {
            self.undo.pop_front();
        }
        debug!(undo = self.undo.len(), redo = self.redo.len(), "redo");
        Ok(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Point;

    #[test]
    fn undo_then_redo_round_trips() {
        let mut history = History::default();
        let mut map = MindMap::new("History", Point::ORIGIN);
        let before = map.clone();

        history.checkpoint(&map);
        let root = map.root().unwrap().id;
        map.add_child(root, "child").unwrap();
        let after = map.clone();

        let restored = history.undo(&map).unwrap();
        assert_eq!(restored, before);
        assert!(history.can_redo());

        let redone = history.redo(&restored).unwrap();
        assert_eq!(redone, after);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn empty_stacks_report_direction() {
        let mut history = History::default();
        let map = MindMap::default();
        assert_eq!(
            history.undo(&map),
            Err(MindMapError::EmptyHistory(HistoryDirection::Undo))
        );
        assert_eq!(
            history.redo(&map),
            Err(MindMapError::EmptyHistory(HistoryDirection::Redo))
        );
    }

    #[test]
    fn new_checkpoint_discards_redo_branch() {
        let mut history = History::default();
        let map = MindMap::default();
        history.checkpoint(&map);
        history.undo(&map).unwrap();
        assert!(history.can_redo());

        history.checkpoint(&map);
        assert!(!history.can_redo());
    }

    #[test]
    fn depth_is_capped_with_oldest_evicted() {
        let mut history = History::new(3);
        let mut map = MindMap::new("t0", Point::ORIGIN);
        for step in 1..=4 {
            history.checkpoint(&map);
            map.set_title(&format!("t{step}"));
        }
        assert_eq!(history.undo_depth(), 3);

        let mut current = map;
        let mut titles = Vec::new();
        while let Ok(previous) = history.undo(&current) {
            titles.push(previous.title.clone());
            current = previous;
        }
        assert_eq!(titles, vec!["t3", "t2", "t1"]);
    }

    #[test]
    fn snapshots_are_independent_of_live_map() {
        let mut history = History::default();
        let mut map = MindMap::default();
        history.checkpoint(&map);
        map.set_title("changed");
        let restored = history.undo(&map).unwrap();
        assert_eq!(restored.title, crate::mindmap::DEFAULT_MAP_TITLE);
    }
}
