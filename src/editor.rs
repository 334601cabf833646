//! The editing session: one map plus everything the user is doing to it.
//!
//! [`Editor`] owns all mutable state (map, history, viewport, selection, tool,
//! drag, settings, the store) and is driven through `&mut self`, so one owner
//! serializes every input. Core errors never escape; each is turned into a
//! [`Notice`] where it is detected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::error::{MindMapError, Result};
use crate::export::{self, ExportFormat};
use crate::history::History;
use crate::layout::{GRID_SIZE, Point, auto_layout, snap_to_grid};
use crate::mindmap::{DEFAULT_MAP_TITLE, DEFAULT_NODE_TEXT, MindMap, NodeEdit, NodeId};
use crate::persistence::Storage;
use crate::render::{RenderFrame, project};
use crate::settings::Settings;
use crate::study::{self, Flashcard, Summary};
use crate::viewport::{Viewport, WheelInput};

pub const NEW_MAP_TITLE: &str = "New Mind Map";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Add,
    Delete,
    Connect,
}

impl Tool {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Add => "add",
            Tool::Delete => "delete",
            Tool::Connect => "connect",
        }
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim() {
            "select" => Ok(Tool::Select),
            "add" => Ok(Tool::Add),
            "delete" => Ok(Tool::Delete),
            "connect" => Ok(Tool::Connect),
            other => Err(format!("unknown tool '{other}'")),
        }
    }
}

/// Keyboard and toolbar commands, already decoded from raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    AddChild,
    AddSibling,
    Delete,
    Undo,
    Redo,
    Save,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    Deselect,
    AutoLayout,
    ExpandAll,
    CollapseAll,
    ToggleCollapse,
    Center,
    NewMap,
}

impl Action {
    pub const ALL: [Action; 16] = [
        Action::AddChild,
        Action::AddSibling,
        Action::Delete,
        Action::Undo,
        Action::Redo,
        Action::Save,
        Action::ZoomIn,
        Action::ZoomOut,
        Action::ZoomReset,
        Action::Deselect,
        Action::AutoLayout,
        Action::ExpandAll,
        Action::CollapseAll,
        Action::ToggleCollapse,
        Action::Center,
        Action::NewMap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::AddChild => "add-child",
            Action::AddSibling => "add-sibling",
            Action::Delete => "delete",
            Action::Undo => "undo",
            Action::Redo => "redo",
            Action::Save => "save",
            Action::ZoomIn => "zoom-in",
            Action::ZoomOut => "zoom-out",
            Action::ZoomReset => "zoom-reset",
            Action::Deselect => "deselect",
            Action::AutoLayout => "auto-layout",
            Action::ExpandAll => "expand-all",
            Action::CollapseAll => "collapse-all",
            Action::ToggleCollapse => "toggle-collapse",
            Action::Center => "center",
            Action::NewMap => "new-map",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let token = value.trim();
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == token)
            .ok_or_else(|| format!("unknown action '{token}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A transient message for the user, the equivalent of a toast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Snapshot of the session for status bars and API clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorStatus {
    pub title: String,
    pub tool: Tool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected: Option<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_start: Option<NodeId>,
    pub zoom_percent: u32,
    pub dirty: bool,
    pub can_undo: bool,
    pub can_redo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct NodeDrag {
    node: NodeId,
    /// Pointer position relative to the node, in model space.
    grab: Point,
    before: MindMap,
}

#[derive(Debug, Clone)]
enum Gesture {
    Drag(NodeDrag),
    Pan { last: Point },
}

pub struct Editor {
    map: MindMap,
    history: History,
    viewport: Viewport,
    settings: Settings,
    selected: Option<NodeId>,
    tool: Tool,
    connection_start: Option<NodeId>,
    gesture: Option<Gesture>,
    dirty: bool,
    last_saved_at: Option<DateTime<Utc>>,
    notices: Vec<Notice>,
    storage: Box<dyn Storage>,
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Editor")
            .field("title", &self.map.title)
            .field("nodes", &self.map.nodes.len())
            .field("tool", &self.tool)
            .field("selected", &self.selected)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

fn sentence(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl Editor {
    /// Restores the last session from `storage`. Missing or unusable data
    /// falls back to defaults and a fresh map; the problem is reported as a
    /// notice instead of an error.
    pub fn open(storage: Box<dyn Storage>, config: &EditorConfig) -> Self {
        let viewport = Viewport::new(config.canvas_width, config.canvas_height);
        let mut notices = Vec::new();

        let settings = match storage.load_settings() {
            Ok(settings) => settings.unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "falling back to default settings");
                notices.push(Notice {
                    level: NoticeLevel::Warning,
                    message: "Saved settings could not be read; using defaults".to_string(),
                });
                Settings::default()
            }
        };

        let mut fallback_reason = None;
        let restored = match storage.load_map() {
            Ok(Some(map)) => match map.validate() {
                Ok(()) => Some(map),
                Err(err) => {
                    fallback_reason = Some(err);
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                fallback_reason = Some(err);
                None
            }
        };
        if let Some(err) = fallback_reason {
            warn!(error = %err, "stored map is unusable, starting fresh");
            notices.push(Notice {
                level: NoticeLevel::Warning,
                message: "Saved mind map could not be loaded; started a new one".to_string(),
            });
        }

        let had_stored_map = restored.is_some();
        let map = restored.unwrap_or_else(|| MindMap::new(DEFAULT_MAP_TITLE, viewport.center()));

        let mut editor = Self {
            map,
            history: History::new(config.history_depth),
            viewport,
            settings,
            selected: None,
            tool: Tool::Select,
            connection_start: None,
            gesture: None,
            dirty: false,
            last_saved_at: None,
            notices,
            storage,
        };
        editor.center();
        info!(title = %editor.map.title, restored = had_stored_map, "editor opened");
        editor
    }

    pub fn map(&self) -> &MindMap {
        &self.map
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn connection_start(&self) -> Option<NodeId> {
        self.connection_start
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn status(&self) -> EditorStatus {
        EditorStatus {
            title: self.map.title.clone(),
            tool: self.tool,
            selected: self.selected,
            connection_start: self.connection_start,
            zoom_percent: self.viewport.zoom_percent(),
            dirty: self.dirty,
            can_undo: self.history.can_undo(),
            can_redo: self.history.can_redo(),
            last_saved_at: self.last_saved_at,
        }
    }

    pub fn frame(&self) -> RenderFrame {
        project(&self.map, &self.viewport)
    }

    pub fn summary(&self) -> Summary {
        study::summary(&self.map)
    }

    pub fn flashcards(&self) -> Vec<Flashcard> {
        study::flashcards(&self.map)
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        self.notices.push(Notice {
            level,
            message: message.into(),
        });
    }

    fn report(&mut self, err: MindMapError) {
        if err.is_silent() {
            debug!(error = %err, "ignoring input for missing node");
            return;
        }
        let level = match &err {
            MindMapError::NotFound(_) | MindMapError::InvalidOperation(_) => NoticeLevel::Warning,
            MindMapError::DuplicateConnection { .. }
            | MindMapError::EmptyHistory(_)
            | MindMapError::ExportUnavailable(_) => NoticeLevel::Info,
            MindMapError::PersistenceUnavailable(_) => NoticeLevel::Error,
        };
        self.notify(level, sentence(&err.to_string()));
    }

    /// Checkpoints `before` if the map has changed since it was taken.
    fn record(&mut self, before: MindMap) -> bool {
        if before == self.map {
            return false;
        }
        self.history.checkpoint(&before);
        self.dirty = true;
        true
    }

    fn mutate<T>(&mut self, change: impl FnOnce(&mut MindMap) -> Result<T>) -> Option<T> {
        let before = self.map.clone();
        match change(&mut self.map) {
            Ok(value) => {
                self.record(before);
                Some(value)
            }
            Err(err) => {
                self.report(err);
                None
            }
        }
    }

    /// Drops selection and pending state that point at nodes no longer present.
    fn prune_references(&mut self) {
        if self.selected.is_some_and(|id| !self.map.contains(id)) {
            self.selected = None;
        }
        if self.connection_start.is_some_and(|id| !self.map.contains(id)) {
            self.connection_start = None;
        }
        if let Some(Gesture::Drag(drag)) = &self.gesture {
            if !self.map.contains(drag.node) {
                self.gesture = None;
            }
        }
    }

    fn selected_or_hint(&mut self) -> Option<NodeId> {
        if self.selected.is_none() {
            self.notify(NoticeLevel::Info, "Please select a node first");
        }
        self.selected
    }

    pub fn apply(&mut self, action: Action) {
        debug!(%action, "apply");
        match action {
            Action::AddChild => {
                if let Some(parent) = self.selected_or_hint() {
                    self.add_child(parent);
                }
            }
            Action::AddSibling => {
                self.add_sibling();
            }
            Action::Delete => {
                if let Some(id) = self.selected_or_hint() {
                    self.delete_node(id);
                }
            }
            Action::Undo => {
                self.undo();
            }
            Action::Redo => {
                self.redo();
            }
            Action::Save => {
                self.save();
            }
            Action::ZoomIn => {
                self.viewport.zoom_in();
            }
            Action::ZoomOut => {
                self.viewport.zoom_out();
            }
            Action::ZoomReset => self.viewport.reset_zoom(),
            Action::Deselect => self.deselect(),
            Action::AutoLayout => self.auto_layout(),
            Action::ExpandAll => self.expand_all(),
            Action::CollapseAll => self.collapse_all(),
            Action::ToggleCollapse => {
                if let Some(id) = self.selected_or_hint() {
                    self.toggle_collapse(id);
                }
            }
            Action::Center => self.center(),
            Action::NewMap => self.new_map(),
        }
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.connection_start = None;
    }

    pub fn select(&mut self, id: NodeId) {
        if self.map.contains(id) {
            self.selected = Some(id);
        } else {
            debug!(id, "cannot select missing node");
        }
    }

    /// Clears the selection and any half-made connection.
    pub fn deselect(&mut self) {
        self.selected = None;
        self.connection_start = None;
    }

    /// A single click at screen position `at`, on node `target` if any.
    pub fn click(&mut self, target: Option<NodeId>, at: Point) {
        let Some(id) = target.filter(|id| self.map.contains(*id)) else {
            if let Some(missing) = target {
                debug!(id = missing, "click on missing node");
                return;
            }
            self.deselect();
            if self.tool == Tool::Add {
                let position = self.viewport.screen_to_model(at);
                self.add_free_node(position);
                self.tool = Tool::Select;
            }
            return;
        };

        match self.tool {
            Tool::Select => {
                if self.selected == Some(id) {
                    self.selected = None;
                } else {
                    self.selected = Some(id);
                }
            }
            Tool::Add => {
                self.add_child(id);
                self.tool = Tool::Select;
            }
            Tool::Delete => {
                if self.delete_node(id) {
                    self.tool = Tool::Select;
                }
            }
            Tool::Connect => match self.connection_start.take() {
                None => self.connection_start = Some(id),
                Some(start) if start == id => {}
                Some(start) => {
                    self.connect(start, id);
                    self.tool = Tool::Select;
                }
            },
        }
    }

    /// Returns the node whose edit dialog should open. On empty canvas a
    /// free node is created instead and nothing opens.
    pub fn double_click(&mut self, target: Option<NodeId>, at: Point) -> Option<NodeId> {
        match target {
            Some(id) if self.map.contains(id) => {
                self.selected = Some(id);
                Some(id)
            }
            Some(id) => {
                debug!(id, "double click on missing node");
                None
            }
            None => {
                let position = self.viewport.screen_to_model(at);
                self.add_free_node(position);
                None
            }
        }
    }

    /// Starts dragging `target`, or panning when the press hits empty canvas.
    pub fn pointer_down(&mut self, target: Option<NodeId>, at: Point) {
        if let Err(err) = at.finite() {
            self.gesture = None;
            self.report(err);
            return;
        }
        self.gesture = match target {
            Some(id) => {
                let Some(node) = self.map.find_node(id) else {
                    debug!(id, "pointer down on missing node");
                    return;
                };
                let grab = self.viewport.screen_to_model(at) - node.position();
                let before = self.map.clone();
                self.selected = Some(id);
                Some(Gesture::Drag(NodeDrag {
                    node: id,
                    grab,
                    before,
                }))
            }
            None => Some(Gesture::Pan { last: at }),
        };
    }

    pub fn pointer_move(&mut self, at: Point) {
        match &mut self.gesture {
            Some(Gesture::Drag(drag)) => {
                let mut position = self.viewport.screen_to_model(at) - drag.grab;
                if self.settings.snap_to_grid {
                    position = snap_to_grid(position, GRID_SIZE);
                }
                let id = drag.node;
                if let Err(err) = self.map.move_node(id, position) {
                    self.gesture = None;
                    self.report(err);
                }
            }
            Some(Gesture::Pan { last }) => {
                let delta = at - *last;
                match self.viewport.pan_by(delta) {
                    Ok(()) => *last = at,
                    Err(err) => self.report(err),
                }
            }
            None => {}
        }
    }

    /// Ends the current gesture. A drag that moved its node becomes one
    /// undoable step.
    pub fn pointer_up(&mut self) {
        if let Some(Gesture::Drag(drag)) = self.gesture.take() {
            self.record(drag.before);
        }
    }

    pub fn pan_by(&mut self, delta: Point) {
        if let Err(err) = self.viewport.pan_by(delta) {
            self.report(err);
        }
    }

    pub fn wheel(&mut self, input: WheelInput) {
        if let Err(err) = self.viewport.wheel(input) {
            self.report(err);
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport.resize(width, height);
    }

    pub fn add_child(&mut self, parent: NodeId) -> Option<NodeId> {
        self.mutate(|map| map.add_child(parent, DEFAULT_NODE_TEXT).map(|node| node.id))
    }

    /// Adds a sibling of the selected node. Does nothing for the root or
    /// for free-standing nodes, which have no parent.
    pub fn add_sibling(&mut self) -> Option<NodeId> {
        let id = self.selected_or_hint()?;
        let parent = self.map.find_parent(id).map(|parent| parent.id)?;
        self.add_child(parent)
    }

    pub fn add_free_node(&mut self, at: Point) -> Option<NodeId> {
        self.mutate(|map| map.add_free_node(at, DEFAULT_NODE_TEXT).map(|node| node.id))
    }

    pub fn delete_node(&mut self, id: NodeId) -> bool {
        let removed = self.mutate(|map| map.delete_node(id));
        self.prune_references();
        match removed {
            Some(removed) => {
                debug!(id, removed = removed.len(), "deleted subtree");
                self.notify(NoticeLevel::Success, "Node deleted");
                true
            }
            None => false,
        }
    }

    pub fn connect(&mut self, source: NodeId, target: NodeId) -> bool {
        let created = self.mutate(|map| map.add_connection(source, target)).is_some();
        if created {
            self.notify(NoticeLevel::Success, "Connection created");
        }
        created
    }

    pub fn toggle_collapse(&mut self, id: NodeId) -> Option<bool> {
        self.mutate(|map| map.toggle_collapse(id))
    }

    pub fn expand_all(&mut self) {
        let before = self.map.clone();
        if self.map.expand_all() {
            self.record(before);
            self.notify(NoticeLevel::Success, "All nodes expanded");
        }
    }

    pub fn collapse_all(&mut self) {
        let before = self.map.clone();
        if self.map.collapse_all() {
            self.record(before);
            self.notify(NoticeLevel::Success, "All branches collapsed");
        }
    }

    /// Lays the tree out radially around the canvas midpoint in model space,
    /// ignoring the current pan, and recenters the view on it.
    pub fn auto_layout(&mut self) {
        let center = self.viewport.center();
        let before = self.map.clone();
        auto_layout(&mut self.map, center);
        self.record(before);
        self.center();
        self.notify(NoticeLevel::Success, "Mind map layout optimized");
    }

    pub fn edit_node(&mut self, id: NodeId, edit: NodeEdit) -> bool {
        let updated = self.mutate(|map| map.edit_node(id, edit)).is_some();
        if updated {
            self.notify(NoticeLevel::Success, "Node updated");
        }
        updated
    }

    pub fn edit_selected(&mut self, edit: NodeEdit) -> bool {
        match self.selected_or_hint() {
            Some(id) => self.edit_node(id, edit),
            None => false,
        }
    }

    pub fn set_title(&mut self, title: &str) -> bool {
        self.mutate(|map| {
            if title.trim().is_empty() {
                return Err(MindMapError::invalid("the title cannot be empty"));
            }
            map.set_title(title);
            Ok(())
        })
        .is_some()
    }

    /// Moves the view so the root sits in the middle of the canvas.
    pub fn center(&mut self) {
        if let Some(root) = self.map.root() {
            let position = root.position();
            self.viewport.center_on(position);
        }
    }

    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.map) {
            Ok(previous) => {
                self.restore(previous);
                self.notify(NoticeLevel::Success, "Undo successful");
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.map) {
            Ok(next) => {
                self.restore(next);
                self.notify(NoticeLevel::Success, "Redo successful");
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    fn restore(&mut self, map: MindMap) {
        self.map = map;
        self.gesture = None;
        self.dirty = true;
        self.prune_references();
    }

    /// Whether closing or replacing the map would lose edits.
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Replaces the map with a fresh one. Confirming with the user first is
    /// the caller's job.
    pub fn new_map(&mut self) {
        self.map = MindMap::new(NEW_MAP_TITLE, self.viewport.center());
        self.history.clear();
        self.selected = None;
        self.connection_start = None;
        self.gesture = None;
        self.tool = Tool::Select;
        self.dirty = true;
        self.center();
        info!(id = %self.map.id, "new map");
        self.notify(NoticeLevel::Success, "New mind map created");
    }

    fn persist(&mut self) -> Result<()> {
        self.storage.save_map(&self.map)?;
        self.dirty = false;
        self.last_saved_at = Some(Utc::now());
        Ok(())
    }

    pub fn save(&mut self) -> bool {
        match self.persist() {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Mind map saved");
                true
            }
            Err(err) => {
                warn!(error = %err, "save failed");
                self.report(err);
                false
            }
        }
    }

    /// Called on every autosave tick. Saves quietly when autosave is on and
    /// something changed; failures still produce an error notice.
    pub fn tick_autosave(&mut self) -> bool {
        if !self.settings.autosave || !self.dirty {
            return false;
        }
        match self.persist() {
            Ok(()) => {
                debug!("autosaved");
                true
            }
            Err(err) => {
                warn!(error = %err, "autosave failed");
                self.report(err);
                false
            }
        }
    }

    pub fn update_settings(&mut self, settings: Settings) -> bool {
        self.settings = settings;
        match self.storage.save_settings(&self.settings) {
            Ok(()) => {
                self.notify(NoticeLevel::Success, "Settings saved");
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    /// Builds an export artifact and its suggested file name.
    pub fn export(&mut self, format: ExportFormat) -> Option<(String, Vec<u8>)> {
        match export::export(&self.map, format, self.settings.theme.background()) {
            Ok(bytes) => {
                self.notify(NoticeLevel::Success, format!("Mind map exported as {format}"));
                Some((export::artifact_name(&self.map, format), bytes))
            }
            Err(err) => {
                self.report(err);
                None
            }
        }
    }
}
