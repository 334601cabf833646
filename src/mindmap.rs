use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{MindMapError, Result};
use crate::layout::{Point, child_placement};

pub type NodeId = u64;

pub const DEFAULT_NODE_TEXT: &str = "New Node";
pub const ROOT_NODE_TEXT: &str = "Central Idea";
pub const DEFAULT_MAP_TITLE: &str = "My First Mind Map";
pub const FORMAT_VERSION: f64 = 1.0;

/// Root, then level 1 through 5; deeper levels wrap around.
pub const LEVEL_COLORS: [&str; 6] = [
    "#4f46e5", "#0ea5e9", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6",
];

pub fn level_color(level: u32) -> &'static str {
    LEVEL_COLORS[level as usize % LEVEL_COLORS.len()]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub text: String,
    #[serde(default)]
    pub notes: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(default)]
    pub is_collapsed: bool,
    #[serde(default)]
    pub is_root: bool,
    #[serde(default)]
    pub level: u32,
}

impl Node {
    fn new(id: NodeId, text: &str, at: Point, level: u32) -> Self {
        Self {
            id,
            text: text.to_string(),
            notes: String::new(),
            x: at.x,
            y: at.y,
            color: level_color(level).to_string(),
            icon: None,
            children: Vec::new(),
            is_collapsed: false,
            is_root: false,
            level,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn set_position(&mut self, point: Point) {
        self.x = point.x;
        self.y = point.y;
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Mirrors a parent→child entry in `Node::children`.
    Hierarchy,
    /// Drawn by the user between any two nodes.
    Custom,
}

impl ConnectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionKind::Hierarchy => "hierarchy",
            ConnectionKind::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub kind: ConnectionKind,
}

impl Connection {
    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }

    /// Same endpoints in either direction.
    pub fn joins(&self, a: NodeId, b: NodeId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }
}

/// Fields of a node that the edit dialog can change. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeEdit {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    /// `Some(None)` clears the icon; an explicit JSON `null` maps to it.
    #[serde(default, deserialize_with = "present")]
    pub icon: Option<Option<String>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// The aggregate root: one map with its nodes, connections and id counter.
///
/// This type is the only place nodes and connections are created or
/// destroyed. Ids come from `next_node_id` and are never reused, including
/// after deletion or across undo/redo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MindMap {
    pub id: String,
    pub title: String,
    pub nodes: Vec<Node>,
    pub connections: Vec<Connection>,
    pub next_node_id: NodeId,
    #[serde(default = "default_version")]
    pub version: f64,
}

fn default_version() -> f64 {
    FORMAT_VERSION
}

impl Default for MindMap {
    fn default() -> Self {
        Self::new(DEFAULT_MAP_TITLE, Point::ORIGIN)
    }
}

impl MindMap {
    /// A map holding only its root node, placed at `center`.
    pub fn new(title: &str, center: Point) -> Self {
        let mut map = Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            nodes: Vec::new(),
            connections: Vec::new(),
            next_node_id: 1,
            version: FORMAT_VERSION,
        };

        let id = map.allocate_id();
        let mut root = Node::new(id, ROOT_NODE_TEXT, center, 0);
        root.is_root = true;
        map.nodes.push(root);
        map
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        id
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| node.id == id)
    }

    pub fn find_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn find_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// The unique node listing `child` among its children. `None` for the
    /// root and for free-standing nodes.
    pub fn find_parent(&self, child: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.children.contains(&child))
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.iter().find(|node| node.is_root)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn add_child(&mut self, parent_id: NodeId, text: &str) -> Result<&Node> {
        let parent_index = self
            .index_of(parent_id)
            .ok_or(MindMapError::NotFound(parent_id))?;

        let id = self.allocate_id();
        let parent = &mut self.nodes[parent_index];
        parent.is_collapsed = false;

        let position = child_placement(parent, parent.children.len());
        let child = Node::new(id, text, position, parent.level + 1);
        parent.children.push(id);

        self.connections.push(Connection {
            source: parent_id,
            target: id,
            kind: ConnectionKind::Hierarchy,
        });

        let index = self.nodes.len();
        self.nodes.push(child);
        Ok(&self.nodes[index])
    }

    pub fn add_free_node(&mut self, at: Point, text: &str) -> Result<&Node> {
        let at = at.finite()?;
        let id = self.allocate_id();
        let index = self.nodes.len();
        self.nodes.push(Node::new(id, text, at, 1));
        Ok(&self.nodes[index])
    }

    /// Deletes `id` and its whole subtree. Returns the removed ids, the
    /// target first and then its descendants depth-first.
    pub fn delete_node(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let node = self.find_node(id).ok_or(MindMapError::NotFound(id))?;
        if node.is_root {
            return Err(MindMapError::invalid("cannot delete the root node"));
        }

        let mut removed = vec![id];
        removed.extend(self.descendants(id));
        let doomed: HashSet<NodeId> = removed.iter().copied().collect();

        self.nodes.retain(|node| !doomed.contains(&node.id));
        self.connections
            .retain(|conn| !doomed.contains(&conn.source) && !doomed.contains(&conn.target));
        for node in &mut self.nodes {
            node.children.retain(|child| !doomed.contains(child));
        }

        Ok(removed)
    }

    pub fn add_connection(&mut self, source: NodeId, target: NodeId) -> Result<()> {
        for id in [source, target] {
            if !self.contains(id) {
                return Err(MindMapError::NotFound(id));
            }
        }
        if source == target {
            return Err(MindMapError::invalid("a node cannot be connected to itself"));
        }
        if self.connections.iter().any(|conn| conn.joins(source, target)) {
            return Err(MindMapError::DuplicateConnection {
                from: source,
                to: target,
            });
        }

        self.connections.push(Connection {
            source,
            target,
            kind: ConnectionKind::Custom,
        });
        Ok(())
    }

    /// Flips the collapse flag of a node with children and returns the new value.
    pub fn toggle_collapse(&mut self, id: NodeId) -> Result<bool> {
        let node = self.find_node_mut(id).ok_or(MindMapError::NotFound(id))?;
        if node.children.is_empty() {
            return Err(MindMapError::invalid("only nodes with children can be collapsed"));
        }
        node.is_collapsed = !node.is_collapsed;
        Ok(node.is_collapsed)
    }

    pub fn expand_all(&mut self) -> bool {
        let mut changed = false;
        for node in self.nodes.iter_mut().filter(|node| node.is_collapsed) {
            node.is_collapsed = false;
            changed = true;
        }
        changed
    }

    /// Collapses every branch except the root.
    pub fn collapse_all(&mut self) -> bool {
        let mut changed = false;
        for node in &mut self.nodes {
            if !node.is_root && !node.is_collapsed && node.has_children() {
                node.is_collapsed = true;
                changed = true;
            }
        }
        changed
    }

    pub fn edit_node(&mut self, id: NodeId, edit: NodeEdit) -> Result<()> {
        let node = self.find_node_mut(id).ok_or(MindMapError::NotFound(id))?;
        if let Some(text) = edit.text {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(MindMapError::invalid("node text cannot be empty"));
            }
            node.text = trimmed.to_string();
        }
        if let Some(notes) = edit.notes {
            node.notes = notes;
        }
        if let Some(color) = edit.color {
            node.color = color;
        }
        if let Some(icon) = edit.icon {
            node.icon = icon;
        }
        Ok(())
    }

    pub fn move_node(&mut self, id: NodeId, to: Point) -> Result<()> {
        let to = to.finite()?;
        let node = self.find_node_mut(id).ok_or(MindMapError::NotFound(id))?;
        node.set_position(to);
        Ok(())
    }

    pub fn set_title(&mut self, title: &str) {
        self.title = title.trim().to_string();
    }

    /// Every node reachable from `id` through `children`, depth-first,
    /// excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::from([id]);
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.find_node(id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            out.push(current);
            if let Some(node) = self.find_node(current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// The parent chain of `id`, nearest first, ending at the root or at a
    /// free-standing node.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::from([id]);
        let mut out = Vec::new();
        let mut current = id;
        while let Some(parent) = self.find_parent(current) {
            if !visited.insert(parent.id) {
                break;
            }
            out.push(parent.id);
            current = parent.id;
        }
        out
    }

    /// Checks the structural invariants, reporting the first one broken.
    pub fn validate(&self) -> Result<()> {
        let roots = self.nodes.iter().filter(|node| node.is_root).count();
        if roots != 1 {
            return Err(MindMapError::invalid(format!(
                "expected exactly one root node, found {roots}"
            )));
        }

        let mut ids = HashSet::new();
        for node in &self.nodes {
            if !ids.insert(node.id) {
                return Err(MindMapError::invalid(format!("duplicate node id {}", node.id)));
            }
            if node.id >= self.next_node_id {
                return Err(MindMapError::invalid(format!(
                    "node id {} is not below nextNodeId {}",
                    node.id, self.next_node_id
                )));
            }
        }

        let mut parented = HashSet::new();
        for node in &self.nodes {
            for child in &node.children {
                if !ids.contains(child) {
                    return Err(MindMapError::invalid(format!(
                        "node {} lists missing child {child}",
                        node.id
                    )));
                }
                if !parented.insert(*child) {
                    return Err(MindMapError::invalid(format!(
                        "node {child} has more than one parent"
                    )));
                }
            }
        }

        for conn in &self.connections {
            if !ids.contains(&conn.source) || !ids.contains(&conn.target) {
                return Err(MindMapError::invalid(format!(
                    "connection {} -> {} references a missing node",
                    conn.source, conn.target
                )));
            }
        }

        Ok(())
    }
}
