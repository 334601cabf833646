//! Error taxonomy shared by the editor core.
//!
//! None of these errors are fatal. The [`Editor`](crate::editor::Editor) turns
//! each one into a transient [`Notice`](crate::editor::Notice) at the point of
//! detection, so a failed operation never leaves the session unusable.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::ExportFormat;
use crate::mindmap::NodeId;

pub type Result<T, E = MindMapError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryDirection {
    Undo,
    Redo,
}

impl fmt::Display for HistoryDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryDirection::Undo => f.write_str("undo"),
            HistoryDirection::Redo => f.write_str("redo"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MindMapError {
    /// The operation referenced a node id that is not in the map.
    #[error("node {0} does not exist")]
    NotFound(NodeId),

    /// The operation is not allowed on its target (deleting the root, for instance).
    #[error("{0}")]
    InvalidOperation(String),

    /// An undirected custom or hierarchy edge already joins the two nodes.
    #[error("connection between {from} and {to} already exists")]
    DuplicateConnection { from: NodeId, to: NodeId },

    #[error("nothing to {0}")]
    EmptyHistory(HistoryDirection),

    /// Storage could not be read or written (quota, permissions, corruption).
    #[error("storage unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("{0} export is not available yet")]
    ExportUnavailable(ExportFormat),
}

impl MindMapError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        MindMapError::InvalidOperation(reason.into())
    }

    pub fn storage(reason: impl fmt::Display) -> Self {
        MindMapError::PersistenceUnavailable(reason.to_string())
    }

    /// Whether the error should stay invisible to the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, MindMapError::NotFound(_))
    }
}
