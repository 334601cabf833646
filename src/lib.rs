pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod history;
pub mod layout;
pub mod mindmap;
pub mod persistence;
pub mod render;
#[cfg(feature = "server")]
pub mod serve;
pub mod settings;
pub mod study;
pub mod utils;
pub mod viewport;
pub mod visibility;

pub use config::EditorConfig;
pub use editor::{Action, Editor, EditorStatus, Notice, NoticeLevel, Tool};
pub use error::{HistoryDirection, MindMapError, Result};
pub use export::ExportFormat;
pub use history::History;
pub use layout::Point;
pub use mindmap::{Connection, ConnectionKind, MindMap, Node, NodeEdit, NodeId};
pub use persistence::{FileStorage, MemoryStorage, Storage};
pub use render::{RenderFrame, render_svg};
pub use settings::{Settings, Theme};
pub use viewport::{Viewport, WheelInput};
