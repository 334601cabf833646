use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;

use crate::history::DEFAULT_HISTORY_DEPTH;
use crate::viewport::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH};

const AUTOSAVE_SECS_DEFAULT: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    /// Directory holding the last map and the settings file.
    pub data_dir: PathBuf,
    pub autosave_interval: Duration,
    pub history_depth: usize,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl EditorConfig {
    /// Builds a config from `lookup`, falling back to built-in defaults for
    /// unset or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("MINDFLOW_DATA_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        Self {
            data_dir,
            autosave_interval: Duration::from_secs(
                lookup("MINDFLOW_AUTOSAVE_SECS")
                    .and_then(|value| value.parse::<u64>().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(AUTOSAVE_SECS_DEFAULT),
            ),
            history_depth: lookup("MINDFLOW_HISTORY_DEPTH")
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|depth| *depth > 0)
                .unwrap_or(DEFAULT_HISTORY_DEPTH),
            canvas_width: lookup("MINDFLOW_CANVAS_WIDTH")
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|width| *width > 0.0)
                .unwrap_or(DEFAULT_CANVAS_WIDTH),
            canvas_height: lookup("MINDFLOW_CANVAS_HEIGHT")
                .and_then(|value| value.parse::<f64>().ok())
                .filter(|height| *height > 0.0)
                .unwrap_or(DEFAULT_CANVAS_HEIGHT),
        }
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "mindflow")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
