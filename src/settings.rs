use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    #[default]
    System,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
            Theme::System => "system",
        }
    }

    /// Canvas background used when rendering with this theme.
    pub fn background(&self) -> &'static str {
        match self {
            Theme::Dark => "#111827",
            Theme::Light | Theme::System => "#f9fafb",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            "system" => Ok(Theme::System),
            other => Err(format!("unknown theme '{other}' (expected dark, light or system)")),
        }
    }
}

/// User preferences, persisted separately from the map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub theme: Theme,
    pub autosave: bool,
    /// Stored and reported, but no editor behavior depends on it.
    pub auto_expand: bool,
    pub snap_to_grid: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::System,
            autosave: true,
            auto_expand: true,
            snap_to_grid: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_first_launch() {
        let settings = Settings::default();
        assert_eq!(settings.theme, Theme::System);
        assert!(settings.autosave);
        assert!(settings.auto_expand);
        assert!(!settings.snap_to_grid);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"theme":"dark","snapToGrid":true}"#).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert!(settings.snap_to_grid);
        assert!(settings.autosave);
    }

    #[test]
    fn theme_parses_case_insensitively() {
        assert_eq!("Light".parse::<Theme>().unwrap(), Theme::Light);
        assert!("sepia".parse::<Theme>().is_err());
    }
}
