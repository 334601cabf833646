use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MindMapError, Result};
use crate::mindmap::MindMap;
use crate::render::{project_fitted, render_svg};
use crate::utils::file_stem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Svg,
    Png,
    Pdf,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Svg => "svg",
            ExportFormat::Png => "png",
            ExportFormat::Pdf => "pdf",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Png => "image/png",
            ExportFormat::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Svg => "SVG",
            ExportFormat::Png => "PNG",
            ExportFormat::Pdf => "PDF",
        };
        f.write_str(label)
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "svg" => Ok(ExportFormat::Svg),
            "png" => Ok(ExportFormat::Png),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(format!("unsupported export format '{other}'")),
        }
    }
}

/// Pretty-printed map, in the same shape the store writes.
pub fn export_json(map: &MindMap) -> Result<String> {
    serde_json::to_string_pretty(map)
        .map_err(|err| MindMapError::invalid(format!("failed to serialize map: {err}")))
}

/// Suggested download name: the title with whitespace runs turned into `_`.
pub fn artifact_name(map: &MindMap, format: ExportFormat) -> String {
    format!("{}.{}", file_stem(&map.title), format.extension())
}

/// Produces the bytes of an export artifact.
pub fn export(map: &MindMap, format: ExportFormat, background: &str) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Json => export_json(map).map(String::into_bytes),
        ExportFormat::Svg => render_svg(&project_fitted(map), background)
            .map(String::into_bytes)
            .map_err(|err| MindMapError::invalid(format!("failed to render SVG: {err}"))),
        ExportFormat::Png | ExportFormat::Pdf => Err(MindMapError::ExportUnavailable(format)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Point;

    #[test]
    fn json_export_is_pretty_and_loadable() {
        let mut map = MindMap::new("Road map", Point::ORIGIN);
        let root = map.root().unwrap().id;
        map.add_child(root, "Q1").unwrap();

        let json = export_json(&map).unwrap();
        assert!(json.contains("\n  \"title\": \"Road map\""));
        let back: MindMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn artifact_name_replaces_whitespace() {
        let map = MindMap::new("My  First Mind Map", Point::ORIGIN);
        assert_eq!(artifact_name(&map, ExportFormat::Json), "My_First_Mind_Map.json");
        assert_eq!(artifact_name(&map, ExportFormat::Svg), "My_First_Mind_Map.svg");
    }

    #[test]
    fn raster_formats_are_placeholders() {
        let map = MindMap::default();
        for format in [ExportFormat::Png, ExportFormat::Pdf] {
            assert_eq!(
                export(&map, format, "white"),
                Err(MindMapError::ExportUnavailable(format))
            );
        }
        let svg = export(&map, ExportFormat::Svg, "white").unwrap();
        assert!(String::from_utf8(svg).unwrap().contains("Central Idea"));
    }

    #[test]
    fn formats_parse_from_cli_tokens() {
        assert_eq!("SVG".parse::<ExportFormat>().unwrap(), ExportFormat::Svg);
        assert!("gif".parse::<ExportFormat>().is_err());
    }
}
