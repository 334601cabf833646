use std::collections::HashMap;
use std::fmt::Write as FmtWrite;

use anyhow::{Result, anyhow};
use serde::Serialize;

use crate::layout::Point;
use crate::mindmap::{ConnectionKind, MindMap, NodeId};
use crate::utils::escape_xml;
use crate::viewport::Viewport;
use crate::visibility::{visible_connections, visible_nodes};

const NODE_CHAR_WIDTH: f64 = 8.0;
const NODE_HORIZONTAL_PADDING: f64 = 32.0;
const NODE_MIN_WIDTH: f64 = 96.0;
const NODE_HEIGHT: f64 = 40.0;
const ROOT_SCALE: f64 = 1.25;
const ICON_WIDTH: f64 = 18.0;
const FIT_MARGIN: f64 = 60.0;
const CUSTOM_EDGE_COLOR: &str = "#f59e0b";
const HIERARCHY_EDGE_COLOR: &str = "#94a3b8";

/// Everything a renderer needs for one draw, already in screen space.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFrame {
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
    pub nodes: Vec<RenderedNode>,
    pub connections: Vec<RenderedConnection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedNode {
    pub id: NodeId,
    pub text: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub is_root: bool,
    pub has_children: bool,
    pub is_collapsed: bool,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedConnection {
    pub source: NodeId,
    pub target: NodeId,
    pub kind: ConnectionKind,
    pub from: Point,
    pub to: Point,
}

/// Projects the visible part of `map` through `viewport`.
pub fn project(map: &MindMap, viewport: &Viewport) -> RenderFrame {
    let nodes: Vec<RenderedNode> = visible_nodes(map)
        .into_iter()
        .map(|node| RenderedNode {
            id: node.id,
            text: node.text.clone(),
            color: node.color.clone(),
            icon: node.icon.clone(),
            is_root: node.is_root,
            has_children: node.has_children(),
            is_collapsed: node.is_collapsed,
            position: viewport.model_to_screen(node.position()),
        })
        .collect();

    let positions: HashMap<NodeId, Point> =
        nodes.iter().map(|node| (node.id, node.position)).collect();

    let connections = visible_connections(map)
        .into_iter()
        .filter_map(|conn| {
            let from = *positions.get(&conn.source)?;
            let to = *positions.get(&conn.target)?;
            Some(RenderedConnection {
                source: conn.source,
                target: conn.target,
                kind: conn.kind,
                from,
                to,
            })
        })
        .collect();

    RenderFrame {
        width: viewport.width,
        height: viewport.height,
        zoom: viewport.zoom,
        nodes,
        connections,
    }
}

/// Projects the visible nodes onto a canvas just large enough to hold them,
/// at unit zoom. Used for file output where there is no live viewport.
pub fn project_fitted(map: &MindMap) -> RenderFrame {
    let mut min_x = f64::MAX;
    let mut max_x = f64::MIN;
    let mut min_y = f64::MAX;
    let mut max_y = f64::MIN;

    for node in visible_nodes(map) {
        let (width, height) = node_box(&node.text, node.icon.is_some(), node.is_root);
        min_x = min_x.min(node.x - width / 2.0);
        max_x = max_x.max(node.x + width / 2.0);
        min_y = min_y.min(node.y - height / 2.0);
        max_y = max_y.max(node.y + height / 2.0);
    }

    if min_x > max_x || min_y > max_y {
        return project(map, &Viewport::new(FIT_MARGIN * 2.0, FIT_MARGIN * 2.0));
    }

    let mut viewport = Viewport::new(
        max_x - min_x + FIT_MARGIN * 2.0,
        max_y - min_y + FIT_MARGIN * 2.0,
    );
    viewport.offset = Point::new(FIT_MARGIN - min_x, FIT_MARGIN - min_y);
    project(map, &viewport)
}

/// Estimated on-screen box of a node label, before zoom.
pub fn node_box(text: &str, has_icon: bool, is_root: bool) -> (f64, f64) {
    let chars = text.chars().count() as f64;
    let icon = if has_icon { ICON_WIDTH } else { 0.0 };
    let width = (NODE_CHAR_WIDTH * chars + NODE_HORIZONTAL_PADDING + icon).max(NODE_MIN_WIDTH);
    if is_root {
        (width * ROOT_SCALE, NODE_HEIGHT * ROOT_SCALE)
    } else {
        (width, NODE_HEIGHT)
    }
}

pub fn render_svg(frame: &RenderFrame, background: &str) -> Result<String> {
    if !frame.width.is_finite() || !frame.height.is_finite() {
        return Err(anyhow!("frame dimensions are not finite"));
    }

    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <rect width="100%" height="100%" fill="{}" />
"##,
        frame.width,
        frame.height,
        frame.width,
        frame.height,
        escape_xml(background)
    )?;

    for conn in &frame.connections {
        let (stroke, dash_attr, opacity) = match conn.kind {
            ConnectionKind::Hierarchy => (HIERARCHY_EDGE_COLOR, "", 1.0),
            ConnectionKind::Custom => (CUSTOM_EDGE_COLOR, " stroke-dasharray=\"6 4\"", 0.6),
        };
        writeln!(
            svg,
            "  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"{:.1}\" stroke-opacity=\"{:.1}\"{} data-kind=\"{}\" />",
            conn.from.x,
            conn.from.y,
            conn.to.x,
            conn.to.y,
            stroke,
            2.0 * frame.zoom,
            opacity,
            dash_attr,
            conn.kind.as_str()
        )?;
    }

    for node in &frame.nodes {
        let (width, height) = node_box(&node.text, node.icon.is_some(), node.is_root);
        let width = width * frame.zoom;
        let height = height * frame.zoom;
        let font_size = if node.is_root { 16.0 } else { 14.0 } * frame.zoom;

        writeln!(
            svg,
            "  <g data-node-id=\"{}\">\n    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"{:.1}\" ry=\"{:.1}\" fill=\"{}\" />",
            node.id,
            node.position.x - width / 2.0,
            node.position.y - height / 2.0,
            width,
            height,
            height / 2.0,
            height / 2.0,
            escape_xml(&node.color)
        )?;
        writeln!(
            svg,
            "    <text x=\"{:.1}\" y=\"{:.1}\" fill=\"#ffffff\" font-size=\"{:.1}\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>",
            node.position.x,
            node.position.y,
            font_size,
            escape_xml(&node.text)
        )?;

        if node.has_children {
            let marker = if node.is_collapsed { "+" } else { "\u{2212}" };
            writeln!(
                svg,
                "    <text x=\"{:.1}\" y=\"{:.1}\" fill=\"#1f2937\" font-size=\"{:.1}\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>",
                node.position.x + width / 2.0,
                node.position.y + height / 2.0,
                12.0 * frame.zoom,
                marker
            )?;
        }
        svg.push_str("  </g>\n");
    }

    svg.push_str("</svg>\n");
    Ok(svg)
}
