use std::collections::HashSet;
use std::f64::consts::PI;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{MindMapError, Result};
use crate::mindmap::{MindMap, Node, NodeId};

/// Radius of the first child ring around a parent.
pub const CHILD_BASE_RADIUS: f64 = 120.0;
/// Extra radius per existing sibling, to relieve crowding past one full fan.
pub const CHILD_RADIUS_STEP: f64 = 5.0;
/// Children per full turn before placements start to repeat angles.
pub const CHILD_FAN_SLOTS: f64 = 8.0;

pub const LAYOUT_BASE_RADIUS: f64 = 150.0;
pub const LAYOUT_LEVEL_RADIUS: f64 = 30.0;
/// Share of a child's wedge handed down to its own children.
pub const LAYOUT_WEDGE_NARROWING: f64 = 0.8;

pub const GRID_SIZE: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The point `radius` away from `self` in direction `angle` (radians).
    pub fn polar_offset(self, radius: f64, angle: f64) -> Self {
        Point {
            x: self.x + radius * angle.cos(),
            y: self.y + radius * angle.sin(),
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Rejects NaN and infinite coordinates, which cannot be stored as JSON.
    pub fn finite(self) -> Result<Self> {
        if self.is_finite() {
            Ok(self)
        } else {
            Err(MindMapError::invalid(format!(
                "({}, {}) is not a valid position",
                self.x, self.y
            )))
        }
    }

    pub fn distance(self, other: Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Default position for the `existing_children`-th child of `parent`.
///
/// The first eight children fan out evenly starting at π/8; later ones reuse
/// those angles on a slightly larger ring. This is an approximation and does
/// not guarantee that nodes never overlap.
pub fn child_placement(parent: &Node, existing_children: usize) -> Point {
    let count = existing_children as f64;
    let radius = CHILD_BASE_RADIUS + CHILD_RADIUS_STEP * count;
    let angle = count * (2.0 * PI / CHILD_FAN_SLOTS) + PI / CHILD_FAN_SLOTS;
    parent.position().polar_offset(radius, angle)
}

/// Radial tidy-tree layout of everything reachable from the root.
///
/// The root moves to `center`. Each parent splits its angular sweep evenly
/// between its children and places them at the middle of their slice; each
/// child then lays out its own subtree inside a narrowed copy of that slice.
/// Free-standing nodes keep their positions. The result depends only on the
/// tree shape, the node levels and `center`.
pub fn auto_layout(map: &mut MindMap, center: Point) {
    let Some(root_id) = map.root().map(|root| root.id) else {
        return;
    };

    if let Some(root) = map.find_node_mut(root_id) {
        root.set_position(center);
    }

    let mut visited = HashSet::new();
    visited.insert(root_id);
    let mut pending = vec![(root_id, 0.0, 2.0 * PI)];

    while let Some((parent_id, start_angle, end_angle)) = pending.pop() {
        let Some(parent) = map.find_node(parent_id) else {
            continue;
        };
        if parent.children.is_empty() {
            continue;
        }

        let origin = parent.position();
        let radius = LAYOUT_BASE_RADIUS + LAYOUT_LEVEL_RADIUS * f64::from(parent.level);
        let step = (end_angle - start_angle) / parent.children.len() as f64;
        let children: Vec<NodeId> = parent.children.clone();

        for (index, child_id) in children.into_iter().enumerate() {
            if !visited.insert(child_id) {
                continue;
            }
            let Some(child) = map.find_node_mut(child_id) else {
                continue;
            };

            let angle = start_angle + index as f64 * step + step / 2.0;
            child.set_position(origin.polar_offset(radius, angle));

            let half_wedge = step / 2.0 * LAYOUT_WEDGE_NARROWING;
            pending.push((child_id, angle - half_wedge, angle + half_wedge));
        }
    }
}

pub fn snap_to_grid(point: Point, grid: f64) -> Point {
    if grid <= 0.0 {
        return point;
    }
    Point {
        x: (point.x / grid).round() * grid,
        y: (point.y / grid).round() * grid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-9
    }

    #[test]
    fn first_child_sits_at_eighth_turn() {
        let map = MindMap::new("Layout", Point::new(100.0, 100.0));
        let root = map.root().unwrap();

        let placed = child_placement(root, 0);
        let expected = Point::new(
            100.0 + 120.0 * (PI / 8.0).cos(),
            100.0 + 120.0 * (PI / 8.0).sin(),
        );
        assert!(close(placed, expected), "{placed:?} != {expected:?}");
    }

    #[test]
    fn ninth_child_reuses_first_angle_on_wider_ring() {
        let map = MindMap::new("Layout", Point::ORIGIN);
        let root = map.root().unwrap();

        let first = child_placement(root, 0);
        let ninth = child_placement(root, 8);
        assert!((first.distance(Point::ORIGIN) - 120.0).abs() < 1e-9);
        assert!((ninth.distance(Point::ORIGIN) - 160.0).abs() < 1e-9);
        assert!((first.y.atan2(first.x) - ninth.y.atan2(ninth.x)).abs() < 1e-9);
    }

    #[test]
    fn auto_layout_places_root_children_in_equal_slices() {
        let mut map = MindMap::new("Layout", Point::ORIGIN);
        let root = map.root().unwrap().id;
        let a = map.add_child(root, "A").unwrap().id;
        let b = map.add_child(root, "B").unwrap().id;

        auto_layout(&mut map, Point::new(500.0, 400.0));

        let center = Point::new(500.0, 400.0);
        assert!(close(map.find_node(root).unwrap().position(), center));
        // two children: slices [0, π) and [π, 2π), midpoints π/2 and 3π/2
        assert!(close(
            map.find_node(a).unwrap().position(),
            center.polar_offset(150.0, PI / 2.0)
        ));
        assert!(close(
            map.find_node(b).unwrap().position(),
            center.polar_offset(150.0, 3.0 * PI / 2.0)
        ));
    }

    #[test]
    fn grandchildren_use_parent_level_radius_inside_wedge() {
        let mut map = MindMap::new("Layout", Point::ORIGIN);
        let root = map.root().unwrap().id;
        let a = map.add_child(root, "A").unwrap().id;
        let leaf = map.add_child(a, "leaf").unwrap().id;

        auto_layout(&mut map, Point::ORIGIN);

        // single child of the root takes the whole circle, midpoint π
        let a_pos = map.find_node(a).unwrap().position();
        assert!(close(a_pos, Point::ORIGIN.polar_offset(150.0, PI)));
        // its wedge is π ± 0.8π; the single grandchild lands on π again at 150 + 30
        let leaf_pos = map.find_node(leaf).unwrap().position();
        assert!(close(leaf_pos, a_pos.polar_offset(180.0, PI)));
    }

    #[test]
    fn auto_layout_leaves_free_nodes_alone() {
        let mut map = MindMap::new("Layout", Point::ORIGIN);
        let free = map.add_free_node(Point::new(-40.0, 75.0), "floating").unwrap().id;

        auto_layout(&mut map, Point::new(10.0, 10.0));

        assert_eq!(map.find_node(free).unwrap().position(), Point::new(-40.0, 75.0));
    }

    #[test]
    fn snapping_rounds_to_nearest_grid_line() {
        assert_eq!(snap_to_grid(Point::new(29.0, 31.0), GRID_SIZE), Point::new(20.0, 40.0));
        assert_eq!(snap_to_grid(Point::new(-11.0, 9.9), GRID_SIZE), Point::new(-20.0, 0.0));
        assert_eq!(snap_to_grid(Point::new(3.0, 4.0), 0.0), Point::new(3.0, 4.0));
    }
}
