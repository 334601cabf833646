use std::collections::HashSet;

use anyhow::Result;
use mindflow::history::History;
use mindflow::layout::auto_layout;
use mindflow::visibility::visible_nodes;
use mindflow::{
    Action, ConnectionKind, Editor, EditorConfig, MemoryStorage, MindMap, NodeId, Point, Viewport,
};

fn editor() -> Editor {
    let config = EditorConfig::from_lookup(|_| None);
    Editor::open(Box::new(MemoryStorage::new()), &config)
}

#[test]
fn ids_are_distinct_and_increasing() -> Result<()> {
    let mut map = MindMap::new("Ids", Point::ORIGIN);
    let root = map.root().map(|node| node.id).unwrap_or_default();
    let mut ids = vec![root];
    for step in 0..20 {
        let id = if step % 3 == 0 {
            map.add_free_node(Point::new(step as f64, 0.0), "free")?.id
        } else {
            let parent = ids[step / 2];
            map.add_child(parent, "child")?.id
        };
        ids.push(id);
    }
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), ids.len());
    Ok(())
}

#[test]
fn deleting_a_branch_removes_its_closure() -> Result<()> {
    let mut map = MindMap::new("Delete", Point::ORIGIN);
    let root = map.root().map(|node| node.id).unwrap_or_default();
    let a = map.add_child(root, "A")?.id;
    map.add_child(a, "B")?;
    map.add_child(a, "C")?;

    map.delete_node(a)?;

    let remaining: Vec<NodeId> = map.nodes.iter().map(|node| node.id).collect();
    assert_eq!(remaining, vec![root]);
    assert!(map.connections.is_empty());
    assert!(map.nodes.iter().all(|node| node.children.is_empty()));
    map.validate()?;
    Ok(())
}

#[test]
fn collapse_hides_subtree_but_not_the_node() -> Result<()> {
    let mut map = MindMap::new("Collapse", Point::ORIGIN);
    let root = map.root().map(|node| node.id).unwrap_or_default();
    let a = map.add_child(root, "A")?.id;
    let b = map.add_child(a, "B")?.id;
    let c = map.add_child(a, "C")?.id;
    let d = map.add_child(b, "D")?.id;
    map.toggle_collapse(a)?;

    let visible: HashSet<NodeId> = visible_nodes(&map).iter().map(|node| node.id).collect();
    assert!(visible.contains(&a));
    for hidden in [b, c, d] {
        assert!(!visible.contains(&hidden));
    }
    Ok(())
}

#[test]
fn undo_and_redo_invert_each_action() {
    let mut editor = editor();
    let root = editor.map().root().map(|node| node.id).unwrap_or_default();
    let Some(branch) = editor.add_child(root) else {
        panic!("root should accept a child");
    };
    assert!(editor.add_child(branch).is_some());
    editor.select(root);

    let actions = [
        Action::AddChild,
        Action::CollapseAll,
        Action::ExpandAll,
        Action::AutoLayout,
    ];
    for action in actions {
        let before = editor.map().clone();
        editor.apply(action);
        let after = editor.map().clone();
        assert_ne!(before, after, "{action} should change the map");

        assert!(editor.undo());
        assert_eq!(editor.map(), &before, "undo after {action}");
        assert!(editor.redo());
        assert_eq!(editor.map(), &after, "redo after {action}");
    }
}

#[test]
fn history_is_capped_at_thirty() {
    let mut history = History::default();
    let mut map = MindMap::new("c0", Point::ORIGIN);
    let first = map.clone();
    for step in 1..=31 {
        history.checkpoint(&map);
        map.set_title(&format!("c{step}"));
    }
    assert_eq!(history.undo_depth(), 30);

    let mut current = map;
    let mut undone = 0;
    while let Ok(previous) = history.undo(&current) {
        current = previous;
        undone += 1;
    }
    assert_eq!(undone, 30);
    assert_ne!(current, first);
    assert_eq!(current.title, "c1");
}

#[test]
fn reversed_duplicate_connection_is_rejected() -> Result<()> {
    let mut map = MindMap::new("Links", Point::ORIGIN);
    let root = map.root().map(|node| node.id).unwrap_or_default();
    let other = map.add_free_node(Point::new(300.0, 0.0), "other")?.id;

    map.add_connection(root, other)?;
    assert!(map.add_connection(other, root).is_err());

    let custom = map
        .connections
        .iter()
        .filter(|conn| conn.kind == ConnectionKind::Custom)
        .count();
    assert_eq!(custom, 1);
    assert_eq!(map.connections.len(), 1);
    Ok(())
}

#[test]
fn non_finite_positions_never_reach_the_map() -> Result<()> {
    let mut map = MindMap::new("Finite", Point::ORIGIN);
    let root = map.root().map(|node| node.id).unwrap_or_default();

    assert!(map.move_node(root, Point::new(f64::NAN, 0.0)).is_err());
    assert!(map.add_free_node(Point::new(0.0, f64::NEG_INFINITY), "lost").is_err());
    assert_eq!(map.nodes.len(), 1);
    assert_eq!(map.next_node_id, 2);

    let reloaded: MindMap = serde_json::from_str(&serde_json::to_string(&map)?)?;
    assert_eq!(reloaded, map);
    Ok(())
}

#[test]
fn auto_layout_ignores_prior_positions() -> Result<()> {
    let mut map = MindMap::new("Layout", Point::ORIGIN);
    let root = map.root().map(|node| node.id).unwrap_or_default();
    let a = map.add_child(root, "A")?.id;
    map.add_child(a, "B")?;
    map.add_child(root, "C")?;

    let mut scrambled = map.clone();
    for (index, node) in scrambled.nodes.iter_mut().enumerate() {
        node.set_position(Point::new(index as f64 * 97.0, -(index as f64) * 13.0));
    }

    let center = Point::new(600.0, 400.0);
    auto_layout(&mut map, center);
    let once = map.clone();
    auto_layout(&mut map, center);
    auto_layout(&mut scrambled, center);

    assert_eq!(map, once);
    for (laid, other) in map.nodes.iter().zip(&scrambled.nodes) {
        assert_eq!(laid.position(), other.position());
    }
    Ok(())
}

#[test]
fn zoom_saturates_between_half_and_double() {
    let mut viewport = Viewport::default();
    for _ in 0..50 {
        viewport.zoom_in();
        assert!(viewport.zoom <= 2.0);
    }
    assert_eq!(viewport.zoom, 2.0);

    viewport.reset_zoom();
    for _ in 0..50 {
        viewport.zoom_out();
        assert!(viewport.zoom >= 0.5);
    }
    assert_eq!(viewport.zoom, 0.5);
}

#[test]
fn frame_reflects_editor_state() {
    let mut editor = editor();
    let root = editor.map().root().map(|node| node.id).unwrap_or_default();
    editor.select(root);
    editor.apply(Action::AddChild);
    editor.apply(Action::ZoomIn);

    let frame = editor.frame();
    assert_eq!(frame.nodes.len(), 2);
    assert_eq!(frame.connections.len(), 1);
    assert!((frame.zoom - 1.1).abs() < 1e-9);

    let svg = mindflow::render_svg(&frame, "white").unwrap_or_default();
    assert!(svg.contains("New Node"));
}
