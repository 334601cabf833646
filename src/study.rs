//! Read-only study views derived from a map.

use serde::Serialize;

use crate::mindmap::MindMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub title: String,
    pub central_topic: String,
    /// Texts of the root's children, in order.
    pub main_branches: Vec<String>,
    pub node_count: usize,
    pub connection_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

pub fn summary(map: &MindMap) -> Summary {
    let root = map.root();
    let main_branches = root
        .map(|root| {
            root.children
                .iter()
                .filter_map(|id| map.find_node(*id))
                .map(|node| node.text.clone())
                .collect()
        })
        .unwrap_or_default();

    Summary {
        title: map.title.clone(),
        central_topic: root.map(|root| root.text.clone()).unwrap_or_default(),
        main_branches,
        node_count: map.nodes.len(),
        connection_count: map.connections.len(),
    }
}

/// A title card followed by one card per annotated node.
pub fn flashcards(map: &MindMap) -> Vec<Flashcard> {
    let concepts = map.nodes.len().saturating_sub(1);
    let mut deck = vec![Flashcard {
        front: map.title.clone(),
        back: format!("{concepts} key concepts in this mind map"),
    }];

    deck.extend(
        map.nodes
            .iter()
            .filter(|node| !node.is_root && !node.notes.trim().is_empty())
            .map(|node| Flashcard {
                front: node.text.clone(),
                back: node.notes.trim().to_string(),
            }),
    );
    deck
}

impl Summary {
    /// Plain-text rendition for terminals.
    pub fn to_text(&self) -> String {
        let mut out = format!("{}\nCentral topic: {}\n", self.title, self.central_topic);
        if self.main_branches.is_empty() {
            out.push_str("Main topics: none\n");
        } else {
            out.push_str("Main topics:\n");
            for branch in &self.main_branches {
                out.push_str(&format!("  - {branch}\n"));
            }
        }
        out.push_str(&format!(
            "{} nodes, {} connections\n",
            self.node_count, self.connection_count
        ));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Point;
    use crate::mindmap::NodeEdit;

    fn sample() -> MindMap {
        let mut map = MindMap::new("Biology", Point::ORIGIN);
        let root = map.root().unwrap().id;
        let cells = map.add_child(root, "Cells").unwrap().id;
        map.add_child(root, "Genetics").unwrap();
        let organelles = map.add_child(cells, "Organelles").unwrap().id;
        map.edit_node(
            organelles,
            NodeEdit {
                notes: Some("Mitochondria, ribosomes ".into()),
                ..NodeEdit::default()
            },
        )
        .unwrap();
        map
    }

    #[test]
    fn summary_lists_root_children() {
        let summary = summary(&sample());
        assert_eq!(summary.title, "Biology");
        assert_eq!(summary.central_topic, "Central Idea");
        assert_eq!(summary.main_branches, vec!["Cells", "Genetics"]);
        assert_eq!(summary.node_count, 4);
        assert_eq!(summary.connection_count, 3);
        assert!(summary.to_text().contains("  - Genetics"));
    }

    #[test]
    fn flashcards_start_with_title_card() {
        let deck = flashcards(&sample());
        assert_eq!(deck.len(), 2);
        assert_eq!(deck[0].front, "Biology");
        assert_eq!(deck[0].back, "3 key concepts in this mind map");
        assert_eq!(deck[1].front, "Organelles");
        assert_eq!(deck[1].back, "Mitochondria, ribosomes");
    }

    #[test]
    fn fresh_map_has_zero_concepts() {
        let deck = flashcards(&MindMap::default());
        assert_eq!(deck.len(), 1);
        assert_eq!(deck[0].back, "0 key concepts in this mind map");
    }
}
