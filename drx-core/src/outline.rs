//! Document outline built from top-level headings

use std::collections::HashMap;

use crate::collapse::compute_hidden_ranges;
use crate::heading::{heading_level, is_collapsed};
use crate::node::{Node, NodeType};

/// A heading in the outline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineEntry {
    /// `None` when the heading has no usable level
    pub level: Option<u8>,
    pub text: String,
    /// Position of the heading in the document
    pub pos: usize,
    /// Index of the heading among the document's top-level blocks
    pub index: usize,
    pub anchor: String,
    pub collapsed: bool,
    /// Inside a section hidden by a collapsed heading
    pub hidden: bool,
}

/// Extract the outline of a document
pub fn outline(doc: &Node) -> Vec<OutlineEntry> {
    let ranges = compute_hidden_ranges(doc);
    let mut seen: HashMap<String, usize> = HashMap::new();

    doc.children_with_offsets()
        .enumerate()
        .filter(|(_, (_, node))| node.kind() == NodeType::Heading)
        .map(|(index, (pos, node))| {
            let text = node.text_content();
            let anchor = unique_anchor(&mut seen, make_anchor(&text));
            OutlineEntry {
                level: heading_level(node),
                text,
                pos,
                index,
                anchor,
                collapsed: is_collapsed(node),
                hidden: ranges.iter().any(|r| pos >= r.from && pos < r.to),
            }
        })
        .collect()
}

/// Create an anchor from heading text (simplified version)
pub fn make_anchor(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c
            } else if c.is_whitespace() {
                '-'
            } else {
                '_'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// Suffix repeated anchors with `-1`, `-2`, ...
fn unique_anchor(seen: &mut HashMap<String, usize>, anchor: String) -> String {
    let count = seen.entry(anchor.clone()).or_insert(0);
    let unique = if *count == 0 {
        anchor
    } else {
        format!("{}-{}", anchor, count)
    };
    *count += 1;
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_empty() {
        assert!(outline(&Node::doc(vec![Node::paragraph("x")])).is_empty());
    }

    #[test]
    fn test_outline_entries() {
        let doc = Node::doc(vec![
            Node::heading(1, "Intro"),
            Node::paragraph("p"),
            Node::heading(2, "Details"),
        ]);
        let entries = outline(&doc);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].level, Some(1));
        assert_eq!(entries[0].text, "Intro");
        assert_eq!(entries[0].pos, 0);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[1].pos, 10);
        assert_eq!(entries[1].index, 2);
        assert_eq!(entries[1].anchor, "details");
    }

    #[test]
    fn test_hidden_and_collapsed_flags() {
        let doc = Node::doc(vec![
            Node::heading(1, "A").with_attr("collapsed", true),
            Node::heading(2, "A.1"),
            Node::heading(1, "B"),
        ]);
        let entries = outline(&doc);
        assert!(entries[0].collapsed && !entries[0].hidden);
        assert!(!entries[1].collapsed && entries[1].hidden);
        assert!(!entries[2].hidden);
    }

    #[test]
    fn test_duplicate_anchors() {
        let doc = Node::doc(vec![
            Node::heading(2, "Notes"),
            Node::heading(2, "Notes"),
            Node::heading(2, "Notes"),
        ]);
        let anchors: Vec<String> = outline(&doc).into_iter().map(|e| e.anchor).collect();
        assert_eq!(anchors, vec!["notes", "notes-1", "notes-2"]);
    }

    #[test]
    fn test_anchor_generation() {
        assert_eq!(make_anchor("Hello World"), "hello-world");
        assert_eq!(make_anchor("Test & Demo"), "test-_-demo");
        assert_eq!(make_anchor("Multiple   Spaces"), "multiple---spaces");
    }
}
