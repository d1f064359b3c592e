//! Document tree model
//!
//! A document is an immutable tree of typed nodes. Positions follow the usual
//! rich-text convention: a text node occupies one position per character, a leaf
//! node occupies one position, and a container occupies its content plus an
//! opening and a closing token. Position `0` is the start of the root's content.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Node attributes, stored as JSON values so they serialize losslessly
pub type Attrs = Map<String, Value>;

/// Identity of a node for as long as it exists in the document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Allocate a new, never-used identity
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Inline formatting carried by a text node, such as `bold` or a `link` with
/// an `href` attribute. Marks are kept as stored; the editor does not
/// interpret them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Attrs::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attrs: Attrs::new(),
        }
    }
}

/// Node types known to the editor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeType {
    Doc,
    Paragraph,
    Heading,
    Blockquote,
    BulletList,
    OrderedList,
    ListItem,
    TaskList,
    TaskItem,
    CodeBlock,
    HorizontalRule,
    HardBreak,
    Text,
}

impl NodeType {
    /// All node types, in registry order
    pub const ALL: [NodeType; 13] = [
        NodeType::Doc,
        NodeType::Paragraph,
        NodeType::Heading,
        NodeType::Blockquote,
        NodeType::BulletList,
        NodeType::OrderedList,
        NodeType::ListItem,
        NodeType::TaskList,
        NodeType::TaskItem,
        NodeType::CodeBlock,
        NodeType::HorizontalRule,
        NodeType::HardBreak,
        NodeType::Text,
    ];

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Doc => "doc",
            NodeType::Paragraph => "paragraph",
            NodeType::Heading => "heading",
            NodeType::Blockquote => "blockquote",
            NodeType::BulletList => "bulletList",
            NodeType::OrderedList => "orderedList",
            NodeType::ListItem => "listItem",
            NodeType::TaskList => "taskList",
            NodeType::TaskItem => "taskItem",
            NodeType::CodeBlock => "codeBlock",
            NodeType::HorizontalRule => "horizontalRule",
            NodeType::HardBreak => "hardBreak",
            NodeType::Text => "text",
        }
    }

    /// Blocks whose content is inline (text and hard breaks)
    pub fn is_textblock(self) -> bool {
        matches!(
            self,
            NodeType::Paragraph | NodeType::Heading | NodeType::CodeBlock
        )
    }

    /// Nodes that never have children
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeType::HorizontalRule | NodeType::HardBreak | NodeType::Text
        )
    }

    pub fn is_inline(self) -> bool {
        matches!(self, NodeType::HardBreak | NodeType::Text)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A node in the document tree
///
/// Nodes are cheap to clone and are never mutated in place; transforms build new
/// trees that keep the identity of every node they carry over.
#[derive(Clone, Debug)]
pub struct Node {
    id: NodeId,
    kind: NodeType,
    attrs: Attrs,
    content: Vec<Node>,
    text: Option<String>,
    marks: Vec<Mark>,
}

/// Two nodes are equal when they have the same type, attributes and content.
/// Identity is deliberately not compared.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.attrs == other.attrs
            && self.text == other.text
            && self.marks == other.marks
            && self.content == other.content
    }
}

impl Node {
    /// Create a new node with a fresh identity
    pub fn new(kind: NodeType, attrs: Attrs, content: Vec<Node>) -> Self {
        Self {
            id: NodeId::fresh(),
            kind,
            attrs,
            content,
            text: None,
            marks: Vec::new(),
        }
    }

    /// Create a text node
    pub fn text(text: impl Into<String>) -> Self {
        Self::marked_text(text, Vec::new())
    }

    /// Create a text node carrying inline marks
    pub fn marked_text(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            id: NodeId::fresh(),
            kind: NodeType::Text,
            attrs: Attrs::new(),
            content: Vec::new(),
            text: Some(text.into()),
            marks,
        }
    }

    /// Create a document root
    pub fn doc(content: Vec<Node>) -> Self {
        Self::new(NodeType::Doc, Attrs::new(), content)
    }

    /// Create a paragraph holding plain text (no children when `text` is empty)
    pub fn paragraph(text: &str) -> Self {
        Self::new(NodeType::Paragraph, Attrs::new(), inline_text(text))
    }

    /// Create a heading of the given level holding plain text
    pub fn heading(level: u8, text: &str) -> Self {
        let mut attrs = Attrs::new();
        attrs.insert("level".to_string(), Value::from(level));
        Self::new(NodeType::Heading, attrs, inline_text(text))
    }

    /// Return a copy with one attribute set
    pub fn with_attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(name.to_string(), value.into());
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs.get(name)
    }

    pub fn content(&self) -> &[Node] {
        &self.content
    }

    /// Marks of a text node, empty for every other node type
    pub fn marks(&self) -> &[Mark] {
        &self.marks
    }

    /// Text of a text node, `None` for every other node type
    pub fn text_str(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn is_text(&self) -> bool {
        self.kind == NodeType::Text
    }

    pub fn child_count(&self) -> usize {
        self.content.len()
    }

    pub fn child(&self, index: usize) -> Option<&Node> {
        self.content.get(index)
    }

    /// Number of positions this node occupies in its parent
    pub fn node_size(&self) -> usize {
        match &self.text {
            Some(text) => text.chars().count(),
            None if self.kind.is_leaf() => 1,
            None => self.content_size() + 2,
        }
    }

    /// Number of positions occupied by this node's children
    pub fn content_size(&self) -> usize {
        self.content.iter().map(Node::node_size).sum()
    }

    /// Iterate direct children together with their offset from the content start
    pub fn children_with_offsets(&self) -> impl Iterator<Item = (usize, &Node)> + '_ {
        let mut offset = 0;
        self.content.iter().map(move |child| {
            let start = offset;
            offset += child.node_size();
            (start, child)
        })
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => self.content.iter().map(Node::text_content).collect(),
        }
    }

    /// Find the node starting at `pos`, descending as far as needed.
    ///
    /// Positions inside a text node resolve to that text node. Returns `None` for
    /// positions that are not the start of any node (including the end of a
    /// container's content and anything outside the document).
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut node = self;
        let mut pos = pos;
        loop {
            let (offset, child) = node.child_around(pos)?;
            if offset == pos || child.is_text() {
                return Some(child);
            }
            pos -= offset + 1;
            node = child;
        }
    }

    /// Number of ancestors (below this node) of the position, counting only
    /// containers the position lies strictly inside.
    pub fn resolve_depth(&self, pos: usize) -> Option<usize> {
        if pos > self.content_size() {
            return None;
        }
        let mut node = self;
        let mut pos = pos;
        let mut depth = 0;
        while let Some((offset, child)) = node.child_around(pos) {
            if offset == pos || child.kind.is_leaf() {
                break;
            }
            pos -= offset + 1;
            node = child;
            depth += 1;
        }
        Some(depth)
    }

    /// Call `f(node, pos, depth)` for every node overlapping `from..to`, in
    /// document order. Children are visited only when `f` returns `true`.
    /// Direct children of this node have depth `0`.
    pub fn nodes_between<F>(&self, from: usize, to: usize, mut f: F)
    where
        F: FnMut(&Node, usize, usize) -> bool,
    {
        self.walk_between(from, to, 0, 0, &mut f);
    }

    /// Visit every descendant, see [`Node::nodes_between`]
    pub fn descendants<F>(&self, f: F)
    where
        F: FnMut(&Node, usize, usize) -> bool,
    {
        self.nodes_between(0, self.content_size(), f);
    }

    /// Current position of the node with the given identity
    pub fn find_position(&self, id: NodeId) -> Option<usize> {
        let mut found = None;
        self.descendants(|node, pos, _| {
            if found.is_some() {
                return false;
            }
            if node.id == id {
                found = Some(pos);
                return false;
            }
            true
        });
        found
    }

    fn walk_between<F>(&self, from: usize, to: usize, base: usize, depth: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, usize) -> bool,
    {
        let mut offset = 0;
        for child in &self.content {
            if offset >= to {
                break;
            }
            let end = offset + child.node_size();
            if end > from && f(child, base + offset, depth) && !child.content.is_empty() {
                let start = offset + 1;
                child.walk_between(
                    from.saturating_sub(start),
                    to.saturating_sub(start).min(child.content_size()),
                    base + start,
                    depth + 1,
                    f,
                );
            }
            offset = end;
        }
    }

    /// Child containing `pos` (`offset <= pos < offset + size`)
    pub(crate) fn child_around(&self, pos: usize) -> Option<(usize, &Node)> {
        self.children_with_offsets()
            .find(|(offset, child)| pos < offset + child.node_size())
    }

    pub(crate) fn with_attrs(&self, attrs: Attrs) -> Self {
        Self {
            attrs,
            ..self.clone()
        }
    }

    pub(crate) fn with_kind(&self, kind: NodeType, attrs: Attrs) -> Self {
        Self {
            kind,
            attrs,
            ..self.clone()
        }
    }

    pub(crate) fn with_content(&self, content: Vec<Node>) -> Self {
        Self {
            content,
            ..self.clone()
        }
    }

    pub(crate) fn with_child(&self, index: usize, child: Node) -> Self {
        let mut content = self.content.clone();
        content[index] = child;
        self.with_content(content)
    }
}

fn inline_text(text: &str) -> Vec<Node> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Node::text(text)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Node {
        // <h1>Title</h1><blockquote><p>ab</p></blockquote><hr>
        Node::doc(vec![
            Node::heading(1, "Title"),
            Node::new(
                NodeType::Blockquote,
                Attrs::new(),
                vec![Node::paragraph("ab")],
            ),
            Node::new(NodeType::HorizontalRule, Attrs::new(), vec![]),
        ])
    }

    #[test]
    fn test_sizes() {
        let doc = sample();
        assert_eq!(doc.content()[0].node_size(), 7);
        assert_eq!(doc.content()[1].node_size(), 6);
        assert_eq!(doc.content()[2].node_size(), 1);
        assert_eq!(doc.content_size(), 14);
    }

    #[test]
    fn test_empty_paragraph_has_no_children() {
        let p = Node::paragraph("");
        assert_eq!(p.child_count(), 0);
        assert_eq!(p.node_size(), 2);
    }

    #[test]
    fn test_node_at_top_level() {
        let doc = sample();
        assert_eq!(doc.node_at(0).map(Node::kind), Some(NodeType::Heading));
        assert_eq!(doc.node_at(7).map(Node::kind), Some(NodeType::Blockquote));
        assert_eq!(doc.node_at(13).map(Node::kind), Some(NodeType::HorizontalRule));
    }

    #[test]
    fn test_node_at_nested_and_text() {
        let doc = sample();
        assert_eq!(doc.node_at(8).map(Node::kind), Some(NodeType::Paragraph));
        assert_eq!(doc.node_at(9).map(Node::kind), Some(NodeType::Text));
        assert_eq!(doc.node_at(10).map(Node::kind), Some(NodeType::Text));
    }

    #[test]
    fn test_node_at_out_of_range() {
        let doc = sample();
        assert!(doc.node_at(14).is_none());
        assert!(doc.node_at(100).is_none());
        assert!(Node::doc(vec![]).node_at(0).is_none());
    }

    #[test]
    fn test_resolve_depth() {
        let doc = sample();
        assert_eq!(doc.resolve_depth(0), Some(0));
        assert_eq!(doc.resolve_depth(7), Some(0));
        assert_eq!(doc.resolve_depth(8), Some(1));
        assert_eq!(doc.resolve_depth(9), Some(2));
        assert_eq!(doc.resolve_depth(15), None);
    }

    #[test]
    fn test_nodes_between_reports_depth_and_respects_descend() {
        let doc = sample();
        let mut seen = Vec::new();
        doc.nodes_between(0, doc.content_size(), |node, pos, depth| {
            seen.push((node.kind(), pos, depth));
            node.kind() != NodeType::Blockquote
        });
        assert_eq!(
            seen,
            vec![
                (NodeType::Heading, 0, 0),
                (NodeType::Text, 1, 1),
                (NodeType::Blockquote, 7, 0),
                (NodeType::HorizontalRule, 13, 0),
            ]
        );
    }

    #[test]
    fn test_nodes_between_partial_range() {
        let doc = sample();
        let mut kinds = Vec::new();
        doc.nodes_between(7, 13, |node, _, depth| {
            if depth == 0 {
                kinds.push(node.kind());
            }
            true
        });
        assert_eq!(kinds, vec![NodeType::Blockquote]);
    }

    #[test]
    fn test_find_position() {
        let doc = sample();
        let quote = &doc.content()[1];
        let para = &quote.content()[0];
        assert_eq!(doc.find_position(quote.id()), Some(7));
        assert_eq!(doc.find_position(para.id()), Some(8));
        assert_eq!(doc.find_position(NodeId::fresh()), None);
    }

    #[test]
    fn test_equality_ignores_identity() {
        assert_eq!(Node::paragraph("x"), Node::paragraph("x"));
        assert_ne!(Node::paragraph("x"), Node::paragraph("y"));
        assert_ne!(Node::heading(1, "x"), Node::heading(2, "x"));
    }

    #[test]
    fn test_text_content() {
        assert_eq!(sample().text_content(), "Titleab");
    }
}
