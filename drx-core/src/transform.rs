//! Document transforms: steps, position mapping and transactions

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use crate::node::{Attrs, Mark, Node, NodeType};
use crate::state::PluginKey;

/// Reasons a step cannot be applied to a document
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepError {
    #[error("position {pos} is outside the document (content size {size})")]
    OutOfRange { pos: usize, size: usize },
    #[error("no node starts at position {0}")]
    NoNode(usize),
    #[error("text nodes cannot be retyped or given attributes (position {0})")]
    TextNode(usize),
    #[error("cannot change a {from} node into a {to} node")]
    IncompatibleType { from: NodeType, to: NodeType },
    #[error("positions {from}..{to} are not child boundaries of a single parent")]
    Unaligned { from: usize, to: usize },
    #[error("{child} content is not allowed inside {parent}")]
    InvalidContent { parent: NodeType, child: NodeType },
    #[error("positions {from}..{to} are not inside a single textblock")]
    NotTextblock { from: usize, to: usize },
}

/// An atomic change to a document
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Replace all attributes of the node starting at `pos`
    SetNodeAttrs { pos: usize, attrs: Attrs },
    /// Change the type and attributes of the node starting at `pos`
    SetNodeType {
        pos: usize,
        kind: NodeType,
        attrs: Attrs,
    },
    /// Replace the children between two child boundaries of one parent
    Replace {
        from: usize,
        to: usize,
        content: Vec<Node>,
    },
    /// Replace inline content inside a single textblock with plain text
    ReplaceText { from: usize, to: usize, text: String },
}

impl Step {
    /// Apply the step, producing the new document and its position map
    pub fn apply(&self, doc: &Node) -> Result<(Node, StepMap), StepError> {
        let size = doc.content_size();
        match self {
            Step::SetNodeAttrs { pos, attrs } => {
                check_range(*pos, size)?;
                let doc = update_node_at(doc, *pos, &|node| {
                    if node.is_text() {
                        return Err(StepError::TextNode(*pos));
                    }
                    Ok(node.with_attrs(attrs.clone()))
                })?;
                Ok((doc, StepMap::identity()))
            }
            Step::SetNodeType { pos, kind, attrs } => {
                check_range(*pos, size)?;
                let doc = update_node_at(doc, *pos, &|node| {
                    if node.is_text() || *kind == NodeType::Text {
                        return Err(StepError::TextNode(*pos));
                    }
                    let compatible = node.kind().is_textblock() == kind.is_textblock()
                        && node.kind().is_leaf() == kind.is_leaf();
                    if !compatible {
                        return Err(StepError::IncompatibleType {
                            from: node.kind(),
                            to: *kind,
                        });
                    }
                    Ok(node.with_kind(*kind, attrs.clone()))
                })?;
                Ok((doc, StepMap::identity()))
            }
            Step::Replace { from, to, content } => {
                check_range(*from, size)?;
                check_range(*to, size)?;
                if from > to {
                    return Err(StepError::Unaligned {
                        from: *from,
                        to: *to,
                    });
                }
                let inserted: usize = content.iter().map(Node::node_size).sum();
                let doc = replace_children(doc, *from, *to, content)
                    .map_err(|err| relocate(err, *from, *to))?;
                Ok((doc, StepMap::single(*from, to - from, inserted)))
            }
            Step::ReplaceText { from, to, text } => {
                check_range(*from, size)?;
                check_range(*to, size)?;
                let unaligned = StepError::NotTextblock {
                    from: *from,
                    to: *to,
                };
                if from > to {
                    return Err(unaligned);
                }
                let doc = replace_text(doc, *from, *to, text).ok_or(unaligned)?;
                Ok((doc, StepMap::single(*from, to - from, text.chars().count())))
            }
        }
    }
}

fn check_range(pos: usize, size: usize) -> Result<(), StepError> {
    if pos > size {
        Err(StepError::OutOfRange { pos, size })
    } else {
        Ok(())
    }
}

/// Errors from nested replaces carry relative positions; report the originals
fn relocate(err: StepError, from: usize, to: usize) -> StepError {
    match err {
        StepError::Unaligned { .. } => StepError::Unaligned { from, to },
        other => other,
    }
}

fn update_node_at(
    node: &Node,
    pos: usize,
    f: &dyn Fn(&Node) -> Result<Node, StepError>,
) -> Result<Node, StepError> {
    let (index, offset, child) = node
        .content()
        .iter()
        .enumerate()
        .scan(0, |offset, (index, child)| {
            let start = *offset;
            *offset += child.node_size();
            Some((index, start, child))
        })
        .find(|(_, offset, child)| pos < offset + child.node_size())
        .ok_or(StepError::NoNode(pos))?;

    if offset == pos {
        return Ok(node.with_child(index, f(child)?));
    }
    if child.kind().is_leaf() {
        return Err(StepError::NoNode(pos));
    }
    let updated = update_node_at(child, pos - offset - 1, f).map_err(|err| match err {
        StepError::NoNode(_) => StepError::NoNode(pos),
        StepError::TextNode(_) => StepError::TextNode(pos),
        other => other,
    })?;
    Ok(node.with_child(index, updated))
}

fn replace_children(
    node: &Node,
    from: usize,
    to: usize,
    content: &[Node],
) -> Result<Node, StepError> {
    let mut start_index = None;
    let mut end_index = None;
    let mut offset = 0;

    for (index, child) in node.content().iter().enumerate() {
        let size = child.node_size();
        if !child.kind().is_leaf() && from > offset && to < offset + size {
            let inner = offset + 1;
            let updated = replace_children(child, from - inner, to - inner, content)?;
            return Ok(node.with_child(index, updated));
        }
        if offset == from {
            start_index = Some(index);
        }
        if offset == to {
            end_index = Some(index);
        }
        offset += size;
    }
    if offset == from {
        start_index = Some(node.child_count());
    }
    if offset == to {
        end_index = Some(node.child_count());
    }

    let (Some(start), Some(end)) = (start_index, end_index) else {
        return Err(StepError::Unaligned { from, to });
    };

    for child in content {
        let allowed = if node.kind().is_textblock() {
            child.kind().is_inline()
        } else {
            !child.kind().is_inline() && child.kind() != NodeType::Doc
        };
        if !allowed {
            return Err(StepError::InvalidContent {
                parent: node.kind(),
                child: child.kind(),
            });
        }
    }

    let mut children = node.content()[..start].to_vec();
    children.extend(content.iter().cloned());
    children.extend(node.content()[end..].iter().cloned());
    Ok(node.with_content(children))
}

/// One unit of inline content: a single marked character or a non-text
/// inline leaf
enum Inline {
    Char(char, Vec<Mark>),
    Leaf(Node),
}

impl Inline {
    fn marks(&self) -> Option<&[Mark]> {
        match self {
            Inline::Char(_, marks) => Some(marks),
            Inline::Leaf(_) => None,
        }
    }
}

fn replace_text(node: &Node, from: usize, to: usize, text: &str) -> Option<Node> {
    if node.kind().is_textblock() {
        let mut units: Vec<Inline> = Vec::new();
        for child in node.content() {
            match child.text_str() {
                Some(t) => {
                    units.extend(t.chars().map(|c| Inline::Char(c, child.marks().to_vec())))
                }
                None => units.push(Inline::Leaf(child.clone())),
            }
        }
        if to > units.len() {
            return None;
        }
        // Inserted text continues the formatting it is typed into
        let marks = from
            .checked_sub(1)
            .and_then(|before| units[before].marks())
            .or_else(|| units.get(to).and_then(Inline::marks))
            .map(<[Mark]>::to_vec)
            .unwrap_or_default();
        units.splice(from..to, text.chars().map(|c| Inline::Char(c, marks.clone())));
        return Some(node.with_content(regroup(units)));
    }

    let mut offset = 0;
    for (index, child) in node.content().iter().enumerate() {
        let size = child.node_size();
        if !child.kind().is_leaf() && from > offset && to < offset + size {
            let inner = offset + 1;
            let updated = replace_text(child, from - inner, to - inner, text)?;
            return Some(node.with_child(index, updated));
        }
        offset += size;
    }
    None
}

/// Merge adjacent characters with equal marks back into text nodes
fn regroup(units: Vec<Inline>) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut run = String::new();
    let mut run_marks: Vec<Mark> = Vec::new();
    for unit in units {
        match unit {
            Inline::Char(c, marks) => {
                if !run.is_empty() && marks != run_marks {
                    nodes.push(Node::marked_text(
                        std::mem::take(&mut run),
                        std::mem::take(&mut run_marks),
                    ));
                }
                if run.is_empty() {
                    run_marks = marks;
                }
                run.push(c);
            }
            Inline::Leaf(leaf) => {
                if !run.is_empty() {
                    nodes.push(Node::marked_text(
                        std::mem::take(&mut run),
                        std::mem::take(&mut run_marks),
                    ));
                }
                nodes.push(leaf);
            }
        }
    }
    if !run.is_empty() {
        nodes.push(Node::marked_text(run, run_marks));
    }
    nodes
}

/// Which side a position sticks to when content is inserted exactly at it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assoc {
    Before,
    After,
}

/// Result of mapping a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    /// The position was strictly inside a replaced range
    pub deleted: bool,
}

/// Position map of a single step: `(start, old_size, new_size)` ranges in
/// pre-step coordinates, sorted by start.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<(usize, usize, usize)>,
}

impl StepMap {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn single(start: usize, old_size: usize, new_size: usize) -> Self {
        if old_size == 0 && new_size == 0 {
            return Self::identity();
        }
        Self {
            ranges: vec![(start, old_size, new_size)],
        }
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut diff: isize = 0;
        for &(start, old_size, new_size) in &self.ranges {
            if start > pos {
                break;
            }
            let end = start + old_size;
            if pos <= end {
                let side = if old_size == 0 {
                    assoc
                } else if pos == start {
                    Assoc::Before
                } else if pos == end {
                    Assoc::After
                } else {
                    assoc
                };
                let base = (start as isize + diff) as usize;
                let mapped = match side {
                    Assoc::Before => base,
                    Assoc::After => base + new_size,
                };
                return MapResult {
                    pos: mapped,
                    deleted: pos > start && pos < end,
                };
            }
            diff += new_size as isize - old_size as isize;
        }
        MapResult {
            pos: (pos as isize + diff) as usize,
            deleted: false,
        }
    }
}

/// Sequence of step maps accumulated by a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(|m| m.ranges.is_empty())
    }

    pub fn map(&self, pos: usize, assoc: Assoc) -> usize {
        self.map_result(pos, assoc).pos
    }

    pub fn map_result(&self, pos: usize, assoc: Assoc) -> MapResult {
        let mut deleted = false;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            pos = result.pos;
            deleted |= result.deleted;
        }
        MapResult { pos, deleted }
    }
}

/// A group of steps applied atomically, plus metadata for plugins
#[derive(Debug, Clone)]
pub struct Transaction {
    before: Node,
    doc: Node,
    steps: Vec<Step>,
    mapping: Mapping,
    meta: HashMap<PluginKey, Value>,
}

impl Transaction {
    /// Start a transaction against a document snapshot
    pub fn new(doc: &Node) -> Self {
        Self {
            before: doc.clone(),
            doc: doc.clone(),
            steps: Vec::new(),
            mapping: Mapping::default(),
            meta: HashMap::new(),
        }
    }

    /// Apply a step to the transaction's current document
    pub fn step(&mut self, step: Step) -> Result<&mut Self, StepError> {
        let (doc, map) = step.apply(&self.doc)?;
        self.doc = doc;
        self.mapping.push(map);
        self.steps.push(step);
        Ok(self)
    }

    pub fn set_node_attrs(&mut self, pos: usize, attrs: Attrs) -> Result<&mut Self, StepError> {
        self.step(Step::SetNodeAttrs { pos, attrs })
    }

    pub fn set_node_type(
        &mut self,
        pos: usize,
        kind: NodeType,
        attrs: Attrs,
    ) -> Result<&mut Self, StepError> {
        self.step(Step::SetNodeType { pos, kind, attrs })
    }

    pub fn replace(
        &mut self,
        from: usize,
        to: usize,
        content: Vec<Node>,
    ) -> Result<&mut Self, StepError> {
        self.step(Step::Replace { from, to, content })
    }

    pub fn insert(&mut self, pos: usize, content: Vec<Node>) -> Result<&mut Self, StepError> {
        self.replace(pos, pos, content)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, StepError> {
        self.replace(from, to, Vec::new())
    }

    pub fn insert_text(&mut self, pos: usize, text: &str) -> Result<&mut Self, StepError> {
        self.replace_text(pos, pos, text)
    }

    pub fn replace_text(
        &mut self,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<&mut Self, StepError> {
        self.step(Step::ReplaceText {
            from,
            to,
            text: text.to_string(),
        })
    }

    /// Move the node starting at `pos` so that it starts at `target`
    /// (a position in the current document). The node keeps its identity.
    pub fn move_node(&mut self, pos: usize, target: usize) -> Result<&mut Self, StepError> {
        let node = self
            .doc
            .node_at(pos)
            .filter(|n| !n.is_text())
            .cloned()
            .ok_or(StepError::NoNode(pos))?;
        let end = pos + node.node_size();
        if target > pos && target < end {
            return Err(StepError::Unaligned { from: pos, to: target });
        }
        self.delete(pos, end)?;
        let target = if target >= end {
            target - node.node_size()
        } else {
            target
        };
        self.insert(target, vec![node])
    }

    /// Replace the whole document content
    pub fn replace_doc(&mut self, doc: &Node) -> Result<&mut Self, StepError> {
        let size = self.doc.content_size();
        self.replace(0, size, doc.content().to_vec())
    }

    pub fn set_meta(&mut self, key: PluginKey, value: impl Into<Value>) -> &mut Self {
        self.meta.insert(key, value.into());
        self
    }

    pub fn meta(&self, key: PluginKey) -> Option<&Value> {
        self.meta.get(&key)
    }

    /// Whether any step was applied
    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    pub fn before(&self) -> &Node {
        &self.before
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Node {
        // h1 "Ab" (0..4), p "cd" (4..8), blockquote > p "e" (8..13)
        Node::doc(vec![
            Node::heading(1, "Ab"),
            Node::paragraph("cd"),
            Node::new(
                NodeType::Blockquote,
                Attrs::new(),
                vec![Node::paragraph("e")],
            ),
        ])
    }

    fn attrs_with(name: &str, value: impl Into<Value>) -> Attrs {
        let mut attrs = Attrs::new();
        attrs.insert(name.to_string(), value.into());
        attrs
    }

    #[test]
    fn test_set_node_attrs_keeps_identity_and_positions() -> Result<(), StepError> {
        let doc = doc();
        let id = doc.content()[0].id();
        let mut tr = Transaction::new(&doc);
        tr.set_node_attrs(0, attrs_with("level", 2))?;

        let heading = tr.doc().node_at(0).unwrap();
        assert_eq!(heading.id(), id);
        assert_eq!(heading.attr("level"), Some(&Value::from(2)));
        assert_eq!(tr.mapping().map(4, Assoc::After), 4);
        assert!(tr.doc_changed());
        Ok(())
    }

    #[test]
    fn test_set_node_attrs_on_missing_node() {
        let mut tr = Transaction::new(&doc());
        assert_eq!(
            tr.set_node_attrs(2, Attrs::new()).unwrap_err(),
            StepError::NoNode(2)
        );
        assert_eq!(
            tr.set_node_attrs(1, Attrs::new()).unwrap_err(),
            StepError::TextNode(1)
        );
        assert!(!tr.doc_changed());
    }

    #[test]
    fn test_set_node_attrs_nested() -> Result<(), StepError> {
        let mut tr = Transaction::new(&doc());
        tr.set_node_attrs(9, attrs_with("textAlign", "center"))?;
        let para = tr.doc().node_at(9).unwrap();
        assert_eq!(para.kind(), NodeType::Paragraph);
        assert_eq!(para.attr("textAlign"), Some(&Value::from("center")));
        Ok(())
    }

    #[test]
    fn test_set_node_type() -> Result<(), StepError> {
        let doc = doc();
        let id = doc.content()[0].id();
        let mut tr = Transaction::new(&doc);
        tr.set_node_type(0, NodeType::Paragraph, Attrs::new())?;
        let node = tr.doc().node_at(0).unwrap();
        assert_eq!(node.kind(), NodeType::Paragraph);
        assert_eq!(node.id(), id);

        let err = Transaction::new(&doc)
            .set_node_type(8, NodeType::Paragraph, Attrs::new())
            .unwrap_err();
        assert!(matches!(err, StepError::IncompatibleType { .. }));
        Ok(())
    }

    #[test]
    fn test_insert_and_delete_top_level() -> Result<(), StepError> {
        let mut tr = Transaction::new(&doc());
        tr.insert(4, vec![Node::paragraph("new")])?;
        assert_eq!(tr.doc().child_count(), 4);
        assert_eq!(tr.doc().node_at(4).unwrap().text_content(), "new");
        assert_eq!(tr.mapping().map(4, Assoc::After), 9);
        assert_eq!(tr.mapping().map(4, Assoc::Before), 4);
        assert_eq!(tr.mapping().map(8, Assoc::After), 13);

        tr.delete(0, 4)?;
        assert_eq!(tr.doc().child_count(), 3);
        assert_eq!(tr.doc().node_at(0).unwrap().text_content(), "new");
        Ok(())
    }

    #[test]
    fn test_delete_maps_inner_positions_as_deleted() -> Result<(), StepError> {
        let mut tr = Transaction::new(&doc());
        tr.delete(4, 8)?;
        let inside = tr.mapping().map_result(5, Assoc::After);
        assert!(inside.deleted);
        assert_eq!(inside.pos, 4);
        let after = tr.mapping().map_result(8, Assoc::After);
        assert!(!after.deleted);
        assert_eq!(after.pos, 4);
        Ok(())
    }

    #[test]
    fn test_replace_nested_container() -> Result<(), StepError> {
        let mut tr = Transaction::new(&doc());
        // Inside the blockquote, after its paragraph
        tr.insert(12, vec![Node::paragraph("f")])?;
        let quote = tr.doc().node_at(8).unwrap();
        assert_eq!(quote.child_count(), 2);
        Ok(())
    }

    #[test]
    fn test_replace_unaligned_fails() {
        let mut tr = Transaction::new(&doc());
        assert_eq!(
            tr.delete(2, 6).unwrap_err(),
            StepError::Unaligned { from: 2, to: 6 }
        );
        assert_eq!(
            tr.delete(0, 99).unwrap_err(),
            StepError::OutOfRange { pos: 99, size: 13 }
        );
    }

    #[test]
    fn test_replace_rejects_inline_at_block_level() {
        let mut tr = Transaction::new(&doc());
        let err = tr.insert(4, vec![Node::text("loose")]).unwrap_err();
        assert!(matches!(err, StepError::InvalidContent { .. }));
    }

    #[test]
    fn test_replace_text() -> Result<(), StepError> {
        let mut tr = Transaction::new(&doc());
        tr.insert_text(2, "XY")?;
        assert_eq!(tr.doc().content()[0].text_content(), "AXYb");
        assert_eq!(tr.doc().content_size(), 15);

        tr.replace_text(1, 5, "")?;
        assert_eq!(tr.doc().content()[0].text_content(), "");
        assert_eq!(tr.doc().content()[0].child_count(), 0);
        Ok(())
    }

    #[test]
    fn test_replace_text_keeps_marks() -> Result<(), StepError> {
        let bold = vec![Mark::new("bold")];
        let para = Node::new(
            NodeType::Paragraph,
            Attrs::new(),
            vec![Node::marked_text("ab", bold.clone()), Node::text("cd")],
        );
        let mut tr = Transaction::new(&Node::doc(vec![para]));
        // Typing after "ab" stays bold, typing at the end stays plain
        tr.insert_text(3, "X")?;
        tr.insert_text(6, "Y")?;
        let children = tr.doc().content()[0].content().to_vec();
        assert_eq!(
            children,
            vec![Node::marked_text("abX", bold.clone()), Node::text("cdY")]
        );

        // Deleting the plain run leaves the bold one alone
        tr.replace_text(4, 7, "")?;
        let children = tr.doc().content()[0].content().to_vec();
        assert_eq!(children, vec![Node::marked_text("abX", bold)]);
        Ok(())
    }

    #[test]
    fn test_replace_text_outside_textblock() {
        let mut tr = Transaction::new(&doc());
        assert!(matches!(
            tr.insert_text(4, "x").unwrap_err(),
            StepError::NotTextblock { .. }
        ));
    }

    #[test]
    fn test_replace_text_keeps_hard_breaks() -> Result<(), StepError> {
        let para = Node::new(
            NodeType::Paragraph,
            Attrs::new(),
            vec![
                Node::text("ab"),
                Node::new(NodeType::HardBreak, Attrs::new(), vec![]),
                Node::text("cd"),
            ],
        );
        let mut tr = Transaction::new(&Node::doc(vec![para]));
        tr.insert_text(5, "!")?;
        let kinds: Vec<NodeType> = tr.doc().content()[0]
            .content()
            .iter()
            .map(Node::kind)
            .collect();
        assert_eq!(
            kinds,
            vec![NodeType::Text, NodeType::HardBreak, NodeType::Text]
        );
        assert_eq!(tr.doc().content()[0].text_content(), "abc!d");
        Ok(())
    }

    #[test]
    fn test_move_node_keeps_identity() -> Result<(), StepError> {
        let doc = doc();
        let heading_id = doc.content()[0].id();
        let mut tr = Transaction::new(&doc);
        tr.move_node(0, 8)?;
        assert_eq!(tr.doc().content()[0].kind(), NodeType::Paragraph);
        assert_eq!(tr.doc().content()[1].id(), heading_id);
        assert_eq!(tr.doc().content_size(), 13);
        Ok(())
    }

    #[test]
    fn test_replace_doc() -> Result<(), StepError> {
        let mut tr = Transaction::new(&doc());
        let replacement = Node::doc(vec![Node::paragraph("only")]);
        tr.replace_doc(&replacement)?;
        assert_eq!(tr.doc(), &replacement);
        Ok(())
    }

    #[test]
    fn test_meta() {
        let key = PluginKey::new("test");
        let mut tr = Transaction::new(&doc());
        assert!(tr.meta(key).is_none());
        tr.set_meta(key, true);
        assert_eq!(tr.meta(key), Some(&Value::Bool(true)));
        assert!(!tr.doc_changed());
    }
}
