//! Collapsible heading extension
//!
//! Adds a `collapsed` attribute to heading nodes, renders a toggle control in
//! front of every heading, and registers the [`CollapsiblePlugin`] that hides the
//! content of collapsed sections.

use anyhow::Result;
use log::debug;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::collapse::{CollapsiblePlugin, COLLAPSIBLE_PLUGIN_KEY};
use crate::editor::Extension;
use crate::node::{Attrs, Node, NodeId, NodeType};
use crate::schema::{AttrSpec, MarkupAttrs, Schema};
use crate::state::{EditorState, Plugin};
use crate::transform::Transaction;
use crate::view::{
    EventDisposition, NodeView, NodeViewFactory, ToggleControl, ToggleHandle, ToggleIcon,
    ViewCommand, ViewEvent, ViewModel,
};

/// Heading levels enabled by default
pub const DEFAULT_HEADING_LEVELS: [u8; 4] = [1, 2, 3, 4];

/// Markup attribute carrying the collapsed flag
pub const COLLAPSED_MARKUP_ATTR: &str = "data-collapsed";

/// Level of a heading node, `None` when missing or not a positive integer
pub fn heading_level(node: &Node) -> Option<u8> {
    node.attr("level")
        .and_then(Value::as_u64)
        .and_then(|level| u8::try_from(level).ok())
        .filter(|level| *level >= 1)
}

/// Whether a node is marked collapsed (absent means expanded)
pub fn is_collapsed(node: &Node) -> bool {
    attrs_collapsed(node.attrs())
}

fn attrs_collapsed(attrs: &Attrs) -> bool {
    attrs
        .get("collapsed")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn parse_collapsed(markup: &MarkupAttrs) -> Value {
    Value::Bool(
        markup
            .get(COLLAPSED_MARKUP_ATTR)
            .is_some_and(|value| value == "true"),
    )
}

fn render_collapsed(attrs: &Attrs) -> Vec<(String, String)> {
    vec![(
        COLLAPSED_MARKUP_ATTR.to_string(),
        attrs_collapsed(attrs).to_string(),
    )]
}

/// The `collapsed` attribute: defaults to false, round-trips through
/// `data-collapsed="true|false"`
pub fn collapsed_attr() -> AttrSpec {
    AttrSpec {
        name: "collapsed",
        default: Value::Bool(false),
        parse_markup: Some(parse_collapsed),
        render_markup: Some(render_collapsed),
    }
}

/// Extension making headings collapsible
#[derive(Debug, Clone)]
pub struct CollapsibleHeading {
    levels: Vec<u8>,
}

impl Default for CollapsibleHeading {
    fn default() -> Self {
        Self::new(&DEFAULT_HEADING_LEVELS)
    }
}

impl CollapsibleHeading {
    pub fn new(levels: &[u8]) -> Self {
        Self {
            levels: levels.to_vec(),
        }
    }

    pub fn levels(&self) -> &[u8] {
        &self.levels
    }

    /// The basic schema with this extension applied, as used for loading files
    pub fn schema(&self) -> Result<Schema> {
        let mut schema = Schema::basic();
        self.extend_schema(&mut schema)?;
        Ok(schema)
    }
}

impl Extension for CollapsibleHeading {
    fn name(&self) -> &'static str {
        "collapsibleHeading"
    }

    fn extend_schema(&self, schema: &mut Schema) -> Result<()> {
        schema.extend(NodeType::Heading, vec![collapsed_attr()])?;
        schema.set_heading_levels(&self.levels)
    }

    fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        vec![Arc::new(CollapsiblePlugin)]
    }

    fn node_views(&self) -> Vec<(NodeType, NodeViewFactory)> {
        vec![(NodeType::Heading, heading_view)]
    }
}

/// Flip the collapsed flag of the heading at `pos`.
///
/// The node is resolved against the state's current document. If nothing starts
/// at `pos` any more, or the node there is not a heading, no transaction is
/// produced.
pub fn toggle_collapsed(state: &EditorState, pos: usize) -> Option<Transaction> {
    let Some(node) = state.doc().node_at(pos) else {
        debug!("Ignoring toggle at {}: no node there", pos);
        return None;
    };
    if node.kind() != NodeType::Heading {
        debug!("Ignoring toggle at {}: node is a {}", pos, node.kind());
        return None;
    }
    let mut tr = state.tr();
    mark_collapsed(&mut tr, pos, node, !is_collapsed(node))?;
    tr.set_meta(COLLAPSIBLE_PLUGIN_KEY, true);
    Some(tr)
}

/// Flip the heading a toggle handle was rendered for.
///
/// The handle only resolves while the node at its position is still the same
/// heading. A handle whose position now holds another node, even another
/// heading, produces no transaction.
pub fn toggle_handle(state: &EditorState, handle: ToggleHandle) -> Option<Transaction> {
    let pos = handle.pos();
    let current = state.doc().node_at(pos).map(Node::id);
    if current != Some(handle.node()) {
        debug!("Ignoring stale toggle handle at {}: node {:?} is gone", pos, handle.node());
        return None;
    }
    toggle_collapsed(state, pos)
}

/// Collapse or expand every top-level heading. Returns `None` when no heading
/// needs to change.
pub fn set_all_collapsed(state: &EditorState, collapsed: bool) -> Option<Transaction> {
    let targets: Vec<(usize, &Node)> = state
        .doc()
        .children_with_offsets()
        .filter(|(_, node)| node.kind() == NodeType::Heading && is_collapsed(node) != collapsed)
        .collect();
    if targets.is_empty() {
        return None;
    }

    let mut tr = state.tr();
    for (pos, node) in targets {
        mark_collapsed(&mut tr, pos, node, collapsed)?;
    }
    tr.set_meta(COLLAPSIBLE_PLUGIN_KEY, true);
    Some(tr)
}

/// Set the collapsed flag on one heading, preserving its other attributes
fn mark_collapsed(tr: &mut Transaction, pos: usize, node: &Node, collapsed: bool) -> Option<()> {
    let mut attrs = node.attrs().clone();
    attrs.insert("collapsed".to_string(), Value::Bool(collapsed));
    match tr.set_node_attrs(pos, attrs) {
        Ok(_) => Some(()),
        Err(err) => {
            debug!("Cannot update heading at {}: {}", pos, err);
            None
        }
    }
}

/// View of a heading: the heading element, a toggle control and a content slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingView {
    id: NodeId,
    level: Option<u8>,
    collapsed: bool,
    pos: usize,
    content: String,
}

impl HeadingView {
    pub fn new(node: &Node, pos: usize) -> Self {
        Self {
            id: node.id(),
            level: heading_level(node),
            collapsed: is_collapsed(node),
            pos,
            content: node.text_content(),
        }
    }

    fn icon(&self) -> ToggleIcon {
        if self.collapsed {
            ToggleIcon::Collapsed
        } else {
            ToggleIcon::Expanded
        }
    }
}

fn heading_view(node: &Node, pos: usize) -> Box<dyn NodeView> {
    Box::new(HeadingView::new(node, pos))
}

impl NodeView for HeadingView {
    fn update(&mut self, node: &Node, pos: usize) -> bool {
        if node.kind() != NodeType::Heading {
            return false;
        }
        *self = Self::new(node, pos);
        true
    }

    fn render(&self) -> ViewModel {
        let mut data = BTreeMap::new();
        data.insert(
            "data-level".to_string(),
            self.level.map(|l| l.to_string()).unwrap_or_default(),
        );
        data.insert(
            COLLAPSED_MARKUP_ATTR.to_string(),
            self.collapsed.to_string(),
        );

        ViewModel {
            tag: format!("h{}", self.level.unwrap_or(1)),
            classes: vec!["collapsible-heading".to_string()],
            data,
            toggle: Some(ToggleControl {
                icon: self.icon(),
                handle: ToggleHandle::new(self.pos, self.id),
            }),
            content: self.content.clone(),
        }
    }

    fn handle_event(&self, event: ViewEvent) -> EventDisposition {
        match event {
            ViewEvent::ToggleClick => EventDisposition::Handled(Some(
                ViewCommand::ToggleCollapsed(ToggleHandle::new(self.pos, self.id)),
            )),
            ViewEvent::ContentClick => EventDisposition::Ignored,
        }
    }
}
