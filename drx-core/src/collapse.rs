//! Hidden-range computation for collapsed headings
//!
//! A collapsed top-level heading hides everything that follows it up to the next
//! heading of the same or a shallower level (or the end of the document). The
//! hidden content is exposed as node decorations on whole top-level blocks, so a
//! renderer only has to check whether a block's start is covered.

use log::debug;

use crate::decoration::{Decoration, DecorationSet};
use crate::heading::{heading_level, is_collapsed};
use crate::node::{Node, NodeType};
use crate::state::{Plugin, PluginKey};
use crate::transform::Transaction;

/// Key of the collapsible plugin; transactions carrying metadata under this key
/// force a rebuild of the hidden ranges.
pub const COLLAPSIBLE_PLUGIN_KEY: PluginKey = PluginKey::new("collapsiblePlugin");

/// Class applied to every hidden block
pub const COLLAPSED_CLASS: &str = "collapsed-content";

/// A span of positions hidden by a collapsed heading
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HiddenRange {
    /// Position of the collapsed heading
    pub heading: usize,
    /// First hidden position (immediately after the heading)
    pub from: usize,
    /// End of the hidden span (exclusive), always a top-level block boundary
    pub to: usize,
}

/// Compute the hidden ranges of a document.
///
/// Ranges are sorted and never overlap: a collapsed heading that is itself
/// inside a hidden range contributes nothing, since its section is a subset of
/// the enclosing one. Empty ranges are never returned.
pub fn compute_hidden_ranges(doc: &Node) -> Vec<HiddenRange> {
    let mut ranges = Vec::new();
    let mut covered_until = 0;

    for (offset, node) in doc.children_with_offsets() {
        if offset < covered_until || node.kind() != NodeType::Heading || !is_collapsed(node) {
            continue;
        }
        let heading_end = offset + node.node_size();
        let boundary = section_boundary(doc, heading_end, heading_level(node));
        if boundary > heading_end {
            ranges.push(HiddenRange {
                heading: offset,
                from: heading_end,
                to: boundary,
            });
            covered_until = boundary;
        }
    }

    ranges
}

/// Start of the first top-level block at or after `from` that contains (or is)
/// a heading closing a section of `level`; the document end if there is none.
fn section_boundary(doc: &Node, from: usize, level: Option<u8>) -> usize {
    doc.children_with_offsets()
        .filter(|(offset, _)| *offset >= from)
        .find(|(_, node)| contains_closing_heading(node, level))
        .map(|(offset, _)| offset)
        .unwrap_or_else(|| doc.content_size())
}

fn contains_closing_heading(node: &Node, level: Option<u8>) -> bool {
    if node.kind() == NodeType::Heading {
        return closes_section(heading_level(node), level);
    }
    let mut found = false;
    node.descendants(|child, _, _| {
        if found {
            return false;
        }
        if child.kind() == NodeType::Heading {
            found = closes_section(heading_level(child), level);
            return false;
        }
        true
    });
    found
}

/// Whether a heading of `candidate` level ends a section opened at `open`.
///
/// A heading without a usable level is treated as the shallowest possible: it
/// ends every section, and the section it opens is ended by any heading.
fn closes_section(candidate: Option<u8>, open: Option<u8>) -> bool {
    match (candidate, open) {
        (Some(candidate), Some(open)) => candidate <= open,
        _ => true,
    }
}

/// Build the decoration set for a document: one node decoration per top-level
/// block inside a hidden range. Nodes are decorated whole and never descended
/// into, so nested collapsed headings add nothing.
pub fn build_decorations(doc: &Node) -> DecorationSet {
    let mut decorations = Vec::new();
    for range in compute_hidden_ranges(doc) {
        doc.nodes_between(range.from, range.to, |node, pos, depth| {
            if depth == 0 && pos >= range.from && pos < range.to {
                decorations.push(Decoration::node(pos, pos + node.node_size(), COLLAPSED_CLASS));
                return false;
            }
            true
        });
    }
    DecorationSet::create(decorations)
}

/// Plugin maintaining the collapsed-content decorations
#[derive(Debug, Default, Clone, Copy)]
pub struct CollapsiblePlugin;

impl Plugin for CollapsiblePlugin {
    fn key(&self) -> PluginKey {
        COLLAPSIBLE_PLUGIN_KEY
    }

    fn init(&self, doc: &Node) -> DecorationSet {
        build_decorations(doc)
    }

    fn apply(&self, tr: &Transaction, previous: &DecorationSet) -> DecorationSet {
        if tr.doc_changed() || tr.meta(COLLAPSIBLE_PLUGIN_KEY).is_some() {
            let decorations = build_decorations(tr.doc());
            debug!(
                "Rebuilt collapsed decorations: {} hidden blocks",
                decorations.len()
            );
            return decorations;
        }
        previous.map(tr.mapping(), tr.doc())
    }
}
