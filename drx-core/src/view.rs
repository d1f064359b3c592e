//! Node views: per-node render state kept in sync with the document

use std::collections::BTreeMap;
use std::fmt;

use crate::node::{Node, NodeId};

/// Remembered position of a toggle control and the node it was rendered for.
///
/// This is a weak reference: it must be re-resolved against the current document
/// before use. Resolution fails when the node at `pos` is no longer the node
/// the handle was handed out for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ToggleHandle {
    pos: usize,
    node: NodeId,
}

impl ToggleHandle {
    pub fn new(pos: usize, node: NodeId) -> Self {
        Self { pos, node }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// Icon shown by a toggle control
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleIcon {
    /// Section is collapsed; points right
    Collapsed,
    /// Section is expanded; points down
    Expanded,
}

impl ToggleIcon {
    pub fn glyph(self) -> &'static str {
        match self {
            ToggleIcon::Collapsed => "▸",
            ToggleIcon::Expanded => "▾",
        }
    }
}

/// Clickable control rendered next to a node; never part of the editable content
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToggleControl {
    pub icon: ToggleIcon,
    pub handle: ToggleHandle,
}

/// What a node view renders
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewModel {
    /// Element tag, e.g. `h2`
    pub tag: String,
    pub classes: Vec<String>,
    /// `data-*` attributes reflecting node attributes
    pub data: BTreeMap<String, String>,
    pub toggle: Option<ToggleControl>,
    /// Text of the content slot, the only editable part of the view
    pub content: String,
}

impl ViewModel {
    pub fn data_attr(&self, name: &str) -> Option<&str> {
        self.data.get(name).map(String::as_str)
    }
}

/// Events delivered to a node view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    /// The toggle control was activated
    ToggleClick,
    /// The content slot was clicked
    ContentClick,
}

/// Commands a view asks the editor to run against the live document
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewCommand {
    ToggleCollapsed(ToggleHandle),
}

/// Outcome of delivering an event to a view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventDisposition {
    /// Not handled; the editor applies its default behaviour (selection, editing)
    Ignored,
    /// Handled by the view; the editor must not treat it as a content edit or
    /// move the selection
    Handled(Option<ViewCommand>),
}

/// A view bound to one document node
pub trait NodeView: fmt::Debug {
    /// Refresh from the node's current state. Returning `false` means the view
    /// can no longer represent the node and must be discarded.
    fn update(&mut self, node: &Node, pos: usize) -> bool;

    fn render(&self) -> ViewModel;

    fn handle_event(&self, event: ViewEvent) -> EventDisposition;
}

/// Builds a view for a node at a position
pub type NodeViewFactory = fn(&Node, usize) -> Box<dyn NodeView>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_glyphs() {
        assert_eq!(ToggleIcon::Collapsed.glyph(), "▸");
        assert_eq!(ToggleIcon::Expanded.glyph(), "▾");
    }

    #[test]
    fn test_view_model_data_attr() {
        let mut data = BTreeMap::new();
        data.insert("data-level".to_string(), "2".to_string());
        let model = ViewModel {
            tag: "h2".to_string(),
            classes: vec![],
            data,
            toggle: None,
            content: String::new(),
        };
        assert_eq!(model.data_attr("data-level"), Some("2"));
        assert_eq!(model.data_attr("data-collapsed"), None);
    }
}
