//! Editor session: state, node views, selection and history

use anyhow::{bail, Result};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::decoration::DecorationSet;
use crate::heading::{set_all_collapsed, toggle_collapsed, toggle_handle, CollapsibleHeading};
use crate::node::{Node, NodeId, NodeType};
use crate::schema::Schema;
use crate::state::{EditorState, Plugin, PluginKey};
use crate::transform::{Assoc, Transaction};
use crate::view::{EventDisposition, NodeView, NodeViewFactory, ToggleHandle, ViewCommand, ViewEvent};

/// Metadata key marking transactions produced by undo/redo
pub const HISTORY_KEY: PluginKey = PluginKey::new("history");

/// Maximum number of undo steps kept
const HISTORY_LIMIT: usize = 100;

/// A bundle of schema additions, plugins and node views
pub trait Extension {
    fn name(&self) -> &'static str;

    fn extend_schema(&self, _schema: &mut Schema) -> Result<()> {
        Ok(())
    }

    fn plugins(&self) -> Vec<Arc<dyn Plugin>> {
        Vec::new()
    }

    fn node_views(&self) -> Vec<(NodeType, NodeViewFactory)> {
        Vec::new()
    }
}

/// An editing session over one document
pub struct Editor {
    state: EditorState,
    factories: HashMap<NodeType, NodeViewFactory>,
    views: HashMap<NodeId, Box<dyn NodeView>>,
    selection: usize,
    undo_stack: Vec<Node>,
    redo_stack: Vec<Node>,
    rev: u64,
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("state", &self.state)
            .field("views", &self.views.len())
            .field("selection", &self.selection)
            .field("rev", &self.rev)
            .finish()
    }
}

impl Editor {
    /// Build an editor from a document and a list of extensions
    pub fn new(doc: Node, extensions: &[Box<dyn Extension>]) -> Result<Self> {
        let mut schema = Schema::basic();
        let mut plugins = Vec::new();
        let mut factories = HashMap::new();

        for ext in extensions {
            debug!("Registering extension {}", ext.name());
            ext.extend_schema(&mut schema)?;
            plugins.extend(ext.plugins());
            for (kind, factory) in ext.node_views() {
                if factories.insert(kind, factory).is_some() {
                    bail!("Extension '{}' registers a second view for '{}'", ext.name(), kind);
                }
            }
        }

        let doc = normalize(&schema, &doc);
        let mut editor = Self {
            state: EditorState::create(doc, Arc::new(schema), plugins),
            factories,
            views: HashMap::new(),
            selection: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            rev: 0,
        };
        editor.sync_views();
        Ok(editor)
    }

    /// Editor with the collapsible heading extension enabled for `levels`
    pub fn with_heading_levels(doc: Node, levels: &[u8]) -> Result<Self> {
        Self::new(doc, &[Box::new(CollapsibleHeading::new(levels))])
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Node {
        self.state.doc()
    }

    /// Incremented on every dispatched transaction
    pub fn rev(&self) -> u64 {
        self.rev
    }

    pub fn selection(&self) -> usize {
        self.selection
    }

    pub fn set_selection(&mut self, pos: usize) {
        self.selection = pos.min(self.doc().content_size());
    }

    pub fn decorations(&self) -> DecorationSet {
        self.state.decorations()
    }

    /// Whether the node starting at `pos` is hidden by a collapsed section
    pub fn is_hidden(&self, pos: usize) -> bool {
        self.decorations().is_hidden(pos)
    }

    pub fn view(&self, id: NodeId) -> Option<&dyn NodeView> {
        self.views.get(&id).map(|view| view.as_ref())
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    /// Apply a transaction: install the new state, record history, map the
    /// selection and bring every node view up to date.
    pub fn dispatch(&mut self, tr: Transaction) {
        if tr.doc_changed() && tr.meta(HISTORY_KEY).is_none() {
            self.undo_stack.push(self.state.doc().clone());
            if self.undo_stack.len() > HISTORY_LIMIT {
                self.undo_stack.remove(0);
            }
            self.redo_stack.clear();
        }

        self.state = self.state.apply(&tr);
        let mapped = tr.mapping().map(self.selection, Assoc::After);
        self.selection = mapped.min(self.state.doc().content_size());
        self.rev += 1;
        self.sync_views();
    }

    /// Deliver an event to the view of a node.
    ///
    /// A handled event never moves the selection; any command it carries is run
    /// against the live document.
    pub fn handle_view_event(&mut self, id: NodeId, event: ViewEvent) -> EventDisposition {
        let Some(view) = self.views.get(&id) else {
            return EventDisposition::Ignored;
        };
        let disposition = view.handle_event(event);
        if let EventDisposition::Handled(Some(command)) = disposition {
            self.run_command(command);
        }
        disposition
    }

    fn run_command(&mut self, command: ViewCommand) {
        match command {
            ViewCommand::ToggleCollapsed(handle) => {
                self.activate_toggle(handle);
            }
        }
    }

    /// Toggle the heading a handle points at. Returns `false` if the handle no
    /// longer resolves to the heading it was rendered for.
    pub fn activate_toggle(&mut self, handle: ToggleHandle) -> bool {
        let tr = toggle_handle(&self.state, handle);
        self.dispatch_toggle(tr)
    }

    pub fn toggle_at(&mut self, pos: usize) -> bool {
        let tr = toggle_collapsed(&self.state, pos);
        self.dispatch_toggle(tr)
    }

    fn dispatch_toggle(&mut self, tr: Option<Transaction>) -> bool {
        match tr {
            Some(tr) => {
                self.dispatch(tr);
                true
            }
            None => false,
        }
    }

    /// Collapse or expand every top-level heading
    pub fn set_all_collapsed(&mut self, collapsed: bool) -> bool {
        match set_all_collapsed(&self.state, collapsed) {
            Some(tr) => {
                self.dispatch(tr);
                true
            }
            None => false,
        }
    }

    /// Replace the whole document (e.g. after a reload). Undoable.
    pub fn replace_doc(&mut self, doc: &Node) -> Result<()> {
        let doc = normalize(self.state.schema(), doc);
        let mut tr = self.state.tr();
        tr.replace_doc(&doc)?;
        self.dispatch(tr);
        Ok(())
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = self.state.doc().clone();
        if self.restore(&previous) {
            self.redo_stack.push(current);
            true
        } else {
            self.undo_stack.push(previous);
            false
        }
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = self.state.doc().clone();
        if self.restore(&next) {
            self.undo_stack.push(current);
            true
        } else {
            self.redo_stack.push(next);
            false
        }
    }

    fn restore(&mut self, snapshot: &Node) -> bool {
        let mut tr = self.state.tr();
        if let Err(err) = tr.replace_doc(snapshot) {
            warn!("Cannot restore history snapshot: {}", err);
            return false;
        }
        tr.set_meta(HISTORY_KEY, true);
        self.dispatch(tr);
        true
    }

    /// Bring node views in line with the current document: update views of
    /// surviving nodes, replace views that can no longer represent their node,
    /// create views for new nodes and drop views of removed ones.
    fn sync_views(&mut self) {
        let Self {
            state,
            factories,
            views,
            ..
        } = self;
        let mut live = HashSet::new();

        state.doc().descendants(|node, pos, _| {
            let id = node.id();
            let updated = views.get_mut(&id).map(|view| view.update(node, pos));
            match updated {
                Some(true) => {
                    live.insert(id);
                }
                Some(false) | None => {
                    if updated.is_some() {
                        debug!("Discarding view of {:?}, now a {}", id, node.kind());
                        views.remove(&id);
                    }
                    if let Some(factory) = factories.get(&node.kind()) {
                        views.insert(id, factory(node, pos));
                        live.insert(id);
                    }
                }
            }
            !node.kind().is_textblock()
        });

        views.retain(|id, _| live.contains(id));
    }
}

/// Fill in schema defaults for every node, keeping identities
fn normalize(schema: &Schema, node: &Node) -> Node {
    if node.is_text() {
        return node.clone();
    }
    let content = node
        .content()
        .iter()
        .map(|child| normalize(schema, child))
        .collect();
    node.with_attrs(schema.normalize_attrs(node.kind(), node.attrs()))
        .with_content(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collapse::COLLAPSED_CLASS;
    use crate::heading::is_collapsed;
    use crate::node::Attrs;
    use crate::view::ToggleIcon;
    use serde_json::Value;

    fn editor(doc: Node) -> Editor {
        Editor::new(doc, &[Box::new(CollapsibleHeading::default())]).unwrap()
    }

    fn sample() -> Node {
        // h1 A (0..3), p a (3..6), h2 B (6..9), p b (9..12)
        Node::doc(vec![
            Node::heading(1, "A"),
            Node::paragraph("a"),
            Node::heading(2, "B"),
            Node::paragraph("b"),
        ])
    }

    fn heading_id(editor: &Editor, index: usize) -> NodeId {
        editor.doc().content()[index].id()
    }

    #[test]
    fn test_views_created_for_headings_only() {
        let editor = editor(sample());
        assert_eq!(editor.view_count(), 2);
        assert!(editor.view(heading_id(&editor, 0)).is_some());
        assert!(editor.view(heading_id(&editor, 1)).is_none());
    }

    #[test]
    fn test_new_fills_default_attrs() {
        let editor = editor(sample());
        let heading = editor.doc().node_at(0).unwrap();
        assert_eq!(heading.attr("collapsed"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_duplicate_view_registration_fails() {
        let result = Editor::new(
            sample(),
            &[
                Box::new(CollapsibleHeading::default()),
                Box::new(CollapsibleHeading::default()),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_toggle_click_dispatches_and_updates_view() {
        let mut editor = editor(sample());
        let id = heading_id(&editor, 0);
        editor.set_selection(4);

        let disposition = editor.handle_view_event(id, ViewEvent::ToggleClick);
        assert!(matches!(disposition, EventDisposition::Handled(Some(_))));
        assert_eq!(editor.rev(), 1);
        assert_eq!(editor.selection(), 4);

        let model = editor.view(id).unwrap().render();
        assert_eq!(model.toggle.unwrap().icon, ToggleIcon::Collapsed);
        assert_eq!(model.data_attr("data-collapsed"), Some("true"));

        let decorations = editor.decorations();
        let hidden: Vec<(usize, usize, &str)> = decorations
            .iter()
            .map(|d| (d.from, d.to, d.class.as_str()))
            .collect();
        assert_eq!(
            hidden,
            vec![(3, 6, COLLAPSED_CLASS), (6, 9, COLLAPSED_CLASS), (9, 12, COLLAPSED_CLASS)]
        );
    }

    #[test]
    fn test_content_click_is_ignored() {
        let mut editor = editor(sample());
        let id = heading_id(&editor, 0);
        assert_eq!(
            editor.handle_view_event(id, ViewEvent::ContentClick),
            EventDisposition::Ignored
        );
        assert_eq!(editor.rev(), 0);
    }

    #[test]
    fn test_stale_handle_is_noop() -> Result<()> {
        let mut editor = editor(sample());
        let handle = match editor.view(heading_id(&editor, 2)).unwrap().render().toggle {
            Some(toggle) => toggle.handle,
            None => panic!("heading view without toggle"),
        };
        assert_eq!(handle.pos(), 6);

        // Delete the first heading; position 6 now starts the second paragraph
        let mut tr = editor.state().tr();
        tr.delete(0, 3)?;
        editor.dispatch(tr);
        let rev = editor.rev();

        assert!(!editor.activate_toggle(handle));
        assert_eq!(editor.rev(), rev);
        assert!(editor.decorations().is_empty());
        Ok(())
    }

    #[test]
    fn test_handle_does_not_flip_following_heading() -> Result<()> {
        let doc = Node::doc(vec![
            Node::heading(1, "A").with_attr("collapsed", true),
            Node::heading(1, "B"),
            Node::paragraph("body"),
        ]);
        let mut editor = editor(doc);
        let handle = match editor.view(heading_id(&editor, 0)).unwrap().render().toggle {
            Some(toggle) => toggle.handle,
            None => panic!("heading view without toggle"),
        };

        // B now starts where A used to
        let mut tr = editor.state().tr();
        tr.delete(0, 3)?;
        editor.dispatch(tr);
        let rev = editor.rev();
        assert_eq!(editor.doc().content()[0].text_content(), "B");

        assert!(!editor.activate_toggle(handle));
        assert_eq!(editor.rev(), rev);
        assert!(!is_collapsed(&editor.doc().content()[0]));
        assert!(editor.decorations().is_empty());

        // A fresh handle from B's view still works
        let fresh = match editor.view(heading_id(&editor, 0)).unwrap().render().toggle {
            Some(toggle) => toggle.handle,
            None => panic!("heading view without toggle"),
        };
        assert!(editor.activate_toggle(fresh));
        assert!(is_collapsed(&editor.doc().content()[0]));
        Ok(())
    }

    #[test]
    fn test_view_discarded_when_type_changes() -> Result<()> {
        let mut editor = editor(sample());
        let id = heading_id(&editor, 0);
        let mut tr = editor.state().tr();
        tr.set_node_type(0, NodeType::Paragraph, Attrs::new())?;
        editor.dispatch(tr);

        assert!(editor.view(id).is_none());
        assert_eq!(editor.view_count(), 1);
        Ok(())
    }

    #[test]
    fn test_views_follow_moved_nodes() -> Result<()> {
        let mut editor = editor(sample());
        let id = heading_id(&editor, 2);
        let mut tr = editor.state().tr();
        tr.move_node(6, 0)?;
        editor.dispatch(tr);

        let model = editor.view(id).unwrap().render();
        assert_eq!(model.toggle.unwrap().handle.pos(), 0);
        assert_eq!(model.data_attr("data-level"), Some("2"));
        Ok(())
    }

    #[test]
    fn test_undo_redo_toggle() {
        let mut editor = editor(sample());
        assert!(editor.toggle_at(0));
        assert_eq!(editor.decorations().len(), 3);

        assert!(editor.undo());
        assert!(!is_collapsed(editor.doc().node_at(0).unwrap()));
        assert!(editor.decorations().is_empty());
        assert!(editor.can_redo());

        assert!(editor.redo());
        assert!(is_collapsed(editor.doc().node_at(0).unwrap()));
        assert_eq!(editor.decorations().len(), 3);
        assert!(!editor.redo());
    }

    #[test]
    fn test_undo_keeps_view_identity() {
        let mut editor = editor(sample());
        let id = heading_id(&editor, 0);
        editor.toggle_at(0);
        editor.undo();
        assert!(editor.view(id).is_some());
        assert_eq!(editor.view_count(), 2);
    }

    #[test]
    fn test_replace_doc_recomputes() -> Result<()> {
        let mut editor = editor(sample());
        let replacement = Node::doc(vec![
            Node::heading(1, "X").with_attr("collapsed", true),
            Node::paragraph("x"),
        ]);
        editor.replace_doc(&replacement)?;
        assert_eq!(editor.decorations().len(), 1);
        assert!(editor.is_hidden(3));
        assert_eq!(editor.view_count(), 1);
        assert!(editor.undo());
        assert_eq!(editor.doc().child_count(), 4);
        Ok(())
    }

    #[test]
    fn test_collapse_and_expand_all() {
        let mut editor = editor(sample());
        assert!(editor.set_all_collapsed(true));
        assert!(!editor.set_all_collapsed(true));
        assert!(editor.is_hidden(3));
        assert!(editor.set_all_collapsed(false));
        assert!(editor.decorations().is_empty());
    }
}
