//! Editor state: a document snapshot plus derived plugin state

use std::fmt;
use std::sync::Arc;

use crate::decoration::DecorationSet;
use crate::node::Node;
use crate::schema::Schema;
use crate::transform::Transaction;

/// Key identifying a plugin and the transaction metadata addressed to it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PluginKey(&'static str);

impl PluginKey {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// A plugin keeps derived decoration state alongside the document.
///
/// `init` builds the state for a fresh document; `apply` produces the state
/// after a transaction from the previous state. Both must be pure functions of
/// their inputs.
pub trait Plugin: Send + Sync {
    fn key(&self) -> PluginKey;

    fn init(&self, doc: &Node) -> DecorationSet;

    fn apply(&self, tr: &Transaction, previous: &DecorationSet) -> DecorationSet;
}

/// Immutable editor state
#[derive(Clone)]
pub struct EditorState {
    doc: Node,
    schema: Arc<Schema>,
    plugins: Vec<Arc<dyn Plugin>>,
    plugin_states: Vec<DecorationSet>,
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.plugins.iter().map(|p| p.key().name()).collect();
        f.debug_struct("EditorState")
            .field("doc_size", &self.doc.content_size())
            .field("plugins", &keys)
            .finish()
    }
}

impl EditorState {
    pub fn create(doc: Node, schema: Arc<Schema>, plugins: Vec<Arc<dyn Plugin>>) -> Self {
        let plugin_states = plugins.iter().map(|p| p.init(&doc)).collect();
        Self {
            doc,
            schema,
            plugins,
            plugin_states,
        }
    }

    pub fn doc(&self) -> &Node {
        &self.doc
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Start a transaction against the current document
    pub fn tr(&self) -> Transaction {
        Transaction::new(&self.doc)
    }

    /// Produce the state that results from a transaction.
    ///
    /// The transaction must have been started from this state's document. The
    /// new document and every plugin's new state are computed together and
    /// returned as one value, so no caller can observe one without the other.
    pub fn apply(&self, tr: &Transaction) -> Self {
        debug_assert!(
            tr.before() == &self.doc,
            "transaction was not started from this state"
        );
        let plugin_states = self
            .plugins
            .iter()
            .zip(&self.plugin_states)
            .map(|(plugin, previous)| plugin.apply(tr, previous))
            .collect();
        Self {
            doc: tr.doc().clone(),
            schema: Arc::clone(&self.schema),
            plugins: self.plugins.clone(),
            plugin_states,
        }
    }

    /// State of one plugin
    pub fn plugin_state(&self, key: PluginKey) -> Option<&DecorationSet> {
        self.plugins
            .iter()
            .position(|p| p.key() == key)
            .map(|index| &self.plugin_states[index])
    }

    /// Decorations from every plugin, consulted on each paint
    pub fn decorations(&self) -> DecorationSet {
        DecorationSet::union(&self.plugin_states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::Decoration;

    const COUNTER: PluginKey = PluginKey::new("counter");

    /// Decorates the first top-level node whenever the document changes
    struct FirstNode;

    impl Plugin for FirstNode {
        fn key(&self) -> PluginKey {
            COUNTER
        }

        fn init(&self, doc: &Node) -> DecorationSet {
            match doc.child(0) {
                Some(first) => {
                    DecorationSet::create(vec![Decoration::node(0, first.node_size(), "first")])
                }
                None => DecorationSet::empty(),
            }
        }

        fn apply(&self, tr: &Transaction, previous: &DecorationSet) -> DecorationSet {
            if tr.doc_changed() {
                self.init(tr.doc())
            } else {
                previous.clone()
            }
        }
    }

    fn state(doc: Node) -> EditorState {
        EditorState::create(doc, Arc::new(Schema::basic()), vec![Arc::new(FirstNode)])
    }

    #[test]
    fn test_init_runs_plugins() {
        let state = state(Node::doc(vec![Node::paragraph("a")]));
        assert_eq!(state.decorations().len(), 1);
        assert!(state.plugin_state(COUNTER).is_some());
        assert!(state.plugin_state(PluginKey::new("other")).is_none());
    }

    #[test]
    fn test_apply_updates_doc_and_plugin_state_together() -> anyhow::Result<()> {
        let state = state(Node::doc(vec![Node::paragraph("a")]));
        let mut tr = state.tr();
        tr.insert(0, vec![Node::paragraph("longer")])?;
        let next = state.apply(&tr);

        assert_eq!(next.doc().child_count(), 2);
        let deco = next.decorations().iter().next().cloned().unwrap();
        assert_eq!((deco.from, deco.to), (0, 8));
        // The previous state is untouched
        assert_eq!(state.doc().child_count(), 1);
        Ok(())
    }
}
