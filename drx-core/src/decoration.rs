//! Rendering-only annotations attached to document ranges

use crate::node::Node;
use crate::transform::{Assoc, Mapping};

/// A node decoration: applies `class` to the node spanning `from..to`
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Decoration {
    pub from: usize,
    pub to: usize,
    pub class: String,
}

impl Decoration {
    pub fn node(from: usize, to: usize, class: impl Into<String>) -> Self {
        Self {
            from,
            to,
            class: class.into(),
        }
    }

    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.from && pos < self.to
    }
}

/// Sorted, de-duplicated collection of decorations
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn create(mut decorations: Vec<Decoration>) -> Self {
        decorations.retain(|d| d.from < d.to);
        decorations.sort();
        decorations.dedup();
        Self { decorations }
    }

    /// Merge several sets into one
    pub fn union<'a>(sets: impl IntoIterator<Item = &'a DecorationSet>) -> Self {
        Self::create(
            sets.into_iter()
                .flat_map(|set| set.decorations.iter().cloned())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    /// Decorations overlapping `from..to`
    pub fn find(&self, from: usize, to: usize) -> impl Iterator<Item = &Decoration> {
        self.decorations
            .iter()
            .filter(move |d| d.from < to && d.to > from)
    }

    /// First decoration covering `pos`
    pub fn covering(&self, pos: usize) -> Option<&Decoration> {
        self.decorations.iter().find(|d| d.contains(pos))
    }

    /// Whether a decoration starts exactly at `pos` or covers it
    pub fn is_hidden(&self, pos: usize) -> bool {
        self.covering(pos).is_some()
    }

    /// Map every decoration through a transaction's mapping.
    ///
    /// A decoration survives only if its start was not deleted and it still
    /// spans exactly one node in `doc`.
    pub fn map(&self, mapping: &Mapping, doc: &Node) -> Self {
        if mapping.is_empty() {
            return self.clone();
        }
        let mapped = self
            .decorations
            .iter()
            .filter_map(|d| {
                let from = mapping.map_result(d.from, Assoc::After);
                if from.deleted {
                    return None;
                }
                let to = mapping.map_result(d.to, Assoc::Before);
                if to.deleted || to.pos <= from.pos {
                    return None;
                }
                let spans_node = doc
                    .node_at(from.pos)
                    .is_some_and(|node| from.pos + node.node_size() == to.pos);
                spans_node.then(|| Decoration::node(from.pos, to.pos, d.class.clone()))
            })
            .collect();
        Self::create(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Transaction;

    #[test]
    fn test_create_sorts_dedups_and_drops_empty() {
        let set = DecorationSet::create(vec![
            Decoration::node(5, 9, "x"),
            Decoration::node(0, 5, "x"),
            Decoration::node(5, 9, "x"),
            Decoration::node(3, 3, "x"),
        ]);
        let ranges: Vec<(usize, usize)> = set.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(ranges, vec![(0, 5), (5, 9)]);
    }

    #[test]
    fn test_find_and_covering() {
        let set = DecorationSet::create(vec![
            Decoration::node(0, 5, "x"),
            Decoration::node(10, 12, "x"),
        ]);
        assert_eq!(set.find(4, 11).count(), 2);
        assert_eq!(set.find(5, 10).count(), 0);
        assert!(set.covering(4).is_some());
        assert!(set.covering(5).is_none());
    }

    #[test]
    fn test_map_shifts_and_drops_deleted() -> anyhow::Result<()> {
        let doc = Node::doc(vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
        ]);
        let set = DecorationSet::create(vec![
            Decoration::node(3, 6, "hidden"),
            Decoration::node(6, 9, "hidden"),
        ]);

        let mut tr = Transaction::new(&doc);
        tr.insert(0, vec![Node::paragraph("new")])?;
        let shifted = set.map(tr.mapping(), tr.doc());
        let ranges: Vec<(usize, usize)> = shifted.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(ranges, vec![(8, 11), (11, 14)]);

        let mut tr = Transaction::new(&doc);
        tr.delete(3, 6)?;
        let remaining = set.map(tr.mapping(), tr.doc());
        let ranges: Vec<(usize, usize)> = remaining.iter().map(|d| (d.from, d.to)).collect();
        assert_eq!(ranges, vec![(3, 6)]);
        Ok(())
    }
}
