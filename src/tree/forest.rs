//! Field Forest - Arena-based storage for a document's fields
//!
//! Efficient field storage with:
//! - Arena allocation for nodes
//! - NodeId indices for parent/child links (no owning cycles)
//! - Order-key sorted sibling lists
//! - Slots of deleted fields are never reused, so ids stay stable

use super::node::{AttributeNode, NodeId};
use crate::error::{FormError, Result};
use crate::spatial::SpatialValue;

/// A document's fields, stored in arena format
#[derive(Debug, Default)]
pub struct Forest {
    /// Arena of nodes; `None` marks a deleted field
    nodes: Vec<Option<AttributeNode>>,
    /// Top-level fields, sorted by order key
    roots: Vec<NodeId>,
    /// Number of live fields
    live: usize,
}

impl Forest {
    pub fn new() -> Self {
        Forest {
            nodes: Vec::with_capacity(64),
            roots: Vec::new(),
            live: 0,
        }
    }

    /// Add a field under `parent` (or at top level), keeping siblings sorted.
    ///
    /// Fields with equal order keys keep their insertion order.
    pub fn insert(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        order_key: &str,
        value: SpatialValue,
    ) -> Result<NodeId> {
        if let Some(parent_id) = parent {
            self.node(parent_id)?;
        }

        let id = self.nodes.len() as NodeId;
        self.nodes
            .push(Some(AttributeNode::new(name, order_key, value, parent)));
        self.live += 1;

        let pos = self
            .siblings(parent)
            .partition_point(|&s| self.order_key_of(s) <= order_key);
        self.siblings_mut(parent).insert(pos, id);

        Ok(id)
    }

    /// Get a field by ID
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&AttributeNode> {
        self.nodes.get(id as usize).and_then(|n| n.as_ref())
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut AttributeNode> {
        self.nodes.get_mut(id as usize).and_then(|n| n.as_mut())
    }

    /// Get a field by ID, failing for unknown or deleted fields
    pub fn node(&self, id: NodeId) -> Result<&AttributeNode> {
        self.get(id).ok_or(FormError::UnknownField(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut AttributeNode> {
        self.get_mut(id).ok_or(FormError::UnknownField(id))
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live fields
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Top-level fields in order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Children of a field, or the top level for `None`
    pub fn siblings(&self, parent: Option<NodeId>) -> &[NodeId] {
        match parent {
            Some(id) => self.get(id).map(|n| n.children()).unwrap_or(&[]),
            None => &self.roots,
        }
    }

    fn siblings_mut(&mut self, parent: Option<NodeId>) -> &mut Vec<NodeId> {
        match parent {
            Some(id) => match self.nodes.get_mut(id as usize) {
                Some(Some(node)) => &mut node.children,
                _ => &mut self.roots,
            },
            None => &mut self.roots,
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn name_of(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|n| n.name.as_str())
    }

    pub fn order_key_of(&self, id: NodeId) -> &str {
        self.get(id).map(|n| n.order_key()).unwrap_or("")
    }

    pub fn value_of(&self, id: NodeId) -> Option<&SpatialValue> {
        self.get(id).map(|n| n.value())
    }

    /// Root-to-field chain of ids, ending with `id` itself
    pub fn genealogy(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(cid) = current {
            if !self.contains(cid) {
                break;
            }
            path.push(cid);
            current = self.parent_of(cid);
        }
        path.reverse();
        path
    }

    /// Children of `parent` (or top-level fields) with a given name
    pub fn children_named(&self, parent: Option<NodeId>, name: &str) -> Vec<NodeId> {
        self.siblings(parent)
            .iter()
            .copied()
            .filter(|&c| self.name_of(c) == Some(name))
            .collect()
    }

    /// Iterate over all descendants of a field in document order
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let stack = self.children(id).iter().rev().copied().collect();
        DescendantIter { forest: self, stack }
    }

    /// Iterate over every live field in document order
    pub fn iter(&self) -> DescendantIter<'_> {
        let stack = self.roots.iter().rev().copied().collect();
        DescendantIter { forest: self, stack }
    }

    /// Replace a field's value without raising any notification
    pub(crate) fn store_value(&mut self, id: NodeId, value: SpatialValue) -> Result<()> {
        self.node_mut(id)?.value = value;
        Ok(())
    }

    /// Detach and delete a field and all of its descendants.
    ///
    /// Returns the deleted ids in document order (the field first).
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        let parent = self.node(id)?.parent;

        let mut removed = vec![id];
        removed.extend(self.descendants(id));

        self.siblings_mut(parent).retain(|&s| s != id);
        for &rid in &removed {
            if let Some(slot) = self.nodes.get_mut(rid as usize) {
                if slot.take().is_some() {
                    self.live -= 1;
                }
            }
        }

        Ok(removed)
    }
}

/// Iterator over descendant fields (pre-order)
pub struct DescendantIter<'a> {
    forest: &'a Forest,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        self.stack
            .extend(self.forest.children(current).iter().rev().copied());
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(forest: &Forest, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .map(|&id| forest.name_of(id).unwrap_or("?").to_string())
            .collect()
    }

    #[test]
    fn test_siblings_sorted_by_order_key() {
        let mut forest = Forest::new();
        forest.insert(None, "C", "3", "".into()).unwrap();
        forest.insert(None, "A", "1", "".into()).unwrap();
        forest.insert(None, "B", "2", "".into()).unwrap();
        assert_eq!(names(&forest, forest.roots()), ["A", "B", "C"]);
    }

    #[test]
    fn test_equal_keys_keep_insertion_order() {
        let mut forest = Forest::new();
        forest.insert(None, "first", "1", "".into()).unwrap();
        forest.insert(None, "second", "1", "".into()).unwrap();
        forest.insert(None, "zero", "0", "".into()).unwrap();
        assert_eq!(names(&forest, forest.roots()), ["zero", "first", "second"]);
    }

    #[test]
    fn test_ordinal_compare() {
        let mut forest = Forest::new();
        forest.insert(None, "lower", "a", "".into()).unwrap();
        forest.insert(None, "upper", "B", "".into()).unwrap();
        // 'B' (0x42) sorts before 'a' (0x61) ordinally
        assert_eq!(names(&forest, forest.roots()), ["upper", "lower"]);
    }

    #[test]
    fn test_genealogy_and_descendants() {
        let mut forest = Forest::new();
        let a = forest.insert(None, "A", "1", "".into()).unwrap();
        let b = forest.insert(None, "B", "2", "".into()).unwrap();
        let c = forest.insert(Some(b), "C", "2.1", "".into()).unwrap();
        let d = forest.insert(Some(c), "D", "2.1.1", "".into()).unwrap();

        assert_eq!(forest.genealogy(d), vec![b, c, d]);
        assert_eq!(forest.descendants(b).collect::<Vec<_>>(), vec![c, d]);
        assert_eq!(forest.iter().collect::<Vec<_>>(), vec![a, b, c, d]);
    }

    #[test]
    fn test_remove_subtree() {
        let mut forest = Forest::new();
        let a = forest.insert(None, "A", "1", "".into()).unwrap();
        let b = forest.insert(Some(a), "B", "1", "".into()).unwrap();
        let c = forest.insert(Some(b), "C", "1", "".into()).unwrap();
        let d = forest.insert(None, "D", "2", "".into()).unwrap();

        let removed = forest.remove_subtree(b).unwrap();
        assert_eq!(removed, vec![b, c]);
        assert!(!forest.contains(b));
        assert!(!forest.contains(c));
        assert!(forest.children(a).is_empty());
        assert_eq!(forest.len(), 2);

        // Ids are not reused
        let e = forest.insert(None, "E", "3", "".into()).unwrap();
        assert!(e > d);
    }

    #[test]
    fn test_insert_under_unknown_parent() {
        let mut forest = Forest::new();
        assert_eq!(
            forest.insert(Some(9), "X", "1", "".into()),
            Err(FormError::UnknownField(9))
        );
    }
}
