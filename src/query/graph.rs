//! Dependency Graph
//!
//! Owns every root query of a document and keeps two indexes:
//! - listeners: trigger field -> queries to re-evaluate when it changes
//! - pending: leaf name of an unbound reference -> queries that may bind a
//!   newly added field of that name
//!
//! Queries are stored in a slab; ids are never reused within a document.

use std::collections::{BTreeSet, HashMap};

use super::root::{QueryId, QueryKind, RootQuery};
use crate::tree::NodeId;

/// Pending key for references whose path has no named leaf
const ANY_NAME: &str = "";

/// The queries declared on one field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldQueries {
    /// Normal or default update query
    pub update: Option<QueryId>,
    pub validation: Option<QueryId>,
}

impl FieldQueries {
    fn slot_mut(&mut self, kind: QueryKind) -> &mut Option<QueryId> {
        match kind {
            QueryKind::Normal | QueryKind::Default => &mut self.update,
            QueryKind::Validation => &mut self.validation,
        }
    }

    pub fn slot(&self, kind: QueryKind) -> Option<QueryId> {
        match kind {
            QueryKind::Normal | QueryKind::Default => self.update,
            QueryKind::Validation => self.validation,
        }
    }
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    queries: Vec<Option<RootQuery>>,
    listeners: HashMap<NodeId, BTreeSet<QueryId>>,
    pending: HashMap<String, BTreeSet<QueryId>>,
    owned: HashMap<NodeId, FieldQueries>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query and index its triggers and unbound references
    pub fn insert(&mut self, mut query: RootQuery) -> QueryId {
        let id = self.queries.len() as QueryId;
        query.id = id;
        *self
            .owned
            .entry(query.target())
            .or_default()
            .slot_mut(query.kind()) = Some(id);
        self.queries.push(Some(query));
        self.reindex(id);
        id
    }

    /// Remove a query, unregistering all of its triggers
    pub fn remove(&mut self, id: QueryId) -> Option<RootQuery> {
        let query = self.queries.get_mut(id as usize)?.take()?;

        for trigger in query.triggers() {
            self.stop_listening(*trigger, id);
        }
        self.drop_pending(id);

        if let Some(owned) = self.owned.get_mut(&query.target()) {
            let slot = owned.slot_mut(query.kind());
            if *slot == Some(id) {
                *slot = None;
            }
            if owned.update.is_none() && owned.validation.is_none() {
                self.owned.remove(&query.target());
            }
        }

        Some(query)
    }

    pub fn get(&self, id: QueryId) -> Option<&RootQuery> {
        self.queries.get(id as usize).and_then(|q| q.as_ref())
    }

    pub fn get_mut(&mut self, id: QueryId) -> Option<&mut RootQuery> {
        self.queries.get_mut(id as usize).and_then(|q| q.as_mut())
    }

    /// Number of live queries
    pub fn len(&self) -> usize {
        self.queries.iter().filter(|q| q.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queries declared on a field
    pub fn owned_by(&self, node: NodeId) -> FieldQueries {
        self.owned.get(&node).copied().unwrap_or_default()
    }

    /// Queries re-evaluated when `node` changes
    pub fn listeners_of(&self, node: NodeId) -> Vec<QueryId> {
        self.listeners
            .get(&node)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Queries with an unbound reference that a field named `name` might bind
    pub fn candidates_for(&self, name: &str) -> Vec<QueryId> {
        let mut ids: BTreeSet<QueryId> = BTreeSet::new();
        for key in [name, ANY_NAME] {
            if let Some(set) = self.pending.get(key) {
                ids.extend(set.iter().copied());
            }
        }
        ids.into_iter().collect()
    }

    /// Forget every listener registration on `node`, returning the queries
    /// that were listening
    pub fn unlisten(&mut self, node: NodeId) -> Vec<QueryId> {
        self.listeners
            .remove(&node)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default()
    }

    /// Rebuild the index entries of one query after its bindings changed
    pub fn reindex(&mut self, id: QueryId) {
        self.drop_pending(id);

        let Some(query) = self.queries.get(id as usize).and_then(|q| q.as_ref()) else {
            return;
        };
        if query.is_disabled() {
            return;
        }

        let triggers: Vec<NodeId> = query.triggers().iter().copied().collect();
        let names = query.unbound_leaf_names();

        for trigger in triggers {
            self.listeners.entry(trigger).or_default().insert(id);
        }
        for name in names {
            self.pending
                .entry(name.unwrap_or_else(|| ANY_NAME.to_string()))
                .or_default()
                .insert(id);
        }
    }

    /// Retire a query: it keeps its slot but listens to nothing
    pub fn disable(&mut self, id: QueryId) {
        let Some(query) = self.get_mut(id) else {
            return;
        };
        let triggers = query.disable();
        for trigger in triggers {
            self.stop_listening(trigger, id);
        }
        self.drop_pending(id);
    }

    fn stop_listening(&mut self, node: NodeId, id: QueryId) {
        if let Some(set) = self.listeners.get_mut(&node) {
            set.remove(&id);
            if set.is_empty() {
                self.listeners.remove(&node);
            }
        }
    }

    fn drop_pending(&mut self, id: QueryId) {
        self.pending.retain(|_, set| {
            set.remove(&id);
            !set.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parser::parse;
    use crate::tree::Forest;

    fn query(target: NodeId, kind: QueryKind, expression: &str) -> RootQuery {
        RootQuery::new(target, kind, expression, parse(expression).unwrap())
    }

    #[test]
    fn test_pending_until_bound() {
        let mut forest = Forest::new();
        let total = forest.insert(None, "Total", "1", "".into()).unwrap();
        let mut graph = DependencyGraph::new();

        let id = graph.insert(query(total, QueryKind::Normal, "{Attribute}../Date{/Attribute}"));
        assert_eq!(graph.candidates_for("Date"), vec![id]);
        assert!(graph.candidates_for("Vendor").is_empty());
        assert_eq!(graph.owned_by(total).update, Some(id));

        let date = forest.insert(None, "Date", "2", "".into()).unwrap();
        graph.get_mut(id).unwrap().try_bind(&forest).into_result().unwrap();
        graph.reindex(id);

        assert!(graph.candidates_for("Date").is_empty());
        assert_eq!(graph.listeners_of(date), vec![id]);
    }

    #[test]
    fn test_nameless_paths_are_candidates_for_everything() {
        let mut graph = DependencyGraph::new();
        let id = graph.insert(query(5, QueryKind::Normal, "{Attribute}..{/Attribute}"));
        assert_eq!(graph.candidates_for("Anything"), vec![id]);
    }

    #[test]
    fn test_remove_unregisters_everything() {
        let mut forest = Forest::new();
        let a = forest.insert(None, "A", "1", "".into()).unwrap();
        let b = forest.insert(None, "B", "2", "".into()).unwrap();
        let mut graph = DependencyGraph::new();

        let mut q = query(a, QueryKind::Validation, "{Attribute}../B{/Attribute}{Attribute}../C{/Attribute}");
        q.try_bind(&forest).into_result().unwrap();
        let id = graph.insert(q);
        assert_eq!(graph.listeners_of(b), vec![id]);
        assert_eq!(graph.candidates_for("C"), vec![id]);
        assert_eq!(graph.owned_by(a).validation, Some(id));

        assert!(graph.remove(id).is_some());
        assert!(graph.listeners_of(b).is_empty());
        assert!(graph.candidates_for("C").is_empty());
        assert_eq!(graph.owned_by(a), FieldQueries::default());
        assert!(graph.is_empty());
        assert!(graph.remove(id).is_none());
    }

    #[test]
    fn test_disable_keeps_slot() {
        let mut forest = Forest::new();
        let a = forest.insert(None, "A", "1", "".into()).unwrap();
        let b = forest.insert(None, "B", "2", "".into()).unwrap();
        let mut graph = DependencyGraph::new();

        let mut q = query(a, QueryKind::Default, "{Attribute}../B{/Attribute}");
        q.try_bind(&forest).into_result().unwrap();
        let id = graph.insert(q);

        graph.disable(id);
        assert!(graph.listeners_of(b).is_empty());
        assert!(graph.get(id).unwrap().is_disabled());
        assert_eq!(graph.owned_by(a).update, Some(id));

        // Reindexing a retired query does not bring it back
        graph.reindex(id);
        assert!(graph.listeners_of(b).is_empty());
    }

    #[test]
    fn test_unlisten() {
        let mut forest = Forest::new();
        let a = forest.insert(None, "A", "1", "".into()).unwrap();
        let b = forest.insert(None, "B", "2", "".into()).unwrap();
        let mut graph = DependencyGraph::new();
        let mut q = query(a, QueryKind::Normal, "{Attribute}../B{/Attribute}");
        q.try_bind(&forest).into_result().unwrap();
        let id = graph.insert(q);

        assert_eq!(graph.unlisten(b), vec![id]);
        assert!(graph.listeners_of(b).is_empty());
    }
}
