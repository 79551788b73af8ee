//! Root Queries
//!
//! A root query owns one field's parsed expression, the fields its
//! references are bound to (its triggers), and the memoized resolution
//! state. Memos are invalidated on every bind/unbind and recomputed lazily.

use std::collections::BTreeSet;

use super::node::{Composite, EvalEnv, FieldRef};
use crate::error::{FormError, Result};
use crate::spatial::SpatialValue;
use crate::tree::path::{resolve_one, FieldPath};
use crate::tree::{Forest, NodeId};

/// Query identifier (index into the dependency graph's slab)
pub type QueryId = u32;

/// How a query's result is applied to its field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Always replaces the field's value
    Normal,
    /// Supplies the field validator's list of acceptable values
    Validation,
    /// Fills the field only while it is empty; retires once fully resolved
    Default,
}

impl QueryKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(QueryKind::Normal),
            "validation" => Some(QueryKind::Validation),
            "default" => Some(QueryKind::Default),
            _ => None,
        }
    }
}

/// Outcome of [`RootQuery::try_bind`]
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Binding {
    /// Fields bound by this attempt
    pub bound: Vec<NodeId>,
    /// First reference that matched several fields
    pub ambiguous: Option<FormError>,
}

impl Binding {
    /// Treat an ambiguous reference as an error
    pub fn into_result(self) -> Result<Vec<NodeId>> {
        match self.ambiguous {
            Some(e) => Err(e),
            None => Ok(self.bound),
        }
    }
}

/// Resolution state of a root query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    MinimallyResolved,
    FullyResolved,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct RootQuery {
    pub(crate) id: QueryId,
    target: NodeId,
    kind: QueryKind,
    expression: String,
    root: Composite,
    triggers: BTreeSet<NodeId>,
    disabled: bool,
    /// A default update was skipped while unresolved
    pub(crate) update_pending: bool,
    minimally_resolved: Option<bool>,
    fully_resolved: Option<bool>,
}

impl RootQuery {
    pub fn new(target: NodeId, kind: QueryKind, expression: impl Into<String>, root: Composite) -> Self {
        RootQuery {
            id: 0,
            target,
            kind,
            expression: expression.into(),
            root,
            triggers: BTreeSet::new(),
            disabled: false,
            update_pending: false,
            minimally_resolved: None,
            fully_resolved: None,
        }
    }

    pub fn id(&self) -> QueryId {
        self.id
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Fields whose changes re-evaluate this query
    pub fn triggers(&self) -> &BTreeSet<NodeId> {
        &self.triggers
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Every required reference is bound
    pub fn is_minimally_resolved(&mut self) -> bool {
        if let Some(memo) = self.minimally_resolved {
            return memo;
        }
        let mut resolved = true;
        self.for_each_ref(|r| resolved &= !r.required || r.bound.is_some());
        self.minimally_resolved = Some(resolved);
        resolved
    }

    /// Every reference, required or not, is bound
    pub fn is_fully_resolved(&mut self) -> bool {
        if let Some(memo) = self.fully_resolved {
            return memo;
        }
        let mut resolved = true;
        self.for_each_ref(|r| resolved &= r.bound.is_some());
        self.fully_resolved = Some(resolved);
        resolved
    }

    pub fn resolution(&mut self) -> Resolution {
        if self.disabled {
            Resolution::Disabled
        } else if self.is_fully_resolved() {
            Resolution::FullyResolved
        } else if self.is_minimally_resolved() {
            Resolution::MinimallyResolved
        } else {
            Resolution::Unresolved
        }
    }

    /// Drop the memoized resolution state
    pub fn invalidate(&mut self) {
        self.minimally_resolved = None;
        self.fully_resolved = None;
    }

    /// Try to bind every unbound reference by resolving its path from the
    /// target field.
    ///
    /// Each reference binds only if its path matches exactly one field. A
    /// reference matching several stays unbound and is reported in the
    /// outcome; the others still bind, and `triggers` always holds every
    /// bound field.
    pub fn try_bind(&mut self, forest: &Forest) -> Binding {
        let target = self.target;
        let mut resolved: Vec<Option<NodeId>> = Vec::new();
        let mut ambiguous = None;

        self.for_each_ref(|r| {
            if r.bound.is_some() {
                return;
            }
            match resolve_one(forest, target, &r.path) {
                Ok(found) => resolved.push(found),
                Err(FormError::InvalidPath(_)) => resolved.push(None),
                Err(e) => {
                    resolved.push(None);
                    ambiguous.get_or_insert(e);
                }
            }
        });

        // Same traversal order, so each unbound reference takes its own slot
        let mut resolved = resolved.into_iter();
        let mut bound = Vec::new();
        self.for_each_ref_mut(|r| {
            if r.bound.is_some() {
                return;
            }
            if let Some(Some(id)) = resolved.next() {
                r.bound = Some(id);
                bound.push(id);
            }
        });

        if !bound.is_empty() {
            tracing::debug!(field = target, bound = ?bound, "bound query triggers");
            self.triggers.extend(bound.iter().copied());
            self.invalidate();
        }
        Binding { bound, ambiguous }
    }

    /// Unbind every reference bound to `node`. Returns true if any was.
    pub fn unbind(&mut self, node: NodeId) -> bool {
        let mut any = false;
        self.for_each_ref_mut(|r| {
            if r.bound == Some(node) {
                r.bound = None;
                any = true;
            }
        });
        if any {
            self.triggers.remove(&node);
            self.invalidate();
        }
        any
    }

    /// Leaf names of unbound references; `None` for paths without a named
    /// leaf (such as `..`)
    pub fn unbound_leaf_names(&self) -> Vec<Option<String>> {
        let mut names = Vec::new();
        self.for_each_ref(|r| {
            if r.bound.is_none() {
                let leaf = FieldPath::parse(&r.path)
                    .ok()
                    .and_then(|p| p.leaf_name().map(str::to_string));
                if !names.contains(&leaf) {
                    names.push(leaf);
                }
            }
        });
        names
    }

    /// Evaluate the expression. Fails below the minimally-resolved state.
    pub fn evaluate(&mut self, env: &mut EvalEnv<'_>) -> Result<SpatialValue> {
        if !self.is_minimally_resolved() {
            return Err(FormError::UnresolvedQuery {
                target: self.target,
            });
        }
        self.root.evaluate_sequence(env)
    }

    /// Retire the query for good. Returns the triggers it was listening to.
    pub(crate) fn disable(&mut self) -> BTreeSet<NodeId> {
        self.disabled = true;
        self.update_pending = false;
        std::mem::take(&mut self.triggers)
    }

    fn for_each_ref<F: FnMut(&FieldRef)>(&self, mut f: F) {
        for child in &self.root.children {
            child.for_each_ref(&mut f);
        }
    }

    fn for_each_ref_mut<F: FnMut(&mut FieldRef)>(&mut self, mut f: F) {
        for child in &mut self.root.children {
            child.for_each_ref_mut(&mut f);
        }
    }
}
