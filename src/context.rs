//! Document Context
//!
//! All state of one open document: the field forest, the dependency graph of
//! its queries, field validators, and the relational executor. Every exposed
//! operation goes through a `DocumentContext`; nothing is shared between
//! documents, and dropping the context tears all of it down.
//!
//! Value changes flow like this:
//! `set_value` → store → notify listeners → `update_value` on each listening
//! query → store the result on its target → notify that target's listeners.
//! A field's `notifying` flag is set while its notification is delivered, and
//! a notification raised for a field that is already notifying is dropped.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

use crate::error::{FormError, Result};
use crate::query::cache::{ExpressionCache, DEFAULT_CAPACITY};
use crate::query::{
    DependencyGraph, EvalEnv, QueryExecutor, QueryId, QueryKind, Resolution, RootQuery,
};
use crate::scan::{self, Direction, FailurePath};
use crate::spatial::{SpatialValue, Zone};
use crate::tree::path;
use crate::tree::{FieldStatus, Forest, HintType, ListValidator, NodeId, TabStopMode, Validator};

/// Per-document settings
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Name of the captured document, the value of `{SourceDocName}`
    pub source_doc_name: String,
    /// Parsed expressions kept for reuse
    pub expression_cache_capacity: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            source_doc_name: String::new(),
            expression_cache_capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Something the host should reflect in its view of the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    /// The field's value was replaced
    Value(NodeId),
    /// An update failed and the field kept its prior value
    Restored(NodeId),
    /// The field was deleted
    Deleted(NodeId),
    /// A reference of the field's query matched several fields and stays
    /// unbound
    Ambiguous(NodeId),
}

pub struct DocumentContext {
    forest: Forest,
    graph: DependencyGraph,
    validators: HashMap<NodeId, Box<dyn Validator>>,
    executor: Box<dyn QueryExecutor>,
    expressions: ExpressionCache,
    source_doc_name: String,
    changes: Vec<FieldChange>,
}

impl DocumentContext {
    pub fn new(config: ContextConfig, executor: impl QueryExecutor) -> Self {
        DocumentContext {
            forest: Forest::new(),
            graph: DependencyGraph::new(),
            validators: HashMap::new(),
            executor: Box::new(executor),
            expressions: ExpressionCache::new(config.expression_cache_capacity),
            source_doc_name: config.source_doc_name,
            changes: Vec::new(),
        }
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn source_doc_name(&self) -> &str {
        &self.source_doc_name
    }

    /// The relational executor, if it is a `T`
    pub fn executor_as<T: QueryExecutor>(&mut self) -> Option<&mut T> {
        let executor: &mut dyn QueryExecutor = &mut *self.executor;
        let executor: &mut dyn Any = executor;
        executor.downcast_mut::<T>()
    }

    /// Changes queued since the last call
    pub fn take_changes(&mut self) -> Vec<FieldChange> {
        std::mem::take(&mut self.changes)
    }

    // ---------------------------------------------------------------------
    // Fields
    // ---------------------------------------------------------------------

    /// Add a field and let waiting queries bind to it.
    ///
    /// The field is kept even if a waiting query finds it ambiguous; that
    /// query is reported through a `FieldChange::Ambiguous` change.
    pub fn add_field(
        &mut self,
        parent: Option<NodeId>,
        name: &str,
        order_key: &str,
        value: SpatialValue,
    ) -> Result<NodeId> {
        let id = self.forest.insert(parent, name, order_key, value)?;
        self.register_trigger_candidate(id)?;
        Ok(id)
    }

    /// Retry binding every query with an unbound reference named like
    /// `candidate`, and update those that bound something.
    ///
    /// References matching several fields stay unbound and are reported;
    /// the rest of each query still binds.
    pub fn register_trigger_candidate(&mut self, candidate: NodeId) -> Result<()> {
        let name = self.forest.node(candidate)?.name.clone();
        let mut rebound = Vec::new();

        for id in self.graph.candidates_for(&name) {
            let Some(query) = self.graph.get_mut(id) else {
                continue;
            };
            let target = query.target();
            let binding = query.try_bind(&self.forest);
            if let Some(e) = &binding.ambiguous {
                self.report_ambiguity(id, target, e);
            }
            if !binding.bound.is_empty() {
                self.graph.reindex(id);
                rebound.push(id);
            }
        }

        for id in rebound {
            self.refresh(id);
        }
        Ok(())
    }

    /// Delete a field and its subtree.
    ///
    /// Queries declared on deleted fields are disposed. Queries that listened
    /// to them lose those bindings, try to bind again, and re-evaluate if
    /// they are still minimally resolved.
    pub fn delete_field(&mut self, node: NodeId) -> Result<()> {
        let removed = self.forest.remove_subtree(node)?;

        let mut affected: BTreeSet<QueryId> = BTreeSet::new();
        for &id in &removed {
            let owned = self.graph.owned_by(id);
            for query in [owned.update, owned.validation].into_iter().flatten() {
                self.graph.remove(query);
            }
            self.validators.remove(&id);
            affected.extend(self.graph.unlisten(id));
        }

        let mut survivors = Vec::with_capacity(affected.len());
        for id in affected {
            let Some(query) = self.graph.get_mut(id) else {
                continue;
            };
            for &gone in &removed {
                query.unbind(gone);
            }
            survivors.push(id);
        }

        self.changes
            .extend(removed.iter().map(|&id| FieldChange::Deleted(id)));
        debug!(field = node, removed = removed.len(), "deleted field subtree");

        for &id in &survivors {
            if let Some(query) = self.graph.get_mut(id) {
                let target = query.target();
                if let Some(e) = query.try_bind(&self.forest).ambiguous {
                    self.report_ambiguity(id, target, &e);
                }
            }
            self.graph.reindex(id);
        }
        for id in survivors {
            self.refresh(id);
        }
        Ok(())
    }

    pub fn value(&self, node: NodeId) -> Result<&SpatialValue> {
        Ok(self.forest.node(node)?.value())
    }

    pub fn status(&self, node: NodeId) -> Result<&FieldStatus> {
        Ok(self.forest.node(node)?.status())
    }

    /// Fields matching `path`, relative to `base` unless absolute
    pub fn resolve_path(&self, base: NodeId, path: &str) -> Result<Vec<NodeId>> {
        path::resolve(&self.forest, base, path)
    }

    /// Store a value entered for a field.
    ///
    /// Zones are dropped unless `accept_spatial`. A value with zones replaces
    /// any location hint. `end_of_edit` marks a completed edit: the field is
    /// revalidated, and loses its accepted flag if the text changed.
    pub fn set_value(
        &mut self,
        node: NodeId,
        mut value: SpatialValue,
        accept_spatial: bool,
        end_of_edit: bool,
    ) -> Result<()> {
        if !accept_spatial {
            value.downgrade();
        }

        let field = self.forest.node_mut(node)?;
        let changed = field.value != value;
        let text_changed = field.value.text() != value.text();
        if value.has_spatial_info() {
            field.status.set_hint(HintType::None, Vec::new());
        }
        if end_of_edit && text_changed {
            field.status.set_accepted(false);
        }
        field.value = value;

        if end_of_edit {
            self.validate(node)?;
        }
        if changed {
            self.changes.push(FieldChange::Value(node));
            self.notify(node)?;
        }
        Ok(())
    }

    /// Run the field's validator against its current text.
    ///
    /// Returns the resulting `data_valid` flag. Fields without a validator,
    /// or with validation disabled, are valid.
    pub fn validate(&mut self, node: NodeId) -> Result<bool> {
        let text = self.forest.node(node)?.value().text();
        let valid = self.validators.get(&node).is_none_or(|v| v.validate(text));

        let status = &mut self.forest.node_mut(node)?.status;
        if status.validation_enabled() {
            status.set_data_valid(valid);
        }
        Ok(status.data_valid())
    }

    /// Attach a validator and validate the field with it
    pub fn set_validator(&mut self, node: NodeId, validator: Box<dyn Validator>) -> Result<bool> {
        self.forest.node(node)?;
        self.validators.insert(node, validator);
        self.validate(node)
    }

    // ---------------------------------------------------------------------
    // Status
    // ---------------------------------------------------------------------

    pub fn mark_as_viewed(&mut self, node: NodeId, viewed: bool, recursive: bool) -> Result<()> {
        self.mark(node, recursive, |status| status.set_viewed(viewed))
    }

    pub fn mark_as_valid(&mut self, node: NodeId, valid: bool, recursive: bool) -> Result<()> {
        self.mark(node, recursive, |status| status.set_data_valid(valid))
    }

    pub fn mark_as_propagated(
        &mut self,
        node: NodeId,
        propagated: bool,
        recursive: bool,
    ) -> Result<()> {
        self.mark(node, recursive, |status| status.set_propagated(propagated))
    }

    fn mark<F: FnMut(&mut FieldStatus)>(&mut self, node: NodeId, recursive: bool, mut f: F) -> Result<()> {
        self.forest.node(node)?;
        scan::mark_subtree(&mut self.forest, node, recursive, |forest, id| {
            if let Some(field) = forest.get_mut(id) {
                f(&mut field.status);
            }
        });
        Ok(())
    }

    pub fn set_viewable(&mut self, node: NodeId, viewable: bool) -> Result<()> {
        self.status_mut(node)?.set_viewable(viewable);
        Ok(())
    }

    /// Enabling validation revalidates the field right away
    pub fn set_validation_enabled(&mut self, node: NodeId, enabled: bool) -> Result<()> {
        self.status_mut(node)?.set_validation_enabled(enabled);
        if enabled {
            self.validate(node)?;
        }
        Ok(())
    }

    pub fn set_tab_stop_mode(&mut self, node: NodeId, mode: TabStopMode) -> Result<()> {
        self.status_mut(node)?.set_tab_stop_mode(mode);
        Ok(())
    }

    pub fn set_persist(&mut self, node: NodeId, persist: bool) -> Result<()> {
        self.status_mut(node)?.set_persist(persist);
        Ok(())
    }

    pub fn set_hint(&mut self, node: NodeId, hint_type: HintType, zones: Vec<Zone>) -> Result<()> {
        self.status_mut(node)?.set_hint(hint_type, zones);
        Ok(())
    }

    pub fn set_accepted(&mut self, node: NodeId, accepted: bool) -> Result<()> {
        self.status_mut(node)?.set_accepted(accepted);
        Ok(())
    }

    fn status_mut(&mut self, node: NodeId) -> Result<&mut FieldStatus> {
        Ok(&mut self.forest.node_mut(node)?.status)
    }

    // ---------------------------------------------------------------------
    // Navigation
    // ---------------------------------------------------------------------

    pub fn find_next_unviewed(
        &mut self,
        start_path: Option<&[NodeId]>,
        direction: Direction,
        wrap: bool,
    ) -> std::result::Result<(), FailurePath> {
        scan::find_next_unviewed(&mut self.forest, start_path, direction, wrap)
    }

    pub fn find_next_invalid(
        &mut self,
        start_path: Option<&[NodeId]>,
        direction: Direction,
        wrap: bool,
    ) -> std::result::Result<(), FailurePath> {
        scan::find_next_invalid(&mut self.forest, start_path, direction, wrap)
    }

    pub fn find_next_tab_stop(
        &mut self,
        start_path: Option<&[NodeId]>,
        direction: Direction,
        wrap: bool,
    ) -> std::result::Result<(), FailurePath> {
        scan::find_next_tab_stop(&mut self.forest, start_path, direction, wrap)
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Declare an update or validation expression on a field.
    ///
    /// Normal and default queries share one slot per field; validation has
    /// its own. An identical redeclaration keeps the existing query. A new
    /// expression is parsed and bound before it replaces the old one, so a
    /// structural error or ambiguous path leaves the field as it was.
    pub fn register_query(&mut self, node: NodeId, expression: &str, kind: QueryKind) -> Result<QueryId> {
        self.forest.node(node)?;

        let existing = self.graph.owned_by(node).slot(kind);
        if let Some(query) = existing.and_then(|id| self.graph.get(id)) {
            if query.kind() == kind && query.expression() == expression {
                return Ok(query.id());
            }
        }

        let root = self.expressions.get_or_parse(expression)?;
        let mut query = RootQuery::new(node, kind, expression, root);
        query.try_bind(&self.forest).into_result()?;

        if let Some(old) = existing {
            self.graph.remove(old);
        }
        let id = self.graph.insert(query);
        debug!(field = node, query = id, ?kind, "registered query");

        self.update_value(id)?;
        Ok(id)
    }

    /// Dispose the field's query of this kind. Returns false if there was none.
    ///
    /// Dropping a validation query empties the field's validation list.
    pub fn unregister_query(&mut self, node: NodeId, kind: QueryKind) -> Result<bool> {
        self.forest.node(node)?;
        let Some(id) = self.graph.owned_by(node).slot(kind) else {
            return Ok(false);
        };
        self.graph.remove(id);

        if kind == QueryKind::Validation {
            if let Some(validator) = self.validators.get_mut(&node) {
                validator.set_validation_list(Vec::new());
            }
            self.validate(node)?;
        }
        Ok(true)
    }

    /// Resolution state of the field's query of this kind
    pub fn query_resolution(&mut self, node: NodeId, kind: QueryKind) -> Option<Resolution> {
        let id = self.graph.owned_by(node).slot(kind)?;
        self.graph.get_mut(id).map(RootQuery::resolution)
    }

    /// Re-evaluate a query and apply its result to the target field.
    ///
    /// Below minimal resolution nothing is evaluated; a default query for an
    /// empty field remembers that it owes an update. Relational failures are
    /// contained here: the field keeps its value and a `Restored` change is
    /// queued.
    pub fn update_value(&mut self, id: QueryId) -> Result<()> {
        let Some(query) = self.graph.get_mut(id) else {
            return Ok(());
        };
        if query.is_disabled() {
            return Ok(());
        }
        let target = query.target();
        let kind = query.kind();
        let field_empty = self.forest.value_of(target).is_none_or(SpatialValue::is_empty);

        if !query.is_minimally_resolved() {
            if kind == QueryKind::Default && field_empty {
                query.update_pending = true;
            }
            return Ok(());
        }
        let fully_resolved = query.is_fully_resolved();

        if kind == QueryKind::Default && !field_empty && !query.update_pending {
            if fully_resolved {
                self.retire(id);
            }
            return Ok(());
        }

        let mut env = EvalEnv {
            forest: &self.forest,
            source_doc_name: &self.source_doc_name,
            executor: &mut *self.executor,
        };
        let result = query.evaluate(&mut env);

        let value = match result {
            Ok(value) => value,
            Err(FormError::ExternalQuery(message)) => {
                warn!(field = target, query = id, %message, "query failed, keeping prior value");
                self.changes.push(FieldChange::Restored(target));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match kind {
            QueryKind::Validation => self.apply_validation_list(target, &value)?,
            QueryKind::Normal | QueryKind::Default => self.apply_value(target, value)?,
        }

        if kind == QueryKind::Default {
            if let Some(query) = self.graph.get_mut(id) {
                query.update_pending = false;
            }
            if fully_resolved {
                self.retire(id);
            }
        }
        Ok(())
    }

    /// Re-evaluate a query after a structural change to the forest. The
    /// change already happened, so a failure is reported instead of returned.
    fn refresh(&mut self, id: QueryId) {
        if let Err(e) = self.update_value(id) {
            let target = self.graph.get(id).map(RootQuery::target);
            warn!(query = id, ?target, error = %e, "query update failed after forest change");
            if let Some(target) = target {
                self.changes.push(FieldChange::Restored(target));
            }
        }
    }

    fn report_ambiguity(&mut self, id: QueryId, target: NodeId, error: &FormError) {
        warn!(field = target, query = id, %error, "ambiguous reference left unbound");
        self.changes.push(FieldChange::Ambiguous(target));
    }

    fn retire(&mut self, id: QueryId) {
        debug!(query = id, "default query fully resolved, disabling");
        self.graph.disable(id);
    }

    fn apply_value(&mut self, target: NodeId, value: SpatialValue) -> Result<()> {
        let field = self.forest.node_mut(target)?;
        if field.value == value {
            return Ok(());
        }
        field.value = value;
        self.changes.push(FieldChange::Value(target));
        if self.validators.contains_key(&target) {
            self.validate(target)?;
        }
        self.notify(target)
    }

    /// Validation results are one item per line
    fn apply_validation_list(&mut self, target: NodeId, value: &SpatialValue) -> Result<()> {
        let items: Vec<String> = value
            .text()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        debug!(field = target, items = items.len(), "replacing validation list");

        self.validators
            .entry(target)
            .or_insert_with(|| Box::new(ListValidator::new()))
            .set_validation_list(items);
        self.validate(target)?;
        Ok(())
    }

    /// Deliver a field's change to the queries listening to it
    fn notify(&mut self, node: NodeId) -> Result<()> {
        let field = self.forest.node_mut(node)?;
        if field.notifying {
            debug!(field = node, "suppressed re-entrant change notification");
            return Ok(());
        }
        field.notifying = true;

        let mut result = Ok(());
        for id in self.graph.listeners_of(node) {
            result = self.update_value(id);
            if result.is_err() {
                break;
            }
        }

        if let Some(field) = self.forest.get_mut(node) {
            field.notifying = false;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryParameters, TableExecutor};

    fn context() -> DocumentContext {
        DocumentContext::new(
            ContextConfig {
                source_doc_name: "invoice.tif".into(),
                ..ContextConfig::default()
            },
            TableExecutor::new(),
        )
    }

    fn text(ctx: &DocumentContext, node: NodeId) -> String {
        ctx.value(node).unwrap().text().to_string()
    }

    #[test]
    fn test_normal_query_follows_trigger() {
        let mut ctx = context();
        let first = ctx.add_field(None, "First", "1", "John".into()).unwrap();
        ctx.add_field(None, "Last", "2", "Smith".into()).unwrap();
        let full = ctx.add_field(None, "Full", "3", "".into()).unwrap();

        ctx.register_query(
            full,
            "{Attribute}../First{/Attribute} {Attribute}../Last{/Attribute}",
            QueryKind::Normal,
        )
        .unwrap();
        assert_eq!(text(&ctx, full), "John Smith");

        ctx.set_value(first, "Jane".into(), false, true).unwrap();
        assert_eq!(text(&ctx, full), "Jane Smith");
        assert!(ctx.take_changes().contains(&FieldChange::Value(full)));
    }

    #[test]
    fn test_query_binds_when_field_appears() {
        let mut ctx = context();
        let total = ctx.add_field(None, "Total", "1", "".into()).unwrap();
        ctx.register_query(total, "{Attribute}../Date{/Attribute}", QueryKind::Normal)
            .unwrap();
        assert_eq!(
            ctx.query_resolution(total, QueryKind::Normal),
            Some(Resolution::Unresolved)
        );

        ctx.add_field(None, "Date", "2", "2024-01-31".into()).unwrap();
        assert_eq!(
            ctx.query_resolution(total, QueryKind::Normal),
            Some(Resolution::FullyResolved)
        );
        assert_eq!(text(&ctx, total), "2024-01-31");
    }

    #[test]
    fn test_deleting_trigger_reverts_resolution() {
        let mut ctx = context();
        let total = ctx.add_field(None, "Total", "1", "".into()).unwrap();
        let date = ctx.add_field(None, "Date", "2", "2024".into()).unwrap();
        ctx.register_query(total, "{Attribute}../Date{/Attribute}", QueryKind::Normal)
            .unwrap();
        assert_eq!(
            ctx.query_resolution(total, QueryKind::Normal),
            Some(Resolution::FullyResolved)
        );

        ctx.delete_field(date).unwrap();
        assert_eq!(
            ctx.query_resolution(total, QueryKind::Normal),
            Some(Resolution::Unresolved)
        );
        assert!(ctx.graph().listeners_of(date).is_empty());
        assert!(ctx.take_changes().contains(&FieldChange::Deleted(date)));
        // The last computed value stays
        assert_eq!(text(&ctx, total), "2024");

        // A new field of the same name binds again
        let again = ctx.add_field(None, "Date", "2", "2025".into()).unwrap();
        assert_eq!(ctx.graph().listeners_of(again).len(), 1);
        assert_eq!(text(&ctx, total), "2025");
    }

    #[test]
    fn test_deleting_target_disposes_its_queries() {
        let mut ctx = context();
        let row = ctx.add_field(None, "Row", "1", "".into()).unwrap();
        let amount = ctx.add_field(Some(row), "Amount", "1", "5".into()).unwrap();
        let copy = ctx.add_field(Some(row), "Copy", "2", "".into()).unwrap();
        ctx.register_query(copy, "{Attribute}../Amount{/Attribute}", QueryKind::Normal)
            .unwrap();
        assert_eq!(ctx.graph().len(), 1);

        ctx.delete_field(row).unwrap();
        assert!(ctx.graph().is_empty());
        assert!(ctx.graph().listeners_of(amount).is_empty());
        assert!(ctx.value(copy).is_err());
        assert_eq!(
            ctx.take_changes()
                .into_iter()
                .filter(|c| matches!(c, FieldChange::Deleted(_)))
                .count(),
            3
        );
    }

    #[test]
    fn test_ambiguous_rebind_keeps_unique_bindings_live() {
        let mut ctx = context();
        let t = ctx.add_field(None, "T", "1", "".into()).unwrap();
        let g1 = ctx.add_field(None, "G", "2", "".into()).unwrap();
        ctx.add_field(Some(g1), "A", "1", "a1".into()).unwrap();
        ctx.add_field(Some(g1), "D", "2", "".into()).unwrap();
        ctx.register_query(
            t,
            "{Attribute}/G/A{/Attribute}{Attribute Required=false}/G/D{/Attribute}",
            QueryKind::Normal,
        )
        .unwrap();
        assert_eq!(text(&ctx, t), "a1");

        let g2 = ctx.add_field(None, "G", "3", "".into()).unwrap();
        let a2 = ctx.add_field(Some(g2), "A", "1", "a2".into()).unwrap();
        ctx.add_field(Some(g2), "D", "2", "".into()).unwrap();
        let g3 = ctx.add_field(None, "G", "4", "".into()).unwrap();
        ctx.add_field(Some(g3), "D", "1", "".into()).unwrap();
        ctx.take_changes();

        // /G/A now has one match, /G/D has two
        ctx.delete_field(g1).unwrap();
        assert_eq!(text(&ctx, t), "a2");
        assert!(ctx.take_changes().contains(&FieldChange::Ambiguous(t)));
        assert_eq!(
            ctx.query_resolution(t, QueryKind::Normal),
            Some(Resolution::MinimallyResolved)
        );
        assert_eq!(ctx.graph().listeners_of(a2).len(), 1);

        ctx.set_value(a2, "CHANGED".into(), false, true).unwrap();
        assert_eq!(text(&ctx, t), "CHANGED");

        // Another D keeps the reference ambiguous, but the field is added
        let before = ctx.forest().len();
        let g4 = ctx.add_field(None, "G", "5", "".into()).unwrap();
        let d4 = ctx.add_field(Some(g4), "D", "1", "".into()).unwrap();
        assert_eq!(ctx.forest().len(), before + 2);
        assert!(ctx.value(d4).is_ok());
        assert!(ctx.take_changes().contains(&FieldChange::Ambiguous(t)));
        assert_eq!(text(&ctx, t), "CHANGED");
    }

    #[test]
    fn test_default_query_fills_empty_field_then_retires() {
        let mut ctx = context();
        let vendor = ctx.add_field(None, "Vendor", "1", "ACME".into()).unwrap();
        let payee = ctx.add_field(None, "Payee", "2", "".into()).unwrap();

        ctx.register_query(payee, "{Attribute}../Vendor{/Attribute}", QueryKind::Default)
            .unwrap();
        assert_eq!(text(&ctx, payee), "ACME");
        assert_eq!(
            ctx.query_resolution(payee, QueryKind::Default),
            Some(Resolution::Disabled)
        );

        // Retired: later changes no longer flow through
        ctx.set_value(vendor, "Globex".into(), false, true).unwrap();
        assert_eq!(text(&ctx, payee), "ACME");
        assert!(ctx.graph().listeners_of(vendor).is_empty());
    }

    #[test]
    fn test_default_query_leaves_populated_field() {
        let mut ctx = context();
        ctx.add_field(None, "Vendor", "1", "ACME".into()).unwrap();
        let payee = ctx.add_field(None, "Payee", "2", "Initech".into()).unwrap();

        ctx.register_query(payee, "{Attribute}../Vendor{/Attribute}", QueryKind::Default)
            .unwrap();
        assert_eq!(text(&ctx, payee), "Initech");
        assert_eq!(
            ctx.query_resolution(payee, QueryKind::Default),
            Some(Resolution::Disabled)
        );
    }

    #[test]
    fn test_deferred_default_update_applies_once_resolved() {
        let mut ctx = context();
        let payee = ctx.add_field(None, "Payee", "2", "".into()).unwrap();
        ctx.register_query(payee, "{Attribute}../Vendor{/Attribute}", QueryKind::Default)
            .unwrap();
        assert!(ctx.graph().get(0).unwrap().update_pending);

        // Typed in meanwhile; the deferred update still wins once resolved
        ctx.set_value(payee, "typed".into(), false, true).unwrap();
        ctx.add_field(None, "Vendor", "1", "ACME".into()).unwrap();
        assert_eq!(text(&ctx, payee), "ACME");
        assert_eq!(
            ctx.query_resolution(payee, QueryKind::Default),
            Some(Resolution::Disabled)
        );
    }

    #[test]
    fn test_optional_reference_keeps_default_query_alive() {
        let mut ctx = context();
        ctx.add_field(None, "Vendor", "1", "ACME".into()).unwrap();
        let payee = ctx.add_field(None, "Payee", "2", "".into()).unwrap();
        ctx.register_query(
            payee,
            "{Attribute}../Vendor{/Attribute}{Attribute Required=false}../Branch{/Attribute}",
            QueryKind::Default,
        )
        .unwrap();
        assert_eq!(text(&ctx, payee), "ACME");
        assert_eq!(
            ctx.query_resolution(payee, QueryKind::Default),
            Some(Resolution::MinimallyResolved)
        );

        // The field is populated now, so the late binding only retires it
        ctx.add_field(None, "Branch", "3", " East".into()).unwrap();
        assert_eq!(text(&ctx, payee), "ACME");
        assert_eq!(
            ctx.query_resolution(payee, QueryKind::Default),
            Some(Resolution::Disabled)
        );
    }

    #[test]
    fn test_reentrant_notification_is_suppressed() {
        let mut ctx = context();
        let a = ctx.add_field(None, "A", "1", "".into()).unwrap();
        let b = ctx.add_field(None, "B", "2", "".into()).unwrap();
        ctx.register_query(a, "{Attribute}../B{/Attribute}x", QueryKind::Normal)
            .unwrap();
        ctx.register_query(b, "{Attribute}../A{/Attribute}", QueryKind::Normal)
            .unwrap();

        // B notifies A, A notifies B, and B's second notification is dropped
        ctx.set_value(b, "1".into(), false, true).unwrap();
        assert_eq!(text(&ctx, a), "1x");
        assert_eq!(text(&ctx, b), "1x");
        assert!(!ctx.forest().get(a).unwrap().notifying);
        assert!(!ctx.forest().get(b).unwrap().notifying);
    }

    #[test]
    fn test_external_failure_keeps_prior_value() {
        let mut ctx = context();
        let code = ctx.add_field(None, "Code", "1", "NY".into()).unwrap();
        let state = ctx.add_field(None, "State", "2", "".into()).unwrap();

        let mut params = QueryParameters::new();
        params.insert("@p0".into(), "NY".into());
        ctx.executor_as::<TableExecutor>()
            .unwrap()
            .insert("SELECT Name FROM States WHERE Code = @p0", params, "New York");

        ctx.register_query(
            state,
            "{SQL}SELECT Name FROM States WHERE Code = {Attribute}../Code{/Attribute}{/SQL}",
            QueryKind::Normal,
        )
        .unwrap();
        assert_eq!(text(&ctx, state), "New York");
        ctx.take_changes();

        // No result registered for "ZZ": the executor fails
        ctx.set_value(code, "ZZ".into(), false, true).unwrap();
        assert_eq!(text(&ctx, state), "New York");
        let changes = ctx.take_changes();
        assert!(changes.contains(&FieldChange::Restored(state)));
        assert!(!changes.contains(&FieldChange::Value(state)));
    }

    #[test]
    fn test_validation_query_feeds_validator() {
        let mut ctx = context();
        let choices = ctx
            .add_field(None, "Choices", "1", "Red\nGreen\n\nBlue".into())
            .unwrap();
        let color = ctx.add_field(None, "Color", "2", "green".into()).unwrap();

        ctx.register_query(color, "{Attribute}../Choices{/Attribute}", QueryKind::Validation)
            .unwrap();
        assert!(ctx.status(color).unwrap().data_valid());
        // The value itself is untouched
        assert_eq!(text(&ctx, color), "green");

        ctx.set_value(color, "Purple".into(), false, true).unwrap();
        assert!(!ctx.status(color).unwrap().data_valid());
        assert_eq!(
            ctx.find_next_invalid(None, Direction::Forward, false)
                .unwrap_err()
                .node(),
            Some(color)
        );

        ctx.set_value(choices, "Purple".into(), false, true).unwrap();
        assert!(ctx.status(color).unwrap().data_valid());

        assert!(ctx.unregister_query(color, QueryKind::Validation).unwrap());
        assert!(!ctx.unregister_query(color, QueryKind::Validation).unwrap());
    }

    #[test]
    fn test_register_same_expression_keeps_query() {
        let mut ctx = context();
        let a = ctx.add_field(None, "A", "1", "".into()).unwrap();
        let first = ctx.register_query(a, "x", QueryKind::Normal).unwrap();
        assert_eq!(ctx.register_query(a, "x", QueryKind::Normal).unwrap(), first);

        let second = ctx.register_query(a, "y", QueryKind::Normal).unwrap();
        assert_ne!(second, first);
        assert_eq!(ctx.graph().len(), 1);
        assert_eq!(text(&ctx, a), "y");

        // A default query takes over the update slot
        ctx.register_query(a, "z", QueryKind::Default).unwrap();
        assert_eq!(ctx.graph().len(), 1);
    }

    #[test]
    fn test_failed_registration_keeps_old_query() {
        let mut ctx = context();
        let a = ctx.add_field(None, "A", "1", "".into()).unwrap();
        ctx.add_field(None, "B", "2", "".into()).unwrap();
        ctx.add_field(None, "B", "3", "".into()).unwrap();
        let id = ctx.register_query(a, "x", QueryKind::Normal).unwrap();

        assert!(matches!(
            ctx.register_query(a, "{Attribute}x", QueryKind::Normal),
            Err(FormError::Structural { .. })
        ));
        assert!(matches!(
            ctx.register_query(a, "{Attribute}../B{/Attribute}", QueryKind::Normal),
            Err(FormError::MultipleMatch { count: 2, .. })
        ));
        assert_eq!(ctx.graph().owned_by(a).update, Some(id));
    }

    #[test]
    fn test_set_value_spatial_handling() {
        let mut ctx = context();
        let a = ctx.add_field(None, "A", "1", "".into()).unwrap();
        ctx.set_hint(a, HintType::Direct, vec![Zone::new(1, 0, 0, 5, 5)])
            .unwrap();
        ctx.set_accepted(a, true).unwrap();

        let scanned = SpatialValue::spatial("42", vec![Zone::new(1, 10, 10, 20, 20)]);
        ctx.set_value(a, scanned.clone(), false, false).unwrap();
        assert!(!ctx.value(a).unwrap().has_spatial_info());
        assert_eq!(ctx.status(a).unwrap().hint_type(), HintType::Direct);
        assert!(ctx.status(a).unwrap().accepted());

        ctx.set_value(a, scanned, true, true).unwrap();
        assert!(ctx.value(a).unwrap().has_spatial_info());
        assert_eq!(ctx.status(a).unwrap().hint_type(), HintType::None);
        // Same text, so the edit does not revoke acceptance
        assert!(ctx.status(a).unwrap().accepted());

        ctx.set_value(a, "43".into(), true, true).unwrap();
        assert!(!ctx.status(a).unwrap().accepted());
    }

    #[test]
    fn test_marking_and_navigation() {
        let mut ctx = context();
        let a = ctx.add_field(None, "A", "1", "".into()).unwrap();
        let b = ctx.add_field(None, "B", "2", "".into()).unwrap();
        let c = ctx.add_field(Some(b), "C", "2.1", "".into()).unwrap();

        assert_eq!(
            ctx.find_next_unviewed(None, Direction::Forward, false)
                .unwrap_err()
                .genealogy(),
            &[a]
        );

        ctx.mark_as_viewed(a, true, false).unwrap();
        assert_eq!(
            ctx.find_next_unviewed(None, Direction::Forward, false)
                .unwrap_err()
                .genealogy(),
            &[b]
        );

        ctx.mark_as_viewed(b, true, true).unwrap();
        assert!(ctx.status(c).unwrap().viewed());
        assert!(ctx.find_next_unviewed(None, Direction::Forward, true).is_ok());

        ctx.mark_as_propagated(b, true, true).unwrap();
        assert!(ctx.status(c).unwrap().propagated());
        assert!(!ctx.status(a).unwrap().propagated());

        ctx.set_tab_stop_mode(a, TabStopMode::Never).unwrap();
        assert_eq!(
            ctx.find_next_tab_stop(None, Direction::Forward, false)
                .unwrap_err()
                .node(),
            Some(b)
        );
    }

    #[test]
    fn test_validation_toggle() {
        let mut ctx = context();
        let a = ctx.add_field(None, "A", "1", "x".into()).unwrap();
        assert!(!ctx
            .set_validator(a, Box::new(ListValidator::with_items(vec!["y".into()])))
            .unwrap());

        ctx.set_validation_enabled(a, false).unwrap();
        assert!(ctx.status(a).unwrap().data_valid());
        assert!(ctx.find_next_invalid(None, Direction::Forward, false).is_ok());

        ctx.set_validation_enabled(a, true).unwrap();
        assert!(!ctx.status(a).unwrap().data_valid());
    }

    #[test]
    fn test_source_doc_name_and_paths() {
        let mut ctx = context();
        let row = ctx.add_field(None, "Row", "1", "".into()).unwrap();
        let name = ctx.add_field(Some(row), "Name", "1", "".into()).unwrap();
        ctx.register_query(name, "{SourceDocName}", QueryKind::Normal)
            .unwrap();
        assert_eq!(text(&ctx, name), "invoice.tif");
        assert_eq!(ctx.resolve_path(row, "Name").unwrap(), vec![name]);
        assert_eq!(ctx.resolve_path(name, "/Row/Name").unwrap(), vec![name]);
    }

    #[test]
    fn test_unknown_field_errors() {
        let mut ctx = context();
        assert_eq!(ctx.value(9).unwrap_err(), FormError::UnknownField(9));
        assert!(ctx.set_value(9, "x".into(), false, true).is_err());
        assert!(ctx.register_query(9, "x", QueryKind::Normal).is_err());
        assert!(ctx.delete_field(9).is_err());
    }
}
