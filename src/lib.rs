//! FormBind - Runtime data binding for document-capture forms
//!
//! Parts:
//! A: Field forest with ordered scanning (find next unviewed/invalid/tab stop)
//! B: Field expressions with dependency-tracked re-evaluation
//! C: Spatial values that keep OCR provenance through concatenation
//! D: NIF surface holding one DocumentContext per open document

// Rust-side executors and accessors the NIFs do not reach are exercised by module tests
#![allow(dead_code)]

use rustler::{Encoder, Env, NifResult, ResourceArc, Term};

mod context;
mod error;
mod query;
mod resource;
mod scan;
mod spatial;
mod term;
mod tree;

use context::{ContextConfig, DocumentContext};
use query::{QueryKind, QueryParameters, TableExecutor};
use resource::{DocumentRef, DocumentResource};
use scan::Direction;
use spatial::SpatialValue;
use term::{decode_atom, ZoneTuple};
use tree::{HintType, ListValidator, NodeId, TabStopMode};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Run `f` on the open document, mapping a closed or poisoned document to
/// `{:error, reason}`
fn with_doc<'a, F>(env: Env<'a>, doc: &DocumentRef, f: F) -> NifResult<Term<'a>>
where
    F: FnOnce(&mut DocumentContext) -> NifResult<Term<'a>>,
{
    match doc.with_context(f) {
        Ok(term) => term,
        Err(reason) => Ok(term::error_to_term(env, reason)),
    }
}

// ============================================================================
// Documents
// ============================================================================

/// Open a document context (returns ResourceArc)
#[rustler::nif]
fn new_document(source_doc_name: String) -> DocumentRef {
    tracing::debug!(%source_doc_name, "opening document");
    ResourceArc::new(DocumentResource::new(ContextConfig {
        source_doc_name,
        ..ContextConfig::default()
    }))
}

/// Tear the document down; later calls return `{:error, "no_document"}`
#[rustler::nif]
fn close_document<'a>(env: Env<'a>, doc: DocumentRef) -> NifResult<Term<'a>> {
    match doc.close() {
        Ok(was_open) => Ok((term::ok(), was_open).encode(env)),
        Err(reason) => Ok(term::error_to_term(env, reason)),
    }
}

// ============================================================================
// Fields
// ============================================================================

#[rustler::nif]
fn add_field<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    parent: Option<NodeId>,
    name: &str,
    order_key: &str,
    text: &str,
) -> NifResult<Term<'a>> {
    with_doc(env, &doc, |ctx| {
        let result = ctx.add_field(parent, name, order_key, SpatialValue::plain(text));
        Ok(term::result_to_term(env, result))
    })
}

#[rustler::nif]
fn delete_field<'a>(env: Env<'a>, doc: DocumentRef, node: NodeId) -> NifResult<Term<'a>> {
    with_doc(env, &doc, |ctx| Ok(term::unit_to_term(env, ctx.delete_field(node))))
}

/// Store a value entered for a field. `zones` are `{page, left, top, right, bottom}`.
#[rustler::nif]
fn set_value<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    node: NodeId,
    text: &str,
    zones: Vec<ZoneTuple>,
    accept_spatial: bool,
    end_of_edit: bool,
) -> NifResult<Term<'a>> {
    let value = SpatialValue::spatial(text, term::zones_from_tuples(zones));
    with_doc(env, &doc, |ctx| {
        let result = ctx.set_value(node, value, accept_spatial, end_of_edit);
        Ok(term::unit_to_term(env, result))
    })
}

/// `{:ok, {text, zones}}`
#[rustler::nif]
fn get_value<'a>(env: Env<'a>, doc: DocumentRef, node: NodeId) -> NifResult<Term<'a>> {
    with_doc(env, &doc, |ctx| {
        Ok(match ctx.value(node) {
            Ok(value) => (term::ok(), term::spatial_value_to_term(env, value)).encode(env),
            Err(e) => term::error_to_term(env, &e.to_string()),
        })
    })
}

#[rustler::nif]
fn resolve_path<'a>(env: Env<'a>, doc: DocumentRef, base: NodeId, path: &str) -> NifResult<Term<'a>> {
    with_doc(env, &doc, |ctx| Ok(term::result_to_term(env, ctx.resolve_path(base, path))))
}

/// Drain queued `{:value | :restored | :deleted | :ambiguous, id}` changes
#[rustler::nif]
fn take_changes<'a>(env: Env<'a>, doc: DocumentRef) -> NifResult<Term<'a>> {
    with_doc(env, &doc, |ctx| Ok(term::changes_to_term(env, ctx.take_changes())))
}

// ============================================================================
// Status
// ============================================================================

/// `{:ok, %{viewed: ..., data_valid: ..., ...}}`
#[rustler::nif]
fn field_status<'a>(env: Env<'a>, doc: DocumentRef, node: NodeId) -> NifResult<Term<'a>> {
    with_doc(env, &doc, |ctx| {
        Ok(match ctx.status(node) {
            Ok(status) => (term::ok(), term::status_to_term(env, status)?).encode(env),
            Err(e) => term::error_to_term(env, &e.to_string()),
        })
    })
}

/// Mark `:viewed`, `:valid` or `:propagated`, optionally over the subtree
#[rustler::nif]
fn mark<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    flag: Term<'a>,
    node: NodeId,
    value: bool,
    recursive: bool,
) -> NifResult<Term<'a>> {
    let flag = decode_atom(flag, |name| match name {
        "viewed" | "valid" | "propagated" => Some(name.to_string()),
        _ => None,
    })?;
    with_doc(env, &doc, |ctx| {
        let result = match flag.as_str() {
            "viewed" => ctx.mark_as_viewed(node, value, recursive),
            "valid" => ctx.mark_as_valid(node, value, recursive),
            _ => ctx.mark_as_propagated(node, value, recursive),
        };
        Ok(term::unit_to_term(env, result))
    })
}

/// Set `:viewable`, `:validation_enabled`, `:persist` or `:accepted`
#[rustler::nif]
fn set_flag<'a>(env: Env<'a>, doc: DocumentRef, node: NodeId, flag: Term<'a>, value: bool) -> NifResult<Term<'a>> {
    let flag = decode_atom(flag, |name| match name {
        "viewable" | "validation_enabled" | "persist" | "accepted" => Some(name.to_string()),
        _ => None,
    })?;
    with_doc(env, &doc, |ctx| {
        let result = match flag.as_str() {
            "viewable" => ctx.set_viewable(node, value),
            "validation_enabled" => ctx.set_validation_enabled(node, value),
            "persist" => ctx.set_persist(node, value),
            _ => ctx.set_accepted(node, value),
        };
        Ok(term::unit_to_term(env, result))
    })
}

#[rustler::nif]
fn set_tab_stop_mode<'a>(env: Env<'a>, doc: DocumentRef, node: NodeId, mode: Term<'a>) -> NifResult<Term<'a>> {
    let mode = decode_atom(mode, TabStopMode::from_str)?;
    with_doc(env, &doc, |ctx| Ok(term::unit_to_term(env, ctx.set_tab_stop_mode(node, mode))))
}

#[rustler::nif]
fn set_hint<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    node: NodeId,
    hint_type: Term<'a>,
    zones: Vec<ZoneTuple>,
) -> NifResult<Term<'a>> {
    let hint_type = decode_atom(hint_type, HintType::from_str)?;
    let zones = term::zones_from_tuples(zones);
    with_doc(env, &doc, |ctx| Ok(term::unit_to_term(env, ctx.set_hint(node, hint_type, zones))))
}

/// Attach a list validator; returns `{:ok, valid?}`
#[rustler::nif]
fn set_validation_list<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    node: NodeId,
    items: Vec<String>,
    required: bool,
) -> NifResult<Term<'a>> {
    let validator = ListValidator::with_items(items).required(required);
    with_doc(env, &doc, |ctx| {
        Ok(term::result_to_term(env, ctx.set_validator(node, Box::new(validator))))
    })
}

#[rustler::nif]
fn validate<'a>(env: Env<'a>, doc: DocumentRef, node: NodeId) -> NifResult<Term<'a>> {
    with_doc(env, &doc, |ctx| Ok(term::result_to_term(env, ctx.validate(node))))
}

// ============================================================================
// Navigation
// ============================================================================

/// Find the next `:unviewed`, `:invalid` or `:tab_stop` field.
/// Returns `:ok` when there is none, `{:found, genealogy}` otherwise.
#[rustler::nif]
fn find_next<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    target: Term<'a>,
    start_path: Option<Vec<NodeId>>,
    direction: Term<'a>,
    wrap: bool,
) -> NifResult<Term<'a>> {
    let target = decode_atom(target, |name| match name {
        "unviewed" | "invalid" | "tab_stop" => Some(name.to_string()),
        _ => None,
    })?;
    let direction = decode_atom(direction, Direction::from_str)?;
    with_doc(env, &doc, |ctx| {
        let start = start_path.as_deref();
        let result = match target.as_str() {
            "unviewed" => ctx.find_next_unviewed(start, direction, wrap),
            "invalid" => ctx.find_next_invalid(start, direction, wrap),
            _ => ctx.find_next_tab_stop(start, direction, wrap),
        };
        Ok(term::scan_result_to_term(env, result))
    })
}

// ============================================================================
// Queries
// ============================================================================

/// Declare a `:normal`, `:validation` or `:default` expression on a field
#[rustler::nif]
fn register_query<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    node: NodeId,
    expression: &str,
    kind: Term<'a>,
) -> NifResult<Term<'a>> {
    let kind = decode_atom(kind, QueryKind::from_str)?;
    with_doc(env, &doc, |ctx| {
        Ok(term::result_to_term(env, ctx.register_query(node, expression, kind)))
    })
}

#[rustler::nif]
fn unregister_query<'a>(env: Env<'a>, doc: DocumentRef, node: NodeId, kind: Term<'a>) -> NifResult<Term<'a>> {
    let kind = decode_atom(kind, QueryKind::from_str)?;
    with_doc(env, &doc, |ctx| Ok(term::result_to_term(env, ctx.unregister_query(node, kind))))
}

/// Register the answer to a relational query ahead of evaluation.
/// `parameters` are `{name, value}` pairs such as `{"@p0", "NY"}`.
#[rustler::nif]
fn put_query_result<'a>(
    env: Env<'a>,
    doc: DocumentRef,
    query: &str,
    parameters: Vec<(String, String)>,
    result: &str,
) -> NifResult<Term<'a>> {
    let parameters: QueryParameters = parameters.into_iter().collect();
    with_doc(env, &doc, |ctx| {
        Ok(match ctx.executor_as::<TableExecutor>() {
            Some(table) => {
                table.insert(query, parameters, result);
                term::ok().encode(env)
            }
            None => term::error_to_term(env, "no_result_table"),
        })
    })
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.FormBind.Native");
