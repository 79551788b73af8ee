//! Elixir Term Conversion Utilities
//!
//! Converts field values, statuses, scan results and change lists to Elixir
//! terms, and decodes the atoms the Elixir side passes in.

use rustler::{Encoder, Env, NewBinary, NifResult, Term};

use crate::context::FieldChange;
use crate::error::FormError;
use crate::scan::FailurePath;
use crate::spatial::{SpatialValue, Zone};
use crate::tree::FieldStatus;

// Pre-defined atoms for efficiency - created once at compile time
rustler::atoms! {
    ok,
    error,
    found,
    value,
    restored,
    deleted,
    ambiguous,
    viewable,
    viewed,
    data_valid,
    validation_enabled,
    propagated,
    tab_stop_mode,
    persist,
    hint_type,
    hint_zones,
    accepted,
}

/// `{page, left, top, right, bottom}` as passed by the Elixir side
pub type ZoneTuple = (u32, i32, i32, i32, i32);

/// Decode an atom argument through a name parser, e.g. `Direction::from_str`
pub fn decode_atom<T>(term: Term<'_>, parse: impl FnOnce(&str) -> Option<T>) -> NifResult<T> {
    let name = term.atom_to_string()?;
    parse(&name).ok_or(rustler::Error::BadArg)
}

pub fn zones_from_tuples(zones: Vec<ZoneTuple>) -> Vec<Zone> {
    zones
        .into_iter()
        .map(|(page, left, top, right, bottom)| Zone::new(page, left, top, right, bottom))
        .collect()
}

fn zones_to_term<'a>(env: Env<'a>, zones: &[Zone]) -> Term<'a> {
    let mut list = Term::list_new_empty(env);
    for z in zones.iter().rev() {
        list = list.list_prepend((z.page, z.left, z.top, z.right, z.bottom).encode(env));
    }
    list
}

/// `{text, zones}`
pub fn spatial_value_to_term<'a>(env: Env<'a>, value: &SpatialValue) -> Term<'a> {
    (str_to_binary(env, value.text()), zones_to_term(env, value.zones())).encode(env)
}

/// Status flags as a map keyed by atoms
pub fn status_to_term<'a>(env: Env<'a>, status: &FieldStatus) -> NifResult<Term<'a>> {
    let keys = [
        viewable().encode(env),
        viewed().encode(env),
        data_valid().encode(env),
        validation_enabled().encode(env),
        propagated().encode(env),
        tab_stop_mode().encode(env),
        persist().encode(env),
        hint_type().encode(env),
        hint_zones().encode(env),
        accepted().encode(env),
    ];
    let values = [
        status.viewable().encode(env),
        status.viewed().encode(env),
        status.data_valid().encode(env),
        status.validation_enabled().encode(env),
        status.propagated().encode(env),
        rustler::Atom::from_str(env, status.tab_stop_mode().as_str())?.encode(env),
        status.persist().encode(env),
        rustler::Atom::from_str(env, status.hint_type().as_str())?.encode(env),
        zones_to_term(env, status.hint_zones()),
        status.accepted().encode(env),
    ];
    Term::map_from_arrays(env, &keys, &values)
}

/// `:ok` when the scan found nothing, `{:found, genealogy}` otherwise
pub fn scan_result_to_term<'a>(env: Env<'a>, result: Result<(), FailurePath>) -> Term<'a> {
    match result {
        Ok(()) => ok().encode(env),
        Err(path) => (found(), path.into_vec()).encode(env),
    }
}

pub fn changes_to_term<'a>(env: Env<'a>, changes: Vec<FieldChange>) -> Term<'a> {
    let mut list = Term::list_new_empty(env);
    for change in changes.into_iter().rev() {
        let entry = match change {
            FieldChange::Value(id) => (value(), id),
            FieldChange::Restored(id) => (restored(), id),
            FieldChange::Deleted(id) => (deleted(), id),
            FieldChange::Ambiguous(id) => (ambiguous(), id),
        };
        list = list.list_prepend(entry.encode(env));
    }
    list
}

/// `{:error, message}`
pub fn error_to_term<'a>(env: Env<'a>, reason: &str) -> Term<'a> {
    (error(), str_to_binary(env, reason)).encode(env)
}

/// `:ok` or `{:error, message}`
pub fn unit_to_term<'a>(env: Env<'a>, result: Result<(), FormError>) -> Term<'a> {
    match result {
        Ok(()) => ok().encode(env),
        Err(e) => error_to_term(env, &e.to_string()),
    }
}

/// `{:ok, value}` or `{:error, message}`
pub fn result_to_term<'a, T: Encoder>(env: Env<'a>, result: Result<T, FormError>) -> Term<'a> {
    match result {
        Ok(v) => (ok(), v).encode(env),
        Err(e) => error_to_term(env, &e.to_string()),
    }
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    let bytes = s.as_bytes();
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}
