//! Selection walker.
//!
//! Walks a selection set and a payload in lockstep, emitting visit events
//! into an [`EditSink`]. The walk is driven by the selection, never by the
//! payload: fields absent from the selection are invisible even when the
//! payload supplies them, and fields absent from the payload are treated as
//! unchanged and skipped entirely.
//!
//! Descent rules:
//! - an object payload under a field with a nested selection descends into
//!   that selection;
//! - an array payload under such a field descends per element with the same
//!   element selection, indices qualifying the path (nested arrays recurse);
//! - `null` emits the field event without descending (the sink records a
//!   write-null);
//! - scalars never descend; a scalar where the selection expects an object is
//!   reported by the sink as a malformed payload.
//!
//! Argument expressions are resolved here, against the caller's variable map,
//! so the sink only ever sees fully resolved argument values.

use crate::editor::WriteError;
use crate::fingerprint::FieldArguments;
use crate::query::{FieldSelection, SelectionSet};
use crate::value::GraphValue;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;

/// Consumer of walk events.
///
/// Enter events may fail (malformed payload, unresolved shape); a failure
/// aborts the walk immediately, so the matching leave event is never emitted.
pub trait EditSink {
    /// A selected field with a present payload value. `arguments` is `Some`
    /// exactly when the field declares arguments, resolved and canonical.
    fn enter_field(
        &mut self,
        field: &FieldSelection,
        arguments: Option<FieldArguments>,
        payload: &JsonValue,
    ) -> Result<(), WriteError>;

    /// One element of an array payload, visited under the element selection.
    fn enter_index(
        &mut self,
        index: usize,
        selection: &SelectionSet,
        payload: &JsonValue,
    ) -> Result<(), WriteError>;

    /// Closes the most recent `enter_index`.
    fn leave_index(&mut self);

    /// Closes the most recent `enter_field`.
    fn leave_field(&mut self);
}

/// Walks `selection` against `payload`, emitting events into `sink`.
pub fn walk_selection<S: EditSink>(
    selection: &SelectionSet,
    payload: &JsonMap<String, JsonValue>,
    variables: &BTreeMap<String, GraphValue>,
    sink: &mut S,
) -> Result<(), WriteError> {
    for field in &selection.fields {
        // Missing in the payload means unchanged: skip without an event.
        let Some(value) = payload.get(&field.name) else {
            continue;
        };
        let arguments = match &field.arguments {
            Some(set) => Some(set.resolve(variables)?),
            None => None,
        };
        sink.enter_field(field, arguments, value)?;
        if let Some(children) = &field.children {
            match value {
                JsonValue::Object(map) => walk_selection(children, map, variables, sink)?,
                JsonValue::Array(items) => walk_items(children, items, variables, sink)?,
                // Null and scalars do not descend; the sink already saw them.
                _ => {}
            }
        }
        sink.leave_field();
    }
    Ok(())
}

/// Walks array elements under the element selection, recursing through
/// nested arrays so every index level qualifies the path.
fn walk_items<S: EditSink>(
    selection: &SelectionSet,
    items: &[JsonValue],
    variables: &BTreeMap<String, GraphValue>,
    sink: &mut S,
) -> Result<(), WriteError> {
    for (index, item) in items.iter().enumerate() {
        sink.enter_index(index, selection, item)?;
        match item {
            JsonValue::Object(map) => walk_selection(selection, map, variables, sink)?,
            JsonValue::Array(nested) => walk_items(selection, nested, variables, sink)?,
            _ => {}
        }
        sink.leave_index();
    }
    Ok(())
}
