//! JSON value model for node snapshots.
//!
//! `GraphValue` is the value stored inside a node snapshot. It extends plain
//! JSON with an explicit `Hole` variant: a position whose key or index exists
//! structurally but carries no inline data, because the data at that position
//! lives in a child node reachable only through the outbound edge index. Holes
//! are how an array keeps its length while its elements are normalized away,
//! and they are distinct from `Null` (an explicitly written JSON null).
//!
//! # References
//! - JSON data model: RFC 8259 (2017)
//! - Path copying in persistent trees: Driscoll, Sarnak, Sleator, Tarjan,
//!   "Making Data Structures Persistent" (1989)

use crate::core::{Path, PathStep};
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use std::collections::BTreeMap;

/// A JSON value with holes.
///
/// Object values use `BTreeMap` so iteration order is deterministic. Numbers
/// reuse `serde_json::Number`, which keeps the integer/float distinction
/// (`1` and `1.0` are different values at this layer; canonicalization for
/// hashing happens elsewhere).
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    /// A structural hole: the position exists but holds no inline value.
    Hole,
    /// An explicit JSON `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number (integer or float, as distinguished by `serde_json`).
    Number(Number),
    /// A string.
    String(String),
    /// An array; elements may be holes.
    Array(Vec<GraphValue>),
    /// An object; entries may be holes (treated as absent by projection).
    Object(BTreeMap<String, GraphValue>),
}

impl GraphValue {
    /// Returns `true` if this value is a hole.
    #[inline]
    pub fn is_hole(&self) -> bool {
        matches!(self, GraphValue::Hole)
    }

    /// Returns `true` if this value is an explicit null.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    /// Navigates to the value at `path`, if every step exists.
    ///
    /// The root path resolves to `self`. Missing keys, out-of-range indices,
    /// and shape mismatches all resolve to `None`.
    pub fn at(&self, path: &Path) -> Option<&GraphValue> {
        let mut slot = self;
        for step in path.steps() {
            slot = match (slot, step) {
                (GraphValue::Object(map), PathStep::Field(name)) => map.get(name)?,
                (GraphValue::Array(items), PathStep::Index(index)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(slot)
    }

    /// Writes `value` at `path`, creating intermediate structure as needed.
    ///
    /// Field steps coerce the slot to an object; index steps coerce the slot
    /// to an array, extending it with holes up to the index. Whatever was at
    /// a coerced or written position is replaced.
    pub fn write_at(&mut self, path: &Path, value: GraphValue) {
        let mut slot = self;
        for step in path.steps() {
            slot = match step {
                PathStep::Field(name) => object_entry(slot, name),
                PathStep::Index(index) => array_entry(slot, *index),
            };
        }
        *slot = value;
    }

    /// Clears the value at `path` without creating intermediate structure.
    ///
    /// Object entries are removed; array entries become holes (the array keeps
    /// its length). Clearing the root path hollows the entire value. Paths
    /// that do not resolve are a no-op.
    pub fn clear_at(&mut self, path: &Path) {
        let Some((last, parents)) = path.split_last() else {
            *self = GraphValue::Hole;
            return;
        };
        let mut slot = self;
        for step in parents {
            slot = match (slot, step) {
                (GraphValue::Object(map), PathStep::Field(name)) => match map.get_mut(name) {
                    Some(next) => next,
                    None => return,
                },
                (GraphValue::Array(items), PathStep::Index(index)) => {
                    match items.get_mut(*index) {
                        Some(next) => next,
                        None => return,
                    }
                }
                _ => return,
            };
        }
        match (slot, last) {
            (GraphValue::Object(map), PathStep::Field(name)) => {
                map.remove(name);
            }
            (GraphValue::Array(items), PathStep::Index(index)) => {
                if let Some(entry) = items.get_mut(*index) {
                    *entry = GraphValue::Hole;
                }
            }
            _ => {}
        }
    }

    /// Converts to a plain `serde_json::Value`.
    ///
    /// Holes have no JSON representation: object entries holding holes are
    /// dropped, array elements holding holes become `null`. Callers that
    /// need to distinguish holes inspect the `GraphValue` directly.
    pub fn to_json(&self) -> JsonValue {
        match self {
            GraphValue::Hole | GraphValue::Null => JsonValue::Null,
            GraphValue::Bool(b) => JsonValue::Bool(*b),
            GraphValue::Number(n) => JsonValue::Number(n.clone()),
            GraphValue::String(s) => JsonValue::String(s.clone()),
            GraphValue::Array(items) => {
                JsonValue::Array(items.iter().map(GraphValue::to_json).collect())
            }
            GraphValue::Object(map) => {
                let mut out = JsonMap::new();
                for (key, value) in map {
                    if !value.is_hole() {
                        out.insert(key.clone(), value.to_json());
                    }
                }
                JsonValue::Object(out)
            }
        }
    }
}

/// Coerces `slot` to an object and returns the entry for `name`.
fn object_entry<'a>(slot: &'a mut GraphValue, name: &str) -> &'a mut GraphValue {
    if !matches!(slot, GraphValue::Object(_)) {
        *slot = GraphValue::Object(BTreeMap::new());
    }
    match slot {
        GraphValue::Object(map) => map.entry(name.to_owned()).or_insert(GraphValue::Hole),
        // Not taken: the slot was coerced to an object above.
        other => other,
    }
}

/// Coerces `slot` to an array long enough for `index` and returns that entry.
fn array_entry(slot: &mut GraphValue, index: usize) -> &mut GraphValue {
    if !matches!(slot, GraphValue::Array(_)) {
        *slot = GraphValue::Array(Vec::new());
    }
    match slot {
        GraphValue::Array(items) => {
            if items.len() <= index {
                items.resize(index + 1, GraphValue::Hole);
            }
            &mut items[index]
        }
        // Not taken: the slot was coerced to an array above.
        other => other,
    }
}

impl From<&JsonValue> for GraphValue {
    fn from(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => GraphValue::Null,
            JsonValue::Bool(b) => GraphValue::Bool(*b),
            JsonValue::Number(n) => GraphValue::Number(n.clone()),
            JsonValue::String(s) => GraphValue::String(s.clone()),
            JsonValue::Array(items) => {
                GraphValue::Array(items.iter().map(GraphValue::from).collect())
            }
            JsonValue::Object(map) => GraphValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), GraphValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for GraphValue {
    fn from(value: JsonValue) -> Self {
        GraphValue::from(&value)
    }
}

impl From<bool> for GraphValue {
    fn from(value: bool) -> Self {
        GraphValue::Bool(value)
    }
}

impl From<i64> for GraphValue {
    fn from(value: i64) -> Self {
        GraphValue::Number(Number::from(value))
    }
}

impl From<&str> for GraphValue {
    fn from(value: &str) -> Self {
        GraphValue::String(value.to_owned())
    }
}

impl From<String> for GraphValue {
    fn from(value: String) -> Self {
        GraphValue::String(value)
    }
}

/// Structural comparison against plain JSON.
///
/// Holes never equal any JSON value, except that an object entry holding a
/// hole compares as if the entry were absent.
impl PartialEq<JsonValue> for GraphValue {
    fn eq(&self, other: &JsonValue) -> bool {
        match (self, other) {
            (GraphValue::Null, JsonValue::Null) => true,
            (GraphValue::Bool(a), JsonValue::Bool(b)) => a == b,
            (GraphValue::Number(a), JsonValue::Number(b)) => a == b,
            (GraphValue::String(a), JsonValue::String(b)) => a == b,
            (GraphValue::Array(a), JsonValue::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (GraphValue::Object(a), JsonValue::Object(b)) => {
                let present = a.iter().filter(|(_, v)| !v.is_hole());
                present.clone().count() == b.len()
                    && present.into_iter().all(|(k, v)| b.get(k).is_some_and(|w| v == w))
            }
            _ => false,
        }
    }
}
