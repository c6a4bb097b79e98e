//! Snapshot editor: the copy-on-write merge core.
//!
//! An editor is constructed around an immutable base snapshot and scoped to a
//! single write. The selection walker drives it through visit events; the
//! editor lazily clones any node it must mutate into a sparse working set,
//! maintains the bidirectional reference indices, and tracks the set of
//! dirty node ids. A final reconciliation pass reverts clones that ended up
//! structurally equal to their base counterpart, so the committed edited set
//! is exactly the set of nodes whose identity changed.
//!
//! Per-node lifecycle during an edit:
//! `Untouched -> Cloned -> (Reverted | Committed)`.
//!
//! # Citations
//! - Copy-on-write overlays: Okasaki, "Purely Functional Data Structures",
//!   Chapter 2 (1999)
//! - Change detection by identity: [Self-Adjusting Computation, POPL 2009]

use crate::core::{NodeId, NodeKind, NodeRef, NodeSnapshot, Path, PathStep};
use crate::fingerprint::parameterized_id;
use crate::operations::WriteContext;
use crate::query::{FieldSelection, Query, SelectionSet};
use crate::snapshot::Snapshot;
use crate::value::GraphValue;
use crate::walker::{walk_selection, EditSink};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::trace;

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Error aborting a write.
///
/// Every failure is atomic: the editor's working state is discarded and the
/// base snapshot is untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// The payload shape contradicts the selection shape at `path`.
    MalformedPayload {
        /// Payload position of the mismatch.
        path: Path,
        /// What was wrong there.
        reason: &'static str,
    },
    /// The query references a variable that is unbound and has no default.
    UnresolvedVariable {
        /// The variable's name.
        name: String,
    },
    /// The resolved query itself is malformed.
    InvalidSelection {
        /// What was wrong with the selection.
        reason: String,
    },
    /// An internal invariant was violated; indicates a bug.
    Internal(&'static str),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::MalformedPayload { path, reason } => {
                write!(f, "malformed payload at {path}: {reason}")
            }
            WriteError::UnresolvedVariable { name } => {
                write!(f, "variable ${name} is unbound and has no default")
            }
            WriteError::InvalidSelection { reason } => {
                write!(f, "invalid selection: {reason}")
            }
            WriteError::Internal(reason) => {
                write!(f, "internal invariant violation: {reason}")
            }
        }
    }
}

impl std::error::Error for WriteError {}

// ----------------------------------------------------------------------------
// Editor
// ----------------------------------------------------------------------------

/// Result of a committed write.
#[derive(Debug)]
pub struct WriteResult {
    /// The new immutable snapshot.
    pub snapshot: Snapshot,
    /// Ids whose node identity differs from the base snapshot.
    pub edited_node_ids: BTreeSet<NodeId>,
}

/// Copy-on-write editor over a base snapshot.
///
/// Single-use: [`SnapshotEditor::commit`] consumes the editor, so reuse is a
/// compile-time error. Not thread-safe; scoped to one write call.
pub struct SnapshotEditor<'a> {
    base: &'a Snapshot,
    /// Sparse overlay of cloned nodes; reads fall through to `base`.
    working: BTreeMap<NodeId, NodeSnapshot>,
    /// Ids cloned into the working set.
    edited: BTreeSet<NodeId>,
}

impl<'a> SnapshotEditor<'a> {
    /// Creates an editor over `base`. The base is never mutated.
    pub fn new(base: &'a Snapshot) -> Self {
        Self {
            base,
            working: BTreeMap::new(),
            edited: BTreeSet::new(),
        }
    }

    /// Merges `payload` into the working set along `query`'s selection.
    ///
    /// May be called once per query for batched writes against the same base;
    /// all merges land in the same working set and commit together.
    pub fn merge_payload(
        &mut self,
        ctx: &WriteContext,
        query: &Query,
        payload: &JsonMap<String, JsonValue>,
    ) -> Result<(), WriteError> {
        self.ensure_node(&query.root, NodeKind::Entity);
        let mut driver = MergeDriver {
            editor: self,
            ctx,
            frames: vec![Frame::root(query.root.clone())],
            cursor: Path::root(),
        };
        walk_selection(&query.selection, payload, &ctx.variables, &mut driver)
    }

    /// Freezes the working set into a new snapshot plus the edited-id set.
    ///
    /// Runs the reconciliation pass first, so nodes whose clone ended up
    /// structurally equal to base revert to base identity and drop out of
    /// the edited set.
    pub fn commit(mut self) -> WriteResult {
        self.reconcile();
        let snapshot = self.base.overlay(self.working);
        WriteResult {
            snapshot,
            edited_node_ids: self.edited,
        }
    }

    // ------------------------------------------------------------------------
    // Working-set primitives
    // ------------------------------------------------------------------------

    /// Reads a node, working set first, then base.
    fn peek(&self, id: &NodeId) -> Option<&NodeSnapshot> {
        self.working
            .get(id)
            .or_else(|| self.base.get_node_snapshot(id).map(|arc| &**arc))
    }

    /// Returns the mutable working copy of a node, cloning it from base on
    /// first touch. Callers ensure the node exists (or accept a fresh entity
    /// shell for ids never seen before).
    fn modify(&mut self, id: &NodeId) -> &mut NodeSnapshot {
        let base = self.base;
        self.edited.insert(id.clone());
        self.working.entry(id.clone()).or_insert_with(|| {
            base.get_node_snapshot(id)
                .map(|node| (**node).clone())
                .unwrap_or_else(NodeSnapshot::entity)
        })
    }

    /// Creates a node of `kind` unless it already exists.
    fn ensure_node(&mut self, id: &NodeId, kind: NodeKind) {
        if self.peek(id).is_some() {
            return;
        }
        self.working.insert(id.clone(), NodeSnapshot::new(kind));
        self.edited.insert(id.clone());
    }

    // ------------------------------------------------------------------------
    // Reference index maintenance
    // ------------------------------------------------------------------------

    /// Points `parent` at `child` from position `path`.
    ///
    /// Retargets in place: an existing edge at the same path to a different
    /// node is removed together with its inbound counterpart. An edge that is
    /// already correct touches nothing, so an unchanged reference never
    /// clones its endpoints. The parent's inline value at `path` is cleared;
    /// the edge is the only place the relationship lives.
    fn set_reference(&mut self, parent: &NodeId, path: &Path, child: &NodeId) {
        let existing = self
            .peek(parent)
            .and_then(|node| node.outbound_at(path))
            .cloned();
        let value_present = self
            .peek(parent)
            .and_then(|node| node.value.at(path))
            .is_some_and(|value| !value.is_hole());

        match existing {
            Some(edge) if edge.id == *child => {
                if value_present {
                    self.modify(parent).value.clear_at(path);
                }
            }
            Some(edge) => {
                {
                    let node = self.modify(parent);
                    node.outbound.remove(&edge);
                    node.outbound.insert(NodeRef::new(child.clone(), path.clone()));
                    node.value.clear_at(path);
                }
                self.modify(&edge.id)
                    .inbound
                    .remove(&NodeRef::new(parent.clone(), path.clone()));
                self.modify(child)
                    .inbound
                    .insert(NodeRef::new(parent.clone(), path.clone()));
            }
            None => {
                {
                    let node = self.modify(parent);
                    node.outbound.insert(NodeRef::new(child.clone(), path.clone()));
                    if value_present {
                        node.value.clear_at(path);
                    }
                }
                self.modify(child)
                    .inbound
                    .insert(NodeRef::new(parent.clone(), path.clone()));
            }
        }
    }

    /// Removes an outbound edge and its inbound counterpart.
    fn remove_reference(&mut self, parent: &NodeId, edge: &NodeRef) {
        self.modify(parent).outbound.remove(edge);
        self.modify(&edge.id)
            .inbound
            .remove(&NodeRef::new(parent.clone(), edge.path.clone()));
    }

    /// Removes every outbound edge of `parent` at or under `prefix`.
    fn clear_references_under(&mut self, parent: &NodeId, prefix: &Path) {
        let stale: Vec<NodeRef> = match self.peek(parent) {
            Some(node) => node.outbound_under(prefix).cloned().collect(),
            None => return,
        };
        for edge in stale {
            self.remove_reference(parent, &edge);
        }
    }

    // ------------------------------------------------------------------------
    // Value writes
    // ------------------------------------------------------------------------

    /// Writes a leaf value at `path` inside `parent`.
    ///
    /// A leaf write replaces whatever the position held before, including any
    /// references at or under it. Writing a value identical to the stored one
    /// (with no covered references) touches nothing.
    fn write_value(&mut self, parent: &NodeId, path: &Path, value: GraphValue) {
        let unchanged = self.peek(parent).is_some_and(|node| {
            node.value.at(path) == Some(&value) && node.outbound_under(path).next().is_none()
        });
        if unchanged {
            return;
        }
        self.clear_references_under(parent, path);
        self.modify(parent).value.write_at(path, value);
    }

    /// Replaces the array position at `path` with `len` holes.
    ///
    /// The incoming array replaces the outgoing one wholesale; element merges
    /// re-fill inline positions afterwards. References under the position are
    /// left alone here: they are reconciled when the array site closes, so
    /// element merges can still consult the prior reference at their index.
    fn write_array_scaffold(&mut self, parent: &NodeId, path: &Path, len: usize) {
        let scaffold = GraphValue::Array(vec![GraphValue::Hole; len]);
        let unchanged = self
            .peek(parent)
            .is_some_and(|node| node.value.at(path) == Some(&scaffold));
        if unchanged {
            return;
        }
        self.modify(parent).value.write_at(path, scaffold);
    }

    // ------------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------------

    /// Reverts working nodes structurally equal to their base counterpart.
    fn reconcile(&mut self) {
        let revert: Vec<NodeId> = self
            .working
            .iter()
            .filter(|(id, node)| {
                self.base
                    .get_node_snapshot(id)
                    .is_some_and(|base_node| **node == **base_node)
            })
            .map(|(id, _)| id.clone())
            .collect();
        if !revert.is_empty() {
            trace!(reverted = revert.len(), "reconcile: reverting unchanged clones");
        }
        for id in revert {
            self.working.remove(&id);
            self.edited.remove(&id);
        }
    }
}

// ----------------------------------------------------------------------------
// Merge driver (EditSink implementation)
// ----------------------------------------------------------------------------

/// One open write site on the driver's stack.
struct Frame {
    /// Node currently receiving writes for this site.
    container: NodeId,
    /// Position inside `container` where this site's value lives.
    path: Path,
    /// Present when this site's payload is an array under a nested selection.
    array: Option<ArrayPatch>,
}

impl Frame {
    fn root(container: NodeId) -> Self {
        Self {
            container,
            path: Path::root(),
            array: None,
        }
    }
}

/// Deferred bookkeeping for an array write site.
///
/// Element merges mark every reference they establish (or refresh) under the
/// array position; when the site closes, references under the position that
/// were not marked are stale and get removed. This is also how a shorter
/// incoming array drops the edges of its truncated tail.
struct ArrayPatch {
    path: Path,
    touched: BTreeSet<Path>,
}

/// Binds an editor to one walk: owns the site stack and the payload cursor
/// used in error reports.
struct MergeDriver<'e, 'a, 'c> {
    editor: &'e mut SnapshotEditor<'a>,
    ctx: &'c WriteContext,
    frames: Vec<Frame>,
    cursor: Path,
}

impl MergeDriver<'_, '_, '_> {
    /// The prior reference at exactly this position, if any.
    fn prior_child(&self, container: &NodeId, path: &Path) -> Option<NodeId> {
        self.editor
            .peek(container)
            .and_then(|node| node.outbound_at(path))
            .map(|edge| edge.id.clone())
    }

    /// Marks a reference position live for every enclosing array site it
    /// falls under (nested arrays mark every level).
    fn mark_touched(&mut self, container: &NodeId, path: &Path) {
        for frame in self.frames.iter_mut() {
            if frame.container != *container {
                continue;
            }
            if let Some(array) = frame.array.as_mut() {
                if path.starts_with(&array.path) {
                    array.touched.insert(path.clone());
                }
            }
        }
    }

    /// Places a payload value at a write site, switching the site into a
    /// child node for references, and returns the array bookkeeping when the
    /// payload is an array under a nested selection.
    fn place(
        &mut self,
        container: &mut NodeId,
        path: &mut Path,
        children: Option<&SelectionSet>,
        payload: &JsonValue,
    ) -> Result<Option<ArrayPatch>, WriteError> {
        match payload {
            JsonValue::Null => {
                self.editor.write_value(container, path, GraphValue::Null);
                Ok(None)
            }
            JsonValue::Object(map) => {
                let Some(children) = children else {
                    return Err(WriteError::MalformedPayload {
                        path: self.cursor.clone(),
                        reason: "object supplied for a leaf field",
                    });
                };
                if let Some(entity) = self.ctx.resolver.entity_id(children, map) {
                    self.editor.ensure_node(&entity, NodeKind::Entity);
                    self.editor.set_reference(container, path, &entity);
                    self.mark_touched(container, path);
                    *container = entity;
                    *path = Path::root();
                } else if let Some(previous) = self.prior_child(container, path) {
                    // No identity in the payload, but the position already
                    // references a node: keep the reference and merge into it.
                    self.editor.set_reference(container, path, &previous);
                    self.mark_touched(container, path);
                    *container = previous;
                    *path = Path::root();
                }
                // Otherwise the object is inline: children write through the
                // current container at this path.
                Ok(None)
            }
            JsonValue::Array(items) => {
                if children.is_some() {
                    self.editor.write_array_scaffold(container, path, items.len());
                    Ok(Some(ArrayPatch {
                        path: path.clone(),
                        touched: BTreeSet::new(),
                    }))
                } else {
                    // A leaf array is a plain value: replace wholesale.
                    self.editor
                        .write_value(container, path, GraphValue::from(payload));
                    Ok(None)
                }
            }
            scalar => {
                if children.is_some() {
                    return Err(WriteError::MalformedPayload {
                        path: self.cursor.clone(),
                        reason: "scalar supplied where the selection expects an object",
                    });
                }
                self.editor
                    .write_value(container, path, GraphValue::from(scalar));
                Ok(None)
            }
        }
    }

    /// Closes a site: stale references under a closed array site are removed.
    fn finish_frame(&mut self, frame: Frame) {
        let Some(array) = frame.array else { return };
        let stale: Vec<NodeRef> = match self.editor.peek(&frame.container) {
            Some(node) => node
                .outbound_under(&array.path)
                .filter(|edge| !array.touched.contains(&edge.path))
                .cloned()
                .collect(),
            None => return,
        };
        for edge in stale {
            self.editor.remove_reference(&frame.container, &edge);
        }
    }
}

impl EditSink for MergeDriver<'_, '_, '_> {
    fn enter_field(
        &mut self,
        field: &FieldSelection,
        arguments: Option<crate::fingerprint::FieldArguments>,
        payload: &JsonValue,
    ) -> Result<(), WriteError> {
        self.cursor.push(PathStep::Field(field.name.clone()));
        let parent = self
            .frames
            .last()
            .ok_or(WriteError::Internal("field visited with no enclosing site"))?;
        let mut container = parent.container.clone();
        let mut path = parent.path.child(PathStep::Field(field.name.clone()));

        if let Some(arguments) = arguments {
            // The field's value gets its own node; the edge from the current
            // container occupies the field path, and the container's value
            // never exposes the field name.
            let param = parameterized_id(&container, &path, &arguments);
            self.editor.ensure_node(&param, NodeKind::Parameterized);
            self.editor.set_reference(&container, &path, &param);
            self.mark_touched(&container, &path);
            container = param;
            path = Path::root();
        }

        let array = self.place(&mut container, &mut path, field.children.as_ref(), payload)?;
        self.frames.push(Frame {
            container,
            path,
            array,
        });
        Ok(())
    }

    fn enter_index(
        &mut self,
        index: usize,
        selection: &SelectionSet,
        payload: &JsonValue,
    ) -> Result<(), WriteError> {
        self.cursor.push(PathStep::Index(index));
        let parent = self
            .frames
            .last()
            .ok_or(WriteError::Internal("index visited with no enclosing site"))?;
        let mut container = parent.container.clone();
        let mut path = parent.path.child(PathStep::Index(index));

        let array = self.place(&mut container, &mut path, Some(selection), payload)?;
        self.frames.push(Frame {
            container,
            path,
            array,
        });
        Ok(())
    }

    fn leave_index(&mut self) {
        self.cursor.pop();
        if let Some(frame) = self.frames.pop() {
            self.finish_frame(frame);
        }
    }

    fn leave_field(&mut self) {
        self.cursor.pop();
        if let Some(frame) = self.frames.pop() {
            self.finish_frame(frame);
        }
    }
}
