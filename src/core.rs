//! Core data structures for the normalized graph.
//!
//! The cache is a directed graph of node snapshots keyed by stable node
//! identifiers. Nodes refer to each other by id, never by pointer, so the
//! graph freely admits cycles; a snapshot owns every node it contains and
//! eviction (external to this crate) works by id-set subtraction.
//!
//! # Citations
//! - Normalized stores for declarative data fetching: GraphQL specification,
//!   "Response" and "Execution" sections (October 2021)
//! - Graph representations by adjacency: Cormen et al., "Introduction to
//!   Algorithms", Section 22.1 (2009)

use crate::value::GraphValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of the static query root node.
pub const QUERY_ROOT: &str = "QueryRoot";

/// Stable identifier for a node in the graph.
///
/// Three flavors exist, distinguished only by construction rule: static roots
/// (well-known names such as [`QUERY_ROOT`]), entity ids (a payload object's
/// stringified identity field), and parameterized ids (a deterministic hash,
/// see `fingerprint::parameterized_id`). The textual form is an external
/// contract: callers may persist ids and compare them across writes.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates an id from its textual form.
    #[inline]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the id of the static query root.
    #[inline]
    pub fn query_root() -> Self {
        Self(QUERY_ROOT.to_owned())
    }

    /// Returns the textual form.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(raw: &str) -> Self {
        Self(raw.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One step inside a node's value: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathStep {
    /// An object field name.
    Field(String),
    /// A numeric array index.
    Index(usize),
}

impl From<&str> for PathStep {
    fn from(name: &str) -> Self {
        PathStep::Field(name.to_owned())
    }
}

impl From<String> for PathStep {
    fn from(name: String) -> Self {
        PathStep::Field(name)
    }
}

impl From<usize> for PathStep {
    fn from(index: usize) -> Self {
        PathStep::Index(index)
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathStep::Field(name) => f.write_str(name),
            PathStep::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A sequence of steps addressing a position inside a node's value.
///
/// The empty path addresses the value itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<PathStep>);

impl Path {
    /// The empty path.
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Creates a path from its steps.
    #[inline]
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    /// Returns `true` if this is the empty path.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if this path has no steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the steps as a slice.
    #[inline]
    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    /// Returns a new path with `step` appended.
    pub fn child(&self, step: impl Into<PathStep>) -> Path {
        let mut steps = self.0.clone();
        steps.push(step.into());
        Path(steps)
    }

    /// Appends a step in place.
    pub fn push(&mut self, step: impl Into<PathStep>) {
        self.0.push(step.into());
    }

    /// Removes the last step, if any.
    pub fn pop(&mut self) -> Option<PathStep> {
        self.0.pop()
    }

    /// Returns `true` if `prefix` is a (non-strict) prefix of this path.
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }

    /// Splits off the final step, or `None` for the root path.
    pub fn split_last(&self) -> Option<(&PathStep, &[PathStep])> {
        self.0.split_last()
    }
}

impl From<Vec<PathStep>> for Path {
    fn from(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }
}

impl FromIterator<PathStep> for Path {
    fn from_iter<I: IntoIterator<Item = PathStep>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for step in &self.0 {
            write!(f, ".{step}")?;
        }
        Ok(())
    }
}

/// The observable kind of a node snapshot.
///
/// The kind is fixed at node creation and does not influence merge
/// semantics; it exists so callers (and tests) can distinguish entities from
/// materialized parameterized fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// A node with stable identity: a static root or an id-bearing payload
    /// object.
    Entity,
    /// A node materialized for a field carrying arguments.
    Parameterized,
}

/// A directed edge endpoint: the peer node's id plus the position of the
/// edge inside the referring node's value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// The peer node.
    pub id: NodeId,
    /// Position of the edge inside the parent's value address space.
    pub path: Path,
}

impl NodeRef {
    /// Creates an edge endpoint.
    #[inline]
    pub fn new(id: NodeId, path: Path) -> Self {
        Self { id, path }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.path)
    }
}

/// One node's record: its value plus both edge indices.
///
/// # Invariants
/// - For every `{id: C, path: P}` in `outbound`, node `C` exists in the same
///   snapshot and its `inbound` contains `{id: self, path: P}` exactly once;
///   symmetric in reverse.
/// - Edge sets have set semantics on `(id, path)`; `BTreeSet` additionally
///   gives a deterministic iteration order, though the order is not
///   semantically meaningful.
/// - The value never embeds raw ids; edges live exclusively in `outbound`.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    /// Observable kind, fixed at creation.
    pub kind: NodeKind,
    /// Inline JSON value; positions covered by outbound edges are holes.
    pub value: GraphValue,
    /// Edges from parents to this node.
    pub inbound: BTreeSet<NodeRef>,
    /// Edges from this node to children.
    pub outbound: BTreeSet<NodeRef>,
}

impl NodeSnapshot {
    /// Creates an empty node of the given kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            value: GraphValue::Hole,
            inbound: BTreeSet::new(),
            outbound: BTreeSet::new(),
        }
    }

    /// Creates an empty entity node.
    #[inline]
    pub fn entity() -> Self {
        Self::new(NodeKind::Entity)
    }

    /// Creates an empty parameterized-value node.
    #[inline]
    pub fn parameterized() -> Self {
        Self::new(NodeKind::Parameterized)
    }

    /// Creates a node of the given kind with an initial value.
    pub fn with_value(kind: NodeKind, value: GraphValue) -> Self {
        Self {
            kind,
            value,
            inbound: BTreeSet::new(),
            outbound: BTreeSet::new(),
        }
    }

    /// Returns the outbound edge at exactly `path`, if present.
    ///
    /// At most one outbound edge exists per path; the editor retargets in
    /// place rather than accumulating edges.
    pub fn outbound_at(&self, path: &Path) -> Option<&NodeRef> {
        self.outbound.iter().find(|edge| edge.path == *path)
    }

    /// Returns the outbound edges whose path starts with `prefix`.
    pub fn outbound_under<'a>(&'a self, prefix: &'a Path) -> impl Iterator<Item = &'a NodeRef> {
        self.outbound.iter().filter(move |edge| edge.path.starts_with(prefix))
    }
}
