//! Immutable graph snapshots.
//!
//! A snapshot maps node ids to reference-counted node records. Snapshots are
//! immutable once committed and freely shareable across threads; "mutation"
//! happens by building a new snapshot that overlays edited nodes onto the old
//! one, so unchanged nodes are object-identical (`Arc::ptr_eq`) between the
//! two. Identity, not equality, is what the edited-node set reports.
//!
//! # Citations
//! - Structural sharing: Okasaki, "Purely Functional Data Structures" (1999)
//! - Fat-node vs path-copying persistence: Driscoll et al., "Making Data
//!   Structures Persistent" (1989)

use crate::core::{NodeId, NodeKind, NodeRef, NodeSnapshot};
use crate::value::GraphValue;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// An immutable graph of normalized nodes.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    nodes: BTreeMap<NodeId, Arc<NodeSnapshot>>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a snapshot directly from node records.
    ///
    /// Intended for bootstrapping and tests; the caller is responsible for
    /// edge symmetry (see [`Snapshot::verify_references`]).
    pub fn with_nodes(nodes: impl IntoIterator<Item = (NodeId, NodeSnapshot)>) -> Self {
        Self {
            nodes: nodes
                .into_iter()
                .map(|(id, node)| (id, Arc::new(node)))
                .collect(),
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the snapshot holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if a node with this id exists.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterates over all node ids in sorted order.
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Returns the raw node record.
    ///
    /// The `Arc` is the node's identity: two snapshots return the same `Arc`
    /// for a node exactly when that node was untouched between them.
    pub fn get_node_snapshot(&self, id: &NodeId) -> Option<&Arc<NodeSnapshot>> {
        self.nodes.get(id)
    }

    /// Projects a node's reconstructed value, entity references inlined.
    ///
    /// Every outbound edge to an entity substitutes the child's own
    /// projection at the edge's path; a root-path edge replaces the value
    /// wholesale (the shape of a parameterized node holding a direct entity
    /// reference). Edges to parameterized children are never inlined: a
    /// container does not expose a parameterized field through its value, so
    /// reading the field name off the projection yields nothing. The read
    /// path proper resolves parameterized fields per-query; this projection
    /// is a caller convenience.
    ///
    /// The graph may be cyclic, so projection keeps a visiting set and
    /// substitutes `null` where a node would recurse into itself.
    pub fn get(&self, id: &NodeId) -> Option<GraphValue> {
        if !self.nodes.contains_key(id) {
            return None;
        }
        let mut visiting = BTreeSet::new();
        Some(self.project(id, &mut visiting))
    }

    fn project(&self, id: &NodeId, visiting: &mut BTreeSet<NodeId>) -> GraphValue {
        let Some(node) = self.nodes.get(id) else {
            return GraphValue::Hole;
        };
        if !visiting.insert(id.clone()) {
            return GraphValue::Null;
        }
        let mut value = node.value.clone();
        for edge in &node.outbound {
            let parameterized = self
                .nodes
                .get(&edge.id)
                .is_some_and(|child| child.kind == NodeKind::Parameterized);
            if parameterized {
                continue;
            }
            let child = self.project(&edge.id, visiting);
            if edge.path.is_root() {
                value = child;
            } else {
                value.write_at(&edge.path, child);
            }
        }
        visiting.remove(id);
        value
    }

    /// Checks edge symmetry across the whole snapshot.
    ///
    /// For every outbound edge `{id: C, path: P}` of node `N`, node `C` must
    /// exist and carry the inbound edge `{id: N, path: P}`, and vice versa.
    /// Returns a description of the first violation found.
    pub fn verify_references(&self) -> Result<(), String> {
        for (id, node) in &self.nodes {
            for edge in &node.outbound {
                let Some(child) = self.nodes.get(&edge.id) else {
                    return Err(format!("{id}: outbound edge {edge} targets a missing node"));
                };
                let back = NodeRef::new(id.clone(), edge.path.clone());
                if !child.inbound.contains(&back) {
                    return Err(format!(
                        "{id}: outbound edge {edge} lacks the inbound edge {back} on its target"
                    ));
                }
            }
            for edge in &node.inbound {
                let Some(parent) = self.nodes.get(&edge.id) else {
                    return Err(format!("{id}: inbound edge {edge} names a missing node"));
                };
                let forward = NodeRef::new(id.clone(), edge.path.clone());
                if !parent.outbound.contains(&forward) {
                    return Err(format!(
                        "{id}: inbound edge {edge} lacks the outbound edge {forward} on its source"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Builds a new snapshot with `working` overlaid onto this one.
    ///
    /// Nodes absent from `working` keep their `Arc` identity.
    pub(crate) fn overlay(&self, working: BTreeMap<NodeId, NodeSnapshot>) -> Snapshot {
        let mut nodes = self.nodes.clone();
        for (id, node) in working {
            nodes.insert(id, Arc::new(node));
        }
        Snapshot { nodes }
    }
}
