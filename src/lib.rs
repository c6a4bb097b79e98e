//! Palimpsest: the write path of a normalized graph cache.
//!
//! This crate implements copy-on-write merging of JSON payloads into an
//! immutable graph of normalized nodes:
//! - Payloads are normalized into discrete node snapshots keyed by stable
//!   ids, with inter-node references kept in bidirectional edge indices.
//! - Fields carrying arguments materialize as parameterized value nodes with
//!   deterministic, canonically hashed ids.
//! - Every write produces a fresh immutable snapshot plus the minimal set of
//!   node ids whose identity changed; unchanged subgraphs are object-shared
//!   with the base snapshot.
//!
//! # Name
//!
//! A palimpsest is a manuscript page scraped clean and written over, the
//! earlier text still showing through. Snapshots here work the same way:
//! each write overlays fresh nodes onto the old snapshot, and everything not
//! overwritten shows through untouched.
//!
//! # Example
//!
//! ```
//! use palimpsest::prelude::*;
//! use serde_json::json;
//!
//! let query = Query::new(SelectionSet::new(vec![FieldSelection::object(
//!     "viewer",
//!     SelectionSet::new(vec![
//!         FieldSelection::leaf("id"),
//!         FieldSelection::leaf("name"),
//!     ]),
//! )]));
//!
//! let mut ctx = WriteContext::new();
//! let result = write(
//!     &mut ctx,
//!     &Snapshot::new(),
//!     &query,
//!     &json!({"viewer": {"id": 1, "name": "Ada"}}),
//! )
//! .expect("write succeeds");
//!
//! // The payload object carried an id, so it was normalized into its own node.
//! assert!(result.edited_node_ids.contains(&NodeId::new("1")));
//! assert_eq!(
//!     result.snapshot.get(&NodeId::new("1")).expect("entity projects"),
//!     json!({"id": 1, "name": "Ada"}),
//! );
//! ```

pub mod core;
pub mod editor;
pub mod fingerprint;
pub mod operations;
pub mod query;
pub mod snapshot;
pub mod value;
pub mod walker;

pub use crate::core::{NodeId, NodeKind, NodeRef, NodeSnapshot, Path, PathStep, QUERY_ROOT};
pub use crate::editor::{SnapshotEditor, WriteError, WriteResult};
pub use crate::fingerprint::{parameterized_id, Canonicalizable, FieldArguments, HashValue};
pub use crate::operations::{
    write, EntityResolver, KeyFieldResolver, PreviousWrite, WriteContext,
};
pub use crate::query::{ArgValue, ArgumentSet, FieldSelection, Query, SelectionSet};
pub use crate::snapshot::Snapshot;
pub use crate::value::GraphValue;

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::core::{NodeId, NodeKind, NodeRef, NodeSnapshot, Path, PathStep};
    pub use crate::editor::{SnapshotEditor, WriteError, WriteResult};
    pub use crate::fingerprint::{parameterized_id, FieldArguments, HashValue};
    pub use crate::operations::{
        write, EntityResolver, KeyFieldResolver, PreviousWrite, WriteContext,
    };
    pub use crate::query::{ArgValue, ArgumentSet, FieldSelection, Query, SelectionSet};
    pub use crate::snapshot::Snapshot;
    pub use crate::value::GraphValue;
}
