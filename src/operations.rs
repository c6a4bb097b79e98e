//! The write operation and its context.
//!
//! This is the crate's single entry point: merge a JSON payload, described by
//! a resolved query, into a base snapshot and obtain a new snapshot plus the
//! set of node ids whose identity changed. The context supplies everything
//! write-specific that is not part of the query itself: variable bindings,
//! the entity-id policy, and a diagnostic slot recorded on success for
//! external layers to inspect.
//!
//! # Citations
//! - Cache invalidation: [Two Hard Things in Computer Science, Phil Karlton]
//! - Minimal change propagation: [Self-Adjusting Computation, POPL 2009]

use crate::core::{NodeId, Path};
use crate::editor::{SnapshotEditor, WriteError, WriteResult};
use crate::query::{Query, SelectionSet};
use crate::snapshot::Snapshot;
use crate::value::GraphValue;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use tracing::debug;

/// Resolves a payload object's stable identity, if it has one.
///
/// Called for every object payload under a selection with children. Returning
/// `None` makes the object inline (or, when the position already references a
/// node, a merge into that node).
pub trait EntityResolver {
    /// Returns the entity id for `object` under `selection`, or `None` when
    /// the object carries no usable identity.
    fn entity_id(
        &self,
        selection: &SelectionSet,
        object: &JsonMap<String, JsonValue>,
    ) -> Option<NodeId>;
}

/// Default identity policy: an object is an entity when the selection selects
/// the key field and the payload supplies a string or number for it.
///
/// Numbers stringify through their canonical JSON form, so the entity written
/// for `{"id": 1}` is node `"1"`.
#[derive(Debug, Clone)]
pub struct KeyFieldResolver {
    /// Name of the id-bearing field; `"id"` by default.
    pub key_field: String,
}

impl KeyFieldResolver {
    /// A resolver keyed on `"id"`.
    pub fn new() -> Self {
        Self {
            key_field: "id".to_owned(),
        }
    }

    /// A resolver keyed on a custom field name.
    pub fn with_key_field(key_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
        }
    }
}

impl Default for KeyFieldResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityResolver for KeyFieldResolver {
    fn entity_id(
        &self,
        selection: &SelectionSet,
        object: &JsonMap<String, JsonValue>,
    ) -> Option<NodeId> {
        if !selection.has_field(&self.key_field) {
            return None;
        }
        match object.get(&self.key_field)? {
            JsonValue::String(id) => Some(NodeId::new(id.clone())),
            JsonValue::Number(id) => Some(NodeId::new(id.to_string())),
            _ => None,
        }
    }
}

/// Diagnostic record of the last successful write.
///
/// Written by [`write`] on success, never read by the write path itself;
/// external layers (observer dispatch, devtools) consume it.
#[derive(Debug)]
pub struct PreviousWrite {
    /// Value each edited node held in the base snapshot, `None` for nodes
    /// the write created.
    pub old_values: BTreeMap<NodeId, Option<GraphValue>>,
    /// Value each edited node holds in the committed snapshot.
    pub new_values: BTreeMap<NodeId, Option<GraphValue>>,
    /// The payload as supplied.
    pub payload: JsonValue,
    /// The query the payload was written under.
    pub query: Query,
}

/// Carrier for everything write-specific outside the query and payload.
pub struct WriteContext {
    /// Variable bindings for argument resolution.
    pub variables: BTreeMap<String, GraphValue>,
    /// Entity-id policy.
    pub resolver: Box<dyn EntityResolver>,
    /// Diagnostic slot, overwritten by each successful write.
    pub previous_write: Option<PreviousWrite>,
}

impl WriteContext {
    /// A context with no variables and the default [`KeyFieldResolver`].
    pub fn new() -> Self {
        Self {
            variables: BTreeMap::new(),
            resolver: Box::new(KeyFieldResolver::new()),
            previous_write: None,
        }
    }

    /// Binds a variable (builder style).
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Replaces the entity resolver (builder style).
    pub fn with_resolver(mut self, resolver: impl EntityResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }
}

impl Default for WriteContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges `payload`, described by `query`, into `base`.
///
/// Returns the new immutable snapshot together with the edited-id set; `base`
/// is never mutated. The write is atomic: on error nothing is published and
/// the context's diagnostic slot is left untouched. Writing the same payload
/// twice in a row yields an empty edited set the second time.
pub fn write(
    ctx: &mut WriteContext,
    base: &Snapshot,
    query: &Query,
    payload: &JsonValue,
) -> Result<WriteResult, WriteError> {
    query.selection.validate()?;
    let fields = payload.as_object().ok_or(WriteError::MalformedPayload {
        path: Path::root(),
        reason: "top-level payload must be an object",
    })?;
    debug!(root = %query.root, fields = fields.len(), "merging payload");

    let mut editor = SnapshotEditor::new(base);
    editor.merge_payload(ctx, query, fields)?;
    let result = editor.commit();
    debug!(
        edited = result.edited_node_ids.len(),
        nodes = result.snapshot.len(),
        "write committed"
    );

    let mut old_values = BTreeMap::new();
    let mut new_values = BTreeMap::new();
    for id in &result.edited_node_ids {
        old_values.insert(
            id.clone(),
            base.get_node_snapshot(id).map(|node| node.value.clone()),
        );
        new_values.insert(
            id.clone(),
            result
                .snapshot
                .get_node_snapshot(id)
                .map(|node| node.value.clone()),
        );
    }
    ctx.previous_write = Some(PreviousWrite {
        old_values,
        new_values,
        payload: payload.clone(),
        query: query.clone(),
    });

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NodeKind, NodeRef, PathStep};
    use crate::fingerprint::{parameterized_id, FieldArguments};
    use crate::query::{ArgValue, ArgumentSet, FieldSelection};
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn path(steps: Vec<PathStep>) -> Path {
        Path::new(steps)
    }

    fn args(pairs: &[(&str, JsonValue)]) -> FieldArguments {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), GraphValue::from(value)))
            .collect()
    }

    fn edited(result: &WriteResult) -> BTreeSet<&str> {
        result
            .edited_node_ids
            .iter()
            .map(NodeId::as_str)
            .collect()
    }

    /// `foo(id: $id, withExtra: true) { ... }` with the given leaves.
    fn foo_query(leaves: &[&str]) -> Query {
        Query::new(SelectionSet::new(vec![FieldSelection::object(
            "foo",
            SelectionSet::new(leaves.iter().map(|name| FieldSelection::leaf(*name)).collect()),
        )
        .with_arguments(
            ArgumentSet::new()
                .with("id", ArgValue::variable("id"))
                .with("withExtra", ArgValue::literal(true)),
        )]))
    }

    fn foo_param_id() -> NodeId {
        parameterized_id(
            &NodeId::query_root(),
            &path(vec!["foo".into()]),
            &args(&[("id", json!(1)), ("withExtra", json!(true))]),
        )
    }

    fn ctx_with_id_1() -> WriteContext {
        WriteContext::new().bind("id", json!(1))
    }

    #[test]
    fn new_parameterized_top_level_field() {
        let query = foo_query(&["name", "extra"]);
        let mut ctx = ctx_with_id_1();
        let result = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"foo": {"name": "Foo", "extra": false}}),
        )
        .expect("write succeeds");

        let param = foo_param_id();
        let node = result
            .snapshot
            .get_node_snapshot(&param)
            .expect("parameterized node exists");
        assert_eq!(node.kind, NodeKind::Parameterized);
        assert_eq!(node.value, json!({"name": "Foo", "extra": false}));

        let root = result
            .snapshot
            .get_node_snapshot(&NodeId::query_root())
            .expect("root exists");
        assert_eq!(
            root.outbound.iter().collect::<Vec<_>>(),
            vec![&NodeRef::new(param.clone(), path(vec!["foo".into()]))]
        );
        // The container never exposes the parameterized field in its value.
        assert!(root.value.at(&path(vec!["foo".into()])).is_none());
        assert_eq!(edited(&result), BTreeSet::from([param.as_str(), "QueryRoot"]));
        result.snapshot.verify_references().expect("symmetric");
    }

    #[test]
    fn nested_parameterized_field_with_direct_entity_reference() {
        let query = foo_query(&["id", "name", "extra"]);
        let mut ctx = ctx_with_id_1();
        let result = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"foo": {"id": 1, "name": "Foo", "extra": false}}),
        )
        .expect("write succeeds");

        let param = foo_param_id();
        let entity = result
            .snapshot
            .get_node_snapshot(&NodeId::new("1"))
            .expect("entity exists");
        assert_eq!(entity.kind, NodeKind::Entity);
        assert_eq!(entity.value, json!({"id": 1, "name": "Foo", "extra": false}));

        let node = result
            .snapshot
            .get_node_snapshot(&param)
            .expect("parameterized node exists");
        assert!(node.value.is_hole());
        assert_eq!(
            node.outbound.iter().collect::<Vec<_>>(),
            vec![&NodeRef::new(NodeId::new("1"), Path::root())]
        );

        let root = result
            .snapshot
            .get_node_snapshot(&NodeId::query_root())
            .expect("root exists");
        assert_eq!(
            root.outbound.iter().collect::<Vec<_>>(),
            vec![&NodeRef::new(param.clone(), path(vec!["foo".into()]))]
        );
        assert!(result.edited_node_ids.contains(&param));
        assert!(result.edited_node_ids.contains(&NodeId::new("1")));
        result.snapshot.verify_references().expect("symmetric");
    }

    #[test]
    fn update_of_direct_reference_entity_edits_only_the_entity() {
        let query = foo_query(&["id", "name", "extra"]);
        let mut ctx = ctx_with_id_1();
        let first = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"foo": {"id": 1, "name": "Foo", "extra": false}}),
        )
        .expect("first write succeeds");

        let second = write(
            &mut ctx,
            &first.snapshot,
            &query,
            &json!({"foo": {"id": 1, "name": "Foo Bar"}}),
        )
        .expect("second write succeeds");

        // Merge: the missing `extra` field is retained.
        let entity = second
            .snapshot
            .get_node_snapshot(&NodeId::new("1"))
            .expect("entity exists");
        assert_eq!(entity.value, json!({"id": 1, "name": "Foo Bar", "extra": false}));

        let param = foo_param_id();
        assert!(Arc::ptr_eq(
            first.snapshot.get_node_snapshot(&param).expect("exists"),
            second.snapshot.get_node_snapshot(&param).expect("exists"),
        ));
        assert_eq!(edited(&second), BTreeSet::from(["1"]));
    }

    /// `one { two(id: $id) { three { four(extra: true) { five } } } }`
    fn deep_parameterized_query() -> Query {
        Query::new(SelectionSet::new(vec![FieldSelection::object(
            "one",
            SelectionSet::new(vec![FieldSelection::object(
                "two",
                SelectionSet::new(vec![FieldSelection::object(
                    "three",
                    SelectionSet::new(vec![FieldSelection::object(
                        "four",
                        SelectionSet::new(vec![FieldSelection::leaf("five")]),
                    )
                    .with_arguments(
                        ArgumentSet::new().with("extra", ArgValue::literal(true)),
                    )]),
                )]),
            )
            .with_arguments(ArgumentSet::new().with("id", ArgValue::variable("id")))]),
        )]))
    }

    #[test]
    fn parameterized_fields_inside_arrays() {
        let query = deep_parameterized_query();
        let mut ctx = ctx_with_id_1();
        let result = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"one": {"two": [
                {"three": {"four": {"five": 1}}},
                {"three": {"four": {"five": 2}}},
            ]}}),
        )
        .expect("write succeeds");

        let container = parameterized_id(
            &NodeId::query_root(),
            &path(vec!["one".into(), "two".into()]),
            &args(&[("id", json!(1))]),
        );
        let extra = args(&[("extra", json!(true))]);
        let entry0 = parameterized_id(
            &container,
            &path(vec![0usize.into(), "three".into(), "four".into()]),
            &extra,
        );
        let entry1 = parameterized_id(
            &container,
            &path(vec![1usize.into(), "three".into(), "four".into()]),
            &extra,
        );

        let node = result
            .snapshot
            .get_node_snapshot(&container)
            .expect("container exists");
        assert_eq!(
            node.value,
            GraphValue::Array(vec![GraphValue::Hole, GraphValue::Hole])
        );
        assert!(node.outbound.contains(&NodeRef::new(
            entry0.clone(),
            path(vec![0usize.into(), "three".into(), "four".into()]),
        )));
        assert!(node.outbound.contains(&NodeRef::new(
            entry1.clone(),
            path(vec![1usize.into(), "three".into(), "four".into()]),
        )));
        assert_eq!(
            result.snapshot.get_node_snapshot(&entry0).expect("exists").value,
            json!({"five": 1})
        );
        assert_eq!(
            result.snapshot.get_node_snapshot(&entry1).expect("exists").value,
            json!({"five": 2})
        );
        result.snapshot.verify_references().expect("symmetric");

        // Writing null over index 0 hollows out its subtree and drops its
        // parameterized entry, while index 1 is untouched.
        let second = write(
            &mut ctx,
            &result.snapshot,
            &query,
            &json!({"one": {"two": [null, {"three": {"four": {"five": 2}}}]}}),
        )
        .expect("second write succeeds");
        let node = second
            .snapshot
            .get_node_snapshot(&container)
            .expect("container exists");
        assert_eq!(
            node.value,
            GraphValue::Array(vec![GraphValue::Null, GraphValue::Hole])
        );
        assert!(node.outbound_at(&path(vec![0usize.into(), "three".into(), "four".into()])).is_none());
        assert!(node.outbound_at(&path(vec![1usize.into(), "three".into(), "four".into()])).is_some());
        assert!(second.edited_node_ids.contains(&container));
        assert!(second.edited_node_ids.contains(&entry0));
        assert!(!second.edited_node_ids.contains(&entry1));
        second.snapshot.verify_references().expect("symmetric");
    }

    #[test]
    fn indirect_update_via_another_query() {
        let foo = foo_query(&["id", "name", "extra"]);
        let mut ctx = ctx_with_id_1();
        let first = write(
            &mut ctx,
            &Snapshot::new(),
            &foo,
            &json!({"foo": {"id": 1, "name": "Foo", "extra": false}}),
        )
        .expect("first write succeeds");

        let viewer = Query::new(SelectionSet::new(vec![FieldSelection::object(
            "viewer",
            SelectionSet::new(vec![
                FieldSelection::leaf("id"),
                FieldSelection::leaf("name"),
            ]),
        )]));
        let second = write(
            &mut ctx,
            &first.snapshot,
            &viewer,
            &json!({"viewer": {"id": 1, "name": "Foo Bar"}}),
        )
        .expect("second write succeeds");

        let root = second
            .snapshot
            .get_node_snapshot(&NodeId::query_root())
            .expect("root exists");
        assert!(root
            .outbound
            .contains(&NodeRef::new(NodeId::new("1"), path(vec!["viewer".into()]))));

        // The parameterized node is identity-unchanged but projects the
        // updated entity.
        let param = foo_param_id();
        assert!(Arc::ptr_eq(
            first.snapshot.get_node_snapshot(&param).expect("exists"),
            second.snapshot.get_node_snapshot(&param).expect("exists"),
        ));
        assert_eq!(
            second.snapshot.get(&param),
            second.snapshot.get(&NodeId::new("1"))
        );
        assert_eq!(
            second.snapshot.get(&param).expect("projects"),
            json!({"id": 1, "name": "Foo Bar", "extra": false})
        );
        assert_eq!(edited(&second), BTreeSet::from(["QueryRoot", "1"]));
        second.snapshot.verify_references().expect("symmetric");
    }

    #[test]
    fn entity_array_merges_by_prior_references() {
        let query = Query::new(SelectionSet::new(vec![FieldSelection::object(
            "foo",
            SelectionSet::new(vec![
                FieldSelection::leaf("id"),
                FieldSelection::leaf("name"),
                FieldSelection::leaf("extra"),
            ]),
        )
        .with_arguments(ArgumentSet::new().with("id", ArgValue::variable("id")))]));
        let mut ctx = ctx_with_id_1();

        let first = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"foo": [
                {"id": 1, "name": "one", "extra": false},
                {"id": 2, "name": "two", "extra": true},
                {"id": 3, "name": "three", "extra": false},
            ]}),
        )
        .expect("first write succeeds");

        // Elements without ids merge into the nodes their positions already
        // reference.
        let second = write(
            &mut ctx,
            &first.snapshot,
            &query,
            &json!({"foo": [
                {"extra": true},
                {"extra": false},
                {"extra": true},
            ]}),
        )
        .expect("second write succeeds");

        for (id, name, extra) in [("1", "one", true), ("2", "two", false), ("3", "three", true)] {
            let entity = second
                .snapshot
                .get_node_snapshot(&NodeId::new(id))
                .expect("entity exists");
            assert_eq!(entity.value, json!({"id": id.parse::<i64>().expect("id"), "name": name, "extra": extra}));
        }
        assert_eq!(edited(&second), BTreeSet::from(["1", "2", "3"]));

        // The container still projects the three merged objects in order.
        let container = parameterized_id(
            &NodeId::query_root(),
            &path(vec!["foo".into()]),
            &args(&[("id", json!(1))]),
        );
        assert_eq!(
            second.snapshot.get(&container).expect("projects"),
            json!([
                {"id": 1, "name": "one", "extra": true},
                {"id": 2, "name": "two", "extra": false},
                {"id": 3, "name": "three", "extra": true},
            ])
        );
        second.snapshot.verify_references().expect("symmetric");
    }

    #[test]
    fn repeated_write_is_identity_preserving_and_edits_nothing() {
        let query = foo_query(&["id", "name", "extra"]);
        let payload = json!({"foo": {"id": 1, "name": "Foo", "extra": false}});
        let mut ctx = ctx_with_id_1();

        let first = write(&mut ctx, &Snapshot::new(), &query, &payload).expect("first write");
        let second = write(&mut ctx, &first.snapshot, &query, &payload).expect("second write");

        assert!(second.edited_node_ids.is_empty());
        for id in first.snapshot.node_ids() {
            assert!(Arc::ptr_eq(
                first.snapshot.get_node_snapshot(id).expect("exists"),
                second.snapshot.get_node_snapshot(id).expect("exists"),
            ));
        }
    }

    #[test]
    fn writes_are_deterministic_across_runs() {
        let query = foo_query(&["id", "name", "extra"]);
        let payload = json!({"foo": {"id": 1, "name": "Foo", "extra": false}});

        let run = || {
            let mut ctx = ctx_with_id_1();
            write(&mut ctx, &Snapshot::new(), &query, &payload).expect("write succeeds")
        };
        let a = run();
        let b = run();
        assert_eq!(a.edited_node_ids, b.edited_node_ids);
        let ids_a: Vec<_> = a.snapshot.node_ids().collect();
        let ids_b: Vec<_> = b.snapshot.node_ids().collect();
        assert_eq!(ids_a, ids_b);
        for id in a.snapshot.node_ids() {
            assert_eq!(
                **a.snapshot.get_node_snapshot(id).expect("exists"),
                **b.snapshot.get_node_snapshot(id).expect("exists"),
            );
        }
    }

    #[test]
    fn untouched_nodes_share_identity_with_the_base() {
        let foo = foo_query(&["id", "name", "extra"]);
        let mut ctx = ctx_with_id_1();
        let first = write(
            &mut ctx,
            &Snapshot::new(),
            &foo,
            &json!({"foo": {"id": 1, "name": "Foo", "extra": false}}),
        )
        .expect("first write");

        let bar = Query::new(SelectionSet::new(vec![FieldSelection::object(
            "bar",
            SelectionSet::new(vec![FieldSelection::leaf("id"), FieldSelection::leaf("v")]),
        )]));
        let second = write(
            &mut ctx,
            &first.snapshot,
            &bar,
            &json!({"bar": {"id": 9, "v": 1}}),
        )
        .expect("second write");

        for id in first.snapshot.node_ids() {
            if second.edited_node_ids.contains(id) {
                continue;
            }
            assert!(Arc::ptr_eq(
                first.snapshot.get_node_snapshot(id).expect("exists"),
                second.snapshot.get_node_snapshot(id).expect("exists"),
            ));
        }
    }

    #[test]
    fn malformed_payloads_fail_atomically() {
        let query = foo_query(&["name"]);
        let mut ctx = ctx_with_id_1();

        let err = write(&mut ctx, &Snapshot::new(), &query, &json!([1, 2]))
            .expect_err("array at the top level is malformed");
        assert!(matches!(err, WriteError::MalformedPayload { .. }));

        let err = write(&mut ctx, &Snapshot::new(), &query, &json!({"foo": 42}))
            .expect_err("scalar where the selection expects an object");
        assert!(matches!(err, WriteError::MalformedPayload { .. }));

        // Failures record nothing.
        assert!(ctx.previous_write.is_none());
    }

    #[test]
    fn leaf_object_payload_is_malformed() {
        let query = Query::new(SelectionSet::new(vec![FieldSelection::leaf("name")]));
        let mut ctx = WriteContext::new();
        let err = write(&mut ctx, &Snapshot::new(), &query, &json!({"name": {"x": 1}}))
            .expect_err("object for a leaf field is malformed");
        assert!(matches!(err, WriteError::MalformedPayload { .. }));
    }

    #[test]
    fn shorter_arrays_drop_truncated_references() {
        let query = Query::new(SelectionSet::new(vec![FieldSelection::object(
            "items",
            SelectionSet::new(vec![FieldSelection::leaf("id"), FieldSelection::leaf("v")]),
        )]));
        let mut ctx = WriteContext::new();
        let first = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"items": [{"id": "a", "v": 1}, {"id": "b", "v": 2}, {"id": "c", "v": 3}]}),
        )
        .expect("first write");

        let second = write(
            &mut ctx,
            &first.snapshot,
            &query,
            &json!({"items": [{"id": "a", "v": 1}]}),
        )
        .expect("second write");

        let root = second
            .snapshot
            .get_node_snapshot(&NodeId::query_root())
            .expect("root exists");
        let under_items_path = path(vec!["items".into()]);
        let under_items: Vec<_> = root.outbound_under(&under_items_path).collect();
        assert_eq!(
            under_items,
            vec![&NodeRef::new(NodeId::new("a"), path(vec!["items".into(), 0usize.into()]))]
        );
        // Orphaned entities stay in the snapshot; eviction is external.
        assert!(second.snapshot.contains(&NodeId::new("b")));
        assert!(second.snapshot.contains(&NodeId::new("c")));
        second.snapshot.verify_references().expect("symmetric");
    }

    #[test]
    fn previous_write_records_old_and_new_values() {
        let query = foo_query(&["id", "name", "extra"]);
        let mut ctx = ctx_with_id_1();
        let payload = json!({"foo": {"id": 1, "name": "Foo", "extra": false}});
        let first = write(&mut ctx, &Snapshot::new(), &query, &payload).expect("first write");

        let updated = json!({"foo": {"id": 1, "name": "Foo Bar"}});
        write(&mut ctx, &first.snapshot, &query, &updated).expect("second write");

        let record = ctx.previous_write.as_ref().expect("recorded");
        assert_eq!(record.payload, updated);
        assert_eq!(record.query, query);
        let entity = NodeId::new("1");
        assert_eq!(
            record.old_values.get(&entity).and_then(|v| v.as_ref()),
            Some(&GraphValue::from(json!({"id": 1, "name": "Foo", "extra": false})))
        );
        assert_eq!(
            record.new_values.get(&entity).and_then(|v| v.as_ref()),
            Some(&GraphValue::from(json!({"id": 1, "name": "Foo Bar", "extra": false})))
        );
    }

    #[test]
    fn containers_never_expose_parameterized_fields() {
        let query = Query::new(SelectionSet::new(vec![
            FieldSelection::object(
                "a",
                SelectionSet::new(vec![FieldSelection::leaf("id"), FieldSelection::leaf("name")]),
            ),
            FieldSelection::object("b", SelectionSet::new(vec![FieldSelection::leaf("v")]))
                .with_arguments(ArgumentSet::new().with("x", ArgValue::literal(1i64))),
        ]));
        let mut ctx = WriteContext::new();
        let result = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"a": {"id": 7, "name": "seven"}, "b": {"v": 1}}),
        )
        .expect("write succeeds");

        // Raw record: no `b` key, edge only in outbound.
        let root = result
            .snapshot
            .get_node_snapshot(&NodeId::query_root())
            .expect("root exists");
        assert!(root.value.at(&path(vec!["b".into()])).is_none());
        // Projection: the entity field is inlined, the parameterized one is not.
        let projected = result.snapshot.get(&NodeId::query_root()).expect("projects");
        assert_eq!(projected, json!({"a": {"id": 7, "name": "seven"}}));
    }

    #[test]
    fn custom_key_field_resolver_controls_entity_identity() {
        let query = Query::new(SelectionSet::new(vec![FieldSelection::object(
            "user",
            SelectionSet::new(vec![
                FieldSelection::leaf("handle"),
                FieldSelection::leaf("name"),
            ]),
        )]));
        let mut ctx = WriteContext::new().with_resolver(KeyFieldResolver::with_key_field("handle"));
        let result = write(
            &mut ctx,
            &Snapshot::new(),
            &query,
            &json!({"user": {"handle": "ada", "name": "Ada"}}),
        )
        .expect("write succeeds");
        assert!(result.snapshot.contains(&NodeId::new("ada")));
    }
}
