//! Resolved query model.
//!
//! A query is a selection tree rooted at a node id. Parsing and validation of
//! any surface syntax happen upstream; this module models the already-parsed
//! shape: fields, nested selections, and argument expressions whose variable
//! references are bound at write time against the caller's variable map.
//!
//! # References
//! - Selection sets and arguments: GraphQL specification, "Language"
//!   section (October 2021)

use crate::core::NodeId;
use crate::editor::WriteError;
use crate::fingerprint::FieldArguments;
use crate::value::GraphValue;
use std::collections::{BTreeMap, BTreeSet};

/// An argument expression: a literal value or a variable reference.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// A literal value, used as-is.
    Literal(GraphValue),
    /// A variable reference, resolved against the write-time variable map.
    /// When the variable is unbound the default is substituted; a missing
    /// default makes resolution fail.
    Variable {
        /// Variable name without any sigil.
        name: String,
        /// Declared default, substituted when the variable is unbound.
        default: Option<GraphValue>,
    },
}

impl ArgValue {
    /// A literal argument.
    pub fn literal(value: impl Into<GraphValue>) -> Self {
        ArgValue::Literal(value.into())
    }

    /// A variable reference without a default.
    pub fn variable(name: impl Into<String>) -> Self {
        ArgValue::Variable {
            name: name.into(),
            default: None,
        }
    }

    /// A variable reference with a declared default.
    pub fn variable_with_default(name: impl Into<String>, default: impl Into<GraphValue>) -> Self {
        ArgValue::Variable {
            name: name.into(),
            default: Some(default.into()),
        }
    }
}

/// The arguments declared on a field selection.
///
/// Declared-but-unsupplied optional arguments materialize as `Null` during
/// resolution, so two queries that differ only in spelling out an optional
/// `null` produce identical parameterized ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentSet {
    entries: BTreeMap<String, ArgValue>,
    optional: BTreeSet<String>,
}

impl ArgumentSet {
    /// Creates an empty argument set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an argument (builder style).
    pub fn with(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.entries.insert(name.into(), value);
        self
    }

    /// Declares an optional argument that materializes as null when absent.
    pub fn with_optional(mut self, name: impl Into<String>) -> Self {
        self.optional.insert(name.into());
        self
    }

    /// Returns `true` if no arguments are declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.optional.is_empty()
    }

    /// Resolves every argument against `variables`.
    ///
    /// Literals pass through, variable references look up their binding or
    /// fall back to their default, and declared optionals absent from the set
    /// become `Null`. Fails with [`WriteError::UnresolvedVariable`] when a
    /// reference has neither binding nor default.
    pub fn resolve(
        &self,
        variables: &BTreeMap<String, GraphValue>,
    ) -> Result<FieldArguments, WriteError> {
        let mut out = FieldArguments::new();
        for (name, arg) in &self.entries {
            let value = match arg {
                ArgValue::Literal(value) => value.clone(),
                ArgValue::Variable { name: var, default } => match variables.get(var) {
                    Some(bound) => bound.clone(),
                    None => default.clone().ok_or_else(|| WriteError::UnresolvedVariable {
                        name: var.clone(),
                    })?,
                },
            };
            out.insert(name.clone(), value);
        }
        for name in &self.optional {
            out.entry(name.clone()).or_insert(GraphValue::Null);
        }
        Ok(out)
    }
}

/// One field of a selection set.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSelection {
    /// Field name; also the key looked up in the payload.
    pub name: String,
    /// Arguments, when the field is parameterized. `Some` with an empty set
    /// still materializes a parameterized node (an argument list was written,
    /// even if every argument is optional).
    pub arguments: Option<ArgumentSet>,
    /// Nested selection, or `None` for a leaf field.
    pub children: Option<SelectionSet>,
}

impl FieldSelection {
    /// A leaf field without arguments.
    pub fn leaf(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: None,
            children: None,
        }
    }

    /// A field with a nested selection.
    pub fn object(name: impl Into<String>, children: SelectionSet) -> Self {
        Self {
            name: name.into(),
            arguments: None,
            children: Some(children),
        }
    }

    /// Attaches arguments (builder style).
    pub fn with_arguments(mut self, arguments: ArgumentSet) -> Self {
        self.arguments = Some(arguments);
        self
    }

    /// Returns `true` for fields without a nested selection.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }
}

/// An ordered list of field selections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionSet {
    /// Fields in declaration order; the walker visits them in this order.
    pub fields: Vec<FieldSelection>,
}

impl SelectionSet {
    /// Creates a selection set from its fields.
    pub fn new(fields: Vec<FieldSelection>) -> Self {
        Self { fields }
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSelection> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns `true` if a field with this name is selected.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Validates the selection shape.
    ///
    /// Rejects empty selection sets and duplicate field names; both indicate
    /// a malformed resolved query rather than a payload problem.
    pub fn validate(&self) -> Result<(), WriteError> {
        if self.fields.is_empty() {
            return Err(WriteError::InvalidSelection {
                reason: "empty selection set".to_owned(),
            });
        }
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(WriteError::InvalidSelection {
                    reason: format!("duplicate field `{}` in selection set", field.name),
                });
            }
            if let Some(children) = &field.children {
                children.validate()?;
            }
        }
        Ok(())
    }
}

/// A resolved query: a selection tree rooted at a node id.
///
/// Queries with the same shape and arguments produce identical node ids
/// across writes; nothing about a `Query` is write-specific except the
/// variable bindings supplied alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Root node the selection applies to.
    pub root: NodeId,
    /// Top-level selection set.
    pub selection: SelectionSet,
}

impl Query {
    /// A query rooted at the static query root.
    pub fn new(selection: SelectionSet) -> Self {
        Self {
            root: NodeId::query_root(),
            selection,
        }
    }

    /// A query rooted at an explicit node.
    pub fn with_root(root: NodeId, selection: SelectionSet) -> Self {
        Self { root, selection }
    }
}
