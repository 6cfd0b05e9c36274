//! # Entity Model
//!
//! Items and Relations as polymorphic nodes, the creation specifications
//! that bind initial statements atomically with creation, and the
//! capability tables that carry callable behavior along taxonomy edges.
//!
//! An entity record holds identity only; everything else about an entity
//! (label, description, taxonomy membership) lives in the statement store.
//! Capabilities are kept in side tables keyed by entity URI because they
//! hold function pointers and are deliberately not part of the serializable
//! graph data.

use crate::graph::KnowledgeGraph;
use crate::types::{EntityKind, Literal, NoemaError, ObjectValue, Uri};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// ENTITY RECORD
// =============================================================================

/// An Item or Relation node.
///
/// The record is pure identity data. Whether an Item acts as a class, an
/// instance, or both is not encoded here; it follows from its R3/R4
/// statements, and nothing in the engine forbids both roles at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// The type-tagged short key, unique within the namespace.
    pub short_key: String,
    /// The full identity: namespace base URI + short key.
    pub uri: Uri,
    /// The base URI of the owning namespace.
    pub namespace: Uri,
    /// Item or Relation.
    pub kind: EntityKind,
    /// True for entities minted by the engine (`Ia…`/`Ra…` keys).
    pub auto_generated: bool,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} {}>", self.kind, self.uri)
    }
}

// =============================================================================
// CAPABILITIES
// =============================================================================

/// The hook name under which an entity's custom-call behavior is stored.
///
/// Calling an entity dispatches to the capability registered under this
/// name; entities without it are not callable.
pub const CUSTOM_CALL_HOOK: &str = "custom_call";

/// A capability function: callable behavior attached to an entity.
///
/// The function receives the graph, the URI of the entity it is invoked on,
/// and the call arguments.
pub type CapabilityFn =
    Arc<dyn Fn(&mut KnowledgeGraph, &Uri, &[ObjectValue]) -> Result<ObjectValue, NoemaError> + Send + Sync>;

/// A named capability.
#[derive(Clone)]
pub struct Capability {
    name: String,
    func: CapabilityFn,
}

impl Capability {
    /// Create a capability from a name and a function.
    pub fn new(name: impl Into<String>, func: CapabilityFn) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }

    /// The name this capability is registered under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the capability.
    pub fn invoke(
        &self,
        graph: &mut KnowledgeGraph,
        entity: &Uri,
        args: &[ObjectValue],
    ) -> Result<ObjectValue, NoemaError> {
        (self.func)(graph, entity, args)
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .finish()
    }
}

/// Precedence rule for capabilities inherited from multiple parents under
/// the same hook name.
///
/// Parents are processed in declaration order; the policy decides whether a
/// later parent's capability replaces an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CapabilityPolicy {
    /// A later capability under an occupied name replaces the earlier one.
    #[default]
    LastWins,
    /// The first capability registered under a name is kept.
    FirstWins,
}

/// The capability set of one entity, keyed by hook name.
///
/// Tables are snapshots: an entity's table is populated once, at creation,
/// by copying its parents' tables. Later changes to a parent do not reach
/// existing children.
#[derive(Debug, Clone, Default)]
pub struct CapabilityTable {
    entries: BTreeMap<String, Capability>,
}

impl CapabilityTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a capability under its name according to `policy`.
    pub fn insert(&mut self, capability: Capability, policy: CapabilityPolicy) {
        match policy {
            CapabilityPolicy::LastWins => {
                self.entries.insert(capability.name.clone(), capability);
            }
            CapabilityPolicy::FirstWins => {
                self.entries
                    .entry(capability.name.clone())
                    .or_insert(capability);
            }
        }
    }

    /// Look up a capability by hook name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    /// Copy every entry of `parent` into this table according to `policy`.
    pub fn absorb(&mut self, parent: &Self, policy: CapabilityPolicy) {
        for capability in parent.entries.values() {
            self.insert(capability.clone(), policy);
        }
    }

    /// Hook names present in this table, in deterministic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of capabilities in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the table holds no capabilities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// CREATION SPECIFICATIONS
// =============================================================================

/// The object side of an initial binding: either a key reference (resolved
/// at creation time) or an already-concrete value.
#[derive(Debug, Clone)]
pub enum BindingObject {
    /// An entity reference in any of the supported key notations, or a full
    /// URI (recognized by the `#` separator).
    Key(String),
    /// A resolved object value.
    Value(ObjectValue),
}

impl BindingObject {
    /// Reference an entity by key string.
    #[must_use]
    pub fn key(k: impl Into<String>) -> Self {
        Self::Key(k.into())
    }
}

impl From<ObjectValue> for BindingObject {
    fn from(v: ObjectValue) -> Self {
        Self::Value(v)
    }
}

impl From<Literal> for BindingObject {
    fn from(l: Literal) -> Self {
        Self::Value(ObjectValue::Literal(l))
    }
}

impl From<Uri> for BindingObject {
    fn from(u: Uri) -> Self {
        Self::Value(ObjectValue::Entity(u))
    }
}

impl From<i64> for BindingObject {
    fn from(i: i64) -> Self {
        Literal::Int(i).into()
    }
}

impl From<bool> for BindingObject {
    fn from(b: bool) -> Self {
        Literal::Bool(b).into()
    }
}

/// Configuration for `create_item`: relation-valued initial bindings that
/// are written as statements atomically with the creation.
///
/// Label and description map to R1/R2, taxonomy membership to R3/R4; any
/// further relation can be bound through [`ItemSpec::related`]. Bindings are
/// applied in declaration order after the identity is registered.
#[derive(Debug, Clone, Default)]
pub struct ItemSpec {
    pub(crate) label: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) subclass_of: Vec<String>,
    pub(crate) instance_of: Vec<String>,
    pub(crate) bindings: Vec<(String, BindingObject)>,
}

impl ItemSpec {
    /// Start an empty specification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the R1 label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bind the R2 description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add an R3 subclass-of edge. May be given more than once; parents are
    /// processed in declaration order for capability inheritance.
    #[must_use]
    pub fn subclass_of(mut self, class_key: impl Into<String>) -> Self {
        self.subclass_of.push(class_key.into());
        self
    }

    /// Add an R4 instance-of edge. May be given more than once.
    #[must_use]
    pub fn instance_of(mut self, class_key: impl Into<String>) -> Self {
        self.instance_of.push(class_key.into());
        self
    }

    /// Bind an arbitrary relation to an object or literal.
    #[must_use]
    pub fn related(mut self, relation_key: impl Into<String>, object: impl Into<BindingObject>) -> Self {
        self.bindings.push((relation_key.into(), object.into()));
        self
    }
}

/// Configuration for `create_relation`.
///
/// Like [`ItemSpec`], plus the functional flag (R22): a functional relation
/// admits at most one statement per subject.
#[derive(Debug, Clone, Default)]
pub struct RelationSpec {
    pub(crate) label: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) functional: bool,
    pub(crate) bindings: Vec<(String, BindingObject)>,
}

impl RelationSpec {
    /// Start an empty specification.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the R1 label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bind the R2 description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the relation functional (writes R22 = true).
    #[must_use]
    pub fn functional(mut self) -> Self {
        self.functional = true;
        self
    }

    /// Bind an arbitrary relation to an object or literal.
    #[must_use]
    pub fn related(mut self, relation_key: impl Into<String>, object: impl Into<BindingObject>) -> Self {
        self.bindings.push((relation_key.into(), object.into()));
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
