//! # Statements
//!
//! Reified triples. A statement is a first-class object with its own key
//! and URI; it can be the subject of further statements, which is how
//! qualifiers ("information about information") are modeled.
//!
//! Every entity-valued statement is mirrored by a *dual* statement used for
//! object-side traversal. The dual shares the triple and is linked to its
//! primary; it is bookkeeping, created and unlinked in lockstep, and not
//! independently meaningful to callers.

use crate::types::{Literal, ObjectValue, SubjectRef, Uri};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// STATEMENT
// =============================================================================

/// Whether a statement is the primary record of a triple or the dual used
/// for object-index traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementRole {
    /// The statement as created by `set_relation`.
    Primary,
    /// The mirror entry indexed under the object.
    Dual,
}

/// A reified (subject, predicate, object) triple.
///
/// Statements are immutable once created, except that qualifiers may be
/// attached. They are never deleted in normal operation; they leave the
/// store only through statement overwrite or wholesale namespace unloading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Auto-generated short key (`S…`), unique within the namespace.
    pub short_key: String,
    /// Full identity of this statement.
    pub uri: Uri,
    /// Base URI of the namespace that was active at creation.
    pub namespace: Uri,
    /// Subject: an entity, or another statement (qualifier case).
    pub subject: SubjectRef,
    /// Predicate: always a Relation.
    pub predicate: Uri,
    /// Object: an entity or a literal.
    pub object: ObjectValue,
    /// Primary or dual.
    pub role: StatementRole,
    /// URI of the paired dual statement, if the object is an entity.
    pub dual: Option<Uri>,
    /// URIs of qualifier statements whose subject is this statement,
    /// in attachment order.
    pub qualifiers: Vec<Uri>,
    /// URI of the scope item this statement was created under, if any.
    pub scope: Option<Uri>,
}

impl Statement {
    /// True if this statement qualifies another statement.
    #[must_use]
    pub fn is_qualifier(&self) -> bool {
        self.subject.is_statement()
    }

    /// The triple as a tuple of references.
    #[must_use]
    pub fn triple(&self) -> (&SubjectRef, &Uri, &ObjectValue) {
        (&self.subject, &self.predicate, &self.object)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}, {}, {})",
            self.short_key,
            self.subject.uri(),
            self.predicate,
            self.object
        )
    }
}

// =============================================================================
// QUALIFIERS
// =============================================================================

/// Precursor to a qualifier statement: predicate and object are fixed, the
/// subject is deferred until the qualifier is attached to a host statement.
///
/// A `RawQualifier` has no standalone resolution path; it only becomes a
/// statement through `set_relation(..., qualifiers)` or
/// `attach_qualifier`, both of which supply the host subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawQualifier {
    relation: Uri,
    object: ObjectValue,
}

impl RawQualifier {
    pub(crate) fn new(relation: Uri, object: ObjectValue) -> Self {
        Self { relation, object }
    }

    /// The fixed predicate.
    #[must_use]
    pub fn relation(&self) -> &Uri {
        &self.relation
    }

    /// The fixed object.
    #[must_use]
    pub fn object(&self) -> &ObjectValue {
        &self.object
    }
}

impl fmt::Display for RawQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<RawQualifier (…) ({}) ({})>", self.relation, self.object)
    }
}

/// Factory bound to a fixed relation, producing raw qualifiers.
///
/// ```
/// use noema_core::{KnowledgeGraph, RelationSpec, ItemSpec, QualifierFactory};
///
/// let mut g = KnowledgeGraph::new().expect("builtins");
/// g.register_namespace("ex:/mod", "ex", None).expect("ns");
/// g.push_namespace("ex:/mod").expect("push");
/// let start = QualifierFactory::new(
///     g.create_relation("R10", RelationSpec::new().label("start year")).expect("rel"),
/// );
/// let employer = g.create_relation("R11", RelationSpec::new().label("has employer")).expect("rel");
/// let a = g.create_item("I20", ItemSpec::new().label("someone")).expect("item");
/// let b = g.create_item("I21", ItemSpec::new().label("somewhere")).expect("item");
/// g.set_relation_with_qualifiers(&a, &employer, b.clone().into(), vec![start.of(1964i64)])
///     .expect("stm");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifierFactory {
    relation: Uri,
}

impl QualifierFactory {
    /// Bind a factory to a relation.
    #[must_use]
    pub fn new(relation: Uri) -> Self {
        Self { relation }
    }

    /// The relation this factory is bound to.
    #[must_use]
    pub fn relation(&self) -> &Uri {
        &self.relation
    }

    /// Produce a raw qualifier with the given object value.
    #[must_use]
    pub fn of(&self, object: impl Into<ObjectValue>) -> RawQualifier {
        RawQualifier::new(self.relation.clone(), object.into())
    }

    /// Produce a boolean-valued raw qualifier; shorthand for quantification
    /// qualifiers.
    #[must_use]
    pub fn of_bool(&self, value: bool) -> RawQualifier {
        RawQualifier::new(self.relation.clone(), ObjectValue::Literal(Literal::Bool(value)))
    }
}

// =============================================================================
// TESTS
// =============================================================================
