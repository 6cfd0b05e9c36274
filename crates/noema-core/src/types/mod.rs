//! # Core Type Definitions
//!
//! This module contains all core types for the Noema deterministic
//! knowledge-graph engine:
//! - Identity types (`Uri`, `EntityKind`)
//! - Literal values (`Literal`, `LangTag`)
//! - Triple positions (`SubjectRef`, `ObjectValue`)
//! - Error types (`NoemaError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where they are used as `BTreeMap`/`BTreeSet` keys
//! - Avoid floating-point arithmetic (float *values* are stored, never
//!   computed with; equality is bitwise)

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTITY TYPES
// =============================================================================

/// A fully qualified entity or statement identifier.
///
/// A `Uri` is the concatenation of a namespace base URI and a short key,
/// joined by `#`, e.g. `noema:/builtins#R1`. The pair (namespace, short key)
/// is globally unique; the `Uri` string is therefore the canonical identity
/// used as key in all store indexes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(String);

impl Uri {
    /// Create a URI from its string form.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the URI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The namespace part (everything before the `#` separator).
    #[must_use]
    pub fn base(&self) -> &str {
        self.0.split('#').next().unwrap_or(&self.0)
    }

    /// The short key part (everything after the `#` separator), if present.
    #[must_use]
    pub fn short_key(&self) -> Option<&str> {
        self.0.split_once('#').map(|(_, k)| k)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Uri {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Uri {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Uri {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The kind of an entity, derived from the leading letter of its short key.
///
/// Items (`I…`) are general nodes; Relations (`R…`) are edge-type nodes and
/// the only legal predicate of a statement. Literals are values, not
/// entities, and have no kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// A general node; may act as class and/or instance simultaneously.
    Item,
    /// An edge-type node; used as the predicate of statements.
    Relation,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Item => f.write_str("Item"),
            Self::Relation => f.write_str("Relation"),
        }
    }
}

// =============================================================================
// LITERALS
// =============================================================================

/// A language tag attached to a text literal, e.g. `en` or `de`.
///
/// Only the tag itself is modeled; multilingual resolution layers are out of
/// scope for the engine.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LangTag(String);

impl LangTag {
    /// Create a language tag. Tags must be 2-8 lowercase ASCII letters.
    pub fn new(tag: impl Into<String>) -> Result<Self, NoemaError> {
        let tag = tag.into();
        let valid = (2..=8).contains(&tag.len()) && tag.bytes().all(|b| b.is_ascii_lowercase());
        if !valid {
            return Err(NoemaError::Validation(format!(
                "invalid language tag: '{tag}'"
            )));
        }
        Ok(Self(tag))
    }

    /// Get the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An atomic value participating in the graph without being an entity.
///
/// Literals carry no short key and are never indexed as subjects; they
/// appear only in the object position of statements.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Literal {
    /// A string, optionally tagged with a language.
    Text {
        /// The text content.
        text: String,
        /// Optional language tag.
        lang: Option<LangTag>,
    },
    /// A signed integer.
    Int(i64),
    /// A floating-point number. Stored, never computed with.
    Float(f64),
    /// A boolean.
    Bool(bool),
}

impl Literal {
    /// Create a plain (untagged) text literal.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text {
            text: s.into(),
            lang: None,
        }
    }

    /// Create a language-tagged text literal.
    #[must_use]
    pub fn tagged_text(s: impl Into<String>, lang: LangTag) -> Self {
        Self::Text {
            text: s.into(),
            lang: Some(lang),
        }
    }

    /// Return the text content if this is a text literal.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Return the boolean value if this is a boolean literal.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Return the integer value if this is an integer literal.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Text { text: a, lang: la },
                Self::Text { text: b, lang: lb },
            ) => a == b && la == lb,
            (Self::Int(a), Self::Int(b)) => a == b,
            // Bitwise equality keeps Eq lawful without float arithmetic.
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Bool(a), Self::Bool(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Literal {}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { text, lang: None } => write!(f, "\"{text}\""),
            Self::Text {
                text,
                lang: Some(lang),
            } => write!(f, "\"{text}\"@{}", lang.as_str()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Self::text(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Literal {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

// =============================================================================
// TRIPLE POSITIONS
// =============================================================================

/// The subject of a statement: an entity, or another statement
/// (statement-on-statement, i.e. a qualifier).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "uri")]
pub enum SubjectRef {
    /// An Item or Relation identified by URI.
    Entity(Uri),
    /// A statement identified by URI; makes the owning statement a qualifier.
    Statement(Uri),
}

impl SubjectRef {
    /// The URI of the subject, regardless of variant.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        match self {
            Self::Entity(u) | Self::Statement(u) => u,
        }
    }

    /// True if the subject is a statement.
    #[must_use]
    pub fn is_statement(&self) -> bool {
        matches!(self, Self::Statement(_))
    }
}

/// The object of a statement: an entity reference or a literal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum ObjectValue {
    /// An Item or Relation identified by URI.
    Entity(Uri),
    /// An atomic value.
    Literal(Literal),
}

impl ObjectValue {
    /// The entity URI, if the object is an entity.
    #[must_use]
    pub fn as_entity(&self) -> Option<&Uri> {
        match self {
            Self::Entity(u) => Some(u),
            Self::Literal(_) => None,
        }
    }

    /// The literal, if the object is a literal.
    #[must_use]
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(l) => Some(l),
            Self::Entity(_) => None,
        }
    }
}

impl fmt::Display for ObjectValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity(u) => write!(f, "{u}"),
            Self::Literal(l) => write!(f, "{l}"),
        }
    }
}

impl From<Uri> for ObjectValue {
    fn from(u: Uri) -> Self {
        Self::Entity(u)
    }
}

impl From<Literal> for ObjectValue {
    fn from(l: Literal) -> Self {
        Self::Literal(l)
    }
}

impl From<&str> for ObjectValue {
    fn from(s: &str) -> Self {
        Self::Literal(Literal::text(s))
    }
}

impl From<String> for ObjectValue {
    fn from(s: String) -> Self {
        Self::Literal(Literal::text(s))
    }
}

impl From<i64> for ObjectValue {
    fn from(i: i64) -> Self {
        Self::Literal(Literal::Int(i))
    }
}

impl From<f64> for ObjectValue {
    fn from(x: f64) -> Self {
        Self::Literal(Literal::Float(x))
    }
}

impl From<bool> for ObjectValue {
    fn from(b: bool) -> Self {
        Self::Literal(Literal::Bool(b))
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the Noema engine.
///
/// - No silent failures
/// - All fallible operations return `Result<T, NoemaError>`
/// - The engine never panics; every error propagates to the caller
///   immediately (no retries; all operations are local and deterministic)
#[derive(Debug, Error)]
pub enum NoemaError {
    /// A key or URI is already taken within its namespace.
    #[error("identity conflict: '{0}' is already registered")]
    IdentityConflict(String),

    /// A key, URI or prefix could not be resolved to a live entity.
    #[error("not found: {0}")]
    NotFound(String),

    /// A key string does not follow the key grammar.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A namespace prefix is not registered.
    #[error("unknown prefix: '{0}'")]
    UnknownPrefix(String),

    /// An entity of the wrong kind was used in a structural position
    /// (e.g. a non-Relation as predicate).
    #[error("wrong entity kind for {uri}: expected {expected}, got {actual}")]
    WrongEntityKind {
        /// The offending entity.
        uri: String,
        /// The kind required by the position.
        expected: EntityKind,
        /// The kind actually found.
        actual: EntityKind,
    },

    /// An entity without the custom-call capability was invoked.
    #[error("entity {0} has no custom-call capability and cannot be called")]
    NotCallable(String),

    /// A structural or consistency constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A second statement was written for a functional relation.
    #[error("functional relation violation: {0}")]
    FunctionalRelation(String),

    /// Scope stack or scope lifecycle misuse.
    #[error("scope error: {0}")]
    Scope(String),

    /// An operation that mints keys ran without an active namespace.
    #[error("no active namespace; push a namespace before creating entities")]
    NoActiveNamespace,

    /// The key reservoir of a namespace is exhausted.
    #[error("key reservoir exhausted for namespace '{0}'")]
    KeyReservoirExhausted(String),

    /// An I/O failure in a collaborator layer. The engine itself performs
    /// no I/O; this variant exists for loaders and exporters built on top.
    #[error("I/O error: {0}")]
    Io(String),

    /// A module file could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_splits_into_base_and_key() {
        let uri = Uri::new("noema:/builtins#R1");
        assert_eq!(uri.base(), "noema:/builtins");
        assert_eq!(uri.short_key(), Some("R1"));
    }

    #[test]
    fn uri_without_separator_has_no_key() {
        let uri = Uri::new("noema:/builtins");
        assert_eq!(uri.base(), "noema:/builtins");
        assert_eq!(uri.short_key(), None);
    }

    #[test]
    fn lang_tag_validation() {
        assert!(LangTag::new("en").is_ok());
        assert!(LangTag::new("de").is_ok());
        assert!(LangTag::new("E").is_err());
        assert!(LangTag::new("EN").is_err());
        assert!(LangTag::new("").is_err());
    }

    #[test]
    fn literal_equality_is_bitwise_for_floats() {
        assert_eq!(Literal::from(1.5), Literal::from(1.5));
        assert_ne!(Literal::from(1.5), Literal::from(2.5));
        // NaN compares equal to itself bitwise; Eq stays lawful.
        assert_eq!(Literal::from(f64::NAN), Literal::from(f64::NAN));
    }

    #[test]
    fn literal_display_forms() {
        assert_eq!(Literal::text("abc").to_string(), "\"abc\"");
        let tagged = Literal::tagged_text("abc", LangTag::new("en").expect("tag"));
        assert_eq!(tagged.to_string(), "\"abc\"@en");
        assert_eq!(Literal::from(42i64).to_string(), "42");
        assert_eq!(Literal::from(true).to_string(), "true");
    }

    #[test]
    fn object_value_accessors() {
        let ent = ObjectValue::Entity(Uri::new("m#I1"));
        assert!(ent.as_entity().is_some());
        assert!(ent.as_literal().is_none());

        let lit = ObjectValue::from(7i64);
        assert!(lit.as_entity().is_none());
        assert_eq!(lit.as_literal().and_then(Literal::as_int), Some(7));
    }

    #[test]
    fn subject_ref_reports_statement() {
        let s = SubjectRef::Statement(Uri::new("m#S1"));
        assert!(s.is_statement());
        let e = SubjectRef::Entity(Uri::new("m#I1"));
        assert!(!e.is_statement());
    }
}
