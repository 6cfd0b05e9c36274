//! # noema-core
//!
//! The deterministic knowledge-graph engine for Noema - THE ENGINE.
//!
//! This crate implements a mutable, in-process labeled multigraph of typed
//! entities (Items, Relations, Literals) connected by reified Statements
//! that can themselves be subjects of further statements (qualifiers), plus
//! scoped sub-graph construction for compound knowledge artifacts and
//! snapshot-based capability inheritance along taxonomy edges.
//!
//! ## Architectural Constraints
//!
//! The ENGINE:
//! - Is the only place where graph state exists (single owner:
//!   [`KnowledgeGraph`])
//! - Guarantees structural consistency only (unique identities, well-formed
//!   statements, dual/qualifier bookkeeping in lockstep); correctness of
//!   modeled knowledge is the caller's responsibility
//! - Performs no inference, enforces no schema, knows no transactions
//! - Has NO async, NO network, NO file I/O (pure Rust, synchronous)

// =============================================================================
// MODULES
// =============================================================================

pub mod builtins;
pub mod entity;
pub mod export;
pub mod graph;
pub mod keys;
pub mod primitives;
pub mod scope;
pub mod statement;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{EntityKind, LangTag, Literal, NoemaError, ObjectValue, SubjectRef, Uri};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use entity::{
    BindingObject, Capability, CapabilityFn, CapabilityPolicy, CapabilityTable, Entity, ItemSpec,
    RelationSpec, CUSTOM_CALL_HOOK,
};
pub use export::{GraphSnapshot, NamespaceSummary, SnapshotHeader, SNAPSHOT_VERSION};
pub use graph::{KnowledgeGraph, NamespaceRecord};
pub use keys::{
    ensure_valid_short_key, format_short_key, make_uri, normalize_label, parse_key, KeyKind,
    KeyManager, ProcessedKey,
};
pub use scope::{ScopeContext, ScopeType};
pub use statement::{QualifierFactory, RawQualifier, Statement, StatementRole};
