//! # Canonical Snapshot
//!
//! Deterministic, serde-serializable dump of the graph for inspection,
//! diffing and test tooling.
//!
//! The engine itself persists nothing; serializing a snapshot (and choosing
//! the wire format) is a collaborator concern. The snapshot is canonical:
//! two graphs built by the same creation sequence produce identical
//! snapshots.

use crate::entity::Entity;
use crate::graph::KnowledgeGraph;
use crate::statement::Statement;
use crate::types::NoemaError;
use serde::{Deserialize, Serialize};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Header of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Format version for compatibility checks.
    pub version: u8,
    /// Number of entities in the snapshot.
    pub entity_count: u64,
    /// Number of primary statements in the snapshot (duals are included in
    /// the record list but not counted here).
    pub statement_count: u64,
}

impl SnapshotHeader {
    /// Validate the header of a deserialized snapshot.
    pub fn validate(&self) -> Result<(), NoemaError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(NoemaError::Validation(format!(
                "unsupported snapshot version {}",
                self.version
            )));
        }
        Ok(())
    }
}

/// Summary of one namespace in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceSummary {
    /// Namespace base URI.
    pub uri: String,
    /// Registered prefix.
    pub prefix: String,
    /// Number of entities the namespace defines.
    pub entity_count: u64,
    /// Number of statement records minted in the namespace.
    pub statement_count: u64,
}

/// A canonical dump of the graph.
///
/// Entities and statements are listed in URI order (`BTreeMap` iteration
/// order), which makes snapshots of identically built graphs identical.
/// Capability tables hold function pointers and are not part of the
/// snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    /// Header with version and counts.
    pub header: SnapshotHeader,
    /// Namespace summaries in URI order.
    pub namespaces: Vec<NamespaceSummary>,
    /// Entity records in URI order.
    pub entities: Vec<Entity>,
    /// Statement records (primaries and duals) in URI order.
    pub statements: Vec<Statement>,
}

impl From<&KnowledgeGraph> for GraphSnapshot {
    fn from(graph: &KnowledgeGraph) -> Self {
        let entities: Vec<Entity> = graph.entities().cloned().collect();
        let statements: Vec<Statement> = graph.statements().cloned().collect();
        let namespaces = graph
            .namespaces()
            .map(|record| NamespaceSummary {
                uri: record.base_uri().to_string(),
                prefix: record.prefix().to_string(),
                entity_count: record.entities().len() as u64,
                statement_count: record.statement_count() as u64,
            })
            .collect();
        Self {
            header: SnapshotHeader {
                version: SNAPSHOT_VERSION,
                entity_count: entities.len() as u64,
                statement_count: graph.statement_count() as u64,
            },
            namespaces,
            entities,
            statements,
        }
    }
}

impl GraphSnapshot {
    /// Take a snapshot of a graph.
    #[must_use]
    pub fn from_graph(graph: &KnowledgeGraph) -> Self {
        Self::from(graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================
