//! # Knowledge Graph
//!
//! The single owner of all graph state: entities, statements, indexes,
//! namespaces and capability tables.
//!
//! All data structures use `BTreeMap` for deterministic ordering; index
//! buckets are `Vec`s in creation order. Every operation is synchronous and
//! completes fully before returning. There is no transaction layer: a
//! failure mid-operation leaves the store in the partially mutated state
//! that existed at the failure point.

use crate::builtins;
use crate::entity::{
    BindingObject, Capability, CapabilityFn, CapabilityPolicy, CapabilityTable, Entity, ItemSpec,
    RelationSpec, CUSTOM_CALL_HOOK,
};
use crate::keys::{
    self, ensure_valid_short_key, format_short_key, make_uri, normalize_label, parse_key,
    KeyKind, KeyManager, ProcessedKey,
};
use crate::statement::{RawQualifier, Statement, StatementRole};
use crate::types::{EntityKind, Literal, NoemaError, ObjectValue, SubjectRef, Uri};
use std::collections::BTreeMap;

// =============================================================================
// NAMESPACE RECORD
// =============================================================================

/// Bookkeeping for one registered namespace.
///
/// The namespace exclusively owns the entities it defines; statements are
/// owned by the global store but recorded here for wholesale unloading.
#[derive(Debug, Clone)]
pub struct NamespaceRecord {
    base_uri: Uri,
    prefix: String,
    key_manager: KeyManager,
    /// URIs of entities created in this namespace, in creation order.
    entities: Vec<Uri>,
    /// URIs of statements minted while this namespace was active.
    statements: Vec<Uri>,
}

impl NamespaceRecord {
    /// The namespace base URI.
    #[must_use]
    pub fn base_uri(&self) -> &Uri {
        &self.base_uri
    }

    /// The registered prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Entities created in this namespace, in creation order.
    #[must_use]
    pub fn entities(&self) -> &[Uri] {
        &self.entities
    }

    /// Number of statements minted in this namespace.
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

// =============================================================================
// KNOWLEDGE GRAPH
// =============================================================================

/// The in-process knowledge graph.
///
/// Created pre-loaded with the built-in vocabulary (see [`crate::builtins`]).
/// Mutable for the life of the process; cleared only by dropping the value
/// or by unloading namespaces wholesale.
#[derive(Debug, Default)]
pub struct KnowledgeGraph {
    /// Entity storage: URI → record.
    entities: BTreeMap<Uri, Entity>,
    /// Statement storage: URI → statement (primaries, duals and qualifiers).
    statements: BTreeMap<Uri, Statement>,
    /// Subject URI → relation URI → primary statement URIs (creation order).
    subject_index: BTreeMap<Uri, BTreeMap<Uri, Vec<Uri>>>,
    /// Object entity URI → relation URI → dual/qualifier statement URIs.
    object_index: BTreeMap<Uri, BTreeMap<Uri, Vec<Uri>>>,
    /// Relation URI → primary statement URIs (creation order).
    relation_index: BTreeMap<Uri, Vec<Uri>>,
    /// Scope item URI → statement URIs tagged into the scope.
    scope_index: BTreeMap<Uri, Vec<Uri>>,
    /// Capability tables, keyed by entity URI. Side table: not serialized.
    capabilities: BTreeMap<Uri, CapabilityTable>,
    /// Registered namespaces, keyed by base URI.
    namespaces: BTreeMap<Uri, NamespaceRecord>,
    /// Prefix → namespace base URI.
    prefixes: BTreeMap<String, Uri>,
    /// Stack of active namespaces (creation context).
    namespace_stack: Vec<Uri>,
    /// Stack of open scopes (scope context discipline).
    pub(crate) scope_stack: Vec<Uri>,
    /// Precedence rule for inherited capability conflicts.
    policy: CapabilityPolicy,
}

impl KnowledgeGraph {
    /// Create a graph pre-loaded with the built-in vocabulary.
    pub fn new() -> Result<Self, NoemaError> {
        let mut graph = Self::default();
        builtins::bootstrap(&mut graph)?;
        Ok(graph)
    }

    // =========================================================================
    // NAMESPACES
    // =========================================================================

    /// Register a namespace under a base URI and prefix.
    ///
    /// `keyseed` shifts the starting point of the namespace's key reservoir;
    /// `None` uses the shared default seed.
    pub fn register_namespace(
        &mut self,
        base_uri: &str,
        prefix: &str,
        keyseed: Option<u64>,
    ) -> Result<(), NoemaError> {
        if base_uri.is_empty() || base_uri.contains('#') {
            return Err(NoemaError::Validation(format!(
                "invalid namespace URI: '{base_uri}' (must be non-empty and free of '#')"
            )));
        }
        if !keys::is_valid_prefix(prefix) {
            return Err(NoemaError::Validation(format!(
                "invalid namespace prefix: '{prefix}'"
            )));
        }
        let base = Uri::new(base_uri);
        if self.namespaces.contains_key(&base) {
            return Err(NoemaError::IdentityConflict(base_uri.to_string()));
        }
        if self.prefixes.contains_key(prefix) {
            return Err(NoemaError::IdentityConflict(format!("prefix '{prefix}'")));
        }
        let record = NamespaceRecord {
            base_uri: base.clone(),
            prefix: prefix.to_string(),
            key_manager: keyseed.map_or_else(KeyManager::default, KeyManager::new),
            entities: Vec::new(),
            statements: Vec::new(),
        };
        self.prefixes.insert(prefix.to_string(), base.clone());
        self.namespaces.insert(base, record);
        Ok(())
    }

    /// Push a registered namespace onto the active stack.
    pub fn push_namespace(&mut self, base_uri: &str) -> Result<(), NoemaError> {
        if !self.namespaces.contains_key(base_uri) {
            return Err(NoemaError::NotFound(format!("namespace '{base_uri}'")));
        }
        self.namespace_stack.push(Uri::new(base_uri));
        Ok(())
    }

    /// Pop the topmost active namespace.
    pub fn pop_namespace(&mut self) -> Result<Uri, NoemaError> {
        self.namespace_stack
            .pop()
            .ok_or(NoemaError::NoActiveNamespace)
    }

    /// The currently active namespace, if any.
    #[must_use]
    pub fn active_namespace(&self) -> Option<&Uri> {
        self.namespace_stack.last()
    }

    /// Run `f` with `base_uri` active, popping it again afterwards even if
    /// `f` fails.
    pub fn in_namespace<T>(
        &mut self,
        base_uri: &str,
        f: impl FnOnce(&mut Self) -> Result<T, NoemaError>,
    ) -> Result<T, NoemaError> {
        self.push_namespace(base_uri)?;
        let result = f(self);
        // The pop cannot fail here: the push above succeeded.
        let _ = self.namespace_stack.pop();
        result
    }

    /// Resolve a prefix to its namespace base URI.
    pub fn namespace_for_prefix(&self, prefix: &str) -> Result<&Uri, NoemaError> {
        self.prefixes
            .get(prefix)
            .ok_or_else(|| NoemaError::UnknownPrefix(prefix.to_string()))
    }

    /// The record of a registered namespace.
    #[must_use]
    pub fn namespace(&self, base_uri: &str) -> Option<&NamespaceRecord> {
        self.namespaces.get(base_uri)
    }

    /// Registered namespaces in deterministic order.
    pub fn namespaces(&self) -> impl Iterator<Item = &NamespaceRecord> {
        self.namespaces.values()
    }

    /// Mint a fresh key number from a namespace's reservoir such that both
    /// the `I…` and `R…` keys with that number are free.
    pub fn generate_key_number(&mut self, base_uri: &str) -> Result<u64, NoemaError> {
        loop {
            let record = self
                .namespaces
                .get_mut(base_uri)
                .ok_or_else(|| NoemaError::NotFound(format!("namespace '{base_uri}'")))?;
            let number = record
                .key_manager
                .next_number()
                .ok_or_else(|| NoemaError::KeyReservoirExhausted(base_uri.to_string()))?;
            let item_uri = make_uri(base_uri, &format_short_key(KeyKind::Item, false, number));
            let rel_uri = make_uri(base_uri, &format_short_key(KeyKind::Relation, false, number));
            if !self.identity_taken(&item_uri) && !self.identity_taken(&rel_uri) {
                return Ok(number);
            }
        }
    }

    fn identity_taken(&self, uri: &Uri) -> bool {
        self.entities.contains_key(uri) || self.statements.contains_key(uri)
    }

    /// Unload a namespace wholesale: every entity it defines and every
    /// statement minted in it is unlinked, its prefix and key reservoir are
    /// released.
    pub fn unload_namespace(&mut self, base_uri: &str) -> Result<(), NoemaError> {
        if self.namespace_stack.iter().any(|u| u.as_str() == base_uri) {
            return Err(NoemaError::Validation(format!(
                "cannot unload active namespace '{base_uri}'"
            )));
        }
        let record = self
            .namespaces
            .remove(base_uri)
            .ok_or_else(|| NoemaError::NotFound(format!("namespace '{base_uri}'")))?;

        self.prefixes.remove(&record.prefix);

        for entity_uri in &record.entities {
            self.unlink_entity(entity_uri);
        }
        for stm_uri in &record.statements {
            self.unlink_statement(stm_uri);
        }
        Ok(())
    }

    // =========================================================================
    // ENTITY CREATION
    // =========================================================================

    /// Create an Item in the active namespace.
    ///
    /// The identity is registered first, then the spec's bindings are
    /// written as statements in declaration order, then the capability
    /// snapshot is taken from the taxonomy parents.
    pub fn create_item(&mut self, key_str: &str, spec: ItemSpec) -> Result<Uri, NoemaError> {
        let uri = self.create_entity_record(key_str, EntityKind::Item)?;

        if let Some(label) = spec.label {
            self.set_relation(&uri, &builtins::r1(), Literal::text(label).into())?;
        }
        if let Some(description) = spec.description {
            self.set_relation(&uri, &builtins::r2(), Literal::text(description).into())?;
        }

        let mut parents: Vec<Uri> = Vec::new();
        for class_key in &spec.subclass_of {
            let parent = self.resolve_uri(class_key)?;
            self.set_relation(&uri, &builtins::r3(), parent.clone().into())?;
            parents.push(parent);
        }
        for class_key in &spec.instance_of {
            let parent = self.resolve_uri(class_key)?;
            self.set_relation(&uri, &builtins::r4(), parent.clone().into())?;
            parents.push(parent);
        }

        for (relation_key, object) in spec.bindings {
            let relation = self.resolve_uri(&relation_key)?;
            let object = self.resolve_binding(object)?;
            self.set_relation(&uri, &relation, object)?;
        }

        self.snapshot_capabilities(&uri, &parents);
        Ok(uri)
    }

    /// Create a Relation in the active namespace.
    pub fn create_relation(
        &mut self,
        key_str: &str,
        spec: RelationSpec,
    ) -> Result<Uri, NoemaError> {
        let uri = self.create_entity_record(key_str, EntityKind::Relation)?;

        if let Some(label) = spec.label {
            self.set_relation(&uri, &builtins::r1(), Literal::text(label).into())?;
        }
        if let Some(description) = spec.description {
            self.set_relation(&uri, &builtins::r2(), Literal::text(description).into())?;
        }
        if spec.functional {
            self.set_relation(&uri, &builtins::r22(), true.into())?;
        }
        for (relation_key, object) in spec.bindings {
            let relation = self.resolve_uri(&relation_key)?;
            let object = self.resolve_binding(object)?;
            self.set_relation(&uri, &relation, object)?;
        }
        Ok(uri)
    }

    /// Create a fresh auto-keyed instance of a class Item.
    ///
    /// The instance gets an `Ia…` key from the active namespace, an R4
    /// "is instance of" statement, and a snapshot of the class's capability
    /// table as of this moment.
    pub fn instance_of(&mut self, class_key: &str) -> Result<Uri, NoemaError> {
        self.instance_of_with(class_key, None, Vec::new())
    }

    /// [`Self::instance_of`] with an explicit label and qualifiers for the
    /// instance-creation statement.
    pub fn instance_of_with(
        &mut self,
        class_key: &str,
        label: Option<&str>,
        qualifiers: Vec<RawQualifier>,
    ) -> Result<Uri, NoemaError> {
        let class_uri = {
            let class = self.resolve(class_key)?;
            if class.kind != EntityKind::Item {
                return Err(NoemaError::WrongEntityKind {
                    uri: class.uri.to_string(),
                    expected: EntityKind::Item,
                    actual: class.kind,
                });
            }
            class.uri.clone()
        };

        let active = self
            .active_namespace()
            .cloned()
            .ok_or(NoemaError::NoActiveNamespace)?;
        let uri = self.mint_entity_uri(&active, KeyKind::Item)?;
        let short_key = uri
            .short_key()
            .unwrap_or_default()
            .to_string();

        let entity = Entity {
            short_key,
            uri: uri.clone(),
            namespace: active.clone(),
            kind: EntityKind::Item,
            auto_generated: true,
        };
        self.entities.insert(uri.clone(), entity);
        self.capabilities.insert(uri.clone(), CapabilityTable::new());
        if let Some(record) = self.namespaces.get_mut(&active) {
            record.entities.push(uri.clone());
        }

        let label = match label {
            Some(l) => l.to_string(),
            None => match self.label_text(&class_uri) {
                Some(class_label) => format!("instance of {class_label}"),
                None => format!("instance of {class_uri}"),
            },
        };
        self.set_relation(&uri, &builtins::r1(), Literal::text(label).into())?;
        self.set_relation_full(
            SubjectRef::Entity(uri.clone()),
            &builtins::r4(),
            class_uri.clone().into(),
            qualifiers,
            None,
        )?;

        self.snapshot_capabilities(&uri, std::slice::from_ref(&class_uri));
        Ok(uri)
    }

    /// Shared identity-registration path for `create_item`/`create_relation`.
    fn create_entity_record(
        &mut self,
        key_str: &str,
        kind: EntityKind,
    ) -> Result<Uri, NoemaError> {
        let active = self
            .active_namespace()
            .cloned()
            .ok_or(NoemaError::NoActiveNamespace)?;

        let (key_kind, auto) = ensure_valid_short_key(key_str)?;
        let key_entity_kind = key_kind.entity_kind().ok_or_else(|| {
            NoemaError::InvalidKey(format!("'{key_str}' is a statement key, not an entity key"))
        })?;
        if key_entity_kind != kind {
            return Err(NoemaError::InvalidKey(format!(
                "'{key_str}' carries a {key_entity_kind} tag but a {kind} was requested"
            )));
        }

        let uri = make_uri(active.as_str(), key_str);
        if self.identity_taken(&uri) {
            return Err(NoemaError::IdentityConflict(uri.to_string()));
        }

        let entity = Entity {
            short_key: key_str.to_string(),
            uri: uri.clone(),
            namespace: active.clone(),
            kind,
            auto_generated: auto,
        };
        self.entities.insert(uri.clone(), entity);
        self.capabilities.insert(uri.clone(), CapabilityTable::new());
        if let Some(record) = self.namespaces.get_mut(&active) {
            record.entities.push(uri.clone());
        }
        Ok(uri)
    }

    /// Mint a fresh auto-generated entity URI in `base_uri`.
    fn mint_entity_uri(&mut self, base_uri: &Uri, kind: KeyKind) -> Result<Uri, NoemaError> {
        loop {
            let record = self
                .namespaces
                .get_mut(base_uri)
                .ok_or_else(|| NoemaError::NotFound(format!("namespace '{base_uri}'")))?;
            let number = record
                .key_manager
                .next_number()
                .ok_or_else(|| NoemaError::KeyReservoirExhausted(base_uri.to_string()))?;
            let uri = make_uri(base_uri.as_str(), &format_short_key(kind, true, number));
            if !self.identity_taken(&uri) {
                return Ok(uri);
            }
        }
    }

    fn resolve_binding(&self, object: BindingObject) -> Result<ObjectValue, NoemaError> {
        match object {
            BindingObject::Key(key) => Ok(ObjectValue::Entity(self.resolve_uri(&key)?)),
            BindingObject::Value(v) => Ok(v),
        }
    }

    /// Copy the capability tables of `parents` (in order) into the table of
    /// `child`, applying the configured conflict policy.
    fn snapshot_capabilities(&mut self, child: &Uri, parents: &[Uri]) {
        let mut table = self.capabilities.remove(child).unwrap_or_default();
        for parent in parents {
            if let Some(parent_table) = self.capabilities.get(parent) {
                table.absorb(parent_table, self.policy);
            }
        }
        self.capabilities.insert(child.clone(), table);
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Resolve a key string (any of the five notations) or a full URI to an
    /// entity.
    ///
    /// Unprefixed keys are searched in the active namespace stack (top
    /// first), then in the built-in namespace. A labeled notation is checked
    /// against the entity's stored label; mismatch is an error.
    pub fn resolve(&self, key_str: &str) -> Result<&Entity, NoemaError> {
        if key_str.contains('#') {
            return self
                .entities
                .get(key_str)
                .ok_or_else(|| NoemaError::NotFound(key_str.to_string()));
        }

        let processed = parse_key(key_str)?;
        if processed.kind.entity_kind().is_none() {
            return Err(NoemaError::InvalidKey(format!(
                "'{key_str}' names a statement, not an entity"
            )));
        }

        let entity = self.lookup_processed(&processed)?;
        self.check_label_consistency(entity, &processed)?;
        Ok(entity)
    }

    /// Like [`Self::resolve`], returning an owned URI.
    pub fn resolve_uri(&self, key_str: &str) -> Result<Uri, NoemaError> {
        self.resolve(key_str).map(|e| e.uri.clone())
    }

    fn lookup_processed(&self, processed: &ProcessedKey) -> Result<&Entity, NoemaError> {
        if let Some(prefix) = &processed.prefix {
            let base = self.namespace_for_prefix(prefix)?;
            let uri = make_uri(base.as_str(), &processed.short_key);
            return self
                .entities
                .get(&uri)
                .ok_or_else(|| NoemaError::NotFound(uri.to_string()));
        }

        // Unprefixed: active namespaces from the top of the stack, then
        // builtins as the fallback.
        for base in self.namespace_stack.iter().rev() {
            let uri = make_uri(base.as_str(), &processed.short_key);
            if let Some(entity) = self.entities.get(&uri) {
                return Ok(entity);
            }
        }
        let uri = make_uri(builtins::BUILTINS_URI, &processed.short_key);
        self.entities.get(&uri).ok_or_else(|| {
            NoemaError::NotFound(format!(
                "short key '{}' (searched active namespaces and builtins)",
                processed.short_key
            ))
        })
    }

    /// Compare the ad-hoc label of a key notation with the entity's stored
    /// R1 label. Comparison is case-insensitive with spaces and dashes
    /// normalized to underscores; entities without a label pass.
    fn check_label_consistency(
        &self,
        entity: &Entity,
        processed: &ProcessedKey,
    ) -> Result<(), NoemaError> {
        let Some(adhoc) = &processed.label else {
            return Ok(());
        };
        let Some(stored) = self.label_text(&entity.uri) else {
            return Ok(());
        };
        if normalize_label(adhoc) != normalize_label(&stored) {
            return Err(NoemaError::Validation(format!(
                "label mismatch for {}: key says '{adhoc}', stored label is '{stored}'",
                entity.uri
            )));
        }
        Ok(())
    }

    // =========================================================================
    // STATEMENTS
    // =========================================================================

    /// Create a statement `(subject, relation, object)`.
    pub fn set_relation(
        &mut self,
        subject: &Uri,
        relation: &Uri,
        object: ObjectValue,
    ) -> Result<Uri, NoemaError> {
        self.set_relation_full(
            SubjectRef::Entity(subject.clone()),
            relation,
            object,
            Vec::new(),
            None,
        )
    }

    /// Create a statement with qualifiers. Each raw qualifier is resolved
    /// against the new statement and stored as its own statement.
    pub fn set_relation_with_qualifiers(
        &mut self,
        subject: &Uri,
        relation: &Uri,
        object: ObjectValue,
        qualifiers: Vec<RawQualifier>,
    ) -> Result<Uri, NoemaError> {
        self.set_relation_full(
            SubjectRef::Entity(subject.clone()),
            relation,
            object,
            qualifiers,
            None,
        )
    }

    /// Full statement-creation path; `scope` tags the statement into a scope
    /// item via a `has defining scope` qualifier.
    pub(crate) fn set_relation_full(
        &mut self,
        subject: SubjectRef,
        relation: &Uri,
        object: ObjectValue,
        mut qualifiers: Vec<RawQualifier>,
        scope: Option<Uri>,
    ) -> Result<Uri, NoemaError> {
        // Subject must be live.
        match &subject {
            SubjectRef::Entity(uri) => {
                if !self.entities.contains_key(uri) {
                    return Err(NoemaError::NotFound(uri.to_string()));
                }
            }
            SubjectRef::Statement(uri) => {
                if !self.statements.contains_key(uri) {
                    return Err(NoemaError::NotFound(uri.to_string()));
                }
            }
        }

        // Predicate must be a Relation.
        self.require_relation(relation)?;

        // Entity objects must be live.
        if let ObjectValue::Entity(obj_uri) = &object {
            if !self.entities.contains_key(obj_uri) {
                return Err(NoemaError::NotFound(obj_uri.to_string()));
            }
        }

        // Functional relations admit one statement per subject.
        if self.relation_is_functional(relation) {
            let occupied = self
                .subject_index
                .get(subject.uri())
                .and_then(|rels| rels.get(relation))
                .is_some_and(|bucket| !bucket.is_empty());
            if occupied {
                return Err(NoemaError::FunctionalRelation(format!(
                    "subject {} already has a statement for functional relation {relation}",
                    subject.uri()
                )));
            }
        }

        // Scope tagging: the scope must be an instance of the built-in
        // scope class; membership is expressed as a qualifier.
        if let Some(scope_uri) = &scope {
            if !self.is_instance_of_key(scope_uri, &builtins::i16()) {
                return Err(NoemaError::Validation(format!(
                    "{scope_uri} is not a scope item"
                )));
            }
            qualifiers.push(builtins::has_defining_scope().of(scope_uri.clone()));
        }

        let (stm_uri, stm_key, active) = self.mint_statement_identity()?;

        let mut statement = Statement {
            short_key: stm_key,
            uri: stm_uri.clone(),
            namespace: active.clone(),
            subject: subject.clone(),
            predicate: relation.clone(),
            object: object.clone(),
            role: StatementRole::Primary,
            dual: None,
            qualifiers: Vec::new(),
            scope: scope.clone(),
        };

        // Dual statement for entity-valued objects: same triple, role Dual,
        // indexed under the object.
        let dual_uri = if let ObjectValue::Entity(obj_uri) = &object {
            let (d_uri, d_key, _) = self.mint_statement_identity()?;
            let dual = Statement {
                short_key: d_key,
                uri: d_uri.clone(),
                namespace: active.clone(),
                subject,
                predicate: relation.clone(),
                object: object.clone(),
                role: StatementRole::Dual,
                dual: Some(stm_uri.clone()),
                qualifiers: Vec::new(),
                scope: scope.clone(),
            };
            self.statements.insert(d_uri.clone(), dual);
            self.object_index
                .entry(obj_uri.clone())
                .or_default()
                .entry(relation.clone())
                .or_default()
                .push(d_uri.clone());
            self.record_statement_in_namespace(&active, &d_uri);
            Some(d_uri)
        } else {
            None
        };
        statement.dual = dual_uri.clone();

        // Index the primary.
        self.subject_index
            .entry(statement.subject.uri().clone())
            .or_default()
            .entry(relation.clone())
            .or_default()
            .push(stm_uri.clone());
        self.relation_index
            .entry(relation.clone())
            .or_default()
            .push(stm_uri.clone());
        if let Some(scope_uri) = &scope {
            self.scope_index
                .entry(scope_uri.clone())
                .or_default()
                .push(stm_uri.clone());
        }
        self.statements.insert(stm_uri.clone(), statement);
        self.record_statement_in_namespace(&active, &stm_uri);

        // Resolve qualifiers against the new statement.
        for raw in qualifiers {
            let q_uri = self.create_qualifier_statement(&stm_uri, &raw)?;
            if let Some(stm) = self.statements.get_mut(&stm_uri) {
                stm.qualifiers.push(q_uri.clone());
            }
            if let Some(d_uri) = &dual_uri {
                if let Some(dual) = self.statements.get_mut(d_uri) {
                    dual.qualifiers.push(q_uri);
                }
            }
        }

        Ok(stm_uri)
    }

    /// Attach a raw qualifier to an existing statement. This is the only
    /// mutation a statement admits after creation.
    pub fn attach_qualifier(
        &mut self,
        statement: &Uri,
        qualifier: RawQualifier,
    ) -> Result<Uri, NoemaError> {
        if !self.statements.contains_key(statement) {
            return Err(NoemaError::NotFound(statement.to_string()));
        }
        let q_uri = self.create_qualifier_statement(statement, &qualifier)?;
        let dual_uri = self
            .statements
            .get(statement)
            .and_then(|s| s.dual.clone());
        if let Some(stm) = self.statements.get_mut(statement) {
            stm.qualifiers.push(q_uri.clone());
        }
        if let Some(d_uri) = dual_uri {
            if let Some(dual) = self.statements.get_mut(&d_uri) {
                dual.qualifiers.push(q_uri.clone());
            }
        }
        Ok(q_uri)
    }

    /// Create and index one qualifier statement: subject is the host
    /// statement, predicate and object come from the raw qualifier.
    fn create_qualifier_statement(
        &mut self,
        host: &Uri,
        raw: &RawQualifier,
    ) -> Result<Uri, NoemaError> {
        self.require_relation(raw.relation())?;
        if let Some(obj_uri) = raw.object().as_entity() {
            if !self.entities.contains_key(obj_uri) {
                return Err(NoemaError::NotFound(obj_uri.to_string()));
            }
        }

        let (q_uri, q_key, active) = self.mint_statement_identity()?;
        let statement = Statement {
            short_key: q_key,
            uri: q_uri.clone(),
            namespace: active.clone(),
            subject: SubjectRef::Statement(host.clone()),
            predicate: raw.relation().clone(),
            object: raw.object().clone(),
            role: StatementRole::Primary,
            dual: None,
            qualifiers: Vec::new(),
            scope: None,
        };

        self.subject_index
            .entry(host.clone())
            .or_default()
            .entry(raw.relation().clone())
            .or_default()
            .push(q_uri.clone());
        self.relation_index
            .entry(raw.relation().clone())
            .or_default()
            .push(q_uri.clone());
        // Qualifier statements are indexed under entity objects directly;
        // they carry no dual of their own.
        if let Some(obj_uri) = raw.object().as_entity() {
            self.object_index
                .entry(obj_uri.clone())
                .or_default()
                .entry(raw.relation().clone())
                .or_default()
                .push(q_uri.clone());
        }
        self.statements.insert(q_uri.clone(), statement);
        self.record_statement_in_namespace(&active, &q_uri);
        Ok(q_uri)
    }

    /// Replace the single existing statement of `subject` under `relation` with a
    /// new object. Fails if no or several statements exist, or if the old
    /// statement carries qualifiers.
    pub fn overwrite_relation(
        &mut self,
        subject: &Uri,
        relation: &Uri,
        new_object: ObjectValue,
    ) -> Result<Uri, NoemaError> {
        let bucket: Vec<Uri> = self
            .subject_index
            .get(subject)
            .and_then(|rels| rels.get(relation))
            .cloned()
            .unwrap_or_default();
        if bucket.is_empty() {
            return Err(NoemaError::NotFound(format!(
                "no statement for subject {subject} and relation {relation} to overwrite"
            )));
        }
        if bucket.len() > 1 {
            return Err(NoemaError::Validation(format!(
                "found {} statements for {subject} and {relation}; overwrite needs exactly one",
                bucket.len()
            )));
        }
        let old_uri = bucket.into_iter().next().ok_or_else(|| {
            NoemaError::NotFound(format!(
                "no statement for subject {subject} and relation {relation}"
            ))
        })?;
        let has_qualifiers = self
            .statements
            .get(&old_uri)
            .is_some_and(|s| !s.qualifiers.is_empty());
        if has_qualifiers {
            return Err(NoemaError::Validation(
                "overwriting a statement with qualifiers is not supported".to_string(),
            ));
        }
        self.unlink_statement(&old_uri);
        self.set_relation(subject, relation, new_object)
    }

    fn mint_statement_identity(&mut self) -> Result<(Uri, String, Uri), NoemaError> {
        let active = self
            .active_namespace()
            .cloned()
            .ok_or(NoemaError::NoActiveNamespace)?;
        loop {
            let record = self
                .namespaces
                .get_mut(&active)
                .ok_or_else(|| NoemaError::NotFound(format!("namespace '{active}'")))?;
            let number = record
                .key_manager
                .next_number()
                .ok_or_else(|| NoemaError::KeyReservoirExhausted(active.to_string()))?;
            let key = format_short_key(KeyKind::Statement, false, number);
            let uri = make_uri(active.as_str(), &key);
            if !self.identity_taken(&uri) {
                return Ok((uri, key, active));
            }
        }
    }

    fn record_statement_in_namespace(&mut self, base: &Uri, stm_uri: &Uri) {
        if let Some(record) = self.namespaces.get_mut(base) {
            record.statements.push(stm_uri.clone());
        }
    }

    fn require_relation(&self, uri: &Uri) -> Result<(), NoemaError> {
        let entity = self
            .entities
            .get(uri)
            .ok_or_else(|| NoemaError::NotFound(uri.to_string()))?;
        if entity.kind != EntityKind::Relation {
            return Err(NoemaError::WrongEntityKind {
                uri: uri.to_string(),
                expected: EntityKind::Relation,
                actual: entity.kind,
            });
        }
        Ok(())
    }

    /// True if the relation carries an `R22 is functional = true` statement.
    #[must_use]
    pub fn relation_is_functional(&self, relation: &Uri) -> bool {
        self.relation_objects(relation, &builtins::r22())
            .iter()
            .filter_map(|o| o.as_literal())
            .any(|l| l.as_bool() == Some(true))
    }

    // =========================================================================
    // UNLINKING
    // =========================================================================

    /// Remove a statement from every data structure, together with its dual
    /// and its qualifiers (lockstep).
    pub(crate) fn unlink_statement(&mut self, uri: &Uri) {
        let Some(statement) = self.statements.remove(uri) else {
            return;
        };

        match statement.role {
            StatementRole::Primary => {
                remove_from_bucket(
                    &mut self.subject_index,
                    statement.subject.uri(),
                    &statement.predicate,
                    uri,
                );
                if let Some(bucket) = self.relation_index.get_mut(&statement.predicate) {
                    bucket.retain(|u| u != uri);
                    if bucket.is_empty() {
                        self.relation_index.remove(&statement.predicate);
                    }
                }
                // Qualifier statements with entity objects sit in the object
                // index themselves.
                if statement.is_qualifier() {
                    if let Some(obj_uri) = statement.object.as_entity() {
                        remove_from_bucket(
                            &mut self.object_index,
                            obj_uri,
                            &statement.predicate,
                            uri,
                        );
                    }
                }
            }
            StatementRole::Dual => {
                if let Some(obj_uri) = statement.object.as_entity() {
                    remove_from_bucket(&mut self.object_index, obj_uri, &statement.predicate, uri);
                }
            }
        }

        if let Some(scope_uri) = &statement.scope {
            if let Some(bucket) = self.scope_index.get_mut(scope_uri) {
                bucket.retain(|u| u != uri);
                if bucket.is_empty() {
                    self.scope_index.remove(scope_uri);
                }
            }
        }

        // A qualifier removes itself from its host's qualifier list.
        if let SubjectRef::Statement(host_uri) = &statement.subject {
            if let Some(host) = self.statements.get_mut(host_uri) {
                host.qualifiers.retain(|u| u != uri);
            }
        }

        // Dual and qualifiers go in lockstep.
        if let Some(dual_uri) = &statement.dual {
            self.unlink_statement(&dual_uri.clone());
        }
        for q_uri in &statement.qualifiers {
            self.unlink_statement(&q_uri.clone());
        }
    }

    /// Remove an entity and every statement that touches it.
    fn unlink_entity(&mut self, uri: &Uri) {
        if self.entities.remove(uri).is_none() {
            return;
        }
        self.capabilities.remove(uri);

        let mut doomed: Vec<Uri> = Vec::new();
        if let Some(rels) = self.subject_index.remove(uri) {
            doomed.extend(rels.into_values().flatten());
        }
        if let Some(rels) = self.object_index.remove(uri) {
            doomed.extend(rels.into_values().flatten());
        }
        if let Some(bucket) = self.relation_index.remove(uri) {
            doomed.extend(bucket);
        }
        if let Some(bucket) = self.scope_index.remove(uri) {
            doomed.extend(bucket);
        }
        for stm_uri in doomed {
            self.unlink_statement(&stm_uri);
        }
    }

    // =========================================================================
    // RETRIEVAL
    // =========================================================================

    /// Look up an entity by URI.
    #[must_use]
    pub fn entity(&self, uri: &Uri) -> Option<&Entity> {
        self.entities.get(uri)
    }

    /// Look up a statement by URI.
    #[must_use]
    pub fn statement(&self, uri: &Uri) -> Option<&Statement> {
        self.statements.get(uri)
    }

    /// All primary statements where `subject` (an entity or a statement) is
    /// the subject. Bucket order is deterministic; within a bucket,
    /// creation order.
    #[must_use]
    pub fn statements_with_subject(&self, subject: &Uri) -> Vec<&Statement> {
        self.subject_index
            .get(subject)
            .into_iter()
            .flat_map(|rels| rels.values())
            .flatten()
            .filter_map(|u| self.statements.get(u))
            .collect()
    }

    /// Primary statements of `subject` under `relation`, in creation order.
    #[must_use]
    pub fn statements_with_subject_for(&self, subject: &Uri, relation: &Uri) -> Vec<&Statement> {
        self.subject_index
            .get(subject)
            .and_then(|rels| rels.get(relation))
            .into_iter()
            .flatten()
            .filter_map(|u| self.statements.get(u))
            .collect()
    }

    /// Statements retrievable under `object`: the duals of entity-valued
    /// statements, plus qualifier statements pointing at the object.
    #[must_use]
    pub fn statements_with_object(&self, object: &Uri) -> Vec<&Statement> {
        self.object_index
            .get(object)
            .into_iter()
            .flat_map(|rels| rels.values())
            .flatten()
            .filter_map(|u| self.statements.get(u))
            .collect()
    }

    /// Statements under `object` restricted to one relation.
    #[must_use]
    pub fn statements_with_object_for(&self, object: &Uri, relation: &Uri) -> Vec<&Statement> {
        self.object_index
            .get(object)
            .and_then(|rels| rels.get(relation))
            .into_iter()
            .flatten()
            .filter_map(|u| self.statements.get(u))
            .collect()
    }

    /// All primary statements with the given predicate, in creation order.
    #[must_use]
    pub fn statements_for_relation(&self, relation: &Uri) -> Vec<&Statement> {
        self.relation_index
            .get(relation)
            .into_iter()
            .flatten()
            .filter_map(|u| self.statements.get(u))
            .collect()
    }

    /// Statements tagged into a scope item, in creation order.
    #[must_use]
    pub fn statements_in_scope(&self, scope: &Uri) -> Vec<&Statement> {
        self.scope_index
            .get(scope)
            .into_iter()
            .flatten()
            .filter_map(|u| self.statements.get(u))
            .collect()
    }

    /// The object values of `subject` under `relation`, in creation order.
    #[must_use]
    pub fn relation_objects(&self, subject: &Uri, relation: &Uri) -> Vec<ObjectValue> {
        self.statements_with_subject_for(subject, relation)
            .into_iter()
            .map(|s| s.object.clone())
            .collect()
    }

    /// The first object value of `subject` under `relation`, if any.
    #[must_use]
    pub fn first_relation_object(&self, subject: &Uri, relation: &Uri) -> Option<ObjectValue> {
        self.statements_with_subject_for(subject, relation)
            .first()
            .map(|s| s.object.clone())
    }

    /// The R1 label literal of an entity.
    #[must_use]
    pub fn label(&self, entity: &Uri) -> Option<Literal> {
        self.first_relation_object(entity, &builtins::r1())
            .and_then(|o| o.as_literal().cloned())
    }

    /// The R1 label text of an entity.
    #[must_use]
    pub fn label_text(&self, entity: &Uri) -> Option<String> {
        self.label(entity)
            .and_then(|l| l.as_text().map(str::to_string))
    }

    /// The R2 description text of an entity.
    #[must_use]
    pub fn description_text(&self, entity: &Uri) -> Option<String> {
        self.first_relation_object(entity, &builtins::r2())
            .and_then(|o| o.as_literal().and_then(|l| l.as_text().map(str::to_string)))
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of live primary statements (duals are bookkeeping and not
    /// counted).
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.statements
            .values()
            .filter(|s| s.role == StatementRole::Primary)
            .count()
    }

    /// All entities in deterministic (URI) order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// All statements (primaries and duals) in deterministic (URI) order.
    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.statements.values()
    }

    // =========================================================================
    // TAXONOMY QUERIES
    // =========================================================================

    /// True if `item` reaches `ancestor` over R3 subclass-of edges
    /// (transitive, irreflexive: an item is not a subclass of itself).
    #[must_use]
    pub fn is_subclass_of(&self, item: &Uri, ancestor: &Uri) -> bool {
        let mut visited = std::collections::BTreeSet::new();
        let mut frontier = vec![item.clone()];
        while let Some(current) = frontier.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            for parent in self.relation_objects(&current, &builtins::r3()) {
                if let ObjectValue::Entity(parent_uri) = parent {
                    if parent_uri == *ancestor {
                        return true;
                    }
                    frontier.push(parent_uri);
                }
            }
        }
        false
    }

    /// True if `instance` has an R4 class equal to `class` or a subclass of
    /// it.
    #[must_use]
    pub fn is_instance_of(&self, instance: &Uri, class: &Uri) -> bool {
        self.relation_objects(instance, &builtins::r4())
            .into_iter()
            .filter_map(|o| match o {
                ObjectValue::Entity(u) => Some(u),
                ObjectValue::Literal(_) => None,
            })
            .any(|parent| parent == *class || self.is_subclass_of(&parent, class))
    }

    fn is_instance_of_key(&self, instance: &Uri, class: &Uri) -> bool {
        self.is_instance_of(instance, class)
    }

    // =========================================================================
    // CAPABILITIES
    // =========================================================================

    /// Attach a named capability to an entity. Attaching under an occupied
    /// name replaces the previous capability. Already-existing subclasses
    /// and instances are not affected (snapshot semantics).
    pub fn add_capability(
        &mut self,
        entity: &Uri,
        name: &str,
        func: CapabilityFn,
    ) -> Result<(), NoemaError> {
        if !self.entities.contains_key(entity) {
            return Err(NoemaError::NotFound(entity.to_string()));
        }
        self.capabilities
            .entry(entity.clone())
            .or_default()
            .insert(Capability::new(name, func), CapabilityPolicy::LastWins);
        Ok(())
    }

    /// True if the entity carries a capability under `name`.
    #[must_use]
    pub fn has_capability(&self, entity: &Uri, name: &str) -> bool {
        self.capabilities
            .get(entity)
            .is_some_and(|t| t.get(name).is_some())
    }

    /// Hook names attached to an entity, in deterministic order.
    #[must_use]
    pub fn capability_names(&self, entity: &Uri) -> Vec<String> {
        self.capabilities
            .get(entity)
            .map(|t| t.names().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Invoke an entity as a callable. Dispatches to the capability stored
    /// under the custom-call hook; entities without it are not callable.
    pub fn call(
        &mut self,
        entity: &Uri,
        args: &[ObjectValue],
    ) -> Result<ObjectValue, NoemaError> {
        if !self.entities.contains_key(entity) {
            return Err(NoemaError::NotFound(entity.to_string()));
        }
        let capability = self
            .capabilities
            .get(entity)
            .and_then(|t| t.get(CUSTOM_CALL_HOOK))
            .cloned()
            .ok_or_else(|| NoemaError::NotCallable(entity.to_string()))?;
        capability.invoke(self, entity, args)
    }

    /// The conflict precedence used when capability tables are inherited.
    #[must_use]
    pub fn capability_policy(&self) -> CapabilityPolicy {
        self.policy
    }

    /// Change the conflict precedence for subsequently created entities.
    pub fn set_capability_policy(&mut self, policy: CapabilityPolicy) {
        self.policy = policy;
    }

    /// Full reset: drop all state and re-bootstrap the built-in namespace.
    /// Intended for test isolation; there is no partial rollback.
    pub fn reset(&mut self) -> Result<(), NoemaError> {
        *self = Self::new()?;
        Ok(())
    }
}

/// Remove `uri` from a two-level index bucket, pruning empty levels.
fn remove_from_bucket(
    index: &mut BTreeMap<Uri, BTreeMap<Uri, Vec<Uri>>>,
    outer: &Uri,
    inner: &Uri,
    uri: &Uri,
) {
    if let Some(rels) = index.get_mut(outer) {
        if let Some(bucket) = rels.get_mut(inner) {
            bucket.retain(|u| u != uri);
            if bucket.is_empty() {
                rels.remove(inner);
            }
        }
        if rels.is_empty() {
            index.remove(outer);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MOD: &str = "noema:/test/mod0";

    fn graph_with_mod() -> KnowledgeGraph {
        let mut g = KnowledgeGraph::new().expect("builtins");
        g.register_namespace(MOD, "tm", None).expect("register");
        g.push_namespace(MOD).expect("push");
        g
    }

    #[test]
    fn create_item_registers_identity_and_label_statement() {
        let mut g = graph_with_mod();
        let before = g.statement_count();
        let item = g
            .create_item("I1000", ItemSpec::new().label("test item"))
            .expect("create");
        assert_eq!(item.as_str(), "noema:/test/mod0#I1000");
        assert_eq!(g.label_text(&item).as_deref(), Some("test item"));
        // Creation wrote at least the identity-establishing statement.
        assert!(g.statement_count() > before);
    }

    #[test]
    fn duplicate_key_is_identity_conflict() {
        let mut g = graph_with_mod();
        g.create_item("I1000", ItemSpec::new()).expect("create");
        let err = g.create_item("I1000", ItemSpec::new());
        assert!(matches!(err, Err(NoemaError::IdentityConflict(_))));
    }

    #[test]
    fn create_without_active_namespace_fails() {
        let mut g = KnowledgeGraph::new().expect("builtins");
        let err = g.create_item("I1000", ItemSpec::new());
        assert!(matches!(err, Err(NoemaError::NoActiveNamespace)));
    }

    #[test]
    fn non_relation_predicate_is_wrong_kind() {
        let mut g = graph_with_mod();
        let a = g.create_item("I1000", ItemSpec::new()).expect("create");
        let b = g.create_item("I1001", ItemSpec::new()).expect("create");
        let err = g.set_relation(&a, &b, ObjectValue::from(true));
        assert!(matches!(err, Err(NoemaError::WrongEntityKind { .. })));
    }

    #[test]
    fn dual_statement_created_and_indexed() {
        let mut g = graph_with_mod();
        let r = g
            .create_relation("R1000", RelationSpec::new().label("points at"))
            .expect("rel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let b = g.create_item("I1001", ItemSpec::new()).expect("b");

        let stm_uri = g.set_relation(&a, &r, b.clone().into()).expect("stm");
        let stm = g.statement(&stm_uri).expect("stored");
        let dual_uri = stm.dual.clone().expect("dual exists");
        let dual = g.statement(&dual_uri).expect("dual stored");

        assert_eq!(dual.role, StatementRole::Dual);
        assert_eq!(dual.dual.as_ref(), Some(&stm_uri));
        assert_eq!(dual.subject.uri(), &a);
        assert_eq!(dual.object.as_entity(), Some(&b));

        // Subject index yields the primary, object index the dual.
        let by_subject = g.statements_with_subject_for(&a, &r);
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].uri, stm_uri);
        let by_object = g.statements_with_object_for(&b, &r);
        assert_eq!(by_object.len(), 1);
        assert_eq!(by_object[0].uri, dual_uri);
    }

    #[test]
    fn literal_object_has_no_dual() {
        let mut g = graph_with_mod();
        let r = g
            .create_relation("R1000", RelationSpec::new())
            .expect("rel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let stm_uri = g.set_relation(&a, &r, 42i64.into()).expect("stm");
        assert!(g.statement(&stm_uri).expect("stm").dual.is_none());
    }

    #[test]
    fn duplicate_triples_are_allowed() {
        let mut g = graph_with_mod();
        let r = g
            .create_relation("R1000", RelationSpec::new())
            .expect("rel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let b = g.create_item("I1001", ItemSpec::new()).expect("b");
        let s1 = g.set_relation(&a, &r, b.clone().into()).expect("first");
        let s2 = g.set_relation(&a, &r, b.clone().into()).expect("second");
        assert_ne!(s1, s2);
        assert_eq!(g.statements_with_subject_for(&a, &r).len(), 2);
    }

    #[test]
    fn functional_relation_rejects_second_statement() {
        let mut g = graph_with_mod();
        let r = g
            .create_relation("R1000", RelationSpec::new().functional())
            .expect("rel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        g.set_relation(&a, &r, 1i64.into()).expect("first");
        let err = g.set_relation(&a, &r, 2i64.into());
        assert!(matches!(err, Err(NoemaError::FunctionalRelation(_))));
    }

    #[test]
    fn qualifier_statements_have_host_as_subject() {
        let mut g = graph_with_mod();
        let r = g
            .create_relation("R1000", RelationSpec::new())
            .expect("rel");
        let q = g
            .create_relation("R1001", RelationSpec::new().label("start year"))
            .expect("qrel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let b = g.create_item("I1001", ItemSpec::new()).expect("b");

        let factory = crate::statement::QualifierFactory::new(q.clone());
        let stm_uri = g
            .set_relation_with_qualifiers(&a, &r, b.into(), vec![factory.of(1964i64)])
            .expect("stm");

        let quals = g.statements_with_subject_for(&stm_uri, &q);
        assert_eq!(quals.len(), 1);
        assert!(quals[0].is_qualifier());
        assert_eq!(
            quals[0].object.as_literal().and_then(Literal::as_int),
            Some(1964)
        );
        // The host statement lists its qualifier.
        let host = g.statement(&stm_uri).expect("host");
        assert_eq!(host.qualifiers.len(), 1);
    }

    #[test]
    fn attach_qualifier_after_creation() {
        let mut g = graph_with_mod();
        let r = g.create_relation("R1000", RelationSpec::new()).expect("r");
        let q = g.create_relation("R1001", RelationSpec::new()).expect("q");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let stm_uri = g.set_relation(&a, &r, 1i64.into()).expect("stm");

        let factory = crate::statement::QualifierFactory::new(q.clone());
        let q_uri = g
            .attach_qualifier(&stm_uri, factory.of(true))
            .expect("attach");
        assert_eq!(
            g.statement(&stm_uri).expect("host").qualifiers,
            vec![q_uri]
        );
    }

    #[test]
    fn overwrite_relation_replaces_single_statement() {
        let mut g = graph_with_mod();
        let r = g
            .create_relation("R1000", RelationSpec::new().functional())
            .expect("rel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        g.set_relation(&a, &r, 1i64.into()).expect("first");
        g.overwrite_relation(&a, &r, 2i64.into()).expect("overwrite");

        let objects = g.relation_objects(&a, &r);
        assert_eq!(objects.len(), 1);
        assert_eq!(
            objects[0].as_literal().and_then(Literal::as_int),
            Some(2)
        );
    }

    #[test]
    fn resolution_returns_registered_identity() {
        let mut g = graph_with_mod();
        let item = g
            .create_item("I1000", ItemSpec::new().label("my item"))
            .expect("create");
        let resolved = g.resolve("I1000").expect("resolve");
        assert_eq!(resolved.uri, item);
        // Full-URI resolution hits the same identity.
        let by_uri = g.resolve(item.as_str()).expect("by uri");
        assert_eq!(by_uri.uri, item);
    }

    #[test]
    fn five_notations_resolve_to_same_entity() {
        let mut g = graph_with_mod();
        let item = g
            .create_item("I1000", ItemSpec::new().label("my item"))
            .expect("create");
        for notation in [
            "I1000",
            "I1000__my_item",
            "tm__I1000",
            "tm__I1000__my_item",
            "I1000[\"my item\"]",
            "tm__I1000[\"my item\"]",
        ] {
            let resolved = g.resolve(notation).expect("resolve");
            assert_eq!(resolved.uri, item, "notation '{notation}'");
        }
    }

    #[test]
    fn label_mismatch_is_rejected() {
        let mut g = graph_with_mod();
        g.create_item("I1000", ItemSpec::new().label("my item"))
            .expect("create");
        let err = g.resolve("I1000__wrong_label");
        assert!(matches!(err, Err(NoemaError::Validation(_))));
    }

    #[test]
    fn unknown_prefix_is_reported() {
        let g = KnowledgeGraph::new().expect("builtins");
        let err = g.resolve("zz__I1");
        assert!(matches!(err, Err(NoemaError::UnknownPrefix(_))));
    }

    #[test]
    fn unresolvable_key_is_not_found() {
        let g = KnowledgeGraph::new().expect("builtins");
        let err = g.resolve("I99999");
        assert!(matches!(err, Err(NoemaError::NotFound(_))));
    }

    #[test]
    fn instance_of_creates_auto_item_with_r4() {
        let mut g = graph_with_mod();
        let class = g
            .create_item("I1000", ItemSpec::new().label("matrix"))
            .expect("class");
        let inst = g.instance_of("I1000").expect("instance");

        let entity = g.entity(&inst).expect("entity");
        assert!(entity.auto_generated);
        assert!(entity.short_key.starts_with("Ia"));
        assert!(g.is_instance_of(&inst, &class));
        assert_eq!(
            g.label_text(&inst).as_deref(),
            Some("instance of matrix")
        );
    }

    #[test]
    fn capability_snapshot_at_creation_time() {
        let mut g = graph_with_mod();
        let class = g.create_item("I1000", ItemSpec::new()).expect("class");

        // Instance created before the capability is attached: not callable.
        let early = g.instance_of("I1000").expect("early instance");

        g.add_capability(
            &class,
            CUSTOM_CALL_HOOK,
            Arc::new(|_, _, _| Ok(ObjectValue::from(7i64))),
        )
        .expect("add");

        // Instance created after: callable.
        let late = g.instance_of("I1000").expect("late instance");

        let err = g.call(&early, &[]);
        assert!(matches!(err, Err(NoemaError::NotCallable(_))));

        let result = g.call(&late, &[]).expect("call");
        assert_eq!(result.as_literal().and_then(Literal::as_int), Some(7));
    }

    #[test]
    fn capability_conflict_policy_is_configurable() {
        let mut g = graph_with_mod();
        let p1 = g.create_item("I1000", ItemSpec::new()).expect("p1");
        let p2 = g.create_item("I1001", ItemSpec::new()).expect("p2");
        g.add_capability(
            &p1,
            CUSTOM_CALL_HOOK,
            Arc::new(|_, _, _| Ok(ObjectValue::from(1i64))),
        )
        .expect("add");
        g.add_capability(
            &p2,
            CUSTOM_CALL_HOOK,
            Arc::new(|_, _, _| Ok(ObjectValue::from(2i64))),
        )
        .expect("add");

        // Default LastWins: the later parent provides the hook.
        let child = g
            .create_item(
                "I1002",
                ItemSpec::new().subclass_of("I1000").subclass_of("I1001"),
            )
            .expect("child");
        let got = g.call(&child, &[]).expect("call");
        assert_eq!(got.as_literal().and_then(Literal::as_int), Some(2));

        // FirstWins: the earlier parent sticks.
        g.set_capability_policy(CapabilityPolicy::FirstWins);
        let child2 = g
            .create_item(
                "I1003",
                ItemSpec::new().subclass_of("I1000").subclass_of("I1001"),
            )
            .expect("child2");
        let got = g.call(&child2, &[]).expect("call");
        assert_eq!(got.as_literal().and_then(Literal::as_int), Some(1));
    }

    #[test]
    fn subclass_transitivity() {
        let mut g = graph_with_mod();
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let _b = g
            .create_item("I1001", ItemSpec::new().subclass_of("I1000"))
            .expect("b");
        let c = g
            .create_item("I1002", ItemSpec::new().subclass_of("I1001"))
            .expect("c");
        assert!(g.is_subclass_of(&c, &a));
        assert!(!g.is_subclass_of(&a, &c));
        // Irreflexive.
        assert!(!g.is_subclass_of(&a, &a));
    }

    #[test]
    fn unload_namespace_removes_entities_and_statements() {
        let mut g = graph_with_mod();
        let r = g.create_relation("R1000", RelationSpec::new()).expect("r");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let b = g.create_item("I1001", ItemSpec::new()).expect("b");
        g.set_relation(&a, &r, b.clone().into()).expect("stm");
        g.pop_namespace().expect("pop");

        g.unload_namespace(MOD).expect("unload");

        assert!(g.entity(&a).is_none());
        assert!(g.statements_with_subject(&a).is_empty());
        assert!(g.statements_with_object(&b).is_empty());
        assert!(matches!(g.resolve("tm__I1000"), Err(NoemaError::UnknownPrefix(_))));
        // Builtins survive.
        assert!(g.resolve("bi__R1").is_ok());
    }

    #[test]
    fn unload_active_namespace_is_refused() {
        let mut g = graph_with_mod();
        let err = g.unload_namespace(MOD);
        assert!(matches!(err, Err(NoemaError::Validation(_))));
    }

    #[test]
    fn reset_restores_bootstrap_state() {
        let mut g = graph_with_mod();
        g.create_item("I1000", ItemSpec::new()).expect("create");
        g.reset().expect("reset");
        assert!(matches!(g.resolve("tm__I1000"), Err(NoemaError::UnknownPrefix(_))));
        assert!(g.resolve("bi__R1").is_ok());
        assert!(g.active_namespace().is_none());
    }

    #[test]
    fn overwrite_keeps_dual_bookkeeping_consistent() {
        let mut g = graph_with_mod();
        let r = g
            .create_relation("R1000", RelationSpec::new().functional())
            .expect("rel");
        let a = g.create_item("I1000", ItemSpec::new()).expect("a");
        let b = g.create_item("I1001", ItemSpec::new()).expect("b");
        let c = g.create_item("I1002", ItemSpec::new()).expect("c");

        g.set_relation(&a, &r, b.clone().into()).expect("first");
        g.overwrite_relation(&a, &r, c.clone().into())
            .expect("overwrite");

        assert!(g.statements_with_object_for(&b, &r).is_empty());
        assert_eq!(g.statements_with_object_for(&c, &r).len(), 1);
    }
}
