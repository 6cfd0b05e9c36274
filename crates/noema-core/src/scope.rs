//! # Scoped Sub-Graphs
//!
//! Scope contexts group statements under a named sub-graph (setting,
//! premise, assertion, quantified sub-scopes) belonging to a parent entity,
//! e.g. the premise of a theorem.
//!
//! The Python-style `with` block of the original maps to an owned guard
//! object: [`ScopeContext`] is created open, tags every statement made
//! through it, and finalizes on [`ScopeContext::close`], or on drop, so
//! the scope-stack bookkeeping runs even when an error path abandons the
//! context early. Statements written before such an abandonment are not
//! retracted (there is no transaction layer).

use crate::builtins;
use crate::graph::KnowledgeGraph;
use crate::primitives::MAX_SCOPE_DEPTH;
use crate::statement::RawQualifier;
use crate::types::{Literal, NoemaError, ObjectValue, SubjectRef, Uri};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// SCOPE TYPE
// =============================================================================

/// The scope-type tag attached to every scope item via R64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScopeType {
    /// Variable declarations shared by the other scopes of the parent.
    Setting,
    /// The if-part of an implication.
    Premise,
    /// The then-part of an implication.
    Assertion,
    /// Universally quantified sub-scope.
    UnivQuant,
    /// Existentially quantified sub-scope.
    ExisQuant,
}

impl ScopeType {
    /// The tag literal stored as the R64 object.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Setting => "SETTING",
            Self::Premise => "PREMISE",
            Self::Assertion => "ASSERTION",
            Self::UnivQuant => "UNIV_QUANT",
            Self::ExisQuant => "EXIS_QUANT",
        }
    }

    /// Map a scope name (as passed to [`KnowledgeGraph::scope`]) to a type.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "setting" => Some(Self::Setting),
            "premise" => Some(Self::Premise),
            "assertion" => Some(Self::Assertion),
            _ => None,
        }
    }

    /// True for the quantifier sub-scope types.
    #[must_use]
    pub const fn is_quantifier(self) -> bool {
        matches!(self, Self::UnivQuant | Self::ExisQuant)
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// SCOPE OPENING
// =============================================================================

impl KnowledgeGraph {
    /// Open a scope named `setting`/`premise`/`assertion` on a parent item.
    ///
    /// Creates the scope item (an auto-keyed instance of the built-in scope
    /// class), links it to the parent via `R21 is scope of`, tags it with
    /// `R64 has scope type`, and pushes it on the scope stack. The returned
    /// context must be [`ScopeContext::close`]d; dropping it unclosed
    /// finalizes the bookkeeping as well.
    pub fn scope(&mut self, parent: &Uri, name: &str) -> Result<ScopeContext<'_>, NoemaError> {
        let scope_type = ScopeType::from_name(name).ok_or_else(|| {
            NoemaError::Validation(format!(
                "unknown scope name '{name}' (expected setting, premise or assertion)"
            ))
        })?;
        if self.entity(parent).is_none() {
            return Err(NoemaError::NotFound(parent.to_string()));
        }
        let scope_item = open_scope_item(self, parent, name, scope_type)?;
        Ok(ScopeContext {
            graph: self,
            parent: parent.clone(),
            scope: scope_item,
            scope_type,
            namespace: BTreeMap::new(),
            closed: false,
        })
    }

    /// All scope items linked to `parent` via `R21 is scope of`, in
    /// creation order.
    #[must_use]
    pub fn scopes_of(&self, parent: &Uri) -> Vec<Uri> {
        self.statements_with_object_for(parent, &builtins::r21())
            .into_iter()
            .map(|stm| stm.subject.uri().clone())
            .collect()
    }

    /// The scope-type tag of a scope item, if it has one.
    #[must_use]
    pub fn scope_type_of(&self, scope_item: &Uri) -> Option<String> {
        self.first_relation_object(scope_item, &builtins::r64())
            .and_then(|o| o.as_literal().and_then(|l| l.as_text().map(str::to_string)))
    }
}

/// Create and wire one scope item under `parent`, and push it on the
/// scope stack.
fn open_scope_item(
    graph: &mut KnowledgeGraph,
    parent: &Uri,
    name: &str,
    scope_type: ScopeType,
) -> Result<Uri, NoemaError> {
    if graph.scope_stack.len() >= MAX_SCOPE_DEPTH {
        return Err(NoemaError::Scope(format!(
            "scope nesting deeper than {MAX_SCOPE_DEPTH} is not allowed"
        )));
    }

    let scope_label = format!("scp__{name}");
    let duplicate = graph
        .scopes_of(parent)
        .iter()
        .any(|existing| graph.label_text(existing).as_deref() == Some(scope_label.as_str()));
    if duplicate {
        return Err(NoemaError::Validation(format!(
            "{parent} already has a scope named '{name}'"
        )));
    }

    let parent_label = graph
        .label_text(parent)
        .unwrap_or_else(|| parent.to_string());
    let scope_item = graph.instance_of_with(
        builtins::i16().as_str(),
        Some(&scope_label),
        Vec::new(),
    )?;
    graph.set_relation(
        &scope_item,
        &builtins::r2(),
        Literal::text(format!("scope of {parent_label}")).into(),
    )?;
    graph.set_relation(&scope_item, &builtins::r21(), parent.clone().into())?;
    graph.set_relation(
        &scope_item,
        &builtins::r64(),
        Literal::text(scope_type.tag()).into(),
    )?;

    graph.scope_stack.push(scope_item.clone());
    Ok(scope_item)
}

// =============================================================================
// SCOPE CONTEXT
// =============================================================================

/// An open scope: statements created through it are tagged with a
/// `has defining scope` qualifier pointing at the scope item.
///
/// Lifecycle: opened by [`KnowledgeGraph::scope`] (or a quantifier
/// sub-scope method), active while it exists, closed by
/// [`ScopeContext::close`] or drop. After closing, no further statements
/// can be tagged into the scope; the scope item and its statements remain
/// in the graph permanently.
pub struct ScopeContext<'g> {
    graph: &'g mut KnowledgeGraph,
    parent: Uri,
    scope: Uri,
    scope_type: ScopeType,
    /// Local variable bindings: name → entity, explicit lookup only.
    namespace: BTreeMap<String, Uri>,
    closed: bool,
}

impl<'g> ScopeContext<'g> {
    /// The scope item of this context.
    #[must_use]
    pub fn scope_item(&self) -> &Uri {
        &self.scope
    }

    /// The parent entity the scope belongs to.
    #[must_use]
    pub fn parent(&self) -> &Uri {
        &self.parent
    }

    /// The scope-type tag of this context.
    #[must_use]
    pub fn scope_type(&self) -> ScopeType {
        self.scope_type
    }

    /// Read-only access to the underlying graph.
    #[must_use]
    pub fn graph(&self) -> &KnowledgeGraph {
        self.graph
    }

    /// Create an instance of `class_key` and bind it to `name` in this
    /// scope.
    ///
    /// The variable is linked to the scope item via `R20 has defining
    /// scope` and `R23 has name in scope`; its instance-creation statement
    /// carries the scope qualifier like every other statement created in
    /// the context.
    pub fn new_var(&mut self, name: &str, class_key: &str) -> Result<Uri, NoemaError> {
        self.create_var(name, class_key, Vec::new())
    }

    /// [`Self::new_var`] for quantifier sub-scopes: additionally attaches
    /// the matching boolean quantification qualifier (R44/R66) to the
    /// instance-creation statement.
    pub fn new_condition_var(&mut self, name: &str, class_key: &str) -> Result<Uri, NoemaError> {
        let quantifier = match self.scope_type {
            ScopeType::UnivQuant => builtins::univ_quant().of_bool(true),
            ScopeType::ExisQuant => builtins::exis_quant().of_bool(true),
            other => {
                return Err(NoemaError::Scope(format!(
                    "new_condition_var is only valid in a quantifier sub-scope, not {other}"
                )));
            }
        };
        self.create_var(name, class_key, vec![quantifier])
    }

    fn create_var(
        &mut self,
        name: &str,
        class_key: &str,
        extra_qualifiers: Vec<RawQualifier>,
    ) -> Result<Uri, NoemaError> {
        self.check_active()?;
        if self.namespace.contains_key(name) {
            return Err(NoemaError::Validation(format!(
                "the name '{name}' is already bound in scope {}",
                self.scope
            )));
        }

        let mut qualifiers = vec![builtins::has_defining_scope().of(self.scope.clone())];
        qualifiers.extend(extra_qualifiers);
        let var = self
            .graph
            .instance_of_with(class_key, Some(name), qualifiers)?;

        self.graph
            .set_relation(&var, &builtins::r20(), self.scope.clone().into())?;
        self.graph
            .set_relation(&var, &builtins::r23(), Literal::text(name).into())?;

        self.namespace.insert(name.to_string(), var.clone());
        Ok(var)
    }

    /// Look up a variable bound in this context (or inherited from the
    /// parent context, for sub-scopes).
    pub fn var(&self, name: &str) -> Result<&Uri, NoemaError> {
        self.namespace
            .get(name)
            .ok_or_else(|| NoemaError::NotFound(format!("scope variable '{name}'")))
    }

    /// Create a statement in this scope. The statement carries a
    /// `has defining scope` qualifier pointing at the scope item.
    pub fn new_statement(
        &mut self,
        subject: &Uri,
        relation: &Uri,
        object: impl Into<ObjectValue>,
    ) -> Result<Uri, NoemaError> {
        self.new_statement_with_qualifiers(subject, relation, object, Vec::new())
    }

    /// [`Self::new_statement`] with additional qualifiers.
    pub fn new_statement_with_qualifiers(
        &mut self,
        subject: &Uri,
        relation: &Uri,
        object: impl Into<ObjectValue>,
        qualifiers: Vec<RawQualifier>,
    ) -> Result<Uri, NoemaError> {
        self.check_active()?;
        self.graph.set_relation_full(
            SubjectRef::Entity(subject.clone()),
            relation,
            object.into(),
            qualifiers,
            Some(self.scope.clone()),
        )
    }

    /// Open a universally quantified sub-scope. While the sub-scope is
    /// open, this context is inactive; variables of this context stay
    /// visible in the sub-scope.
    pub fn universally_quantified(&mut self) -> Result<ScopeContext<'_>, NoemaError> {
        self.subscope(ScopeType::UnivQuant)
    }

    /// Open an existentially quantified sub-scope.
    pub fn existentially_quantified(&mut self) -> Result<ScopeContext<'_>, NoemaError> {
        self.subscope(ScopeType::ExisQuant)
    }

    fn subscope(&mut self, scope_type: ScopeType) -> Result<ScopeContext<'_>, NoemaError> {
        self.check_active()?;

        // Multiple sub-scopes of the same type are allowed; number them.
        let sibling_count = self
            .graph
            .scopes_of(&self.scope)
            .iter()
            .filter(|s| self.graph.scope_type_of(s).as_deref() == Some(scope_type.tag()))
            .count();
        let name = format!("{}{}", scope_type.tag().to_lowercase(), sibling_count);

        // The sub-scope item is R21-linked to this context's scope item.
        let scope_item = open_scope_item(self.graph, &self.scope.clone(), &name, scope_type)?;

        Ok(ScopeContext {
            graph: &mut *self.graph,
            parent: self.parent.clone(),
            scope: scope_item,
            scope_type,
            // Sub-scopes see the variables introduced so far.
            namespace: self.namespace.clone(),
            closed: false,
        })
    }

    /// Exit the scope: pops it from the scope stack and consumes the
    /// context. Fails if this scope is not the topmost open scope.
    pub fn close(mut self) -> Result<(), NoemaError> {
        self.finalize()
    }

    fn check_active(&self) -> Result<(), NoemaError> {
        if self.graph.scope_stack.last() != Some(&self.scope) {
            return Err(NoemaError::Scope(format!(
                "scope {} is not the active scope",
                self.scope
            )));
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<(), NoemaError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.graph.scope_stack.last() {
            Some(top) if top == &self.scope => {
                self.graph.scope_stack.pop();
                Ok(())
            }
            other => Err(NoemaError::Scope(format!(
                "refusing to close {}: active scope is {:?}",
                self.scope, other
            ))),
        }
    }
}

impl Drop for ScopeContext<'_> {
    fn drop(&mut self) {
        // Guaranteed finalization: the scope-stack bookkeeping runs even if
        // the context is abandoned on an error path. Statements already
        // written stay in the graph.
        let _ = self.finalize();
    }
}

impl fmt::Debug for ScopeContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeContext")
            .field("parent", &self.parent)
            .field("scope", &self.scope)
            .field("scope_type", &self.scope_type)
            .field("closed", &self.closed)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
