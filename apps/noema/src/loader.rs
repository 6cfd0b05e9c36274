//! # Module Loader
//!
//! Loads declarative TOML knowledge modules into a [`KnowledgeGraph`].
//!
//! A module file declares one namespace: its URI and prefix, the modules it
//! uses, and its relations, items and statements. The loader registers the
//! namespace and replays the declarations through the engine's creation
//! API; entity definitions may reference other loaded modules through
//! prefixed keys.
//!
//! ```toml
//! uri = "noema:/demo/employment"
//! prefix = "em"
//!
//! [[relations]]
//! key = "R7301"
//! label = "has employer"
//!
//! [[items]]
//! key = "I2746"
//! label = "Rudolf Kalman"
//! instance_of = ["bi__I1"]
//!
//! [[statements]]
//! subject = "I2746"
//! predicate = "R7301"
//! object = "I7304"
//!
//! [[statements.qualifiers]]
//! predicate = "R7302"
//! value = 1964
//! ```

use noema_core::{
    ItemSpec, KnowledgeGraph, LangTag, Literal, NoemaError, ObjectValue, QualifierFactory,
    RawQualifier, RelationSpec, Uri,
};
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;

/// Maximum size of a module file (10 MB). Larger files are rejected before
/// parsing.
pub const MAX_MODULE_FILE_SIZE: u64 = 10 * 1024 * 1024;

// =============================================================================
// FILE FORMAT
// =============================================================================

/// Top-level structure of a module file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleFile {
    /// Namespace base URI of this module.
    uri: String,
    /// Namespace prefix of this module.
    prefix: String,
    /// Optional seed for the namespace key reservoir.
    keyseed: Option<u64>,
    /// Modules this one references through their prefixes. They must be
    /// loaded already.
    #[serde(default)]
    uses: Vec<UseDecl>,
    #[serde(default)]
    relations: Vec<RelationDecl>,
    #[serde(default)]
    items: Vec<ItemDecl>,
    #[serde(default)]
    statements: Vec<StatementDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UseDecl {
    uri: String,
    prefix: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationDecl {
    key: String,
    label: Option<String>,
    description: Option<String>,
    #[serde(default)]
    functional: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ItemDecl {
    key: String,
    label: Option<String>,
    description: Option<String>,
    #[serde(default)]
    instance_of: Vec<String>,
    #[serde(default)]
    subclass_of: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StatementDecl {
    subject: String,
    predicate: String,
    /// Entity reference (key in any notation). Exactly one of `object` and
    /// `value` must be present.
    object: Option<String>,
    /// Literal value (string, integer, float or boolean).
    value: Option<toml::Value>,
    /// Optional language tag for a string `value`.
    lang: Option<String>,
    #[serde(default)]
    qualifiers: Vec<QualifierDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QualifierDecl {
    predicate: String,
    object: Option<String>,
    value: Option<toml::Value>,
    lang: Option<String>,
}

// =============================================================================
// NAMESPACE HANDLE
// =============================================================================

/// Summary of one loaded module, handed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceHandle {
    /// Namespace base URI.
    pub uri: String,
    /// Namespace prefix as registered.
    pub prefix: String,
    /// Number of entities the module defined.
    pub entity_count: usize,
    /// Number of statement records the module created.
    pub statement_count: usize,
}

// =============================================================================
// LOADING
// =============================================================================

/// Load a module file into the graph.
///
/// `prefix_override` replaces the prefix declared in the file, which allows
/// resolving prefix collisions between independently authored modules.
pub fn load(
    graph: &mut KnowledgeGraph,
    path: &Path,
    prefix_override: Option<&str>,
) -> Result<NamespaceHandle, NoemaError> {
    let text = read_module_file(path)?;
    let module: ModuleFile = toml::from_str(&text)
        .map_err(|e| NoemaError::Parse(format!("{}: {e}", path.display())))?;

    let prefix = prefix_override.unwrap_or(&module.prefix).to_string();

    for used in &module.uses {
        let registered = graph.namespace(&used.uri).ok_or_else(|| {
            NoemaError::NotFound(format!(
                "module '{}' uses '{}', which is not loaded",
                module.uri, used.uri
            ))
        })?;
        if registered.prefix() != used.prefix {
            return Err(NoemaError::Validation(format!(
                "module '{}' expects '{}' under prefix '{}', but it is registered as '{}'",
                module.uri,
                used.uri,
                used.prefix,
                registered.prefix()
            )));
        }
    }

    graph.register_namespace(&module.uri, &prefix, module.keyseed)?;
    let loaded = graph.in_namespace(&module.uri, |g| {
        for relation in &module.relations {
            let mut spec = RelationSpec::new();
            if let Some(label) = &relation.label {
                spec = spec.label(label);
            }
            if let Some(description) = &relation.description {
                spec = spec.description(description);
            }
            if relation.functional {
                spec = spec.functional();
            }
            g.create_relation(&relation.key, spec)?;
        }

        for item in &module.items {
            let mut spec = ItemSpec::new();
            if let Some(label) = &item.label {
                spec = spec.label(label);
            }
            if let Some(description) = &item.description {
                spec = spec.description(description);
            }
            for class_key in &item.subclass_of {
                spec = spec.subclass_of(class_key);
            }
            for class_key in &item.instance_of {
                spec = spec.instance_of(class_key);
            }
            g.create_item(&item.key, spec)?;
        }

        for statement in &module.statements {
            let subject = g.resolve_uri(&statement.subject)?;
            let predicate = g.resolve_uri(&statement.predicate)?;
            let object = declared_object(
                g,
                statement.object.as_deref(),
                statement.value.as_ref(),
                statement.lang.as_deref(),
            )?;
            let qualifiers = statement
                .qualifiers
                .iter()
                .map(|q| declared_qualifier(g, q))
                .collect::<Result<Vec<_>, _>>()?;
            g.set_relation_with_qualifiers(&subject, &predicate, object, qualifiers)?;
        }
        Ok(())
    });

    if let Err(error) = loaded {
        tracing::warn!(
            uri = %module.uri,
            %error,
            "module load failed; partially created entities stay in the store until the \
             namespace is unloaded"
        );
        return Err(error);
    }

    let record = graph
        .namespace(&module.uri)
        .ok_or_else(|| NoemaError::NotFound(module.uri.clone()))?;
    Ok(NamespaceHandle {
        uri: module.uri.clone(),
        prefix,
        entity_count: record.entities().len(),
        statement_count: record.statement_count(),
    })
}

/// Resolve a declared statement object: an entity reference or a literal.
fn declared_object(
    graph: &KnowledgeGraph,
    object: Option<&str>,
    value: Option<&toml::Value>,
    lang: Option<&str>,
) -> Result<ObjectValue, NoemaError> {
    match (object, value) {
        (Some(key), None) => Ok(ObjectValue::Entity(graph.resolve_uri(key)?)),
        (None, Some(v)) => Ok(ObjectValue::Literal(literal_from_toml(v, lang)?)),
        _ => Err(NoemaError::Parse(
            "a statement needs exactly one of `object` (entity reference) and `value` (literal)"
                .to_string(),
        )),
    }
}

fn declared_qualifier(
    graph: &KnowledgeGraph,
    declaration: &QualifierDecl,
) -> Result<RawQualifier, NoemaError> {
    let relation: Uri = graph.resolve_uri(&declaration.predicate)?;
    let object = declared_object(
        graph,
        declaration.object.as_deref(),
        declaration.value.as_ref(),
        declaration.lang.as_deref(),
    )?;
    Ok(QualifierFactory::new(relation).of(object))
}

/// Convert a TOML scalar into a literal.
fn literal_from_toml(value: &toml::Value, lang: Option<&str>) -> Result<Literal, NoemaError> {
    match value {
        toml::Value::String(s) => match lang {
            Some(tag) => Ok(Literal::tagged_text(s.clone(), LangTag::new(tag)?)),
            None => Ok(Literal::text(s.clone())),
        },
        toml::Value::Integer(i) => Ok(Literal::Int(*i)),
        toml::Value::Float(x) => Ok(Literal::Float(*x)),
        toml::Value::Boolean(b) => Ok(Literal::Bool(*b)),
        other => Err(NoemaError::Parse(format!(
            "unsupported literal value: {other:?}"
        ))),
    }
}

/// Read a module file after validating path and size.
fn read_module_file(path: &Path) -> Result<String, NoemaError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| NoemaError::Io(format!("invalid module path '{}': {e}", path.display())))?;
    if !canonical.is_file() {
        return Err(NoemaError::Io(format!(
            "path '{}' is not a regular file",
            path.display()
        )));
    }
    let metadata = std::fs::metadata(&canonical)
        .map_err(|e| NoemaError::Io(format!("cannot read metadata: {e}")))?;
    if metadata.len() > MAX_MODULE_FILE_SIZE {
        return Err(NoemaError::Io(format!(
            "module file {} exceeds the {MAX_MODULE_FILE_SIZE} byte limit",
            path.display()
        )));
    }
    std::fs::read_to_string(&canonical)
        .map_err(|e| NoemaError::Io(format!("cannot read '{}': {e}", path.display())))
}
