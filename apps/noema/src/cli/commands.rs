//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands. All
//! commands build an in-memory graph, load the requested modules through
//! the loader, and run read-only queries against the result.

use crate::cli::{Cli, Commands};
use crate::loader::{self, NamespaceHandle};
use noema_core::{GraphSnapshot, KnowledgeGraph, NoemaError, Statement};
use std::path::{Path, PathBuf};

/// Scratch namespace used by `keys` when no module is given.
const SCRATCH_URI: &str = "noema:/scratch";
const SCRATCH_PREFIX: &str = "scratch";

// =============================================================================
// DISPATCH
// =============================================================================

/// Execute the parsed CLI command.
pub fn execute(cli: Cli) -> Result<(), NoemaError> {
    match cli.command {
        Commands::Check { ref files } => check(&cli, files),
        Commands::Keys {
            count,
            ref module,
            seed,
        } => keys(&cli, count, module.as_deref(), seed),
        Commands::Inspect {
            ref key,
            ref modules,
        } => inspect(&cli, key, modules),
        Commands::Dump {
            ref modules,
            ref output,
        } => dump(&cli, modules, output.as_deref()),
    }
}

/// Build a graph and load the given module files in order.
fn load_all(files: &[PathBuf]) -> Result<(KnowledgeGraph, Vec<NamespaceHandle>), NoemaError> {
    let mut graph = KnowledgeGraph::new()?;
    let mut handles = Vec::with_capacity(files.len());
    for file in files {
        tracing::debug!(path = %file.display(), "loading module");
        handles.push(loader::load(&mut graph, file, None)?);
    }
    Ok((graph, handles))
}

// =============================================================================
// CHECK
// =============================================================================

fn check(cli: &Cli, files: &[PathBuf]) -> Result<(), NoemaError> {
    if files.is_empty() {
        return Err(NoemaError::Validation(
            "check needs at least one module file".to_string(),
        ));
    }
    let (_, handles) = load_all(files)?;

    if cli.json_mode {
        let rendered = serde_json::to_string_pretty(&handles)
            .map_err(|e| NoemaError::Parse(e.to_string()))?;
        println!("{rendered}");
        return Ok(());
    }
    for handle in &handles {
        println!(
            "{}  ({}):  {} entities, {} statement records",
            handle.uri, handle.prefix, handle.entity_count, handle.statement_count
        );
    }
    if !cli.quiet {
        println!("{} module(s) loaded without errors", handles.len());
    }
    Ok(())
}

// =============================================================================
// KEYS
// =============================================================================

fn keys(
    cli: &Cli,
    count: usize,
    module: Option<&Path>,
    seed: Option<u64>,
) -> Result<(), NoemaError> {
    let mut graph = KnowledgeGraph::new()?;
    let uri = match module {
        Some(path) => loader::load(&mut graph, path, None)?.uri,
        None => {
            graph.register_namespace(SCRATCH_URI, SCRATCH_PREFIX, seed)?;
            SCRATCH_URI.to_string()
        }
    };

    if !cli.quiet {
        println!("supposed keys for {uri}:");
    }
    for _ in 0..count {
        let number = graph.generate_key_number(&uri)?;
        println!("I{number}      R{number}");
    }
    Ok(())
}

// =============================================================================
// INSPECT
// =============================================================================

fn inspect(cli: &Cli, key: &str, modules: &[PathBuf]) -> Result<(), NoemaError> {
    let (mut graph, _) = load_all(modules)?;

    // Resolution of unprefixed keys searches active namespaces; activate
    // every loaded module.
    for uri in modules_namespaces(&graph) {
        graph.push_namespace(&uri)?;
    }
    let entity = graph.resolve(key)?.clone();

    println!("{}  [{}]", entity.uri, entity.kind);
    if let Some(label) = graph.label_text(&entity.uri) {
        println!("  label:        {label}");
    }
    if let Some(description) = graph.description_text(&entity.uri) {
        println!("  description:  {description}");
    }

    let as_subject = graph.statements_with_subject(&entity.uri);
    println!("  statements as subject: {}", as_subject.len());
    for statement in &as_subject {
        println!("    {}", render_statement(&graph, statement));
    }

    let as_object = graph.statements_with_object(&entity.uri);
    println!("  statements as object:  {}", as_object.len());
    if cli.verbose {
        for statement in &as_object {
            println!("    {}", render_statement(&graph, statement));
        }
    }
    Ok(())
}

/// Render a statement with labels where available.
fn render_statement(graph: &KnowledgeGraph, statement: &Statement) -> String {
    let predicate = graph
        .label_text(&statement.predicate)
        .unwrap_or_else(|| statement.predicate.to_string());
    format!(
        "{}  --[{}]->  {}",
        statement.subject.uri(),
        predicate,
        statement.object
    )
}

fn modules_namespaces(graph: &KnowledgeGraph) -> Vec<String> {
    graph
        .namespaces()
        .map(|record| record.base_uri().to_string())
        .filter(|uri| uri != noema_core::builtins::BUILTINS_URI)
        .collect()
}

// =============================================================================
// DUMP
// =============================================================================

fn dump(cli: &Cli, modules: &[PathBuf], output: Option<&Path>) -> Result<(), NoemaError> {
    let (graph, _) = load_all(modules)?;
    let snapshot = GraphSnapshot::from_graph(&graph);
    let rendered = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| NoemaError::Parse(e.to_string()))?;

    match output {
        Some(path) => {
            std::fs::write(path, rendered)
                .map_err(|e| NoemaError::Io(format!("cannot write '{}': {e}", path.display())))?;
            if !cli.quiet {
                println!(
                    "snapshot with {} entities written to {}",
                    snapshot.header.entity_count,
                    path.display()
                );
            }
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
