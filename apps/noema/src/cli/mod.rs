//! # Noema CLI Module
//!
//! This module implements the CLI interface for Noema.
//!
//! ## Available Commands
//!
//! - `check` - Load module files and report their contents
//! - `keys` - Generate fresh key pairs for a module
//! - `inspect` - Resolve a key and show the entity's statements
//! - `dump` - Export the loaded graph as a JSON snapshot

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::execute;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Noema - knowledge-graph engine CLI
///
/// Loads declarative knowledge modules into the deterministic in-memory
/// graph engine and exposes read-only views over the result.
#[derive(Parser, Debug)]
#[command(name = "noema")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load module files in order and report entity/statement counts
    Check {
        /// Module files (TOML), loaded in the given order
        files: Vec<PathBuf>,
    },

    /// Generate fresh key pairs (I####  R####) for a module
    Keys {
        /// Number of key pairs to generate
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,

        /// Module file whose namespace the keys belong to; a scratch
        /// namespace is used when omitted
        #[arg(short, long)]
        module: Option<PathBuf>,

        /// Key reservoir seed for the scratch namespace
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Resolve a key and show the entity with its statements
    Inspect {
        /// The key to resolve, in any supported notation
        key: String,

        /// Module files to load first, in order
        #[arg(short, long = "module")]
        modules: Vec<PathBuf>,
    },

    /// Export the loaded graph as a canonical JSON snapshot
    Dump {
        /// Module files to load first, in order
        #[arg(short, long = "module")]
        modules: Vec<PathBuf>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
