//! # Noema - Knowledge Graph CLI
//!
//! The main binary for the Noema deterministic knowledge-graph engine.
//!
//! This application provides:
//! - Module loading (declarative TOML knowledge modules)
//! - Read-only inspection of the loaded graph
//! - Key generation for module authors
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                apps/noema (THE BINARY)           │
//! │                                                  │
//! │  ┌─────────────┐        ┌────────────────────┐  │
//! │  │   CLI       │        │   Module Loader    │  │
//! │  │  (clap)     │        │   (TOML files)     │  │
//! │  └──────┬──────┘        └─────────┬──────────┘  │
//! │         │                         │             │
//! │         └────────────┬────────────┘             │
//! │                      ▼                          │
//! │              ┌───────────────┐                  │
//! │              │  noema-core   │                  │
//! │              │ (THE ENGINE)  │                  │
//! │              └───────────────┘                  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! noema check modules/base.toml modules/employment.toml
//! noema keys -n 30 -m modules/employment.toml
//! noema inspect 'em__I2746["Rudolf Kalman"]' -m modules/employment.toml
//! noema dump -m modules/employment.toml -o snapshot.json
//! ```

use clap::Parser;
use noema::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Initialize tracing — NOEMA_LOG_FORMAT=json enables machine-parseable
    // output.
    let log_format = std::env::var("NOEMA_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "noema=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
