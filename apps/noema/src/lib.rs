//! # noema (app library)
//!
//! Library surface of the Noema binary: the CLI definitions and the TOML
//! module loader. Exposed as a lib so integration tests can drive the
//! loader and command implementations directly.

pub mod cli;
pub mod loader;
