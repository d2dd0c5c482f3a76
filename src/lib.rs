//! # Nimbus Imports
//!
//! Import assertions for a rolldown-style bundler: `import data from
//! "./data.json" assert { type: "json" }` becomes a typed JavaScript
//! module, and scripting sources get an `import.meta` surface wired to a
//! process-wide metadata registry.
//!
//! The pipeline runs inside four host hooks:
//! 1. a parser extension rewrites assertion clauses into query-encoded
//!    specifiers the host treats as ordinary module ids
//! 2. `resolve_id` decodes that suffix, resolves the underlying file
//!    through the host, and re-encodes the assertion onto the result
//! 3. `load` emits the typed module for the asserted file
//! 4. `transform` injects the metadata header into scripting sources
//!
//! Referenced assets are content-hashed, deduplicated, and copied into
//! the build output when the build ends.

pub mod assertion;
pub mod assets;
pub mod config;
pub mod edit;
pub mod hooks;
pub mod loader;
pub mod parser;
pub mod plugin;
pub mod sourcemap;
pub mod transform;
pub mod utils;

use thiserror::Error;

pub use assertion::{Assertion, AssertionKind};
pub use assets::{Asset, Assets};
pub use config::{BuildConfig, BuildContext, ResolvedConfig, ServerConfig};
pub use hooks::{
    FsResolver, HostOptions, HostResolver, ParserExtension, Plugin, PluginContext,
    ResolveOptions, ResolvedId,
};
pub use parser::AssertionSyntax;
pub use plugin::ImportsPlugin;
pub use sourcemap::SourceMap;

// ---------------------------------------------------------------------------
// ImportsError
// ---------------------------------------------------------------------------

/// Errors surfaced through the plugin hooks.
#[derive(Debug, Error)]
pub enum ImportsError {
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("Unsupported assertion: {kind:?}")]
    UnsupportedAssertion { kind: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },

    #[error("Failed to create assets directory {path}: {source}")]
    OutputDir {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to copy asset {from} to {to}: {source}")]
    AssetCopy {
        from: String,
        to: String,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Create the imports plugin with a default build context. Hosts call
/// `config_resolved` before any module hook runs.
pub fn imports_plugin() -> ImportsPlugin {
    ImportsPlugin::new()
}
