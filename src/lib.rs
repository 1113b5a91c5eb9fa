//! # Repograph - repository graph builder
//!
//! Turns a source tree into a typed graph of program entities.
//!
//! Repograph provides:
//! - Tree-sitter hierarchy extraction (file → class → function/method)
//! - Stable, hashed entity identities that survive re-indexing
//! - Cross-reference resolution through one language server per language
//! - A graph assembler that keeps out-of-repository edges in a separate store
//! - SQLite persistence behind a small store trait

pub mod uri;
pub mod position;
pub mod node;
pub mod edge;
pub mod record;
pub mod graph;
pub mod language;
pub mod hierarchy;
pub mod lsp;
pub mod resolver;
pub mod builder;
pub mod storage;
pub mod config;
pub mod ignore;
pub mod ui;

// Re-exports for convenient access
pub use uri::FileUri;
pub use node::{Node, NodeArena, NodeIndex, NodeLabel};
pub use edge::{ExternalRelationship, Relationship, RelationshipType};
pub use graph::Graph;
pub use language::{Language, LanguageRegistry};
pub use hierarchy::{HierarchyParser, ParsedFile};
pub use lsp::{LanguageServer, LanguageServerPool, LspClient, Reference};
pub use builder::{BuildOutput, GraphBuilder};
pub use storage::{GraphStore, SqliteStore};

/// Result type alias for Repograph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Repograph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid path: {0} (expected a file:// URI)")]
    InvalidPath(String),

    #[error("Unsupported extension: {0:?}")]
    UnsupportedExtension(String),

    #[error("No language server handles file extension {0:?}")]
    FileExtensionNotSupported(String),

    #[error("Identifier node not found for {kind} at {path}:{line}")]
    IdentifierNodeNotFound { path: String, kind: String, line: u32 },

    #[error("Body node not found for {kind} at {path}:{line}")]
    BodyNodeNotFound { path: String, kind: String, line: u32 },

    #[error("Grammar error for {language}: {message}")]
    Grammar { language: String, message: String },

    #[error("Node {0} has no definition range")]
    NotADefinition(String),

    #[error("Failed to start {language} language server: {message}")]
    ServerStart { language: Language, message: String },

    #[error("{0} language server is not available")]
    ServerUnavailable(Language),

    #[error("{language} language server timed out on {method}")]
    RequestTimeout { language: Language, method: String },

    #[error("{language} language server returned error {code}: {message}")]
    ServerError { language: Language, code: i64, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("No language server could be started")]
    NoLanguageServers,

    #[error("Relationship {start} -[{kind}]-> {end} points at a missing node")]
    DanglingRelationship { start: String, end: String, kind: RelationshipType },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message sent from parallel parse workers to the coordinator
#[derive(Debug)]
pub enum IndexMessage {
    Parsed(Box<ParsedFile>),
    Skipped { path: std::path::PathBuf, error: Error },
}
