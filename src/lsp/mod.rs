//! Language server sessions
//!
//! One session per language, driven over stdio. The pool owns the sessions
//! and routes files to them by extension; the [`LanguageServer`] trait is the
//! seam between the pool and a concrete process.

pub mod client;
pub mod pool;
pub mod transport;

pub use client::LspClient;
pub use pool::LanguageServerPool;

use async_trait::async_trait;
use lsp_types::{Location, Url};

use crate::language::Language;
use crate::position::Position;
use crate::Result;

/// Lifecycle of a session.
///
/// `Unconnected → Connected → Initialized → ShuttingDown → Closed`. Requests are
/// only served in `Initialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Not spawned yet
    Unconnected,
    /// Process running, handshake pending
    Connected,
    Initialized,
    ShuttingDown,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connected => "connected",
            SessionState::Initialized => "initialized",
            SessionState::ShuttingDown => "shutting-down",
            SessionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A location where a definition is used, as reported by a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub location: Location,
}

impl Reference {
    pub fn new(location: Location) -> Self {
        Self { location }
    }

    pub fn uri(&self) -> &Url {
        &self.location.uri
    }

    pub fn start(&self) -> Position {
        self.location.range.start.into()
    }
}

/// A language server session.
#[async_trait]
pub trait LanguageServer: Send + Sync {
    fn language(&self) -> Language;

    fn state(&self) -> SessionState;

    /// Spawn the server and complete the initialize handshake
    async fn start(&self) -> Result<()>;

    /// Make a document's text known to the server
    async fn did_open(&self, uri: &Url, text: &str) -> Result<()>;

    /// Usages of the symbol at `position`, declaration excluded
    async fn references(&self, uri: &Url, position: Position) -> Result<Vec<Location>>;

    /// Stop the session. Safe to call in any state, any number of times.
    async fn shutdown(&self) -> Result<()>;
}
