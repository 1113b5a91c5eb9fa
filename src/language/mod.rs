//! Language definitions
//!
//! Each supported language is described by a [`LanguageDefinition`]: its file
//! extensions, its tree-sitter grammar, and the rules that map syntax nodes to
//! graph entities. The [`LanguageRegistry`] inverts extensions into a routing
//! table; [`FallbackDefinitions`] stands in for everything else.

pub mod fallback;
pub mod go;
pub mod javascript;
pub mod python;
pub mod registry;
pub mod rust;

pub use fallback::FallbackDefinitions;
pub use registry::LanguageRegistry;

use crate::edge::RelationshipType;
use crate::node::NodeLabel;
use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;
use tree_sitter::Node as SyntaxNode;

/// Languages with a built-in definition. Also the identity of a language server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Rust,
    Go,
}

impl Language {
    /// Identifier used in config files and as the LSP `languageId`
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Rust => "rust",
            Language::Go => "go",
        }
    }

    pub fn all() -> &'static [Language] {
        &[Language::Python, Language::JavaScript, Language::Rust, Language::Go]
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "python" | "py" => Ok(Language::Python),
            "javascript" | "js" => Ok(Language::JavaScript),
            "rust" | "rs" => Ok(Language::Rust),
            "go" | "golang" => Ok(Language::Go),
            _ => Err(Error::UnsupportedExtension(s.to_string())),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Syntax rules for one language.
///
/// The hierarchy parser asks [`entity_label`](Self::entity_label) for every
/// syntax node; when it answers, the identifier and body sub-nodes must exist.
pub trait LanguageDefinition: Send + Sync {
    /// `None` only for the fallback
    fn language(&self) -> Option<Language>;

    fn name(&self) -> &'static str;

    /// Extensions this definition claims, lower-case without the dot
    fn get_language_file_extensions(&self) -> HashSet<&'static str>;

    /// Tree-sitter grammar, `None` when the language has no parser
    fn grammar(&self) -> Option<tree_sitter::Language>;

    /// Label of the entity `node` starts, if any. `enclosing` is the label of the
    /// nearest entity above it.
    fn entity_label(&self, node: &SyntaxNode<'_>, enclosing: NodeLabel) -> Option<NodeLabel>;

    /// Sub-node holding the entity's name
    fn identifier_node<'t>(&self, node: &SyntaxNode<'t>) -> Option<SyntaxNode<'t>>;

    /// Sub-node holding the entity's body
    fn body_node<'t>(&self, node: &SyntaxNode<'t>) -> Option<SyntaxNode<'t>>;

    /// Sub-node naming a type the entity belongs to without being nested in
    /// it. Its text becomes the node's qualifier.
    fn qualifier_node<'t>(&self, node: &SyntaxNode<'t>) -> Option<SyntaxNode<'t>> {
        let _ = node;
        None
    }

    /// Kind of usage at a reference site. `node` is the smallest named node at
    /// the reference position.
    fn relationship_type(&self, node: &SyntaxNode<'_>) -> RelationshipType {
        let _ = node;
        RelationshipType::References
    }
}

/// True when `inner` lies within `outer` (inclusive)
pub(crate) fn within(inner: &SyntaxNode<'_>, outer: &SyntaxNode<'_>) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}

/// True when `node` sits inside the `field` child of `parent`
pub(crate) fn in_field(node: &SyntaxNode<'_>, parent: &SyntaxNode<'_>, field: &str) -> bool {
    parent
        .child_by_field_name(field)
        .is_some_and(|f| within(node, &f))
}
