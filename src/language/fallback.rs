//! Fallback definition for files no language claims

use super::{Language, LanguageDefinition};
use crate::node::NodeLabel;
use std::collections::HashSet;
use tree_sitter::Node;

/// Matches nothing and claims no extensions.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackDefinitions;

impl LanguageDefinition for FallbackDefinitions {
    fn language(&self) -> Option<Language> {
        None
    }

    fn name(&self) -> &'static str {
        "Fallback"
    }

    fn get_language_file_extensions(&self) -> HashSet<&'static str> {
        HashSet::new()
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        None
    }

    fn entity_label(&self, _node: &Node<'_>, _enclosing: NodeLabel) -> Option<NodeLabel> {
        None
    }

    fn identifier_node<'t>(&self, _node: &Node<'t>) -> Option<Node<'t>> {
        None
    }

    fn body_node<'t>(&self, _node: &Node<'t>) -> Option<Node<'t>> {
        None
    }
}
