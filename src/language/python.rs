//! Python language definition
//!
//! Entities: classes, functions (methods when directly inside a class) and
//! module-level `name = value` assignments.

use super::{in_field, Language, LanguageDefinition};
use crate::edge::RelationshipType;
use crate::node::NodeLabel;
use std::collections::HashSet;
use tree_sitter::Node;

#[derive(Debug, Default, Clone, Copy)]
pub struct PythonDefinitions;

impl PythonDefinitions {
    pub fn new() -> Self {
        Self
    }

    /// `name = value` directly under the module
    fn is_module_assignment(node: &Node<'_>) -> bool {
        let at_module_level = node
            .parent()
            .filter(|p| p.kind() == "expression_statement")
            .and_then(|p| p.parent())
            .is_some_and(|m| m.kind() == "module");
        at_module_level
            && node.child_by_field_name("left").is_some_and(|l| l.kind() == "identifier")
            && node.child_by_field_name("right").is_some()
    }
}

impl LanguageDefinition for PythonDefinitions {
    fn language(&self) -> Option<Language> {
        Some(Language::Python)
    }

    fn name(&self) -> &'static str {
        "Python"
    }

    fn get_language_file_extensions(&self) -> HashSet<&'static str> {
        HashSet::from(["py", "pyi"])
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_python::LANGUAGE.into())
    }

    fn entity_label(&self, node: &Node<'_>, enclosing: NodeLabel) -> Option<NodeLabel> {
        match node.kind() {
            "class_definition" => Some(NodeLabel::Class),
            "function_definition" if enclosing == NodeLabel::Class => Some(NodeLabel::Method),
            "function_definition" => Some(NodeLabel::Function),
            "assignment" if Self::is_module_assignment(node) => Some(NodeLabel::Variable),
            _ => None,
        }
    }

    fn identifier_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "assignment" => node.child_by_field_name("left"),
            _ => node.child_by_field_name("name"),
        }
    }

    fn body_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "assignment" => node.child_by_field_name("right"),
            _ => node.child_by_field_name("body"),
        }
    }

    fn relationship_type(&self, node: &Node<'_>) -> RelationshipType {
        let mut current = Some(*node);
        while let Some(n) = current {
            match n.kind() {
                "import_statement" | "import_from_statement" => return RelationshipType::Imports,
                "call" if in_field(node, &n, "function") => return RelationshipType::Calls,
                "type" => return RelationshipType::Types,
                "class_definition" if in_field(node, &n, "superclasses") => {
                    return RelationshipType::Inherits;
                }
                "assignment" if in_field(node, &n, "right") => return RelationshipType::Assigns,
                "call" | "class_definition" | "function_definition" | "block" | "module" => break,
                _ => {}
            }
            current = n.parent();
        }
        RelationshipType::References
    }
}
