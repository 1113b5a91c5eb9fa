//! JavaScript language definition
//!
//! Entities: class declarations, methods, function declarations, functions
//! bound to a name (`const f = () => ...`) and top-level constants.

use super::{in_field, Language, LanguageDefinition};
use crate::edge::RelationshipType;
use crate::node::NodeLabel;
use std::collections::HashSet;
use tree_sitter::Node;

const FUNCTION_VALUES: &[&str] = &[
    "arrow_function",
    "function_expression",
    "function",
    "generator_function",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct JavaScriptDefinitions;

impl JavaScriptDefinitions {
    pub fn new() -> Self {
        Self
    }

    fn declarator_value<'t>(node: &Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("name")
            .filter(|n| n.kind() == "identifier")
            .and_then(|_| node.child_by_field_name("value"))
    }

    fn is_top_level_declarator(node: &Node<'_>) -> bool {
        let Some(declaration) = node.parent() else {
            return false;
        };
        if !matches!(declaration.kind(), "lexical_declaration" | "variable_declaration") {
            return false;
        }
        match declaration.parent() {
            Some(p) if p.kind() == "program" => true,
            Some(p) if p.kind() == "export_statement" => {
                p.parent().is_some_and(|g| g.kind() == "program")
            }
            _ => false,
        }
    }
}

impl LanguageDefinition for JavaScriptDefinitions {
    fn language(&self) -> Option<Language> {
        Some(Language::JavaScript)
    }

    fn name(&self) -> &'static str {
        "JavaScript"
    }

    fn get_language_file_extensions(&self) -> HashSet<&'static str> {
        HashSet::from(["js", "jsx", "mjs", "cjs"])
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_javascript::LANGUAGE.into())
    }

    fn entity_label(&self, node: &Node<'_>, _enclosing: NodeLabel) -> Option<NodeLabel> {
        match node.kind() {
            "class_declaration" => Some(NodeLabel::Class),
            "method_definition" => Some(NodeLabel::Method),
            "function_declaration" | "generator_function_declaration" => Some(NodeLabel::Function),
            "variable_declarator" => {
                let value = Self::declarator_value(node)?;
                if FUNCTION_VALUES.contains(&value.kind()) {
                    Some(NodeLabel::Function)
                } else if Self::is_top_level_declarator(node) {
                    Some(NodeLabel::Variable)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn identifier_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("name")
    }

    fn body_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "variable_declarator" => {
                let value = node.child_by_field_name("value")?;
                if FUNCTION_VALUES.contains(&value.kind()) {
                    value.child_by_field_name("body")
                } else {
                    Some(value)
                }
            }
            _ => node.child_by_field_name("body"),
        }
    }

    fn relationship_type(&self, node: &Node<'_>) -> RelationshipType {
        let mut current = Some(*node);
        while let Some(n) = current {
            match n.kind() {
                "import_statement" => return RelationshipType::Imports,
                "call_expression" if in_field(node, &n, "function") => return RelationshipType::Calls,
                "new_expression" if in_field(node, &n, "constructor") => {
                    return RelationshipType::Calls;
                }
                "class_heritage" => return RelationshipType::Inherits,
                "variable_declarator" if in_field(node, &n, "value") => {
                    return RelationshipType::Assigns;
                }
                "assignment_expression" if in_field(node, &n, "right") => {
                    return RelationshipType::Assigns;
                }
                "call_expression" | "new_expression" | "arguments" | "statement_block"
                | "class_body" | "program" => break,
                _ => {}
            }
            current = n.parent();
        }
        RelationshipType::References
    }
}
