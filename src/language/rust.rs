//! Rust language definition
//!
//! Structs, enums, unions and traits are classes. An `impl` block is labelled
//! with its self type, so its functions end up under the same identity as the
//! type definition and become methods of it.

use super::{in_field, Language, LanguageDefinition};
use crate::edge::RelationshipType;
use crate::node::NodeLabel;
use std::collections::HashSet;
use tree_sitter::Node;

#[derive(Debug, Default, Clone, Copy)]
pub struct RustDefinitions;

impl RustDefinitions {
    pub fn new() -> Self {
        Self
    }

    /// Bare type name of an impl target: `Point` for `Point`, `Point<T>`, `geo::Point`
    fn impl_type_name<'t>(ty: Node<'t>) -> Option<Node<'t>> {
        match ty.kind() {
            "type_identifier" => Some(ty),
            "generic_type" => ty.child_by_field_name("type").and_then(Self::impl_type_name),
            "scoped_type_identifier" => ty.child_by_field_name("name"),
            _ => None,
        }
    }
}

impl LanguageDefinition for RustDefinitions {
    fn language(&self) -> Option<Language> {
        Some(Language::Rust)
    }

    fn name(&self) -> &'static str {
        "Rust"
    }

    fn get_language_file_extensions(&self) -> HashSet<&'static str> {
        HashSet::from(["rs"])
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_rust::LANGUAGE.into())
    }

    fn entity_label(&self, node: &Node<'_>, enclosing: NodeLabel) -> Option<NodeLabel> {
        match node.kind() {
            "struct_item" | "enum_item" | "union_item" | "trait_item" => Some(NodeLabel::Class),
            "impl_item" => node
                .child_by_field_name("type")
                .and_then(Self::impl_type_name)
                .map(|_| NodeLabel::Class),
            "function_item" if enclosing == NodeLabel::Class => Some(NodeLabel::Method),
            "function_item" => Some(NodeLabel::Function),
            "const_item" | "static_item" if node.child_by_field_name("value").is_some() => {
                Some(NodeLabel::Variable)
            }
            _ => None,
        }
    }

    fn identifier_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "impl_item" => node
                .child_by_field_name("type")
                .and_then(Self::impl_type_name),
            _ => node.child_by_field_name("name"),
        }
    }

    fn body_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            // unit structs have no field list
            "struct_item" => node.child_by_field_name("body").or(Some(*node)),
            "const_item" | "static_item" => node.child_by_field_name("value"),
            _ => node.child_by_field_name("body"),
        }
    }

    fn relationship_type(&self, node: &Node<'_>) -> RelationshipType {
        let mut current = Some(*node);
        while let Some(n) = current {
            match n.kind() {
                "use_declaration" => return RelationshipType::Imports,
                "call_expression" if in_field(node, &n, "function") => return RelationshipType::Calls,
                "struct_expression" if in_field(node, &n, "name") => return RelationshipType::Calls,
                "impl_item" if in_field(node, &n, "trait") => return RelationshipType::Inherits,
                "trait_item" if in_field(node, &n, "bounds") => return RelationshipType::Inherits,
                "let_declaration" if in_field(node, &n, "value") => {
                    return RelationshipType::Assigns;
                }
                "call_expression" | "arguments" | "block" | "function_item" | "impl_item"
                | "source_file" => break,
                _ => {}
            }
            current = n.parent();
        }
        if node.kind() == "type_identifier" {
            RelationshipType::Types
        } else {
            RelationshipType::References
        }
    }
}
