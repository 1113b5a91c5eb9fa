//! Go language definition

use super::{in_field, Language, LanguageDefinition};
use crate::edge::RelationshipType;
use crate::node::NodeLabel;
use std::collections::HashSet;
use tree_sitter::Node;

#[derive(Debug, Default, Clone, Copy)]
pub struct GoDefinitions;

impl GoDefinitions {
    pub fn new() -> Self {
        Self
    }

    /// Base type name of a receiver type: `T` for `T`, `*T`, `T[K]`, `*T[K]`
    fn receiver_type_name<'t>(ty: Node<'t>) -> Option<Node<'t>> {
        match ty.kind() {
            "type_identifier" => Some(ty),
            "pointer_type" | "parenthesized_type" => {
                ty.named_child(0).and_then(Self::receiver_type_name)
            }
            "generic_type" => ty.child_by_field_name("type").and_then(Self::receiver_type_name),
            _ => None,
        }
    }
}

impl LanguageDefinition for GoDefinitions {
    fn language(&self) -> Option<Language> {
        Some(Language::Go)
    }

    fn name(&self) -> &'static str {
        "Go"
    }

    fn get_language_file_extensions(&self) -> HashSet<&'static str> {
        HashSet::from(["go"])
    }

    fn grammar(&self) -> Option<tree_sitter::Language> {
        Some(tree_sitter_go::LANGUAGE.into())
    }

    fn entity_label(&self, node: &Node<'_>, _enclosing: NodeLabel) -> Option<NodeLabel> {
        // body-less declarations are implemented elsewhere (assembly, linkname)
        let has_body = || node.child_by_field_name("body").is_some();
        match node.kind() {
            "function_declaration" if has_body() => Some(NodeLabel::Function),
            "method_declaration" if has_body() => Some(NodeLabel::Method),
            "type_spec" => node
                .child_by_field_name("type")
                .filter(|t| matches!(t.kind(), "struct_type" | "interface_type"))
                .map(|_| NodeLabel::Class),
            _ => None,
        }
    }

    fn identifier_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("name")
    }

    fn body_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        match node.kind() {
            "type_spec" => node.child_by_field_name("type"),
            _ => node.child_by_field_name("body"),
        }
    }

    /// Methods are declared at file level; the receiver's type keeps
    /// `func (a A) String()` and `func (b B) String()` apart.
    fn qualifier_node<'t>(&self, node: &Node<'t>) -> Option<Node<'t>> {
        if node.kind() != "method_declaration" {
            return None;
        }
        let receiver = node.child_by_field_name("receiver")?;
        let mut cursor = receiver.walk();
        let parameter = receiver
            .named_children(&mut cursor)
            .find(|c| c.kind() == "parameter_declaration")?;
        parameter
            .child_by_field_name("type")
            .and_then(Self::receiver_type_name)
    }

    fn relationship_type(&self, node: &Node<'_>) -> RelationshipType {
        let mut current = Some(*node);
        while let Some(n) = current {
            match n.kind() {
                "import_declaration" | "import_spec" => return RelationshipType::Imports,
                "call_expression" if in_field(node, &n, "function") => return RelationshipType::Calls,
                "composite_literal" if in_field(node, &n, "type") => return RelationshipType::Calls,
                // embedded field: a type with no field name
                "field_declaration" if n.child_by_field_name("name").is_none() => {
                    return RelationshipType::Inherits;
                }
                "short_var_declaration" if in_field(node, &n, "right") => {
                    return RelationshipType::Assigns;
                }
                "call_expression" | "argument_list" | "block" | "function_declaration"
                | "method_declaration" | "source_file" => break,
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
