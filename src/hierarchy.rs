//! Hierarchy parser - syntax tree to nested entities
//!
//! One file in, one [`ParsedFile`] out: a file node, every definition entity
//! the language recognises below it, and a `CONTAINS` edge for each level of
//! nesting.

use std::path::Path;
use std::sync::Arc;

use tree_sitter::{Node as SyntaxNode, Tree};

use crate::edge::{Relationship, RelationshipType};
use crate::language::registry::extension_of;
use crate::language::{Language, LanguageDefinition, LanguageRegistry};
use crate::node::{Node, NodeArena, NodeIndex, NodeLabel};
use crate::position::LineIndex;
use crate::uri::FileUri;
use crate::{Error, Result};

/// Entities and containment edges of a single file.
#[derive(Debug)]
pub struct ParsedFile {
    pub uri: FileUri,
    pub language: Language,
    /// Parents before children
    pub arena: NodeArena,
    pub file: NodeIndex,
    /// `CONTAINS` edges by hashed id
    pub relationships: Vec<Relationship>,
    /// Decoded text, empty when the file was not valid UTF-8
    pub source: String,
    pub tree: Tree,
}

/// Parses files into entity hierarchies using the registry's definitions.
#[derive(Clone)]
pub struct HierarchyParser {
    registry: Arc<LanguageRegistry>,
}

impl HierarchyParser {
    pub fn new(registry: Arc<LanguageRegistry>) -> Self {
        Self { registry }
    }

    /// Read and parse a file from disk.
    pub fn parse(&self, path: &Path) -> Result<ParsedFile> {
        let extension = extension_of(path);
        if !self.registry.supports_extension(&extension) {
            return Err(Error::UnsupportedExtension(extension));
        }
        let bytes = std::fs::read(path)?;
        self.parse_source(path, &bytes)
    }

    /// Parse in-memory content as if it were the file at `path`.
    pub fn parse_source(&self, path: &Path, bytes: &[u8]) -> Result<ParsedFile> {
        let absolute = std::path::absolute(path)?;
        let uri = FileUri::from_path(&absolute)?;
        let extension = extension_of(path);
        let (mut parser, definition) = self.registry.parser_for_extension(&extension)?;
        let language = definition
            .language()
            .ok_or_else(|| Error::UnsupportedExtension(extension.clone()))?;

        let source = match String::from_utf8(bytes.to_vec()) {
            Ok(text) => text,
            Err(_) => {
                tracing::warn!("{} is not valid UTF-8, indexing it as empty", path.display());
                String::new()
            }
        };

        let tree = parser.parse(&source, None).ok_or_else(|| Error::Grammar {
            language: language.to_string(),
            message: format!("parser returned no tree for {}", path.display()),
        })?;

        let mut walk = Walk {
            uri: &uri,
            source: &source,
            lines: LineIndex::new(&source),
            definition: definition.as_ref(),
            arena: NodeArena::new(),
            relationships: Vec::new(),
        };
        let file = walk.run(tree.root_node())?;
        let Walk { arena, relationships, .. } = walk;

        tracing::debug!(
            "Parsed {}: {} entities, {} containment edges",
            uri,
            arena.len(),
            relationships.len()
        );

        Ok(ParsedFile {
            uri,
            language,
            arena,
            file,
            relationships,
            source,
            tree,
        })
    }
}

struct Walk<'a> {
    uri: &'a FileUri,
    source: &'a str,
    lines: LineIndex<'a>,
    definition: &'a dyn LanguageDefinition,
    arena: NodeArena,
    relationships: Vec<Relationship>,
}

impl<'a> Walk<'a> {
    fn run(&mut self, root: SyntaxNode<'_>) -> Result<NodeIndex> {
        let file = Node::file(self.uri.as_str(), self.lines.range(&root))?;
        let file = self.arena.push(file);

        // (syntax node, enclosing entity); pushed in reverse to keep source order
        let mut stack: Vec<(SyntaxNode<'_>, NodeIndex)> = Vec::new();
        push_children(&mut stack, root, file);

        while let Some((syntax, enclosing)) = stack.pop() {
            let enclosing_label = self.arena.get(enclosing).label;
            let parent = match self.definition.entity_label(&syntax, enclosing_label) {
                Some(label) => self.add_entity(label, syntax, enclosing)?,
                None => enclosing,
            };
            push_children(&mut stack, syntax, parent);
        }
        Ok(file)
    }

    fn add_entity(
        &mut self,
        label: NodeLabel,
        syntax: SyntaxNode<'_>,
        parent: NodeIndex,
    ) -> Result<NodeIndex> {
        let line = syntax.start_position().row as u32;
        let identifier = self
            .definition
            .identifier_node(&syntax)
            .ok_or_else(|| Error::IdentifierNodeNotFound {
                path: self.uri.to_string(),
                kind: syntax.kind().to_string(),
                line,
            })?;
        if self.definition.body_node(&syntax).is_none() {
            return Err(Error::BodyNodeNotFound {
                path: self.uri.to_string(),
                kind: syntax.kind().to_string(),
                line,
            });
        }

        let name = self.source.get(identifier.byte_range()).unwrap_or_default();
        let mut node = Node::definition(
            label,
            self.uri.as_str(),
            name,
            (parent, self.arena.get(parent)),
            self.lines.range(&syntax),
            self.lines.range(&identifier),
        )?;
        if let Some(qualifier) = self
            .definition
            .qualifier_node(&syntax)
            .and_then(|q| self.source.get(q.byte_range()))
        {
            node = node.with_qualifier(qualifier);
        }
        let index = self.arena.push(node);
        self.relationships.push(Relationship::new(
            self.arena.hashed_id(parent),
            self.arena.hashed_id(index),
            RelationshipType::Contains,
        ));
        Ok(index)
    }
}

fn push_children<'t>(
    stack: &mut Vec<(SyntaxNode<'t>, NodeIndex)>,
    syntax: SyntaxNode<'t>,
    parent: NodeIndex,
) {
    let mut cursor = syntax.walk();
    let children: Vec<_> = syntax.named_children(&mut cursor).collect();
    stack.extend(children.into_iter().rev().map(|child| (child, parent)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parser() -> HierarchyParser {
        HierarchyParser::new(Arc::new(LanguageRegistry::with_defaults()))
    }

    fn names(parsed: &ParsedFile) -> Vec<(NodeLabel, String, u32)> {
        parsed
            .arena
            .iter()
            .map(|(_, n)| (n.label, n.name.clone(), n.level))
            .collect()
    }

    #[test]
    fn test_python_class_methods_and_functions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("auth.py");
        fs::write(
            &path,
            "LIMIT = 3\n\nclass Auth:\n    def validate(self):\n        pass\n\ndef login():\n    pass\n",
        )
        .unwrap();

        let parsed = parser().parse(&path).unwrap();
        assert_eq!(parsed.language, Language::Python);
        assert_eq!(
            names(&parsed),
            vec![
                (NodeLabel::File, "auth.py".to_string(), 0),
                (NodeLabel::Variable, "LIMIT".to_string(), 1),
                (NodeLabel::Class, "Auth".to_string(), 1),
                (NodeLabel::Method, "validate".to_string(), 2),
                (NodeLabel::Function, "login".to_string(), 1),
            ]
        );
        assert_eq!(parsed.relationships.len(), 4);
        assert!(parsed
            .relationships
            .iter()
            .all(|r| r.kind == RelationshipType::Contains));

        let (method, node) = parsed.arena.iter().nth(3).unwrap();
        assert!(parsed.arena.id(method).ends_with("auth.py.Auth.validate"));
        let anchor = node.definition_range.unwrap();
        assert_eq!((anchor.start.line, anchor.start.character), (3, 8));
    }

    #[test]
    fn test_undecodable_file_yields_bare_file_node() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.py");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x64, 0x65, 0x66]).unwrap();

        let parsed = parser().parse(&path).unwrap();
        assert_eq!(parsed.arena.len(), 1);
        assert!(parsed.relationships.is_empty());
        assert!(parsed.source.is_empty());
        assert_eq!(parsed.arena.get(parsed.file).label, NodeLabel::File);
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# notes\n").unwrap();
        assert!(matches!(
            parser().parse(&path),
            Err(Error::UnsupportedExtension(ext)) if ext == "md"
        ));
    }

    #[test]
    fn test_rust_impl_shares_type_identity() {
        let source = b"struct Point { x: i32 }\n\nimpl Point {\n    fn norm(&self) -> i32 { self.x }\n}\n";
        let dir = TempDir::new().unwrap();
        let parsed = parser()
            .parse_source(&dir.path().join("geo.rs"), source)
            .unwrap();

        let ids: Vec<String> = parsed.arena.iter().map(|(i, _)| parsed.arena.id(i)).collect();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[1], ids[2], "struct and impl share an identity");
        assert!(ids[3].ends_with("geo.rs.Point.norm"));
        assert_eq!(parsed.arena.iter().nth(3).unwrap().1.label, NodeLabel::Method);
    }

    #[test]
    fn test_go_methods_with_same_name_stay_apart() {
        let source = b"package shapes\n\ntype A struct{}\ntype B struct{}\n\nfunc (a A) String() string { return \"a\" }\nfunc (b *B) String() string { return \"b\" }\n";
        let dir = TempDir::new().unwrap();
        let parsed = parser()
            .parse_source(&dir.path().join("shapes.go"), source)
            .unwrap();

        let ids: Vec<String> = parsed.arena.iter().map(|(i, _)| parsed.arena.id(i)).collect();
        assert_eq!(ids.len(), 5);
        assert!(ids[3].ends_with("shapes.go.A.String"));
        assert!(ids[4].ends_with("shapes.go.B.String"));
        assert_eq!(
            names(&parsed)[3..].to_vec(),
            vec![
                (NodeLabel::Method, "String".to_string(), 1),
                (NodeLabel::Method, "String".to_string(), 1),
            ]
        );

        let mut graph = crate::graph::Graph::new();
        let mapping = graph.add_nodes(parsed.arena);
        assert_ne!(mapping[3], mapping[4]);
        assert_eq!(graph.node_count(), 5);
    }

    #[test]
    fn test_javascript_arrow_function() {
        let dir = TempDir::new().unwrap();
        let parsed = parser()
            .parse_source(
                &dir.path().join("fmt.mjs"),
                b"export const format = (v) => v.trim();\nconst helper = function () { return 1; };\n",
            )
            .unwrap();
        assert_eq!(
            names(&parsed)[1..].to_vec(),
            vec![
                (NodeLabel::Function, "format".to_string(), 1),
                (NodeLabel::Function, "helper".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("svc.go");
        fs::write(
            &path,
            "package svc\n\ntype Server struct{}\n\nfunc (s *Server) Run() {}\n\nfunc main() {}\n",
        )
        .unwrap();

        let first = parser().parse(&path).unwrap();
        let second = parser().parse(&path).unwrap();
        let hashed = |p: &ParsedFile| -> Vec<String> {
            p.arena.iter().map(|(i, _)| p.arena.hashed_id(i)).collect()
        };
        assert_eq!(hashed(&first), hashed(&second));
        assert_eq!(first.relationships, second.relationships);
    }
}
