//! Reference resolver - language server locations to graph edges
//!
//! For one definition node, asks its language server where it is used and maps
//! each location back onto the graph:
//! - inside an indexed file: an edge from the deepest enclosing entity
//! - anywhere else: an external edge from a synthesized location id

use std::collections::HashMap;

use tree_sitter::Tree;

use crate::edge::{ExternalRelationship, Relationship, RelationshipType};
use crate::graph::Graph;
use crate::language::{Language, LanguageRegistry};
use crate::lsp::{LanguageServerPool, Reference};
use crate::node::{hash_id, NodeIndex};
use crate::position::{LineIndex, Position};
use crate::uri::FileUri;

/// Syntax tree and text of an indexed file, kept to classify reference sites
#[derive(Debug)]
pub struct FileSyntax {
    pub language: Language,
    pub source: String,
    pub tree: Tree,
}

/// Outcome of mapping one reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Internal(Relationship),
    External(ExternalRelationship),
}

/// Identity of a location that has no node behind it
pub fn location_id(uri: &FileUri, position: Position) -> String {
    hash_id(&format!("{}:{}:{}", uri, position.line, position.character))
}

pub struct ReferenceResolver<'a> {
    pool: &'a LanguageServerPool,
    graph: &'a Graph,
    syntax: &'a HashMap<FileUri, FileSyntax>,
    registry: &'a LanguageRegistry,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(
        pool: &'a LanguageServerPool,
        graph: &'a Graph,
        syntax: &'a HashMap<FileUri, FileSyntax>,
        registry: &'a LanguageRegistry,
    ) -> Self {
        Self {
            pool,
            graph,
            syntax,
            registry,
        }
    }

    /// Edges for every usage of `definition`. Failures are logged and give an
    /// empty result, so one bad entity never stops a run.
    pub async fn resolve(&self, definition: NodeIndex) -> Vec<Resolution> {
        match self.pool.find_references(self.graph.node(definition)).await {
            Ok(references) => references
                .iter()
                .filter_map(|r| self.resolve_reference(definition, r))
                .collect(),
            Err(e) => {
                tracing::warn!("Skipping references of {}: {}", self.graph.id(definition), e);
                Vec::new()
            }
        }
    }

    /// Map one reference location onto the graph.
    ///
    /// Returns `None` when the location is not a file location, or when its
    /// deepest enclosing node is the definition itself. The latter covers the
    /// declaration echoed back by some servers as well as recursive calls, so
    /// the graph never holds self-edges.
    pub fn resolve_reference(
        &self,
        definition: NodeIndex,
        reference: &Reference,
    ) -> Option<Resolution> {
        let uri = match FileUri::from_url(reference.uri()) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::debug!("Ignoring reference: {}", e);
                return None;
            }
        };
        let start = reference.start();
        let kind = self.classify(&uri, start);
        let definition_id = self.graph.hashed_id(definition);

        match self.graph.find_enclosing_node(&uri, start) {
            Some(site) if site == definition => None,
            Some(site) => Some(Resolution::Internal(Relationship::new(
                self.graph.hashed_id(site),
                definition_id,
                kind,
            ))),
            None => Some(Resolution::External(ExternalRelationship::new(
                location_id(&uri, start),
                definition_id,
                kind,
            ))),
        }
    }

    /// Kind of usage at a position, from the referencing file's syntax
    pub fn classify(&self, uri: &FileUri, position: Position) -> RelationshipType {
        let Some(file) = self.syntax.get(uri) else {
            return RelationshipType::References;
        };
        let Some(definition) = self.registry.definition(file.language) else {
            return RelationshipType::References;
        };
        let point = LineIndex::new(&file.source).point(position);
        file.tree
            .root_node()
            .named_descendant_for_point_range(point, point)
            .map(|node| definition.relationship_type(&node))
            .unwrap_or(RelationshipType::References)
    }
}

/// Split resolutions into the graph's two edge lists
pub fn append(graph: &mut Graph, resolutions: impl IntoIterator<Item = Resolution>) {
    for resolution in resolutions {
        match resolution {
            Resolution::Internal(rel) => graph.add_relationship(rel),
            Resolution::External(rel) => graph.add_external_relationship(rel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::HierarchyParser;
    use crate::node::NodeLabel;
    use lsp_types::{Location, Range, Url};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        graph: Graph,
        syntax: HashMap<FileUri, FileSyntax>,
        registry: Arc<LanguageRegistry>,
        a: FileUri,
        b: FileUri,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(LanguageRegistry::with_defaults());
        let parser = HierarchyParser::new(registry.clone());
        let mut graph = Graph::new();
        let mut syntax = HashMap::new();

        let files = [
            ("a.py", "def foo():\n    return foo()\n"),
            ("b.py", "from a import foo\n\n\ndef bar():\n    foo()\n"),
        ];
        let mut uris = Vec::new();
        for (name, text) in files {
            let path = dir.path().join(name);
            std::fs::write(&path, text).unwrap();
            let parsed = parser.parse(&path).unwrap();
            graph.add_nodes(parsed.arena);
            uris.push(parsed.uri.clone());
            syntax.insert(
                parsed.uri,
                FileSyntax {
                    language: parsed.language,
                    source: parsed.source,
                    tree: parsed.tree,
                },
            );
        }
        let b = uris.pop().unwrap();
        let a = uris.pop().unwrap();
        Fixture { _dir: dir, graph, syntax, registry, a, b }
    }

    fn reference(uri: &FileUri, line: u32, character: u32) -> Reference {
        let start = lsp_types::Position::new(line, character);
        Reference::new(Location::new(uri.to_url().unwrap(), Range::new(start, start)))
    }

    fn foo(f: &Fixture) -> NodeIndex {
        f.graph
            .nodes_in_file(&f.a)
            .iter()
            .copied()
            .find(|&i| f.graph.node(i).name == "foo")
            .unwrap()
    }

    #[test]
    fn test_reference_in_indexed_file_is_internal() {
        let f = fixture();
        let pool = LanguageServerPool::new(f.registry.clone(), Vec::new());
        let resolver = ReferenceResolver::new(&pool, &f.graph, &f.syntax, &f.registry);
        let foo = foo(&f);

        let call = resolver.resolve_reference(foo, &reference(&f.b, 4, 4)).unwrap();
        let Resolution::Internal(rel) = call else {
            panic!("expected an internal edge, got {:?}", call);
        };
        let bar = f.graph.node_by_hashed_id(&rel.start_node_id).unwrap();
        assert_eq!(f.graph.node(bar).name, "bar");
        assert_eq!(f.graph.node(bar).label, NodeLabel::Function);
        assert_eq!(rel.end_node_id, f.graph.hashed_id(foo));
        assert_eq!(rel.kind, RelationshipType::Calls);

        // the import sits at module level, so the file node uses it
        let import = resolver.resolve_reference(foo, &reference(&f.b, 0, 14)).unwrap();
        let Resolution::Internal(rel) = import else {
            panic!("expected an internal edge");
        };
        assert_eq!(rel.kind, RelationshipType::Imports);
        let site = f.graph.node_by_hashed_id(&rel.start_node_id).unwrap();
        assert_eq!(f.graph.node(site).label, NodeLabel::File);
    }

    #[test]
    fn test_self_references_give_no_edge() {
        let f = fixture();
        let pool = LanguageServerPool::new(f.registry.clone(), Vec::new());
        let resolver = ReferenceResolver::new(&pool, &f.graph, &f.syntax, &f.registry);
        // recursive call inside foo
        assert!(resolver.resolve_reference(foo(&f), &reference(&f.a, 1, 11)).is_none());
        // the declaration name
        assert!(resolver.resolve_reference(foo(&f), &reference(&f.a, 0, 4)).is_none());
    }

    #[test]
    fn test_reference_outside_graph_is_external() {
        let f = fixture();
        let pool = LanguageServerPool::new(f.registry.clone(), Vec::new());
        let resolver = ReferenceResolver::new(&pool, &f.graph, &f.syntax, &f.registry);
        let elsewhere = FileUri::parse("file:///usr/lib/python3/site.py").unwrap();

        let resolution = resolver.resolve_reference(foo(&f), &reference(&elsewhere, 3, 2)).unwrap();
        let Resolution::External(rel) = resolution else {
            panic!("expected an external edge");
        };
        assert_eq!(rel.start_node_id, location_id(&elsewhere, Position::new(3, 2)));
        assert_eq!(rel.kind, RelationshipType::References);
        assert!(!f.graph.contains_node(&rel.start_node_id));

        let mut graph = Graph::new();
        append(&mut graph, [Resolution::External(rel)]);
        assert_eq!(graph.external_relationships().len(), 1);
        assert!(graph.relationships().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_without_server_is_empty() {
        let f = fixture();
        let pool = LanguageServerPool::new(f.registry.clone(), Vec::new());
        let resolver = ReferenceResolver::new(&pool, &f.graph, &f.syntax, &f.registry);
        assert!(resolver.resolve(foo(&f)).await.is_empty());
    }

    #[test]
    fn test_non_file_locations_are_ignored() {
        let f = fixture();
        let pool = LanguageServerPool::new(f.registry.clone(), Vec::new());
        let resolver = ReferenceResolver::new(&pool, &f.graph, &f.syntax, &f.registry);
        let start = lsp_types::Position::new(0, 0);
        let jar = Reference::new(Location::new(
            Url::parse("jdt://contents/rt.jar/Object.class").unwrap(),
            Range::new(start, start),
        ));
        assert!(resolver.resolve_reference(foo(&f), &jar).is_none());
    }
}
