//! Node types - the entities of the repository graph
//!
//! Every node lives in a [`NodeArena`] and records its parent as an index.
//! Identity is derived by walking that chain:
//! - a file's `id` is its `file://` path
//! - a child's `id` is `<parent id>.<name>`
//! - `hashed_id` is a 128-bit BLAKE3 digest of `id`

use crate::position::SourceRange;
use crate::uri::FileUri;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Separator between a parent's identity and a child's name
pub const ID_SEPARATOR: &str = ".";

/// Entity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeLabel {
    File,
    Class,
    Function,
    Method,
    Variable,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::File => "FILE",
            NodeLabel::Class => "CLASS",
            NodeLabel::Function => "FUNCTION",
            NodeLabel::Method => "METHOD",
            NodeLabel::Variable => "VARIABLE",
        }
    }

    pub fn all() -> &'static [NodeLabel] {
        &[
            NodeLabel::File,
            NodeLabel::Class,
            NodeLabel::Function,
            NodeLabel::Method,
            NodeLabel::Variable,
        ]
    }

    /// Labels that can anchor a "find references" query
    pub fn is_definition(&self) -> bool {
        !matches!(self, NodeLabel::File)
    }
}

impl FromStr for NodeLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "FILE" => Ok(NodeLabel::File),
            "CLASS" => Ok(NodeLabel::Class),
            "FUNCTION" => Ok(NodeLabel::Function),
            "METHOD" => Ok(NodeLabel::Method),
            "VARIABLE" => Ok(NodeLabel::Variable),
            _ => Err(Error::Protocol(format!("Unknown node label: {}", s))),
        }
    }
}

impl std::fmt::Display for NodeLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of a node inside its arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A parsed program entity.
#[derive(Debug, Clone)]
pub struct Node {
    pub label: NodeLabel,
    pub path: FileUri,
    pub name: String,
    /// Nesting depth, file = 0
    pub level: u32,
    pub parent: Option<NodeIndex>,
    /// Full span of the construct
    pub node_range: SourceRange,
    /// Span of the identifier; present only on definition nodes
    pub definition_range: Option<SourceRange>,
    /// Type the entity is declared on without being nested in it, e.g. a Go
    /// method's receiver. Sits between the parent and the name in the id.
    pub qualifier: Option<String>,
}

impl Node {
    /// Create a file node. Fails when `path` is not a `file://` URI.
    pub fn file(path: &str, node_range: SourceRange) -> Result<Self> {
        let path = FileUri::parse(path)?;
        let name = path.file_name().to_string();
        Ok(Self {
            label: NodeLabel::File,
            path,
            name,
            level: 0,
            parent: None,
            node_range,
            definition_range: None,
            qualifier: None,
        })
    }

    /// Create a definition node below `parent`.
    pub fn definition(
        label: NodeLabel,
        path: &str,
        name: impl Into<String>,
        parent: (NodeIndex, &Node),
        node_range: SourceRange,
        definition_range: SourceRange,
    ) -> Result<Self> {
        let path = FileUri::parse(path)?;
        let (parent_index, parent_node) = parent;
        Ok(Self {
            label,
            path,
            name: name.into(),
            level: parent_node.level + 1,
            parent: Some(parent_index),
            node_range,
            definition_range: Some(definition_range),
            qualifier: None,
        })
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub fn extension(&self) -> String {
        self.path.extension()
    }

    pub fn is_definition(&self) -> bool {
        self.label.is_definition() && self.definition_range.is_some()
    }

    /// This node's own segments of the identity chain, outermost first
    fn representation(&self) -> impl DoubleEndedIterator<Item = &str> {
        let own = match self.label {
            NodeLabel::File => self.path.as_str(),
            _ => &self.name,
        };
        self.qualifier.as_deref().into_iter().chain(std::iter::once(own))
    }
}

/// Deterministic 128-bit digest of an identity string
pub fn hash_id(id: &str) -> String {
    let digest = blake3::hash(id.as_bytes());
    digest.as_bytes()[..16]
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Ordered node storage with parent links by index.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node. Its parent, if any, must already be in this arena.
    pub fn push(&mut self, node: Node) -> NodeIndex {
        debug_assert!(node.parent.is_none_or(|p| p.0 < self.nodes.len()));
        self.nodes.push(node);
        NodeIndex(self.nodes.len() - 1)
    }

    pub fn get(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIndex(i), n))
    }

    /// Full identity string, built by walking the parent chain
    pub fn id(&self, index: NodeIndex) -> String {
        let mut chain = Vec::new();
        let mut current = Some(index);
        while let Some(i) = current {
            let node = self.get(i);
            chain.extend(node.representation().rev());
            current = node.parent;
        }
        chain.reverse();
        chain.join(ID_SEPARATOR)
    }

    /// Identity `node` will have once pushed; its parent must already be here
    pub fn prospective_id(&self, node: &Node) -> String {
        let own = node.representation().collect::<Vec<_>>().join(ID_SEPARATOR);
        match node.parent {
            Some(parent) => format!("{}{}{}", self.id(parent), ID_SEPARATOR, own),
            None => own,
        }
    }

    pub fn hashed_id(&self, index: NodeIndex) -> String {
        hash_id(&self.id(index))
    }

    /// Consume the arena, yielding nodes in insertion order (parents first)
    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Position;

    fn span(line: u32) -> SourceRange {
        SourceRange::new(Position::new(line, 0), Position::new(line + 1, 0))
    }

    fn sample_arena() -> (NodeArena, NodeIndex, NodeIndex) {
        let mut arena = NodeArena::new();
        let path = "file:///repo/src/auth.py";
        let file = arena.push(Node::file(path, span(0)).unwrap());
        let class = Node::definition(
            NodeLabel::Class, path, "Auth", (file, arena.get(file)), span(1), span(1),
        )
        .unwrap();
        let class = arena.push(class);
        let method = Node::definition(
            NodeLabel::Method, path, "validate", (class, arena.get(class)), span(2), span(2),
        )
        .unwrap();
        let method = arena.push(method);
        (arena, class, method)
    }

    #[test]
    fn test_id_walks_parent_chain() {
        let (arena, class, method) = sample_arena();
        assert_eq!(arena.id(class), "file:///repo/src/auth.py.Auth");
        assert_eq!(arena.id(method), "file:///repo/src/auth.py.Auth.validate");
        assert_eq!(arena.get(method).level, 2);
        assert_eq!(arena.prospective_id(arena.get(method)), arena.id(method));
    }

    #[test]
    fn test_qualifier_sits_between_parent_and_name() {
        let mut arena = NodeArena::new();
        let path = "file:///repo/shapes.go";
        let file = arena.push(Node::file(path, span(0)).unwrap());
        let area = |receiver: &str, arena: &NodeArena| {
            Node::definition(
                NodeLabel::Method, path, "Area", (file, arena.get(file)), span(3), span(3),
            )
            .unwrap()
            .with_qualifier(receiver)
        };
        let square = area("Square", &arena);
        assert_eq!(arena.prospective_id(&square), "file:///repo/shapes.go.Square.Area");
        let square = arena.push(square);
        let circle = arena.push(area("Circle", &arena));

        assert_eq!(arena.id(square), "file:///repo/shapes.go.Square.Area");
        assert_eq!(arena.id(circle), "file:///repo/shapes.go.Circle.Area");
        assert_eq!(arena.get(circle).name, "Area");
        assert_eq!(arena.get(circle).level, 1);
    }

    #[test]
    fn test_identity_is_deterministic() {
        let (first, _, m1) = sample_arena();
        let (second, _, m2) = sample_arena();
        assert_eq!(first.id(m1), second.id(m2));
        assert_eq!(first.hashed_id(m1), second.hashed_id(m2));
        assert_eq!(first.hashed_id(m1).len(), 32);
        assert_ne!(hash_id("a"), hash_id("b"));
    }

    #[test]
    fn test_path_must_use_file_scheme() {
        assert!(matches!(
            Node::file("/repo/src/auth.py", span(0)),
            Err(Error::InvalidPath(_))
        ));
        let (arena, class, _) = sample_arena();
        let bad = Node::definition(
            NodeLabel::Function, "repo/auth.py", "f", (class, arena.get(class)), span(3), span(3),
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_definition_flags() {
        let (arena, class, _) = sample_arena();
        assert!(arena.get(class).is_definition());
        assert!(!arena.get(NodeIndex(0)).is_definition());
        assert_eq!(arena.get(class).extension(), "py");
    }

    #[test]
    fn test_label_parsing() {
        for label in NodeLabel::all() {
            assert_eq!(label.as_str().parse::<NodeLabel>().unwrap(), *label);
        }
        assert!("module".parse::<NodeLabel>().is_err());
    }
}
