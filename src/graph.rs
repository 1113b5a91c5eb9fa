//! Repository Graph - in-memory assembly of one indexing run
//!
//! Nodes are appended into a single arena and indexed by hashed id and by file.
//! Relationships whose endpoints are both expected to be nodes of this run go
//! into the internal list; relationships pointing outside the indexed set go
//! into a separate external list that is never checked against the node set.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::edge::{ExternalRelationship, Relationship, RelationshipType};
use crate::node::{hash_id, Node, NodeArena, NodeIndex, NodeLabel};
use crate::position::Position;
use crate::record::{GraphRecords, NodeRecord, RelationshipRecord};
use crate::uri::FileUri;
use crate::{Error, Result};

/// In-memory graph for one indexing run.
///
/// Append-only: nodes and relationships are never removed or rewritten once
/// added. The builder owns the graph and is the only writer.
#[derive(Debug, Default)]
pub struct Graph {
    arena: NodeArena,
    /// Hashed id → node
    ids: HashMap<String, NodeIndex>,
    /// Nodes by file, in insertion order (file node first)
    files: HashMap<FileUri, Vec<NodeIndex>>,
    relationships: Vec<Relationship>,
    seen_relationships: HashSet<Relationship>,
    external_relationships: Vec<ExternalRelationship>,
    seen_external: HashSet<ExternalRelationship>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose parent (if any) is already in this graph.
    ///
    /// A node whose identity is already present is not stored twice; the
    /// existing index is returned so children attach to the first occurrence.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        let hashed = hash_id(&self.arena.prospective_id(&node));
        if let Some(existing) = self.ids.get(&hashed) {
            tracing::debug!("Merging duplicate {} {} into existing node", node.label, node.name);
            return *existing;
        }

        let path = node.path.clone();
        let index = self.arena.push(node);
        self.ids.insert(hashed, index);
        self.files.entry(path).or_default().push(index);
        index
    }

    /// Merge a whole arena (typically one parsed file), rebasing parent links.
    /// Returns the graph index of every source node, by source position.
    pub fn add_nodes(&mut self, arena: NodeArena) -> Vec<NodeIndex> {
        let mut mapping: Vec<NodeIndex> = Vec::with_capacity(arena.len());
        for mut node in arena.into_nodes() {
            node.parent = node.parent.map(|p| mapping[p.index()]);
            mapping.push(self.add_node(node));
        }
        mapping
    }

    /// Add an internal relationship. Duplicates are ignored.
    pub fn add_relationship(&mut self, relationship: Relationship) {
        if self.seen_relationships.insert(relationship.clone()) {
            self.relationships.push(relationship);
        }
    }

    /// Add a relationship with an endpoint outside the indexed set.
    pub fn add_external_relationship(&mut self, relationship: ExternalRelationship) {
        if self.seen_external.insert(relationship.clone()) {
            self.external_relationships.push(relationship);
        }
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        self.arena.get(index)
    }

    pub fn id(&self, index: NodeIndex) -> String {
        self.arena.id(index)
    }

    pub fn hashed_id(&self, index: NodeIndex) -> String {
        self.arena.hashed_id(index)
    }

    pub fn node_by_hashed_id(&self, hashed_id: &str) -> Option<NodeIndex> {
        self.ids.get(hashed_id).copied()
    }

    pub fn contains_node(&self, hashed_id: &str) -> bool {
        self.ids.contains_key(hashed_id)
    }

    /// All files with at least one node, in no particular order
    pub fn files(&self) -> impl Iterator<Item = &FileUri> {
        self.files.keys()
    }

    pub fn nodes_in_file(&self, path: &FileUri) -> &[NodeIndex] {
        self.files.get(path).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Deepest node of `path` whose span contains `pos`
    pub fn find_enclosing_node(&self, path: &FileUri, pos: Position) -> Option<NodeIndex> {
        self.nodes_in_file(path)
            .iter()
            .copied()
            .filter(|&i| self.node(i).node_range.contains(pos))
            .max_by_key(|&i| self.node(i).level)
    }

    /// Nodes that can anchor a reference query, in insertion order
    pub fn definition_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.arena
            .iter()
            .filter(|(_, node)| node.is_definition())
            .map(|(i, _)| i)
    }

    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn external_relationships(&self) -> &[ExternalRelationship] {
        &self.external_relationships
    }

    /// Check that every internal relationship resolves to known nodes.
    pub fn validate(&self) -> Result<()> {
        for rel in &self.relationships {
            if !self.contains_node(&rel.start_node_id) || !self.contains_node(&rel.end_node_id) {
                return Err(Error::DanglingRelationship {
                    start: rel.start_node_id.clone(),
                    end: rel.end_node_id.clone(),
                    kind: rel.kind,
                });
            }
        }
        Ok(())
    }

    /// Flatten the graph for a store. Edges are internal followed by external.
    pub fn to_records(&self) -> GraphRecords {
        let nodes = self
            .arena
            .iter()
            .map(|(i, _)| NodeRecord::from_arena(&self.arena, i))
            .collect();
        let edges = self
            .relationships
            .iter()
            .map(RelationshipRecord::from)
            .chain(self.external_relationships.iter().map(RelationshipRecord::from))
            .collect();
        GraphRecords { nodes, edges }
    }

    pub fn stats(&self) -> GraphStats {
        let mut nodes_by_label = BTreeMap::new();
        for (_, node) in self.arena.iter() {
            *nodes_by_label.entry(node.label).or_insert(0) += 1;
        }
        let mut relationships_by_type = BTreeMap::new();
        for rel in &self.relationships {
            *relationships_by_type.entry(rel.kind).or_insert(0) += 1;
        }
        GraphStats {
            files: self.files.len(),
            nodes_by_label,
            relationships_by_type,
            external_relationships: self.external_relationships.len(),
        }
    }
}

/// Statistics about a graph
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct GraphStats {
    pub files: usize,
    pub nodes_by_label: BTreeMap<NodeLabel, usize>,
    pub relationships_by_type: BTreeMap<RelationshipType, usize>,
    pub external_relationships: usize,
}

impl GraphStats {
    pub fn total_nodes(&self) -> usize {
        self.nodes_by_label.values().sum()
    }

    pub fn total_relationships(&self) -> usize {
        self.relationships_by_type.values().sum()
    }
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Graph Statistics:")?;
        writeln!(f, "  Files: {}", self.files)?;
        writeln!(f, "  Nodes: {}", self.total_nodes())?;
        for (label, count) in &self.nodes_by_label {
            writeln!(f, "    {}: {}", label, count)?;
        }
        writeln!(f, "  Relationships: {}", self.total_relationships())?;
        for (kind, count) in &self.relationships_by_type {
            writeln!(f, "    {}: {}", kind, count)?;
        }
        writeln!(f, "  External relationships: {}", self.external_relationships)
    }
}
