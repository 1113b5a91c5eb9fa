//! Persistence records
//!
//! Fixed-shape forms of nodes and relationships handed to a [`GraphStore`].
//!
//! [`GraphStore`]: crate::storage::GraphStore

use crate::edge::{ExternalRelationship, Relationship, RelationshipType};
use crate::node::{NodeArena, NodeIndex, NodeLabel};
use serde::{Deserialize, Serialize};

/// Flat attribute set of a node record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub label: NodeLabel,
    pub path: String,
    /// Hashed identity, the persisted key
    pub node_id: String,
    /// Full identity string
    pub node_path: String,
    pub name: String,
    pub level: u32,
    pub hashed_id: String,
}

/// `{type, attributes}` record for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "type")]
    pub label: NodeLabel,
    pub attributes: NodeAttributes,
}

impl NodeRecord {
    pub fn from_arena(arena: &NodeArena, index: NodeIndex) -> Self {
        let node = arena.get(index);
        let node_path = arena.id(index);
        let hashed_id = crate::node::hash_id(&node_path);
        Self {
            label: node.label,
            attributes: NodeAttributes {
                label: node.label,
                path: node.path.to_string(),
                node_id: hashed_id.clone(),
                node_path,
                name: node.name.clone(),
                level: node.level,
                hashed_id,
            },
        }
    }
}

/// `{start_node_id, end_node_id, type}` record for one edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub start_node_id: String,
    pub end_node_id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

impl From<&Relationship> for RelationshipRecord {
    fn from(rel: &Relationship) -> Self {
        Self {
            start_node_id: rel.start_node_id.clone(),
            end_node_id: rel.end_node_id.clone(),
            kind: rel.kind,
        }
    }
}

impl From<&ExternalRelationship> for RelationshipRecord {
    fn from(rel: &ExternalRelationship) -> Self {
        Self {
            start_node_id: rel.start_node_id.clone(),
            end_node_id: rel.end_node_id.clone(),
            kind: rel.kind,
        }
    }
}

/// Everything a store needs to persist one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphRecords {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<RelationshipRecord>,
}
