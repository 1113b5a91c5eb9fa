//! Relationship types - directed edges between entity identities
//!
//! Edges reference nodes by hashed id rather than by arena index, so an edge
//! can be created before both endpoints are known and checked later.
//!
//! - `Relationship`: both endpoints are expected to be nodes of this run
//! - `ExternalRelationship`: one endpoint has no backing node

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Closed set of relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Structural nesting (file → class → method)
    Contains,
    /// Call site → callee
    Calls,
    /// Importing entity → imported definition
    Imports,
    /// Subclass → base class
    Inherits,
    /// Entity using a definition as a type annotation
    Types,
    /// Entity assigning a definition to a name
    Assigns,
    /// Any other usage
    References,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Contains => "CONTAINS",
            RelationshipType::Calls => "CALLS",
            RelationshipType::Imports => "IMPORTS",
            RelationshipType::Inherits => "INHERITS",
            RelationshipType::Types => "TYPES",
            RelationshipType::Assigns => "ASSIGNS",
            RelationshipType::References => "REFERENCES",
        }
    }

    pub fn all() -> &'static [RelationshipType] {
        &[
            RelationshipType::Contains,
            RelationshipType::Calls,
            RelationshipType::Imports,
            RelationshipType::Inherits,
            RelationshipType::Types,
            RelationshipType::Assigns,
            RelationshipType::References,
        ]
    }

    /// Check if this kind came from a language server rather than the syntax tree
    pub fn is_usage(&self) -> bool {
        !matches!(self, RelationshipType::Contains)
    }
}

impl FromStr for RelationshipType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationshipType::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| crate::Error::Protocol(format!("Unknown relationship type: {}", s)))
    }
}

impl std::fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed edge between two nodes of the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub start_node_id: String,
    pub end_node_id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

impl Relationship {
    pub fn new(
        start_node_id: impl Into<String>,
        end_node_id: impl Into<String>,
        kind: RelationshipType,
    ) -> Self {
        Self {
            start_node_id: start_node_id.into(),
            end_node_id: end_node_id.into(),
            kind,
        }
    }
}

/// An edge with one endpoint outside the indexed set.
///
/// Same shape as [`Relationship`], kept as a separate type so it can never be
/// mixed into the internally validated edge list by accident.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRelationship {
    pub start_node_id: String,
    pub end_node_id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
}

impl ExternalRelationship {
    pub fn new(
        start_node_id: impl Into<String>,
        end_node_id: impl Into<String>,
        kind: RelationshipType,
    ) -> Self {
        Self {
            start_node_id: start_node_id.into(),
            end_node_id: end_node_id.into(),
            kind,
        }
    }
}
