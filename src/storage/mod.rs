//! Storage Layer - persistence of graph records
//!
//! [`GraphStore`] is the contract a run's output is written through;
//! [`SqliteStore`] implements it with tables:
//! - nodes(node_id, label, path, node_path, name, level, hashed_id)
//! - edges(start_node_id, end_node_id, type)

pub mod schema;
pub mod sqlite;

pub use sqlite::{SqliteStore, StoreStats};

use crate::graph::Graph;
use crate::record::{NodeRecord, RelationshipRecord};
use crate::Result;

/// Write side of a graph database.
pub trait GraphStore {
    /// Upsert nodes
    fn create_nodes(&mut self, nodes: &[NodeRecord]) -> Result<()>;

    /// Insert edges, ignoring ones already present
    fn create_edges(&mut self, edges: &[RelationshipRecord]) -> Result<()>;

    /// Nodes first, then edges
    fn save_graph(&mut self, nodes: &[NodeRecord], edges: &[RelationshipRecord]) -> Result<()> {
        self.create_nodes(nodes)?;
        self.create_edges(edges)
    }

    /// Remove every node of a file together with each edge touching one of
    /// them. Returns the number of nodes removed.
    fn detach_delete_nodes_with_path(&mut self, path: &str) -> Result<usize>;

    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Replace what the store holds for every file of `graph` with this run's data.
pub fn persist<S: GraphStore>(graph: &Graph, store: &mut S) -> Result<()> {
    let mut files: Vec<_> = graph.files().collect();
    files.sort();
    let mut removed = 0;
    for file in files {
        removed += store.detach_delete_nodes_with_path(file.as_str())?;
    }
    if removed > 0 {
        tracing::debug!("Invalidated {} previously stored nodes", removed);
    }

    let records = graph.to_records();
    store.save_graph(&records.nodes, &records.edges)?;
    tracing::info!(
        "Persisted {} nodes and {} edges",
        records.nodes.len(),
        records.edges.len()
    );
    Ok(())
}
