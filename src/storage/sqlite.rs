//! SQLite storage implementation

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use super::{schema, GraphStore};
use crate::edge::RelationshipType;
use crate::node::NodeLabel;
use crate::record::{NodeAttributes, NodeRecord, RelationshipRecord};
use crate::Result;

const NODE_COLUMNS: &str = "node_id, label, path, node_path, name, level, hashed_id";

/// SQLite-backed store for graph records
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        for stmt in schema::all_schema_statements() {
            self.conn.execute(stmt, [])?;
        }
        Ok(())
    }

    // ========== Node Queries ==========

    pub fn get_node(&self, node_id: &str) -> Result<Option<NodeRecord>> {
        let sql = format!("SELECT {} FROM nodes WHERE node_id = ?1", NODE_COLUMNS);
        let node = self
            .conn
            .query_row(&sql, params![node_id], row_to_node)
            .optional()?;
        Ok(node)
    }

    /// Nodes of one file, shallowest first
    pub fn nodes_with_path(&self, path: &str) -> Result<Vec<NodeRecord>> {
        let sql = format!(
            "SELECT {} FROM nodes WHERE path = ?1 ORDER BY level, node_path",
            NODE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let nodes = stmt
            .query_map(params![path], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    pub fn count_nodes(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM nodes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Edge Queries ==========

    pub fn edges_from(&self, node_id: &str) -> Result<Vec<RelationshipRecord>> {
        self.edges_where("start_node_id = ?1", node_id)
    }

    pub fn edges_to(&self, node_id: &str) -> Result<Vec<RelationshipRecord>> {
        self.edges_where("end_node_id = ?1", node_id)
    }

    fn edges_where(&self, condition: &str, value: &str) -> Result<Vec<RelationshipRecord>> {
        let sql = format!(
            "SELECT start_node_id, end_node_id, type FROM edges WHERE {} ORDER BY id",
            condition
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let edges = stmt
            .query_map(params![value], row_to_edge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(edges)
    }

    pub fn count_edges(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ========== Statistics ==========

    fn grouped_counts(&self, sql: &str) -> Result<BTreeMap<String, usize>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            let key: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok((key, count as usize))
        })?;
        Ok(rows.collect::<rusqlite::Result<BTreeMap<_, _>>>()?)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            nodes: self.count_nodes()?,
            edges: self.count_edges()?,
            nodes_by_label: self.grouped_counts("SELECT label, COUNT(*) FROM nodes GROUP BY label")?,
            edges_by_type: self.grouped_counts("SELECT type, COUNT(*) FROM edges GROUP BY type")?,
        })
    }
}

impl GraphStore for SqliteStore {
    fn create_nodes(&mut self, nodes: &[NodeRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(&format!(
                "INSERT OR REPLACE INTO nodes ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                NODE_COLUMNS
            ))?;
            for node in nodes {
                let a = &node.attributes;
                stmt.execute(params![
                    a.node_id,
                    a.label.as_str(),
                    a.path,
                    a.node_path,
                    a.name,
                    a.level,
                    a.hashed_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn create_edges(&mut self, edges: &[RelationshipRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO edges (start_node_id, end_node_id, type) VALUES (?1, ?2, ?3)",
            )?;
            for edge in edges {
                stmt.execute(params![edge.start_node_id, edge.end_node_id, edge.kind.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn detach_delete_nodes_with_path(&mut self, path: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        tx.execute(
            r#"
            DELETE FROM edges
            WHERE start_node_id IN (SELECT node_id FROM nodes WHERE path = ?1)
               OR end_node_id IN (SELECT node_id FROM nodes WHERE path = ?1)
            "#,
            params![path],
        )?;
        let removed = tx.execute("DELETE FROM nodes WHERE path = ?1", params![path])?;
        tx.commit()?;
        Ok(removed)
    }

    fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| e.into())
    }
}

fn conversion_error(column: usize, error: crate::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<NodeRecord> {
    let label: String = row.get(1)?;
    let label = NodeLabel::from_str(&label).map_err(|e| conversion_error(1, e))?;
    Ok(NodeRecord {
        label,
        attributes: NodeAttributes {
            node_id: row.get(0)?,
            label,
            path: row.get(2)?,
            node_path: row.get(3)?,
            name: row.get(4)?,
            level: row.get(5)?,
            hashed_id: row.get(6)?,
        },
    })
}

fn row_to_edge(row: &rusqlite::Row) -> rusqlite::Result<RelationshipRecord> {
    let kind: String = row.get(2)?;
    Ok(RelationshipRecord {
        start_node_id: row.get(0)?,
        end_node_id: row.get(1)?,
        kind: RelationshipType::from_str(&kind).map_err(|e| conversion_error(2, e))?,
    })
}

/// Database statistics
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub nodes: usize,
    pub edges: usize,
    pub nodes_by_label: BTreeMap<String, usize>,
    pub edges_by_type: BTreeMap<String, usize>,
}

impl std::fmt::Display for StoreStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Statistics:")?;
        writeln!(f, "  Nodes: {}", self.nodes)?;
        for (label, count) in &self.nodes_by_label {
            writeln!(f, "    {}: {}", label, count)?;
        }
        writeln!(f, "  Edges: {}", self.edges)?;
        for (kind, count) in &self.edges_by_type {
            writeln!(f, "    {}: {}", kind, count)?;
        }
        Ok(())
    }
}
