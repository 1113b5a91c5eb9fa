//! Database schema definitions

/// One row per graph node, keyed by hashed id
pub const CREATE_NODES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    node_id TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    path TEXT NOT NULL,
    node_path TEXT NOT NULL,
    name TEXT NOT NULL,
    level INTEGER NOT NULL,
    hashed_id TEXT NOT NULL
)
"#;

/// Edges reference node ids without a foreign key: external edges start at
/// ids that have no node row.
pub const CREATE_EDGES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS edges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_node_id TEXT NOT NULL,
    end_node_id TEXT NOT NULL,
    type TEXT NOT NULL,
    UNIQUE(start_node_id, end_node_id, type)
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_nodes_path ON nodes(path)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name)",
    "CREATE INDEX IF NOT EXISTS idx_edges_start ON edges(start_node_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_end ON edges(end_node_id)",
    "CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(type)",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![CREATE_NODES_TABLE, CREATE_EDGES_TABLE];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts
}
