//! Centralized SQLite schema definitions for the graph database.
//!
//! The database is derived state owned by the synchroniser. A
//! `schema_version` mismatch at open time triggers a drop-and-recreate
//! rather than an in-place migration; the node store is the source of
//! truth and the database can be rebuilt from it at any time.

pub const GRAPH_DB_NAME: &str = "specgraph.db";
pub const GRAPH_SCHEMA_VERSION: u32 = 3;

pub const GRAPH_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const GRAPH_DB_SCHEMA_NODES: &str = "
    CREATE TABLE IF NOT EXISTS nodes (
        id TEXT PRIMARY KEY,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        description TEXT,
        source_file TEXT,
        source_anchor TEXT,
        intent TEXT,
        file_path TEXT,
        content_hash TEXT,
        raw_payload TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const GRAPH_DB_SCHEMA_EDGES: &str = "
    CREATE TABLE IF NOT EXISTS edges (
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        relation TEXT NOT NULL,
        metadata TEXT,
        UNIQUE(source_id, target_id, relation),
        FOREIGN KEY(source_id) REFERENCES nodes(id) ON DELETE CASCADE,
        FOREIGN KEY(target_id) REFERENCES nodes(id) ON DELETE CASCADE
    )
";

pub const GRAPH_DB_SCHEMA_DOMAIN_APIS: &str = "
    CREATE TABLE IF NOT EXISTS domain_apis (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain_id TEXT NOT NULL,
        name TEXT NOT NULL,
        signature TEXT NOT NULL DEFAULT '',
        description TEXT,
        input_schema TEXT,
        output_schema TEXT,
        UNIQUE(domain_id, name),
        FOREIGN KEY(domain_id) REFERENCES nodes(id) ON DELETE CASCADE
    )
";

pub const GRAPH_DB_INDEX_NODES_KIND: &str =
    "CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind)";
pub const GRAPH_DB_INDEX_NODES_SOURCE: &str =
    "CREATE INDEX IF NOT EXISTS idx_nodes_source_file ON nodes(source_file)";
pub const GRAPH_DB_INDEX_NODES_FILE_PATH: &str =
    "CREATE INDEX IF NOT EXISTS idx_nodes_file_path ON nodes(file_path)";
pub const GRAPH_DB_INDEX_EDGES_SOURCE: &str =
    "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id)";
pub const GRAPH_DB_INDEX_EDGES_TARGET: &str =
    "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id)";
pub const GRAPH_DB_INDEX_EDGES_RELATION: &str =
    "CREATE INDEX IF NOT EXISTS idx_edges_relation ON edges(relation)";
pub const GRAPH_DB_INDEX_APIS_DOMAIN: &str =
    "CREATE INDEX IF NOT EXISTS idx_domain_apis_domain ON domain_apis(domain_id)";

/// Every DDL statement, in creation order.
pub const GRAPH_DB_STATEMENTS: &[&str] = &[
    GRAPH_DB_SCHEMA_META,
    GRAPH_DB_SCHEMA_NODES,
    GRAPH_DB_SCHEMA_EDGES,
    GRAPH_DB_SCHEMA_DOMAIN_APIS,
    GRAPH_DB_INDEX_NODES_KIND,
    GRAPH_DB_INDEX_NODES_SOURCE,
    GRAPH_DB_INDEX_NODES_FILE_PATH,
    GRAPH_DB_INDEX_EDGES_SOURCE,
    GRAPH_DB_INDEX_EDGES_TARGET,
    GRAPH_DB_INDEX_EDGES_RELATION,
    GRAPH_DB_INDEX_APIS_DOMAIN,
];
