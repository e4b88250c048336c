//! Relational index of the spec graph.
//!
//! Nodes, edges, and exported domain APIs persisted in SQLite under
//! `.specgraph/.runtime/`. The database is derived state: the
//! synchroniser owns all writes, readers open their own read-only
//! connection, and a schema-version mismatch at open time drops and
//! recreates every table instead of migrating.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

use crate::core::db;
use crate::core::error::SpecGraphError;
use crate::core::meta_schema::NodeKind;
use crate::core::schemas;

/// One row of the `nodes` table.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRow {
    pub id: String,
    pub kind: String,
    pub name: String,
    pub description: Option<String>,
    pub source_file: Option<String>,
    pub source_anchor: Option<String>,
    pub intent: Option<String>,
    pub file_path: Option<String>,
    pub content_hash: Option<String>,
    pub raw_payload: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// One row of the `edges` table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct EdgeRow {
    pub source_id: String,
    pub target_id: String,
    pub relation: String,
    pub metadata: Option<String>,
}

/// One row of the `domain_apis` table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct DomainApiRow {
    pub domain_id: String,
    pub name: String,
    pub signature: String,
    pub description: Option<String>,
    pub input_schema: Option<String>,
    pub output_schema: Option<String>,
}

const NODE_COLUMNS: &str = "id, kind, name, description, source_file, source_anchor, intent, \
     file_path, content_hash, raw_payload, created_at, updated_at";

fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeRow> {
    Ok(NodeRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        source_file: row.get(4)?,
        source_anchor: row.get(5)?,
        intent: row.get(6)?,
        file_path: row.get(7)?,
        content_hash: row.get(8)?,
        raw_payload: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// Handle over the graph database file.
pub struct GraphDb {
    conn: Connection,
}

impl std::fmt::Debug for GraphDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphDb").finish_non_exhaustive()
    }
}

impl GraphDb {
    /// Open (creating if necessary) the writable database. Ensures the
    /// schema exists and rebuilds from scratch on a version mismatch.
    pub fn open(db_path: &Path) -> Result<Self, SpecGraphError> {
        let conn = db::db_connect(db_path)?;
        ensure_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Read-only handle for query surfaces.
    pub fn open_readonly(db_path: &Path) -> Result<Self, SpecGraphError> {
        let conn = db::db_connect_readonly(db_path)?;
        Ok(Self { conn })
    }

    /// Run `f` inside a single transaction; commit on success.
    pub fn with_write_tx<T>(
        &mut self,
        f: impl FnOnce(&Connection) -> Result<T, SpecGraphError>,
    ) -> Result<T, SpecGraphError> {
        let tx = self.conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn get_node(&self, id: &str) -> Result<Option<NodeRow>, SpecGraphError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM nodes WHERE id = ?1", NODE_COLUMNS),
                params![id],
                row_to_node,
            )
            .optional()?;
        Ok(row)
    }

    pub fn nodes_by_kind(&self, kind: NodeKind) -> Result<Vec<NodeRow>, SpecGraphError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM nodes WHERE kind = ?1 ORDER BY id",
            NODE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![kind.as_str()], row_to_node)?;
        collect_rows(rows)
    }

    pub fn all_nodes(&self) -> Result<Vec<NodeRow>, SpecGraphError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM nodes ORDER BY id", NODE_COLUMNS))?;
        let rows = stmt.query_map([], row_to_node)?;
        collect_rows(rows)
    }

    pub fn all_edges(&self) -> Result<Vec<EdgeRow>, SpecGraphError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, target_id, relation, metadata FROM edges \
             ORDER BY source_id, relation, target_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(EdgeRow {
                source_id: row.get(0)?,
                target_id: row.get(1)?,
                relation: row.get(2)?,
                metadata: row.get(3)?,
            })
        })?;
        collect_rows(rows)
    }

    /// Outgoing edges, optionally restricted to one relation.
    pub fn edges_from(
        &self,
        source_id: &str,
        relation: Option<&str>,
    ) -> Result<Vec<EdgeRow>, SpecGraphError> {
        self.edges_by_endpoint("source_id", source_id, relation)
    }

    /// Incoming edges, optionally restricted to one relation.
    pub fn edges_to(
        &self,
        target_id: &str,
        relation: Option<&str>,
    ) -> Result<Vec<EdgeRow>, SpecGraphError> {
        self.edges_by_endpoint("target_id", target_id, relation)
    }

    fn edges_by_endpoint(
        &self,
        column: &str,
        id: &str,
        relation: Option<&str>,
    ) -> Result<Vec<EdgeRow>, SpecGraphError> {
        let sql = match relation {
            Some(_) => format!(
                "SELECT source_id, target_id, relation, metadata FROM edges \
                 WHERE {} = ?1 AND relation = ?2 ORDER BY source_id, relation, target_id",
                column
            ),
            None => format!(
                "SELECT source_id, target_id, relation, metadata FROM edges \
                 WHERE {} = ?1 ORDER BY source_id, relation, target_id",
                column
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let map = |row: &rusqlite::Row<'_>| {
            Ok(EdgeRow {
                source_id: row.get(0)?,
                target_id: row.get(1)?,
                relation: row.get(2)?,
                metadata: row.get(3)?,
            })
        };
        let rows = match relation {
            Some(rel) => stmt.query_map(params![id, rel], map)?,
            None => stmt.query_map(params![id], map)?,
        };
        collect_rows(rows)
    }

    pub fn domain_apis_for(&self, domain_id: &str) -> Result<Vec<DomainApiRow>, SpecGraphError> {
        let mut stmt = self.conn.prepare(
            "SELECT domain_id, name, signature, description, input_schema, output_schema \
             FROM domain_apis WHERE domain_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![domain_id], |row| {
            Ok(DomainApiRow {
                domain_id: row.get(0)?,
                name: row.get(1)?,
                signature: row.get(2)?,
                description: row.get(3)?,
                input_schema: row.get(4)?,
                output_schema: row.get(5)?,
            })
        })?;
        collect_rows(rows)
    }

    pub fn stored_hash(&self, id: &str) -> Result<Option<String>, SpecGraphError> {
        let hash = self
            .conn
            .query_row(
                "SELECT content_hash FROM nodes WHERE id = ?1",
                params![id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
        Ok(hash)
    }

    /// Node owning a given source file, for incremental change mapping.
    pub fn node_id_for_source_file(&self, source_file: &str) -> Result<Option<String>, SpecGraphError> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM nodes WHERE source_file = ?1",
                params![source_file],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Keyword search over name, intent, and description.
    pub fn search(
        &self,
        query: &str,
        kinds: Option<&[NodeKind]>,
    ) -> Result<Vec<NodeRow>, SpecGraphError> {
        let pattern = format!("%{}%", query);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM nodes \
             WHERE name LIKE ?1 OR intent LIKE ?1 OR description LIKE ?1 ORDER BY id",
            NODE_COLUMNS
        ))?;
        let rows = stmt.query_map(params![pattern], row_to_node)?;
        let mut out = collect_rows(rows)?;
        if let Some(kinds) = kinds {
            let names: BTreeSet<&str> = kinds.iter().map(|k| k.as_str()).collect();
            out.retain(|n| names.contains(n.kind.as_str()));
        }
        Ok(out)
    }

    /// Transitive `depends_on` closure restricted to nodes of one kind,
    /// returned as adjacency (node -> its same-kind dependencies).
    /// Includes the start node.
    pub fn depends_on_closure(
        &self,
        start: &str,
        kind: NodeKind,
    ) -> Result<BTreeMap<String, Vec<String>>, SpecGraphError> {
        let mut closure: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut queue = VecDeque::from([start.to_string()]);
        while let Some(current) = queue.pop_front() {
            if closure.contains_key(&current) {
                continue;
            }
            let mut deps = Vec::new();
            for edge in self.edges_from(&current, Some("depends_on"))? {
                match self.get_node(&edge.target_id)? {
                    Some(target) if target.kind == kind.as_str() => {
                        deps.push(edge.target_id.clone());
                        queue.push_back(edge.target_id);
                    }
                    _ => {}
                }
            }
            deps.sort();
            closure.insert(current, deps);
        }
        Ok(closure)
    }
}

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, SpecGraphError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

fn ensure_schema(conn: &Connection) -> Result<(), SpecGraphError> {
    conn.execute(schemas::GRAPH_DB_SCHEMA_META, [])?;
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let current = schemas::GRAPH_SCHEMA_VERSION.to_string();
    if let Some(stored) = stored {
        if stored != current {
            // Derived state: drop and rebuild rather than migrate.
            conn.execute_batch(
                "DROP TABLE IF EXISTS domain_apis;
                 DROP TABLE IF EXISTS edges;
                 DROP TABLE IF EXISTS nodes;
                 DELETE FROM meta;",
            )?;
        }
    }

    for statement in schemas::GRAPH_DB_STATEMENTS {
        conn.execute(statement, [])?;
    }
    conn.execute(
        "INSERT INTO meta(key, value) VALUES('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![current],
    )?;
    Ok(())
}

// ---- Write helpers used inside the synchroniser's transaction ----
// They take a plain `&Connection` so they run against the transaction
// handle as well as a bare connection.

pub fn clear_all(conn: &Connection) -> Result<(), SpecGraphError> {
    conn.execute_batch(
        "DELETE FROM domain_apis;
         DELETE FROM edges;
         DELETE FROM nodes;",
    )?;
    Ok(())
}

/// Insert or update one node row, preserving `created_at` on update.
pub fn upsert_node(conn: &Connection, row: &NodeRow) -> Result<(), SpecGraphError> {
    conn.execute(
        "INSERT INTO nodes (id, kind, name, description, source_file, source_anchor, intent, \
                            file_path, content_hash, raw_payload, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
             kind = excluded.kind,
             name = excluded.name,
             description = excluded.description,
             source_file = excluded.source_file,
             source_anchor = excluded.source_anchor,
             intent = excluded.intent,
             file_path = excluded.file_path,
             content_hash = excluded.content_hash,
             raw_payload = excluded.raw_payload,
             updated_at = excluded.updated_at",
        params![
            row.id,
            row.kind,
            row.name,
            row.description,
            row.source_file,
            row.source_anchor,
            row.intent,
            row.file_path,
            row.content_hash,
            row.raw_payload,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(())
}

/// Remove a node; edges cascade via the foreign keys.
pub fn delete_node(conn: &Connection, id: &str) -> Result<bool, SpecGraphError> {
    let n = conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
    Ok(n > 0)
}

pub fn insert_edge(conn: &Connection, edge: &EdgeRow) -> Result<(), SpecGraphError> {
    conn.execute(
        "INSERT INTO edges (source_id, target_id, relation, metadata)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(source_id, target_id, relation) DO UPDATE SET
             metadata = excluded.metadata",
        params![edge.source_id, edge.target_id, edge.relation, edge.metadata],
    )?;
    Ok(())
}

/// Drop and re-derive all outgoing edges of one node.
pub fn delete_outgoing_edges(conn: &Connection, source_id: &str) -> Result<(), SpecGraphError> {
    conn.execute("DELETE FROM edges WHERE source_id = ?1", params![source_id])?;
    Ok(())
}

/// Drop incoming edges of one relation. Needed for `owns`: the edge is
/// declared by the Feature file but points Domain -> Feature, so
/// re-syncing a feature must clear its stale incoming ownership.
pub fn delete_incoming_edges(
    conn: &Connection,
    target_id: &str,
    relation: &str,
) -> Result<(), SpecGraphError> {
    conn.execute(
        "DELETE FROM edges WHERE target_id = ?1 AND relation = ?2",
        params![target_id, relation],
    )?;
    Ok(())
}

/// Drop every exported API row for one domain.
pub fn delete_domain_apis(conn: &Connection, domain_id: &str) -> Result<(), SpecGraphError> {
    conn.execute(
        "DELETE FROM domain_apis WHERE domain_id = ?1",
        params![domain_id],
    )?;
    Ok(())
}

pub fn upsert_domain_api(conn: &Connection, api: &DomainApiRow) -> Result<(), SpecGraphError> {
    conn.execute(
        "INSERT INTO domain_apis (domain_id, name, signature, description, input_schema, output_schema)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(domain_id, name) DO UPDATE SET
             signature = excluded.signature,
             description = excluded.description,
             input_schema = excluded.input_schema,
             output_schema = excluded.output_schema",
        params![
            api.domain_id,
            api.name,
            api.signature,
            api.description,
            api.input_schema,
            api.output_schema,
        ],
    )?;
    Ok(())
}
