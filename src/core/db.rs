//! Database connection primitives for the graph index.
//!
//! - **WAL mode enabled**: readers may run while the synchroniser writes
//! - **Foreign keys enforced**: edge endpoints cascade with their nodes
//! - **Busy timeout**: 5-second retry window for lock contention
//! - **Single writer**: only the synchroniser opens a writable connection

use rusqlite::{Connection, OpenFlags};
use std::fs;
use std::path::Path;

use crate::core::error::SpecGraphError;

/// Establish a SQLite connection with SpecGraph's standard configuration.
pub fn db_connect(db_path: &Path) -> Result<Connection, SpecGraphError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(SpecGraphError::IoError)?;
    }
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    Ok(conn)
}

/// Open a read-only connection for query surfaces (monitor CLI, context
/// assembler). Fails if the database has not been created yet.
pub fn db_connect_readonly(db_path: &Path) -> Result<Connection, SpecGraphError> {
    if !db_path.exists() {
        return Err(SpecGraphError::NotFound(format!(
            "graph database not found at {}. Run `specgraph sync` first.",
            db_path.display()
        )));
    }
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<(), SpecGraphError> {
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(SpecGraphError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(SpecGraphError::RusqliteError)?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")
        .map_err(SpecGraphError::RusqliteError)?;
    Ok(())
}

/// Epoch-seconds timestamp with a trailing `Z`, used for node row stamps.
pub fn now_iso() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("{}Z", secs)
}
