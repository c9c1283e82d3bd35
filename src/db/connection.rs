use std::fs::{self, File};
use std::io;
use std::path::Path;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Open (or create) the SQLite file at `path` and make sure the `person`
/// table exists. Existing rows are never touched.
pub(crate) fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(StoreError::storage("open SQLite database"))?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub(crate) fn open_memory_connection() -> Result<Connection> {
    let conn = Connection::open_in_memory()
        .map_err(StoreError::storage("open in-memory database"))?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Idempotent schema setup, safe to run on every open.
pub(crate) fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS person (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT,
            lastname TEXT,
            birthdate TEXT
        )",
        [],
    )
    .map_err(StoreError::storage("create person table"))?;
    Ok(())
}

/// Replace whatever lives at `path` with an empty file, creating parent
/// directories on the way.
pub(crate) fn truncate_file(path: &Path) -> Result<()> {
    let io_err = |source: io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    File::create(path).map_err(io_err)?;
    Ok(())
}
