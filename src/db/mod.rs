pub mod migrations;
pub mod schema;

use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use std::time::Duration;

use crate::error::Result;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the observation database at the given path with the
/// schema initialized and all migrations applied.
pub fn open_observation_db(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = open_connection(path.as_ref())?;
    prepare_observation_db(&conn)?;
    tracing::info!(path = %path.as_ref().display(), "observation database initialized");
    Ok(conn)
}

/// Open (or create) the vector database at the given path.
pub fn open_vector_db(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = open_connection(path.as_ref())?;
    prepare_vector_db(&conn)?;
    tracing::info!(path = %path.as_ref().display(), "vector database initialized");
    Ok(conn)
}

/// Create observation tables and bring them up to the current schema version.
pub fn prepare_observation_db(conn: &Connection) -> Result<()> {
    schema::init_observation_schema(conn)?;
    migrations::run_migrations(conn)?;
    Ok(())
}

pub fn prepare_vector_db(conn: &Connection) -> Result<()> {
    schema::init_vector_schema(conn)?;
    Ok(())
}

/// Open an in-memory connection with sqlite-vec available. Schema is not
/// initialized.
pub fn open_in_memory() -> Result<Connection> {
    load_sqlite_vec();
    Ok(Connection::open_in_memory()?)
}

fn open_connection(path: &Path) -> Result<Connection> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)?;

    // WAL lets the capture hook write while a search is reading
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.busy_timeout(Duration::from_secs(5))?;

    Ok(conn)
}
