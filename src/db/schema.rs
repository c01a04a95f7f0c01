//! SQL DDL for both engram databases.
//!
//! The observation database holds `sessions`, `observations`, the
//! `observations_fts` (FTS5) lexical index and `schema_meta`. The vector
//! database holds `vectors` and its own `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// Version-1 layout of the observation database. Later columns are added by
/// [`super::migrations`].
const OBSERVATION_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    project_path TEXT,
    summary TEXT
);

-- AUTOINCREMENT: deleted ids are never handed out again
CREATE TABLE IF NOT EXISTS observations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    type TEXT NOT NULL,
    content TEXT NOT NULL,
    compressed TEXT,
    file_refs TEXT,
    created_at TEXT NOT NULL,
    token_count INTEGER
);

CREATE INDEX IF NOT EXISTS idx_observations_session ON observations(session_id);
CREATE INDEX IF NOT EXISTS idx_observations_type ON observations(type);

-- Full-text search (BM25)
CREATE VIRTUAL TABLE IF NOT EXISTS observations_fts USING fts5(
    content,
    compressed,
    content='observations',
    content_rowid='id'
);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const VECTOR_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS vectors (
    observation_id INTEGER PRIMARY KEY,
    embedding BLOB NOT NULL,
    content TEXT,
    type TEXT NOT NULL,
    session_id TEXT NOT NULL,
    project_path TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_vectors_project ON vectors(project_path);
CREATE INDEX IF NOT EXISTS idx_vectors_session ON vectors(session_id);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize the observation tables. Idempotent (uses IF NOT EXISTS).
pub fn init_observation_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(OBSERVATION_SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

/// Initialize the vector tables. Idempotent.
pub fn init_vector_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(VECTOR_SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;
    Ok(())
}
