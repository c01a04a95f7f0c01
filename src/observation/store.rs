//! Durable observation storage with a synchronously maintained FTS5 index.
//!
//! Every write touches `observations` and `observations_fts` inside one
//! transaction, so a reader can never see a row that lexical search cannot
//! find (or the reverse).

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use crate::db;
use crate::error::Result;
use crate::observation::types::{NewObservation, Observation, Session};

const OBSERVATION_COLUMNS: &str = "o.id, o.session_id, o.type, o.content, o.compressed, \
     o.file_refs, o.project_path, o.created_at, o.token_count";

/// Observation store backed by a single SQLite connection.
pub struct ObservationStore {
    conn: Mutex<Connection>,
}

impl ObservationStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(db::open_observation_db(path)?))
    }

    /// A throwaway store, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        let conn = db::open_in_memory()?;
        db::prepare_observation_db(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Insert an observation and its lexical index entry. Returns the new id.
    pub fn insert(&self, obs: &NewObservation) -> Result<i64> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();

        // 1. Make sure the session exists
        upsert_session(&tx, &obs.session_id, obs.project_path.as_deref(), &now)?;

        // 2. Insert into observations
        let id = insert_row(&tx, obs, &now)?;

        // 3. Sync FTS5 index
        insert_fts(&tx, id, &obs.content, obs.compressed.as_deref())?;

        tx.commit()?;

        tracing::debug!(id, session = %obs.session_id, obs_type = %obs.obs_type, "observation stored");
        Ok(id)
    }

    /// Fetch one observation by id.
    pub fn get(&self, id: i64) -> Result<Option<Observation>> {
        let conn = self.conn.lock()?;
        let sql = format!("SELECT {OBSERVATION_COLUMNS} FROM observations o WHERE o.id = ?1");
        Ok(conn.query_row(&sql, params![id], map_observation).optional()?)
    }

    /// FTS5 BM25 keyword search, best match first.
    ///
    /// FTS5 reports rank as a negative number where more negative is better;
    /// the returned score is its absolute value so that higher means more
    /// relevant. `project_path` restricts results to one project.
    pub fn lexical_search(
        &self,
        query: &str,
        limit: usize,
        project_path: Option<&str>,
    ) -> Result<Vec<(Observation, f64)>> {
        let escaped = escape_fts_query(query);
        if escaped.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock()?;
        let sql = format!(
            "SELECT {OBSERVATION_COLUMNS}, observations_fts.rank \
             FROM observations_fts \
             JOIN observations o ON o.id = observations_fts.rowid \
             WHERE observations_fts MATCH ?1 AND (?2 IS NULL OR o.project_path = ?2) \
             ORDER BY observations_fts.rank LIMIT ?3"
        );
        let mut stmt = conn.prepare(&sql)?;
        let results = stmt
            .query_map(params![escaped, project_path, limit as i64], |row| {
                let rank: f64 = row.get(9)?;
                Ok((map_observation(row)?, rank.abs()))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(results)
    }

    /// Remove an observation and its lexical index entry. Returns `false` if
    /// the id was not present.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction()?;

        // Fetch indexed columns for FTS5 cleanup
        let indexed: Option<(String, Option<String>)> = tx
            .query_row(
                "SELECT content, compressed FROM observations WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((content, compressed)) = indexed else {
            return Ok(false);
        };

        // External content table requires the 'delete' command with the old values
        tx.execute(
            "INSERT INTO observations_fts(observations_fts, rowid, content, compressed) \
             VALUES('delete', ?1, ?2, ?3)",
            params![id, content, compressed],
        )?;
        tx.execute("DELETE FROM observations WHERE id = ?1", params![id])?;

        tx.commit()?;

        tracing::debug!(id, "observation deleted");
        Ok(true)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Stamp a session as finished. Returns `false` for an unknown session.
    pub fn end_session(&self, session_id: &str, summary: Option<&str>) -> Result<bool> {
        let conn = self.conn.lock()?;
        let rows = conn.execute(
            "UPDATE sessions SET ended_at = ?1, summary = COALESCE(?2, summary) WHERE id = ?3",
            params![chrono::Utc::now().to_rfc3339(), summary, session_id],
        )?;
        Ok(rows > 0)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock()?;
        let session = conn
            .query_row(
                "SELECT id, started_at, ended_at, project_path, summary FROM sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok(Session {
                        id: row.get(0)?,
                        started_at: row.get(1)?,
                        ended_at: row.get(2)?,
                        project_path: row.get(3)?,
                        summary: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }
}

fn upsert_session(
    tx: &Transaction,
    session_id: &str,
    project_path: Option<&str>,
    now: &str,
) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO sessions (id, started_at, project_path) VALUES (?1, ?2, ?3)",
        params![session_id, now, project_path],
    )?;
    Ok(())
}

/// Insert a new observation row. Returns its id, which doubles as the FTS5 rowid.
fn insert_row(tx: &Transaction, obs: &NewObservation, now: &str) -> Result<i64> {
    let file_refs = if obs.file_refs.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&obs.file_refs)?)
    };

    tx.execute(
        "INSERT INTO observations \
         (session_id, type, content, compressed, file_refs, project_path, created_at, token_count) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            obs.session_id,
            obs.obs_type.as_str(),
            obs.content,
            obs.compressed,
            file_refs,
            obs.project_path,
            now,
            obs.token_count(),
        ],
    )?;

    Ok(tx.last_insert_rowid())
}

fn insert_fts(tx: &Transaction, id: i64, content: &str, compressed: Option<&str>) -> Result<()> {
    tx.execute(
        "INSERT INTO observations_fts (rowid, content, compressed) VALUES (?1, ?2, ?3)",
        params![id, content, compressed],
    )?;
    Ok(())
}

fn map_observation(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let obs_type: String = row.get(2)?;
    let file_refs: Option<String> = row.get(5)?;
    Ok(Observation {
        id: row.get(0)?,
        session_id: row.get(1)?,
        obs_type: obs_type.into(),
        content: row.get(3)?,
        compressed: row.get(4)?,
        file_refs: file_refs
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        project_path: row.get(6)?,
        created_at: row.get(7)?,
        token_count: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
    })
}

/// Escape a user query for FTS5 MATCH syntax.
///
/// Wraps each whitespace-delimited word in double quotes so FTS5 treats them
/// as plain terms (implicit AND) and no query operators leak through. Words
/// with nothing indexable in them are dropped.
pub(crate) fn escape_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| word.replace('"', ""))
        .filter(|word| word.chars().any(char::is_alphanumeric))
        .map(|word| format!("\"{word}\""))
        .collect::<Vec<_>>()
        .join(" ")
}
