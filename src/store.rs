use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE: &str = "grades.sqlite3";

/// Share links expire two hours after creation.
pub const SHARE_TTL_HOURS: i64 = 2;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    // Singleton row: the cache holds only the last valid import, verbatim.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades_cache(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            payload TEXT NOT NULL,
            imported_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS shares(
            id TEXT PRIMARY KEY,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn fmt_time(t: DateTime<Utc>) -> String {
    // Fixed-width UTC form so lexicographic comparison in SQL is sound.
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn cache_store(conn: &Connection, raw_json: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO grades_cache(id, payload, imported_at) VALUES(1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET
            payload = excluded.payload,
            imported_at = excluded.imported_at",
        (raw_json, fmt_time(now)),
    )?;
    Ok(())
}

/// Returns the raw payload text and its import timestamp. The caller is
/// responsible for re-validating and clearing the cache if the text no
/// longer parses.
pub fn cache_load(conn: &Connection) -> anyhow::Result<Option<(String, String)>> {
    let row = conn
        .query_row(
            "SELECT payload, imported_at FROM grades_cache WHERE id = 1",
            [],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    Ok(row)
}

pub fn cache_clear(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("DELETE FROM grades_cache", [])?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ShareRecord {
    pub id: String,
    pub created_at: String,
    pub expires_at: String,
}

pub fn share_create(
    conn: &Connection,
    raw_json: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<ShareRecord> {
    let record = ShareRecord {
        id: Uuid::new_v4().to_string(),
        created_at: fmt_time(now),
        expires_at: fmt_time(now + Duration::hours(SHARE_TTL_HOURS)),
    };
    conn.execute(
        "INSERT INTO shares(id, payload, created_at, expires_at) VALUES(?1, ?2, ?3, ?4)",
        (&record.id, raw_json, &record.created_at, &record.expires_at),
    )?;
    Ok(record)
}

/// Expired rows are deleted on access and reported as absent.
pub fn share_get(
    conn: &Connection,
    id: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<String>> {
    let row = conn
        .query_row(
            "SELECT payload, expires_at FROM shares WHERE id = ?1",
            [id],
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )
        .optional()?;
    let Some((payload, expires_at)) = row else {
        return Ok(None);
    };

    let expired = match DateTime::parse_from_rfc3339(&expires_at) {
        Ok(t) => t.with_timezone(&Utc) <= now,
        // Unparseable expiry counts as expired.
        Err(_) => true,
    };
    if expired {
        conn.execute("DELETE FROM shares WHERE id = ?1", [id])?;
        return Ok(None);
    }
    Ok(Some(payload))
}

pub fn share_purge_expired(conn: &Connection, now: DateTime<Utc>) -> anyhow::Result<usize> {
    let n = conn.execute("DELETE FROM shares WHERE expires_at <= ?1", [fmt_time(now)])?;
    Ok(n)
}
