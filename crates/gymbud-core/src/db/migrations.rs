//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;
    if version >= CURRENT_VERSION {
        return Ok(());
    }

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Run a migration's statements inside one transaction
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn
        .execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .await
    {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}

/// Migration to version 1: mirrored training tables
async fn migrate_v1(conn: &Connection) -> Result<()> {
    apply(
        conn,
        1,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                date TEXT NOT NULL,
                status TEXT NOT NULL,
                is_baseline INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                synced_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date DESC)",
            // No foreign keys: the pull may deliver children before parents.
            "CREATE TABLE IF NOT EXISTS session_exercises (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                order_index INTEGER NOT NULL DEFAULT 0,
                exercise_id TEXT NOT NULL,
                exercise_name TEXT,
                updated_at INTEGER NOT NULL,
                synced_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_session_exercises_session ON session_exercises(session_id)",
            "CREATE TABLE IF NOT EXISTS logged_sets (
                id TEXT PRIMARY KEY,
                session_exercise_id TEXT NOT NULL,
                set_number INTEGER NOT NULL,
                reps INTEGER,
                weight_kg REAL,
                rpe REAL,
                voided INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                synced_at INTEGER
            )",
            "CREATE INDEX IF NOT EXISTS idx_logged_sets_exercise ON logged_sets(session_exercise_id)",
            "CREATE INDEX IF NOT EXISTS idx_logged_sets_voided ON logged_sets(voided)",
        ],
    )
    .await
}

/// Migration to version 2: conflict records and pull cursor
async fn migrate_v2(conn: &Connection) -> Result<()> {
    apply(
        conn,
        2,
        &[
            "CREATE TABLE IF NOT EXISTS conflicts (
                id TEXT PRIMARY KEY,
                table_name TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                local_json TEXT NOT NULL,
                server_json TEXT NOT NULL,
                fields_json TEXT NOT NULL,
                first_seen_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_conflicts_updated ON conflicts(updated_at DESC)",
            "CREATE TABLE IF NOT EXISTS sync_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
    )
    .await
}
