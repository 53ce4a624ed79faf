//! Conflict record repository

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use libsql::{params, Connection, Row};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{ConflictRecord, ConflictUpsert};
use crate::util::now_ms;

use super::row;

/// Trait for conflict storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ConflictRepository {
    /// Create or merge a conflict, stamping `first_seen_at`/`updated_at`
    async fn upsert(&self, partial: ConflictUpsert) -> Result<ConflictRecord>;

    /// Get a conflict by ID
    async fn get(&self, id: &str) -> Result<Option<ConflictRecord>>;

    /// List conflicts, most recently updated first
    async fn list(&self, limit: usize) -> Result<Vec<ConflictRecord>>;

    /// Delete a conflict; missing ids are not an error
    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete every conflict, returning how many were removed
    async fn clear(&self) -> Result<u64>;
}

/// libSQL implementation of `ConflictRepository`
pub struct LibSqlConflictRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlConflictRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a conflict from a database row
    fn parse_conflict(row: &Row) -> Result<ConflictRecord> {
        let id = row::text(row, 0).map_err(Error::Database)?;
        let invalid = |reason: String| Error::InvalidRecord {
            table: "conflicts",
            id: id.clone(),
            reason,
        };

        let local_json = row::text(row, 3).map_err(invalid)?;
        let server_json = row::text(row, 4).map_err(invalid)?;
        let fields_json = row::text(row, 5).map_err(invalid)?;

        Ok(ConflictRecord {
            table: row::text(row, 1).map_err(invalid)?,
            entity_id: row::text(row, 2).map_err(invalid)?,
            local: serde_json::from_str::<Map<String, Value>>(&local_json)?,
            server: serde_json::from_str::<Map<String, Value>>(&server_json)?,
            fields: serde_json::from_str::<Vec<String>>(&fields_json)?,
            first_seen_at: row::integer(row, 6).map_err(invalid)?,
            updated_at: row::integer(row, 7).map_err(invalid)?,
            id,
        })
    }

    async fn save(&self, record: &ConflictRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO conflicts
                    (id, table_name, entity_id, local_json, server_json, fields_json, first_seen_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    table_name = excluded.table_name,
                    entity_id = excluded.entity_id,
                    local_json = excluded.local_json,
                    server_json = excluded.server_json,
                    fields_json = excluded.fields_json,
                    updated_at = excluded.updated_at",
                params![
                    record.id.as_str(),
                    record.table.as_str(),
                    record.entity_id.as_str(),
                    serde_json::to_string(&record.local)?,
                    serde_json::to_string(&record.server)?,
                    serde_json::to_string(&record.fields)?,
                    record.first_seen_at,
                    record.updated_at
                ],
            )
            .await?;
        Ok(())
    }
}

const CONFLICT_COLUMNS: &str =
    "id, table_name, entity_id, local_json, server_json, fields_json, first_seen_at, updated_at";

impl ConflictRepository for LibSqlConflictRepository<'_> {
    async fn upsert(&self, partial: ConflictUpsert) -> Result<ConflictRecord> {
        if partial.id.trim().is_empty() {
            return Err(Error::InvalidInput("Conflict ID cannot be empty".into()));
        }

        let now = now_ms();
        let record = match self.get(&partial.id).await? {
            Some(existing) => partial.merge_into(existing, now),
            None => partial.into_new_record(now),
        };

        self.save(&record).await?;
        tracing::debug!(
            "Recorded conflict {} ({} fields)",
            record.id,
            record.fields.len()
        );
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<ConflictRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {CONFLICT_COLUMNS} FROM conflicts WHERE id = ?"),
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Self::parse_conflict(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: usize) -> Result<Vec<ConflictRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CONFLICT_COLUMNS} FROM conflicts
                     ORDER BY updated_at DESC, id ASC
                     LIMIT ?"
                ),
                [limit as i64],
            )
            .await?;

        let mut conflicts = Vec::new();
        while let Some(row) = rows.next().await? {
            conflicts.push(Self::parse_conflict(&row)?);
        }
        Ok(conflicts)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM conflicts WHERE id = ?", [id])
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let removed = self.conn.execute("DELETE FROM conflicts", ()).await?;
        tracing::debug!("Cleared {removed} conflicts");
        Ok(removed)
    }
}
