//! Pull cursor and other sync bookkeeping (local only)

use crate::error::Result;
use libsql::Connection;

const PULL_CURSOR_KEY: &str = "pull_cursor";
const LAST_PULLED_AT_KEY: &str = "last_pulled_at";

/// Trait for sync state storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SyncStateRepository {
    /// Cursor returned by the last successful pull
    async fn pull_cursor(&self) -> Result<Option<String>>;

    /// Unix ms of the last successful pull
    async fn last_pulled_at(&self) -> Result<Option<i64>>;

    /// Persist the outcome of a successful pull
    async fn record_pull(&self, cursor: Option<&str>, pulled_at: i64) -> Result<()>;
}

/// libSQL implementation of `SyncStateRepository`
pub struct LibSqlSyncStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_state WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get::<String>(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }
}

impl SyncStateRepository for LibSqlSyncStateRepository<'_> {
    async fn pull_cursor(&self) -> Result<Option<String>> {
        self.get_value(PULL_CURSOR_KEY).await
    }

    async fn last_pulled_at(&self) -> Result<Option<i64>> {
        Ok(self
            .get_value(LAST_PULLED_AT_KEY)
            .await?
            .and_then(|value| value.parse().ok()))
    }

    async fn record_pull(&self, cursor: Option<&str>, pulled_at: i64) -> Result<()> {
        if let Some(cursor) = cursor {
            self.set_value(PULL_CURSOR_KEY, cursor).await?;
        }
        self.set_value(LAST_PULLED_AT_KEY, &pulled_at.to_string())
            .await
    }
}
