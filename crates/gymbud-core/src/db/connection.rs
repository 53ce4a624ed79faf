//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for the local libSQL record store
pub struct Database {
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        Self::from_libsql(db).await
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_libsql(db).await
    }

    async fn from_libsql(db: LibSqlDatabase) -> Result<Self> {
        let conn = db.connect()?;
        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for a single-writer local cache
    async fn configure(&self) -> Result<()> {
        // In-memory databases reject WAL; that is fine.
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok();
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Begin a write transaction.
    ///
    /// A transaction left open by a task aborted mid-write is rolled back
    /// first.
    pub async fn begin(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            tracing::warn!("Rolling back an abandoned transaction");
            self.conn.execute("ROLLBACK", ()).await?;
        }
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        Ok(())
    }

    /// Commit on success, roll back on failure.
    pub async fn finish<T>(&self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                if let Err(e) = self.conn.execute("COMMIT", ()).await {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(e)
            }
        }
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        assert_eq!(row.get::<i64>(0).unwrap(), 1);
    }

    async fn count(db: &Database) -> i64 {
        let mut rows = db
            .connection()
            .query("SELECT COUNT(*) FROM sync_state", ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get::<i64>(0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_finish_commits_or_rolls_back() {
        let db = Database::open_in_memory().await.unwrap();

        db.begin().await.unwrap();
        db.connection()
            .execute("INSERT INTO sync_state (key, value) VALUES ('a', '1')", ())
            .await
            .unwrap();
        db.finish(Ok(())).await.unwrap();
        assert_eq!(count(&db).await, 1);

        db.begin().await.unwrap();
        db.connection()
            .execute("INSERT INTO sync_state (key, value) VALUES ('b', '2')", ())
            .await
            .unwrap();
        let failed: Result<()> = Err(crate::Error::InvalidInput("stop".into()));
        assert!(db.finish(failed).await.is_err());
        assert_eq!(count(&db).await, 1);
        assert!(db.connection().is_autocommit());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_begin_discards_abandoned_transaction() {
        let db = Database::open_in_memory().await.unwrap();

        db.begin().await.unwrap();
        db.connection()
            .execute("INSERT INTO sync_state (key, value) VALUES ('a', '1')", ())
            .await
            .unwrap();

        db.begin().await.unwrap();
        db.finish(Ok(())).await.unwrap();
        assert_eq!(count(&db).await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_on_disk_is_reopenable() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("gymbud.db");

        drop(Database::open(&db_path).await.unwrap());
        let reopened = Database::open(&db_path).await;
        assert!(reopened.is_ok());
        assert!(db_path.exists());
    }
}
