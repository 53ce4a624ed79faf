//! Shared local store wrapper used by views, sync and the CLI.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    ConflictRepository, Database, LibSqlConflictRepository, LibSqlRecordRepository,
    LibSqlSyncStateRepository, RecordRepository, SyncStateRepository,
};
use crate::models::{
    ConflictRecord, ConflictUpsert, LoggedSet, RecordId, Resolution, Session, SessionExercise,
};
use crate::sync::{self, MergeReport, PullSnapshot};
use crate::Result;

/// Thread-safe handle to the local record store.
///
/// A single connection sits behind an async mutex, so writes are serialized.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open a store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing file, if any.
    pub fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Fetch a session by id.
    pub async fn get_session(&self, id: &RecordId) -> Result<Option<Session>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.get_session(id).await
    }

    /// List sessions newest-first.
    pub async fn list_sessions(&self) -> Result<Vec<Session>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.list_sessions().await
    }

    /// Insert or replace a session.
    pub async fn put_session(&self, session: &Session) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.put_session(session).await
    }

    /// Exercises of one session in `order_index` order.
    pub async fn session_exercises(&self, session_id: &RecordId) -> Result<Vec<SessionExercise>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.list_session_exercises(session_id).await
    }

    /// Every session exercise.
    pub async fn all_session_exercises(&self) -> Result<Vec<SessionExercise>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.list_all_session_exercises().await
    }

    /// Insert or replace a session exercise.
    pub async fn put_session_exercise(&self, exercise: &SessionExercise) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.put_session_exercise(exercise).await
    }

    /// Non-voided sets owned by the given session exercises.
    pub async fn active_sets(&self, session_exercise_ids: &[RecordId]) -> Result<Vec<LoggedSet>> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.list_logged_sets(session_exercise_ids, false).await
    }

    /// Insert or replace a logged set.
    pub async fn put_logged_set(&self, set: &LoggedSet) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        repo.put_logged_set(set).await
    }

    /// Create or merge a conflict record.
    pub async fn upsert_conflict(&self, partial: ConflictUpsert) -> Result<ConflictRecord> {
        let db = self.db.lock().await;
        let repo = LibSqlConflictRepository::new(db.connection());
        repo.upsert(partial).await
    }

    /// Fetch a conflict by id.
    pub async fn get_conflict(&self, id: &str) -> Result<Option<ConflictRecord>> {
        let db = self.db.lock().await;
        let repo = LibSqlConflictRepository::new(db.connection());
        repo.get(id).await
    }

    /// List recently updated conflicts.
    pub async fn list_conflicts(&self, limit: usize) -> Result<Vec<ConflictRecord>> {
        let db = self.db.lock().await;
        let repo = LibSqlConflictRepository::new(db.connection());
        repo.list(limit).await
    }

    /// Delete a conflict (no-op when absent).
    pub async fn delete_conflict(&self, id: &str) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlConflictRepository::new(db.connection());
        repo.delete(id).await
    }

    /// Delete every conflict.
    pub async fn clear_conflicts(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let repo = LibSqlConflictRepository::new(db.connection());
        repo.clear().await
    }

    /// Cursor of the last successful pull.
    pub async fn pull_cursor(&self) -> Result<Option<String>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncStateRepository::new(db.connection());
        repo.pull_cursor().await
    }

    /// Unix ms of the last successful pull.
    pub async fn last_pulled_at(&self) -> Result<Option<i64>> {
        let db = self.db.lock().await;
        let repo = LibSqlSyncStateRepository::new(db.connection());
        repo.last_pulled_at().await
    }

    /// Merge a server snapshot and persist its cursor in one transaction.
    pub async fn apply_snapshot(&self, snapshot: &PullSnapshot, now: i64) -> Result<MergeReport> {
        let db = self.db.lock().await;
        db.begin().await?;
        let outcome = async {
            let report = sync::merge_snapshot(db.connection(), snapshot, now).await?;
            let repo = LibSqlSyncStateRepository::new(db.connection());
            repo.record_pull(snapshot.cursor.as_deref(), now).await?;
            Ok::<_, crate::Error>(report)
        }
        .await;
        db.finish(outcome).await
    }

    /// Settle a conflict in favour of one side and delete it.
    pub async fn resolve_conflict(&self, id: &str, resolution: Resolution, now: i64) -> Result<()> {
        let db = self.db.lock().await;
        db.begin().await?;
        let outcome = sync::resolve_conflict(db.connection(), id, resolution, now).await;
        db.finish(outcome).await
    }
}
