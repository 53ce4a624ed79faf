//! Merging pulled server rows into the local store.

use libsql::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::{
    ConflictRepository, LibSqlConflictRepository, LibSqlRecordRepository, MirroredTable,
    RecordRepository,
};
use crate::diff::{diff_fields, shallow_diff};
use crate::error::{Error, Result};
use crate::models::{
    ConflictUpsert, LoggedSet, RecordId, Resolution, Session, SessionExercise, Tracked,
};

use super::{MergeReport, PullSnapshot};

/// A row type mirrored from the backend
#[allow(async_fn_in_trait)]
trait Mirrored: Tracked + Serialize + DeserializeOwned + Sized {
    const TABLE: MirroredTable;

    fn record_id(&self) -> &RecordId;

    fn set_stamps(&mut self, updated_at: i64, synced_at: Option<i64>);

    async fn load(repo: &LibSqlRecordRepository<'_>, id: &RecordId) -> Result<Option<Self>>;

    async fn store(&self, repo: &LibSqlRecordRepository<'_>) -> Result<()>;

    /// Server copy stamped as in sync with the server
    fn into_synced(mut self, now: i64) -> Self {
        let updated_at = if self.updated_at() > 0 {
            self.updated_at()
        } else {
            now
        };
        self.set_stamps(updated_at, Some(now.max(updated_at)));
        self
    }
}

impl Mirrored for Session {
    const TABLE: MirroredTable = MirroredTable::Sessions;

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn set_stamps(&mut self, updated_at: i64, synced_at: Option<i64>) {
        self.updated_at = updated_at;
        self.synced_at = synced_at;
    }

    async fn load(repo: &LibSqlRecordRepository<'_>, id: &RecordId) -> Result<Option<Self>> {
        repo.get_session(id).await
    }

    async fn store(&self, repo: &LibSqlRecordRepository<'_>) -> Result<()> {
        repo.put_session(self).await
    }
}

impl Mirrored for SessionExercise {
    const TABLE: MirroredTable = MirroredTable::SessionExercises;

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn set_stamps(&mut self, updated_at: i64, synced_at: Option<i64>) {
        self.updated_at = updated_at;
        self.synced_at = synced_at;
    }

    async fn load(repo: &LibSqlRecordRepository<'_>, id: &RecordId) -> Result<Option<Self>> {
        repo.get_session_exercise(id).await
    }

    async fn store(&self, repo: &LibSqlRecordRepository<'_>) -> Result<()> {
        repo.put_session_exercise(self).await
    }
}

impl Mirrored for LoggedSet {
    const TABLE: MirroredTable = MirroredTable::LoggedSets;

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn set_stamps(&mut self, updated_at: i64, synced_at: Option<i64>) {
        self.updated_at = updated_at;
        self.synced_at = synced_at;
    }

    async fn load(repo: &LibSqlRecordRepository<'_>, id: &RecordId) -> Result<Option<Self>> {
        repo.get_logged_set(id).await
    }

    async fn store(&self, repo: &LibSqlRecordRepository<'_>) -> Result<()> {
        repo.put_logged_set(self).await
    }
}

/// Conflict id for a mirrored row
pub fn conflict_id(table: MirroredTable, id: &RecordId) -> String {
    format!("{table}:{id}")
}

fn to_object<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidInput(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

async fn merge_rows<T: Mirrored + Clone>(
    conn: &Connection,
    rows: &[T],
    now: i64,
    report: &mut MergeReport,
) -> Result<()> {
    let records = LibSqlRecordRepository::new(conn);
    let conflicts = LibSqlConflictRepository::new(conn);

    for server in rows {
        let id = server.record_id();
        match T::load(&records, id).await {
            Ok(Some(local)) if local.has_local_changes() => {
                let local_fields = to_object(&local)?;
                let server_fields = to_object(server)?;
                let diffs = shallow_diff(&local_fields, &server_fields);

                if diffs.is_empty() {
                    records.mark_synced(T::TABLE, id, now).await?;
                    report.settled += 1;
                } else {
                    tracing::debug!(
                        "Local edits to {}:{} diverge from server ({} fields)",
                        T::TABLE,
                        id,
                        diffs.len()
                    );
                    conflicts
                        .upsert(ConflictUpsert {
                            table: Some(T::TABLE.as_str().to_string()),
                            entity_id: Some(id.to_string()),
                            local: Some(local_fields),
                            server: Some(server_fields),
                            fields: Some(diff_fields(&diffs)),
                            ..ConflictUpsert::new(conflict_id(T::TABLE, id))
                        })
                        .await?;
                    report.conflicts += 1;
                }
            }
            Ok(_) | Err(Error::InvalidRecord { .. }) => {
                server.clone().into_synced(now).store(&records).await?;
                report.applied += 1;
            }
            Err(error) => return Err(error),
        }
    }

    Ok(())
}

/// Merge a pulled snapshot.
///
/// Rows without unsynced local edits take the server copy. Rows with local
/// edits are left untouched: a matching server copy just marks them synced,
/// a diverging one records a conflict.
pub async fn merge_snapshot(
    conn: &Connection,
    snapshot: &PullSnapshot,
    now: i64,
) -> Result<MergeReport> {
    let mut report = MergeReport {
        rejected: snapshot.rejected,
        ..MergeReport::default()
    };

    merge_rows(conn, &snapshot.sessions, now, &mut report).await?;
    merge_rows(conn, &snapshot.session_exercises, now, &mut report).await?;
    merge_rows(conn, &snapshot.logged_sets, now, &mut report).await?;

    Ok(report)
}

async fn take_server<T: Mirrored>(
    conn: &Connection,
    server: Map<String, Value>,
    now: i64,
) -> Result<()> {
    let record: T = serde_json::from_value(Value::Object(server))?;
    let records = LibSqlRecordRepository::new(conn);
    record.into_synced(now).store(&records).await
}

/// Settle a conflict and delete it.
///
/// `TakeServer` overwrites the local row with the recorded server copy.
/// `KeepLocal` restamps the local row so it stays pending upload.
pub async fn resolve_conflict(
    conn: &Connection,
    id: &str,
    resolution: Resolution,
    now: i64,
) -> Result<()> {
    let conflicts = LibSqlConflictRepository::new(conn);
    let conflict = conflicts
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("conflict {id}")))?;
    let table = conflict.table.parse::<MirroredTable>()?;

    match resolution {
        Resolution::TakeServer => match table {
            MirroredTable::Sessions => take_server::<Session>(conn, conflict.server, now).await?,
            MirroredTable::SessionExercises => {
                take_server::<SessionExercise>(conn, conflict.server, now).await?;
            }
            MirroredTable::LoggedSets => {
                take_server::<LoggedSet>(conn, conflict.server, now).await?;
            }
        },
        Resolution::KeepLocal => {
            let records = LibSqlRecordRepository::new(conn);
            records
                .touch(table, &RecordId::from(conflict.entity_id.as_str()), now)
                .await?;
        }
    }

    conflicts.delete(id).await?;
    tracing::info!("Resolved conflict {id} ({resolution:?})");
    Ok(())
}
