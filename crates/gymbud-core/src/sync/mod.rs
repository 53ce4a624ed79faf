//! Pull-based synchronization with the backend.

mod merge;
mod pull;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::MirroredTable;
use crate::models::{LoggedSet, Session, SessionExercise};
use crate::Result;

pub use merge::{conflict_id, merge_snapshot, resolve_conflict};
pub use pull::HttpPullSync;

/// Rows changed on the server since the last cursor.
///
/// Rows are decoded one at a time; a row that does not fit its table is
/// logged, counted in `rejected` and left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireSnapshot")]
pub struct PullSnapshot {
    pub sessions: Vec<Session>,
    pub session_exercises: Vec<SessionExercise>,
    pub logged_sets: Vec<LoggedSet>,
    /// Opaque cursor to send with the next pull
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    #[serde(skip)]
    pub rejected: usize,
}

#[derive(Deserialize)]
struct WireSnapshot {
    #[serde(default)]
    sessions: Vec<Value>,
    #[serde(default)]
    session_exercises: Vec<Value>,
    #[serde(default)]
    logged_sets: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

impl From<WireSnapshot> for PullSnapshot {
    fn from(wire: WireSnapshot) -> Self {
        let mut rejected = 0;
        let sessions = decode_rows(MirroredTable::Sessions, wire.sessions, &mut rejected);
        let session_exercises = decode_rows(
            MirroredTable::SessionExercises,
            wire.session_exercises,
            &mut rejected,
        );
        let logged_sets = decode_rows(MirroredTable::LoggedSets, wire.logged_sets, &mut rejected);

        Self {
            sessions,
            session_exercises,
            logged_sets,
            cursor: wire.cursor,
            rejected,
        }
    }
}

fn decode_rows<T: DeserializeOwned>(
    table: MirroredTable,
    rows: Vec<Value>,
    rejected: &mut usize,
) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or("<no id>")
                .to_string();
            match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(error) => {
                    tracing::warn!("Skipping unreadable {table} row {id} from server: {error}");
                    *rejected += 1;
                    None
                }
            }
        })
        .collect()
}

impl PullSnapshot {
    pub fn row_count(&self) -> usize {
        self.sessions.len() + self.session_exercises.len() + self.logged_sets.len()
    }
}

/// Outcome of merging one snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Rows written from the server copy
    pub applied: usize,
    /// Locally edited rows found identical to the server copy
    pub settled: usize,
    /// Locally edited rows that diverge from the server copy
    pub conflicts: usize,
    /// Server rows that could not be decoded
    pub rejected: usize,
}

/// Source of remote changes.
///
/// Implementations fetch and merge into the local store. Callers treat a
/// failed pull as best-effort and never surface it to the user.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    async fn pull_updates(&self) -> Result<MergeReport>;
}
