//! Repository for the mirrored training tables

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use libsql::{params, Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{LoggedSet, RecordId, Session, SessionExercise, SessionStatus};

use super::row::{self, nullable, ColumnResult};

/// Tables mirrored from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirroredTable {
    Sessions,
    SessionExercises,
    LoggedSets,
}

impl MirroredTable {
    pub const ALL: [Self; 3] = [Self::Sessions, Self::SessionExercises, Self::LoggedSets];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sessions => "sessions",
            Self::SessionExercises => "session_exercises",
            Self::LoggedSets => "logged_sets",
        }
    }
}

impl fmt::Display for MirroredTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MirroredTable {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|table| table.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown table '{s}'")))
    }
}

/// Trait for mirrored record storage operations (async)
#[allow(async_fn_in_trait)]
pub trait RecordRepository {
    /// Get a session by ID
    async fn get_session(&self, id: &RecordId) -> Result<Option<Session>>;

    /// List all sessions, newest date first
    async fn list_sessions(&self) -> Result<Vec<Session>>;

    /// Insert or replace a session
    async fn put_session(&self, session: &Session) -> Result<()>;

    /// Get a session exercise by ID
    async fn get_session_exercise(&self, id: &RecordId) -> Result<Option<SessionExercise>>;

    /// List exercises of a session by `order_index`
    async fn list_session_exercises(&self, session_id: &RecordId) -> Result<Vec<SessionExercise>>;

    /// List every session exercise
    async fn list_all_session_exercises(&self) -> Result<Vec<SessionExercise>>;

    /// Insert or replace a session exercise
    async fn put_session_exercise(&self, exercise: &SessionExercise) -> Result<()>;

    /// Get a logged set by ID
    async fn get_logged_set(&self, id: &RecordId) -> Result<Option<LoggedSet>>;

    /// List sets owned by the given session exercises
    async fn list_logged_sets(
        &self,
        session_exercise_ids: &[RecordId],
        include_voided: bool,
    ) -> Result<Vec<LoggedSet>>;

    /// Insert or replace a logged set
    async fn put_logged_set(&self, set: &LoggedSet) -> Result<()>;

    /// Stamp a row as matching the server copy
    async fn mark_synced(&self, table: MirroredTable, id: &RecordId, at: i64) -> Result<()>;

    /// Stamp a row as locally modified
    async fn touch(&self, table: MirroredTable, id: &RecordId, at: i64) -> Result<()>;
}

/// libSQL implementation of `RecordRepository`
pub struct LibSqlRecordRepository<'a> {
    conn: &'a Connection,
}

const SESSION_COLUMNS: &str = "id, date, status, is_baseline, updated_at, synced_at";
const EXERCISE_COLUMNS: &str =
    "id, session_id, order_index, exercise_id, exercise_name, updated_at, synced_at";
const SET_COLUMNS: &str =
    "id, session_exercise_id, set_number, reps, weight_kg, rpe, voided, updated_at, synced_at";

impl<'a> LibSqlRecordRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn invalid(table: MirroredTable, id: &str, reason: String) -> Error {
        Error::InvalidRecord {
            table: table.as_str(),
            id: id.to_string(),
            reason,
        }
    }

    /// Parse a session from a database row
    fn parse_session(row: &Row) -> Result<Session> {
        let id = row::text(row, 0).map_err(Error::Database)?;
        let parse = || -> ColumnResult<Session> {
            let date = row::text(row, 1)?;
            Ok(Session {
                id: RecordId::from(id.as_str()),
                date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|error| format!("date '{date}': {error}"))?,
                status: row::text(row, 2)?
                    .parse::<SessionStatus>()
                    .map_err(|error| error.to_string())?,
                is_baseline: row::flag(row, 3)?,
                updated_at: row::integer(row, 4)?,
                synced_at: row::opt_integer(row, 5)?,
            })
        };
        parse().map_err(|reason| Self::invalid(MirroredTable::Sessions, &id, reason))
    }

    /// Parse a session exercise from a database row
    fn parse_session_exercise(row: &Row) -> Result<SessionExercise> {
        let id = row::text(row, 0).map_err(Error::Database)?;
        let parse = || -> ColumnResult<SessionExercise> {
            Ok(SessionExercise {
                id: RecordId::from(id.as_str()),
                session_id: RecordId::from(row::text(row, 1)?.as_str()),
                order_index: row::unsigned(row, 2)?,
                exercise_id: RecordId::from(row::text(row, 3)?.as_str()),
                exercise_name: row::opt_text(row, 4)?,
                updated_at: row::integer(row, 5)?,
                synced_at: row::opt_integer(row, 6)?,
            })
        };
        parse().map_err(|reason| Self::invalid(MirroredTable::SessionExercises, &id, reason))
    }

    /// Parse a logged set from a database row
    fn parse_logged_set(row: &Row) -> Result<LoggedSet> {
        let id = row::text(row, 0).map_err(Error::Database)?;
        let parse = || -> ColumnResult<LoggedSet> {
            Ok(LoggedSet {
                id: RecordId::from(id.as_str()),
                session_exercise_id: RecordId::from(row::text(row, 1)?.as_str()),
                set_number: row::unsigned(row, 2)?,
                reps: row::opt_unsigned(row, 3)?,
                weight_kg: row::opt_real(row, 4)?,
                rpe: row::opt_real(row, 5)?,
                voided: row::flag(row, 6)?,
                updated_at: row::integer(row, 7)?,
                synced_at: row::opt_integer(row, 8)?,
            })
        };
        parse().map_err(|reason| Self::invalid(MirroredTable::LoggedSets, &id, reason))
    }

    /// Collect rows, logging and skipping the ones that fail to map
    async fn collect<T>(
        mut rows: libsql::Rows,
        parse: impl Fn(&Row) -> Result<T>,
    ) -> Result<Vec<T>> {
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            match parse(&row) {
                Ok(record) => records.push(record),
                Err(error @ Error::InvalidRecord { .. }) => {
                    tracing::warn!("Skipping unreadable row: {error}");
                }
                Err(error) => return Err(error),
            }
        }
        Ok(records)
    }

    async fn first<T>(
        mut rows: libsql::Rows,
        parse: impl Fn(&Row) -> Result<T>,
    ) -> Result<Option<T>> {
        match rows.next().await? {
            Some(row) => parse(&row).map(Some),
            None => Ok(None),
        }
    }
}

impl RecordRepository for LibSqlRecordRepository<'_> {
    async fn get_session(&self, id: &RecordId) -> Result<Option<Session>> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"),
                [id.as_str()],
            )
            .await?;
        Self::first(rows, Self::parse_session).await
    }

    async fn list_sessions(&self) -> Result<Vec<Session>> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY date DESC, id ASC"),
                (),
            )
            .await?;
        Self::collect(rows, Self::parse_session).await
    }

    async fn put_session(&self, session: &Session) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO sessions (id, date, status, is_baseline, updated_at, synced_at)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    date = excluded.date,
                    status = excluded.status,
                    is_baseline = excluded.is_baseline,
                    updated_at = excluded.updated_at,
                    synced_at = excluded.synced_at",
                params![
                    session.id.as_str(),
                    session.date.format("%Y-%m-%d").to_string(),
                    session.status.as_str(),
                    i64::from(session.is_baseline),
                    session.updated_at,
                    nullable(session.synced_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_session_exercise(&self, id: &RecordId) -> Result<Option<SessionExercise>> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {EXERCISE_COLUMNS} FROM session_exercises WHERE id = ?"),
                [id.as_str()],
            )
            .await?;
        Self::first(rows, Self::parse_session_exercise).await
    }

    async fn list_session_exercises(&self, session_id: &RecordId) -> Result<Vec<SessionExercise>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXERCISE_COLUMNS} FROM session_exercises
                     WHERE session_id = ?
                     ORDER BY order_index ASC, id ASC"
                ),
                [session_id.as_str()],
            )
            .await?;
        Self::collect(rows, Self::parse_session_exercise).await
    }

    async fn list_all_session_exercises(&self) -> Result<Vec<SessionExercise>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {EXERCISE_COLUMNS} FROM session_exercises
                     ORDER BY session_id ASC, order_index ASC, id ASC"
                ),
                (),
            )
            .await?;
        Self::collect(rows, Self::parse_session_exercise).await
    }

    async fn put_session_exercise(&self, exercise: &SessionExercise) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO session_exercises
                    (id, session_id, order_index, exercise_id, exercise_name, updated_at, synced_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    session_id = excluded.session_id,
                    order_index = excluded.order_index,
                    exercise_id = excluded.exercise_id,
                    exercise_name = excluded.exercise_name,
                    updated_at = excluded.updated_at,
                    synced_at = excluded.synced_at",
                params![
                    exercise.id.as_str(),
                    exercise.session_id.as_str(),
                    i64::from(exercise.order_index),
                    exercise.exercise_id.as_str(),
                    nullable(exercise.exercise_name.clone()),
                    exercise.updated_at,
                    nullable(exercise.synced_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_logged_set(&self, id: &RecordId) -> Result<Option<LoggedSet>> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {SET_COLUMNS} FROM logged_sets WHERE id = ?"),
                [id.as_str()],
            )
            .await?;
        Self::first(rows, Self::parse_logged_set).await
    }

    async fn list_logged_sets(
        &self,
        session_exercise_ids: &[RecordId],
        include_voided: bool,
    ) -> Result<Vec<LoggedSet>> {
        if session_exercise_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; session_exercise_ids.len()].join(", ");
        let voided_clause = if include_voided { "" } else { " AND voided = 0" };
        let sql = format!(
            "SELECT {SET_COLUMNS} FROM logged_sets
             WHERE session_exercise_id IN ({placeholders}){voided_clause}
             ORDER BY session_exercise_id ASC, set_number ASC, id ASC"
        );
        let params = session_exercise_ids
            .iter()
            .map(|id| Value::from(id.as_str()))
            .collect::<Vec<_>>();

        let rows = self.conn.query(&sql, params).await?;
        Self::collect(rows, Self::parse_logged_set).await
    }

    async fn put_logged_set(&self, set: &LoggedSet) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO logged_sets
                    (id, session_exercise_id, set_number, reps, weight_kg, rpe, voided, updated_at, synced_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                    session_exercise_id = excluded.session_exercise_id,
                    set_number = excluded.set_number,
                    reps = excluded.reps,
                    weight_kg = excluded.weight_kg,
                    rpe = excluded.rpe,
                    voided = excluded.voided,
                    updated_at = excluded.updated_at,
                    synced_at = excluded.synced_at",
                params![
                    set.id.as_str(),
                    set.session_exercise_id.as_str(),
                    i64::from(set.set_number),
                    nullable(set.reps.map(i64::from)),
                    nullable(set.weight_kg),
                    nullable(set.rpe),
                    i64::from(set.voided),
                    set.updated_at,
                    nullable(set.synced_at)
                ],
            )
            .await?;
        Ok(())
    }

    async fn mark_synced(&self, table: MirroredTable, id: &RecordId, at: i64) -> Result<()> {
        self.conn
            .execute(
                &format!("UPDATE {table} SET synced_at = MAX(?, updated_at) WHERE id = ?"),
                params![at, id.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn touch(&self, table: MirroredTable, id: &RecordId, at: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                &format!(
                    "UPDATE {table} SET updated_at = MAX(?, COALESCE(synced_at, 0) + 1) WHERE id = ?"
                ),
                params![at, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("{table}:{id}")));
        }
        Ok(())
    }
}
