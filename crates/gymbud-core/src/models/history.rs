//! Denormalized views derived from the local store

use chrono::NaiveDate;
use serde::Serialize;

use super::{LoggedSet, RecordId, Session, SessionExercise, SessionStatus};

/// One exercise of a session with its non-voided sets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryExerciseRow {
    pub session_exercise: SessionExercise,
    pub sets: Vec<LoggedSet>,
    /// Σ weight × reps, rounded to one decimal
    pub volume_kg: f64,
}

impl HistoryExerciseRow {
    pub const fn id(&self) -> &RecordId {
        &self.session_exercise.id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DetailTotals {
    pub sets: usize,
    pub volume_kg: f64,
}

/// Session detail view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionDetail {
    pub session: Option<Session>,
    pub exercises: Vec<HistoryExerciseRow>,
    pub totals: DetailTotals,
}

/// Summary row for the history list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryListItem {
    pub session_id: RecordId,
    pub date: NaiveDate,
    pub status: SessionStatus,
    pub is_baseline: bool,
    pub exercise_count: usize,
    pub set_count: usize,
    pub volume_kg: f64,
}
