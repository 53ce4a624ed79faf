//! Read-side projections of the local store for the history screens

use std::collections::HashMap;

use crate::models::{
    DetailTotals, HistoryExerciseRow, HistoryListItem, LoggedSet, RecordId, Session,
    SessionDetail, SessionExercise,
};
use crate::services::LocalStore;
use crate::util::round1;
use crate::Result;

/// Assemble a session detail from rows already read from the store.
///
/// `exercises` are expected in store order (`order_index`, then id). Voided
/// sets and sets of other exercises are ignored. Rows are ordered by volume,
/// heaviest first; equal volumes keep store order.
pub fn build_session_detail(
    session: Option<Session>,
    exercises: Vec<SessionExercise>,
    sets: Vec<LoggedSet>,
) -> SessionDetail {
    let mut sets_by_exercise = group_active_sets(sets);

    let mut rows: Vec<HistoryExerciseRow> = exercises
        .into_iter()
        .map(|session_exercise| {
            let mut sets = sets_by_exercise
                .remove(&session_exercise.id)
                .unwrap_or_default();
            sets.sort_by(|a, b| a.set_number.cmp(&b.set_number).then_with(|| a.id.cmp(&b.id)));
            let volume_kg = round1(sets.iter().map(LoggedSet::volume_kg).sum());
            HistoryExerciseRow {
                session_exercise,
                sets,
                volume_kg,
            }
        })
        .collect();

    rows.sort_by(|a, b| b.volume_kg.total_cmp(&a.volume_kg));

    let totals = DetailTotals {
        sets: rows.iter().map(|row| row.sets.len()).sum(),
        volume_kg: round1(rows.iter().map(|row| row.volume_kg).sum()),
    };

    SessionDetail {
        session,
        exercises: rows,
        totals,
    }
}

/// Read and assemble the detail of one session.
///
/// An unknown id yields `session: None` and no exercises rather than an error.
pub async fn load_session_detail(
    store: &LocalStore,
    session_id: &RecordId,
) -> Result<SessionDetail> {
    let session = store.get_session(session_id).await?;
    let exercises = store.session_exercises(session_id).await?;
    let ids: Vec<RecordId> = exercises.iter().map(|exercise| exercise.id.clone()).collect();
    let sets = store.active_sets(&ids).await?;

    tracing::debug!(
        "Loaded session {session_id}: {} exercises, {} sets",
        exercises.len(),
        sets.len()
    );
    Ok(build_session_detail(session, exercises, sets))
}

/// Summaries of every stored session, newest date first.
pub fn build_history_list(
    sessions: Vec<Session>,
    exercises: Vec<SessionExercise>,
    sets: Vec<LoggedSet>,
) -> Vec<HistoryListItem> {
    let sets_by_exercise = group_active_sets(sets);

    let mut per_session: HashMap<RecordId, (usize, usize, f64)> = HashMap::new();
    for exercise in &exercises {
        let sets = sets_by_exercise.get(&exercise.id).map_or(&[][..], Vec::as_slice);
        let entry = per_session.entry(exercise.session_id.clone()).or_default();
        entry.0 += 1;
        entry.1 += sets.len();
        entry.2 += round1(sets.iter().map(LoggedSet::volume_kg).sum());
    }

    let mut items: Vec<HistoryListItem> = sessions
        .into_iter()
        .map(|session| {
            let (exercise_count, set_count, volume) =
                per_session.get(&session.id).copied().unwrap_or_default();
            HistoryListItem {
                session_id: session.id,
                date: session.date,
                status: session.status,
                is_baseline: session.is_baseline,
                exercise_count,
                set_count,
                volume_kg: round1(volume),
            }
        })
        .collect();

    items.sort_by(|a, b| {
        b.date
            .cmp(&a.date)
            .then_with(|| a.session_id.cmp(&b.session_id))
    });
    items
}

pub async fn load_history_list(store: &LocalStore) -> Result<Vec<HistoryListItem>> {
    let sessions = store.list_sessions().await?;
    let exercises = store.all_session_exercises().await?;
    let ids: Vec<RecordId> = exercises.iter().map(|exercise| exercise.id.clone()).collect();
    let sets = store.active_sets(&ids).await?;
    Ok(build_history_list(sessions, exercises, sets))
}

fn group_active_sets(sets: Vec<LoggedSet>) -> HashMap<RecordId, Vec<LoggedSet>> {
    let mut grouped: HashMap<RecordId, Vec<LoggedSet>> = HashMap::new();
    for set in sets.into_iter().filter(|set| !set.voided) {
        grouped
            .entry(set.session_exercise_id.clone())
            .or_default()
            .push(set);
    }
    grouped
}
