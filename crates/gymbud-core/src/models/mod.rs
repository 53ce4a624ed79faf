//! Data models for GymBud

mod conflict;
mod history;
mod id;
mod session;

pub use conflict::{ConflictRecord, ConflictUpsert, Resolution};
pub use history::{DetailTotals, HistoryExerciseRow, HistoryListItem, SessionDetail};
pub use id::RecordId;
pub use session::{LoggedSet, Session, SessionExercise, SessionStatus, Tracked};
