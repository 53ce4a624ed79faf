//! Local record store for GymBud

mod conflict_repository;
mod connection;
mod migrations;
mod record_repository;
mod row;
mod sync_state_repository;

pub use conflict_repository::{ConflictRepository, LibSqlConflictRepository};
pub use connection::Database;
pub use record_repository::{LibSqlRecordRepository, MirroredTable, RecordRepository};
pub use sync_state_repository::{LibSqlSyncStateRepository, SyncStateRepository};
