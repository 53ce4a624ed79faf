//! Sync conflict model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Divergence between the local and server copy of one mirrored row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Conflict identifier, `<table>:<entity id>` for pull-detected conflicts
    pub id: String,
    /// Table the entity lives in
    pub table: String,
    /// Entity involved in the conflict
    pub entity_id: String,
    /// Local field values at detection time
    pub local: Map<String, Value>,
    /// Server field values at detection time
    pub server: Map<String, Value>,
    /// Fields whose values differ
    pub fields: Vec<String>,
    /// First detection (unix ms), never changes
    pub first_seen_at: i64,
    /// Last detection (unix ms)
    pub updated_at: i64,
}

/// Upsert input: everything except the timestamps, which the repository owns.
///
/// `None` fields keep the stored value on update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictUpsert {
    pub id: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub local: Option<Map<String, Value>>,
    #[serde(default)]
    pub server: Option<Map<String, Value>>,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
}

impl ConflictUpsert {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Build the record stored on first detection
    pub fn into_new_record(self, now: i64) -> ConflictRecord {
        ConflictRecord {
            id: self.id,
            table: self.table.unwrap_or_default(),
            entity_id: self.entity_id.unwrap_or_default(),
            local: self.local.unwrap_or_default(),
            server: self.server.unwrap_or_default(),
            fields: self.fields.unwrap_or_default(),
            first_seen_at: now,
            updated_at: now,
        }
    }

    /// Merge over an existing record, keeping `first_seen_at`
    pub fn merge_into(self, existing: ConflictRecord, now: i64) -> ConflictRecord {
        ConflictRecord {
            id: existing.id,
            table: self.table.unwrap_or(existing.table),
            entity_id: self.entity_id.unwrap_or(existing.entity_id),
            local: self.local.unwrap_or(existing.local),
            server: self.server.unwrap_or(existing.server),
            fields: self.fields.unwrap_or(existing.fields),
            first_seen_at: existing.first_seen_at,
            updated_at: now.max(existing.updated_at),
        }
    }
}

/// Which side a resolved conflict keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepLocal,
    TakeServer,
}
