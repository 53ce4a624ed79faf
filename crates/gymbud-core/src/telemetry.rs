//! View telemetry.
//!
//! Events go to an injected [`TelemetrySink`]. The provided
//! [`TelemetryBuffer`] keeps the most recent events in a bounded ring until
//! the host flushes or exports them.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DEFAULT_TELEMETRY_CAPACITY;
use crate::models::RecordId;
use crate::util::now_ms;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    HistoryListViewed,
    HistoryDetailViewed { session_id: RecordId },
}

/// A recorded event with its id and timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub id: Uuid,
    /// Unix ms
    pub at: i64,
    #[serde(flatten)]
    pub event: TelemetryEvent,
}

/// Fire-and-forget event sink.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: TelemetryEvent);
}

/// Bounded in-memory ring of telemetry records. Oldest records are dropped
/// first once full.
#[derive(Debug)]
pub struct TelemetryBuffer {
    capacity: usize,
    records: Mutex<VecDeque<TelemetryRecord>>,
}

impl Default for TelemetryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TELEMETRY_CAPACITY)
    }
}

impl TelemetryBuffer {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the buffered records, oldest first.
    pub fn snapshot(&self) -> Vec<TelemetryRecord> {
        self.lock().iter().cloned().collect()
    }

    /// Drain every buffered record, oldest first.
    pub fn flush(&self) -> Vec<TelemetryRecord> {
        self.lock().drain(..).collect()
    }

    /// Serialize buffered records without draining them.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<TelemetryRecord>> {
        // Records are plain data; a poisoned lock still holds a usable ring.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TelemetrySink for TelemetryBuffer {
    fn record(&self, event: TelemetryEvent) {
        tracing::debug!("telemetry: {event:?}");
        let mut records = self.lock();
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(TelemetryRecord {
            id: Uuid::now_v7(),
            at: now_ms(),
            event,
        });
    }
}
