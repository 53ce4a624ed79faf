//! Training session records mirrored from the backend

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

use super::RecordId;

/// Sync bookkeeping shared by mirrored rows.
pub trait Tracked {
    /// Last local modification (unix ms)
    fn updated_at(&self) -> i64;

    /// Last time the row matched the server copy (unix ms)
    fn synced_at(&self) -> Option<i64>;

    /// Whether the row carries edits the server has not seen yet
    fn has_local_changes(&self) -> bool {
        self.synced_at()
            .is_none_or(|synced_at| self.updated_at() > synced_at)
    }
}

/// Lifecycle of a training session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Active,
    Completed,
}

impl SessionStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(Error::InvalidInput(format!(
                "unknown session status '{other}'"
            ))),
        }
    }
}

/// A training session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: RecordId,
    /// Calendar day the session belongs to
    #[serde(alias = "session_date")]
    pub date: NaiveDate,
    pub status: SessionStatus,
    #[serde(default)]
    pub is_baseline: bool,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<i64>,
}

/// An exercise slot inside a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExercise {
    pub id: RecordId,
    pub session_id: RecordId,
    #[serde(default)]
    pub order_index: u32,
    pub exercise_id: RecordId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_name: Option<String>,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<i64>,
}

/// A single logged set. `voided` marks a soft delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedSet {
    pub id: RecordId,
    pub session_exercise_id: RecordId,
    pub set_number: u32,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default, alias = "weight")]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub rpe: Option<f64>,
    #[serde(default)]
    pub voided: bool,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<i64>,
}

impl LoggedSet {
    /// `weight_kg × reps`, with missing values counted as zero
    pub fn volume_kg(&self) -> f64 {
        self.weight_kg.unwrap_or(0.0) * f64::from(self.reps.unwrap_or(0))
    }
}

macro_rules! impl_tracked {
    ($($ty:ty),+) => {
        $(
            impl Tracked for $ty {
                fn updated_at(&self) -> i64 {
                    self.updated_at
                }

                fn synced_at(&self) -> Option<i64> {
                    self.synced_at
                }
            }
        )+
    };
}

impl_tracked!(Session, SessionExercise, LoggedSet);
