//! gymbud-core - Core library for GymBud
//!
//! Local-first training history: the libSQL record store, conflict
//! tracking, pull-based sync with the backend, and the history views built
//! on top of them.

pub mod config;
pub mod db;
pub mod diff;
pub mod error;
pub mod history;
pub mod models;
pub mod network;
pub mod remote;
pub mod services;
pub mod sync;
pub mod tasks;
pub mod telemetry;
pub mod util;

pub use error::{Error, Result};
pub use models::{RecordId, Session, SessionStatus};
pub use services::LocalStore;
