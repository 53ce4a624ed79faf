use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] gymbud_core::Error),
    #[error(transparent)]
    Remote(#[from] gymbud_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Session ID cannot be empty")]
    EmptySessionId,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("History unavailable: {0}")]
    HistoryUnavailable(String),
    #[error("Conflict not found: {0}")]
    ConflictNotFound(String),
    #[error("Cannot reach the backend while --offline is set")]
    Offline,
    #[error(
        "Backend is not configured. Set GYMBUD_API_URL and GYMBUD_ANON_KEY, or pass --config with api_base_url and anon_key."
    )]
    RemoteNotConfigured,
}
