use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use gymbud_core::config::ClientConfig;
use gymbud_core::history::HistoryContext;
use gymbud_core::models::{ConflictRecord, HistoryListItem, SessionDetail};
use gymbud_core::network::NetworkStatus;
use gymbud_core::remote::RpcClient;
use gymbud_core::sync::HttpPullSync;
use gymbud_core::telemetry::TelemetryBuffer;
use gymbud_core::LocalStore;
use serde::Serialize;

use crate::error::CliError;

/// Everything a command needs, resolved once per invocation.
pub struct AppContext {
    pub store: LocalStore,
    pub config: ClientConfig,
    pub offline: bool,
    pub telemetry: Arc<TelemetryBuffer>,
}

impl AppContext {
    pub async fn open(
        cli_db_path: Option<PathBuf>,
        config_path: Option<&Path>,
        offline: bool,
    ) -> Result<Self, CliError> {
        let config = load_config(config_path)?;
        let db_path = resolve_db_path(cli_db_path);
        let store = LocalStore::open_path(db_path).await?;

        Ok(Self {
            store,
            telemetry: Arc::new(TelemetryBuffer::new(config.telemetry_capacity())),
            config,
            offline,
        })
    }

    /// Backend client, or why there is none.
    pub fn remote_client(&self) -> Result<RpcClient, CliError> {
        if self.offline {
            return Err(CliError::Offline);
        }
        if !self.config.has_remote() {
            return Err(CliError::RemoteNotConfigured);
        }
        Ok(RpcClient::from_config(&self.config)?)
    }

    pub fn pull_sync(&self) -> Result<HttpPullSync, CliError> {
        Ok(HttpPullSync::new(self.remote_client()?, self.store.clone()))
    }

    /// View context; background pulls are enabled only when a backend is
    /// configured and `--offline` is not set.
    pub fn history_context(&self) -> HistoryContext {
        let context = HistoryContext::new(
            self.store.clone(),
            NetworkStatus::fixed(!self.offline),
            self.telemetry.clone(),
        )
        .with_pull_timeout(self.config.pull_timeout());

        match self.pull_sync() {
            Ok(sync) => context.with_remote(Arc::new(sync)),
            Err(error) => {
                tracing::debug!("History views stay local: {error}");
                context
            }
        }
    }
}

pub fn load_config(config_path: Option<&Path>) -> Result<ClientConfig, CliError> {
    let base = match config_path {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    };
    Ok(base.with_env_overrides(|key| env::var(key).ok())?)
}

pub fn write_telemetry(app: &AppContext, path: &Path) -> Result<(), CliError> {
    std::fs::write(path, app.telemetry.export_json()?)?;
    tracing::debug!("Wrote {} telemetry events to {}", app.telemetry.len(), path.display());
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct ConflictItem {
    pub id: String,
    pub table: String,
    pub entity_id: String,
    pub fields: Vec<String>,
    pub first_seen_at: i64,
    pub updated_at: i64,
    pub updated_at_iso: String,
}

pub fn conflict_to_item(conflict: &ConflictRecord) -> ConflictItem {
    ConflictItem {
        id: conflict.id.clone(),
        table: conflict.table.clone(),
        entity_id: conflict.entity_id.clone(),
        fields: conflict.fields.clone(),
        first_seen_at: conflict.first_seen_at,
        updated_at: conflict.updated_at,
        updated_at_iso: format_sync_timestamp(conflict.updated_at),
    }
}

pub fn format_history_lines(items: &[HistoryListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let baseline = if item.is_baseline { "  baseline" } else { "" };
            format!(
                "{}  {:<9}  {:>2} ex  {:>3} sets  {:>9}  {}{baseline}",
                item.date,
                item.status,
                item.exercise_count,
                item.set_count,
                format_volume(item.volume_kg),
                item.session_id,
            )
        })
        .collect()
}

pub fn format_detail_lines(detail: &SessionDetail) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(session) = &detail.session {
        lines.push(format!(
            "{}  {}{}",
            session.date,
            session.status,
            if session.is_baseline { "  (baseline)" } else { "" }
        ));
    }

    for row in &detail.exercises {
        let exercise = &row.session_exercise;
        let name = exercise
            .exercise_name
            .clone()
            .unwrap_or_else(|| exercise.exercise_id.to_string());
        lines.push(format!(
            "  {name:<28}  {:>2} sets  {:>9}",
            row.sets.len(),
            format_volume(row.volume_kg)
        ));
        for set in &row.sets {
            lines.push(format!(
                "      #{:<2} {}",
                set.set_number,
                format_set(set.reps, set.weight_kg)
            ));
        }
    }

    lines.push(format!(
        "Total: {} sets, {}",
        detail.totals.sets,
        format_volume(detail.totals.volume_kg)
    ));
    lines
}

pub fn format_conflict_lines(conflicts: &[ConflictRecord]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {}  fields={}",
                format_sync_timestamp(conflict.updated_at),
                conflict.id,
                conflict.fields.join(",")
            )
        })
        .collect()
}

pub fn format_volume(volume_kg: f64) -> String {
    format!("{volume_kg:.1} kg")
}

pub fn format_set(reps: Option<u32>, weight_kg: Option<f64>) -> String {
    match (reps, weight_kg) {
        (Some(reps), Some(weight)) => format!("{reps} × {weight} kg"),
        (Some(reps), None) => format!("{reps} reps"),
        (None, Some(weight)) => format!("{weight} kg"),
        (None, None) => "-".to_string(),
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_last_pull(last_pulled_at: Option<i64>) -> String {
    last_pulled_at.map_or_else(
        || "never".to_string(),
        |at| format_relative_time(at, Utc::now().timestamp_millis()),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySearchQuery)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_session_id(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptySessionId)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("GYMBUD_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(env::temp_dir)
        .join("gymbud")
        .join("gymbud.db")
}
