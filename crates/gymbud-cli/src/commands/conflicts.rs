use gymbud_core::models::Resolution;
use gymbud_core::util::now_ms;
use gymbud_core::Error;

use crate::cli::KeepSide;
use crate::commands::common::{
    conflict_to_item, format_conflict_lines, AppContext, ConflictItem,
};
use crate::error::CliError;

pub async fn run_conflicts_list(
    app: &AppContext,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let conflicts = app.store.list_conflicts(limit).await?;

    if as_json {
        let json_items = conflicts
            .iter()
            .map(conflict_to_item)
            .collect::<Vec<ConflictItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if conflicts.is_empty() {
        println!("No sync conflicts recorded.");
        return Ok(());
    }

    for line in format_conflict_lines(&conflicts) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_conflicts_clear(app: &AppContext) -> Result<(), CliError> {
    let removed = app.store.clear_conflicts().await?;
    println!("Cleared {removed} conflicts");
    Ok(())
}

pub async fn run_conflicts_resolve(
    app: &AppContext,
    id: &str,
    keep: KeepSide,
) -> Result<(), CliError> {
    let id = id.trim();
    let resolution = Resolution::from(keep);

    match app.store.resolve_conflict(id, resolution, now_ms()).await {
        Ok(()) => {
            println!("Resolved {id} ({})", describe_resolution(resolution));
            Ok(())
        }
        Err(Error::NotFound(_)) => Err(CliError::ConflictNotFound(id.to_string())),
        Err(error) => Err(error.into()),
    }
}

pub const fn describe_resolution(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::KeepLocal => "kept local copy, pending upload",
        Resolution::TakeServer => "took server copy",
    }
}
