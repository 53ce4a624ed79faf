use std::path::Path;

use gymbud_core::sync::{MergeReport, PullSnapshot, RemoteSync};
use gymbud_core::util::now_ms;

use crate::commands::common::{format_last_pull, AppContext};
use crate::error::CliError;

pub async fn run_sync_pull(app: &AppContext) -> Result<(), CliError> {
    let sync = app.pull_sync()?;
    let previous = app.store.last_pulled_at().await?;

    let report = sync.pull_updates().await?;
    println!("Sync completed (previous pull: {})", format_last_pull(previous));
    println!("{}", format_merge_report(&report));
    Ok(())
}

pub async fn run_sync_import(app: &AppContext, file: &Path) -> Result<(), CliError> {
    let raw = std::fs::read_to_string(file)?;
    let snapshot: PullSnapshot = serde_json::from_str(&raw)?;

    let report = app.store.apply_snapshot(&snapshot, now_ms()).await?;
    println!(
        "Imported {} rows from {}",
        snapshot.row_count(),
        file.display()
    );
    println!("{}", format_merge_report(&report));
    Ok(())
}

pub fn format_merge_report(report: &MergeReport) -> String {
    let mut summary = format!(
        "{} applied, {} settled, {} conflicts",
        report.applied, report.settled, report.conflicts
    );
    if report.rejected > 0 {
        summary.push_str(&format!(", {} rejected", report.rejected));
    }
    if report.conflicts > 0 {
        summary.push_str(" (see `gymbud conflicts list`)");
    }
    summary
}
