use gymbud_core::history::{HistoryDetailView, HistoryFilter, HistoryListView, ViewState};
use gymbud_core::models::{HistoryListItem, SessionDetail};
use gymbud_core::RecordId;

use crate::commands::common::{
    format_detail_lines, format_history_lines, normalize_session_id, AppContext,
};
use crate::error::CliError;

#[derive(Debug, Default)]
pub struct HistoryListArgs {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub query: Option<String>,
}

impl HistoryListArgs {
    pub fn to_filter(&self) -> Result<HistoryFilter, CliError> {
        Ok(HistoryFilter::parse(
            self.status.as_deref(),
            self.from.as_deref(),
            self.to.as_deref(),
            self.query.as_deref(),
        )?)
    }
}

pub async fn run_history_list(
    app: &AppContext,
    args: &HistoryListArgs,
    as_json: bool,
) -> Result<(), CliError> {
    let filter = args.to_filter()?;
    let mut view = HistoryListView::mount(app.history_context(), filter).await;

    let local = view.state();
    if !as_json {
        print_list_state(&local);
    }

    view.settle().await;
    let items = settled_value(view.state())?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if local.ready() != Some(&items) {
        print_update_header(&local);
        print_list_state(&ViewState::Ready(items));
    }
    Ok(())
}

pub async fn run_history_show(
    app: &AppContext,
    session_id: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let session_id: RecordId = normalize_session_id(session_id)?.as_str().into();
    let mut view = HistoryDetailView::new(app.history_context());
    view.show(session_id.clone()).await;

    let local = view.state();
    if !as_json {
        print_detail_state(&local, &session_id);
    }

    view.settle().await;
    let detail = settled_value(view.state())?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&detail)?);
    } else if local.ready() != Some(&detail) {
        print_update_header(&local);
        print_detail_state(&ViewState::Ready(detail), &session_id);
    }
    Ok(())
}

/// The settled value, or why the local store could not provide one.
pub fn settled_value<T>(state: ViewState<T>) -> Result<T, CliError> {
    match state {
        ViewState::Ready(value) => Ok(value),
        ViewState::Unavailable(message) => Err(CliError::HistoryUnavailable(message)),
        ViewState::Idle | ViewState::Loading => Err(CliError::HistoryUnavailable(
            "view did not finish loading".to_string(),
        )),
    }
}

fn print_update_header<T>(local: &ViewState<T>) {
    if local.ready().is_some() {
        println!();
        println!("Updated after sync:");
    }
}

fn print_list_state(state: &ViewState<Vec<HistoryListItem>>) {
    match state {
        ViewState::Ready(items) if items.is_empty() => println!("No sessions found."),
        ViewState::Ready(items) => {
            for line in format_history_lines(items) {
                println!("{line}");
            }
        }
        ViewState::Unavailable(_) | ViewState::Idle | ViewState::Loading => {}
    }
}

fn print_detail_state(state: &ViewState<SessionDetail>, session_id: &RecordId) {
    match state {
        ViewState::Ready(detail) if detail.session.is_none() => {
            println!("Session {session_id} not found locally.");
        }
        ViewState::Ready(detail) => {
            for line in format_detail_lines(detail) {
                println!("{line}");
            }
        }
        ViewState::Unavailable(_) | ViewState::Idle | ViewState::Loading => {}
    }
}
