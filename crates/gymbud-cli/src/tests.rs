use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use gymbud_core::models::{
    ConflictRecord, DetailTotals, HistoryExerciseRow, HistoryListItem, LoggedSet, Resolution,
    Session, SessionDetail, SessionExercise, SessionStatus,
};
use gymbud_core::history::ViewState;
use gymbud_core::sync::MergeReport;
use gymbud_core::RecordId;
use serde_json::Map;

use crate::cli::{Cli, Commands, ConflictCommands, KeepSide};
use crate::commands::common::{
    format_conflict_lines, format_detail_lines, format_history_lines, format_relative_time,
    format_set, format_sync_timestamp, format_volume, normalize_search_query,
    normalize_session_id, resolve_db_path, AppContext,
};
use crate::commands::conflicts::{describe_resolution, run_conflicts_resolve};
use crate::commands::history::{
    run_history_list, run_history_show, settled_value, HistoryListArgs,
};
use crate::commands::sync::{format_merge_report, run_sync_import};
use crate::error::CliError;

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn format_volume_and_sets() {
    assert_eq!(format_volume(940.0), "940.0 kg");
    assert_eq!(format_set(Some(10), Some(50.0)), "10 × 50 kg");
    assert_eq!(format_set(Some(12), None), "12 reps");
    assert_eq!(format_set(None, None), "-");
}

#[test]
fn format_history_lines_include_key_fields() {
    let items = vec![HistoryListItem {
        session_id: RecordId::from("s-1"),
        date: "2024-01-03".parse().unwrap(),
        status: SessionStatus::Completed,
        is_baseline: true,
        exercise_count: 2,
        set_count: 5,
        volume_kg: 940.0,
    }];

    let rendered = format_history_lines(&items);
    assert_eq!(rendered.len(), 1);
    assert!(rendered[0].starts_with("2024-01-03  completed"));
    assert!(rendered[0].contains("940.0 kg"));
    assert!(rendered[0].contains("s-1"));
    assert!(rendered[0].ends_with("baseline"));
}

#[test]
fn format_detail_lines_end_with_totals() {
    let exercise = SessionExercise {
        id: RecordId::from("E1"),
        session_id: RecordId::from("S1"),
        order_index: 0,
        exercise_id: RecordId::from("bench"),
        exercise_name: Some("Bench press".to_string()),
        updated_at: 1,
        synced_at: Some(1),
    };
    let set = LoggedSet {
        id: RecordId::from("a"),
        session_exercise_id: RecordId::from("E1"),
        set_number: 1,
        reps: Some(10),
        weight_kg: Some(50.0),
        rpe: None,
        voided: false,
        updated_at: 1,
        synced_at: Some(1),
    };
    let detail = SessionDetail {
        session: Some(Session {
            id: RecordId::from("S1"),
            date: "2024-01-03".parse().unwrap(),
            status: SessionStatus::Completed,
            is_baseline: false,
            updated_at: 1,
            synced_at: Some(1),
        }),
        exercises: vec![HistoryExerciseRow {
            session_exercise: exercise,
            sets: vec![set],
            volume_kg: 500.0,
        }],
        totals: DetailTotals {
            sets: 1,
            volume_kg: 500.0,
        },
    };

    let rendered = format_detail_lines(&detail);
    assert_eq!(rendered[0], "2024-01-03  completed");
    assert!(rendered[1].contains("Bench press"));
    assert!(rendered[2].contains("10 × 50 kg"));
    assert_eq!(rendered.last().unwrap(), "Total: 1 sets, 500.0 kg");
}

#[test]
fn format_conflict_lines_include_key_fields() {
    let conflicts = vec![ConflictRecord {
        id: "logged_sets:ls-1".to_string(),
        table: "logged_sets".to_string(),
        entity_id: "ls-1".to_string(),
        local: Map::new(),
        server: Map::new(),
        fields: vec!["reps".to_string(), "weight_kg".to_string()],
        first_seen_at: 100,
        updated_at: 0,
    }];

    let rendered = format_conflict_lines(&conflicts);
    assert_eq!(
        rendered,
        vec!["1970-01-01 00:00:00 UTC  logged_sets:ls-1  fields=reps,weight_kg".to_string()]
    );
}

#[test]
fn merge_report_points_at_conflicts() {
    let clean = MergeReport {
        applied: 3,
        settled: 1,
        conflicts: 0,
        rejected: 0,
    };
    assert_eq!(format_merge_report(&clean), "3 applied, 1 settled, 0 conflicts");

    let with_conflicts = MergeReport {
        conflicts: 2,
        ..clean
    };
    assert!(format_merge_report(&with_conflicts).contains("gymbud conflicts list"));

    let with_rejected = MergeReport {
        rejected: 1,
        ..clean
    };
    assert_eq!(
        format_merge_report(&with_rejected),
        "3 applied, 1 settled, 0 conflicts, 1 rejected"
    );
}

#[test]
fn normalizers_reject_blank_input() {
    assert!(matches!(
        normalize_search_query(" \n\t "),
        Err(CliError::EmptySearchQuery)
    ));
    assert_eq!(normalize_search_query("  squat ").unwrap(), "squat");
    assert!(matches!(
        normalize_session_id("  "),
        Err(CliError::EmptySessionId)
    ));
}

#[test]
fn history_args_build_filter() {
    let args = HistoryListArgs {
        status: Some("completed".to_string()),
        from: Some("2024-01-03".to_string()),
        to: None,
        query: Some(" 01 ".to_string()),
    };
    let filter = args.to_filter().unwrap();
    assert_eq!(filter.status, Some(SessionStatus::Completed));
    assert_eq!(filter.query, "01");

    let bad = HistoryListArgs {
        to: Some("yesterday".to_string()),
        ..HistoryListArgs::default()
    };
    assert!(bad.to_filter().is_err());
}

#[test]
fn settled_value_reports_unavailable_history() {
    assert_eq!(settled_value(ViewState::Ready(Vec::<u8>::new())).unwrap(), Vec::<u8>::new());
    assert!(matches!(
        settled_value(ViewState::<Vec<u8>>::Unavailable("disk gone".to_string())),
        Err(CliError::HistoryUnavailable(ref message)) if message == "disk gone"
    ));
    assert!(settled_value(ViewState::<()>::Loading).is_err());
}

#[test]
fn keep_side_maps_to_resolution() {
    assert_eq!(Resolution::from(KeepSide::Local), Resolution::KeepLocal);
    assert_eq!(Resolution::from(KeepSide::Server), Resolution::TakeServer);
    assert!(describe_resolution(Resolution::KeepLocal).contains("local"));
}

#[test]
fn cli_parses_conflict_resolution() {
    let cli = Cli::try_parse_from([
        "gymbud",
        "--offline",
        "conflicts",
        "resolve",
        "logged_sets:ls-1",
        "--keep",
        "server",
    ])
    .unwrap();

    assert!(cli.offline);
    match cli.command {
        Commands::Conflicts {
            command: ConflictCommands::Resolve { id, keep },
        } => {
            assert_eq!(id, "logged_sets:ls-1");
            assert_eq!(keep, KeepSide::Server);
        }
        _ => panic!("expected conflicts resolve"),
    }

    assert!(
        Cli::try_parse_from(["gymbud", "conflicts", "resolve", "x", "--keep", "both"]).is_err()
    );
}

#[test]
fn resolve_db_path_prefers_cli_argument() {
    let explicit = PathBuf::from("/tmp/explicit.db");
    assert_eq!(resolve_db_path(Some(explicit.clone())), explicit);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn offline_context_refuses_backend_calls() {
    let db_path = unique_test_db_path();
    let app = AppContext::open(Some(db_path.clone()), None, true)
        .await
        .unwrap();

    assert!(matches!(app.remote_client(), Err(CliError::Offline)));
    assert!(app.history_context().remote.is_none());

    cleanup_db_files(&db_path);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn sync_import_merges_snapshot_file() {
    let db_path = unique_test_db_path();
    let snapshot_path = db_path.with_extension("json");
    std::fs::write(
        &snapshot_path,
        r#"{
            "sessions": [{"id": "S1", "date": "2024-01-03", "status": "completed"}],
            "session_exercises": [{"id": "E1", "session_id": "S1", "order_index": 0, "exercise_id": "bench"}],
            "logged_sets": [{"id": "a", "session_exercise_id": "E1", "set_number": 1, "reps": 10, "weight_kg": 50}],
            "cursor": "c-1"
        }"#,
    )
    .unwrap();

    let app = AppContext::open(Some(db_path.clone()), None, true)
        .await
        .unwrap();
    run_sync_import(&app, &snapshot_path).await.unwrap();

    let sessions = app.store.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(app.store.pull_cursor().await.unwrap().as_deref(), Some("c-1"));

    let _ = std::fs::remove_file(&snapshot_path);
    cleanup_db_files(&db_path);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn resolving_unknown_conflict_reports_id() {
    let db_path = unique_test_db_path();
    let app = AppContext::open(Some(db_path.clone()), None, true)
        .await
        .unwrap();

    let error = run_conflicts_resolve(&app, " sessions:missing ", KeepSide::Local)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::ConflictNotFound(ref id) if id == "sessions:missing"));

    cleanup_db_files(&db_path);
}

#[cfg_attr(windows, ignore = "libsql integration is flaky on windows CI")]
#[tokio::test(flavor = "current_thread")]
async fn unreadable_history_fails_instead_of_printing_empty() {
    let db_path = unique_test_db_path();
    let app = AppContext::open(Some(db_path.clone()), None, true)
        .await
        .unwrap();

    let db = libsql::Builder::new_local(&db_path).build().await.unwrap();
    let conn = db.connect().unwrap();
    conn.execute("DROP TABLE sessions", ()).await.unwrap();

    let error = run_history_list(&app, &HistoryListArgs::default(), true)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::HistoryUnavailable(_)));

    let error = run_history_show(&app, "S1", false).await.unwrap_err();
    assert!(matches!(error, CliError::HistoryUnavailable(_)));

    cleanup_db_files(&db_path);
}

fn unique_test_db_path() -> PathBuf {
    static NEXT_TEST_DB_ID: AtomicU64 = AtomicU64::new(0);

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let sequence = NEXT_TEST_DB_ID.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("gymbud-cli-test-{timestamp}-{sequence}.db"))
}

fn cleanup_db_files(path: &PathBuf) {
    // libsql can keep file handles alive briefly after drop on Windows.
    if cfg!(windows) {
        return;
    }

    let _ = std::fs::remove_file(path);
    let _ = std::fs::remove_file(path.with_extension("db-shm"));
    let _ = std::fs::remove_file(path.with_extension("db-wal"));
}
