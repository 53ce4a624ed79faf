use crate::commands::common::{normalize_search_query, AppContext};
use crate::error::CliError;

pub async fn run_exercise_search(
    app: &AppContext,
    query: &str,
    limit: usize,
    as_json: bool,
) -> Result<(), CliError> {
    let query = normalize_search_query(query)?;
    let client = app.remote_client()?;
    let exercises = client.search_exercises(&query, limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&exercises)?);
        return Ok(());
    }

    if exercises.is_empty() {
        println!("No exercises match '{query}'.");
        return Ok(());
    }

    for exercise in &exercises {
        let detail = [exercise.muscle_group.as_deref(), exercise.equipment.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        if detail.is_empty() {
            println!("{}  {}", exercise.id, exercise.name);
        } else {
            println!("{}  {}  ({detail})", exercise.id, exercise.name);
        }
    }
    Ok(())
}
