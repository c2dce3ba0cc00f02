//! The `examiner history` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use examiner_providers::{load_config_from, StoreConfig};
use examiner_store::JsonlStore;

pub async fn execute(student: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let StoreConfig::Jsonl { path } = &config.store else {
        anyhow::bail!("history is only available for the jsonl store");
    };

    let store = JsonlStore::new(path);
    let mut records = store
        .load_all()
        .await
        .with_context(|| format!("failed to read results: {}", path.display()))?;
    if let Some(student) = &student {
        records.retain(|r| &r.student_id == student);
    }

    if records.is_empty() {
        println!("No results stored yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Student", "Score", "Time", "Track", "Mistakes"]);
    for record in &records {
        table.add_row(vec![
            Cell::new(record.created_at.format("%Y-%m-%d %H:%M")),
            Cell::new(&record.student_id),
            Cell::new(&record.score),
            Cell::new(format!(
                "{:02}:{:02}",
                record.duration_seconds / 60,
                record.duration_seconds % 60
            )),
            Cell::new(record.track.map(|t| t.to_string()).unwrap_or_else(|| "-".into())),
            Cell::new(record.feedback.len()),
        ]);
    }
    println!("{table}");
    println!("{} result(s)", records.len());

    Ok(())
}
