//! The `examiner grades` command.

use anyhow::Result;
use comfy_table::{Cell, Table};

use examiner_core::model::{DurationPreset, Grade};

pub fn execute() -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Grade", "Description", "Tracks"]);
    for grade in Grade::ALL {
        let tracks = grade
            .tracks()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        table.add_row(vec![
            Cell::new(grade),
            Cell::new(grade.describe()),
            Cell::new(if tracks.is_empty() { "-".to_string() } else { tracks }),
        ]);
    }
    println!("{table}");

    let mut presets = Table::new();
    presets.set_header(vec!["--duration", "Questions"]);
    for preset in DurationPreset::ALL {
        presets.add_row(vec![
            Cell::new(format!("{} min", preset.minutes())),
            Cell::new(preset.question_count()),
        ]);
    }
    println!("\n{presets}");
    println!("Custom: --questions 1-50 --minutes N");

    Ok(())
}
