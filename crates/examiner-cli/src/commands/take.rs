//! The `examiner take` command.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use examiner_core::driver::{run_attempt, AttemptObserver, StudentInput};
use examiner_core::engine::AssessmentEngine;
use examiner_core::error::EngineError;
use examiner_core::model::{
    AssessmentConfiguration, AssessmentResult, DurationPreset, Grade, PersistenceStatus,
    Question, QuestionId, Track, OPTION_COUNT,
};
use examiner_core::session::FinishReason;
use examiner_core::traits::ResultPersister;
use examiner_providers::{create_provider, load_config_from};

use super::open_store;

pub struct TakeArgs {
    pub grade: String,
    pub track: Option<String>,
    pub duration: Option<u32>,
    pub questions: Option<u32>,
    pub minutes: Option<u32>,
    pub student: Option<String>,
    pub provider: Option<String>,
    pub config: Option<PathBuf>,
}

const OPTION_LETTERS: [char; OPTION_COUNT] = ['a', 'b', 'c', 'd'];

/// Console observer: questions and results on stdout, progress on stderr.
struct ConsoleObserver;

impl AttemptObserver for ConsoleObserver {
    fn on_generating(&self, config: &AssessmentConfiguration) {
        let track = config
            .track
            .map(|t| format!(", {t}"))
            .unwrap_or_default();
        eprintln!(
            "Preparing {} questions for {}{track}...",
            config.question_count, config.grade
        );
    }

    fn on_questions_ready(&self, questions: &[Question], time_limit_secs: u64) {
        for (n, question) in questions.iter().enumerate() {
            println!("\n{}. {}", n + 1, question.text);
            for (letter, option) in OPTION_LETTERS.iter().zip(&question.options) {
                println!("   {letter}) {option}");
            }
        }
        println!(
            "\nYou have {}. Answer with '<number> <a-d>', type 'finish' when done.",
            format_clock(time_limit_secs)
        );
    }

    fn on_answer_recorded(&self, question: QuestionId, option: usize, answered: usize, total: usize) {
        let letter = OPTION_LETTERS.get(option).copied().unwrap_or('?');
        eprintln!("  Recorded {} {letter} ({answered}/{total} answered)", question + 1);
    }

    fn on_input_rejected(&self, error: &EngineError) {
        eprintln!("  Rejected: {error}");
    }

    fn on_tick(&self, remaining_secs: u64) {
        if remaining_secs % 60 == 0 || remaining_secs == 10 {
            eprintln!("  {} remaining", format_clock(remaining_secs));
        }
    }

    fn on_grading(&self, reason: FinishReason, answered: usize, total: usize) {
        match reason {
            FinishReason::Expired => eprintln!("\nTime is up! Grading {answered}/{total} answers..."),
            FinishReason::Manual => eprintln!("\nGrading {answered}/{total} answers..."),
        }
    }

    fn on_result(&self, result: &AssessmentResult, persistence: Option<&PersistenceStatus>) {
        print_result(result);
        if let Some(PersistenceStatus::Failed(reason)) = persistence {
            eprintln!("Warning: your result could not be saved: {reason}");
        }
    }

    fn on_failed(&self, error: &EngineError) {
        eprintln!("  ERROR: {error}");
        if error.is_retryable() {
            eprintln!("  Nothing was recorded; run the command again to retry.");
        }
    }
}

pub async fn execute(args: TakeArgs) -> Result<()> {
    let config = assessment_config(&args)?;
    config.validate()?;

    let settings = load_config_from(args.config.as_deref())?;
    let (provider_name, provider_config) = settings.provider(args.provider.as_deref())?;
    let collaborators = create_provider(&provider_name, &provider_config, &settings)
        .with_context(|| format!("failed to create provider '{provider_name}'"))?;
    let store = open_store(&settings.store);
    let student_id = args.student.unwrap_or_else(|| settings.student_id.clone());

    tracing::info!(
        provider = %collaborators.name,
        store = %store.name(),
        student = %student_id,
        "starting assessment"
    );

    let mut engine = AssessmentEngine::new(
        collaborators.questions,
        collaborators.grading,
        store,
        student_id,
    );
    engine.configure(config)?;

    let (tx, mut rx) = mpsc::channel(64);
    spawn_input_reader(tx);

    run_attempt(&mut engine, &mut rx, &ConsoleObserver).await?;
    Ok(())
}

fn assessment_config(args: &TakeArgs) -> Result<AssessmentConfiguration> {
    let grade: Grade = args.grade.parse()?;
    let track = args.track.as_deref().map(str::parse::<Track>).transpose()?;

    let config = match (args.duration, args.questions, args.minutes) {
        (Some(minutes), _, _) => {
            let preset = DurationPreset::from_minutes(minutes).with_context(|| {
                format!("unsupported duration {minutes}; choose 15, 30 or 45, or use --questions and --minutes")
            })?;
            AssessmentConfiguration::from_preset(grade, track, preset)
        }
        (None, Some(questions), Some(minutes)) => {
            AssessmentConfiguration::new(grade, track, questions, minutes)
        }
        _ => AssessmentConfiguration::from_preset(grade, track, DurationPreset::Medium),
    };
    Ok(config)
}

/// Forward stdin lines to the attempt until EOF.
///
/// Runs on a plain thread: a blocking stdin read cannot be cancelled, and
/// it must not keep the runtime alive once the attempt is over.
fn spawn_input_reader(tx: mpsc::Sender<StudentInput>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read input");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_input(&line) {
                Some(input) => {
                    if tx.blocking_send(input).is_err() {
                        break;
                    }
                }
                None => eprintln!(
                    "  Unrecognized input '{}'; use '<number> <a-d>' or 'finish'",
                    line.trim()
                ),
            }
        }
    });
}

/// Parse `<number> <a-d>` (1-based question number) or `finish`.
fn parse_input(line: &str) -> Option<StudentInput> {
    let line = line.trim().to_lowercase();
    if line == "finish" || line == "f" {
        return Some(StudentInput::Finish);
    }

    let mut parts = line.split_whitespace();
    let number: QuestionId = parts.next()?.parse().ok()?;
    let letter = parts.next()?;
    if parts.next().is_some() || number == 0 {
        return None;
    }
    let mut chars = letter.chars();
    let option = match (chars.next(), chars.next()) {
        (Some(c), None) => OPTION_LETTERS.iter().position(|l| *l == c)?,
        _ => return None,
    };
    Some(StudentInput::Answer {
        question: number - 1,
        option,
    })
}

fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn print_result(result: &AssessmentResult) {
    use comfy_table::{Cell, Table};

    println!(
        "\nScore: {} ({:.0}%)  Time: {}{}",
        result.score,
        result.score.fraction() * 100.0,
        format_clock(result.duration_seconds),
        if result.timed_out { " (time expired)" } else { "" }
    );

    if result.is_flagged() {
        println!(
            "Note: the grader reported {}; the score above was computed from your answers.",
            result.reported_score
        );
    }

    if result.feedback.is_empty() {
        println!("All answers correct!");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Question", "Your answer", "Correct answer", "Explanation"]);
    for item in &result.feedback {
        table.add_row(vec![
            Cell::new(&item.question_text),
            Cell::new(&item.your_answer),
            Cell::new(&item.correct_answer),
            Cell::new(&item.explanation),
        ]);
    }
    println!("\n{table}");
}
