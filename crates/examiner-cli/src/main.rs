//! examiner CLI — take timed assessments in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "examiner", version, about = "Timed multiple-choice assessments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Take a timed assessment
    Take {
        /// School grade (see `examiner grades`)
        #[arg(long)]
        grade: String,

        /// Track, required for grades that offer one
        #[arg(long)]
        track: Option<String>,

        /// Preset duration in minutes: 15, 30 or 45
        #[arg(long, conflicts_with_all = ["questions", "minutes"])]
        duration: Option<u32>,

        /// Number of questions (custom duration)
        #[arg(long, requires = "minutes")]
        questions: Option<u32>,

        /// Time limit in minutes (custom duration)
        #[arg(long, requires = "questions")]
        minutes: Option<u32>,

        /// Student identifier stored with the result
        #[arg(long)]
        student: Option<String>,

        /// Provider name from the config file
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List grades, tracks and duration presets
    Grades,

    /// Show stored results
    History {
        /// Only show results for this student
        #[arg(long)]
        student: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("examiner=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Take {
            grade,
            track,
            duration,
            questions,
            minutes,
            student,
            provider,
            config,
        } => {
            commands::take::execute(commands::take::TakeArgs {
                grade,
                track,
                duration,
                questions,
                minutes,
                student,
                provider,
                config,
            })
            .await
        }
        Commands::Grades => commands::grades::execute(),
        Commands::History { student, config } => commands::history::execute(student, config).await,
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
