//! The `examiner init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("examiner.toml").exists() {
        println!("examiner.toml already exists, skipping.");
    } else {
        std::fs::write("examiner.toml", SAMPLE_CONFIG)?;
        println!("Created examiner.toml");
    }

    println!("\nNext steps:");
    println!("  1. Set GEMINI_API_KEY, or edit examiner.toml with your API keys");
    println!("  2. Run: examiner grades");
    println!("  3. Run: examiner take --grade upper-secondary-2 --track science --duration 15");
    println!("  Offline demo: examiner take --grade lower-secondary-1 --duration 15 --provider mock");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examiner configuration

default_provider = "gemini"
# default_model = "gemini-2.5-flash"
language = "Arabic"
student_id = "anonymous"
max_retries = 3
retry_delay_ms = 1000

[providers.gemini]
type = "gemini"
api_key = "${GEMINI_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.mock]
type = "mock"

[store]
type = "jsonl"
path = "examiner-results.jsonl"

# [store]
# type = "rest"
# base_url = "https://<project>.supabase.co"
# api_key = "${SUPABASE_ANON_KEY}"
# table = "results"
"#;
