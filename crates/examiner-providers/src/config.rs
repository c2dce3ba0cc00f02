//! Configuration loading and provider factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use examiner_core::traits::{GradingSource, QuestionSource};

use crate::gemini::GeminiProvider;
use crate::http::RetryPolicy;
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;
use crate::prompt::DEFAULT_LANGUAGE;

/// Configuration for a single generative collaborator.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Gemini {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Mock,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::Gemini {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            ProviderConfig::OpenAI {
                api_key: _,
                base_url,
                org_id,
                model,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .field("model", model)
                .finish(),
            ProviderConfig::Mock => f.write_str("Mock"),
        }
    }
}

/// Where finished attempts are stored.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Append-only JSON-lines file.
    Jsonl {
        #[serde(default = "default_store_path")]
        path: PathBuf,
    },
    /// PostgREST-style insert endpoint (e.g. Supabase).
    Rest {
        base_url: String,
        api_key: String,
        #[serde(default = "default_table")]
        table: String,
    },
    /// Kept in memory for the lifetime of the process.
    Memory,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreConfig::Jsonl { path } => f.debug_struct("Jsonl").field("path", path).finish(),
            StoreConfig::Rest {
                base_url,
                api_key: _,
                table,
            } => f
                .debug_struct("Rest")
                .field("base_url", base_url)
                .field("api_key", &"***")
                .field("table", table)
                .finish(),
            StoreConfig::Memory => f.write_str("Memory"),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::Jsonl {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("examiner-results.jsonl")
}
fn default_table() -> String {
    "results".to_string()
}

/// Top-level examiner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExaminerConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Provider used when none is given on the command line.
    #[serde(default = "default_provider")]
    pub default_provider: String,
    /// Model override applied to providers that do not name one.
    #[serde(default)]
    pub default_model: Option<String>,
    /// Language questions and feedback are written in.
    #[serde(default = "default_language")]
    pub language: String,
    /// Identifier stored with every result.
    #[serde(default = "default_student_id")]
    pub student_id: String,
    /// Max retries on transient provider errors.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds; doubles per retry.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}
fn default_student_id() -> String {
    "anonymous".to_string()
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}

impl Default for ExaminerConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: None,
            language: default_language(),
            student_id: default_student_id(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
            store: StoreConfig::default(),
        }
    }
}

impl ExaminerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Look up a provider by name, falling back to the default provider.
    /// The name `mock` always resolves, configured or not.
    pub fn provider(&self, name: Option<&str>) -> Result<(String, ProviderConfig)> {
        let name = name.unwrap_or(&self.default_provider);
        match self.providers.get(name) {
            Some(config) => Ok((name.to_string(), config.clone())),
            None if name == "mock" => Ok((name.to_string(), ProviderConfig::Mock)),
            None => anyhow::bail!(
                "provider '{name}' is not configured; run `examiner init` or set EXAMINER_GEMINI_KEY"
            ),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_provider_config(config: &ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::Gemini {
            api_key,
            base_url,
            model,
        } => ProviderConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            model: model.clone(),
        },
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            model,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            org_id: org_id.as_deref().map(resolve_env_vars),
            model: model.clone(),
        },
        ProviderConfig::Mock => ProviderConfig::Mock,
    }
}

fn resolve_store_config(config: &StoreConfig) -> StoreConfig {
    match config {
        StoreConfig::Jsonl { path } => StoreConfig::Jsonl {
            path: PathBuf::from(resolve_env_vars(&path.to_string_lossy())),
        },
        StoreConfig::Rest {
            base_url,
            api_key,
            table,
        } => StoreConfig::Rest {
            base_url: resolve_env_vars(base_url),
            api_key: resolve_env_vars(api_key),
            table: table.clone(),
        },
        StoreConfig::Memory => StoreConfig::Memory,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `examiner.toml` in the current directory
/// 2. `~/.config/examiner/config.toml`
///
/// Environment variable overrides: `EXAMINER_GEMINI_KEY`, `EXAMINER_OPENAI_KEY`.
pub fn load_config() -> Result<ExaminerConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ExaminerConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("examiner.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ExaminerConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ExaminerConfig::default(),
    };

    // Apply env var overrides
    if let Ok(key) = std::env::var("EXAMINER_GEMINI_KEY") {
        let entry = config
            .providers
            .entry("gemini".into())
            .or_insert(ProviderConfig::Gemini {
                api_key: String::new(),
                base_url: None,
                model: None,
            });
        if let ProviderConfig::Gemini { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Ok(key) = std::env::var("EXAMINER_OPENAI_KEY") {
        let entry = config
            .providers
            .entry("openai".into())
            .or_insert(ProviderConfig::OpenAI {
                api_key: String::new(),
                base_url: None,
                org_id: None,
                model: None,
            });
        if let ProviderConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_provider_config(v)))
        .collect();
    config.store = resolve_store_config(&config.store);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("examiner"))
}

/// The two collaborator ports, backed by one provider instance.
pub struct Collaborators {
    pub name: String,
    pub questions: Arc<dyn QuestionSource>,
    pub grading: Arc<dyn GradingSource>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Create a provider instance from its configuration.
pub fn create_provider(
    name: &str,
    config: &ProviderConfig,
    settings: &ExaminerConfig,
) -> Result<Collaborators> {
    fn pair<P: QuestionSource + GradingSource + 'static>(name: &str, provider: P) -> Collaborators {
        let provider = Arc::new(provider);
        Collaborators {
            name: name.to_string(),
            questions: provider.clone(),
            grading: provider,
        }
    }

    let model = |own: &Option<String>| own.clone().or_else(|| settings.default_model.clone());

    match config {
        ProviderConfig::Gemini {
            api_key,
            base_url,
            model: own,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("provider '{name}' has an empty api_key");
            }
            Ok(pair(
                name,
                GeminiProvider::new(api_key, base_url.clone(), model(own))
                    .with_language(&settings.language)
                    .with_retry(settings.retry_policy()),
            ))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
            model: own,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("provider '{name}' has an empty api_key");
            }
            Ok(pair(
                name,
                OpenAiProvider::new(api_key, base_url.clone(), org_id.clone(), model(own))
                    .with_language(&settings.language)
                    .with_retry(settings.retry_policy()),
            ))
        }
        ProviderConfig::Mock => Ok(pair(name, MockProvider::new())),
    }
}
