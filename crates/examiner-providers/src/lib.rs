//! examiner-providers — Generative collaborator integrations.
//!
//! Implements the `QuestionSource` and `GradingSource` ports for Gemini and
//! OpenAI-compatible APIs, plus a deterministic offline mock, and loads the
//! `examiner.toml` configuration that selects between them.

pub mod config;
pub mod error;
pub mod gemini;
mod http;
pub mod mock;
pub mod openai;
mod prompt;

pub use config::{
    create_provider, load_config, load_config_from, Collaborators, ExaminerConfig,
    ProviderConfig, StoreConfig,
};
pub use error::ProviderError;
pub use http::RetryPolicy;
