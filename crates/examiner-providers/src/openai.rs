//! OpenAI-compatible chat completions provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use examiner_core::error::SourceError;
use examiner_core::traits::{
    GradingRequest, GradingResponse, GradingSource, QuestionDraft, QuestionRequest,
    QuestionSource,
};

use crate::http::{JsonClient, RetryPolicy};
use crate::prompt::{self, SchemaDialect};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// OpenAI-compatible API provider using structured outputs.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    org_id: Option<String>,
    model: String,
    language: String,
    http: JsonClient,
}

impl OpenAiProvider {
    pub fn new(
        api_key: &str,
        base_url: Option<String>,
        org_id: Option<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            org_id,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            language: prompt::DEFAULT_LANGUAGE.to_string(),
            http: JsonClient::new(RetryPolicy::default()),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.http = JsonClient::new(retry);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_json(
        &self,
        schema_name: &str,
        system: String,
        user: String,
        schema: Value,
    ) -> Result<String, SourceError> {
        let body = OpenAiRequest {
            model: self.model.clone(),
            temperature: 0.7,
            messages: vec![
                OpenAiMessage {
                    role: "system".to_string(),
                    content: system,
                },
                OpenAiMessage {
                    role: "user".to_string(),
                    content: user,
                },
            ],
            response_format: json!({
                "type": "json_schema",
                "json_schema": { "name": schema_name, "strict": true, "schema": schema },
            }),
        };

        let auth = format!("Bearer {}", self.api_key);
        let mut headers = vec![("Authorization", auth.as_str())];
        if let Some(org) = &self.org_id {
            headers.push(("OpenAI-Organization", org.as_str()));
        }

        let response: OpenAiResponse = self
            .http
            .post(
                &format!("{}/v1/chat/completions", self.base_url),
                &headers,
                &body,
            )
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SourceError::Transport("openai returned no content".to_string()))
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    temperature: f64,
    messages: Vec<OpenAiMessage>,
    response_format: Value,
}

#[derive(Serialize)]
struct OpenAiMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
}

#[derive(Deserialize)]
struct OpenAiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl QuestionSource for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model, count = request.count))]
    async fn generate(&self, request: &QuestionRequest) -> Result<Vec<QuestionDraft>, SourceError> {
        let text = self
            .complete_json(
                "question_batch",
                prompt::question_system_prompt(&self.language),
                prompt::question_prompt(request, &self.language),
                prompt::question_schema(SchemaDialect::OpenAi),
            )
            .await?;
        prompt::parse_questions(&text)
    }
}

#[async_trait]
impl GradingSource for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    #[instrument(skip(self, request), fields(model = %self.model, items = request.items.len()))]
    async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, SourceError> {
        let text = self
            .complete_json(
                "graded_attempt",
                prompt::grading_system_prompt(&self.language),
                prompt::grading_prompt(request)?,
                prompt::grading_schema(SchemaDialect::OpenAi),
            )
            .await?;
        prompt::parse_grading(&text)
    }
}
