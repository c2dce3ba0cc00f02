//! Google Gemini provider implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

use examiner_core::error::SourceError;
use examiner_core::traits::{
    GradingRequest, GradingResponse, GradingSource, QuestionDraft, QuestionRequest,
    QuestionSource,
};

use crate::http::{JsonClient, RetryPolicy};
use crate::prompt::{self, SchemaDialect};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Gemini `generateContent` provider. Implements both the question and the
/// grading contract with a response schema per contract.
pub struct GeminiProvider {
    api_key: String,
    base_url: String,
    model: String,
    language: String,
    http: JsonClient,
}

impl GeminiProvider {
    pub fn new(api_key: &str, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
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

    async fn generate_json(
        &self,
        system: String,
        user: String,
        schema: Value,
    ) -> Result<String, SourceError> {
        let body = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: system }],
            },
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: user }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let response: GeminiResponse = self
            .http
            .post(&url, &[("x-goog-api-key", self.api_key.as_str())], &body)
            .await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(SourceError::Transport(
                "gemini returned no candidates".to_string(),
            ));
        }
        Ok(text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[async_trait]
impl QuestionSource for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %self.model, count = request.count))]
    async fn generate(&self, request: &QuestionRequest) -> Result<Vec<QuestionDraft>, SourceError> {
        let text = self
            .generate_json(
                prompt::question_system_prompt(&self.language),
                prompt::question_prompt(request, &self.language),
                prompt::question_schema(SchemaDialect::Gemini),
            )
            .await?;
        prompt::parse_questions(&text)
    }
}

#[async_trait]
impl GradingSource for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self, request), fields(model = %self.model, items = request.items.len()))]
    async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, SourceError> {
        let text = self
            .generate_json(
                prompt::grading_system_prompt(&self.language),
                prompt::grading_prompt(request)?,
                prompt::grading_schema(SchemaDialect::Gemini),
            )
            .await?;
        prompt::parse_grading(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use examiner_core::model::{Grade, Track};
    use examiner_core::traits::GradingItem;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
        })
    }

    fn provider(server: &MockServer) -> GeminiProvider {
        GeminiProvider::new("test-key", Some(server.uri()), None).with_retry(RetryPolicy::none())
    }

    #[tokio::test]
    async fn generates_questions() {
        let server = MockServer::start().await;
        let batch = serde_json::json!({"questions": [
            {"id": 1, "question_text": "2 + 2 = ?", "options": ["3", "4", "5", "6"], "correct_answer_index": 1}
        ]});

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(serde_json::json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(&batch.to_string())))
            .expect(1)
            .mount(&server)
            .await;

        let request = QuestionRequest {
            grade: Grade::UpperSecondary2,
            track: Some(Track::Science),
            count: 1,
        };
        let drafts = provider(&server).generate(&request).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].options[1], "4");
    }

    #[tokio::test]
    async fn grades_answers() {
        let server = MockServer::start().await;
        let graded = serde_json::json!({
            "score": "0/1",
            "feedback": [{
                "question_text": "2 + 2 = ?",
                "your_answer": "no answer",
                "correct_answer": "4",
                "explanation": "Two plus two is four."
            }]
        });

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate(&graded.to_string())))
            .mount(&server)
            .await;

        let request = GradingRequest {
            items: vec![GradingItem {
                question: "2 + 2 = ?".into(),
                options: vec!["3".into(), "4".into(), "5".into(), "6".into()],
                correct_answer: "4".into(),
                student_answer: "no answer".into(),
            }],
        };
        let response = provider(&server).grade(&request).await.unwrap();
        assert_eq!(response.score, "0/1");
        assert_eq!(response.feedback[0].correct_answer, "4");
    }

    #[tokio::test]
    async fn malformed_text_is_a_schema_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("{\"questions\": 3}")))
            .mount(&server)
            .await;

        let request = QuestionRequest {
            grade: Grade::LowerSecondary1,
            track: None,
            count: 1,
        };
        let err = provider(&server).generate(&request).await.unwrap_err();
        assert!(matches!(err, SourceError::Schema { .. }));
    }

    #[tokio::test]
    async fn http_errors_are_transport_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
            .mount(&server)
            .await;

        let request = QuestionRequest {
            grade: Grade::LowerSecondary1,
            track: None,
            count: 1,
        };
        let err = provider(&server).generate(&request).await.unwrap_err();
        assert!(matches!(err, SourceError::Transport(ref m) if m.contains("model not found")));
    }
}
