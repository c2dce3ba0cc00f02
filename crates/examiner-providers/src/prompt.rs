//! Prompts and response schemas for the question and grading contracts.

use serde::Deserialize;
use serde_json::{json, Value};

use examiner_core::error::SourceError;
use examiner_core::model::OPTION_COUNT;
use examiner_core::traits::{GradingRequest, GradingResponse, QuestionDraft, QuestionRequest};

pub const DEFAULT_LANGUAGE: &str = "Arabic";

/// How a backend spells JSON schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchemaDialect {
    /// OpenAPI subset with upper-case type names.
    Gemini,
    /// Strict JSON Schema.
    OpenAi,
}

impl SchemaDialect {
    fn ty(self, name: &str) -> Value {
        match self {
            SchemaDialect::Gemini => Value::String(name.to_uppercase()),
            SchemaDialect::OpenAi => Value::String(name.to_string()),
        }
    }

    fn object(self, properties: Value, required: &[&str]) -> Value {
        let mut schema = json!({
            "type": self.ty("object"),
            "properties": properties,
            "required": required,
        });
        if self == SchemaDialect::OpenAi {
            schema["additionalProperties"] = Value::Bool(false);
        }
        schema
    }
}

pub(crate) fn question_system_prompt(language: &str) -> String {
    format!(
        "You write school assessment questions. Every question is multiple choice with exactly \
         {OPTION_COUNT} options and one correct answer. Write all questions and options in {language}. \
         Respond only with JSON matching the schema."
    )
}

pub(crate) fn question_prompt(request: &QuestionRequest, language: &str) -> String {
    let track = request
        .track
        .map(|t| format!(" specializing in {}", t.describe()))
        .unwrap_or_default();
    format!(
        "Generate {count} multiple-choice questions in various subjects for a student in the {grade}{track} in Egypt. \
         Each question must have exactly {OPTION_COUNT} options. `correct_answer_index` is the zero-based index \
         of the correct option. Write everything in {language}.",
        count = request.count,
        grade = request.grade.describe(),
    )
}

pub(crate) fn grading_system_prompt(language: &str) -> String {
    format!(
        "You are a kind and encouraging teacher's assistant. Grade the student's answers. \
         Report the score as 'X/N' where N is the number of questions. Give feedback with a short, \
         clear explanation only for incorrect or unanswered questions. Write the feedback in {language}."
    )
}

pub(crate) fn grading_prompt(request: &GradingRequest) -> Result<String, SourceError> {
    let items = serde_json::to_string_pretty(&request.items)
        .map_err(|e| SourceError::schema("grading", e.to_string()))?;
    Ok(format!(
        "Grade these {} answers. A student answer of \"no answer\" means the question was left blank.\n{items}",
        request.total()
    ))
}

pub(crate) fn question_schema(dialect: SchemaDialect) -> Value {
    let item = dialect.object(
        json!({
            "id": { "type": dialect.ty("integer") },
            "question_text": { "type": dialect.ty("string") },
            "options": {
                "type": dialect.ty("array"),
                "items": { "type": dialect.ty("string") },
            },
            "correct_answer_index": { "type": dialect.ty("integer") },
        }),
        &["id", "question_text", "options", "correct_answer_index"],
    );
    dialect.object(
        json!({
            "questions": { "type": dialect.ty("array"), "items": item },
        }),
        &["questions"],
    )
}

pub(crate) fn grading_schema(dialect: SchemaDialect) -> Value {
    let item = dialect.object(
        json!({
            "question_text": { "type": dialect.ty("string") },
            "your_answer": { "type": dialect.ty("string") },
            "correct_answer": { "type": dialect.ty("string") },
            "explanation": { "type": dialect.ty("string") },
        }),
        &["question_text", "your_answer", "correct_answer", "explanation"],
    );
    dialect.object(
        json!({
            "score": { "type": dialect.ty("string") },
            "feedback": { "type": dialect.ty("array"), "items": item },
        }),
        &["score", "feedback"],
    )
}

#[derive(Deserialize)]
struct QuestionBatch {
    questions: Vec<QuestionDraft>,
}

/// Decode the model's JSON text into question drafts.
pub(crate) fn parse_questions(text: &str) -> Result<Vec<QuestionDraft>, SourceError> {
    let text = strip_fences(text);
    // Some models answer with the bare array despite the schema.
    if text.starts_with('[') {
        return serde_json::from_str(text).map_err(|e| SourceError::schema("questions", e.to_string()));
    }
    serde_json::from_str::<QuestionBatch>(text)
        .map(|batch| batch.questions)
        .map_err(|e| SourceError::schema("questions", e.to_string()))
}

/// Decode the model's JSON text into a grading response.
pub(crate) fn parse_grading(text: &str) -> Result<GradingResponse, SourceError> {
    serde_json::from_str(strip_fences(text)).map_err(|e| SourceError::schema("grading", e.to_string()))
}

fn strip_fences(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use examiner_core::model::{Grade, Track};

    #[test]
    fn question_prompt_mentions_grade_track_and_language() {
        let request = QuestionRequest {
            grade: Grade::UpperSecondary3,
            track: Some(Track::ScienceMath),
            count: 22,
        };
        let prompt = question_prompt(&request, "Arabic");
        assert!(prompt.starts_with("Generate 22 multiple-choice questions"));
        assert!(prompt.contains("third year of secondary school"));
        assert!(prompt.contains("mathematics branch"));
        assert!(prompt.contains("in Egypt"));
        assert!(prompt.contains("Arabic"));

        let lower = QuestionRequest {
            grade: Grade::LowerSecondary1,
            track: None,
            count: 5,
        };
        assert!(!question_prompt(&lower, "English").contains("specializing"));
    }

    #[test]
    fn schemas_follow_dialect() {
        let gemini = question_schema(SchemaDialect::Gemini);
        assert_eq!(gemini["type"], "OBJECT");
        assert!(gemini.get("additionalProperties").is_none());

        let openai = grading_schema(SchemaDialect::OpenAi);
        assert_eq!(openai["type"], "object");
        assert_eq!(openai["additionalProperties"], false);
        assert_eq!(openai["properties"]["feedback"]["items"]["additionalProperties"], false);
    }

    #[test]
    fn parses_wrapped_and_bare_batches() {
        let wrapped = r#"{"questions":[{"id":1,"question_text":"Q","options":["a","b","c","d"],"correct_answer_index":2}]}"#;
        assert_eq!(parse_questions(wrapped).unwrap()[0].correct_answer_index, 2);

        let bare = "```json\n[{\"id\":1,\"question_text\":\"Q\",\"options\":[\"a\"],\"correct_answer_index\":0}]\n```";
        assert_eq!(parse_questions(bare).unwrap()[0].options.len(), 1);

        assert!(matches!(
            parse_questions("not json"),
            Err(SourceError::Schema { contract: "questions", .. })
        ));
    }

    #[test]
    fn parses_grading() {
        let response = parse_grading(r#"{"score":"1/2","feedback":[]}"#).unwrap();
        assert_eq!(response.score, "1/2");
        assert!(matches!(
            parse_grading(r#"{"feedback":[]}"#),
            Err(SourceError::Schema { contract: "grading", .. })
        ));
    }
}
