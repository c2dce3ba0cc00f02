//! Port definitions for the generative collaborator and result storage.
//!
//! The question and grading capabilities are separate traits with their own
//! request and response contracts, implemented by the `examiner-providers`
//! crate. Result storage is implemented by `examiner-store`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PersistError, SourceError};
use crate::model::{
    AnswerSet, Grade, GradedFeedbackItem, Question, QuestionId, ResultRecord, Score, Track,
    NO_ANSWER, OPTION_COUNT,
};

// ---------------------------------------------------------------------------
// Question Source
// ---------------------------------------------------------------------------

/// Generates a batch of multiple-choice questions.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    /// Human-readable source name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate questions for the request. The batch is validated by the
    /// engine with [`validate_question_batch`].
    async fn generate(&self, request: &QuestionRequest) -> Result<Vec<QuestionDraft>, SourceError>;
}

/// Request for a batch of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub grade: Grade,
    #[serde(default)]
    pub track: Option<Track>,
    pub count: u32,
}

/// A question as returned by the collaborator, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(default)]
    pub id: Option<i64>,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_answer_index: i64,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Validate a generated batch and assign per-attempt ids `0..N-1`.
///
/// The batch is accepted only as a whole: a single malformed item, or a
/// batch of the wrong size, rejects everything.
pub fn validate_question_batch(
    request: &QuestionRequest,
    drafts: Vec<QuestionDraft>,
) -> Result<Vec<Question>, SourceError> {
    if drafts.is_empty() {
        return Err(SourceError::Empty);
    }
    if drafts.len() != request.count as usize {
        return Err(SourceError::schema(
            "questions",
            format!("expected {} questions, got {}", request.count, drafts.len()),
        ));
    }

    let mut questions = Vec::with_capacity(drafts.len());
    for (position, draft) in drafts.into_iter().enumerate() {
        if draft.question_text.trim().is_empty() {
            return Err(SourceError::schema(
                "questions",
                format!("item {position} has empty question text"),
            ));
        }
        if draft.options.len() != OPTION_COUNT {
            return Err(SourceError::schema(
                "questions",
                format!(
                    "item {position} has {} options, expected {OPTION_COUNT}",
                    draft.options.len()
                ),
            ));
        }
        let correct = usize::try_from(draft.correct_answer_index)
            .ok()
            .filter(|i| *i < draft.options.len())
            .ok_or_else(|| {
                SourceError::schema(
                    "questions",
                    format!(
                        "item {position} has correct index {} outside 0..{OPTION_COUNT}",
                        draft.correct_answer_index
                    ),
                )
            })?;

        questions.push(Question {
            id: position as QuestionId,
            text: draft.question_text,
            options: draft.options,
            correct_answer_index: correct,
            explanation: draft.explanation.filter(|e| !e.trim().is_empty()),
        });
    }
    Ok(questions)
}

// ---------------------------------------------------------------------------
// Grading Source
// ---------------------------------------------------------------------------

/// Grades a frozen attempt.
#[async_trait]
pub trait GradingSource: Send + Sync {
    /// Human-readable source name.
    fn name(&self) -> &str;

    /// Grade the submitted answers.
    async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, SourceError>;
}

/// Everything the grader needs, with option text rather than indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingRequest {
    pub items: Vec<GradingItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingItem {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub student_answer: String,
}

impl GradingRequest {
    /// Build the request from the questions and the frozen answer set.
    pub fn from_attempt(questions: &[Question], answers: &AnswerSet) -> Self {
        let items = questions
            .iter()
            .map(|q| GradingItem {
                question: q.text.clone(),
                options: q.options.clone(),
                correct_answer: q.correct_option().to_string(),
                student_answer: answers
                    .get(q.id)
                    .and_then(|i| q.option_text(i))
                    .unwrap_or(NO_ANSWER)
                    .to_string(),
            })
            .collect();
        Self { items }
    }

    pub fn total(&self) -> u32 {
        self.items.len() as u32
    }
}

/// What the grader returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradingResponse {
    /// Score as `"X/Y"`.
    pub score: String,
    /// Feedback for incorrect answers only.
    #[serde(default)]
    pub feedback: Vec<GradedFeedbackItem>,
}

impl GradingResponse {
    /// Parse the reported score and check it covers every question.
    pub fn reported_score(&self, total: u32) -> Result<Score, SourceError> {
        let score: Score = self
            .score
            .parse()
            .map_err(|e: String| SourceError::schema("grading", e))?;
        if score.total != total {
            return Err(SourceError::schema(
                "grading",
                format!("score '{}' does not cover {total} questions", self.score),
            ));
        }
        Ok(score)
    }
}

// ---------------------------------------------------------------------------
// Result Persister
// ---------------------------------------------------------------------------

/// Append-only storage for finished attempts.
#[async_trait]
pub trait ResultPersister: Send + Sync {
    /// Human-readable store name.
    fn name(&self) -> &str;

    /// Write one new record. Records are never updated or deleted.
    async fn persist(&self, record: &ResultRecord) -> Result<(), PersistError>;
}
