//! Mock provider for offline use and testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examiner_core::error::SourceError;
use examiner_core::model::GradedFeedbackItem;
use examiner_core::traits::{
    GradingRequest, GradingResponse, GradingSource, QuestionDraft, QuestionRequest,
    QuestionSource,
};

/// A deterministic provider: arithmetic questions and an honest grader.
///
/// Question `i` asks for `i + 1` plus `i + 1`; the correct option rotates
/// through positions so that answering `a` everywhere is not a strategy.
pub struct MockProvider {
    /// Number of calls made (questions and grading together).
    call_count: AtomicU32,
    last_question_request: Mutex<Option<QuestionRequest>>,
    last_grading_request: Mutex<Option<GradingRequest>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            call_count: AtomicU32::new(0),
            last_question_request: Mutex::new(None),
            last_grading_request: Mutex::new(None),
        }
    }

    /// Get the number of calls made to this provider.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_question_request(&self) -> Option<QuestionRequest> {
        self.last_question_request
            .lock()
            .ok()
            .and_then(|r| r.clone())
    }

    pub fn last_grading_request(&self) -> Option<GradingRequest> {
        self.last_grading_request
            .lock()
            .ok()
            .and_then(|r| r.clone())
    }

    /// The question the mock generates at `index`.
    pub fn question(index: u32) -> QuestionDraft {
        let n = i64::from(index) + 1;
        let correct = i64::from(index % 4);
        let options = (0..4)
            .map(|slot| (2 * n + slot - correct).to_string())
            .collect();
        QuestionDraft {
            id: Some(i64::from(index)),
            question_text: format!("What is {n} + {n}?"),
            options,
            correct_answer_index: correct,
            explanation: Some(format!("{n} + {n} = {}.", 2 * n)),
        }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QuestionSource for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: &QuestionRequest) -> Result<Vec<QuestionDraft>, SourceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_question_request.lock() {
            *last = Some(request.clone());
        }
        Ok((0..request.count).map(Self::question).collect())
    }
}

#[async_trait]
impl GradingSource for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, SourceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_grading_request.lock() {
            *last = Some(request.clone());
        }

        let feedback: Vec<_> = request
            .items
            .iter()
            .filter(|item| item.student_answer != item.correct_answer)
            .map(|item| GradedFeedbackItem {
                question_text: item.question.clone(),
                your_answer: item.student_answer.clone(),
                correct_answer: item.correct_answer.clone(),
                explanation: format!("The correct answer is {}.", item.correct_answer),
            })
            .collect();
        let correct = request.items.len() - feedback.len();

        Ok(GradingResponse {
            score: format!("{correct}/{}", request.items.len()),
            feedback,
        })
    }
}
