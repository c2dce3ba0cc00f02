//! In-crate test doubles for the collaborator ports.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{PersistError, SourceError};
use crate::model::{GradedFeedbackItem, ResultRecord};
use crate::traits::{
    GradingRequest, GradingResponse, GradingSource, QuestionDraft, QuestionRequest,
    QuestionSource, ResultPersister,
};

/// `count` well-formed drafts whose correct answer is always option 0.
pub fn drafts(count: u32) -> Vec<QuestionDraft> {
    (0..count)
        .map(|i| QuestionDraft {
            id: Some(i64::from(i) + 100),
            question_text: format!("Question {i}"),
            options: vec![
                format!("right {i}"),
                format!("wrong {i}a"),
                format!("wrong {i}b"),
                format!("wrong {i}c"),
            ],
            correct_answer_index: 0,
            explanation: None,
        })
        .collect()
}

/// Always returns the same batch.
pub struct FixedQuestions {
    drafts: Vec<QuestionDraft>,
    calls: AtomicU32,
    last_request: Mutex<Option<QuestionRequest>>,
}

impl FixedQuestions {
    pub fn new(drafts: Vec<QuestionDraft>) -> Self {
        Self {
            drafts,
            calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<QuestionRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestionSource for FixedQuestions {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, request: &QuestionRequest) -> Result<Vec<QuestionDraft>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.drafts.clone())
    }
}

/// Grades by comparing option text, optionally after a delay.
#[derive(Default)]
pub struct HonestGrader {
    delay: Option<Duration>,
    calls: AtomicU32,
    last_request: Mutex<Option<GradingRequest>>,
}

impl HonestGrader {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GradingRequest> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl GradingSource for HonestGrader {
    fn name(&self) -> &str {
        "honest"
    }

    async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let feedback: Vec<_> = request
            .items
            .iter()
            .filter(|i| i.student_answer != i.correct_answer)
            .map(|i| GradedFeedbackItem {
                question_text: i.question.clone(),
                your_answer: i.student_answer.clone(),
                correct_answer: i.correct_answer.clone(),
                explanation: format!("The answer is {}.", i.correct_answer),
            })
            .collect();
        let correct = request.items.len() - feedback.len();

        Ok(GradingResponse {
            score: format!("{correct}/{}", request.items.len()),
            feedback,
        })
    }
}

/// Fails every call with a transport error.
pub struct FailingGrader;

#[async_trait]
impl GradingSource for FailingGrader {
    fn name(&self) -> &str {
        "failing"
    }

    async fn grade(&self, _: &GradingRequest) -> Result<GradingResponse, SourceError> {
        Err(SourceError::Transport("connection reset".into()))
    }
}

/// Keeps records in memory, or fails every write.
#[derive(Default)]
pub struct RecordingPersister {
    fail: bool,
    records: Mutex<Vec<ResultRecord>>,
}

impl RecordingPersister {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn records(&self) -> Vec<ResultRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultPersister for RecordingPersister {
    fn name(&self) -> &str {
        "recording"
    }

    async fn persist(&self, record: &ResultRecord) -> Result<(), PersistError> {
        if self.fail {
            return Err(PersistError::Backend("write refused".into()));
        }
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}
