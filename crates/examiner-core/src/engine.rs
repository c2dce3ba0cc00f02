//! Assessment engine.
//!
//! Drives an [`AssessmentSession`] through its phases, awaiting the question
//! and grading collaborators, arming and disarming the countdown, and
//! handing finished results to the result persister.

use std::sync::Arc;

use tracing::instrument;

use crate::countdown::{Countdown, CountdownEvent};
use crate::error::EngineError;
use crate::model::{AssessmentConfiguration, AssessmentResult, PersistenceStatus, QuestionId};
use crate::scoring::grade_attempt;
use crate::session::{AssessmentSession, FinishReason, Phase};
use crate::traits::{
    validate_question_batch, GradingRequest, GradingSource, QuestionSource, ResultPersister,
};

/// The engine for one student's attempts.
pub struct AssessmentEngine {
    question_source: Arc<dyn QuestionSource>,
    grading_source: Arc<dyn GradingSource>,
    persister: Arc<dyn ResultPersister>,
    student_id: String,
    session: AssessmentSession,
    countdown: Option<Countdown>,
}

impl AssessmentEngine {
    pub fn new(
        question_source: Arc<dyn QuestionSource>,
        grading_source: Arc<dyn GradingSource>,
        persister: Arc<dyn ResultPersister>,
        student_id: impl Into<String>,
    ) -> Self {
        Self {
            question_source,
            grading_source,
            persister,
            student_id: student_id.into(),
            session: AssessmentSession::new(),
            countdown: None,
        }
    }

    pub fn session(&self) -> &AssessmentSession {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn student_id(&self) -> &str {
        &self.student_id
    }

    /// Seconds left on the countdown while an attempt is active.
    pub fn remaining_seconds(&self) -> Option<u64> {
        self.countdown.as_ref().map(Countdown::remaining)
    }

    pub fn configure(&mut self, config: AssessmentConfiguration) -> Result<(), EngineError> {
        self.session.configure(config)
    }

    /// Generate questions and, on success, enter `Active` with the countdown
    /// armed. On failure the engine is back in `Selection`.
    #[instrument(skip(self), fields(source = %self.question_source.name()))]
    pub async fn start_generation(&mut self) -> Result<(), EngineError> {
        let (attempt_id, request) = self.session.begin_generation()?;

        let outcome = self
            .question_source
            .generate(&request)
            .await
            .and_then(|drafts| validate_question_batch(&request, drafts));

        let limit_secs = self.session.complete_generation(attempt_id, outcome)?;
        self.countdown = Some(Countdown::start(limit_secs));
        Ok(())
    }

    pub fn record_answer(&mut self, question: QuestionId, option: usize) -> Result<(), EngineError> {
        self.session.record_answer(question, option).map(|_| ())
    }

    /// Wait for the next countdown event. Pending forever when no countdown
    /// is armed.
    pub async fn next_countdown_event(&mut self) -> CountdownEvent {
        match self.countdown.as_mut() {
            Some(countdown) => countdown.next_event().await,
            None => std::future::pending().await,
        }
    }

    /// Finish at the student's request.
    pub async fn finish(&mut self) -> Result<AssessmentResult, EngineError> {
        self.finish_with(FinishReason::Manual).await
    }

    /// Freeze the answers, grade them, and store the result.
    ///
    /// Exactly one call per attempt reaches the grader. A persistence
    /// failure does not undo the result; it is recorded as a warning in
    /// [`AssessmentSession::persistence`].
    #[instrument(skip(self), fields(grader = %self.grading_source.name()))]
    pub async fn finish_with(
        &mut self,
        reason: FinishReason,
    ) -> Result<AssessmentResult, EngineError> {
        let frozen = self.session.begin_finish(reason)?;
        self.disarm_countdown();

        let request = GradingRequest::from_attempt(&frozen.questions, &frozen.answers);
        let outcome = self
            .grading_source
            .grade(&request)
            .await
            .and_then(|response| grade_attempt(&frozen.questions, &frozen.answers, &response));

        let result = self.session.complete_grading(&frozen, outcome)?.clone();
        if result.is_flagged() {
            tracing::warn!(
                attempt_id = %result.attempt_id,
                discrepancies = ?result.discrepancies,
                "grader disagreed with the computed grade"
            );
        }

        let record = result.to_record(&self.student_id);
        let status = match self.persister.persist(&record).await {
            Ok(()) => {
                tracing::info!(attempt_id = %record.id, store = %self.persister.name(), "result stored");
                PersistenceStatus::Stored
            }
            Err(e) => {
                tracing::warn!(attempt_id = %record.id, error = %e, "failed to store result");
                PersistenceStatus::Failed(e.to_string())
            }
        };
        self.session.record_persistence(status);

        Ok(result)
    }

    /// Tear down the current attempt and return to `Selection`.
    pub fn reset(&mut self) {
        self.disarm_countdown();
        self.session.reset();
    }

    fn disarm_countdown(&mut self) {
        if let Some(mut countdown) = self.countdown.take() {
            countdown.disarm();
        }
    }
}
