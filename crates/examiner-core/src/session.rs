//! The attempt state machine.
//!
//! [`AssessmentSession`] owns everything that belongs to one attempt and
//! enforces the phase order `Selection → Generating → Active → Results`.
//! It performs no I/O; [`crate::engine::AssessmentEngine`] drives it and
//! awaits the collaborators in between the `begin_*` and `complete_*` steps.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::{EngineError, SourceError};
use crate::model::{
    AnswerSet, AssessmentConfiguration, AssessmentResult, PersistenceStatus, Question, QuestionId,
    OPTION_COUNT,
};
use crate::scoring::GradedAttempt;
use crate::traits::QuestionRequest;

/// Phase of the current attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Selection,
    Generating,
    Active,
    Results,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Selection => write!(f, "selection"),
            Phase::Generating => write!(f, "generating"),
            Phase::Active => write!(f, "active"),
            Phase::Results => write!(f, "results"),
        }
    }
}

/// Why the attempt is being finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The student asked to finish.
    Manual,
    /// The countdown reached zero.
    Expired,
}

/// The questions and answers exactly as they were when finishing began.
#[derive(Debug, Clone, PartialEq)]
pub struct FrozenAttempt {
    pub attempt_id: Uuid,
    pub questions: Vec<Question>,
    pub answers: AnswerSet,
    pub duration_seconds: u64,
    pub reason: FinishReason,
}

/// State of one student's assessment.
#[derive(Debug)]
pub struct AssessmentSession {
    phase: Phase,
    config: Option<AssessmentConfiguration>,
    attempt_id: Option<Uuid>,
    questions: Vec<Question>,
    answers: AnswerSet,
    started_at: Option<Instant>,
    finishing: Option<FinishReason>,
    result: Option<AssessmentResult>,
    persistence: Option<PersistenceStatus>,
}

impl Default for AssessmentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl AssessmentSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Selection,
            config: None,
            attempt_id: None,
            questions: Vec::new(),
            answers: AnswerSet::new(),
            started_at: None,
            finishing: None,
            result: None,
            persistence: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> Option<&AssessmentConfiguration> {
        self.config.as_ref()
    }

    pub fn attempt_id(&self) -> Option<Uuid> {
        self.attempt_id
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    /// Whether finishing has begun and answers are frozen.
    pub fn is_finishing(&self) -> bool {
        self.finishing.is_some()
    }

    pub fn result(&self) -> Option<&AssessmentResult> {
        self.result.as_ref()
    }

    pub fn persistence(&self) -> Option<&PersistenceStatus> {
        self.persistence.as_ref()
    }

    fn expect_phase(&self, operation: &'static str, phase: Phase) -> Result<(), EngineError> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(EngineError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    /// Validate and store the configuration for the next attempt.
    pub fn configure(&mut self, config: AssessmentConfiguration) -> Result<(), EngineError> {
        self.expect_phase("configure", Phase::Selection)?;
        config.validate()?;
        self.config = Some(config);
        Ok(())
    }

    /// Enter `Generating` and return the request for the question source.
    pub fn begin_generation(&mut self) -> Result<(Uuid, QuestionRequest), EngineError> {
        self.expect_phase("start generation", Phase::Selection)?;
        let config = self.config.as_ref().ok_or(EngineError::NotConfigured)?;
        let request = QuestionRequest {
            grade: config.grade,
            track: config.track,
            count: config.question_count,
        };

        let attempt_id = Uuid::new_v4();
        self.attempt_id = Some(attempt_id);
        self.phase = Phase::Generating;
        tracing::info!(%attempt_id, grade = %request.grade, count = request.count, "generating questions");
        Ok((attempt_id, request))
    }

    /// Apply the question source outcome.
    ///
    /// On success the attempt becomes `Active` and the countdown length in
    /// seconds is returned. On failure the session returns to `Selection`
    /// with no questions kept.
    pub fn complete_generation(
        &mut self,
        attempt_id: Uuid,
        outcome: Result<Vec<Question>, SourceError>,
    ) -> Result<u64, EngineError> {
        if self.phase != Phase::Generating || self.attempt_id != Some(attempt_id) {
            tracing::warn!(%attempt_id, phase = %self.phase, "discarding stale question batch");
            return Err(EngineError::StaleAttempt);
        }

        match outcome {
            Ok(questions) => {
                let limit = self
                    .config
                    .as_ref()
                    .map(AssessmentConfiguration::time_limit_secs)
                    .ok_or(EngineError::NotConfigured)?;
                self.questions = questions;
                self.answers = AnswerSet::new();
                self.started_at = Some(Instant::now());
                self.phase = Phase::Active;
                tracing::info!(%attempt_id, questions = self.questions.len(), limit_secs = limit, "assessment active");
                Ok(limit)
            }
            Err(e) => {
                tracing::warn!(%attempt_id, error = %e, "question generation failed");
                self.clear_attempt();
                Err(EngineError::Generation(e))
            }
        }
    }

    /// Record or replace the answer for a question.
    pub fn record_answer(
        &mut self,
        question: QuestionId,
        option: usize,
    ) -> Result<Option<usize>, EngineError> {
        self.expect_phase("record answer", Phase::Active)?;
        if self.is_finishing() {
            return Err(EngineError::AlreadyFinishing);
        }
        if !self.questions.iter().any(|q| q.id == question) {
            return Err(EngineError::UnknownQuestion(question));
        }
        if option >= OPTION_COUNT {
            return Err(EngineError::OptionOutOfRange { question, option });
        }
        Ok(self.answers.record(question, option))
    }

    /// Set the finishing guard and freeze the answers.
    ///
    /// Only the first call per attempt succeeds; any later call, whatever
    /// its origin, gets [`EngineError::AlreadyFinishing`].
    pub fn begin_finish(&mut self, reason: FinishReason) -> Result<FrozenAttempt, EngineError> {
        self.expect_phase("finish", Phase::Active)?;
        if self.is_finishing() {
            return Err(EngineError::AlreadyFinishing);
        }
        let attempt_id = self.attempt_id.ok_or(EngineError::StaleAttempt)?;
        self.finishing = Some(reason);

        let duration_seconds = self
            .started_at
            .map(|t| t.elapsed().as_secs())
            .unwrap_or_default();
        tracing::info!(
            %attempt_id,
            ?reason,
            answered = self.answers.len(),
            total = self.questions.len(),
            duration_seconds,
            "finishing assessment"
        );

        Ok(FrozenAttempt {
            attempt_id,
            questions: self.questions.clone(),
            answers: self.answers.clone(),
            duration_seconds,
            reason,
        })
    }

    /// Apply the grading outcome.
    ///
    /// On success the result is created and the session enters `Results`.
    /// On failure the attempt is abandoned and the session returns to
    /// `Selection`; no result is kept.
    pub fn complete_grading(
        &mut self,
        frozen: &FrozenAttempt,
        outcome: Result<GradedAttempt, SourceError>,
    ) -> Result<&AssessmentResult, EngineError> {
        if self.phase != Phase::Active
            || !self.is_finishing()
            || self.attempt_id != Some(frozen.attempt_id)
        {
            tracing::warn!(attempt_id = %frozen.attempt_id, phase = %self.phase, "discarding stale grade");
            return Err(EngineError::StaleAttempt);
        }

        match outcome {
            Ok(graded) => {
                let result = AssessmentResult {
                    attempt_id: frozen.attempt_id,
                    score: graded.score,
                    reported_score: graded.reported_score,
                    duration_seconds: frozen.duration_seconds,
                    track: self.config.as_ref().and_then(|c| c.track),
                    feedback: graded.feedback,
                    discrepancies: graded.discrepancies,
                    timed_out: frozen.reason == FinishReason::Expired,
                };
                self.phase = Phase::Results;
                Ok(self.result.insert(result))
            }
            Err(e) => {
                tracing::error!(attempt_id = %frozen.attempt_id, error = %e, "grading failed, abandoning attempt");
                self.clear_attempt();
                Err(EngineError::Grading(e))
            }
        }
    }

    /// Record how the result write went. Never changes the phase.
    pub fn record_persistence(&mut self, status: PersistenceStatus) {
        self.persistence = Some(status);
    }

    /// Return to `Selection`, dropping the attempt and the configuration.
    pub fn reset(&mut self) {
        self.clear_attempt();
        self.config = None;
    }

    fn clear_attempt(&mut self) {
        self.phase = Phase::Selection;
        self.attempt_id = None;
        self.questions.clear();
        self.answers = AnswerSet::new();
        self.started_at = None;
        self.finishing = None;
        self.result = None;
        self.persistence = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Grade, Score, Track};

    fn questions(n: u32) -> Vec<Question> {
        (0..n)
            .map(|id| Question {
                id,
                text: format!("Q{id}"),
                options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                correct_answer_index: 0,
                explanation: None,
            })
            .collect()
    }

    fn active_session(n: u32) -> AssessmentSession {
        let mut session = AssessmentSession::new();
        session
            .configure(AssessmentConfiguration::new(
                Grade::UpperSecondary2,
                Some(Track::Science),
                n,
                15,
            ))
            .unwrap();
        let (attempt, _) = session.begin_generation().unwrap();
        session.complete_generation(attempt, Ok(questions(n))).unwrap();
        session
    }

    fn graded(correct: u32, total: u32) -> GradedAttempt {
        GradedAttempt {
            score: Score::new(correct, total),
            reported_score: Score::new(correct, total),
            feedback: vec![],
            discrepancies: vec![],
        }
    }

    #[test]
    fn configuration_errors_stay_in_selection() {
        let mut session = AssessmentSession::new();
        let err = session
            .configure(AssessmentConfiguration::new(Grade::UpperSecondary3, None, 10, 15))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert_eq!(session.phase(), Phase::Selection);
        assert!(matches!(
            session.begin_generation(),
            Err(EngineError::NotConfigured)
        ));
    }

    #[test]
    fn generation_success_enters_active() {
        let session = active_session(10);
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(session.questions().len(), 10);
        assert!(session.answers().is_empty());
    }

    #[test]
    fn generation_failure_returns_to_selection_with_nothing_kept() {
        let mut session = AssessmentSession::new();
        session
            .configure(AssessmentConfiguration::new(Grade::LowerSecondary1, None, 5, 10))
            .unwrap();
        let (attempt, _) = session.begin_generation().unwrap();
        assert_eq!(session.phase(), Phase::Generating);

        let err = session
            .complete_generation(attempt, Err(SourceError::Empty))
            .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.phase(), Phase::Selection);
        assert!(session.questions().is_empty());
        // The configuration survives so the student can retry.
        assert!(session.config().is_some());
    }

    #[test]
    fn stale_generation_result_is_discarded() {
        let mut session = AssessmentSession::new();
        session
            .configure(AssessmentConfiguration::new(Grade::LowerSecondary1, None, 2, 10))
            .unwrap();
        let (attempt, _) = session.begin_generation().unwrap();
        session.reset();

        let err = session
            .complete_generation(attempt, Ok(questions(2)))
            .unwrap_err();
        assert!(matches!(err, EngineError::StaleAttempt));
        assert_eq!(session.phase(), Phase::Selection);
        assert!(session.questions().is_empty());
    }

    #[test]
    fn answers_only_in_active_and_last_write_wins() {
        let mut session = AssessmentSession::new();
        assert!(matches!(
            session.record_answer(0, 0),
            Err(EngineError::InvalidPhase { .. })
        ));

        let mut session = active_session(3);
        assert_eq!(session.record_answer(1, 2).unwrap(), None);
        assert_eq!(session.record_answer(1, 3).unwrap(), Some(2));
        assert_eq!(session.answers().get(1), Some(3));
        assert!(matches!(
            session.record_answer(7, 0),
            Err(EngineError::UnknownQuestion(7))
        ));
        assert!(matches!(
            session.record_answer(0, 4),
            Err(EngineError::OptionOutOfRange { .. })
        ));
        assert_eq!(session.phase(), Phase::Active);
    }

    #[test]
    fn finish_freezes_answers_and_guards_second_call() {
        let mut session = active_session(3);
        session.record_answer(0, 0).unwrap();

        let frozen = session.begin_finish(FinishReason::Expired).unwrap();
        assert_eq!(frozen.answers.len(), 1);

        assert!(matches!(
            session.record_answer(1, 1),
            Err(EngineError::AlreadyFinishing)
        ));
        assert!(matches!(
            session.begin_finish(FinishReason::Manual),
            Err(EngineError::AlreadyFinishing)
        ));
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn grading_success_enters_results() {
        let mut session = active_session(2);
        let frozen = session.begin_finish(FinishReason::Expired).unwrap();
        let result = session.complete_grading(&frozen, Ok(graded(1, 2))).unwrap();
        assert_eq!(result.score, Score::new(1, 2));
        assert!(result.timed_out);
        assert_eq!(result.track, Some(Track::Science));
        assert_eq!(session.phase(), Phase::Results);
    }

    #[test]
    fn grading_failure_abandons_attempt() {
        let mut session = active_session(2);
        let frozen = session.begin_finish(FinishReason::Manual).unwrap();
        let err = session
            .complete_grading(&frozen, Err(SourceError::Transport("boom".into())))
            .unwrap_err();
        assert!(matches!(err, EngineError::Grading(_)));
        assert_eq!(session.phase(), Phase::Selection);
        assert!(session.result().is_none());
        assert!(!session.is_finishing());
    }

    #[test]
    fn persistence_warning_keeps_results() {
        let mut session = active_session(1);
        let frozen = session.begin_finish(FinishReason::Manual).unwrap();
        session.complete_grading(&frozen, Ok(graded(0, 1))).unwrap();
        session.record_persistence(PersistenceStatus::Failed("disk full".into()));

        assert_eq!(session.phase(), Phase::Results);
        assert!(session.result().is_some());
        assert!(session.persistence().unwrap().is_warning());
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = active_session(2);
        session.record_answer(0, 1).unwrap();
        session.reset();
        assert_eq!(session.phase(), Phase::Selection);
        assert!(session.config().is_none());
        assert!(session.questions().is_empty());
        assert!(session.answers().is_empty());
        assert!(session.attempt_id().is_none());
    }
}
