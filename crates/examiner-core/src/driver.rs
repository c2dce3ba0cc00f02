//! Runs one attempt end to end.
//!
//! [`run_attempt`] is the single logical actor for an attempt: it starts
//! generation, then multiplexes student input and countdown events until
//! the attempt is finished by the student, by expiry, or by the input
//! stream closing.

use tokio::sync::mpsc;

use crate::countdown::CountdownEvent;
use crate::engine::AssessmentEngine;
use crate::error::EngineError;
use crate::model::{
    AssessmentConfiguration, AssessmentResult, PersistenceStatus, Question, QuestionId,
};
use crate::session::FinishReason;

/// Input from the student while the attempt is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentInput {
    Answer { question: QuestionId, option: usize },
    Finish,
}

/// Progress reporting trait.
pub trait AttemptObserver: Send + Sync {
    fn on_generating(&self, config: &AssessmentConfiguration);
    fn on_questions_ready(&self, questions: &[Question], time_limit_secs: u64);
    fn on_answer_recorded(&self, question: QuestionId, option: usize, answered: usize, total: usize);
    fn on_input_rejected(&self, error: &EngineError);
    fn on_tick(&self, remaining_secs: u64);
    fn on_grading(&self, reason: FinishReason, answered: usize, total: usize);
    fn on_result(&self, result: &AssessmentResult, persistence: Option<&PersistenceStatus>);
    fn on_failed(&self, error: &EngineError);
}

/// No-op observer.
pub struct NoopObserver;

impl AttemptObserver for NoopObserver {
    fn on_generating(&self, _: &AssessmentConfiguration) {}
    fn on_questions_ready(&self, _: &[Question], _: u64) {}
    fn on_answer_recorded(&self, _: QuestionId, _: usize, _: usize, _: usize) {}
    fn on_input_rejected(&self, _: &EngineError) {}
    fn on_tick(&self, _: u64) {}
    fn on_grading(&self, _: FinishReason, _: usize, _: usize) {}
    fn on_result(&self, _: &AssessmentResult, _: Option<&PersistenceStatus>) {}
    fn on_failed(&self, _: &EngineError) {}
}

enum Step {
    Countdown(CountdownEvent),
    Input(Option<StudentInput>),
}

/// Run a configured engine through one attempt.
///
/// Generation and grading failures are reported to the observer and
/// returned; the engine is then back in `Selection`.
pub async fn run_attempt(
    engine: &mut AssessmentEngine,
    inputs: &mut mpsc::Receiver<StudentInput>,
    observer: &dyn AttemptObserver,
) -> Result<AssessmentResult, EngineError> {
    let config = engine
        .session()
        .config()
        .cloned()
        .ok_or(EngineError::NotConfigured)?;
    observer.on_generating(&config);

    if let Err(e) = engine.start_generation().await {
        observer.on_failed(&e);
        return Err(e);
    }
    observer.on_questions_ready(engine.session().questions(), config.time_limit_secs());

    let reason = loop {
        let step = tokio::select! {
            event = engine.next_countdown_event() => Step::Countdown(event),
            input = inputs.recv() => Step::Input(input),
        };

        match step {
            Step::Countdown(CountdownEvent::Tick(remaining)) => observer.on_tick(remaining),
            Step::Countdown(CountdownEvent::Expired) => break FinishReason::Expired,
            Step::Input(Some(StudentInput::Answer { question, option })) => {
                match engine.record_answer(question, option) {
                    Ok(()) => observer.on_answer_recorded(
                        question,
                        option,
                        engine.session().answers().len(),
                        engine.session().questions().len(),
                    ),
                    Err(e) => observer.on_input_rejected(&e),
                }
            }
            Step::Input(Some(StudentInput::Finish)) => break FinishReason::Manual,
            Step::Input(None) => {
                tracing::info!("input closed, finishing attempt");
                break FinishReason::Manual;
            }
        }
    };

    observer.on_grading(
        reason,
        engine.session().answers().len(),
        engine.session().questions().len(),
    );
    match engine.finish_with(reason).await {
        Ok(result) => {
            observer.on_result(&result, engine.session().persistence());
            Ok(result)
        }
        Err(e) => {
            observer.on_failed(&e);
            Err(e)
        }
    }
}
