//! Error types for the assessment engine.
//!
//! External failures are translated into [`SourceError`] or [`PersistError`]
//! at the adapter boundary so the engine can classify them without looking
//! at transport details.

use thiserror::Error;

use crate::model::{Grade, QuestionId, Track};
use crate::session::Phase;

/// An invalid assessment configuration. Never reaches an external call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown grade: {0}")]
    UnknownGrade(String),

    #[error("unknown track: {0}")]
    UnknownTrack(String),

    /// The grade needs a specialization and none was chosen.
    #[error("grade {0} requires a track to be chosen")]
    TrackRequired(Grade),

    /// The track is not offered for the grade.
    #[error("track {track} is not offered for grade {grade}")]
    TrackNotOffered { grade: Grade, track: Track },

    #[error("question count must be between 1 and 50, got {0}")]
    QuestionCount(u32),

    #[error("time limit must be a positive number of minutes, got {0}")]
    TimeLimit(u32),
}

/// Failure of a question or grading collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The call itself failed (network, HTTP status, timeout, rate limit).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The response did not satisfy the contract's schema.
    #[error("response violated the {contract} schema: {detail}")]
    Schema {
        contract: &'static str,
        detail: String,
    },

    /// The collaborator returned no questions.
    #[error("the question source returned no questions")]
    Empty,
}

impl SourceError {
    pub fn schema(contract: &'static str, detail: impl Into<String>) -> Self {
        SourceError::Schema {
            contract,
            detail: detail.into(),
        }
    }
}

/// Failure to write a result to durable storage.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage backend rejected the write: {0}")]
    Backend(String),
}

/// Errors surfaced by the assessment engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Question generation failed; the engine is back in selection.
    #[error("could not prepare the assessment: {0}")]
    Generation(SourceError),

    /// Grading failed; the attempt was abandoned.
    #[error("could not grade the assessment: {0}")]
    Grading(SourceError),

    #[error("{operation} is not allowed in the {phase} phase")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("no configuration has been set")]
    NotConfigured,

    #[error("question {0} is not part of this attempt")]
    UnknownQuestion(QuestionId),

    #[error("option {option} is out of range for question {question}")]
    OptionOutOfRange { question: QuestionId, option: usize },

    /// Finishing has already begun; answers are frozen.
    #[error("the assessment is already being finished")]
    AlreadyFinishing,

    /// A collaborator result arrived for an attempt that is no longer current.
    #[error("result for a stale attempt was discarded")]
    StaleAttempt,
}

impl EngineError {
    /// Returns `true` if the student can adjust and try again from selection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Generation(_) | EngineError::Grading(_))
    }
}
