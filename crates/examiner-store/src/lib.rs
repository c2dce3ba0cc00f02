//! examiner-store — Result persisters.
//!
//! Each store implements `ResultPersister` and writes one record per
//! finished attempt. Records are never updated or deleted.

pub mod jsonl;
pub mod memory;
pub mod rest;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use rest::RestStore;

#[cfg(test)]
pub(crate) fn sample_record(student_id: &str, score: &str) -> examiner_core::model::ResultRecord {
    use examiner_core::model::{GradedFeedbackItem, ResultRecord, Track};

    ResultRecord {
        id: uuid::Uuid::new_v4(),
        student_id: student_id.to_string(),
        score: score.to_string(),
        duration_seconds: 754,
        track: Some(Track::Literary),
        feedback: vec![GradedFeedbackItem {
            question_text: "Who wrote Al-Ayyam?".into(),
            your_answer: "no answer".into(),
            correct_answer: "Taha Hussein".into(),
            explanation: "Al-Ayyam is Taha Hussein's autobiography.".into(),
        }],
        created_at: chrono::Utc::now(),
    }
}
