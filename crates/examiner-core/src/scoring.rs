//! Deterministic scoring and reconciliation with the external grade.
//!
//! The collaborator's answer is never trusted on its own: the score is
//! recomputed from the frozen answer set and any disagreement is recorded as
//! a [`GradingDiscrepancy`].

use std::collections::{HashMap, VecDeque};

use crate::error::SourceError;
use crate::model::{
    AnswerSet, GradedFeedbackItem, GradingDiscrepancy, Question, Score, NO_ANSWER,
};
use crate::traits::GradingResponse;

/// Score and feedback for one attempt after reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct GradedAttempt {
    pub score: Score,
    pub reported_score: Score,
    pub feedback: Vec<GradedFeedbackItem>,
    pub discrepancies: Vec<GradingDiscrepancy>,
}

/// Whether the student's answer for a question is correct. Unanswered
/// questions are incorrect.
pub fn is_correct(question: &Question, answers: &AnswerSet) -> bool {
    answers.get(question.id) == Some(question.correct_answer_index)
}

/// Count correct answers over all questions.
pub fn compute_score(questions: &[Question], answers: &AnswerSet) -> Score {
    let correct = questions.iter().filter(|q| is_correct(q, answers)).count();
    Score::new(correct as u32, questions.len() as u32)
}

/// Compare the reported score with the computed one.
pub fn reconcile(reported: Score, computed: Score) -> Option<GradingDiscrepancy> {
    (reported != computed).then_some(GradingDiscrepancy::ScoreMismatch { reported, computed })
}

/// Build feedback for every incorrect or unanswered question, in question
/// order, pairing it with the grader's explanation where one was given.
///
/// Questions that share a text take the grader's explanations for that text
/// in the order the grader listed them.
pub fn build_feedback(
    questions: &[Question],
    answers: &AnswerSet,
    grader_feedback: &[GradedFeedbackItem],
) -> (Vec<GradedFeedbackItem>, Vec<GradingDiscrepancy>) {
    let mut explanations: HashMap<&str, VecDeque<&str>> = HashMap::new();
    for item in grader_feedback {
        explanations
            .entry(item.question_text.trim())
            .or_default()
            .push_back(item.explanation.trim());
    }
    let mut take = |text: &str| explanations.get_mut(text).and_then(VecDeque::pop_front);

    let mut feedback = Vec::new();
    let mut discrepancies = Vec::new();

    for question in questions {
        let text = question.text.trim();
        if is_correct(question, answers) {
            if take(text).is_some() {
                discrepancies.push(GradingDiscrepancy::UnexpectedFeedback {
                    question_text: question.text.clone(),
                });
            }
            continue;
        }

        let explanation = match take(text).filter(|e| !e.is_empty()) {
            Some(e) => e.to_string(),
            None => {
                discrepancies.push(GradingDiscrepancy::MissingExplanation {
                    question_id: question.id,
                });
                question.explanation.clone().unwrap_or_default()
            }
        };

        feedback.push(GradedFeedbackItem {
            question_text: question.text.clone(),
            your_answer: answers
                .get(question.id)
                .and_then(|i| question.option_text(i))
                .unwrap_or(NO_ANSWER)
                .to_string(),
            correct_answer: question.correct_option().to_string(),
            explanation,
        });
    }

    // Whatever is left matched no question at all.
    let mut leftovers: Vec<&str> = explanations
        .into_iter()
        .flat_map(|(text, queue)| queue.into_iter().map(move |_| text))
        .collect();
    leftovers.sort_unstable();
    discrepancies.extend(
        leftovers
            .into_iter()
            .map(|text| GradingDiscrepancy::UnexpectedFeedback {
                question_text: text.to_string(),
            }),
    );

    (feedback, discrepancies)
}

/// Validate the grader's response and reconcile it with the frozen attempt.
pub fn grade_attempt(
    questions: &[Question],
    answers: &AnswerSet,
    response: &GradingResponse,
) -> Result<GradedAttempt, SourceError> {
    let reported_score = response.reported_score(questions.len() as u32)?;
    let score = compute_score(questions, answers);
    let (feedback, mut discrepancies) = build_feedback(questions, answers, &response.feedback);
    if let Some(mismatch) = reconcile(reported_score, score) {
        discrepancies.insert(0, mismatch);
    }

    Ok(GradedAttempt {
        score,
        reported_score,
        feedback,
        discrepancies,
    })
}
