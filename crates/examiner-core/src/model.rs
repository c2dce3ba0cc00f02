//! Core data model types for examiner.
//!
//! These are the fundamental types that describe one assessment attempt:
//! its configuration, the generated questions, the student's answers, and
//! the graded result.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConfigError;

/// Every question carries exactly this many options.
pub const OPTION_COUNT: usize = 4;

/// Smallest and largest number of questions a single attempt may ask for.
pub const MIN_QUESTIONS: u32 = 1;
pub const MAX_QUESTIONS: u32 = 50;

/// Student answer text used in feedback for unanswered questions.
pub const NO_ANSWER: &str = "no answer";

/// School year of the student taking the assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grade {
    LowerSecondary1,
    LowerSecondary2,
    LowerSecondary3,
    UpperSecondary1,
    UpperSecondary2,
    UpperSecondary3,
}

impl Grade {
    pub const ALL: [Grade; 6] = [
        Grade::LowerSecondary1,
        Grade::LowerSecondary2,
        Grade::LowerSecondary3,
        Grade::UpperSecondary1,
        Grade::UpperSecondary2,
        Grade::UpperSecondary3,
    ];

    /// Tracks a student in this grade may choose from. Empty when the grade
    /// has no specialization.
    pub fn tracks(&self) -> &'static [Track] {
        match self {
            Grade::UpperSecondary2 => &[Track::Science, Track::Literary],
            Grade::UpperSecondary3 => &[Track::ScienceNatural, Track::ScienceMath, Track::Literary],
            _ => &[],
        }
    }

    /// Whether a track must be chosen before generating questions.
    pub fn requires_track(&self) -> bool {
        !self.tracks().is_empty()
    }

    /// Human-readable description used in prompts.
    pub fn describe(&self) -> &'static str {
        match self {
            Grade::LowerSecondary1 => "first year of preparatory (lower secondary) school",
            Grade::LowerSecondary2 => "second year of preparatory (lower secondary) school",
            Grade::LowerSecondary3 => "third year of preparatory (lower secondary) school",
            Grade::UpperSecondary1 => "first year of secondary school",
            Grade::UpperSecondary2 => "second year of secondary school",
            Grade::UpperSecondary3 => "third year of secondary school",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::LowerSecondary1 => write!(f, "lower-secondary-1"),
            Grade::LowerSecondary2 => write!(f, "lower-secondary-2"),
            Grade::LowerSecondary3 => write!(f, "lower-secondary-3"),
            Grade::UpperSecondary1 => write!(f, "upper-secondary-1"),
            Grade::UpperSecondary2 => write!(f, "upper-secondary-2"),
            Grade::UpperSecondary3 => write!(f, "upper-secondary-3"),
        }
    }
}

impl FromStr for Grade {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .iter()
            .copied()
            .find(|g| g.to_string() == s.trim().to_lowercase())
            .ok_or_else(|| ConfigError::UnknownGrade(s.to_string()))
    }
}

/// Upper-secondary subject focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Track {
    Science,
    ScienceNatural,
    ScienceMath,
    Literary,
}

impl Track {
    pub fn describe(&self) -> &'static str {
        match self {
            Track::Science => "the science track",
            Track::ScienceNatural => "the science track, natural sciences branch",
            Track::ScienceMath => "the science track, mathematics branch",
            Track::Literary => "the literary track",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Track::Science => write!(f, "science"),
            Track::ScienceNatural => write!(f, "science-natural"),
            Track::ScienceMath => write!(f, "science-math"),
            Track::Literary => write!(f, "literary"),
        }
    }
}

impl FromStr for Track {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "science" => Ok(Track::Science),
            "science-natural" => Ok(Track::ScienceNatural),
            "science-math" => Ok(Track::ScienceMath),
            "literary" => Ok(Track::Literary),
            other => Err(ConfigError::UnknownTrack(other.to_string())),
        }
    }
}

/// The fixed duration choices offered to students.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationPreset {
    Short,
    Medium,
    Long,
}

impl DurationPreset {
    pub const ALL: [DurationPreset; 3] =
        [DurationPreset::Short, DurationPreset::Medium, DurationPreset::Long];

    pub fn minutes(&self) -> u32 {
        match self {
            DurationPreset::Short => 15,
            DurationPreset::Medium => 30,
            DurationPreset::Long => 45,
        }
    }

    pub fn question_count(&self) -> u32 {
        match self {
            DurationPreset::Short => 10,
            DurationPreset::Medium => 15,
            DurationPreset::Long => 22,
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        DurationPreset::ALL.into_iter().find(|p| p.minutes() == minutes)
    }
}

/// Parameters chosen before generation. Validated by [`AssessmentConfiguration::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentConfiguration {
    pub grade: Grade,
    #[serde(default)]
    pub track: Option<Track>,
    pub question_count: u32,
    pub time_limit_minutes: u32,
}

impl AssessmentConfiguration {
    pub fn new(grade: Grade, track: Option<Track>, question_count: u32, time_limit_minutes: u32) -> Self {
        Self {
            grade,
            track,
            question_count,
            time_limit_minutes,
        }
    }

    pub fn from_preset(grade: Grade, track: Option<Track>, preset: DurationPreset) -> Self {
        Self::new(grade, track, preset.question_count(), preset.minutes())
    }

    /// Check the parameter combination without touching any external service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match (self.grade.requires_track(), self.track) {
            (true, None) => return Err(ConfigError::TrackRequired(self.grade)),
            (true, Some(track)) if !self.grade.tracks().contains(&track) => {
                return Err(ConfigError::TrackNotOffered {
                    grade: self.grade,
                    track,
                })
            }
            (false, Some(track)) => {
                return Err(ConfigError::TrackNotOffered {
                    grade: self.grade,
                    track,
                })
            }
            _ => {}
        }

        if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&self.question_count) {
            return Err(ConfigError::QuestionCount(self.question_count));
        }
        if self.time_limit_minutes == 0 {
            return Err(ConfigError::TimeLimit(self.time_limit_minutes));
        }
        Ok(())
    }

    /// Countdown length in seconds.
    pub fn time_limit_secs(&self) -> u64 {
        u64::from(self.time_limit_minutes) * 60
    }
}

/// Per-attempt question identity. Only unique within one attempt.
pub type QuestionId = u32;

/// A multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Question {
    pub fn correct_option(&self) -> &str {
        self.options
            .get(self.correct_answer_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn option_text(&self, index: usize) -> Option<&str> {
        self.options.get(index).map(String::as_str)
    }
}

/// Mapping from question id to the chosen option index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    answers: BTreeMap<QuestionId, usize>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an answer, replacing any previous one for the same question.
    pub fn record(&mut self, question: QuestionId, option: usize) -> Option<usize> {
        self.answers.insert(question, option)
    }

    pub fn get(&self, question: QuestionId) -> Option<usize> {
        self.answers.get(&question).copied()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, usize)> + '_ {
        self.answers.iter().map(|(q, o)| (*q, *o))
    }
}

impl FromIterator<(QuestionId, usize)> for AnswerSet {
    fn from_iter<T: IntoIterator<Item = (QuestionId, usize)>>(iter: T) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}

/// Feedback for one incorrect or unanswered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedFeedbackItem {
    pub question_text: String,
    pub your_answer: String,
    pub correct_answer: String,
    pub explanation: String,
}

/// Number of correct answers over the number of questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub correct: u32,
    pub total: u32,
}

impl Score {
    pub fn new(correct: u32, total: u32) -> Self {
        Self { correct, total }
    }

    /// Score as a fraction in `[0, 1]`. An empty attempt scores zero.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.total)
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.correct, self.total)
    }
}

impl FromStr for Score {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (correct, total) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("score '{s}' is not of the form X/Y"))?;
        let correct = correct
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid correct count in score '{s}'"))?;
        let total = total
            .trim()
            .parse::<u32>()
            .map_err(|_| format!("invalid total in score '{s}'"))?;
        if correct > total {
            return Err(format!("score '{s}' has more correct answers than questions"));
        }
        Ok(Score { correct, total })
    }
}

/// A disagreement between the external grade and the locally computed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradingDiscrepancy {
    /// The reported score differs from the independently computed score.
    ScoreMismatch { reported: Score, computed: Score },
    /// No explanation was returned for an incorrect question.
    MissingExplanation { question_id: QuestionId },
    /// Feedback was returned for a question the student got right, or for
    /// text that matches no question.
    UnexpectedFeedback { question_text: String },
}

/// The graded outcome of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub attempt_id: Uuid,
    /// The independently computed score.
    pub score: Score,
    /// The score string the grading collaborator returned.
    pub reported_score: Score,
    pub duration_seconds: u64,
    pub track: Option<Track>,
    pub feedback: Vec<GradedFeedbackItem>,
    #[serde(default)]
    pub discrepancies: Vec<GradingDiscrepancy>,
    /// Whether grading was forced by the countdown.
    pub timed_out: bool,
}

impl AssessmentResult {
    pub fn is_flagged(&self) -> bool {
        !self.discrepancies.is_empty()
    }

    /// Build the record written by a result persister.
    pub fn to_record(&self, student_id: &str) -> ResultRecord {
        ResultRecord {
            id: self.attempt_id,
            student_id: student_id.to_string(),
            score: self.score.to_string(),
            duration_seconds: self.duration_seconds,
            track: self.track,
            feedback: self.feedback.clone(),
            created_at: Utc::now(),
        }
    }
}

/// One stored attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: Uuid,
    pub student_id: String,
    pub score: String,
    pub duration_seconds: u64,
    #[serde(default)]
    pub track: Option<Track>,
    pub feedback: Vec<GradedFeedbackItem>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of writing the result to durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceStatus {
    Stored,
    Failed(String),
}

impl PersistenceStatus {
    pub fn is_warning(&self) -> bool {
        matches!(self, PersistenceStatus::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_display_and_parse() {
        assert_eq!(Grade::UpperSecondary2.to_string(), "upper-secondary-2");
        assert_eq!(
            "upper-secondary-2".parse::<Grade>().unwrap(),
            Grade::UpperSecondary2
        );
        assert_eq!(
            "Lower-Secondary-1".parse::<Grade>().unwrap(),
            Grade::LowerSecondary1
        );
        assert!("kindergarten".parse::<Grade>().is_err());
    }

    #[test]
    fn track_parse() {
        assert_eq!("science".parse::<Track>().unwrap(), Track::Science);
        assert_eq!("science-math".parse::<Track>().unwrap(), Track::ScienceMath);
        assert!("arts".parse::<Track>().is_err());
    }

    #[test]
    fn upper_grades_require_track() {
        let config = AssessmentConfiguration::new(Grade::UpperSecondary3, None, 10, 15);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TrackRequired(Grade::UpperSecondary3))
        ));

        let config =
            AssessmentConfiguration::new(Grade::UpperSecondary2, Some(Track::Science), 10, 15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn track_must_belong_to_grade() {
        let config =
            AssessmentConfiguration::new(Grade::UpperSecondary2, Some(Track::ScienceMath), 10, 15);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TrackNotOffered { .. })
        ));

        let config =
            AssessmentConfiguration::new(Grade::LowerSecondary1, Some(Track::Literary), 10, 15);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TrackNotOffered { .. })
        ));
    }

    #[test]
    fn question_count_and_time_limit_bounds() {
        let zero = AssessmentConfiguration::new(Grade::LowerSecondary2, None, 0, 15);
        assert!(matches!(zero.validate(), Err(ConfigError::QuestionCount(0))));

        let too_many = AssessmentConfiguration::new(Grade::LowerSecondary2, None, 51, 15);
        assert!(matches!(
            too_many.validate(),
            Err(ConfigError::QuestionCount(51))
        ));

        let no_time = AssessmentConfiguration::new(Grade::LowerSecondary2, None, 10, 0);
        assert!(matches!(no_time.validate(), Err(ConfigError::TimeLimit(0))));

        let max = AssessmentConfiguration::new(Grade::LowerSecondary2, None, 50, 1);
        assert!(max.validate().is_ok());
        assert_eq!(max.time_limit_secs(), 60);
    }

    #[test]
    fn presets_match_portal_choices() {
        let config = AssessmentConfiguration::from_preset(
            Grade::UpperSecondary1,
            None,
            DurationPreset::Long,
        );
        assert_eq!(config.question_count, 22);
        assert_eq!(config.time_limit_minutes, 45);
        assert_eq!(DurationPreset::from_minutes(30), Some(DurationPreset::Medium));
        assert_eq!(DurationPreset::from_minutes(20), None);
    }

    #[test]
    fn score_display_and_parse() {
        let score = Score::new(7, 10);
        assert_eq!(score.to_string(), "7/10");
        assert_eq!(" 7 / 10 ".parse::<Score>().unwrap(), score);
        assert!("7 of 10".parse::<Score>().is_err());
        assert!("11/10".parse::<Score>().is_err());
        assert!((score.fraction() - 0.7).abs() < f64::EPSILON);
        assert_eq!(Score::new(0, 0).fraction(), 0.0);
    }

    #[test]
    fn answer_set_last_write_wins() {
        let mut answers = AnswerSet::new();
        assert_eq!(answers.record(3, 1), None);
        assert_eq!(answers.record(3, 2), Some(1));
        assert_eq!(answers.get(3), Some(2));
        assert_eq!(answers.len(), 1);
    }

    #[test]
    fn result_record_carries_score_string() {
        let result = AssessmentResult {
            attempt_id: Uuid::nil(),
            score: Score::new(8, 10),
            reported_score: Score::new(8, 10),
            duration_seconds: 420,
            track: Some(Track::Literary),
            feedback: vec![],
            discrepancies: vec![],
            timed_out: false,
        };
        let record = result.to_record("GC-24015");
        assert_eq!(record.score, "8/10");
        assert_eq!(record.student_id, "GC-24015");
        assert_eq!(record.track, Some(Track::Literary));
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["track"], "literary");
    }
}
