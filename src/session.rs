//! Session planning: turns a classification plus progress facts into the
//! context a practice session starts from.

use serde::{Deserialize, Serialize};

use crate::classify::{ClassificationResult, StressLevel, TimeBudget};
use crate::models::{Difficulty, Mood};
use crate::progress::TopicAccuracy;

/// Exams this many days out or fewer switch to exam preparation.
pub const EXAM_PREP_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PracticeMode {
    Quickfire,
    Standard,
    Deep,
    Calm,
    ExamPrep,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub time_budget: TimeBudget,
    pub time_minutes: Option<u32>,
    pub stress_level: StressLevel,
    pub practice_mode: PracticeMode,
    pub days_until_exam: Option<i64>,
    pub current_mood: Option<Mood>,
    pub suggested_difficulty: Difficulty,
    pub suggested_topics: Vec<String>,
}

fn practice_mode(
    budget: TimeBudget,
    stress: StressLevel,
    days_until_exam: Option<i64>,
) -> PracticeMode {
    if matches!(stress, StressLevel::High | StressLevel::Medium) {
        return PracticeMode::Calm;
    }
    if days_until_exam.is_some_and(|d| (0..=EXAM_PREP_WINDOW_DAYS).contains(&d)) {
        return PracticeMode::ExamPrep;
    }
    match budget {
        TimeBudget::Quick => PracticeMode::Quickfire,
        TimeBudget::Standard => PracticeMode::Standard,
        TimeBudget::Deep => PracticeMode::Deep,
    }
}

fn suggested_difficulty(mode: PracticeMode, mood: Option<Mood>) -> Difficulty {
    if mood.is_some_and(|m| m.value() <= 2) {
        return Difficulty::EASY;
    }
    match mode {
        PracticeMode::Calm | PracticeMode::Quickfire => Difficulty::EASY,
        PracticeMode::Deep => Difficulty::HARD,
        PracticeMode::Standard | PracticeMode::ExamPrep => Difficulty::MEDIUM,
    }
}

/// Build the starting context for a practice session.
///
/// Stress wins over everything else: a stressed learner gets calm mode and
/// easy questions whatever their time budget. `weak_topics` is expected
/// weakest first and is only used when the message named no topics.
pub fn plan_session(
    classification: &ClassificationResult,
    days_until_exam: Option<i64>,
    mood: Option<Mood>,
    weak_topics: &[TopicAccuracy],
) -> SessionContext {
    let mode = practice_mode(
        classification.time.budget,
        classification.stress,
        days_until_exam,
    );

    let suggested_topics = if classification.preferences.topics.is_empty() {
        weak_topics.iter().map(|t| t.topic.clone()).collect()
    } else {
        classification.preferences.topics.clone()
    };

    SessionContext {
        time_budget: classification.time.budget,
        time_minutes: classification.time.minutes,
        stress_level: classification.stress,
        practice_mode: mode,
        days_until_exam,
        current_mood: mood,
        suggested_difficulty: suggested_difficulty(mode, mood),
        suggested_topics,
    }
}
