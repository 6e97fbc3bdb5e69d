//! Learner progress: the persisted record and the tracker that owns it.
//!
//! [`UserProgress`] is the single aggregate per learner. It is only ever
//! mutated through [`ProgressTracker`], which records answers, keeps the
//! daily streak, applies the two setters (exam date, mood) and writes the
//! record back to a [`ProgressStore`] after every change.
//!
//! Statistics (accuracy, weak / strong topics, mistake patterns) are pure
//! functions over a snapshot and never touch the store.
//!
//! Storage failures are logged and swallowed: the tracker keeps working in
//! memory when persistence is unavailable.

use chrono::{DateTime, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::clock::Clock;
use crate::models::{MistakeType, Mood, OptionKey, Question, Subject};
use crate::store::ProgressStore;

/// Most recent mistakes kept in [`UserProgress::recent_mistakes`].
pub const RECENT_MISTAKES_CAP: usize = 20;
/// Most recent answers kept in [`UserProgress::recent_answers`].
pub const RECENT_ANSWERS_CAP: usize = 50;
/// Attempts needed before a topic is ranked weak or strong.
pub const MIN_RANKED_ATTEMPTS: u32 = 3;
/// Topics below this accuracy are weak.
pub const WEAK_BELOW: u32 = 60;
/// Topics at or above this accuracy are strong.
pub const STRONG_FROM: u32 = 80;
/// Recent mistakes needed before a pattern is reported.
pub const MIN_MISTAKES_FOR_PATTERN: usize = 3;
/// Occurrences of the dominant type needed to call it a pattern.
pub const MIN_PATTERN_COUNT: u32 = 2;

/// Rounded percentage, half rounding up.
fn percent(correct: u32, attempted: u32) -> u32 {
    if attempted == 0 {
        return 0;
    }
    (f64::from(correct) / f64::from(attempted) * 100.0).round() as u32
}

// ============ Record types ============

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicStats {
    pub attempted: u32,
    pub correct: u32,
}

impl TopicStats {
    /// `None` until the topic has been attempted.
    pub fn accuracy(&self) -> Option<u32> {
        (self.attempted > 0).then(|| percent(self.correct, self.attempted))
    }
}

/// Whether an answer was right, and why not if it was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Correct,
    Incorrect { mistake_type: Option<MistakeType> },
}

/// One submitted answer. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AnswerRecordRepr", into = "AnswerRecordRepr")]
pub struct AnswerRecord {
    pub question_id: String,
    pub selected_answer: OptionKey,
    pub outcome: AnswerOutcome,
    /// Epoch milliseconds.
    pub timestamp: i64,
    /// Seconds.
    pub time_spent: u32,
}

impl AnswerRecord {
    pub fn is_correct(&self) -> bool {
        matches!(self.outcome, AnswerOutcome::Correct)
    }

    pub fn mistake_type(&self) -> Option<MistakeType> {
        match self.outcome {
            AnswerOutcome::Correct => None,
            AnswerOutcome::Incorrect { mistake_type } => mistake_type,
        }
    }
}

/// Flat JSON shape of [`AnswerRecord`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRecordRepr {
    question_id: String,
    selected_answer: OptionKey,
    is_correct: bool,
    timestamp: i64,
    time_spent: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mistake_type: Option<MistakeType>,
}

impl From<AnswerRecordRepr> for AnswerRecord {
    fn from(r: AnswerRecordRepr) -> Self {
        let outcome = if r.is_correct {
            AnswerOutcome::Correct
        } else {
            AnswerOutcome::Incorrect {
                mistake_type: r.mistake_type,
            }
        };
        AnswerRecord {
            question_id: r.question_id,
            selected_answer: r.selected_answer,
            outcome,
            timestamp: r.timestamp,
            time_spent: r.time_spent,
        }
    }
}

impl From<AnswerRecord> for AnswerRecordRepr {
    fn from(r: AnswerRecord) -> Self {
        let is_correct = r.is_correct();
        let mistake_type = r.mistake_type();
        AnswerRecordRepr {
            question_id: r.question_id,
            selected_answer: r.selected_answer,
            is_correct,
            timestamp: r.timestamp,
            time_spent: r.time_spent,
            mistake_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeEntry {
    pub question_id: String,
    pub mistake_type: MistakeType,
    pub topic: String,
    pub timestamp: i64,
}

/// The persisted progress aggregate.
///
/// Missing fields in stored JSON take their default, so records written by
/// older versions still load. Topics keep the order they were first
/// practiced in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProgress {
    pub total_attempted: u32,
    pub total_correct: u32,
    pub topic_stats: BTreeMap<Subject, IndexMap<String, TopicStats>>,
    pub current_streak: u32,
    #[serde(deserialize_with = "stored_date")]
    pub last_practice_date: Option<NaiveDate>,
    #[serde(deserialize_with = "stored_date")]
    pub exam_date: Option<NaiveDate>,
    pub recent_mistakes: Vec<MistakeEntry>,
    pub current_mood: Option<Mood>,
    pub recent_answers: Vec<AnswerRecord>,
}

impl Default for UserProgress {
    fn default() -> Self {
        Self {
            total_attempted: 0,
            total_correct: 0,
            topic_stats: Subject::ALL.iter().map(|s| (*s, IndexMap::new())).collect(),
            current_streak: 0,
            last_practice_date: None,
            exam_date: None,
            recent_mistakes: Vec::new(),
            current_mood: None,
            recent_answers: Vec::new(),
        }
    }
}

/// Overwrite `slot` with the stored field when it is present and well formed.
fn merge_field<T>(
    fields: &Map<String, Value>,
    name: &str,
    slot: &mut T,
    parse: impl FnOnce(Value) -> serde_json::Result<T>,
) {
    let Some(value) = fields.get(name) else {
        return;
    };
    match parse(value.clone()) {
        Ok(parsed) => *slot = parsed,
        Err(e) => tracing::warn!(field = name, error = %e, "ignoring malformed progress field"),
    }
}

/// A calendar date stored either as `YYYY-MM-DD` or as an RFC 3339
/// timestamp; a timestamp keeps the date of its own offset.
fn stored_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(date) = raw.parse::<NaiveDate>() {
        return Ok(Some(date));
    }
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| Some(ts.date_naive()))
        .map_err(serde::de::Error::custom)
}

/// A ranked topic with its accuracy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicAccuracy {
    pub subject: Subject,
    pub topic: String,
    pub accuracy: u32,
}

/// The dominant recent mistake type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakePattern {
    #[serde(rename = "type")]
    pub mistake_type: MistakeType,
    pub count: u32,
}

impl UserProgress {
    /// Parse a stored record and backfill what older records lack.
    ///
    /// Fields are merged one by one over the defaults: a field with the
    /// wrong shape is dropped (and logged) without losing the others. Only
    /// text that is not JSON at all is an error.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        let mut progress = UserProgress::default();
        let Value::Object(fields) = value else {
            tracing::warn!("stored progress is not an object, using defaults");
            return Ok(progress);
        };

        merge_field(&fields, "totalAttempted", &mut progress.total_attempted, serde_json::from_value);
        merge_field(&fields, "totalCorrect", &mut progress.total_correct, serde_json::from_value);
        merge_field(&fields, "topicStats", &mut progress.topic_stats, serde_json::from_value);
        merge_field(&fields, "currentStreak", &mut progress.current_streak, serde_json::from_value);
        merge_field(&fields, "lastPracticeDate", &mut progress.last_practice_date, stored_date);
        merge_field(&fields, "examDate", &mut progress.exam_date, stored_date);
        merge_field(&fields, "recentMistakes", &mut progress.recent_mistakes, serde_json::from_value);
        merge_field(&fields, "currentMood", &mut progress.current_mood, serde_json::from_value);
        merge_field(&fields, "recentAnswers", &mut progress.recent_answers, serde_json::from_value);

        for subject in Subject::ALL {
            progress.topic_stats.entry(subject).or_default();
        }
        progress.recent_mistakes.truncate(RECENT_MISTAKES_CAP);
        progress.recent_answers.truncate(RECENT_ANSWERS_CAP);
        Ok(progress)
    }

    /// Overall accuracy in percent; `0` before any attempt.
    pub fn accuracy(&self) -> u32 {
        percent(self.total_correct, self.total_attempted)
    }

    /// Accuracy for one topic, `None` if it was never attempted.
    pub fn topic_accuracy(&self, subject: Subject, topic: &str) -> Option<u32> {
        self.topic_stats
            .get(&subject)
            .and_then(|topics| topics.get(topic))
            .and_then(TopicStats::accuracy)
    }

    /// Whole days from `today` to the exam date; negative once it has passed.
    pub fn days_until_exam(&self, today: NaiveDate) -> Option<i64> {
        self.exam_date.map(|exam| (exam - today).num_days())
    }

    fn ranked_topics(&self, keep: impl Fn(u32) -> bool) -> Vec<TopicAccuracy> {
        let mut ranked = Vec::new();
        for (subject, topics) in &self.topic_stats {
            for (topic, stats) in topics {
                if stats.attempted < MIN_RANKED_ATTEMPTS {
                    continue;
                }
                let accuracy = percent(stats.correct, stats.attempted);
                if keep(accuracy) {
                    ranked.push(TopicAccuracy {
                        subject: *subject,
                        topic: topic.clone(),
                        accuracy,
                    });
                }
            }
        }
        ranked
    }

    /// Topics with enough attempts and accuracy below 60%, weakest first.
    pub fn weak_topics(&self) -> Vec<TopicAccuracy> {
        let mut weak = self.ranked_topics(|acc| acc < WEAK_BELOW);
        weak.sort_by_key(|t| t.accuracy);
        weak
    }

    /// Topics with enough attempts and accuracy of 80% or more, strongest first.
    pub fn strong_topics(&self) -> Vec<TopicAccuracy> {
        let mut strong = self.ranked_topics(|acc| acc >= STRONG_FROM);
        strong.sort_by(|a, b| b.accuracy.cmp(&a.accuracy));
        strong
    }

    /// Count of each mistake type among the recent mistakes.
    pub fn mistake_counts(&self) -> BTreeMap<MistakeType, u32> {
        let mut counts: BTreeMap<MistakeType, u32> =
            MistakeType::ALL.iter().map(|t| (*t, 0)).collect();
        for mistake in &self.recent_mistakes {
            *counts.entry(mistake.mistake_type).or_default() += 1;
        }
        counts
    }

    /// The dominant recent mistake type, if the evidence is strong enough.
    ///
    /// Needs at least three recent mistakes and a type seen at least twice.
    /// On a tie the type later in [`MistakeType::ALL`] wins.
    pub fn mistake_pattern(&self) -> Option<MistakePattern> {
        if self.recent_mistakes.len() < MIN_MISTAKES_FOR_PATTERN {
            return None;
        }
        let counts = self.mistake_counts();
        // max_by_key keeps the last of equal maxima
        let (mistake_type, count) = MistakeType::ALL
            .iter()
            .map(|t| (*t, counts.get(t).copied().unwrap_or(0)))
            .max_by_key(|(_, count)| *count)?;

        (count >= MIN_PATTERN_COUNT).then_some(MistakePattern {
            mistake_type,
            count,
        })
    }

    /// Seconds spent across the recent answers.
    pub fn recent_time_spent_secs(&self) -> u64 {
        self.recent_answers
            .iter()
            .map(|a| u64::from(a.time_spent))
            .sum()
    }
}

// ============ Tracker ============

/// One answer as submitted by the learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSubmission {
    pub question_id: String,
    pub subject: Subject,
    pub topic: String,
    pub selected_answer: OptionKey,
    pub correct_answer: OptionKey,
    /// Seconds.
    pub time_spent: u32,
    #[serde(default)]
    pub mistake_type: Option<MistakeType>,
}

impl AnswerSubmission {
    /// Build a submission for a question from the bank.
    pub fn for_question(
        question: &Question,
        selected_answer: OptionKey,
        time_spent: u32,
        mistake_type: Option<MistakeType>,
    ) -> Self {
        Self {
            question_id: question.id.clone(),
            subject: question.subject,
            topic: question.topic.clone(),
            selected_answer,
            correct_answer: question.correct_answer,
            time_spent,
            mistake_type,
        }
    }
}

/// Owns the [`UserProgress`] record and is its only writer.
pub struct ProgressTracker {
    progress: UserProgress,
    store: Box<dyn ProgressStore>,
    clock: Box<dyn Clock>,
    key: String,
    loaded: bool,
}

impl ProgressTracker {
    /// Create a tracker holding defaults. Nothing is persisted until
    /// [`load`](Self::load) has run.
    pub fn new(
        store: impl ProgressStore + 'static,
        clock: impl Clock + 'static,
        key: impl Into<String>,
    ) -> Self {
        Self {
            progress: UserProgress::default(),
            store: Box::new(store),
            clock: Box::new(clock),
            key: key.into(),
            loaded: false,
        }
    }

    /// Create a tracker and load the stored record.
    pub fn open(
        store: impl ProgressStore + 'static,
        clock: impl Clock + 'static,
        key: impl Into<String>,
    ) -> Self {
        let mut tracker = Self::new(store, clock, key);
        tracker.load();
        tracker
    }

    /// Replace the in-memory record with the stored one.
    ///
    /// Never fails: unreadable or malformed data leaves the defaults in
    /// place and is only logged.
    pub fn load(&mut self) {
        match self.store.get(&self.key) {
            Ok(Some(json)) => match UserProgress::from_json(&json) {
                Ok(progress) => self.progress = progress,
                Err(e) => {
                    tracing::warn!(key = %self.key, error = %e, "stored progress is malformed, using defaults");
                    self.progress = UserProgress::default();
                }
            },
            Ok(None) => {
                tracing::debug!(key = %self.key, "no stored progress, starting fresh");
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "failed to load progress");
            }
        }
        self.loaded = true;
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Current snapshot.
    pub fn progress(&self) -> &UserProgress {
        &self.progress
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    fn persist(&self) {
        if !self.loaded {
            return;
        }
        let json = match serde_json::to_string(&self.progress) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize progress");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.key, &json) {
            tracing::warn!(key = %self.key, error = %e, "failed to save progress");
        }
    }

    /// Record one answer and persist the updated record.
    pub fn record_answer(&mut self, submission: AnswerSubmission) -> AnswerRecord {
        let is_correct = submission.selected_answer == submission.correct_answer;
        let now = self.clock.now_millis();
        let today = self.clock.today();
        let p = &mut self.progress;

        let stats = p
            .topic_stats
            .entry(submission.subject)
            .or_default()
            .entry(submission.topic.clone())
            .or_default();
        stats.attempted += 1;
        if is_correct {
            stats.correct += 1;
        }

        let outcome = if is_correct {
            AnswerOutcome::Correct
        } else {
            AnswerOutcome::Incorrect {
                mistake_type: submission.mistake_type,
            }
        };
        let record = AnswerRecord {
            question_id: submission.question_id.clone(),
            selected_answer: submission.selected_answer,
            outcome,
            timestamp: now,
            time_spent: submission.time_spent,
        };

        if let Some(mistake_type) = record.mistake_type() {
            p.recent_mistakes.insert(
                0,
                MistakeEntry {
                    question_id: submission.question_id,
                    mistake_type,
                    topic: submission.topic,
                    timestamp: now,
                },
            );
            p.recent_mistakes.truncate(RECENT_MISTAKES_CAP);
        }

        p.recent_answers.insert(0, record.clone());
        p.recent_answers.truncate(RECENT_ANSWERS_CAP);

        if p.last_practice_date != Some(today) {
            let yesterday = today.pred_opt();
            p.current_streak = match p.last_practice_date {
                Some(last) if Some(last) == yesterday => p.current_streak + 1,
                _ => 1,
            };
            p.last_practice_date = Some(today);
        }

        p.total_attempted += 1;
        if is_correct {
            p.total_correct += 1;
        }

        self.persist();
        record
    }

    pub fn set_exam_date(&mut self, date: Option<NaiveDate>) {
        self.progress.exam_date = date;
        self.persist();
    }

    pub fn set_mood(&mut self, mood: Option<Mood>) {
        self.progress.current_mood = mood;
        self.persist();
    }

    /// Restore defaults and remove the stored record.
    pub fn reset(&mut self) {
        self.progress = UserProgress::default();
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(key = %self.key, error = %e, "failed to clear stored progress");
        }
    }

    pub fn accuracy(&self) -> u32 {
        self.progress.accuracy()
    }

    pub fn days_until_exam(&self) -> Option<i64> {
        self.progress.days_until_exam(self.clock.today())
    }

    pub fn topic_accuracy(&self, subject: Subject, topic: &str) -> Option<u32> {
        self.progress.topic_accuracy(subject, topic)
    }

    pub fn weak_topics(&self) -> Vec<TopicAccuracy> {
        self.progress.weak_topics()
    }

    pub fn strong_topics(&self) -> Vec<TopicAccuracy> {
        self.progress.strong_topics()
    }

    pub fn mistake_pattern(&self) -> Option<MistakePattern> {
        self.progress.mistake_pattern()
    }

    /// Everything the UI and prompt builders usually want in one value.
    pub fn summary(&self) -> ProgressSummary {
        let p = &self.progress;
        ProgressSummary {
            total_attempted: p.total_attempted,
            total_correct: p.total_correct,
            accuracy: p.accuracy(),
            current_streak: p.current_streak,
            last_practice_date: p.last_practice_date,
            exam_date: p.exam_date,
            days_until_exam: self.days_until_exam(),
            current_mood: p.current_mood,
            weak_topics: p.weak_topics(),
            strong_topics: p.strong_topics(),
            mistake_pattern: p.mistake_pattern(),
            recent_answers: p.recent_answers.len(),
        }
    }
}

/// Derived view of the progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub total_attempted: u32,
    pub total_correct: u32,
    pub accuracy: u32,
    pub current_streak: u32,
    pub last_practice_date: Option<NaiveDate>,
    pub exam_date: Option<NaiveDate>,
    pub days_until_exam: Option<i64>,
    pub current_mood: Option<Mood>,
    pub weak_topics: Vec<TopicAccuracy>,
    pub strong_topics: Vec<TopicAccuracy>,
    pub mistake_pattern: Option<MistakePattern>,
    pub recent_answers: usize,
}
