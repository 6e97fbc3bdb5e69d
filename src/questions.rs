//! The static practice question bank.
//!
//! Questions ship inside the binary (`data/questions.json`) and are parsed
//! once on first use. Lookups never mutate the bank; [`get_questions`]
//! returns owned copies in shuffled order.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::models::{Difficulty, Question, Subject};

static BANK_JSON: &str = include_str!("../data/questions.json");

static BANK: LazyLock<Vec<Question>> = LazyLock::new(|| {
    serde_json::from_str(BANK_JSON).expect("embedded question bank must be valid JSON")
});

/// Every question in bank order.
pub fn all_questions() -> &'static [Question] {
    &BANK
}

/// Criteria for [`get_questions`]. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuestionFilter {
    pub subject: Option<Subject>,
    /// Case-insensitive substring of the topic name.
    pub topic: Option<String>,
    pub difficulty: Option<Difficulty>,
    /// Maximum number of questions; `None` or `0` returns all matches.
    pub limit: Option<usize>,
    pub exclude_ids: Vec<String>,
}

impl QuestionFilter {
    fn matches(&self, q: &Question) -> bool {
        if self.subject.is_some_and(|s| s != q.subject) {
            return false;
        }
        if let Some(topic) = &self.topic {
            if !q.topic.to_lowercase().contains(&topic.to_lowercase()) {
                return false;
            }
        }
        if self.difficulty.is_some_and(|d| d != q.difficulty) {
            return false;
        }
        !self.exclude_ids.iter().any(|id| id == &q.id)
    }
}

/// Matching questions in random order, truncated to the filter's limit.
pub fn get_questions<R: Rng + ?Sized>(filter: &QuestionFilter, rng: &mut R) -> Vec<Question> {
    let mut found: Vec<Question> = BANK.iter().filter(|q| filter.matches(q)).cloned().collect();
    found.shuffle(rng);
    if let Some(limit) = filter.limit.filter(|n| *n > 0) {
        found.truncate(limit);
    }
    tracing::debug!(count = found.len(), "selected questions");
    found
}

pub fn get_question_by_id(id: &str) -> Option<&'static Question> {
    BANK.iter().find(|q| q.id == id)
}

/// Distinct topics of a subject in bank order.
pub fn topics_for_subject(subject: Subject) -> Vec<&'static str> {
    let mut topics: Vec<&'static str> = Vec::new();
    for q in BANK.iter().filter(|q| q.subject == subject) {
        if !topics.contains(&q.topic.as_str()) {
            topics.push(&q.topic);
        }
    }
    topics
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    pub total: usize,
    pub by_subject: BTreeMap<Subject, usize>,
    pub by_difficulty: BTreeMap<u8, usize>,
}

/// Question counts overall, per subject and per difficulty.
pub fn question_stats() -> QuestionStats {
    let mut by_subject: BTreeMap<Subject, usize> = Subject::ALL.iter().map(|s| (*s, 0)).collect();
    let mut by_difficulty: BTreeMap<u8, usize> = (1..=3).map(|d| (d, 0)).collect();
    for q in BANK.iter() {
        *by_subject.entry(q.subject).or_default() += 1;
        *by_difficulty.entry(q.difficulty.level()).or_default() += 1;
    }
    QuestionStats {
        total: BANK.len(),
        by_subject,
        by_difficulty,
    }
}
