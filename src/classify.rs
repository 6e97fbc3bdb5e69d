//! Heuristic classification of free-text utterances.
//!
//! Turns something like *"I have 10 minutes, stressed about calculus"* into a
//! [`ClassificationResult`]: a time budget, a stress level and the subject /
//! topic preferences mentioned.
//!
//! Every heuristic is an ordered rule table of `(pattern, result)` pairs,
//! compiled once and evaluated first-match-wins. Tables are plain data so
//! each rule can be tested on its own and extended without touching the
//! evaluation code.
//!
//! All functions are pure and total: any input (including the empty string)
//! produces a fully populated result.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::models::Subject;

/// Coarse bucket for how long a practice session can be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeBudget {
    Quick,
    Standard,
    Deep,
}

/// Coarse bucket for detected affect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StressLevel {
    None,
    Low,
    Medium,
    High,
}

impl StressLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::None => "none",
            StressLevel::Low => "low",
            StressLevel::Medium => "medium",
            StressLevel::High => "high",
        }
    }
}

/// Time budget plus the exact minute count when one was stated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEstimate {
    pub budget: TimeBudget,
    pub minutes: Option<u32>,
}

impl TimeEstimate {
    const fn fixed(budget: TimeBudget, minutes: Option<u32>) -> Self {
        Self { budget, minutes }
    }

    fn from_minutes(minutes: u32) -> Self {
        Self {
            budget: categorize_duration(minutes),
            minutes: Some(minutes),
        }
    }
}

/// Subject and topics mentioned in an utterance.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TopicPreferences {
    pub subject: Option<Subject>,
    pub topics: Vec<String>,
}

/// Structured intent extracted from one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub time: TimeEstimate,
    pub stress: StressLevel,
    pub preferences: TopicPreferences,
}

// ============ Rule tables ============

/// A single time rule. The first two capture a number from the input.
enum TimeRule {
    Minutes(Regex),
    Hours(Regex),
    Fixed(Regex, TimeEstimate),
}

impl TimeRule {
    fn apply(&self, input: &str) -> Option<TimeEstimate> {
        match self {
            TimeRule::Minutes(re) => {
                let caps = re.captures(input)?;
                // the capture is ASCII digits only, so a parse failure is overflow
                let minutes = caps[1].parse::<u32>().unwrap_or(u32::MAX);
                Some(TimeEstimate::from_minutes(minutes))
            }
            TimeRule::Hours(re) => {
                let caps = re.captures(input)?;
                let hours = caps[1].parse::<f64>().ok()?;
                // `as` saturates, so absurd hour counts land in the deep bucket
                let minutes = (hours * 60.0).round() as u32;
                Some(TimeEstimate::from_minutes(minutes))
            }
            TimeRule::Fixed(re, estimate) => re.is_match(input).then_some(*estimate),
        }
    }
}

fn rule(pattern: &str) -> Regex {
    Regex::new(pattern).expect("classifier rule pattern must compile")
}

static TIME_RULES: LazyLock<Vec<TimeRule>> = LazyLock::new(|| {
    use TimeBudget::*;
    vec![
        TimeRule::Minutes(rule(r"(?i)([0-9]+)\s*(?:minutes?|mins?|m\b)")),
        TimeRule::Hours(rule(r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(?:hours?|hrs?|h\b)")),
        TimeRule::Fixed(
            rule(r"(?i)half\s*(?:an?\s*)?hour"),
            TimeEstimate::fixed(Standard, Some(30)),
        ),
        TimeRule::Fixed(
            rule(r"(?i)quarter\s*(?:of\s*an?\s*)?hour"),
            TimeEstimate::fixed(Quick, Some(15)),
        ),
        TimeRule::Fixed(
            rule(r"(?i)\b(quick|fast|rapid|brief|short|few minutes|couple minutes|5 min)\b"),
            TimeEstimate::fixed(Quick, None),
        ),
        TimeRule::Fixed(
            rule(r"(?i)\b(long|hour|lots of time|plenty of time|deep|thorough)\b"),
            TimeEstimate::fixed(Deep, None),
        ),
        TimeRule::Fixed(
            rule(r"(?i)\b(some time|a while|bit of time|30 min|half hour)\b"),
            TimeEstimate::fixed(Standard, None),
        ),
    ]
});

/// Stress groups in priority order: the first group with any hit wins.
static STRESS_RULES: LazyLock<Vec<(StressLevel, Vec<Regex>)>> = LazyLock::new(|| {
    vec![
        (
            StressLevel::High,
            vec![
                rule(r"(?i)\b(can'?t do this|giving up|give up|hopeless|impossible|failing|failed)\b"),
                rule(r"(?i)\b(hate this|too hard|way too|overwhelmed|drowning|panic|panicking)\b"),
                rule(r"(?i)\b(never going to|will never|no hope|lost cause)\b"),
                rule(r"(?i)\b(crying|freaking out|breaking down|meltdown)\b"),
            ],
        ),
        (
            StressLevel::Medium,
            vec![
                rule(r"(?i)\b(struggling|confused|frustrated|stuck|difficult|hard time)\b"),
                rule(r"(?i)\b(don'?t understand|doesn'?t make sense|lost|anxious|worried)\b"),
                rule(r"(?i)\b(stressed|stress|nervous|scared|afraid)\b"),
                rule(r"(?i)\b(help me|need help|so confused)\b"),
            ],
        ),
        (
            StressLevel::Low,
            vec![
                rule(r"(?i)\b(tired|exhausted|bored|sleepy|unmotivated|meh)\b"),
                rule(r"(?i)\b(not feeling it|don'?t feel like|low energy)\b"),
                rule(r"(?i)\b(blah|ugh|sigh)\b"),
            ],
        ),
    ]
});

/// Subject families, tested in order; mutually exclusive by construction.
static SUBJECT_RULES: LazyLock<Vec<(Regex, Subject)>> = LazyLock::new(|| {
    vec![
        (
            rule(r"(?i)\b(physics|phys|mechanics|waves|optics|thermodynamics|electr)"),
            Subject::Physics,
        ),
        (
            rule(r"(?i)\b(chemistry|chem|organic|inorganic|reactions|molecules)"),
            Subject::Chemistry,
        ),
        (
            rule(r"(?i)\b(math|maths|mathematics|calculus|algebra|geometry|trigonometry)"),
            Subject::Math,
        ),
    ]
});

/// Topic groups, each tested independently; matches keep scan order.
static TOPIC_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        // physics
        (
            rule(r"(?i)\b(mechanics|motion|force|newton|velocity|acceleration)"),
            "Mechanics",
        ),
        (rule(r"(?i)\b(waves|sound|light|oscillation)"), "Waves"),
        (rule(r"(?i)\b(thermo|heat|temperature|entropy)"), "Thermodynamics"),
        (rule(r"(?i)\b(electr|current|voltage|circuit|magnetic)"), "Electricity"),
        // chemistry
        (
            rule(r"(?i)\b(organic|carbon|hydrocarbon|alcohol|aldehyde)"),
            "Organic Chemistry",
        ),
        (rule(r"(?i)\b(inorganic|metal|periodic|element)"), "Inorganic Chemistry"),
        (
            rule(r"(?i)\b(physical chemistry|equilibrium|kinetics|rate)"),
            "Physical Chemistry",
        ),
        // math
        (
            rule(r"(?i)\b(calculus|derivative|integral|differentiat|integrat)"),
            "Calculus",
        ),
        (rule(r"(?i)\b(algebra|equation|polynomial|quadratic)"), "Algebra"),
        (rule(r"(?i)\b(geometry|triangle|circle|angle|coordinate)"), "Geometry"),
        (rule(r"(?i)\b(trigonometry|trig|sin|cos|tan)"), "Trigonometry"),
    ]
});

// ============ Classifier operations ============

/// Bucket an exact minute count: `≤15` quick, `≤45` standard, otherwise deep.
pub fn categorize_duration(minutes: u32) -> TimeBudget {
    if minutes <= 15 {
        TimeBudget::Quick
    } else if minutes <= 45 {
        TimeBudget::Standard
    } else {
        TimeBudget::Deep
    }
}

/// Extract the time budget from an utterance.
///
/// Exact minute and hour counts win over phrases, phrases win over keyword
/// sets; with no match the budget is `standard` with no minute count.
pub fn parse_time(input: &str) -> TimeEstimate {
    let normalized = input.trim().to_lowercase();
    TIME_RULES
        .iter()
        .find_map(|r| r.apply(&normalized))
        .unwrap_or(TimeEstimate::fixed(TimeBudget::Standard, None))
}

/// Detect the stress level of an utterance.
pub fn detect_stress(input: &str) -> StressLevel {
    let normalized = input.to_lowercase();
    STRESS_RULES
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| p.is_match(&normalized)))
        .map(|(level, _)| *level)
        .unwrap_or(StressLevel::None)
}

/// Extract the subject (first matching family) and all matching topics.
///
/// Topics are not deduplicated and keep the fixed scan order.
pub fn extract_topic_preferences(input: &str) -> TopicPreferences {
    let normalized = input.to_lowercase();

    let subject = SUBJECT_RULES
        .iter()
        .find(|(re, _)| re.is_match(&normalized))
        .map(|(_, subject)| *subject);

    let topics = TOPIC_RULES
        .iter()
        .filter(|(re, _)| re.is_match(&normalized))
        .map(|(_, label)| label.to_string())
        .collect();

    TopicPreferences { subject, topics }
}

/// Run all three classifiers over one utterance.
pub fn analyze_user_input(input: &str) -> ClassificationResult {
    let result = ClassificationResult {
        time: parse_time(input),
        stress: detect_stress(input),
        preferences: extract_topic_preferences(input),
    };
    tracing::debug!(?result, "classified utterance");
    result
}
