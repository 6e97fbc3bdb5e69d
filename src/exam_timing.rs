//! Fast offline extraction of exam timing and panic level.
//!
//! Recognises phrases like *"exam tomorrow"* or *"test in 3 hours"* and
//! grades the urgency of the message. This is a keyword heuristic; the
//! model-backed `detectPanicLevel` analysis in [`crate::analysis`] is the
//! deep version.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Hours assumed when the message names no exam time.
pub const DEFAULT_HOURS_UNTIL_EXAM: u32 = 168;

/// Panic grade used by the exam-timing heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PanicLevel {
    Low,
    Medium,
    High,
    Extreme,
}

/// Result of [`parse_exam_timing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamTiming {
    pub hours_until_exam: u32,
    pub panic_level: PanicLevel,
    pub needs_exam_panic_mode: bool,
}

/// How a matching timing rule turns into an hour count.
enum Hours {
    Fixed(u32),
    /// Capture group 1 times the factor, or the fallback when absent.
    Captured { factor: u32, fallback: u32 },
}

static TIMING_RULES: LazyLock<Vec<(Regex, Hours)>> = LazyLock::new(|| {
    let re = |p: &str| Regex::new(p).expect("timing rule pattern must compile");
    vec![
        (
            re(r"in ([0-9]+) hours?|today|in a few hours"),
            Hours::Captured {
                factor: 1,
                fallback: 4,
            },
        ),
        (re(r"tomorrow|in the morning"), Hours::Fixed(12)),
        (re(r"day after|in 2 days?"), Hours::Fixed(48)),
        (
            re(r"in ([0-9]+) days?"),
            Hours::Captured {
                factor: 24,
                fallback: 72,
            },
        ),
        (re(r"next week|this week"), Hours::Fixed(120)),
    ]
});

const EXTREME_PHRASES: &[&str] = &[
    "going to fail",
    "not ready",
    "can't do this",
    "freaking out",
    "panicking",
    "blank out",
    "meltdown",
];
const HIGH_PHRASES: &[&str] = &["stressed", "anxious", "worried", "scared", "nervous"];
const MEDIUM_PHRASES: &[&str] = &["unsure", "not confident", "need help"];

fn hours_until_exam(lower: &str) -> u32 {
    for (pattern, hours) in TIMING_RULES.iter() {
        if !pattern.is_match(lower) {
            continue;
        }
        return match hours {
            Hours::Fixed(h) => *h,
            Hours::Captured { factor, fallback } => pattern
                .captures_iter(lower)
                .find_map(|c| c.get(1))
                .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
                .map(|n| n.saturating_mul(*factor))
                .unwrap_or(*fallback),
        };
    }
    DEFAULT_HOURS_UNTIL_EXAM
}

fn panic_level(lower: &str) -> PanicLevel {
    let groups: [(&[&str], PanicLevel); 3] = [
        (EXTREME_PHRASES, PanicLevel::Extreme),
        (HIGH_PHRASES, PanicLevel::High),
        (MEDIUM_PHRASES, PanicLevel::Medium),
    ];
    groups
        .iter()
        .find(|(phrases, _)| phrases.iter().any(|p| lower.contains(p)))
        .map(|(_, level)| *level)
        .unwrap_or(PanicLevel::Low)
}

/// Extract hours until the exam and the panic level of a message.
///
/// An exam within six hours escalates the panic level by one step (low to
/// medium, anything else short of extreme to high).
pub fn parse_exam_timing(input: &str) -> ExamTiming {
    let lower = input.to_lowercase();
    let hours = hours_until_exam(&lower);
    let mut level = panic_level(&lower);

    if hours <= 6 && level != PanicLevel::Extreme {
        level = if level == PanicLevel::Low {
            PanicLevel::Medium
        } else {
            PanicLevel::High
        };
    }

    ExamTiming {
        hours_until_exam: hours,
        panic_level: level,
        needs_exam_panic_mode: matches!(level, PanicLevel::High | PanicLevel::Extreme)
            || hours <= 24,
    }
}
