//! Human-readable progress overview.
//!
//! Prints totals, streak, exam countdown and the weak / strong topic
//! rankings. Used by `adaptiq stats`; the JSON form of the same data is the
//! `get_progress` tool.

use anyhow::Result;
use chrono::NaiveDate;
use std::fmt::Write;

use crate::clock::SystemClock;
use crate::config::Config;
use crate::progress::{ProgressTracker, TopicAccuracy};
use crate::store::FileStore;

/// Run the stats command: load the stored progress and print a summary.
pub fn run_stats(config: &Config) -> Result<()> {
    let tracker = ProgressTracker::open(
        FileStore::new(&config.storage.dir),
        SystemClock,
        config.storage.key.clone(),
    );
    print!("{}", render_stats(&tracker));
    Ok(())
}

pub fn render_stats(tracker: &ProgressTracker) -> String {
    let s = tracker.summary();
    let today = tracker.today();
    let mut out = String::new();

    let _ = writeln!(out, "AdaptIQ — Progress");
    let _ = writeln!(out, "==================");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  Answered:    {} ({} correct, {}%)",
        s.total_attempted, s.total_correct, s.accuracy
    );
    let _ = writeln!(
        out,
        "  Streak:      {} day{}",
        s.current_streak,
        if s.current_streak == 1 { "" } else { "s" }
    );
    let _ = writeln!(
        out,
        "  Last studied: {}",
        s.last_practice_date
            .map(|d| format_day_relative(d, today))
            .unwrap_or_else(|| "never".to_string())
    );
    let _ = writeln!(
        out,
        "  Exam:        {}",
        match (s.exam_date, s.days_until_exam) {
            (Some(date), Some(days)) => format!("{} ({})", date, format_countdown(days)),
            _ => "not set".to_string(),
        }
    );
    if let Some(mood) = s.current_mood {
        let _ = writeln!(out, "  Mood:        {}/5", mood.value());
    }
    if let Some(pattern) = s.mistake_pattern {
        let _ = writeln!(
            out,
            "  Pattern:     mostly {} mistakes ({} recent)",
            pattern.mistake_type, pattern.count
        );
    }

    write_topics(&mut out, "Needs work", &s.weak_topics);
    write_topics(&mut out, "Strong", &s.strong_topics);

    let _ = writeln!(out);
    out
}

fn write_topics(out: &mut String, title: &str, topics: &[TopicAccuracy]) {
    if topics.is_empty() {
        return;
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}:", title);
    let _ = writeln!(out, "  {:<24} {:<10} {:>8}", "TOPIC", "SUBJECT", "ACCURACY");
    let _ = writeln!(out, "  {}", "-".repeat(44));
    for t in topics {
        let _ = writeln!(out, "  {:<24} {:<10} {:>7}%", t.topic, t.subject.as_str(), t.accuracy);
    }
}

fn format_day_relative(date: NaiveDate, today: NaiveDate) -> String {
    match (today - date).num_days() {
        0 => "today".to_string(),
        1 => "yesterday".to_string(),
        n if n > 1 => format!("{} days ago", n),
        _ => date.to_string(),
    }
}

fn format_countdown(days: i64) -> String {
    match days {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        n if n > 1 => format!("in {} days", n),
        -1 => "1 day ago".to_string(),
        n => format!("{} days ago", -n),
    }
}
