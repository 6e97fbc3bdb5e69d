//! Core data models shared across AdaptIQ.
//!
//! These types describe the question bank and the vocabulary that the
//! classifier, the progress tracker and the tool layer all speak: subjects,
//! option keys, difficulty levels, mistake types and moods.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three examined subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subject {
    Physics,
    Chemistry,
    Math,
}

impl Subject {
    /// All subjects in their canonical order.
    pub const ALL: [Subject; 3] = [Subject::Physics, Subject::Chemistry, Subject::Math];

    pub fn as_str(&self) -> &'static str {
        match self {
            Subject::Physics => "physics",
            Subject::Chemistry => "chemistry",
            Subject::Math => "math",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "physics" => Ok(Subject::Physics),
            "chemistry" => Ok(Subject::Chemistry),
            "math" => Ok(Subject::Math),
            other => bail!("invalid subject '{}': must be physics, chemistry, or math", other),
        }
    }
}

/// A lettered answer option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKey {
    A,
    B,
    C,
    D,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [OptionKey::A, OptionKey::B, OptionKey::C, OptionKey::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::A => "a",
            OptionKey::B => "b",
            OptionKey::C => "c",
            OptionKey::D => "d",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" => Ok(OptionKey::A),
            "b" => Ok(OptionKey::B),
            "c" => Ok(OptionKey::C),
            "d" => Ok(OptionKey::D),
            other => bail!("invalid option '{}': must be a, b, c, or d", other),
        }
    }
}

/// Question difficulty, 1 (easy) to 3 (hard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub const EASY: Difficulty = Difficulty(1);
    pub const MEDIUM: Difficulty = Difficulty(2);
    pub const HARD: Difficulty = Difficulty(3);

    pub fn level(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=3).contains(&value) {
            Ok(Difficulty(value))
        } else {
            Err(format!("difficulty must be 1, 2, or 3, got {}", value))
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.0
    }
}

/// Why an incorrect answer was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MistakeType {
    Conceptual,
    Calculation,
    Careless,
    Misread,
}

impl MistakeType {
    /// Enumeration order; used for tallies and tie-breaking.
    pub const ALL: [MistakeType; 4] = [
        MistakeType::Conceptual,
        MistakeType::Calculation,
        MistakeType::Careless,
        MistakeType::Misread,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MistakeType::Conceptual => "conceptual",
            MistakeType::Calculation => "calculation",
            MistakeType::Careless => "careless",
            MistakeType::Misread => "misread",
        }
    }
}

impl fmt::Display for MistakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MistakeType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conceptual" => Ok(MistakeType::Conceptual),
            "calculation" => Ok(MistakeType::Calculation),
            "careless" => Ok(MistakeType::Careless),
            "misread" => Ok(MistakeType::Misread),
            other => bail!(
                "invalid mistake type '{}': must be conceptual, calculation, careless, or misread",
                other
            ),
        }
    }
}

/// Self-reported mood on a 1–5 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Mood(u8);

impl Mood {
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Mood {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(Mood(value))
        } else {
            Err(format!("mood must be between 1 and 5, got {}", value))
        }
    }
}

impl From<Mood> for u8 {
    fn from(m: Mood) -> u8 {
        m.0
    }
}

/// The four lettered options of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionOptions {
    pub a: String,
    pub b: String,
    pub c: String,
    pub d: String,
}

impl QuestionOptions {
    pub fn get(&self, key: OptionKey) -> &str {
        match key {
            OptionKey::A => &self.a,
            OptionKey::B => &self.b,
            OptionKey::C => &self.c,
            OptionKey::D => &self.d,
        }
    }
}

/// A practice question from the static bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub subject: Subject,
    pub topic: String,
    pub subtopic: String,
    pub difficulty: Difficulty,
    pub text: String,
    pub options: QuestionOptions,
    pub correct_answer: OptionKey,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_mistake: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_parse_and_display() {
        assert_eq!("Physics".parse::<Subject>().unwrap(), Subject::Physics);
        assert_eq!(" math ".parse::<Subject>().unwrap(), Subject::Math);
        assert!("biology".parse::<Subject>().is_err());
        assert_eq!(Subject::Chemistry.to_string(), "chemistry");
    }

    #[test]
    fn test_mood_bounds() {
        assert!(Mood::try_from(0u8).is_err());
        assert_eq!(Mood::try_from(1u8).unwrap().value(), 1);
        assert_eq!(Mood::try_from(5u8).unwrap().value(), 5);
        assert!(Mood::try_from(6u8).is_err());
    }

    #[test]
    fn test_mood_rejects_out_of_range_json() {
        assert!(serde_json::from_str::<Mood>("3").is_ok());
        assert!(serde_json::from_str::<Mood>("9").is_err());
    }

    #[test]
    fn test_difficulty_bounds() {
        assert!(Difficulty::try_from(0u8).is_err());
        assert_eq!(Difficulty::try_from(3u8).unwrap(), Difficulty::HARD);
        assert!(serde_json::from_str::<Difficulty>("4").is_err());
    }

    #[test]
    fn test_option_lookup() {
        let opts = QuestionOptions {
            a: "one".into(),
            b: "two".into(),
            c: "three".into(),
            d: "four".into(),
        };
        assert_eq!(opts.get(OptionKey::C), "three");
        assert_eq!("B".parse::<OptionKey>().unwrap(), OptionKey::B);
    }

    #[test]
    fn test_subject_serializes_lowercase() {
        let json = serde_json::to_string(&Subject::Math).unwrap();
        assert_eq!(json, "\"math\"");
    }
}
