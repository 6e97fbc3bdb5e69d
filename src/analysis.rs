//! Model-backed analysis of mistakes, mood, study patterns and panic.
//!
//! An [`AnalysisRequest`] names one of four analysis kinds and carries its
//! data. Each kind renders a system prompt that pins the model to a strict
//! JSON answer, plus a user prompt built from the data. [`analyze`] sends
//! both through a [`ModelClient`] and parses the typed response.
//!
//! When the model is unavailable the tool layer uses [`fallback`], which
//! answers the same request from local heuristics.
//!
//! # Wire format
//!
//! ```json
//! { "type": "classifyMistake", "data": { "questionText": "...", ... } }
//! ```

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::classify::StressLevel;
use crate::config::AnalysisConfig;
use crate::models::{MistakeType, OptionKey, Question};
use crate::progress::{ProgressTracker, TopicStats};

// ============ Requests ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum AnalysisRequest {
    ClassifyMistake(MistakeParams),
    GenerateEncouragement(EncouragementParams),
    AnalyzeStudyPattern(StudyPatternParams),
    DetectPanicLevel(PanicParams),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeParams {
    pub question_text: String,
    pub topic: String,
    pub subject: String,
    pub selected_answer: String,
    pub selected_option: String,
    pub correct_answer: String,
    pub correct_option: String,
    pub explanation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common_mistake: Option<String>,
}

impl MistakeParams {
    /// Describe a wrong pick on a bank question.
    pub fn for_question(question: &Question, selected: OptionKey) -> Self {
        Self {
            question_text: question.text.clone(),
            topic: question.topic.clone(),
            subject: question.subject.to_string(),
            selected_answer: selected.to_string(),
            selected_option: question.options.get(selected).to_string(),
            correct_answer: question.correct_answer.to_string(),
            correct_option: question.options.get(question.correct_answer).to_string(),
            explanation: question.explanation.clone(),
            common_mistake: question.common_mistake.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncouragementParams {
    #[serde(default)]
    pub mood: Option<String>,
    pub accuracy: f64,
    pub total_solved: u32,
    pub streak: u32,
    #[serde(default)]
    pub strong_topics: Vec<String>,
    #[serde(default)]
    pub weak_topics: Vec<String>,
    #[serde(default)]
    pub stress_level: Option<String>,
    #[serde(default)]
    pub recent_mistakes: Option<String>,
}

impl EncouragementParams {
    /// Build from the learner's live statistics.
    pub fn from_progress(tracker: &ProgressTracker, stress: Option<StressLevel>) -> Self {
        let p = tracker.progress();
        let recent: Vec<&str> = p
            .recent_mistakes
            .iter()
            .take(5)
            .map(|m| m.mistake_type.as_str())
            .collect();
        Self {
            mood: p.current_mood.map(|m| m.value().to_string()),
            accuracy: f64::from(p.accuracy()),
            total_solved: p.total_attempted,
            streak: p.current_streak,
            strong_topics: p.strong_topics().into_iter().map(|t| t.topic).collect(),
            weak_topics: p.weak_topics().into_iter().map(|t| t.topic).collect(),
            stress_level: stress.map(|s| s.as_str().to_string()),
            recent_mistakes: (!recent.is_empty()).then(|| recent.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPatternParams {
    pub total_attempted: u32,
    pub accuracy: f64,
    pub total_minutes: f64,
    #[serde(default)]
    pub topic_breakdown: BTreeMap<String, TopicStats>,
    #[serde(default)]
    pub mistake_patterns: BTreeMap<String, u32>,
    #[serde(default)]
    pub days_until_exam: Option<i64>,
}

impl StudyPatternParams {
    /// Build from the learner's live statistics.
    ///
    /// Topics with the same name under different subjects are merged;
    /// minutes cover the recent answer window only.
    pub fn from_progress(tracker: &ProgressTracker) -> Self {
        let p = tracker.progress();
        let mut topic_breakdown: BTreeMap<String, TopicStats> = BTreeMap::new();
        for topics in p.topic_stats.values() {
            for (name, stats) in topics {
                let entry = topic_breakdown.entry(name.clone()).or_default();
                entry.attempted += stats.attempted;
                entry.correct += stats.correct;
            }
        }
        let mistake_patterns = p
            .mistake_counts()
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(t, count)| (t.to_string(), count))
            .collect();

        Self {
            total_attempted: p.total_attempted,
            accuracy: f64::from(p.accuracy()),
            total_minutes: (p.recent_time_spent_secs() as f64 / 60.0).round(),
            topic_breakdown,
            mistake_patterns,
            days_until_exam: tracker.days_until_exam(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanicParams {
    pub message: String,
    #[serde(default)]
    pub hours_until_exam: Option<f64>,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub recent_performance: Option<String>,
}

// ============ Responses ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MistakeAnalysis {
    pub mistake_type: MistakeType,
    pub explanation: String,
    pub tip: String,
    pub encouragement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Encouragement {
    pub message: String,
    pub suggested_action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPatternAnalysis {
    pub strengths: Vec<String>,
    pub areas_to_improve: Vec<String>,
    pub recommended_focus: String,
    pub study_tip: String,
    pub estimated_readiness: Readiness,
}

/// Panic grade reported by the model, wider than the offline heuristic's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelPanicLevel {
    None,
    Low,
    Medium,
    High,
    Crisis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportApproach {
    Calm,
    Encouraging,
    Practical,
    CrisisSupport,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanicAnalysis {
    pub panic_level: ModelPanicLevel,
    #[serde(default)]
    pub detected_emotions: Vec<String>,
    pub needs_intervention: bool,
    pub suggested_approach: SupportApproach,
    #[serde(default)]
    pub key_triggers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResponse {
    Mistake(MistakeAnalysis),
    Encouragement(Encouragement),
    StudyPattern(StudyPatternAnalysis),
    Panic(PanicAnalysis),
}

// ============ Prompts ============

const MISTAKE_SYSTEM: &str = r#"You are an expert tutor analyzing student mistakes on JEE exam questions.
Classify the mistake into exactly ONE of these categories:
- conceptual: Student doesn't understand the underlying concept or principle
- calculation: Student understood the concept but made arithmetic/algebraic error
- careless: Student rushed, didn't read carefully, picked similar-looking answer
- misread: Student misunderstood what the question was asking

Also provide a brief, encouraging explanation of the mistake and a specific tip to avoid it next time.

Respond in JSON format only:
{
  "mistakeType": "conceptual" | "calculation" | "careless" | "misread",
  "explanation": "Why they likely made this mistake",
  "tip": "Specific actionable advice",
  "encouragement": "Brief encouraging message"
}"#;

const ENCOURAGEMENT_SYSTEM: &str = r#"You are a supportive, empathetic tutor helping a student who is struggling.
Generate a personalized encouraging message based on their current state and progress.
Keep it brief (2-3 sentences), genuine, and specific to their situation.
Don't be patronizing. Be warm but real.

Respond in JSON format only:
{
  "message": "The encouraging message",
  "suggestedAction": "One specific thing they could do right now"
}"#;

const STUDY_PATTERN_SYSTEM: &str = r#"You are an expert learning coach analyzing a student's study patterns.
Based on their practice history, provide actionable insights.

Respond in JSON format only:
{
  "strengths": ["strength1", "strength2"],
  "areasToImprove": ["area1", "area2"],
  "recommendedFocus": "Most important thing to focus on",
  "studyTip": "Personalized study strategy tip",
  "estimatedReadiness": "low" | "medium" | "high"
}"#;

const PANIC_SYSTEM: &str = r#"You are an empathetic AI detecting student stress and panic levels.
Analyze the student's message for signs of anxiety, stress, or panic about their exam.

Respond in JSON format only:
{
  "panicLevel": "none" | "low" | "medium" | "high" | "crisis",
  "detectedEmotions": ["emotion1", "emotion2"],
  "needsIntervention": boolean,
  "suggestedApproach": "calm" | "encouraging" | "practical" | "crisis-support",
  "keyTriggers": ["what specifically is causing stress"]
}"#;

fn or_unknown<T: ToString>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

impl AnalysisRequest {
    /// Wire name of the analysis kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisRequest::ClassifyMistake(_) => "classifyMistake",
            AnalysisRequest::GenerateEncouragement(_) => "generateEncouragement",
            AnalysisRequest::AnalyzeStudyPattern(_) => "analyzeStudyPattern",
            AnalysisRequest::DetectPanicLevel(_) => "detectPanicLevel",
        }
    }

    /// `(system, user)` prompts for this request.
    pub fn prompts(&self) -> (&'static str, String) {
        match self {
            AnalysisRequest::ClassifyMistake(d) => {
                let common = d
                    .common_mistake
                    .as_deref()
                    .map(|m| format!("Common mistake on this question: {}", m))
                    .unwrap_or_default();
                let prompt = format!(
                    "Question: {}\nTopic: {}\nSubject: {}\n\n\
                     Student selected: {}) {}\nCorrect answer: {}) {}\n\n\
                     Explanation of correct answer: {}\n{}\n\n\
                     Analyze why the student likely chose the wrong answer and classify the mistake type.",
                    d.question_text,
                    d.topic,
                    d.subject,
                    d.selected_answer.to_uppercase(),
                    d.selected_option,
                    d.correct_answer.to_uppercase(),
                    d.correct_option,
                    d.explanation,
                    common,
                );
                (MISTAKE_SYSTEM, prompt)
            }
            AnalysisRequest::GenerateEncouragement(d) => {
                let mistakes = d
                    .recent_mistakes
                    .as_deref()
                    .map(|m| format!("- Recent mistakes: {}", m))
                    .unwrap_or_default();
                let prompt = format!(
                    "Student situation:\n- Mood: {}\n- Recent accuracy: {}%\n- Questions solved: {}\n\
                     - Current streak: {} days\n- Strong topics: {}\n- Struggling with: {}\n\
                     - Stress level: {}\n{}\n\n\
                     Generate an encouraging, personalized message for this student.",
                    or_unknown(d.mood.as_deref()),
                    d.accuracy,
                    d.total_solved,
                    d.streak,
                    join_or(&d.strong_topics, "none identified yet"),
                    join_or(&d.weak_topics, "none identified"),
                    or_unknown(d.stress_level.as_deref()),
                    mistakes,
                );
                (ENCOURAGEMENT_SYSTEM, prompt)
            }
            AnalysisRequest::AnalyzeStudyPattern(d) => {
                let topics = serde_json::to_string(&d.topic_breakdown).unwrap_or_default();
                let mistakes = serde_json::to_string(&d.mistake_patterns).unwrap_or_default();
                let prompt = format!(
                    "Student's practice data:\n- Total questions attempted: {}\n- Overall accuracy: {}%\n\
                     - Time spent: {} minutes\n- Topics practiced: {}\n- Mistake patterns: {}\n\
                     - Days until exam: {}\n\n\
                     Analyze their study pattern and provide recommendations.",
                    d.total_attempted,
                    d.accuracy,
                    d.total_minutes,
                    topics,
                    mistakes,
                    or_unknown(d.days_until_exam),
                );
                (STUDY_PATTERN_SYSTEM, prompt)
            }
            AnalysisRequest::DetectPanicLevel(d) => {
                let prompt = format!(
                    "Student's message: \"{}\"\n\nContext:\n- Exam in: {} hours\n\
                     - Current accuracy: {}%\n- Recent session performance: {}\n\n\
                     Detect their emotional state and panic level.",
                    d.message,
                    or_unknown(d.hours_until_exam),
                    or_unknown(d.accuracy),
                    or_unknown(d.recent_performance.as_deref()),
                );
                (PANIC_SYSTEM, prompt)
            }
        }
    }
}

// ============ Model clients ============

/// A chat model that answers one system + user prompt with text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// Used when `analysis.provider = "disabled"`; every call fails.
pub struct DisabledClient;

#[async_trait]
impl ModelClient for DisabledClient {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        bail!("analysis provider is disabled")
    }
}

/// Client for the Anthropic Messages API.
///
/// Reads the key from `ANTHROPIC_API_KEY`. Retries on HTTP 429, 5xx and
/// network errors with exponential backoff (1s, 2s, 4s, ...); other client
/// errors fail immediately.
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    config: AnalysisConfig,
}

impl AnthropicClient {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &AnalysisConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            config: config.clone(),
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/messages", self.config.api_base.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "system": system,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let mut last_err = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying model call");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", "2023-06-01")
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return first_text_block(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Anthropic API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Anthropic API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Model call failed after retries")))
    }
}

fn first_text_block(json: &serde_json::Value) -> Result<String> {
    json.get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
        })
        .and_then(|b| b.get("text"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("No text response from model"))
}

/// Build the client named by `analysis.provider`.
pub fn create_client(config: &AnalysisConfig) -> Result<Arc<dyn ModelClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledClient)),
        "anthropic" => Ok(Arc::new(AnthropicClient::new(config)?)),
        other => bail!("Unknown analysis provider: {}", other),
    }
}

// ============ Analysis ============

/// The JSON object inside a model reply, tolerating code fences and prose.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Run one analysis through the model and parse its typed answer.
pub async fn analyze(client: &dyn ModelClient, request: &AnalysisRequest) -> Result<AnalysisResponse> {
    let (system, prompt) = request.prompts();
    let text = client.complete(system, &prompt).await?;
    let json = extract_json(&text);
    let kind = request.kind();

    let response = match request {
        AnalysisRequest::ClassifyMistake(_) => AnalysisResponse::Mistake(parse(json, kind)?),
        AnalysisRequest::GenerateEncouragement(_) => {
            AnalysisResponse::Encouragement(parse(json, kind)?)
        }
        AnalysisRequest::AnalyzeStudyPattern(_) => {
            AnalysisResponse::StudyPattern(parse(json, kind)?)
        }
        AnalysisRequest::DetectPanicLevel(_) => AnalysisResponse::Panic(parse(json, kind)?),
    };
    Ok(response)
}

fn parse<T: serde::de::DeserializeOwned>(json: &str, kind: &str) -> Result<T> {
    serde_json::from_str(json).with_context(|| format!("Invalid {} response from model", kind))
}

/// [`analyze`], answering from [`fallback`] when the model call fails.
pub async fn analyze_or_fallback(
    client: &dyn ModelClient,
    request: &AnalysisRequest,
) -> AnalysisResponse {
    match analyze(client, request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(kind = request.kind(), client = client.name(), error = %e, "analysis failed, using fallback");
            fallback(request)
        }
    }
}

const PANIC_WORDS: &[&str] = &["fail", "panic", "can't", "freaking", "hopeless", "give up"];

/// Answer a request without the model.
pub fn fallback(request: &AnalysisRequest) -> AnalysisResponse {
    match request {
        AnalysisRequest::ClassifyMistake(_) => AnalysisResponse::Mistake(MistakeAnalysis {
            mistake_type: MistakeType::Careless,
            explanation: "Review the question and options carefully.".into(),
            tip: "Take your time reading all options before selecting.".into(),
            encouragement: "Every mistake is a learning opportunity!".into(),
        }),
        AnalysisRequest::GenerateEncouragement(_) => {
            AnalysisResponse::Encouragement(Encouragement {
                message: "You're making progress. Keep going!".into(),
                suggested_action: "Try a few more practice questions.".into(),
            })
        }
        AnalysisRequest::AnalyzeStudyPattern(d) => {
            AnalysisResponse::StudyPattern(study_pattern_fallback(d))
        }
        AnalysisRequest::DetectPanicLevel(d) => {
            let lower = d.message.to_lowercase();
            let high = PANIC_WORDS.iter().any(|w| lower.contains(w));
            AnalysisResponse::Panic(PanicAnalysis {
                panic_level: if high {
                    ModelPanicLevel::High
                } else {
                    ModelPanicLevel::Low
                },
                detected_emotions: Vec::new(),
                needs_intervention: high,
                suggested_approach: if high {
                    SupportApproach::CrisisSupport
                } else {
                    SupportApproach::Encouraging
                },
                key_triggers: Vec::new(),
            })
        }
    }
}

fn study_pattern_fallback(d: &StudyPatternParams) -> StudyPatternAnalysis {
    let mut strong = Vec::new();
    let mut weak: Vec<(u32, &str)> = Vec::new();
    for (topic, stats) in &d.topic_breakdown {
        match stats.accuracy() {
            Some(acc) if stats.attempted >= 3 && acc >= 80 => strong.push(topic.clone()),
            Some(acc) if stats.attempted >= 3 && acc < 60 => weak.push((acc, topic)),
            _ => {}
        }
    }
    weak.sort_by_key(|(acc, _)| *acc);

    let mut strengths = strong;
    if strengths.is_empty() {
        strengths.push("Consistent practice".to_string());
    }
    let mut areas_to_improve: Vec<String> = weak.iter().map(|(_, t)| t.to_string()).collect();
    if areas_to_improve.is_empty() {
        areas_to_improve.push("Continue reviewing weak topics".to_string());
    }
    let recommended_focus = weak
        .first()
        .map(|(_, t)| format!("Shore up {}", t))
        .unwrap_or_else(|| "Keep up the balanced practice".to_string());

    let estimated_readiness = if d.accuracy >= 80.0 && d.total_attempted >= 30 {
        Readiness::High
    } else if d.accuracy >= 60.0 {
        Readiness::Medium
    } else {
        Readiness::Low
    };

    StudyPatternAnalysis {
        strengths,
        areas_to_improve,
        recommended_focus,
        study_tip: "Focus on understanding concepts deeply.".to_string(),
        estimated_readiness,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Subject;
    use crate::progress::AnswerSubmission;
    use crate::store::MemoryStore;
    use std::sync::Mutex;

    /// Replies with a canned text and records the prompts it saw.
    struct CannedClient {
        reply: String,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl CannedClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelClient for CannedClient {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
            self.seen
                .lock()
                .unwrap()
                .push((system.to_string(), prompt.to_string()));
            Ok(self.reply.clone())
        }
    }

    fn mistake_request() -> AnalysisRequest {
        AnalysisRequest::ClassifyMistake(MistakeParams {
            question_text: "What is 2 + 2?".into(),
            topic: "Algebra".into(),
            subject: "math".into(),
            selected_answer: "b".into(),
            selected_option: "5".into(),
            correct_answer: "a".into(),
            correct_option: "4".into(),
            explanation: "Add.".into(),
            common_mistake: Some("Off by one".into()),
        })
    }

    fn panic_request(message: &str) -> AnalysisRequest {
        AnalysisRequest::DetectPanicLevel(PanicParams {
            message: message.into(),
            hours_until_exam: Some(12.0),
            accuracy: None,
            recent_performance: None,
        })
    }

    #[test]
    fn test_request_wire_format() {
        let json = serde_json::json!({
            "type": "detectPanicLevel",
            "data": { "message": "help", "hoursUntilExam": 3 }
        });
        let req: AnalysisRequest = serde_json::from_value(json).unwrap();
        assert_eq!(req.kind(), "detectPanicLevel");
        match req {
            AnalysisRequest::DetectPanicLevel(p) => assert_eq!(p.hours_until_exam, Some(3.0)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let json = serde_json::json!({ "type": "predictScore", "data": {} });
        assert!(serde_json::from_value::<AnalysisRequest>(json).is_err());
    }

    #[test]
    fn test_mistake_prompt_contents() {
        let (system, prompt) = mistake_request().prompts();
        assert!(system.contains("exactly ONE"));
        assert!(prompt.contains("Student selected: B) 5"));
        assert!(prompt.contains("Correct answer: A) 4"));
        assert!(prompt.contains("Common mistake on this question: Off by one"));
    }

    #[test]
    fn test_panic_prompt_marks_unknowns() {
        let (_, prompt) = panic_request("exam soon").prompts();
        assert!(prompt.contains("Exam in: 12 hours"));
        assert!(prompt.contains("Current accuracy: unknown%"));
    }

    #[tokio::test]
    async fn test_analyze_parses_typed_response() {
        let client = CannedClient::new(
            r#"{"mistakeType":"calculation","explanation":"e","tip":"t","encouragement":"c"}"#,
        );
        let resp = analyze(&client, &mistake_request()).await.unwrap();
        match resp {
            AnalysisResponse::Mistake(m) => assert_eq!(m.mistake_type, MistakeType::Calculation),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(client.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_tolerates_code_fence() {
        let client = CannedClient::new(
            "```json\n{\"message\":\"You got this\",\"suggestedAction\":\"Do one easy question\"}\n```",
        );
        let req = AnalysisRequest::GenerateEncouragement(EncouragementParams {
            mood: None,
            accuracy: 40.0,
            total_solved: 10,
            streak: 2,
            strong_topics: vec![],
            weak_topics: vec!["Vectors".into()],
            stress_level: Some("medium".into()),
            recent_mistakes: None,
        });
        let resp = analyze(&client, &req).await.unwrap();
        let json = serde_json::to_value(resp).unwrap();
        assert_eq!(json["suggestedAction"], "Do one easy question");
    }

    #[tokio::test]
    async fn test_analyze_rejects_wrong_shape() {
        let client = CannedClient::new(r#"{"mistakeType":"sloppy"}"#);
        let err = analyze(&client, &mistake_request()).await.unwrap_err();
        assert!(err.to_string().contains("classifyMistake"));
    }

    #[tokio::test]
    async fn test_disabled_client_falls_back() {
        let resp = analyze_or_fallback(&DisabledClient, &panic_request("I will fail")).await;
        match resp {
            AnalysisResponse::Panic(p) => {
                assert_eq!(p.panic_level, ModelPanicLevel::High);
                assert!(p.needs_intervention);
                assert_eq!(p.suggested_approach, SupportApproach::CrisisSupport);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_panic_fallback_calm_message() {
        let json = serde_json::to_value(fallback(&panic_request("feeling fine"))).unwrap();
        assert_eq!(json["panicLevel"], "low");
        assert_eq!(json["suggestedApproach"], "encouraging");
        assert_eq!(json["needsIntervention"], false);
    }

    #[test]
    fn test_mistake_fallback_is_careless() {
        let json = serde_json::to_value(fallback(&mistake_request())).unwrap();
        assert_eq!(json["mistakeType"], "careless");
    }

    #[test]
    fn test_study_pattern_fallback_uses_numbers() {
        let mut topics = BTreeMap::new();
        topics.insert("Vectors".to_string(), TopicStats { attempted: 5, correct: 1 });
        topics.insert("Calculus".to_string(), TopicStats { attempted: 5, correct: 5 });
        let req = AnalysisRequest::AnalyzeStudyPattern(StudyPatternParams {
            total_attempted: 10,
            accuracy: 60.0,
            total_minutes: 12.0,
            topic_breakdown: topics,
            mistake_patterns: BTreeMap::new(),
            days_until_exam: None,
        });
        match fallback(&req) {
            AnalysisResponse::StudyPattern(s) => {
                assert_eq!(s.strengths, vec!["Calculus"]);
                assert_eq!(s.areas_to_improve, vec!["Vectors"]);
                assert_eq!(s.estimated_readiness, Readiness::Medium);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_study_pattern_from_progress() {
        let date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut tracker = ProgressTracker::open(MemoryStore::new(), ManualClock::at_date(date), "k");
        for correct in [true, false, false] {
            tracker.record_answer(AnswerSubmission {
                question_id: "jee-1".into(),
                subject: Subject::Physics,
                topic: "Kinematics".into(),
                selected_answer: if correct { OptionKey::A } else { OptionKey::C },
                correct_answer: OptionKey::A,
                time_spent: 60,
                mistake_type: (!correct).then_some(MistakeType::Conceptual),
            });
        }
        tracker.set_exam_date(Some(date + chrono::Duration::days(4)));

        let params = StudyPatternParams::from_progress(&tracker);
        assert_eq!(params.total_attempted, 3);
        assert_eq!(params.accuracy, 33.0);
        assert_eq!(params.total_minutes, 3.0);
        assert_eq!(params.topic_breakdown["Kinematics"].attempted, 3);
        assert_eq!(params.mistake_patterns.get("conceptual"), Some(&2));
        assert_eq!(params.mistake_patterns.get("careless"), None);
        assert_eq!(params.days_until_exam, Some(4));

        let enc = EncouragementParams::from_progress(&tracker, Some(StressLevel::Low));
        assert_eq!(enc.weak_topics, vec!["Kinematics"]);
        assert_eq!(enc.recent_mistakes.as_deref(), Some("conceptual, conceptual"));
        assert_eq!(enc.stress_level.as_deref(), Some("low"));
    }
}
