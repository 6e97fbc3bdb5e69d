//! Assistant-facing tools.
//!
//! Every learner operation (classification, session planning, question
//! lookup, progress updates and model analysis) is exposed as a [`Tool`]
//! with a JSON Schema for its parameters. The [`ToolRegistry`] backs both
//! the HTTP server (`POST /tools/{name}`) and the `adaptiq tools` command.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │               ToolRegistry               │
//! │  ┌──────────┐ ┌──────────┐ ┌──────────┐  │
//! │  │ classify │ │ progress │ │ analysis │  │
//! │  │ planning │ │ questions│ │  (model) │  │
//! │  └──────────┘ └──────────┘ └──────────┘  │
//! └──────────────┬───────────────────────────┘
//!                ▼
//!     validate_params() → Tool::execute()
//! ```
//!
//! Parameters are checked against the schema before `execute` runs:
//! required fields, JSON types and enums, with schema defaults filled in.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::analysis::{
    analyze_or_fallback, AnalysisRequest, EncouragementParams, MistakeParams, ModelClient,
    PanicParams, StudyPatternParams,
};
use crate::classify::{analyze_user_input, StressLevel};
use crate::exam_timing::parse_exam_timing;
use crate::models::{Difficulty, MistakeType, Mood, OptionKey, Subject};
use crate::progress::{AnswerSubmission, ProgressTracker};
use crate::questions::{
    get_question_by_id, get_questions, question_stats, topics_for_subject, QuestionFilter,
};
use crate::session::plan_session;

// ═══════════════════════════════════════════════════════════════════════
// Tool Trait
// ═══════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the parameters object.
    fn parameters_schema(&self) -> Value;

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value>;
}

/// Serializable tool info for the `/tools/list` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

// ═══════════════════════════════════════════════════════════════════════
// ToolContext
// ═══════════════════════════════════════════════════════════════════════

/// Shared state handed to every tool call.
#[derive(Clone)]
pub struct ToolContext {
    tracker: Arc<Mutex<ProgressTracker>>,
    model: Arc<dyn ModelClient>,
}

impl ToolContext {
    pub fn new(tracker: Arc<Mutex<ProgressTracker>>, model: Arc<dyn ModelClient>) -> Self {
        Self { tracker, model }
    }

    /// Lock the tracker. Never hold the guard across an `.await`.
    pub fn tracker(&self) -> Result<MutexGuard<'_, ProgressTracker>> {
        self.tracker
            .lock()
            .map_err(|_| anyhow::anyhow!("progress tracker lock poisoned"))
    }

    pub fn model(&self) -> &dyn ModelClient {
        self.model.as_ref()
    }

    async fn analyze(&self, request: AnalysisRequest) -> Result<Value> {
        let response = analyze_or_fallback(self.model(), &request).await;
        Ok(serde_json::to_value(response)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter helpers
// ═══════════════════════════════════════════════════════════════════════

fn required_str<'a>(params: &'a Value, name: &str) -> Result<&'a str> {
    let value = params[name].as_str().unwrap_or("");
    if value.trim().is_empty() {
        bail!("{} must not be empty", name);
    }
    Ok(value)
}

fn optional_parse<T>(params: &Value, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    params[name]
        .as_str()
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid {}: {}", name, e))
}

fn optional_u8(params: &Value, name: &str) -> Option<u8> {
    params[name].as_u64().and_then(|n| u8::try_from(n).ok())
}

fn subject_enum() -> Value {
    serde_json::json!(Subject::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>())
}

fn option_enum() -> Value {
    serde_json::json!(OptionKey::ALL.iter().map(|o| o.as_str()).collect::<Vec<_>>())
}

fn mistake_enum() -> Value {
    serde_json::json!(MistakeType::ALL.iter().map(|m| m.as_str()).collect::<Vec<_>>())
}

// ═══════════════════════════════════════════════════════════════════════
// Classification and planning
// ═══════════════════════════════════════════════════════════════════════

pub struct AnalyzeInputTool;

#[async_trait]
impl Tool for AnalyzeInputTool {
    fn name(&self) -> &str {
        "analyze_input"
    }

    fn description(&self) -> &str {
        "Classify a learner message: time budget, stress level, subject and topics"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "What the learner said" }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let input = params["input"].as_str().unwrap_or("");
        Ok(serde_json::to_value(analyze_user_input(input))?)
    }
}

pub struct ParseExamTimingTool;

#[async_trait]
impl Tool for ParseExamTimingTool {
    fn name(&self) -> &str {
        "parse_exam_timing"
    }

    fn description(&self) -> &str {
        "Estimate hours until the exam and how panicked the learner sounds"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "User input to parse for exam timing" }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let input = params["input"].as_str().unwrap_or("");
        Ok(serde_json::to_value(parse_exam_timing(input))?)
    }
}

pub struct PlanSessionTool;

#[async_trait]
impl Tool for PlanSessionTool {
    fn name(&self) -> &str {
        "plan_session"
    }

    fn description(&self) -> &str {
        "Plan a practice session from a learner message and their progress"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "What the learner said" }
            },
            "required": ["input"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let input = params["input"].as_str().unwrap_or("");
        let classification = analyze_user_input(input);
        let tracker = ctx.tracker()?;
        let session = plan_session(
            &classification,
            tracker.days_until_exam(),
            tracker.progress().current_mood,
            &tracker.weak_topics(),
        );
        Ok(serde_json::to_value(session)?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Question bank
// ═══════════════════════════════════════════════════════════════════════

pub struct GetQuestionsTool;

#[async_trait]
impl Tool for GetQuestionsTool {
    fn name(&self) -> &str {
        "get_questions"
    }

    fn description(&self) -> &str {
        "Pick practice questions by subject, topic and difficulty"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "subject": { "type": "string", "enum": subject_enum() },
                "topic": { "type": "string", "description": "Case-insensitive topic substring" },
                "difficulty": { "type": "integer", "enum": [1, 2, 3] },
                "limit": { "type": "integer", "description": "Max questions", "default": 5 },
                "exclude_ids": { "type": "array", "description": "Question ids to skip" }
            }
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let difficulty = optional_u8(&params, "difficulty")
            .map(Difficulty::try_from)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid difficulty: {}", e))?;
        let filter = QuestionFilter {
            subject: optional_parse(&params, "subject")?,
            topic: params["topic"].as_str().map(str::to_string),
            difficulty,
            limit: params["limit"].as_u64().map(|n| n as usize),
            exclude_ids: params["exclude_ids"]
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
        };

        let questions = {
            let mut rng = rand::thread_rng();
            get_questions(&filter, &mut rng)
        };
        Ok(serde_json::json!({ "questions": questions }))
    }
}

pub struct GetQuestionByIdTool;

#[async_trait]
impl Tool for GetQuestionByIdTool {
    fn name(&self) -> &str {
        "get_question_by_id"
    }

    fn description(&self) -> &str {
        "Retrieve one question by id"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "id": { "type": "string", "description": "Question id, e.g. jee-1" }
            },
            "required": ["id"]
        })
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<Value> {
        let id = required_str(&params, "id")?;
        let question =
            get_question_by_id(id).ok_or_else(|| anyhow::anyhow!("question not found: {}", id))?;
        Ok(serde_json::to_value(question)?)
    }
}

pub struct QuestionStatsTool;

#[async_trait]
impl Tool for QuestionStatsTool {
    fn name(&self) -> &str {
        "get_question_stats"
    }

    fn description(&self) -> &str {
        "Count questions by subject and difficulty, and list topics per subject"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, _ctx: &ToolContext) -> Result<Value> {
        let topics: serde_json::Map<String, Value> = Subject::ALL
            .iter()
            .map(|s| (s.to_string(), serde_json::json!(topics_for_subject(*s))))
            .collect();
        let mut stats = serde_json::to_value(question_stats())?;
        stats["topics"] = Value::Object(topics);
        Ok(stats)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Progress
// ═══════════════════════════════════════════════════════════════════════

pub struct RecordAnswerTool;

#[async_trait]
impl Tool for RecordAnswerTool {
    fn name(&self) -> &str {
        "record_answer"
    }

    fn description(&self) -> &str {
        "Record the learner's answer to a bank question and update their progress"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question_id": { "type": "string" },
                "selected_answer": { "type": "string", "enum": option_enum() },
                "time_spent": { "type": "integer", "description": "Seconds spent", "default": 0 },
                "mistake_type": { "type": "string", "enum": mistake_enum() }
            },
            "required": ["question_id", "selected_answer"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = required_str(&params, "question_id")?;
        let question =
            get_question_by_id(id).ok_or_else(|| anyhow::anyhow!("question not found: {}", id))?;
        let selected: OptionKey = required_str(&params, "selected_answer")?.parse()?;
        let mistake_type: Option<MistakeType> = optional_parse(&params, "mistake_type")?;
        let time_spent = params["time_spent"]
            .as_u64()
            .map(|n| n.min(u64::from(u32::MAX)) as u32)
            .unwrap_or(0);

        let submission = AnswerSubmission::for_question(question, selected, time_spent, mistake_type);
        let mut tracker = ctx.tracker()?;
        let record = tracker.record_answer(submission);

        Ok(serde_json::json!({
            "record": record,
            "isCorrect": record.is_correct(),
            "correctAnswer": question.correct_answer,
            "explanation": question.explanation,
            "progress": tracker.summary(),
        }))
    }
}

pub struct GetProgressTool;

#[async_trait]
impl Tool for GetProgressTool {
    fn name(&self) -> &str {
        "get_progress"
    }

    fn description(&self) -> &str {
        "Summarize accuracy, streak, exam countdown, weak and strong topics"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        Ok(serde_json::to_value(ctx.tracker()?.summary())?)
    }
}

pub struct SetExamDateTool;

#[async_trait]
impl Tool for SetExamDateTool {
    fn name(&self) -> &str {
        "set_exam_date"
    }

    fn description(&self) -> &str {
        "Set the exam date (YYYY-MM-DD), or clear it when omitted"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "date": { "type": "string", "description": "Exam date, YYYY-MM-DD" }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let date = params["date"]
            .as_str()
            .map(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"))
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid date: {}", e))?;
        let mut tracker = ctx.tracker()?;
        tracker.set_exam_date(date);
        Ok(serde_json::to_value(tracker.summary())?)
    }
}

pub struct SetMoodTool;

#[async_trait]
impl Tool for SetMoodTool {
    fn name(&self) -> &str {
        "set_mood"
    }

    fn description(&self) -> &str {
        "Set the learner's mood from 1 (awful) to 5 (great), or clear it when omitted"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "mood": { "type": "integer", "enum": [1, 2, 3, 4, 5] }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let mood = optional_u8(&params, "mood")
            .map(Mood::try_from)
            .transpose()
            .map_err(|e| anyhow::anyhow!("invalid mood: {}", e))?;
        let mut tracker = ctx.tracker()?;
        tracker.set_mood(mood);
        Ok(serde_json::to_value(tracker.summary())?)
    }
}

pub struct ResetProgressTool;

#[async_trait]
impl Tool for ResetProgressTool {
    fn name(&self) -> &str {
        "reset_progress"
    }

    fn description(&self) -> &str {
        "Erase all recorded progress"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let mut tracker = ctx.tracker()?;
        tracker.reset();
        Ok(serde_json::to_value(tracker.summary())?)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Model analysis
// ═══════════════════════════════════════════════════════════════════════

pub struct ClassifyMistakeTool;

#[async_trait]
impl Tool for ClassifyMistakeTool {
    fn name(&self) -> &str {
        "classify_mistake_ai"
    }

    fn description(&self) -> &str {
        "Ask the model why a wrong answer was chosen: mistake type, explanation and tip"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question_id": { "type": "string" },
                "selected_answer": { "type": "string", "enum": option_enum() }
            },
            "required": ["question_id", "selected_answer"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let id = required_str(&params, "question_id")?;
        let question =
            get_question_by_id(id).ok_or_else(|| anyhow::anyhow!("question not found: {}", id))?;
        let selected: OptionKey = required_str(&params, "selected_answer")?.parse()?;
        let request = AnalysisRequest::ClassifyMistake(MistakeParams::for_question(question, selected));
        ctx.analyze(request).await
    }
}

pub struct EncouragementTool;

#[async_trait]
impl Tool for EncouragementTool {
    fn name(&self) -> &str {
        "generate_encouragement_ai"
    }

    fn description(&self) -> &str {
        "Write a short personalised encouragement from the learner's progress"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "stress_level": { "type": "string", "enum": ["none", "low", "medium", "high"] }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let stress = match params["stress_level"].as_str() {
            Some("none") => Some(StressLevel::None),
            Some("low") => Some(StressLevel::Low),
            Some("medium") => Some(StressLevel::Medium),
            Some("high") => Some(StressLevel::High),
            _ => None,
        };
        let data = {
            let tracker = ctx.tracker()?;
            EncouragementParams::from_progress(&tracker, stress)
        };
        ctx.analyze(AnalysisRequest::GenerateEncouragement(data)).await
    }
}

pub struct StudyPatternTool;

#[async_trait]
impl Tool for StudyPatternTool {
    fn name(&self) -> &str {
        "analyze_study_pattern_ai"
    }

    fn description(&self) -> &str {
        "Review the learner's practice history: strengths, gaps and readiness"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _params: Value, ctx: &ToolContext) -> Result<Value> {
        let data = {
            let tracker = ctx.tracker()?;
            StudyPatternParams::from_progress(&tracker)
        };
        ctx.analyze(AnalysisRequest::AnalyzeStudyPattern(data)).await
    }
}

pub struct PanicLevelTool;

#[async_trait]
impl Tool for PanicLevelTool {
    fn name(&self) -> &str {
        "detect_panic_level_ai"
    }

    fn description(&self) -> &str {
        "Ask the model how stressed a message sounds and how to respond"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "hours_until_exam": { "type": "number" },
                "recent_performance": { "type": "string" }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<Value> {
        let message = required_str(&params, "message")?.to_string();
        let accuracy = {
            let tracker = ctx.tracker()?;
            let p = tracker.progress();
            (p.total_attempted > 0).then(|| f64::from(p.accuracy()))
        };
        let data = PanicParams {
            message,
            hours_until_exam: params["hours_until_exam"].as_f64(),
            accuracy,
            recent_performance: params["recent_performance"].as_str().map(str::to_string),
        };
        ctx.analyze(AnalysisRequest::DetectPanicLevel(data)).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AnalyzeInputTool));
        registry.register(Box::new(ParseExamTimingTool));
        registry.register(Box::new(PlanSessionTool));
        registry.register(Box::new(GetQuestionsTool));
        registry.register(Box::new(GetQuestionByIdTool));
        registry.register(Box::new(QuestionStatsTool));
        registry.register(Box::new(RecordAnswerTool));
        registry.register(Box::new(GetProgressTool));
        registry.register(Box::new(SetExamDateTool));
        registry.register(Box::new(SetMoodTool));
        registry.register(Box::new(ResetProgressTool));
        registry.register(Box::new(ClassifyMistakeTool));
        registry.register(Box::new(EncouragementTool));
        registry.register(Box::new(StudyPatternTool));
        registry.register(Box::new(PanicLevelTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn tools(&self) -> &[Box<dyn Tool>] {
        &self.tools
    }

    pub fn find(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn infos(&self) -> Vec<ToolInfo> {
        self.tools
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters_schema(),
            })
            .collect()
    }

    /// Look up, validate and execute a tool.
    pub async fn invoke(&self, name: &str, params: &Value, ctx: &ToolContext) -> Result<Value> {
        let tool = self
            .find(name)
            .ok_or_else(|| anyhow::anyhow!("no tool registered with name: {}", name))?;
        let validated = validate_params(&tool.parameters_schema(), params)?;
        tool.execute(validated, ctx).await
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Parameter validation
// ═══════════════════════════════════════════════════════════════════════

/// Check `params` against a tool's JSON Schema and fill in defaults.
///
/// A non-object `params` counts as an empty object.
pub fn validate_params(schema: &Value, params: &Value) -> Result<Value> {
    let params_obj = params.as_object().cloned().unwrap_or_default();

    let properties = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .cloned()
        .unwrap_or_default();

    let required: Vec<String> = schema
        .get("required")
        .and_then(|r| r.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let mut result = params_obj.clone();

    for req_field in &required {
        if params_obj.get(req_field).map_or(true, Value::is_null) {
            bail!("missing required parameter: {}", req_field);
        }
    }

    for (prop_name, prop_schema) in &properties {
        match params_obj.get(prop_name) {
            Some(value) if !value.is_null() => {
                if let Some(expected_type) = prop_schema.get("type").and_then(|t| t.as_str()) {
                    let type_ok = match expected_type {
                        "string" => value.is_string(),
                        "integer" => value.is_i64() || value.is_u64(),
                        "number" => value.is_number(),
                        "boolean" => value.is_boolean(),
                        "array" => value.is_array(),
                        "object" => value.is_object(),
                        _ => true,
                    };
                    if !type_ok {
                        bail!(
                            "parameter '{}' must be of type '{}', got {}",
                            prop_name,
                            expected_type,
                            json_type_name(value)
                        );
                    }
                }

                if let Some(enum_values) = prop_schema.get("enum").and_then(|e| e.as_array()) {
                    if !enum_values.contains(value) {
                        let allowed: Vec<String> =
                            enum_values.iter().map(|v| v.to_string()).collect();
                        bail!(
                            "parameter '{}' must be one of [{}], got {}",
                            prop_name,
                            allowed.join(", "),
                            value
                        );
                    }
                }
            }
            _ => {
                if let Some(default) = prop_schema.get("default") {
                    result.insert(prop_name.clone(), default.clone());
                }
            }
        }
    }

    Ok(Value::Object(result))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DisabledClient;
    use crate::clock::ManualClock;
    use crate::store::MemoryStore;

    fn context() -> ToolContext {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let tracker = ProgressTracker::open(MemoryStore::new(), ManualClock::at_date(date), "test");
        ToolContext::new(Arc::new(Mutex::new(tracker)), Arc::new(DisabledClient))
    }

    async fn call(ctx: &ToolContext, name: &str, params: Value) -> Result<Value> {
        ToolRegistry::with_builtins().invoke(name, &params, ctx).await
    }

    #[test]
    fn test_builtin_names_are_unique() {
        let registry = ToolRegistry::with_builtins();
        let mut names: Vec<_> = registry.tools().iter().map(|t| t.name().to_string()).collect();
        assert_eq!(names.len(), 15);
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 15);
    }

    #[test]
    fn test_validate_required_and_defaults() {
        let schema = GetQuestionsTool.parameters_schema();
        let out = validate_params(&schema, &serde_json::json!({})).unwrap();
        assert_eq!(out["limit"], 5);

        let schema = RecordAnswerTool.parameters_schema();
        let err = validate_params(&schema, &serde_json::json!({ "question_id": "jee-1" })).unwrap_err();
        assert!(err.to_string().contains("selected_answer"));
    }

    #[test]
    fn test_validate_type_and_enum() {
        let schema = SetMoodTool.parameters_schema();
        let err = validate_params(&schema, &serde_json::json!({ "mood": "happy" })).unwrap_err();
        assert!(err.to_string().contains("must be of type 'integer'"));
        let err = validate_params(&schema, &serde_json::json!({ "mood": 9 })).unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let err = call(&context(), "teleport", serde_json::json!({})).await.unwrap_err();
        assert!(err.to_string().contains("no tool registered"));
    }

    #[tokio::test]
    async fn test_analyze_input_tool() {
        let out = call(&context(), "analyze_input", serde_json::json!({ "input": "10 min of calculus" }))
            .await
            .unwrap();
        assert_eq!(out["time"]["budget"], "quick");
        assert_eq!(out["preferences"]["subject"], "math");
    }

    #[tokio::test]
    async fn test_record_answer_updates_progress() {
        let ctx = context();
        let q = get_question_by_id("jee-1").unwrap();
        let wrong = OptionKey::ALL
            .iter()
            .find(|k| **k != q.correct_answer)
            .unwrap()
            .as_str();

        let out = call(
            &ctx,
            "record_answer",
            serde_json::json!({ "question_id": "jee-1", "selected_answer": wrong, "mistake_type": "misread" }),
        )
        .await
        .unwrap();
        assert_eq!(out["isCorrect"], false);
        assert_eq!(out["record"]["mistakeType"], "misread");
        assert_eq!(out["progress"]["totalAttempted"], 1);

        let progress = call(&ctx, "get_progress", serde_json::json!({})).await.unwrap();
        assert_eq!(progress["accuracy"], 0);
        assert_eq!(progress["currentStreak"], 1);
    }

    #[tokio::test]
    async fn test_record_answer_unknown_question() {
        let err = call(
            &context(),
            "record_answer",
            serde_json::json!({ "question_id": "jee-0", "selected_answer": "a" }),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn test_plan_session_uses_exam_date() {
        let ctx = context();
        call(&ctx, "set_exam_date", serde_json::json!({ "date": "2024-05-04" }))
            .await
            .unwrap();
        let out = call(&ctx, "plan_session", serde_json::json!({ "input": "I have 30 minutes" }))
            .await
            .unwrap();
        assert_eq!(out["practiceMode"], "exam-prep");
        assert_eq!(out["daysUntilExam"], 3);
    }

    #[tokio::test]
    async fn test_set_exam_date_rejects_garbage() {
        let err = call(&context(), "set_exam_date", serde_json::json!({ "date": "soon" }))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid date"));
    }

    #[tokio::test]
    async fn test_set_mood_and_reset() {
        let ctx = context();
        let out = call(&ctx, "set_mood", serde_json::json!({ "mood": 2 })).await.unwrap();
        assert_eq!(out["currentMood"], 2);
        let out = call(&ctx, "reset_progress", serde_json::json!({})).await.unwrap();
        assert_eq!(out["currentMood"], Value::Null);
    }

    #[tokio::test]
    async fn test_get_questions_tool() {
        let out = call(
            &context(),
            "get_questions",
            serde_json::json!({ "subject": "chemistry", "difficulty": 1, "limit": 3 }),
        )
        .await
        .unwrap();
        let questions = out["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 3);
        assert!(questions.iter().all(|q| q["subject"] == "chemistry" && q["difficulty"] == 1));
    }

    #[tokio::test]
    async fn test_question_stats_tool() {
        let out = call(&context(), "get_question_stats", serde_json::json!({})).await.unwrap();
        assert_eq!(out["total"], 57);
        assert_eq!(out["topics"]["chemistry"][1], "Periodic Table");
    }

    #[tokio::test]
    async fn test_ai_tools_fall_back_when_disabled() {
        let ctx = context();
        let out = call(
            &ctx,
            "classify_mistake_ai",
            serde_json::json!({ "question_id": "jee-2", "selected_answer": "a" }),
        )
        .await
        .unwrap();
        assert_eq!(out["mistakeType"], "careless");

        let out = call(&ctx, "detect_panic_level_ai", serde_json::json!({ "message": "I can't do this" }))
            .await
            .unwrap();
        assert_eq!(out["panicLevel"], "high");

        let out = call(&ctx, "analyze_study_pattern_ai", serde_json::json!({})).await.unwrap();
        assert_eq!(out["estimatedReadiness"], "low");

        let out = call(&ctx, "generate_encouragement_ai", serde_json::json!({})).await.unwrap();
        assert!(out["message"].as_str().unwrap().contains("progress"));
    }
}
