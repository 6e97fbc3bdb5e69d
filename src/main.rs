//! # AdaptIQ CLI (`adaptiq`)
//!
//! Classify learner messages, pull practice questions, record answers and
//! inspect progress from the terminal, or start the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! adaptiq --config ./config/adaptiq.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `adaptiq classify "<text>"` | Time budget, stress and topics of a message |
//! | `adaptiq exam-timing "<text>"` | Hours until the exam and panic level |
//! | `adaptiq plan "<text>"` | Plan a session from a message and stored progress |
//! | `adaptiq questions` | Pick questions from the bank |
//! | `adaptiq question <id>` | Show one question |
//! | `adaptiq bank-stats` | Question counts and topics |
//! | `adaptiq answer <id> <a-d>` | Record an answer |
//! | `adaptiq stats` | Progress overview |
//! | `adaptiq exam-date <YYYY-MM-DD>` | Set (or `--clear`) the exam date |
//! | `adaptiq mood <1-5>` | Set (or `--clear`) the mood |
//! | `adaptiq reset` | Erase all progress |
//! | `adaptiq analyze '<json>'` | Run a model analysis request |
//! | `adaptiq tools list` | List tools and their schemas |
//! | `adaptiq tools call <name>` | Call a tool with `--param key=value` |
//! | `adaptiq serve` | Start the HTTP server |
//!
//! Structured results go to stdout as JSON; logs go to stderr
//! (`RUST_LOG=debug adaptiq ...`).

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use adaptiq::analysis::{analyze, analyze_or_fallback, create_client, AnalysisRequest};
use adaptiq::classify::analyze_user_input;
use adaptiq::clock::SystemClock;
use adaptiq::config::{self, Config};
use adaptiq::exam_timing::parse_exam_timing;
use adaptiq::models::{Difficulty, MistakeType, Mood, OptionKey, Subject};
use adaptiq::progress::{AnswerSubmission, ProgressTracker};
use adaptiq::questions::{self, QuestionFilter};
use adaptiq::session::plan_session;
use adaptiq::store::FileStore;
use adaptiq::tools::{ToolContext, ToolRegistry};
use adaptiq::{server, stats};

/// AdaptIQ — adaptive JEE practice from the command line.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "adaptiq",
    about = "AdaptIQ — adaptive exam practice that reads how much time you have and how you feel",
    version
)]
struct Cli {
    #[arg(long, global = true, default_value = "./config/adaptiq.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a message into time budget, stress level and topics
    Classify { input: String },

    /// Estimate hours until the exam and the panic level of a message
    ExamTiming { input: String },

    /// Plan a practice session from a message and the stored progress
    Plan { input: String },

    /// Pick questions from the bank
    Questions {
        #[arg(long)]
        subject: Option<Subject>,

        #[arg(long)]
        topic: Option<String>,

        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        difficulty: Option<u8>,

        #[arg(long, default_value_t = 5)]
        limit: usize,

        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Show one question
    Question { id: String },

    /// Question counts by subject and difficulty
    BankStats,

    /// Record an answer to a bank question
    Answer {
        id: String,

        selected: OptionKey,

        /// Seconds spent on the question
        #[arg(long, default_value_t = 0)]
        time_spent: u32,

        #[arg(long)]
        mistake: Option<MistakeType>,
    },

    /// Progress overview
    Stats,

    /// Set the exam date
    ExamDate {
        #[arg(required_unless_present = "clear")]
        date: Option<NaiveDate>,

        #[arg(long)]
        clear: bool,
    },

    /// Set the current mood, 1 (awful) to 5 (great)
    Mood {
        #[arg(required_unless_present = "clear", value_parser = clap::value_parser!(u8).range(1..=5))]
        value: Option<u8>,

        #[arg(long)]
        clear: bool,
    },

    /// Erase all recorded progress
    Reset,

    /// Run a model analysis request (`-` reads it from stdin)
    Analyze {
        request: String,

        /// Answer from offline heuristics when the model call fails
        #[arg(long)]
        fallback: bool,
    },

    Tools {
        #[command(subcommand)]
        action: ToolsAction,
    },

    /// Start the HTTP server
    Serve,
}

#[derive(Subcommand)]
enum ToolsAction {
    List,
    Call {
        name: String,
        #[arg(long = "param", value_parser = parse_key_val)]
        params: Vec<(String, String)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no '=' found in '{}'", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_tracker(cfg: &Config) -> ProgressTracker {
    ProgressTracker::open(
        FileStore::new(&cfg.storage.dir),
        SystemClock,
        cfg.storage.key.clone(),
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config_or_default(&cli.config)?;

    match cli.command {
        Commands::Classify { input } => {
            print_json(&analyze_user_input(&input))?;
        }
        Commands::ExamTiming { input } => {
            print_json(&parse_exam_timing(&input))?;
        }
        Commands::Plan { input } => {
            let tracker = open_tracker(&cfg);
            let session = plan_session(
                &analyze_user_input(&input),
                tracker.days_until_exam(),
                tracker.progress().current_mood,
                &tracker.weak_topics(),
            );
            print_json(&session)?;
        }
        Commands::Questions {
            subject,
            topic,
            difficulty,
            limit,
            exclude,
        } => {
            let filter = QuestionFilter {
                subject,
                topic,
                difficulty: difficulty
                    .map(Difficulty::try_from)
                    .transpose()
                    .map_err(anyhow::Error::msg)?,
                limit: Some(limit),
                exclude_ids: exclude,
            };
            let found = questions::get_questions(&filter, &mut rand::thread_rng());
            print_json(&found)?;
        }
        Commands::Question { id } => {
            let question = questions::get_question_by_id(&id)
                .with_context(|| format!("question not found: {}", id))?;
            print_json(question)?;
        }
        Commands::BankStats => {
            print_json(&questions::question_stats())?;
        }
        Commands::Answer {
            id,
            selected,
            time_spent,
            mistake,
        } => {
            let question = questions::get_question_by_id(&id)
                .with_context(|| format!("question not found: {}", id))?;
            let mut tracker = open_tracker(&cfg);
            let record = tracker.record_answer(AnswerSubmission::for_question(
                question, selected, time_spent, mistake,
            ));
            print_json(&serde_json::json!({
                "record": record,
                "isCorrect": record.is_correct(),
                "correctAnswer": question.correct_answer,
                "explanation": question.explanation,
                "accuracy": tracker.accuracy(),
                "currentStreak": tracker.progress().current_streak,
            }))?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg)?;
        }
        Commands::ExamDate { date, clear } => {
            let mut tracker = open_tracker(&cfg);
            tracker.set_exam_date(if clear { None } else { date });
            match tracker.days_until_exam() {
                Some(days) => println!(
                    "Exam date set to {} ({} days away).",
                    tracker.progress().exam_date.map(|d| d.to_string()).unwrap_or_default(),
                    days
                ),
                None => println!("Exam date cleared."),
            }
        }
        Commands::Mood { value, clear } => {
            let mood = if clear {
                None
            } else {
                value.map(Mood::try_from).transpose().map_err(anyhow::Error::msg)?
            };
            let mut tracker = open_tracker(&cfg);
            tracker.set_mood(mood);
            match mood {
                Some(m) => println!("Mood set to {}/5.", m.value()),
                None => println!("Mood cleared."),
            }
        }
        Commands::Reset => {
            let mut tracker = open_tracker(&cfg);
            tracker.reset();
            println!("Progress reset.");
        }
        Commands::Analyze { request, fallback } => {
            let raw = if request == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                request
            };
            let request: AnalysisRequest =
                serde_json::from_str(&raw).context("Invalid analysis request")?;
            let client = create_client(&cfg.analysis)?;
            let response = if fallback {
                analyze_or_fallback(client.as_ref(), &request).await
            } else {
                analyze(client.as_ref(), &request).await?
            };
            print_json(&response)?;
        }
        Commands::Tools { action } => match action {
            ToolsAction::List => {
                print_json(&ToolRegistry::with_builtins().infos())?;
            }
            ToolsAction::Call { name, params } => {
                let mut obj = serde_json::Map::new();
                for (key, value) in params {
                    // numbers, booleans and arrays pass through as JSON
                    let parsed = serde_json::from_str(&value)
                        .unwrap_or(serde_json::Value::String(value));
                    obj.insert(key, parsed);
                }
                let ctx = ToolContext::new(
                    Arc::new(Mutex::new(open_tracker(&cfg))),
                    create_client(&cfg.analysis)?,
                );
                let result = ToolRegistry::with_builtins()
                    .invoke(&name, &serde_json::Value::Object(obj), &ctx)
                    .await?;
                print_json(&result)?;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
