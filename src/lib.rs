//! # AdaptIQ
//!
//! Adaptive exam-preparation core for JEE practice.
//!
//! AdaptIQ reads what a learner says ("I have 20 minutes, I'm so stressed
//! about calculus"), classifies it into a time budget, a stress level and
//! topic preferences, plans a practice session, serves questions from a
//! built-in bank and tracks answers into a persisted progress record with
//! streaks, per-topic accuracy and mistake patterns.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  classify   │──▶│   session   │◀──│   progress   │──▶ ProgressStore
//! │ exam_timing │   │   planning  │   │   tracker    │    (file / memory)
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                             │
//!                      ┌──────────────────────┤
//!                      ▼                      ▼
//!                 ┌──────────┐          ┌──────────┐
//!                 │   CLI    │          │   HTTP   │──▶ analysis (model)
//!                 │(adaptiq) │          │  tools   │
//!                 └──────────┘          └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! adaptiq classify "only 10 min, kind of stressed"
//! adaptiq questions --subject physics --limit 3
//! adaptiq answer jee-1 b --mistake careless
//! adaptiq stats
//! adaptiq serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Subjects, options, difficulty, mistake types, questions |
//! | [`classify`] | Time, stress and topic classification of free text |
//! | [`exam_timing`] | Hours-until-exam and panic heuristic |
//! | [`progress`] | Progress record, tracker and statistics |
//! | [`store`] | Key-value persistence for the progress record |
//! | [`clock`] | Local date and time source |
//! | [`questions`] | Static question bank |
//! | [`session`] | Practice session planning |
//! | [`analysis`] | Model-backed analysis with offline fallbacks |
//! | [`tools`] | Tool trait, registry and parameter validation |
//! | [`server`] | HTTP server |
//! | [`stats`] | Human-readable progress summary |
//! | [`config`] | TOML configuration parsing |

pub mod analysis;
pub mod classify;
pub mod clock;
pub mod config;
pub mod exam_timing;
pub mod models;
pub mod progress;
pub mod questions;
pub mod server;
pub mod session;
pub mod stats;
pub mod store;
pub mod tools;
