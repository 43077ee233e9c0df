//! # Learning Harness CLI (`lh`)
//!
//! The `lh` binary serves the learning-report HTTP API and can run the whole
//! research → report pipeline once from the command line.
//!
//! ## Usage
//!
//! ```bash
//! lh --config ./config/lh.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lh serve` | Start the HTTP server |
//! | `lh questions` | Print the clarification questionnaire as JSON |
//! | `lh report <topic>` | Research, index and write a report in one go |
//!
//! ## Examples
//!
//! ```bash
//! # Start the API for the web client
//! lh serve --config ./config/lh.toml
//!
//! # One-shot report with questionnaire answers
//! lh report "Quantum Computing" \
//!     --objective "understand qubits" \
//!     --answer familiarity=Beginner --answer format="Code examples" \
//!     --output quantum.md
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use learning_harness::config::load_config;
use learning_harness::server::run_server;
use learning_harness::service::{LearningService, ResearchRequest};
use learning_harness_core::models::PreferenceOverrides;
use learning_harness_core::preferences::clarification_questions;

/// Learning Harness CLI: turn a topic into a personalized learning report.
///
/// Commands that talk to providers read a TOML configuration file given by
/// `--config`. See `config/lh.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lh",
    about = "Learning Harness: research a topic and generate a personalized learning report",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/lh.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Print the clarification questions as JSON.
    ///
    /// Needs no configuration file.
    Questions {
        /// Topic interpolated into the questions.
        #[arg(long)]
        topic: Option<String>,
    },

    /// Research a topic and generate a report in one run.
    Report {
        /// Topic to research.
        topic: String,

        /// Learning objective (repeatable).
        #[arg(long = "objective")]
        objectives: Vec<String>,

        /// Questionnaire answer as `id=value` (repeatable), e.g. `familiarity=Advanced`.
        #[arg(long = "answer", value_parser = parse_answer)]
        answers: Vec<(String, String)>,

        /// Write the report here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn parse_answer(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected id=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty answer id in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "learning_harness=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_config(&cli.config)?;
            run_server(&config).await?;
        }
        Commands::Questions { topic } => {
            let questions = clarification_questions(topic.as_deref());
            println!("{}", serde_json::to_string_pretty(&questions)?);
        }
        Commands::Report {
            topic,
            objectives,
            answers,
            output,
        } => {
            let config = load_config(&cli.config)?;
            config.require_providers()?;
            let service = LearningService::from_config(&config)?;

            let research = service
                .research(ResearchRequest {
                    topic: topic.clone(),
                    objectives,
                    session_id: None,
                })
                .await?;
            eprintln!("{}", research.summary);

            let mut answers: HashMap<String, String> = answers.into_iter().collect();
            answers.entry("topic".to_string()).or_insert(topic);
            service
                .analyze_preferences(&answers, Some(&research.session_id))
                .await?;

            let report = service
                .generate_report(&research.session_id, &PreferenceOverrides::default())
                .await?;

            match output {
                Some(path) => {
                    std::fs::write(&path, &report)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    eprintln!("Report written to {}", path.display());
                }
                None => println!("{}", report),
            }
        }
    }

    Ok(())
}
