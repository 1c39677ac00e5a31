//! CLI for devlern.
//!
//! Turns free-text tasks into device actions through the learning agent,
//! collects feedback and inspects or exports the learned table. Machine
//! output goes to stdout, diagnostics to stderr.

mod executor;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devlern_core::{DecisionSink, Executor};
use devlern_feedback::{Agent, AgentConfig, FeedbackSign, JsonlSink, NullSink, TaskResult};
use executor::SimulatedExecutor;
use serde_json::{json, Value};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON file with agent configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Primary table file (default: models/qtable.json)
    #[arg(long, global = true)]
    table: Option<PathBuf>,

    /// Decision log (default: logs/decisions.jsonl)
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    /// Initial exploration rate, also its upper bound
    #[arg(long, global = true)]
    epsilon: Option<f64>,

    /// Seed for exploration and task ids
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read tasks and feedback from stdin, one per line
    Run,
    /// Process one task and end the episode
    Task {
        /// Free-text task description
        text: String,

        /// Context entry as key=value (repeatable)
        #[arg(long = "context", value_parser = parse_context_entry)]
        context: Vec<(String, Value)>,

        /// Feedback for the decision: positive, negative, +, -, ...
        #[arg(long)]
        feedback: Option<String>,

        /// Action that should have been taken (used with negative feedback)
        #[arg(long)]
        suggest: Option<String>,
    },
    /// Print learning statistics
    Stats,
    /// Suggest actions for a task, or for the most visited state
    Suggest { text: Option<String> },
    /// Write the CSV export and metadata sidecar
    Export,
    /// List the action catalog
    Actions,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    tracing::debug!(
        table = %config.table_path.display(),
        log = %config.log_path.display(),
        "configuration loaded"
    );

    match cli.command {
        Commands::Actions => {
            for action in SimulatedExecutor::default().list_actions() {
                println!("{action}");
            }
        }
        Commands::Task {
            text,
            context,
            feedback,
            suggest,
        } => {
            let sink = JsonlSink::open(&config.log_path)
                .with_context(|| format!("Failed to open log {}", config.log_path.display()))?;
            let mut agent = Agent::new(&config, SimulatedExecutor::default(), sink)?;
            let context: devlern_core::Context = context.into_iter().collect();
            let result =
                agent.process_task(&text, (!context.is_empty()).then_some(&context));
            println!("{}", serde_json::to_string(&result)?);

            if let Some(raw) = feedback {
                let sign = FeedbackSign::parse(&raw);
                let total = agent.apply_feedback(sign, suggest.as_deref());
                println!(
                    "{}",
                    json!({"feedback": sign, "totalReward": total, "explorationRate": agent.table().exploration_rate()})
                );
            }
            agent.end_episode();
            agent.close().context("Failed to close decision log")?;
        }
        Commands::Stats => {
            let agent = Agent::new(&config, SimulatedExecutor::default(), NullSink)?;
            println!("{}", serde_json::to_string_pretty(&agent.learning_statistics())?);
        }
        Commands::Suggest { text } => {
            let agent = Agent::new(&config, SimulatedExecutor::default(), NullSink)?;
            println!("{}", serde_json::to_string_pretty(&agent.suggest(text.as_deref()))?);
        }
        Commands::Export => {
            let agent = Agent::new(&config, SimulatedExecutor::default(), NullSink)?;
            let path = agent.export().context("Export failed")?;
            println!("{}", path.display());
        }
        Commands::Run => {
            let sink = JsonlSink::open(&config.log_path)
                .with_context(|| format!("Failed to open log {}", config.log_path.display()))?;
            let agent = Agent::new(&config, SimulatedExecutor::default(), sink)?;
            let stdin = io::stdin();
            run_session(agent, stdin.lock(), io::stdout().lock())?;
        }
    }

    Ok(())
}

/// Defaults, then the config file, then individual flags.
fn load_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => AgentConfig::default(),
    };
    if let Some(table) = &cli.table {
        config.table_path = table.clone();
    }
    if let Some(log) = &cli.log {
        config.log_path = log.clone();
    }
    if let Some(epsilon) = cli.epsilon {
        config.learning.epsilon = epsilon;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    Ok(config)
}

fn read_config(path: &Path) -> Result<AgentConfig> {
    let file =
        File::open(path).with_context(|| format!("Failed to open config {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Invalid config {}", path.display()))
}

/// `key=value`; booleans and numbers become JSON scalars, the rest strings.
fn parse_context_entry(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty context key in {raw:?}"));
    }
    let value = match serde_json::from_str::<Value>(value.trim()) {
        Ok(v @ (Value::Bool(_) | Value::Number(_))) => v,
        _ => Value::String(value.trim().to_string()),
    };
    Ok((key.to_string(), value))
}

#[derive(Debug, PartialEq)]
enum Line<'a> {
    Quit,
    Stats,
    Suggest(Option<&'a str>),
    EndEpisode,
    Feedback(FeedbackSign, Option<&'a str>),
    Task(&'a str),
}

/// A line is feedback when it is a bare sign, or a sign followed by one
/// known action.
fn classify<'a>(line: &'a str, is_action: impl Fn(&str) -> bool) -> Line<'a> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        ["quit" | "exit"] => return Line::Quit,
        ["stats"] => return Line::Stats,
        ["end"] => return Line::EndEpisode,
        ["suggest", ..] => {
            let rest = line.trim_start()["suggest".len()..].trim();
            return Line::Suggest((!rest.is_empty()).then_some(rest));
        }
        _ => {}
    }
    match tokens.as_slice() {
        [sign] if FeedbackSign::parse(sign) != FeedbackSign::Neutral => {
            Line::Feedback(FeedbackSign::parse(sign), None)
        }
        [sign, action] if FeedbackSign::parse(sign) != FeedbackSign::Neutral && is_action(action) => {
            Line::Feedback(FeedbackSign::parse(sign), Some(*action))
        }
        _ => Line::Task(line.trim()),
    }
}

fn run_session<E, S, R, W>(mut agent: Agent<E, S>, input: R, mut out: W) -> Result<()>
where
    E: Executor,
    S: DecisionSink,
    R: BufRead,
    W: Write,
{
    for line in input.lines() {
        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        match classify(&line, |a| agent.catalog().contains(a)) {
            Line::Quit => break,
            Line::Stats => {
                writeln!(out, "{}", serde_json::to_string_pretty(&agent.learning_statistics())?)?;
            }
            Line::Suggest(text) => {
                for s in agent.suggest(text) {
                    writeln!(out, "{} ({:.2}): {}", s.action, s.confidence, s.reasoning)?;
                }
            }
            Line::EndEpisode => match agent.end_episode() {
                Some(summary) => writeln!(
                    out,
                    "episode complete: reward {:.2}, confidence {:.2}, success {:.0}%, {} tasks",
                    summary.total_reward,
                    summary.average_confidence,
                    summary.success_rate * 100.0,
                    summary.tasks
                )?,
                None => writeln!(out, "nothing to end")?,
            },
            Line::Feedback(sign, suggested) => {
                if agent.episode().is_empty() {
                    writeln!(out, "no task to give feedback on")?;
                    continue;
                }
                let total = agent.apply_feedback(sign, suggested);
                writeln!(
                    out,
                    "{sign} feedback, total reward {total:.2}, exploration {:.3}",
                    agent.table().exploration_rate()
                )?;
            }
            Line::Task(text) => {
                let result = agent.process_task(text, None);
                render(&mut out, &result)?;
            }
        }
    }
    agent.close().context("Failed to close decision log")?;
    Ok(())
}

fn render(out: &mut impl Write, r: &TaskResult) -> io::Result<()> {
    writeln!(out, "{} intent {} -> {} [{}]", r.task_id, r.intent, r.action, r.mode)?;
    writeln!(
        out,
        "  confidence {:.2} ({}), {}: {}",
        r.confidence,
        r.confidence_category,
        if r.success { "ok" } else { "failed" },
        r.message
    )?;
    let alternatives: Vec<String> = r
        .alternatives
        .iter()
        .map(|a| format!("{}({:.2})", a.action, a.value))
        .collect();
    writeln!(out, "  alternatives: {}", alternatives.join(", "))
}
