//! CLI entrypoint for triad
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;

use anyhow::{Context, Result, anyhow, bail};
use args::Cli;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use triad_application::ConsensusEngine;
use triad_domain::event::names;
use triad_domain::{ConsensusResult, EngineEvent};
use triad_infrastructure::{ConfigLoader, FileConfig, JsonlEventLogger, build_roster};

/// The run ended in ERROR or could not start
const EXIT_RUN_FAILED: u8 = 4;
/// Interrupted with Ctrl-C
const EXIT_CANCELLED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(EXIT_RUN_FAILED)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    if cli.show_config {
        show_config(&cli)?;
        return Ok(0);
    }

    let config = load_config(&cli)?;
    let log_dir = cli.log_dir.as_deref().or(config.logging.dir.as_deref());
    let _log_guard = init_tracing(cli.verbose, log_dir);

    let issues = config.validate();
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!(code = ?issue.code, "{}", issue.message);
    }
    let errors: Vec<String> = issues
        .iter()
        .filter(|i| i.is_error())
        .map(|i| i.to_string())
        .collect();
    if !errors.is_empty() {
        bail!("invalid configuration:\n  {}", errors.join("\n  "));
    }

    let Some(prompt) = cli.prompt.as_deref() else {
        bail!("a prompt is required (see --help)");
    };

    // === Dependency Injection ===
    let engine = ConsensusEngine::new(build_roster(&config), config.engine_config()?)?;
    let event_log = cli
        .event_log
        .as_deref()
        .or(config.logging.event_log.as_deref())
        .and_then(JsonlEventLogger::new);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling run");
                cancel.cancel();
            }
        });
    }

    info!(agents = ?engine.agent_ids(), "Starting triad");
    let mut stream = engine.run_stream(prompt, cancel)?;
    let mut outcome = Outcome::Unfinished;
    while let Some(event) = stream.next_event().await {
        if let Some(logger) = &event_log {
            logger.log(&event);
        }
        if cli.stream {
            println!("{}", event.to_json());
        }
        outcome.observe(&event);
    }

    match outcome {
        Outcome::Resolved(result) => {
            if !cli.stream {
                print_result(&result);
            }
            Ok(u8::try_from(result.exit_code).unwrap_or(EXIT_RUN_FAILED))
        }
        Outcome::Failed(reason) => {
            eprintln!("run failed: {}", reason);
            Ok(EXIT_RUN_FAILED)
        }
        Outcome::Cancelled => {
            eprintln!("run cancelled");
            Ok(EXIT_CANCELLED)
        }
        Outcome::Unfinished => Err(anyhow!("event stream ended before the run finished")),
    }
}

/// How a run ended, as seen from its events
enum Outcome {
    Unfinished,
    Resolved(Box<ConsensusResult>),
    Failed(String),
    Cancelled,
}

impl Outcome {
    fn observe(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Result { result } => *self = Outcome::Resolved(result.clone()),
            EngineEvent::Event { name, data } if name == names::RUN_FAILED => {
                let reason = data
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("unknown");
                *self = Outcome::Failed(reason.to_string());
            }
            EngineEvent::Event { name, .. } if name == names::RUN_CANCELLED => {
                *self = Outcome::Cancelled;
            }
            _ => {}
        }
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    if cli.no_config {
        return Ok(ConfigLoader::load_defaults());
    }
    ConfigLoader::load(cli.config.as_deref())
        .map_err(|e| anyhow!("{}", e))
        .context("loading configuration")
}

fn show_config(cli: &Cli) -> Result<()> {
    println!("Configuration sources (in priority order):");
    for source in ConfigLoader::sources(cli.config.as_deref()) {
        let mark = if source.found { "FOUND" } else { "     " };
        println!("  [{}] {:<8} {}", mark, source.label, source.path.display());
    }
    println!("  [     ] Default  built-in defaults");
    println!();
    let config = load_config(cli)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Console subscriber by verbosity, plus daily files when `log_dir` is set.
///
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing(verbose: u8, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "triad.log"));
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
            None
        }
    }
}

fn print_result(result: &ConsensusResult) {
    println!();
    println!("Decision: {}  {}", result.final_decision, result.vote_summary());
    for vote in &result.votes {
        let confidence = vote
            .confidence
            .map(|c| format!(" ({:.0}%)", c * 100.0))
            .unwrap_or_default();
        println!(
            "  {:<7} {}{}: {}",
            vote.agent,
            vote.decision.as_str(),
            confidence,
            vote.reasoning.lines().next().unwrap_or_default()
        );
    }
    if !result.conditions.is_empty() {
        println!();
        println!("Conditions:");
        for condition in &result.conditions {
            println!("  - {}", condition);
        }
    }
    if result.partial {
        println!();
        println!(
            "Note: decided without {}",
            result
                .quorum
                .excluded
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use triad_domain::Phase;

    #[test]
    fn test_outcome_tracks_terminal_events() {
        let mut outcome = Outcome::Unfinished;
        outcome.observe(&EngineEvent::transition(Phase::Thinking));
        assert!(matches!(outcome, Outcome::Unfinished));

        outcome.observe(&EngineEvent::named(
            names::RUN_FAILED,
            json!({ "reason": "quorum_exhausted" }),
        ));
        assert!(matches!(outcome, Outcome::Failed(ref r) if r == "quorum_exhausted"));

        outcome.observe(&EngineEvent::named(names::RUN_CANCELLED, json!({})));
        assert!(matches!(outcome, Outcome::Cancelled));
    }
}
