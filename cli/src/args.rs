//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

/// CLI arguments for triad
#[derive(Parser, Debug)]
#[command(name = "triad")]
#[command(author, version, about = "Three agents think, debate and vote on a prompt")]
#[command(long_about = r#"
Triad puts a prompt to three agents (claude, codex, gemini) and reaches a
decision under a quorum rule.

The run has three phases:
1. Thinking: every agent answers independently
2. Debate: agents respond to each other's positions
3. Voting: every agent votes APPROVE, REJECT or CONDITIONAL

Exit status: 0 approved, 1 rejected, 2 no consensus, 3 conditional,
4 the run failed, 130 interrupted.

Configuration files are loaded from (in priority order):
1. --config <path>     Explicit config file
2. ./triad.toml        Project-level config
3. ~/.config/triad/config.toml   Global config

Example:
  triad "Should we replace the job queue with Postgres LISTEN/NOTIFY?"
  triad --stream -v "Is this migration safe to run online?"
"#)]
pub struct Cli {
    /// The prompt to decide on
    pub prompt: Option<String>,

    /// Print every engine event as a JSON line while the run progresses
    #[arg(long)]
    pub stream: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration sources and the merged configuration, then exit
    #[arg(long)]
    pub show_config: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Write every engine event to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub event_log: Option<PathBuf>,

    /// Also write logs to daily-rotated files in this directory
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "triad",
            "--stream",
            "-vv",
            "--event-log",
            "run.jsonl",
            "Ship it?",
        ])
        .unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("Ship it?"));
        assert!(cli.stream);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.event_log, Some(PathBuf::from("run.jsonl")));
        assert!(!cli.no_config);
    }

    #[test]
    fn test_prompt_is_optional_for_show_config() {
        let cli = Cli::try_parse_from(["triad", "--show-config"]).unwrap();
        assert!(cli.show_config);
        assert!(cli.prompt.is_none());
    }
}
