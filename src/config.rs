//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::{Parser, Subcommand, ValueEnum};

use crate::{
    session::{SessionKind, MAX_DURATION_MINUTES},
    timer::CompletionMode,
};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "earnquest-timer")]
#[command(about = "Drift-free session timer for EarnQuest screen-time rewards and timed tasks")]
#[command(version)]
pub struct Config {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the in-memory session service
    Serve(ServeArgs),
    /// Start a session on a service and count it down in the terminal
    Run(RunArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20560")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Seconds between expiry sweeps
    #[arg(long, default_value = "30")]
    pub sweep_interval: u64,

    /// Seconds an expired session may wait for its client before the sweep completes it
    #[arg(long, default_value = "120")]
    pub grace: u64,
}

impl ServeArgs {
    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Task,
    Reward,
}

impl From<KindArg> for SessionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Task => SessionKind::Task,
            KindArg::Reward => SessionKind::Reward,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Base URL of the session service
    #[arg(short, long, default_value = "http://127.0.0.1:20560")]
    pub server: String,

    /// What the session is for
    #[arg(short, long, value_enum, default_value = "reward")]
    pub kind: KindArg,

    /// Task or reward identifier
    #[arg(long, default_value = "screen-time")]
    pub context_id: String,

    /// Session length in minutes (at most one day)
    #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..=MAX_DURATION_MINUTES as u64))]
    pub minutes: u64,

    /// Seconds between progress saves
    #[arg(long, default_value = "15")]
    pub save_interval: u64,

    /// Sound sample played on completion
    #[arg(long)]
    pub sound: Option<PathBuf>,

    /// Ask for confirmation at zero; the prompt closes itself after this many seconds
    #[arg(long)]
    pub confirm_after: Option<u64>,
}

impl RunArgs {
    pub fn total_seconds(&self) -> u64 {
        self.minutes * 60
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval.max(1))
    }

    pub fn completion_mode(&self) -> CompletionMode {
        match self.confirm_after {
            Some(secs) => CompletionMode::Confirm {
                auto_close: Duration::from_secs(secs),
            },
            None => CompletionMode::Automatic,
        }
    }
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_defaults() {
        let config = Config::try_parse_from(["earnquest-timer", "serve"]).unwrap();
        assert_eq!(config.log_level(), "info");
        match config.command {
            Command::Serve(args) => {
                assert_eq!(args.address(), "127.0.0.1:20560");
                assert_eq!(args.grace, 120);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn run_with_confirmation() {
        let config = Config::try_parse_from([
            "earnquest-timer",
            "run",
            "--kind",
            "task",
            "--minutes",
            "20",
            "--confirm-after",
            "30",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.log_level(), "debug");
        match config.command {
            Command::Run(args) => {
                assert_eq!(SessionKind::from(args.kind), SessionKind::Task);
                assert_eq!(args.minutes, 20);
                assert_eq!(
                    args.completion_mode(),
                    CompletionMode::Confirm {
                        auto_close: Duration::from_secs(30)
                    }
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn minutes_outside_one_day_are_refused() {
        for minutes in ["0", "1441", "307445734561825861"] {
            let parsed = Config::try_parse_from(["earnquest-timer", "run", "--minutes", minutes]);
            assert!(parsed.is_err(), "{} minutes accepted", minutes);
        }

        let config = Config::try_parse_from(["earnquest-timer", "run", "--minutes", "1440"]).unwrap();
        match config.command {
            Command::Run(args) => assert_eq!(args.total_seconds(), 86_400),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
