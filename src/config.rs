//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::{services::Permission, state::TimerMode};

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "multi-timer")]
#[command(about = "Run countdown and count-up timers with completion alerts")]
#[command(version = "1.0.0")]
pub struct Config {
    /// Directory holding persisted timers, history and settings
    #[arg(long, default_value = "timer-data")]
    pub data_dir: PathBuf,

    /// Directory containing `<name>.wav` completion sounds
    #[arg(long, default_value = "sounds")]
    pub sounds_dir: PathBuf,

    /// Create a countdown of this many seconds and start it
    #[arg(short, long, conflicts_with = "countup")]
    pub time: Option<u64>,

    /// Create a count-up timer and start it
    #[arg(long)]
    pub countup: bool,

    /// Label for the created timer
    #[arg(short, long)]
    pub label: Option<String>,

    /// Never show desktop notifications
    #[arg(long)]
    pub no_notifications: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Mode of the timer requested on the command line, if any
    pub fn requested_mode(&self) -> Option<TimerMode> {
        if self.countup {
            Some(TimerMode::Countup)
        } else if self.time.is_some() {
            Some(TimerMode::Countdown)
        } else {
            None
        }
    }

    /// Permission the notifier starts with
    pub fn initial_permission(&self) -> Permission {
        if self.no_notifications {
            Permission::Denied
        } else {
            Permission::Default
        }
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
