//! Command-line argument parsing for careline
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// careline - clinic assistant for patient messages
#[derive(Parser, Debug)]
#[command(name = "careline")]
#[command(version)]
#[command(about = "Route patient messages to emergency, scheduling, records and FAQ handlers", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level: default (warnings), -v (info), -vv (debug), -vvv (trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        /// Patient identifier to chat as
        #[arg(short, long)]
        patient: Option<String>,
    },

    /// Send a single message and print the reply
    Ask {
        /// Message text
        #[arg(value_name = "MESSAGE")]
        message: String,

        /// Patient identifier
        #[arg(short, long)]
        patient: Option<String>,

        /// Additional context passed to the handlers
        #[arg(long, default_value = "")]
        context: String,
    },

    /// Show stored conversation history for a patient
    History {
        #[arg(short, long)]
        patient: String,

        /// Number of most recent turns to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Clear stored conversation history for a patient
    Clear {
        #[arg(short, long)]
        patient: String,
    },

    /// Show recent emergency alerts
    Alerts {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Search patients in the record store
    Patients {
        /// Name or id fragment (lists everyone when omitted)
        query: Option<String>,
    },

    /// Display current configuration
    Config,

    /// Run configuration and connectivity checks
    Doctor,
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
    Trace,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                2 => Verbosity::VeryVerbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// Command to run, defaulting to an interactive chat
    pub fn command_or_default(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or(Commands::Chat { patient: None })
    }
}

impl Verbosity {
    /// Log filter directive for this verbosity, `None` when the config
    /// level should be used
    pub fn log_level(&self) -> Option<&'static str> {
        match self {
            Verbosity::Quiet => Some("error"),
            Verbosity::Normal => None,
            Verbosity::Verbose => Some("info"),
            Verbosity::VeryVerbose => Some("debug"),
            Verbosity::Trace => Some("trace"),
        }
    }

    /// Check if should show stage details after each reply
    pub fn show_details(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose | Verbosity::Trace)
    }
}
