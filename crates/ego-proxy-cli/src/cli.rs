//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ego-proxy - calendar-aware personal assistant
#[derive(Debug, Parser)]
#[command(name = "ego-proxy")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "EGO_PROXY_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Authentication commands
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// Google Calendar commands
    Calendar {
        #[command(subcommand)]
        action: CalendarAction,
    },

    /// Extract metadata (people, topics, dates, sentiment) from a message
    Analyze {
        /// The message to analyse
        #[arg(required = true)]
        message: Vec<String>,

        /// Use the built-in heuristics even when a language model is configured
        #[arg(long)]
        simple: bool,
    },

    /// Resolve a natural-language date such as "next friday at 3pm"
    ParseDate {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Authenticate with Google Calendar
    Google {
        /// Path to the OAuth client-secret JSON downloaded from Google Cloud Console
        ///
        /// Takes precedence over GOOGLE_CREDENTIALS_PATH and the configuration
        /// file, and is saved to the configuration file so later commands find it.
        #[arg(long)]
        credentials_file: Option<PathBuf>,

        /// Force re-authentication even if already authenticated
        #[arg(long, short)]
        force: bool,
    },

    /// Show the authentication state of each account
    Status,

    /// Renew the access token of the configured account
    Refresh,

    /// Delete stored tokens
    Revoke {
        /// Delete the tokens of every account
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum CalendarAction {
    /// Create an event from a request such as "add meeting tomorrow at 3pm"
    Add {
        #[arg(required = true)]
        message: Vec<String>,

        /// Show the event that would be created without creating it
        #[arg(long)]
        dry_run: bool,
    },

    /// List upcoming events
    Upcoming {
        /// Number of days to look ahead (1 to 3660)
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(u32).range(1..=MAX_UPCOMING_DAYS))]
        days: u32,

        /// Maximum number of events to show
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// List the calendars of the authenticated account
    Calendars,

    /// Delete an event by id
    Delete { event_id: String },
}

/// Longest look-ahead accepted by `calendar upcoming`, about ten years.
pub const MAX_UPCOMING_DAYS: i64 = 3660;

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
