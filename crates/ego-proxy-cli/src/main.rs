//! ego-proxy CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use ego_proxy_core::{TracingConfig, init_tracing};

use ego_proxy_cli::cli::{AuthAction, CalendarAction, Cli, Command, ConfigAction};
use ego_proxy_cli::commands;
use ego_proxy_cli::config::ClientConfig;
use ego_proxy_cli::error::ClientResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing_config = if cli.verbose {
        TracingConfig::verbose()
    } else {
        TracingConfig::quiet()
    };
    if let Err(e) = init_tracing(tracing_config) {
        eprintln!("warning: could not initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = ClientConfig::load(cli.config.as_deref())?;
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);

    match cli.command {
        Command::Auth { action } => match action {
            AuthAction::Google {
                credentials_file,
                force,
            } => commands::auth::google(&config, &config_path, credentials_file, force).await,
            AuthAction::Status => commands::auth::status(&config).await,
            AuthAction::Refresh => commands::auth::refresh(&config).await,
            AuthAction::Revoke { all } => commands::auth::revoke(&config, all),
        },
        Command::Calendar { action } => match action {
            CalendarAction::Add { message, dry_run } => {
                commands::calendar::add(&config, &message.join(" "), dry_run).await
            }
            CalendarAction::Upcoming { days, limit } => {
                commands::calendar::upcoming(&config, days, limit).await
            }
            CalendarAction::Calendars => commands::calendar::calendars(&config).await,
            CalendarAction::Delete { event_id } => {
                commands::calendar::delete(&config, &event_id).await
            }
        },
        Command::Analyze { message, simple } => {
            commands::analyze::analyze(&config, &message.join(" "), simple).await
        }
        Command::ParseDate { text } => commands::parse_date::parse_date(&text.join(" ")),
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
    }
}
