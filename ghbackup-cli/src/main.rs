//! gh-backup - back up every repository of a GitHub user or organization
//!
//! Lists the account's repositories, clones the selected ones into a
//! timestamped directory, and optionally packs the result into a zip archive.

mod commands;
mod prompt;

use std::process::ExitCode;

use clap::Parser;
use ghbackup_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::BackupArgs;
use prompt::ConsolePrompt;

/// Back up every repository of a GitHub user or organization
#[derive(Parser, Debug)]
#[command(name = "gh-backup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(flatten)]
    backup: BackupArgs,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load configuration with overrides
    let config = Config::load_with_overrides(
        cli.backup.api_url.clone(),
        cli.backup.git.clone(),
        cli.backup.jobs,
    )?;

    if cli.verbose {
        tracing::info!(
            api_origin = %config.github.api_origin,
            git_path = %config.clone.git_path,
            concurrency = config.clone.concurrency,
            "Configuration loaded"
        );
    }

    cli.backup
        .execute(cli.verbose, &config, &ConsolePrompt)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbose_flag() {
        let cli = Cli::try_parse_from(["gh-backup", "-v", "alice"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.backup.name, "alice");
    }
}
