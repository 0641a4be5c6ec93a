//! Keepsake - secrets client with an encrypted offline fallback
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use keepsake::cli::{Cli, Commands};
use keepsake::config::{Config, ConfigManager};
use keepsake::error::KeepsakeResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KeepsakeResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    if let Commands::Completions { shell } = cli.command {
        keepsake::cli::commands::completions(shell);
        return Ok(());
    }

    let config_manager = match cli.config_file {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Download(args) => keepsake::cli::commands::download(args, &config).await,
        Commands::Paths(args) => keepsake::cli::commands::paths(args, &config).await,
        Commands::Config(args) => {
            keepsake::cli::commands::config(args, &config, &config_manager).await
        }
        Commands::Completions { .. } => unreachable!("Completions handled above"),
    }
}

/// 0 = warn, 1 = info, 2+ = debug. `RUST_LOG` wins when set.
fn init_logging(verbose: u8, config: &Config) {
    let default = match verbose {
        0 => "keepsake=warn",
        1 => "keepsake=info",
        _ => "keepsake=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
