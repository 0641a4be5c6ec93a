//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Keepsake - secrets client with an encrypted offline fallback
///
/// Fetches secrets from the API and keeps an encrypted snapshot on disk,
/// so reads keep working when the API cannot be reached.
#[derive(Parser, Debug)]
#[command(name = "keepsake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(long, global = true, env = "KEEPSAKE_CONFIG")]
    pub config_file: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download secrets, with encrypted offline fallback
    Download(DownloadArgs),

    /// Show where fallback files for an identity are stored
    Paths(PathsArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

/// Identity selection shared by commands that touch secrets
#[derive(Parser, Debug, Clone, Default)]
pub struct IdentityArgs {
    /// API token
    #[arg(long, env = "KEEPSAKE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Project (e.g. backend)
    #[arg(short, long)]
    pub project: Option<String>,

    /// Config within the project (e.g. dev)
    #[arg(short, long)]
    pub config: Option<String>,
}

/// Fallback file location overrides
#[derive(Parser, Debug, Clone, Default)]
pub struct LocationArgs {
    /// Path to the fallback file
    #[arg(long, value_name = "PATH")]
    pub fallback: Option<PathBuf>,

    /// Directory holding fallback and metadata files
    #[arg(long, value_name = "DIR", env = "KEEPSAKE_CACHE_DIR")]
    pub fallback_dir: Option<PathBuf>,
}

/// Arguments for the download command
#[derive(Parser, Debug)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(flatten)]
    pub location: LocationArgs,

    /// File to write the encrypted secrets to
    #[arg(value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the secrets as JSON instead of writing a file
    #[arg(long)]
    pub no_file: bool,

    /// Passphrase for the downloaded file (derived from identity by default)
    #[arg(long, env = "KEEPSAKE_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Secrets API base URL
    #[arg(long, env = "KEEPSAKE_API_HOST")]
    pub api_host: Option<String>,

    /// Skip the conditional fetch; always download the full payload
    #[arg(long)]
    pub no_cache: bool,

    /// Do not read or write the fallback file
    #[arg(long)]
    pub no_fallback: bool,

    /// Passphrase for the fallback file (derived from identity by default)
    #[arg(long, env = "KEEPSAKE_FALLBACK_PASSPHRASE", hide_env_values = true)]
    pub fallback_passphrase: Option<String>,

    /// Never modify the fallback file; it can still be read
    #[arg(long)]
    pub fallback_readonly: bool,

    /// Read secrets from the fallback file only, without contacting the API
    /// (implies --fallback-readonly)
    #[arg(long)]
    pub fallback_only: bool,

    /// Continue when the fallback file cannot be written
    #[arg(long)]
    pub no_exit_on_write_failure: bool,
}

/// Arguments for the paths command
#[derive(Parser, Debug)]
pub struct PathsArgs {
    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(flatten)]
    pub location: LocationArgs,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Output format for diagnostic commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
