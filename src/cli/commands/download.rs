//! Download command - fetch secrets with encrypted offline fallback

use super::{resolve_identity, resolve_paths};
use crate::audit::AuditLog;
use crate::cache::store::write_private;
use crate::cache::{CacheStore, CryptoCodec, FetchPolicy, Passphrase, SecretMap};
use crate::cli::args::DownloadArgs;
use crate::config::Config;
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::fetch::{FetchOutcome, Fetcher};
use crate::remote::HttpSource;
use crate::ui::{self, TaskSpinner, UiContext};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_OUTPUT: &str = "keepsake.encrypted";

/// Execute the download command
pub async fn execute(args: DownloadArgs, config: &Config) -> KeepsakeResult<()> {
    let ctx = UiContext::detect();
    let identity = resolve_identity(&args.identity, config)?;
    let policy = build_policy(&args, config)?;
    let paths = resolve_paths(&identity, &args.location, config)?;
    debug!(
        "Fallback entry {}, metadata {}",
        paths.entry.display(),
        paths.metadata.display()
    );

    let fallback_passphrase =
        Passphrase::explicit_or_derived(args.fallback_passphrase.clone(), &identity)?;
    let output_passphrase = Passphrase::explicit_or_derived(args.passphrase.clone(), &identity)?;

    let host = args
        .api_host
        .clone()
        .unwrap_or_else(|| config.api.host.clone());
    let source = HttpSource::new(host, Duration::from_secs(config.api.timeout_secs));
    let store = CacheStore::new(paths, CryptoCodec::default());

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Fetching secrets...");

    let fetch_identity = identity.clone();
    let result = tokio::task::spawn_blocking(move || {
        Fetcher::new(&source, &store, policy).fetch(&fetch_identity, &fallback_passphrase)
    })
    .await
    .map_err(|e| KeepsakeError::Internal(format!("fetch task failed: {}", e)))?;

    let audit = AuditLog::new(config);
    let outcome = match result {
        Ok(outcome) => {
            spinner.clear();
            outcome
        }
        Err(e) => {
            spinner.stop_error("Unable to fetch secrets");
            audit.record_failure(&identity, &e).await;
            return Err(e);
        }
    };

    report_warnings(&ctx, &outcome);
    audit.record_fetch(&identity, &outcome).await;
    info!(
        "Fetched {} secrets (origin: {})",
        outcome.secrets.len(),
        outcome.origin
    );

    if args.no_file {
        println!("{}", serde_json::to_string_pretty(&outcome.secrets)?);
        return Ok(());
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));
    write_encrypted(&output, &outcome.secrets, &output_passphrase)?;
    ui::step_ok(&ctx, &format!("Downloaded secrets to {}", output.display()));

    Ok(())
}

/// Combine config defaults with the negative command-line flags
fn build_policy(args: &DownloadArgs, config: &Config) -> KeepsakeResult<FetchPolicy> {
    let fallback = &config.fallback;

    FetchPolicy::builder()
        .cache(fallback.cache && !args.no_cache)
        .fallback(fallback.enabled && !args.no_fallback)
        .readonly(fallback.readonly || args.fallback_readonly)
        .fallback_only(fallback.only || args.fallback_only)
        .exit_on_write_failure(fallback.exit_on_write_failure && !args.no_exit_on_write_failure)
        .build()
}

fn report_warnings(ctx: &UiContext, outcome: &FetchOutcome) {
    for warning in &outcome.warnings {
        ui::step_warn(ctx, &warning.to_string());
    }
}

/// Encrypt the secrets into a standalone file at `path`
fn write_encrypted(path: &Path, secrets: &SecretMap, passphrase: &Passphrase) -> KeepsakeResult<()> {
    let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(secrets)?);
    let blob = CryptoCodec::default().encrypt(passphrase, &plaintext)?;

    write_private(path, &blob)
        .map_err(|e| KeepsakeError::io(format!("writing secrets to {}", path.display()), e))
}
