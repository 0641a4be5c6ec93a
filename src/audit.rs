//! Audit logging for secret access
//!
//! Writes JSON lines to `~/.local/state/keepsake/audit.log` recording where
//! secrets were served from. Secret values and tokens are never logged;
//! identities are recorded by project, config and fingerprint.

use crate::cache::IdentityKey;
use crate::config::{schema::Config, ConfigManager};
use crate::error::KeepsakeError;
use crate::fetch::{FetchOutcome, FetchWarning};
use chrono::Utc;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// File-based audit logger that appends JSON lines
pub struct AuditLog {
    enabled: bool,
    path: PathBuf,
}

impl AuditLog {
    /// Create a new audit logger from config
    pub fn new(config: &Config) -> Self {
        Self {
            enabled: config.general.audit_log,
            path: ConfigManager::audit_log_path(),
        }
    }

    /// Record a completed fetch and any degraded conditions it hit
    pub async fn record_fetch(&self, identity: &IdentityKey, outcome: &FetchOutcome) {
        let subject = subject(identity);

        self.log(
            "secrets.fetched",
            &serde_json::json!({
                "subject": subject,
                "origin": outcome.origin.to_string(),
                "count": outcome.secrets.len(),
            }),
        )
        .await;

        for warning in &outcome.warnings {
            let event = match warning {
                FetchWarning::UsingFallback { .. } => "fallback.used",
                FetchWarning::WriteFailed { .. } => "fallback.write_failed",
            };
            self.log(
                event,
                &serde_json::json!({ "subject": subject, "detail": warning.to_string() }),
            )
            .await;
        }
    }

    /// Record a fetch that ended in an error. Only the error kind is kept;
    /// messages can carry API responses.
    pub async fn record_failure(&self, identity: &IdentityKey, error: &KeepsakeError) {
        let event = match error {
            KeepsakeError::WriteFailure { .. } => "fallback.write_failed",
            _ => "secrets.fetch_failed",
        };

        self.log(
            event,
            &serde_json::json!({
                "subject": subject(identity),
                "kind": failure_kind(error),
            }),
        )
        .await;
    }

    /// Log an audit event as a JSON line
    ///
    /// Drops events on IO failure; audit logging never blocks the fetch.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write audit log: {}", e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

fn subject(identity: &IdentityKey) -> serde_json::Value {
    serde_json::json!({
        "project": identity.project(),
        "config": identity.config(),
        "identity": identity.fingerprint(),
    })
}

fn failure_kind(error: &KeepsakeError) -> &'static str {
    match error {
        KeepsakeError::WriteFailure { .. } => "write_failure",
        KeepsakeError::Corrupt { .. } => "corrupt",
        KeepsakeError::FallbackMissing(_) => "fallback_missing",
        KeepsakeError::RemoteAndFallback { .. } => "remote_and_fallback",
        KeepsakeError::Remote(_) | KeepsakeError::RemoteStatus { .. } => "remote",
        _ => "other",
    }
}
