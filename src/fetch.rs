//! Fetch orchestration
//!
//! Decides, per invocation, whether secrets come from the API, from the
//! encrypted fallback file, or not at all.
//!
//! | Mode | Network | Fallback read | Fallback write |
//! |------|---------|---------------|----------------|
//! | RemoteOnly | yes | never | never |
//! | CacheOnly | never | always | never |
//! | RemoteWithFallback | yes | on 304 or failure | after 2xx unless read-only |

use crate::cache::{
    CacheEntry, CacheStore, FetchMode, FetchPolicy, IdentityKey, MetadataRecord, Passphrase,
    SecretMap,
};
use crate::error::{KeepsakeError, KeepsakeResult};
use crate::remote::{RemoteResponse, SecretsSource};
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::debug;

/// Where the returned secrets came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsOrigin {
    /// Fresh payload from the API
    Remote,
    /// API confirmed the fallback file is current
    Revalidated,
    /// API unreachable, fallback file used instead
    Fallback,
    /// Fallback file read without contacting the API
    FallbackOnly,
}

impl fmt::Display for SecretsOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Remote => "remote",
            Self::Revalidated => "revalidated",
            Self::Fallback => "fallback",
            Self::FallbackOnly => "fallback-only",
        };
        write!(f, "{}", name)
    }
}

/// Non-fatal conditions the caller should surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchWarning {
    /// The API failed and possibly stale secrets from the fallback file
    /// were returned
    UsingFallback {
        reason: String,
        fetched_at: DateTime<Utc>,
    },
    /// The fallback file could not be written
    WriteFailed { reason: String },
}

impl fmt::Display for FetchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UsingFallback { reason, fetched_at } => write!(
                f,
                "Unable to fetch secrets ({}). Using fallback file from {}",
                reason,
                fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            Self::WriteFailed { reason } => write!(f, "Unable to update fallback file: {}", reason),
        }
    }
}

/// Result of one pass through the fetch state machine
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub secrets: SecretMap,
    pub origin: SecretsOrigin,
    pub warnings: Vec<FetchWarning>,
}

impl FetchOutcome {
    fn new(secrets: SecretMap, origin: SecretsOrigin) -> Self {
        Self {
            secrets,
            origin,
            warnings: Vec::new(),
        }
    }
}

/// Runs the fetch state machine against a source and a store
pub struct Fetcher<'a, S: SecretsSource + ?Sized> {
    source: &'a S,
    store: &'a CacheStore,
    policy: FetchPolicy,
}

impl<'a, S: SecretsSource + ?Sized> Fetcher<'a, S> {
    pub fn new(source: &'a S, store: &'a CacheStore, policy: FetchPolicy) -> Self {
        Self {
            source,
            store,
            policy,
        }
    }

    /// Fetch the secrets for `identity`, encrypting the fallback file with
    /// `passphrase`
    pub fn fetch(
        &self,
        identity: &IdentityKey,
        passphrase: &Passphrase,
    ) -> KeepsakeResult<FetchOutcome> {
        let mode = self.policy.mode();
        debug!("Fetching secrets for {:?} in {:?} mode", identity, mode);

        match mode {
            FetchMode::RemoteOnly => self.fetch_remote_only(identity),
            FetchMode::CacheOnly => self.fetch_fallback_only(passphrase),
            FetchMode::RemoteWithFallback => self.fetch_with_fallback(identity, passphrase),
        }
    }

    fn fetch_remote_only(&self, identity: &IdentityKey) -> KeepsakeResult<FetchOutcome> {
        match self.source.fetch(identity, None)? {
            RemoteResponse::Modified { secrets, .. } => {
                Ok(FetchOutcome::new(secrets, SecretsOrigin::Remote))
            }
            RemoteResponse::Unchanged => Err(unexpected_unchanged()),
        }
    }

    fn fetch_fallback_only(&self, passphrase: &Passphrase) -> KeepsakeResult<FetchOutcome> {
        match self.store.read_entry(passphrase)? {
            Some(entry) => {
                debug!("Read secrets from fallback file (fetched {})", entry.fetched_at);
                Ok(FetchOutcome::new(entry.secrets, SecretsOrigin::FallbackOnly))
            }
            None => Err(KeepsakeError::FallbackMissing(
                self.store.paths().entry.clone(),
            )),
        }
    }

    fn fetch_with_fallback(
        &self,
        identity: &IdentityKey,
        passphrase: &Passphrase,
    ) -> KeepsakeResult<FetchOutcome> {
        let metadata = if self.policy.cache_enabled() {
            self.read_metadata(identity, passphrase)
        } else {
            None
        };
        let etag = metadata.as_ref().map(|m| m.etag.as_str());

        let response = match self.source.fetch(identity, etag) {
            Ok(RemoteResponse::Unchanged) if etag.is_some() => {
                if let Some(entry) = self.revalidated_entry(etag, passphrase) {
                    return Ok(FetchOutcome::new(entry.secrets, SecretsOrigin::Revalidated));
                }
                debug!("Fallback file unusable after 304, refetching in full");
                self.source.fetch(identity, None)
            }
            other => other,
        };

        match response {
            Ok(RemoteResponse::Modified { secrets, etag }) => {
                let mut outcome = FetchOutcome::new(secrets, SecretsOrigin::Remote);
                self.persist(identity, passphrase, &mut outcome, etag)?;
                Ok(outcome)
            }
            Ok(RemoteResponse::Unchanged) => self.fall_back(unexpected_unchanged(), passphrase),
            Err(e) if e.is_remote() => self.fall_back(e, passphrase),
            Err(e) => Err(e),
        }
    }

    /// Metadata problems only cost a full fetch, never the invocation
    fn read_metadata(
        &self,
        identity: &IdentityKey,
        passphrase: &Passphrase,
    ) -> Option<MetadataRecord> {
        match self.store.read_metadata(&identity.fingerprint(), passphrase) {
            Ok(record) => record,
            Err(e) => {
                debug!("Ignoring unusable metadata: {}", e);
                None
            }
        }
    }

    /// The local entry, if it is readable and was persisted with `etag`
    fn revalidated_entry(&self, etag: Option<&str>, passphrase: &Passphrase) -> Option<CacheEntry> {
        match self.store.read_entry(passphrase) {
            Ok(Some(entry)) if entry.etag.as_deref() == etag => Some(entry),
            Ok(Some(_)) => {
                debug!("Fallback file etag does not match metadata");
                None
            }
            Ok(None) => None,
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    fn persist(
        &self,
        identity: &IdentityKey,
        passphrase: &Passphrase,
        outcome: &mut FetchOutcome,
        etag: Option<String>,
    ) -> KeepsakeResult<()> {
        if self.policy.readonly() {
            debug!("Fallback file is read-only, not updating");
            return Ok(());
        }

        let entry = CacheEntry::new(outcome.secrets.clone(), etag);
        let result = self.store.write_entry(&entry, passphrase).and_then(|()| {
            match (&entry.etag, self.policy.cache_enabled()) {
                (Some(etag), true) => self.store.write_metadata(
                    &MetadataRecord {
                        etag: etag.clone(),
                        identity: identity.fingerprint(),
                        fetched_at: entry.fetched_at,
                    },
                    passphrase,
                ),
                _ => Ok(()),
            }
        });

        match result {
            Ok(()) => Ok(()),
            Err(e) if self.policy.exit_on_write_failure() => Err(e),
            Err(e) => {
                outcome.warnings.push(FetchWarning::WriteFailed {
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    fn fall_back(
        &self,
        remote: KeepsakeError,
        passphrase: &Passphrase,
    ) -> KeepsakeResult<FetchOutcome> {
        debug!("Remote fetch failed, reading fallback file: {}", remote);

        let fallback = match self.store.read_entry(passphrase) {
            Ok(Some(entry)) => {
                let mut outcome = FetchOutcome::new(entry.secrets, SecretsOrigin::Fallback);
                outcome.warnings.push(FetchWarning::UsingFallback {
                    reason: remote.to_string(),
                    fetched_at: entry.fetched_at,
                });
                return Ok(outcome);
            }
            Ok(None) => KeepsakeError::FallbackMissing(self.store.paths().entry.clone()),
            Err(e) => e,
        };

        Err(KeepsakeError::RemoteAndFallback {
            remote: Box::new(remote),
            fallback: Box::new(fallback),
        })
    }
}

fn unexpected_unchanged() -> KeepsakeError {
    KeepsakeError::Remote("API reported unchanged secrets without a freshness token".to_string())
}
