//! Fallback file locations
//!
//! Paths are a pure function of the identity and the cache directory.
//! The directory itself must be resolvable; there is no silent fallback to
//! the working directory because the files hold secret material.

use super::identity::IdentityKey;
use crate::config::ConfigManager;
use crate::error::KeepsakeResult;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Resolved locations for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachePaths {
    /// Encrypted secrets snapshot
    pub entry: PathBuf,
    /// Encrypted freshness metadata
    pub metadata: PathBuf,
    /// Location used by the previous naming scheme. That scheme keyed files
    /// by token alone, so only a token-only identity owns it.
    #[serde(skip)]
    pub legacy: Option<PathBuf>,
}

impl CachePaths {
    /// Derive paths for `identity` under `dir`
    pub fn resolve(dir: &Path, identity: &IdentityKey) -> Self {
        let stem = identity.path_hash();
        let token_only = identity.project().is_empty() && identity.config().is_empty();
        Self {
            entry: dir.join(format!("{}.enc", stem)),
            metadata: dir.join(format!("{}.meta", stem)),
            legacy: token_only
                .then(|| dir.join(format!(".secrets-{}.json", identity.legacy_hash()))),
        }
    }

    /// Replace the entry location with a user-chosen file.
    ///
    /// A user-chosen file has no legacy predecessor.
    pub fn with_entry_override(mut self, entry: Option<PathBuf>) -> Self {
        if let Some(entry) = entry {
            self.entry = entry;
            self.legacy = None;
        }
        self
    }
}

/// Resolve paths for `identity`, using the platform cache directory unless
/// `dir_override` is set
pub fn resolved_cache_paths(
    identity: &IdentityKey,
    dir_override: Option<&Path>,
) -> KeepsakeResult<CachePaths> {
    let dir = match dir_override {
        Some(dir) => dir.to_path_buf(),
        None => ConfigManager::fallback_dir()?,
    };
    Ok(CachePaths::resolve(&dir, identity))
}
