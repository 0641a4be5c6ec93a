//! Encrypted fallback file storage
//!
//! Both the secrets snapshot and its freshness metadata are encrypted with
//! [`CryptoCodec`] and replaced atomically: bytes go to a uniquely named
//! temp file (mode 0600 from creation) in the target directory, which is
//! then renamed over the target. Readers see the old file or the new one,
//! never a torn write.

use super::crypto::CryptoCodec;
use super::identity::Passphrase;
use super::paths::CachePaths;
use crate::error::{KeepsakeError, KeepsakeResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Secret name to value
pub type SecretMap = BTreeMap<String, String>;

/// Temp files younger than this may belong to a concurrent writer
const ORPHAN_GRACE: Duration = Duration::from_secs(10 * 60);

/// Persisted secrets snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheEntry {
    /// The secrets as last fetched
    pub secrets: SecretMap,

    /// Freshness token the remote returned with these secrets
    pub etag: Option<String>,

    /// When the secrets were fetched; informational only
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(secrets: SecretMap, etag: Option<String>) -> Self {
        Self {
            secrets,
            etag,
            fetched_at: Utc::now(),
        }
    }
}

/// Persisted freshness metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetadataRecord {
    pub etag: String,

    /// [`IdentityKey::fingerprint`](super::identity::IdentityKey::fingerprint)
    /// of the identity the record belongs to
    pub identity: String,

    pub fetched_at: DateTime<Utc>,
}

/// Reads and writes the fallback files for one identity
#[derive(Debug, Clone)]
pub struct CacheStore {
    paths: CachePaths,
    codec: CryptoCodec,
}

impl CacheStore {
    pub fn new(paths: CachePaths, codec: CryptoCodec) -> Self {
        Self { paths, codec }
    }

    pub fn paths(&self) -> &CachePaths {
        &self.paths
    }

    /// Read the secrets snapshot.
    ///
    /// `Ok(None)` when no snapshot exists. Anything unreadable, failing
    /// authentication, or failing schema validation is `Corrupt`, except
    /// at the legacy location where it counts as absent.
    pub fn read_entry(&self, passphrase: &Passphrase) -> KeepsakeResult<Option<CacheEntry>> {
        if let Some(entry) = self.read_record(&self.paths.entry, passphrase)? {
            return Ok(Some(entry));
        }

        let Some(legacy) = &self.paths.legacy else {
            return Ok(None);
        };
        // A legacy file we cannot open was not written for us
        match self.read_record::<CacheEntry>(legacy, passphrase) {
            Ok(Some(entry)) => {
                debug!("Read fallback file from legacy location {}", legacy.display());
                Ok(Some(entry))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                debug!("Ignoring legacy fallback file: {}", e);
                Ok(None)
            }
        }
    }

    /// Encrypt and atomically persist the secrets snapshot
    pub fn write_entry(&self, entry: &CacheEntry, passphrase: &Passphrase) -> KeepsakeResult<()> {
        self.write_record(&self.paths.entry, entry, passphrase)?;
        info!("Wrote fallback file {}", self.paths.entry.display());

        if let Some(legacy) = &self.paths.legacy {
            match fs::remove_file(legacy) {
                Ok(()) => debug!("Removed legacy fallback file {}", legacy.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(
                    "Failed to remove legacy fallback file {}: {}",
                    legacy.display(),
                    e
                ),
            }
        }
        Ok(())
    }

    /// Read the metadata record if it exists and belongs to `fingerprint`
    pub fn read_metadata(
        &self,
        fingerprint: &str,
        passphrase: &Passphrase,
    ) -> KeepsakeResult<Option<MetadataRecord>> {
        let record = self.read_record::<MetadataRecord>(&self.paths.metadata, passphrase)?;
        match record {
            Some(record) if record.identity != fingerprint => {
                debug!("Ignoring metadata recorded for a different identity");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Encrypt and atomically persist the metadata record
    pub fn write_metadata(
        &self,
        record: &MetadataRecord,
        passphrase: &Passphrase,
    ) -> KeepsakeResult<()> {
        self.write_record(&self.paths.metadata, record, passphrase)?;
        debug!("Wrote metadata file {}", self.paths.metadata.display());
        Ok(())
    }

    fn read_record<T: DeserializeOwned>(
        &self,
        path: &Path,
        passphrase: &Passphrase,
    ) -> KeepsakeResult<Option<T>> {
        let blob = match fs::read(path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(KeepsakeError::corrupt(path, e)),
        };

        let plaintext = Zeroizing::new(
            self.codec
                .decrypt(passphrase, &blob)
                .map_err(|e| KeepsakeError::corrupt(path, e))?,
        );
        let record = serde_json::from_slice(&plaintext)
            .map_err(|e| KeepsakeError::corrupt(path, format!("invalid contents: {}", e)))?;
        Ok(Some(record))
    }

    fn write_record<T: Serialize>(
        &self,
        path: &Path,
        record: &T,
        passphrase: &Passphrase,
    ) -> KeepsakeResult<()> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(record).map_err(|e| KeepsakeError::write_failure(path, e))?,
        );
        let blob = self
            .codec
            .encrypt(passphrase, &plaintext)
            .map_err(|e| KeepsakeError::write_failure(path, e))?;

        write_private(path, &blob).map_err(|e| KeepsakeError::write_failure(path, e))
    }
}

/// Atomically replace `path` with `bytes`, readable by the owner only.
///
/// Missing parent directories are created with mode 0700.
pub(crate) fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?
        .to_string_lossy()
        .into_owned();

    create_private_dir(dir)?;
    clean_orphans(dir, &file_name);

    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));
    let result = write_new_private(&tmp_path, bytes).and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

fn write_new_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn create_private_dir(dir: &Path) -> io::Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Remove temp files left behind by interrupted writes of `file_name`
fn clean_orphans(dir: &Path, file_name: &str) {
    let prefix = format!(".{}.", file_name);
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("Skipping orphan cleanup in {}: {}", dir.display(), e);
            return;
        }
    };

    let now = SystemTime::now();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&prefix) || !name.ends_with(".tmp") {
            continue;
        }

        let stale = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| now.duration_since(modified).unwrap_or_default() > ORPHAN_GRACE)
            .unwrap_or(false);
        if !stale {
            continue;
        }

        match fs::remove_file(entry.path()) {
            Ok(()) => debug!("Removed orphaned temp file {}", entry.path().display()),
            Err(e) => warn!(
                "Failed to remove orphaned temp file {}: {}",
                entry.path().display(),
                e
            ),
        }
    }
}
