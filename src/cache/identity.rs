//! Identity scoping and passphrase derivation
//!
//! An [`IdentityKey`] scopes a fallback file to one credential, project and
//! config. Everything derived from it (file names, fingerprints, default
//! passphrases) is a pure SHA-256 function of the identity fields.

use crate::error::{KeepsakeError, KeepsakeResult};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

const PATH_DOMAIN: &[u8] = b"keepsake/fallback-path/v1";
const FINGERPRINT_DOMAIN: &[u8] = b"keepsake/identity/v1";
const PASSPHRASE_DOMAIN: &[u8] = b"keepsake/passphrase/v1";

/// The (credential, project, config) tuple that scopes a cache entry
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityKey {
    credential: String,
    project: String,
    config: String,
}

impl IdentityKey {
    /// Build an identity. The credential is required; project and config
    /// may be empty when the credential is already scoped to them.
    pub fn new(
        credential: impl Into<String>,
        project: Option<String>,
        config: Option<String>,
    ) -> KeepsakeResult<Self> {
        let credential = credential.into();
        if credential.trim().is_empty() {
            return Err(KeepsakeError::MissingIdentity("token"));
        }

        Ok(Self {
            credential,
            project: project.unwrap_or_default(),
            config: config.unwrap_or_default(),
        })
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn config(&self) -> &str {
        &self.config
    }

    /// Hex digest used as the fallback file stem
    pub fn path_hash(&self) -> String {
        self.digest(PATH_DOMAIN)
    }

    /// Hex digest stored in metadata records to bind them to this identity
    pub fn fingerprint(&self) -> String {
        self.digest(FINGERPRINT_DOMAIN)
    }

    /// Hash of the credential alone, as used by the legacy file layout
    pub fn legacy_hash(&self) -> String {
        hex::encode(Sha256::digest(self.credential.as_bytes()))
    }

    fn digest(&self, domain: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        // Length prefixes keep ("ab", "c") and ("a", "bc") apart
        for field in [&self.credential, &self.project, &self.config] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityKey")
            .field("credential", &"<redacted>")
            .field("project", &self.project)
            .field("config", &self.config)
            .finish()
    }
}

/// A non-empty encryption passphrase, zeroized on drop
#[derive(Clone)]
pub struct Passphrase(Zeroizing<String>);

impl Passphrase {
    /// Use an explicit passphrase verbatim
    pub fn new(value: impl Into<String>) -> KeepsakeResult<Self> {
        let value = Zeroizing::new(value.into());
        if value.is_empty() {
            return Err(KeepsakeError::InvalidPassphrase("passphrase must not be empty"));
        }
        Ok(Self(value))
    }

    /// Derive the default passphrase for an identity.
    ///
    /// Deterministic, so the same identity reproduces the same passphrase
    /// across invocations without it being stored anywhere.
    pub fn derive(identity: &IdentityKey) -> Self {
        Self(Zeroizing::new(identity.digest(PASSPHRASE_DOMAIN)))
    }

    /// Use the explicit passphrase when given, else derive one
    pub fn explicit_or_derived(
        explicit: Option<String>,
        identity: &IdentityKey,
    ) -> KeepsakeResult<Self> {
        match explicit {
            Some(value) => Self::new(value),
            None => Ok(Self::derive(identity)),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}
