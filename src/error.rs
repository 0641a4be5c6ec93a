//! Error types for Keepsake
//!
//! All modules use `KeepsakeResult<T>` as their return type.

use crate::cache::crypto::CodecError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Keepsake operations
pub type KeepsakeResult<T> = Result<T, KeepsakeError>;

/// All errors that can occur in Keepsake
#[derive(Error, Debug)]
pub enum KeepsakeError {
    // Identity and passphrase errors
    #[error("Unable to determine the fallback cache directory: {0}")]
    PathResolution(String),

    #[error("Invalid passphrase: {0}")]
    InvalidPassphrase(&'static str),

    #[error("Missing required value: {0}")]
    MissingIdentity(&'static str),

    #[error("Conflicting options: {0}")]
    PolicyConflict(&'static str),

    // Fallback cache errors
    #[error("Encryption error: {0}")]
    Codec(#[from] CodecError),

    #[error("Fallback file {path} is unusable: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Fallback file not found: {0}")]
    FallbackMissing(PathBuf),

    #[error("Unable to write fallback file {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },

    // Remote errors
    #[error("Unable to reach the secrets API: {0}")]
    Remote(String),

    #[error("Secrets API returned {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error("Unable to fetch secrets ({remote}) and unable to use the fallback file ({fallback})")]
    RemoteAndFallback {
        remote: Box<KeepsakeError>,
        fallback: Box<KeepsakeError>,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl KeepsakeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a corrupt-cache error
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a write failure error
    pub fn write_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::WriteFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error came from the remote service or the transport.
    ///
    /// Remote errors are the only kind the fallback file may recover from.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_) | Self::RemoteStatus { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::PathResolution(_) => Some("Pass --fallback-dir or set KEEPSAKE_CACHE_DIR"),
            Self::MissingIdentity("token") => Some("Pass --token or set KEEPSAKE_TOKEN"),
            Self::Corrupt { .. } => {
                Some("Check the fallback passphrase, or refetch without --fallback-only")
            }
            Self::FallbackMissing(_) => {
                Some("Run once with network access to populate the fallback file")
            }
            Self::WriteFailure { .. } => Some("Use --no-exit-on-write-failure to continue anyway"),
            Self::RemoteAndFallback { .. } => Some("Check your network connection and passphrase"),
            Self::RemoteStatus { status: 401, .. } | Self::RemoteStatus { status: 403, .. } => {
                Some("Check that your token is valid for this project and config")
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = KeepsakeError::FallbackMissing(PathBuf::from("/tmp/x.enc"));
        assert!(err.to_string().contains("Fallback file not found"));
    }

    #[test]
    fn error_hint() {
        let err = KeepsakeError::MissingIdentity("token");
        assert_eq!(err.hint(), Some("Pass --token or set KEEPSAKE_TOKEN"));
        assert!(KeepsakeError::Internal("x".into()).hint().is_none());
    }

    #[test]
    fn remote_classification() {
        assert!(KeepsakeError::Remote("timeout".into()).is_remote());
        assert!(KeepsakeError::RemoteStatus {
            status: 500,
            message: "boom".into()
        }
        .is_remote());
        assert!(!KeepsakeError::corrupt("/tmp/x", "bad").is_remote());
    }

    #[test]
    fn combined_error_names_both_layers() {
        let err = KeepsakeError::RemoteAndFallback {
            remote: Box::new(KeepsakeError::Remote("connection refused".into())),
            fallback: Box::new(KeepsakeError::FallbackMissing(PathBuf::from("/c/e.enc"))),
        };
        let msg = err.to_string();
        assert!(msg.contains("connection refused"));
        assert!(msg.contains("/c/e.enc"));
    }
}
