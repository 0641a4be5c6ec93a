//! Encrypted offline fallback for fetched secrets
//!
//! Every successful fetch leaves an encrypted snapshot of the secrets on
//! disk. When the API cannot be reached, the snapshot is used instead.
//!
//! # Security Model
//!
//! - Files are scoped to one identity (token + project + config) by a
//!   SHA-256 file name, so scopes never share a snapshot
//! - Snapshots and metadata are Argon2id + ChaCha20-Poly1305 blobs;
//!   plaintext secrets never touch the disk
//! - Writes are temp-file-then-rename with mode 0600, directory 0700
//! - A snapshot that fails authentication or validation is never trusted
//!
//! # Files
//!
//! | File | Contents | Used for |
//! |------|----------|----------|
//! | `<hash>.enc` | secrets, etag, fetch time | offline fallback, 304 reuse |
//! | `<hash>.meta` | etag, identity fingerprint | conditional fetches |

pub mod crypto;
pub mod identity;
pub mod paths;
pub mod policy;
pub mod store;

pub use crypto::{CodecError, CryptoCodec, KdfParams};
pub use identity::{IdentityKey, Passphrase};
pub use paths::{resolved_cache_paths, CachePaths};
pub use policy::{FetchMode, FetchPolicy};
pub use store::{CacheEntry, CacheStore, MetadataRecord, SecretMap};
