//! Authenticated encryption for fallback files
//!
//! Passphrases are stretched with Argon2id into a 256-bit key that drives
//! ChaCha20-Poly1305. Every blob carries the parameters needed to decrypt
//! it, so decryption takes only the passphrase and the blob:
//!
//! ```text
//! "KSKC" | version | m_cost | t_cost | p_cost | salt(16) | nonce(12) | ciphertext+tag
//! ```
//!
//! The header is bound to the ciphertext as associated data, so editing
//! the KDF parameters or salt fails authentication like any other tamper.

use super::identity::Passphrase;
use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;
use zeroize::Zeroizing;

const MAGIC: &[u8; 4] = b"KSKC";
const FORMAT_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + 1 + 12 + SALT_LEN + NONCE_LEN;

// Upper bounds accepted from a blob header. A hostile file must not be
// able to make decryption allocate more than 256 MiB or spin for minutes.
const MAX_M_COST_KIB: u32 = 256 * 1024;
const MAX_T_COST: u32 = 16;
const MAX_P_COST: u32 = 8;

/// Errors from the blob codec
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("decryption failed: wrong passphrase or tampered data")]
    Authentication,

    #[error("malformed blob: {0}")]
    Malformed(&'static str),

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("encryption failed")]
    Encrypt,
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Iterations
    pub t_cost: u32,
    /// Parallelism
    pub p_cost: u32,
}

impl KdfParams {
    /// Cheapest parameters argon2 accepts. Only for tests.
    pub const INSECURE_FAST: Self = Self {
        m_cost: 8,
        t_cost: 1,
        p_cost: 1,
    };

    fn within_bounds(&self) -> bool {
        (1..=MAX_M_COST_KIB).contains(&self.m_cost)
            && (1..=MAX_T_COST).contains(&self.t_cost)
            && (1..=MAX_P_COST).contains(&self.p_cost)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        // OWASP Argon2id baseline: 19 MiB, 2 iterations, 1 lane
        Self {
            m_cost: 19 * 1024,
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// Passphrase-based blob encryption
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoCodec {
    params: KdfParams,
}

impl CryptoCodec {
    /// Create a codec that encrypts with the given KDF cost.
    ///
    /// Decryption always uses the cost recorded in the blob.
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    /// Encrypt plaintext into a self-describing blob
    pub fn encrypt(&self, passphrase: &Passphrase, plaintext: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let mut blob = Vec::with_capacity(HEADER_LEN + plaintext.len() + TAG_LEN);
        blob.extend_from_slice(MAGIC);
        blob.push(FORMAT_VERSION);
        blob.extend_from_slice(&self.params.m_cost.to_be_bytes());
        blob.extend_from_slice(&self.params.t_cost.to_be_bytes());
        blob.extend_from_slice(&self.params.p_cost.to_be_bytes());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce);

        let key = derive_key(passphrase, &salt, self.params)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &blob,
                },
            )
            .map_err(|_| CodecError::Encrypt)?;

        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob, failing closed on any authentication problem
    pub fn decrypt(&self, passphrase: &Passphrase, blob: &[u8]) -> Result<Vec<u8>, CodecError> {
        if blob.len() < MAGIC.len() + 1 {
            return Err(CodecError::Malformed("blob too short"));
        }
        if &blob[..MAGIC.len()] != MAGIC {
            return Err(CodecError::Malformed("unrecognized header"));
        }
        let version = blob[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        if blob.len() < HEADER_LEN + TAG_LEN {
            return Err(CodecError::Malformed("blob truncated"));
        }

        let (header, ciphertext) = blob.split_at(HEADER_LEN);
        let mut cursor = MAGIC.len() + 1;
        let mut next_u32 = || {
            let mut word = [0u8; 4];
            word.copy_from_slice(&header[cursor..cursor + 4]);
            cursor += 4;
            u32::from_be_bytes(word)
        };
        let params = KdfParams {
            m_cost: next_u32(),
            t_cost: next_u32(),
            p_cost: next_u32(),
        };
        if !params.within_bounds() {
            return Err(CodecError::Malformed("key derivation parameters out of range"));
        }

        let salt_start = MAGIC.len() + 1 + 12;
        let salt = &header[salt_start..salt_start + SALT_LEN];
        let nonce = &header[salt_start + SALT_LEN..];

        let key = derive_key(passphrase, salt, params)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
        cipher
            .decrypt(
                Nonce::from_slice(nonce),
                Payload {
                    msg: ciphertext,
                    aad: header,
                },
            )
            .map_err(|_| CodecError::Authentication)
    }
}

fn derive_key(
    passphrase: &Passphrase,
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<[u8; KEY_LEN]>, CodecError> {
    let params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(KEY_LEN))
        .map_err(|e| CodecError::Kdf(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, key.as_mut_slice())
        .map_err(|e| CodecError::Kdf(e.to_string()))?;
    Ok(key)
}
