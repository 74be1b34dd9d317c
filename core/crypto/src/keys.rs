//! Key types with secure memory handling.
//!
//! The derived key is an opaque handle: it can encrypt and decrypt but
//! never hands its bytes to code outside this crate.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::ZeroizeOnDrop;

use loanshield_common::Result;

/// Length of encryption keys in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of key derivation salts in bytes.
pub const SALT_LENGTH: usize = 32;

/// Symmetric key derived from a passphrase.
///
/// Capability-scoped to encrypt/decrypt: no `Clone`, no public byte
/// accessor, and no public wipe. The buffer is zeroized on drop. Share it
/// behind an `Arc`.
#[derive(ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    pub(crate) fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Raw key bytes, for the cipher only.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }

    /// Encrypt UTF-8 text into a base64 envelope.
    ///
    /// See [`crate::aead::encrypt`].
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        crate::aead::encrypt(plaintext, self)
    }

    /// Decrypt a base64 envelope back into text.
    ///
    /// See [`crate::aead::decrypt`].
    pub fn decrypt(&self, envelope: &str) -> Result<String> {
        crate::aead::decrypt(envelope, self)
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Salt for key derivation.
///
/// Salts are not secret. The application-wide constant lets a key be
/// rebuilt from the passphrase alone; a generated salt must be stored next
/// to the data it protects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Salt([u8; SALT_LENGTH]);

impl Salt {
    /// Fixed salt shared by every user of the application.
    pub const APPLICATION: Salt = Salt(*b"loanshield.privacy-shield.salt.1");

    /// Generate a random salt.
    pub fn generate() -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        OsRng.fill_bytes(&mut salt);
        Self(salt)
    }

    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; SALT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Get the salt bytes.
    pub fn as_bytes(&self) -> &[u8; SALT_LENGTH] {
        &self.0
    }
}

impl Default for Salt {
    fn default() -> Self {
        Self::APPLICATION
    }
}
