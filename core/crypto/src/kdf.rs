//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! Derivation is deliberately slow and fully deterministic: re-entering the
//! same passphrase in a later session yields the same key, which is what
//! makes previously sealed fields readable again.

use hmac::Hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::keys::{DerivedKey, Salt, KEY_LENGTH};
use loanshield_common::{Error, Result};

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Iteration count used by [`KdfParams::standard`].
    pub const STANDARD_ITERATIONS: u32 = 100_000;

    /// Default parameters.
    ///
    /// Every field sealed so far was produced with this count; changing it
    /// changes the key and orphans existing data.
    pub fn standard() -> Self {
        Self {
            iterations: Self::STANDARD_ITERATIONS,
        }
    }

    /// Higher iteration count for new deployments that can afford a
    /// slower unlock.
    pub fn hardened() -> Self {
        Self {
            iterations: 600_000,
        }
    }

    /// Create parameters with an explicit iteration count.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::standard()
    }
}

/// Derive a key from a passphrase using the application salt and the
/// standard parameters.
///
/// CPU-bound; run it off any latency-sensitive path.
pub fn derive(passphrase: &str) -> Result<DerivedKey> {
    derive_key(passphrase.as_bytes(), &Salt::APPLICATION, &KdfParams::standard())
}

/// Derive a key from a passphrase and salt using PBKDF2-HMAC-SHA256.
///
/// # Preconditions
/// - `passphrase` must not be empty
/// - `params.iterations` must be non-zero
///
/// # Postconditions
/// - Returns a 256-bit key that will zeroize on drop
/// - The derived key is deterministic given the same inputs
///
/// # Errors
/// - `InvalidInput` if the passphrase is empty (a caller bug)
/// - `Derivation` if the parameters cannot drive PBKDF2
pub fn derive_key(passphrase: &[u8], salt: &Salt, params: &KdfParams) -> Result<DerivedKey> {
    if passphrase.is_empty() {
        return Err(Error::InvalidInput("Passphrase cannot be empty".to_string()));
    }

    if params.iterations == 0 {
        return Err(Error::Derivation(
            "Iteration count must be non-zero".to_string(),
        ));
    }

    let mut key_bytes = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(
        passphrase,
        salt.as_bytes(),
        params.iterations,
        key_bytes.as_mut_slice(),
    )
    .map_err(|e| Error::Derivation(format!("PBKDF2 failed: {}", e)))?;

    Ok(DerivedKey::from_bytes(*key_bytes))
}
