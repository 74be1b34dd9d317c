//! Marked-field codec.
//!
//! A stored field is either plaintext or `ENC_GCM:` followed by a base64
//! envelope. Whether a value is encrypted is decided by the prefix alone,
//! so the read path can classify values without holding a key.

use tracing::debug;

use loanshield_common::{EncryptionMode, Result};
use loanshield_crypto::{aead, DerivedKey};

/// Prefix flagging a stored value as an encrypted envelope.
pub const SENTINEL: &str = "ENC_GCM:";

/// Shown in place of a sealed field while no key is available.
pub const KEY_REQUIRED_PLACEHOLDER: &str = "[Encrypted Content - Privacy Key Required]";

/// Shown in place of a sealed field that fails to decrypt.
pub const DECRYPTION_ERROR_PLACEHOLDER: &str = "[Decryption Error - Invalid Privacy Key]";

/// Whether `value` carries the encryption marker.
pub fn is_marked(value: &str) -> bool {
    value.starts_with(SENTINEL)
}

/// Write-path mode for the given key.
pub fn mode_for(key: Option<&DerivedKey>) -> EncryptionMode {
    match key {
        Some(_) => EncryptionMode::Sealed,
        None => EncryptionMode::Plaintext,
    }
}

/// Prepare a sensitive field for storage.
///
/// With no key, or for an empty value, the plaintext is returned
/// unchanged. Otherwise the result is `SENTINEL` followed by the envelope.
///
/// # Errors
/// - Propagates cipher failures; saving is an explicit user action
pub fn secure_encrypt(plaintext: &str, key: Option<&DerivedKey>) -> Result<String> {
    match (mode_for(key), key) {
        (EncryptionMode::Sealed, Some(key)) if !plaintext.is_empty() => {
            let envelope = aead::encrypt(plaintext, key)?;
            Ok(format!("{}{}", SENTINEL, envelope))
        }
        _ => Ok(plaintext.to_owned()),
    }
}

/// Outcome of reading a stored field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revealed {
    /// The value was never encrypted.
    Plain(String),
    /// The value was sealed and decrypted successfully.
    Decrypted(String),
    /// The value is sealed and no key is available.
    KeyRequired,
    /// The value is sealed but did not authenticate under the key.
    Invalid,
}

impl Revealed {
    /// Text to render for this outcome.
    pub fn into_display(self) -> String {
        match self {
            Revealed::Plain(text) | Revealed::Decrypted(text) => text,
            Revealed::KeyRequired => KEY_REQUIRED_PLACEHOLDER.to_owned(),
            Revealed::Invalid => DECRYPTION_ERROR_PLACEHOLDER.to_owned(),
        }
    }

    /// Whether the outcome holds the field's real content.
    pub fn is_readable(&self) -> bool {
        matches!(self, Revealed::Plain(_) | Revealed::Decrypted(_))
    }
}

/// Classify and, where possible, decrypt a stored field.
pub fn reveal(value: &str, key: Option<&DerivedKey>) -> Revealed {
    let Some(envelope) = value.strip_prefix(SENTINEL) else {
        return Revealed::Plain(value.to_owned());
    };

    let Some(key) = key else {
        return Revealed::KeyRequired;
    };

    match aead::decrypt(envelope, key) {
        Ok(text) => Revealed::Decrypted(text),
        Err(e) => {
            debug!(error = %e, "Sealed field could not be decrypted");
            Revealed::Invalid
        }
    }
}

/// Prepare a stored field for display.
///
/// Never fails: sealed fields that cannot be read are replaced by a
/// placeholder, never by their ciphertext.
pub fn secure_decrypt(value: &str, key: Option<&DerivedKey>) -> String {
    reveal(value, key).into_display()
}
