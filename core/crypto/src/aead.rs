//! Authenticated encryption of text fields using AES-256-GCM.
//!
//! Every call draws a fresh 96-bit nonce from the OS RNG. The envelope
//! format is `nonce || ciphertext || tag`, base64-encoded for storage.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::keys::DerivedKey;
use loanshield_common::{Error, Result};

/// Nonce size for AES-GCM (12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes).
pub const TAG_SIZE: usize = 16;

/// One encryption result: the nonce and the tagged ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Split raw envelope bytes into nonce and ciphertext.
    ///
    /// # Errors
    /// - `DecryptionFailed` if the input cannot hold a nonce and a tag
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::DecryptionFailed);
        }

        let (nonce_bytes, ciphertext) = bytes.split_at(NONCE_SIZE);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);

        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Decode the text form of an envelope.
    ///
    /// # Errors
    /// - `DecryptionFailed` on invalid base64 or a truncated envelope
    pub fn parse(text: &str) -> Result<Self> {
        let bytes = STANDARD.decode(text).map_err(|_| Error::DecryptionFailed)?;
        Self::from_bytes(&bytes)
    }

    /// Concatenate nonce and ciphertext.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.size());
        result.extend_from_slice(&self.nonce);
        result.extend_from_slice(&self.ciphertext);
        result
    }

    /// Text form suitable for storage.
    pub fn encode(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Total size in bytes (nonce + ciphertext + tag).
    pub fn size(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }

    /// Length of the plaintext this envelope decrypts to.
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len() - TAG_SIZE
    }
}

fn cipher(key: &DerivedKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()))
}

/// Encrypt bytes under a fresh random nonce.
pub fn seal(key: &DerivedKey, plaintext: &[u8]) -> Result<Envelope> {
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher(key)
        .encrypt(&nonce, plaintext)
        .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

    Ok(Envelope {
        nonce: nonce.into(),
        ciphertext,
    })
}

/// Authenticate and decrypt an envelope.
///
/// # Errors
/// - `DecryptionFailed` on any authentication failure
pub fn open(key: &DerivedKey, envelope: &Envelope) -> Result<Vec<u8>> {
    cipher(key)
        .decrypt(Nonce::from_slice(&envelope.nonce), envelope.ciphertext.as_slice())
        .map_err(|_| Error::DecryptionFailed)
}

/// Encrypt UTF-8 text, returning the base64 envelope.
///
/// # Postconditions
/// - Output decodes to NONCE_SIZE + plaintext length + TAG_SIZE bytes
/// - Encrypting the same text twice yields different output
///
/// # Errors
/// - `Crypto` if the cipher fails
pub fn encrypt(plaintext: &str, key: &DerivedKey) -> Result<String> {
    Ok(seal(key, plaintext.as_bytes())?.encode())
}

/// Decrypt a base64 envelope back into UTF-8 text.
///
/// All-or-nothing: no partial plaintext is ever returned.
///
/// # Errors
/// - `DecryptionFailed` for a wrong key, a corrupted or truncated envelope,
///   or anything that is not an envelope at all
pub fn decrypt(envelope: &str, key: &DerivedKey) -> Result<String> {
    let envelope = Envelope::parse(envelope)?;
    let plaintext = open(key, &envelope)?;
    String::from_utf8(plaintext).map_err(|_| Error::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KEY_LENGTH;

    fn key(byte: u8) -> DerivedKey {
        DerivedKey::from_bytes([byte; KEY_LENGTH])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = key(42);
        let envelope = encrypt("Hello, World!", &key).unwrap();
        assert_eq!(decrypt(&envelope, &key).unwrap(), "Hello, World!");
    }

    #[test]
    fn test_envelope_size() {
        let key = key(42);
        let plaintext = "Test message";

        let envelope = Envelope::parse(&encrypt(plaintext, &key).unwrap()).unwrap();

        assert_eq!(envelope.size(), NONCE_SIZE + plaintext.len() + TAG_SIZE);
        assert_eq!(envelope.plaintext_len(), plaintext.len());
    }

    #[test]
    fn test_different_nonce_each_time() {
        let key = key(42);

        let ct1 = encrypt("Same plaintext", &key).unwrap();
        let ct2 = encrypt("Same plaintext", &key).unwrap();

        assert_ne!(ct1, ct2);
        let env1 = Envelope::parse(&ct1).unwrap();
        let env2 = Envelope::parse(&ct2).unwrap();
        assert_ne!(env1.nonce(), env2.nonce());
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = encrypt("Secret data", &key(1)).unwrap();
        assert!(matches!(decrypt(&envelope, &key(2)), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = key(42);
        let mut bytes = seal(&key, b"Important data").unwrap().to_bytes();
        bytes[NONCE_SIZE + 5] ^= 0x01;

        let tampered = STANDARD.encode(&bytes);
        assert!(matches!(decrypt(&tampered, &key), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let key = key(42);
        let mut bytes = seal(&key, b"Important data").unwrap().to_bytes();
        bytes[0] ^= 0x80;

        let tampered = STANDARD.encode(&bytes);
        assert!(matches!(decrypt(&tampered, &key), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_truncated_envelope_fails() {
        let key = key(42);
        let bytes = seal(&key, b"Important data").unwrap().to_bytes();

        let dropped_tag_byte = STANDARD.encode(&bytes[..bytes.len() - 1]);
        assert!(matches!(decrypt(&dropped_tag_byte, &key), Err(Error::DecryptionFailed)));

        let too_short = STANDARD.encode(&bytes[..NONCE_SIZE + TAG_SIZE - 1]);
        assert!(matches!(decrypt(&too_short, &key), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_invalid_base64_fails() {
        assert!(matches!(decrypt("not base64!!", &key(42)), Err(Error::DecryptionFailed)));
        assert!(matches!(decrypt("", &key(42)), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_non_utf8_plaintext_fails() {
        let key = key(42);
        let envelope = seal(&key, &[0xFF, 0xFE, 0xFD]).unwrap().encode();
        assert!(matches!(decrypt(&envelope, &key), Err(Error::DecryptionFailed)));
    }

    #[test]
    fn test_empty_plaintext() {
        let key = key(42);
        let envelope = encrypt("", &key).unwrap();
        assert_eq!(decrypt(&envelope, &key).unwrap(), "");
    }

    #[test]
    fn test_unicode_plaintext() {
        let key = key(42);
        let text = "Préstamo para José – 1 000 €";
        assert_eq!(decrypt(&encrypt(text, &key).unwrap(), &key).unwrap(), text);
    }

    #[test]
    fn test_key_methods_delegate() {
        let key = key(9);
        let envelope = key.encrypt("via method").unwrap();
        assert_eq!(key.decrypt(&envelope).unwrap(), "via method");
    }

    #[test]
    fn test_envelope_bytes_roundtrip() {
        let env = seal(&key(3), b"bytes").unwrap();
        assert_eq!(Envelope::from_bytes(&env.to_bytes()).unwrap(), env);
        assert_eq!(Envelope::parse(&env.encode()).unwrap(), env);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn roundtrip_any_text(text in ".*") {
                let key = key(0x5A);
                let envelope = encrypt(&text, &key).unwrap();
                prop_assert_eq!(decrypt(&envelope, &key).unwrap(), text);
            }

            #[test]
            fn any_single_bit_flip_is_rejected(
                text in ".{1,64}",
                position in any::<prop::sample::Index>(),
                bit in 0u8..8,
            ) {
                let key = key(0x5A);
                let mut bytes = seal(&key, text.as_bytes()).unwrap().to_bytes();
                let i = position.index(bytes.len());
                bytes[i] ^= 1 << bit;

                let result = decrypt(&STANDARD.encode(&bytes), &key);
                prop_assert!(matches!(result, Err(Error::DecryptionFailed)));
            }
        }
    }
}
