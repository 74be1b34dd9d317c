//! Privacy Shield: field-level encryption for the loan tracker.
//!
//! This module provides:
//! - The marked-field convention (`ENC_GCM:` prefix) for stored values
//! - A per-process key session holding at most one derived key
//! - Shield configuration (KDF parameters, salt policy)
//! - Bulk re-encryption after a passphrase change
//!
//! # Architecture
//! Callers fetch the current key from a [`KeySession`] and pass it through
//! [`secure_encrypt`] before writing a sensitive field, and through
//! [`secure_decrypt`] before displaying one. Nothing here talks to the
//! backend; it only ever sees the marked values.

pub mod config;
pub mod field;
pub mod rekey;
pub mod session;

pub use config::{ConfigVersion, SaltPolicy, ShieldConfig};
pub use field::{
    is_marked, mode_for, reveal, secure_decrypt, secure_encrypt, Revealed,
    DECRYPTION_ERROR_PLACEHOLDER, KEY_REQUIRED_PLACEHOLDER, SENTINEL,
};
pub use rekey::{rekey_all, rekey_field, RekeyPolicy};
pub use session::{derive_in_background, KeySession, SessionId};
