//! Cryptographic primitives for the LoanShield Privacy Shield.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - Authenticated encryption of text fields using AES-256-GCM
//! - Opaque key handles with automatic zeroization
//!
//! # Security Guarantees
//! - Derived keys cannot be exported as raw bytes outside this crate
//! - All key material is zeroized on drop
//! - Decryption is all-or-nothing; failures carry no detail

pub mod aead;
pub mod kdf;
pub mod keys;

pub use aead::{decrypt, encrypt, Envelope};
pub use kdf::{derive, derive_key, KdfParams};
pub use keys::{DerivedKey, Salt};
