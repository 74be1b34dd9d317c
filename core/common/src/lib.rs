//! Common types shared across the LoanShield Privacy Shield crates.
//!
//! This module provides the error taxonomy and the small status types
//! that both the crypto layer and the session layer speak.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{EncryptionMode, SessionStatus};
