//! Status types used throughout the Privacy Shield.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Observable state of a key session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// No key is held; marked fields cannot be revealed.
    Locked,
    /// A derived key is held in memory.
    Unlocked,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Locked => "locked",
            SessionStatus::Unlocked => "unlocked",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the write path treats a sensitive field.
///
/// Without a key the field is stored as-is; this trades confidentiality
/// for availability and is kept explicit so call sites can assert it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionMode {
    /// Values are written unchanged.
    Plaintext,
    /// Values are written as marked envelopes.
    Sealed,
}

impl From<SessionStatus> for EncryptionMode {
    fn from(status: SessionStatus) -> Self {
        match status {
            SessionStatus::Locked => EncryptionMode::Plaintext,
            SessionStatus::Unlocked => EncryptionMode::Sealed,
        }
    }
}
