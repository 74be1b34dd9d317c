//! Shield configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use loanshield_common::{Error, Result};
use loanshield_crypto::{derive_key, DerivedKey, KdfParams, Salt};

/// Default configuration file name.
pub const CONFIG_FILENAME: &str = "config.json";

/// Configuration format version for migration support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigVersion {
    pub major: u32,
    pub minor: u32,
}

impl ConfigVersion {
    /// Current configuration format version.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };

    /// Check if this version is compatible with the current version.
    pub fn is_compatible(&self) -> bool {
        self.major == Self::CURRENT.major
    }
}

impl Default for ConfigVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Where the key derivation salt comes from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "salt", rename_all = "snake_case")]
pub enum SaltPolicy {
    /// The fixed application salt. Keys are reproducible from the
    /// passphrase alone, at the cost of sharing one salt across users.
    #[default]
    Application,
    /// A random salt owned by one user; must be stored and handed back on
    /// every unlock.
    PerUser(Salt),
}

impl SaltPolicy {
    /// Generate a fresh per-user salt.
    pub fn per_user() -> Self {
        SaltPolicy::PerUser(Salt::generate())
    }

    pub fn salt(&self) -> &Salt {
        match self {
            SaltPolicy::Application => &Salt::APPLICATION,
            SaltPolicy::PerUser(salt) => salt,
        }
    }
}

/// Privacy Shield configuration.
///
/// Holds only public derivation parameters; nothing in here is secret.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShieldConfig {
    /// Configuration format version.
    #[serde(default)]
    pub version: ConfigVersion,
    /// KDF parameters.
    #[serde(default)]
    pub kdf: KdfParams,
    /// Salt used for key derivation.
    #[serde(default)]
    pub salt: SaltPolicy,
}

impl ShieldConfig {
    /// Create a configuration with explicit parameters.
    pub fn new(kdf: KdfParams, salt: SaltPolicy) -> Self {
        Self {
            version: ConfigVersion::CURRENT,
            kdf,
            salt,
        }
    }

    /// Derive a key for `passphrase` under this configuration.
    ///
    /// Blocks for the full derivation; see
    /// [`crate::session::derive_in_background`] for async callers.
    pub fn derive(&self, passphrase: &str) -> Result<DerivedKey> {
        derive_key(passphrase.as_bytes(), self.salt.salt(), &self.kdf)
    }

    /// Parse a configuration from JSON.
    ///
    /// # Errors
    /// - Malformed JSON
    /// - Incompatible configuration version
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::Serialization(format!("Invalid shield config: {}", e)))?;

        if !config.version.is_compatible() {
            return Err(Error::InvalidInput(format!(
                "Incompatible config version: {}.{}",
                config.version.major, config.version.minor
            )));
        }

        Ok(config)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Load a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Load a configuration file, falling back to defaults if it does not
    /// exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the configuration, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
