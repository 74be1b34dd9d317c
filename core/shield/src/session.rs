//! Key session management.
//!
//! A session holds at most one derived key in memory for the lifetime of
//! the process. It is never persisted; restarting the process or calling
//! [`KeySession::lock`] returns it to the locked state. Keys are zeroized
//! when the last handle to them is dropped.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::ShieldConfig;
use crate::field::{mode_for, secure_decrypt, secure_encrypt};
use loanshield_common::{EncryptionMode, Error, Result, SessionStatus};
use loanshield_crypto::DerivedKey;

/// Identifier for one logical key session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new unique session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holder of the active privacy key.
///
/// Construct one per logical session and pass it to the code that reads
/// or writes sensitive fields. The slot may be read concurrently; writes
/// come only from explicit unlock and lock actions.
pub struct KeySession {
    id: SessionId,
    slot: RwLock<Option<Arc<DerivedKey>>>,
}

impl KeySession {
    /// Create a locked session.
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            slot: RwLock::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    // The slot is only ever replaced whole, so a poisoned lock still holds
    // a valid value.
    fn read_slot(&self) -> RwLockReadGuard<'_, Option<Arc<DerivedKey>>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<Arc<DerivedKey>>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the held key. `Some` unlocks, `None` locks.
    ///
    /// # Postconditions
    /// - The previous key is released and zeroized once no caller still
    ///   holds a handle to it
    pub fn set_key(&self, key: Option<DerivedKey>) {
        let unlocked = key.is_some();
        *self.write_slot() = key.map(Arc::new);

        if unlocked {
            info!(session = %self.id, "Privacy key installed");
        } else {
            info!(session = %self.id, "Session locked");
        }
    }

    /// Current key, if unlocked.
    ///
    /// The handle is meant for the duration of one encrypt or decrypt
    /// call; holding it keeps the key alive after [`KeySession::lock`].
    pub fn key(&self) -> Option<Arc<DerivedKey>> {
        self.read_slot().clone()
    }

    /// Current key, or `NotPermitted` when locked.
    pub fn require_key(&self) -> Result<Arc<DerivedKey>> {
        self.key()
            .ok_or_else(|| Error::NotPermitted("Session is locked".to_string()))
    }

    pub fn status(&self) -> SessionStatus {
        if self.read_slot().is_some() {
            SessionStatus::Unlocked
        } else {
            SessionStatus::Locked
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.status() == SessionStatus::Unlocked
    }

    /// Write-path mode implied by the current state.
    pub fn mode(&self) -> EncryptionMode {
        mode_for(self.key().as_deref())
    }

    /// Drop the held key.
    pub fn lock(&self) {
        self.set_key(None);
    }

    /// Derive a key from `passphrase` and install it.
    ///
    /// Derivation runs on the blocking thread pool.
    ///
    /// # Errors
    /// - Derivation failure; the session keeps its previous state
    pub async fn unlock(&self, passphrase: Zeroizing<String>, config: &ShieldConfig) -> Result<()> {
        debug!(session = %self.id, iterations = config.kdf.iterations, "Deriving privacy key");

        match derive_in_background(passphrase, config.clone()).await {
            Ok(key) => {
                self.set_key(Some(key));
                Ok(())
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Unlock failed");
                Err(e)
            }
        }
    }

    /// Prepare a sensitive field for storage with the current key.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        secure_encrypt(plaintext, self.key().as_deref())
    }

    /// Prepare a stored field for display with the current key.
    pub fn reveal(&self, stored: &str) -> String {
        secure_decrypt(stored, self.key().as_deref())
    }
}

impl Default for KeySession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySession")
            .field("id", &self.id)
            .field("status", &self.status())
            .finish()
    }
}

/// Run key derivation on the blocking pool.
///
/// # Errors
/// - Any error from [`ShieldConfig::derive`]
/// - `Derivation` if the blocking task panics or is cancelled
pub async fn derive_in_background(
    passphrase: Zeroizing<String>,
    config: ShieldConfig,
) -> Result<DerivedKey> {
    tokio::task::spawn_blocking(move || config.derive(&passphrase))
        .await
        .map_err(|e| Error::Derivation(format!("Derivation task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{DECRYPTION_ERROR_PLACEHOLDER, KEY_REQUIRED_PLACEHOLDER};
    use loanshield_crypto::KdfParams;

    fn fast_config() -> ShieldConfig {
        ShieldConfig {
            kdf: KdfParams::with_iterations(1_000),
            ..ShieldConfig::default()
        }
    }

    fn passphrase(text: &str) -> Zeroizing<String> {
        Zeroizing::new(text.to_string())
    }

    #[test]
    fn test_new_session_is_locked() {
        let session = KeySession::new();

        assert_eq!(session.status(), SessionStatus::Locked);
        assert!(session.key().is_none());
        assert_eq!(session.mode(), EncryptionMode::Plaintext);
    }

    #[test]
    fn test_set_key_transitions() {
        let session = KeySession::new();
        let key = fast_config().derive("alpha").unwrap();

        session.set_key(Some(key));
        assert_eq!(session.status(), SessionStatus::Unlocked);
        assert_eq!(session.mode(), EncryptionMode::Sealed);
        assert!(session.key().is_some());

        session.set_key(None);
        assert_eq!(session.status(), SessionStatus::Locked);
        assert!(session.key().is_none());
    }

    #[test]
    fn test_lock_is_idempotent() {
        let session = KeySession::new();
        session.lock();
        session.lock();
        assert!(!session.is_unlocked());
    }

    #[test]
    fn test_require_key_when_locked() {
        let session = KeySession::new();
        assert!(matches!(session.require_key(), Err(Error::NotPermitted(_))));
    }

    #[test]
    fn test_seal_and_reveal_follow_state() {
        let session = KeySession::new();

        assert_eq!(session.seal("Personal loan").unwrap(), "Personal loan");

        session.set_key(Some(fast_config().derive("alpha").unwrap()));
        let sealed = session.seal("Personal loan").unwrap();
        assert!(sealed.starts_with("ENC_GCM:"));
        assert_eq!(session.reveal(&sealed), "Personal loan");

        session.lock();
        assert_eq!(session.reveal(&sealed), KEY_REQUIRED_PLACEHOLDER);

        session.set_key(Some(fast_config().derive("beta").unwrap()));
        assert_eq!(session.reveal(&sealed), DECRYPTION_ERROR_PLACEHOLDER);
    }

    #[test]
    fn test_outstanding_handle_survives_lock() {
        let session = KeySession::new();
        session.set_key(Some(fast_config().derive("alpha").unwrap()));

        let handle = session.key().unwrap();
        session.lock();

        assert!(handle.encrypt("still usable").is_ok());
        assert_eq!(session.status(), SessionStatus::Locked);
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(KeySession::new().id(), KeySession::new().id());
    }

    #[test]
    fn test_debug_hides_key() {
        let session = KeySession::new();
        session.set_key(Some(fast_config().derive("alpha").unwrap()));

        let printed = format!("{:?}", session);
        assert!(printed.contains("Unlocked"));
        assert!(!printed.contains("DerivedKey"));
    }

    #[test]
    fn test_concurrent_readers() {
        let session = Arc::new(KeySession::new());
        session.set_key(Some(fast_config().derive("alpha").unwrap()));
        let sealed = session.seal("Shared").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                let sealed = sealed.clone();
                std::thread::spawn(move || session.reveal(&sealed))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "Shared");
        }
    }

    #[test]
    fn test_poisoned_slot_still_usable() {
        let session = Arc::new(KeySession::new());
        session.set_key(Some(fast_config().derive("alpha").unwrap()));

        let writer = Arc::clone(&session);
        let result = std::thread::spawn(move || {
            let _guard = writer.write_slot();
            panic!("writer failed while holding the slot");
        })
        .join();
        assert!(result.is_err());
        assert!(session.slot.is_poisoned());

        assert_eq!(session.status(), SessionStatus::Unlocked);
        let sealed = session.seal("Bicycle").unwrap();
        assert_eq!(session.reveal(&sealed), "Bicycle");

        session.lock();
        assert_eq!(session.status(), SessionStatus::Locked);
    }

    #[tokio::test]
    async fn test_unlock_installs_key() {
        let session = KeySession::new();
        let config = fast_config();

        session.unlock(passphrase("alpha"), &config).await.unwrap();

        assert!(session.is_unlocked());
        let sealed = session.seal("Scooter").unwrap();
        let again = config.derive("alpha").unwrap();
        assert_eq!(again.decrypt(&sealed["ENC_GCM:".len()..]).unwrap(), "Scooter");
    }

    #[tokio::test]
    async fn test_failed_unlock_stays_locked() {
        let session = KeySession::new();

        let result = session.unlock(passphrase(""), &fast_config()).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(session.status(), SessionStatus::Locked);
    }

    #[tokio::test]
    async fn test_failed_unlock_keeps_previous_key() {
        let session = KeySession::new();
        let config = fast_config();
        session.unlock(passphrase("alpha"), &config).await.unwrap();
        let sealed = session.seal("Groceries").unwrap();

        let broken = ShieldConfig {
            kdf: KdfParams::with_iterations(0),
            ..config
        };
        assert!(session.unlock(passphrase("beta"), &broken).await.is_err());

        assert_eq!(session.reveal(&sealed), "Groceries");
    }
}
