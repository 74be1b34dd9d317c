//! Bulk re-encryption of stored fields after a passphrase change.
//!
//! Each field is independent, so work is split into chunks and run in
//! parallel on the blocking pool. Output order always matches input order.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::field::{secure_encrypt, SENTINEL};
use loanshield_common::{Error, Result};
use loanshield_crypto::{aead, DerivedKey};

/// Number of fields handled by one blocking task.
pub const REKEY_CHUNK_SIZE: usize = 256;

/// What to do with unmarked values during re-encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RekeyPolicy {
    /// Leave plaintext values as they are.
    #[default]
    PreservePlaintext,
    /// Seal plaintext values under the new key, e.g. fields written while
    /// the session was locked.
    SealPlaintext,
}

/// Re-encrypt one stored field from `old` to `new`.
///
/// # Errors
/// - `DecryptionFailed` if a marked value does not open under `old`
pub fn rekey_field(
    value: &str,
    old: &DerivedKey,
    new: &DerivedKey,
    policy: RekeyPolicy,
) -> Result<String> {
    match value.strip_prefix(SENTINEL) {
        Some(envelope) => {
            // Sealed stays sealed, including an empty plaintext.
            let plaintext = Zeroizing::new(aead::decrypt(envelope, old)?);
            Ok(format!("{}{}", SENTINEL, aead::encrypt(&plaintext, new)?))
        }
        None => match policy {
            RekeyPolicy::PreservePlaintext => Ok(value.to_owned()),
            RekeyPolicy::SealPlaintext => secure_encrypt(value, Some(new)),
        },
    }
}

/// Re-encrypt many stored fields in parallel.
///
/// Fails as a whole on the first field that cannot be re-encrypted, so a
/// partial result is never written back.
pub async fn rekey_all(
    values: Vec<String>,
    old: Arc<DerivedKey>,
    new: Arc<DerivedKey>,
    policy: RekeyPolicy,
) -> Result<Vec<String>> {
    rekey_chunked(values, old, new, policy, REKEY_CHUNK_SIZE).await
}

async fn rekey_chunked(
    values: Vec<String>,
    old: Arc<DerivedKey>,
    new: Arc<DerivedKey>,
    policy: RekeyPolicy,
    chunk_size: usize,
) -> Result<Vec<String>> {
    let total = values.len();
    let chunk_size = chunk_size.max(1);
    let mut tasks = JoinSet::new();

    let mut values = values.into_iter().peekable();
    let mut chunk_count = 0;
    while values.peek().is_some() {
        let chunk: Vec<String> = values.by_ref().take(chunk_size).collect();
        let (old, new) = (Arc::clone(&old), Arc::clone(&new));
        let index = chunk_count;
        chunk_count += 1;

        tasks.spawn_blocking(move || {
            chunk
                .iter()
                .map(|value| rekey_field(value, &old, &new, policy))
                .collect::<Result<Vec<_>>>()
                .map(|rekeyed| (index, rekeyed))
        });
    }

    debug!(count = total, chunks = chunk_count, "Re-encrypting stored fields");

    let mut parts = Vec::with_capacity(chunk_count);
    while let Some(joined) = tasks.join_next().await {
        let part = joined.map_err(|e| Error::Crypto(format!("Re-encryption task failed: {}", e)))??;
        parts.push(part);
    }
    parts.sort_by_key(|(index, _)| *index);

    info!(count = total, "Stored fields re-encrypted");
    Ok(parts.into_iter().flat_map(|(_, rekeyed)| rekeyed).collect())
}
