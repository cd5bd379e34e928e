#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vault-store** – Encrypted, sled-backed storage adapter for the
//! nedovault secret vault.
//!
//! Maps the domain model (secrets, secret metadata, auth records) onto an
//! embedded `sled` database using the prefix scheme in [`keys`]. Every
//! persisted value is encrypted at rest with AES-256-GCM (see [`crypto`])
//! using a key supplied at [`VaultStore::open`] time; keys themselves stay
//! plaintext so prefix scans keep working.
//!
//! Grounded on `toka-store-sled` for the sled-backed-driver shape and on
//! `toka-security-vault` for the encrypt-before-insert / decrypt-after-get
//! pattern.

pub mod crypto;
mod keys;

use async_trait::async_trait;
use chrono::Utc;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use std::path::Path;

use vault_auth::{AuthError, AuthStorage};
use vault_types::{AuthRecord, Secret, SecretMeta};

use crypto::Cipher;

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Errors produced by the storage adapter.
///
/// All variants except [`StoreError::NotFound`] are meant to be collapsed
/// into an opaque `Internal` status at the service boundary; `NotFound`
/// alone is end-user-visible.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested key (or one half of a data/metadata pair) is absent.
    #[error("not found")]
    NotFound,
    /// The embedded sled database returned an error.
    #[error("storage backend error: {0}")]
    Backend(#[from] sled::Error),
    /// A `SecretData`/`SecretMeta` record failed to (de)serialize.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
    /// An `AuthRecord` failed to (de)serialize.
    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),
    /// Encryption or decryption of a stored value failed.
    #[error("crypto error: {0}")]
    Crypto(String),
}

/// Crate result helper.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<E> From<TransactionError<E>> for StoreError
where
    StoreError: From<E>,
{
    fn from(e: TransactionError<E>) -> Self {
        match e {
            TransactionError::Abort(inner) => StoreError::from(inner),
            TransactionError::Storage(sled_err) => StoreError::Backend(sled_err),
        }
    }
}

//─────────────────────────────
//  Store
//─────────────────────────────

/// Encrypted, sled-backed key/value store, scoped per user by key prefix.
pub struct VaultStore {
    db: sled::Db,
    cipher: Cipher,
}

impl VaultStore {
    /// Open (or create) the vault database at `path`, encrypting all
    /// values at rest with `encryption_key`.
    pub fn open<P: AsRef<Path>>(path: P, encryption_key: &[u8; 32]) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db, cipher: Cipher::new(encryption_key) })
    }

    /// Open a temporary, in-memory-backed store for tests.
    #[cfg(any(test, feature = "test-util"))]
    pub fn temporary(encryption_key: &[u8; 32]) -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db, cipher: Cipher::new(encryption_key) })
    }

    /// Add (or overwrite) a secret for `username`.
    ///
    /// Overwriting an existing key is permitted and bumps the timestamp —
    /// an unconditional upsert, not an `AlreadyExists` error (see
    /// SPEC_FULL.md §4.1 for why that policy was fixed this way).
    pub fn add_secret(
        &self,
        username: &str,
        key: &str,
        secret: &Secret,
        name: Option<String>,
    ) -> Result<()> {
        let data_key = keys::secret_data_key(username, key);
        let meta_key = keys::secret_metadata_key(username, key);

        let data_bytes = self.cipher.encrypt(&bincode::serialize(secret)?)?;

        let meta = SecretMeta {
            key: key.to_owned(),
            name,
            timestamp: Utc::now().timestamp(),
            secret_type: secret.secret_type(),
        };
        let meta_bytes = self.cipher.encrypt(&bincode::serialize(&meta)?)?;

        self.db
            .transaction(move |tx| {
                tx.insert(data_key.as_slice(), data_bytes.clone())?;
                tx.insert(meta_key.as_slice(), meta_bytes.clone())?;
                Ok::<(), ConflictableTransactionError<StoreError>>(())
            })
            .map_err(StoreError::from)?;

        Ok(())
    }

    /// Delete a secret. Idempotent: deleting an absent key is not an error.
    pub fn delete_secret(&self, username: &str, key: &str) -> Result<()> {
        let data_key = keys::secret_data_key(username, key);
        let meta_key = keys::secret_metadata_key(username, key);

        self.db
            .transaction(move |tx| {
                tx.remove(data_key.as_slice())?;
                tx.remove(meta_key.as_slice())?;
                Ok::<(), ConflictableTransactionError<StoreError>>(())
            })
            .map_err(StoreError::from)?;

        Ok(())
    }

    /// Fetch a secret and its metadata. Both halves must be present, or
    /// this returns [`StoreError::NotFound`].
    pub fn get_secret(&self, username: &str, key: &str) -> Result<(Secret, SecretMeta)> {
        let data_key = keys::secret_data_key(username, key);
        let meta_key = keys::secret_metadata_key(username, key);
        let cipher = &self.cipher;

        self.db
            .transaction(move |tx| {
                let data_raw = tx
                    .get(data_key.as_slice())?
                    .ok_or(ConflictableTransactionError::Abort(StoreError::NotFound))?;
                let meta_raw = tx
                    .get(meta_key.as_slice())?
                    .ok_or(ConflictableTransactionError::Abort(StoreError::NotFound))?;

                let data_plain = cipher
                    .decrypt(&data_raw)
                    .map_err(ConflictableTransactionError::Abort)?;
                let meta_plain = cipher
                    .decrypt(&meta_raw)
                    .map_err(ConflictableTransactionError::Abort)?;

                let secret: Secret = bincode::deserialize(&data_plain)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
                let meta: SecretMeta = bincode::deserialize(&meta_plain)
                    .map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;

                Ok((secret, meta))
            })
            .map_err(StoreError::from)
    }

    /// List every secret's metadata for `username`, in the backend's key
    /// order (lexicographic on `key`; stable for a given store state only).
    pub fn list_secrets_meta(&self, username: &str) -> Result<Vec<SecretMeta>> {
        let prefix = keys::secrets_metadata_prefix(username);
        let mut out = Vec::new();
        for kv in self.db.scan_prefix(&prefix) {
            let (_, value) = kv?;
            let plain = self.cipher.decrypt(&value)?;
            out.push(bincode::deserialize(&plain)?);
        }
        Ok(out)
    }

    /// Flush all pending writes to disk.
    pub async fn flush(&self) -> Result<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}

#[async_trait]
impl AuthStorage for VaultStore {
    async fn get_auth_meta(&self, username: &str) -> vault_auth::Result<Option<AuthRecord>> {
        let key = keys::auth_metadata_key(username);
        let raw = self
            .db
            .get(&key)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let Some(raw) = raw else { return Ok(None) };
        let plain = self
            .cipher
            .decrypt(&raw)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        let record = serde_json::from_slice(&plain).map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(Some(record))
    }

    async fn add_auth_meta(&self, username: &str, meta: &AuthRecord) -> vault_auth::Result<()> {
        let key = keys::auth_metadata_key(username);
        let plain = serde_json::to_vec(meta).map_err(|e| AuthError::Storage(e.to_string()))?;
        let encrypted = self.cipher.encrypt(&plain).map_err(|e| AuthError::Storage(e.to_string()))?;
        self.db
            .insert(&key, encrypted)
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn append_token(&self, username: &str, token: &str) -> vault_auth::Result<()> {
        let mut record = self.get_auth_meta(username).await?.unwrap_or_default();
        record.tokens.push(token.to_owned());
        self.add_auth_meta(username, &record).await
    }
}
