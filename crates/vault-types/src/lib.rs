#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vault-types** – Shared domain data structures for the nedovault secret vault.
//!
//! Dependency-light and at the bottom of the crate graph: every other vault
//! crate depends on this one. It makes no assumptions about I/O, crypto, or
//! the wire transport.

use serde::{Deserialize, Serialize};

//─────────────────────────────
//  Secret payloads
//─────────────────────────────

/// The payload of a secret: a closed sum type over the two supported
/// shapes. Exactly one variant is ever present — there is no "neither"
/// state representable by this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Secret {
    /// A login/password pair.
    LogPass {
        /// The login/username half of the pair.
        login: String,
        /// The password half of the pair.
        password: String,
    },
    /// Arbitrary opaque text.
    Text {
        /// The stored text.
        data: String,
    },
}

impl Secret {
    /// The [`SecretType`] discriminator matching this value's active variant.
    pub fn secret_type(&self) -> SecretType {
        match self {
            Secret::LogPass { .. } => SecretType::LogPass,
            Secret::Text { .. } => SecretType::Text,
        }
    }
}

/// Discriminator mirroring the active variant of a [`Secret`].
///
/// `SecretMeta::secret_type` must always equal `Secret::secret_type()` for
/// the same `(username, key)` — this is a core invariant of the vault, not
/// just a convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretType {
    /// See [`Secret::LogPass`].
    LogPass,
    /// See [`Secret::Text`].
    Text,
}

//─────────────────────────────
//  Secret metadata
//─────────────────────────────

/// Metadata describing a stored secret, without its payload.
///
/// One `SecretMeta` exists per `(username, key)` pair, stored alongside
/// (never instead of, never without) the corresponding [`Secret`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretMeta {
    /// Unique key within the owning user's secrets.
    pub key: String,
    /// Optional human-readable display label.
    pub name: Option<String>,
    /// Unix timestamp (seconds) of the last mutation to this secret.
    pub timestamp: i64,
    /// Discriminator matching the stored [`Secret`]'s active variant.
    pub secret_type: SecretType,
}

//─────────────────────────────
//  Auth records
//─────────────────────────────

/// Per-user persisted credentials and a best-effort token audit trail.
///
/// `tokens` is an append-only history kept for audit purposes only; nothing
/// in this vault consults it to decide whether a token is still valid (see
/// the "Token revocation" open question carried from the source design).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthRecord {
    /// bcrypt hash of the user's password (algorithm, cost, and salt are all
    /// embedded in this string per the bcrypt wire format).
    pub password_hash: String,
    /// Every token ever issued to this user, oldest first.
    pub tokens: Vec<String>,
}
