#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **vault-auth** – Registers and authenticates vault users, and issues /
//! verifies signed bearer tokens.
//!
//! Mirrors the shape of `toka-auth`'s `hs256` module (claims struct, a
//! `mint`/`validate` pair around `jsonwebtoken`) but generalized from
//! capability claims to the vault's `{username, iat, exp}` session claims,
//! and paired with bcrypt password hashing (the source this vault is
//! modeled on uses bcrypt, not argon2, so that choice is kept here too).

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use vault_types::AuthRecord;

/// bcrypt cost used for new password hashes.
///
/// Kept deliberately small (single-digit, mirroring the Go source's cost of
/// 1) — this vault is not expected to gate a high-value identity provider,
/// and a low cost keeps `Authorize` latency predictable under test.
pub const DEFAULT_BCRYPT_COST: u32 = 4;

/// Default token time-to-live: 30 days.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

//─────────────────────────────
//  Errors
//─────────────────────────────

/// Errors produced by [`AuthService`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The supplied password did not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The token failed to parse, had the wrong signing algorithm, or its
    /// signature did not verify.
    #[error("invalid token")]
    InvalidToken,
    /// The token parsed and verified but has expired.
    #[error("expired token")]
    ExpiredToken,
    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    Hashing(String),
    /// The backing storage returned an error.
    #[error("auth storage error: {0}")]
    Storage(String),
}

/// Crate result helper.
pub type Result<T> = std::result::Result<T, AuthError>;

//─────────────────────────────
//  Claims
//─────────────────────────────

/// The claim set embedded in every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated username.
    pub username: String,
    /// Issued-at, unix seconds.
    pub iat: i64,
    /// Expiry, unix seconds.
    pub exp: i64,
}

//─────────────────────────────
//  Storage seam
//─────────────────────────────

/// Storage operations `AuthService` needs from the persistence layer.
///
/// Defined here (rather than depended on from `vault-store`) so this crate
/// stays independent of the concrete storage backend — `vault-store`
/// implements this trait for its sled-backed store.
#[async_trait]
pub trait AuthStorage: Send + Sync {
    /// Load the auth record for `username`, if one has been created.
    async fn get_auth_meta(&self, username: &str) -> Result<Option<AuthRecord>>;
    /// Persist a brand-new auth record for `username`.
    async fn add_auth_meta(&self, username: &str, meta: &AuthRecord) -> Result<()>;
    /// Append a newly issued token to `username`'s audit history.
    async fn append_token(&self, username: &str, token: &str) -> Result<()>;
}

//─────────────────────────────
//  Auth service
//─────────────────────────────

/// Registers and authenticates users, and issues/verifies bearer tokens.
///
/// First-`Authorize`-creates-user is a deliberate design choice carried from
/// the source implementation: there is no separate registration call.
pub struct AuthService {
    signing_key: Arc<[u8]>,
    token_ttl: Duration,
    storage: Arc<dyn AuthStorage>,
    bcrypt_cost: u32,
}

impl AuthService {
    /// Build a new auth service. `signing_key` is the process-wide HMAC key
    /// used for both minting and verifying tokens.
    pub fn new(signing_key: Vec<u8>, token_ttl: Duration, storage: Arc<dyn AuthStorage>) -> Self {
        Self {
            signing_key: signing_key.into(),
            token_ttl,
            storage,
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }

    /// Authenticate `username`/`password`, creating the user on first login.
    ///
    /// Returns a freshly issued bearer token on success.
    pub async fn authorize(&self, username: &str, password: &str) -> Result<String> {
        match self.storage.get_auth_meta(username).await? {
            Some(meta) => {
                let matches = bcrypt::verify(password, &meta.password_hash)
                    .map_err(|e| AuthError::Hashing(e.to_string()))?;
                if !matches {
                    return Err(AuthError::InvalidCredentials);
                }
            }
            None => {
                let hash = bcrypt::hash(password, self.bcrypt_cost)
                    .map_err(|e| AuthError::Hashing(e.to_string()))?;
                let meta = AuthRecord { password_hash: hash, tokens: Vec::new() };
                self.storage.add_auth_meta(username, &meta).await?;
            }
        }

        self.issue_token(username).await
    }

    /// Mint and persist (best-effort) a new token for `username`.
    pub async fn issue_token(&self, username: &str) -> Result<String> {
        let now = now_secs();
        let claims = Claims {
            username: username.to_owned(),
            iat: now,
            exp: now + self.token_ttl.as_secs() as i64,
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.signing_key),
        )
        .map_err(|e| AuthError::Hashing(e.to_string()))?;

        if let Err(e) = self.storage.append_token(username, &token).await {
            // Non-fatal per the vault's error policy: the audit trail is
            // best-effort, never a reason to fail an otherwise-successful
            // authorization.
            warn!(username, error = %e, "failed to append issued token to audit history");
        }

        Ok(token)
    }

    /// Verify a bearer token, returning its claims.
    ///
    /// Rejects tokens signed with any algorithm other than HS256 — an
    /// explicit check, not an artifact of trusting the token's own header,
    /// so a forged `alg: none` or RS256-confusion token is never accepted.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(&self.signing_key),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })?;

        Ok(data.claims)
    }
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_secs() as i64
}
