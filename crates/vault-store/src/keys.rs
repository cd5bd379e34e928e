//! Key scheme: `<username>/<namespace>/<key>`.
//!
//! The username-first prefix bounds every per-user read to a single prefix
//! scan. Keys are plain UTF-8 (never encrypted) so sled's native
//! lexicographic ordering applies directly; only values are encrypted
//! (see [`crate::crypto`]).

const SECRETS_DATA: &str = "secrets_data";
const SECRETS_METADATA: &str = "secrets_metadata";
const AUTH_METADATA: &str = "auth_metadata";

/// Prefix bounding every `secrets_data` key for `username`.
pub fn secrets_data_prefix(username: &str) -> Vec<u8> {
    format!("{username}/{SECRETS_DATA}/").into_bytes()
}

/// Prefix bounding every `secrets_metadata` key for `username`.
pub fn secrets_metadata_prefix(username: &str) -> Vec<u8> {
    format!("{username}/{SECRETS_METADATA}/").into_bytes()
}

/// The exact `secrets_data` key for `(username, key)`.
pub fn secret_data_key(username: &str, key: &str) -> Vec<u8> {
    format!("{username}/{SECRETS_DATA}/{key}").into_bytes()
}

/// The exact `secrets_metadata` key for `(username, key)`.
pub fn secret_metadata_key(username: &str, key: &str) -> Vec<u8> {
    format!("{username}/{SECRETS_METADATA}/{key}").into_bytes()
}

/// The single `auth_metadata` key for `username`.
pub fn auth_metadata_key(username: &str) -> Vec<u8> {
    format!("{username}/{AUTH_METADATA}").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_user_keys_are_distinct_and_prefixed() {
        assert!(secret_data_key("alice", "k1").starts_with(&secrets_data_prefix("alice")));
        assert!(!secret_data_key("bob", "k1").starts_with(&secrets_data_prefix("alice")));
    }
}
