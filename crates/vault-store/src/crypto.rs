//! AES-256-GCM encryption-at-rest for sled values.
//!
//! Grounded on `toka-security-vault`'s `encrypt`/`decrypt` pair, but the key
//! is always supplied by the caller (process config) rather than
//! self-generated and stashed in a side tree — a vault whose key lives next
//! to the data it protects isn't encrypted against anything that can read
//! the data directory.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::rngs::OsRng;
use rand::Rng;

use crate::StoreError;

const NONCE_LEN: usize = 12;

/// Wraps a single AES-256-GCM key and encrypts/decrypts byte slices with it.
pub struct Cipher {
    cipher: Aes256Gcm,
}

impl Cipher {
    /// Build a cipher from a raw 32-byte key.
    pub fn new(key_bytes: &[u8; 32]) -> Self {
        let key = Key::<Aes256Gcm>::from_slice(key_bytes);
        Self { cipher: Aes256Gcm::new(key) }
    }

    /// Encrypt `plaintext`, returning `nonce || ciphertext`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| StoreError::Crypto(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a `nonce || ciphertext` blob produced by [`Cipher::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, StoreError> {
        if blob.len() < NONCE_LEN {
            return Err(StoreError::Crypto("encrypted value shorter than a nonce".into()));
        }
        let (nonce_bytes, ciphertext) = blob.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| StoreError::Crypto(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cipher = Cipher::new(&[7u8; 32]);
        let plaintext = b"super secret bytes";
        let blob = cipher.encrypt(plaintext).unwrap();
        assert_ne!(blob[NONCE_LEN..], plaintext[..]);
        assert_eq!(cipher.decrypt(&blob).unwrap(), plaintext);
    }

    #[test]
    fn distinct_nonces_each_call() {
        let cipher = Cipher::new(&[7u8; 32]);
        let a = cipher.encrypt(b"same input").unwrap();
        let b = cipher.encrypt(b"same input").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn tampered_ciphertext_fails_to_decrypt() {
        let cipher = Cipher::new(&[7u8; 32]);
        let mut blob = cipher.encrypt(b"hello").unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xFF;
        assert!(cipher.decrypt(&blob).is_err());
    }
}
