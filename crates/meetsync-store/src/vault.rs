//! Credential vault.
//!
//! Provider secrets (OAuth tokens, app-specific passwords) are encrypted
//! with AES-256-GCM before they reach the account registry. A blob is the
//! base64 encoding of `nonce || ciphertext`, with a fresh random 12-byte
//! nonce per encryption, so encrypting the same plaintext twice yields
//! distinct blobs.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rand::Rng;
use tracing::warn;

use crate::error::{StoreError, StoreResult};

/// Required key length for AES-256-GCM.
pub const KEY_LEN: usize = 32;

/// Nonce length for AES-GCM.
const NONCE_LEN: usize = 12;

/// Encrypts and decrypts provider secrets.
///
/// Plaintext secrets exist only transiently inside callers of
/// [`CredentialVault::decrypt`]; they are never logged or persisted.
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl CredentialVault {
    /// Creates a vault from an exactly 32-byte key.
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte key is always valid");
        Self { cipher }
    }

    /// Creates a vault from arbitrary key material.
    ///
    /// Material that is not exactly 32 bytes is zero-padded or truncated,
    /// with a warning. Deployments should provide a full-strength key.
    pub fn new(key_material: &[u8]) -> Self {
        if key_material.len() != KEY_LEN {
            warn!(
                provided_len = key_material.len(),
                "vault key material is not {KEY_LEN} bytes; padding/truncating"
            );
        }
        let mut key = [0u8; KEY_LEN];
        for (dst, src) in key.iter_mut().zip(key_material) {
            *dst = *src;
        }
        Self::from_key(key)
    }

    /// Encrypts a plaintext secret into a base64 blob.
    pub fn encrypt(&self, plaintext: &str) -> StoreResult<String> {
        let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce_bytes), plaintext.as_bytes())
            .map_err(|e| StoreError::crypto(format!("encryption failed: {e}")))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    /// Decrypts a base64 blob back into the plaintext secret.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptSecret`] if the blob is not valid
    /// base64, is too short to hold a nonce, fails GCM authentication
    /// (wrong key or tampered ciphertext), or is not valid UTF-8.
    pub fn decrypt(&self, blob: &str) -> StoreResult<String> {
        let raw = BASE64
            .decode(blob)
            .map_err(|e| StoreError::corrupt_secret(format!("invalid base64: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(StoreError::corrupt_secret("blob shorter than nonce"));
        }

        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let nonce_array: [u8; NONCE_LEN] = nonce_bytes
            .try_into()
            .map_err(|_| StoreError::corrupt_secret("invalid nonce"))?;
        let plaintext = self
            .cipher
            .decrypt(&Nonce::from(nonce_array), ciphertext)
            .map_err(|_| StoreError::corrupt_secret("authentication failed"))?;

        String::from_utf8(plaintext)
            .map_err(|_| StoreError::corrupt_secret("decrypted secret is not UTF-8"))
    }
}
