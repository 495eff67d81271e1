//! API key encryption for agent handoff.
//!
//! The scheduling API key never travels in the clear: each request gets a
//! freshly encrypted copy (AES-256-GCM, random 96-bit IV). The ciphertext and
//! IV are hex-encoded and carried as `apiKeyHashed` / `apiKeyIV`.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// AES-GCM nonce length in bytes.
const IV_LEN: usize = 12;

/// An encrypted API key, split into ciphertext and initialization vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedApiKey {
    /// Hex-encoded ciphertext (with authentication tag).
    pub hash: String,
    /// Hex-encoded IV.
    pub init_vector: String,
}

/// Symmetric cipher for API keys.
pub struct ApiKeyCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for ApiKeyCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl ApiKeyCipher {
    /// Build a cipher from a 64-character hex key (32 bytes).
    pub fn from_hex_key(hex_key: &SecretString) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_key.expose_secret().trim())
            .map_err(|e| CryptoError::InvalidKey(format!("not valid hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(&bytes)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt a secret with a fresh random IV.
    pub fn encrypt(&self, plaintext: &SecretString) -> Result<EncryptedApiKey, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.expose_secret().as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        Ok(EncryptedApiKey {
            hash: hex::encode(ciphertext),
            init_vector: hex::encode(iv),
        })
    }

    /// Decrypt an [`EncryptedApiKey`] back into the original secret.
    pub fn decrypt(&self, encrypted: &EncryptedApiKey) -> Result<SecretString, CryptoError> {
        let iv = hex::decode(&encrypted.init_vector).map_err(|e| CryptoError::Encoding {
            field: "init_vector",
            reason: e.to_string(),
        })?;
        if iv.len() != IV_LEN {
            return Err(CryptoError::Decrypt(format!(
                "IV must be {IV_LEN} bytes, got {}",
                iv.len()
            )));
        }
        let ciphertext = hex::decode(&encrypted.hash).map_err(|e| CryptoError::Encoding {
            field: "hash",
            reason: e.to_string(),
        })?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|e| CryptoError::Decrypt(e.to_string()))?;

        String::from_utf8(plaintext)
            .map(SecretString::from)
            .map_err(|e| CryptoError::Decrypt(format!("plaintext is not UTF-8: {e}")))
    }
}
