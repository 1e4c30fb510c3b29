//! Authenticated encryption for Sensitive payloads — AES-256-GCM.
//!
//! A fresh 96-bit nonce is generated from `OsRng` for every encryption call
//! and stored alongside the ciphertext, so nonce reuse under one key cannot
//! happen structurally. The key arrives as a `KeyHandle` from the external
//! key-management collaborator; key material is never persisted or logged.
//!
//! Decrypt fails closed: tag verification failure, key_version mismatch, or
//! a malformed blob all return an error — partial or garbage plaintext is
//! never returned. Decrypted bytes come back in a memory-locked,
//! zero-on-drop buffer.

use crate::secure_memory::LockedBuf;
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use serde::{Deserialize, Serialize};

/// AES-256-GCM nonce length (96 bits).
const NONCE_LEN: usize = 12;

/// Errors from the cipher. Messages never include plaintext or key material.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("encryption failed")]
    EncryptionFailed,
    /// Wrong key, tampered ciphertext, or tag verification failure.
    #[error("decryption failed (tag verification)")]
    DecryptionFailed,
    #[error("blob key_version {blob} does not match key handle version {handle}")]
    KeyVersionMismatch { blob: u16, handle: u16 },
    /// The stored blob is too short to contain a nonce.
    #[error("corrupt encrypted blob")]
    CorruptBlob,
}

/// Key handle supplied by the external KMS collaborator.
///
/// `version` travels into every blob encrypted under this handle so a future
/// key rotation can route decryption without re-deriving trust.
pub struct KeyHandle {
    pub key_id: String,
    pub version: u16,
    material: [u8; 32],
}

impl KeyHandle {
    pub fn new(key_id: impl Into<String>, version: u16, material: [u8; 32]) -> Self {
        Self {
            key_id: key_id.into(),
            version,
            material,
        }
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(&self.material.into())
    }
}

impl std::fmt::Debug for KeyHandle {
    // Key material stays out of Debug output.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle")
            .field("key_id", &self.key_id)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Ciphertext container for a Sensitive payload. The GCM auth tag is
/// appended to `ciphertext` by the AEAD primitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub key_version: u16,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Encrypts `plaintext` under `handle` with a fresh random nonce.
pub fn encrypt(plaintext: &[u8], handle: &KeyHandle) -> Result<EncryptedBlob, CipherError> {
    let nonce = Aes256Gcm::generate_nonce(OsRng);
    let ciphertext = handle
        .cipher()
        .encrypt(&nonce, plaintext)
        .map_err(|_| CipherError::EncryptionFailed)?;
    Ok(EncryptedBlob {
        key_version: handle.version,
        nonce: nonce.as_slice().to_vec(),
        ciphertext,
    })
}

/// Decrypts a blob produced by [`encrypt`]. Fails closed on version
/// mismatch, malformed blob, or tag verification failure. The plaintext is
/// returned in a memory-locked buffer that zeroes itself on drop.
pub fn decrypt(blob: &EncryptedBlob, handle: &KeyHandle) -> Result<LockedBuf, CipherError> {
    if blob.key_version != handle.version {
        return Err(CipherError::KeyVersionMismatch {
            blob: blob.key_version,
            handle: handle.version,
        });
    }
    if blob.nonce.len() != NONCE_LEN {
        return Err(CipherError::CorruptBlob);
    }
    let nonce = Nonce::from_slice(&blob.nonce);
    let plaintext = handle
        .cipher()
        .decrypt(nonce, blob.ciphertext.as_ref())
        .map_err(|_| CipherError::DecryptionFailed)?;
    Ok(LockedBuf::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle(version: u16) -> KeyHandle {
        // Deterministic test key (NOT for production)
        let mut key = [0u8; 32];
        for (i, b) in key.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(42);
        }
        KeyHandle::new("test-key", version, key)
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let handle = test_handle(1);
        let plaintext = b"classified payload";
        let blob = encrypt(plaintext, &handle).unwrap();
        assert!(!blob.ciphertext.windows(plaintext.len()).any(|w| w == plaintext));
        let decrypted = decrypt(&blob, &handle).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn nonce_is_fresh_per_call() {
        let handle = test_handle(1);
        let a = encrypt(b"same input", &handle).unwrap();
        let b = encrypt(b"same input", &handle).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_fails_closed() {
        let handle = test_handle(1);
        let blob = encrypt(b"secret data", &handle).unwrap();
        let mut other_key = [0u8; 32];
        other_key[0] = 0xFF;
        let other = KeyHandle::new("other", 1, other_key);
        assert!(matches!(
            decrypt(&blob, &other),
            Err(CipherError::DecryptionFailed)
        ));
    }

    #[test]
    fn bit_flip_fails_closed() {
        let handle = test_handle(1);
        let mut blob = encrypt(b"secret data", &handle).unwrap();
        blob.ciphertext[0] ^= 0x01;
        assert!(matches!(
            decrypt(&blob, &handle),
            Err(CipherError::DecryptionFailed)
        ));
    }

    #[test]
    fn key_version_mismatch_fails_closed() {
        let v1 = test_handle(1);
        let v2 = test_handle(2);
        let blob = encrypt(b"rotating soon", &v1).unwrap();
        assert!(matches!(
            decrypt(&blob, &v2),
            Err(CipherError::KeyVersionMismatch { blob: 1, handle: 2 })
        ));
    }

    #[test]
    fn short_blob_is_corrupt() {
        let handle = test_handle(1);
        let blob = EncryptedBlob {
            key_version: 1,
            nonce: vec![1, 2, 3],
            ciphertext: vec![0; 16],
        };
        assert!(matches!(
            decrypt(&blob, &handle),
            Err(CipherError::CorruptBlob)
        ));
    }

    #[test]
    fn debug_never_prints_key_material() {
        let handle = test_handle(1);
        let printed = format!("{handle:?}");
        assert!(!printed.contains("material"));
    }
}
