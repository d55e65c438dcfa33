use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce, Tag};

use super::CipherError;
use crate::config::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// AES-256-GCM with the tag kept apart from the ciphertext.
pub struct AesGcm {
    inner: Aes256Gcm,
}

impl AesGcm {
    #[inline]
    pub fn new(key: &[u8; KEY_SIZE]) -> Result<Self, CipherError> {
        let inner = Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::CryptoBackend(format!("invalid aes key: {e}")))?;
        Ok(Self { inner })
    }

    /// Encrypts `plaintext`, returning the ciphertext and its detached tag.
    ///
    /// No associated data is bound.
    pub fn seal(&self, nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<(Vec<u8>, [u8; TAG_SIZE]), CipherError> {
        let mut buffer = plaintext.to_vec();
        let tag = self
            .inner
            .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut buffer)
            .map_err(|e| CipherError::CryptoBackend(format!("aes-gcm encryption failed: {e}")))?;

        let mut detached = [0u8; TAG_SIZE];
        detached.copy_from_slice(&tag);
        Ok((buffer, detached))
    }

    /// Verifies `tag` and decrypts `ciphertext`.
    ///
    /// A tag mismatch (wrong key or tampered data) is reported as
    /// [`CipherError::AuthenticationFailed`].
    pub fn open(&self, nonce: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut buffer = ciphertext.to_vec();
        self.inner
            .decrypt_in_place_detached(Nonce::from_slice(nonce), b"", &mut buffer, Tag::from_slice(tag))
            .map_err(|_| CipherError::AuthenticationFailed)?;
        Ok(buffer)
    }
}
