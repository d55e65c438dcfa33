//! # API Key Envelope Codec
//!
//! Protects a secret string (the reputation service API key) with a password
//! and produces a self-contained, tamper-evident text blob.
//!
//! ## Envelope Layout
//!
//! ```text
//! | tag (16) | nonce (12) | salt (32) | ciphertext (n) |   -> base64
//! ```
//!
//! - The key is derived with PBKDF2-HMAC-SHA512, 2000 iterations, from the
//!   password and the stored salt.
//! - The payload is sealed with AES-256-GCM under that key and the stored nonce.
//! - There is no version marker: the layout above is the whole format.
//!
//! ## Failure Modes
//!
//! - Bad base64 or fewer than 60 decoded bytes: [`CipherError::MalformedEnvelope`]
//! - Wrong password or modified bytes: [`CipherError::AuthenticationFailed`],
//!   which callers treat as "ask for the password again"
//! - RNG or cipher setup failures: [`CipherError::CryptoBackend`]

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use thiserror::Error;

mod aes_gcm;
mod derive;
pub mod hash;

pub use aes_gcm::AesGcm;
pub use derive::{Derive, random_bytes};

use crate::config::{CIPHERTEXT_OFFSET, NONCE_OFFSET, NONCE_SIZE, SALT_OFFSET, SALT_SIZE, TAG_SIZE};

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("authentication failed: wrong password or corrupted data")]
    AuthenticationFailed,

    #[error("cryptographic backend error: {0}")]
    CryptoBackend(String),

    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

impl CipherError {
    /// Whether prompting for the password again may succeed.
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }
}

/// Encrypts `plaintext` under `password` and returns the base64 envelope.
///
/// Every call draws a fresh salt and nonce, so encrypting the same input
/// twice yields different envelopes.
///
/// # Errors
///
/// Returns [`CipherError::CryptoBackend`] if randomness or the cipher fails.
pub fn encrypt(plaintext: &str, password: &str) -> Result<String, CipherError> {
    let salt: [u8; SALT_SIZE] = random_bytes()?;
    let nonce: [u8; NONCE_SIZE] = random_bytes()?;

    let key = Derive::new(password.as_bytes()).derive_key(&salt);
    let (ciphertext, tag) = AesGcm::new(&key)?.seal(&nonce, plaintext.as_bytes())?;

    let mut envelope = Vec::with_capacity(CIPHERTEXT_OFFSET + ciphertext.len());
    envelope.extend_from_slice(&tag);
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&salt);
    envelope.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(envelope))
}

/// Decrypts a base64 envelope produced by [`encrypt`].
///
/// # Errors
///
/// - [`CipherError::MalformedEnvelope`] for undecodable or truncated input
/// - [`CipherError::AuthenticationFailed`] for a wrong password or tampering
/// - [`CipherError::InvalidUtf8`] if the authenticated payload is not text
pub fn decrypt(envelope: &str, password: &str) -> Result<String, CipherError> {
    let bytes = BASE64.decode(envelope.trim()).map_err(|e| CipherError::MalformedEnvelope(format!("invalid base64: {e}")))?;

    if bytes.len() < CIPHERTEXT_OFFSET {
        return Err(CipherError::MalformedEnvelope(format!("need at least {CIPHERTEXT_OFFSET} bytes, got {}", bytes.len())));
    }

    let tag = &bytes[..TAG_SIZE];
    let nonce = &bytes[NONCE_OFFSET..SALT_OFFSET];
    let salt = &bytes[SALT_OFFSET..CIPHERTEXT_OFFSET];
    let ciphertext = &bytes[CIPHERTEXT_OFFSET..];

    let key = Derive::new(password.as_bytes()).derive_key(salt);
    let plaintext = AesGcm::new(&key)?.open(nonce, ciphertext, tag)?;

    Ok(String::from_utf8(plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "qwert test ąć@$%";

    #[test]
    fn test_round_trip() {
        for (text, password) in [("", TEXT), (TEXT, TEXT), (TEXT, ""), ("0123456789abcdef", "validPass123!")] {
            let envelope = encrypt(text, password).unwrap();
            assert_eq!(decrypt(&envelope, password).unwrap(), text);
        }
    }

    #[test]
    fn test_wrong_password_rejected() {
        for (text, encryption_password, decryption_password) in [("", TEXT, "fgdgfdfg"), (TEXT, TEXT, ""), (TEXT, "", "gfdsdfh")] {
            let envelope = encrypt(text, encryption_password).unwrap();
            let result = decrypt(&envelope, decryption_password);
            assert!(matches!(result, Err(CipherError::AuthenticationFailed)));
            assert!(result.unwrap_err().is_recoverable());
        }
    }

    #[test]
    fn test_envelope_length() {
        for text in ["", "a", TEXT, "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"] {
            let envelope = encrypt(text, "validPass123!").unwrap();
            let decoded = BASE64.decode(envelope).unwrap();
            assert_eq!(decoded.len(), TAG_SIZE + NONCE_SIZE + SALT_SIZE + text.len());
        }
    }

    #[test]
    fn test_fresh_salt_and_nonce() {
        let a = encrypt(TEXT, "validPass123!").unwrap();
        let b = encrypt(TEXT, "validPass123!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_envelope_is_malformed() {
        let short = BASE64.encode([0u8; CIPHERTEXT_OFFSET - 1]);
        let result = decrypt(&short, "validPass123!");
        assert!(matches!(result, Err(CipherError::MalformedEnvelope(_))));
        assert!(!result.unwrap_err().is_recoverable());
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        assert!(matches!(decrypt("not base64 !!", "validPass123!"), Err(CipherError::MalformedEnvelope(_))));
    }

    #[test]
    fn test_minimal_envelope_fails_authentication() {
        // exactly the header with an empty ciphertext and a bogus tag
        let envelope = BASE64.encode([0u8; CIPHERTEXT_OFFSET]);
        assert!(matches!(decrypt(&envelope, "validPass123!"), Err(CipherError::AuthenticationFailed)));
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let envelope = encrypt(TEXT, "validPass123!").unwrap();
        let mut bytes = BASE64.decode(envelope).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        let tampered = BASE64.encode(bytes);
        assert!(matches!(decrypt(&tampered, "validPass123!"), Err(CipherError::AuthenticationFailed)));
    }

    #[test]
    fn test_layout_offsets() {
        // the salt recorded in the envelope re-derives the sealing key
        let envelope = encrypt(TEXT, "validPass123!").unwrap();
        let bytes = BASE64.decode(envelope).unwrap();
        let key = Derive::new(b"validPass123!").derive_key(&bytes[SALT_OFFSET..CIPHERTEXT_OFFSET]);
        let plaintext = AesGcm::new(&key).unwrap().open(&bytes[NONCE_OFFSET..SALT_OFFSET], &bytes[CIPHERTEXT_OFFSET..], &bytes[..TAG_SIZE]).unwrap();
        assert_eq!(plaintext, TEXT.as_bytes());
    }
}
