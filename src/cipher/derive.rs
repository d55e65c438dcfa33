//! # Key Derivation with PBKDF2
//!
//! Stretches a password into an AES-256 key with PBKDF2 over HMAC-SHA512.
//! The iteration count is fixed by the stored envelope format.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha512;

use super::CipherError;
use crate::config::{KEY_SIZE, PBKDF2_ITERATIONS};

/// # Key Derivation Function
///
/// Holds the password bytes for the lifetime of one encrypt or decrypt call.
/// An empty password is accepted; strength is enforced earlier by
/// [`crate::password`].
pub struct Derive {
    password: Vec<u8>,
}

impl Derive {
    pub fn new(password: &[u8]) -> Self {
        Self { password: password.to_vec() }
    }

    /// Derives a 32-byte key from the password and `salt`.
    ///
    /// Deterministic: the same password and salt always give the same key,
    /// which is how decryption recovers the key from the stored salt.
    pub fn derive_key(&self, salt: &[u8]) -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha512>(&self.password, salt, PBKDF2_ITERATIONS, &mut key);
        key
    }
}

impl Drop for Derive {
    fn drop(&mut self) {
        self.password.fill(0);
    }
}

/// Fills an `N`-byte array from the operating system's CSPRNG.
///
/// Used for both salts and nonces.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], CipherError> {
    let mut bytes = [0u8; N];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| CipherError::CryptoBackend(format!("rng failed: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SALT_SIZE;

    #[test]
    fn test_derive_deterministic() {
        let salt = [7u8; SALT_SIZE];
        let a = Derive::new(b"validPass123!").derive_key(&salt);
        let b = Derive::new(b"validPass123!").derive_key(&salt);
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_depends_on_salt_and_password() {
        let derive = Derive::new(b"validPass123!");
        let a = derive.derive_key(&[1u8; SALT_SIZE]);
        let b = derive.derive_key(&[2u8; SALT_SIZE]);
        let c = Derive::new(b"otherPass123!").derive_key(&[1u8; SALT_SIZE]);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_derive_empty_password() {
        let key = Derive::new(b"").derive_key(&[0u8; SALT_SIZE]);
        assert_eq!(key.len(), KEY_SIZE);
    }

    #[test]
    fn test_random_bytes_differ() {
        let a: [u8; SALT_SIZE] = random_bytes().unwrap();
        let b: [u8; SALT_SIZE] = random_bytes().unwrap();
        assert_ne!(a, b);
    }
}
