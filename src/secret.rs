use secrecy::{ExposeSecret, SecretString};

/// A password or API key that must never be logged.
pub struct Secret {
    inner: SecretString,
}

impl Secret {
    pub fn new(value: &str) -> Self {
        Self { inner: SecretString::from(value.to_owned()) }
    }

    pub fn from_string(value: String) -> Self {
        Self { inner: SecretString::from(value) }
    }

    pub fn expose_secret(&self) -> &str {
        self.inner.expose_secret()
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self::new(self.expose_secret())
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}
