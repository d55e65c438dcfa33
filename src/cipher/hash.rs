//! File identity digests.
//!
//! Files are identified to the reputation backend by a content digest
//! (MD5, SHA-1 or SHA-256, chosen once per client). Digests are rendered as
//! lowercase hex.
//!
//! # Architecture
//!
//! [`Digester`] is an incremental hasher over the selected algorithm. It can be
//! fed chunk by chunk (downloads) or drained from an async reader (files) with
//! [`hash_reader`].

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::HASH_BUFFER_SIZE;
use crate::types::HashType;

/// Incremental digest over one of the supported algorithms.
pub enum Digester {
    Md5(Md5),
    Sha1(Sha1),
    Sha256(Sha256),
}

impl Digester {
    pub fn new(hash_type: HashType) -> Self {
        match hash_type {
            HashType::Md5 => Self::Md5(Md5::new()),
            HashType::Sha1 => Self::Sha1(Sha1::new()),
            HashType::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(hasher) => hasher.update(data),
            Self::Sha1(hasher) => hasher.update(data),
            Self::Sha256(hasher) => hasher.update(data),
        }
    }

    /// Consumes the digester and returns the lowercase hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Md5(hasher) => hex::encode(hasher.finalize()),
            Self::Sha1(hasher) => hex::encode(hasher.finalize()),
            Self::Sha256(hasher) => hex::encode(hasher.finalize()),
        }
    }
}

/// Hashes everything `reader` yields until EOF.
///
/// # Errors
///
/// Returns the underlying I/O error if a read fails.
pub async fn hash_reader<R: AsyncRead + Unpin>(mut reader: R, hash_type: HashType) -> std::io::Result<String> {
    let mut digester = Digester::new(hash_type);

    // Heap buffer: large stack arrays inside futures bloat every task.
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];

    loop {
        let bytes_read = reader.read(&mut buffer).await?;
        if bytes_read == 0 {
            break;
        }
        digester.update(&buffer[..bytes_read]);
    }

    Ok(digester.finalize_hex())
}

/// Whether `text` looks like an MD5, SHA-1 or SHA-256 hex digest.
pub fn is_content_hash(text: &str) -> bool {
    matches!(text.len(), 32 | 40 | 64) && text.bytes().all(|byte| byte.is_ascii_hexdigit())
}
