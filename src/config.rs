//! Global Configuration Constants
//!
//! Fixed parameters shared by the codec, the report client and the scan
//! orchestrator. Runtime-tunable values live in [`crate::settings`]; the
//! constants here are either part of a persisted format or protocol defaults.
//!
//! ## Envelope Format
//!
//! The sizes and the iteration count below define the stored API key format.
//! Changing any of them makes previously stored keys undecryptable.

/// Application name used in user interfaces and log lines
pub const APP_NAME: &str = "vt-checker";

/// Default settings file, resolved relative to the working directory
pub const SETTINGS_FILE: &str = "vt-checker.json";

// === Envelope Layout ===
// The envelope is `tag || nonce || salt || ciphertext`, base64 encoded.

/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// Size of the AES-GCM nonce in bytes
///
/// 12 bytes (96 bits) is the standard GCM nonce length. A fresh random
/// nonce is drawn for every encryption.
pub const NONCE_SIZE: usize = 12;

/// Size of the PBKDF2 salt in bytes
pub const SALT_SIZE: usize = 32;

/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Offset of the nonce inside a decoded envelope
pub const NONCE_OFFSET: usize = TAG_SIZE;

/// Offset of the salt inside a decoded envelope
pub const SALT_OFFSET: usize = NONCE_OFFSET + NONCE_SIZE;

/// Offset of the ciphertext inside a decoded envelope
///
/// This is also the minimum decoded length of a well-formed envelope.
pub const CIPHERTEXT_OFFSET: usize = SALT_OFFSET + SALT_SIZE;

// === Key Derivation ===

/// PBKDF2-HMAC-SHA512 iteration count
///
/// Part of the stored key format. Must stay at 2000 to read existing envelopes.
pub const PBKDF2_ITERATIONS: u32 = 2000;

/// Minimum password length in characters
pub const PASSWORD_MIN_LENGTH: usize = 8;

// === Report Client ===

/// Default delay before repeating a rate-limited request, in milliseconds
pub const DEFAULT_RETRY_DELAY_MS: u64 = 60_000;

/// How many times a locked file is reopened before giving up
pub const FILE_OPEN_ATTEMPTS: u32 = 100;

/// Delay between attempts to open a locked file, in milliseconds
pub const FILE_OPEN_RETRY_DELAY_MS: u64 = 200;

/// Read buffer used while hashing files and downloads
pub const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Files hashed and looked up at the same time during batch scans
pub const SCAN_CONCURRENCY: usize = 8;

/// Process exit status after a second Ctrl-C (128 + SIGINT)
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

// === Reputation Service ===

/// Base URL of the reputation service
pub const API_BASE_URL: &str = "https://www.virustotal.com";

/// Header carrying the API key for the current protocol
pub const API_KEY_HEADER: &str = "x-apikey";

/// Error code returned by the current protocol for unknown hashes
pub const NOT_FOUND_CODE: &str = "NotFoundError";

/// `response_code` value the legacy protocol uses for known hashes
pub const LEGACY_PRESENT_CODE: i32 = 1;

// === Presentation ===

/// SHA-256 of the EICAR antivirus test file
pub const EICAR_SHA256: &str = "275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f";

/// Detection ratio below which a flagged file is reported as suspicious
/// rather than malicious
pub const ALERT_RATIO: f64 = 0.1;
