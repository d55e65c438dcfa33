//! vt-checker - file, link and process reputation lookups against VirusTotal.
//!
//! - Content hashing (MD5, SHA-1, SHA-256) of local files and downloads
//! - v2 and v3 reputation protocols behind one [`api::ReportBackend`] trait
//! - Fixed-delay retry on rate limiting and a last-lookup cache in [`client::ReportClient`]
//! - API key kept at rest in a PBKDF2 + AES-256-GCM envelope ([`cipher`])

pub mod api;
pub mod app;
pub mod cipher;
pub mod client;
pub mod config;
pub mod context;
pub mod password;
pub mod processor;
pub mod procfs;
pub mod secret;
pub mod settings;
pub mod sink;
pub mod types;
pub mod ui;
