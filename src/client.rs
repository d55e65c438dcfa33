//! # Report Client
//!
//! Resolves a file, a download link or a bare hash into a [`Report`].
//!
//! ## Lookup State Machine
//!
//! ```text
//! Start ──cached hash──▶ CacheHit
//!   │
//!   ▼
//! Querying ──ok──▶ Cached ──▶ Done
//!   │  ▲
//!   │  └── sleep(retry_delay) ◀── Throttled
//!   ├──rate limited──────────────────┘
//!   └──other error──▶ Failed
//! ```
//!
//! Throttled lookups are retried with the same resource after a fixed delay,
//! without a limit unless `max_retries` is set. The shared [`RunContext`]
//! exit flag is checked before every dispatch, and a pending retry delay
//! ends as soon as exit is requested.
//!
//! ## Cache
//!
//! Only the most recent hash and its report are kept. The lock is held for
//! the check and for the update separately, never across the backend call,
//! so two concurrent lookups of the same new hash may both reach the backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Client;
use thiserror::Error;
use tokio::fs::File;

use crate::api::{ApiError, ApiVersion, ReportBackend, create_backend, http_client};
use crate::cipher::hash::{Digester, hash_reader};
use crate::config::{API_BASE_URL, DEFAULT_RETRY_DELAY_MS, FILE_OPEN_ATTEMPTS, FILE_OPEN_RETRY_DELAY_MS};
use crate::context::RunContext;
use crate::secret::Secret;
use crate::sink::LogSink;
use crate::types::{HashType, Report, Severity};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("lookup abandoned: shutting down")]
    Cancelled,
}

/// Construction-time behaviour of a [`ReportClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Digest used to identify files and downloads.
    pub hash_type: HashType,

    /// Keep the last hash and report and answer repeats from memory.
    pub cache_last: bool,

    /// Wait between a throttled request and its retry.
    pub retry_delay: Duration,

    /// Upper bound on retries of one lookup; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { hash_type: HashType::Sha256, cache_last: true, retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS), max_retries: None }
    }
}

struct CacheEntry {
    hash: String,
    report: Report,
}

pub struct ReportClient {
    backend: Arc<dyn ReportBackend>,
    downloads: Client,
    options: ClientOptions,
    cache: Mutex<Option<CacheEntry>>,
    context: Arc<RunContext>,
    sink: Arc<dyn LogSink>,
}

impl ReportClient {
    /// Builds a client for protocol `api_version` (2 or 3).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::UnsupportedVersion`] for any other version and
    /// [`ApiError::Http`] if the HTTP client cannot be initialised.
    pub fn new(api_key: Secret, api_version: u8, options: ClientOptions, context: Arc<RunContext>, sink: Arc<dyn LogSink>) -> Result<Self, ClientError> {
        let version = ApiVersion::try_from(api_version)?;
        let backend = create_backend(version, api_key, API_BASE_URL)?;
        Self::with_backend(backend, options, context, sink)
    }

    pub fn with_backend(backend: Arc<dyn ReportBackend>, options: ClientOptions, context: Arc<RunContext>, sink: Arc<dyn LogSink>) -> Result<Self, ClientError> {
        let downloads = http_client()?;
        Ok(Self { backend, downloads, options, cache: Mutex::new(None), context, sink })
    }

    /// Looks up a content hash.
    ///
    /// # Errors
    ///
    /// Propagates any backend error other than throttling, throttling itself
    /// once `max_retries` is exhausted, and [`ClientError::Cancelled`] when
    /// the run is shutting down.
    pub async fn check_hash(&self, hash: &str) -> Result<Report, ClientError> {
        if let Some(report) = self.cached(hash) {
            self.sink.log(&format!("Returning cached data for {hash}"), Severity::Info);
            return Ok(report);
        }

        let mut resource = hash.to_owned();
        let mut retries = 0u32;

        loop {
            if self.context.is_exiting() {
                return Err(ClientError::Cancelled);
            }

            match self.backend.report(&resource).await {
                Ok(report) => {
                    self.store(hash, &report);
                    return Ok(report);
                }
                Err(ApiError::RateLimited(limited)) => {
                    if self.options.max_retries.is_some_and(|max| retries >= max) {
                        self.sink.log(&format!("Giving up on {limited} after {retries} rate-limited retries"), Severity::Error);
                        return Err(ApiError::RateLimited(limited).into());
                    }

                    retries += 1;
                    let delay = self.options.retry_delay;
                    self.sink.log(&format!("Request for {limited} exceeded the rate limit, retrying in {}ms", delay.as_millis()), Severity::Warning);
                    if !self.context.sleep(delay).await {
                        return Err(ClientError::Cancelled);
                    }
                    resource = limited;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Hashes a local file and looks the digest up.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the file cannot be opened (after
    /// retrying a locked file) or read, plus everything [`Self::check_hash`]
    /// returns.
    pub async fn check_file(&self, path: &Path) -> Result<Report, ClientError> {
        let file = self.open_with_retry(path).await?;
        let hash = hash_reader(file, self.options.hash_type).await.map_err(|source| ClientError::Io { path: path.to_path_buf(), source })?;
        self.check_hash(&hash).await
    }

    /// Downloads `url`, hashes the body and looks the digest up.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Download`] for transport failures or non-success
    /// statuses, plus everything [`Self::check_hash`] returns.
    pub async fn check_file_link(&self, url: &str) -> Result<Report, ClientError> {
        let download_error = |source| ClientError::Download { url: url.to_owned(), source };

        let mut response = self.downloads.get(url).send().await.and_then(reqwest::Response::error_for_status).map_err(download_error)?;

        let mut digester = Digester::new(self.options.hash_type);
        while let Some(chunk) = response.chunk().await.map_err(download_error)? {
            digester.update(&chunk);
        }

        self.check_hash(&digester.finalize_hex()).await
    }

    /// Opens `path`, retrying while another process holds it.
    ///
    /// A missing file fails immediately; other errors are retried up to
    /// [`FILE_OPEN_ATTEMPTS`] times and the last one is returned.
    async fn open_with_retry(&self, path: &Path) -> Result<File, ClientError> {
        let mut attempt = 1;
        loop {
            match File::open(path).await {
                Ok(file) => return Ok(file),
                Err(source) if source.kind() == ErrorKind::NotFound || attempt >= FILE_OPEN_ATTEMPTS => {
                    return Err(ClientError::Io { path: path.to_path_buf(), source });
                }
                Err(source) => {
                    if self.context.is_exiting() {
                        return Err(ClientError::Cancelled);
                    }

                    self.sink.log(
                        &format!("Reading {} failed, retrying in {FILE_OPEN_RETRY_DELAY_MS}ms. Error: {source}", path.display()),
                        Severity::Warning,
                    );
                    if !self.context.sleep(Duration::from_millis(FILE_OPEN_RETRY_DELAY_MS)).await {
                        return Err(ClientError::Cancelled);
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn cached(&self, hash: &str) -> Option<Report> {
        if !self.options.cache_last {
            return None;
        }

        let cache = self.cache.lock();
        cache.as_ref().filter(|entry| entry.hash.eq_ignore_ascii_case(hash)).map(|entry| entry.report.clone())
    }

    fn store(&self, hash: &str, report: &Report) {
        if self.options.cache_last {
            *self.cache.lock() = Some(CacheEntry { hash: hash.to_owned(), report: report.clone() });
        }
    }
}
