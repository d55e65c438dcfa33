//! # Reputation Backend Abstraction
//!
//! Two protocol generations of the reputation service answer the same
//! question: "what is known about this content hash?". Both are exposed
//! through [`ReportBackend`] and selected once, at construction, by
//! [`create_backend`].
//!
//! - [`v2::LegacyApi`]: key and hash as query parameters, `204 No Content`
//!   (or an empty body) when throttled.
//! - [`v3::CurrentApi`]: key in a header, hash in the path, `429` when
//!   throttled, structured error objects in the body.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::secret::Secret;
use crate::types::Report;

pub mod v2;
pub mod v3;

pub use v2::LegacyApi;
pub use v3::CurrentApi;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend throttled the request for this resource.
    #[error("rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unsupported api version {0}, expected 2 or 3")]
    UnsupportedVersion(u8),
}

/// Protocol generation of the reputation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V2,
    V3,
}

impl TryFrom<u8> for ApiVersion {
    type Error = ApiError;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        match version {
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            other => Err(ApiError::UnsupportedVersion(other)),
        }
    }
}

/// Turns a content hash into a normalized [`Report`].
///
/// Implementations must be safe to call from many tasks at once.
#[async_trait]
pub trait ReportBackend: Send + Sync {
    /// Looks up `resource` (a content hash).
    ///
    /// # Errors
    ///
    /// - [`ApiError::RateLimited`] carrying `resource` when throttled
    /// - [`ApiError::Backend`] for unexpected statuses or payloads
    /// - [`ApiError::Http`] for transport failures
    async fn report(&self, resource: &str) -> Result<Report, ApiError>;
}

/// Shared HTTP client used by both protocol variants.
pub fn http_client() -> Result<Client, ApiError> {
    Ok(Client::builder().user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))).build()?)
}

/// Builds the backend for `version`, talking to `base_url`.
pub fn create_backend(version: ApiVersion, api_key: Secret, base_url: &str) -> Result<Arc<dyn ReportBackend>, ApiError> {
    let client = http_client()?;
    Ok(match version {
        ApiVersion::V2 => Arc::new(LegacyApi::new(client, base_url, api_key)),
        ApiVersion::V3 => Arc::new(CurrentApi::new(client, base_url, api_key)),
    })
}
