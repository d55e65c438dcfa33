//! Current report protocol.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{ApiError, ReportBackend};
use crate::cipher::hash::is_content_hash;
use crate::config::{API_BASE_URL, API_KEY_HEADER, NOT_FOUND_CODE};
use crate::secret::Secret;
use crate::types::Report;

#[derive(Debug, Deserialize)]
struct ResponseBody {
    #[serde(default)]
    data: Option<FileData>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct FileData {
    id: String,
    attributes: FileAttributes,
}

#[derive(Debug, Deserialize)]
struct FileAttributes {
    #[serde(default)]
    last_analysis_date: Option<i64>,
    #[serde(default)]
    last_analysis_stats: AnalysisStats,
}

/// Per-category engine counts. Other categories (timeouts, failures,
/// unsupported types) are not part of the total.
#[derive(Debug, Default, Deserialize)]
struct AnalysisStats {
    #[serde(default)]
    harmless: u32,
    #[serde(default)]
    malicious: u32,
    #[serde(default)]
    suspicious: u32,
    #[serde(default)]
    undetected: u32,
}

impl TryFrom<FileData> for Report {
    type Error = ApiError;

    fn try_from(data: FileData) -> Result<Self, Self::Error> {
        let stats = data.attributes.last_analysis_stats;
        let out_of_range = || ApiError::Backend(format!("engine counts out of range for {}", data.id));

        let positive_count = stats.malicious.checked_add(stats.suspicious).ok_or_else(out_of_range)?;
        let total_count = positive_count.checked_add(stats.harmless).and_then(|sum| sum.checked_add(stats.undetected)).ok_or_else(out_of_range)?;

        Ok(Self {
            available: true,
            positive_count,
            total_count,
            scan_date: data.attributes.last_analysis_date.map(format_timestamp).unwrap_or_default(),
            permalink: format!("{API_BASE_URL}/gui/file/{}/detection", data.id),
        })
    }
}

fn format_timestamp(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0).map(|date| date.format("%Y-%m-%d %H:%M:%S UTC").to_string()).unwrap_or_default()
}

pub struct CurrentApi {
    client: Client,
    base_url: String,
    api_key: Secret,
}

impl CurrentApi {
    pub fn new(client: Client, base_url: &str, api_key: Secret) -> Self {
        Self { client, base_url: base_url.trim_end_matches('/').to_owned(), api_key }
    }
}

#[async_trait]
impl ReportBackend for CurrentApi {
    async fn report(&self, resource: &str) -> Result<Report, ApiError> {
        // The resource becomes a path segment; anything but a digest could address another endpoint.
        if !is_content_hash(resource) {
            return Err(ApiError::Backend(format!("not a content hash: {resource:?}")));
        }

        let url = format!("{}/api/v3/files/{resource}", self.base_url);
        let response = self.client.get(url).header(API_KEY_HEADER, self.api_key.expose_secret()).send().await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ApiError::RateLimited(resource.to_owned()));
        }

        // Not-found and auth failures still carry a JSON error object, so the
        // body is parsed regardless of status.
        let body = response.text().await?;
        let parsed: ResponseBody = serde_json::from_str(&body).map_err(|e| ApiError::Backend(format!("unexpected response ({status}): {e}")))?;

        match parsed {
            ResponseBody { error: Some(error), .. } if error.code == NOT_FOUND_CODE => Ok(Report::unavailable()),
            ResponseBody { error: Some(error), .. } => Err(ApiError::Backend(format!("{}: {}", error.code, error.message))),
            ResponseBody { data: Some(data), .. } => Report::try_from(data),
            ResponseBody { data: None, error: None } => Err(ApiError::Backend(format!("response ({status}) has neither data nor error"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use mockito::Server;

    use super::*;

    const RESOURCE: &str = "275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f";

    fn api(server: &Server) -> CurrentApi {
        CurrentApi::new(Client::new(), &server.url(), Secret::new("test-key"))
    }

    fn path() -> String {
        format!("/api/v3/files/{RESOURCE}")
    }

    #[tokio::test]
    async fn test_file_report() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({
            "data": {
                "id": RESOURCE,
                "type": "file",
                "attributes": {
                    "last_analysis_date": 1_700_000_000,
                    "last_analysis_stats": {
                        "harmless": 0, "type-unsupported": 8, "suspicious": 2,
                        "confirmed-timeout": 0, "timeout": 1, "failure": 0,
                        "malicious": 60, "undetected": 5
                    }
                }
            }
        });
        let mock = server.mock("GET", path().as_str()).match_header("x-apikey", "test-key").with_status(200).with_body(body.to_string()).create_async().await;

        let report = api(&server).report(RESOURCE).await.unwrap();
        mock.assert_async().await;

        assert!(report.available);
        assert_eq!(report.positive_count, 62);
        assert_eq!(report.total_count, 67);
        assert_eq!(report.scan_date, "2023-11-14 22:13:20 UTC");
        assert_eq!(report.permalink, format!("https://www.virustotal.com/gui/file/{RESOURCE}/detection"));
    }

    #[tokio::test]
    async fn test_not_found_is_unavailable() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", path().as_str())
            .with_status(404)
            .with_body(r#"{"error":{"code":"NotFoundError","message":"File not found"}}"#)
            .create_async()
            .await;

        let report = api(&server).report(RESOURCE).await.unwrap();
        assert_eq!(report, Report::unavailable());
    }

    #[tokio::test]
    async fn test_other_error_is_fatal() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", path().as_str())
            .with_status(401)
            .with_body(r#"{"error":{"code":"WrongCredentialsError","message":"Wrong API key"}}"#)
            .create_async()
            .await;

        match api(&server).report(RESOURCE).await {
            Err(ApiError::Backend(message)) => assert_eq!(message, "WrongCredentialsError: Wrong API key"),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_too_many_requests_is_rate_limit() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", path().as_str())
            .with_status(429)
            .with_body(r#"{"error":{"code":"QuotaExceededError","message":"Quota exceeded"}}"#)
            .create_async()
            .await;

        match api(&server).report(RESOURCE).await {
            Err(ApiError::RateLimited(resource)) => assert_eq!(resource, RESOURCE),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_shape() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("GET", path().as_str()).with_status(200).with_body("{}").create_async().await;

        assert!(matches!(api(&server).report(RESOURCE).await, Err(ApiError::Backend(_))));
    }

    #[tokio::test]
    async fn test_count_overflow_is_backend_error() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({
            "data": {
                "id": RESOURCE,
                "attributes": { "last_analysis_stats": { "malicious": 4_294_967_295_u32, "suspicious": 1 } }
            }
        });
        let _mock = server.mock("GET", path().as_str()).with_status(200).with_body(body.to_string()).create_async().await;

        match api(&server).report(RESOURCE).await {
            Err(ApiError::Backend(message)) => assert!(message.contains("out of range")),
            other => panic!("expected backend error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_hash_resource_not_sent() {
        let mut server = Server::new_async().await;
        let mock = server.mock("GET", mockito::Matcher::Any).expect(0).create_async().await;

        for resource in ["../../users/me", "abc?x=1", "", "zz5a021bbfb6489e54d471899f7db9d1"] {
            assert!(matches!(api(&server).report(resource).await, Err(ApiError::Backend(_))), "{resource}");
        }
        mock.assert_async().await;
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }
}
