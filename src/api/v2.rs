//! Legacy report protocol.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{ApiError, ReportBackend};
use crate::config::LEGACY_PRESENT_CODE;
use crate::secret::Secret;
use crate::types::Report;

#[derive(Debug, Deserialize)]
struct ReportResponse {
    response_code: i32,
    #[serde(default)]
    scan_date: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    positives: u32,
    #[serde(default)]
    total: u32,
}

impl From<ReportResponse> for Report {
    fn from(response: ReportResponse) -> Self {
        Self {
            available: response.response_code == LEGACY_PRESENT_CODE,
            positive_count: response.positives,
            total_count: response.total,
            scan_date: response.scan_date.unwrap_or_default(),
            permalink: response.permalink.unwrap_or_default(),
        }
    }
}

pub struct LegacyApi {
    client: Client,
    endpoint: String,
    api_key: Secret,
}

impl LegacyApi {
    pub fn new(client: Client, base_url: &str, api_key: Secret) -> Self {
        let endpoint = format!("{}/vtapi/v2/file/report", base_url.trim_end_matches('/'));
        Self { client, endpoint, api_key }
    }
}

#[async_trait]
impl ReportBackend for LegacyApi {
    async fn report(&self, resource: &str) -> Result<Report, ApiError> {
        let response = self.client.get(&self.endpoint).query(&[("apikey", self.api_key.expose_secret()), ("resource", resource)]).send().await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Err(ApiError::RateLimited(resource.to_owned()));
        }

        if !status.is_success() {
            return Err(ApiError::Backend(format!("unexpected status {status}")));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(ApiError::RateLimited(resource.to_owned()));
        }

        let parsed: ReportResponse = serde_json::from_str(&body).map_err(|e| ApiError::Backend(format!("unexpected response: {e}")))?;
        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};

    use super::*;

    fn api(server: &Server) -> LegacyApi {
        LegacyApi::new(Client::new(), &server.url(), Secret::new("test-key"))
    }

    fn query(resource: &str) -> Matcher {
        Matcher::AllOf(vec![Matcher::UrlEncoded("apikey".into(), "test-key".into()), Matcher::UrlEncoded("resource".into(), resource.into())])
    }

    #[tokio::test]
    async fn test_present_report() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/vtapi/v2/file/report")
            .match_query(query("abc"))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response_code":1,"scan_date":"2024-01-02 03:04:05","permalink":"https://example.test/abc","positives":3,"total":70}"#)
            .create_async()
            .await;

        let report = api(&server).report("abc").await.unwrap();
        mock.assert_async().await;

        assert_eq!(
            report,
            Report { available: true, positive_count: 3, total_count: 70, scan_date: "2024-01-02 03:04:05".into(), permalink: "https://example.test/abc".into() }
        );
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/vtapi/v2/file/report")
            .match_query(query("abc"))
            .with_status(200)
            .with_body(r#"{"response_code":0,"verbose_msg":"The requested resource is not among the finished, queued or pending scans"}"#)
            .create_async()
            .await;

        let report = api(&server).report("abc").await.unwrap();
        assert!(!report.available);
    }

    #[tokio::test]
    async fn test_no_content_is_rate_limit() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("GET", "/vtapi/v2/file/report").match_query(query("abc")).with_status(204).create_async().await;

        match api(&server).report("abc").await {
            Err(ApiError::RateLimited(resource)) => assert_eq!(resource, "abc"),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_body_is_rate_limit() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("GET", "/vtapi/v2/file/report").match_query(query("abc")).with_status(200).with_body("").create_async().await;

        assert!(matches!(api(&server).report("abc").await, Err(ApiError::RateLimited(_))));
    }

    #[tokio::test]
    async fn test_forbidden_is_backend_error() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("GET", "/vtapi/v2/file/report").match_query(query("abc")).with_status(403).create_async().await;

        assert!(matches!(api(&server).report("abc").await, Err(ApiError::Backend(_))));
    }

    #[tokio::test]
    async fn test_garbage_body_is_backend_error() {
        let mut server = Server::new_async().await;
        let _mock = server.mock("GET", "/vtapi/v2/file/report").match_query(query("abc")).with_status(200).with_body("<html>").create_async().await;

        assert!(matches!(api(&server).report("abc").await, Err(ApiError::Backend(_))));
    }
}
