// src/source/fetch.rs

//! Timeout-bounded, size-bounded, conditionally cached source retrieval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{
    CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
};

use crate::error::{AppError, Result};
use crate::models::SourceConfig;
use crate::utils::http::create_async_client;
use crate::utils::url::ensure_host_allowed;

/// One source request, including validators from the previous run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub token: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.token = token.map(str::to_string);
        self
    }

    /// Attach `If-None-Match`/`If-Modified-Since` validators. Blank values
    /// are dropped.
    pub fn with_validators(mut self, etag: &str, last_modified: &str) -> Self {
        self.etag = Some(etag.trim().to_string()).filter(|v| !v.is_empty());
        self.last_modified = Some(last_modified.trim().to_string()).filter(|v| !v.is_empty());
        self
    }

    /// The same request without conditional headers.
    pub fn unconditional(&self) -> Self {
        Self {
            etag: None,
            last_modified: None,
            ..self.clone()
        }
    }

    pub fn is_conditional(&self) -> bool {
        self.etag.is_some() || self.last_modified.is_some()
    }
}

/// A successful (2xx) source response with its body fully read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceResponse {
    pub content_type: String,
    pub etag: String,
    pub last_modified: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The source answered 304 to a conditional request
    NotModified,
    Fetched(SourceResponse),
}

/// Retrieval seam between the orchestrator and the network.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Fetch `request` under the limits of `config`.
    async fn fetch(&self, request: &FetchRequest, config: &SourceConfig) -> Result<FetchOutcome>;
}

/// `reqwest`-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher whose client never outlives `timeout` per request.
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: create_async_client(timeout)?,
        })
    }

    async fn exchange(&self, request: &FetchRequest, max_bytes: u64) -> Result<FetchOutcome> {
        let mut builder = self.client.get(&request.url);
        if let Some(token) = &request.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(etag) = &request.etag {
            builder = builder.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = &request.last_modified {
            builder = builder.header(IF_MODIFIED_SINCE, last_modified);
        }

        let mut response = builder.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(AppError::Http {
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        if let Some(declared) = header_text(headers, CONTENT_LENGTH)
            .parse::<u64>()
            .ok()
            .filter(|size| *size > max_bytes)
        {
            return Err(AppError::size_limit(declared, max_bytes));
        }
        let content_type = header_text(headers, CONTENT_TYPE);
        let etag = header_text(headers, ETAG);
        let last_modified = header_text(headers, LAST_MODIFIED);

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            let size = (body.len() + chunk.len()) as u64;
            if size > max_bytes {
                return Err(AppError::size_limit(size, max_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        log::debug!("Fetched {} bytes ({content_type}) from {}", body.len(), request.url);
        Ok(FetchOutcome::Fetched(SourceResponse {
            content_type,
            etag,
            last_modified,
            body,
        }))
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest, config: &SourceConfig) -> Result<FetchOutcome> {
        ensure_host_allowed(&request.url, &config.allowed_domains)?;

        let timeout_ms = config.timeout_ms;
        let exchange = self.exchange(request, config.max_bytes);
        match tokio::time::timeout(config.timeout(), exchange).await {
            Ok(Err(AppError::Network(e))) if e.is_timeout() => {
                Err(AppError::Timeout { timeout_ms })
            }
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout { timeout_ms }),
        }
    }
}

fn header_text(headers: &HeaderMap, name: reqwest::header::HeaderName) -> String {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str) -> SourceConfig {
        SourceConfig::new(url, &SourceKind::DATA_KINDS)
    }

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_reads_body_and_validators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/price.json"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("etag", "\"v2\"")
                    .insert_header("last-modified", "Wed, 01 Jan 2025 00:00:00 GMT")
                    .set_body_raw(r#"[{"a":"1"}]"#, "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/price.json", server.uri());
        let request = FetchRequest::new(&url).with_token(Some("tok"));
        let outcome = fetcher().fetch(&request, &config(&url)).await.unwrap();

        let FetchOutcome::Fetched(response) = outcome else {
            panic!("expected a body");
        };
        assert_eq!(response.body, br#"[{"a":"1"}]"#);
        assert_eq!(response.etag, "\"v2\"");
        assert_eq!(response.last_modified, "Wed, 01 Jan 2025 00:00:00 GMT");
        assert!(response.content_type.starts_with("application/json"));
    }

    #[tokio::test]
    async fn test_conditional_headers_and_not_modified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("if-none-match", "\"v1\""))
            .and(header("if-modified-since", "Tue, 31 Dec 2024 00:00:00 GMT"))
            .respond_with(ResponseTemplate::new(304))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/stock.csv", server.uri());
        let request =
            FetchRequest::new(&url).with_validators("\"v1\"", "Tue, 31 Dec 2024 00:00:00 GMT");
        assert!(request.is_conditional());
        assert!(!request.unconditional().is_conditional());

        let outcome = fetcher().fetch(&request, &config(&url)).await.unwrap();
        assert_eq!(outcome, FetchOutcome::NotModified);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = format!("{}/price.xlsx", server.uri());
        let err = fetcher()
            .fetch(&FetchRequest::new(&url), &config(&url))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Http { status: 503 }));
        assert_eq!(err.to_string(), "Source request failed: HTTP 503");
    }

    #[tokio::test]
    async fn test_size_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("x".repeat(4096), "text/csv"))
            .mount(&server)
            .await;

        let url = format!("{}/stock.csv", server.uri());
        let mut config = config(&url);
        config.max_bytes = 1024;
        let err = fetcher()
            .fetch(&FetchRequest::new(&url), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SizeLimit { limit: 1024, .. }));
        assert!(err.to_string().starts_with("Response too large"));
    }

    /// gzip of 4096 `a` bytes: 40 bytes on the wire.
    const GZIPPED_4K: [u8; 40] = [
        0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x03, 0xed, 0xc1, 0x01, 0x0d, 0x00,
        0x00, 0x00, 0xc2, 0xa0, 0xac, 0xef, 0x5f, 0xc2, 0x1e, 0x0e, 0x28, 0x00, 0x00, 0x00, 0xe0,
        0xdd, 0x00, 0x73, 0xdc, 0x99, 0x9c, 0x00, 0x10, 0x00, 0x00,
    ];

    #[tokio::test]
    async fn test_size_limit_on_decoded_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(GZIPPED_4K.to_vec(), "text/csv")
                    .insert_header("content-encoding", "gzip"),
            )
            .mount(&server)
            .await;

        let url = format!("{}/stock.csv", server.uri());
        let mut config = config(&url);
        config.max_bytes = 1024;
        let err = fetcher()
            .fetch(&FetchRequest::new(&url), &config)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::SizeLimit { size, limit: 1024 } if size > 1024),
            "{err}"
        );

        config.max_bytes = 4096;
        let outcome = fetcher().fetch(&FetchRequest::new(&url), &config).await.unwrap();
        let FetchOutcome::Fetched(response) = outcome else {
            panic!("expected a body");
        };
        assert_eq!(response.body, vec![b'a'; 4096]);
    }

    #[tokio::test]
    async fn test_timeout_is_distinct() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("a,b\n1,2", "text/csv")
                    .set_delay(Duration::from_millis(3000)),
            )
            .mount(&server)
            .await;

        let url = format!("{}/stock.csv", server.uri());
        let mut config = config(&url);
        config.timeout_ms = 1000;
        let err = fetcher()
            .fetch(&FetchRequest::new(&url), &config)
            .await
            .unwrap_err();
        assert!(err.is_timeout(), "{err}");
        assert_eq!(err.to_string(), "Source request timed out after 1000ms");
    }

    #[tokio::test]
    async fn test_host_allow_list() {
        let server = MockServer::start().await;
        let url = format!("{}/stock.csv", server.uri());
        let mut config = config(&url);
        config.allowed_domains = vec!["example.com".to_string()];

        let err = fetcher()
            .fetch(&FetchRequest::new(&url), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Domain(_)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
