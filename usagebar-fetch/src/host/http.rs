//! HTTP usage fetcher.
//!
//! Issues a single GET against the usage endpoint. Authentication is assumed
//! to be provisioned already: an optional bearer token is attached as-is.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::TransportError;
use crate::fetcher::UsageFetcher;
use crate::payload::RawPayload;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// User agent string for UsageBar.
const USER_AGENT: &str = concat!("UsageBar/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// HTTP Fetcher
// ============================================================================

/// Fetches usage from an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpUsageFetcher {
    client: Client,
    url: Url,
    token: Option<String>,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpUsageFetcher {
    /// Creates a fetcher for `url`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfig` if the URL is not http(s) or
    /// the client cannot be built.
    pub fn new(url: &str, token: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let url = Url::parse(url)
            .map_err(|e| TransportError::InvalidConfig(format!("invalid URL {url}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::InvalidConfig(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::InvalidConfig(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            url,
            token: token.filter(|t| !t.trim().is_empty()),
            headers: HeaderMap::new(),
            timeout,
        })
    }

    /// Adds a static header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::InvalidConfig` for an invalid name or value.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, TransportError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| TransportError::InvalidConfig(format!("header name {name}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::InvalidConfig(format!("header value: {e}")))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

#[async_trait]
impl UsageFetcher for HttpUsageFetcher {
    fn id(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<RawPayload, TransportError> {
        let mut request = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .headers(self.headers.clone());
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        debug!("GET request");
        let response = request.send().await.map_err(|e| {
            let err = TransportError::from_reqwest(&e, self.timeout);
            warn!(error = %e, "Usage request failed");
            err
        })?;

        let status = response.status();
        debug!(status = %status, "Response received");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TransportError::AuthenticationRejected(format!(
                "server returned {}",
                status.as_u16()
            )));
        }

        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(MAX_ERROR_BODY)
                .collect();
            warn!(status = %status, "Usage endpoint returned an error");
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;

        if body.trim().is_empty() {
            return Err(TransportError::EmptyBody);
        }

        debug!(len = body.len(), "Usage payload received");
        Ok(RawPayload::detect(body))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::PayloadFormat;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serves one canned response and reports the raw request it saw.
    async fn serve_once(response: String) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        (format!("http://{addr}/usage"), rx)
    }

    #[tokio::test]
    async fn test_fetch_success_sends_token() {
        let body = r#"{"session": 42, "weekly": 10}"#;
        let (url, request) = serve_once(http_response("200 OK", body)).await;

        let fetcher = HttpUsageFetcher::new(&url, Some("secret-token".into()), DEFAULT_TIMEOUT)
            .unwrap()
            .with_header("anthropic-beta", "oauth-2025-04-20")
            .unwrap();
        let payload = fetcher.fetch().await.unwrap();

        assert_eq!(payload.body(), body);
        assert_eq!(payload.format(), PayloadFormat::Json);

        let request = request.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /usage"));
        assert!(request.contains("authorization: bearer secret-token"));
        assert!(request.contains("anthropic-beta: oauth-2025-04-20"));
    }

    #[tokio::test]
    async fn test_fetch_unauthorized() {
        let (url, _rx) = serve_once(http_response("401 Unauthorized", "{}")).await;
        let fetcher = HttpUsageFetcher::new(&url, None, DEFAULT_TIMEOUT).unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_fetch_server_error() {
        let (url, _rx) = serve_once(http_response("503 Service Unavailable", "down")).await;
        let fetcher = HttpUsageFetcher::new(&url, None, DEFAULT_TIMEOUT).unwrap();

        match fetcher.fetch().await.unwrap_err() {
            TransportError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_body() {
        let (url, _rx) = serve_once(http_response("200 OK", "  ")).await;
        let fetcher = HttpUsageFetcher::new(&url, None, DEFAULT_TIMEOUT).unwrap();

        assert!(matches!(
            fetcher.fetch().await.unwrap_err(),
            TransportError::EmptyBody
        ));
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let url = format!("http://{addr}/usage");
        let fetcher = HttpUsageFetcher::new(&url, None, Duration::from_millis(200)).unwrap();

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { .. }));
        assert_eq!(err.to_string(), "timeout");
    }

    #[tokio::test]
    async fn test_fetch_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/usage");
        let fetcher = HttpUsageFetcher::new(&url, None, DEFAULT_TIMEOUT).unwrap();

        assert!(matches!(
            fetcher.fetch().await.unwrap_err(),
            TransportError::Unreachable(_)
        ));
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            HttpUsageFetcher::new("not a url", None, DEFAULT_TIMEOUT),
            Err(TransportError::InvalidConfig(_))
        ));
        assert!(matches!(
            HttpUsageFetcher::new("ftp://example.com/usage", None, DEFAULT_TIMEOUT),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_blank_token_is_dropped() {
        let fetcher =
            HttpUsageFetcher::new("https://example.com/usage", Some("  ".into()), DEFAULT_TIMEOUT)
                .unwrap();
        assert!(fetcher.token.is_none());
        assert_eq!(fetcher.timeout, DEFAULT_TIMEOUT);
    }
}
