//! Downloading the page archive.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info, instrument};
use url::Url;

use tldr_shared::{Result, TldrError};

/// Maximum number of redirects to follow when fetching the archive.
const MAX_REDIRECTS: usize = 5;

/// User-Agent string for archive requests.
const USER_AGENT: &str = concat!("tldr-rs/", env!("CARGO_PKG_VERSION"));

/// Something that can produce the raw bytes of a page archive.
pub trait ArchiveSource {
    /// Retrieve the complete archive. Failures are [`TldrError::Fetch`].
    fn fetch(&self) -> impl Future<Output = Result<Vec<u8>>>;

    /// Human-readable location for logs and messages.
    fn location(&self) -> String;
}

/// Fetches the archive over HTTP(S) with a single GET request.
pub struct HttpSource {
    client: Client,
    url: Url,
}

impl HttpSource {
    /// Build a source for `url`. `timeout` of `None` keeps reqwest's default.
    pub fn new(url: Url, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| TldrError::Fetch(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, url })
    }
}

impl ArchiveSource for HttpSource {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<u8>> {
        info!("downloading page archive");

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| TldrError::Fetch(format!("{}: {e}", self.url)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TldrError::Fetch(format!("{}: HTTP {status}", self.url)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TldrError::Fetch(format!("{}: failed to read body: {e}", self.url)))?;

        debug!(bytes = body.len(), "archive downloaded");
        Ok(body.to_vec())
    }

    fn location(&self) -> String {
        self.url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_for(server: &wiremock::MockServer, path: &str) -> HttpSource {
        let url = Url::parse(&format!("{}{path}", server.uri())).unwrap();
        HttpSource::new(url, Some(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn fetch_returns_body_bytes() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/assets/tldr.zip"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let source = source_for(&server, "/assets/tldr.zip");
        let bytes = source.fetch().await.expect("fetch");
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn non_success_status_is_fetch_error() {
        let server = wiremock::MockServer::start().await;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/assets/tldr.zip"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = source_for(&server, "/assets/tldr.zip");
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, TldrError::Fetch(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn unreachable_host_is_fetch_error() {
        // Nothing listens on the discard port.
        let url = Url::parse("http://127.0.0.1:9/tldr.zip").unwrap();
        let source = HttpSource::new(url, Some(Duration::from_secs(2))).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, TldrError::Fetch(_)));
    }

    #[test]
    fn location_is_the_url() {
        let url = Url::parse("https://example.com/pages.zip").unwrap();
        let source = HttpSource::new(url, None).unwrap();
        assert_eq!(source.location(), "https://example.com/pages.zip");
    }
}
