//! reqwest-backed [`RemoteSource`]

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};

use super::RemoteSource;
use crate::error::TransportError;
use crate::models::Album;

/// Feed used when the config does not name one
pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";

/// HTTP client for the photo feed
#[derive(Debug, Clone)]
pub struct HttpSource {
    client: Client,
    base_url: String,
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, Duration::from_secs(30))
    }
}

impl HttpSource {
    /// Create a source for the feed at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::with_client(base_url, client)
    }

    /// Create a source using a preconfigured client
    pub fn with_client(base_url: &str, client: Client) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build feed URL
    fn api_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// GET `url`, accepting only 200 OK
    async fn get_ok(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        let url = Url::parse(url).map_err(|_| TransportError::InvalidUrl)?;

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            tracing::debug!("Request to {url} failed: {e}");
            if e.is_builder() {
                TransportError::InvalidUrl
            } else {
                TransportError::Unknown
            }
        })?;

        if response.status() != StatusCode::OK {
            tracing::debug!("Unexpected status {} from {url}", response.status());
            return Err(TransportError::InvalidResponse);
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::debug!("Failed to read body from {url}: {e}");
            TransportError::Unknown
        })?;
        Ok(body.to_vec())
    }
}

impl RemoteSource for HttpSource {
    async fn fetch_list(&self) -> Result<Vec<Album>, TransportError> {
        let body = self.get_ok(&self.api_url("/photos")).await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::debug!("Failed to parse photo feed: {e}");
            TransportError::InvalidData
        })
    }

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.get_ok(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single canned response and return the base URL
    async fn serve_once(status_line: &'static str, body: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let head = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn source(base_url: &str) -> HttpSource {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpSource::with_client(base_url, client)
    }

    #[tokio::test]
    async fn test_fetch_list_parses_feed() {
        let body = br#"[{"albumId":1,"id":1,"title":"t","url":"http://x/600","thumbnailUrl":"http://x/150"}]"#;
        let base = serve_once("200 OK", body).await;

        let albums = source(&base).fetch_list().await.unwrap();

        assert_eq!(albums.len(), 1);
        assert_eq!(albums[0].thumbnail_url, "http://x/150");
    }

    #[tokio::test]
    async fn test_fetch_list_bad_json_is_invalid_data() {
        let base = serve_once("200 OK", b"<html>nope</html>").await;
        assert_eq!(source(&base).fetch_list().await, Err(TransportError::InvalidData));
    }

    #[tokio::test]
    async fn test_non_200_is_invalid_response() {
        let base = serve_once("404 Not Found", b"").await;
        let url = format!("{base}/150/92c952");
        assert_eq!(
            source(&base).fetch_image_bytes(&url).await,
            Err(TransportError::InvalidResponse)
        );
    }

    #[tokio::test]
    async fn test_fetch_image_bytes_returns_body() {
        let base = serve_once("200 OK", b"\x89PNG fake").await;
        let url = format!("{base}/150/92c952");
        assert_eq!(
            source(&base).fetch_image_bytes(&url).await.unwrap(),
            b"\x89PNG fake".to_vec()
        );
    }

    #[tokio::test]
    async fn test_unparsable_url() {
        let source = source(DEFAULT_BASE_URL);
        assert_eq!(
            source.fetch_image_bytes("not a url").await,
            Err(TransportError::InvalidUrl)
        );
    }

    #[tokio::test]
    async fn test_connection_refused_is_unknown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = format!("http://{addr}/img.png");
        assert_eq!(
            source(DEFAULT_BASE_URL).fetch_image_bytes(&url).await,
            Err(TransportError::Unknown)
        );
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let source = HttpSource::new("https://example.com/", Duration::from_secs(1));
        assert_eq!(source.api_url("/photos"), "https://example.com/photos");
    }
}
