//! Content store connection.
//!
//! `ContentStore` is the seam between the upload pool and the remote
//! store. [`HttpStore`] speaks the store's HTTP API; tests substitute
//! in-memory implementations.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sitepub_protocol::constants::STORE_PATH;
use sitepub_protocol::{StoreRequest, StoreResponse};
use tracing::debug;

use crate::error::PublishError;

/// Abstract connection to a content-addressable store.
pub trait ContentStore: Send + Sync {
    /// Stores one blob and returns the store's response.
    ///
    /// Any error means the store did not confirm the blob.
    fn store(
        &self,
        request: StoreRequest,
    ) -> Pin<Box<dyn Future<Output = Result<StoreResponse, PublishError>> + Send + '_>>;
}

/// Store client over the HTTP API.
pub struct HttpStore {
    http: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpStore {
    /// Creates a client posting to `{endpoint}/storage/store`.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PublishError::Network(e.to_string()))?;

        Ok(Self {
            http,
            url: format!("{}{STORE_PATH}", endpoint.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: StoreRequest) -> Result<StoreResponse, PublishError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        let status = resp.status();

        // Only 200 confirms storage.
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(PublishError::Store {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await.map_err(|e| self.map_err(e))?;
        debug!(
            path = %request.metadata.path,
            bytes = body.len(),
            "store responded"
        );
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(StoreResponse::default());
        }
        Ok(serde_json::from_slice(&body)?)
    }

    fn map_err(&self, e: reqwest::Error) -> PublishError {
        if e.is_timeout() {
            PublishError::Timeout(self.timeout)
        } else {
            PublishError::Network(e.to_string())
        }
    }
}

impl ContentStore for HttpStore {
    fn store(
        &self,
        request: StoreRequest,
    ) -> Pin<Box<dyn Future<Output = Result<StoreResponse, PublishError>> + Send + '_>> {
        Box::pin(self.post(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitepub_protocol::StoreMetadata;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn request() -> StoreRequest {
        StoreRequest {
            data: "body{}".into(),
            metadata: StoreMetadata {
                filename: "style.css".into(),
                path: "/style.css".into(),
                size: 6,
            },
        }
    }

    /// Reads one HTTP request, head and body.
    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Starts a mock HTTP server that answers one request and hands the
    /// raw request back.
    async fn mock_server(status: u16, body: &str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/api/v1");
        let body = body.to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let raw = read_request(&mut stream).await;
                let resp = format!(
                    "HTTP/1.1 {status} Status\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = stream.write_all(resp.as_bytes()).await;
                let _ = stream.shutdown().await;
                let _ = tx.send(raw);
            }
        });

        (url, rx)
    }

    #[tokio::test]
    async fn store_posts_json_and_reads_hash() {
        let (url, rx) = mock_server(200, r#"{"success":true,"hash":"QmRemote"}"#).await;
        let store = HttpStore::new(&url, Duration::from_secs(5)).unwrap();

        let resp = store.store(request()).await.unwrap();
        assert_eq!(resp.identifier(), Some("QmRemote"));

        let raw = rx.await.unwrap();
        assert!(raw.starts_with("POST /api/v1/storage/store HTTP/1.1"));
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let sent: StoreRequest = serde_json::from_str(body).unwrap();
        assert_eq!(sent, request());
    }

    #[tokio::test]
    async fn store_accepts_content_hash_field() {
        let (url, _rx) = mock_server(200, r#"{"content_hash":"abc123"}"#).await;
        let store = HttpStore::new(&url, Duration::from_secs(5)).unwrap();
        let resp = store.store(request()).await.unwrap();
        assert_eq!(resp.identifier(), Some("abc123"));
    }

    #[tokio::test]
    async fn store_empty_body_has_no_identifier() {
        let (url, _rx) = mock_server(200, "").await;
        let store = HttpStore::new(&url, Duration::from_secs(5)).unwrap();
        let resp = store.store(request()).await.unwrap();
        assert_eq!(resp.identifier(), None);
    }

    #[tokio::test]
    async fn store_error_status() {
        let (url, _rx) = mock_server(500, r#"{"error":"disk full"}"#).await;
        let store = HttpStore::new(&url, Duration::from_secs(5)).unwrap();

        let err = store.store(request()).await.unwrap_err();
        match err {
            PublishError::Store { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("disk full"));
            }
            other => panic!("expected Store error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn store_non_200_success_is_error() {
        let (url, _rx) = mock_server(202, r#"{"hash":"pending"}"#).await;
        let store = HttpStore::new(&url, Duration::from_secs(5)).unwrap();
        let err = store.store(request()).await.unwrap_err();
        assert!(matches!(err, PublishError::Store { status: 202, .. }));
    }

    #[tokio::test]
    async fn store_invalid_json() {
        let (url, _rx) = mock_server(200, "not json").await;
        let store = HttpStore::new(&url, Duration::from_secs(5)).unwrap();
        let err = store.store(request()).await.unwrap_err();
        assert!(matches!(err, PublishError::Json(_)));
    }

    #[tokio::test]
    async fn store_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            // Accept and never answer.
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let store =
            HttpStore::new(&format!("http://127.0.0.1:{port}"), Duration::from_millis(200))
                .unwrap();
        let err = store.store(request()).await.unwrap_err();
        assert!(matches!(err, PublishError::Timeout(_)), "got {err:?}");

        handle.abort();
    }

    #[tokio::test]
    async fn store_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let store =
            HttpStore::new(&format!("http://127.0.0.1:{port}"), Duration::from_secs(2)).unwrap();
        let err = store.store(request()).await.unwrap_err();
        assert!(matches!(err, PublishError::Network(_)), "got {err:?}");
    }

    #[test]
    fn url_joins_trailing_slash() {
        let store =
            HttpStore::new("http://localhost:9333/api/v1/", Duration::from_secs(1)).unwrap();
        assert_eq!(store.url(), "http://localhost:9333/api/v1/storage/store");
    }
}
