//! HTTP client wrapper with retry logic.
//!
//! Transient failures (timeouts, connection errors, 5xx responses) are
//! retried with exponential backoff; client errors (4xx) are surfaced
//! immediately. All remote ingestion goes through this client.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{RemoteError, Result};

/// Configuration for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Per-request timeout (default 30 s).
    pub request_timeout: Duration,
    /// Maximum retries on transient failures (default 3).
    pub max_retries: u32,
    /// Base backoff delay; attempt n sleeps `base · 2^(n-1)`
    /// (default 500 ms).
    pub backoff_base: Duration,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
        }
    }
}

/// Retrying HTTP client for remote ingestion.
pub struct HttpClient {
    client: Client,
    options: HttpOptions,
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new(options: HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.request_timeout)
            .build()?;
        Ok(Self { client, options })
    }

    /// GET a URL and return the raw body bytes.
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .execute_with_retry(url, || self.client.get(url))
            .await?;
        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// GET a URL and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .execute_with_retry(url, || self.client.get(url))
            .await?;
        decode_json(url, response).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .execute_with_retry(url, || self.client.post(url).json(body))
            .await?;
        decode_json(url, response).await
    }

    /// POST a plain-text body and decode the JSON response.
    pub async fn post_text_json<T: DeserializeOwned>(&self, url: &str, body: &str) -> Result<T> {
        let owned = body.to_string();
        let response = self
            .execute_with_retry(url, || {
                self.client
                    .post(url)
                    .header("Content-Type", "text/plain; charset=utf-8")
                    .body(owned.clone())
            })
            .await?;
        decode_json(url, response).await
    }

    /// GET several URLs concurrently, preserving order.
    pub async fn get_bytes_many(&self, urls: &[String]) -> Result<Vec<Vec<u8>>> {
        use futures::stream::{FuturesOrdered, StreamExt};

        let mut futures = FuturesOrdered::new();
        for url in urls {
            futures.push_back(self.get_bytes(url));
        }

        let mut results = Vec::with_capacity(urls.len());
        while let Some(result) = futures.next().await {
            results.push(result?);
        }
        Ok(results)
    }

    /// Execute a request with exponential backoff retry.
    ///
    /// The builder closure is re-invoked per attempt so request bodies
    /// never need cloning support.
    async fn execute_with_retry<F>(&self, url: &str, build: F) -> Result<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut last_err: Option<RemoteError> = None;

        for attempt in 0..=self.options.max_retries {
            if attempt > 0 {
                let delay = self.options.backoff_base * (1 << (attempt - 1));
                debug!(url, attempt, ?delay, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }

            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retryable = status.is_server_error()
                        || status == StatusCode::TOO_MANY_REQUESTS;
                    let body = response.text().await.unwrap_or_default();
                    last_err = Some(RemoteError::network(
                        url,
                        format!(
                            "HTTP {}: {}",
                            status,
                            body.chars().take(300).collect::<String>()
                        ),
                    ));
                    if !retryable {
                        break; // 4xx will not improve with retries
                    }
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_err = Some(RemoteError::network(url, e.to_string()));
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(last_err.unwrap_or_else(|| RemoteError::network(url, "request failed")))
    }
}

async fn decode_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| RemoteError::network(url, format!("reading body: {e}")))?;
    serde_json::from_str(&body).map_err(|e| {
        RemoteError::decode(
            url,
            format!(
                "{e} (body starts: {})",
                body.chars().take(120).collect::<String>()
            ),
        )
    })
}
