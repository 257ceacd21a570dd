//! HTTP transport behind a trait seam
//!
//! [`PageFetcher`] is the only way the crate touches the network. Every
//! failure comes back as a typed [`FetchError`]; nothing panics and nothing
//! retries at this layer. Retry policy is layered on with [`RetryingFetcher`].

use crate::config::RetryConfig;
use crate::error::{Error, FetchError, Result};
use crate::retry::with_retry;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Response body delivered incrementally
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, FetchError>> + Send>>;

/// A single HTTP GET with timeout and error classification
///
/// # Examples
///
/// ```no_run
/// use paper_harvest::fetcher::{HttpFetcher, PageFetcher};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fetcher = HttpFetcher::new(None)?;
/// let page = fetcher
///     .fetch("https://papers.nips.cc/paper_files/paper/2019", Duration::from_secs(10))
///     .await?;
/// println!("{} bytes", page.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the whole body of `url`
    ///
    /// `timeout` bounds the entire request, body included.
    async fn fetch(&self, url: &str, timeout: Duration) -> std::result::Result<Bytes, FetchError>;

    /// Open `url` and return its body as a stream of chunks
    ///
    /// `timeout` bounds the wait for response headers. Callers bound the wait
    /// for each chunk themselves.
    async fn fetch_stream(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<ByteStream, FetchError>;
}

#[async_trait]
impl<T: PageFetcher + ?Sized> PageFetcher for Arc<T> {
    async fn fetch(&self, url: &str, timeout: Duration) -> std::result::Result<Bytes, FetchError> {
        (**self).fetch(url, timeout).await
    }

    async fn fetch_stream(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<ByteStream, FetchError> {
        (**self).fetch_stream(url, timeout).await
    }
}

/// Production fetcher backed by a shared `reqwest::Client`
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher; the connection pool is shared by all clones
    pub fn new(user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        let client = builder
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

fn check_status(
    url: &str,
    response: reqwest::Response,
) -> std::result::Result<reqwest::Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> std::result::Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        let response = check_status(url, response)?;

        response
            .bytes()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))
    }

    async fn fetch_stream(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<ByteStream, FetchError> {
        let response = tokio::time::timeout(timeout, self.client.get(url).send())
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
            })?
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        let response = check_status(url, response)?;

        let url = url.to_string();
        let stream = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| FetchError::from_reqwest(&url, &e)));
        Ok(Box::pin(stream))
    }
}

/// Decorator that retries transient failures of the wrapped fetcher
///
/// For streams only opening the response is retried; a body that breaks
/// mid-transfer is reported to the caller as-is.
pub struct RetryingFetcher<F> {
    inner: F,
    config: RetryConfig,
}

impl<F: PageFetcher> RetryingFetcher<F> {
    /// Wrap `inner` with `config`
    pub fn new(inner: F, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// The wrapped fetcher
    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str, timeout: Duration) -> std::result::Result<Bytes, FetchError> {
        with_retry(&self.config, || self.inner.fetch(url, timeout)).await
    }

    async fn fetch_stream(
        &self,
        url: &str,
        timeout: Duration,
    ) -> std::result::Result<ByteStream, FetchError> {
        with_retry(&self.config, || self.inner.fetch_stream(url, timeout)).await
    }
}
